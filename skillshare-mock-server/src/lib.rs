mod backend;
pub use backend::MockRest;

mod broker;
pub use broker::MockBroker;
