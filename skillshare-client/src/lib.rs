mod activity;
pub use activity::{Change, PostActivity};

mod channel;
pub use channel::{Connection, ConnectionState, Hub, Inbound, Subscription, Transport};

mod composer;
pub use composer::{Composer, ComposerState};

mod config;
pub use config::Config;

mod desktop;
pub use desktop::{DesktopNotifier, LogDesktop, NoDesktop};

mod echo;
pub use echo::LocalEchoSet;

mod error;
pub use error::Error;

mod feed;
pub use feed::{
    ActivityChannel, ActivityFeed, ActivityHandler, Feed, FeedItem, NotificationChannel,
    NotificationFeed, NotificationHandler, Unsubscribe,
};

mod inbox;
pub use inbox::{InboxChange, NotificationInbox};

mod inbox_view;
pub use inbox_view::{Inbox, InboxSnapshot};

pub mod mention;

mod post_view;
pub use post_view::{LoadState, PostSnapshot, PostView};

mod rest;
pub use rest::{HttpRest, Rest};

mod session;
pub use session::Session;

mod thread;
pub use thread::{CommentThread, CommentView};

mod ws;
pub use ws::WsTransport;

pub mod api {
    pub use skillshare_api::*;
}
