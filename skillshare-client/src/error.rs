use crate::api;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Api(#[from] api::Error),

    #[error("view was closed")]
    ViewClosed,
}

impl Error {
    /// Message suitable for showing inline next to the action that failed
    pub fn user_message(&self) -> String {
        match self {
            Error::Api(api::Error::EmptyText) => String::from("Please write something first"),
            Error::Api(api::Error::PermissionDenied) => {
                String::from("You are not allowed to do this")
            }
            Error::Api(api::Error::NotFound(_)) => String::from("This item no longer exists"),
            Error::Anyhow(_) | Error::Api(_) => String::from("Something went wrong, please retry"),
            Error::ViewClosed => String::from("This view was closed"),
        }
    }
}
