use std::sync::Arc;

use crate::{
    api::{PostId, UserId},
    ActivityChannel, Config, DesktopNotifier, Hub, HttpRest, Inbox, NoDesktop,
    NotificationChannel, PostView, Rest, Transport, WsTransport,
};

/// Everything the live views of a signed-in user share: who the user is,
/// the push channel connection and the REST collaborator.
#[derive(Clone)]
pub struct Session {
    user: UserId,
    config: Config,
    rest: Arc<dyn Rest>,
    activity: ActivityChannel,
    notifications: NotificationChannel,
    desktop: Arc<dyn DesktopNotifier>,
}

impl Session {
    pub fn new(
        user: UserId,
        config: Config,
        transport: Arc<dyn Transport>,
        rest: Arc<dyn Rest>,
    ) -> Session {
        let hub = Hub::new(transport, config.retry_delay);
        Session {
            user,
            config,
            rest,
            activity: ActivityChannel::new(hub.clone()),
            notifications: NotificationChannel::new(hub),
            desktop: Arc::new(NoDesktop),
        }
    }

    /// Session talking to the HTTP API at `host` and the relay at `relay`
    pub fn connect(user: UserId, host: &str, relay: &str, config: Config) -> Session {
        let transport = Arc::new(WsTransport::new(relay, &config));
        Session::new(user, config, transport, Arc::new(HttpRest::new(host)))
    }

    pub fn with_desktop(mut self, desktop: Arc<dyn DesktopNotifier>) -> Session {
        self.desktop = desktop;
        self
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hub(&self) -> &Hub {
        self.activity.hub()
    }

    pub fn activity(&self) -> &ActivityChannel {
        &self.activity
    }

    pub fn notifications(&self) -> &NotificationChannel {
        &self.notifications
    }

    pub fn open_post(&self, post: PostId) -> PostView {
        PostView::open(
            post,
            self.user.clone(),
            &self.activity,
            self.rest.clone(),
            &self.config,
        )
    }

    pub fn open_inbox(&self) -> Inbox {
        Inbox::open(
            self.user.clone(),
            &self.notifications,
            self.rest.clone(),
            self.desktop.clone(),
        )
    }
}
