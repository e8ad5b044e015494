//! End-to-end scenarios for the live client, run against the in-memory
//! backend and broker, plus the websocket relay over a real socket.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use skillshare_api::{NotificationItem, Topic, UserId};
use skillshare_client::{Config, DesktopNotifier, Session};
use skillshare_mock_server::{MockBroker, MockRest};
use tokio::sync::watch;

#[cfg(test)]
mod channel;
#[cfg(test)]
mod notifications;
#[cfg(test)]
mod post_activity;

pub fn init_logs() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Backend and push channel shared by all the sessions of a scenario
pub struct Stack {
    pub broker: MockBroker,
    pub rest: MockRest,
    pub config: Config,
}

impl Default for Stack {
    fn default() -> Stack {
        Stack::new()
    }
}

impl Stack {
    pub fn new() -> Stack {
        init_logs();
        let broker = MockBroker::new();
        Stack {
            rest: MockRest::with_broker(broker.clone()),
            broker,
            config: Config::default(),
        }
    }

    /// A client signed in as `user`, with its own push channel connection
    pub fn session(&self, user: &UserId) -> Session {
        Session::new(
            user.clone(),
            self.config.clone(),
            Arc::new(self.broker.clone()),
            Arc::new(self.rest.clone()),
        )
    }

    pub async fn wait_subscribed(&self, topic: &Topic, n: usize) {
        let broker = self.broker.clone();
        eventually(&format!("{n} subscribers on {topic}"), || {
            broker.subscribers(topic) == n
        })
        .await
    }
}

pub fn user(name: &str) -> UserId {
    UserId(String::from(name))
}

/// Wait until the watched value matches `pred`, returning it
pub async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<T>,
    what: &str,
    pred: impl Fn(&T) -> bool,
) -> T {
    let res = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            {
                let v = rx.borrow_and_update();
                if pred(&v) {
                    return v.clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("watched value went away while waiting for {what}");
            }
        }
    })
    .await;
    res.unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

/// Poll `cond` until it holds
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Let every task process what is already queued
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Desktop notifier remembering what it was asked to show
#[derive(Clone, Default)]
pub struct RecordingDesktop {
    pub denied: bool,
    pub shown: Arc<Mutex<Vec<NotificationItem>>>,
}

impl DesktopNotifier for RecordingDesktop {
    fn permitted(&self) -> bool {
        !self.denied
    }

    fn notify(&self, item: &NotificationItem) {
        self.shown.lock().push(item.clone());
    }
}
