use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt, StreamExt};
use tokio::sync::{mpsc, watch};

use crate::{
    api::{NotificationId, NotificationItem, UserId},
    ConnectionState, DesktopNotifier, Error, InboxChange, LoadState, NotificationChannel,
    NotificationFeed, NotificationInbox, Rest,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InboxSnapshot {
    pub load: LoadState,
    pub connection: ConnectionState,
    pub unread: u64,
    /// Newest first
    pub items: Vec<NotificationItem>,
}

enum Command {
    Read(NotificationId),
    Unread(NotificationId),
    AllRead,
    Deleted(NotificationId),
    Refresh,
}

type Fetch<T> = BoxFuture<'static, Result<T, Error>>;

async fn pending<T>(f: &mut Option<Fetch<T>>) -> Result<T, Error> {
    match f {
        Some(f) => f.await,
        None => std::future::pending().await,
    }
}

struct Task {
    inbox: NotificationInbox,
    load: LoadState,
    connection: ConnectionState,
    user: UserId,
    rest: Arc<dyn Rest>,
    desktop: Arc<dyn DesktopNotifier>,
}

impl Task {
    fn snapshot(&self) -> InboxSnapshot {
        InboxSnapshot {
            load: self.load.clone(),
            connection: self.connection,
            unread: self.inbox.unread_count(),
            items: self.inbox.items().to_vec(),
        }
    }

    fn fetch_items(&self) -> Fetch<Vec<NotificationItem>> {
        let (rest, user) = (self.rest.clone(), self.user.clone());
        async move { rest.fetch_notifications(&user).await }.boxed()
    }

    fn fetch_unread(&self) -> Fetch<(u64, u64)> {
        let (rest, user) = (self.rest.clone(), self.user.clone());
        let generation = self.inbox.generation();
        async move {
            let count = rest.fetch_unread_count(&user).await?;
            Ok((count, generation))
        }
        .boxed()
    }

    fn on_push(&mut self, item: NotificationItem) {
        if let InboxChange::Added(item) = self.inbox.push(item) {
            if !item.read && self.desktop.permitted() {
                self.desktop.notify(&item);
            }
        }
    }

    async fn run(
        mut self,
        mut feed: NotificationFeed,
        mut connection: watch::Receiver<ConnectionState>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        snapshot: watch::Sender<InboxSnapshot>,
    ) {
        let mut items = Some(self.fetch_items());
        let mut unread = Some(self.fetch_unread());
        let mut connection_alive = true;
        self.connection = *connection.borrow();
        snapshot.send_replace(self.snapshot());
        loop {
            tokio::select! {
                biased;
                cmd = commands.recv() => match cmd {
                    None => break,
                    Some(Command::Read(id)) => {
                        self.inbox.mark_read(&id);
                    }
                    Some(Command::Unread(id)) => {
                        self.inbox.mark_unread(&id);
                    }
                    Some(Command::AllRead) => self.inbox.mark_all_read(),
                    Some(Command::Deleted(id)) => {
                        self.inbox.delete(&id);
                    }
                    Some(Command::Refresh) => {
                        self.load = LoadState::Loading;
                        self.inbox.rebase();
                        items = Some(self.fetch_items());
                        unread = Some(self.fetch_unread());
                    }
                },
                res = pending(&mut items) => {
                    items = None;
                    match res {
                        Ok(fetched) => {
                            self.inbox.hydrate_items(fetched);
                            self.load = LoadState::Ready;
                        }
                        Err(err) => {
                            tracing::warn!(?err, user = %self.user.0, "failed fetching notifications");
                            self.load = LoadState::Failed(err.user_message());
                        }
                    }
                }
                res = pending(&mut unread) => {
                    unread = None;
                    match res {
                        Ok((count, generation)) => {
                            if !self.inbox.hydrate_unread(count, generation) {
                                tracing::debug!(user = %self.user.0, count, "ignoring unread count requested before marking all read");
                            }
                        }
                        Err(err) => tracing::warn!(?err, user = %self.user.0, "failed fetching unread count"),
                    }
                }
                item = feed.next() => match item {
                    Some(item) => self.on_push(item),
                    None => break,
                },
                res = connection.changed(), if connection_alive => match res {
                    Ok(()) => self.connection = *connection.borrow(),
                    Err(_) => connection_alive = false,
                },
            }
            snapshot.send_replace(self.snapshot());
        }
    }
}

/// Live view of the current user's notifications and unread counter.
///
/// Actions are sent to the server first and only applied locally once it
/// confirmed them.
pub struct Inbox {
    user: UserId,
    rest: Arc<dyn Rest>,
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<InboxSnapshot>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Inbox {
    pub fn open(
        user: UserId,
        channel: &NotificationChannel,
        rest: Arc<dyn Rest>,
        desktop: Arc<dyn DesktopNotifier>,
    ) -> Inbox {
        let feed = channel.subscribe(&user);
        let task = Task {
            inbox: NotificationInbox::new(),
            load: LoadState::Loading,
            connection: ConnectionState::Disconnected,
            user: user.clone(),
            rest: rest.clone(),
            desktop,
        };
        let (snapshot_sender, snapshot) = watch::channel(task.snapshot());
        let (commands, command_receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(task.run(
            feed,
            channel.hub().state(),
            command_receiver,
            snapshot_sender,
        ));
        Inbox {
            user,
            rest,
            commands,
            snapshot,
            task: Some(task),
        }
    }

    pub fn snapshot(&self) -> InboxSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<InboxSnapshot> {
        self.snapshot.clone()
    }

    pub fn unread_count(&self) -> u64 {
        self.snapshot.borrow().unread
    }

    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    pub async fn mark_read(&self, id: &NotificationId) -> Result<(), Error> {
        self.check_open()?;
        self.rest.mark_read(id).await?;
        self.send(Command::Read(id.clone()));
        Ok(())
    }

    pub async fn mark_unread(&self, id: &NotificationId) -> Result<(), Error> {
        self.check_open()?;
        self.rest.mark_unread(id).await?;
        self.send(Command::Unread(id.clone()));
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), Error> {
        self.check_open()?;
        self.rest.mark_all_read(&self.user).await?;
        self.send(Command::AllRead);
        Ok(())
    }

    pub async fn delete(&self, id: &NotificationId) -> Result<(), Error> {
        self.check_open()?;
        self.rest.delete_notification(id).await?;
        self.send(Command::Deleted(id.clone()));
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(user = %self.user.0, "closed notification inbox");
        }
    }

    fn check_open(&self) -> Result<(), Error> {
        match self.task {
            Some(_) => Ok(()),
            None => Err(Error::ViewClosed),
        }
    }

    fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            tracing::debug!(user = %self.user.0, "inbox is gone, dropping local update");
        }
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        self.close();
    }
}
