use crate::api::NotificationItem;

/// Native, out-of-app notifications
pub trait DesktopNotifier: Send + Sync + 'static {
    /// Whether the user allowed desktop notifications
    fn permitted(&self) -> bool {
        true
    }

    fn notify(&self, item: &NotificationItem);
}

pub struct NoDesktop;

impl DesktopNotifier for NoDesktop {
    fn permitted(&self) -> bool {
        false
    }

    fn notify(&self, _item: &NotificationItem) {}
}

/// Reports notifications on the log, for headless clients
pub struct LogDesktop;

impl DesktopNotifier for LogDesktop {
    fn notify(&self, item: &NotificationItem) {
        tracing::info!(
            id = %item.id.0,
            kind = ?item.kind,
            title = %item.title,
            "{}",
            item.message
        );
    }
}
