use std::path::Path;

/// Fire-and-forget completion notification. Errors are returned to the
/// caller, which logs and moves on; delivery problems never affect the
/// outcome of the run.
pub trait NotificationSink: Send {
    fn notify(&self, title: &str, body: &str, icon: Option<&Path>) -> anyhow::Result<()>;
}

/// Desktop notification through the platform notification service.
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for DesktopNotifier {
    fn notify(&self, title: &str, body: &str, icon: Option<&Path>) -> anyhow::Result<()> {
        let mut notification = notify_rust::Notification::new();
        notification.summary(title).body(body);
        if let Some(icon) = icon {
            notification.icon(&icon.to_string_lossy());
        }
        notification.show()?;
        Ok(())
    }
}
