//! System notifications.
//!
//! Background modules post notifications through the [`Notifier`] trait so
//! that the desktop integration can be swapped out (tests record them, the
//! CLI daemon falls back to logging where no notification center exists).

use async_trait::async_trait;
use tracing::{debug, info};

/// A notification to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Stable identifier; posting again with the same id replaces the
    /// previous notification.
    pub id: String,
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl Notification {
    /// Creates a notification.
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Posts notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Posts `notification`. Failures are logged by the implementation.
    async fn notify(&self, notification: &Notification);
}

/// Posts notifications to the desktop notification center.
///
/// On macOS this goes through `osascript`; elsewhere it only logs.
/// `display notification` has no way to address an earlier notification, so
/// [`Notification::id`] is only logged here and a repeated id stacks a new
/// banner instead of replacing the old one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, notification: &Notification) {
        info!(id = %notification.id, title = %notification.title, "Posting notification");

        #[cfg(target_os = "macos")]
        {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                escape_applescript(&notification.body),
                escape_applescript(&notification.title),
            );
            match tokio::process::Command::new("osascript")
                .args(["-e", &script])
                .output()
                .await
            {
                Ok(output) if !output.status.success() => tracing::warn!(
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "osascript rejected notification"
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to run osascript"),
            }
        }

        debug!(body = %notification.body, "Notification sent");
    }
}

/// Escapes text for an AppleScript string literal.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ")
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) {
        info!(
            id = %notification.id,
            title = %notification.title,
            body = %notification.body,
            "Notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_applescript() {
        assert_eq!(
            escape_applescript("say \"hi\"\nnow \\o/"),
            "say \\\"hi\\\" now \\\\o/"
        );
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn test_desktop_notifier_completes_without_notification_center() {
        let notification = Notification::new("usage-alert-t1", "Work", "Today's usage $5.00");
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            DesktopNotifier.notify(&notification),
        )
        .await
        .unwrap();
    }
}
