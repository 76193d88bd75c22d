//! External collaborators the monitor drives but does not own.
//!
//! Notification delivery and app-icon switching belong to the platform
//! layer. The monitor hands them computed results and never waits on them.

use upwatch_types::{EntityId, Status};

/// A message for the notification facility.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A server went down and has `notify_on_offline` set.
    ServerOffline { server_id: EntityId, name: String },

    /// A server volume crossed its storage warning threshold.
    StorageWarning {
        server_id: EntityId,
        name: String,
        volume: String,
        usage_percent: f64,
        threshold: f64,
    },

    /// Manual check that delivery works.
    Test,
}

impl Notification {
    pub fn title(&self) -> String {
        match self {
            Notification::ServerOffline { name, .. } => format!("{name} is offline"),
            Notification::StorageWarning { name, .. } => format!("{name} storage warning"),
            Notification::Test => "Test Notification".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::ServerOffline { name, .. } => {
                format!("{name} stopped responding. Its services and VMs are unreachable.")
            }
            Notification::StorageWarning {
                volume,
                usage_percent,
                threshold,
                ..
            } => format!(
                "Volume {volume} is {usage_percent:.0}% full (threshold {threshold:.0}%)."
            ),
            Notification::Test => {
                "Background notifications are working! Test completed successfully.".to_string()
            }
        }
    }
}

/// Notification delivery facility.
///
/// `notify` is fire-and-forget: implementations must not block the caller.
pub trait Notifier: Send + Sync {
    /// Ask for permission to deliver notifications. Called once when the
    /// monitor is built; a `false` answer disables delivery for its lifetime.
    fn request_permission(&self) -> bool {
        true
    }

    fn notify(&self, notification: Notification);
}

/// App-icon selection facility keyed by overall status.
pub trait IconSelector: Send + Sync {
    /// `None` asks for the default icon.
    fn select_icon(&self, overall: Option<Status>);
}

/// Notifier that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        tracing::info!(title = %notification.title(), "{}", notification.body());
    }
}

/// Icon selector that only records the requested status in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingIconSelector;

impl IconSelector for TracingIconSelector {
    fn select_icon(&self, overall: Option<Status>) {
        match overall {
            Some(status) => tracing::debug!(%status, "icon selection"),
            None => tracing::debug!("icon selection: default"),
        }
    }
}
