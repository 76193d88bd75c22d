//! Console stand-ins for the platform notification and app-icon facilities.

use upwatch_engine::{IconSelector, Notification, Notifier, Status};

/// Light or dark variant of the alternate icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    Light,
    Dark,
}

impl Appearance {
    /// Auto-detect based on terminal background
    pub fn detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Appearance::Light,
            _ => Appearance::Dark,
        }
    }

    fn icon_prefix(&self) -> &'static str {
        match self {
            Appearance::Light => "icon_any",
            Appearance::Dark => "icon_dark",
        }
    }
}

/// Alternate icon for an overall status. `None` means the default icon.
pub fn icon_name(appearance: Appearance, overall: Option<Status>) -> Option<String> {
    let prefix = appearance.icon_prefix();
    match overall? {
        Status::Offline => Some(format!("{prefix}_error")),
        Status::Warning => Some(format!("{prefix}_warning")),
        Status::Online => None,
    }
}

/// Reports icon switches in the log.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleIcon {
    appearance: Appearance,
}

impl ConsoleIcon {
    pub fn new(appearance: Appearance) -> Self {
        Self { appearance }
    }
}

impl IconSelector for ConsoleIcon {
    fn select_icon(&self, overall: Option<Status>) {
        let name = icon_name(self.appearance, overall);
        tracing::info!(icon = name.as_deref().unwrap_or("default"), "app icon");
    }
}

/// Prints notifications to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        println!("{}", render(&notification));
    }
}

fn render(notification: &Notification) -> String {
    let tag = match notification {
        Notification::ServerOffline { .. } => Status::Offline.symbol(),
        Notification::StorageWarning { .. } => Status::Warning.symbol(),
        Notification::Test => "TEST",
    };
    format!("[{tag}] {}: {}", notification.title(), notification.body())
}

#[cfg(test)]
mod tests {
    use super::*;
    use upwatch_engine::EntityId;

    #[test]
    fn icon_names_follow_status() {
        assert_eq!(
            icon_name(Appearance::Light, Some(Status::Offline)).as_deref(),
            Some("icon_any_error")
        );
        assert_eq!(
            icon_name(Appearance::Dark, Some(Status::Warning)).as_deref(),
            Some("icon_dark_warning")
        );
        assert_eq!(icon_name(Appearance::Light, Some(Status::Online)), None);
    }

    #[test]
    fn disabled_dynamic_icon_uses_default() {
        assert_eq!(icon_name(Appearance::Dark, None), None);
    }

    #[test]
    fn render_tags_by_kind() {
        let offline = Notification::ServerOffline {
            server_id: EntityId::new(),
            name: "Web Server".into(),
        };
        assert!(render(&offline).starts_with("[DOWN] Web Server is offline"));
        assert!(render(&Notification::Test).starts_with("[TEST]"));
    }
}
