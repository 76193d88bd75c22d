//! Health tiers shared by every monitored entity and the overall rollup.

use core::fmt;

/// Health tier for an entity or for the whole fleet.
///
/// Variants are ordered by severity, so `max()` over a set of statuses
/// yields the worst one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    #[default]
    Online,
    Warning,
    Offline,
}

impl Status {
    /// All tiers, least severe first.
    pub const ALL: [Status; 3] = [Status::Online, Status::Warning, Status::Offline];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Online => "Online",
            Status::Warning => "Warning",
            Status::Offline => "Offline",
        }
    }

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Status::Online => "OK",
            Status::Warning => "WARN",
            Status::Offline => "DOWN",
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Status::Offline)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
