use serde::{Deserialize, Serialize};

/// Temporal status of an election. Always derived, never stored.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowState {
    /// Active and within its voting window.
    Ongoing,
    /// Active and not yet started.
    Upcoming,
    /// Past its end time, whatever the active flag says.
    Finished,
    /// Deactivated and not yet finished.
    Inactive,
}
