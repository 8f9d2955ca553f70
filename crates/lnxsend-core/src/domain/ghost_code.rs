//! Ghost-code types

use serde::{Deserialize, Serialize};

/// An invitation code received out of band
///
/// Queued until a session is logged in, persisted across restarts, and
/// consumed at most once against the account service (an AlreadyUsed
/// answer also counts as consumed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostCode {
    pub code: String,
    /// Whether the code arrived through a share link rather than an email
    pub was_link: bool,
}

impl GhostCode {
    pub fn new(code: impl Into<String>, was_link: bool) -> Self {
        Self {
            code: code.into(),
            was_link,
        }
    }
}
