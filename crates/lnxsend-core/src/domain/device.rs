//! Device types

use serde::{Deserialize, Serialize};

use super::ids::DeviceId;

/// One device of an account
///
/// Exactly one device is "self" (this process); the others are read-only
/// mirrors refreshed on every resync. Only the self device carries its
/// passport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    #[serde(default)]
    pub passport: Option<String>,
}

impl Device {
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            passport: None,
        }
    }

    pub fn with_passport(mut self, passport: impl Into<String>) -> Self {
        self.passport = Some(passport.into());
        self
    }
}
