//! User and contact types

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ids::{DeviceId, UserId};

/// One account as reported by the account service
///
/// Cached by id; presence is tracked per device so a contact with two
/// devices online only goes offline when the last one disconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub fullname: String,
    pub handle: String,
    pub public_key: String,
    /// Not yet a registered account (invited by email or link)
    pub ghost: bool,
    /// Tombstone: kept so transaction history still resolves names
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub online_devices: BTreeSet<DeviceId>,
}

impl User {
    pub fn new(id: UserId, fullname: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id,
            fullname: fullname.into(),
            handle: handle.into(),
            public_key: String::new(),
            ghost: false,
            deleted: false,
            online_devices: BTreeSet::new(),
        }
    }

    pub fn online(&self) -> bool {
        !self.online_devices.is_empty()
    }

    /// Records one device going on- or offline; returns the new aggregate
    /// presence.
    pub fn set_device_presence(&mut self, device: DeviceId, online: bool) -> bool {
        if online {
            self.online_devices.insert(device);
        } else {
            self.online_devices.remove(&device);
        }
        self.online()
    }
}

/// A linked identity on another service (email alias, social account)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccount {
    pub kind: String,
    pub identifier: String,
}
