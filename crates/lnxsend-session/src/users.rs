//! Contact and account cache
//!
//! Accounts are cached by id for the lifetime of a login session. The
//! contact set ("swaggers") is replaced wholesale on every resync; former
//! contacts stay behind as tombstones so transaction history keeps
//! resolving names after a relationship ends.

use std::collections::{HashMap, HashSet};

use lnxsend_core::domain::ids::{DeviceId, UserId};
use lnxsend_core::domain::user::User;

/// What one wholesale contact replacement changed
#[derive(Debug, Default)]
pub(crate) struct SwaggerDiff {
    pub added: Vec<User>,
    pub removed: Vec<UserId>,
}

#[derive(Default)]
pub(crate) struct UserCache {
    users: HashMap<UserId, User>,
    swaggers: HashSet<UserId>,
    avatars: HashMap<UserId, Vec<u8>>,
}

impl UserCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    /// Caches one account, preserving any presence already known for it
    pub fn insert(&mut self, user: User) {
        match self.users.get_mut(&user.id) {
            Some(existing) => {
                let presence = std::mem::take(&mut existing.online_devices);
                *existing = user;
                existing.online_devices = presence;
            }
            None => {
                self.users.insert(user.id, user);
            }
        }
    }

    /// Current contacts, tombstones excluded
    pub fn contacts(&self) -> Vec<User> {
        self.swaggers
            .iter()
            .filter_map(|id| self.users.get(id))
            .filter(|user| !user.deleted)
            .cloned()
            .collect()
    }

    pub fn is_swagger(&self, id: UserId) -> bool {
        self.swaggers.contains(&id)
    }

    /// Replaces the contact set with the server's copy
    ///
    /// Contacts no longer present are tombstoned, not dropped; a returning
    /// contact has its tombstone lifted.
    pub fn apply_swaggers(&mut self, swaggers: Vec<User>) -> SwaggerDiff {
        let mut diff = SwaggerDiff::default();
        let incoming: HashSet<UserId> = swaggers.iter().map(|user| user.id).collect();

        for gone in self.swaggers.difference(&incoming) {
            if let Some(user) = self.users.get_mut(gone) {
                user.deleted = true;
            }
            diff.removed.push(*gone);
        }

        for mut user in swaggers {
            user.deleted = false;
            if !self.swaggers.contains(&user.id) {
                diff.added.push(user.clone());
            }
            self.insert(user);
        }
        self.swaggers = incoming;
        diff
    }

    /// Adds one contact; returns false if the relationship already existed
    pub fn add_swagger(&mut self, mut user: User) -> bool {
        user.deleted = false;
        let added = self.swaggers.insert(user.id);
        self.insert(user);
        added
    }

    /// Tombstones one contact; returns false if it was not a contact
    pub fn remove_swagger(&mut self, id: UserId) -> bool {
        let removed = self.swaggers.remove(&id);
        if removed {
            if let Some(user) = self.users.get_mut(&id) {
                user.deleted = true;
            }
        }
        removed
    }

    /// Applies one device presence change
    ///
    /// Returns the new aggregate presence, or `None` for an account this
    /// cache has never seen.
    pub fn set_presence(&mut self, id: UserId, device: DeviceId, online: bool) -> Option<bool> {
        self.users
            .get_mut(&id)
            .map(|user| user.set_device_presence(device, online))
    }

    pub fn avatar(&self, id: UserId) -> Option<&[u8]> {
        self.avatars.get(&id).map(Vec::as_slice)
    }

    pub fn has_avatar(&self, id: UserId) -> bool {
        self.avatars.contains_key(&id)
    }

    pub fn store_avatar(&mut self, id: UserId, bytes: Vec<u8>) {
        self.avatars.insert(id, bytes);
    }

    pub fn clear(&mut self) {
        self.users.clear();
        self.swaggers.clear();
        self.avatars.clear();
    }
}
