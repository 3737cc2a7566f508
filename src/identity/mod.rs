//! Identity list management and credential resolution
//!
//! All reads and writes of the shared identity list go through
//! [`IdentityRepository`]; there is no ambient shared state. Resolution
//! is two-tier: the local list first, then the remote copy piggy-backed
//! on the seeded admin's record (the canonical location of the list),
//! which is how a new device onboards an identity created elsewhere.

use std::sync::Arc;

use log::{info, warn};

use crate::config::USERS_KEY;
use crate::error::Error;
use crate::model::{next_id, Role, User};
use crate::remote::RemoteStore;
use crate::store::LocalStore;

/// Username of the seeded admin whose remote record carries the shared
/// identity list
pub const SEED_ADMIN_USERNAME: &str = "talal";

/// The two immutable seeded identities: one admin, one member
pub fn seed_users() -> Vec<User> {
    vec![
        User {
            id: 1,
            username: "talal".to_string(),
            secret: "00966".to_string(),
            display_name: "المدير طلال".to_string(),
            role: Role::Admin,
        },
        User {
            id: 2,
            username: "khaled".to_string(),
            secret: "2030".to_string(),
            display_name: "المندوب خالد".to_string(),
            role: Role::Member,
        },
    ]
}

const SEEDED_IDS: [i64; 2] = [1, 2];

/// Repository over the locally persisted identity list
#[derive(Clone)]
pub struct IdentityRepository {
    store: Arc<dyn LocalStore>,
}

impl IdentityRepository {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Load the identity list. Falls back to the seeded pair when the
    /// store is empty or unreadable; re-inserts any seeded user missing
    /// from a persisted list.
    pub fn list(&self) -> Vec<User> {
        let Some(raw) = self.store.get(USERS_KEY) else {
            return seed_users();
        };
        match serde_json::from_str::<Vec<User>>(&raw) {
            Ok(list) if !list.is_empty() => ensure_seeded(list),
            Ok(_) => seed_users(),
            Err(e) => {
                warn!("identity list unreadable, falling back to seeded users: {}", e);
                seed_users()
            }
        }
    }

    /// Persist the list
    pub fn save(&self, list: &[User]) {
        match serde_json::to_string(list) {
            Ok(raw) => self.store.put(USERS_KEY, &raw),
            Err(e) => warn!("identity list not persisted: {}", e),
        }
    }

    /// Replace the local list wholesale, e.g. after an admin pull
    pub fn replace(&self, list: &[User]) {
        self.save(list);
    }

    /// Case-insensitive username match with exact secret match
    pub fn find(&self, username: &str, secret: &str) -> Option<User> {
        find_in(&self.list(), username, secret)
    }

    /// Merge remote entries into the local list, de-duplicating by
    /// case-insensitive username with remote winning on conflict.
    /// Persists and returns the merged list.
    pub fn adopt_remote(&self, remote: Vec<User>) -> Vec<User> {
        let mut merged: Vec<User> = self
            .list()
            .into_iter()
            .filter(|local| {
                !remote
                    .iter()
                    .any(|r| r.username.to_lowercase() == local.username.to_lowercase())
            })
            .collect();
        merged.extend(remote);
        self.save(&merged);
        merged
    }

    /// Add an identity, rejecting duplicate usernames
    pub fn add(
        &self,
        username: &str,
        secret: &str,
        display_name: &str,
        role: Role,
    ) -> Result<User, Error> {
        let mut list = self.list();
        if list
            .iter()
            .any(|u| u.username.to_lowercase() == username.to_lowercase())
        {
            return Err(Error::DuplicateUsername(username.to_string()));
        }
        let user = User {
            id: next_id(),
            username: username.to_string(),
            secret: secret.to_string(),
            display_name: display_name.to_string(),
            role,
        };
        list.push(user.clone());
        self.save(&list);
        Ok(user)
    }

    /// Remove an identity by id. Seeded users are protected. Returns the
    /// removed user so the caller can drop its data snapshot.
    pub fn remove(&self, id: i64) -> Result<Option<User>, Error> {
        if SEEDED_IDS.contains(&id) {
            return Err(Error::ProtectedUser);
        }
        let mut list = self.list();
        let position = list.iter().position(|u| u.id == id);
        let removed = position.map(|i| list.remove(i));
        if removed.is_some() {
            self.save(&list);
        }
        Ok(removed)
    }

    /// Resolve credentials: local list first, then the remote identity
    /// list. A remote hit adopts the remote list locally as a side effect.
    /// Network failure is swallowed and resolution falls through to
    /// [`Error::IdentityNotFound`].
    pub async fn resolve(
        &self,
        username: &str,
        secret: &str,
        remote: &dyn RemoteStore,
    ) -> Result<User, Error> {
        if let Some(user) = self.find(username, secret) {
            return Ok(user);
        }

        info!("{} not found locally, checking remote identity list", username);
        match remote.fetch_snapshot(SEED_ADMIN_USERNAME).await {
            Ok(snapshot) => {
                if let Some(list) = snapshot.identity_list {
                    if let Some(user) = find_in(&list, username, secret) {
                        info!("{} found in remote identity list, adopting", username);
                        self.adopt_remote(list);
                        return Ok(user);
                    }
                }
            }
            Err(e) => warn!("remote identity lookup failed: {}", e),
        }

        Err(Error::IdentityNotFound)
    }
}

fn find_in(list: &[User], username: &str, secret: &str) -> Option<User> {
    list.iter()
        .find(|u| u.username.to_lowercase() == username.to_lowercase() && u.secret == secret)
        .cloned()
}

fn ensure_seeded(mut list: Vec<User>) -> Vec<User> {
    for seeded in seed_users() {
        let present = list
            .iter()
            .any(|u| u.username.to_lowercase() == seeded.username.to_lowercase());
        if !present {
            list.push(seeded);
        }
    }
    list
}
