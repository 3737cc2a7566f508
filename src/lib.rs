//! Mandob core engine
//!
//! Local-first data and sync engine for a single-user field sales
//! tracker: transactions, SIM stock, and fuel logs live on-device and
//! synchronize opportunistically with a shared remote snapshot store so
//! one identity can roam across devices.
//!
//! Local persistence is authoritative. Every mutation writes through to
//! the local store synchronously and schedules a debounced remote push;
//! logging in (or resuming a remembered session) pulls the remote
//! snapshot and merges it, remote winning wholesale per collection.

pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod remote;
pub mod session;
pub mod stats;
pub mod store;
pub mod sync;
pub mod transfer;

use std::sync::Arc;

use crate::config::{ClientOptions, SESSION_KEY};
use crate::error::Error;
use crate::identity::IdentityRepository;
use crate::model::{
    FuelLog, FuelType, Role, SettingsPatch, SimType, StockAction, StockLog, Transaction,
    TransactionKind, User, UserData,
};
use crate::remote::{HttpRemoteStore, RemoteStore};
use crate::session::SessionManager;
use crate::store::{LocalStore, MemoryStore};
use crate::sync::SyncCoordinator;

/// The main entry point for the Mandob engine
///
/// # Example
///
/// ```no_run
/// use mandob_core::{Mandob, config::ClientOptions};
///
/// # async fn run() -> Result<(), mandob_core::error::Error> {
/// let options = ClientOptions::new("https://example.com/store")?;
/// let mandob = Mandob::new(options)?;
/// let user = mandob.login("khaled", "2030").await?;
/// println!("signed in as {}", user.display_name);
/// # Ok(())
/// # }
/// ```
pub struct Mandob {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    identities: IdentityRepository,
    session: SessionManager,
    sync: SyncCoordinator,
}

impl Mandob {
    /// Create a client backed by in-memory local storage
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        Self::with_store(options, Arc::new(MemoryStore::default()))
    }

    /// Create a client over a custom local store (e.g. [`store::FileStore`]
    /// for durable on-device persistence)
    pub fn with_store(options: ClientOptions, store: Arc<dyn LocalStore>) -> Result<Self, Error> {
        let remote = Arc::new(HttpRemoteStore::new(
            options.api_url.clone(),
            options.request_timeout,
        )?);
        Ok(Self::with_remote(options, store, remote))
    }

    /// Create a client over custom local and remote transports
    pub fn with_remote(
        options: ClientOptions,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        let identities = IdentityRepository::new(store.clone());
        let session = SessionManager::new(store.clone());
        let sync = SyncCoordinator::new(
            remote.clone(),
            session.clone(),
            identities.clone(),
            options.debounce,
        );
        Self {
            store,
            remote,
            identities,
            session,
            sync,
        }
    }

    // --- Identity & session ---

    /// Resolve credentials (locally, then remotely), activate the
    /// identity, remember the session, and pull the remote snapshot
    /// best-effort
    pub async fn login(&self, username: &str, secret: &str) -> Result<User, Error> {
        let user = self
            .identities
            .resolve(username, secret, self.remote.as_ref())
            .await?;
        let data = self.session.load_or_default(&user.username);
        self.session.activate(user.clone(), data);
        self.store.put(SESSION_KEY, &user.username);
        // ensure this device matches whatever was last pushed elsewhere
        self.sync.pull().await;
        Ok(user)
    }

    /// Reactivate a remembered session, if any, and pull best-effort
    pub async fn resume(&self) -> Option<User> {
        let username = self.store.get(SESSION_KEY)?;
        let user = self
            .identities
            .list()
            .into_iter()
            .find(|u| u.username == username)?;
        let data = self.session.load_or_default(&user.username);
        self.session.activate(user.clone(), data);
        self.sync.pull().await;
        Some(user)
    }

    /// Forget the remembered session and reset in-memory state.
    /// Local persisted data stays on-device.
    pub fn logout(&self) {
        self.sync.cancel_pending();
        self.store.remove(SESSION_KEY);
        self.session.deactivate();
    }

    /// The currently active identity
    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    /// All known identities
    pub fn users(&self) -> Vec<User> {
        self.identities.list()
    }

    /// Create an identity. Scheduled for upload so other devices can
    /// discover it at login.
    pub fn add_user(
        &self,
        username: &str,
        secret: &str,
        display_name: &str,
        role: Role,
    ) -> Result<User, Error> {
        let user = self.identities.add(username, secret, display_name, role)?;
        self.sync.mark_dirty();
        Ok(user)
    }

    /// Delete an identity and its local data snapshot. Seeded users are
    /// protected.
    pub fn delete_user(&self, id: i64) -> Result<(), Error> {
        if let Some(removed) = self.identities.remove(id)? {
            self.store.remove(&config::data_key(&removed.username));
            self.sync.mark_dirty();
        }
        Ok(())
    }

    // --- Data operations ---

    /// Deep copy of the active snapshot
    pub fn snapshot(&self) -> UserData {
        self.session.snapshot()
    }

    /// Record a sale or commission; stock-backed kinds consume stock.
    /// Callers check [`Self::check_stock`] first; the operation itself
    /// does not enforce the floor.
    pub fn add_transaction(
        &self,
        kind: TransactionKind,
        amount: f64,
        quantity: i64,
    ) -> Transaction {
        let tx = self.session.add_transaction(kind, amount, quantity);
        self.sync.mark_dirty();
        tx
    }

    /// Remove a transaction by id, restoring consumed stock
    pub fn remove_transaction(&self, id: i64) -> Option<Transaction> {
        let removed = self.session.remove_transaction(id);
        self.sync.mark_dirty();
        removed
    }

    /// Apply an inventory movement and append its audit record
    pub fn update_stock(&self, sim: SimType, quantity: i64, action: StockAction) -> StockLog {
        let log = self.session.update_stock(sim, quantity, action);
        self.sync.mark_dirty();
        log
    }

    /// Record a refueling
    pub fn add_fuel_log(&self, fuel_type: FuelType, amount_paid: f64, odometer_km: f64) -> FuelLog {
        let log = self.session.add_fuel_log(fuel_type, amount_paid, odometer_km);
        self.sync.mark_dirty();
        log
    }

    /// Remove a fuel log by id
    pub fn remove_fuel_log(&self, id: i64) -> Option<FuelLog> {
        let removed = self.session.remove_fuel_log(id);
        self.sync.mark_dirty();
        removed
    }

    /// Shallow-merge a settings update
    pub fn update_settings(&self, patch: SettingsPatch) {
        self.session.update_settings(patch);
        self.sync.mark_dirty();
    }

    /// Pre-check that enough good stock exists for a deduction
    pub fn check_stock(&self, sim: SimType, quantity: i64) -> Result<(), Error> {
        self.session.check_stock(sim, quantity)
    }

    /// Pre-check that enough damaged stock exists for a deduction
    pub fn check_damaged(&self, sim: SimType, quantity: i64) -> Result<(), Error> {
        self.session.check_damaged(sim, quantity)
    }

    // --- Sync ---

    /// Whether a push or pull is in flight
    pub fn is_syncing(&self) -> bool {
        self.sync.is_syncing()
    }

    /// Unix milliseconds of the last successful sync
    pub fn last_sync(&self) -> Option<i64> {
        self.session.last_sync()
    }

    /// Persist and push immediately, bypassing the debounce
    pub async fn save_now(&self) -> bool {
        self.sync.save_now().await
    }

    /// Push the active snapshot to the remote store
    pub async fn sync_to_cloud(&self) -> bool {
        self.sync.push().await
    }

    /// Pull and merge the remote snapshot
    pub async fn sync_from_cloud(&self) -> bool {
        self.sync.pull().await
    }

    // --- Transfer ---

    /// Export the active snapshot as transfer text. Admin exports also
    /// carry the identity list.
    pub fn export_data(&self) -> Result<String, Error> {
        let user = self.session.current_user().ok_or(Error::NotLoggedIn)?;
        let data = self.session.snapshot();
        match user.role {
            Role::Admin => transfer::encode(&data, Some(&self.identities.list())),
            Role::Member => transfer::encode(&data, None),
        }
    }

    /// Like [`Self::export_data`], base64-armored for clipboard transport
    pub fn export_data_armored(&self) -> Result<String, Error> {
        let user = self.session.current_user().ok_or(Error::NotLoggedIn)?;
        let data = self.session.snapshot();
        match user.role {
            Role::Admin => transfer::encode_armored(&data, Some(&self.identities.list())),
            Role::Member => transfer::encode_armored(&data, None),
        }
    }

    /// Import a transfer payload, replacing the active snapshot
    /// wholesale. A contained identity list is applied only when the
    /// importing identity is an admin.
    pub fn import_data(&self, text: &str) -> Result<(), Error> {
        let user = self.session.current_user().ok_or(Error::NotLoggedIn)?;
        let decoded = transfer::decode(text)?;
        if let Some(list) = decoded.identity_list {
            if user.role == Role::Admin {
                self.identities.replace(&list);
            }
        }
        self.session.replace_snapshot(decoded.data);
        self.sync.mark_dirty();
        Ok(())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::Mandob;
}
