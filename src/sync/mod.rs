//! Sync coordination between the local snapshot and the remote store
//!
//! Two states are modeled: idle and syncing. Mutations mark the snapshot
//! dirty, which (re)starts a single coalescing debounce timer; when it
//! fires, the latest snapshot is pushed. Pulls merge the remote snapshot
//! with remote winning wholesale per top-level collection. Every network
//! failure is downgraded to a `false` result; local state is the source
//! of truth whenever the remote store is unreachable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::identity::IdentityRepository;
use crate::model::{now_millis, Role, User};
use crate::remote::{PushPayload, RemoteStore};
use crate::session::SessionManager;

/// Coordinator owning the debounce timer and the syncing flag
#[derive(Clone)]
pub struct SyncCoordinator {
    remote: Arc<dyn RemoteStore>,
    session: SessionManager,
    identities: IdentityRepository,
    syncing: Arc<AtomicBool>,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
    delay: Duration,
}

impl SyncCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        session: SessionManager,
        identities: IdentityRepository,
        delay: Duration,
    ) -> Self {
        Self {
            remote,
            session,
            identities,
            syncing: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(Mutex::new(None)),
            delay,
        }
    }

    /// Whether a push or pull is currently in flight
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Note that the snapshot changed: (re)start the debounce timer.
    /// Rapid repeated calls coalesce into one push of the latest state.
    pub fn mark_dirty(&self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("no async runtime available, skipping scheduled push");
                return;
            }
        };

        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let this = self.clone();
        let delay = self.delay;
        *pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("debounce elapsed, pushing snapshot");
            this.push().await;
        }));
    }

    /// Cancel any pending debounced push
    pub fn cancel_pending(&self) {
        if let Some(previous) = self.pending.lock().unwrap().take() {
            previous.abort();
        }
    }

    /// Push the latest snapshot now, bypassing the debounce
    pub async fn save_now(&self) -> bool {
        self.cancel_pending();
        self.session.persist_now();
        self.push().await
    }

    /// Upload the active snapshot. Returns false on failure or when no
    /// session is active; never corrupts local state.
    pub async fn push(&self) -> bool {
        let Some(user) = self.active_user() else {
            return false;
        };
        self.syncing.store(true, Ordering::SeqCst);
        let result = self.push_inner(&user).await;
        self.syncing.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("cloud upload failed: {}", e);
                false
            }
        }
    }

    async fn push_inner(&self, user: &User) -> Result<(), Error> {
        let now = now_millis();
        let mut data = self.session.snapshot();
        data.last_sync = Some(now);

        // the admin's record is the canonical home of the identity list
        let identity_list = (user.role == Role::Admin).then(|| self.identities.list());

        let payload = PushPayload {
            username: user.username.clone(),
            data,
            identity_list,
        };
        self.remote.put_snapshot(&payload).await?;
        self.session.set_last_sync(now);
        debug!("snapshot for {} uploaded", user.username);
        Ok(())
    }

    /// Download and merge the remote snapshot. Returns false on failure,
    /// when no session is active, or when the record holds no data yet.
    pub async fn pull(&self) -> bool {
        let Some(user) = self.active_user() else {
            return false;
        };
        self.syncing.store(true, Ordering::SeqCst);
        let result = self.pull_inner(&user).await;
        self.syncing.store(false, Ordering::SeqCst);
        match result {
            Ok(applied) => applied,
            Err(e) => {
                warn!("cloud download failed: {}", e);
                false
            }
        }
    }

    async fn pull_inner(&self, user: &User) -> Result<bool, Error> {
        let snapshot = self.remote.fetch_snapshot(&user.username).await?;

        // only an admin adopts the remote identity list, and wholesale
        if user.role == Role::Admin {
            if let Some(list) = snapshot.identity_list {
                info!("replacing local identity list from remote ({} entries)", list.len());
                self.identities.replace(&list);
            }
        }

        match snapshot.data {
            Some(patch) => {
                self.session.apply_remote(patch);
                debug!("snapshot for {} merged from remote", user.username);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn active_user(&self) -> Option<User> {
        if !self.session.is_ready() {
            return None;
        }
        self.session.current_user()
    }
}
