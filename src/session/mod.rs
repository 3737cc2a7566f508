//! Active session state and mutation operations
//!
//! Owns the in-memory snapshot for the single active identity. Every
//! mutation updates the snapshot and synchronously persists it to the
//! local store before returning; remote scheduling is the sync
//! coordinator's concern, not this module's.

use std::sync::{Arc, Mutex};

use log::warn;

use crate::config::data_key;
use crate::error::Error;
use crate::model::{
    liters_for, next_id, now_millis, FuelLog, FuelType, SettingsPatch, SimType, SnapshotPatch,
    StockAction, StockLog, Transaction, TransactionKind, User, UserData,
};
use crate::store::LocalStore;

struct SessionState {
    current: Option<User>,
    data: UserData,
    ready: bool,
}

/// Manager for the active identity and its isolated data snapshot
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn LocalStore>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(SessionState {
                current: None,
                data: UserData::default(),
                ready: false,
            })),
        }
    }

    /// Load a user's persisted snapshot, tolerating older shapes.
    /// First login for a username yields defaults named after it.
    pub fn load_or_default(&self, username: &str) -> UserData {
        match self.store.get(&data_key(username)) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("stored snapshot for {} unreadable: {}", username, e);
                UserData::default()
            }),
            None => UserData::for_new_user(username),
        }
    }

    /// Activate an identity with its snapshot
    pub fn activate(&self, user: User, data: UserData) {
        let mut state = self.state.lock().unwrap();
        state.current = Some(user);
        state.data = data;
        state.ready = true;
    }

    /// Drop the active identity and reset the snapshot
    pub fn deactivate(&self) {
        let mut state = self.state.lock().unwrap();
        state.current = None;
        state.data = UserData::default();
        state.ready = false;
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.lock().unwrap().current.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    /// Deep copy of the active snapshot
    pub fn snapshot(&self) -> UserData {
        self.state.lock().unwrap().data.clone()
    }

    pub fn last_sync(&self) -> Option<i64> {
        self.state.lock().unwrap().data.last_sync
    }

    /// Record a successful push or pull
    pub fn set_last_sync(&self, timestamp: i64) {
        self.mutate(|data| data.last_sync = Some(timestamp));
    }

    /// Re-persist the active snapshot immediately
    pub fn persist_now(&self) {
        let state = self.state.lock().unwrap();
        persist_locked(self.store.as_ref(), &state);
    }

    /// Pre-check for operations that consume good stock. The mutation
    /// operations themselves never clamp or refuse; negative stock is
    /// representable when callers skip this.
    pub fn check_stock(&self, sim: SimType, quantity: i64) -> Result<(), Error> {
        if self.state.lock().unwrap().data.stock.count(sim) < quantity {
            return Err(Error::InsufficientStock(sim));
        }
        Ok(())
    }

    /// Pre-check for operations that consume damaged stock
    pub fn check_damaged(&self, sim: SimType, quantity: i64) -> Result<(), Error> {
        if self.state.lock().unwrap().data.damaged.count(sim) < quantity {
            return Err(Error::InsufficientDamagedStock(sim));
        }
        Ok(())
    }

    /// Record a sale or commission, newest first. Stock-backed kinds
    /// decrement their category's good stock.
    pub fn add_transaction(&self, kind: TransactionKind, amount: f64, quantity: i64) -> Transaction {
        let tx = Transaction {
            id: next_id(),
            timestamp: now_millis(),
            kind,
            amount,
            quantity,
        };
        let created = tx.clone();
        self.mutate(move |data| {
            if let Some(sim) = kind.sim() {
                data.stock.adjust(sim, -quantity);
            }
            data.transactions.insert(0, tx);
        });
        created
    }

    /// Remove a transaction by id, restoring stock for stock-backed
    /// kinds. No-op when the id is unknown.
    pub fn remove_transaction(&self, id: i64) -> Option<Transaction> {
        self.mutate(|data| {
            let position = data.transactions.iter().position(|t| t.id == id)?;
            let tx = data.transactions.remove(position);
            if let Some(sim) = tx.kind.sim() {
                data.stock.adjust(sim, tx.quantity);
            }
            Some(tx)
        })
    }

    /// Apply an inventory movement and append its audit record
    pub fn update_stock(&self, sim: SimType, quantity: i64, action: StockAction) -> StockLog {
        let log = StockLog {
            id: next_id(),
            timestamp: now_millis(),
            sim_type: sim,
            quantity,
            action,
        };
        let created = log.clone();
        self.mutate(move |data| {
            match action {
                StockAction::Add => data.stock.adjust(sim, quantity),
                StockAction::ReturnToSupplier => data.stock.adjust(sim, -quantity),
                StockAction::MarkDamaged => {
                    data.stock.adjust(sim, -quantity);
                    data.damaged.adjust(sim, quantity);
                }
                StockAction::RecoverFromDamaged => {
                    data.stock.adjust(sim, quantity);
                    data.damaged.adjust(sim, -quantity);
                }
                StockAction::DiscardDamaged => data.damaged.adjust(sim, -quantity),
            }
            data.stock_logs.insert(0, log);
        });
        created
    }

    /// Record a refueling; liters derive from the price table at
    /// creation time
    pub fn add_fuel_log(&self, fuel_type: FuelType, amount_paid: f64, odometer_km: f64) -> FuelLog {
        let log = FuelLog {
            id: next_id(),
            timestamp: now_millis(),
            fuel_type,
            amount_paid,
            liters: liters_for(fuel_type, amount_paid),
            odometer_km,
        };
        let created = log.clone();
        self.mutate(move |data| data.fuel_logs.insert(0, log));
        created
    }

    /// Remove a fuel log by id. No-op when the id is unknown.
    pub fn remove_fuel_log(&self, id: i64) -> Option<FuelLog> {
        self.mutate(|data| {
            let position = data.fuel_logs.iter().position(|f| f.id == id)?;
            Some(data.fuel_logs.remove(position))
        })
    }

    /// Shallow-merge a settings update; nested price tiers merge
    /// key-by-key
    pub fn update_settings(&self, patch: SettingsPatch) {
        self.mutate(|data| patch.apply(&mut data.settings));
    }

    /// Merge a remote snapshot, remote winning per top-level collection
    pub fn apply_remote(&self, patch: SnapshotPatch) {
        self.mutate(|data| patch.apply(data));
    }

    /// Replace the snapshot wholesale (import path)
    pub fn replace_snapshot(&self, data: UserData) {
        self.mutate(|current| *current = data);
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut UserData) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        let result = f(&mut state.data);
        persist_locked(self.store.as_ref(), &state);
        result
    }
}

fn persist_locked(store: &dyn LocalStore, state: &SessionState) {
    if !state.ready {
        return;
    }
    let Some(user) = state.current.as_ref() else {
        return;
    };
    match serde_json::to_string(&state.data) {
        Ok(raw) => store.put(&data_key(&user.username), &raw),
        Err(e) => warn!("snapshot for {} not persisted: {}", user.username, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::seed_users;
    use crate::store::MemoryStore;

    fn active_session() -> SessionManager {
        let session = SessionManager::new(Arc::new(MemoryStore::default()));
        let user = seed_users().remove(1);
        let data = session.load_or_default(&user.username);
        session.activate(user, data);
        session
    }

    #[test]
    fn first_login_snapshot_is_named_after_the_username() {
        let session = SessionManager::new(Arc::new(MemoryStore::default()));
        let data = session.load_or_default("sara");
        assert_eq!(data.settings.display_name, "sara");
        assert_eq!(data.transactions.len(), 0);
        assert_eq!(data.stock, Default::default());
    }

    #[test]
    fn add_then_remove_transaction_round_trips_stock() {
        let session = active_session();
        session.update_stock(SimType::Jawwy, 5, StockAction::Add);

        let tx = session.add_transaction(TransactionKind::Jawwy, 30.0, 1);
        assert_eq!(session.snapshot().stock.jawwy, 4);
        assert_eq!(session.snapshot().transactions.len(), 1);

        session.remove_transaction(tx.id);
        assert_eq!(session.snapshot().stock.jawwy, 5);
        assert!(session.snapshot().transactions.is_empty());
    }

    #[test]
    fn non_stock_kinds_leave_stock_alone() {
        let session = active_session();
        session.add_transaction(TransactionKind::DeviceCommission, 50.0, 1);
        session.add_transaction(TransactionKind::UnresolvedAttempt, 0.0, 1);
        assert_eq!(session.snapshot().stock, Default::default());
        assert_eq!(session.snapshot().transactions.len(), 2);
    }

    #[test]
    fn transactions_are_newest_first() {
        let session = active_session();
        let first = session.add_transaction(TransactionKind::DeviceCommission, 1.0, 1);
        let second = session.add_transaction(TransactionKind::DeviceCommission, 2.0, 1);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.transactions[0].id, second.id);
        assert_eq!(snapshot.transactions[1].id, first.id);
        assert!(second.id > first.id);
    }

    #[test]
    fn stock_actions_apply_the_delta_table() {
        let session = active_session();
        session.update_stock(SimType::Sawa, 10, StockAction::Add);
        assert_eq!(session.snapshot().stock.sawa, 10);

        session.update_stock(SimType::Sawa, 3, StockAction::MarkDamaged);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.stock.sawa, 7);
        assert_eq!(snapshot.damaged.sawa, 3);

        session.update_stock(SimType::Sawa, 1, StockAction::RecoverFromDamaged);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.stock.sawa, 8);
        assert_eq!(snapshot.damaged.sawa, 2);

        session.update_stock(SimType::Sawa, 2, StockAction::DiscardDamaged);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.stock.sawa, 8);
        assert_eq!(snapshot.damaged.sawa, 0);

        session.update_stock(SimType::Sawa, 4, StockAction::ReturnToSupplier);
        assert_eq!(session.snapshot().stock.sawa, 4);

        assert_eq!(session.snapshot().stock_logs.len(), 5);
        // newest first: the last action leads the audit log
        assert_eq!(
            session.snapshot().stock_logs[0].action,
            StockAction::ReturnToSupplier
        );
    }

    #[test]
    fn mutations_do_not_enforce_the_stock_floor() {
        let session = active_session();
        session.add_transaction(TransactionKind::Multi, 28.0, 2);
        assert_eq!(session.snapshot().stock.multi, -2);
    }

    #[test]
    fn stock_pre_checks_flag_insufficient_quantities() {
        let session = active_session();
        session.update_stock(SimType::Jawwy, 2, StockAction::Add);
        assert!(session.check_stock(SimType::Jawwy, 2).is_ok());
        assert!(matches!(
            session.check_stock(SimType::Jawwy, 3),
            Err(Error::InsufficientStock(SimType::Jawwy))
        ));
        assert!(matches!(
            session.check_damaged(SimType::Jawwy, 1),
            Err(Error::InsufficientDamagedStock(SimType::Jawwy))
        ));
    }

    #[test]
    fn fuel_logs_derive_liters_once() {
        let session = active_session();
        let log = session.add_fuel_log(FuelType::Diesel, 23.0, 1200.0);
        assert_eq!(log.liters, 20.0);

        // a later price-table change would not retroactively apply;
        // the stored value is what was computed at creation
        let stored = session.snapshot().fuel_logs[0].clone();
        assert_eq!(stored.liters, 20.0);

        session.remove_fuel_log(log.id);
        assert!(session.snapshot().fuel_logs.is_empty());
    }

    #[test]
    fn every_mutation_persists_synchronously() {
        let store = Arc::new(MemoryStore::default());
        let session = SessionManager::new(store.clone());
        let user = seed_users().remove(1);
        let data = session.load_or_default(&user.username);
        session.activate(user.clone(), data);

        session.add_transaction(TransactionKind::DeviceCommission, 9.0, 1);

        let raw = store.get(&data_key(&user.username)).unwrap();
        let persisted: UserData = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.transactions.len(), 1);
    }

    #[test]
    fn remove_of_unknown_ids_is_a_no_op() {
        let session = active_session();
        assert!(session.remove_transaction(123).is_none());
        assert!(session.remove_fuel_log(123).is_none());
    }
}
