//! Data model for the Mandob engine
//!
//! All wire-facing types serialize as camelCase JSON and decode tolerantly:
//! missing fields are backfilled from defaults so older persisted shapes
//! keep loading after the schema grows a field.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// The three stock-backed SIM categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimType {
    Jawwy,
    Sawa,
    Multi,
}

impl fmt::Display for SimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SimType::Jawwy => "jawwy",
            SimType::Sawa => "sawa",
            SimType::Multi => "multi",
        };
        write!(f, "{}", label)
    }
}

/// Transaction category: a SIM sale, or one of the two non-stock kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Jawwy,
    Sawa,
    Multi,
    /// A sale attempt that did not complete
    UnresolvedAttempt,
    /// Commission for a device sale
    DeviceCommission,
}

impl TransactionKind {
    /// The SIM category this kind consumes stock from, if any
    pub fn sim(&self) -> Option<SimType> {
        match self {
            TransactionKind::Jawwy => Some(SimType::Jawwy),
            TransactionKind::Sawa => Some(SimType::Sawa),
            TransactionKind::Multi => Some(SimType::Multi),
            TransactionKind::UnresolvedAttempt | TransactionKind::DeviceCommission => None,
        }
    }
}

/// Identity role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

/// UI theme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Fuel grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FuelType {
    #[default]
    #[serde(rename = "91")]
    Octane91,
    #[serde(rename = "95")]
    Octane95,
    #[serde(rename = "diesel")]
    Diesel,
}

impl FuelType {
    /// Pump price per liter
    pub fn price_per_liter(&self) -> f64 {
        match self {
            FuelType::Octane91 => 2.18,
            FuelType::Octane95 => 2.33,
            FuelType::Diesel => 1.15,
        }
    }
}

/// Liters bought for an amount paid, rounded to two decimals.
/// Computed once at log creation and never recomputed if prices change.
pub fn liters_for(fuel_type: FuelType, amount_paid: f64) -> f64 {
    (amount_paid / fuel_type.price_per_liter() * 100.0).round() / 100.0
}

/// Inventory movement recorded in the stock audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAction {
    Add,
    ReturnToSupplier,
    MarkDamaged,
    RecoverFromDamaged,
    DiscardDamaged,
}

/// An identity record in the shared identity list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Plain shared secret. Hardened authentication is out of scope.
    pub secret: String,
    pub display_name: String,
    pub role: Role,
}

/// A single sale or commission entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Creation-time-ordered unique id
    pub id: i64,
    /// Creation time, unix milliseconds
    pub timestamp: i64,
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Per-category inventory counts. Negative values are representable;
/// callers pre-check with the session's stock checks before mutating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StockState {
    pub jawwy: i64,
    pub sawa: i64,
    pub multi: i64,
}

impl StockState {
    /// Count for one SIM category
    pub fn count(&self, sim: SimType) -> i64 {
        match sim {
            SimType::Jawwy => self.jawwy,
            SimType::Sawa => self.sawa,
            SimType::Multi => self.multi,
        }
    }

    /// Apply a signed delta to one SIM category
    pub fn adjust(&mut self, sim: SimType, delta: i64) {
        match sim {
            SimType::Jawwy => self.jawwy += delta,
            SimType::Sawa => self.sawa += delta,
            SimType::Multi => self.multi += delta,
        }
    }
}

/// Append-only audit record of an inventory movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLog {
    pub id: i64,
    pub timestamp: i64,
    pub sim_type: SimType,
    pub quantity: i64,
    pub action: StockAction,
}

/// A refueling entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelLog {
    pub id: i64,
    pub timestamp: i64,
    pub fuel_type: FuelType,
    pub amount_paid: f64,
    /// Derived at creation from the price table, never recomputed
    pub liters: f64,
    pub odometer_km: f64,
}

/// Commission tiers (short/medium/long wait) per SIM category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceConfig {
    pub jawwy: [f64; 3],
    pub sawa: [f64; 3],
    pub multi: [f64; 3],
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            jawwy: [30.0, 25.0, 20.0],
            sawa: [28.0, 24.0, 20.0],
            multi: [28.0, 24.0, 20.0],
        }
    }
}

impl PriceConfig {
    /// Tier triple for one SIM category
    pub fn tiers(&self, sim: SimType) -> [f64; 3] {
        match sim {
            SimType::Jawwy => self.jawwy,
            SimType::Sawa => self.sawa,
            SimType::Multi => self.multi,
        }
    }
}

/// Per-user preferences.
///
/// Decoding backfills any missing field from defaults, one nested level
/// deep, so snapshots persisted by older versions keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub display_name: String,
    pub weekly_target: f64,
    pub theme: Theme,
    pub preferred_fuel_type: FuelType,
    pub price_config: PriceConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_name: "المندوب".to_string(),
            weekly_target: 3000.0,
            theme: Theme::Light,
            preferred_fuel_type: FuelType::Octane91,
            price_config: PriceConfig::default(),
        }
    }
}

/// Partial settings update. Omitted fields keep their current value;
/// an omitted SIM category inside `price_config` keeps its tiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub display_name: Option<String>,
    pub weekly_target: Option<f64>,
    pub theme: Option<Theme>,
    pub preferred_fuel_type: Option<FuelType>,
    pub price_config: Option<PriceConfigPatch>,
}

/// Partial commission tier update, merged key-by-key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceConfigPatch {
    pub jawwy: Option<[f64; 3]>,
    pub sawa: Option<[f64; 3]>,
    pub multi: Option<[f64; 3]>,
}

impl SettingsPatch {
    /// Shallow-merge into existing settings
    pub fn apply(self, settings: &mut Settings) {
        if let Some(display_name) = self.display_name {
            settings.display_name = display_name;
        }
        if let Some(weekly_target) = self.weekly_target {
            settings.weekly_target = weekly_target;
        }
        if let Some(theme) = self.theme {
            settings.theme = theme;
        }
        if let Some(preferred) = self.preferred_fuel_type {
            settings.preferred_fuel_type = preferred;
        }
        if let Some(prices) = self.price_config {
            if let Some(jawwy) = prices.jawwy {
                settings.price_config.jawwy = jawwy;
            }
            if let Some(sawa) = prices.sawa {
                settings.price_config.sawa = sawa;
            }
            if let Some(multi) = prices.multi {
                settings.price_config.multi = multi;
            }
        }
    }
}

/// The full data snapshot for one identity. Fully isolated per user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserData {
    /// Newest first
    pub transactions: Vec<Transaction>,
    pub stock: StockState,
    pub damaged: StockState,
    /// Newest first, append-only
    pub stock_logs: Vec<StockLog>,
    /// Newest first
    pub fuel_logs: Vec<FuelLog>,
    pub settings: Settings,
    /// Unix milliseconds of the last successful remote push or pull
    pub last_sync: Option<i64>,
}

impl UserData {
    /// Default snapshot for a first login, named after the identity
    pub fn for_new_user(username: &str) -> Self {
        let mut data = Self::default();
        data.settings.display_name = username.to_string();
        data
    }
}

/// Partial remote snapshot. A field present here replaces the corresponding
/// local collection wholesale on merge (last-writer-wins at snapshot
/// granularity); an absent field leaves the local value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotPatch {
    pub transactions: Option<Vec<Transaction>>,
    pub stock: Option<StockState>,
    pub damaged: Option<StockState>,
    pub stock_logs: Option<Vec<StockLog>>,
    pub fuel_logs: Option<Vec<FuelLog>>,
    /// Decoded over defaults, so a partial remote settings object is
    /// already backfilled by the time it lands here
    pub settings: Option<Settings>,
    pub last_sync: Option<i64>,
}

impl SnapshotPatch {
    /// Merge into a snapshot, remote values winning per top-level field
    pub fn apply(self, data: &mut UserData) {
        if let Some(transactions) = self.transactions {
            data.transactions = transactions;
        }
        if let Some(stock) = self.stock {
            data.stock = stock;
        }
        if let Some(damaged) = self.damaged {
            data.damaged = damaged;
        }
        if let Some(stock_logs) = self.stock_logs {
            data.stock_logs = stock_logs;
        }
        if let Some(fuel_logs) = self.fuel_logs {
            data.fuel_logs = fuel_logs;
        }
        if let Some(settings) = self.settings {
            data.settings = settings;
        }
        if let Some(last_sync) = self.last_sync {
            data.last_sync = Some(last_sync);
        }
    }
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Current time as unix milliseconds
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as i64
}

/// Time-based id, strictly increasing even within one millisecond
pub(crate) fn next_id() -> i64 {
    let now = now_millis();
    let prev = LAST_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(if now > last { now } else { last + 1 })
        })
        .unwrap_or(now);
    if now > prev {
        now
    } else {
        prev + 1
    }
}
