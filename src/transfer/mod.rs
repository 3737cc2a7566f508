//! Export/import codec for manual device-to-device transfer
//!
//! Snapshots travel as UTF-8 JSON, optionally base64-armored for
//! clipboard transport. A member export is the bare snapshot; an admin
//! export wraps it in an envelope that also carries the identity list.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{now_millis, User, UserData};

/// Envelope metadata stamped on admin exports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMeta {
    pub kind: String,
    pub exported_at: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    meta: TransferMeta,
    identity_list: &'a [User],
    data: &'a UserData,
}

/// A decoded transfer payload
#[derive(Debug, Clone)]
pub struct DecodedTransfer {
    /// Present only in envelope-shaped payloads; the caller applies it
    /// only for admin identities
    pub identity_list: Option<Vec<User>>,
    pub data: UserData,
}

/// Serialize a snapshot for transfer. With an identity list this
/// produces the admin envelope, otherwise the bare snapshot.
pub fn encode(data: &UserData, identity_list: Option<&[User]>) -> Result<String, Error> {
    let text = match identity_list {
        Some(list) => serde_json::to_string(&Envelope {
            meta: TransferMeta {
                kind: "full_backup".to_string(),
                exported_at: now_millis(),
            },
            identity_list: list,
            data,
        })?,
        None => serde_json::to_string(data)?,
    };
    Ok(text)
}

/// Like [`encode`], wrapped base64 for clipboard-safe transport
pub fn encode_armored(data: &UserData, identity_list: Option<&[User]>) -> Result<String, Error> {
    Ok(STANDARD.encode(encode(data, identity_list)?))
}

/// Decode a transfer payload: direct JSON first, then the armored form.
/// Both failing is a decode error, distinct from any credential failure.
pub fn decode(text: &str) -> Result<DecodedTransfer, Error> {
    let value = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => value,
        Err(_) => {
            let bytes = STANDARD
                .decode(text.trim())
                .map_err(|e| Error::decode(format!("not JSON and not base64: {}", e)))?;
            let inner = String::from_utf8(bytes)
                .map_err(|e| Error::decode(format!("armored payload is not UTF-8: {}", e)))?;
            serde_json::from_str(&inner)
                .map_err(|e| Error::decode(format!("armored payload is not JSON: {}", e)))?
        }
    };
    parse_value(value)
}

fn parse_value(value: serde_json::Value) -> Result<DecodedTransfer, Error> {
    let identity_list = value
        .get("identityList")
        .and_then(|raw| serde_json::from_value::<Vec<User>>(raw.clone()).ok());

    if let Some(enveloped) = value.get("data") {
        let data = serde_json::from_value::<UserData>(enveloped.clone())
            .map_err(|e| Error::decode(format!("unreadable snapshot: {}", e)))?;
        return Ok(DecodedTransfer {
            identity_list,
            data,
        });
    }

    if value.get("transactions").map_or(false, |t| t.is_array()) {
        let data = serde_json::from_value::<UserData>(value)
            .map_err(|e| Error::decode(format!("unreadable snapshot: {}", e)))?;
        return Ok(DecodedTransfer {
            identity_list: None,
            data,
        });
    }

    Err(Error::decode("unrecognized payload shape"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::seed_users;
    use crate::model::{StockState, TransactionKind};
    use crate::session::SessionManager;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn sample_snapshot() -> UserData {
        let session = SessionManager::new(Arc::new(MemoryStore::default()));
        let user = seed_users().remove(1);
        session.activate(user.clone(), UserData::for_new_user(&user.username));
        session.update_stock(crate::model::SimType::Jawwy, 5, crate::model::StockAction::Add);
        session.add_transaction(TransactionKind::Jawwy, 30.0, 1);
        session.add_fuel_log(crate::model::FuelType::Octane91, 100.0, 5000.0);
        session.snapshot()
    }

    #[test]
    fn member_export_round_trips_without_identity_list() {
        let snapshot = sample_snapshot();
        let text = encode(&snapshot, None).unwrap();
        let decoded = decode(&text).unwrap();
        assert!(decoded.identity_list.is_none());
        assert_eq!(decoded.data, snapshot);
    }

    #[test]
    fn admin_export_round_trips_with_identity_list() {
        let snapshot = sample_snapshot();
        let list = seed_users();
        let text = encode(&snapshot, Some(&list)).unwrap();
        let decoded = decode(&text).unwrap();
        assert_eq!(decoded.identity_list.unwrap(), list);
        assert_eq!(decoded.data, snapshot);
    }

    #[test]
    fn armored_export_round_trips() {
        let snapshot = sample_snapshot();
        let armored = encode_armored(&snapshot, None).unwrap();
        // armored text is not raw JSON
        assert!(serde_json::from_str::<serde_json::Value>(&armored).is_err());
        let decoded = decode(&armored).unwrap();
        assert_eq!(decoded.data, snapshot);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode("definitely not a backup"), Err(Error::Decode(_))));
        assert!(matches!(decode("{\"status\":\"ok\"}"), Err(Error::Decode(_))));
    }

    #[test]
    fn decoded_snapshot_backfills_missing_settings() {
        let text = "{\"transactions\":[],\"stock\":{\"jawwy\":2}}";
        let decoded = decode(text).unwrap();
        assert_eq!(
            decoded.data.stock,
            StockState { jawwy: 2, sawa: 0, multi: 0 }
        );
        assert_eq!(decoded.data.settings, Default::default());
    }
}
