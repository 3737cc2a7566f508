//! Wire types for the remote snapshot store

use serde::{Deserialize, Serialize};

use crate::model::{SnapshotPatch, User, UserData};

/// Upload payload: one user's full snapshot, plus the shared identity
/// list when the pushing identity is an admin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub username: String,
    pub data: UserData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_list: Option<Vec<User>>,
}

/// Download result: either part may be absent depending on what the
/// remote record holds
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    /// Present only on records that carry the shared identity list
    /// (canonically the seeded admin's record)
    pub identity_list: Option<Vec<User>>,
    /// The user's snapshot, absent when the record holds no data yet
    pub data: Option<SnapshotPatch>,
}
