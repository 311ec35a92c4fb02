//! Status persistence seam and the status values written per phase

use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;

use elastic_config_common::crd::{
    Condition, ConditionStatus, SyncPhase, SyncStatus, CONDITION_RESOURCE_SYNCED,
    REASON_TARGET_SYNCED,
};
use elastic_config_common::Error;

use crate::record::SyncRecord;

/// Condition reason set after a failed attempt
pub const REASON_SYNC_FAILED: &str = "SyncFailed";

/// Persists a record's status
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Replace the status of record `namespace/name`
    async fn update(&self, namespace: &str, name: &str, status: &SyncStatus) -> Result<(), Error>;
}

/// Status while an attempt is running; previously applied names are kept
pub fn syncing(record: &SyncRecord) -> SyncStatus {
    SyncStatus {
        target_cluster: Some(record.target_cluster()),
        ..record.status.clone()
    }
    .phase(SyncPhase::Syncing)
    .message(format!(
        "Syncing {} {}",
        record.desired.len(),
        record.kind.noun()
    ))
}

/// Status after a fully successful attempt
pub fn ready(record: &SyncRecord, applied: Vec<String>) -> SyncStatus {
    let message = format!("Successfully synced {} {}", applied.len(), record.kind.noun());
    SyncStatus {
        target_cluster: Some(record.target_cluster()),
        applied_resources: applied,
        last_sync_time: Some(Utc::now()),
        observed_generation: record.generation,
        ..record.status.clone()
    }
    .phase(SyncPhase::Ready)
    .message(message.clone())
    .condition(Condition::new(
        CONDITION_RESOURCE_SYNCED,
        ConditionStatus::True,
        REASON_TARGET_SYNCED,
        message,
    ))
}

/// Status after a failed attempt; applied names stay as they were
pub fn failed(record: &SyncRecord, error: &Error) -> SyncStatus {
    SyncStatus {
        target_cluster: Some(record.target_cluster()),
        observed_generation: record.generation,
        ..record.status.clone()
    }
    .phase(SyncPhase::Error)
    .message(error.to_string())
    .condition(Condition::new(
        CONDITION_RESOURCE_SYNCED,
        ConditionStatus::False,
        REASON_SYNC_FAILED,
        format!("{}: {}", error.reason(), error),
    ))
}
