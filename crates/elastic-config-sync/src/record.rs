//! The reconciler's view of a declarative record

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kube::{Resource, ResourceExt};
use serde_json::Value;

use elastic_config_common::crd::{
    ConfigKind, ResourceSelector, SyncPhase, SyncResource, SyncStatus, CONDITION_RESOURCE_SYNCED,
};

/// What happened to a record since it was last seen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Never synced (no status yet)
    Created,
    /// Previously synced; spec change or periodic resync
    Modified,
    /// Marked for deletion
    Deleted,
}

impl EventKind {
    /// Classify a record from its metadata and status
    pub fn of<K: SyncResource>(resource: &K) -> Self {
        if resource.meta().deletion_timestamp.is_some() {
            EventKind::Deleted
        } else if resource.sync_status().is_none() {
            EventKind::Created
        } else {
            EventKind::Modified
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Snapshot of a record: what it wants and what it last applied
#[derive(Clone, Debug, PartialEq)]
pub struct SyncRecord {
    /// Configuration kind
    pub kind: ConfigKind,
    /// Record namespace
    pub namespace: String,
    /// Record name
    pub name: String,
    /// `metadata.generation`
    pub generation: Option<i64>,
    /// Target cluster
    pub selector: ResourceSelector,
    /// Raw resync interval
    pub sync_interval: Option<String>,
    /// Desired objects, name → body
    pub desired: BTreeMap<String, Value>,
    /// Status as last persisted
    pub status: SyncStatus,
}

impl SyncRecord {
    /// Copy the fields the reconciler needs out of a resource
    pub fn from_resource<K: SyncResource>(resource: &K) -> Self {
        Self {
            kind: K::CONFIG_KIND,
            namespace: resource.namespace().unwrap_or_default(),
            name: resource.name_any(),
            generation: resource.meta().generation,
            selector: resource.selector().clone(),
            sync_interval: resource.sync_interval().map(str::to_string),
            desired: resource.desired().clone(),
            status: resource.sync_status().cloned().unwrap_or_default(),
        }
    }

    /// Identifiers confirmed written by earlier attempts
    pub fn last_applied(&self) -> &[String] {
        &self.status.applied_resources
    }

    /// `namespace/name` of the target cluster
    pub fn target_cluster(&self) -> String {
        self.selector.target_cluster(&self.namespace)
    }

    /// Time left until the next attempt is due.
    ///
    /// `Some` only when the last completed attempt covered the current
    /// generation and finished less than `interval` ago. Notifications caused
    /// by our own status writes land here and are merged into the pending
    /// resync instead of starting another attempt.
    pub fn resync_due_in(&self, interval: Duration, now: DateTime<Utc>) -> Option<Duration> {
        if self.generation.is_none() || self.status.observed_generation != self.generation {
            return None;
        }
        if !matches!(self.status.phase, SyncPhase::Ready | SyncPhase::Error) {
            return None;
        }

        let finished = self
            .status
            .get_condition(CONDITION_RESOURCE_SYNCED)?
            .last_transition_time;
        let elapsed = (now - finished).to_std().ok()?;
        interval.checked_sub(elapsed).filter(|left| !left.is_zero())
    }
}

impl fmt::Display for SyncRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
