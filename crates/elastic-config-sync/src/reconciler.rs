//! Generic reconciler
//!
//! One algorithm for every kind: diff desired names against the names applied
//! by earlier attempts, delete what is no longer desired, then apply
//! everything that is. Any error aborts the attempt and is written to status;
//! the next periodic attempt starts over.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use elastic_config_common::crd::{SyncPhase, SyncStatus};
use elastic_config_common::{parse_sync_interval, Error, DEFAULT_SYNC_INTERVAL};
use elastic_config_connection::{ClusterConnection, ConnectionRegistry};

use crate::adapter::{adapter_for, KindAdapter};
use crate::record::{EventKind, SyncRecord};
use crate::status::{self, StatusStore};

/// What the caller should do after handling an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Attempt finished (successfully or not); handle the record again after this delay
    Requeue(Duration),
    /// Remote cleanup for a deleted record is complete; it may be finalized
    Finalize,
}

/// Drives records towards their desired state on the target cluster
pub struct Reconciler {
    registry: Arc<ConnectionRegistry>,
}

impl Reconciler {
    /// Create a reconciler sharing `registry` with other reconcilers
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Connection registry in use
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Handle one record notification.
    ///
    /// Sync failures are reported through status, not returned. Errors are
    /// only returned when status itself could not be persisted.
    #[instrument(skip_all, fields(kind = %record.kind, record = %record, event = %event))]
    pub async fn handle(
        &self,
        record: &SyncRecord,
        event: EventKind,
        store: &dyn StatusStore,
    ) -> Result<Outcome, Error> {
        match event {
            EventKind::Deleted => {
                let retry = parse_sync_interval(record.sync_interval.as_deref())
                    .unwrap_or(DEFAULT_SYNC_INTERVAL);
                if record.status.phase == SyncPhase::Error {
                    if let Some(wait) = record.resync_due_in(retry, Utc::now()) {
                        debug!(?wait, "cleanup failed recently, waiting before retry");
                        return Ok(Outcome::Requeue(wait));
                    }
                }
                match self.remove(record).await {
                    Ok(()) => Ok(Outcome::Finalize),
                    Err(e) => {
                        warn!(error = %e, "cleanup failed, deletion will be retried");
                        store
                            .update(&record.namespace, &record.name, &status::failed(record, &e))
                            .await?;
                        Ok(Outcome::Requeue(retry))
                    }
                }
            }
            EventKind::Created | EventKind::Modified => {
                let interval = match parse_sync_interval(record.sync_interval.as_deref()) {
                    Ok(interval) => interval,
                    Err(e) => {
                        if let Some(wait) = record.resync_due_in(DEFAULT_SYNC_INTERVAL, Utc::now()) {
                            return Ok(Outcome::Requeue(wait));
                        }
                        warn!(error = %e, "invalid sync interval");
                        store
                            .update(&record.namespace, &record.name, &status::failed(record, &e))
                            .await?;
                        return Ok(Outcome::Requeue(DEFAULT_SYNC_INTERVAL));
                    }
                };
                if let Some(wait) = record.resync_due_in(interval, Utc::now()) {
                    debug!(?wait, "last attempt covered this generation, next resync pending");
                    return Ok(Outcome::Requeue(wait));
                }
                self.sync(record, store).await?;
                Ok(Outcome::Requeue(interval))
            }
        }
    }

    /// Run one sync attempt and persist its outcome.
    ///
    /// Returns the status that was written.
    pub async fn sync(
        &self,
        record: &SyncRecord,
        store: &dyn StatusStore,
    ) -> Result<SyncStatus, Error> {
        store
            .update(&record.namespace, &record.name, &status::syncing(record))
            .await?;

        let status = match self.attempt(record).await {
            Ok(applied) => {
                info!(applied = applied.len(), "sync complete");
                status::ready(record, applied)
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "sync failed");
                status::failed(record, &e)
            }
        };

        store
            .update(&record.namespace, &record.name, &status)
            .await?;
        Ok(status)
    }

    /// Delete everything the record put on the cluster.
    ///
    /// Stops at the first failure; the caller must not finalize the record
    /// unless this returns `Ok`.
    pub async fn remove(&self, record: &SyncRecord) -> Result<(), Error> {
        let connection = self
            .registry
            .get_or_create(&record.selector, &record.namespace)
            .await?;
        let adapter = adapter_for(record.kind);

        let units = adapter.deletion_units(&record.desired, record.last_applied());
        debug!(names = ?units, "deleting");
        if let Err(e) = adapter.delete_all(&connection, &units).await {
            self.evict_on(&e, &connection);
            return Err(e);
        }

        info!("cleanup complete");
        Ok(())
    }

    async fn attempt(&self, record: &SyncRecord) -> Result<Vec<String>, Error> {
        let connection = self
            .registry
            .get_or_create(&record.selector, &record.namespace)
            .await?;
        let adapter = adapter_for(record.kind);

        let result = apply_desired(adapter.as_ref(), &connection, record).await;
        if let Err(e) = &result {
            self.evict_on(e, &connection);
        }
        result
    }

    fn evict_on(&self, error: &Error, connection: &ClusterConnection) {
        if error.evicts_connection() {
            warn!(cluster = %connection.key(), error = %error, "dropping cached connection");
            self.registry.delete(connection.key());
        }
    }
}

/// Removals first, then applies. Returns the names to record as applied.
async fn apply_desired(
    adapter: &dyn KindAdapter,
    connection: &ClusterConnection,
    record: &SyncRecord,
) -> Result<Vec<String>, Error> {
    let applied = adapter.applied_names(&record.desired)?;
    let removals = adapter.removals(&record.desired, record.last_applied())?;

    if !removals.is_empty() {
        debug!(names = ?removals, "removing");
        adapter.delete_all(connection, &removals).await?;
    }

    for (name, body) in &record.desired {
        debug!(name = %name, "applying");
        adapter.apply(connection, name, body).await?;
    }

    Ok(applied)
}
