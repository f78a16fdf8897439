//! Pending operation store for two-phase mutations
//!
//! A mutation is first proposed (capturing a backup of the subject's current
//! state and the new state to apply), then either executed or cancelled
//! within the validity window. Every access runs inside one critical
//! section and starts with an expiry sweep, so a record past its window is
//! never handed out even if nothing has swept it yet.

use crate::error::{McpError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Default validity window of a pending operation
pub const DEFAULT_OPERATION_TTL: Duration = Duration::from_secs(10 * 60);

/// Length of generated operation ids
const OPERATION_ID_LEN: usize = 8;

/// Attempts at drawing an unused id before giving up
const MAX_ID_ATTEMPTS: usize = 64;

/// Kind of pending operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Replace the files of an Apps Script project
    ScriptUpdate,
}

impl OperationKind {
    /// Stable name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::ScriptUpdate => "script_update",
        }
    }

    /// Token used for this kind in backup file names
    pub fn backup_tag(&self) -> &'static str {
        match self {
            OperationKind::ScriptUpdate => "script",
        }
    }

    /// Human-readable description of the operation
    pub fn description(&self) -> &'static str {
        match self {
            OperationKind::ScriptUpdate => "Apps Script content update",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed mutation awaiting execution or cancellation
#[derive(Debug, Clone)]
pub struct PendingOperation {
    /// Operation id handed to the client
    pub id: String,

    /// What kind of mutation this is
    pub kind: OperationKind,

    /// Remote resource being mutated
    pub subject_id: String,

    /// Subject state captured at proposal time
    pub backup: Value,

    /// State to apply at execution time
    pub proposed: Value,

    /// Creation instant, used for expiry
    pub created_at: Instant,

    /// Creation wall-clock time, for display only
    pub created_wall: DateTime<Utc>,
}

impl PendingOperation {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// Receipt returned when an operation is proposed
#[derive(Debug, Clone)]
pub struct Proposal {
    /// Operation id
    pub id: String,

    /// Wall-clock time after which the operation is gone
    pub expires_at: DateTime<Utc>,
}

/// In-memory store of pending operations
///
/// Records live only as long as the process; a restart drops every pending
/// operation.
pub struct PendingOperationStore {
    operations: Mutex<HashMap<String, PendingOperation>>,
    ttl: Duration,
}

impl PendingOperationStore {
    /// Create a store with the given validity window
    pub fn new(ttl: Duration) -> Self {
        Self {
            operations: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Validity window of stored operations
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Propose an operation, returning its id and expiry
    pub async fn propose(
        &self,
        kind: OperationKind,
        subject_id: impl Into<String>,
        backup: Value,
        proposed: Value,
    ) -> Result<Proposal> {
        self.propose_at(kind, subject_id, backup, proposed, Instant::now())
            .await
    }

    /// Propose an operation as of `now`
    pub async fn propose_at(
        &self,
        kind: OperationKind,
        subject_id: impl Into<String>,
        backup: Value,
        proposed: Value,
        now: Instant,
    ) -> Result<Proposal> {
        let mut operations = self.operations.lock().await;
        sweep_locked(&mut operations, now, self.ttl);

        let id = allocate_id(&operations)?;
        let created_wall = Utc::now();
        let expires_at = created_wall
            + chrono::Duration::from_std(self.ttl)
                .map_err(|e| McpError::Internal(format!("Invalid operation TTL: {}", e)))?;

        let operation = PendingOperation {
            id: id.clone(),
            kind,
            subject_id: subject_id.into(),
            backup,
            proposed,
            created_at: now,
            created_wall,
        };

        debug!(id = %id, kind = %kind, subject = %operation.subject_id, "Operation proposed");
        operations.insert(id.clone(), operation);

        Ok(Proposal { id, expires_at })
    }

    /// Consume an operation for execution
    ///
    /// Fails with NotFound when the id is unknown or its window has passed.
    /// On success the record is gone; the caller performs the mutation.
    pub async fn execute(&self, id: &str) -> Result<PendingOperation> {
        self.execute_at(id, Instant::now()).await
    }

    /// Consume an operation for execution as of `now`
    pub async fn execute_at(&self, id: &str, now: Instant) -> Result<PendingOperation> {
        let mut operations = self.operations.lock().await;
        sweep_locked(&mut operations, now, self.ttl);

        operations
            .remove(id)
            .ok_or_else(|| McpError::NotFound(format!("Operation {} not found or expired", id)))
    }

    /// Put back an operation taken by `execute` whose mutation never started
    ///
    /// The record keeps its original creation instant, so its window is not
    /// extended. A record already past its window is dropped instead.
    pub async fn requeue(&self, operation: PendingOperation) {
        self.requeue_at(operation, Instant::now()).await
    }

    /// Put back an operation as of `now`
    pub async fn requeue_at(&self, operation: PendingOperation, now: Instant) {
        let mut operations = self.operations.lock().await;
        sweep_locked(&mut operations, now, self.ttl);

        if operation.is_expired(now, self.ttl) {
            debug!(id = %operation.id, "Expired operation not requeued");
            return;
        }

        debug!(id = %operation.id, kind = %operation.kind, "Operation requeued");
        operations.entry(operation.id.clone()).or_insert(operation);
    }

    /// Drop an operation without executing it
    ///
    /// Returns whether a live record was removed.
    pub async fn cancel(&self, id: &str) -> bool {
        self.cancel_at(id, Instant::now()).await
    }

    /// Drop an operation as of `now`
    pub async fn cancel_at(&self, id: &str, now: Instant) -> bool {
        let mut operations = self.operations.lock().await;
        sweep_locked(&mut operations, now, self.ttl);

        operations.remove(id).is_some()
    }

    /// Remove every record older than `ttl` as of `now`
    ///
    /// Returns the number of records removed.
    pub async fn sweep(&self, now: Instant, ttl: Duration) -> usize {
        let mut operations = self.operations.lock().await;
        sweep_locked(&mut operations, now, ttl)
    }

    /// Number of records held, including expired-but-unswept ones
    pub async fn len(&self) -> usize {
        self.operations.lock().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.operations.lock().await.is_empty()
    }
}

impl Default for PendingOperationStore {
    fn default() -> Self {
        Self::new(DEFAULT_OPERATION_TTL)
    }
}

fn sweep_locked(
    operations: &mut HashMap<String, PendingOperation>,
    now: Instant,
    ttl: Duration,
) -> usize {
    let before = operations.len();
    operations.retain(|_, op| !op.is_expired(now, ttl));
    let removed = before - operations.len();

    if removed > 0 {
        debug!(removed, "Swept expired operations");
    }

    removed
}

fn allocate_id(operations: &HashMap<String, PendingOperation>) -> Result<String> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(OPERATION_ID_LEN)
            .collect();

        if !operations.contains_key(&id) {
            return Ok(id);
        }
    }

    Err(McpError::Internal(
        "Unable to allocate a unique operation id".to_string(),
    ))
}
