//! Storage collaborator for processed documents.
//!
//! The pipeline treats persistence as an external concern behind the
//! [`DocumentStore`] trait: an insert keyed by the caller's identity and a
//! newest-first listing. Production deployments back this with a managed
//! service; when no identity is available the processor falls back to a
//! [`SessionStore`], an ephemeral in-memory list with the same shape that
//! is not expected to survive the session.
//!
//! Store failures never fail an extraction — the processor logs them at
//! `warn` and returns the document anyway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::document::DocumentMetadata;
use crate::error::StoreError;

/// One persisted document row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    /// Caller identity, absent for session-scoped records.
    pub identity: Option<String>,
    pub file_name: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub created_at: DateTime<Utc>,
}

/// Insert/list contract the extraction stage persists through.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist one document record.
    async fn insert(&self, record: StoredDocument) -> Result<(), StoreError>;

    /// Previously stored documents for an identity, newest first.
    async fn list(&self, identity: Option<&str>) -> Result<Vec<StoredDocument>, StoreError>;
}

/// Ephemeral, session-scoped store. Used when no identity is available and
/// as the test double.
#[derive(Default)]
pub struct SessionStore {
    records: Mutex<Vec<StoredDocument>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.lock().expect("session store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for SessionStore {
    async fn insert(&self, record: StoredDocument) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("session store poisoned".into()))?
            .push(record);
        Ok(())
    }

    async fn list(&self, identity: Option<&str>) -> Result<Vec<StoredDocument>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("session store poisoned".into()))?;
        let mut matching: Vec<StoredDocument> = records
            .iter()
            .filter(|r| r.identity.as_deref() == identity)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}

/// Build a session-scoped record id. Identity-keyed stores generate their
/// own ids server-side; only the fallback needs one locally.
pub(crate) fn session_id(now: DateTime<Utc>) -> String {
    format!("temp-{}", now.timestamp_millis())
}
