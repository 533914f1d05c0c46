use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::availability::{BlockedDate, Commitment, ResourceAvailabilityWindow, ResourceKind};
use crate::error::StoreError;

/// Read side of the booking database as the engine sees it
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Every weekly availability row of one pool
    async fn availability_windows(&self, kind: ResourceKind) -> Result<Vec<ResourceAvailabilityWindow>, StoreError>;

    /// Blocked dates of one pool within `from..=to`
    async fn blocked_dates(
        &self,
        kind: ResourceKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BlockedDate>, StoreError>;

    /// Active commitments of one pool anchored within `[from, to)`
    async fn commitments(
        &self,
        kind: ResourceKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Commitment>, StoreError>;
}

/// Process-local store used by the CLI, the web front end and tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    windows: RwLock<Vec<ResourceAvailabilityWindow>>,
    blocked_dates: RwLock<Vec<BlockedDate>>,
    commitments: RwLock<Vec<Commitment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(
        windows: Vec<ResourceAvailabilityWindow>,
        blocked_dates: Vec<BlockedDate>,
        commitments: Vec<Commitment>,
    ) -> Self {
        Self {
            windows: RwLock::new(windows),
            blocked_dates: RwLock::new(blocked_dates),
            commitments: RwLock::new(commitments),
        }
    }

    pub async fn replace_windows(&self, rows: Vec<ResourceAvailabilityWindow>) {
        *self.windows.write().await = rows;
    }

    pub async fn replace_blocked_dates(&self, rows: Vec<BlockedDate>) {
        *self.blocked_dates.write().await = rows;
    }

    pub async fn replace_commitments(&self, rows: Vec<Commitment>) {
        *self.commitments.write().await = rows;
    }

    pub async fn add_commitment(&self, commitment: Commitment) {
        self.commitments.write().await.push(commitment);
    }

    pub async fn add_blocked_date(&self, blocked: BlockedDate) {
        self.blocked_dates.write().await.push(blocked);
    }

    /// Hard delete; returns how many rows went away
    pub async fn remove_blocked_date(&self, resource_id: &str, date: NaiveDate) -> usize {
        let mut rows = self.blocked_dates.write().await;
        let before = rows.len();
        rows.retain(|b| !(b.resource_id == resource_id && b.date == date));
        before - rows.len()
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryStore {
    async fn availability_windows(&self, kind: ResourceKind) -> Result<Vec<ResourceAvailabilityWindow>, StoreError> {
        Ok(self
            .windows
            .read()
            .await
            .iter()
            .filter(|w| w.resource_kind == kind)
            .cloned()
            .collect())
    }

    async fn blocked_dates(
        &self,
        kind: ResourceKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BlockedDate>, StoreError> {
        Ok(self
            .blocked_dates
            .read()
            .await
            .iter()
            .filter(|b| b.resource_kind == kind && b.date >= from && b.date <= to)
            .cloned()
            .collect())
    }

    async fn commitments(
        &self,
        kind: ResourceKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Commitment>, StoreError> {
        Ok(self
            .commitments
            .read()
            .await
            .iter()
            .filter(|c| c.resource_kind() == kind && c.status.is_active() && c.time >= from && c.time < to)
            .cloned()
            .collect())
    }
}
