use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::store::{Store, StoreError};
use crate::visitor::{LeadRecord, VisitorRecord};

/// In-process store for tests and local runs. Records are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    visitors: Arc<RwLock<Vec<VisitorRecord>>>,
    leads: Arc<RwLock<Vec<LeadRecord>>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails, to exercise error paths.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store disabled".to_string()));
        }
        Ok(())
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_visitor(&self, visitor: VisitorRecord) -> Result<(), StoreError> {
        self.check()?;
        debug!(ip = %visitor.ip, "storing visitor in memory");
        self.visitors
            .write()
            .map_err(|_| Self::poisoned())?
            .push(visitor);
        Ok(())
    }

    async fn list_visitors(&self) -> Result<Vec<VisitorRecord>, StoreError> {
        self.check()?;
        let visitors = self.visitors.read().map_err(|_| Self::poisoned())?;
        Ok(visitors.iter().rev().cloned().collect())
    }

    async fn insert_lead(&self, lead: LeadRecord) -> Result<(), StoreError> {
        self.check()?;
        self.leads.write().map_err(|_| Self::poisoned())?.push(lead);
        Ok(())
    }

    async fn list_leads(&self) -> Result<Vec<LeadRecord>, StoreError> {
        self.check()?;
        let leads = self.leads.read().map_err(|_| Self::poisoned())?;
        Ok(leads.iter().rev().cloned().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}
