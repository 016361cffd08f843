use async_trait::async_trait;
use thiserror::Error;

use crate::visitor::{LeadRecord, VisitorRecord};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Document persistence for visitors and leads. Listings are newest first.
#[async_trait]
pub trait Store {
    async fn insert_visitor(&self, visitor: VisitorRecord) -> Result<(), StoreError>;
    async fn list_visitors(&self) -> Result<Vec<VisitorRecord>, StoreError>;

    async fn insert_lead(&self, lead: LeadRecord) -> Result<(), StoreError>;
    async fn list_leads(&self) -> Result<Vec<LeadRecord>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
