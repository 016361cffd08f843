use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection, Database};
use tracing::info;

use crate::store::{Store, StoreError};
use crate::visitor::{LeadRecord, VisitorRecord};

pub const VISITORS_COLLECTION: &str = "visitors";
pub const LEADS_COLLECTION: &str = "leads";

#[derive(Clone)]
pub struct MongoStore {
    database: Database,
    visitors: Collection<VisitorRecord>,
    leads: Collection<LeadRecord>,
}

impl MongoStore {
    /// Uses the database named in the URI, or `fallback_database` if it names none.
    pub async fn connect(uri: &str, fallback_database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(fallback_database));
        info!(database = database.name(), "using mongodb database");

        Ok(Self::new(database))
    }

    pub fn new(database: Database) -> Self {
        Self {
            visitors: database.collection(VISITORS_COLLECTION),
            leads: database.collection(LEADS_COLLECTION),
            database,
        }
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn insert_visitor(&self, visitor: VisitorRecord) -> Result<(), StoreError> {
        self.visitors.insert_one(visitor).await?;
        Ok(())
    }

    async fn list_visitors(&self) -> Result<Vec<VisitorRecord>, StoreError> {
        // ObjectIds grow with insertion time
        let cursor = self.visitors.find(doc! {}).sort(doc! { "_id": -1 }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_lead(&self, lead: LeadRecord) -> Result<(), StoreError> {
        self.leads.insert_one(lead).await?;
        Ok(())
    }

    async fn list_leads(&self) -> Result<Vec<LeadRecord>, StoreError> {
        let cursor = self.leads.find(doc! {}).sort(doc! { "_id": -1 }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
