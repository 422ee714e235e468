use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::{Client, Collection, Database, IndexModel};

use super::{
    DatabaseStats, RawMember, RawReplicaSet, Sentinel, StoreResult, StoreRoute,
    SENTINEL_COLLECTION,
};
use crate::error::MonitorError;

/// A MongoDB client bound to one read preference
#[derive(Clone)]
pub struct MongoRoute {
    client: Client,
    database: String,
    label: &'static str,
}

impl MongoRoute {
    pub fn new(client: Client, database: &str, label: &'static str) -> Self {
        Self {
            client,
            database: database.to_string(),
            label,
        }
    }

    fn db(&self) -> Database {
        self.client.database(&self.database)
    }

    fn sentinels(&self) -> Collection<Document> {
        self.db().collection(SENTINEL_COLLECTION)
    }

    /// Index the lookup field of the lag poll; creating it again is a no-op
    pub async fn ensure_sentinel_index(&self) -> StoreResult<()> {
        self.sentinels().create_index(sentinel_index(), None).await?;
        Ok(())
    }
}

fn sentinel_index() -> IndexModel {
    IndexModel::builder().keys(doc! { "test_id": 1 }).build()
}

/// Numeric fields come back as int32, int64 or double depending on the server
fn numeric(doc: &Document, key: &str) -> Option<f64> {
    match doc.get(key)? {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn parse_replica_set(status: &Document) -> StoreResult<RawReplicaSet> {
    let set_name = status
        .get_str("set")
        .map_err(|e| MonitorError::store(format!("replSetGetStatus without set name: {e}")))?
        .to_string();

    let members: Vec<RawMember> = status
        .get_array("members")
        .map(|members| {
            members
                .iter()
                .filter_map(Bson::as_document)
                .map(|m| RawMember {
                    name: m.get_str("name").unwrap_or("unknown").to_string(),
                    state: numeric(m, "state").map(|s| s as i32).unwrap_or(-1),
                    health: numeric(m, "health").unwrap_or(0.0),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RawReplicaSet { set_name, members })
}

#[async_trait]
impl StoreRoute for MongoRoute {
    async fn ping(&self) -> StoreResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    async fn replica_set_status(&self) -> StoreResult<RawReplicaSet> {
        let status = self
            .client
            .database("admin")
            .run_command(doc! { "replSetGetStatus": 1 }, None)
            .await?;
        parse_replica_set(&status)
    }

    async fn database_stats(&self) -> StoreResult<DatabaseStats> {
        let stats = self.db().run_command(doc! { "dbStats": 1 }, None).await?;
        tracing::trace!(route = self.label, "dbStats collected");

        Ok(DatabaseStats {
            data_size: numeric(&stats, "dataSize").unwrap_or(0.0),
            storage_size: numeric(&stats, "storageSize").unwrap_or(0.0),
            index_size: numeric(&stats, "indexSize").unwrap_or(0.0),
            collections: numeric(&stats, "collections").unwrap_or(0.0) as u64,
            objects: numeric(&stats, "objects").unwrap_or(0.0) as u64,
        })
    }

    async fn count_documents(&self, collection: &str) -> StoreResult<u64> {
        let count = self
            .db()
            .collection::<Document>(collection)
            .count_documents(doc! {}, None)
            .await?;
        Ok(count)
    }

    async fn insert_sentinel(&self, sentinel: &Sentinel) -> StoreResult<()> {
        let document = doc! {
            "test_id": sentinel.id.as_str(),
            "write_time": bson::DateTime::from_millis(sentinel.written_at.timestamp_millis()),
            "test_type": "replication_lag",
        };
        self.sentinels().insert_one(document, None).await?;
        Ok(())
    }

    async fn sentinel_exists(&self, sentinel_id: &str) -> StoreResult<bool> {
        let found = self
            .sentinels()
            .find_one(doc! { "test_id": sentinel_id }, None)
            .await?;
        Ok(found.is_some())
    }

    async fn delete_sentinel(&self, sentinel_id: &str) -> StoreResult<()> {
        self.sentinels()
            .delete_one(doc! { "test_id": sentinel_id }, None)
            .await?;
        Ok(())
    }

    async fn purge_sentinels(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = self
            .sentinels()
            .delete_many(
                doc! { "write_time": { "$lt": bson::DateTime::from_millis(cutoff.timestamp_millis()) } },
                None,
            )
            .await?;
        Ok(result.deleted_count)
    }
}
