//! Workers (`1.14.x`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{type_ids, ChainResult, ObjectId, ObjectKind};
use crate::objects::{decode, load_by_id, refresh_by_id, Refreshable};
use crate::protocol::types::{int_or_string, TimePointSec};

#[derive(Deserialize)]
struct WorkerFields {
    id: ObjectId,
    worker_account: ObjectId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(deserialize_with = "int_or_string")]
    daily_pay: i64,
    work_begin_date: TimePointSec,
    work_end_date: TimePointSec,
}

#[derive(Debug, Clone)]
pub struct Worker {
    id: ObjectId,
    worker_account: ObjectId,
    name: String,
    url: String,
    daily_pay: i64,
    work_begin_date: TimePointSec,
    work_end_date: TimePointSec,
    data: Value,
    instance: BlockchainInstance,
}

impl Worker {
    pub async fn new(id: &str, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;
        let data = load_by_id(&instance, id, type_ids::WORKER, ObjectKind::Worker).await?;
        Self::from_value(data, instance)
    }

    fn from_value(data: Value, instance: BlockchainInstance) -> ChainResult<Self> {
        let fields: WorkerFields = decode(&data, ObjectKind::Worker)?;
        Ok(Self {
            id: fields.id,
            worker_account: fields.worker_account,
            name: fields.name,
            url: fields.url,
            daily_pay: fields.daily_pay,
            work_begin_date: fields.work_begin_date,
            work_end_date: fields.work_end_date,
            data,
            instance,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn worker_account(&self) -> ObjectId {
        self.worker_account
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Daily pay in core asset minimal units.
    pub fn daily_pay(&self) -> i64 {
        self.daily_pay
    }

    pub fn work_begin_date(&self) -> TimePointSec {
        self.work_begin_date
    }

    pub fn work_end_date(&self) -> TimePointSec {
        self.work_end_date
    }

    /// True if `at` falls inside the work period.
    pub fn is_active_at(&self, at: TimePointSec) -> bool {
        self.work_begin_date <= at && at < self.work_end_date
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Worker-{} {}>", self.id, self.name)
    }
}

#[async_trait]
impl Refreshable for Worker {
    async fn refresh(&mut self) -> ChainResult<()> {
        let data = refresh_by_id(&self.instance, &self.id.to_string(), ObjectKind::Worker).await?;
        *self = Self::from_value(data, self.instance.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryRpc;
    use crate::blockchain::types::ChainError;
    use crate::config::ClientConfig;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_worker() {
        let rpc = Arc::new(MemoryRpc::default());
        rpc.add_object(json!({
            "id": "1.14.3",
            "worker_account": "1.2.20",
            "name": "refund",
            "daily_pay": "5000000",
            "work_begin_date": "2015-10-13T00:00:00",
            "work_end_date": "2030-01-01T00:00:00",
        }))
        .unwrap();
        let instance = BlockchainInstance::new(ClientConfig::default(), rpc);

        let worker = Worker::new("1.14.3", Some(&instance)).await.unwrap();
        assert_eq!(worker.daily_pay(), 5_000_000);
        assert!(worker.is_active_at("2020-01-01T00:00:00".parse().unwrap()));
        assert!(!worker.is_active_at("2031-01-01T00:00:00".parse().unwrap()));

        let err = Worker::new("1.14.4", Some(&instance)).await.unwrap_err();
        assert!(matches!(err, ChainError::NotFound { kind: ObjectKind::Worker, .. }));
        assert!(Worker::new("1.2.20", Some(&instance)).await.is_err());
    }
}
