//! Blocks and block headers, looked up by number.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{ChainResult, ObjectKind};
use crate::objects::{decode, fetch_and_store, load, Refreshable};
use crate::protocol::types::TimePointSec;

#[derive(Deserialize)]
struct HeaderFields {
    previous: String,
    timestamp: TimePointSec,
    witness: String,
    #[serde(default)]
    transaction_merkle_root: String,
}

#[derive(Deserialize)]
struct BlockFields {
    #[serde(flatten)]
    header: HeaderFields,
    #[serde(default)]
    transactions: Vec<Value>,
}

fn block_key(block_num: u64) -> String {
    format!("block:{}", block_num)
}

fn header_key(block_num: u64) -> String {
    format!("header:{}", block_num)
}

/// A full block including its transactions.
#[derive(Debug, Clone)]
pub struct Block {
    block_num: u64,
    previous: String,
    timestamp: TimePointSec,
    witness: String,
    transactions: Vec<Value>,
    data: Value,
    instance: BlockchainInstance,
}

impl Block {
    pub async fn new(block_num: u64, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;
        let key = block_key(block_num);
        let data = load(&instance, &key, ObjectKind::Block, || {
            instance.rpc().get_block(block_num)
        })
        .await?;
        Self::from_value(block_num, data, instance)
    }

    fn from_value(block_num: u64, data: Value, instance: BlockchainInstance) -> ChainResult<Self> {
        let fields: BlockFields = decode(&data, ObjectKind::Block)?;
        Ok(Self {
            block_num,
            previous: fields.header.previous,
            timestamp: fields.header.timestamp,
            witness: fields.header.witness,
            transactions: fields.transactions,
            data,
            instance,
        })
    }

    pub fn block_num(&self) -> u64 {
        self.block_num
    }

    /// Id of the preceding block.
    pub fn previous(&self) -> &str {
        &self.previous
    }

    /// Block timestamp.
    pub fn time(&self) -> TimePointSec {
        self.timestamp
    }

    /// Id of the producing witness.
    pub fn witness(&self) -> &str {
        &self.witness
    }

    pub fn transactions(&self) -> &[Value] {
        &self.transactions
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

#[async_trait]
impl Refreshable for Block {
    async fn refresh(&mut self) -> ChainResult<()> {
        let block_num = self.block_num;
        let key = block_key(block_num);
        let instance = self.instance.clone();
        let data = fetch_and_store(&instance, &key, ObjectKind::Block, || {
            instance.rpc().get_block(block_num)
        })
        .await?;
        *self = Self::from_value(block_num, data, instance)?;
        Ok(())
    }
}

/// A block header without transactions.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    block_num: u64,
    previous: String,
    timestamp: TimePointSec,
    witness: String,
    transaction_merkle_root: String,
    data: Value,
    instance: BlockchainInstance,
}

impl BlockHeader {
    pub async fn new(block_num: u64, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;
        let key = header_key(block_num);
        let data = load(&instance, &key, ObjectKind::Block, || {
            instance.rpc().get_block_header(block_num)
        })
        .await?;
        Self::from_value(block_num, data, instance)
    }

    fn from_value(block_num: u64, data: Value, instance: BlockchainInstance) -> ChainResult<Self> {
        let fields: HeaderFields = decode(&data, ObjectKind::Block)?;
        Ok(Self {
            block_num,
            previous: fields.previous,
            timestamp: fields.timestamp,
            witness: fields.witness,
            transaction_merkle_root: fields.transaction_merkle_root,
            data,
            instance,
        })
    }

    pub fn block_num(&self) -> u64 {
        self.block_num
    }

    pub fn previous(&self) -> &str {
        &self.previous
    }

    pub fn time(&self) -> TimePointSec {
        self.timestamp
    }

    pub fn witness(&self) -> &str {
        &self.witness
    }

    pub fn transaction_merkle_root(&self) -> &str {
        &self.transaction_merkle_root
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

#[async_trait]
impl Refreshable for BlockHeader {
    async fn refresh(&mut self) -> ChainResult<()> {
        let block_num = self.block_num;
        let key = header_key(block_num);
        let instance = self.instance.clone();
        let data = fetch_and_store(&instance, &key, ObjectKind::Block, || {
            instance.rpc().get_block_header(block_num)
        })
        .await?;
        *self = Self::from_value(block_num, data, instance)?;
        Ok(())
    }
}
