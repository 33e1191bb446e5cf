//! Chain objects backed by the instance object cache.
//!
//! Every object is fetched eagerly at construction: a cache hit is served
//! directly, a miss goes to the node and the result is cached. Objects that
//! do not exist fail with `ChainError::NotFound` of their kind.

pub mod account;
pub mod asset;
pub mod block;
pub mod cache;
pub mod committee;
pub mod htlc;
pub mod vesting;
pub mod witness;
pub mod worker;

pub use account::{Account, Authority, Permission};
pub use asset::Asset;
pub use block::{Block, BlockHeader};
pub use cache::ObjectCache;
pub use committee::Committee;
pub use htlc::Htlc;
pub use vesting::Vesting;
pub use witness::Witness;
pub use worker::Worker;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{ChainError, ChainResult, ObjectId, ObjectKind};

/// Objects that can be re-read from the node, bypassing the cache.
#[async_trait]
pub trait Refreshable {
    /// Fetch the latest state and overwrite the cached copy.
    async fn refresh(&mut self) -> ChainResult<()>;
}

/// Serve `key` from the cache or fetch it.
///
/// On a fetch the object is cached under `key` and, if different, under its
/// own `id`. Derived keys look like `kind:identifier`.
pub(crate) async fn load<F, Fut>(
    instance: &BlockchainInstance,
    key: &str,
    kind: ObjectKind,
    fetch: F,
) -> ChainResult<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ChainResult<Option<Value>>>,
{
    if let Some(value) = instance.cache().get_fresh(key) {
        return Ok(value);
    }
    fetch_and_store(instance, key, kind, fetch).await
}

/// Fetch `key` from the node and overwrite the cache.
pub(crate) async fn fetch_and_store<F, Fut>(
    instance: &BlockchainInstance,
    key: &str,
    kind: ObjectKind,
    fetch: F,
) -> ChainResult<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ChainResult<Option<Value>>>,
{
    let value = fetch()
        .await?
        .ok_or_else(|| ChainError::not_found(kind, key.rsplit(':').next().unwrap_or(key)))?;

    if let Some(id) = value.get("id").and_then(Value::as_str) {
        if id != key {
            instance.cache().set(id, value.clone());
        }
    }
    instance.cache().set(key, value.clone());
    tracing::debug!(key, kind = %kind, "Object fetched");
    Ok(value)
}

/// Load a protocol object by id, requiring the given type.
pub(crate) async fn load_by_id(
    instance: &BlockchainInstance,
    id: &str,
    type_id: u8,
    kind: ObjectKind,
) -> ChainResult<Value> {
    ObjectId::parse_typed(id, type_id)?;
    load(instance, id, kind, || instance.rpc().get_object(id)).await
}

pub(crate) async fn refresh_by_id(
    instance: &BlockchainInstance,
    id: &str,
    kind: ObjectKind,
) -> ChainResult<Value> {
    fetch_and_store(instance, id, kind, || instance.rpc().get_object(id)).await
}

/// Decode the typed view of a raw object.
pub(crate) fn decode<T: DeserializeOwned>(value: &Value, kind: ObjectKind) -> ChainResult<T> {
    T::deserialize(value)
        .map_err(|e| ChainError::malformed(format!("unexpected {} object: {}", kind, e)))
}
