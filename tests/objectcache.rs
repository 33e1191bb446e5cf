//! Object cache expiry and sharing.

use serde_json::{json, Value};
use std::time::Duration;

use tusc_client::objects::ObjectCache;

#[tokio::test]
async fn test_entries_expire() {
    let cache = ObjectCache::new(1);
    cache.set("1.2.100", json!({"id": "1.2.100"}));
    assert!(cache.contains("1.2.100"));
    assert_eq!(cache.get("1.2.100", Value::Null)["id"], "1.2.100");

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(!cache.contains("1.2.100"));
    assert_eq!(cache.get("1.2.100", json!("gone")), json!("gone"));
}

#[tokio::test]
async fn test_zero_expiration_never_expires() {
    let cache = ObjectCache::new(0);
    cache.set("1.3.0", json!({"symbol": "TUSC"}));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.contains("1.3.0"));
}

#[test]
fn test_clones_share_entries() {
    let cache = ObjectCache::default();
    let other = cache.clone();
    other.set("1.2.7", json!({"name": "xeroc"}));
    assert_eq!(cache.len(), 1);

    cache.set_expiration(30);
    assert_eq!(other.default_expiration(), 30);
    assert_eq!(other.to_string(), "ObjectCacheInMemory(default_expiration=30)");

    cache.clear();
    assert!(other.is_empty());
}
