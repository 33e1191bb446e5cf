//! Blocks and headers by number.

mod common;

use tusc_client::blockchain::{ChainError, ObjectKind};
use tusc_client::objects::{Block, BlockHeader};

#[tokio::test]
async fn test_block() {
    let instance = common::instance();
    let block = Block::new(1, Some(&instance)).await.unwrap();
    assert_eq!(block.previous(), "0000000000000000000000000000000000000000");
    assert_eq!(block.time().to_string(), "2015-10-13T14:12:24");
    assert_eq!(block.time().seconds(), 1_444_745_544);
    assert!(block.transactions().is_empty());
}

#[tokio::test]
async fn test_block_header() {
    let instance = common::instance();
    let header = BlockHeader::new(1, Some(&instance)).await.unwrap();
    assert_eq!(header.previous(), "0000000000000000000000000000000000000000");
    assert_eq!(header.time().seconds(), 1_444_745_544);
    assert_eq!(header.witness(), "1.6.8");
}

#[tokio::test]
async fn test_missing_block() {
    let instance = common::instance();
    let err = Block::new(99, Some(&instance)).await.unwrap_err();
    assert!(matches!(
        err,
        ChainError::NotFound { kind: ObjectKind::Block, .. }
    ));
}
