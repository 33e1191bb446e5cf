//! Transactions with nested proposals.

mod common;

use serde_json::Value;

use common::{instance, transfer, WIF};
use tusc_client::protocol::operations::PROPOSAL_CREATE_ID;

fn operations(json: &Value) -> &Vec<Value> {
    json["operations"].as_array().unwrap()
}

fn proposed_ops(op: &Value) -> &Vec<Value> {
    op[1]["proposed_ops"].as_array().unwrap()
}

#[tokio::test]
async fn test_add_one_proposal_one_op() {
    let instance = instance();
    let mut tx = instance.new_tx();
    let proposal = instance.new_proposal(&mut tx, "init0", None, None).unwrap();
    tx.proposal_mut(proposal).unwrap().append_op(transfer(1));

    let json = tx.json().await.unwrap();
    let ops = operations(&json);
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0][0], PROPOSAL_CREATE_ID);
    assert_eq!(ops[0][1]["fee_paying_account"], "1.2.100");
    assert_eq!(ops[0][1]["extensions"], serde_json::json!([]));
    assert!(ops[0][1].get("review_period_seconds").is_none());

    let proposed = proposed_ops(&ops[0]);
    assert_eq!(proposed.len(), 1);
    assert_eq!(proposed[0]["op"][0], 0);
    assert_eq!(proposed[0]["op"][1]["amount"]["amount"], 1);
}

#[tokio::test]
async fn test_add_one_proposal_two_ops() {
    let instance = instance();
    let mut tx = instance.new_tx();
    let proposal = instance.new_proposal(&mut tx, "init0", None, None).unwrap();
    tx.proposal_mut(proposal).unwrap().append_op(transfer(1));
    tx.proposal_mut(proposal).unwrap().append_op(transfer(1));

    let json = tx.json().await.unwrap();
    let ops = operations(&json);
    assert_eq!(ops.len(), 1);
    assert_eq!(proposed_ops(&ops[0]).len(), 2);
}

#[tokio::test]
async fn test_have_two_proposals() {
    let instance = instance();
    let mut tx = instance.new_tx();

    let first = instance.new_proposal(&mut tx, "init0", None, None).unwrap();
    for amount in 1..=3 {
        tx.proposal_mut(first).unwrap().append_op(transfer(amount));
    }
    let second = instance.new_proposal(&mut tx, "init1", None, Some(3600)).unwrap();
    for amount in 4..=5 {
        tx.proposal_mut(second).unwrap().append_op(transfer(amount));
    }

    let json = tx.json().await.unwrap();
    let ops = operations(&json);
    assert_eq!(ops.len(), 2);
    assert!(ops.iter().all(|op| op[0] == PROPOSAL_CREATE_ID));

    assert_eq!(ops[0][1]["fee_paying_account"], "1.2.100");
    let amounts: Vec<i64> = proposed_ops(&ops[0])
        .iter()
        .map(|p| p["op"][1]["amount"]["amount"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts, vec![1, 2, 3]);

    assert_eq!(ops[1][1]["fee_paying_account"], "1.2.101");
    assert_eq!(ops[1][1]["review_period_seconds"], 3600);
    assert_eq!(proposed_ops(&ops[1]).len(), 2);
}

#[tokio::test]
async fn test_proposal_then_sign_and_broadcast() {
    let (rpc, instance) = common::instance_with(Default::default());
    let mut tx = instance.new_tx();
    let proposal = instance.new_proposal(&mut tx, "init0", Some(600), None).unwrap();
    tx.proposal_mut(proposal).unwrap().append_ops(vec![transfer(1), transfer(2)]);
    tx.append_wif(WIF).unwrap();

    tx.broadcast().await.unwrap();

    let sent = rpc.broadcasts();
    assert_eq!(sent.len(), 1);
    assert_eq!(operations(&sent[0])[0][0], PROPOSAL_CREATE_ID);
    assert_eq!(sent[0]["signatures"].as_array().unwrap().len(), 1);
    assert!(tx.is_empty());
}
