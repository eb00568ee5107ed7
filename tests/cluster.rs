//! Consensus behavior over in-process clusters: replication, liveness
//! under partial failure, value adoption, and the quorum boundary.

mod common;

use paxos_kv::{ClientResponse, PrepareReply};

use crate::common::{cluster, eventually, take_down};

#[tokio::test(start_paused = true)]
async fn put_replicates_to_every_replica() {
    let replicas = cluster(5);
    assert_eq!(replicas[0].put("k1", "v1").await, ClientResponse::Success);

    // The proposing replica applies before answering.
    assert_eq!(replicas[0].get("k1"), ClientResponse::Value("v1".to_string()));

    // The rest converge once the vote fan-out lands.
    let expect = ClientResponse::Value("v1".to_string());
    for replica in &replicas {
        eventually(replica, "k1", &expect).await;
    }
}

#[tokio::test(start_paused = true)]
async fn delete_removes_from_every_replica() {
    let replicas = cluster(5);
    assert_eq!(replicas[0].put("k1", "v1").await, ClientResponse::Success);
    assert_eq!(replicas[1].delete("k1").await, ClientResponse::Success);
    for replica in &replicas {
        eventually(replica, "k1", &ClientResponse::NotFound).await;
    }
}

#[tokio::test(start_paused = true)]
async fn missing_key_reports_not_found() {
    let replicas = cluster(3);
    assert_eq!(replicas[0].get("nope"), ClientResponse::NotFound);
}

#[tokio::test(start_paused = true)]
async fn get_all_lists_store_contents() {
    let replicas = cluster(3);
    replicas[0].put("b", "2").await;
    replicas[0].put("a", "1").await;
    assert_eq!(
        replicas[0].get_all(),
        ClientResponse::Listing(vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]),
    );
}

#[tokio::test(start_paused = true)]
async fn minority_unreachable_still_succeeds() {
    let replicas = cluster(5);
    take_down(&replicas, 3);
    take_down(&replicas, 4);
    assert_eq!(replicas[0].put("k1", "v1").await, ClientResponse::Success);
    assert_eq!(replicas[0].get("k1"), ClientResponse::Value("v1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn majority_unreachable_fails_without_applying() {
    let replicas = cluster(5);
    take_down(&replicas, 2);
    take_down(&replicas, 3);
    take_down(&replicas, 4);
    let response = replicas[0].put("k1", "v1").await;
    assert!(
        matches!(response, ClientResponse::Error(_)),
        "expected an error, got {:?}",
        response,
    );
    // Never a silent accept.
    assert_eq!(replicas[0].get("k1"), ClientResponse::NotFound);
}

#[tokio::test(start_paused = true)]
async fn single_replica_cluster_decides_alone() {
    let replicas = cluster(1);
    assert_eq!(replicas[0].put("k1", "v1").await, ClientResponse::Success);
    assert_eq!(replicas[0].get("k1"), ClientResponse::Value("v1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn three_replica_quorum_boundary() {
    // One of three down: two votes remain, quorum is two.
    let replicas = cluster(3);
    take_down(&replicas, 2);
    assert_eq!(replicas[0].put("k1", "v1").await, ClientResponse::Success);

    // Two of three down: only our own vote remains.
    let replicas = cluster(3);
    take_down(&replicas, 1);
    take_down(&replicas, 2);
    let response = replicas[0].put("k2", "v2").await;
    assert!(matches!(response, ClientResponse::Error(_)));
}

#[tokio::test(start_paused = true)]
async fn proposer_adopts_previously_accepted_value() {
    let replicas = cluster(5);

    // Three acceptors already accepted (2, "PUT k2 a") in some earlier,
    // partially completed round.
    for replica in &replicas[1..4] {
        replica.acceptor().accept(2, "PUT k2 a");
    }

    // A competing proposer must discover that value in its promises and
    // re-propose it instead of its own.
    assert_eq!(replicas[0].put("k2", "b").await, ClientResponse::Success);
    assert_eq!(replicas[0].get("k2"), ClientResponse::Value("a".to_string()));
}

#[tokio::test(start_paused = true)]
async fn concurrent_conflicting_proposals_both_terminate() {
    let replicas = cluster(5);
    let (first, second) = tokio::join!(
        replicas[0].put("k", "a"),
        replicas[1].put("k", "b"),
    );
    // Both rounds must terminate in a result, never a crash, and the key
    // must hold one of the two proposed values on the proposers.
    for response in [&first, &second] {
        assert!(
            matches!(response, ClientResponse::Success | ClientResponse::Error(_)),
            "unexpected response {:?}",
            response,
        );
    }
    for replica in &replicas[..2] {
        match replica.get("k") {
        | ClientResponse::Value(value) => assert!(value == "a" || value == "b"),
        | ClientResponse::NotFound => (),
        | response => panic!("unexpected read result {:?}", response),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn offline_acceptor_answers_prepare_with_timeout() {
    let replicas = cluster(3);
    replicas[1].acceptor().set_online(false);
    assert_eq!(replicas[1].prepare(1).await, PrepareReply::Timeout);
}

#[tokio::test(start_paused = true)]
async fn one_offline_acceptor_does_not_block_writes() {
    let replicas = cluster(3);
    replicas[1].acceptor().set_online(false);
    assert_eq!(replicas[0].put("k1", "v1").await, ClientResponse::Success);
}

#[tokio::test(start_paused = true)]
async fn duplicate_learn_deliveries_apply_once() {
    let replicas = cluster(3);
    let replica = &replicas[2];

    // Two votes meet the quorum of a three-member cluster; the decided
    // command is applied on the crossing vote.
    replica.learn(7, "PUT k v");
    replica.learn(7, "PUT k v");
    eventually(replica, "k", &ClientResponse::Value("v".to_string())).await;

    // Redundant deliveries leave the store untouched.
    replica.learn(7, "PUT k v");
    replica.learn(7, "PUT k v");
    assert_eq!(replica.get("k"), ClientResponse::Value("v".to_string()));
}
