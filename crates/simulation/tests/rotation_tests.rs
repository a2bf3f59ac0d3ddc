//! Committee rotation tests.
//!
//! Committee A controls the chain first, then the ledger hands it to
//! committee B. Nodes 2 and 3 sit in both committees.

use anchorlog_simulation::{NetworkConfig, SimulationConfig, SimulationRunner};
use anchorlog_types::test_utils::test_address;
use anchorlog_types::{CommitteeId, KeyShare, NodeId};
use std::time::Duration;
use tracing_test::traced_test;

const A: u8 = 1;
const B: u8 = 2;

fn committee(seed: u8) -> CommitteeId {
    CommitteeId::from_address(&test_address(seed))
}

/// Six nodes: A = {0, 1, 2, 3}, B = {2, 3, 4, 5}.
fn rotating_runner(seed: u64) -> SimulationRunner {
    let config = SimulationConfig {
        network: NetworkConfig {
            num_nodes: 6,
            latency: Duration::from_millis(20),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut runner = SimulationRunner::new(config, seed);
    runner.register_committee(KeyShare::new(
        test_address(A),
        (0..4).map(NodeId).collect(),
    ));
    runner.register_committee(KeyShare::new(
        test_address(B),
        (2..6).map(NodeId).collect(),
    ));
    runner.start(test_address(A));
    runner
}

#[traced_test]
#[test]
fn test_rotation_hands_chain_to_new_committee() {
    let mut runner = rotating_runner(42);
    runner.run_until(Duration::from_secs(2));
    let before = runner.ledger().history().len();
    assert!(before > 3);

    runner.schedule_rotation(Duration::from_millis(10), test_address(B));
    runner.run_until(Duration::from_secs(6));

    let history = runner.ledger().history();
    let rotation = history
        .iter()
        .position(|a| a.committee_id() == committee(B))
        .expect("rotation anchor on ledger");
    assert!(rotation >= before);
    assert!(
        history[rotation..].iter().all(|a| a.committee_id() == committee(B)),
        "committee A must not extend the chain after the rotation"
    );
    assert!(
        history.len() > rotation + 5,
        "committee B should advance the chain"
    );
    assert_eq!(runner.stats().rotations, 1);
}

#[traced_test]
#[test]
fn test_only_new_committee_is_active_after_rotation() {
    let mut runner = rotating_runner(7);
    runner.run_until(Duration::from_secs(2));
    runner.schedule_rotation(Duration::ZERO, test_address(B));
    runner.run_until(Duration::from_secs(4));

    // Left the chain: A members outside B.
    for node in [0, 1] {
        let manager = runner.node(node).unwrap();
        assert_eq!(manager.active_committee(), None);
        assert!(manager.current_output().need_consensus.is_none());
        assert!(manager.cmt_log(&committee(A)).unwrap().is_suspended());
        assert!(manager.cmt_log(&committee(B)).is_none());
        assert_eq!(
            manager.current_output().latest_active_anchor,
            manager.current_output().latest_confirmed_anchor
        );
    }
    // Stayed: members of both.
    for node in [2, 3] {
        let manager = runner.node(node).unwrap();
        assert_eq!(manager.active_committee(), Some(committee(B)));
        assert!(manager.cmt_log(&committee(A)).unwrap().is_suspended());
        assert!(!manager.cmt_log(&committee(B)).unwrap().is_suspended());
    }
    // Joined: B members new to the chain.
    for node in [4, 5] {
        let manager = runner.node(node).unwrap();
        assert_eq!(manager.active_committee(), Some(committee(B)));
        assert!(manager.cmt_log(&committee(A)).is_none());
        assert!(manager.committees().eq([committee(B)].iter()));
    }

    // No node asks for rounds of two committees at once.
    for node in 0..6 {
        if let Some(nc) = &runner.node(node).unwrap().current_output().need_consensus {
            assert_eq!(nc.committee, committee(B));
        }
    }
}

#[traced_test]
#[test]
fn test_rotation_back_stalls_until_restart() {
    let mut runner = rotating_runner(3);
    runner.run_until(Duration::from_secs(2));
    runner.schedule_rotation(Duration::ZERO, test_address(B));
    runner.run_until(Duration::from_secs(4));
    runner.schedule_rotation(Duration::ZERO, test_address(A));
    runner.run_until(Duration::from_secs(6));

    // Suspension is terminal: A's old instances do not propose again.
    let stalled = runner.ledger().history().len();
    assert_eq!(
        runner.ledger().current().unwrap().committee_id(),
        committee(A)
    );
    for node in 0..4 {
        let manager = runner.node(node).unwrap();
        assert!(manager.cmt_log(&committee(A)).unwrap().is_suspended());
        assert!(manager.current_output().need_consensus.is_none());
    }
    runner.run_until(Duration::from_secs(7));
    assert_eq!(runner.ledger().history().len(), stalled);

    // Restarting A's members gives them fresh instances above their persisted rounds.
    for node in 0..4 {
        runner.restart_node(node);
    }
    runner.run_until(Duration::from_secs(11));

    let history = runner.ledger().history();
    assert!(history.len() > stalled + 3, "committee A should resume");
    assert!(history[stalled..]
        .iter()
        .all(|a| a.committee_id() == committee(A)));
    for node in [4, 5] {
        let manager = runner.node(node).unwrap();
        assert_eq!(manager.active_committee(), None);
        assert!(manager.cmt_log(&committee(B)).unwrap().is_suspended());
    }
}

#[traced_test]
#[test]
fn test_rotation_to_foreign_committee_suspends_everyone() {
    let mut runner = rotating_runner(5);
    runner.run_until(Duration::from_secs(2));
    runner.schedule_rotation(Duration::ZERO, test_address(9));
    runner.run_until(Duration::from_secs(4));

    let len = runner.ledger().history().len();
    for node in 0..6 {
        let manager = runner.node(node).unwrap();
        assert_eq!(manager.active_committee(), None);
        assert!(manager.current_output().need_consensus.is_none());
        assert!(manager.committees().all(|c| manager.cmt_log(c).unwrap().is_suspended()));
    }
    runner.run_until(Duration::from_secs(5));
    assert_eq!(runner.ledger().history().len(), len);
}
