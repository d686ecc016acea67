//! Property tests for the task execution round decision

use agentbft_consensus::*;
use agentbft_state::consensus_threshold;
use proptest::prelude::*;
use serde_json::json;

fn agents(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("agent_{:02}", i)).collect()
}

fn fresh_round(n: usize) -> TaskExecutionRound {
    TaskExecutionRound::new(SynchronizedData::with_participants(agents(n))).unwrap()
}

fn ok(sender: &str) -> TaskExecutionPayload {
    let envelope = TaskResultEnvelope::new("req", format!("result-{}", sender));
    TaskExecutionPayload::from_envelope(sender, &envelope).unwrap()
}

proptest! {
    #[test]
    fn prop_unanimous_errors_resolve_error(n in 1usize..12) {
        let mut round = fresh_round(n);
        for agent in agents(n) {
            round.process_payload(TaskExecutionPayload::error(agent)).unwrap();
        }

        let (data, event) = round.end_block().unwrap().unwrap();
        prop_assert_eq!(event, Event::Error);
        prop_assert!(data.ptr_eq(round.synchronized_data()));
    }

    #[test]
    fn prop_partial_errors_resolve_done(
        (n, errors) in (2usize..12).prop_flat_map(|n| (Just(n), 1..n)),
        seed in any::<u64>(),
    ) {
        let participants = agents(n);
        let mut round = fresh_round(n);

        // spread the errors over the participants
        let offset = (seed % n as u64) as usize;
        let erring: Vec<bool> = (0..n).map(|i| (i + offset) % n < errors).collect();
        for (agent, errs) in participants.iter().zip(&erring) {
            let payload = if *errs { TaskExecutionPayload::error(agent.as_str()) } else { ok(agent) };
            round.process_payload(payload).unwrap();
        }

        let (data, event) = round.end_block().unwrap().unwrap();
        prop_assert_eq!(event, Event::Done);

        let finished = data.finished_task_data().unwrap();
        prop_assert_eq!(finished.task_result.len(), n - errors);
        prop_assert_eq!(finished.request_id, json!("req"));
    }

    #[test]
    fn prop_incomplete_collection_decision(
        (n, submitted, unreachable) in (2usize..12)
            .prop_flat_map(|n| (Just(n), 1..n))
            .prop_flat_map(|(n, k)| (Just(n), Just(k), 0..=(n - k))),
    ) {
        let participants = agents(n);
        let mut round = fresh_round(n);
        for agent in &participants[..submitted] {
            round.process_payload(ok(agent)).unwrap();
        }
        for agent in &participants[submitted..submitted + unreachable] {
            round.mark_unreachable(agent).unwrap();
        }

        // every ok payload is distinct, so the largest group has one vote
        let feasible = 1 + (n - submitted - unreachable) >= consensus_threshold(n);

        let first = round.end_block().unwrap();
        if feasible {
            prop_assert!(first.is_none());
            // re-evaluation without new payloads is a no-op
            prop_assert!(round.end_block().unwrap().is_none());
            prop_assert_eq!(round.status(), RoundStatus::Pending);
        } else {
            let (data, event) = first.unwrap();
            prop_assert_eq!(event, Event::NoMajority);
            prop_assert!(data.ptr_eq(round.synchronized_data()));
        }
    }

    #[test]
    fn prop_task_result_follows_ledger_order(
        order in Just(agents(6)).prop_shuffle(),
    ) {
        let mut round = fresh_round(6);
        for agent in &order {
            round.process_payload(ok(agent)).unwrap();
        }

        let (data, _) = round.end_block().unwrap().unwrap();
        let expected: Vec<_> = order.iter().map(|agent| json!(format!("result-{}", agent))).collect();
        prop_assert_eq!(data.finished_task_data().unwrap().task_result, expected);
    }
}
