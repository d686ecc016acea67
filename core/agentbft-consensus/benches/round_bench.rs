use agentbft_consensus::{
    AbciRound, SynchronizedData, TaskExecutionPayload, TaskExecutionRound, TaskResultEnvelope,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn payloads(count: usize) -> (SynchronizedData, Vec<TaskExecutionPayload>) {
    let senders: Vec<String> = (0..count).map(|i| format!("agent_{}", i)).collect();
    let data = SynchronizedData::with_participants(senders.clone());

    let payloads = senders
        .into_iter()
        .enumerate()
        .map(|(i, sender)| {
            if i % 5 == 0 {
                TaskExecutionPayload::error(sender)
            } else {
                let envelope = TaskResultEnvelope::new("bench", format!("result_{}", i));
                TaskExecutionPayload::from_envelope(sender, &envelope).unwrap()
            }
        })
        .collect();

    (data, payloads)
}

fn bench_task_execution_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_execution_round");

    for count in [4, 16, 64, 256].iter() {
        let (data, payloads) = payloads(*count);

        group.bench_with_input(
            BenchmarkId::new("collect_and_end_block", count),
            count,
            |b, _| {
                b.iter(|| {
                    let mut round = TaskExecutionRound::new(data.clone()).unwrap();
                    for payload in payloads.iter().cloned() {
                        round.process_payload(payload).unwrap();
                    }
                    black_box(round.end_block().unwrap());
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("pending_end_block", count),
            count,
            |b, _| {
                // one missing report over matching results keeps the round pending
                let shared = TaskResultEnvelope::new("bench", "shared");
                let mut round = TaskExecutionRound::new(data.clone()).unwrap();
                for payload in payloads.iter().skip(1) {
                    let matching =
                        TaskExecutionPayload::from_envelope(payload.sender.clone(), &shared).unwrap();
                    round.process_payload(matching).unwrap();
                }
                b.iter(|| {
                    let outcome = round.end_block().unwrap();
                    assert!(outcome.is_none());
                    black_box(outcome)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_task_execution_round);
criterion_main!(benches);
