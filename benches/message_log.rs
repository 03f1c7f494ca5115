// Benchmarks the Message Log's JSON round-trip at the size compaction is
// meant to bound a session to (spec §4.6's compaction threshold), matching
// the teacher's `engram_bench`-style dev-dependency usage of `criterion`.

use criterion::{criterion_group, criterion_main, Criterion};
use scout_engine::atoms::types::Message;

fn sample_log(len: usize) -> Vec<Message> {
    (0..len)
        .map(|i| if i % 2 == 0 { Message::user(format!("message number {i} with some representative body text")) } else { Message::assistant(Some(format!("reply {i}")), None) })
        .collect()
}

fn bench_round_trip(c: &mut Criterion) {
    let log = sample_log(500);
    let serialized = serde_json::to_string(&log).unwrap();

    c.bench_function("message_log_serialize_500", |b| {
        b.iter(|| serde_json::to_string(&log).unwrap());
    });

    c.bench_function("message_log_deserialize_500", |b| {
        b.iter(|| serde_json::from_str::<Vec<Message>>(&serialized).unwrap());
    });
}

criterion_group!(benches, bench_round_trip);
criterion_main!(benches);
