//! Rendering throughput for a full history buffer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use message_format::{format_messages, DisplayEncoding, MessageFormatter};
use serial_protocol::Message;

fn history(count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| Message::received(format!("sensor,{},temp=23.{}", i, i % 10).into_bytes()))
        .collect()
}

fn bench_format(c: &mut Criterion) {
    let messages = history(1024);
    let mut group = c.benchmark_group("format_messages");
    group.throughput(Throughput::Elements(messages.len() as u64));

    for encoding in DisplayEncoding::ALL {
        group.bench_with_input(BenchmarkId::new("fresh", encoding), &encoding, |b, &enc| {
            b.iter(|| format_messages(black_box(&messages), enc))
        });

        let mut formatter = MessageFormatter::new();
        group.bench_with_input(BenchmarkId::new("reused", encoding), &encoding, |b, &enc| {
            b.iter(|| formatter.render(black_box(&messages), enc).len())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_format);
criterion_main!(benches);
