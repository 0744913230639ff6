//! Transfer-path micro-benchmarks.

use bytes::BytesMut;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ipcbench_core::{MessageStream, PayloadSize};
use ipcbench_transport::ResourceNames;
use ipcbench_transport::ipc::{RingConsumer, RingProducer};
use ipcbench_transport::tcp::{BlockPlan, decode_words, encode_words};
use std::hint::black_box;

fn benchmark_stream_generation(c: &mut Criterion) {
    let payload = PayloadSize::new(1).unwrap();
    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Bytes(payload.bytes() as u64));

    group.bench_function("generate_1_unit", |b| {
        b.iter(|| black_box(MessageStream::generate(black_box(payload))))
    });

    group.finish();
}

fn benchmark_block_encoding(c: &mut Criterion) {
    let payload = PayloadSize::new(5).unwrap();
    let plan = BlockPlan::for_payload(payload);
    let stream = MessageStream::generate_seeded(payload, 1);
    let block = &stream[plan.block_range(0)];
    let mut buffer = BytesMut::with_capacity(block.len() * 4);

    let mut group = c.benchmark_group("socket_block");
    group.throughput(Throughput::Bytes((block.len() * 4) as u64));

    group.bench_function("encode", |b| {
        b.iter(|| {
            buffer.clear();
            encode_words(&mut buffer, black_box(block));
        })
    });

    buffer.clear();
    encode_words(&mut buffer, block);
    let mut decoded = vec![0; block.len()];
    group.bench_function("decode", |b| {
        b.iter(|| decode_words(black_box(&buffer), &mut decoded).unwrap())
    });

    group.finish();
}

fn benchmark_ring_push_pop(c: &mut Criterion) {
    let names = ResourceNames::namespaced(&format!("bench_{}", std::process::id())).unwrap();
    names.purge().unwrap();
    let mut producer = RingProducer::open(&names, 4096).unwrap();
    let mut consumer = RingConsumer::open(&names, 4096).unwrap();

    let mut group = c.benchmark_group("ring");
    group.throughput(Throughput::Elements(1));
    group.bench_function("push_pop", |b| {
        b.iter(|| {
            producer.push(black_box(42)).unwrap();
            black_box(consumer.pop().unwrap())
        })
    });
    group.finish();

    drop(producer);
    drop(consumer);
    names.purge().unwrap();
}

criterion_group!(
    benches,
    benchmark_stream_generation,
    benchmark_block_encoding,
    benchmark_ring_push_pop
);
criterion_main!(benches);
