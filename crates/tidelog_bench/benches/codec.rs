//! Log frame codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tidelog_bench::utils::{committed_inserts, random_data, BENCH_DATABASE_ID, BENCH_TABLE_ID};
use tidelog_core::{encode_frame, encode_frame_into, ItemPointer, LogReader, LogRecord, TxnId};
use tidelog_storage::MemoryDevice;

fn insert_record(payload_size: usize) -> LogRecord {
    LogRecord::Insert {
        txn_id: TxnId::new(1),
        db_id: BENCH_DATABASE_ID,
        table_id: BENCH_TABLE_ID,
        new_location: ItemPointer::new(0, 0),
        payload: random_data(payload_size),
    }
}

/// Benchmark encoding a single insert frame.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");

    for size in [0, 128, 1024, 8192].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let record = insert_record(size);
            b.iter(|| {
                let frame = encode_frame(black_box(&record)).unwrap();
                black_box(frame);
            });
        });
    }

    group.finish();
}

/// Benchmark encoding a flush batch into a reused buffer.
fn bench_encode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_batch");

    for count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64 * 3));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let records = committed_inserts(count, 128);
            let mut batch = Vec::new();
            b.iter(|| {
                batch.clear();
                for record in &records {
                    encode_frame_into(record, &mut batch).unwrap();
                }
                black_box(batch.len());
            });
        });
    }

    group.finish();
}

/// Benchmark scanning and decoding a whole log.
fn bench_read_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_log");

    for count in [100, 1000, 10000].iter() {
        let mut data = Vec::new();
        for record in committed_inserts(*count, 128) {
            encode_frame_into(&record, &mut data).unwrap();
        }
        group.throughput(Throughput::Bytes(data.len() as u64));
        let device = MemoryDevice::with_data(data);

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let read = LogReader::new(&device).filter(|r| r.is_ok()).count();
                black_box(read);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_encode_batch, bench_read_log);
criterion_main!(benches);
