use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use prediction_oracle::config::{dev_fulfiller, dev_owner};
use prediction_oracle::core::{CallContext, ManualClock};
use prediction_oracle::crypto::{address_from_label, component_address, request_id};
use prediction_oracle::ledger::{link, OracleAuthority, PredictionLedger};
use prediction_oracle::storage::{MemoryDatabase, OracleStore};
use prediction_oracle::types::{Bytes, U256};
use prediction_oracle::{Config, Node};
use std::sync::Arc;
use std::time::Duration;

fn linked_pair() -> (PredictionLedger, OracleAuthority) {
    let owner = dev_owner();
    let ctx = CallContext::new(owner, 0);
    let mut ledger = PredictionLedger::new(component_address(&owner, 0), owner, "bench", U256::from(1000));
    let mut authority = OracleAuthority::new(component_address(&owner, 1), owner);
    ledger.authorize_oracle(&ctx, dev_fulfiller()).unwrap();
    link(&ctx, &mut ledger, &mut authority).unwrap();
    (ledger, authority)
}

/// Benchmark request id derivation
fn bench_request_id(c: &mut Criterion) {
    let ledger = address_from_label("ledger");
    let requester = address_from_label("consumer");

    let mut group = c.benchmark_group("request_id");
    for size in &[16usize, 256, 4096] {
        let input = vec![0x42u8; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            let mut nonce = 0u64;
            b.iter(|| {
                nonce += 1;
                request_id(black_box(&ledger), &requester, input, nonce, 1_700_000_000)
            });
        });
    }
    group.finish();
}

/// Benchmark the in-memory request/fulfill state machine
fn bench_ledger_round_trip(c: &mut Criterion) {
    let consumer = address_from_label("consumer");
    let input = Bytes::from("[1.0,2.0,3.0]");

    c.bench_function("ledger_request_fulfill", |b| {
        let (mut ledger, authority) = linked_pair();
        let mut now = 1u64;
        b.iter(|| {
            now += 1;
            let request = CallContext::new(consumer, now).with_value(U256::from(1000));
            let (id, _) = ledger.request_prediction(&request, input.clone()).unwrap();
            let fulfill = CallContext::new(dev_fulfiller(), now);
            authority
                .fulfill_prediction(&fulfill, &mut ledger, black_box(id), U256::from(1250), 85)
                .unwrap()
        });
    });
}

/// Benchmark the node path: actor queue plus committed write batch
fn bench_node_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let node = runtime.block_on(async {
        Node::spawn(
            &Config::default(),
            OracleStore::new(Arc::new(MemoryDatabase::new())),
            Arc::new(ManualClock::new(1)),
        )
        .unwrap()
    });
    let handle = node.handle();
    let consumer = address_from_label("consumer");
    let fee = runtime.block_on(handle.prediction_fee()).unwrap();

    let mut group = c.benchmark_group("node");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("request_fulfill", |b| {
        b.to_async(&runtime).iter(|| async {
            let id = handle
                .request_prediction(consumer, fee, Bytes::from("[1.0,2.0,3.0]"))
                .await
                .unwrap();
            handle
                .fulfill_prediction(dev_fulfiller(), id, U256::from(1250), 85)
                .await
                .unwrap();
        });
    });
    group.finish();

    runtime.block_on(node.stop());
}

criterion_group!(benches, bench_request_id, bench_ledger_round_trip, bench_node_round_trip);
criterion_main!(benches);
