// Dispatch-path benchmarks for the Accord protocol.
//
// Covers nonce allocation (single-threaded and under thread contention),
// createAgreement calldata encoding, transaction signing, and a full
// two-transaction dispatch against the in-memory ledger.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use accord_protocol::agreement::AgreementRequest;
use accord_protocol::config::{DispatchConfig, GapPolicy};
use accord_protocol::crypto::LedgerKeypair;
use accord_protocol::dispatch::Dispatcher;
use accord_protocol::identity::{Identity, NonceSequencer};
use accord_protocol::ledger::MemoryLedger;
use accord_protocol::transaction::{
    encode_create_agreement, sign_intent, IntentKind, TransactionBuilder,
};

fn bench_nonce_next(c: &mut Criterion) {
    let sequencer = NonceSequencer::new(0);

    c.bench_function("sequencer/next", |b| {
        b.iter(|| sequencer.next());
    });
}

fn bench_nonce_contention(c: &mut Criterion) {
    const PER_THREAD: u64 = 1_000;
    let mut group = c.benchmark_group("sequencer/contended");

    for threads in [2u64, 4, 8] {
        group.throughput(Throughput::Elements(threads * PER_THREAD));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let sequencer = Arc::new(NonceSequencer::new(0));
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let sequencer = Arc::clone(&sequencer);
                        std::thread::spawn(move || {
                            for _ in 0..PER_THREAD {
                                sequencer.next();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_encode_calldata(c: &mut Criterion) {
    let account = Address::repeat_byte(0x11);
    let agreement = "x".repeat(256);

    c.bench_function("abi/create_agreement_256b", |b| {
        b.iter(|| encode_create_agreement(&agreement, account));
    });
}

fn bench_sign_transfer(c: &mut Criterion) {
    let identity = Identity::new(LedgerKeypair::generate(), 0);
    let draft = TransactionBuilder::new(IntentKind::ValueTransfer)
        .to(Address::repeat_byte(0x11))
        .value(U256::from(100_000u64))
        .gas_limit(21_000)
        .gas_price(U256::from(1_000_000_000u64));

    c.bench_function("secp256k1/sign_transfer_eip155", |b| {
        b.iter(|| sign_intent(draft.clone().finalize(7), &identity, Some(1)).unwrap());
    });
}

fn bench_full_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut config = DispatchConfig::new(Address::repeat_byte(0xcc));
    config.gap_policy = GapPolicy::Continue;
    let dispatcher = Dispatcher::new(
        Identity::new(LedgerKeypair::generate(), 0),
        Arc::new(MemoryLedger::new()),
        config,
    );
    let request = AgreementRequest::new("0x1111111111111111111111111111111111111111", "terms-v1");

    c.bench_function("dispatch/memory_ledger", |b| {
        b.to_async(&runtime)
            .iter(|| async { dispatcher.dispatch(&request).await.unwrap() });
    });
}

criterion_group!(
    benches,
    bench_nonce_next,
    bench_nonce_contention,
    bench_encode_calldata,
    bench_sign_transfer,
    bench_full_dispatch,
);
criterion_main!(benches);
