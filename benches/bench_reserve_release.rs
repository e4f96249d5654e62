use criterion::{Criterion, criterion_group, criterion_main};
use std::sync::Arc;
use stockledger::{
    config::Config,
    dispatcher::Inventory,
    ledger::{journal::InMemoryJournal, memory::InMemoryLedger},
};
use tokio::runtime::Runtime;

async fn reserve_release_heavy(inventory: Arc<Inventory<InMemoryLedger>>) {
    // 4 competing clerks on one key
    let mut joins = Vec::new();
    for _ in 0..4 {
        let inv = inventory.clone();
        joins.push(tokio::spawn(async move {
            for _ in 0..250u64 {
                if let Ok(hold) = inv.reserve("SKU-1", "W1", 1, 60, None).await {
                    let _ = inv.release(hold.id).await;
                }
            }
        }));
    }

    for j in joins {
        j.await.unwrap();
    }
}

fn bench_reserve_release(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let inventory = rt.block_on(async {
        let ledger = Arc::new(InMemoryLedger::new(Arc::new(InMemoryJournal::default())));
        let inventory = Inventory::new(ledger, Config::default());
        inventory
            .adjust("SKU-1", "W1", 1_000, "bench seed", None)
            .await
            .unwrap();
        Arc::new(inventory)
    });

    c.bench_function("reserve_release_cycle", |b| {
        b.to_async(&rt).iter(|| reserve_release_heavy(inventory.clone()));
    });
}

criterion_group!(benches, bench_reserve_release);
criterion_main!(benches);
