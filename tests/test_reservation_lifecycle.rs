use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use stockledger::{
    config::Config,
    dispatcher::Inventory,
    error::InventoryError,
    ledger::{
        journal::{InMemoryJournal, Journal, JournalEntry, JournalError},
        memory::InMemoryLedger,
    },
    stock::HoldState,
};
use tokio::time::sleep;

fn fast_config() -> Config {
    Config {
        sweep_interval: Duration::from_millis(50),
        ..Config::default()
    }
}

fn inventory() -> Inventory<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::new(Arc::new(InMemoryJournal::default())));
    Inventory::new(ledger, fast_config())
}

#[tokio::test(flavor = "multi_thread")]
async fn reserve_commit_then_release_is_already_finalized() {
    let inv = inventory();
    inv.adjust("A1", "W1", 10, "initial count", None)
        .await
        .unwrap();

    let hold = inv.reserve("A1", "W1", 4, 60, Some("K1")).await.unwrap();
    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 6);
    assert_eq!(levels.reserved, 4);

    let committed = inv.commit(hold.id).await.unwrap();
    assert_eq!(committed.state(), HoldState::Committed);
    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 6);
    assert_eq!(levels.reserved, 0);

    let err = inv.release(hold.id).await.unwrap_err();
    assert!(matches!(
        err,
        InventoryError::AlreadyFinalized {
            state: HoldState::Committed,
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn two_concurrent_reserves_for_more_than_available() {
    let inv = inventory();
    inv.adjust("A1", "W1", 5, "initial count", None)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        inv.reserve("A1", "W1", 3, 60, None),
        inv.reserve("A1", "W1", 3, 60, None),
    );

    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    for outcome in &outcomes {
        if let Err(e) = outcome {
            assert!(matches!(e, InventoryError::InsufficientStock { .. }));
        }
    }

    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 2);
    assert_eq!(levels.reserved, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn many_concurrent_reserves_never_oversell() {
    let inv = inventory();
    inv.adjust("A1", "W1", 10, "initial count", None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let inv = inv.clone();
        handles.push(tokio::spawn(async move {
            inv.reserve("A1", "W1", 3, 60, None).await.is_ok()
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 3); // 3 x 3 units fit into 10, a fourth would not

    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 1);
    assert_eq!(levels.reserved, 9);
}

#[tokio::test(flavor = "multi_thread")]
async fn replayed_reserve_returns_original_without_reapplying() {
    let inv = inventory();
    inv.adjust("A1", "W1", 10, "initial count", None)
        .await
        .unwrap();

    let first = inv.reserve("A1", "W1", 4, 60, Some("K1")).await.unwrap();
    let replay = inv.reserve("A1", "W1", 4, 60, Some("K1")).await.unwrap();
    assert_eq!(first.id, replay.id);

    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 6);
    assert_eq!(levels.reserved, 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn elapsed_hold_is_swept_back_to_available() {
    let inv = inventory();
    inv.adjust("A1", "W1", 10, "initial count", None)
        .await
        .unwrap();

    let hold = inv.reserve("A1", "W1", 4, 1, None).await.unwrap();
    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 6);

    sleep(Duration::from_millis(1_400)).await;

    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 10);
    assert_eq!(levels.reserved, 0);

    let err = inv.commit(hold.id).await.unwrap_err();
    assert!(matches!(
        err,
        InventoryError::AlreadyFinalized {
            state: HoldState::Expired,
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn release_returns_stock_and_repeats_silently() {
    let inv = inventory();
    inv.adjust("A1", "W1", 10, "initial count", None)
        .await
        .unwrap();

    let hold = inv.reserve("A1", "W1", 4, 60, None).await.unwrap();
    inv.release(hold.id).await.unwrap();
    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 10);
    assert_eq!(levels.reserved, 0);

    // same terminal state again is fine, and applies nothing
    let again = inv.release(hold.id).await.unwrap();
    assert_eq!(again.state(), HoldState::Released);
    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 10);
    assert_eq!(levels.reserved, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn on_hand_follows_adjustments_and_commits() {
    let inv = inventory();
    inv.adjust("A1", "W1", 100, "initial count", None)
        .await
        .unwrap();

    let h1 = inv.reserve("A1", "W1", 10, 60, None).await.unwrap();
    inv.commit(h1.id).await.unwrap();

    let h2 = inv.reserve("A1", "W1", 5, 60, None).await.unwrap();
    inv.release(h2.id).await.unwrap();

    let _open = inv.reserve("A1", "W1", 7, 60, None).await.unwrap();
    inv.adjust("A1", "W1", 3, "found during recount", None)
        .await
        .unwrap();

    // 100 seeded + 3 adjusted - 10 committed; releases and open holds
    // only move quantity between the two columns
    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available + levels.reserved, 93);
    assert_eq!(levels.reserved, 7);
}

#[tokio::test(flavor = "multi_thread")]
async fn terminal_holds_are_purged_after_retention() {
    let ledger = Arc::new(InMemoryLedger::new(Arc::new(InMemoryJournal::default())));
    let inv = Inventory::new(
        ledger,
        Config {
            sweep_interval: Duration::from_millis(50),
            retention: Duration::from_millis(200),
            ..Config::default()
        },
    );
    inv.adjust("A1", "W1", 10, "initial count", None)
        .await
        .unwrap();

    let hold = inv.reserve("A1", "W1", 2, 60, None).await.unwrap();
    inv.commit(hold.id).await.unwrap();
    assert!(inv.reservation(hold.id).is_ok());

    sleep(Duration::from_millis(500)).await;
    let err = inv.reservation(hold.id).unwrap_err();
    assert!(matches!(err, InventoryError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_ids_and_keys_are_not_found() {
    let inv = inventory();

    let err = inv.reserve("A1", "W1", 1, 60, None).await.unwrap_err();
    assert!(matches!(err, InventoryError::NotFound(_)));

    let err = inv.commit(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, InventoryError::NotFound(_)));
}

struct FlakyJournal {
    fail: AtomicBool,
}

impl Journal for FlakyJournal {
    fn append(&self, _entry: &JournalEntry) -> Result<(), JournalError> {
        if self.fail.load(Ordering::Relaxed) {
            Err(JournalError::Write("disk offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn journal_outage_rejects_mutations_without_effect() {
    let journal = Arc::new(FlakyJournal {
        fail: AtomicBool::new(false),
    });
    let inv = Inventory::new(
        Arc::new(InMemoryLedger::new(journal.clone())),
        fast_config(),
    );
    inv.adjust("A1", "W1", 10, "initial count", None)
        .await
        .unwrap();
    let hold = inv.reserve("A1", "W1", 2, 60, None).await.unwrap();

    journal.fail.store(true, Ordering::Relaxed);

    let err = inv.reserve("A1", "W1", 1, 60, None).await.unwrap_err();
    assert!(matches!(err, InventoryError::Unavailable(_)));

    // a commit that cannot be journaled leaves the hold reserved
    let err = inv.commit(hold.id).await.unwrap_err();
    assert!(matches!(err, InventoryError::Unavailable(_)));
    assert_eq!(inv.reservation(hold.id).unwrap().state(), HoldState::Reserved);

    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 8);
    assert_eq!(levels.reserved, 2);

    // once the log is back the commit goes through
    journal.fail.store(false, Ordering::Relaxed);
    inv.commit(hold.id).await.unwrap();
    let levels = inv.get_stock("A1", "W1").await.unwrap();
    assert_eq!(levels.available, 8);
    assert_eq!(levels.reserved, 0);
}
