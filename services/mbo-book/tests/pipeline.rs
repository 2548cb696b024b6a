//! End-to-end pipeline tests on the tokio runtime
//!
//! Producers → channel → applier → book, with the reaper on its timer and
//! readers copying ranges out under the read lock.

use std::time::Duration;

use mbo_book::channel::NoSnapshot;
use mbo_book::config::BookConfig;
use mbo_book::engine::{BookEngine, BookReader};
use mbo_book::events::{DepthBatch, SequenceKey, UpdateBatch};
use mbo_book::view::DataSource;
use rust_decimal::Decimal;
use types::depth::DepthLevel;
use types::ids::OrderId;
use types::numeric::{Price, Volume};
use types::order::{OrderEvent, OrderEventKind, Side};

fn p(v: u64) -> Price {
    Price::from_u64(v)
}

fn order(id: u64, kind: OrderEventKind, price: u64, volume: u64) -> OrderEvent {
    OrderEvent {
        order_id: OrderId::new(id),
        price: p(price),
        side: Side::Bid,
        volume: Volume::from_u64(volume),
        priority: id,
        kind,
        timestamp: 0,
    }
}

/// Wait until the applier has caught up to `key`.
async fn settle(reader: &BookReader, key: SequenceKey) {
    for _ in 0..10_000 {
        if reader.last_applied() == Some(key) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("batch {key} never applied");
}

async fn wait_for_sweeps(engine: &BookEngine, target: u64) {
    while engine.metrics().sweeps < target {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn count_at(reader: &BookReader, price: u64) -> usize {
    reader.with_book(|book| book.level(p(price)).map_or(0, |l| l.order_count()))
}

#[tokio::test(start_paused = true)]
async fn test_flagged_order_visible_for_one_sweep() {
    let engine = BookEngine::start(BookConfig::default(), NoSnapshot).unwrap();
    let reader = engine.reader();
    let sender = engine.sender();

    sender.send_orders(vec![order(1, OrderEventKind::New, 100, 5)]).unwrap();
    let key = sender
        .send_orders(vec![order(1, OrderEventKind::Delete, 100, 0)])
        .unwrap();
    settle(&reader, key).await;
    assert_eq!(engine.pending_reaps(), 1);

    let swept = engine.metrics().sweeps;
    wait_for_sweeps(&engine, swept + 1).await;
    assert_eq!(count_at(&reader, 100), 1);
    let (rows, _) = reader.orders_at_price(p(100), None, None).unwrap();
    assert!(rows[0].removed);

    wait_for_sweeps(&engine, swept + 2).await;
    assert_eq!(count_at(&reader, 100), 0);
    assert_eq!(engine.metrics().orders_reaped, 1);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reaper_honours_configured_interval() {
    let config = BookConfig::from_toml_str("[reaper]\ninterval_ms = 1000\n").unwrap();
    let engine = BookEngine::start(config, NoSnapshot).unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(engine.metrics().sweeps, 3);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_primes_ahead_of_first_live_batch() {
    let snapshot = || {
        vec![
            order(10, OrderEventKind::New, 99, 4),
            order(11, OrderEventKind::New, 98, 2),
        ]
    };
    let engine = BookEngine::start(BookConfig::default(), snapshot).unwrap();
    let reader = engine.reader();

    // Live change for an order the snapshot seeds; must land on top of it.
    let key = engine
        .sender()
        .send_orders(vec![order(10, OrderEventKind::Change, 99, 7)])
        .unwrap();
    settle(&reader, key).await;

    reader.with_book(|book| {
        let seeded = book.level(p(99)).unwrap().get(&OrderId::new(10)).unwrap();
        assert_eq!(seeded.total_volume(), Volume::from_u64(7));
        assert!(book.level(p(98)).unwrap().contains(&OrderId::new(11)));
    });
    assert_eq!(engine.metrics().batches_applied, 2);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_depth_fallback_until_first_order_batch() {
    let engine = BookEngine::start(BookConfig::default(), NoSnapshot).unwrap();
    let reader = engine.reader();
    let sender = engine.sender();

    let key = sender
        .send_depth(DepthBatch::Snapshot(vec![
            DepthLevel::new(p(100), Side::Bid, Volume::from_u64(12), 0),
            DepthLevel::new(p(102), Side::Ask, Volume::from_u64(9), 0),
        ]))
        .unwrap();
    settle(&reader, key).await;
    assert_eq!(reader.source(), DataSource::Level2);
    assert_eq!(reader.volume_at(p(100)), (Volume::from_u64(12), DataSource::Level2));

    let range = reader.snapshot_range(p(102), p(100), Decimal::ONE);
    assert_eq!(range.levels.len(), 2);
    assert!(range.levels.iter().all(|l| l.orders[0].synthetic));

    let key = sender
        .send_orders(vec![order(1, OrderEventKind::New, 101, 3)])
        .unwrap();
    settle(&reader, key).await;
    assert_eq!(reader.volume_at(p(100)), (Volume::ZERO, DataSource::Level3));
    assert_eq!(reader.volume_at(p(101)), (Volume::from_u64(3), DataSource::Level3));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_external_keys_drop_replayed_batch() {
    let engine = BookEngine::start(BookConfig::default(), NoSnapshot).unwrap();
    let reader = engine.reader();
    let sender = engine.sender();

    let batch = UpdateBatch::orders(
        SequenceKey::new(42),
        vec![order(1, OrderEventKind::New, 100, 5)],
    );
    sender.send_batch(batch.clone()).unwrap();
    sender.send_batch(batch).unwrap();
    let key = sender
        .send_batch(UpdateBatch::trades(SequenceKey::new(43), Vec::new()))
        .unwrap();
    settle(&reader, key).await;

    let metrics = engine.metrics();
    assert_eq!(metrics.batches_applied, 2);
    assert_eq!(metrics.duplicates_dropped, 1);

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_producers_all_applied() {
    let engine = BookEngine::start(BookConfig::default(), NoSnapshot).unwrap();
    let reader = engine.reader();

    let producers: Vec<_> = (0..4u64)
        .map(|t| {
            let sender = engine.sender();
            std::thread::spawn(move || {
                for i in 0..50u64 {
                    let id = t * 1000 + i;
                    sender
                        .send_orders(vec![order(id, OrderEventKind::New, 100 + t, 1)])
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    for _ in 0..5_000 {
        if engine.metrics().batches_applied == 200 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(engine.metrics().batches_applied, 200);
    assert_eq!(engine.metrics().duplicates_dropped, 0);

    let aggregate = reader.aggregate_in_range(p(103), p(100), Decimal::ONE, false);
    assert_eq!(aggregate.max_count, 50);
    assert_eq!(aggregate.max_volume, Volume::from_u64(50));
    reader.with_book(|book| assert_eq!(book.index().len(), 200));

    engine.shutdown().await;
}
