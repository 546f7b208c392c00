//! End-to-end scenario tests driving the engine through literal message
//! scripts and checking book state and trade streams after each step.

use bitlob::config::BASE_PRICE;
use bitlob::{Engine, OrderMessage, Side, Trade};
use std::cell::RefCell;
use std::rc::Rc;

fn engine_with_trade_log() -> (Engine, Rc<RefCell<Vec<Trade>>>) {
    let mut engine = Engine::new(100_000);
    let log: Rc<RefCell<Vec<Trade>>> = Rc::default();
    let sink = Rc::clone(&log);
    engine.set_trade_callback(move |t| sink.borrow_mut().push(*t));
    (engine, log)
}

#[test]
fn best_updates_on_add_and_cancel() {
    let (mut engine, _log) = engine_with_trade_log();

    assert!(engine.process(&OrderMessage::add(1, Side::Buy, 50_000, 100, 1_000)));
    assert_eq!(engine.best_bid(), 50_000);
    assert_eq!(engine.best_bid_qty(), 100);

    assert!(engine.process(&OrderMessage::add(2, Side::Sell, 50_100, 150, 1_001)));
    assert_eq!(engine.best_ask(), 50_100);

    assert!(engine.process(&OrderMessage::cancel(1, 1_002)));
    assert_eq!(engine.best_bid(), 0);
    assert!(engine.validate_state());
}

#[test]
fn market_sweep_across_levels() {
    let (mut engine, log) = engine_with_trade_log();

    engine.process(&OrderMessage::add(10, Side::Sell, 50_100, 100, 1));
    engine.process(&OrderMessage::add(11, Side::Sell, 50_200, 150, 2));
    engine.process(&OrderMessage::add(12, Side::Sell, 50_300, 200, 3));

    assert!(engine.process(&OrderMessage::market(13, Side::Buy, 300, 4)));

    let trades = log.borrow();
    assert_eq!(
        trades.iter().map(|t| (t.price, t.quantity)).collect::<Vec<_>>(),
        vec![(50_100, 100), (50_200, 150), (50_300, 50)]
    );
    assert_eq!(
        trades.iter().map(|t| t.sell_order_id).collect::<Vec<_>>(),
        vec![10, 11, 12]
    );
    assert_eq!(engine.best_ask(), 50_300);
    assert_eq!(engine.best_ask_qty(), 150);
    assert!(engine.validate_state());
}

#[test]
fn ioc_limit_stops_traversal() {
    let (mut engine, log) = engine_with_trade_log();

    engine.process(&OrderMessage::add(20, Side::Buy, 50_000, 100, 1));
    engine.process(&OrderMessage::add(21, Side::Buy, 49_900, 200, 2));

    assert!(engine.process(&OrderMessage::ioc(22, Side::Sell, 50_000, 150, 3)));

    let trades = log.borrow();
    assert_eq!(trades.len(), 1);
    assert_eq!((trades[0].price, trades[0].quantity), (50_000, 100));
    assert_eq!(trades[0].buy_order_id, 20);
    assert_eq!(engine.best_bid(), 49_900);
    assert!(engine.validate_state());
}

#[test]
fn fifo_within_a_level() {
    let (mut engine, log) = engine_with_trade_log();

    engine.process(&OrderMessage::add(30, Side::Buy, 50_000, 100, 1));
    engine.process(&OrderMessage::add(31, Side::Buy, 50_000, 200, 2));
    engine.process(&OrderMessage::add(32, Side::Buy, 50_000, 150, 3));

    assert!(engine.process(&OrderMessage::market(33, Side::Sell, 250, 4)));

    let trades = log.borrow();
    assert_eq!(
        trades.iter().map(|t| (t.buy_order_id, t.quantity)).collect::<Vec<_>>(),
        vec![(30, 100), (31, 150)]
    );
    // 50 left of id 31 plus all 150 of id 32.
    assert_eq!(engine.best_bid_qty(), 200);
    assert!(engine.validate_state());
}

#[test]
fn modify_loses_time_priority() {
    let (mut engine, log) = engine_with_trade_log();

    engine.process(&OrderMessage::add(40, Side::Buy, 50_000, 100, 1));
    engine.process(&OrderMessage::add(41, Side::Buy, 50_000, 200, 2));
    // Same price, same quantity: still re-queued at the back.
    assert!(engine.process(&OrderMessage::modify(40, 50_000, 100, 3)));

    assert!(engine.process(&OrderMessage::market(42, Side::Sell, 150, 4)));

    let trades = log.borrow();
    assert_eq!(trades.len(), 1);
    assert_eq!((trades[0].buy_order_id, trades[0].quantity), (41, 150));
    assert_eq!(engine.best_bid_qty(), 150); // 50 of id 41 + 100 of id 40
    assert!(engine.validate_state());
}

#[test]
fn duplicate_id_rejected_without_state_change() {
    let (mut engine, _log) = engine_with_trade_log();

    assert!(engine.process(&OrderMessage::add(50, Side::Buy, 50_000, 100, 1)));
    assert!(!engine.process(&OrderMessage::add(50, Side::Sell, 50_100, 200, 2)));

    assert_eq!(engine.best_bid(), 50_000);
    assert_eq!(engine.best_bid_qty(), 100);
    assert_eq!(engine.best_ask(), u32::MAX);
    assert_eq!(engine.book().order_count(), 1);
    assert!(engine.validate_state());
}

#[test]
fn replay_round_trip_matches_original() {
    let path = std::env::temp_dir().join("bitlob_scenario_replay.log");

    let (mut original, original_log) = engine_with_trade_log();
    original.enable_history_recording(true);
    original.process(&OrderMessage::add(10, Side::Sell, 50_100, 100, 1));
    original.process(&OrderMessage::add(11, Side::Sell, 50_200, 150, 2));
    original.process(&OrderMessage::add(12, Side::Sell, 50_300, 200, 3));
    original.process(&OrderMessage::market(13, Side::Buy, 300, 4));
    original.save_history(&path).unwrap();

    let (mut restored, restored_log) = engine_with_trade_log();
    assert!(restored.load_and_replay(&path).unwrap());

    assert_eq!(restored.best_bid(), original.best_bid());
    assert_eq!(restored.best_ask(), original.best_ask());
    assert_eq!(restored.market_depth(10), original.market_depth(10));
    assert_eq!(*restored_log.borrow(), *original_log.borrow());
    assert!(restored.validate_state());

    std::fs::remove_file(&path).ok();
}

#[test]
fn market_against_empty_side_trades_nothing() {
    let (mut engine, log) = engine_with_trade_log();
    assert!(!engine.process(&OrderMessage::market(1, Side::Buy, 500, 1)));
    assert!(log.borrow().is_empty());
    assert!(engine.validate_state());
}

#[test]
fn clamped_orders_execute_at_the_boundary_tick() {
    use bitlob::config::LADDER_TOP;

    let (mut engine, log) = engine_with_trade_log();

    // A bid above the ladder top clamps to the top tick.
    engine.process(&OrderMessage::add(1, Side::Buy, LADDER_TOP + 500, 100, 1));
    assert_eq!(engine.best_bid(), LADDER_TOP);

    engine.process(&OrderMessage::market(2, Side::Sell, 100, 2));
    let trades = log.borrow();
    assert_eq!(trades[0].price, LADDER_TOP);
    assert!(engine.validate_state());
}

#[test]
fn counters_reflect_successful_work_only() {
    let (mut engine, _log) = engine_with_trade_log();

    engine.process(&OrderMessage::add(1, Side::Buy, BASE_PRICE, 100, 1));
    engine.process(&OrderMessage::add(1, Side::Buy, BASE_PRICE, 100, 2)); // duplicate
    engine.process(&OrderMessage::add(2, Side::Sell, BASE_PRICE + 10, 40, 3));
    engine.process(&OrderMessage::market(3, Side::Buy, 100, 4));
    engine.process(&OrderMessage::market(4, Side::Buy, 100, 5)); // empty side

    let book = engine.book();
    assert_eq!(book.orders_processed(), 2);
    assert_eq!(book.trades_executed(), 1);
    assert_eq!(book.volume_traded(), 40);
    assert_eq!(engine.messages_processed(), 5);
}
