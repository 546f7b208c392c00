//! Engine - message dispatch, callbacks, latency counters, and replay.
//!
//! Owns an [`OrderBook`] and drives it from a stream of
//! [`OrderMessage`]s. Successful messages can be recorded to an in-memory
//! history and saved to a binary log; replaying the log on a fresh engine
//! reproduces the book state and trade stream byte for byte.
//!
//! Callbacks run synchronously on the calling thread and must not
//! reenter the engine.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::TRADE_POOL_RATIO;
use crate::message::{
    wire, MessageKind, OrderEvent, OrderMessage, OrderType, ReplayError, Trade,
};
use crate::order_book::OrderBook;
use crate::pool::Order;

/// Sink for executed trades.
pub type TradeCallback = Box<dyn FnMut(&Trade)>;

/// Sink for order lifecycle events. Receives a snapshot of the affected
/// order; the reference is only valid for the duration of the call.
pub type OrderCallback = Box<dyn FnMut(&Order, OrderEvent)>;

pub struct Engine {
    book: OrderBook,
    trade_callback: Option<TradeCallback>,
    order_callback: Option<OrderCallback>,
    messages_processed: u64,
    processing_time_ns: u64,
    history: Vec<OrderMessage>,
    record_history: bool,
    /// Reusable trade sink for market/IOC dispatch.
    trades: Vec<Trade>,
}

impl Engine {
    /// Create an engine whose book pre-allocates `pool_capacity` order
    /// slots.
    pub fn new(pool_capacity: u32) -> Self {
        Self {
            book: OrderBook::new(pool_capacity),
            trade_callback: None,
            order_callback: None,
            messages_processed: 0,
            processing_time_ns: 0,
            history: Vec::with_capacity(pool_capacity as usize),
            record_history: false,
            trades: Vec::with_capacity((pool_capacity / TRADE_POOL_RATIO).max(16) as usize),
        }
    }

    pub fn set_trade_callback<F: FnMut(&Trade) + 'static>(&mut self, callback: F) {
        self.trade_callback = Some(Box::new(callback));
    }

    pub fn set_order_callback<F: FnMut(&Order, OrderEvent) + 'static>(&mut self, callback: F) {
        self.order_callback = Some(Box::new(callback));
    }

    // ========================================================================
    // Message processing
    // ========================================================================

    /// Apply one message. Returns whether the operation succeeded.
    ///
    /// Failures are per-message and non-fatal: the book is unchanged and
    /// no callbacks fire. A market or IOC order "succeeds" when it fills
    /// a nonzero quantity.
    pub fn process(&mut self, msg: &OrderMessage) -> bool {
        let start = Instant::now();
        self.trades.clear();

        let success = match msg.kind {
            MessageKind::AddOrder => {
                match self.book.add_limit(msg.order_id, msg.side, msg.price, msg.quantity, msg.timestamp) {
                    Ok(()) => {
                        let snapshot = Order::new(
                            msg.order_id,
                            msg.price,
                            msg.quantity,
                            msg.side,
                            OrderType::Limit,
                            msg.timestamp,
                        );
                        self.notify_order_event(&snapshot, OrderEvent::Added);
                        true
                    }
                    Err(_) => false,
                }
            }
            MessageKind::CancelOrder => match self.book.cancel(msg.order_id) {
                Ok(()) => {
                    let snapshot =
                        Order::new(msg.order_id, 0, 0, msg.side, OrderType::Limit, msg.timestamp);
                    self.notify_order_event(&snapshot, OrderEvent::Cancelled);
                    true
                }
                Err(_) => false,
            },
            MessageKind::ModifyOrder => {
                // Modify records do not carry a side; read it off the
                // resting order before the cancel-replace.
                let side = self.book.order_side(msg.order_id).unwrap_or(msg.side);
                match self.book.modify(msg.order_id, msg.price, msg.quantity, msg.timestamp) {
                    Ok(()) => {
                        let snapshot = Order::new(
                            msg.order_id,
                            msg.price,
                            msg.quantity,
                            side,
                            OrderType::Limit,
                            msg.timestamp,
                        );
                        self.notify_order_event(&snapshot, OrderEvent::Modified);
                        true
                    }
                    Err(_) => false,
                }
            }
            MessageKind::MarketOrder => {
                let filled =
                    self.book
                        .execute_market(msg.side, msg.quantity, msg.timestamp, &mut self.trades);
                filled > 0
            }
            MessageKind::IocOrder => {
                let filled = self.book.execute_ioc(
                    msg.side,
                    msg.price,
                    msg.quantity,
                    msg.timestamp,
                    &mut self.trades,
                );
                filled > 0
            }
        };

        if success && !self.trades.is_empty() {
            self.notify_trade_events();
        }
        if self.record_history && success {
            self.history.push(*msg);
        }

        self.processing_time_ns += start.elapsed().as_nanos() as u64;
        self.messages_processed += 1;
        success
    }

    /// Apply messages in order; returns how many succeeded.
    pub fn process_batch(&mut self, messages: &[OrderMessage]) -> usize {
        let mut processed = 0;
        for msg in messages {
            if self.process(msg) {
                processed += 1;
            }
        }
        processed
    }

    fn notify_order_event(&mut self, order: &Order, event: OrderEvent) {
        if let Some(callback) = self.order_callback.as_mut() {
            callback(order, event);
        }
    }

    fn notify_trade_events(&mut self) {
        if let Some(callback) = self.trade_callback.as_mut() {
            for trade in &self.trades {
                callback(trade);
            }
        }
    }

    // ========================================================================
    // Replay
    // ========================================================================

    /// Record successful messages to the in-memory history.
    pub fn enable_history_recording(&mut self, enable: bool) {
        self.record_history = enable;
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Clear the book and reapply every recorded message.
    ///
    /// Recording is suspended during the replay so the history is not
    /// duplicated. Returns whether every message succeeded again (always
    /// true for a history produced by this engine).
    pub fn replay(&mut self) -> bool {
        if self.history.is_empty() {
            return true;
        }

        debug!(messages = self.history.len(), "replaying history");
        self.book.clear();
        self.reset_performance_counters();

        let recording = self.record_history;
        self.record_history = false;

        let history = std::mem::take(&mut self.history);
        let mut processed = 0;
        for msg in &history {
            if self.process(msg) {
                processed += 1;
            }
        }
        let total = history.len();
        self.history = history;
        self.record_history = recording;

        if processed != total {
            warn!(processed, total, "replay diverged from recorded history");
        }
        processed == total
    }

    /// Write the history to `path`: a `u64` little-endian record count
    /// followed by the fixed-size records (see [`wire`]).
    pub fn save_history<P: AsRef<Path>>(&self, path: P) -> Result<(), ReplayError> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&(self.history.len() as u64).to_le_bytes())?;
        for msg in &self.history {
            wire::write_record(&mut writer, msg)?;
        }
        writer.flush()?;

        debug!(records = self.history.len(), path = %path.as_ref().display(), "saved replay log");
        Ok(())
    }

    /// Load a replay log and replay it.
    ///
    /// The engine is untouched unless the whole file decodes: truncated
    /// or malformed logs fail before any state changes. On success the
    /// loaded history replaces the current one and the returned flag is
    /// [`replay`](Self::replay)'s result.
    pub fn load_and_replay<P: AsRef<Path>>(&mut self, path: P) -> Result<bool, ReplayError> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);

        let mut count_buf = [0u8; 8];
        reader.read_exact(&mut count_buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                ReplayError::Truncated
            } else {
                ReplayError::Io(err)
            }
        })?;
        let count = u64::from_le_bytes(count_buf);
        if count == 0 {
            return Err(ReplayError::Empty);
        }

        // Sized by pushes rather than the untrusted header count.
        let mut messages = Vec::new();
        for _ in 0..count {
            messages.push(wire::read_record(&mut reader)?);
        }

        debug!(records = count, path = %path.as_ref().display(), "loaded replay log");
        self.history = messages;
        Ok(self.replay())
    }

    // ========================================================================
    // Delegation and metrics
    // ========================================================================

    #[inline]
    pub fn best_bid(&self) -> u32 {
        self.book.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> u32 {
        self.book.best_ask()
    }

    #[inline]
    pub fn best_bid_qty(&self) -> u32 {
        self.book.best_bid_qty()
    }

    #[inline]
    pub fn best_ask_qty(&self) -> u32 {
        self.book.best_ask_qty()
    }

    pub fn market_depth(&self, levels: u32) -> (Vec<(u32, u32)>, Vec<(u32, u32)>) {
        self.book.market_depth(levels)
    }

    #[inline]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Clear the book, the history, and all counters.
    pub fn reset(&mut self) {
        self.book.clear();
        self.history.clear();
        self.reset_performance_counters();
    }

    pub fn validate_state(&self) -> bool {
        self.book.validate()
    }

    /// Pre-fault the pool's backing pages before latency-sensitive runs.
    pub fn warm_up(&mut self) {
        self.book.warm_up();
    }

    #[inline]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed
    }

    #[inline]
    pub fn processing_time_ns(&self) -> u64 {
        self.processing_time_ns
    }

    pub fn average_latency_ns(&self) -> f64 {
        if self.messages_processed == 0 {
            return 0.0;
        }
        self.processing_time_ns as f64 / self.messages_processed as f64
    }

    pub fn reset_performance_counters(&mut self) {
        self.messages_processed = 0;
        self.processing_time_ns = 0;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_POOL_CAPACITY)
    }
}
