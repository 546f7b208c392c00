//! Message, trade, and event types for the matching engine.
//!
//! Messages are inputs from the feed decoder. Trades and order events are
//! outputs delivered through the engine's callbacks. The `wire` submodule
//! freezes the replay-log record layout.

use thiserror::Error;

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// Returns the opposite side.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Side::Buy),
            1 => Ok(Side::Sell),
            other => Err(other),
        }
    }
}

/// Order type determines matching behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderType {
    /// Rests in the book until cancelled, modified, or filled.
    #[default]
    Limit = 0,
    /// Matches at any price; the unfilled remainder is discarded.
    Market = 1,
    /// Matches up to a limit price; the unfilled remainder is discarded.
    Ioc = 2,
}

// ============================================================================
// Input Messages
// ============================================================================

/// Message discriminant. The values double as the on-disk record tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    AddOrder = b'A',
    CancelOrder = b'C',
    ModifyOrder = b'M',
    MarketOrder = b'X',
    IocOrder = b'I',
}

impl TryFrom<u8> for MessageKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            b'A' => Ok(MessageKind::AddOrder),
            b'C' => Ok(MessageKind::CancelOrder),
            b'M' => Ok(MessageKind::ModifyOrder),
            b'X' => Ok(MessageKind::MarketOrder),
            b'I' => Ok(MessageKind::IocOrder),
            other => Err(other),
        }
    }
}

/// A single order-entry message.
///
/// All five message kinds share this record; fields that a kind does not
/// use (e.g. `price` on a cancel) are zero. `timestamp` is caller-supplied
/// and monotonic within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderMessage {
    pub kind: MessageKind,
    pub order_id: u64,
    pub side: Side,
    pub price: u32,
    pub quantity: u32,
    pub timestamp: u64,
}

impl OrderMessage {
    /// New resting limit order.
    #[inline]
    pub const fn add(order_id: u64, side: Side, price: u32, quantity: u32, timestamp: u64) -> Self {
        Self { kind: MessageKind::AddOrder, order_id, side, price, quantity, timestamp }
    }

    /// Cancel a resting order.
    #[inline]
    pub const fn cancel(order_id: u64, timestamp: u64) -> Self {
        Self { kind: MessageKind::CancelOrder, order_id, side: Side::Buy, price: 0, quantity: 0, timestamp }
    }

    /// Cancel-replace a resting order. The order loses time priority.
    #[inline]
    pub const fn modify(order_id: u64, new_price: u32, new_quantity: u32, timestamp: u64) -> Self {
        Self { kind: MessageKind::ModifyOrder, order_id, side: Side::Buy, price: new_price, quantity: new_quantity, timestamp }
    }

    /// Market order; sweeps the opposite side until filled or empty.
    #[inline]
    pub const fn market(order_id: u64, side: Side, quantity: u32, timestamp: u64) -> Self {
        Self { kind: MessageKind::MarketOrder, order_id, side, price: 0, quantity, timestamp }
    }

    /// Immediate-or-cancel at a limit price.
    #[inline]
    pub const fn ioc(order_id: u64, side: Side, limit_price: u32, quantity: u32, timestamp: u64) -> Self {
        Self { kind: MessageKind::IocOrder, order_id, side, price: limit_price, quantity, timestamp }
    }
}

// ============================================================================
// Output Events
// ============================================================================

/// An executed match between an aggressor and a resting order.
///
/// The resting order's id fills its own leg; the aggressor leg is `0`
/// (market and IOC aggressors have no durable id at the book level).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trade {
    pub buy_order_id: u64,
    pub sell_order_id: u64,
    pub price: u32,
    pub quantity: u32,
    pub timestamp: u64,
}

impl Trade {
    /// Build a trade record from the resting side of a match.
    #[inline]
    pub const fn from_resting(
        resting_side: Side,
        resting_order_id: u64,
        price: u32,
        quantity: u32,
        timestamp: u64,
    ) -> Self {
        match resting_side {
            Side::Buy => Self { buy_order_id: resting_order_id, sell_order_id: 0, price, quantity, timestamp },
            Side::Sell => Self { buy_order_id: 0, sell_order_id: resting_order_id, price, quantity, timestamp },
        }
    }
}

/// Lifecycle tag delivered with order-event callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderEvent {
    Added,
    Cancelled,
    Modified,
}

impl OrderEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderEvent::Added => "added",
            OrderEvent::Cancelled => "cancelled",
            OrderEvent::Modified => "modified",
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Per-message failure. The book state is unchanged by a failed operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookError {
    #[error("quantity must be nonzero")]
    InvalidQuantity,
    #[error("order id {0} is already live")]
    DuplicateOrderId(u64),
    #[error("order id {0} is not in the book")]
    UnknownOrderId(u64),
    #[error("order pool exhausted")]
    PoolExhausted,
}

/// Replay-log save/load failure.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("replay log i/o failed")]
    Io(#[from] std::io::Error),
    #[error("replay log is truncated")]
    Truncated,
    #[error("replay log contains no records")]
    Empty,
    #[error("replay log record malformed: {0}")]
    Malformed(String),
}

// ============================================================================
// Wire Format
// ============================================================================

/// Stable binary schema for the replay log.
///
/// Each record is exactly [`RECORD_SIZE`] bytes: tag (1), order_id (8),
/// side (1), price (4), quantity (4), timestamp (8), packed in that order
/// with every integer little-endian and no padding. The in-memory
/// [`OrderMessage`] is converted through the frozen `RecordV1` struct so
/// the public type can evolve without breaking saved logs.
pub mod wire {
    use super::{MessageKind, OrderMessage, ReplayError, Side};
    use bincode::Options;
    use serde::{Deserialize, Serialize};
    use std::io::{Read, Write};

    /// Exact on-disk size of one record.
    pub const RECORD_SIZE: usize = 26;

    #[derive(Serialize, Deserialize)]
    struct RecordV1 {
        tag: u8,
        order_id: u64,
        side: u8,
        price: u32,
        quantity: u32,
        timestamp: u64,
    }

    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_little_endian()
    }

    fn map_err(err: bincode::Error) -> ReplayError {
        match *err {
            bincode::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                ReplayError::Truncated
            }
            bincode::ErrorKind::Io(io) => ReplayError::Io(io),
            other => ReplayError::Malformed(other.to_string()),
        }
    }

    /// Append one record to `writer`.
    pub fn write_record<W: Write>(writer: &mut W, msg: &OrderMessage) -> Result<(), ReplayError> {
        let record = RecordV1 {
            tag: msg.kind as u8,
            order_id: msg.order_id,
            side: msg.side as u8,
            price: msg.price,
            quantity: msg.quantity,
            timestamp: msg.timestamp,
        };
        options().serialize_into(writer, &record).map_err(map_err)
    }

    /// Read one record from `reader`. Unknown tag or side bytes fail.
    pub fn read_record<R: Read>(reader: &mut R) -> Result<OrderMessage, ReplayError> {
        let record: RecordV1 = options().deserialize_from(reader).map_err(map_err)?;
        let kind = MessageKind::try_from(record.tag)
            .map_err(|tag| ReplayError::Malformed(format!("unknown message tag {:#04x}", tag)))?;
        let side = Side::try_from(record.side)
            .map_err(|side| ReplayError::Malformed(format!("unknown side byte {:#04x}", side)))?;
        Ok(OrderMessage {
            kind,
            order_id: record.order_id,
            side,
            price: record.price,
            quantity: record.quantity,
            timestamp: record.timestamp,
        })
    }

}
