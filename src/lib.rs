//! # bitlob
//!
//! A deterministic, single-symbol limit order book matching engine.
//!
//! ## Design Principles
//!
//! - **Single-Owner**: one execution context owns a book exclusively (no locks)
//! - **Tick Ladder**: fixed arrays indexed by tick offset, O(1) level access
//! - **Bitset Directory**: two-level 64x64 index finds the best price in
//!   a pair of trailing-zero instructions
//! - **Pool Allocation**: no heap traffic on the add/cancel/match path
//! - **Deterministic Replay**: recorded message logs reproduce identical
//!   book state and trade streams
//!
//! ## Architecture
//!
//! ```text
//! [Feed Decoder] --> [Engine::process] --> [OrderBook]
//!                          |                  |-- Pool (order slots)
//!                   [Trade/Order events]      |-- PriceLevel ladders
//!                                             `-- BitDirectory per side
//! ```

pub mod config;
pub mod directory;
pub mod engine;
pub mod message;
pub mod order_book;
pub mod pool;
pub mod price_level;

// Re-exports for convenience
pub use directory::{BitDirectory, NO_LEVEL};
pub use engine::Engine;
pub use message::{
    BookError, MessageKind, OrderEvent, OrderMessage, OrderType, ReplayError, Side, Trade,
};
pub use order_book::OrderBook;
pub use pool::{Order, OrderIndex, Pool, NULL_INDEX};
pub use price_level::PriceLevel;
