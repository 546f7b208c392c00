//! Compile-time policy surface: ladder geometry and pool sizing.
//!
//! The ladder dimensions must be compile-time constants so the bit
//! directory can be a fixed struct with no indirection. Pool capacity is
//! a constructor argument; everything else lives here.

/// Number of price levels per side. Must be a power of two, a multiple
/// of 64, and at most 4096 (the two-level directory covers 64 * 64 bits).
pub const MAX_PRICE_LEVELS: u32 = 4096;

/// Tick value at the center of the ladder.
pub const BASE_PRICE: u32 = 50_000;

/// Tick size in price units.
pub const MIN_PRICE_TICK: u32 = 1;

/// Order slots pre-allocated by `Engine::default`.
pub const DEFAULT_POOL_CAPACITY: u32 = 1_000_000;

/// Ratio of order slots to pre-reserved trade records.
pub const TRADE_POOL_RATIO: u32 = 10;

/// Number of 64-bit chunks in the fine level of the directory.
pub const LEVEL_CHUNKS: usize = (MAX_PRICE_LEVELS / 64) as usize;

/// Highest price representable on either ladder.
pub const LADDER_TOP: u32 = BASE_PRICE + (MAX_PRICE_LEVELS / 2 - 1) * MIN_PRICE_TICK;

/// Lowest price representable on either ladder.
pub const LADDER_BOTTOM: u32 = BASE_PRICE - (MAX_PRICE_LEVELS / 2) * MIN_PRICE_TICK;

const _: () = assert!(MAX_PRICE_LEVELS.is_power_of_two(), "ladder width must be a power of two");
const _: () = assert!(MAX_PRICE_LEVELS <= 4096, "ladder width exceeds directory capacity");
const _: () = assert!(MAX_PRICE_LEVELS % 64 == 0, "ladder width must be a multiple of 64");
const _: () = assert!(MIN_PRICE_TICK > 0, "tick size must be positive");
const _: () = assert!(
    BASE_PRICE > (MAX_PRICE_LEVELS / 2) * MIN_PRICE_TICK,
    "base price too low for a symmetric ladder"
);
const _: () = assert!(DEFAULT_POOL_CAPACITY > 0, "pool capacity must be positive");
const _: () = assert!(TRADE_POOL_RATIO > 0, "trade pool ratio must be positive");
