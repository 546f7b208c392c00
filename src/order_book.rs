//! Order book - dual fixed ladders with directory-accelerated matching.
//!
//! Each side is a fixed array of price levels indexed by tick offset, with
//! a [`BitDirectory`] tracking occupancy. Both ladders put their best price
//! at the lowest occupied index: bids map higher prices to lower indices,
//! asks map lower prices to lower indices, so every best-price or sweep
//! query is an ascending directory scan.
//!
//! The ladders are symmetric around `BASE_PRICE` and cover
//! `[LADDER_BOTTOM, LADDER_TOP]`. Prices outside that range clamp to the
//! boundary index.
//!
//! A book is owned by a single execution context; it is deliberately not
//! `Sync` and must not be shared across threads.

use std::cell::Cell;

use rustc_hash::FxHashMap;

use crate::config::{LADDER_BOTTOM, LADDER_TOP, MAX_PRICE_LEVELS, MIN_PRICE_TICK, TRADE_POOL_RATIO};
use crate::directory::{BitDirectory, NO_LEVEL};
use crate::message::{BookError, OrderType, Side, Trade};
use crate::pool::{OrderIndex, Pool};
use crate::price_level::PriceLevel;

pub struct OrderBook {
    buy_levels: Box<[PriceLevel]>,
    sell_levels: Box<[PriceLevel]>,
    buy_directory: BitDirectory,
    sell_directory: BitDirectory,
    pool: Pool,
    /// Live order ids to pool slots, pre-reserved to pool capacity.
    orders: FxHashMap<u64, OrderIndex>,
    // Lazy best-price cache. Mutations invalidate; queries refresh on
    // demand, so the fields are interior-mutable behind `&self` getters.
    best_bid_idx: Cell<u32>,
    best_ask_idx: Cell<u32>,
    best_bid_valid: Cell<bool>,
    best_ask_valid: Cell<bool>,
    orders_processed: u64,
    trades_executed: u64,
    volume_traded: u64,
    /// Scratch for ids filled during a sweep, reused across calls.
    filled_ids: Vec<u64>,
}

impl OrderBook {
    /// Create a book backed by `pool_capacity` pre-allocated order slots.
    pub fn new(pool_capacity: u32) -> Self {
        Self {
            buy_levels: vec![PriceLevel::new(); MAX_PRICE_LEVELS as usize].into_boxed_slice(),
            sell_levels: vec![PriceLevel::new(); MAX_PRICE_LEVELS as usize].into_boxed_slice(),
            buy_directory: BitDirectory::new(),
            sell_directory: BitDirectory::new(),
            pool: Pool::new(pool_capacity),
            orders: FxHashMap::with_capacity_and_hasher(pool_capacity as usize, Default::default()),
            best_bid_idx: Cell::new(NO_LEVEL),
            best_ask_idx: Cell::new(NO_LEVEL),
            best_bid_valid: Cell::new(false),
            best_ask_valid: Cell::new(false),
            orders_processed: 0,
            trades_executed: 0,
            volume_traded: 0,
            filled_ids: Vec::with_capacity((pool_capacity / TRADE_POOL_RATIO).max(16) as usize),
        }
    }

    // ========================================================================
    // Price <-> ladder index conversions
    // ========================================================================

    /// Bid ladder index for a price. Index 0 is the highest representable
    /// bid; out-of-range prices clamp to the boundary index.
    #[inline]
    pub fn price_to_buy_index(price: u32) -> u32 {
        if price > LADDER_TOP {
            return 0;
        }
        if price < LADDER_BOTTOM {
            return MAX_PRICE_LEVELS - 1;
        }
        (LADDER_TOP - price) / MIN_PRICE_TICK
    }

    /// Ask ladder index for a price. Index 0 is the lowest representable
    /// ask; out-of-range prices clamp to the boundary index.
    #[inline]
    pub fn price_to_sell_index(price: u32) -> u32 {
        if price < LADDER_BOTTOM {
            return 0;
        }
        if price > LADDER_TOP {
            return MAX_PRICE_LEVELS - 1;
        }
        (price - LADDER_BOTTOM) / MIN_PRICE_TICK
    }

    /// Price at a bid ladder index; `0` for the out-of-ladder sentinel.
    #[inline]
    pub fn buy_index_to_price(index: u32) -> u32 {
        if index >= MAX_PRICE_LEVELS {
            return 0;
        }
        LADDER_TOP - index * MIN_PRICE_TICK
    }

    /// Price at an ask ladder index; `u32::MAX` for the sentinel.
    #[inline]
    pub fn sell_index_to_price(index: u32) -> u32 {
        if index >= MAX_PRICE_LEVELS {
            return u32::MAX;
        }
        LADDER_BOTTOM + index * MIN_PRICE_TICK
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert a resting limit order.
    ///
    /// Fails with `InvalidQuantity`, `DuplicateOrderId`, or
    /// `PoolExhausted`; the book is unchanged on failure.
    pub fn add_limit(
        &mut self,
        order_id: u64,
        side: Side,
        price: u32,
        quantity: u32,
        timestamp: u64,
    ) -> Result<(), BookError> {
        if quantity == 0 {
            return Err(BookError::InvalidQuantity);
        }
        if self.orders.contains_key(&order_id) {
            return Err(BookError::DuplicateOrderId(order_id));
        }
        let index = self.pool.acquire().ok_or(BookError::PoolExhausted)?;
        self.pool
            .get_mut(index)
            .reset(order_id, price, quantity, side, OrderType::Limit, timestamp);

        let level_idx = match side {
            Side::Buy => Self::price_to_buy_index(price),
            Side::Sell => Self::price_to_sell_index(price),
        };
        let level_price = match side {
            Side::Buy => Self::buy_index_to_price(level_idx),
            Side::Sell => Self::sell_index_to_price(level_idx),
        };
        let (levels, directory) = match side {
            Side::Buy => (&mut self.buy_levels, &mut self.buy_directory),
            Side::Sell => (&mut self.sell_levels, &mut self.sell_directory),
        };

        let level = &mut levels[level_idx as usize];
        if !level.has_orders() {
            level.set_price(level_price);
        }
        level.push_back(&mut self.pool, index);
        directory.set(level_idx);

        self.orders.insert(order_id, index);
        self.invalidate_best_prices();
        self.orders_processed += 1;
        Ok(())
    }

    /// Remove a resting order. Fails with `UnknownOrderId`.
    pub fn cancel(&mut self, order_id: u64) -> Result<(), BookError> {
        let index = self
            .orders
            .remove(&order_id)
            .ok_or(BookError::UnknownOrderId(order_id))?;

        let (side, price) = {
            let order = self.pool.get(index);
            (order.side, order.price)
        };
        let level_idx = match side {
            Side::Buy => Self::price_to_buy_index(price),
            Side::Sell => Self::price_to_sell_index(price),
        };
        let (levels, directory) = match side {
            Side::Buy => (&mut self.buy_levels, &mut self.buy_directory),
            Side::Sell => (&mut self.sell_levels, &mut self.sell_directory),
        };

        let level = &mut levels[level_idx as usize];
        level.remove(&mut self.pool, index);
        if level.is_empty() {
            directory.clear(level_idx);
        }

        self.pool.release(index);
        self.invalidate_best_prices();
        Ok(())
    }

    /// Cancel-replace. The order keeps its id but loses time priority,
    /// even when neither price nor quantity changes.
    ///
    /// Both failure modes are checked before the cancel, so a failed
    /// modify leaves the book untouched.
    pub fn modify(
        &mut self,
        order_id: u64,
        new_price: u32,
        new_quantity: u32,
        timestamp: u64,
    ) -> Result<(), BookError> {
        let index = *self
            .orders
            .get(&order_id)
            .ok_or(BookError::UnknownOrderId(order_id))?;
        if new_quantity == 0 {
            return Err(BookError::InvalidQuantity);
        }
        let side = self.pool.get(index).side;

        self.cancel(order_id)?;
        self.add_limit(order_id, side, new_price, new_quantity, timestamp)
    }

    /// Fill `quantity` against the opposite side at any price.
    ///
    /// Trades land in `trades` in price-time order. Returns the filled
    /// quantity; an unfilled remainder is discarded (market orders do not
    /// rest).
    pub fn execute_market(
        &mut self,
        side: Side,
        quantity: u32,
        timestamp: u64,
        trades: &mut Vec<Trade>,
    ) -> u32 {
        self.sweep(side, None, quantity, timestamp, trades)
    }

    /// Fill `quantity` against the opposite side up to `limit_price`
    /// inclusive (a buy matches asks at or below it, a sell matches bids
    /// at or above it). The unfilled remainder is discarded.
    pub fn execute_ioc(
        &mut self,
        side: Side,
        limit_price: u32,
        quantity: u32,
        timestamp: u64,
        trades: &mut Vec<Trade>,
    ) -> u32 {
        self.sweep(side, Some(limit_price), quantity, timestamp, trades)
    }

    /// Walk the opposite ladder best-to-worst, executing at each occupied
    /// level until the quantity is exhausted, the side drains, or the
    /// limit price is violated.
    fn sweep(
        &mut self,
        aggressor: Side,
        limit_price: Option<u32>,
        quantity: u32,
        timestamp: u64,
        trades: &mut Vec<Trade>,
    ) -> u32 {
        let (levels, directory, resting_side) = match aggressor {
            Side::Buy => (&mut self.sell_levels, &mut self.sell_directory, Side::Sell),
            Side::Sell => (&mut self.buy_levels, &mut self.buy_directory, Side::Buy),
        };

        let mut remaining = quantity;
        let mut total_filled = 0u32;
        let mut index = directory.lowest_set();

        while remaining > 0 && index < MAX_PRICE_LEVELS {
            if let Some(limit) = limit_price {
                let level_price = match resting_side {
                    Side::Sell => Self::sell_index_to_price(index),
                    Side::Buy => Self::buy_index_to_price(index),
                };
                let violates = match aggressor {
                    Side::Buy => level_price > limit,
                    Side::Sell => level_price < limit,
                };
                if violates {
                    break;
                }
            }

            let level = &mut levels[index as usize];
            if level.has_orders() {
                let filled = level.execute(
                    &mut self.pool,
                    remaining,
                    resting_side,
                    timestamp,
                    trades,
                    &mut self.filled_ids,
                );
                total_filled += filled;
                remaining -= filled;
                if level.is_empty() {
                    directory.clear(index);
                }
            }
            index = directory.next_higher(index);
        }

        for order_id in self.filled_ids.drain(..) {
            self.orders.remove(&order_id);
        }

        if total_filled > 0 {
            self.trades_executed += 1;
            self.volume_traded += total_filled as u64;
            self.invalidate_best_prices();
        }
        total_filled
    }

    // ========================================================================
    // Best-price queries (lazy cache)
    // ========================================================================

    #[inline]
    fn invalidate_best_prices(&self) {
        self.best_bid_valid.set(false);
        self.best_ask_valid.set(false);
    }

    #[inline]
    fn refresh_best_bid(&self) {
        self.best_bid_idx.set(self.buy_directory.lowest_set());
        self.best_bid_valid.set(true);
    }

    #[inline]
    fn refresh_best_ask(&self) {
        self.best_ask_idx.set(self.sell_directory.lowest_set());
        self.best_ask_valid.set(true);
    }

    /// Highest resting buy price, or `0` when there are no bids.
    #[inline]
    pub fn best_bid(&self) -> u32 {
        if !self.best_bid_valid.get() {
            self.refresh_best_bid();
        }
        Self::buy_index_to_price(self.best_bid_idx.get())
    }

    /// Lowest resting sell price, or `u32::MAX` when there are no asks.
    #[inline]
    pub fn best_ask(&self) -> u32 {
        if !self.best_ask_valid.get() {
            self.refresh_best_ask();
        }
        Self::sell_index_to_price(self.best_ask_idx.get())
    }

    /// Total resting quantity at the best bid, or `0`.
    #[inline]
    pub fn best_bid_qty(&self) -> u32 {
        if !self.best_bid_valid.get() {
            self.refresh_best_bid();
        }
        let index = self.best_bid_idx.get();
        if index >= MAX_PRICE_LEVELS {
            return 0;
        }
        self.buy_levels[index as usize].total_qty()
    }

    /// Total resting quantity at the best ask, or `0`.
    #[inline]
    pub fn best_ask_qty(&self) -> u32 {
        if !self.best_ask_valid.get() {
            self.refresh_best_ask();
        }
        let index = self.best_ask_idx.get();
        if index >= MAX_PRICE_LEVELS {
            return 0;
        }
        self.sell_levels[index as usize].total_qty()
    }

    /// Invariant diagnostic: both sides present and `best_bid >= best_ask`.
    /// A crossed book must not persist after matching completes.
    pub fn is_crossed(&self) -> bool {
        let bid = self.best_bid();
        let ask = self.best_ask();
        bid != 0 && ask != u32::MAX && bid >= ask
    }

    /// `best_ask - best_bid` when both sides are present and not crossed.
    pub fn spread(&self) -> Option<u32> {
        let bid = self.best_bid();
        let ask = self.best_ask();
        if bid != 0 && ask != u32::MAX && ask > bid {
            Some(ask - bid)
        } else {
            None
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Up to `levels` best price levels per side as `(price, quantity)`,
    /// best first.
    pub fn market_depth(&self, levels: u32) -> (Vec<(u32, u32)>, Vec<(u32, u32)>) {
        let mut bids = Vec::with_capacity(levels as usize);
        let mut asks = Vec::with_capacity(levels as usize);

        let mut index = self.buy_directory.lowest_set();
        while index < MAX_PRICE_LEVELS && (bids.len() as u32) < levels {
            let level = &self.buy_levels[index as usize];
            if level.has_orders() {
                bids.push((level.price(), level.total_qty()));
            }
            index = self.buy_directory.next_higher(index);
        }

        let mut index = self.sell_directory.lowest_set();
        while index < MAX_PRICE_LEVELS && (asks.len() as u32) < levels {
            let level = &self.sell_levels[index as usize];
            if level.has_orders() {
                asks.push((level.price(), level.total_qty()));
            }
            index = self.sell_directory.next_higher(index);
        }

        (bids, asks)
    }

    /// The level a price maps to on the given side (after clamping).
    pub fn price_level(&self, side: Side, price: u32) -> &PriceLevel {
        match side {
            Side::Buy => &self.buy_levels[Self::price_to_buy_index(price) as usize],
            Side::Sell => &self.sell_levels[Self::price_to_sell_index(price) as usize],
        }
    }

    #[inline]
    pub fn contains_order(&self, order_id: u64) -> bool {
        self.orders.contains_key(&order_id)
    }

    /// Side of a resting order, if the id is live.
    #[inline]
    pub fn order_side(&self, order_id: u64) -> Option<Side> {
        self.orders.get(&order_id).map(|&index| self.pool.get(index).side)
    }

    /// Number of live resting orders.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Sum of `remaining_qty` over every resting order.
    pub fn total_resting_qty(&self) -> u64 {
        self.orders
            .values()
            .map(|&index| self.pool.get(index).remaining_qty as u64)
            .sum()
    }

    #[inline]
    pub fn orders_processed(&self) -> u64 {
        self.orders_processed
    }

    #[inline]
    pub fn trades_executed(&self) -> u64 {
        self.trades_executed
    }

    #[inline]
    pub fn volume_traded(&self) -> u64 {
        self.volume_traded
    }

    #[inline]
    pub fn pool_allocated(&self) -> u32 {
        self.pool.allocated()
    }

    /// Pre-fault the pool's pages (see [`Pool::warm_up`]).
    pub fn warm_up(&mut self) {
        self.pool.warm_up();
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drop every order and reset all statistics and caches.
    pub fn clear(&mut self) {
        for level in self.buy_levels.iter_mut() {
            level.clear();
        }
        for level in self.sell_levels.iter_mut() {
            level.clear();
        }
        self.buy_directory.clear_all();
        self.sell_directory.clear_all();
        self.orders.clear();
        self.pool.reset();
        self.invalidate_best_prices();
        self.reset_stats();
    }

    pub fn reset_stats(&mut self) {
        self.orders_processed = 0;
        self.trades_executed = 0;
        self.volume_traded = 0;
    }

    /// Full structural integrity check. `false` indicates a bug; a book
    /// that fails validation must not be driven further.
    ///
    /// Checks directory coherence, directory/level agreement, per-level
    /// aggregates, the id index, and pool accounting.
    pub fn validate(&self) -> bool {
        if !self.buy_directory.validate() || !self.sell_directory.validate() {
            return false;
        }

        let mut linked = 0u64;
        for index in 0..MAX_PRICE_LEVELS {
            let bid_level = &self.buy_levels[index as usize];
            let ask_level = &self.sell_levels[index as usize];
            if self.buy_directory.test(index) != bid_level.has_orders() {
                return false;
            }
            if self.sell_directory.test(index) != ask_level.has_orders() {
                return false;
            }
            if !bid_level.validate(&self.pool) || !ask_level.validate(&self.pool) {
                return false;
            }
            linked += (bid_level.order_count() + ask_level.order_count()) as u64;
        }

        if linked != self.orders.len() as u64 || linked != self.pool.allocated() as u64 {
            return false;
        }

        self.orders
            .iter()
            .all(|(&id, &index)| self.pool.get(index).order_id == id)
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("order_count", &self.orders.len())
            .field("volume_traded", &self.volume_traded)
            .finish()
    }
}
