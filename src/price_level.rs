//! Price level - the FIFO queue of resting orders at one tick.
//!
//! A singly-linked intrusive list threaded through the pool's `next`
//! field, with aggregate quantity and count maintained inline. Orders
//! match strictly in arrival order (price-time priority).

use crate::message::{Side, Trade};
use crate::pool::{OrderIndex, Pool, NULL_INDEX};

#[derive(Clone, Copy, Debug)]
pub struct PriceLevel {
    head: OrderIndex,
    tail: OrderIndex,
    price: u32,
    total_qty: u32,
    order_count: u32,
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceLevel {
    pub const fn new() -> Self {
        Self {
            head: NULL_INDEX,
            tail: NULL_INDEX,
            price: 0,
            total_qty: 0,
            order_count: 0,
        }
    }

    /// Canonical tick price of this level. Meaningful only while occupied;
    /// assigned by the book when the level first gains an order.
    #[inline]
    pub const fn price(&self) -> u32 {
        self.price
    }

    #[inline]
    pub fn set_price(&mut self, price: u32) {
        self.price = price;
    }

    #[inline]
    pub const fn total_qty(&self) -> u32 {
        self.total_qty
    }

    #[inline]
    pub const fn order_count(&self) -> u32 {
        self.order_count
    }

    #[inline]
    pub const fn has_orders(&self) -> bool {
        self.head != NULL_INDEX
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.head == NULL_INDEX
    }

    /// Pool index of the first order in the queue, or [`NULL_INDEX`].
    #[inline]
    pub const fn head(&self) -> OrderIndex {
        self.head
    }

    /// Append an order at the back of the queue.
    #[inline]
    pub fn push_back(&mut self, pool: &mut Pool, index: OrderIndex) {
        let qty = {
            let order = pool.get_mut(index);
            order.next = NULL_INDEX;
            order.remaining_qty
        };

        if self.tail == NULL_INDEX {
            debug_assert!(self.head == NULL_INDEX);
            self.head = index;
            self.tail = index;
        } else {
            pool.get_mut(self.tail).next = index;
            self.tail = index;
        }

        self.total_qty += qty;
        self.order_count += 1;
    }

    /// Unlink an order from anywhere in the queue (cancel path).
    ///
    /// Linear scan; levels are short in practice and cancels are off the
    /// matching path. The slot is not released; the caller owns that.
    pub fn remove(&mut self, pool: &mut Pool, index: OrderIndex) {
        if self.head == NULL_INDEX {
            return;
        }

        let remaining = pool.get(index).remaining_qty;

        if self.head == index {
            self.head = pool.get(index).next;
            if self.head == NULL_INDEX {
                self.tail = NULL_INDEX;
            }
        } else {
            let mut curr = self.head;
            loop {
                let next = pool.get(curr).next;
                if next == NULL_INDEX {
                    return; // not linked here
                }
                if next == index {
                    let after = pool.get(index).next;
                    pool.get_mut(curr).next = after;
                    if after == NULL_INDEX {
                        self.tail = curr;
                    }
                    break;
                }
                curr = next;
            }
        }

        pool.get_mut(index).next = NULL_INDEX;
        self.total_qty -= remaining;
        self.order_count -= 1;
    }

    /// Match up to `quantity` against the queue head-first.
    ///
    /// Each fill appends a trade at this level's price with the resting
    /// order on its own leg and `0` on the aggressor leg. Fully filled
    /// orders are unlinked, released to the pool, and their ids pushed to
    /// `filled_ids` so the book can drop them from its index.
    ///
    /// Returns the total quantity executed.
    pub fn execute(
        &mut self,
        pool: &mut Pool,
        quantity: u32,
        resting_side: Side,
        timestamp: u64,
        trades: &mut Vec<Trade>,
        filled_ids: &mut Vec<u64>,
    ) -> u32 {
        let mut remaining = quantity;
        let mut executed = 0u32;

        while self.head != NULL_INDEX && remaining > 0 {
            let head = self.head;
            let fill = pool.get_mut(head).fill(remaining);
            executed += fill;
            remaining -= fill;
            self.total_qty -= fill;

            let order = pool.get(head);
            if fill > 0 {
                trades.push(Trade::from_resting(resting_side, order.order_id, self.price, fill, timestamp));
            }

            if order.is_filled() {
                let next = order.next;
                filled_ids.push(order.order_id);
                pool.release(head);
                self.head = next;
                if next == NULL_INDEX {
                    self.tail = NULL_INDEX;
                }
                self.order_count -= 1;
            }
        }

        executed
    }

    /// Drop all linkage and aggregates. Slot reclamation is the pool's
    /// job (the book calls this only alongside a pool reset).
    pub fn clear(&mut self) {
        self.head = NULL_INDEX;
        self.tail = NULL_INDEX;
        self.price = 0;
        self.total_qty = 0;
        self.order_count = 0;
    }

    /// Walk the queue and check the aggregate invariants:
    /// the stored quantity and count match the linked orders, emptiness is
    /// consistent, and no linked order is fully filled.
    pub fn validate(&self, pool: &Pool) -> bool {
        if self.is_empty() {
            return self.total_qty == 0 && self.order_count == 0 && self.tail == NULL_INDEX;
        }

        let mut qty = 0u64;
        let mut count = 0u32;
        let mut curr = self.head;
        let mut last = NULL_INDEX;
        while curr != NULL_INDEX {
            let order = pool.get(curr);
            if order.remaining_qty == 0 {
                return false;
            }
            qty += order.remaining_qty as u64;
            count += 1;
            last = curr;
            curr = order.next;
        }

        qty == self.total_qty as u64 && count == self.order_count && last == self.tail
    }
}
