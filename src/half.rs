use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::{Error, Fill, Order, OrderId, Owner, PriceLevel, PriceSize, Result, Side};

const INITIAL_ARENA_SIZE: usize = 256;

/// One side of the book.
///
/// Orders live in an arena and are recycled through a free list. Each price
/// level is a FIFO doubly linked list threaded through the arena, and the
/// levels themselves sit in a price-ordered map that never holds an empty
/// level.
#[derive(Debug)]
pub struct HalfBook {
    pub side: Side,
    levels: BTreeMap<Decimal, PriceLevel>,
    arena: Vec<Order>,
    free_list: Vec<usize>,
    ids: HashMap<OrderId, usize>,
}

impl HalfBook {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            arena: Vec::with_capacity(INITIAL_ARENA_SIZE),
            free_list: Vec::new(),
            ids: HashMap::with_capacity(INITIAL_ARENA_SIZE),
        }
    }

    pub fn insert(&mut self, id: OrderId, price: Decimal, size: i64, owner: Owner) -> Result<()> {
        if price <= Decimal::ZERO || size <= 0 {
            return Err(Error::InvalidOrder { price, size });
        }
        debug_assert!(!self.ids.contains_key(&id), "order {id} is already resting");

        let arena_index = match self.free_list.pop() {
            Some(arena_index) => arena_index,
            None => {
                self.arena.push(Order::default());
                self.arena.len() - 1
            }
        };

        // Append to level tail, creating the level if this is a new price.
        let level = self.levels.entry(price).or_default();
        level.total_size += size;
        level.order_count += 1;
        if level.head.is_none() {
            level.head = Some(arena_index);
        }
        let old_tail = level.tail.replace(arena_index);

        if let Some(tail_index) = old_tail {
            let Some(prev_order) = self.arena.get_mut(tail_index) else {
                return Err(Error::Arena {
                    index: tail_index,
                    id: None,
                });
            };
            prev_order.next = Some(arena_index);
        }

        let Some(order) = self.arena.get_mut(arena_index) else {
            return Err(Error::Arena {
                index: arena_index,
                id: Some(id),
            });
        };
        order.overwrite(id, price, size, owner, old_tail, None);

        self.ids.insert(id, arena_index);
        self.debug_check();

        Ok(())
    }

    /// Removes a single order. Returns `None` when the id is not resting on
    /// this side, which is the normal outcome for an order that has already
    /// been filled.
    pub fn remove(&mut self, id: OrderId) -> Result<Option<Order>> {
        let Some(arena_index) = self.ids.remove(&id) else {
            return Ok(None);
        };

        let Some(order) = self.arena.get(arena_index) else {
            return Err(Error::Arena {
                index: arena_index,
                id: Some(id),
            });
        };
        // these will prevent borrow issues
        let (price, size, prev, next) = (order.price, order.size, order.prev, order.next);

        let Some(level) = self.levels.get_mut(&price) else {
            return Err(Error::MissingLevel(price));
        };
        // if we were the first, shift the head to our next
        if level.head == Some(arena_index) {
            level.head = next;
        }
        // if we were the last, then the tail is our prev
        if level.tail == Some(arena_index) {
            level.tail = prev;
        }
        level.total_size -= size;
        level.order_count -= 1;
        let emptied = level.order_count == 0;

        self.remove_order_from_linked_list(prev, next)?;

        if emptied {
            self.levels.remove(&price);
        }

        let mut removed = self.release(arena_index)?;
        removed.prev = None;
        removed.next = None;

        self.debug_check();

        Ok(Some(removed))
    }

    /// Drops every order resting at `price`, whoever owns it, and returns
    /// their ids in queue order.
    pub fn remove_level(&mut self, price: Decimal) -> Result<Vec<OrderId>> {
        let Some(level) = self.levels.remove(&price) else {
            return Ok(Vec::new());
        };

        let mut removed = Vec::with_capacity(level.order_count);
        let mut cursor = level.head;
        while let Some(index) = cursor {
            let order = self.release(index)?;
            self.ids.remove(&order.id);
            removed.push(order.id);
            cursor = order.next;
        }

        self.debug_check();

        Ok(removed)
    }

    /// Walks the side from its best price outward, filling resting orders in
    /// time priority until `size` is used up or the side runs dry. Returns
    /// the filled size and notional. `on_fill` sees every matched segment
    /// while the level being consumed is still in the book.
    pub fn match_size(
        &mut self,
        mut size: i64,
        mut on_fill: impl FnMut(&Fill),
    ) -> Result<(i64, Decimal)> {
        let taker_side = self.side.opposite();
        let mut filled = 0;
        let mut notional = Decimal::ZERO;

        while size > 0 {
            let Some(price) = self.best_price() else {
                break;
            };

            // We repeatedly reborrow the price level in small scopes
            loop {
                let order_index = {
                    let Some(level) = self.levels.get(&price) else {
                        return Err(Error::MissingLevel(price));
                    };

                    if size <= 0 {
                        break;
                    }

                    level.head
                };

                let Some(order_index) = order_index else {
                    break;
                };

                let (fill, order_empty) = {
                    let Some(order) = self.arena.get_mut(order_index) else {
                        return Err(Error::Arena {
                            index: order_index,
                            id: None,
                        });
                    };

                    let traded = size.min(order.size);
                    order.size -= traded;

                    let fill = Fill {
                        order_id: order.id,
                        owner: order.owner,
                        price,
                        size: traded,
                        taker_side,
                    };
                    (fill, order.size == 0)
                };

                if let Some(level) = self.levels.get_mut(&price) {
                    level.total_size -= fill.size;
                }

                size -= fill.size;
                filled += fill.size;
                notional += Decimal::from(fill.size) * price;

                on_fill(&fill);

                if order_empty {
                    self.remove_head_of_price_level(price)?;
                    self.ids.remove(&fill.order_id);
                    self.release(order_index)?;
                }
            }

            let empty = self
                .levels
                .get(&price)
                .map(|level| level.head.is_none())
                .unwrap_or_default();

            if empty {
                self.levels.remove(&price);
            }
        }

        self.debug_check();

        Ok((filled, notional))
    }

    /// Highest bid or lowest ask.
    pub fn best_price(&self) -> Option<Decimal> {
        match self.side {
            Side::Buy => self.levels.keys().next_back().copied(),
            Side::Sell => self.levels.keys().next().copied(),
        }
    }

    pub fn get_top_of_book(&self) -> Option<PriceSize> {
        let price = self.best_price()?;
        self.levels.get(&price).map(|level| PriceSize {
            price,
            size: level.total_size,
        })
    }

    pub fn get_total_liquidity(&self) -> i64 {
        self.levels
            .values()
            .fold(0, |acc, level| acc + level.total_size)
    }

    /// Level prices, best first.
    pub fn prices(&self) -> Vec<Decimal> {
        match self.side {
            Side::Buy => self.levels.keys().rev().copied().collect(),
            Side::Sell => self.levels.keys().copied().collect(),
        }
    }

    pub fn level(&self, price: Decimal) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    /// Orders resting at `price` in fill priority.
    pub fn orders_at(&self, price: Decimal) -> Vec<&Order> {
        let mut orders = Vec::new();
        let mut cursor = self.levels.get(&price).and_then(|level| level.head);
        while let Some(order) = cursor.and_then(|index| self.arena.get(index)) {
            orders.push(order);
            cursor = order.next;
        }
        orders
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.ids.get(&id).and_then(|index| self.arena.get(*index))
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.ids.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn order_count(&self) -> usize {
        self.ids.len()
    }

    /// Panics if the structure is inconsistent: an empty level in the map,
    /// a non-positive resting size, a broken link, a stale cached total or an
    /// id map that disagrees with the arena.
    pub fn assert_invariants(&self) {
        let mut resting = 0;
        for (price, level) in &self.levels {
            assert!(
                level.order_count > 0 && level.head.is_some(),
                "empty {:?} level {} left in the book",
                self.side,
                price
            );

            let mut cursor = level.head;
            let mut prev = None;
            let mut count = 0;
            let mut total = 0;
            while let Some(index) = cursor {
                let order = &self.arena[index];
                assert!(order.size > 0, "order {} rests with size {}", order.id, order.size);
                assert_eq!(order.price, *price, "order {} is on the wrong level", order.id);
                assert_eq!(order.prev, prev, "order {} has a broken prev link", order.id);
                assert_eq!(self.ids.get(&order.id), Some(&index));
                total += order.size;
                count += 1;
                prev = Some(index);
                cursor = order.next;
            }

            assert_eq!(level.tail, prev, "level {price} tail is stale");
            assert_eq!(level.order_count, count, "level {price} count is stale");
            assert_eq!(level.total_size, total, "level {price} total is stale");
            resting += count;
        }
        assert_eq!(resting, self.ids.len(), "id map disagrees with the levels");
    }

    fn debug_check(&self) {
        if cfg!(debug_assertions) {
            self.assert_invariants();
        }
    }

    /// Takes the order out of its arena slot and puts the slot on the free
    /// list. Links are left as they were so callers can keep walking.
    fn release(&mut self, index: usize) -> Result<Order> {
        let Some(slot) = self.arena.get_mut(index) else {
            return Err(Error::Arena { index, id: None });
        };
        let order = std::mem::take(slot);
        self.free_list.push(index);
        Ok(order)
    }

    /// Given an orders previous and next order pointers,
    /// access those orders and connect them so that
    /// order.prev.next -> order.next
    /// order.next.prev -> order.prev
    fn remove_order_from_linked_list(
        &mut self,
        prev: Option<usize>,
        next: Option<usize>,
    ) -> Result<()> {
        if let Some(prev) = prev {
            let Some(prev_order) = self.arena.get_mut(prev) else {
                return Err(Error::Arena {
                    index: prev,
                    id: None,
                });
            };
            prev_order.next = next;
        }

        if let Some(next) = next {
            let Some(next_order) = self.arena.get_mut(next) else {
                return Err(Error::Arena {
                    index: next,
                    id: None,
                });
            };
            next_order.prev = prev;
        }

        Ok(())
    }

    /// Given a price, unlink the head order and keep the order chain up to
    /// date. The level itself stays in the map even if this empties it.
    fn remove_head_of_price_level(&mut self, price: Decimal) -> Result<()> {
        let Some(level) = self.levels.get_mut(&price) else {
            return Err(Error::MissingLevel(price));
        };

        if let Some(head_index) = level.head {
            let Some(head_order) = self.arena.get(head_index) else {
                return Err(Error::Arena {
                    index: head_index,
                    id: None,
                });
            };
            let next = head_order.next;
            level.total_size -= head_order.size;
            level.order_count -= 1;

            if level.tail == Some(head_index) {
                level.tail = None;
            }
            level.head = next;

            self.remove_order_from_linked_list(None, next)?;
        }

        Ok(())
    }
}
