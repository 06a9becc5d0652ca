//! Line-item operations on a cart document. Every write path goes through
//! these so quantities stay within `MIN_QUANTITY..=MAX_QUANTITY` and each
//! dish appears once.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 999;

fn clamp_quantity(quantity: i64) -> i64 {
    quantity.clamp(MIN_QUANTITY, MAX_QUANTITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub dish_id: Uuid,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(dish_id: Uuid, quantity: i64) -> Self {
        Self {
            dish_id,
            quantity: clamp_quantity(quantity),
        }
    }
}

/// Bumps an existing line by one or appends a new line with quantity one.
pub fn add_dish(items: &mut Vec<LineItem>, dish_id: Uuid) -> i64 {
    match items.iter_mut().find(|i| i.dish_id == dish_id) {
        Some(line) => {
            line.quantity = clamp_quantity(line.quantity.saturating_add(1));
            line.quantity
        }
        None => {
            items.push(LineItem::new(dish_id, 1));
            1
        }
    }
}

/// Applies `delta`, staying within the quantity bounds. Returns the new quantity, or
/// `None` if the dish is not in the cart.
pub fn change_quantity(items: &mut [LineItem], dish_id: Uuid, delta: i64) -> Option<i64> {
    let line = items.iter_mut().find(|i| i.dish_id == dish_id)?;
    line.quantity = clamp_quantity(line.quantity.saturating_add(delta));
    Some(line.quantity)
}

pub fn remove_dish(items: &mut Vec<LineItem>, dish_id: Uuid) -> bool {
    let before = items.len();
    items.retain(|i| i.dish_id != dish_id);
    items.len() != before
}

/// Clamps quantities and folds repeated dishes into their first line.
pub fn normalize(items: Vec<LineItem>) -> Vec<LineItem> {
    let mut out: Vec<LineItem> = Vec::with_capacity(items.len());
    for item in items {
        let quantity = clamp_quantity(item.quantity);
        match out.iter_mut().find(|i| i.dish_id == item.dish_id) {
            Some(line) => line.quantity = clamp_quantity(line.quantity.saturating_add(quantity)),
            None => out.push(LineItem::new(item.dish_id, quantity)),
        }
    }
    out
}

pub fn item_count(items: &[LineItem]) -> i64 {
    items
        .iter()
        .map(|i| i.quantity)
        .fold(0i64, i64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_appends_then_increments() {
        let dish = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut items = Vec::new();
        assert_eq!(add_dish(&mut items, dish), 1);
        assert_eq!(add_dish(&mut items, other), 1);
        assert_eq!(add_dish(&mut items, dish), 2);
        assert_eq!(items, vec![LineItem::new(dish, 2), LineItem::new(other, 1)]);
    }

    #[test]
    fn quantity_never_drops_below_one() {
        let dish = Uuid::new_v4();
        let mut items = vec![LineItem::new(dish, 2)];
        assert_eq!(change_quantity(&mut items, dish, -1), Some(1));
        assert_eq!(change_quantity(&mut items, dish, -1), Some(1));
        assert_eq!(change_quantity(&mut items, dish, -50), Some(1));
        assert_eq!(change_quantity(&mut items, dish, 3), Some(4));
        assert_eq!(change_quantity(&mut items, Uuid::new_v4(), 1), None);
    }

    #[test]
    fn removing_the_only_line_empties_the_cart() {
        let dish = Uuid::new_v4();
        let mut items = vec![LineItem::new(dish, 3)];
        assert!(remove_dish(&mut items, dish));
        assert!(items.is_empty());
        assert!(!remove_dish(&mut items, dish));
        assert_eq!(item_count(&items), 0);
    }

    #[test]
    fn normalize_clamps_and_merges_in_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let raw = vec![
            LineItem { dish_id: a, quantity: 0 },
            LineItem { dish_id: b, quantity: 2 },
            LineItem { dish_id: a, quantity: -4 },
            LineItem { dish_id: b, quantity: 1 },
        ];
        let items = normalize(raw);
        assert_eq!(items, vec![LineItem::new(a, 2), LineItem::new(b, 3)]);
        assert_eq!(item_count(&items), 5);
    }

    #[test]
    fn quantity_is_capped() {
        let dish = Uuid::new_v4();
        let mut items = vec![LineItem::new(dish, 1)];
        assert_eq!(change_quantity(&mut items, dish, i64::MAX), Some(MAX_QUANTITY));
        assert_eq!(add_dish(&mut items, dish), MAX_QUANTITY);
        assert_eq!(change_quantity(&mut items, dish, i64::MIN), Some(MIN_QUANTITY));

        let merged = normalize(vec![
            LineItem { dish_id: dish, quantity: i64::MAX },
            LineItem { dish_id: dish, quantity: 5 },
        ]);
        assert_eq!(merged, vec![LineItem::new(dish, MAX_QUANTITY)]);
    }
}
