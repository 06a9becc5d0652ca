use std::collections::{HashMap, HashSet};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CartLineResponse, CartView},
    model::{self, LineItem},
    pricing::{self, Bill},
    repo::{Cart, Expect},
};
use crate::{
    catalog::{repo::Dish, services::dish_response},
    error::{AppError, AppResult},
    state::AppState,
};

/// Optimistic attempts for add-to-cart before giving up on a busy cart.
const ADD_ATTEMPTS: usize = 3;

/// A cart line joined with the dish it currently points at.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub dish: Dish,
    pub quantity: i64,
}

/// Cart document with lines resolved against the catalog. Lines whose
/// dish no longer exists are dropped.
#[derive(Debug, Clone, Default)]
pub struct JoinedCart {
    pub lines: Vec<CartLine>,
    pub version: i64,
}

impl JoinedCart {
    pub fn items(&self) -> Vec<LineItem> {
        self.lines
            .iter()
            .map(|l| LineItem::new(l.dish.id, l.quantity))
            .collect()
    }

    pub fn subtotal(&self) -> i64 {
        pricing::subtotal(self.lines.iter().map(|l| (l.dish.price, l.quantity)))
    }

    fn exists(&self) -> bool {
        self.version > 0
    }
}

async fn join(state: &AppState, cart: Option<Cart>) -> AppResult<JoinedCart> {
    let Some(cart) = cart else {
        return Ok(JoinedCart::default());
    };
    let ids: Vec<Uuid> = cart.items.iter().map(|i| i.dish_id).collect();
    let mut dishes: HashMap<Uuid, Dish> = state
        .dishes
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();

    let lines: Vec<CartLine> = cart
        .items
        .iter()
        .filter_map(|item| {
            dishes.remove(&item.dish_id).map(|dish| CartLine {
                dish,
                quantity: item.quantity,
            })
        })
        .collect();

    if lines.len() != cart.items.len() {
        debug!(
            user_id = %cart.user_id,
            dropped = cart.items.len() - lines.len(),
            "cart lines without a dish dropped"
        );
    }
    Ok(JoinedCart {
        lines,
        version: cart.version,
    })
}

pub async fn load_joined(state: &AppState, user_id: Uuid) -> AppResult<JoinedCart> {
    let cart = state.carts.get(user_id).await?;
    join(state, cart).await
}

async fn render(state: &AppState, joined: &JoinedCart) -> CartView {
    let mut items = Vec::with_capacity(joined.lines.len());
    for line in &joined.lines {
        items.push(CartLineResponse {
            dish: dish_response(state, &line.dish).await,
            quantity: line.quantity,
            line_total: line.dish.price.saturating_mul(line.quantity),
        });
    }
    CartView {
        bill: Bill::compute(joined.subtotal(), &state.config.pricing),
        item_count: joined.lines.iter().map(|l| l.quantity).fold(0, i64::saturating_add),
        version: joined.version,
        checkout_enabled: !joined.lines.is_empty(),
        items,
    }
}

/// Writes the list and returns the fresh view, or 409 when `expect` fails.
async fn write(
    state: &AppState,
    user_id: Uuid,
    items: &[LineItem],
    expect: Expect,
) -> AppResult<CartView> {
    let saved = state
        .carts
        .save(user_id, items, expect)
        .await?
        .ok_or_else(|| {
            warn!(%user_id, ?expect, "stale cart write rejected");
            AppError::Conflict("Cart was changed by another request".into())
        })?;
    let joined = join(state, Some(saved)).await?;
    Ok(render(state, &joined).await)
}

#[instrument(skip(state))]
pub async fn view(state: &AppState, user_id: Uuid) -> AppResult<CartView> {
    let joined = load_joined(state, user_id).await?;
    Ok(render(state, &joined).await)
}

#[instrument(skip(state))]
pub async fn count(state: &AppState, user_id: Uuid) -> AppResult<i64> {
    let cart = state.carts.get(user_id).await?;
    Ok(cart.map(|c| model::item_count(&c.items)).unwrap_or(0))
}

#[instrument(skip(state))]
pub async fn add_item(state: &AppState, user_id: Uuid, dish_id: Uuid) -> AppResult<CartView> {
    let dish = state
        .dishes
        .get(dish_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Dish not found".into()))?;
    if !dish.available {
        warn!(%user_id, %dish_id, "add of unavailable dish");
        return Err(AppError::Conflict("Dish is not available".into()));
    }

    for attempt in 1..=ADD_ATTEMPTS {
        let cart = state.carts.get(user_id).await?;
        let (mut items, expect) = match cart {
            Some(c) => (c.items, Expect::Version(c.version)),
            None => (Vec::new(), Expect::Absent),
        };
        let quantity = model::add_dish(&mut items, dish_id);

        if let Some(saved) = state.carts.save(user_id, &items, expect).await? {
            info!(%user_id, %dish_id, quantity, "dish added to cart");
            let joined = join(state, Some(saved)).await?;
            return Ok(render(state, &joined).await);
        }
        debug!(%user_id, attempt, "cart changed underneath add; retrying");
    }

    warn!(%user_id, %dish_id, "add to cart gave up after repeated races");
    Err(AppError::Conflict("Cart is busy, please try again".into()))
}

#[instrument(skip(state))]
pub async fn change_quantity(
    state: &AppState,
    user_id: Uuid,
    dish_id: Uuid,
    delta: i64,
    version: Option<i64>,
) -> AppResult<CartView> {
    let joined = load_joined(state, user_id).await?;
    if !joined.exists() {
        return Err(AppError::NotFound("Cart not found".into()));
    }
    let mut items = joined.items();
    let quantity = model::change_quantity(&mut items, dish_id, delta)
        .ok_or_else(|| AppError::NotFound("Dish is not in the cart".into()))?;
    debug!(%user_id, %dish_id, quantity, "quantity changed");
    write(state, user_id, &items, Expect::from_read(version)).await
}

/// Removes a line from the stored document, including one whose dish has
/// since left the catalog.
#[instrument(skip(state))]
pub async fn remove_item(
    state: &AppState,
    user_id: Uuid,
    dish_id: Uuid,
    version: Option<i64>,
) -> AppResult<CartView> {
    let cart = state
        .carts
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".into()))?;
    if !cart.items.iter().any(|i| i.dish_id == dish_id) {
        return Err(AppError::NotFound("Dish is not in the cart".into()));
    }
    let joined = join(state, Some(cart)).await?;
    let mut items = joined.items();
    model::remove_dish(&mut items, dish_id);
    info!(%user_id, %dish_id, remaining = items.len(), "dish removed from cart");
    write(state, user_id, &items, Expect::from_read(version)).await
}

/// Replaces the whole list. New lines must name an available dish; lines
/// already in the stored cart are kept as they are, or dropped if their
/// dish is gone.
#[instrument(skip(state, items), fields(lines = items.len()))]
pub async fn replace(
    state: &AppState,
    user_id: Uuid,
    items: Vec<LineItem>,
    version: Option<i64>,
) -> AppResult<CartView> {
    let items = model::normalize(items);
    let stored: HashSet<Uuid> = state
        .carts
        .get(user_id)
        .await?
        .map(|c| c.items.iter().map(|i| i.dish_id).collect())
        .unwrap_or_default();
    let ids: Vec<Uuid> = items.iter().map(|i| i.dish_id).collect();
    let dishes: HashMap<Uuid, Dish> = state
        .dishes
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();

    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        let was_stored = stored.contains(&item.dish_id);
        match dishes.get(&item.dish_id) {
            None if was_stored => {
                debug!(%user_id, dish_id = %item.dish_id, "vanished dish dropped on replace");
            }
            None => return Err(AppError::NotFound("Dish not found".into())),
            Some(dish) if !dish.available && !was_stored => {
                warn!(%user_id, dish_id = %dish.id, "replace with unavailable dish");
                return Err(AppError::Conflict("Dish is not available".into()));
            }
            Some(_) => kept.push(item),
        }
    }
    write(state, user_id, &kept, Expect::from_read(version)).await
}

#[instrument(skip(state))]
pub async fn clear(state: &AppState, user_id: Uuid) -> AppResult<()> {
    if state.carts.delete(user_id).await? {
        info!(%user_id, "cart cleared");
    }
    Ok(())
}
