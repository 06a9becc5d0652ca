//! In-memory repositories backing `AppState::fake()`.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo::{EmailTaken, ProfilePatch, User, UserRepo, DEFAULT_ROLE},
    cart::{
        model::LineItem,
        repo::{Cart, CartRepo, Expect},
    },
    catalog::repo::{Dish, DishRepo},
    orders::repo::{Order, OrderRepo},
};

struct ResetTicket {
    token_hash: String,
    user_id: Uuid,
    expires_at: OffsetDateTime,
    used: bool,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    resets: Vec<ResetTicket>,
    dishes: HashMap<Uuid, Dish>,
    carts: HashMap<Uuid, Cart>,
    orders: Vec<Order>,
}

/// One lock over every table, so multi-table writes are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn insert_dish(&self, dish: Dish) {
        self.tables.lock().unwrap().dishes.insert(dish.id, dish);
    }

    pub fn update_dish(&self, id: Uuid, f: impl FnOnce(&mut Dish)) {
        if let Some(d) = self.tables.lock().unwrap().dishes.get_mut(&id) {
            f(d);
        }
    }

    pub fn remove_dish(&self, id: Uuid) {
        self.tables.lock().unwrap().dishes.remove(&id);
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.tables.lock().unwrap().users.get(&id).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str, name: &str) -> anyhow::Result<User> {
        let mut t = self.tables.lock().unwrap();
        if t.users.values().any(|u| u.email == email) {
            return Err(EmailTaken.into());
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: Some(name.to_string()),
            image_key: None,
            role: Some(DEFAULT_ROLE.to_string()),
            password_hash: password_hash.to_string(),
            token_version: 0,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.lock().unwrap();
        if let Some(email) = &patch.email {
            if t.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(EmailTaken.into());
            }
        }
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            user.name = Some(name.clone());
        }
        if let Some(email) = &patch.email {
            user.email = email.clone();
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn set_image_key(&self, id: Uuid, key: &str) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.users.get_mut(&id).map(|u| {
            u.image_key = Some(key.to_string());
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(u) = t.users.get_mut(&id) {
            u.password_hash = password_hash.to_string();
            u.token_version += 1;
            u.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn bump_token_version(&self, id: Uuid) -> anyhow::Result<()> {
        if let Some(u) = self.tables.lock().unwrap().users.get_mut(&id) {
            u.token_version += 1;
        }
        Ok(())
    }

    async fn insert_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        self.tables.lock().unwrap().resets.push(ResetTicket {
            token_hash: token_hash.to_string(),
            user_id,
            expires_at,
            used: false,
        });
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Uuid>> {
        let mut t = self.tables.lock().unwrap();
        let ticket = t
            .resets
            .iter_mut()
            .find(|r| r.token_hash == token_hash && !r.used && r.expires_at > now);
        Ok(ticket.map(|r| {
            r.used = true;
            r.user_id
        }))
    }
}

#[async_trait]
impl DishRepo for MemoryStore {
    async fn list_by_category(&self, category: &str) -> anyhow::Result<Vec<Dish>> {
        let t = self.tables.lock().unwrap();
        let mut dishes: Vec<Dish> = t
            .dishes
            .values()
            .filter(|d| d.category == category)
            .cloned()
            .collect();
        dishes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(dishes)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Dish>> {
        Ok(self.tables.lock().unwrap().dishes.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Dish>> {
        let t = self.tables.lock().unwrap();
        Ok(ids.iter().filter_map(|id| t.dishes.get(id).cloned()).collect())
    }
}

#[async_trait]
impl CartRepo for MemoryStore {
    async fn get(&self, user_id: Uuid) -> anyhow::Result<Option<Cart>> {
        Ok(self.tables.lock().unwrap().carts.get(&user_id).cloned())
    }

    async fn save(
        &self,
        user_id: Uuid,
        items: &[LineItem],
        expect: Expect,
    ) -> anyhow::Result<Option<Cart>> {
        let mut t = self.tables.lock().unwrap();
        let current = t.carts.get(&user_id).map(|c| c.version);
        let next = match (expect, current) {
            (Expect::Any, cur) => cur.unwrap_or(0) + 1,
            (Expect::Absent, None) => 1,
            (Expect::Version(v), Some(cur)) if v == cur => cur + 1,
            _ => return Ok(None),
        };
        let cart = Cart {
            user_id,
            items: items.to_vec(),
            version: next,
            updated_at: OffsetDateTime::now_utc(),
        };
        t.carts.insert(user_id, cart.clone());
        Ok(Some(cart))
    }

    async fn delete(&self, user_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.tables.lock().unwrap().carts.remove(&user_id).is_some())
    }
}

#[async_trait]
impl OrderRepo for MemoryStore {
    async fn place(&self, order: &Order, cart_version: i64) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().unwrap();
        match t.carts.get(&order.user_id) {
            Some(c) if c.version == cart_version => {}
            _ => return Ok(false),
        }
        anyhow::ensure!(
            t.orders.iter().all(|o| o.id != order.id),
            "duplicate key value violates unique constraint \"orders_pkey\""
        );
        t.carts.remove(&order.user_id);
        t.orders.push(order.clone());
        Ok(true)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Order>> {
        let t = self.tables.lock().unwrap();
        let mut orders: Vec<Order> = t
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn get(&self, user_id: Uuid, id: &str) -> anyhow::Result<Option<Order>> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .orders
            .iter()
            .find(|o| o.id == id && o.user_id == user_id)
            .cloned())
    }
}
