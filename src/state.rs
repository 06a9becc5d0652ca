use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::{
    auth::{
        mailer::{LogMailer, Mailer},
        repo::{PgUserRepo, UserRepo},
    },
    cart::repo::{CartRepo, PgCartRepo},
    catalog::repo::{DishRepo, PgDishRepo},
    config::AppConfig,
    orders::repo::{OrderRepo, PgOrderRepo},
    storage::{Storage, StorageClient},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    pub users: Arc<dyn UserRepo>,
    pub dishes: Arc<dyn DishRepo>,
    pub carts: Arc<dyn CartRepo>,
    pub orders: Arc<dyn OrderRepo>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let storage = Storage::new(&config.storage)
            .await
            .context("init object storage")?;

        Ok(Self {
            users: Arc::new(PgUserRepo::new(db.clone())),
            dishes: Arc::new(PgDishRepo::new(db.clone())),
            carts: Arc::new(PgCartRepo::new(db.clone())),
            orders: Arc::new(PgOrderRepo::new(db)),
            storage: Arc::new(storage),
            mailer: Arc::new(LogMailer),
            config: Arc::new(config),
        })
    }
}

#[cfg(test)]
pub use fake::{FakeState, FakeStorage};

#[cfg(test)]
mod fake {
    use std::{
        ops::Deref,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use bytes::Bytes;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::AppState;
    use crate::{
        auth::mailer::Mailer,
        catalog::repo::Dish,
        config::{AppConfig, JwtConfig, PricingConfig, ResetConfig, StorageConfig},
        memory::MemoryStore,
        storage::StorageClient,
    };

    /// Keeps objects in memory and presigns to a fake host.
    #[derive(Default)]
    pub struct FakeStorage {
        objects: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageClient for FakeStorage {
        async fn put_object(&self, key: &str, _body: Bytes, _ct: &str) -> anyhow::Result<()> {
            self.objects.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.objects.lock().unwrap().retain(|k| k != key);
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
            Ok(format!("https://fake.local/{key}"))
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        links: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_password_reset(&self, _to: &str, link: &str) -> anyhow::Result<()> {
            self.links.lock().unwrap().push(link.to_string());
            Ok(())
        }
    }

    /// `AppState` over in-memory stores, plus handles to poke at them.
    pub struct FakeState {
        state: AppState,
        memory: Arc<MemoryStore>,
        fake_storage: Arc<FakeStorage>,
        outbox: Arc<RecordingMailer>,
    }

    impl Deref for FakeState {
        type Target = AppState;

        fn deref(&self) -> &AppState {
            &self.state
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            storage: StorageConfig {
                endpoint: "http://fake.local".into(),
                bucket: "fake".into(),
                access_key: "fake".into(),
                secret_key: "fake".into(),
                region: "us-east-1".into(),
                url_ttl_seconds: 60,
            },
            pricing: PricingConfig::default(),
            reset: ResetConfig {
                ttl_minutes: 30,
                link_base: "dishdash://reset-password".into(),
            },
        }
    }

    impl AppState {
        pub fn fake() -> FakeState {
            let memory = Arc::new(MemoryStore::default());
            let fake_storage = Arc::new(FakeStorage::default());
            let outbox = Arc::new(RecordingMailer::default());
            let state = AppState {
                config: Arc::new(test_config()),
                storage: fake_storage.clone(),
                users: memory.clone(),
                dishes: memory.clone(),
                carts: memory.clone(),
                orders: memory.clone(),
                mailer: outbox.clone(),
            };
            FakeState {
                state,
                memory,
                fake_storage,
                outbox,
            }
        }
    }

    impl FakeState {
        pub fn app_state(&self) -> AppState {
            self.state.clone()
        }

        pub fn seed_dish(&self, name: &str, category: &str, price: i64) -> Dish {
            let now = OffsetDateTime::now_utc();
            let slug = name.to_lowercase().replace(' ', "-");
            let dish = Dish {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: Some(format!("{name} from the {category} kitchen")),
                image_key: Some(format!("dishes/{slug}.png")),
                price,
                category: category.to_string(),
                available: true,
                created_at: now,
                updated_at: now,
            };
            self.memory.insert_dish(dish.clone());
            dish
        }

        pub fn set_available(&self, id: Uuid, available: bool) {
            self.memory.update_dish(id, |d| d.available = available);
        }

        pub fn remove_dish(&self, id: Uuid) {
            self.memory.remove_dish(id);
        }

        pub fn sent_reset_links(&self) -> Vec<String> {
            self.outbox.links.lock().unwrap().clone()
        }

        pub fn deleted_objects(&self) -> Vec<String> {
            self.fake_storage.deleted.lock().unwrap().clone()
        }
    }
}
