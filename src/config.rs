use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Lifetime of presigned image URLs handed to clients.
    pub url_ttl_seconds: u64,
}

/// Fixed bill constants applied at checkout. Amounts are whole currency units.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PricingConfig {
    /// Tax rate in basis points (800 = 8%).
    pub tax_rate_bps: i64,
    pub delivery_fee: i64,
    pub offer_discount: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate_bps: 800,
            delivery_fee: 30_000,
            offer_discount: 18_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub ttl_minutes: i64,
    /// Reset links are `{link_base}?token=...`.
    pub link_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub pricing: PricingConfig,
    pub reset: ResetConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "dishdash"),
            audience: env_or("JWT_AUDIENCE", "dishdash-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: env_or("MINIO_ENDPOINT", "http://localhost:9000"),
            bucket: env_or("MINIO_BUCKET", "dishdash"),
            access_key: std::env::var("MINIO_ACCESS_KEY")?,
            secret_key: std::env::var("MINIO_SECRET_KEY")?,
            region: env_or("MINIO_REGION", "us-east-1"),
            url_ttl_seconds: env_parse("IMAGE_URL_TTL_SECONDS", 30 * 60),
        };
        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            tax_rate_bps: env_parse("TAX_RATE_BPS", defaults.tax_rate_bps),
            delivery_fee: env_parse("DELIVERY_FEE", defaults.delivery_fee),
            offer_discount: env_parse("OFFER_DISCOUNT", defaults.offer_discount),
        };
        anyhow::ensure!(pricing.tax_rate_bps >= 0, "TAX_RATE_BPS must be non-negative");
        let reset = ResetConfig {
            ttl_minutes: env_parse("RESET_TOKEN_TTL_MINUTES", 30),
            link_base: env_or("RESET_LINK_BASE", "dishdash://reset-password"),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            pricing,
            reset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pricing_matches_menu_bill() {
        let p = PricingConfig::default();
        assert_eq!(p.tax_rate_bps, 800);
        assert_eq!(p.delivery_fee, 30_000);
        assert_eq!(p.offer_discount, 18_000);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        assert_eq!(env_parse::<i64>("DISHDASH_TEST_UNSET_VAR", 7), 7);
    }
}
