use crate::redis_client::RedisClient;
use tracing::info;

pub mod layout;

/// Кеш ответов в Redis. Без Redis все операции - no-op, а чтение всегда промах.
#[derive(Clone)]
pub struct CacheService {
    redis: Option<RedisClient>,
    layout_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: Option<RedisClient>, layout_ttl_seconds: u64) -> Self {
        if redis.is_none() {
            info!("Redis is not configured, layout cache disabled");
        }
        Self { redis, layout_ttl_seconds }
    }

    pub fn disabled() -> Self {
        Self { redis: None, layout_ttl_seconds: 0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }
}
