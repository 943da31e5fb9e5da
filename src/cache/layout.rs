use crate::cache::CacheService;
use redis::AsyncCommands;
use tracing::warn;

/// Ключ включает версию состояния сессии: после любого изменения старые
/// записи больше не читаются и истекают по TTL.
fn layout_key(event_id: &str, version: &str) -> String {
    format!("layout:{event_id}:{version}")
}

impl CacheService {
    /// Сериализованная сетка мероприятия для данной версии, если она есть в кеше.
    pub async fn get_layout(&self, event_id: &str, version: &str) -> Option<String> {
        let mut conn = self.redis.as_ref()?.conn.clone();
        let cached: redis::RedisResult<Option<String>> = conn.get(layout_key(event_id, version)).await;
        match cached {
            Ok(cached) => cached,
            Err(e) => {
                warn!(event = %event_id, error = %e, "Layout cache read failed");
                None
            }
        }
    }

    pub async fn save_layout(&self, event_id: &str, version: &str, json: &str) {
        let Some(redis) = &self.redis else {
            return;
        };
        let mut conn = redis.conn.clone();
        let result: Result<(), _> = conn
            .set_ex(layout_key(event_id, version), json, self.layout_ttl_seconds)
            .await;
        if let Err(e) = result {
            warn!(event = %event_id, error = %e, "Layout cache write failed");
        }
    }
}
