use axum::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use crate::auth::repo_types::User;

/// Session entries live for an hour before the directory is consulted again.
pub const SESSION_TTL_SECONDS: u64 = 3600;

/// Non-authoritative, TTL-bound cache mapping username to a serialized
/// user snapshot. The user table stays canonical: a miss or an expired
/// entry always falls back to the database, and mutations that change a
/// user invalidate the entry instead of waiting out the TTL.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn put(&self, username: &str, user: &User, ttl_seconds: u64) -> anyhow::Result<()>;
    async fn invalidate(&self, username: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    fn key(username: &str) -> String {
        format!("session:{username}")
    }
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn get(&self, username: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.conn.clone();
        let blob: Option<String> = conn.get(Self::key(username)).await?;
        match blob {
            Some(raw) => {
                // A blob written by an older schema is treated as a miss.
                match serde_json::from_str::<User>(&raw) {
                    Ok(user) => {
                        debug!(username = %username, "session cache hit");
                        Ok(Some(user))
                    }
                    Err(e) => {
                        debug!(username = %username, error = %e, "stale session blob, dropping");
                        Ok(None)
                    }
                }
            }
            None => Ok(None),
        }
    }

    async fn put(&self, username: &str, user: &User, ttl_seconds: u64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let blob = serde_json::to_string(user)?;
        let _: () = conn.set_ex(Self::key(username), blob, ttl_seconds).await?;
        Ok(())
    }

    async fn invalidate(&self, username: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::key(username)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::testutil::sample_user;

    #[tokio::test]
    async fn put_get_and_invalidate_roundtrip() {
        let state = AppState::fake();
        let user = sample_user("alice", "alice@x.com");

        assert!(state.cache.get("alice").await.unwrap().is_none());

        state
            .cache
            .put("alice", &user, SESSION_TTL_SECONDS)
            .await
            .unwrap();
        let cached = state.cache.get("alice").await.unwrap().expect("cache hit");
        assert_eq!(cached.username, "alice");
        assert_eq!(cached.email, "alice@x.com");

        state.cache.invalidate("alice").await.unwrap();
        assert!(state.cache.get("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entry_reads_as_miss() {
        let state = AppState::fake();
        let user = sample_user("bob", "bob@x.com");

        state.cache.put("bob", &user, 0).await.unwrap();
        assert!(state.cache.get("bob").await.unwrap().is_none());
    }
}
