//! Redis service for session state (revoked access tokens)

use redis::{AsyncCommands, Client};

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Create a new Redis service and check the server answers
    pub async fn new(url: &str) -> AppResult<Self> {
        let service = Self::new_lazy(url)?;

        let mut conn = service.get_connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(service)
    }

    /// Create the client without connecting; connections are opened on first use
    pub fn new_lazy(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;
        Ok(Self { client })
    }

    /// Mark a token id as revoked until the token would have expired anyway
    pub async fn revoke_token(&self, jti: &str, ttl_seconds: u64) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let mut conn = self.get_connection().await?;
        conn.set_ex::<_, _, ()>(Self::revoked_key(jti), "1", ttl_seconds)
            .await?;

        Ok(())
    }

    /// Check whether a token id has been revoked
    pub async fn is_token_revoked(&self, jti: &str) -> AppResult<bool> {
        let mut conn = self.get_connection().await?;
        let exists: bool = conn.exists(Self::revoked_key(jti)).await?;
        Ok(exists)
    }

    /// Check Redis answers (readiness probe)
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.get_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    fn revoked_key(jti: &str) -> String {
        format!("revoked_token:{}", jti)
    }

    async fn get_connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoked_key_namespaced() {
        assert_eq!(RedisService::revoked_key("abc"), "revoked_token:abc");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(RedisService::new_lazy("not a url").is_err());
    }
}
