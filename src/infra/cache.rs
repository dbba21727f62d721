use anyhow::Result;
use redis::Client;

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    /// Opens and pings.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let cache = Self::open(redis_url)?;
        cache.ping().await?;
        Ok(cache)
    }

    /// Parses the URL only; connections are made per command.
    pub fn open(redis_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::open(redis_url)?,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    /// `SET key 1 NX EX ttl`. Returns true when this call created the key.
    pub async fn claim(&self, key: &str, ttl_seconds: u64) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    pub async fn release(&self, key: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }
}
