use std::future::Future;

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::{cryptography::generate_token, error::CacheError};

// Caching - keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }

    pub fn to_string(&self) -> String {
        self.into()
    }

    pub fn lifetime(&self) -> CacheLifetime {
        match self._type {
            CacheKeyType::Tags => CacheLifetime::BindTagCache,
            CacheKeyType::Ingredients => CacheLifetime::BindIngredientCache,
        }
    }
}

impl<T: ToString + Serialize> Into<String> for &CacheKey<T> {
    fn into(self) -> String {
        match self._type {
            CacheKeyType::Tags => format!("tags-{}", self._value.to_string()),
            CacheKeyType::Ingredients => format!("ingredients-{}", self._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum CacheKeyType {
    Tags,
    Ingredients,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

// Cache - wrappers

/// Cached values remember the bind token that was current when they were
/// written. Bumping the token invalidates every value bound to it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum CacheLifetime {
    BindTagCache,
    BindIngredientCache,
}

impl CacheLifetime {
    pub fn bind_key(&self) -> &'static str {
        match self {
            CacheLifetime::BindTagCache => "tag-cache-key",
            CacheLifetime::BindIngredientCache => "ingredient-cache-key",
        }
    }

    pub async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, potion::Error> {
        get_cache_value::<&str, String>(self.bind_key(), cache).await
    }

    pub async fn validate_cache_bind(
        &self,
        bind: &Option<String>,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, potion::Error> {
        Ok(bind == &self.get_cache_bind(cache).await?)
    }

    pub async fn invalidate(&self, cache: &mut MultiplexedConnection) -> Result<(), potion::Error> {
        log::trace!("> Invalidating {}", self.bind_key());
        set_cache_value(self.bind_key(), generate_token(16), cache).await
    }
}

#[derive(Serialize, serde::Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: serde::Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: serde::Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> RedisValue<T> {
    async fn new(
        value: T,
        lifetime: CacheLifetime,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, potion::Error> {
        let bind = lifetime.get_cache_bind(cache).await?;

        Ok(Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        })
    }

    async fn validate(&self, cache: &mut MultiplexedConnection) -> Result<bool, potion::Error> {
        self._lifetime.validate_cache_bind(&self._bind, cache).await
    }

    /// Returns the cached value, or runs `callback` and caches its result.
    /// Unreadable entries are deleted in the background, failed writes only
    /// logged.
    pub async fn get_or<'a, F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<RedisValue<T>, potion::Error>
    where
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, potion::Error>> + Send + 'a,
    {
        let value = get_cache_value::<String, RedisValue<T>>((&key).into(), cache)
            .await
            .unwrap_or_else(|_| {
                let mut c = cache.clone();
                let k = key.to_string();
                tokio::spawn(async move {
                    log::error!("> Failed to deserialize cached value. Deleting {}", &k);
                    if let Err(e) = delete_cache_value(k, &mut c).await {
                        log::error!("> Failed to delete cached value! {:?}", e.info);
                    }
                });
                None
            });
        // * Cannot use .map(|| {...}) due to async closures
        let value = match value {
            Some(value) => {
                log::trace!("> Found {:?}", key.to_string());
                match value.validate(cache).await? {
                    true => Some(value),
                    false => {
                        log::trace!("> Invalidated {:?}", key.to_string());
                        None
                    }
                }
            }
            None => None,
        };

        match value {
            Some(value) => Ok(value),
            None => {
                log::trace!("> Fetching {:?}", key.to_string());
                let value = callback().await?;
                let value = RedisValue::new(value, key.lifetime(), cache).await?;

                if let Err(e) =
                    set_cache_value::<String, RedisValue<T>>((&key).into(), value.clone(), cache)
                        .await
                {
                    log::error!("> Failed to cache {:?}: {:?}", key.to_string(), e.info);
                }

                Ok(value)
            }
        }
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), potion::Error> {
    let _: () = cache
        .set(key, value)
        .await
        .map_err(|e| CacheError::from(e).into())?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), potion::Error> {
    let _: () = cache
        .del(key)
        .await
        .map_err(|e| CacheError::from(e).into())?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, potion::Error> {
    let value: Option<V> = cache
        .get(key)
        .await
        .map_err(|e| CacheError::from(e).into())?;

    Ok(value)
}
