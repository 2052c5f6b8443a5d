use crate::{
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    error::{DomainError, QueryError, TypeError},
    schema::{NewTag, Tag, Uuid},
};

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres, QueryBuilder};

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Tag, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    tag.ok_or_else(|| DomainError::NotFound("Tag").into())
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, potion::Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(list)
}

pub async fn list_tags_cached(
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Vec<Tag>, potion::Error> {
    let pool = pool.clone();
    let tags = RedisValue::get_or(CacheKeyType::Tags.new("all"), cache, move || async move {
        list_tags(&pool).await
    })
    .await?;

    Ok(tags.value)
}

/// Inserts the tags that are not there yet and returns how many were new.
pub async fn import_tags(tags: Vec<NewTag>, pool: &Pool<Postgres>) -> Result<u64, potion::Error> {
    if tags.is_empty() {
        return Ok(0);
    }

    let mut query = QueryBuilder::<Postgres>::new("INSERT INTO tags (name, slug) ");
    query.push_values(tags.iter(), |mut row, tag| {
        row.push_bind(tag.name.trim()).push_bind(tag.slug.trim());
    });
    query.push(" ON CONFLICT DO NOTHING");

    let result = query
        .build()
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    log::info!(
        "Imported {} of {} tags",
        result.rows_affected(),
        tags.len()
    );
    Ok(result.rows_affected())
}

/// Imports a JSON array of `{ "name", "slug" }` and drops cached tag lists.
pub async fn load_tags(
    json: &str,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<u64, potion::Error> {
    let tags: Vec<NewTag> =
        serde_json::from_str(json).map_err(|_| TypeError::new("Invalid tag list").into())?;
    let count = import_tags(tags, pool).await?;

    if let Err(e) = CacheLifetime::BindTagCache.invalidate(cache).await {
        log::error!("> Failed to invalidate tag cache: {:?}", e.info);
    }

    Ok(count)
}
