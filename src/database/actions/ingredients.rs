use crate::{
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    error::{DomainError, QueryError, TypeError},
    schema::{Ingredient, NewIngredient, Uuid},
};

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres, QueryBuilder};

/// `LIKE` pattern matching values that start with `prefix`.
pub fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{escaped}%")
}

/// Keeps the ingredients whose lowercased name starts with `prefix`.
pub fn filter_by_prefix(ingredients: Vec<Ingredient>, prefix: &str) -> Vec<Ingredient> {
    let prefix = prefix.trim().to_lowercase();
    ingredients
        .into_iter()
        .filter(|ingredient| ingredient.name.to_lowercase().starts_with(&prefix))
        .collect()
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Ingredient, potion::Error> {
    let ingredient: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    ingredient.ok_or_else(|| DomainError::NotFound("Ingredient").into())
}

/// Case-insensitive name prefix search. An empty prefix lists everything.
pub async fn list_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let pattern = like_prefix(&name.unwrap_or("").trim().to_lowercase());

    let list: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE LOWER(name) LIKE $1 ORDER BY name")
            .bind(pattern)
            .fetch_all(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(list)
}

/// The whole list is cached under one key and searched in memory.
pub async fn list_ingredients_cached(
    name: Option<&str>,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Vec<Ingredient>, potion::Error> {
    let key = CacheKeyType::Ingredients.new("all");
    let pool = pool.clone();

    let ingredients = RedisValue::get_or(key, cache, move || async move {
        list_ingredients(None, &pool).await
    })
    .await?;

    Ok(filter_by_prefix(ingredients.value, name.unwrap_or("")))
}

/// Inserts the ingredients that are not there yet and returns how many were new.
pub async fn import_ingredients(
    ingredients: Vec<NewIngredient>,
    pool: &Pool<Postgres>,
) -> Result<u64, potion::Error> {
    if ingredients.is_empty() {
        return Ok(0);
    }

    let mut query =
        QueryBuilder::<Postgres>::new("INSERT INTO ingredients (name, measurement_unit) ");
    query.push_values(ingredients.iter(), |mut row, ingredient| {
        row.push_bind(ingredient.name.trim())
            .push_bind(ingredient.measurement_unit.trim());
    });
    query.push(" ON CONFLICT DO NOTHING");

    let result = query
        .build()
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    log::info!(
        "Imported {} of {} ingredients",
        result.rows_affected(),
        ingredients.len()
    );
    Ok(result.rows_affected())
}

/// Imports a JSON array of `{ "name", "measurement_unit" }` and drops cached
/// ingredient lists.
pub async fn load_ingredients(
    json: &str,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<u64, potion::Error> {
    let ingredients: Vec<NewIngredient> = serde_json::from_str(json)
        .map_err(|_| TypeError::new("Invalid ingredient list").into())?;
    let count = import_ingredients(ingredients, pool).await?;

    if let Err(e) = CacheLifetime::BindIngredientCache.invalidate(cache).await {
        log::error!("> Failed to invalidate ingredient cache: {:?}", e.info);
    }

    Ok(count)
}
