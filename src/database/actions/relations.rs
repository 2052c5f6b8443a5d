use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{translate_database_error, DomainError, QueryError},
    relations::{Relation, RelationKind},
    schema::{ShortRecipe, SubscribedAuthor, Uuid},
};

use sqlx::{Pool, Postgres};

use super::{recipes::get_short_recipe, users::get_subscribed_author};

fn action(kind: RelationKind) -> ActionType {
    match kind {
        RelationKind::Favorite => ActionType::ManageFavorites,
        RelationKind::ShoppingCart => ActionType::ManageShoppingCart,
        RelationKind::Subscription => ActionType::ManageSubscriptions,
    }
}

pub async fn object_exists(
    kind: RelationKind,
    object_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, potion::Error> {
    let row: (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        kind.object_table()
    ))
    .bind(object_id)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}

pub async fn relation_exists(
    kind: RelationKind,
    user_id: Uuid,
    object_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, potion::Error> {
    let row: (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = $1 AND {} = $2)",
        kind.table(),
        kind.object_column()
    ))
    .bind(user_id)
    .bind(object_id)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}

/// Self-subscription is rejected before anything is read. The unique
/// constraint has the final say when two adds race past the pre-checks.
pub async fn add_relation(
    kind: RelationKind,
    user_id: Uuid,
    object_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Relation, potion::Error> {
    kind.check_pair(user_id, object_id)?;

    if !object_exists(kind, object_id, pool).await? {
        return Err(DomainError::NotFound(kind.object_label()).into());
    }
    if relation_exists(kind, user_id, object_id, pool).await? {
        return Err(DomainError::AlreadyExists(kind).into());
    }

    let relation: Relation = sqlx::query_as(&format!(
        "INSERT INTO {table} (user_id, {column}) VALUES ($1, $2) RETURNING id, user_id, {column} AS object_id",
        table = kind.table(),
        column = kind.object_column()
    ))
    .bind(user_id)
    .bind(object_id)
    .fetch_one(pool)
    .await
    .map_err(translate_database_error)?;

    log::debug!("{kind} added: user {user_id} -> {object_id}");
    Ok(relation)
}

pub async fn remove_relation(
    kind: RelationKind,
    user_id: Uuid,
    object_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
        kind.table(),
        kind.object_column()
    ))
    .bind(user_id)
    .bind(object_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(DomainError::NotFound(kind.label()).into());
    }

    log::debug!("{kind} removed: user {user_id} -> {object_id}");
    Ok(())
}

async fn add_recipe_relation(
    kind: RelationKind,
    session: &SessionData,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, potion::Error> {
    session.authorize(action(kind))?;
    add_relation(kind, session.user_id, recipe_id, pool).await?;

    get_short_recipe(recipe_id, pool).await
}

pub async fn add_favorite(
    session: &SessionData,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, potion::Error> {
    add_recipe_relation(RelationKind::Favorite, session, recipe_id, pool).await
}

pub async fn remove_favorite(
    session: &SessionData,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authorize(action(RelationKind::Favorite))?;
    remove_relation(RelationKind::Favorite, session.user_id, recipe_id, pool).await
}

pub async fn add_to_shopping_cart(
    session: &SessionData,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, potion::Error> {
    add_recipe_relation(RelationKind::ShoppingCart, session, recipe_id, pool).await
}

pub async fn remove_from_shopping_cart(
    session: &SessionData,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authorize(action(RelationKind::ShoppingCart))?;
    remove_relation(RelationKind::ShoppingCart, session.user_id, recipe_id, pool).await
}

pub async fn subscribe(
    session: &SessionData,
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscribedAuthor, potion::Error> {
    session.authorize(action(RelationKind::Subscription))?;
    add_relation(RelationKind::Subscription, session.user_id, author_id, pool).await?;

    get_subscribed_author(session, author_id, recipes_limit, pool).await
}

pub async fn unsubscribe(
    session: &SessionData,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authorize(action(RelationKind::Subscription))?;
    remove_relation(RelationKind::Subscription, session.user_id, author_id, pool).await
}
