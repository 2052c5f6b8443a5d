use chrono::{Local, NaiveDate};
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{DomainError, QueryError},
    schema::Uuid,
    shopping_list::{CartIngredientRow, ShoppingList},
};

use super::users::get_user_by_id;

/// Builds the list of `user_id`'s cart as of `date`. Reads only.
pub async fn build_shopping_list(
    user_id: Uuid,
    date: NaiveDate,
    pool: &Pool<Postgres>,
) -> Result<ShoppingList, potion::Error> {
    let owner = match get_user_by_id(pool, user_id).await? {
        Some(user) => user.username,
        None => return Err(DomainError::NotFound("User").into()),
    };

    let recipes: Vec<(String,)> = sqlx::query_as(
        "
        SELECT r.name FROM shopping_cart c
        INNER JOIN recipes r ON r.id = c.recipe_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, ri.amount
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    log::debug!(
        "Shopping list for user {user_id}: {} recipes, {} ingredient rows",
        recipes.len(),
        rows.len()
    );

    Ok(ShoppingList::build(
        owner,
        date,
        recipes.into_iter().map(|r| r.0).collect(),
        rows,
    ))
}

pub async fn generate_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<ShoppingList, potion::Error> {
    session.authorize(ActionType::DownloadShoppingList)?;
    build_shopping_list(session.user_id, Local::now().date_naive(), pool).await
}

/// `shopping_list.txt` as a warp reply.
pub async fn download_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<warp::reply::Response, potion::Error> {
    Ok(generate_shopping_list(session, pool).await?.into_reply())
}
