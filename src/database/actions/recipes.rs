use std::collections::{HashMap, HashSet};

use crate::{
    authentication::{cryptography::generate_short_code, jwt::SessionData, permissions::ActionType},
    constants::{SHORT_CODE_ATTEMPTS, SHORT_LINK_PATH},
    error::{translate_database_error, DomainError, QueryError},
    form::RecipeFilter,
    pagination::PageContext,
    schema::{
        IngredientAmount, Recipe, RecipeDetail, RecipeForm, RecipeIngredient, RecipeIngredientRow,
        RecipeRow, RecipeTagRow, RecipeUpdate, ShortRecipe, Tag, UserProfile, Uuid,
    },
    validation::{ValidRecipe, ValidRecipeUpdate},
};

use potion::HtmlError;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

/// Ids from `requested` that were not found, in request order.
pub fn missing_ids(requested: &[Uuid], found: &[Uuid]) -> Vec<Uuid> {
    let found: HashSet<&Uuid> = found.iter().collect();
    requested
        .iter()
        .filter(|id| !found.contains(id))
        .copied()
        .collect()
}

async fn existing_ids(
    table: &str,
    ids: &[Uuid],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<Vec<Uuid>, potion::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(&format!("SELECT id FROM {table} WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

async fn check_tags(tags: &[Uuid], tr: &mut Transaction<'_, Postgres>) -> Result<(), potion::Error> {
    let missing = missing_ids(tags, &existing_ids("tags", tags, tr).await?);
    if !missing.is_empty() {
        return Err(DomainError::UnknownTags(missing).into());
    }
    Ok(())
}

async fn check_ingredients(
    ingredients: &[IngredientAmount],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), potion::Error> {
    let ids: Vec<Uuid> = ingredients.iter().map(|i| i.id).collect();
    let missing = missing_ids(&ids, &existing_ids("ingredients", &ids, tr).await?);
    if !missing.is_empty() {
        return Err(DomainError::UnknownIngredients(missing).into());
    }
    Ok(())
}

async fn insert_tags(
    recipe_id: Uuid,
    tags: &[Uuid],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), potion::Error> {
    let mut query = QueryBuilder::<Postgres>::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query.push_values(tags.iter(), |mut row, tag| {
        row.push_bind(recipe_id).push_bind(*tag);
    });

    query
        .build()
        .execute(&mut **tr)
        .await
        .map_err(translate_database_error)?;

    Ok(())
}

/// Rows are inserted in payload order, which is also the order they are read back in.
async fn insert_ingredients(
    recipe_id: Uuid,
    ingredients: &[IngredientAmount],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), potion::Error> {
    let mut query = QueryBuilder::<Postgres>::new(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ",
    );
    query.push_values(ingredients.iter(), |mut row, ingredient| {
        row.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });

    query
        .build()
        .execute(&mut **tr)
        .await
        .map_err(translate_database_error)?;

    Ok(())
}

/// Inserts the recipe row, drawing a new short code after each collision.
async fn insert_recipe<F>(
    author_id: Uuid,
    recipe: &ValidRecipe,
    mut next_code: F,
    tr: &mut Transaction<'_, Postgres>,
) -> Result<Uuid, potion::Error>
where
    F: FnMut() -> String,
{
    for attempt in 1..=SHORT_CODE_ATTEMPTS {
        let id: Option<(Uuid,)> = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, text, cooking_time, image, short_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ON CONSTRAINT unique_recipe_short_code DO NOTHING
            RETURNING id
        ",
        )
        .bind(author_id)
        .bind(&recipe.name)
        .bind(&recipe.text)
        .bind(recipe.cooking_time)
        .bind(&recipe.image)
        .bind(next_code())
        .fetch_optional(&mut **tr)
        .await
        .map_err(translate_database_error)?;

        match id {
            Some(id) => return Ok(id.0),
            None => log::warn!("Short code collision ({attempt}/{SHORT_CODE_ATTEMPTS})"),
        }
    }

    Err(HtmlError::InternalServerError.new("Failed to allocate a short code"))
}

/// Writes the recipe with its tags and ingredients in one transaction.
/// Nothing is stored when any part fails.
pub async fn create_recipe(
    session: &SessionData,
    form: RecipeForm,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, potion::Error> {
    create_recipe_with_codes(session, form, generate_short_code, pool).await
}

/// `create_recipe` with short codes taken from `next_code`.
pub async fn create_recipe_with_codes<F>(
    session: &SessionData,
    form: RecipeForm,
    next_code: F,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, potion::Error>
where
    F: FnMut() -> String,
{
    session.authorize(ActionType::CreateRecipes)?;
    let recipe = ValidRecipe::try_from(form)?;

    let mut tr = pool.begin().await.map_err(|e| QueryError::from(e).into())?;
    check_tags(&recipe.tags, &mut tr).await?;
    check_ingredients(&recipe.ingredients, &mut tr).await?;

    let id = insert_recipe(session.user_id, &recipe, next_code, &mut tr).await?;
    insert_tags(id, &recipe.tags, &mut tr).await?;
    insert_ingredients(id, &recipe.ingredients, &mut tr).await?;

    tr.commit().await.map_err(|e| QueryError::from(e).into())?;
    log::debug!("Recipe {id} created by user {}", session.user_id);

    get_recipe_detail(id, Some(session), pool).await
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, potion::Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// The recipe, if the session may perform `action` on it.
pub async fn get_recipe_mut(
    session: &SessionData,
    id: Uuid,
    action: ActionType,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    let recipe = match get_recipe(id, pool).await? {
        Some(recipe) => recipe,
        None => return Err(DomainError::NotFound("Recipe").into()),
    };

    session.authorize_owner(action, recipe.author_id)?;
    Ok(recipe)
}

pub async fn get_short_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<ShortRecipe, potion::Error> {
    let row: Option<ShortRecipe> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    row.ok_or_else(|| DomainError::NotFound("Recipe").into())
}

/// Updates only what was supplied. Supplied tags or ingredients replace the
/// stored ones wholesale.
pub async fn update_recipe(
    session: &SessionData,
    id: Uuid,
    update: RecipeUpdate,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, potion::Error> {
    get_recipe_mut(session, id, ActionType::UpdateRecipes, pool).await?;
    let update = ValidRecipeUpdate::try_from(update)?;

    if update.is_empty() {
        return get_recipe_detail(id, Some(session), pool).await;
    }

    let mut tr = pool.begin().await.map_err(|e| QueryError::from(e).into())?;
    if let Some(tags) = &update.tags {
        check_tags(tags, &mut tr).await?;
    }
    if let Some(ingredients) = &update.ingredients {
        check_ingredients(ingredients, &mut tr).await?;
    }

    sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($2, name),
            text = COALESCE($3, text),
            cooking_time = COALESCE($4, cooking_time),
            image = COALESCE($5, image)
        WHERE id = $1
    ",
    )
    .bind(id)
    .bind(&update.name)
    .bind(&update.text)
    .bind(update.cooking_time)
    .bind(&update.image)
    .execute(&mut *tr)
    .await
    .map_err(translate_database_error)?;

    if let Some(tags) = &update.tags {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
        insert_tags(id, tags, &mut tr).await?;
    }
    if let Some(ingredients) = &update.ingredients {
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
        insert_ingredients(id, ingredients, &mut tr).await?;
    }

    tr.commit().await.map_err(|e| QueryError::from(e).into())?;
    log::debug!("Recipe {id} updated by user {}", session.user_id);

    get_recipe_detail(id, Some(session), pool).await
}

/// Tags, ingredients, favorites and cart entries go with the recipe.
pub async fn delete_recipe(
    session: &SessionData,
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    get_recipe_mut(session, id, ActionType::DeleteRecipes, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    log::debug!("Recipe {id} deleted by user {}", session.user_id);
    Ok(())
}

fn recipe_query(viewer_id: Option<Uuid>) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(
        "SELECT r.*, EXISTS(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    query.push_bind(viewer_id);
    query.push(
        ") AS is_favorited, EXISTS(SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
    );
    query.push_bind(viewer_id);
    query.push(") AS is_in_shopping_cart, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");
    query
}

/// Attaches authors, tags and ingredients to a page of rows.
async fn expand_rows(
    rows: Vec<RecipeRow>,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeDetail>, potion::Error> {
    if rows.is_empty() {
        return Ok(vec![]);
    }
    let viewer_id = viewer.map(|s| s.user_id);
    let recipe_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let author_ids: Vec<Uuid> = rows.iter().map(|row| row.author_id).collect();

    let authors: Vec<UserProfile> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
            EXISTS(SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = $2) AS is_subscribed
        FROM users u WHERE u.id = ANY($1)
    ",
    )
    .bind(&author_ids)
    .bind(viewer_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let tags: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let ingredients: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id, ri.ingredient_id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let authors: HashMap<Uuid, UserProfile> = authors.into_iter().map(|a| (a.id, a)).collect();

    let mut tag_map: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    tags.into_iter()
        .for_each(|row| tag_map.entry(row.recipe_id).or_default().push(row.into()));

    let mut ingredient_map: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
    ingredients.into_iter().for_each(|row| {
        ingredient_map
            .entry(row.recipe_id)
            .or_default()
            .push(row.into())
    });

    let mut details = Vec::with_capacity(rows.len());
    for row in rows {
        let author = match authors.get(&row.author_id) {
            Some(author) => author.clone(),
            None => return Err(DomainError::NotFound("User").into()),
        };

        details.push(RecipeDetail {
            id: row.id,
            author,
            name: row.name,
            text: row.text,
            cooking_time: row.cooking_time,
            image: row.image,
            tags: tag_map.remove(&row.id).unwrap_or_default(),
            ingredients: ingredient_map.remove(&row.id).unwrap_or_default(),
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
        });
    }

    Ok(details)
}

pub async fn get_recipe_detail(
    id: Uuid,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, potion::Error> {
    ActionType::ReadRecipes.authorize(viewer)?;

    let mut query = recipe_query(viewer.map(|s| s.user_id));
    query.push(" AND r.id = ");
    query.push_bind(id);

    let row: Option<RecipeRow> = query
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let row = match row {
        Some(row) => row,
        None => return Err(DomainError::NotFound("Recipe").into()),
    };

    match expand_rows(vec![row], viewer, pool).await?.pop() {
        Some(detail) => Ok(detail),
        None => Err(DomainError::NotFound("Recipe").into()),
    }
}

fn push_filters(
    query: &mut QueryBuilder<'static, Postgres>,
    filter: &RecipeFilter,
    viewer_id: Option<Uuid>,
) {
    if !filter.tags.is_empty() {
        query.push(
            " AND EXISTS(SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        query.push_bind(filter.tags.clone());
        query.push("))");
    }
    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ");
        query.push_bind(author);
    }
    if filter.is_favorited {
        query.push(" AND EXISTS(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
        query.push_bind(viewer_id);
        query.push(")");
    }
    if filter.is_in_shopping_cart {
        query.push(
            " AND EXISTS(SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
        );
        query.push_bind(viewer_id);
        query.push(")");
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        query.push(" AND (r.name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR r.text ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}

async fn count_recipes(
    filter: &RecipeFilter,
    viewer_id: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<i64, potion::Error> {
    let mut query = QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
    push_filters(&mut query, filter, viewer_id);

    let row: (i64,) = query
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}

/// Newest first. Tag slugs match when the recipe has any of them.
/// Favorite and cart filters match nothing for anonymous viewers.
pub async fn fetch_recipes(
    filter: RecipeFilter,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeDetail>, potion::Error> {
    ActionType::ReadRecipes.authorize(viewer)?;
    let viewer_id = viewer.map(|s| s.user_id);
    let page = filter.page;

    let mut query = recipe_query(viewer_id);
    push_filters(&mut query, &filter, viewer_id);
    query.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ");
    query.push_bind(page.size);
    query.push(" OFFSET ");
    query.push_bind(page.offset());

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    // The window count is absent when the page lies past the end.
    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.number > 1 => count_recipes(&filter, viewer_id, pool).await?,
        None => 0,
    };
    let details = expand_rows(rows, viewer, pool).await?;

    Ok(PageContext::from_rows(details, total_count, page))
}

/// Absolute short link, e.g. `https://foodgram.example/s/aZ3kP9qX`.
pub async fn get_short_link(
    id: Uuid,
    public_url: &str,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    match get_recipe(id, pool).await? {
        Some(recipe) => Ok(format!(
            "{}{SHORT_LINK_PATH}{}",
            public_url.trim_end_matches('/'),
            recipe.short_code
        )),
        None => Err(DomainError::NotFound("Recipe").into()),
    }
}

/// The recipe a short code points to.
pub async fn resolve_short_code(code: &str, pool: &Pool<Postgres>) -> Result<Uuid, potion::Error> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM recipes WHERE short_code = $1")
        .bind(code.trim())
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    row.map(|row| row.0)
        .ok_or_else(|| DomainError::NotFound("Recipe").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ids_keep_request_order() {
        assert_eq!(missing_ids(&[5, 2, 9, 4], &[4, 5]), vec![2, 9]);
        assert_eq!(missing_ids(&[1, 2], &[2, 1]), Vec::<Uuid>::new());
        assert_eq!(missing_ids(&[], &[1]), Vec::<Uuid>::new());
    }
}
