use chrono::NaiveDate;
use foodgram_sdk::{
    actions::{
        add_favorite, add_to_shopping_cart, build_shopping_list, create_recipe,
        create_recipe_with_codes, delete_recipe, fetch_recipes, get_recipe, get_recipe_detail,
        get_short_link, import_ingredients, import_tags, list_subscriptions, list_users,
        register_user, remove_favorite, resolve_short_code, subscribe, update_recipe,
    },
    cryptography::generate_token,
    error::translate_database_error,
    form::RecipeFilter,
    jwt::SessionData,
    pagination::Page,
    schema::{IngredientAmount, NewIngredient, NewTag, RecipeForm, RecipeUpdate, RegisterForm, Uuid},
    shopping_list::ShoppingListItem,
};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

/// `None` when no database is configured; the calling test then does nothing.
async fn pool() -> Option<Pool<Postgres>> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("DATABASE_URL is set but unreachable");
    sqlx::migrate!().run(&pool).await.expect("migrations failed");
    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", generate_token(10).to_lowercase())
}

fn error_of<T>(result: Result<T, potion::Error>) -> potion::Error {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    }
}

async fn register(pool: &Pool<Postgres>) -> SessionData {
    let username = unique("cook");
    let profile = register_user(
        RegisterForm {
            email: format!("{username}@example.com"),
            username: username.clone(),
            first_name: "Test".to_owned(),
            last_name: "Cook".to_owned(),
            password: "correct horse".to_owned(),
        },
        pool,
    )
    .await
    .ok()
    .expect("registration failed");

    SessionData {
        user_id: profile.id,
        username,
    }
}

async fn ingredient(pool: &Pool<Postgres>, name: &str, unit: &str) -> (Uuid, String) {
    let name = unique(name);
    import_ingredients(
        vec![NewIngredient {
            name: name.clone(),
            measurement_unit: unit.to_owned(),
        }],
        pool,
    )
    .await
    .ok()
    .expect("ingredient import failed");

    let id: (Uuid,) = sqlx::query_as("SELECT id FROM ingredients WHERE name = $1")
        .bind(&name)
        .fetch_one(pool)
        .await
        .unwrap();
    (id.0, name)
}

async fn tag(pool: &Pool<Postgres>) -> (Uuid, String) {
    let slug = unique("tag");
    import_tags(
        vec![NewTag {
            name: slug.clone(),
            slug: slug.clone(),
        }],
        pool,
    )
    .await
    .ok()
    .expect("tag import failed");

    let id: (Uuid,) = sqlx::query_as("SELECT id FROM tags WHERE slug = $1")
        .bind(&slug)
        .fetch_one(pool)
        .await
        .unwrap();
    (id.0, slug)
}

fn form(name: &str, tags: Vec<Uuid>, ingredients: Vec<(Uuid, i64)>) -> RecipeForm {
    RecipeForm {
        name: name.to_owned(),
        text: "Mix and bake.".to_owned(),
        cooking_time: 30,
        image: "recipes/images/test.png".to_owned(),
        tags,
        ingredients: ingredients
            .into_iter()
            .map(|(id, amount)| IngredientAmount {
                id,
                amount: Decimal::from(amount),
            })
            .collect(),
    }
}

async fn count(pool: &Pool<Postgres>, sql: &str, id: Uuid) -> i64 {
    let row: (i64,) = sqlx::query_as(sql).bind(id).fetch_one(pool).await.unwrap();
    row.0
}

#[tokio::test]
async fn shopping_list_sums_the_cart() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, flour_name) = ingredient(&pool, "flour", "g").await;
    let (egg, egg_name) = ingredient(&pool, "egg", "шт").await;

    let first = create_recipe(&user, form("Recipe1", vec![tag_id], vec![(flour, 200), (egg, 1)]), &pool)
        .await
        .ok()
        .unwrap();
    let second = create_recipe(&user, form("Recipe2", vec![tag_id], vec![(flour, 300), (egg, 2)]), &pool)
        .await
        .ok()
        .unwrap();
    add_to_shopping_cart(&user, first.id, &pool).await.ok().unwrap();
    add_to_shopping_cart(&user, second.id, &pool).await.ok().unwrap();

    let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    let list = build_shopping_list(user.user_id, date, &pool).await.ok().unwrap();

    assert_eq!(list.recipes, vec!["Recipe1", "Recipe2"]);
    assert_eq!(
        list.items,
        vec![
            ShoppingListItem {
                name: egg_name.clone(),
                measurement_unit: "шт".to_owned(),
                amount: Decimal::from(3),
            },
            ShoppingListItem {
                name: flour_name.clone(),
                measurement_unit: "g".to_owned(),
                amount: Decimal::from(500),
            },
        ]
    );

    let text = list.render();
    assert!(text.contains(&format!("1. {egg_name} (шт) — 3\n")));
    assert!(text.contains(&format!("2. {flour_name} (g) — 500\n")));

    let again = build_shopping_list(user.user_id, date, &pool).await.ok().unwrap();
    assert_eq!(again, list);
}

#[tokio::test]
async fn empty_cart_gives_an_empty_list() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;

    let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
    let list = build_shopping_list(user.user_id, date, &pool).await.ok().unwrap();
    assert!(list.items.is_empty());
    assert!(list.render().contains("Дата: 2 января 2026"));
}

#[tokio::test]
async fn update_replaces_ingredients_wholesale() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;
    let (sugar, sugar_name) = ingredient(&pool, "sugar", "g").await;

    let recipe = create_recipe(&user, form("Cake", vec![tag_id], vec![(flour, 200)]), &pool)
        .await
        .ok()
        .unwrap();

    let updated = update_recipe(
        &user,
        recipe.id,
        RecipeUpdate {
            ingredients: Some(vec![IngredientAmount {
                id: sugar,
                amount: Decimal::from(100),
            }]),
            ..Default::default()
        },
        &pool,
    )
    .await
    .ok()
    .unwrap();

    assert_eq!(updated.ingredients.len(), 1);
    assert_eq!(updated.ingredients[0].ingredient_id, sugar);
    assert_eq!(updated.ingredients[0].name, sugar_name);
    assert_eq!(updated.ingredients[0].amount, Decimal::from(100));
    // untouched fields survive
    assert_eq!(updated.name, "Cake");
    assert_eq!(updated.tags.len(), 1);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM recipe_ingredients WHERE recipe_id = $1", recipe.id).await,
        1
    );
}

#[tokio::test]
async fn invalid_recipes_persist_nothing() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;

    let error = error_of(create_recipe(&user, form("No tags", vec![], vec![(flour, 1)]), &pool).await);
    assert!(error.code == 400);
    assert_eq!(error.info.as_deref(), Some("tags: At least one tag is required"));

    let error = error_of(create_recipe(&user, form("No ingredients", vec![tag_id], vec![]), &pool).await);
    assert_eq!(
        error.info.as_deref(),
        Some("ingredients: At least one ingredient is required")
    );

    let error = error_of(
        create_recipe(&user, form("Twice", vec![tag_id], vec![(flour, 1), (flour, 2)]), &pool).await,
    );
    assert_eq!(
        error.info.as_deref(),
        Some(format!("ingredients: Ingredients must not repeat ({flour})").as_str())
    );

    let error = error_of(
        create_recipe(&user, form("Unknown", vec![tag_id], vec![(flour, 1), (-1, 2)]), &pool).await,
    );
    assert_eq!(
        error.info.as_deref(),
        Some("ingredients: Unknown ingredients (-1)")
    );

    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM recipes WHERE author_id = $1", user.user_id).await,
        0
    );
}

#[tokio::test]
async fn only_the_author_may_modify() {
    let Some(pool) = pool().await else { return };
    let author = register(&pool).await;
    let other = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;

    let recipe = create_recipe(&author, form("Bread", vec![tag_id], vec![(flour, 500)]), &pool)
        .await
        .ok()
        .unwrap();

    let error = error_of(
        update_recipe(
            &other,
            recipe.id,
            RecipeUpdate {
                name: Some("Stolen".to_owned()),
                ..Default::default()
            },
            &pool,
        )
        .await,
    );
    assert!(error.code == 403);

    let error = error_of(delete_recipe(&other, recipe.id, &pool).await);
    assert!(error.code == 403);

    let error = error_of(delete_recipe(&author, -1, &pool).await);
    assert!(error.code == 404);
}

#[tokio::test]
async fn deleting_a_recipe_cascades() {
    let Some(pool) = pool().await else { return };
    let author = register(&pool).await;
    let fan = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;

    let recipe = create_recipe(&author, form("Pie", vec![tag_id], vec![(flour, 250)]), &pool)
        .await
        .ok()
        .unwrap();
    add_favorite(&fan, recipe.id, &pool).await.ok().unwrap();
    add_to_shopping_cart(&fan, recipe.id, &pool).await.ok().unwrap();

    delete_recipe(&author, recipe.id, &pool).await.ok().unwrap();

    assert!(get_recipe_detail(recipe.id, None, &pool).await.is_err());
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM favorites WHERE recipe_id = $1", recipe.id).await,
        0
    );
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM shopping_cart WHERE recipe_id = $1", recipe.id).await,
        0
    );
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM recipe_ingredients WHERE recipe_id = $1", recipe.id).await,
        0
    );
}

#[tokio::test]
async fn favorites_are_unique_per_pair() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;
    let recipe = create_recipe(&user, form("Soup", vec![tag_id], vec![(flour, 10)]), &pool)
        .await
        .ok()
        .unwrap();

    let short = add_favorite(&user, recipe.id, &pool).await.ok().unwrap();
    assert_eq!(short.id, recipe.id);
    assert_eq!(short.name, "Soup");

    let error = error_of(add_favorite(&user, recipe.id, &pool).await);
    assert!(error.code == 400);
    assert_eq!(error.info.as_deref(), Some("errors: Favorite already exists"));
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM favorites WHERE user_id = $1", user.user_id).await,
        1
    );

    let error = error_of(add_favorite(&user, -1, &pool).await);
    assert!(error.code == 404);
    assert_eq!(error.info.as_deref(), Some("detail: Recipe not found"));

    remove_favorite(&user, recipe.id, &pool).await.ok().unwrap();
    let error = error_of(remove_favorite(&user, recipe.id, &pool).await);
    assert!(error.code == 404);
    assert_eq!(error.info.as_deref(), Some("detail: Favorite not found"));
}

#[tokio::test]
async fn subscriptions() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let author = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;
    for name in ["One", "Two", "Three"] {
        create_recipe(&author, form(name, vec![tag_id], vec![(flour, 1)]), &pool)
            .await
            .ok()
            .unwrap();
    }

    let error = error_of(subscribe(&user, user.user_id, None, &pool).await);
    assert_eq!(
        error.info.as_deref(),
        Some("errors: You cannot subscribe to yourself")
    );

    let followed = subscribe(&user, author.user_id, Some(2), &pool).await.ok().unwrap();
    assert_eq!(followed.author.id, author.user_id);
    assert!(followed.author.is_subscribed);
    assert_eq!(followed.recipes_count, 3);
    assert_eq!(followed.recipes.len(), 2);

    // still rejected once other subscriptions exist
    let error = error_of(subscribe(&user, user.user_id, None, &pool).await);
    assert_eq!(
        error.info.as_deref(),
        Some("errors: You cannot subscribe to yourself")
    );

    let error = error_of(subscribe(&user, author.user_id, None, &pool).await);
    assert_eq!(error.info.as_deref(), Some("errors: Subscription already exists"));

    let page = list_subscriptions(&user, Page::new(None, None, 6), None, &pool)
        .await
        .ok()
        .unwrap();
    assert_eq!(page.total_rows, 1);
    assert_eq!(page.rows[0].recipes.len(), 3);
}

#[tokio::test]
async fn listing_filters_and_short_links() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let (breakfast, breakfast_slug) = tag(&pool).await;
    let (dinner, _) = tag(&pool).await;
    let (egg, _) = ingredient(&pool, "egg", "шт").await;

    let omelette = create_recipe(&user, form("Omelette", vec![breakfast], vec![(egg, 3)]), &pool)
        .await
        .ok()
        .unwrap();
    create_recipe(&user, form("Frittata", vec![dinner], vec![(egg, 6)]), &pool)
        .await
        .ok()
        .unwrap();
    add_favorite(&user, omelette.id, &pool).await.ok().unwrap();

    let by_author = fetch_recipes(
        RecipeFilter {
            author: Some(user.user_id),
            ..Default::default()
        },
        None,
        &pool,
    )
    .await
    .ok()
    .unwrap();
    let names: Vec<&str> = by_author.rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Frittata", "Omelette"]);

    let by_tag = fetch_recipes(
        RecipeFilter {
            tags: vec![breakfast_slug],
            ..Default::default()
        },
        None,
        &pool,
    )
    .await
    .ok()
    .unwrap();
    assert_eq!(by_tag.total_rows, 1);
    assert_eq!(by_tag.rows[0].id, omelette.id);

    let favorited = RecipeFilter {
        author: Some(user.user_id),
        is_favorited: true,
        ..Default::default()
    };
    let mine = fetch_recipes(favorited.clone(), Some(&user), &pool).await.ok().unwrap();
    assert_eq!(mine.total_rows, 1);
    assert!(mine.rows[0].is_favorited);

    let anonymous = fetch_recipes(favorited, None, &pool).await.ok().unwrap();
    assert_eq!(anonymous.total_rows, 0);

    let link = get_short_link(omelette.id, "https://foodgram.example", &pool)
        .await
        .ok()
        .unwrap();
    let code = link
        .strip_prefix("https://foodgram.example/s/")
        .expect("unexpected short link");
    assert_eq!(resolve_short_code(code, &pool).await.ok(), Some(omelette.id));

    let error = error_of(resolve_short_code("nope", &pool).await);
    assert!(error.code == 404);
}

#[tokio::test]
async fn concurrent_favorites_store_one_row() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;
    let recipe = create_recipe(&user, form("Stew", vec![tag_id], vec![(flour, 10)]), &pool)
        .await
        .ok()
        .unwrap();

    let (first, second) = tokio::join!(
        add_favorite(&user, recipe.id, &pool),
        add_favorite(&user, recipe.id, &pool)
    );
    let (added, error) = match (first, second) {
        (Ok(short), Err(e)) | (Err(e), Ok(short)) => (short, e),
        (Ok(_), Ok(_)) => panic!("both favorites were stored"),
        (Err(a), Err(b)) => panic!("both favorites failed: {:?} / {:?}", a.info, b.info),
    };
    assert_eq!(added.id, recipe.id);
    assert!(error.code == 400);
    assert_eq!(error.info.as_deref(), Some("errors: Favorite already exists"));
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM favorites WHERE user_id = $1", user.user_id).await,
        1
    );
}

/// Bypasses the action layer so only the table constraints can object.
async fn insert_favorite(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[tokio::test]
async fn storage_constraints_map_to_domain_errors() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;
    let kept = create_recipe(&user, form("Kept", vec![tag_id], vec![(flour, 1)]), &pool)
        .await
        .ok()
        .unwrap();
    let gone = create_recipe(&user, form("Gone", vec![tag_id], vec![(flour, 1)]), &pool)
        .await
        .ok()
        .unwrap();
    delete_recipe(&user, gone.id, &pool).await.ok().unwrap();

    let error = insert_favorite(&pool, user.user_id, gone.id)
        .await
        .map_err(translate_database_error)
        .err()
        .unwrap();
    assert!(error.code == 404);
    assert_eq!(error.info.as_deref(), Some("detail: Recipe not found"));

    insert_favorite(&pool, user.user_id, kept.id).await.unwrap();
    let error = insert_favorite(&pool, user.user_id, kept.id)
        .await
        .map_err(translate_database_error)
        .err()
        .unwrap();
    assert!(error.code == 400);
    assert_eq!(error.info.as_deref(), Some("errors: Favorite already exists"));

    let error = sqlx::query("INSERT INTO users (email, username, password) VALUES ($1, $2, 'x')")
        .bind(format!("{}@EXAMPLE.com", user.username.to_uppercase()))
        .bind(unique("shadow"))
        .execute(&pool)
        .await
        .map_err(translate_database_error)
        .err()
        .unwrap();
    assert!(error.code == 400);
    assert_eq!(
        error.info.as_deref(),
        Some("email: A user with that email already exists")
    );
}

#[tokio::test]
async fn registration_ignores_email_case() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;

    let error = error_of(
        register_user(
            RegisterForm {
                email: format!("{}@Example.COM", user.username.to_uppercase()),
                username: unique("other"),
                first_name: "Other".to_owned(),
                last_name: "Cook".to_owned(),
                password: "correct horse".to_owned(),
            },
            &pool,
        )
        .await,
    );
    assert!(error.code == 400);
    assert_eq!(
        error.info.as_deref(),
        Some("email: A user with that email already exists")
    );
}

#[tokio::test]
async fn pages_past_the_end_keep_the_total() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let author = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;
    for name in ["First", "Second"] {
        create_recipe(&author, form(name, vec![tag_id], vec![(flour, 1)]), &pool)
            .await
            .ok()
            .unwrap();
    }
    subscribe(&user, author.user_id, None, &pool).await.ok().unwrap();

    let past = fetch_recipes(
        RecipeFilter {
            author: Some(author.user_id),
            page: Page::new(Some(5), Some(1), 6),
            ..Default::default()
        },
        None,
        &pool,
    )
    .await
    .ok()
    .unwrap();
    assert!(past.rows.is_empty());
    assert_eq!(past.total_rows, 2);
    assert_eq!(past.page_count, 2);
    assert_eq!(past.prev_page, Some(2));

    let past = list_subscriptions(&user, Page::new(Some(3), None, 6), None, &pool)
        .await
        .ok()
        .unwrap();
    assert!(past.rows.is_empty());
    assert_eq!(past.total_rows, 1);

    let past = list_users(Page::new(Some(i64::MAX), Some(100), 6), None, &pool)
        .await
        .ok()
        .unwrap();
    assert!(past.rows.is_empty());
    assert!(past.total_rows >= 2);
}

#[tokio::test]
async fn short_code_collisions_are_retried() {
    let Some(pool) = pool().await else { return };
    let user = register(&pool).await;
    let (tag_id, _) = tag(&pool).await;
    let (flour, _) = ingredient(&pool, "flour", "g").await;

    let first = create_recipe(&user, form("Taken", vec![tag_id], vec![(flour, 1)]), &pool)
        .await
        .ok()
        .unwrap();
    let taken = get_recipe(first.id, &pool).await.ok().unwrap().unwrap().short_code;
    let fresh = generate_token(8);

    let mut codes = vec![taken.clone(), taken.clone(), fresh.clone()].into_iter();
    let second = create_recipe_with_codes(
        &user,
        form("Retried", vec![tag_id], vec![(flour, 1)]),
        move || codes.next().unwrap_or_else(|| generate_token(8)),
        &pool,
    )
    .await
    .ok()
    .unwrap();
    let stored = get_recipe(second.id, &pool).await.ok().unwrap().unwrap();
    assert_eq!(stored.short_code, fresh);

    let error = error_of(
        create_recipe_with_codes(
            &user,
            form("Unlucky", vec![tag_id], vec![(flour, 1)]),
            || taken.clone(),
            &pool,
        )
        .await,
    );
    assert!(error.code == 500);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM recipes WHERE author_id = $1", user.user_id).await,
        2
    );
}
