use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData, SessionKeys},
        permissions::ActionType,
    },
    error::{translate_database_error, DomainError, QueryError},
    pagination::{Page, PageContext},
    schema::{
        AuthorRow, PasswordForm, RegisterForm, ShortRecipe, SubscribedAuthor, User, UserProfile,
        UserRow, Uuid,
    },
    validation::validate_registration,
};

use potion::HtmlError;
use sqlx::{Pool, Postgres};

const PROFILE_COLUMNS: &str = "
    u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
    EXISTS(SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = $1) AS is_subscribed
";

pub async fn get_user(
    pool: &Pool<Postgres>,
    username: &str,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Uuid,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email.trim())
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Creates a user. The password is stored as an argon2 hash.
pub async fn register_user(
    form: RegisterForm,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, potion::Error> {
    ActionType::Register.authorize(None)?;
    let form = validate_registration(form)?;

    if get_user(pool, &form.username).await?.is_some() {
        return Err(DomainError::UsernameTaken.into());
    }
    if get_user_by_email(pool, &form.email).await?.is_some() {
        return Err(DomainError::EmailTaken.into());
    }

    let password = hash_password(&form.password)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to hash password"))?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(translate_database_error)?;

    log::debug!("Registered user {} ({})", user.username, user.id);

    Ok(UserProfile {
        id: user.id,
        email: user.email,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        avatar: user.avatar,
        is_subscribed: false,
    })
}

/// Returns a session token for the `Authorization: Token` header.
pub async fn login_user(
    email: &str,
    password: &str,
    keys: &SessionKeys,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    let user = match get_user_by_email(pool, email).await? {
        Some(user) => user,
        None => return Err(DomainError::InvalidCredentials.into()),
    };

    let authenticated = verify_password(password, &user.password)
        .map_err(|_| HtmlError::InternalServerError.new("Stored password hash is malformed"))?;
    if !authenticated {
        return Err(DomainError::InvalidCredentials.into());
    }

    generate_jwt_session(&user, keys)
}

pub async fn get_profile(
    user_id: Uuid,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, potion::Error> {
    ActionType::ReadUsers.authorize(viewer)?;

    let row: Option<UserProfile> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = $2"
    ))
    .bind(viewer.map(|s| s.user_id))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    row.ok_or_else(|| DomainError::NotFound("User").into())
}

/// Row count for a page past the end, where `COUNT(*) OVER()` has no row to ride on.
async fn count_rows(
    sql: &str,
    user_id: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<i64, potion::Error> {
    let mut query = sqlx::query_as::<_, (i64,)>(sql);
    if let Some(user_id) = user_id {
        query = query.bind(user_id);
    }

    let row = query
        .fetch_one(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}

pub async fn list_users(
    page: Page,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserProfile>, potion::Error> {
    ActionType::ReadUsers.authorize(viewer)?;

    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS}, COUNT(*) OVER() AS count FROM users u ORDER BY u.id LIMIT $2 OFFSET $3"
    ))
    .bind(viewer.map(|s| s.user_id))
    .bind(page.size)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.number > 1 => count_rows("SELECT COUNT(*) FROM users", None, pool).await?,
        None => 0,
    };
    Ok(PageContext::from_rows(rows, total_count, page).map(UserProfile::from))
}

pub async fn set_password(
    session: &SessionData,
    form: PasswordForm,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authorize(ActionType::ManageOwnAccount)?;
    if form.new_password.is_empty() {
        return Err(DomainError::EmptyField("new_password").into());
    }

    let user = get_user_by_id(pool, session.user_id)
        .await?
        .ok_or_else(|| potion::Error::from(DomainError::NotAuthenticated))?;

    let authenticated = verify_password(&form.current_password, &user.password)
        .map_err(|_| HtmlError::InternalServerError.new("Stored password hash is malformed"))?;
    if !authenticated {
        return Err(DomainError::WrongPassword.into());
    }

    let password = hash_password(&form.new_password)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to hash password"))?;

    sqlx::query("UPDATE users SET password = $2 WHERE id = $1")
        .bind(session.user_id)
        .bind(password)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    log::debug!("User {} changed password", session.user_id);
    Ok(())
}

pub async fn set_avatar(
    session: &SessionData,
    avatar: String,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    session.authorize(ActionType::ManageOwnAccount)?;
    let avatar = avatar.trim().to_owned();
    if avatar.is_empty() {
        return Err(DomainError::EmptyField("avatar").into());
    }

    sqlx::query("UPDATE users SET avatar = $2 WHERE id = $1")
        .bind(session.user_id)
        .bind(&avatar)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(avatar)
}

pub async fn delete_avatar(session: &SessionData, pool: &Pool<Postgres>) -> Result<(), potion::Error> {
    session.authorize(ActionType::ManageOwnAccount)?;

    sqlx::query("UPDATE users SET avatar = NULL WHERE id = $1")
        .bind(session.user_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

/// Newest first. `limit` of `None` lists every recipe.
pub async fn list_author_recipes(
    author_id: Uuid,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShortRecipe>, potion::Error> {
    let rows: Vec<ShortRecipe> = sqlx::query_as(
        "
        SELECT id, name, image, cooking_time FROM recipes
        WHERE author_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
    ",
    )
    .bind(author_id)
    .bind(limit.map(|limit| limit.max(0)))
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

async fn expand_author(
    row: AuthorRow,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscribedAuthor, potion::Error> {
    let recipes = list_author_recipes(row.id, recipes_limit, pool).await?;

    Ok(SubscribedAuthor {
        author: UserProfile {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar: row.avatar,
            is_subscribed: true,
        },
        recipes,
        recipes_count: row.recipes_count,
    })
}

const AUTHOR_QUERY: &str = "
    SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
        (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
        COUNT(*) OVER() AS count
    FROM subscriptions s
    INNER JOIN users u ON u.id = s.author_id
    WHERE s.user_id = $1
";

/// An author the session follows, with their newest recipes.
pub async fn get_subscribed_author(
    session: &SessionData,
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscribedAuthor, potion::Error> {
    let row: Option<AuthorRow> = sqlx::query_as(&format!("{AUTHOR_QUERY} AND u.id = $2"))
        .bind(session.user_id)
        .bind(author_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    match row {
        Some(row) => expand_author(row, recipes_limit, pool).await,
        None => Err(DomainError::NotFound("Subscription").into()),
    }
}

pub async fn list_subscriptions(
    session: &SessionData,
    page: Page,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscribedAuthor>, potion::Error> {
    session.authorize(ActionType::ManageSubscriptions)?;

    let rows: Vec<AuthorRow> = sqlx::query_as(&format!(
        "{AUTHOR_QUERY} ORDER BY u.username LIMIT $2 OFFSET $3"
    ))
    .bind(session.user_id)
    .bind(page.size)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.number > 1 => {
            count_rows(
                "SELECT COUNT(*) FROM subscriptions WHERE user_id = $1",
                Some(session.user_id),
                pool,
            )
            .await?
        }
        None => 0,
    };

    let mut authors = Vec::with_capacity(rows.len());
    for row in rows {
        authors.push(expand_author(row, recipes_limit, pool).await?);
    }

    Ok(PageContext::from_rows(authors, total_count, page))
}
