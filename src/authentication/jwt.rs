use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use potion::HtmlError;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::{
    config::Config, constants::SESSION_HEADER_PREFIX, database::schema::User, error::DomainError,
    schema::Uuid,
};

use super::permissions::{ActionType, Capability};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, lifetime: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
}

impl SessionData {
    pub fn authorize(&self, action: ActionType) -> Result<(), potion::Error> {
        action.authorize(Some(self)).map_err(|e| e.into())
    }

    /// For author-only actions the session must belong to `author_id`.
    pub fn authorize_owner(&self, action: ActionType, author_id: Uuid) -> Result<(), potion::Error> {
        self.authorize(action)?;
        if action.capability() == Capability::Author && self.user_id != author_id {
            return Err(DomainError::NotOwner.into());
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        Self {
            user_id: value.user_id,
            username: value.username,
        }
    }
}

/// Signing key and token lifetime, built once from `Config`.
#[derive(Clone)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], lifetime_hours: i64) -> Result<Self, potion::Error> {
        let key = Hmac::new_from_slice(secret)
            .map_err(|_| HtmlError::InternalServerError.new("Invalid session secret"))?;

        Ok(Self {
            key,
            lifetime: Duration::hours(lifetime_hours),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, potion::Error> {
        Self::new(config.session_secret.as_bytes(), config.session_lifetime_hours)
    }
}

pub fn generate_jwt_session(user: &User, keys: &SessionKeys) -> Result<String, potion::Error> {
    sign_session(JwtSessionData::new(user.id, user.username.to_owned(), keys.lifetime), keys)
}

fn sign_session(claims: JwtSessionData, keys: &SessionKeys) -> Result<String, potion::Error> {
    claims
        .sign_with_key(&keys.key)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to sign session"))
}

pub fn verify_jwt_session(token: &str, keys: &SessionKeys) -> Result<JwtSessionData, potion::Error> {
    let session: JwtSessionData = token
        .verify_with_key(&keys.key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid Session; Invalid token"))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
    }

    Ok(session)
}

/// Verifies the value of an `Authorization: Token <jwt>` header.
pub fn verify_authorization_header(
    header: &str,
    keys: &SessionKeys,
) -> Result<SessionData, potion::Error> {
    let token = header
        .strip_prefix(SESSION_HEADER_PREFIX)
        .ok_or_else(|| HtmlError::InvalidSession.new("Invalid session; Expected a token"))?;

    verify_jwt_session(token.trim(), keys).map(SessionData::from)
}
