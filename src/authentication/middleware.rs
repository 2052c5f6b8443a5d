use warp::{
    header,
    reject::{self, Rejection},
    Filter,
};

use super::jwt::{verify_authorization_header, SessionData, SessionKeys};

#[derive(Debug)]
struct Unauthorized;

impl reject::Reject for Unauthorized {}

/// Rejects requests without a valid `Authorization: Token <jwt>` header.
pub fn with_session(
    keys: SessionKeys,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    header::optional::<String>("authorization").and_then(move |value: Option<String>| {
        let session = value
            .ok_or(())
            .and_then(|value| verify_authorization_header(&value, &keys).map_err(|_| ()));
        async move {
            match session {
                Ok(data) => Ok(data),
                Err(_) => Err(reject::custom(Unauthorized)),
            }
        }
    })
}

/// Anonymous requests pass through as `None`, as do invalid tokens.
pub fn with_possible_session(
    keys: SessionKeys,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    header::optional::<String>("authorization").map(move |value: Option<String>| {
        value.and_then(|value| verify_authorization_header(&value, &keys).ok())
    })
}
