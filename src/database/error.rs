use std::fmt::{self, Display};

use potion::{Error, HtmlError};

use crate::{constants::MIN_COOKING_TIME, relations::RelationKind, schema::Uuid};

pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl Into<Error> for QueryError {
    fn into(self) -> Error {
        Error {
            code: 500,
            info: Some(self.info),
            redirect: None,
        }
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl Into<Error> for CacheError {
    fn into(self) -> Error {
        Error {
            code: 500,
            info: Some(self.info),
            redirect: None,
        }
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl Into<potion::Error> for TypeError {
    fn into(self) -> potion::Error {
        HtmlError::InvalidRequest.new(&self.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

fn id_suffix(ids: &[Uuid]) -> String {
    if ids.is_empty() {
        return String::new();
    }
    let ids = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<String>>()
        .join(", ");
    format!(" ({ids})")
}

/// Errors a caller can recover from. Everything else leaves the crate as a
/// `QueryError` or `CacheError` with code 500.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("At least one tag is required")]
    NoTags,
    #[error("Tags must not repeat{}", id_suffix(.0))]
    DuplicateTags(Vec<Uuid>),
    #[error("Unknown tags{}", id_suffix(.0))]
    UnknownTags(Vec<Uuid>),
    #[error("At least one ingredient is required")]
    NoIngredients,
    #[error("Ingredients must not repeat{}", id_suffix(.0))]
    DuplicateIngredients(Vec<Uuid>),
    #[error("Unknown ingredients{}", id_suffix(.0))]
    UnknownIngredients(Vec<Uuid>),
    #[error("Amount must be greater than zero{}", id_suffix(.0))]
    NonPositiveAmount(Vec<Uuid>),
    #[error("Amount does not fit NUMERIC(9, 3){}", id_suffix(.0))]
    AmountOutOfRange(Vec<Uuid>),
    #[error("Cooking time must be at least {MIN_COOKING_TIME} minute")]
    InvalidCookingTime,
    #[error("This field must not be empty")]
    EmptyField(&'static str),
    #[error("Ensure this field has no more than {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("Username may contain only letters, digits and ./@/+/-/_ and must not be reserved")]
    InvalidUsername,
    #[error("A user with that username already exists")]
    UsernameTaken,
    #[error("Enter a valid email address")]
    InvalidEmail,
    #[error("A user with that email already exists")]
    EmailTaken,
    #[error("Unable to log in with provided credentials")]
    InvalidCredentials,
    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("{0} already exists")]
    AlreadyExists(RelationKind),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("You cannot subscribe to yourself")]
    SelfSubscription,

    #[error("Authentication credentials were not provided")]
    NotAuthenticated,
    #[error("Only the author may modify this recipe")]
    NotOwner,
}

impl DomainError {
    /// The request field the error is reported under.
    pub fn field(&self) -> &'static str {
        match self {
            DomainError::NoTags | DomainError::DuplicateTags(_) | DomainError::UnknownTags(_) => {
                "tags"
            }
            DomainError::NoIngredients
            | DomainError::DuplicateIngredients(_)
            | DomainError::UnknownIngredients(_)
            | DomainError::NonPositiveAmount(_)
            | DomainError::AmountOutOfRange(_) => "ingredients",
            DomainError::InvalidCookingTime => "cooking_time",
            DomainError::EmptyField(field) => *field,
            DomainError::FieldTooLong { field, .. } => *field,
            DomainError::InvalidUsername | DomainError::UsernameTaken => "username",
            DomainError::InvalidEmail | DomainError::EmailTaken => "email",
            DomainError::WrongPassword => "current_password",
            DomainError::InvalidCredentials => "non_field_errors",
            DomainError::AlreadyExists(_) | DomainError::SelfSubscription => "errors",
            DomainError::NotFound(_) | DomainError::NotAuthenticated | DomainError::NotOwner => {
                "detail"
            }
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            DomainError::NotAuthenticated => 401,
            DomainError::NotOwner => 403,
            DomainError::NotFound(_) => 404,
            _ => 400,
        }
    }
}

impl From<DomainError> for potion::Error {
    fn from(value: DomainError) -> Self {
        Error {
            code: value.status().into(),
            info: Some(format!("{}: {}", value.field(), value)),
            redirect: None,
        }
    }
}

/// Maps a violated constraint from the migrations onto the error the
/// pre-checks would have produced.
pub fn constraint_violation(constraint: &str) -> Option<DomainError> {
    if let Some(kind) = RelationKind::ALL
        .iter()
        .find(|kind| kind.unique_constraint() == constraint)
    {
        return Some(DomainError::AlreadyExists(*kind));
    }
    if let Some(kind) = RelationKind::ALL
        .iter()
        .find(|kind| kind.object_constraint() == constraint)
    {
        return Some(DomainError::NotFound(kind.object_label()));
    }

    match constraint {
        "unique_user_email" | "unique_user_email_lower" => Some(DomainError::EmailTaken),
        "unique_user_username" => Some(DomainError::UsernameTaken),
        "unique_recipe_tag" => Some(DomainError::DuplicateTags(vec![])),
        "unique_recipe_ingredient" => Some(DomainError::DuplicateIngredients(vec![])),
        "recipe_tags_tag_fkey" => Some(DomainError::UnknownTags(vec![])),
        "recipe_ingredients_ingredient_fkey" => Some(DomainError::UnknownIngredients(vec![])),
        "recipe_tags_recipe_fkey" | "recipe_ingredients_recipe_fkey" => {
            Some(DomainError::NotFound("Recipe"))
        }
        "recipe_cooking_time_positive" => Some(DomainError::InvalidCookingTime),
        "recipe_ingredient_amount_positive" => Some(DomainError::NonPositiveAmount(vec![])),
        _ => None,
    }
}

/// Integrity violations become domain errors, anything else a 500.
pub fn translate_database_error(error: sqlx::Error) -> potion::Error {
    if let sqlx::Error::Database(e) = &error {
        if let Some(domain) = e.constraint().and_then(constraint_violation) {
            log::warn!(
                "Constraint {:?} violated past pre-checks: {domain}",
                e.constraint()
            );
            return domain.into();
        }
    }

    QueryError::from(error).into()
}
