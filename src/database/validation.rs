//! Recipe composition checks.
//!
//! These run before anything touches the database, identically for create
//! and update. The unique and check constraints of the schema back them up
//! under concurrent writes.

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::{
    constants::{
        AMOUNT_MAX_DIGITS, AMOUNT_MAX_SCALE, EMAIL_MAX_LENGTH, MIN_COOKING_TIME,
        NAME_MAX_LENGTH, RECIPE_NAME_MAX_LENGTH, RESERVED_USERNAMES, USERNAME_MAX_LENGTH,
        USERNAME_SYMBOLS,
    },
    error::DomainError,
    schema::{IngredientAmount, RecipeForm, RecipeUpdate, RegisterForm, Uuid},
};

/// Every id occurring more than once, in order of first repetition.
fn duplicates<I: IntoIterator<Item = Uuid>>(ids: I) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    let mut repeated = vec![];
    for id in ids {
        if !seen.insert(id) && !repeated.contains(&id) {
            repeated.push(id);
        }
    }
    repeated
}

fn fits_amount_precision(amount: &Decimal) -> bool {
    let normalized = amount.normalize();
    if normalized.scale() > AMOUNT_MAX_SCALE {
        return false;
    }
    let integer_digits = AMOUNT_MAX_DIGITS - AMOUNT_MAX_SCALE;
    normalized.trunc().abs() < Decimal::from(10i64.pow(integer_digits))
}

pub fn validate_tags(tags: Vec<Uuid>) -> Result<Vec<Uuid>, DomainError> {
    if tags.is_empty() {
        return Err(DomainError::NoTags);
    }
    let repeated = duplicates(tags.iter().copied());
    if !repeated.is_empty() {
        return Err(DomainError::DuplicateTags(repeated));
    }
    Ok(tags)
}

pub fn validate_ingredients(
    ingredients: Vec<IngredientAmount>,
) -> Result<Vec<IngredientAmount>, DomainError> {
    if ingredients.is_empty() {
        return Err(DomainError::NoIngredients);
    }
    let repeated = duplicates(ingredients.iter().map(|part| part.id));
    if !repeated.is_empty() {
        return Err(DomainError::DuplicateIngredients(repeated));
    }

    let non_positive: Vec<Uuid> = ingredients
        .iter()
        .filter(|part| part.amount <= Decimal::ZERO)
        .map(|part| part.id)
        .collect();
    if !non_positive.is_empty() {
        return Err(DomainError::NonPositiveAmount(non_positive));
    }

    let out_of_range: Vec<Uuid> = ingredients
        .iter()
        .filter(|part| !fits_amount_precision(&part.amount))
        .map(|part| part.id)
        .collect();
    if !out_of_range.is_empty() {
        return Err(DomainError::AmountOutOfRange(out_of_range));
    }

    Ok(ingredients)
}

pub fn validate_cooking_time(cooking_time: i32) -> Result<i32, DomainError> {
    if cooking_time < MIN_COOKING_TIME {
        return Err(DomainError::InvalidCookingTime);
    }
    Ok(cooking_time)
}

fn validate_text(field: &'static str, value: String, max: Option<usize>) -> Result<String, DomainError> {
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Err(DomainError::EmptyField(field));
    }
    if let Some(max) = max {
        if value.chars().count() > max {
            return Err(DomainError::FieldTooLong { field, max });
        }
    }
    Ok(value)
}

/// A recipe payload that passed every check, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmount>,
}

impl TryFrom<RecipeForm> for ValidRecipe {
    type Error = DomainError;

    fn try_from(form: RecipeForm) -> Result<Self, Self::Error> {
        Ok(Self {
            tags: validate_tags(form.tags)?,
            ingredients: validate_ingredients(form.ingredients)?,
            cooking_time: validate_cooking_time(form.cooking_time)?,
            name: validate_text("name", form.name, Some(RECIPE_NAME_MAX_LENGTH))?,
            text: validate_text("text", form.text, None)?,
            image: validate_text("image", form.image, None)?,
        })
    }
}

/// Only the supplied fields are checked, the rest stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidRecipeUpdate {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
}

impl TryFrom<RecipeUpdate> for ValidRecipeUpdate {
    type Error = DomainError;

    fn try_from(update: RecipeUpdate) -> Result<Self, Self::Error> {
        Ok(Self {
            tags: update.tags.map(validate_tags).transpose()?,
            ingredients: update.ingredients.map(validate_ingredients).transpose()?,
            cooking_time: update.cooking_time.map(validate_cooking_time).transpose()?,
            name: update
                .name
                .map(|name| validate_text("name", name, Some(RECIPE_NAME_MAX_LENGTH)))
                .transpose()?,
            text: update
                .text
                .map(|text| validate_text("text", text, None))
                .transpose()?,
            image: update
                .image
                .map(|image| validate_text("image", image, None))
                .transpose()?,
        })
    }
}

impl ValidRecipeUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

pub fn validate_username(username: String) -> Result<String, DomainError> {
    let username = validate_text("username", username, Some(USERNAME_MAX_LENGTH))?;
    let valid_symbols = username
        .chars()
        .all(|c| c.is_alphanumeric() || USERNAME_SYMBOLS.contains(&c));
    let reserved = RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(&username));

    if !valid_symbols || reserved {
        return Err(DomainError::InvalidUsername);
    }
    Ok(username)
}

pub fn validate_registration(form: RegisterForm) -> Result<RegisterForm, DomainError> {
    let email = validate_text("email", form.email, Some(EMAIL_MAX_LENGTH))?;
    if !email.contains('@') {
        return Err(DomainError::InvalidEmail);
    }
    if form.password.is_empty() {
        return Err(DomainError::EmptyField("password"));
    }

    Ok(RegisterForm {
        email,
        username: validate_username(form.username)?,
        first_name: validate_text("first_name", form.first_name, Some(NAME_MAX_LENGTH))?,
        last_name: validate_text("last_name", form.last_name, Some(NAME_MAX_LENGTH))?,
        password: form.password,
    })
}
