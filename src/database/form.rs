use std::{collections::HashMap, str::FromStr};

use potion::Error;
use serde_json::Value;

use super::error::TypeError;
use crate::{
    constants::{RECIPE_COUNT_PER_PAGE, TRUE_VALUES, USER_COUNT_PER_PAGE},
    pagination::Page,
    schema::Uuid,
};

pub type FormData = HashMap<String, Value>;

pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    /// Query strings arrive as plain strings; every value becomes a JSON string.
    pub fn from_query(query: HashMap<String, String>) -> Self {
        Self {
            inner: query
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get_number<T>(&self, key: &str) -> Result<T, Error>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            Some(value) => {
                let raw = match value {
                    Value::String(v) => v.to_owned(),
                    Value::Number(v) => v.to_string(),
                    _ => return Err(TypeError::new("Failed to parse value as str").into()),
                };
                raw.trim()
                    .parse()
                    .map_err(|_e| TypeError::new("Invalid type conversion").into())
            }
            None => Err(TypeError::new("Invalid key").into()),
        }
    }

    pub fn get_optional_number<T>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
    {
        if !self.contains(key) {
            return Ok(None);
        }
        self.get_number(key).map(Some)
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new("Invalid key")),
            },
            None => Err(TypeError::new("Invalid key")),
        }
    }

    /// `page` and `limit`, both optional.
    pub fn get_page(&self, default_size: i64) -> Result<Page, Error> {
        Ok(Page::new(
            self.get_optional_number("page")?,
            self.get_optional_number("limit")?,
            default_size,
        ))
    }

    /// Missing and unrecognised values are false.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.inner.get(key) {
            Some(Value::Bool(v)) => *v,
            Some(Value::Number(v)) => v.as_i64() == Some(1),
            Some(Value::String(v)) => TRUE_VALUES.contains(&v.trim().to_lowercase().as_str()),
            _ => false,
        }
    }

    /// Accepts either a JSON array or a single (possibly comma separated) string.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.inner.get(key) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str())
                .map(|v| v.to_owned())
                .collect(),
            Some(Value::String(v)) => v
                .split(',')
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_owned())
                .collect(),
            _ => vec![],
        }
    }
}

/// Filters accepted by the recipe listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub search: Option<String>,
    pub page: Page,
}

impl Default for RecipeFilter {
    fn default() -> Self {
        Self {
            tags: vec![],
            author: None,
            is_favorited: false,
            is_in_shopping_cart: false,
            search: None,
            page: Page::new(None, None, RECIPE_COUNT_PER_PAGE),
        }
    }
}

impl TryFrom<&Form> for RecipeFilter {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        Ok(Self {
            tags: form.get_list("tags"),
            author: form.get_optional_number("author")?,
            is_favorited: form.get_bool("is_favorited"),
            is_in_shopping_cart: form.get_bool("is_in_shopping_cart"),
            search: form
                .get_str("search")
                .ok()
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            page: form.get_page(RECIPE_COUNT_PER_PAGE)?,
        })
    }
}

/// Query of the user and subscription listings.
#[derive(Debug, Clone, PartialEq)]
pub struct UserListQuery {
    pub page: Page,
    pub recipes_limit: Option<i64>,
}

impl TryFrom<&Form> for UserListQuery {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        Ok(Self {
            page: form.get_page(USER_COUNT_PER_PAGE)?,
            recipes_limit: form.get_optional_number("recipes_limit")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Form {
        Form::from_query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn booleans_follow_query_conventions() {
        let form = query(&[("a", "1"), ("b", "True"), ("c", "yes"), ("d", "0"), ("e", "nope")]);
        assert!(form.get_bool("a"));
        assert!(form.get_bool("b"));
        assert!(form.get_bool("c"));
        assert!(!form.get_bool("d"));
        assert!(!form.get_bool("e"));
        assert!(!form.get_bool("missing"));
    }

    #[test]
    fn numbers_parse_from_strings_and_json() {
        let mut data = FormData::new();
        data.insert("page".to_owned(), json!(3));
        data.insert("limit".to_owned(), json!(" 12 "));
        let form = Form::from_data(data);
        assert_eq!(form.get_number::<i64>("page").ok(), Some(3));
        assert_eq!(form.get_number::<i64>("limit").ok(), Some(12));
        assert!(form.get_number::<i64>("missing").is_err());
        assert_eq!(form.get_optional_number::<i64>("missing").ok(), Some(None));
    }

    #[test]
    fn lists_accept_arrays_and_strings() {
        let mut data = FormData::new();
        data.insert("tags".to_owned(), json!(["breakfast", "lunch"]));
        assert_eq!(Form::from_data(data).get_list("tags"), vec!["breakfast", "lunch"]);

        let form = query(&[("tags", "breakfast, dinner,")]);
        assert_eq!(form.get_list("tags"), vec!["breakfast", "dinner"]);
    }

    #[test]
    fn recipe_filter_from_query() {
        let form = query(&[
            ("tags", "breakfast"),
            ("author", "4"),
            ("is_favorited", "1"),
            ("page", "2"),
            ("limit", "500"),
            ("search", "  "),
        ]);
        let filter = RecipeFilter::try_from(&form).ok().unwrap();
        assert_eq!(filter.tags, vec!["breakfast"]);
        assert_eq!(filter.author, Some(4));
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
        assert_eq!(filter.search, None);
        assert_eq!(filter.page, Page { number: 2, size: 100 });
    }

    #[test]
    fn user_list_query_reads_recipes_limit() {
        let parsed = UserListQuery::try_from(&query(&[("recipes_limit", "3"), ("page", "2")]))
            .ok()
            .unwrap();
        assert_eq!(parsed.recipes_limit, Some(3));
        assert_eq!(parsed.page, Page { number: 2, size: 6 });

        let parsed = UserListQuery::try_from(&query(&[])).ok().unwrap();
        assert_eq!(parsed.recipes_limit, None);
    }

    #[test]
    fn recipe_filter_rejects_malformed_numbers() {
        let form = query(&[("author", "someone")]);
        assert!(RecipeFilter::try_from(&form).is_err());
    }
}
