use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use warp::{
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    Reply,
};

use crate::constants::{MONTHS, SHOPPING_LIST_CONTENT_TYPE, SHOPPING_LIST_FILE_NAME};

/// One ingredient row of one recipe in a cart, before grouping.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct CartIngredientRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShoppingList {
    pub owner: String,
    pub date: NaiveDate,
    pub recipes: Vec<String>,
    pub items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    /// Groups rows by (name, unit), not by ingredient id, and sums the
    /// amounts. Items come out ordered by name, case-insensitively.
    pub fn build(
        owner: String,
        date: NaiveDate,
        recipes: Vec<String>,
        rows: Vec<CartIngredientRow>,
    ) -> Self {
        let mut groups: BTreeMap<(String, String, String), Decimal> = BTreeMap::new();
        for row in rows {
            let key = (row.name.to_lowercase(), row.name, row.measurement_unit);
            *groups.entry(key).or_insert(Decimal::ZERO) += row.amount;
        }

        let items = groups
            .into_iter()
            .map(|((_, name, measurement_unit), amount)| ShoppingListItem {
                name,
                measurement_unit,
                amount: amount.normalize(),
            })
            .collect();

        let recipes = recipes
            .into_iter()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();

        Self {
            owner,
            date,
            recipes,
            items,
        }
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("Список покупок: {}", self.owner),
            format!("Дата: {}", format_date(&self.date)),
            String::new(),
            String::from("Рецепты:"),
        ];
        lines.extend(self.recipes.iter().map(|name| format!("- {name}")));
        lines.push(String::new());
        lines.push(String::from("Продукты:"));
        lines.extend(self.items.iter().enumerate().map(|(i, item)| {
            format!(
                "{}. {} ({}) — {}",
                i + 1,
                item.name,
                item.measurement_unit,
                item.amount
            )
        }));

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// The rendered list as a downloadable `shopping_list.txt`.
    pub fn into_reply(self) -> warp::reply::Response {
        let reply = warp::reply::with_header(self.render(), CONTENT_TYPE, SHOPPING_LIST_CONTENT_TYPE);
        let reply = warp::reply::with_header(
            reply,
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{SHOPPING_LIST_FILE_NAME}\""),
        );

        reply.into_response()
    }
}

pub fn format_date(date: &NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}
