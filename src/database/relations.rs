use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{
    error::DomainError,
    schema::Uuid,
};

/// The (user, object) pairs a user can toggle. All of them share one table
/// shape: `id`, `user_id` and an object column, unique per pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Favorite,
    ShoppingCart,
    Subscription,
}

impl RelationKind {
    pub const ALL: [RelationKind; 3] = [
        RelationKind::Favorite,
        RelationKind::ShoppingCart,
        RelationKind::Subscription,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
            RelationKind::Subscription => "subscriptions",
        }
    }

    pub fn object_column(&self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipe_id",
            RelationKind::Subscription => "author_id",
        }
    }

    pub fn object_table(&self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipes",
            RelationKind::Subscription => "users",
        }
    }

    pub fn object_label(&self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => "Recipe",
            RelationKind::Subscription => "User",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelationKind::Favorite => "Favorite",
            RelationKind::ShoppingCart => "Shopping cart entry",
            RelationKind::Subscription => "Subscription",
        }
    }

    pub fn unique_constraint(&self) -> &'static str {
        match self {
            RelationKind::Favorite => "unique_favorite",
            RelationKind::ShoppingCart => "unique_shopping_cart",
            RelationKind::Subscription => "unique_subscription",
        }
    }

    /// Name Postgres gives the inline foreign key on the object column.
    pub fn object_constraint(&self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites_recipe_id_fkey",
            RelationKind::ShoppingCart => "shopping_cart_recipe_id_fkey",
            RelationKind::Subscription => "subscriptions_author_id_fkey",
        }
    }

    /// Checks that need no storage access. Runs before anything else on add.
    pub fn check_pair(&self, subject: Uuid, object: Uuid) -> Result<(), DomainError> {
        if *self == RelationKind::Subscription && subject == object {
            return Err(DomainError::SelfSubscription);
        }
        Ok(())
    }
}

impl Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A stored pair as returned by an insert.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct Relation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub object_id: Uuid,
}
