use crate::{error::DomainError, jwt::SessionData};

/// What a caller must be to perform an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Anyone,
    Authenticated,
    /// Authenticated and the author of the recipe acted on.
    Author,
}

const ACTION_TABLE: &[(Capability, &[ActionType])] = &[
    (
        Capability::Anyone,
        &[
            ActionType::ReadRecipes,
            ActionType::ReadUsers,
            ActionType::ReadReferenceData,
            ActionType::Register,
        ],
    ),
    (
        Capability::Authenticated,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageFavorites,
            ActionType::ManageShoppingCart,
            ActionType::DownloadShoppingList,
            ActionType::ManageSubscriptions,
            ActionType::ManageOwnAccount,
        ],
    ),
    (
        Capability::Author,
        &[ActionType::UpdateRecipes, ActionType::DeleteRecipes],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    ReadRecipes,
    ReadUsers,
    ReadReferenceData,
    Register,

    CreateRecipes,
    ManageFavorites,
    ManageShoppingCart,
    DownloadShoppingList,
    ManageSubscriptions,
    ManageOwnAccount,

    UpdateRecipes,
    DeleteRecipes,
}

impl ActionType {
    /// Actions missing from the table require an author.
    pub fn capability(&self) -> Capability {
        ACTION_TABLE
            .iter()
            .find_map(|(capability, actions)| actions.contains(self).then_some(*capability))
            .unwrap_or(Capability::Author)
    }

    /// Ownership is not checked here, see `SessionData::authorize_owner`.
    pub fn authorize(self, session: Option<&SessionData>) -> Result<(), DomainError> {
        match (self.capability(), session) {
            (Capability::Anyone, _) => Ok(()),
            (_, Some(_)) => Ok(()),
            (_, None) => Err(DomainError::NotAuthenticated),
        }
    }
}

/// Unwraps the session of an action that needs one.
pub fn require_session(
    action: ActionType,
    session: Option<&SessionData>,
) -> Result<&SessionData, potion::Error> {
    action.authorize(session)?;
    session.ok_or_else(|| DomainError::NotAuthenticated.into())
}
