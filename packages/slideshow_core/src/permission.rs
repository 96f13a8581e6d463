//! Which operation needs which permission.
//!
//! The core never decides whether a caller may do something; the transport asks an
//! [`Authorizer`] before invoking a registry operation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Capability tags for deck administration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// See the list of decks
    List,
    /// Create new decks; also grants Configure
    Create,
    /// Change the pages and settings of existing decks
    Configure,
    /// Delete decks
    Delete,
    /// Everything
    Administer,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::List,
        Permission::Create,
        Permission::Configure,
        Permission::Delete,
        Permission::Administer,
    ];

    /// Permissions that directly imply this one
    pub fn implied_by(self) -> &'static [Permission] {
        match self {
            Permission::Administer => &[],
            Permission::Configure => &[Permission::Create],
            Permission::List | Permission::Create | Permission::Delete => &[Permission::Administer],
        }
    }

    /// True if holding `held` is enough for this permission
    pub fn is_granted_by(self, held: &[Permission]) -> bool {
        held.contains(&self) || self.implied_by().iter().any(|p| p.is_granted_by(held))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::List => "list",
            Permission::Create => "create",
            Permission::Configure => "configure",
            Permission::Delete => "delete",
            Permission::Administer => "administer",
        };
        f.write_str(name)
    }
}

/// Operations exposed to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListDecks,
    CreateDeck,
    ViewDeck,
    ConfigureDeck,
    RenameDeck,
    DeleteDeck,
    PollRotation,
    ListKinds,
}

impl Operation {
    /// The permission needed, or `None` for viewer-level operations
    pub fn required_permission(self) -> Option<Permission> {
        match self {
            Operation::ListDecks => Some(Permission::List),
            Operation::CreateDeck => Some(Permission::Create),
            Operation::ConfigureDeck | Operation::RenameDeck => Some(Permission::Configure),
            Operation::DeleteDeck => Some(Permission::Delete),
            Operation::ViewDeck | Operation::PollRotation | Operation::ListKinds => None,
        }
    }
}

/// Decides what a caller holding `credential` may do
pub trait Authorizer: Send + Sync {
    /// Permissions held by the caller; `None` is an anonymous caller
    fn permissions(&self, credential: Option<&str>) -> Vec<Permission>;

    fn allows(&self, credential: Option<&str>, operation: Operation) -> bool {
        match operation.required_permission() {
            None => true,
            Some(required) => required.is_granted_by(&self.permissions(credential)),
        }
    }
}

/// Static grants: a set for anonymous callers plus per-token sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrantTable {
    /// Granted to every caller, with or without a token
    #[serde(default)]
    pub anonymous: Vec<Permission>,
    #[serde(default)]
    pub tokens: Vec<TokenGrant>,
}

/// Permissions granted to the bearer of a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TokenGrant {
    pub token: String,
    pub permissions: Vec<Permission>,
}

impl GrantTable {
    /// Everything allowed for everyone
    pub fn open() -> Self {
        Self {
            anonymous: vec![Permission::Administer],
            tokens: Vec::new(),
        }
    }

    fn by_token(&self) -> HashMap<&str, &[Permission]> {
        self.tokens
            .iter()
            .map(|grant| (grant.token.as_str(), grant.permissions.as_slice()))
            .collect()
    }
}

impl Authorizer for GrantTable {
    fn permissions(&self, credential: Option<&str>) -> Vec<Permission> {
        let mut held = self.anonymous.clone();
        if let Some(extra) = credential.and_then(|token| self.by_token().get(token).copied()) {
            held.extend_from_slice(extra);
        }
        held
    }
}
