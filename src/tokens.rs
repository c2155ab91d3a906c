//! Tokens are the unit of flow through a simulated network - an entity, or
//! an aggregate batch of entities.  All tokens live in a single arena and
//! refer to each other by index, so parent/child back-references never form
//! ownership cycles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::stations::StationId;
use crate::store::StoreId;
use crate::utils::errors::SimulationError;

/// Priorities are small signed integers; lower values are served first.
pub type Priority = i32;

/// Conventional priority anchors for laboratory-style networks.  Any
/// `i32` is accepted.
pub const ROUTINE: Priority = 0;
pub const URGENT: Priority = -3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub usize);

/// Heterogeneous values for the string-keyed attribute bag each token
/// carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Flag(bool),
}

impl AttributeValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            AttributeValue::Real(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttributeValue::Flag(value) => Some(*value),
            _ => None,
        }
    }
}

/// A token occupies exactly one place at any instant.  `Parked` covers
/// tokens at rest outside any store or station: a parent awaiting
/// collation of its children, or a batch member carried inside an
/// aggregate shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Creating,
    Queue(StoreId),
    InService(StationId),
    Parked,
    Retired,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub id: TokenId,
    priority: Priority,
    pub attributes: HashMap<String, AttributeValue>,
    pub parent: Option<TokenId>,
    pub children: Vec<TokenId>,
    /// Set only on shells created by a Batcher; drives unbatching on
    /// delivery.
    pub aggregate: bool,
    pub created_at: f64,
    pub(crate) location: Location,
}

impl Token {
    /// Priority is fixed at creation (children inherit from their parent)
    /// and immutable thereafter.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        self.attributes.insert(key.to_string(), value);
    }
}

/// A census of token locations, for conservation checking: every token is
/// in a store, in service (or parked), or retired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    pub creating: usize,
    pub queued: usize,
    pub in_service: usize,
    pub parked: usize,
    pub retired: usize,
}

#[derive(Debug, Default)]
pub struct TokenArena {
    slots: Vec<Token>,
}

impl TokenArena {
    pub fn create(&mut self, priority: Priority, created_at: f64) -> TokenId {
        let id = TokenId(self.slots.len());
        self.slots.push(Token {
            id,
            priority,
            attributes: HashMap::new(),
            parent: None,
            children: Vec::new(),
            aggregate: false,
            created_at,
            location: Location::Creating,
        });
        id
    }

    /// Creates a child linked to `parent`, inheriting the parent's
    /// priority.
    pub fn create_child(
        &mut self,
        parent: TokenId,
        created_at: f64,
    ) -> Result<TokenId, SimulationError> {
        let priority = self.get(parent)?.priority;
        let child = self.create(priority, created_at);
        self.slots[child.0].parent = Some(parent);
        self.slots[parent.0].children.push(child);
        Ok(child)
    }

    pub fn get(&self, id: TokenId) -> Result<&Token, SimulationError> {
        self.slots.get(id.0).ok_or(SimulationError::TokenNotFound)
    }

    pub fn get_mut(&mut self, id: TokenId) -> Result<&mut Token, SimulationError> {
        self.slots
            .get_mut(id.0)
            .ok_or(SimulationError::TokenNotFound)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.slots.iter()
    }

    pub fn census(&self) -> Census {
        self.slots
            .iter()
            .fold(Census::default(), |mut census, token| {
                match token.location {
                    Location::Creating => census.creating += 1,
                    Location::Queue(_) => census.queued += 1,
                    Location::InService(_) => census.in_service += 1,
                    Location::Parked => census.parked += 1,
                    Location::Retired => census.retired += 1,
                }
                census
            })
    }
}
