//! Actor roles and the cache/subscription key derived from them.

use serde::Serialize;
use std::fmt;

/// Which side of the negotiation an actor id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Supplier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Supplier => "supplier",
        }
    }

    /// Named procedure listing this role's offers.
    pub(crate) fn list_procedure(&self) -> &'static str {
        match self {
            Role::Buyer => crate::gateway::procedures::GET_BUYER_OFFERS,
            Role::Supplier => crate::gateway::procedures::GET_SUPPLIER_OFFERS,
        }
    }

    /// Argument name the list procedure expects.
    pub(crate) fn id_arg(&self) -> &'static str {
        match self {
            Role::Buyer => "p_buyer_id",
            Role::Supplier => "p_supplier_id",
        }
    }

    /// Column filtered on by the fallback table query and realtime topic.
    pub(crate) fn id_column(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer_id",
            Role::Supplier => "supplier_id",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-namespaced actor id. Buyer `"42"` and supplier `"42"` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorKey {
    pub role: Role,
    pub actor_id: String,
}

impl ActorKey {
    pub fn new(role: Role, actor_id: impl Into<String>) -> Self {
        Self {
            role,
            actor_id: actor_id.into(),
        }
    }

    pub fn buyer(actor_id: impl Into<String>) -> Self {
        Self::new(Role::Buyer, actor_id)
    }

    pub fn supplier(actor_id: impl Into<String>) -> Self {
        Self::new(Role::Supplier, actor_id)
    }
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.actor_id)
    }
}
