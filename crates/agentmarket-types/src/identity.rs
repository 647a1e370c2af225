//! Identity types for AgentMarket
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

// Core identity types
define_id_type!(AgentId, "agent", "Unique identifier for a registered agent");
define_id_type!(PrincipalId, "prin", "An already-authenticated principal (owner, payer, or arbiter)");

// Lifecycle identity types
define_id_type!(RequestId, "req", "Unique identifier for a service request");
define_id_type!(EscrowRef, "escrow", "Reference to a custodial escrow account");
define_id_type!(RatingId, "rating", "Unique identifier for a rating");
define_id_type!(DisputeId, "dispute", "Unique identifier for a dispute");

// Ledger identity types
define_id_type!(EntryId, "entry", "Unique identifier for a ledger entry");

/// A destination account in the funds ledger
///
/// Principals hold spendable balances; escrow accounts custody funds for
/// exactly one service request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountId {
    /// A principal's spendable balance
    Principal(PrincipalId),
    /// Custody account tied to one service request
    Escrow(EscrowRef),
}

impl AccountId {
    /// Create a principal account reference
    pub fn principal(id: PrincipalId) -> Self {
        Self::Principal(id)
    }

    /// Create an escrow account reference
    pub fn escrow(id: EscrowRef) -> Self {
        Self::Escrow(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Principal(id) => write!(f, "{}", id),
            Self::Escrow(id) => write!(f, "{}", id),
        }
    }
}

impl From<PrincipalId> for AccountId {
    fn from(id: PrincipalId) -> Self {
        Self::Principal(id)
    }
}

impl From<EscrowRef> for AccountId {
    fn from(id: EscrowRef) -> Self {
        Self::Escrow(id)
    }
}
