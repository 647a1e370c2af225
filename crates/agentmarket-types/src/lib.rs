//! AgentMarket Types - Canonical domain types for the marketplace core
//!
//! This crate contains all foundational types for AgentMarket with zero
//! dependencies on other agentmarket crates. It defines the complete type
//! system for:
//!
//! - Identity types (AgentId, RequestId, PrincipalId, etc.)
//! - Minor-unit amounts with overflow-checked arithmetic
//! - Agent profiles and pricing models
//! - Service request lifecycle types
//! - Rating and dispute records
//! - Structured errors and pagination
//!
//! # Architectural Invariants
//!
//! These types support the core AgentMarket invariants:
//!
//! 1. Funds move only through the escrow lifecycle
//! 2. Status enums only advance forward through the state machine
//! 3. Arithmetic never silently wraps or clamps
//! 4. Failure is explicit: every fallible path returns a structured error

pub mod identity;
pub mod amount;
pub mod agent;
pub mod request;
pub mod rating;
pub mod dispute;
pub mod page;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use agent::*;
pub use request::*;
pub use rating::*;
pub use dispute::*;
pub use page::*;
pub use error::*;
