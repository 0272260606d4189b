//! Swarm error types.
//!
//! None of these escape the tick API: the embedding surface absorbs them and
//! degrades to a safe default (orbit, dropped spawn, ignored handle).

use thiserror::Error;

use crate::components::AgentHandle;
use crate::projectile::ProjectileKind;

/// Errors raised by fallible swarm internals.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// Agent pool hit its configured hard cap
    #[error("agent pool exhausted (hard cap {capacity})")]
    PoolExhausted { capacity: usize },

    /// Projectile pool for a kind hit its configured hard cap
    #[error("projectile pool exhausted for kind {kind:?} (hard cap {capacity})")]
    ProjectilePoolExhausted { kind: ProjectileKind, capacity: usize },

    /// Handle is released or was never issued by this swarm
    #[error("unknown or inactive agent handle: {0}")]
    UnknownHandle(AgentHandle),

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed
    #[error("configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type SwarmResult<T> = Result<T, SwarmError>;
