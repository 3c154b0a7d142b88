//! Core authorization types for the telemetry hierarchy.
//!
//! # Identity model
//!
//! The hierarchy is Project → Zone → Node → Sensor → Measurement. Every level is
//! addressed by a typed identifier so a zone id can never be checked against the
//! node set by accident. Identifiers are the integer primary keys of the store.
//!
//! # Credentials
//!
//! A [`Credential`] arrives already resolved by the request layer: the core
//! never parses headers, looks up tokens or verifies hashes. Anything the request
//! layer could not resolve becomes [`Credential::Anonymous`], which owns nothing.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Identifier of a platform user.
    UserId,
    "user"
);
entity_id!(
    /// Identifier of a scoped access token.
    TokenId,
    "token"
);
entity_id!(
    /// Identifier of a project, the root ownership unit.
    ProjectId,
    "project"
);
entity_id!(ZoneId, "zone");
entity_id!(NodeId, "node");
entity_id!(SensorId, "sensor");

/// The closed set of entity kinds a permission check can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Zone,
    Node,
    Sensor,
}

impl EntityKind {
    /// All kinds, broadest first.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Project,
        EntityKind::Zone,
        EntityKind::Node,
        EntityKind::Sensor,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Project => write!(f, "project"),
            EntityKind::Zone => write!(f, "zone"),
            EntityKind::Node => write!(f, "node"),
            EntityKind::Sensor => write!(f, "sensor"),
        }
    }
}

/// The object a permission check is made against.
///
/// Callers sometimes hold a mixed-type object and ask a broader checker about it
/// (for example a project check on a zone); the evaluator resolves such pairs by
/// delegating to the narrower kind, see [`crate::AuthzEngine::authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Target {
    Project(ProjectId),
    Zone(ZoneId),
    Node(NodeId),
    Sensor(SensorId),
}

impl Target {
    /// The kind this target naturally belongs to.
    pub fn kind(&self) -> EntityKind {
        match self {
            Target::Project(_) => EntityKind::Project,
            Target::Zone(_) => EntityKind::Zone,
            Target::Node(_) => EntityKind::Node,
            Target::Sensor(_) => EntityKind::Sensor,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Project(id) => id.fmt(f),
            Target::Zone(id) => id.fmt(f),
            Target::Node(id) => id.fmt(f),
            Target::Sensor(id) => id.fmt(f),
        }
    }
}

impl From<ProjectId> for Target {
    fn from(id: ProjectId) -> Self {
        Target::Project(id)
    }
}

impl From<ZoneId> for Target {
    fn from(id: ZoneId) -> Self {
        Target::Zone(id)
    }
}

impl From<NodeId> for Target {
    fn from(id: NodeId) -> Self {
        Target::Node(id)
    }
}

impl From<SensorId> for Target {
    fn from(id: SensorId) -> Self {
        Target::Sensor(id)
    }
}

/// An authenticated user as seen by the authorization core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub is_superuser: bool,
}

impl UserIdentity {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            is_superuser: false,
        }
    }

    pub fn superuser(id: UserId) -> Self {
        Self {
            id,
            is_superuser: true,
        }
    }
}

/// A resolved credential.
///
/// # Security Note
/// A superuser presenting a scoped token is a [`Credential::Token`], and is held
/// to that token's grants. Only [`Credential::User`] can carry the superuser
/// bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Credential {
    /// No credential, or one the request layer could not make sense of.
    Anonymous,
    /// A user authenticated directly (no scoped token).
    User(UserIdentity),
    /// A user acting under one of their scoped access tokens.
    Token { holder: UserIdentity, token: TokenId },
}

impl Credential {
    pub fn user(identity: UserIdentity) -> Self {
        Credential::User(identity)
    }

    pub fn token(holder: UserIdentity, token: TokenId) -> Self {
        Credential::Token { holder, token }
    }

    /// The user behind this credential, if any.
    pub fn holder(&self) -> Option<&UserIdentity> {
        match self {
            Credential::Anonymous => None,
            Credential::User(user) => Some(user),
            Credential::Token { holder, .. } => Some(holder),
        }
    }

    /// The active scoped token, if any.
    pub fn active_token(&self) -> Option<TokenId> {
        match self {
            Credential::Token { token, .. } => Some(*token),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Credential::Anonymous)
    }

    /// True only for a superuser authenticated without a scoped token.
    pub fn bypasses_checks(&self) -> bool {
        matches!(self, Credential::User(user) if user.is_superuser)
    }
}

impl Default for Credential {
    fn default() -> Self {
        Credential::Anonymous
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Anonymous => write!(f, "anonymous"),
            Credential::User(user) => user.id.fmt(f),
            Credential::Token { holder, token } => write!(f, "{} via {}", holder.id, token),
        }
    }
}
