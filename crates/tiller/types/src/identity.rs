//! Unit identities and correlation tokens
//!
//! A schedulable unit is identified by the triple (name, version,
//! positional). The orchestration service bounds the length of correlation
//! identifiers, so the triple is never sent on the wire directly; a
//! fixed-width fingerprint of it is. Two identities that differ only in
//! casing or surrounding whitespace are the same unit.

use crate::{TillerError, TillerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Separator used when an identity is flattened for fingerprinting.
/// Identity components must not contain it.
pub const RESERVED_SEPARATOR: char = ';';

/// Width of a [`CorrelationToken`] in hex characters (16 bytes of blake3).
pub const TOKEN_WIDTH: usize = 32;

// ── Unit Identity ────────────────────────────────────────────────────

/// Identity of a schedulable unit: (name, version, positional).
///
/// The positional discriminator distinguishes multiple declarations of the
/// same name/version at different places in the graph. Timers carry only a
/// name; their unused components stay empty.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitIdentity {
    name: String,
    version: String,
    positional: String,
}

impl UnitIdentity {
    /// Construct a full identity. Fails when any component contains the
    /// reserved separator.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        positional: impl Into<String>,
    ) -> TillerResult<Self> {
        let identity = Self {
            name: name.into(),
            version: version.into(),
            positional: positional.into(),
        };
        for component in [&identity.name, &identity.version, &identity.positional] {
            if component.contains(RESERVED_SEPARATOR) {
                return Err(TillerError::ReservedSeparator {
                    component: component.clone(),
                });
            }
        }
        Ok(identity)
    }

    /// Identity of a task unit without a positional discriminator.
    pub fn task(name: impl Into<String>, version: impl Into<String>) -> TillerResult<Self> {
        Self::new(name, version, "")
    }

    /// Identity of a timer unit. Version and positional stay empty.
    pub fn timer(name: impl Into<String>) -> TillerResult<Self> {
        Self::new(name, "", "")
    }

    /// Identity of a custom (ad-hoc action) unit.
    pub fn custom(name: impl Into<String>) -> TillerResult<Self> {
        Self::new(name, "", "")
    }

    /// A generated identity for an anonymous custom unit.
    pub fn anonymous() -> Self {
        Self {
            name: format!("action-{}", uuid::Uuid::new_v4()),
            version: String::new(),
            positional: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn positional(&self) -> &str {
        &self.positional
    }

    /// The fixed-width fingerprint used to correlate events to this unit.
    pub fn token(&self) -> CorrelationToken {
        CorrelationToken::derive(&self.name, &self.version, &self.positional)
    }

    fn normalized(&self) -> (String, String, String) {
        (
            normalize(&self.name),
            normalize(&self.version),
            normalize(&self.positional),
        )
    }
}

impl PartialEq for UnitIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for UnitIdentity {}

impl Hash for UnitIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for UnitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.version.is_empty() {
            write!(f, "/{}", self.version)?;
        }
        if !self.positional.is_empty() {
            write!(f, "#{}", self.positional)?;
        }
        Ok(())
    }
}

fn normalize(component: &str) -> String {
    component.trim().to_lowercase()
}

// ── Correlation Token ────────────────────────────────────────────────

/// A 32-hex-char fingerprint of a unit identity.
///
/// This is what rides in the service's length-bounded correlation-id
/// fields and comes back on events. A token found on an event is a "raw"
/// identity: it names the unit without carrying the declared triple.
/// Collisions between distinct identities are accepted residual risk.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Derive the token for an identity triple. Components are normalized
    /// (trimmed, lowercased) before hashing so equality of identities
    /// implies equality of tokens.
    pub fn derive(name: &str, version: &str, positional: &str) -> Self {
        let key = format!(
            "{}{sep}{}{sep}{}",
            normalize(name),
            normalize(version),
            normalize(positional),
            sep = RESERVED_SEPARATOR,
        );
        let digest = blake3::hash(key.as_bytes());
        Self(digest.to_hex()[..TOKEN_WIDTH].to_string())
    }

    /// Reconstruct a token carried on an event. Validates shape only.
    pub fn parse(raw: impl Into<String>) -> TillerResult<Self> {
        let raw = raw.into();
        let well_formed = raw.len() == TOKEN_WIDTH
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !well_formed {
            return Err(TillerError::MalformedToken(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationToken({})", self.0)
    }
}
