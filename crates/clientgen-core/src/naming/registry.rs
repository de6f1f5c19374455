//! Collision-free naming across one generation run.
//!
//! The registry is the only mutable naming state. It is filled in a single
//! pass over the declarations in IR order, so the same input always yields
//! the same names: the first owner of a name keeps it and later owners get a
//! numeric suffix.

// Internal imports (std, crate)
use std::collections::HashMap;
use std::fmt;

use super::namer::CaseConvention;
use crate::error::{Error, Result};
use crate::ir::NodeRef;

/// Upper bound on suffix attempts before giving up
const MAX_ATTEMPTS: usize = 1000;

/// Scope in which names must be unique
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Top-level type names
    Types,
    /// Generated file stems; compared case-insensitively
    Files,
    /// Client methods
    Methods,
    /// Fields of one type
    Members(String),
    /// Variants of one enum or union
    Variants(String),
    /// Parameters of one method
    Params(String),
}

impl Namespace {
    /// Naming convention used inside this namespace
    pub fn convention(&self) -> CaseConvention {
        match self {
            Self::Types | Self::Variants(_) => CaseConvention::Pascal,
            Self::Files | Self::Methods | Self::Members(_) | Self::Params(_) => {
                CaseConvention::Snake
            }
        }
    }

    fn key(&self, name: &str) -> String {
        match self {
            Self::Files => name.to_ascii_lowercase(),
            _ => name.to_string(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Types => f.write_str("types"),
            Self::Files => f.write_str("files"),
            Self::Methods => f.write_str("methods"),
            Self::Members(owner) => write!(f, "members of {}", owner),
            Self::Variants(owner) => write!(f, "variants of {}", owner),
            Self::Params(owner) => write!(f, "parameters of {}", owner),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    owner: Option<String>,
    pinned: bool,
}

#[derive(Debug, Default)]
struct Scope {
    /// Normalized name to its holder
    taken: HashMap<String, Entry>,
    /// Owner path to the name it received
    assigned: HashMap<String, String>,
}

/// Append-only table of assigned names
#[derive(Debug, Default)]
pub struct NameRegistry {
    scopes: HashMap<Namespace, Scope>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a name that no declaration may take, such as a method every
    /// generated client defines
    pub fn reserve(&mut self, namespace: Namespace, name: &str) {
        let key = namespace.key(name);
        self.scopes.entry(namespace).or_default().taken.insert(
            key,
            Entry {
                owner: None,
                pinned: false,
            },
        );
    }

    /// Register `proposed` for `owner` and return the name it received.
    ///
    /// Registering the same owner again returns the name it already holds.
    /// A `pinned` name came from the user's configuration: it may not be
    /// suffixed, and nothing else may displace it.
    pub fn register(
        &mut self,
        namespace: Namespace,
        owner: &NodeRef,
        proposed: &str,
        pinned: bool,
    ) -> Result<String> {
        let convention = namespace.convention();
        let scope = self.scopes.entry(namespace.clone()).or_default();

        if let Some(existing) = scope.assigned.get(&owner.path) {
            return Ok(existing.clone());
        }

        let mut candidate = proposed.to_string();
        let mut attempt = 1;
        loop {
            let key = namespace.key(&candidate);
            match scope.taken.get(&key) {
                None => {
                    scope.taken.insert(
                        key,
                        Entry {
                            owner: Some(owner.path.clone()),
                            pinned,
                        },
                    );
                    scope.assigned.insert(owner.path.clone(), candidate.clone());
                    if attempt > 1 {
                        log::debug!(
                            "Renamed {} to '{}' to avoid a collision in {}",
                            owner.path,
                            candidate,
                            namespace
                        );
                    }
                    return Ok(candidate);
                }
                Some(holder) if pinned || holder.pinned => {
                    let holder_desc = holder
                        .owner
                        .as_deref()
                        .map(|path| format!("already taken by {}", path))
                        .unwrap_or_else(|| "reserved by the generator".to_string());
                    return Err(Error::NamingCollision {
                        namespace: namespace.to_string(),
                        node: owner.clone(),
                        message: format!("name '{}' is {}", candidate, holder_desc),
                    });
                }
                Some(_) => {
                    attempt += 1;
                    if attempt > MAX_ATTEMPTS {
                        return Err(Error::NamingCollision {
                            namespace: namespace.to_string(),
                            node: owner.clone(),
                            message: format!(
                                "no free name derived from '{}' after {} attempts",
                                proposed, MAX_ATTEMPTS
                            ),
                        });
                    }
                    candidate = convention.with_suffix(proposed, attempt);
                }
            }
        }
    }

    /// Name already assigned to `owner`
    pub fn lookup(&self, namespace: &Namespace, owner: &NodeRef) -> Option<&str> {
        self.scopes
            .get(namespace)
            .and_then(|scope| scope.assigned.get(&owner.path))
            .map(String::as_str)
    }

    /// Whether `name` is held in `namespace`
    pub fn is_taken(&self, namespace: &Namespace, name: &str) -> bool {
        self.scopes
            .get(namespace)
            .map_or(false, |scope| scope.taken.contains_key(&namespace.key(name)))
    }
}
