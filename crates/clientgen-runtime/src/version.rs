//! Service version pinning.
//!
//! Generated clients declare a `ServiceVersion` enum whose variant order is
//! the service's release order, and implement [`ApiVersion`] for it. Every
//! operation or parameter introduced after the first release is checked with
//! [`ensure_available`] before a request is built.

// Internal imports (std, crate)
use std::fmt::Debug;

use crate::error::{Result, RuntimeError};

/// An ordered service version token
pub trait ApiVersion: Copy + Ord + Debug + 'static {
    /// Every known version, oldest first
    const ALL: &'static [Self];

    /// Wire token, e.g. `2024-06-01`
    fn as_str(&self) -> &'static str;

    /// The newest known version
    fn latest() -> Self {
        // ALL is never empty for a generated version enum
        Self::ALL[Self::ALL.len() - 1]
    }

    /// Resolve a wire token
    fn parse_token(token: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|version| version.as_str() == token)
            .ok_or_else(|| RuntimeError::UnknownVersion(token.to_string()))
    }
}

/// Fail when `pinned` lies outside `[added, removed)`.
pub fn ensure_available<V: ApiVersion>(
    name: &str,
    pinned: V,
    added: Option<V>,
    removed: Option<V>,
) -> Result<()> {
    if let Some(added) = added {
        if pinned < added {
            return Err(RuntimeError::VersionMismatch {
                operation: name.to_string(),
                pinned: pinned.as_str().to_string(),
                reason: format!("added in {}", added.as_str()),
            });
        }
    }
    if let Some(removed) = removed {
        if pinned >= removed {
            return Err(RuntimeError::VersionMismatch {
                operation: name.to_string(),
                pinned: pinned.as_str().to_string(),
                reason: format!("removed in {}", removed.as_str()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Version {
        V20221201Preview,
        V20240601,
        V20250101,
    }

    impl ApiVersion for Version {
        const ALL: &'static [Self] = &[
            Version::V20221201Preview,
            Version::V20240601,
            Version::V20250101,
        ];

        fn as_str(&self) -> &'static str {
            match self {
                Version::V20221201Preview => "2022-12-01-preview",
                Version::V20240601 => "2024-06-01",
                Version::V20250101 => "2025-01-01",
            }
        }
    }

    #[test]
    fn test_gate_rejects_older_pin() {
        let err = ensure_available(
            "analyze",
            Version::V20221201Preview,
            Some(Version::V20240601),
            None,
        );
        assert!(matches!(
            err,
            Err(RuntimeError::VersionMismatch { ref pinned, .. }) if pinned == "2022-12-01-preview"
        ));
        assert!(ensure_available("analyze", Version::V20240601, Some(Version::V20240601), None).is_ok());
    }

    #[test]
    fn test_gate_rejects_removed() {
        assert!(ensure_available("legacy", Version::V20250101, None, Some(Version::V20250101)).is_err());
        assert!(ensure_available("legacy", Version::V20240601, None, Some(Version::V20250101)).is_ok());
    }

    #[test]
    fn test_parse_token_and_latest() -> Result<()> {
        assert_eq!(Version::parse_token("2024-06-01")?, Version::V20240601);
        assert!(matches!(
            Version::parse_token("2023-01-01"),
            Err(RuntimeError::UnknownVersion(_))
        ));
        assert_eq!(Version::latest(), Version::V20250101);
        Ok(())
    }
}
