//! Status code patterns and response routing.
//!
//! A declared response is keyed by an exact code (`404`), a class (`4XX`),
//! an inclusive range (`400-499`) or `default`. When several patterns match
//! a status, the most specific one wins:
//!
//! 1. an exact code beats any range,
//! 2. a narrower range beats a wider one,
//! 3. equally wide ranges resolve to the one declared first,
//! 4. `default` only applies when nothing else matches.
//!
//! # Examples
//!
//! ```
//! use clientgen_runtime::status::{route, StatusPattern};
//!
//! let declared = [
//!     StatusPattern::Range { low: 400, high: 499 },
//!     StatusPattern::Exact(404),
//!     StatusPattern::Default,
//! ];
//! assert_eq!(route(404, &declared), Some(1));
//! assert_eq!(route(409, &declared), Some(0));
//! assert_eq!(route(503, &declared), Some(2));
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::str::FromStr;

use crate::error::RuntimeError;

/// One declared response key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusPattern {
    /// A single status code
    Exact(u16),
    /// An inclusive range; `4XX` parses to `400..=499`
    Range { low: u16, high: u16 },
    /// Catch-all response
    Default,
}

impl StatusPattern {
    /// Whether `status` falls under this pattern
    pub fn matches(&self, status: u16) -> bool {
        match *self {
            Self::Exact(code) => code == status,
            Self::Range { low, high } => (low..=high).contains(&status),
            Self::Default => true,
        }
    }

    /// Whether the pattern only covers 2XX codes
    pub fn is_success(&self) -> bool {
        match *self {
            Self::Exact(code) => (200..300).contains(&code),
            Self::Range { low, high } => low >= 200 && high < 300,
            Self::Default => false,
        }
    }

    /// Lowest status code covered by the pattern
    pub fn lowest(&self) -> u16 {
        match *self {
            Self::Exact(code) => code,
            Self::Range { low, .. } => low,
            Self::Default => u16::MAX,
        }
    }

    /// Sort key for specificity; lower is more specific.
    fn specificity(&self) -> (u8, u32) {
        match *self {
            Self::Exact(_) => (0, 1),
            Self::Range { low, high } => (1, u32::from(high) - u32::from(low) + 1),
            Self::Default => (2, u32::MAX),
        }
    }
}

impl FromStr for StatusPattern {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.eq_ignore_ascii_case("default") || raw == "*" {
            return Ok(Self::Default);
        }

        let invalid = || RuntimeError::StatusPattern(s.to_string());

        if let Some((low, high)) = raw.split_once('-') {
            let low: u16 = low.trim().parse().map_err(|_| invalid())?;
            let high: u16 = high.trim().parse().map_err(|_| invalid())?;
            if low > high || !(100..=599).contains(&low) || high > 599 {
                return Err(invalid());
            }
            return Ok(Self::Range { low, high });
        }

        let bytes = raw.as_bytes();
        if bytes.len() == 3 && bytes[1..].iter().all(|b| b.eq_ignore_ascii_case(&b'x')) {
            let class = (bytes[0] as char).to_digit(10).ok_or_else(invalid)? as u16;
            if !(1..=5).contains(&class) {
                return Err(invalid());
            }
            return Ok(Self::Range {
                low: class * 100,
                high: class * 100 + 99,
            });
        }

        let code: u16 = raw.parse().map_err(|_| invalid())?;
        if !(100..=599).contains(&code) {
            return Err(invalid());
        }
        Ok(Self::Exact(code))
    }
}

impl fmt::Display for StatusPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Exact(code) => write!(f, "{}", code),
            Self::Range { low, high } if low % 100 == 0 && high == low + 99 => {
                write!(f, "{}XX", low / 100)
            }
            Self::Range { low, high } => write!(f, "{}-{}", low, high),
            Self::Default => f.write_str("default"),
        }
    }
}

/// Index of the most specific pattern matching `status`, if any.
pub fn route(status: u16, patterns: &[StatusPattern]) -> Option<usize> {
    patterns
        .iter()
        .enumerate()
        .filter(|(_, pattern)| pattern.matches(status))
        .min_by_key(|(index, pattern)| (pattern.specificity(), *index))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patterns() -> crate::Result<()> {
        assert_eq!("404".parse::<StatusPattern>()?, StatusPattern::Exact(404));
        assert_eq!(
            "4XX".parse::<StatusPattern>()?,
            StatusPattern::Range { low: 400, high: 499 }
        );
        assert_eq!(
            "5xx".parse::<StatusPattern>()?,
            StatusPattern::Range { low: 500, high: 599 }
        );
        assert_eq!(
            "400-404".parse::<StatusPattern>()?,
            StatusPattern::Range { low: 400, high: 404 }
        );
        assert_eq!("default".parse::<StatusPattern>()?, StatusPattern::Default);
        assert!("6XX".parse::<StatusPattern>().is_err());
        assert!("499-400".parse::<StatusPattern>().is_err());
        assert!("teapot".parse::<StatusPattern>().is_err());
        Ok(())
    }

    #[test]
    fn test_exact_code_beats_class() {
        let declared = [
            StatusPattern::Exact(200),
            StatusPattern::Range { low: 400, high: 499 },
            StatusPattern::Exact(404),
        ];
        assert_eq!(route(404, &declared), Some(2));
        assert_eq!(route(400, &declared), Some(1));
        assert_eq!(route(500, &declared), None);
    }

    #[test]
    fn test_narrower_range_wins_and_ties_keep_declaration_order() {
        let declared = [
            StatusPattern::Range { low: 400, high: 499 },
            StatusPattern::Range { low: 400, high: 409 },
            StatusPattern::Range { low: 405, high: 414 },
            StatusPattern::Default,
        ];
        assert_eq!(route(401, &declared), Some(1));
        // 405..=409 is covered by two ranges of width 10; the first declared wins
        assert_eq!(route(407, &declared), Some(1));
        assert_eq!(route(412, &declared), Some(2));
        assert_eq!(route(450, &declared), Some(0));
        assert_eq!(route(302, &declared), Some(3));
    }

    #[test]
    fn test_display_roundtrips_class_form() -> crate::Result<()> {
        for raw in ["404", "4XX", "400-404", "default"] {
            assert_eq!(raw.parse::<StatusPattern>()?.to_string(), raw);
        }
        Ok(())
    }
}
