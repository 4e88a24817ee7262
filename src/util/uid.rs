//! Stable 64-bit element identifiers.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::util::Error;

/// Unique identifier of an element.
///
/// A random v4 UUID folded to 64 bits. Zero is the null id and is never
/// generated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(u64);

impl Uid {
    /// The null id.
    pub const NULL: Self = Self(0);

    /// Generate a fresh id.
    pub fn generate() -> Self {
        let (high, low) = Uuid::new_v4().as_u64_pair();
        match high ^ low {
            0 => Self(1),
            v => Self(v),
        }
    }

    /// Wrap a raw value (e.g. read from an archive).
    #[inline]
    pub const fn from_raw(v: u64) -> Self {
        Self(v)
    }

    /// Raw value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// True for the null id.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Parses the hex form produced by `Display`.
impl FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| Error::invalid(format!("bad uid '{s}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<Uid> = (0..10_000).map(|_| Uid::generate()).collect();
        assert_eq!(ids.len(), 10_000);
        assert!(!ids.contains(&Uid::NULL));
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(Uid::from_raw(0xabc).to_string(), "0000000000000abc");
        let uid = Uid::generate();
        assert_eq!(uid.to_string().parse::<Uid>().unwrap(), uid);
        assert!("not hex".parse::<Uid>().is_err());
    }
}
