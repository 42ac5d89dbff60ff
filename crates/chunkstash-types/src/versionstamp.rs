use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque, monotonic token identifying the state of a key at commit time.
///
/// Every successful commit produces a versionstamp strictly greater than all
/// earlier ones from the same backend. Every key written by that commit
/// carries it, which is what `Check` operations compare against.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Versionstamp(u64);

impl Versionstamp {
    /// The stamp that precedes every commit.
    pub const ZERO: Versionstamp = Versionstamp(0);

    pub const fn from_u64(v: u64) -> Self {
        Self(v)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The stamp following this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// 20 hex digit text form: the commit counter followed by a zero
    /// in-batch suffix.
    pub fn to_hex(&self) -> String {
        format!("{:016x}0000", self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != 20 {
            return Err(TypeError::InvalidLength {
                expected: 20,
                actual: s.len(),
            });
        }
        u64::from_str_radix(&s[..16], 16)
            .map(Self)
            .map_err(|e| TypeError::InvalidHex(e.to_string()))
    }
}

impl fmt::Debug for Versionstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Versionstamp({})", self.0)
    }
}

impl fmt::Display for Versionstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
