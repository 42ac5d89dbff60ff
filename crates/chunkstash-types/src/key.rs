use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::eq::timing_safe_eq;
use crate::error::TypeError;

/// One typed component of a [`Key`].
///
/// Parts of different kinds order as `Bytes < String < Int`. Within a kind,
/// bytes and strings order lexicographically by their bytes and integers
/// numerically, so chunk indices list in ascending order.
///
/// Binary parts are compared byte-wise through [`KeyPart::same`]; two
/// independently built buffers with equal contents are the same part.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KeyPart {
    Bytes(Vec<u8>),
    String(String),
    Int(i64),
}

impl KeyPart {
    fn rank(&self) -> u8 {
        match self {
            KeyPart::Bytes(_) => 0,
            KeyPart::String(_) => 1,
            KeyPart::Int(_) => 2,
        }
    }

    /// Explicit equality: byte-wise for binary parts, value equality otherwise.
    pub fn same(&self, other: &KeyPart) -> bool {
        match (self, other) {
            (KeyPart::Bytes(a), KeyPart::Bytes(b)) => timing_safe_eq(a, b),
            (KeyPart::String(a), KeyPart::String(b)) => a == b,
            (KeyPart::Int(a), KeyPart::Int(b)) => a == b,
            _ => false,
        }
    }

    /// Short name of the part kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            KeyPart::Bytes(_) => "bytes",
            KeyPart::String(_) => "string",
            KeyPart::Int(_) => "int",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeyPart::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyPart::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            KeyPart::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for KeyPart {}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Bytes(a), KeyPart::Bytes(b)) => a.as_slice().cmp(b.as_slice()),
            (KeyPart::String(a), KeyPart::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (KeyPart::Int(a), KeyPart::Int(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for KeyPart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.rank());
        match self {
            KeyPart::Bytes(b) => b.hash(state),
            KeyPart::String(s) => s.hash(state),
            KeyPart::Int(v) => v.hash(state),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            KeyPart::String(s) => f.write_str(s),
            KeyPart::Int(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for KeyPart {
    type Err = TypeError;

    /// Parse the textual form used on the command line: `0x…` is binary,
    /// anything that parses as an `i64` is an integer, the rest is a string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(hex_part) = s.strip_prefix("0x") {
            let bytes = hex::decode(hex_part).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
            return Ok(KeyPart::Bytes(bytes));
        }
        if let Ok(v) = s.parse::<i64>() {
            return Ok(KeyPart::Int(v));
        }
        if s.is_empty() {
            return Err(TypeError::InvalidKey("empty key part".into()));
        }
        Ok(KeyPart::String(s.to_string()))
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::String(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::String(s)
    }
}

impl From<i64> for KeyPart {
    fn from(v: i64) -> Self {
        KeyPart::Int(v)
    }
}

impl From<Vec<u8>> for KeyPart {
    fn from(b: Vec<u8>) -> Self {
        KeyPart::Bytes(b)
    }
}

impl From<&[u8]> for KeyPart {
    fn from(b: &[u8]) -> Self {
        KeyPart::Bytes(b.to_vec())
    }
}

/// An ordered, finite sequence of typed key parts.
///
/// Keys are values: extending a key returns a new key and never mutates the
/// original. Keys compare part by part; a key sorts before every key it is a
/// strict prefix of.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(Vec<KeyPart>);

impl Key {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// The empty key (the root of every prefix listing).
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&KeyPart> {
        self.0.get(index)
    }

    pub fn last(&self) -> Option<&KeyPart> {
        self.0.last()
    }

    /// A new key with `part` appended.
    pub fn child(&self, part: impl Into<KeyPart>) -> Key {
        let mut parts = Vec::with_capacity(self.0.len() + 1);
        parts.extend(self.0.iter().cloned());
        parts.push(part.into());
        Key(parts)
    }

    /// A new key made of `self` followed by every part of `suffix`.
    pub fn join(&self, suffix: &Key) -> Key {
        let mut parts = Vec::with_capacity(self.0.len() + suffix.0.len());
        parts.extend(self.0.iter().cloned());
        parts.extend(suffix.0.iter().cloned());
        Key(parts)
    }

    /// The first `len` parts of this key.
    pub fn truncated(&self, len: usize) -> Key {
        Key(self.0.iter().take(len).cloned().collect())
    }

    /// Returns `true` if every part of `prefix` matches the leading parts of
    /// this key (byte-wise for binary parts).
    pub fn starts_with(&self, prefix: &Key) -> bool {
        prefix.0.len() <= self.0.len()
            && prefix.0.iter().zip(self.0.iter()).all(|(a, b)| a.same(b))
    }

    /// Returns `true` if this key starts with `prefix` and is strictly longer.
    pub fn is_below(&self, prefix: &Key) -> bool {
        self.0.len() > prefix.0.len() && self.starts_with(prefix)
    }

    /// The parts remaining after `prefix`, if this key starts with it.
    pub fn strip_prefix(&self, prefix: &Key) -> Option<Key> {
        if self.starts_with(prefix) {
            Some(Key(self.0[prefix.0.len()..].to_vec()))
        } else {
            None
        }
    }

    /// Explicit part-by-part equality.
    pub fn same(&self, other: &Key) -> bool {
        self.0.len() == other.0.len() && self.starts_with(other)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Key {
    type Err = TypeError;

    /// Parse a `/`-separated key. The empty string and `/` are the empty key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Key::empty());
        }
        trimmed
            .split('/')
            .map(KeyPart::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Key)
    }
}

impl From<Vec<KeyPart>> for Key {
    fn from(parts: Vec<KeyPart>) -> Self {
        Key(parts)
    }
}

impl FromIterator<KeyPart> for Key {
    fn from_iter<I: IntoIterator<Item = KeyPart>>(iter: I) -> Self {
        Key(iter.into_iter().collect())
    }
}

/// Build a [`Key`] from a list of values convertible into [`KeyPart`].
///
/// ```
/// use chunkstash_types::{key, KeyPart};
/// let k = key!["images", 3i64, vec![0xffu8]];
/// assert_eq!(k.len(), 3);
/// assert_eq!(k.get(1), Some(&KeyPart::Int(3)));
/// ```
#[macro_export]
macro_rules! key {
    () => { $crate::Key::empty() };
    ($($part:expr),+ $(,)?) => {
        $crate::Key::new(vec![$($crate::KeyPart::from($part)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn kind_order_is_bytes_string_int() {
        let b = KeyPart::Bytes(vec![0xff]);
        let s = KeyPart::String("a".into());
        let i = KeyPart::Int(-5);
        assert!(b < s);
        assert!(s < i);
        assert!(b < i);
    }

    #[test]
    fn ints_order_numerically() {
        let two = key!["blob", 2i64];
        let ten = key!["blob", 10i64];
        assert!(two < ten);
    }

    #[test]
    fn prefix_sorts_before_extension() {
        let parent = key!["a", "b"];
        let child = key!["a", "b", "c"];
        assert!(parent < child);
        assert!(child.is_below(&parent));
        assert!(!parent.is_below(&parent));
    }

    #[test]
    fn binary_parts_compare_by_content() {
        let a = KeyPart::Bytes(vec![1, 2, 3]);
        let b = KeyPart::Bytes([1u8, 2, 3].to_vec());
        assert!(a.same(&b));
        assert_eq!(a, b);
        assert!(!a.same(&KeyPart::Bytes(vec![1, 2, 4])));
    }

    #[test]
    fn child_does_not_mutate_parent() {
        let parent = key!["a"];
        let child = parent.child(1i64);
        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
        assert_eq!(child.strip_prefix(&parent), Some(key![1i64]));
    }

    #[test]
    fn parse_and_display() {
        let k: Key = "images/2023-07-09/12/0xdead".parse().unwrap();
        assert_eq!(
            k,
            key!["images", "2023-07-09", 12i64, vec![0xdeu8, 0xad]]
        );
        assert_eq!(k.to_string(), "images/2023-07-09/12/0xdead");
        assert_eq!("/".parse::<Key>().unwrap(), Key::empty());
    }

    #[test]
    fn parse_rejects_bad_hex() {
        assert!(matches!(
            "0xzz".parse::<KeyPart>(),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn serde_roundtrip() {
        let k = key!["a", 7i64, vec![9u8, 9]];
        let json = serde_json::to_string(&k).unwrap();
        let parsed: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(k, parsed);
    }

    fn arb_part() -> impl Strategy<Value = KeyPart> {
        prop_oneof![
            proptest::collection::vec(any::<u8>(), 0..4).prop_map(KeyPart::Bytes),
            "[a-c]{0,3}".prop_map(KeyPart::String),
            any::<i64>().prop_map(KeyPart::Int),
        ]
    }

    fn arb_key() -> impl Strategy<Value = Key> {
        proptest::collection::vec(arb_part(), 0..4).prop_map(Key::new)
    }

    proptest! {
        #[test]
        fn ordering_is_consistent_with_equality(a in arb_key(), b in arb_key()) {
            prop_assert_eq!(a.cmp(&b) == Ordering::Equal, a.same(&b));
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }

        #[test]
        fn extensions_sort_after_their_prefix(a in arb_key(), p in arb_part()) {
            let extended = a.child(p);
            prop_assert!(a < extended);
            prop_assert!(extended.is_below(&a));
        }
    }
}
