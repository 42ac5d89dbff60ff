use std::ops::Bound;

use chunkstash_types::Key;

/// Which keys a listing returns.
///
/// Prefix selectors never return the prefix key itself, only keys strictly
/// below it. Range ends are exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Every key strictly below `prefix`.
    Prefix(Key),
    /// Keys strictly below `prefix` that are `>= start`.
    PrefixFrom { prefix: Key, start: Key },
    /// Keys strictly below `prefix` that are `< end`.
    PrefixUntil { prefix: Key, end: Key },
    /// Keys in `[start, end)`.
    Range { start: Key, end: Key },
}

impl Selector {
    pub fn prefix(prefix: Key) -> Self {
        Selector::Prefix(prefix)
    }

    /// Returns `true` if `key` belongs to this selection.
    pub fn contains(&self, key: &Key) -> bool {
        match self {
            Selector::Prefix(prefix) => key.is_below(prefix),
            Selector::PrefixFrom { prefix, start } => key.is_below(prefix) && key >= start,
            Selector::PrefixUntil { prefix, end } => key.is_below(prefix) && key < end,
            Selector::Range { start, end } => key >= start && key < end,
        }
    }

    /// Lower bound for an ordered scan.
    pub fn lower_bound(&self) -> Bound<Key> {
        match self {
            Selector::Prefix(prefix) | Selector::PrefixUntil { prefix, .. } => {
                Bound::Excluded(prefix.clone())
            }
            Selector::PrefixFrom { prefix, start } => {
                if start > prefix {
                    Bound::Included(start.clone())
                } else {
                    Bound::Excluded(prefix.clone())
                }
            }
            Selector::Range { start, .. } => Bound::Included(start.clone()),
        }
    }

    /// Returns `true` once an ordered scan has moved past every key this
    /// selector can match.
    pub fn is_past_end(&self, key: &Key) -> bool {
        match self {
            Selector::Prefix(prefix) | Selector::PrefixFrom { prefix, .. } => {
                !key.starts_with(prefix)
            }
            Selector::PrefixUntil { prefix, end } => !key.starts_with(prefix) || key >= end,
            Selector::Range { end, .. } => key >= end,
        }
    }

    /// Rewrite every key of the selector, e.g. to nest it under a namespace.
    pub fn map_keys(&self, f: impl Fn(&Key) -> Key) -> Selector {
        match self {
            Selector::Prefix(prefix) => Selector::Prefix(f(prefix)),
            Selector::PrefixFrom { prefix, start } => Selector::PrefixFrom {
                prefix: f(prefix),
                start: f(start),
            },
            Selector::PrefixUntil { prefix, end } => Selector::PrefixUntil {
                prefix: f(prefix),
                end: f(end),
            },
            Selector::Range { start, end } => Selector::Range {
                start: f(start),
                end: f(end),
            },
        }
    }
}
