// SPDX-License-Identifier: MPL-2.0

use std::hash::Hash;

use crate::Map;

/// A `Map` that does not allocate for up to two entries.
///
/// Valid incompatibilities carry at most one term per package, and almost all of
/// them mention one or two packages, so the inline variants cover the common case.
#[derive(Debug, Clone)]
pub enum SmallMap<K, V> {
    Empty,
    One([(K, V); 1]),
    Two([(K, V); 2]),
    Flexible(Map<K, V>),
}

impl<K: PartialEq + Eq + Hash, V> SmallMap<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        match self {
            Self::Empty => None,
            Self::One([(k, v)]) => (k == key).then_some(v),
            Self::Two([(k1, v1), (k2, v2)]) => {
                if k1 == key {
                    Some(v1)
                } else if k2 == key {
                    Some(v2)
                } else {
                    None
                }
            }
            Self::Flexible(map) => map.get(key),
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self {
            Self::Empty => None,
            Self::One([(k, v)]) => (k == key).then_some(v),
            Self::Two([(k1, v1), (k2, v2)]) => {
                if k1 == key {
                    Some(v1)
                } else if k2 == key {
                    Some(v2)
                } else {
                    None
                }
            }
            Self::Flexible(map) => map.get_mut(key),
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        if let Some(old_value) = self.get_mut(&key) {
            *old_value = value;
            return;
        }
        *self = match std::mem::take(self) {
            Self::Empty => Self::One([(key, value)]),
            Self::One([(k1, v1)]) => Self::Two([(k1, v1), (key, value)]),
            Self::Two([(k1, v1), (k2, v2)]) => {
                let mut map = Map::with_capacity_and_hasher(3, Default::default());
                map.insert(k1, v1);
                map.insert(k2, v2);
                map.insert(key, value);
                Self::Flexible(map)
            }
            Self::Flexible(mut map) => {
                map.insert(key, value);
                Self::Flexible(map)
            }
        };
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let out;
        *self = match std::mem::take(self) {
            Self::Empty => {
                out = None;
                Self::Empty
            }
            Self::One([(k, v)]) => {
                if &k == key {
                    out = Some(v);
                    Self::Empty
                } else {
                    out = None;
                    Self::One([(k, v)])
                }
            }
            Self::Two([(k1, v1), (k2, v2)]) => {
                if &k1 == key {
                    out = Some(v1);
                    Self::One([(k2, v2)])
                } else if &k2 == key {
                    out = Some(v2);
                    Self::One([(k1, v1)])
                } else {
                    out = None;
                    Self::Two([(k1, v1), (k2, v2)])
                }
            }
            Self::Flexible(mut map) => {
                out = map.remove(key);
                Self::Flexible(map)
            }
        };
        out
    }

    /// Remove the entry for `key`, returning its value together with the remaining map.
    pub fn split_one(&self, key: &K) -> Option<(V, Self)>
    where
        K: Clone,
        V: Clone,
    {
        match self {
            Self::Empty => None,
            Self::One([(k, v)]) => (k == key).then(|| (v.clone(), Self::Empty)),
            Self::Two([(k1, v1), (k2, v2)]) => {
                if k1 == key {
                    Some((v1.clone(), Self::One([(k2.clone(), v2.clone())])))
                } else if k2 == key {
                    Some((v2.clone(), Self::One([(k1.clone(), v1.clone())])))
                } else {
                    None
                }
            }
            Self::Flexible(map) => {
                let mut map = map.clone();
                let value = map.remove(key)?;
                Some((value, Self::Flexible(map)))
            }
        }
    }

    /// Fold the entries of `iter` into this map.
    ///
    /// Keys present on both sides are combined with `merge_values`; a `None` outcome
    /// drops the entry entirely.
    pub fn merge<'a>(
        &'a mut self,
        iter: impl Iterator<Item = (&'a K, &'a V)>,
        merge_values: impl Fn(&V, &V) -> Option<V>,
    ) where
        K: Clone + 'a,
        V: Clone + 'a,
    {
        for (key, value) in iter {
            let merged = self.get(key).map(|existing| merge_values(existing, value));
            match merged {
                Some(Some(new_value)) => self.insert(key.clone(), new_value),
                Some(None) => {
                    self.remove(key);
                }
                None => self.insert(key.clone(), value.clone()),
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::One(_) => 1,
            Self::Two(_) => 2,
            Self::Flexible(map) => map.len(),
        }
    }

    pub fn iter(&self) -> IterSmallMap<'_, K, V> {
        match self {
            Self::Empty => IterSmallMap::Inline([].iter()),
            Self::One(data) => IterSmallMap::Inline(data.iter()),
            Self::Two(data) => IterSmallMap::Inline(data.iter()),
            Self::Flexible(map) => IterSmallMap::Map(map.iter()),
        }
    }
}

impl<K, V> Default for SmallMap<K, V> {
    fn default() -> Self {
        Self::Empty
    }
}

pub enum IterSmallMap<'a, K, V> {
    Inline(std::slice::Iter<'a, (K, V)>),
    Map(std::collections::hash_map::Iter<'a, K, V>),
}

impl<'a, K, V> Iterator for IterSmallMap<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            IterSmallMap::Inline(iter) => iter.next().map(|(k, v)| (k, v)),
            IterSmallMap::Map(iter) => iter.next(),
        }
    }
}
