//! Separate-chaining hash table
//!
//! Buckets hold singly linked chains. New keys are pushed at the head of
//! their chain, so lookups within one bucket see the most recently inserted
//! entry first. After every insertion of a new key the load factor is
//! checked and the bucket array doubles once `len / capacity` exceeds it.
//! Overwriting an existing key never triggers a resize, and the table never
//! shrinks.
//!
//! The table has no internal synchronization; owners that share it across
//! threads wrap it in a single lock.

use crate::TableError;
use crate::hash::{HashKey, default_hash};
use serde::Serialize;
use std::fmt;
use std::iter::FusedIterator;
use tracing::{debug, warn};

/// Default bucket count
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Default growth threshold
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// User-supplied hash function
pub type HashFn<K> = Box<dyn Fn(&K) -> i64 + Send + Sync>;

/// User-supplied key equality
pub type EqFn<K> = Box<dyn Fn(&K, &K) -> bool + Send + Sync>;

type Link<K, V> = Option<Box<Entry<K, V>>>;

struct Entry<K, V> {
    key: K,
    value: V,
    /// Non-negative hash, cached so resizing never calls the hash function
    hash: u64,
    next: Link<K, V>,
}

enum KeyHasher<K> {
    Default(fn(&K) -> u32),
    Custom(HashFn<K>),
}

impl<K> KeyHasher<K> {
    fn hash(&self, key: &K) -> u64 {
        match self {
            Self::Default(f) => u64::from(f(key)),
            Self::Custom(f) => f(key).unsigned_abs(),
        }
    }
}

enum KeyEq<K> {
    Default(fn(&K, &K) -> bool),
    Custom(EqFn<K>),
}

impl<K> KeyEq<K> {
    fn eq(&self, a: &K, b: &K) -> bool {
        match self {
            Self::Default(f) => f(a, b),
            Self::Custom(f) => f(a, b),
        }
    }
}

/// Sizing options for a [`HashTable`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableOptions {
    /// Number of buckets allocated up front (floored at 1)
    pub initial_capacity: usize,
    /// Growth trigger ratio of `len / capacity`
    pub load_factor: f64,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

impl TableOptions {
    fn capacity(&self) -> usize {
        self.initial_capacity.max(1)
    }

    fn effective_load_factor(&self) -> f64 {
        if self.load_factor.is_finite() && self.load_factor > 0.0 {
            self.load_factor
        } else {
            warn!(
                "Invalid load factor {}, using {}",
                self.load_factor, DEFAULT_LOAD_FACTOR
            );
            DEFAULT_LOAD_FACTOR
        }
    }
}

/// Builder for tables with custom hashing or equality
pub struct TableBuilder<K> {
    options: TableOptions,
    hash_fn: Option<HashFn<K>>,
    eq_fn: Option<EqFn<K>>,
}

impl<K> Default for TableBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TableBuilder<K> {
    /// Start from the default sizing, hash and equality
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: TableOptions::default(),
            hash_fn: None,
            eq_fn: None,
        }
    }

    /// Set the initial bucket count
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.options.initial_capacity = capacity;
        self
    }

    /// Set the growth threshold
    #[must_use]
    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.options.load_factor = load_factor;
        self
    }

    /// Replace both sizing options
    #[must_use]
    pub fn options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a custom hash function.
    ///
    /// Negative results are allowed; the bucket index uses the absolute value.
    #[must_use]
    pub fn hash_fn(mut self, f: impl Fn(&K) -> i64 + Send + Sync + 'static) -> Self {
        self.hash_fn = Some(Box::new(f));
        self
    }

    /// Use a custom key equality
    #[must_use]
    pub fn eq_fn(mut self, f: impl Fn(&K, &K) -> bool + Send + Sync + 'static) -> Self {
        self.eq_fn = Some(Box::new(f));
        self
    }

    /// Build a table, falling back to the default hash and `PartialEq` for
    /// whatever was not customized
    pub fn build<V>(self) -> HashTable<K, V>
    where
        K: HashKey + PartialEq,
    {
        let hasher = match self.hash_fn {
            Some(f) => KeyHasher::Custom(f),
            None => KeyHasher::Default(default_hash::<K>),
        };
        let eq = match self.eq_fn {
            Some(f) => KeyEq::Custom(f),
            None => KeyEq::Default(<K as PartialEq>::eq),
        };
        HashTable::from_parts(&self.options, hasher, eq, <K as HashKey>::is_absent)
    }

    /// Build a table for keys without a default hash.
    ///
    /// Both functions are required and no key is treated as absent.
    pub fn build_with<V>(
        self,
        hash_fn: impl Fn(&K) -> i64 + Send + Sync + 'static,
        eq_fn: impl Fn(&K, &K) -> bool + Send + Sync + 'static,
    ) -> HashTable<K, V> {
        HashTable::from_parts(
            &self.options,
            KeyHasher::Custom(Box::new(hash_fn)),
            KeyEq::Custom(Box::new(eq_fn)),
            |_| false,
        )
    }
}

/// Bucket occupancy snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub len: usize,
    pub capacity: usize,
    pub occupied_buckets: usize,
    pub longest_chain: usize,
}

/// Hash table with separate chaining
pub struct HashTable<K, V> {
    buckets: Vec<Link<K, V>>,
    len: usize,
    load_factor: f64,
    hasher: KeyHasher<K>,
    eq: KeyEq<K>,
    absent: fn(&K) -> bool,
}

impl<K: HashKey + PartialEq, V> HashTable<K, V> {
    /// Create a table with 16 buckets and a 0.75 load factor
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(TableOptions::default())
    }

    /// Create a table with the given sizing and default hashing
    #[must_use]
    pub fn with_options(options: TableOptions) -> Self {
        TableBuilder::new().options(options).build()
    }
}

impl<K: HashKey + PartialEq, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HashTable<K, V> {
    fn from_parts(
        options: &TableOptions,
        hasher: KeyHasher<K>,
        eq: KeyEq<K>,
        absent: fn(&K) -> bool,
    ) -> Self {
        Self {
            buckets: empty_buckets(options.capacity()),
            len: 0,
            load_factor: options.effective_load_factor(),
            hasher,
            eq,
            absent,
        }
    }

    /// Number of live entries
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the table holds no entries
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current bucket count
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Growth threshold in effect
    #[must_use]
    pub const fn load_factor(&self) -> f64 {
        self.load_factor
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// Insert or overwrite the value for `key`.
    ///
    /// Fails with [`TableError::InvalidKey`] when `key` is the absent key.
    /// The hash and all equality checks run before the table is modified.
    pub fn set(&mut self, key: K, value: V) -> Result<(), TableError> {
        if (self.absent)(&key) {
            return Err(TableError::InvalidKey);
        }

        let hash = self.hasher.hash(&key);
        let index = self.bucket_index(hash);

        let mut cursor = self.buckets[index].as_deref_mut();
        while let Some(entry) = cursor {
            if self.eq.eq(&entry.key, &key) {
                entry.value = value;
                return Ok(());
            }
            cursor = entry.next.as_deref_mut();
        }

        let next = self.buckets[index].take();
        self.buckets[index] = Some(Box::new(Entry {
            key,
            value,
            hash,
            next,
        }));
        self.len += 1;

        #[allow(clippy::cast_precision_loss)]
        let ratio = self.len as f64 / self.buckets.len() as f64;
        if ratio > self.load_factor {
            self.grow();
        }
        Ok(())
    }

    fn find(&self, key: &K) -> Option<&Entry<K, V>> {
        let index = self.bucket_index(self.hasher.hash(key));
        let mut cursor = self.buckets[index].as_deref();
        while let Some(entry) = cursor {
            if self.eq.eq(&entry.key, key) {
                return Some(entry);
            }
            cursor = entry.next.as_deref();
        }
        None
    }

    /// Get the value stored for `key`
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).map(|entry| &entry.value)
    }

    /// Get a mutable reference to the value stored for `key`
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.bucket_index(self.hasher.hash(key));
        let mut cursor = self.buckets[index].as_deref_mut();
        while let Some(entry) = cursor {
            if self.eq.eq(&entry.key, key) {
                return Some(&mut entry.value);
            }
            cursor = entry.next.as_deref_mut();
        }
        None
    }

    /// Check if `key` is present
    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Unlink the entry for `key` and return its value
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.bucket_index(self.hasher.hash(key));

        let mut cursor = &mut self.buckets[index];
        loop {
            match cursor.as_deref() {
                None => return None,
                Some(entry) if self.eq.eq(&entry.key, key) => break,
                Some(_) => {}
            }
            cursor = match cursor {
                Some(entry) => &mut entry.next,
                None => return None,
            };
        }

        let entry = cursor.take()?;
        let Entry { value, next, .. } = *entry;
        *cursor = next;
        self.len -= 1;
        Some(value)
    }

    /// Remove `key`, returning whether it was present
    pub fn delete(&mut self, key: &K) -> bool {
        self.remove(key).is_some()
    }

    /// Drop every entry. The current capacity is kept.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            let mut link = bucket.take();
            while let Some(mut entry) = link {
                link = entry.next.take();
            }
        }
        self.len = 0;
    }

    /// Iterate entries in bucket order, then chain order within a bucket
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            chain: None,
            remaining: self.len,
        }
    }

    /// Alias of [`HashTable::iter`]
    #[must_use]
    pub fn entries(&self) -> Iter<'_, K, V> {
        self.iter()
    }

    /// Keys in iteration order
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Values in iteration order
    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Visit every entry once as `(value, key)`
    pub fn for_each(&self, mut visitor: impl FnMut(&V, &K)) {
        for (key, value) in self {
            visitor(value, key);
        }
    }

    /// Bucket occupancy for diagnostics
    #[must_use]
    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            len: self.len,
            capacity: self.buckets.len(),
            ..TableStats::default()
        };
        for bucket in &self.buckets {
            let mut chain = 0;
            let mut cursor = bucket.as_deref();
            while let Some(entry) = cursor {
                chain += 1;
                cursor = entry.next.as_deref();
            }
            if chain > 0 {
                stats.occupied_buckets += 1;
                stats.longest_chain = stats.longest_chain.max(chain);
            }
        }
        stats
    }

    /// Double the bucket array and relink every entry
    #[allow(clippy::cast_possible_truncation)]
    fn grow(&mut self) {
        let old_capacity = self.buckets.len();
        let new_capacity = (old_capacity * 2).max(1);
        let mut buckets = empty_buckets(new_capacity);

        for bucket in &mut self.buckets {
            let mut link = bucket.take();
            while let Some(mut entry) = link {
                link = entry.next.take();
                let index = (entry.hash % new_capacity as u64) as usize;
                entry.next = buckets[index].take();
                buckets[index] = Some(entry);
            }
        }

        self.buckets = buckets;
        debug!(
            "Resized hash table from {} to {} buckets ({} entries)",
            old_capacity, new_capacity, self.len
        );
    }
}

fn empty_buckets<K, V>(capacity: usize) -> Vec<Link<K, V>> {
    (0..capacity).map(|_| None).collect()
}

impl<K, V> Drop for HashTable<K, V> {
    fn drop(&mut self) {
        // Unlink chains one entry at a time instead of recursing through Box
        self.clear();
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> IntoIterator for &'a HashTable<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a [`HashTable`]
pub struct Iter<'a, K, V> {
    buckets: std::slice::Iter<'a, Link<K, V>>,
    chain: Option<&'a Entry<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.chain {
                self.chain = entry.next.as_deref();
                self.remaining -= 1;
                return Some((&entry.key, &entry.value));
            }
            self.chain = self.buckets.next()?.as_deref();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}
