//! Default key hashing
//!
//! Every key resolves to one of four categories through [`HashKey::kind`]:
//!
//! - Integer: bit-mixed (`h ^ (h >> 16)` over the low 32 bits)
//! - Text: multiplicative rolling hash (seed 5381, multiplier 33)
//! - Boolean: one of two fixed constants
//! - Structured: the key's canonical text form, then the text hash
//!
//! The structured category has no reflection fallback. Key types pick a
//! serialization themselves, usually by wrapping the value in [`Json`].
//!
//! All default hashes are masked to 31 bits, so they are already
//! non-negative when reduced modulo the table capacity.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

/// Initial value of the text hash
pub const TEXT_HASH_SEED: u32 = 5381;

/// Per-character multiplier of the text hash
pub const TEXT_HASH_MULTIPLIER: u32 = 33;

/// Hash of `true`
pub const TRUE_HASH: u32 = 1231;

/// Hash of `false`
pub const FALSE_HASH: u32 = 1237;

const NON_NEGATIVE_MASK: u32 = 0x7fff_ffff;

/// Hashing category of a key
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyKind<'a> {
    Integer(i64),
    Text(Cow<'a, str>),
    Boolean(bool),
    /// Canonical text form of a composite key
    Structured(Cow<'a, str>),
}

/// Keys that can be hashed without a custom hash function
pub trait HashKey {
    /// Category and payload used by [`default_hash`]
    fn kind(&self) -> KeyKind<'_>;

    /// Whether this value stands for "no key provided".
    ///
    /// Absent keys are rejected by `HashTable::set`.
    fn is_absent(&self) -> bool {
        false
    }
}

/// Default hash of a key
#[must_use]
pub fn default_hash<K: HashKey + ?Sized>(key: &K) -> u32 {
    hash_kind(&key.kind())
}

/// Default hash of an already-categorized key
#[must_use]
pub fn hash_kind(kind: &KeyKind<'_>) -> u32 {
    match kind {
        KeyKind::Integer(value) => hash_integer(*value),
        KeyKind::Text(text) | KeyKind::Structured(text) => hash_text(text),
        KeyKind::Boolean(true) => TRUE_HASH,
        KeyKind::Boolean(false) => FALSE_HASH,
    }
}

/// Bit-mixing hash for integers
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const fn hash_integer(value: i64) -> u32 {
    let h = value as u32;
    (h ^ (h >> 16)) & NON_NEGATIVE_MASK
}

/// Rolling hash for text, one step per character
#[must_use]
pub fn hash_text(text: &str) -> u32 {
    let hash = text.chars().fold(TEXT_HASH_SEED, |hash, c| {
        hash.wrapping_mul(TEXT_HASH_MULTIPLIER).wrapping_add(c as u32)
    });
    hash & NON_NEGATIVE_MASK
}

macro_rules! impl_integer_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HashKey for $ty {
                #[allow(clippy::cast_possible_wrap, clippy::cast_lossless)]
                fn kind(&self) -> KeyKind<'_> {
                    KeyKind::Integer(*self as i64)
                }
            }
        )*
    };
}

impl_integer_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl HashKey for bool {
    fn kind(&self) -> KeyKind<'_> {
        KeyKind::Boolean(*self)
    }
}

impl HashKey for str {
    fn kind(&self) -> KeyKind<'_> {
        KeyKind::Text(Cow::Borrowed(self))
    }
}

impl HashKey for String {
    fn kind(&self) -> KeyKind<'_> {
        KeyKind::Text(Cow::Borrowed(self.as_str()))
    }
}

impl HashKey for Path {
    fn kind(&self) -> KeyKind<'_> {
        KeyKind::Text(self.to_string_lossy())
    }
}

impl HashKey for PathBuf {
    fn kind(&self) -> KeyKind<'_> {
        self.as_path().kind()
    }
}

impl<T: HashKey + ?Sized> HashKey for &T {
    fn kind(&self) -> KeyKind<'_> {
        (**self).kind()
    }

    fn is_absent(&self) -> bool {
        (**self).is_absent()
    }
}

/// `None` is the absent key.
impl<T: HashKey> HashKey for Option<T> {
    fn kind(&self) -> KeyKind<'_> {
        match self {
            Some(key) => key.kind(),
            None => KeyKind::Structured(Cow::Borrowed("null")),
        }
    }

    fn is_absent(&self) -> bool {
        self.as_ref().is_none_or(HashKey::is_absent)
    }
}

/// Structured key hashed through its JSON serialization.
///
/// Serialization falls back to the `Debug` text when it fails (for example
/// maps with non-string keys). JSON output is only canonical when the
/// wrapped type serializes deterministically, so prefer `BTreeMap` over
/// `HashMap` inside keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Json<T>(pub T);

impl<T: Serialize + fmt::Debug> HashKey for Json<T> {
    fn kind(&self) -> KeyKind<'_> {
        let text = serde_json::to_string(&self.0).unwrap_or_else(|_| format!("{:?}", self.0));
        KeyKind::Structured(Cow::Owned(text))
    }
}
