//! Storage key generation.
//!
//! Keys look like `uploads/<unix-millis>-<0..9999>.<ext>`. They are persisted
//! inside article `imageUrl` columns, so the format is part of the external
//! contract and must not change.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;

/// Namespace every generated key lives under.
pub const KEY_PREFIX: &str = "uploads/";

/// Extension used when the original filename carries none.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Exclusive upper bound of the random suffix.
const SUFFIX_RANGE: u16 = 10_000;

const MAX_EXTENSION_LEN: usize = 8;

/// Generates unique storage keys.
///
/// The suffixes handed out during the current millisecond are remembered, so
/// one generator never issues the same key twice even when called many times
/// within a single millisecond.
#[derive(Debug, Default)]
pub struct KeyGenerator {
    issued: Mutex<IssuedSuffixes>,
}

#[derive(Debug, Default)]
struct IssuedSuffixes {
    millis: i64,
    suffixes: HashSet<u16>,
}

impl KeyGenerator {
    /// Creates a new generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh key for an upload named `original_filename`.
    pub fn generate(&self, original_filename: &str) -> String {
        let extension = extension_of(original_filename);
        let (millis, suffix) = self.next_slot();
        format!("{KEY_PREFIX}{millis}-{suffix}.{extension}")
    }

    fn next_slot(&self) -> (i64, u16) {
        let mut issued = self
            .issued
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut rng = rand::rng();

        loop {
            // Never step backwards if the wall clock does.
            let now = Utc::now().timestamp_millis().max(issued.millis);
            if now != issued.millis {
                issued.millis = now;
                issued.suffixes.clear();
            }

            if issued.suffixes.len() >= usize::from(SUFFIX_RANGE) {
                // Every suffix of this millisecond is taken; move to the next one.
                issued.millis += 1;
                issued.suffixes.clear();
            }

            let suffix = rng.random_range(0..SUFFIX_RANGE);
            if issued.suffixes.insert(suffix) {
                return (issued.millis, suffix);
            }
        }
    }
}

/// Extension of the original filename used in generated keys.
///
/// Takes the text after the last `.`, lowercased; falls back to `jpg` when it
/// is missing, empty, too long or not alphanumeric.
#[must_use]
pub fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Returns whether a key matches `uploads/<millis>-<0..9999>.<ext>`.
#[must_use]
pub fn is_generated_key(key: &str) -> bool {
    let Some(name) = key.strip_prefix(KEY_PREFIX) else {
        return false;
    };
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    let Some((millis, suffix)) = stem.split_once('-') else {
        return false;
    };

    !millis.is_empty()
        && millis.chars().all(|c| c.is_ascii_digit())
        && suffix.parse::<u16>().is_ok_and(|s| s < SUFFIX_RANGE)
        && !suffix.starts_with('+')
        && !ext.is_empty()
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
}
