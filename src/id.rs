//! Item identifier generation.
//!
//! IDs have the form `{prefix}-{suffix}` where the suffix is a random
//! lowercase alphanumeric string, e.g. `task-k3x9q2`. The store-integrated
//! variant checks each candidate against existing IDs and retries a bounded
//! number of times before giving up.

use crate::error::{ItemError, Result};
use rand::Rng;

/// Maximum number of candidates tried before reporting exhaustion.
pub const MAX_ID_ATTEMPTS: usize = 10;

/// Default length of the random suffix.
pub const DEFAULT_ID_LENGTH: usize = 6;

const SEPARATOR: char = '-';
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Trim whitespace and at most one trailing separator (`-` or `_`).
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    let stripped = trimmed
        .strip_suffix(SEPARATOR)
        .or_else(|| trimmed.strip_suffix('_'))
        .unwrap_or(trimmed);
    stripped.to_string()
}

fn random_suffix<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn validate_length(length: usize) -> Result<()> {
    if length == 0 {
        return Err(ItemError::invalid(
            "length",
            "ID length must be at least 1",
        ));
    }
    Ok(())
}

fn compose(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        suffix.to_string()
    } else {
        format!("{}{}{}", prefix, SEPARATOR, suffix)
    }
}

/// Generate an ID without checking for collisions.
///
/// Suitable where no store is available (e.g. previews, remapping in memory).
pub fn generate_id(prefix: &str, length: usize) -> Result<String> {
    validate_length(length)?;
    let prefix = normalize_prefix(prefix);
    let suffix = random_suffix(&mut rand::thread_rng(), length);
    Ok(compose(&prefix, &suffix))
}

/// Generate an ID that `exists` reports as unused.
///
/// Tries up to [`MAX_ID_ATTEMPTS`] candidates; errors from `exists`
/// propagate immediately.
pub fn generate_unique_id<F>(prefix: &str, length: usize, mut exists: F) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    validate_length(length)?;
    let prefix = normalize_prefix(prefix);
    let mut rng = rand::thread_rng();

    for attempt in 1..=MAX_ID_ATTEMPTS {
        let candidate = compose(&prefix, &random_suffix(&mut rng, length));
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        tracing::debug!(candidate = %candidate, attempt, "ID collision, retrying");
    }

    Err(ItemError::exhausted_retries(&prefix, length, MAX_ID_ATTEMPTS))
}
