//! Shared-secret request signing used by the payment gateway.
//!
//! Canonical form: drop empty values and the `sign`/`sign_type` keys, sort by
//! key, join as `k=v` with `&`, append the merchant key with no separator.
//! The signature is the lowercase hex MD5 of that string.

use std::collections::{BTreeMap, HashSet};

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;

const RESERVED_KEYS: [&str; 2] = ["sign", "sign_type"];

/// Canonical parameter string without the key appended.
pub fn canonical_query<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted: BTreeMap<String, String> = BTreeMap::new();
    for (k, v) in params {
        let (k, v) = (k.as_ref(), v.as_ref());
        if v.is_empty() || RESERVED_KEYS.contains(&k) {
            continue;
        }
        sorted.insert(k.to_string(), v.to_string());
    }
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sign_params<I, K, V>(params: I, key: &str) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut hasher = Md5::new();
    hasher.update(canonical_query(params).as_bytes());
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// True when some key appears more than once.
pub fn has_repeated_keys<K, V>(params: &[(K, V)]) -> bool
where
    K: AsRef<str>,
{
    let mut seen = HashSet::with_capacity(params.len());
    params.iter().any(|(k, _)| !seen.insert(k.as_ref()))
}

/// Recompute the signature over `params` and compare it with their `sign` entry.
///
/// Fails for an empty merchant key, whose digest anyone can compute, and for
/// repeated keys, where the signed copy and the copy a reader picks up could
/// differ.
pub fn verify_params<K, V>(params: &[(K, V)], key: &str) -> bool
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if key.is_empty() || has_repeated_keys(params) {
        return false;
    }
    let Some(provided) = params
        .iter()
        .find(|(k, _)| k.as_ref() == "sign")
        .map(|(_, v)| v.as_ref().to_ascii_lowercase())
    else {
        return false;
    };
    let expected = sign_params(params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())), key);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
