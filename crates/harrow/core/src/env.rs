use std::env;

use anyhow::{anyhow, Result};

/// Reads an environment variable and parses it into `R`.
pub fn infer<K, R>(key: K) -> Result<R>
where
    K: AsRef<str>,
    R: ::core::str::FromStr,
    <R as ::core::str::FromStr>::Err: 'static + Send + Sync + ::core::fmt::Display,
{
    let key = key.as_ref();

    infer_string(key)?
        .parse()
        .map_err(|error| anyhow!("failed to parse the environment variable ({key}): {error}"))
}

/// Reads an environment variable as-is. Absence is an error; endpoints
/// with a sensible default should use [`infer_or`] instead.
pub fn infer_string<K>(key: K) -> Result<String>
where
    K: AsRef<str>,
{
    let key = key.as_ref();

    env::var(key).map_err(|_| anyhow!("failed to find the environment variable: {key}"))
}

/// Reads and parses an environment variable, falling back to the given
/// default when the variable is unset or unparsable.
pub fn infer_or<K, R>(key: K, default: R) -> R
where
    K: AsRef<str>,
    R: ::core::str::FromStr,
    <R as ::core::str::FromStr>::Err: 'static + Send + Sync + ::core::fmt::Display,
{
    infer(key).unwrap_or(default)
}
