//! Environment variable access shared by every component's `from_env`.
//!
//! Lookups go through [`EnvSource`] so configuration parsing can be tested
//! with a plain map instead of mutating the process environment.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A source of configuration variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// Non-empty value of `key`, if set.
pub fn optional_var(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.var(key).filter(|v| !v.trim().is_empty())
}

/// Value of `key`, or `default` when unset or empty.
pub fn string_var(env: &dyn EnvSource, key: &str, default: &str) -> String {
    optional_var(env, key).unwrap_or_else(|| default.to_string())
}

/// Value of `key`; unset or empty is a configuration error.
pub fn required_var(env: &dyn EnvSource, key: &str) -> Result<String> {
    optional_var(env, key).ok_or_else(|| Error::Config(format!("{} is not set", key)))
}

/// Parsed value of `key`, or `default` when unset or empty.
///
/// A value that does not parse is an error rather than a silent fallback.
pub fn parse_var<T>(env: &dyn EnvSource, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match optional_var(env, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{}={:?} is invalid: {}", key, raw, e))),
    }
}
