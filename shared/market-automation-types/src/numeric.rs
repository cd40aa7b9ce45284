//! Lenient scalar parsing for index payloads.
//!
//! The index serializes big integers as decimal strings and enums either by name or by
//! ordinal, depending on the schema revision that produced the record.

use std::{fmt, str::FromStr};

use alloy_primitives::{B256, U256};
use serde::{de::Error, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum Raw {
    Number(u64),
    Text(String),
}

impl fmt::Debug for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Raw::Number(n) => write!(f, "{n}"),
            Raw::Text(s) => write!(f, "{s:?}"),
        }
    }
}

pub(crate) fn u256<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
    match Raw::deserialize(d)? {
        Raw::Number(n) => Ok(U256::from(n)),
        Raw::Text(s) => U256::from_str(s.trim())
            .map_err(|e| D::Error::custom(format!("invalid uint256 {s:?}: {e}"))),
    }
}

pub(crate) fn u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match Raw::deserialize(d)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| D::Error::custom(format!("invalid u64 {s:?}: {e}"))),
    }
}

pub(crate) fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    match Option::<Raw>::deserialize(d)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid u64 {s:?}: {e}"))),
    }
}

pub(crate) fn opt_b256<'de, D: Deserializer<'de>>(d: D) -> Result<Option<B256>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => B256::from_str(s.trim())
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid bytes32 {s:?}: {e}"))),
    }
}

/// Resolve an enum encoded either by name or by ordinal.
pub(crate) fn enum_repr<'de, D, T>(
    d: D,
    what: &'static str,
    by_name: fn(&str) -> Option<T>,
    by_ordinal: fn(u8) -> Option<T>,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Raw::deserialize(d)?;
    let value = match &raw {
        Raw::Number(n) => u8::try_from(*n).ok().and_then(by_ordinal),
        Raw::Text(s) => {
            by_name(s.trim()).or_else(|| s.trim().parse::<u8>().ok().and_then(by_ordinal))
        }
    };
    value.ok_or_else(|| D::Error::custom(format!("unknown {what} {raw:?}")))
}
