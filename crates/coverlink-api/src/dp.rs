// ── Data-point types ──
//
// A device exposes its attributes as numbered data points. One status
// read returns all of them at once as a `StateSnapshot`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a data point on a device. Index 0 means "not configured".
pub type DpIndex = u32;

/// Value held by a single data point.
///
/// Untagged so that a device payload like `{"1": "open", "3": 42}` maps
/// directly onto the enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DpValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl DpValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view. Numeric strings are accepted since some firmwares
    /// report positions as text.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for DpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for DpValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for DpValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for DpValue {
    fn from(v: u8) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for DpValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for DpValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Full set of data-point values returned by one status read.
///
/// Immutable once built. A newer read replaces it wholesale; values are
/// never merged across reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot {
    dps: BTreeMap<DpIndex, DpValue>,
}

impl StateSnapshot {
    /// The empty snapshot, also used as the "nothing known" sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, index: DpIndex) -> Option<&DpValue> {
        self.dps.get(&index)
    }

    pub fn len(&self) -> usize {
        self.dps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dps.is_empty()
    }

    /// Data points in ascending index order.
    pub fn entries(&self) -> impl Iterator<Item = (DpIndex, &DpValue)> {
        self.dps.iter().map(|(k, v)| (*k, v))
    }

    /// Parse a raw device payload of the form `{"dps": {"1": ..}}` or a
    /// bare `{"1": ..}` map.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, crate::Error> {
        let map = value.get("dps").unwrap_or(value);
        serde_json::from_value(map.clone()).map_err(|e| crate::Error::Protocol {
            message: format!("malformed status payload: {e}"),
        })
    }
}

impl FromIterator<(DpIndex, DpValue)> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = (DpIndex, DpValue)>>(iter: I) -> Self {
        Self {
            dps: iter.into_iter().collect(),
        }
    }
}
