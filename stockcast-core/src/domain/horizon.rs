//! Forecast horizons and their canonical string keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named future offset, derived from a month count.
///
/// The key mapping is `m < 12 → "{m}months"`, `m == 12 → "1year"`,
/// `m > 12 → "{m/12}years"` (integer division), so 30 months and 24 months
/// share the `"2years"` key and compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Horizon {
    Months(u32),
    Year,
    Years(u32),
}

/// The six horizons predictions are computed for.
pub const CANONICAL_HORIZONS: [Horizon; 6] = [
    Horizon::Months(3),
    Horizon::Months(6),
    Horizon::Year,
    Horizon::Years(2),
    Horizon::Years(3),
    Horizon::Years(5),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized horizon key '{0}'")]
pub struct HorizonParseError(pub String);

impl Horizon {
    pub fn from_months(months: u32) -> Self {
        match months {
            m if m < 12 => Horizon::Months(m),
            12 => Horizon::Year,
            m => Horizon::Years(m / 12),
        }
    }

    /// Month count handed to the forecasting function.
    pub fn months(&self) -> u32 {
        match *self {
            Horizon::Months(m) => m,
            Horizon::Year => 12,
            Horizon::Years(y) => y * 12,
        }
    }

    pub fn key(&self) -> String {
        match *self {
            Horizon::Months(m) => format!("{m}months"),
            Horizon::Year => "1year".to_string(),
            Horizon::Years(y) => format!("{y}years"),
        }
    }
}

/// Key for the predictions map from a raw month count.
pub fn months_to_horizon(months: u32) -> String {
    Horizon::from_months(months).key()
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Horizon {
    type Err = HorizonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "1year" {
            return Ok(Horizon::Year);
        }
        let parse = |digits: &str| digits.parse::<u32>().map_err(|_| HorizonParseError(s.into()));
        if let Some(n) = s.strip_suffix("months") {
            let m = parse(n)?;
            if m < 12 {
                return Ok(Horizon::Months(m));
            }
        } else if let Some(n) = s.strip_suffix("years") {
            return Ok(Horizon::Years(parse(n)?));
        }
        Err(HorizonParseError(s.into()))
    }
}

impl Serialize for Horizon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for Horizon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        key.parse().map_err(serde::de::Error::custom)
    }
}
