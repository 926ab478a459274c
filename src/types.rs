// =============================================================================
// Shared types used across the divergence scanner
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Candle interval the scanner analyses.  Each interval carries its own
/// divergence preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
}

impl Interval {
    pub const ALL: [Interval; 4] = [Interval::M1, Interval::M5, Interval::M15, Interval::H1];

    /// Interval token used by the Bybit v5 kline endpoints (minutes).
    pub fn bybit_token(self) -> &'static str {
        match self {
            Self::M1 => "1",
            Self::M5 => "5",
            Self::M15 => "15",
            Self::H1 => "60",
        }
    }

    /// Bucket length in milliseconds.
    pub fn duration_ms(self) -> i64 {
        match self {
            Self::M1 => 60_000,
            Self::M5 => 5 * 60_000,
            Self::M15 => 15 * 60_000,
            Self::H1 => 60 * 60_000,
        }
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::M1
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::M1 => write!(f, "1m"),
            Self::M5 => write!(f, "5m"),
            Self::M15 => write!(f, "15m"),
            Self::H1 => write!(f, "1h"),
        }
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "1" => Ok(Self::M1),
            "5m" | "5" => Ok(Self::M5),
            "15m" | "15" => Ok(Self::M15),
            "1h" | "60" => Ok(Self::H1),
            other => anyhow::bail!("unsupported interval: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_and_bybit_tokens() {
        assert_eq!("5m".parse::<Interval>().unwrap(), Interval::M5);
        assert_eq!("60".parse::<Interval>().unwrap(), Interval::H1);
        assert_eq!(" 1H ".parse::<Interval>().unwrap(), Interval::H1);
        assert!("4h".parse::<Interval>().is_err());
    }

    #[test]
    fn display_matches_serde_label() {
        for iv in Interval::ALL {
            let json = serde_json::to_string(&iv).unwrap();
            assert_eq!(json, format!("\"{iv}\""));
        }
    }

    #[test]
    fn bybit_token_roundtrip() {
        for iv in Interval::ALL {
            assert_eq!(iv.bybit_token().parse::<Interval>().unwrap(), iv);
        }
    }
}
