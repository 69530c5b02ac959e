//! SDK log verbosity.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Minimum severity the SDK's own request logging emits.
///
/// Levels are ordered from quietest to loudest; `None` disables output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No output at all.
    None,
    /// Failures only.
    Error,
    /// Failures and warnings.
    #[default]
    Warn,
    /// Completed calls as well.
    Info,
    /// Everything, including call start.
    Debug,
}

impl LogLevel {
    /// Returns `true` if a line at `severity` should be emitted under this
    /// configured minimum.
    ///
    /// ```
    /// use storefront_core::LogLevel;
    ///
    /// assert!(LogLevel::Info.allows(LogLevel::Error));
    /// assert!(!LogLevel::Warn.allows(LogLevel::Debug));
    /// assert!(!LogLevel::None.allows(LogLevel::Error));
    /// ```
    #[must_use]
    pub fn allows(self, severity: Self) -> bool {
        severity != Self::None && severity <= self
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" | "trace" => Ok(Self::Debug),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_blocks_everything() {
        for severity in [LogLevel::Error, LogLevel::Warn, LogLevel::Info, LogLevel::Debug] {
            assert!(!LogLevel::None.allows(severity));
        }
    }

    #[test]
    fn test_debug_allows_everything() {
        for severity in [LogLevel::Error, LogLevel::Warn, LogLevel::Info, LogLevel::Debug] {
            assert!(LogLevel::Debug.allows(severity));
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("off".parse::<LogLevel>().unwrap(), LogLevel::None);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
