//! Structural-event log kinds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default flush interval shared by every log kind, in milliseconds
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 7_500;

/// Database system tables land in unless configured otherwise
pub const DEFAULT_DATABASE: &str = "system";

/// One category of structural-event log
///
/// Every kind gets its own buffer, flush task and destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Lifecycle of every data part
    PartLog,
    /// Mutation results, for deployments that route them apart from `PartLog`
    MutationLog,
}

impl LogKind {
    pub const ALL: [LogKind; 2] = [Self::PartLog, Self::MutationLog];

    /// Configuration key and log name
    pub fn name(self) -> &'static str {
        match self {
            Self::PartLog => "part_log",
            Self::MutationLog => "mutation_log",
        }
    }

    /// Table written to when the configuration does not name one
    pub fn default_table(self) -> &'static str {
        self.name()
    }

    pub fn default_flush_interval_ms(self) -> u64 {
        DEFAULT_FLUSH_INTERVAL_MS
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| CoreError::UnknownLogKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(LogKind::PartLog.default_table(), "part_log");
        assert_eq!(LogKind::MutationLog.default_table(), "mutation_log");
        assert_eq!(LogKind::PartLog.default_flush_interval_ms(), 7_500);
    }

    #[test]
    fn test_parse_round_trip() {
        for kind in LogKind::ALL {
            assert_eq!(kind.to_string().parse::<LogKind>().unwrap(), kind);
        }
        assert_eq!(
            "query_log".parse::<LogKind>(),
            Err(CoreError::UnknownLogKind("query_log".into()))
        );
    }
}
