use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Native log levels with their ordinals.
///
/// `Performance` sits above `Critical` and is used for timing reports that
/// must pass every level threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Success,
    Warning,
    Error,
    Critical,
    Performance,
}

impl Level {
    pub const ALL: [Level; 8] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Success,
        Level::Warning,
        Level::Error,
        Level::Critical,
        Level::Performance,
    ];

    pub fn ordinal(self) -> u32 {
        match self {
            Level::Trace => 5,
            Level::Debug => 10,
            Level::Info => 20,
            Level::Success => 25,
            Level::Warning => 30,
            Level::Error => 40,
            Level::Critical => 50,
            Level::Performance => 60,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
            Level::Performance => "PERFORMANCE",
        }
    }

    pub fn severity(self) -> Severity {
        Severity::from_native(self.name(), self.ordinal())
    }

    /// ANSI colour used by the human formatter.
    pub(crate) fn color(self) -> &'static str {
        match self {
            Level::Trace => "\x1b[36m\x1b[1m",
            Level::Debug => "\x1b[34m\x1b[1m",
            Level::Info => "\x1b[1m",
            Level::Success => "\x1b[32m\x1b[1m",
            Level::Warning | Level::Performance => "\x1b[33m\x1b[1m",
            Level::Error => "\x1b[31m\x1b[1m",
            Level::Critical => "\x1b[41m\x1b[1m",
        }
    }

    /// Nearest native level at or below `ordinal`.
    pub fn from_ordinal(ordinal: u32) -> Level {
        Level::ALL
            .iter()
            .rev()
            .copied()
            .find(|l| l.ordinal() <= ordinal)
            .unwrap_or(Level::Trace)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    /// Accepts level names in any case (`WARN` is an alias of `WARNING`,
    /// `FATAL` of `CRITICAL`) or a bare ordinal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u32>() {
            return Ok(Level::from_ordinal(n));
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "SUCCESS" => Ok(Level::Success),
            "WARN" | "WARNING" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" | "FATAL" => Ok(Level::Critical),
            "PERFORMANCE" | "PERF" => Ok(Level::Performance),
            _ => Err(ConfigError::UnknownLevel(s.to_string())),
        }
    }
}

/// Canonical severity buckets: (native ordinal base, name, number).
const BUCKETS: [(u32, &str, u8); 6] = [
    (1, "TRACE", 1),
    (10, "DEBUG", 5),
    (20, "INFO", 9),
    (30, "WARN", 13),
    (40, "ERROR", 17),
    (50, "FATAL", 21),
];

/// Highest canonical severity number (FATAL4).
const MAX_SEVERITY_NUMBER: u8 = 24;

/// Canonical `(text, number)` severity pair carried by every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Severity {
    pub text: String,
    pub number: u8,
    /// Native ordinal the severity was derived from, used for sink
    /// thresholds.
    pub ordinal: u32,
}

impl Severity {
    /// Map a native ordinal onto the canonical number.
    ///
    /// Numbers never decrease as the ordinal grows. Within a bucket the
    /// distance from the bucket base adds up to three steps.
    pub fn number_for(ordinal: u32) -> u8 {
        if ordinal == 0 {
            return 0;
        }
        if ordinal > 53 {
            return MAX_SEVERITY_NUMBER;
        }
        let (base, _, number) = bucket(ordinal);
        // TRACE starts at 1 but its steps are counted from 5.
        let offset = if base == 1 { ordinal.saturating_sub(5) } else { ordinal - base };
        number + offset.min(3) as u8
    }

    /// Canonical bucket name for an ordinal.
    pub fn text_for(ordinal: u32) -> &'static str {
        if ordinal == 0 {
            return "UNSPECIFIED";
        }
        bucket(ordinal).1
    }

    /// Build a severity from a native level name and ordinal.
    ///
    /// The name is kept as text except `WARNING`, which is shortened to
    /// `WARN`. An empty name takes the canonical bucket name.
    pub fn from_native(name: &str, ordinal: u32) -> Self {
        let text = match name {
            "WARNING" => "WARN".to_string(),
            "" => Self::text_for(ordinal).to_string(),
            other => other.to_string(),
        };
        Severity { text, number: Self::number_for(ordinal), ordinal }
    }

    /// Severity for an ordinal with no native name.
    pub fn from_ordinal(ordinal: u32) -> Self {
        Self::from_native("", ordinal)
    }
}

fn bucket(ordinal: u32) -> (u32, &'static str, u8) {
    BUCKETS
        .iter()
        .rev()
        .copied()
        .find(|(base, _, _)| *base <= ordinal)
        .unwrap_or(BUCKETS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_renders_as_warn_with_unchanged_number() {
        let s = Level::Warning.severity();
        assert_eq!(s.text, "WARN");
        assert_eq!(s.number, Severity::number_for(30));
        assert_eq!(s.number, 13);
        assert_eq!(s.ordinal, 30);
    }

    #[test]
    fn standard_levels_hit_bucket_bases() {
        assert_eq!(Severity::number_for(10), 5);
        assert_eq!(Severity::number_for(20), 9);
        assert_eq!(Severity::number_for(40), 17);
        assert_eq!(Severity::number_for(50), 21);
        assert_eq!(Severity::number_for(5), 1);
        assert_eq!(Severity::number_for(0), 0);
    }

    #[test]
    fn custom_ordinals_bucket_numerically() {
        assert_eq!(Severity::number_for(11), 6);
        assert_eq!(Severity::number_for(19), 8);
        assert_eq!(Severity::number_for(25), 12);
        assert_eq!(Severity::number_for(60), 24);
        assert_eq!(Severity::from_ordinal(35).text, "WARN");
        assert_eq!(Level::Performance.severity().text, "PERFORMANCE");
    }

    #[test]
    fn numbers_are_monotonic() {
        let mut last = 0;
        for ordinal in 0..100 {
            let n = Severity::number_for(ordinal);
            assert!(n >= last, "ordinal {} went down to {}", ordinal, n);
            last = n;
        }
    }

    #[test]
    fn levels_parse_by_name_and_ordinal() {
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("Performance".parse::<Level>().unwrap(), Level::Performance);
        assert_eq!("45".parse::<Level>().unwrap(), Level::Error);
        assert!("loud".parse::<Level>().is_err());
    }
}
