use std::{collections::BTreeMap, fmt, path::PathBuf, time::Duration};

/// Version string the engine reports to hosts that gate on a MySQL version.
pub const REPORTED_MYSQL_VERSION: &str = "5.5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn at_least(&self, major: u16, minor: u16, patch: u16) -> bool {
        *self >= Self::new(major, minor, patch)
    }

    /// Parses `major[.minor[.patch]]`, tolerating a non-numeric suffix on the
    /// last component (`3.45.1-beta`).
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parts.next().map_or(Some(0), parse_component)?;
        let patch = parts.next().map_or(Some(0), parse_component)?;
        Some(Self::new(major, minor, patch))
    }
}

fn parse_component(raw: &str) -> Option<u16> {
    let digits = raw
        .find(|ch: char| !ch.is_ascii_digit())
        .map_or(raw, |end| &raw[..end]);
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub database: String,
    pub extra: BTreeMap<String, String>,
}

impl ConnectionConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles from `initial` after every failed attempt, never exceeding `max`.
    Exponential { initial: Duration, max: Duration },
}

/// How often a statement is re-attempted while the engine reports the file as
/// busy or locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(Duration::ZERO),
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { initial, max },
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(16);
                initial.saturating_mul(1 << shift).min(max)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(50, Duration::from_millis(5), Duration::from_millis(100))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    pub ddl_retry: RetryPolicy,
    pub max_statement_bytes: usize,
    pub atomic_insert_tables: Vec<String>,
    pub database_name: String,
    pub trace_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            ddl_retry: RetryPolicy::fixed(50, Duration::from_millis(10)),
            max_statement_bytes: 64 * 1024 * 1024,
            atomic_insert_tables: Vec::new(),
            database_name: "main".to_string(),
            trace_file: None,
        }
    }
}

/// Version-gated behavior of the embedded engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub multi_row_insert: bool,
    pub upsert: bool,
}

impl Capabilities {
    pub fn for_version(version: &Version) -> Self {
        Self {
            multi_row_insert: version.at_least(3, 7, 11),
            upsert: version.at_least(3, 35, 0),
        }
    }

    pub fn has_feature(&self, feature: MysqlFeature) -> bool {
        match feature {
            MysqlFeature::Subqueries => true,
            MysqlFeature::Charset | MysqlFeature::Collation => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MysqlFeature {
    Charset,
    Collation,
    Subqueries,
}
