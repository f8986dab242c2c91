//! Window specifications and durations

use std::fmt;

use serde::{Deserialize, Serialize};

/// Time unit keyword used in window, join and timeout clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "MILLISECONDS",
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Minutes => "MINUTES",
            TimeUnit::Hours => "HOURS",
            TimeUnit::Days => "DAYS",
        }
    }
}

/// `n UNIT`, as written in ksql.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KsqlDuration {
    pub value: u64,
    pub unit: TimeUnit,
}

impl KsqlDuration {
    pub const fn new(value: u64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub const fn milliseconds(value: u64) -> Self {
        Self::new(value, TimeUnit::Milliseconds)
    }

    pub const fn seconds(value: u64) -> Self {
        Self::new(value, TimeUnit::Seconds)
    }

    pub const fn minutes(value: u64) -> Self {
        Self::new(value, TimeUnit::Minutes)
    }

    pub const fn hours(value: u64) -> Self {
        Self::new(value, TimeUnit::Hours)
    }

    pub const fn days(value: u64) -> Self {
        Self::new(value, TimeUnit::Days)
    }
}

impl fmt::Display for KsqlDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Tumbling { size: KsqlDuration },
    Hopping { size: KsqlDuration, advance_by: KsqlDuration },
    Session { gap: KsqlDuration },
}

/// Window applied to a grouped query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindows {
    pub kind: WindowKind,
    pub retention: Option<KsqlDuration>,
    pub grace_period: Option<KsqlDuration>,
}

impl TimeWindows {
    fn of(kind: WindowKind) -> Self {
        Self {
            kind,
            retention: None,
            grace_period: None,
        }
    }

    pub fn tumbling(size: KsqlDuration) -> Self {
        Self::of(WindowKind::Tumbling { size })
    }

    pub fn hopping(size: KsqlDuration, advance_by: KsqlDuration) -> Self {
        Self::of(WindowKind::Hopping { size, advance_by })
    }

    pub fn session(gap: KsqlDuration) -> Self {
        Self::of(WindowKind::Session { gap })
    }

    pub fn with_retention(mut self, retention: KsqlDuration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn with_grace_period(mut self, grace: KsqlDuration) -> Self {
        self.grace_period = Some(grace);
        self
    }

    /// `WINDOW …` clause text.
    pub fn to_ksql(&self) -> String {
        let mut parts = match self.kind {
            WindowKind::Tumbling { size } => vec![format!("SIZE {}", size)],
            WindowKind::Hopping { size, advance_by } => {
                vec![format!("SIZE {}", size), format!("ADVANCE BY {}", advance_by)]
            }
            WindowKind::Session { gap } => vec![gap.to_string()],
        };
        if let Some(retention) = self.retention {
            parts.push(format!("RETENTION {}", retention));
        }
        if let Some(grace) = self.grace_period {
            parts.push(format!("GRACE PERIOD {}", grace));
        }

        let keyword = match self.kind {
            WindowKind::Tumbling { .. } => "TUMBLING",
            WindowKind::Hopping { .. } => "HOPPING",
            WindowKind::Session { .. } => "SESSION",
        };
        format!("WINDOW {} ({})", keyword, parts.join(", "))
    }
}
