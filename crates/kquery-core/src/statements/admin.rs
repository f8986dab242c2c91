//! DROP, TERMINATE and SHOW statements

use std::fmt;

use crate::identifier::{self, IdentifierEscaping};
use crate::query::SourceKind;

/// `DROP {STREAM|TABLE} [IF EXISTS] <name> [DELETE TOPIC];`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropEntity {
    pub kind: SourceKind,
    pub name: String,
    pub if_exists: bool,
    pub delete_topic: bool,
}

impl DropEntity {
    pub fn stream(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Stream, name)
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Table, name)
    }

    pub fn new(kind: SourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            if_exists: false,
            delete_topic: false,
        }
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub fn delete_topic(mut self) -> Self {
        self.delete_topic = true;
        self
    }

    pub fn build_ksql(&self, escaping: IdentifierEscaping) -> String {
        format!(
            "DROP {} {}{}{};",
            self.kind,
            if self.if_exists { "IF EXISTS " } else { "" },
            identifier::escape(&self.name, escaping),
            if self.delete_topic { " DELETE TOPIC" } else { "" }
        )
    }
}

/// `DROP TYPE [IF EXISTS] <NAME>;`
pub fn drop_type(name: &str, if_exists: bool, escaping: IdentifierEscaping) -> String {
    format!(
        "DROP TYPE {}{};",
        if if_exists { "IF EXISTS " } else { "" },
        identifier::escape(&name.to_uppercase(), escaping)
    )
}

/// `TERMINATE <query id>;`
pub fn terminate(query_id: &str) -> String {
    format!("TERMINATE {};", query_id)
}

/// `TERMINATE ALL;`
pub fn terminate_all() -> String {
    "TERMINATE ALL;".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowKind {
    Streams,
    Tables,
    Topics,
    Queries,
    Types,
}

impl fmt::Display for ShowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShowKind::Streams => "STREAMS",
            ShowKind::Tables => "TABLES",
            ShowKind::Topics => "TOPICS",
            ShowKind::Queries => "QUERIES",
            ShowKind::Types => "TYPES",
        })
    }
}

/// `SHOW <kind>;`
pub fn show(kind: ShowKind) -> String {
    format!("SHOW {};", kind)
}
