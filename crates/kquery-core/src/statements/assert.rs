//! ASSERT TOPIC / ASSERT SCHEMA statements

use crate::error::CompilationError;
use crate::literal::quote_string;
use crate::window::KsqlDuration;

/// `ASSERT [NOT EXISTS] TOPIC '<name>' [WITH (…)] [TIMEOUT n UNIT];`
#[derive(Debug, Clone, PartialEq)]
pub struct AssertTopic {
    pub name: String,
    pub exists: bool,
    pub partitions: Option<u32>,
    pub replicas: Option<u16>,
    pub timeout: Option<KsqlDuration>,
}

impl AssertTopic {
    pub fn exists(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: true,
            partitions: None,
            replicas: None,
            timeout: None,
        }
    }

    pub fn not_exists(name: impl Into<String>) -> Self {
        Self {
            exists: false,
            ..Self::exists(name)
        }
    }

    pub fn partitions(mut self, partitions: u32) -> Self {
        self.partitions = Some(partitions);
        self
    }

    pub fn replicas(mut self, replicas: u16) -> Self {
        self.replicas = Some(replicas);
        self
    }

    pub fn timeout(mut self, timeout: KsqlDuration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build_ksql(&self) -> String {
        let mut text = format!(
            "ASSERT {}TOPIC {}",
            not_exists(self.exists),
            quote_string(&self.name)
        );

        let mut props = Vec::new();
        if let Some(partitions) = self.partitions {
            props.push(format!("PARTITIONS={}", partitions));
        }
        if let Some(replicas) = self.replicas {
            props.push(format!("REPLICAS={}", replicas));
        }
        if !props.is_empty() {
            text.push_str(&format!(" WITH ({})", props.join(", ")));
        }
        if let Some(timeout) = &self.timeout {
            text.push_str(&format!(" TIMEOUT {}", timeout));
        }
        text.push(';');
        text
    }
}

/// `ASSERT [NOT EXISTS] SCHEMA [SUBJECT '<s>'] [ID n] [TIMEOUT n UNIT];`
#[derive(Debug, Clone, PartialEq)]
pub struct AssertSchema {
    pub subject: Option<String>,
    pub id: Option<u32>,
    pub exists: bool,
    pub timeout: Option<KsqlDuration>,
}

impl AssertSchema {
    pub fn exists() -> Self {
        Self {
            subject: None,
            id: None,
            exists: true,
            timeout: None,
        }
    }

    pub fn not_exists() -> Self {
        Self {
            exists: false,
            ..Self::exists()
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn timeout(mut self, timeout: KsqlDuration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build_ksql(&self) -> Result<String, CompilationError> {
        if self.subject.is_none() && self.id.is_none() {
            return Err(CompilationError::InvalidStatement(
                "ASSERT SCHEMA needs a subject or an id".to_string(),
            ));
        }

        let mut text = format!("ASSERT {}SCHEMA", not_exists(self.exists));
        if let Some(subject) = &self.subject {
            text.push_str(&format!(" SUBJECT {}", quote_string(subject)));
        }
        if let Some(id) = self.id {
            text.push_str(&format!(" ID {}", id));
        }
        if let Some(timeout) = &self.timeout {
            text.push_str(&format!(" TIMEOUT {}", timeout));
        }
        text.push(';');
        Ok(text)
    }
}

fn not_exists(exists: bool) -> &'static str {
    if exists {
        ""
    } else {
        "NOT EXISTS "
    }
}
