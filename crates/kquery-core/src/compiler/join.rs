//! Source bindings and join aliases
//!
//! Joined queries qualify every column with a short alias. Aliases are
//! derived from the first letter of each source name, in join order, with a
//! numeric suffix when a letter is already taken.

use std::sync::Arc;

use crate::error::CompilationError;
use crate::model::ModelMetadata;
use crate::query::QuerySource;
use crate::shape::EntityShape;

#[derive(Debug, Clone)]
pub struct SourceBinding {
    pub name: String,
    pub binding: String,
    pub alias: String,
    pub shape: Option<Arc<EntityShape>>,
}

impl SourceBinding {
    pub fn column_name<'a>(&'a self, member: &'a str) -> &'a str {
        match &self.shape {
            Some(shape) => shape.column_name(member),
            None => member,
        }
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.shape
            .as_ref()
            .map(|s| s.field(member).is_some())
            .unwrap_or(false)
    }
}

/// All sources visible to one query, root first.
#[derive(Debug, Clone)]
pub struct SourceScope {
    sources: Vec<SourceBinding>,
}

impl SourceScope {
    pub fn new(root: &QuerySource, model: &ModelMetadata) -> Result<Self, CompilationError> {
        let mut scope = Self {
            sources: Vec::new(),
        };
        scope.add(root, model)?;
        Ok(scope)
    }

    pub fn add(
        &mut self,
        source: &QuerySource,
        model: &ModelMetadata,
    ) -> Result<&SourceBinding, CompilationError> {
        if self.lookup(&source.binding).is_some() {
            return Err(CompilationError::InvalidChain(format!(
                "binding '{}' is used by more than one source",
                source.binding
            )));
        }

        let shape = match &source.shape {
            Some(shape) => Some(Arc::new(model.apply(shape)?)),
            None => None,
        };

        let alias = self.next_alias(&source.name);
        self.sources.push(SourceBinding {
            name: source.name.clone(),
            binding: source.binding.clone(),
            alias,
            shape,
        });
        Ok(&self.sources[self.sources.len() - 1])
    }

    fn next_alias(&self, name: &str) -> String {
        let letter = name
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('S');

        let base = letter.to_string();
        if !self.sources.iter().any(|s| s.alias == base) {
            return base;
        }

        (2..)
            .map(|n| format!("{}{}", letter, n))
            .find(|candidate| !self.sources.iter().any(|s| &s.alias == candidate))
            .unwrap_or(base)
    }

    pub fn root(&self) -> &SourceBinding {
        &self.sources[0]
    }

    pub fn is_joined(&self) -> bool {
        self.sources.len() > 1
    }

    pub fn lookup(&self, binding: &str) -> Option<&SourceBinding> {
        self.sources.iter().find(|s| s.binding == binding)
    }

    /// First source whose shape declares `member`.
    pub fn owner_of(&self, member: &str) -> Option<&SourceBinding> {
        self.sources.iter().find(|s| s.has_member(member))
    }

    pub fn sources(&self) -> &[SourceBinding] {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_from_first_letters() {
        let model = ModelMetadata::default();
        let mut scope = SourceScope::new(&QuerySource::stream("Movies"), &model).unwrap();
        scope.add(&QuerySource::table("Lead_Actor"), &model).unwrap();

        let aliases: Vec<_> = scope.sources().iter().map(|s| s.alias.as_str()).collect();
        assert_eq!(aliases, vec!["M", "L"]);
        assert!(scope.is_joined());
    }

    #[test]
    fn test_alias_collision_gets_suffix() {
        let model = ModelMetadata::default();
        let mut scope = SourceScope::new(&QuerySource::stream("Orders"), &model).unwrap();
        scope.add(&QuerySource::table("Owners"), &model).unwrap();
        scope.add(&QuerySource::table("Offers"), &model).unwrap();

        let aliases: Vec<_> = scope.sources().iter().map(|s| s.alias.as_str()).collect();
        assert_eq!(aliases, vec!["O", "O2", "O3"]);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let model = ModelMetadata::default();
        let mut scope = SourceScope::new(&QuerySource::stream("Movies"), &model).unwrap();
        let err = scope
            .add(&QuerySource::table("Other").with_binding("movies"), &model)
            .unwrap_err();
        assert!(matches!(err, CompilationError::InvalidChain(_)));
    }
}
