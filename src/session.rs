//! Session: the settings, schema and type registry a resolution runs against.

use std::sync::Arc;

use crate::command::CommandSpec;
use crate::converter::Converter;
use crate::descriptor::TypeCache;
use crate::error::ResolveError;
use crate::keys::KeyMatcher;
use crate::metadata::Metadata;
use crate::resolver::ResolvedCommand;
use crate::types::Settings;

/// Shared, cheaply cloneable context for resolution and conversion.
#[derive(Debug, Clone)]
pub struct Session {
    settings: Arc<Settings>,
    metadata: Arc<dyn Metadata>,
    types: Arc<TypeCache>,
}

impl Session {
    /// Session with its own, empty type registry.
    pub fn new(settings: Settings, metadata: Arc<dyn Metadata>) -> Self {
        Self {
            settings: Arc::new(settings),
            metadata,
            types: Arc::new(TypeCache::new()),
        }
    }

    /// Share a type registry with other sessions.
    pub fn with_type_cache(mut self, types: Arc<TypeCache>) -> Self {
        self.types = types;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metadata(&self) -> &dyn Metadata {
        self.metadata.as_ref()
    }

    pub fn types(&self) -> &Arc<TypeCache> {
        &self.types
    }

    pub fn key_matcher(&self) -> KeyMatcher<'_> {
        KeyMatcher::new(
            self.metadata.as_ref(),
            self.settings.name_matcher.as_ref(),
            self.settings.support_nulls_as_key_property_values,
        )
    }

    pub fn converter(&self) -> Converter<'_> {
        Converter::new(self)
    }

    /// Resolve a command against this session's schema.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` if a collection, derived type, link or function
    /// named by the command cannot be found.
    pub fn resolve(&self, spec: &CommandSpec) -> Result<ResolvedCommand, ResolveError> {
        ResolvedCommand::resolve(spec, self)
    }
}
