use crate::config::{ConfigError, Settings};
use std::collections::BTreeMap;
use std::sync::Arc;

type Factory<T> = Arc<dyn Fn(&Settings) -> Result<Arc<T>, ConfigError> + Send + Sync>;

/// Backend constructors keyed by the string used in [`Settings`].
pub struct BackendRegistry<T: ?Sized> {
    kind: &'static str,
    factories: BTreeMap<String, Factory<T>>,
}

impl<T: ?Sized> BackendRegistry<T> {
    /// `kind` names the backend family in error messages, e.g. `"state"`.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Settings) -> Result<Arc<T>, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(factory));
        self
    }

    #[must_use]
    pub fn with<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Settings) -> Result<Arc<T>, ConfigError> + Send + Sync + 'static,
    {
        self.register(key, factory);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Instantiate the backend registered under `key`.
    pub fn build(&self, key: &str, settings: &Settings) -> Result<Arc<T>, ConfigError> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| ConfigError::UnknownBackend {
                kind: self.kind,
                key: key.to_string(),
            })?;
        factory(settings)
    }

    /// Like [`BackendRegistry::build`], with `None` meaning "not configured".
    pub fn build_optional(
        &self,
        key: Option<&str>,
        settings: &Settings,
    ) -> Result<Option<Arc<T>>, ConfigError> {
        key.map(|key| self.build(key, settings)).transpose()
    }
}

impl<T: ?Sized> std::fmt::Debug for BackendRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kind", &self.kind)
            .field("keys", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
