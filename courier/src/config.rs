//! Mailer configuration resolution.
//!
//! A mailer is defined from a named settings object holding an `adapter` name
//! plus any adapter-specific keys. Settings come from the environment
//! (`MY_APP_MAILER_ADAPTER=smtp`, `MY_APP_MAILER_HOST=...`) or from any
//! [`config::Config`] source, such as a table in a TOML file:
//!
//! ```toml
//! [mailers.transactional]
//! adapter = "smtp"
//! host = "smtp.example.com"
//! port = 2525
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

pub use config::ConfigError;

use crate::adapter::{Adapter, AdapterConfig};
use crate::adapters::{LoggerAdapter, MemoryAdapter};
use crate::error::DefinitionError;

/// The named settings object a [`Mailer`](crate::Mailer) is defined from.
///
/// `adapter` is optional here so that a missing key is reported as
/// [`DefinitionError::MissingAdapter`] rather than a generic parse error.
/// Every other key ends up in `config`, untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailerSettings {
    pub adapter: Option<String>,
    #[serde(flatten)]
    pub config: AdapterConfig,
}

impl MailerSettings {
    /// Read `<APP>_<MAILER>_*` environment variables, after loading `.env`
    /// if one exists.
    ///
    /// `from_env("my_app", "mailer")` reads `MY_APP_MAILER_ADAPTER`,
    /// `MY_APP_MAILER_HOST`, etc. Keys are lowercased.
    pub fn from_env(app: &str, mailer: &str) -> Result<Self, DefinitionError> {
        dotenvy::dotenv().ok();
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(&env_prefix(app, mailer)))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Read the table stored under `key` in an already built config.
    ///
    /// A missing table yields empty settings, which then fail with
    /// [`DefinitionError::MissingAdapter`] when the mailer is defined.
    pub fn from_source(source: &config::Config, key: &str) -> Result<Self, DefinitionError> {
        match source.get::<Self>(key) {
            Ok(settings) => Ok(settings),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config = self.config.with(key, value);
        self
    }
}

fn env_prefix(app: &str, mailer: &str) -> String {
    format!("{app}_{mailer}").to_uppercase()
}

type AdapterFactory = dyn Fn() -> Arc<dyn Adapter> + Send + Sync;

/// Maps adapter names used in settings to adapter constructors.
///
/// [`AdapterRegistry::default`] knows `memory`, `logger` and, with the `smtp`
/// feature, `smtp`. Each mailer gets a fresh adapter instance.
///
/// A `memory` mailer resolved from the default registry therefore has a
/// private mailbox that no other code can read. To inspect delivered emails,
/// register a [`MemoryAdapter`] you keep a clone of:
///
/// ```ignore
/// let outbox = MemoryAdapter::new();
/// let registry = AdapterRegistry::default()
///     .register_instance("memory", Arc::new(outbox.clone()));
/// let mailer = Mailer::from_env("my_app", "mailer", &registry)?;
/// // ...
/// let sent = outbox.sent().await;
/// ```
#[derive(Clone)]
pub struct AdapterRegistry {
    factories: HashMap<String, Arc<AdapterFactory>>,
}

impl AdapterRegistry {
    /// A registry with no adapters.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register an adapter constructor under `name`, replacing any previous one.
    pub fn register<A, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        A: Adapter,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let factory: Arc<AdapterFactory> = Arc::new(move || Arc::new(factory()) as Arc<dyn Adapter>);
        self.factories.insert(name.into(), factory);
        self
    }

    /// Register one shared adapter instance under `name`.
    pub fn register_instance(mut self, name: impl Into<String>, adapter: Arc<dyn Adapter>) -> Self {
        let factory: Arc<AdapterFactory> = Arc::new(move || adapter.clone());
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.factories.get(name).map(|factory| factory())
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        let registry = Self::empty()
            .register("memory", MemoryAdapter::new)
            .register("logger", LoggerAdapter::new);

        #[cfg(feature = "smtp")]
        let registry = registry.register("smtp", crate::adapters::SmtpAdapter::new);

        registry
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn env_prefix_is_uppercased() {
        assert_eq!(env_prefix("my_app", "mailer"), "MY_APP_MAILER");
    }

    #[test]
    fn settings_from_toml_table() {
        let source = config::Config::builder()
            .add_source(File::from_str(
                r#"
                [mailers.transactional]
                adapter = "smtp"
                host = "smtp.example.com"
                port = 2525
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let settings = MailerSettings::from_source(&source, "mailers.transactional").unwrap();

        assert_eq!(settings.adapter.as_deref(), Some("smtp"));
        assert_eq!(settings.config.get_str("host"), Some("smtp.example.com"));
        assert_eq!(settings.config.get_parsed::<u16>("port").unwrap(), Some(2525));
        assert!(!settings.config.contains_key("adapter"));
    }

    #[test]
    fn missing_table_gives_empty_settings() {
        let source = config::Config::builder().build().unwrap();
        let settings = MailerSettings::from_source(&source, "mailers.none").unwrap();
        assert!(settings.adapter.is_none());
        assert!(settings.config.is_empty());
    }

    #[test]
    fn default_registry_knows_bundled_adapters() {
        let registry = AdapterRegistry::default();
        assert!(registry.contains("memory"));
        assert!(registry.contains("logger"));
        assert_eq!(registry.create("logger").map(|a| a.name()), Some("logger"));
        assert!(registry.create("carrier-pigeon").is_none());
    }

    #[test]
    fn default_memory_adapter_is_per_mailer() {
        let registry = AdapterRegistry::default();
        let first = registry.create("memory").unwrap();
        let second = registry.create("memory").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn shared_instance_is_reused() {
        let memory: Arc<dyn Adapter> = Arc::new(MemoryAdapter::new());
        let registry = AdapterRegistry::empty().register_instance("shared", memory.clone());
        let created = registry.create("shared").unwrap();
        assert!(Arc::ptr_eq(&memory, &created));
    }
}
