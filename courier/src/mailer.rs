//! Mailer definition and dispatch.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use crate::adapter::{Adapter, AdapterConfig, DeliveryHandle};
use crate::address::Address;
use crate::config::{AdapterRegistry, MailerSettings};
use crate::error::{DefinitionError, FormatError, MailError};
use crate::format::{Formatters, Role};
use crate::message::Email;
use crate::recipient::Recipient;

/// A named binding of one [`Adapter`] and its config.
///
/// Defined once at startup and shared by handle; clones are cheap and point at
/// the same adapter. The adapter and config never change after definition.
/// Concurrent deliveries share them read-only and may complete in any order.
///
/// ```ignore
/// let mailer = Mailer::builder("transactional")
///     .adapter(SmtpAdapter::new())
///     .config(AdapterConfig::new().with("host", "smtp.example.com"))
///     .build()?;
///
/// mailer.deliver(&email).await?;
/// let handle = mailer.deliver_async(&email)?;
/// ```
#[derive(Clone)]
pub struct Mailer {
    inner: Arc<MailerInner>,
}

struct MailerInner {
    name: String,
    adapter: Arc<dyn Adapter>,
    config: Arc<AdapterConfig>,
    formatters: Formatters,
}

impl Mailer {
    pub fn builder(name: impl Into<String>) -> MailerBuilder {
        MailerBuilder::new(name)
    }

    /// Define a mailer from a settings object, resolving the adapter by name.
    pub fn from_settings(
        name: impl Into<String>,
        settings: MailerSettings,
        registry: &AdapterRegistry,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let adapter_name = settings
            .adapter
            .filter(|adapter| !adapter.trim().is_empty())
            .ok_or_else(|| DefinitionError::MissingAdapter {
                mailer: name.clone(),
            })?;
        let adapter =
            registry
                .create(&adapter_name)
                .ok_or_else(|| DefinitionError::UnknownAdapter {
                    mailer: name.clone(),
                    adapter: adapter_name.clone(),
                })?;

        MailerBuilder::new(name)
            .shared_adapter(adapter)
            .config(settings.config)
            .build()
    }

    /// Define a mailer from `<APP>_<NAME>_*` environment variables.
    pub fn from_env(
        app: &str,
        name: &str,
        registry: &AdapterRegistry,
    ) -> Result<Self, DefinitionError> {
        Self::from_settings(name, MailerSettings::from_env(app, name)?, registry)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn adapter_name(&self) -> &'static str {
        self.inner.adapter.name()
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    pub fn formatters(&self) -> &Formatters {
        &self.inner.formatters
    }

    /// Normalize `email` with this mailer's formatters.
    pub fn normalize(&self, email: &Email) -> Result<Email<Address>, MailError> {
        normalize(email, &self.inner.formatters)
    }

    /// Normalize `email` and send it, waiting for the adapter to finish.
    ///
    /// Returns the adapter's receipt. Adapter failures come back as
    /// [`MailError::Transport`] holding the adapter's own error.
    pub async fn deliver(&self, email: &Email) -> Result<Value, MailError> {
        let email = self.prepare(email)?;
        let span = tracing::debug_span!(
            "deliver",
            mailer = %self.inner.name,
            adapter = self.inner.adapter.name()
        );

        self.inner
            .adapter
            .deliver(&email, &self.inner.config)
            .instrument(span)
            .await
            .map_err(MailError::Transport)
    }

    /// Normalize `email` and hand it to the adapter without waiting for the
    /// transport.
    ///
    /// Precondition failures are returned immediately. The handle can be
    /// awaited for the adapter's result or dropped to fire and forget.
    pub fn deliver_async(&self, email: &Email) -> Result<DeliveryHandle, MailError> {
        let email = self.prepare(email)?;
        let handle = self
            .inner
            .adapter
            .clone()
            .deliver_async(email, self.inner.config.clone());

        tracing::debug!(
            mailer = %self.inner.name,
            delivery_id = %handle.id(),
            "async delivery started"
        );

        Ok(handle)
    }

    fn prepare(&self, email: &Email) -> Result<Email<Address>, MailError> {
        match normalize(email, &self.inner.formatters) {
            Ok(email) => {
                tracing::debug!(
                    mailer = %self.inner.name,
                    adapter = self.inner.adapter.name(),
                    email = ?email,
                    "delivering email"
                );
                Ok(email)
            }
            Err(e) => {
                tracing::debug!(mailer = %self.inner.name, error = %e, "email rejected");
                Err(e)
            }
        }
    }
}

impl fmt::Debug for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailer")
            .field("name", &self.inner.name)
            .field("adapter", &self.inner.adapter.name())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Builder for [`Mailer`]. All checks run in [`build`](MailerBuilder::build).
pub struct MailerBuilder {
    name: String,
    adapter: Option<Arc<dyn Adapter>>,
    config: AdapterConfig,
    formatters: Formatters,
}

impl MailerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapter: None,
            config: AdapterConfig::default(),
            formatters: Formatters::default(),
        }
    }

    pub fn adapter<A: Adapter>(self, adapter: A) -> Self {
        self.shared_adapter(Arc::new(adapter))
    }

    pub fn shared_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// Formatters for [`Recipient::Opaque`] values.
    pub fn formatters(mut self, formatters: Formatters) -> Self {
        self.formatters = formatters;
        self
    }

    pub fn build(self) -> Result<Mailer, DefinitionError> {
        let adapter = self.adapter.ok_or_else(|| DefinitionError::MissingAdapter {
            mailer: self.name.clone(),
        })?;

        if let Some(key) = adapter
            .required_config()
            .iter()
            .find(|key| !self.config.contains_key(key))
        {
            return Err(DefinitionError::MissingConfig {
                mailer: self.name,
                key: key.to_string(),
            });
        }

        adapter.validate_config(&self.config)?;

        tracing::debug!(mailer = %self.name, adapter = adapter.name(), "mailer defined");

        Ok(Mailer {
            inner: Arc::new(MailerInner {
                name: self.name,
                adapter,
                config: Arc::new(self.config),
                formatters: self.formatters,
            }),
        })
    }
}

/// Resolve every address field of `email`, leaving the other fields as they
/// are.
///
/// `from` must be present and resolve to exactly one non-empty address;
/// otherwise this fails with [`MailError::EmptyFrom`] or
/// [`FormatError::NotSingle`]. `to`, `cc`, `bcc` and `reply_to` may resolve to
/// any number of addresses.
pub fn normalize(email: &Email, formatters: &Formatters) -> Result<Email<Address>, MailError> {
    let from = match &email.from {
        Some(from) => match formatters.format_one(from, Role::From) {
            Ok(from) if !from.is_empty() => from,
            Ok(_) | Err(FormatError::NotSingle { count: 0, .. }) => {
                return Err(MailError::EmptyFrom)
            }
            Err(e) => return Err(e.into()),
        },
        None => return Err(MailError::EmptyFrom),
    };

    Ok(Email {
        from: Some(from),
        to: format_all(formatters, &email.to, Role::To)?,
        cc: format_all(formatters, &email.cc, Role::Cc)?,
        bcc: format_all(formatters, &email.bcc, Role::Bcc)?,
        reply_to: format_all(formatters, &email.reply_to, Role::ReplyTo)?,
        subject: email.subject.clone(),
        html_body: email.html_body.clone(),
        text_body: email.text_body.clone(),
        headers: email.headers.clone(),
        assigns: email.assigns.clone(),
        private: email.private.clone(),
        tags: email.tags.clone(),
    })
}

fn format_all(
    formatters: &Formatters,
    values: &[Recipient],
    role: Role,
) -> Result<Vec<Address>, FormatError> {
    let mut addresses = Vec::with_capacity(values.len());
    for value in values {
        addresses.extend(formatters.format(value, role)?);
    }
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LoggerAdapter, MemoryAdapter};

    #[test]
    fn normalizes_raw_strings() {
        let email = Email::new()
            .from("me@example.com")
            .to("foo@example.com")
            .subject("Welcome!!!")
            .html_body("<strong>WELCOME</strong>");

        let normalized = normalize(&email, &Formatters::new()).unwrap();

        assert_eq!(normalized.from_value(), Some(&Address::bare("me@example.com")));
        assert_eq!(normalized.to_values(), [Address::bare("foo@example.com")]);
        assert!(normalized.cc_values().is_empty());
        assert_eq!(normalized.subject_line(), "Welcome!!!");
        assert_eq!(normalized.html(), Some("<strong>WELCOME</strong>"));
    }

    #[test]
    fn bare_value_and_one_element_list_agree() {
        let formatters = Formatters::new();
        let single = Email::new().from("me@x.com").to("a@b.com").cc("c@d.com");
        let listed = Email::new()
            .from("me@x.com")
            .to(vec!["a@b.com"])
            .cc(["c@d.com"]);

        let single = normalize(&single, &formatters).unwrap();
        let listed = normalize(&listed, &formatters).unwrap();

        assert_eq!(single.to_values(), listed.to_values());
        assert_eq!(single.cc_values(), listed.cc_values());
    }

    #[test]
    fn missing_from_is_a_precondition_error() {
        let err = normalize(&Email::new().to("a@b.com"), &Formatters::new()).unwrap_err();
        assert!(matches!(err, MailError::EmptyFrom));
        assert!(err.is_precondition());
    }

    #[test]
    fn blank_from_is_rejected() {
        for from in [Recipient::from(""), Recipient::list(Vec::<&str>::new())] {
            let err = normalize(&Email::new().from(from), &Formatters::new()).unwrap_err();
            assert!(matches!(err, MailError::EmptyFrom));
        }
    }

    #[test]
    fn several_from_addresses_are_rejected() {
        let email = Email::new().from(["a@b.com", "c@d.com"]);
        let err = normalize(&email, &Formatters::new()).unwrap_err();
        assert!(matches!(
            err,
            MailError::Format(FormatError::NotSingle { role: Role::From, count: 2 })
        ));
    }

    #[test]
    fn non_address_fields_pass_through() {
        let email = Email::new()
            .from("me@x.com")
            .put_header("X-Campaign", "spring")
            .assign("name", "John")
            .put_private("sandbox", true)
            .tag("welcome")
            .text_body("hi");

        let normalized = normalize(&email, &Formatters::new()).unwrap();

        assert_eq!(normalized.headers(), email.headers());
        assert_eq!(normalized.assigns(), email.assigns());
        assert_eq!(normalized.private(), email.private());
        assert_eq!(normalized.tags(), email.tags());
        assert_eq!(normalized.text(), Some("hi"));
    }

    #[test]
    fn builder_without_adapter_fails() {
        let err = Mailer::builder("transactional").build().unwrap_err();
        assert!(matches!(err, DefinitionError::MissingAdapter { mailer } if mailer == "transactional"));
    }

    #[test]
    fn settings_without_adapter_fail() {
        let settings = MailerSettings::default().with("host", "smtp.example.com");
        let err = Mailer::from_settings("transactional", settings, &AdapterRegistry::default())
            .unwrap_err();
        assert!(matches!(err, DefinitionError::MissingAdapter { .. }));
    }

    #[test]
    fn settings_with_unknown_adapter_fail() {
        let settings = MailerSettings::default().adapter("carrier-pigeon");
        let err = Mailer::from_settings("transactional", settings, &AdapterRegistry::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::UnknownAdapter { adapter, .. } if adapter == "carrier-pigeon"
        ));
    }

    #[test]
    fn invalid_adapter_config_fails_at_definition() {
        let err = Mailer::builder("ops")
            .adapter(LoggerAdapter::new())
            .config(AdapterConfig::new().with("log_full_email", "sometimes"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidConfig { key, .. } if key == "log_full_email"));
    }

    #[test]
    fn settings_resolve_adapter_and_config() {
        let settings = MailerSettings::default()
            .adapter("memory")
            .with("api_key", "secret");
        let mailer =
            Mailer::from_settings("transactional", settings, &AdapterRegistry::default()).unwrap();

        assert_eq!(mailer.name(), "transactional");
        assert_eq!(mailer.adapter_name(), "memory");
        assert_eq!(mailer.config().get_str("api_key"), Some("secret"));
        assert!(!format!("{mailer:?}").contains("secret"));
    }

    #[tokio::test]
    async fn deliver_hands_normalized_email_to_adapter() {
        let memory = MemoryAdapter::new();
        let mailer = Mailer::builder("test").adapter(memory.clone()).build().unwrap();

        let receipt = mailer
            .deliver(&Email::new().from("me@x.com").to(("Foo", "foo@x.com")))
            .await
            .unwrap();

        assert_eq!(receipt["id"], 1);
        let sent = memory.sent().await;
        assert_eq!(sent[0].to_values(), [Address::new("Foo", "foo@x.com")]);
    }
}
