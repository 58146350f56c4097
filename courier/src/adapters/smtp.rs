//! SMTP adapter built on lettre.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::{HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::adapter::{Adapter, AdapterConfig, DeliveryResult};
use crate::address::Address;
use crate::error::DefinitionError;
use crate::message::{Email, EmailBody};

const DEFAULT_PORT: u16 = 587;
const DEFAULT_TIMEOUT: u64 = 10;

#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("email has no from address")]
    MissingFrom,

    #[error("invalid header name: {0}")]
    InvalidHeader(String),

    #[error(transparent)]
    Build(#[from] lettre::error::Error),

    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error(transparent)]
    Config(#[from] DefinitionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Tls {
    StartTls,
    Wrapper,
    None,
}

/// Connection settings read from the mailer's [`AdapterConfig`].
///
/// | Key | Required | Description |
/// |-----|----------|-------------|
/// | `host` | Yes | SMTP server hostname |
/// | `port` | No | Port (default: 587) |
/// | `username` | No | Username for authentication |
/// | `password` | No | Password for authentication |
/// | `tls` | No | `starttls` (default), `tls`, or `none` |
/// | `timeout` | No | Connection timeout in seconds (default: 10) |
#[derive(Clone, PartialEq, Eq, Hash)]
struct SmtpSettings {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    tls: Tls,
    timeout: u64,
}

impl SmtpSettings {
    fn from_config(config: &AdapterConfig) -> Result<Self, DefinitionError> {
        let host = config
            .get_str("host")
            .filter(|host| !host.is_empty())
            .ok_or_else(|| DefinitionError::InvalidConfig {
                key: "host".to_string(),
                reason: "expected a hostname".to_string(),
            })?
            .to_string();

        let tls = match config.get_str("tls").unwrap_or("starttls") {
            "starttls" => Tls::StartTls,
            "tls" => Tls::Wrapper,
            "none" => Tls::None,
            other => {
                return Err(DefinitionError::InvalidConfig {
                    key: "tls".to_string(),
                    reason: format!("expected `starttls`, `tls` or `none`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            host,
            port: config.get_parsed("port")?.unwrap_or(DEFAULT_PORT),
            username: config.get_str("username").map(str::to_string),
            password: config.get_str("password").map(str::to_string),
            tls,
            timeout: config.get_parsed("timeout")?.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SmtpError> {
        let mut builder = match self.tls {
            Tls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host),
            Tls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)?,
            Tls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?,
        };

        builder = builder
            .port(self.port)
            .timeout(Some(Duration::from_secs(self.timeout)));

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

/// SMTP [`Adapter`] using lettre's Tokio transport.
///
/// One transport is created per distinct connection config, on first
/// delivery, and reused afterwards. A single adapter instance can therefore
/// back several mailers pointing at different relays. Custom headers are
/// forwarded verbatim; tags and private data are not.
#[derive(Clone, Default)]
pub struct SmtpAdapter {
    transports: Arc<Mutex<HashMap<SmtpSettings, Arc<AsyncSmtpTransport<Tokio1Executor>>>>>,
}

impl SmtpAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transport(
        &self,
        config: &AdapterConfig,
    ) -> Result<Arc<AsyncSmtpTransport<Tokio1Executor>>, SmtpError> {
        let settings = SmtpSettings::from_config(config)?;
        let mut transports = self.transports.lock().await;
        if let Some(transport) = transports.get(&settings) {
            return Ok(transport.clone());
        }

        tracing::debug!(host = %settings.host, port = settings.port, "creating smtp transport");
        let transport = Arc::new(settings.transport()?);
        transports.insert(settings, transport.clone());
        Ok(transport)
    }
}

fn mailbox(address: &Address) -> Result<Mailbox, SmtpError> {
    let email = address
        .address()
        .parse()
        .map_err(|_| SmtpError::InvalidAddress(address.address().to_string()))?;
    let name = address.has_name().then(|| address.name().to_string());
    Ok(Mailbox::new(name, email))
}

/// Build a lettre Message from a normalized email.
fn build_message(email: &Email<Address>) -> Result<Message, SmtpError> {
    let from = email.from_value().ok_or(SmtpError::MissingFrom)?;
    let mut builder = Message::builder().from(mailbox(from)?);

    for to in email.to_values() {
        builder = builder.to(mailbox(to)?);
    }

    for cc in email.cc_values() {
        builder = builder.cc(mailbox(cc)?);
    }

    for bcc in email.bcc_values() {
        builder = builder.bcc(mailbox(bcc)?);
    }

    for reply_to in email.reply_to_values() {
        builder = builder.reply_to(mailbox(reply_to)?);
    }

    builder = builder.subject(email.subject_line());

    for (name, value) in email.headers() {
        let header_name = HeaderName::new_from_ascii(name.clone())
            .map_err(|_| SmtpError::InvalidHeader(name.clone()))?;
        builder = builder.raw_header(HeaderValue::new(header_name, value.clone()));
    }

    let message = match email.body() {
        Some(EmailBody::Text(text)) => builder.body(text.to_string())?,
        Some(EmailBody::Html(html)) => builder.singlepart(SinglePart::html(html.to_string()))?,
        Some(EmailBody::Multipart { text, html }) => builder.multipart(
            MultiPart::alternative_plain_html(text.to_string(), html.to_string()),
        )?,
        None => builder.body(String::new())?,
    };

    Ok(message)
}

#[async_trait]
impl Adapter for SmtpAdapter {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn required_config(&self) -> &'static [&'static str] {
        &["host"]
    }

    fn validate_config(&self, config: &AdapterConfig) -> Result<(), DefinitionError> {
        SmtpSettings::from_config(config).map(|_| ())
    }

    async fn deliver(&self, email: &Email<Address>, config: &AdapterConfig) -> DeliveryResult {
        let message = build_message(email)?;
        let response = self
            .transport(config)
            .await?
            .send(message)
            .await
            .map_err(SmtpError::from)?;

        Ok(json!({
            "code": response.code().to_string(),
            "message": response.message().collect::<Vec<_>>(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdapterConfig {
        AdapterConfig::new().with("host", "smtp.example.com")
    }

    fn email() -> Email<Address> {
        Email {
            from: Some(Address::new("Me", "me@example.com")),
            to: vec![Address::bare("foo@example.com")],
            cc: vec![Address::new("Ops", "ops@example.com")],
            ..Email::default()
        }
        .subject("Welcome!!!")
        .html_body("<strong>WELCOME</strong>")
    }

    #[test]
    fn settings_defaults() {
        let settings = SmtpSettings::from_config(&config()).unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.tls, Tls::StartTls);
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
        assert_eq!(settings.username, None);
    }

    #[test]
    fn settings_from_env_strings() {
        let config = config()
            .with("port", "2525")
            .with("tls", "none")
            .with("username", "user")
            .with("password", "secret");
        let settings = SmtpSettings::from_config(&config).unwrap();

        assert_eq!(settings.port, 2525);
        assert_eq!(settings.tls, Tls::None);
        assert_eq!(settings.username.as_deref(), Some("user"));
    }

    #[test]
    fn rejects_unknown_tls_mode() {
        let err = SmtpAdapter::new()
            .validate_config(&config().with("tls", "ssl3"))
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidConfig { key, .. } if key == "tls"));
    }

    #[test]
    fn builds_message_with_display_names() {
        let message = build_message(&email()).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(formatted.contains("From: Me <me@example.com>"));
        assert!(formatted.contains("To: foo@example.com"));
        assert!(formatted.contains("Cc: Ops <ops@example.com>"));
        assert!(formatted.contains("Subject: Welcome!!!"));
    }

    #[test]
    fn forwards_custom_headers() {
        let message = build_message(&email().put_header("X-Campaign", "spring")).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(formatted.contains("X-Campaign: spring"));
    }

    #[test]
    fn rejects_invalid_header_name() {
        let email = email().put_header("Bad Header", "x");
        assert!(matches!(
            build_message(&email),
            Err(SmtpError::InvalidHeader(name)) if name == "Bad Header"
        ));
    }

    #[tokio::test]
    async fn transports_are_cached_per_config() {
        let adapter = SmtpAdapter::new();
        let relay_a = AdapterConfig::new()
            .with("host", "relay-a.example.com")
            .with("port", 2525)
            .with("tls", "none");
        let relay_b = AdapterConfig::new()
            .with("host", "relay-b.example.com")
            .with("port", 2626)
            .with("tls", "none");

        let a = adapter.transport(&relay_a).await.unwrap();
        let b = adapter.transport(&relay_b).await.unwrap();
        let a_again = adapter.clone().transport(&relay_a).await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &a_again));
        assert_eq!(adapter.transports.lock().await.len(), 2);
    }

    #[test]
    fn rejects_unparseable_address() {
        let email = Email {
            from: Some(Address::bare("not an address")),
            ..Email::default()
        };
        assert!(matches!(
            build_message(&email),
            Err(SmtpError::InvalidAddress(addr)) if addr == "not an address"
        ));
    }
}
