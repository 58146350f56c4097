use async_trait::async_trait;
use serde_json::json;

use crate::adapter::{Adapter, AdapterConfig, DeliveryResult};
use crate::address::Address;
use crate::error::DefinitionError;
use crate::message::Email;

/// [`Adapter`] that writes each email to the log instead of sending it.
///
/// Logs sender, recipients and subject at `info`. Set the `log_full_email`
/// config key to `true` to log the whole email.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerAdapter;

impl LoggerAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn log_full_email(config: &AdapterConfig) -> Result<bool, DefinitionError> {
    Ok(config.get_parsed("log_full_email")?.unwrap_or(false))
}

#[async_trait]
impl Adapter for LoggerAdapter {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn validate_config(&self, config: &AdapterConfig) -> Result<(), DefinitionError> {
        log_full_email(config).map(|_| ())
    }

    async fn deliver(&self, email: &Email<Address>, config: &AdapterConfig) -> DeliveryResult {
        if log_full_email(config)? {
            tracing::info!(?email, "email logged");
        } else {
            let to: Vec<String> = email.to_values().iter().map(ToString::to_string).collect();
            tracing::info!(
                from = %email.from_value().map(ToString::to_string).unwrap_or_default(),
                to = ?to,
                subject = email.subject_line(),
                "email logged"
            );
        }

        Ok(json!({ "logged": true }))
    }
}
