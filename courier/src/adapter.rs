//! The delivery backend contract.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::address::Address;
use crate::error::{BoxError, DefinitionError, MailError};
use crate::message::Email;

/// What an adapter reports for one send: receipt metadata (message id,
/// provider response, ...) or its own error.
pub type DeliveryResult = Result<Value, BoxError>;

/// A delivery backend.
///
/// Implement this trait to send mail through SMTP, an HTTP provider, a test
/// sink, etc. The adapter receives fully normalized emails and the config the
/// [`Mailer`](crate::Mailer) was defined with.
///
/// ```ignore
/// struct Postmark { client: reqwest::Client }
///
/// #[async_trait]
/// impl Adapter for Postmark {
///     fn required_config(&self) -> &'static [&'static str] {
///         &["api_key"]
///     }
///
///     async fn deliver(&self, email: &Email<Address>, config: &AdapterConfig) -> DeliveryResult {
///         let response = self.client.post(URL).json(&payload(email)).send().await?;
///         Ok(response.json().await?)
///     }
/// }
/// ```
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Name used in log records.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Config keys that must be present when a mailer is defined.
    fn required_config(&self) -> &'static [&'static str] {
        &[]
    }

    /// Adapter-specific checks, run once when a mailer is defined.
    fn validate_config(&self, _config: &AdapterConfig) -> Result<(), DefinitionError> {
        Ok(())
    }

    /// Send `email` and wait for the transport to finish.
    ///
    /// Sends are not idempotent: delivering the same email twice may send it
    /// twice.
    async fn deliver(&self, email: &Email<Address>, config: &AdapterConfig) -> DeliveryResult;

    /// Start sending `email` and return without waiting for the transport.
    ///
    /// The default runs [`deliver`](Adapter::deliver) as a task on the
    /// current Tokio runtime. Adapters with their own worker threads can
    /// override this and complete a [`DeliveryHandle::channel`] instead.
    fn deliver_async(
        self: Arc<Self>,
        email: Email<Address>,
        config: Arc<AdapterConfig>,
    ) -> DeliveryHandle {
        DeliveryHandle::spawn(async move { self.deliver(&email, &config).await })
    }
}

/// Completion handle for an asynchronous delivery.
///
/// Awaiting it yields the adapter's result; dropping it detaches the delivery,
/// which keeps running. Failed async deliveries are logged at `warn` level
/// whether or not anyone awaits the handle.
#[must_use = "dropping the handle detaches the delivery; await it to observe failures"]
pub struct DeliveryHandle {
    id: Uuid,
    inner: Inner,
}

enum Inner {
    Task(JoinHandle<DeliveryResult>),
    Channel(oneshot::Receiver<DeliveryResult>),
    Failed(Option<MailError>),
}

impl DeliveryHandle {
    /// Run `future` as a task on the current Tokio runtime.
    ///
    /// Outside a runtime nothing is spawned and the handle resolves to
    /// [`MailError::NoRuntime`].
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = DeliveryResult> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(delivery_id = %id, "async delivery started outside a Tokio runtime");
                return Self {
                    id,
                    inner: Inner::Failed(Some(MailError::NoRuntime)),
                };
            }
        };

        let span = tracing::debug_span!("deliver_async", delivery_id = %id);
        let task = runtime.spawn(
            async move {
                let result = future.await;
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "async delivery failed");
                }
                result
            }
            .instrument(span),
        );

        Self {
            id,
            inner: Inner::Task(task),
        }
    }

    /// A handle completed through a channel, for adapters that run deliveries
    /// on their own threads. Dropping the sender without a result makes the
    /// handle resolve to [`MailError::Abandoned`].
    pub fn channel() -> (DeliverySender, Self) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        (
            DeliverySender { id, tx },
            Self {
                id,
                inner: Inner::Channel(rx),
            },
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Debug for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Future for DeliveryHandle {
    type Output = Result<Value, MailError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            Inner::Task(task) => Pin::new(task).poll(cx).map(|joined| match joined {
                Ok(result) => result.map_err(MailError::Transport),
                Err(e) => Err(MailError::Join(e)),
            }),
            Inner::Channel(rx) => Pin::new(rx).poll(cx).map(|received| match received {
                Ok(result) => result.map_err(MailError::Transport),
                Err(_) => Err(MailError::Abandoned),
            }),
            Inner::Failed(error) => {
                Poll::Ready(Err(error.take().unwrap_or(MailError::Abandoned)))
            }
        }
    }
}

/// Sending half of [`DeliveryHandle::channel`].
#[derive(Debug)]
pub struct DeliverySender {
    id: Uuid,
    tx: oneshot::Sender<DeliveryResult>,
}

impl DeliverySender {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn complete(self, result: DeliveryResult) {
        if let Err(e) = &result {
            tracing::warn!(delivery_id = %self.id, error = %e, "async delivery failed");
        }
        // The handle may already be gone; the result is logged above.
        let _ = self.tx.send(result);
    }
}

/// Adapter-specific settings (credentials, hosts, API keys).
///
/// Opaque to the mailer. `Debug` prints key names only so secrets stay out of
/// log output.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterConfig(Map<String, Value>);

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Parse a value that may be stored as a string (environment variables)
    /// or as a native JSON scalar (config files).
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, DefinitionError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = match self.0.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        raw.trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| DefinitionError::InvalidConfig {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("keys", &self.0.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl From<Map<String, Value>> for AdapterConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AdapterConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
