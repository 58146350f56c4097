//! Compose outbound email once, deliver it through a swappable adapter.
//!
//! # Quick Start
//!
//! ```ignore
//! // 1. Define a mailer once, at startup
//! let mailer = Mailer::from_env("my_app", "mailer", &AdapterRegistry::default())?;
//!
//! // 2. Build an email; this never fails
//! let email = Email::new()
//!     .from(("My App", "noreply@example.com"))
//!     .to("user@example.com")
//!     .subject("Welcome!")
//!     .text_body("Thanks for signing up.");
//!
//! // 3. Send and wait for the adapter
//! mailer.deliver(&email).await?;
//!
//! // 4. Or start the send and carry on
//! let handle = mailer.deliver_async(&email)?;
//! ```
//!
//! # Environment Variables
//!
//! [`Mailer::from_env`] with `("my_app", "mailer")` reads:
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `MY_APP_MAILER_ADAPTER` | Yes | `smtp`, `logger`, `memory` or a name registered in [`AdapterRegistry`] |
//! | `MY_APP_MAILER_*` | No | Passed to the adapter as config, e.g. `MY_APP_MAILER_HOST` becomes `host` |
//!
//! # Recipients
//!
//! `from`, `to`, `cc`, `bcc` and `reply_to` accept anything convertible into a
//! [`Recipient`]: raw strings, [`Address`]es, `(name, address)` pairs, lists,
//! and domain types implementing [`FormatEmailAddress`] (derivable with the
//! `derive` feature) or registered in [`Formatters`].

pub mod adapter;
pub mod adapters;
pub mod address;
pub mod config;
pub mod error;
pub mod format;
pub mod mailer;
pub mod message;
pub mod recipient;

pub use adapter::{Adapter, AdapterConfig, DeliveryHandle, DeliveryResult, DeliverySender};
pub use address::Address;
pub use config::{AdapterRegistry, MailerSettings};
pub use error::{BoxError, DefinitionError, FormatError, MailError};
pub use format::{FormatContext, FormatEmailAddress, Formatters, Role};
pub use mailer::{normalize, Mailer, MailerBuilder};
pub use message::{Email, EmailBody};
pub use recipient::Recipient;

#[cfg(feature = "derive")]
pub use courier_macros::FormatEmailAddress;

pub use async_trait::async_trait;
