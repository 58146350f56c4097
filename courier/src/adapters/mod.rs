//! Bundled [`Adapter`](crate::Adapter) implementations.
//!
//! | Adapter | Registry name | Description |
//! |---------|---------------|-------------|
//! | [`MemoryAdapter`] | `memory` | Keeps delivered emails in memory |
//! | [`LoggerAdapter`] | `logger` | Logs emails without sending them |
//! | [`SmtpAdapter`] | `smtp` | SMTP via lettre (feature `smtp`) |

mod logger;
mod memory;
#[cfg(feature = "smtp")]
mod smtp;

pub use logger::LoggerAdapter;
pub use memory::MemoryAdapter;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpAdapter, SmtpError};
