//! Caller-supplied sender/recipient values, before normalization.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::address::Address;
use crate::format::FormatEmailAddress;

/// Anything a caller may put in `from`, `to`, `cc`, `bcc` or `reply_to`.
///
/// Values are stored as given and only resolved to [`Address`]es when the
/// email is delivered, so building an email never fails.
///
/// ```ignore
/// let email = Email::new()
///     .from(("Support", "support@example.com"))
///     .to("user@example.com")
///     .cc(vec![Address::new("Ops", "ops@example.com")])
///     .bcc(Recipient::formattable(team));
/// ```
#[derive(Clone)]
pub enum Recipient {
    /// Already canonical.
    Address(Address),
    /// A literal address; the display name is left empty.
    Raw(String),
    /// A domain value that knows how to format itself.
    Formattable(Arc<dyn FormatEmailAddress>),
    /// A domain value resolved through the [`Formatters`](crate::Formatters) registry.
    Opaque(Opaque),
    /// Several values; normalized element-wise and flattened.
    List(Vec<Recipient>),
}

impl Recipient {
    pub fn formattable<T: FormatEmailAddress>(value: T) -> Self {
        Self::Formattable(Arc::new(value))
    }

    /// Wrap a value whose formatter is looked up by type at delivery time.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Opaque(Opaque {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        })
    }

    pub fn list<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Recipient>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Self::Address(address) => Some(address),
            _ => None,
        }
    }

    /// Unwrap one level of list; a bare value becomes a one-element vector.
    pub(crate) fn into_vec(self) -> Vec<Recipient> {
        match self {
            Self::List(values) => values,
            other => vec![other],
        }
    }
}

/// A type-erased domain value plus the identity used to find its formatter.
#[derive(Clone)]
pub struct Opaque {
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn value(&self) -> &(dyn Any + Send + Sync) {
        self.value.as_ref()
    }
}

impl fmt::Debug for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => f.debug_tuple("Address").field(address).finish(),
            Self::Raw(raw) => f.debug_tuple("Raw").field(raw).finish(),
            Self::Formattable(_) => f.write_str("Formattable(..)"),
            Self::Opaque(opaque) => write!(f, "Opaque({})", opaque.type_name),
            Self::List(values) => f.debug_list().entries(values).finish(),
        }
    }
}

impl From<Address> for Recipient {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl From<&Address> for Recipient {
    fn from(address: &Address) -> Self {
        Self::Address(address.clone())
    }
}

impl From<&str> for Recipient {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for Recipient {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

impl From<&String> for Recipient {
    fn from(raw: &String) -> Self {
        Self::Raw(raw.clone())
    }
}

/// `(display name, address)`
impl<N, A> From<(N, A)> for Recipient
where
    N: Into<String>,
    A: Into<String>,
{
    fn from((name, address): (N, A)) -> Self {
        Self::Address(Address::new(name, address))
    }
}

impl<T: Into<Recipient>> From<Vec<T>> for Recipient {
    fn from(values: Vec<T>) -> Self {
        Self::list(values)
    }
}

impl<T: Into<Recipient>, const N: usize> From<[T; N]> for Recipient {
    fn from(values: [T; N]) -> Self {
        Self::list(values)
    }
}
