//! Address normalization.
//!
//! A [`Recipient`] is resolved by shape:
//!
//! - [`Recipient::Address`] is returned unchanged.
//! - [`Recipient::Raw`] becomes an [`Address`] with an empty display name. The
//!   string is not parsed; `"Name <addr>"` is kept verbatim as the address.
//! - [`Recipient::Formattable`] calls [`FormatEmailAddress::format_email_address`]
//!   and normalizes whatever it returns.
//! - [`Recipient::Opaque`] looks up the formatter registered for its type in
//!   [`Formatters`] and fails with [`FormatError::NoFormatter`] if there is none.
//! - [`Recipient::List`] normalizes each element and flattens the result.
//!
//! Formatting has no side effects: the same value and role always give the
//! same addresses.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::FormatError;
use crate::recipient::Recipient;

const MAX_DEPTH: usize = 16;

/// The email field a value is being formatted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    From,
    To,
    Cc,
    Bcc,
    ReplyTo,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From => write!(f, "from"),
            Self::To => write!(f, "to"),
            Self::Cc => write!(f, "cc"),
            Self::Bcc => write!(f, "bcc"),
            Self::ReplyTo => write!(f, "reply_to"),
        }
    }
}

/// Passed to every formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatContext {
    role: Role,
}

impl FormatContext {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

/// Capability for domain types that can describe themselves as addresses.
///
/// The returned [`Recipient`] may itself be a list or another formattable
/// value; it is normalized recursively. Implementations must be pure.
///
/// ```ignore
/// struct User { name: String, email: String, work_email: String }
///
/// impl FormatEmailAddress for User {
///     fn format_email_address(&self, ctx: &FormatContext) -> Recipient {
///         match ctx.role() {
///             Role::From => (self.name.as_str(), self.work_email.as_str()).into(),
///             _ => (self.name.as_str(), self.email.as_str()).into(),
///         }
///     }
/// }
/// ```
///
/// With the `derive` feature, `#[derive(FormatEmailAddress)]` generates this
/// for structs that hold the name and address in fields.
pub trait FormatEmailAddress: Send + Sync + 'static {
    fn format_email_address(&self, ctx: &FormatContext) -> Recipient;
}

impl FormatEmailAddress for Address {
    fn format_email_address(&self, _ctx: &FormatContext) -> Recipient {
        Recipient::Address(self.clone())
    }
}

impl FormatEmailAddress for String {
    fn format_email_address(&self, _ctx: &FormatContext) -> Recipient {
        Recipient::Raw(self.clone())
    }
}

type FormatFn = dyn Fn(&(dyn Any + Send + Sync), &FormatContext) -> Option<Recipient> + Send + Sync;

/// Registry of formatters for [`Recipient::Opaque`] values, keyed by type.
///
/// Types can be registered without touching their definition, which is how
/// foreign types take part in normalization.
///
/// ```ignore
/// let formatters = Formatters::new()
///     .register::<User>()
///     .register_fn(|list: &MailingList, _ctx| Recipient::list(list.members.clone()));
/// ```
#[derive(Clone, Default)]
pub struct Formatters {
    entries: HashMap<TypeId, Arc<FormatFn>>,
}

impl Formatters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type that implements [`FormatEmailAddress`].
    pub fn register<T: FormatEmailAddress>(self) -> Self {
        self.register_fn(|value: &T, ctx| value.format_email_address(ctx))
    }

    /// Register a formatting function for `T`.
    pub fn register_fn<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &FormatContext) -> Recipient + Send + Sync + 'static,
    {
        let entry: Arc<FormatFn> = Arc::new(
            move |value: &(dyn Any + Send + Sync), ctx: &FormatContext| {
                value.downcast_ref::<T>().map(|value| f(value, ctx))
            },
        );
        self.entries.insert(TypeId::of::<T>(), entry);
        self
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Normalize `value` into zero or more addresses.
    pub fn format(&self, value: &Recipient, role: Role) -> Result<Vec<Address>, FormatError> {
        let ctx = FormatContext::new(role);
        let mut out = Vec::new();
        self.format_into(value, &ctx, 0, &mut out)?;
        Ok(out)
    }

    /// Normalize `value`, requiring exactly one address.
    pub fn format_one(&self, value: &Recipient, role: Role) -> Result<Address, FormatError> {
        let mut addresses = self.format(value, role)?;
        match addresses.len() {
            1 => Ok(addresses.remove(0)),
            count => Err(FormatError::NotSingle { role, count }),
        }
    }

    fn format_into(
        &self,
        value: &Recipient,
        ctx: &FormatContext,
        depth: usize,
        out: &mut Vec<Address>,
    ) -> Result<(), FormatError> {
        if depth > MAX_DEPTH {
            return Err(FormatError::TooDeep { role: ctx.role() });
        }

        match value {
            Recipient::Address(address) => out.push(address.clone()),
            Recipient::Raw(raw) => out.push(Address::bare(raw.as_str())),
            Recipient::Formattable(formattable) => {
                let formatted = formattable.format_email_address(ctx);
                self.format_into(&formatted, ctx, depth + 1, out)?;
            }
            Recipient::Opaque(opaque) => {
                let formatted = self
                    .entries
                    .get(&opaque.type_id())
                    .and_then(|f| f(opaque.value(), ctx))
                    .ok_or(FormatError::NoFormatter {
                        type_name: opaque.type_name(),
                        role: ctx.role(),
                    })?;
                self.format_into(&formatted, ctx, depth + 1, out)?;
            }
            Recipient::List(values) => {
                for value in values {
                    self.format_into(value, ctx, depth, out)?;
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Formatters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatters")
            .field("registered", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User {
        name: &'static str,
        email: &'static str,
        work_email: &'static str,
    }

    impl FormatEmailAddress for User {
        fn format_email_address(&self, ctx: &FormatContext) -> Recipient {
            match ctx.role() {
                Role::From => (self.name, self.work_email).into(),
                _ => (self.name, self.email).into(),
            }
        }
    }

    struct MailingList {
        members: Vec<&'static str>,
    }

    struct Looping;

    impl FormatEmailAddress for Looping {
        fn format_email_address(&self, _ctx: &FormatContext) -> Recipient {
            Recipient::formattable(Looping)
        }
    }

    fn john() -> User {
        User {
            name: "John",
            email: "j@x.com",
            work_email: "john@work.com",
        }
    }

    #[test]
    fn raw_string_has_empty_name() {
        let addresses = Formatters::new()
            .format(&"a@b.com".into(), Role::To)
            .unwrap();
        assert_eq!(addresses, vec![Address::new("", "a@b.com")]);
    }

    #[test]
    fn raw_string_is_not_parsed() {
        let address = Formatters::new()
            .format_one(&"John <j@x.com>".into(), Role::To)
            .unwrap();
        assert_eq!(address.name(), "");
        assert_eq!(address.address(), "John <j@x.com>");
    }

    #[test]
    fn address_is_returned_unchanged() {
        let formatters = Formatters::new();
        let address = Address::new("John", "j@x.com");
        let once = formatters.format_one(&address.clone().into(), Role::Cc).unwrap();
        let twice = formatters.format_one(&once.clone().into(), Role::Cc).unwrap();
        assert_eq!(once, address);
        assert_eq!(twice, once);
    }

    #[test]
    fn formattable_sees_role() {
        let formatters = Formatters::new();
        let user = Recipient::formattable(john());

        assert_eq!(
            formatters.format_one(&user, Role::From).unwrap(),
            Address::new("John", "john@work.com")
        );
        assert_eq!(
            formatters.format_one(&user, Role::To).unwrap(),
            Address::new("John", "j@x.com")
        );
    }

    #[test]
    fn opaque_uses_registry() {
        let formatters = Formatters::new().register::<User>();
        let address = formatters
            .format_one(&Recipient::opaque(john()), Role::Bcc)
            .unwrap();
        assert_eq!(address, Address::new("John", "j@x.com"));
    }

    #[test]
    fn opaque_without_formatter_fails() {
        let err = Formatters::new()
            .format(&Recipient::opaque(john()), Role::To)
            .unwrap_err();
        assert!(matches!(
            err,
            FormatError::NoFormatter { role: Role::To, type_name } if type_name.ends_with("User")
        ));
    }

    #[test]
    fn list_expansion_is_flattened() {
        let formatters = Formatters::new()
            .register_fn(|list: &MailingList, _ctx| Recipient::list(list.members.clone()));
        let list = MailingList {
            members: vec!["a@x.com", "b@x.com"],
        };

        let addresses = formatters
            .format(
                &Recipient::list([Recipient::from("first@x.com"), Recipient::opaque(list)]),
                Role::To,
            )
            .unwrap();

        assert_eq!(
            addresses,
            vec![
                Address::bare("first@x.com"),
                Address::bare("a@x.com"),
                Address::bare("b@x.com"),
            ]
        );
    }

    #[test]
    fn format_one_rejects_lists() {
        let err = Formatters::new()
            .format_one(&Recipient::from(["a@x.com", "b@x.com"]), Role::From)
            .unwrap_err();
        assert_eq!(
            err,
            FormatError::NotSingle {
                role: Role::From,
                count: 2
            }
        );
    }

    #[test]
    fn self_referencing_formatter_stops() {
        let err = Formatters::new()
            .format(&Recipient::formattable(Looping), Role::To)
            .unwrap_err();
        assert_eq!(err, FormatError::TooDeep { role: Role::To });
    }
}
