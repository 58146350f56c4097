extern crate proc_macro;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod format_email_address;

/// Derive macro for turning a struct into an email address
///
/// Derive `FormatEmailAddress` on a struct that holds a display name and an
/// address in its fields. The generated impl formats to the same address for
/// every role, and a `From<T> for courier::Recipient` impl is generated so the
/// struct can be passed straight to `Email::to`, `Email::from`, etc.
///
/// ### Field selection
///
/// `#[email_address(...)]` on the struct accepts
/// - `address = "field"`: the field holding the address
/// - `name = "field"`: the field holding the display name (optional)
///
/// Without the attribute, the address is read from a field named `email` (or
/// `address`) and the name from a field named `name` when there is one.
/// Both fields are converted with `ToString`.
///
/// ### Example
///
/// ```rust,ignore
/// #[derive(Clone, courier::FormatEmailAddress)]
/// #[email_address(name = "display_name", address = "login")]
/// struct Account {
///     display_name: String,
///     login: String,
///     password_hash: String,
/// }
///
/// // Defaults: `name` and `email`
/// #[derive(Clone, courier::FormatEmailAddress)]
/// struct User {
///     name: String,
///     email: String,
/// }
///
/// let email = Email::new()
///     .from(account)
///     .to(vec![user_a, user_b]);
/// ```
#[proc_macro_derive(FormatEmailAddress, attributes(email_address))]
pub fn format_email_address_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    format_email_address::format_email_address_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
