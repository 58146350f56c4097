//! Email message value and builder operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;
use crate::recipient::Recipient;

/// The body content of an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailBody<'a> {
    /// Plain text only.
    Text(&'a str),
    /// HTML only.
    Html(&'a str),
    /// Both plain text and HTML (multipart/alternative).
    Multipart { text: &'a str, html: &'a str },
}

/// An outbound email, independent of any transport.
///
/// Every builder operation consumes the email and returns a new one, so a
/// value is never modified after it has been handed out. Nothing is
/// validated while building; addresses are resolved when the email is
/// delivered, which turns an `Email<Recipient>` into the `Email<Address>`
/// adapters receive.
///
/// ```ignore
/// let email = Email::new()
///     .from("me@example.com")
///     .to("foo@example.com")
///     .subject("Welcome!!!")
///     .html_body("<strong>WELCOME</strong>");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email<R = Recipient> {
    pub(crate) from: Option<R>,
    #[serde(default)]
    pub(crate) to: Vec<R>,
    #[serde(default)]
    pub(crate) cc: Vec<R>,
    #[serde(default)]
    pub(crate) bcc: Vec<R>,
    #[serde(default)]
    pub(crate) reply_to: Vec<R>,
    #[serde(default)]
    pub(crate) subject: String,
    #[serde(default)]
    pub(crate) html_body: Option<String>,
    #[serde(default)]
    pub(crate) text_body: Option<String>,
    #[serde(default)]
    pub(crate) headers: HashMap<String, String>,
    /// Template data for whatever renders the bodies. Never read here.
    #[serde(default)]
    pub(crate) assigns: HashMap<String, Value>,
    /// Adapter-specific settings such as provider options.
    #[serde(default)]
    pub(crate) private: HashMap<String, Value>,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
}

impl<R> Default for Email<R> {
    fn default() -> Self {
        Self {
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            subject: String::new(),
            html_body: None,
            text_body: None,
            headers: HashMap::new(),
            assigns: HashMap::new(),
            private: HashMap::new(),
            tags: Vec::new(),
        }
    }
}

impl Email {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender.
    pub fn from(mut self, from: impl Into<Recipient>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Add primary recipients. Accepts a single value or a list.
    pub fn to(mut self, to: impl Into<Recipient>) -> Self {
        self.to.extend(to.into().into_vec());
        self
    }

    /// Replace all primary recipients.
    pub fn put_to(mut self, to: impl Into<Recipient>) -> Self {
        self.to = to.into().into_vec();
        self
    }

    /// Add carbon copy recipients.
    pub fn cc(mut self, cc: impl Into<Recipient>) -> Self {
        self.cc.extend(cc.into().into_vec());
        self
    }

    pub fn put_cc(mut self, cc: impl Into<Recipient>) -> Self {
        self.cc = cc.into().into_vec();
        self
    }

    /// Add blind carbon copy recipients.
    pub fn bcc(mut self, bcc: impl Into<Recipient>) -> Self {
        self.bcc.extend(bcc.into().into_vec());
        self
    }

    pub fn put_bcc(mut self, bcc: impl Into<Recipient>) -> Self {
        self.bcc = bcc.into().into_vec();
        self
    }

    /// Add reply-to addresses.
    pub fn reply_to(mut self, reply_to: impl Into<Recipient>) -> Self {
        self.reply_to.extend(reply_to.into().into_vec());
        self
    }
}

impl<R> Email<R> {
    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set plain text body content.
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text_body = Some(text.into());
        self
    }

    /// Set HTML body content.
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html_body = Some(html.into());
        self
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn put_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach template data.
    pub fn assign(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assigns.insert(key.into(), value.into());
        self
    }

    /// Attach adapter-specific data.
    pub fn put_private(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.private.insert(key.into(), value.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn from_value(&self) -> Option<&R> {
        self.from.as_ref()
    }

    pub fn to_values(&self) -> &[R] {
        &self.to
    }

    pub fn cc_values(&self) -> &[R] {
        &self.cc
    }

    pub fn bcc_values(&self) -> &[R] {
        &self.bcc
    }

    pub fn reply_to_values(&self) -> &[R] {
        &self.reply_to
    }

    pub fn subject_line(&self) -> &str {
        &self.subject
    }

    pub fn html(&self) -> Option<&str> {
        self.html_body.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text_body.as_deref()
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn assigns(&self) -> &HashMap<String, Value> {
        &self.assigns
    }

    pub fn private(&self) -> &HashMap<String, Value> {
        &self.private
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The bodies that are set, if any.
    pub fn body(&self) -> Option<EmailBody<'_>> {
        match (self.text_body.as_deref(), self.html_body.as_deref()) {
            (Some(text), Some(html)) => Some(EmailBody::Multipart { text, html }),
            (Some(text), None) => Some(EmailBody::Text(text)),
            (None, Some(html)) => Some(EmailBody::Html(html)),
            (None, None) => None,
        }
    }
}

impl Email<Address> {
    /// Every recipient across `to`, `cc` and `bcc`.
    pub fn recipients(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }
}
