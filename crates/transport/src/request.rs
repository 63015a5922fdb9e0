//! Request construction.
//!
//! A [`RequestBuilder`] accumulates a command name, ordered positional
//! arguments, named options, attachments and headers, then freezes them into
//! a [`Request`]. Setters never perform I/O.
//!
//! `build` consumes the builder, so a setter cannot be called on a frozen
//! request:
//!
//! ```compile_fail
//! use transport::RequestBuilder;
//!
//! let builder = RequestBuilder::new("pin/add");
//! let request = builder.build();
//! let builder = builder.arg("QmFoo"); // use of moved value
//! ```

use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, HeaderValue};
use protocol::{ApiOptions, OptionValue};

use crate::Attachment;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Accumulates one command invocation.
#[derive(Debug)]
#[must_use = "a request builder does nothing until built and sent"]
pub struct RequestBuilder {
    command: String,
    args: Vec<String>,
    options: BTreeMap<String, OptionValue>,
    defaults: BTreeMap<String, OptionValue>,
    attachments: Vec<Attachment>,
    headers: HeaderMap,
}

impl RequestBuilder {
    /// Starts a request for `command` (e.g. `"pin/add"`).
    pub fn new(command: impl Into<String>) -> Self {
        // Every reply is JSON, with output channels merged into one stream.
        let defaults = BTreeMap::from([
            ("encoding".to_string(), OptionValue::from("json")),
            ("stream-channels".to_string(), OptionValue::Bool(true)),
        ]);
        Self {
            command: command.into(),
            args: Vec::new(),
            options: BTreeMap::new(),
            defaults,
            attachments: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Starts a request that also carries the client-wide `defaults`.
    pub fn with_defaults(command: impl Into<String>, defaults: &ApiOptions) -> Self {
        let mut builder = Self::new(command);
        builder.defaults.extend(defaults.to_options());
        builder
    }

    /// Appends one positional argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends several positional arguments, in order.
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Sets an option, replacing any earlier value for the same name.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Sets an option only when `value` is `Some`.
    pub fn option_if<V: Into<OptionValue>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.option(name, value),
            None => self,
        }
    }

    /// Adds one payload stream. Parts are sent in the order they are added.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets a transport header, replacing any earlier value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Freezes the accumulated state.
    ///
    /// Defaults are applied here, only for names the caller did not set.
    pub fn build(self) -> Request {
        let mut options = self.options;
        for (name, value) in self.defaults {
            options.entry(name).or_insert(value);
        }
        Request {
            command: self.command,
            args: self.args,
            options,
            attachments: self.attachments,
            headers: self.headers,
        }
    }
}

// ---------------------------------------------------------------------------
// Frozen request
// ---------------------------------------------------------------------------

/// An immutable, ready-to-send command invocation.
#[derive(Debug)]
pub struct Request {
    command: String,
    args: Vec<String>,
    options: BTreeMap<String, OptionValue>,
    attachments: Vec<Attachment>,
    headers: HeaderMap,
}

impl Request {
    /// The command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Positional arguments in call order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// All options, defaults included.
    pub fn options(&self) -> &BTreeMap<String, OptionValue> {
        &self.options
    }

    /// Looks up one option.
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// Attachments in the order they were added.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Header overrides.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the `(key, value)` query pairs: every argument under `arg`, in
    /// order, followed by every option.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.args
            .iter()
            .map(|arg| (protocol::ARGUMENT_KEY.to_string(), arg.clone()))
            .chain(
                self.options
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_query_value())),
            )
            .collect()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<(String, String)>, Vec<Attachment>, HeaderMap) {
        let query = self.query_pairs();
        (self.command, query, self.attachments, self.headers)
    }
}
