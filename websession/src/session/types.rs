use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

/// Address of a value inside a session.
///
/// `Plain` keys live in the generic scope; `Flash` and `Input` address the
/// matching sub-scope. A plain key that happens to contain a dot stays plain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionKey {
    Plain(String),
    Flash(String),
    Input(String),
}

impl SessionKey {
    pub fn flash(name: impl Into<String>) -> Self {
        Self::Flash(name.into())
    }

    pub fn input(name: impl Into<String>) -> Self {
        Self::Input(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Plain(name) | Self::Flash(name) | Self::Input(name) => name,
        }
    }
}

impl From<&str> for SessionKey {
    fn from(name: &str) -> Self {
        Self::Plain(name.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(name: String) -> Self {
        Self::Plain(name)
    }
}

impl From<&String> for SessionKey {
    fn from(name: &String) -> Self {
        Self::Plain(name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredToken {
    pub(crate) value: String,
    pub(crate) expires: DateTime<Utc>,
}

/// Everything persisted for one session. Empty scopes are left out of the blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct SessionData {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) values: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) flash: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) input: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) meta: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "VecDeque::is_empty")]
    pub(crate) tokens: VecDeque<StoredToken>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) expirations: BTreeMap<String, DateTime<Utc>>,
}

impl SessionData {
    pub(crate) fn scope(&self, key: &SessionKey) -> &BTreeMap<String, Value> {
        match key {
            SessionKey::Plain(_) => &self.values,
            SessionKey::Flash(_) => &self.flash,
            SessionKey::Input(_) => &self.input,
        }
    }

    pub(crate) fn scope_mut(&mut self, key: &SessionKey) -> &mut BTreeMap<String, Value> {
        match key {
            SessionKey::Plain(_) => &mut self.values,
            SessionKey::Flash(_) => &mut self.flash,
            SessionKey::Input(_) => &mut self.input,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.flash.is_empty()
            && self.input.is_empty()
            && self.meta.is_empty()
            && self.tokens.is_empty()
            && self.expirations.is_empty()
    }
}

/// What the response must do with the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieCommand {
    /// The client already holds the right identifier.
    Keep,
    /// Send the identifier to the client.
    Set(String),
    /// Tell the client to drop its cookie.
    Expire,
}
