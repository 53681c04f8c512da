use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

use crate::session::errors::SessionError;
use crate::session::types::{CookieCommand, SessionData, SessionKey, StoredToken};
use crate::utils::{gen_random_string, redact, time_after};

/// Number of CSRF tokens a session retains; issuing one more evicts the oldest.
pub(crate) const MAX_TOKENS: usize = 5;

/// Bytes of entropy behind a session identifier or a CSRF token.
pub(crate) const RANDOM_BYTES: usize = 32;

/// Per-request handle on one client's session.
///
/// Obtained from [`SessionManager::start`](super::SessionManager::start) and
/// handed back to [`SessionManager::save`](super::SessionManager::save) once the
/// response is ready. Every accessor restarts a destroyed handle first, so a
/// read after [`Session::destroy`] sees an empty session under a new identifier.
#[derive(Debug)]
pub struct Session {
    pub(super) id: String,
    pub(super) incoming_id: Option<String>,
    pub(super) data: SessionData,
    pub(super) started: bool,
    pub(super) regenerated: bool,
    pub(super) destroyed: bool,
    pub(super) dirty: bool,
    pub(super) persisted: bool,
    pub(super) discard_ids: Vec<String>,
    token_lifetime: u64,
}

impl Session {
    pub(super) fn new(
        id: String,
        incoming_id: Option<String>,
        data: SessionData,
        persisted: bool,
        token_lifetime: u64,
    ) -> Self {
        Self {
            id,
            incoming_id,
            data,
            started: true,
            regenerated: false,
            destroyed: false,
            dirty: false,
            persisted,
            discard_ids: Vec::new(),
            token_lifetime,
        }
    }

    fn ensure_started(&mut self) {
        if !self.started {
            tracing::debug!("Restarting session as {}", redact(&self.id));
            self.started = true;
        }
    }

    /// Restarts the handle if it was destroyed. No-op otherwise.
    pub fn start(&mut self) {
        self.ensure_started();
    }

    pub fn is_session(&self) -> bool {
        self.started
    }

    pub fn id(&self) -> Result<&str, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        Ok(&self.id)
    }

    pub fn set(&mut self, key: impl Into<SessionKey>, value: impl Into<Value>) {
        self.ensure_started();
        let key = key.into();
        if let SessionKey::Plain(name) = &key {
            self.data.expirations.remove(name);
        }
        self.data
            .scope_mut(&key)
            .insert(key.name().to_string(), value.into());
        self.dirty = true;
    }

    /// Stores `value` and, for plain keys, schedules its removal `ttl` seconds from now.
    /// Lifetimes beyond about a thousand years are capped.
    pub fn set_with_ttl(&mut self, key: impl Into<SessionKey>, value: impl Into<Value>, ttl: u64) {
        let key = key.into();
        self.set(key.clone(), value);
        if let SessionKey::Plain(name) = key {
            let deadline = time_after(Utc::now(), ttl);
            self.data.expirations.insert(name, deadline);
        }
    }

    pub fn set_multiple<I, K, V>(&mut self, values: I, ttl: Option<u64>)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<SessionKey>,
        V: Into<Value>,
    {
        for (key, value) in values {
            match ttl {
                Some(ttl) => self.set_with_ttl(key, value, ttl),
                None => self.set(key, value),
            }
        }
    }

    pub fn get(&mut self, key: impl Into<SessionKey>) -> Option<&Value> {
        self.ensure_started();
        let key = key.into();
        self.data.scope(&key).get(key.name())
    }

    pub fn get_or(&mut self, key: impl Into<SessionKey>, default: impl Into<Value>) -> Value {
        self.get(key).cloned().unwrap_or_else(|| default.into())
    }

    /// Deserializes the stored value into `T`.
    pub fn get_as<T: DeserializeOwned>(
        &mut self,
        key: impl Into<SessionKey>,
    ) -> Result<Option<T>, SessionError> {
        self.get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(SessionError::from)
    }

    /// Values for every key; missing keys map to `default`. Keys of different
    /// scopes sharing a name stay separate entries.
    pub fn get_multiple<I, K>(&mut self, keys: I, default: Value) -> BTreeMap<SessionKey, Value>
    where
        I: IntoIterator<Item = K>,
        K: Into<SessionKey>,
    {
        keys.into_iter()
            .map(|key| {
                let key = key.into();
                let value = self.get_or(key.clone(), default.clone());
                (key, value)
            })
            .collect()
    }

    pub fn has(&mut self, key: impl Into<SessionKey>) -> bool {
        self.get(key).is_some()
    }

    /// True when every key is present.
    pub fn has_multiple<I, K>(&mut self, keys: I) -> bool
    where
        I: IntoIterator<Item = K>,
        K: Into<SessionKey>,
    {
        keys.into_iter().all(|key| self.has(key))
    }

    pub fn delete(&mut self, key: impl Into<SessionKey>) -> Option<Value> {
        self.ensure_started();
        let key = key.into();
        if let SessionKey::Plain(name) = &key {
            self.data.expirations.remove(name);
        }
        let removed = self.data.scope_mut(&key).remove(key.name());
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn delete_multiple<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<SessionKey>,
    {
        for key in keys {
            self.delete(key);
        }
    }

    /// Empties every scope, tokens included. The identifier is kept.
    pub fn clear(&mut self) {
        self.ensure_started();
        if !self.data.is_empty() {
            self.data = SessionData::default();
            self.dirty = true;
        }
    }

    /// The generic scope. Flash, input, meta and token data are not included.
    pub fn all(&mut self) -> &BTreeMap<String, Value> {
        self.ensure_started();
        &self.data.values
    }

    pub fn pull(&mut self, key: impl Into<SessionKey>) -> Option<Value> {
        self.delete(key)
    }

    /// Stores `value` only when the key is absent. Returns whether it was stored.
    pub fn set_if_not_exists(&mut self, key: impl Into<SessionKey>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.has(key.clone()) {
            return false;
        }
        self.set(key, value);
        true
    }

    /// Adds `amount` to an integer value, treating a missing key as 0.
    /// An existing expiration is left in place.
    pub fn increment(&mut self, key: impl Into<SessionKey>, amount: i64) -> Result<i64, SessionError> {
        self.ensure_started();
        let key = key.into();
        let current = match self.data.scope(&key).get(key.name()) {
            None => 0,
            Some(value) => value.as_i64().ok_or_else(|| {
                SessionError::Serde(format!("Value for '{}' is not an integer", key.name()))
            })?,
        };
        let next = current.saturating_add(amount);
        self.data
            .scope_mut(&key)
            .insert(key.name().to_string(), Value::from(next));
        self.dirty = true;
        Ok(next)
    }

    pub fn decrement(&mut self, key: impl Into<SessionKey>, amount: i64) -> Result<i64, SessionError> {
        self.increment(key, amount.saturating_neg())
    }

    pub fn set_input(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.set(SessionKey::Input(key.into()), value);
    }

    pub fn get_input(&mut self, key: impl Into<String>, default: impl Into<Value>) -> Value {
        self.get_or(SessionKey::Input(key.into()), default)
    }

    pub fn clear_input(&mut self) {
        self.ensure_started();
        if !self.data.input.is_empty() {
            self.data.input.clear();
            self.dirty = true;
        }
    }

    pub fn set_flash(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.set(SessionKey::Flash(key.into()), value);
    }

    pub fn flash(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.set_flash(key, value);
    }

    /// Returns the flash message and removes it.
    pub fn get_flash(&mut self, key: impl Into<String>) -> Option<Value> {
        self.delete(SessionKey::Flash(key.into()))
    }

    pub fn is_flash(&mut self, key: impl Into<String>) -> bool {
        self.has(SessionKey::Flash(key.into()))
    }

    pub fn clear_flash(&mut self) {
        self.ensure_started();
        if !self.data.flash.is_empty() {
            self.data.flash.clear();
            self.dirty = true;
        }
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.ensure_started();
        self.data.meta.insert(key.into(), value.into());
        self.dirty = true;
    }

    pub fn get_meta(&mut self, key: &str, default: impl Into<Value>) -> Value {
        self.ensure_started();
        self.data
            .meta
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.into())
    }

    pub fn has_meta(&mut self, key: &str) -> bool {
        self.ensure_started();
        self.data.meta.contains_key(key)
    }

    pub fn delete_meta(&mut self, key: &str) -> Option<Value> {
        self.ensure_started();
        let removed = self.data.meta.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Issues a new CSRF token and returns its raw value.
    pub fn token(&mut self) -> Result<String, SessionError> {
        self.ensure_started();
        let value = gen_random_string(RANDOM_BYTES)?;
        let expires = time_after(Utc::now(), self.token_lifetime);

        self.data.tokens.retain(|t| t.value != value);
        while self.data.tokens.len() >= MAX_TOKENS {
            self.data.tokens.pop_front();
        }
        self.data.tokens.push_back(StoredToken {
            value: value.clone(),
            expires,
        });
        self.dirty = true;

        tracing::debug!("Issued CSRF token {}", redact(&value));
        Ok(value)
    }

    /// Consumes the matching unexpired token. Every stored entry is compared in
    /// constant time regardless of where the match is.
    pub fn validate_token(&mut self, candidate: &str) -> bool {
        self.ensure_started();
        let now = Utc::now();
        let mut matched = None;
        for (index, token) in self.data.tokens.iter().enumerate() {
            let equal: bool = token.value.as_bytes().ct_eq(candidate.as_bytes()).into();
            if equal && token.expires > now && matched.is_none() {
                matched = Some(index);
            }
        }

        match matched {
            Some(index) => {
                self.data.tokens.remove(index);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Drops expired tokens and returns how many were removed.
    pub fn prune_expired_tokens(&mut self) -> usize {
        self.ensure_started();
        let now = Utc::now();
        let before = self.data.tokens.len();
        self.data.tokens.retain(|t| t.expires > now);
        let removed = before - self.data.tokens.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Removes every plain key whose deadline has passed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .data
            .expirations
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.data.expirations.remove(key);
            self.data.values.remove(key);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "Swept expired session keys");
            self.dirty = true;
        }
        expired.len()
    }

    /// Moves the session to a new identifier. Only the first call in a request
    /// has an effect. With `destroy`, the blob under the old identifier is
    /// removed when the session is saved.
    pub fn regenerate(&mut self, destroy: bool) -> Result<(), SessionError> {
        self.ensure_started();
        if self.regenerated {
            return Ok(());
        }
        let next = gen_random_string(RANDOM_BYTES)?;
        let previous = std::mem::replace(&mut self.id, next);
        if destroy {
            self.discard_ids.push(previous);
        }
        self.regenerated = true;
        self.dirty = true;
        Ok(())
    }

    /// Ends the session: all scopes are emptied, the stored blob is removed at
    /// save time and the client is told to drop its cookie.
    pub fn destroy(&mut self) -> Result<(), SessionError> {
        if !self.started {
            return Ok(());
        }
        let next = gen_random_string(RANDOM_BYTES)?;
        let previous = std::mem::replace(&mut self.id, next);
        tracing::debug!("Destroying session {}", redact(&previous));

        self.discard_ids.push(previous);
        self.data = SessionData::default();
        self.started = false;
        self.regenerated = false;
        self.destroyed = true;
        self.dirty = false;
        self.persisted = false;
        Ok(())
    }

    pub(super) fn needs_write(&self) -> bool {
        self.started && (self.dirty || self.persisted)
    }

    pub fn cookie_command(&self) -> CookieCommand {
        if self.started && self.dirty && self.incoming_id.as_deref() != Some(self.id.as_str()) {
            CookieCommand::Set(self.id.clone())
        } else if self.destroyed && self.incoming_id.is_some() && !self.needs_write() {
            CookieCommand::Expire
        } else {
            CookieCommand::Keep
        }
    }
}
