use hookline_sdk::objects::{RegistrationRequest, RegistrationResponse, Signal};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::utils::headers::{Headers, header_text, set_default_header, set_header};
use crate::utils::truncate::truncate;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";

/// Prefix shown instead of a hidden token.
const TOKEN_MASK: &str = "********";
/// Trailing characters of a hidden token left visible.
const TOKEN_VISIBLE_CHARS: usize = 5;

/// A stored webhook registration.
///
/// `auth_token` always holds plaintext; stores encrypt it at their boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub id: i64,
    pub name: String,
    pub signal: Signal,
    pub type_ref: String,
    pub endpoint: String,
    pub headers: Map<String, Value>,
    pub auth_token: String,
    pub enabled: bool,
    pub keep_last_response: bool,
    pub created: OffsetDateTime,
    pub updated: OffsetDateTime,
    pub last_response: String,
    pub last_success: Option<OffsetDateTime>,
    pub last_failure: Option<OffsetDateTime>,
}

/// Writable fields of a registration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRegistration {
    pub name: String,
    pub signal: Signal,
    pub type_ref: String,
    pub endpoint: String,
    /// Unchecked; validation requires an object.
    pub headers: Value,
    pub auth_token: String,
    pub enabled: bool,
    pub keep_last_response: bool,
}

impl Registration {
    /// Build a registration with fresh timestamps and no outcome history.
    pub fn from_new(id: i64, new: NewRegistration, now: OffsetDateTime) -> Self {
        Self {
            id,
            name: new.name,
            signal: new.signal,
            type_ref: new.type_ref,
            endpoint: new.endpoint,
            headers: header_map(new.headers),
            auth_token: new.auth_token,
            enabled: new.enabled,
            keep_last_response: new.keep_last_response,
            created: now,
            updated: now,
            last_response: String::new(),
            last_success: None,
            last_failure: None,
        }
    }

    /// Replace the writable fields, leaving outcome history alone.
    pub fn apply(&mut self, new: NewRegistration, now: OffsetDateTime) {
        self.name = new.name;
        self.signal = new.signal;
        self.type_ref = new.type_ref;
        self.endpoint = new.endpoint;
        self.headers = header_map(new.headers);
        self.auth_token = new.auth_token;
        self.enabled = new.enabled;
        self.keep_last_response = new.keep_last_response;
        self.updated = now;
    }

    /// Headers this registration sends on its own.
    ///
    /// Registration headers come first; `Content-Type` defaults to JSON and
    /// the auth token becomes `Authorization` only when no such header is
    /// present.
    pub fn default_headers(&self) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in &self.headers {
            set_header(&mut headers, name, header_text(value));
        }
        set_default_header(&mut headers, CONTENT_TYPE, "application/json");
        if !self.auth_token.is_empty() {
            set_default_header(&mut headers, AUTHORIZATION, self.auth_token.clone());
        }
        headers
    }

    /// Write [`Self::default_headers`] over `base`, replacing any header
    /// of the same name.
    pub fn outbound_headers(&self, mut base: Headers) -> Headers {
        for (name, value) in self.default_headers() {
            set_header(&mut base, &name, value);
        }
        base
    }

    /// Record a 2xx response.
    pub fn record_success(&mut self, now: OffsetDateTime, body: &str, limit: usize) {
        self.last_success = Some(now);
        self.keep_response(body, limit);
    }

    /// Record a non-2xx response. `body` is `None` for transport failures.
    pub fn record_failure(&mut self, now: OffsetDateTime, body: Option<&str>, limit: usize) {
        self.last_failure = Some(now);
        if let Some(body) = body {
            self.keep_response(body, limit);
        }
    }

    fn keep_response(&mut self, body: &str, limit: usize) {
        if self.keep_last_response {
            self.last_response = truncate(body, limit);
        }
    }

    pub fn to_response(&self, hide_token: bool) -> RegistrationResponse {
        RegistrationResponse {
            id: self.id,
            name: self.name.clone(),
            signal: self.signal,
            type_ref: self.type_ref.clone(),
            endpoint: self.endpoint.clone(),
            headers: self.headers.clone(),
            auth_token: if hide_token {
                mask_token(&self.auth_token)
            } else {
                self.auth_token.clone()
            },
            enabled: self.enabled,
            keep_last_response: self.keep_last_response,
            created: self.created,
            updated: self.updated,
            last_response: self.last_response.clone(),
            last_success: self.last_success,
            last_failure: self.last_failure,
        }
    }
}

impl NewRegistration {
    /// When tokens are hidden, a blank or still-masked token keeps the
    /// stored one.
    pub fn keep_hidden_token(&mut self, stored: &Registration, hide_token: bool) {
        if hide_token
            && (self.auth_token.is_empty() || self.auth_token == mask_token(&stored.auth_token))
        {
            self.auth_token = stored.auth_token.clone();
        }
    }
}

impl From<RegistrationRequest> for NewRegistration {
    fn from(request: RegistrationRequest) -> Self {
        Self {
            name: request.name,
            signal: request.signal,
            type_ref: request.type_ref,
            endpoint: request.endpoint,
            headers: request.headers,
            auth_token: request.auth_token,
            enabled: request.enabled,
            keep_last_response: request.keep_last_response,
        }
    }
}

impl From<Registration> for NewRegistration {
    fn from(registration: Registration) -> Self {
        Self {
            name: registration.name,
            signal: registration.signal,
            type_ref: registration.type_ref,
            endpoint: registration.endpoint,
            headers: Value::Object(registration.headers),
            auth_token: registration.auth_token,
            enabled: registration.enabled,
            keep_last_response: registration.keep_last_response,
        }
    }
}

fn header_map(headers: Value) -> Map<String, Value> {
    match headers {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Hide all but the last few characters of a token.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return String::new();
    }
    let count = token.chars().count();
    let tail: String = token
        .chars()
        .skip(count.saturating_sub(TOKEN_VISIBLE_CHARS))
        .collect();
    format!("{TOKEN_MASK}{tail}")
}
