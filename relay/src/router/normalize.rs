//! Request Normalization
//!
//! Turns the loosely-shaped `credentials` and `params` of a dispatch request
//! into one canonical form before any strategy sees them. Credential keys are
//! accepted in snake_case or camelCase; record data may be flat or nested
//! under `fields`/`dataFields`.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::auth::{codes, CredentialBundle};
use crate::common::{AppError, AppResult};

/// Parameter keys that address a target rather than carry record data.
const RESERVED_KEYS: &[&str] = &[
    "baseId",
    "tableName",
    "recordId",
    "spreadsheetId",
    "sheetName",
    "range",
    "rowIndex",
    "messageId",
    "maxResults",
    "pageSize",
    "query",
    "userKey",
    "values",
    "fields",
    "dataFields",
    "to",
    "subject",
    "body",
    "cc",
    "bcc",
    "addLabelIds",
    "removeLabelIds",
];

/// Timestamps above this are taken as milliseconds since the epoch.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

// ── Credentials ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct Credentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub token_type: Option<String>,
    pub api_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl Credentials {
    pub fn from_value(value: &Value) -> AppResult<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => return Err(AppError::client_input("credentials must be an object")),
        };

        let expires_at = match pick(map, &["expires_at", "expiresAt"]) {
            Some(v) => parse_timestamp(v)?,
            None => None,
        };

        Ok(Self {
            client_id: pick_str(map, &["client_id", "clientId"]),
            client_secret: pick_str(map, &["client_secret", "clientSecret"]),
            access_token: pick_str(map, &["access_token", "accessToken"]),
            refresh_token: pick_str(map, &["refresh_token", "refreshToken"]),
            expires_at,
            token_type: pick_str(map, &["token_type", "tokenType"]),
            api_key: pick_str(map, &["api_key", "apiKey"]),
        })
    }

    /// Replace the OAuth fields with a guard-resolved bundle.
    pub fn apply_bundle(&mut self, bundle: &CredentialBundle) {
        self.client_id = Some(bundle.client_id.clone());
        self.client_secret = Some(bundle.client_secret.clone());
        self.access_token = Some(bundle.access_token.clone());
        self.refresh_token = bundle.refresh_token.clone();
        self.expires_at = bundle.expires_at;
        self.token_type = Some(bundle.token_type.clone());
    }

    /// OAuth access token for a session-backed call.
    pub fn bearer_token(&self) -> AppResult<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| AppError::auth(codes::TOKEN_MISSING, false))
    }

    /// API key, falling back to an access token (Airtable accepts either as a bearer).
    pub fn api_key_or_token(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .or(self.access_token.as_deref())
            .ok_or_else(|| AppError::auth(codes::CREDENTIALS_MISSING, false))
    }
}

fn pick<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

fn pick_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Seconds or milliseconds since the epoch, or an RFC 3339 string.
pub fn parse_timestamp(value: &Value) -> AppResult<Option<DateTime<Utc>>> {
    let invalid = || AppError::client_input(format!("Invalid expiresAt: {}", value));

    let from_number = |n: i64| {
        let parsed = if n > MILLIS_THRESHOLD {
            Utc.timestamp_millis_opt(n).single()
        } else {
            Utc.timestamp_opt(n, 0).single()
        };
        parsed.ok_or_else(invalid)
    };

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            let n = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(invalid)?;
            from_number(n).map(Some)
        }
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => match s.parse::<i64>() {
            Ok(n) => from_number(n).map(Some),
            Err(_) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| invalid()),
        },
        _ => Err(invalid()),
    }
}

// ── Operation inputs ────────────────────────────────────────────────────────

/// Canonical operation inputs.
#[derive(Debug, Clone, Default)]
pub struct OperationInputs {
    /// Parameters as supplied
    pub params: Map<String, Value>,
    /// Record data, whichever way it was supplied
    pub data_fields: Map<String, Value>,
    /// Positional row values for tabular targets
    pub values: Vec<Value>,
}

impl OperationInputs {
    pub fn from_params(value: &Value) -> AppResult<Self> {
        let params = match value {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => return Err(AppError::client_input("params must be an object")),
        };

        let data_fields = ["dataFields", "fields"]
            .iter()
            .find_map(|k| params.get(*k).and_then(|v| v.as_object()).cloned())
            .unwrap_or_else(|| {
                params
                    .iter()
                    .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            });

        let values = match params.get("values") {
            Some(Value::Array(values)) => values.clone(),
            _ => data_fields.values().cloned().collect(),
        };

        Ok(Self {
            params,
            data_fields,
            values,
        })
    }

    /// Whether a required input is present. `dataFields`/`fields` and
    /// `values` are satisfied by the normalized record data.
    pub fn has(&self, key: &str) -> bool {
        match key {
            "dataFields" | "fields" => !self.data_fields.is_empty(),
            "values" => !self.values.is_empty(),
            _ => match self.params.get(key) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            },
        }
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn require_str(&self, key: &str) -> AppResult<&str> {
        self.str(key).ok_or_else(|| AppError::missing_field(key))
    }

    /// Non-negative integer, given as a number or a numeric string.
    pub fn u64(&self, key: &str) -> Option<u64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Required fields absent from these inputs, in declaration order.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required.iter().copied().filter(|k| !self.has(k)).collect()
    }

    /// `{ "fields": { ... } }` body shared by record-oriented APIs.
    pub fn fields_payload(&self) -> Value {
        serde_json::json!({ "fields": Value::Object(self.data_fields.clone()) })
    }
}
