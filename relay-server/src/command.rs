//! Slash command record and form decoding.
//!
//! Slack posts slash commands as `application/x-www-form-urlencoded`. The
//! body is decoded into a [`SlackCommand`], which is what gets published.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::FormError;

/// One slash command invocation.
///
/// Field names match Slack's form field names and are published as-is.
/// Absent form fields are empty strings; only the two enterprise fields are
/// dropped from the JSON when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackCommand {
    pub token: String,
    pub team_id: String,
    pub team_domain: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user_id: String,
    pub user_name: String,
    pub command: String,
    pub text: String,
    pub response_url: String,
    pub trigger_id: String,
    pub api_app_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub enterprise_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub enterprise_name: String,
}

impl SlackCommand {
    /// Decode a form body and pick out the known fields.
    pub fn from_form_body(body: &[u8]) -> Result<Self, FormError> {
        let mut values = parse_form(body)?;
        Ok(Self::from_values(&mut values))
    }

    fn from_values(values: &mut HashMap<String, String>) -> Self {
        let mut take = |key: &str| values.remove(key).unwrap_or_default();

        SlackCommand {
            token: take("token"),
            team_id: take("team_id"),
            team_domain: take("team_domain"),
            channel_id: take("channel_id"),
            channel_name: take("channel_name"),
            user_id: take("user_id"),
            user_name: take("user_name"),
            command: take("command"),
            text: take("text"),
            response_url: take("response_url"),
            trigger_id: take("trigger_id"),
            api_app_id: take("api_app_id"),
            enterprise_id: take("enterprise_id"),
            enterprise_name: take("enterprise_name"),
        }
    }

    /// Compact JSON sent to the broker.
    pub fn to_wire(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Decode a URL-encoded form body into a key/value map.
///
/// `+` decodes to a space and empty segments are skipped. A key without `=`
/// maps to an empty value. When a key repeats, the last occurrence wins.
/// Malformed percent escapes and `;` separators are rejected rather than
/// passed through.
pub fn parse_form(body: &[u8]) -> Result<HashMap<String, String>, FormError> {
    validate_form(body)?;

    Ok(form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

fn validate_form(body: &[u8]) -> Result<(), FormError> {
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b';' => return Err(FormError::Semicolon),
            b'%' => {
                let well_formed = body
                    .get(i + 1..i + 3)
                    .map(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                    .unwrap_or(false);
                if !well_formed {
                    return Err(FormError::InvalidEscape(i));
                }
                i += 3;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}
