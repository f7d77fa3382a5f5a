// ABOUTME: One hop entry of a chain file, before validation.
// ABOUTME: Accepts "[user@]host[:port]" shorthand or a mapping with a credential.

use super::HostKeyPolicyKind;
use super::secret::SecretValue;
use crate::error::{Error, Result};
use crate::types::{Credential, Endpoint};
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum HopConfig {
    Shorthand(String),
    Detailed(HopFields),
    /// Anything else; rejected by [`HopConfig::to_endpoint`] with its index.
    Invalid(Value),
}

// Never fails: shape problems are kept so they can be reported per hop.
impl<'de> Deserialize<'de> for HopConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => HopConfig::Shorthand(s),
            Value::Mapping(_) => match serde_yaml::from_value::<HopFields>(value.clone()) {
                Ok(fields) => HopConfig::Detailed(fields),
                Err(_) => HopConfig::Invalid(value),
            },
            other => HopConfig::Invalid(other),
        })
    }
}

/// A missing entry, reported like any other invalid element.
impl Default for HopConfig {
    fn default() -> Self {
        HopConfig::Invalid(Value::Null)
    }
}

/// Every field is optional here so a missing one is reported against the
/// hop's position rather than as a YAML error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HopFields {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<SecretValue>,
    #[serde(default)]
    pub key: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: Option<SecretValue>,
    #[serde(default)]
    pub agent: bool,
    /// Overrides the chain-wide host key policy for this hop.
    #[serde(default)]
    pub host_key: Option<HostKeyPolicyKind>,
}

impl HopConfig {
    /// Validate into an [`Endpoint`]; `index` is the hop's 1-based position.
    pub fn to_endpoint(&self, index: usize) -> Result<Endpoint> {
        let fields = match self {
            HopConfig::Shorthand(s) => parse_shorthand(s).map_err(|reason| Error::InvalidArgument {
                index,
                host: None,
                reason,
            })?,
            HopConfig::Detailed(fields) => fields.clone(),
            HopConfig::Invalid(value) => {
                return Err(Error::InvalidArgument {
                    index,
                    host: value.get("host").and_then(|h| h.as_str()).map(String::from),
                    reason: describe_invalid(value),
                });
            }
        };

        let host_hint = fields.host.clone();
        let invalid = |reason: String| Error::InvalidArgument {
            index,
            host: host_hint.clone(),
            reason,
        };

        let host = fields
            .host
            .clone()
            .ok_or_else(|| invalid("missing field `host`".to_string()))?;
        let user = fields
            .user
            .clone()
            .ok_or_else(|| invalid("missing field `user`".to_string()))?;
        let credential = fields.credential().map_err(invalid)?;

        Endpoint::with_wide_port(host, fields.port.unwrap_or(22), user, credential)
            .map_err(|e| invalid(e.to_string()))
    }

    pub fn host_key(&self) -> Option<HostKeyPolicyKind> {
        match self {
            HopConfig::Detailed(fields) => fields.host_key,
            HopConfig::Shorthand(_) | HopConfig::Invalid(_) => None,
        }
    }
}

/// Why a value matched neither the shorthand nor the mapping form.
fn describe_invalid(value: &Value) -> String {
    let found = match value {
        Value::Null => return "entry is empty or missing".to_string(),
        Value::Mapping(_) => {
            // Re-run the strict parse to surface the offending field.
            return match serde_yaml::from_value::<HopFields>(value.clone()) {
                Err(e) => e.to_string(),
                Ok(_) => "unrecognised hop mapping".to_string(),
            };
        }
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::Sequence(_) => "a sequence",
        Value::Tagged(_) => "a tagged value",
        Value::String(_) => "a string",
    };
    format!("expected \"[user@]host[:port]\" or a mapping, found {found}")
}

impl HopFields {
    fn credential(&self) -> std::result::Result<Credential, String> {
        let given = [self.password.is_some(), self.key.is_some(), self.agent]
            .iter()
            .filter(|set| **set)
            .count();
        if given > 1 {
            return Err("set only one of `password`, `key`, `agent`".to_string());
        }

        if self.passphrase.is_some() && self.key.is_none() {
            return Err("`passphrase` requires `key`".to_string());
        }

        if let Some(password) = &self.password {
            let password = password.resolve().map_err(|e| e.to_string())?;
            return Ok(Credential::Password(password));
        }

        if let Some(path) = &self.key {
            let passphrase = self
                .passphrase
                .as_ref()
                .map(SecretValue::resolve)
                .transpose()
                .map_err(|e| e.to_string())?;
            return Ok(Credential::KeyFile {
                path: path.clone(),
                passphrase,
            });
        }

        if self.agent {
            return Ok(Credential::Agent);
        }

        Ok(Credential::None)
    }
}

/// Parse `[user@]host[:port]`.
fn parse_shorthand(s: &str) -> std::result::Result<HopFields, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("hop address cannot be empty".to_string());
    }

    let (user_part, rest) = if let Some(at_pos) = s.find('@') {
        (Some(&s[..at_pos]), &s[at_pos + 1..])
    } else {
        (None, s)
    };

    let (host, port) = if let Some(colon_pos) = rest.rfind(':') {
        let port_str = &rest[colon_pos + 1..];
        let port = port_str
            .parse::<u32>()
            .map_err(|_| format!("invalid port: {}", port_str))?;
        (&rest[..colon_pos], Some(port))
    } else {
        (rest, None)
    };

    Ok(HopFields {
        host: Some(host.to_string()),
        port,
        user: user_part.map(|s| s.to_string()),
        ..Default::default()
    })
}
