//! Git credentials file.
//!
//! ```yaml
//! auth:
//!   basic:
//!     username: bot
//!     password: s3cr3t
//! ```
//!
//! Exactly one of `basic`, `bearerToken` or `sshPrivateKey` must be present.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Deserialize;

use crate::error::{io_err, ConfigError};

/// Keys of the credentials file that hold secrets. Values under these keys
/// are never printed, wherever they appear.
pub const SECRET_FIELDS: [&str; 3] = ["password", "token", "privateKey"];

#[derive(Clone, Default, Deserialize)]
pub struct GitCredentials {
    #[serde(default)]
    pub auth: Authentication,
}

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
    #[serde(default)]
    pub basic: Option<BasicAuth>,
    #[serde(default)]
    pub bearer_token: Option<BearerToken>,
    #[serde(default)]
    pub ssh_private_key: Option<SshPrivateKey>,
}

#[derive(Clone, Default, Deserialize)]
pub struct BasicAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Default, Deserialize)]
pub struct BearerToken {
    #[serde(default)]
    pub token: String,
}

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshPrivateKey {
    /// Base64 encoded private key.
    #[serde(default)]
    pub private_key: String,
    /// Path to a known_hosts file.
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
}

/// The single validated authentication method.
pub enum AuthMethod<'a> {
    Basic { username: &'a str, password: &'a str },
    BearerToken { token: &'a str },
    SshPrivateKey { key: Vec<u8>, known_hosts: Option<&'a Path> },
}

impl SshPrivateKey {
    pub fn decode_private_key(&self) -> Result<Vec<u8>, ConfigError> {
        if self.private_key.is_empty() {
            return Err(invalid_ssh("private key must be provided"));
        }
        base64::engine::general_purpose::STANDARD
            .decode(self.private_key.trim())
            .map_err(|e| invalid_ssh(format!("failed to decode SSH private key: {e}")))
    }
}

fn invalid_ssh(message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidAuth { method: "SSH private key", message: message.into() }
}

impl GitCredentials {
    /// Read and validate a credentials file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let creds: Self = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        creds.validate()?;
        Ok(creds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.auth;
        let count = [a.basic.is_some(), a.bearer_token.is_some(), a.ssh_private_key.is_some()]
            .iter()
            .filter(|present| **present)
            .count();
        match count {
            0 => return Err(ConfigError::NoAuthMethod),
            1 => {}
            _ => return Err(ConfigError::MultipleAuthMethods),
        }

        if let Some(basic) = &a.basic {
            if basic.username.is_empty() || basic.password.is_empty() {
                return Err(ConfigError::InvalidAuth {
                    method: "basic authentication",
                    message: "username and password must be provided".into(),
                });
            }
        }
        if let Some(bearer) = &a.bearer_token {
            if bearer.token.is_empty() {
                return Err(ConfigError::InvalidAuth {
                    method: "bearer token",
                    message: "token must be provided".into(),
                });
            }
        }
        if let Some(ssh) = &a.ssh_private_key {
            ssh.decode_private_key()?;
        }
        Ok(())
    }

    /// The configured method. Call after [`GitCredentials::validate`].
    pub fn method(&self) -> Result<AuthMethod<'_>, ConfigError> {
        self.validate()?;
        let a = &self.auth;
        if let Some(basic) = &a.basic {
            return Ok(AuthMethod::Basic { username: &basic.username, password: &basic.password });
        }
        if let Some(bearer) = &a.bearer_token {
            return Ok(AuthMethod::BearerToken { token: &bearer.token });
        }
        match &a.ssh_private_key {
            Some(ssh) => Ok(AuthMethod::SshPrivateKey {
                key: ssh.decode_private_key()?,
                known_hosts: ssh.known_hosts.as_deref(),
            }),
            None => Err(ConfigError::NoAuthMethod),
        }
    }
}

// Secrets never reach logs through `{:?}`.
impl fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match (&self.auth.basic, &self.auth.bearer_token, &self.auth.ssh_private_key) {
            (Some(b), _, _) => format!("basic({}, ***)", b.username),
            (_, Some(_), _) => "bearerToken(***)".to_string(),
            (_, _, Some(_)) => "sshPrivateKey(***)".to_string(),
            _ => "none".to_string(),
        };
        f.debug_struct("GitCredentials").field("auth", &method).finish()
    }
}
