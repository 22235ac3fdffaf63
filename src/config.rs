// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup. Invalid
//! values abort startup; nothing is re-read while serving.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JWT_AUTH_ALGORITHM` | `HS256`, `RS256` or `EdDSA` | Required |
//! | `JWT_AUTH_KEY` | Shared secret, PEM public key, or base64 Ed25519 key | Required (or `JWT_AUTH_KEY_FILE`) |
//! | `JWT_AUTH_KEY_FILE` | File holding the key, read when `JWT_AUTH_KEY` is unset | - |
//! | `JWT_REQUIRED_CLAIMS` | Comma-separated extra claims that must be non-empty | empty |
//! | `JWT_GROUP_MAPPING` | JSON object: source group → local group(s) | `{}` |
//! | `JWT_GROUPS_CLAIM_NAME` | Claim carrying source groups | `groups` |
//! | `JWT_LEEWAY_SECONDS` | Clock skew tolerance | `60` |
//! | `JWT_AUTH_DEBUG_MODE` | Include token and identity details in responses | `false` |
//! | `JWT_MIGRATE_USERS_BY_EMAIL` | Bind unbound accounts with the same email | `false` |
//! | `JWT_MIGRATE_USERS_BY_USERNAME` | Bind accounts with the candidate username | `false` |
//! | `JWT_USE_REAL_NAME_AS_USERNAME` | Derive usernames from the real name | `false` |
//! | `JWT_USE_EMAIL_AS_USERNAME` | Derive usernames from the email local part | `false` |
//! | `DATA_DIR` | Directory holding the account database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key; both enable HTTPS | - |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::auth::{GroupMapping, MigrationPolicy, Settings, SettingsError};

pub const JWT_AUTH_ALGORITHM_ENV: &str = "JWT_AUTH_ALGORITHM";
pub const JWT_AUTH_KEY_ENV: &str = "JWT_AUTH_KEY";
pub const JWT_AUTH_KEY_FILE_ENV: &str = "JWT_AUTH_KEY_FILE";
pub const JWT_REQUIRED_CLAIMS_ENV: &str = "JWT_REQUIRED_CLAIMS";
pub const JWT_GROUP_MAPPING_ENV: &str = "JWT_GROUP_MAPPING";
pub const JWT_GROUPS_CLAIM_NAME_ENV: &str = "JWT_GROUPS_CLAIM_NAME";
pub const JWT_LEEWAY_SECONDS_ENV: &str = "JWT_LEEWAY_SECONDS";
pub const JWT_AUTH_DEBUG_MODE_ENV: &str = "JWT_AUTH_DEBUG_MODE";
pub const JWT_MIGRATE_USERS_BY_EMAIL_ENV: &str = "JWT_MIGRATE_USERS_BY_EMAIL";
pub const JWT_MIGRATE_USERS_BY_USERNAME_ENV: &str = "JWT_MIGRATE_USERS_BY_USERNAME";
pub const JWT_USE_REAL_NAME_AS_USERNAME_ENV: &str = "JWT_USE_REAL_NAME_AS_USERNAME";
pub const JWT_USE_EMAIL_AS_USERNAME_ENV: &str = "JWT_USE_EMAIL_AS_USERNAME";

/// Environment variable name for the database directory.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "/data";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// File name of the account database inside `DATA_DIR`.
pub const ACCOUNTS_DB_FILE: &str = "accounts.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to read JWT_AUTH_KEY_FILE {}: {source}", path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JWT_GROUP_MAPPING is not a valid mapping: {0}")]
    GroupMapping(#[source] serde_json::Error),

    #[error("{name} must be a boolean, got {value:?}")]
    InvalidBool { name: &'static str, value: String },

    #[error("{name} is invalid: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    PartialTls,
}

/// PEM files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Fully validated startup configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: Settings,
    pub policy: MigrationPolicy,
    pub debug_mode: bool,
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub tls: Option<TlsPaths>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let flag = |name: &'static str| -> Result<bool, ConfigError> {
            var(name).map_or(Ok(false), |value| parse_bool(name, &value))
        };

        let key = match var(JWT_AUTH_KEY_ENV) {
            Some(key) => key,
            None => match var(JWT_AUTH_KEY_FILE_ENV) {
                Some(path) => {
                    let path = PathBuf::from(path);
                    std::fs::read_to_string(&path)
                        .map_err(|source| ConfigError::KeyFile { path, source })?
                        .trim()
                        .to_string()
                }
                None => String::new(),
            },
        };

        let required_claims = var(JWT_REQUIRED_CLAIMS_ENV)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|claim| !claim.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let group_mapping = var(JWT_GROUP_MAPPING_ENV)
            .map(|json| GroupMapping::from_json(&json).map_err(ConfigError::GroupMapping))
            .transpose()?;

        let mut settings = Settings::new(
            &var(JWT_AUTH_ALGORITHM_ENV).unwrap_or_default(),
            key,
            required_claims,
            group_mapping,
            var(JWT_GROUPS_CLAIM_NAME_ENV),
        )?;
        if let Some(leeway) = var(JWT_LEEWAY_SECONDS_ENV) {
            let seconds = leeway
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: JWT_LEEWAY_SECONDS_ENV,
                    value: leeway.clone(),
                })?;
            settings = settings.with_leeway(seconds);
        }

        let policy = MigrationPolicy {
            migrate_users_by_email: flag(JWT_MIGRATE_USERS_BY_EMAIL_ENV)?,
            migrate_users_by_username: flag(JWT_MIGRATE_USERS_BY_USERNAME_ENV)?,
            use_real_name_as_username: flag(JWT_USE_REAL_NAME_AS_USERNAME_ENV)?,
            use_email_as_username: flag(JWT_USE_EMAIL_AS_USERNAME_ENV)?,
        };

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip: IpAddr = host.parse().map_err(|_| ConfigError::InvalidValue {
            name: HOST_ENV,
            value: host.clone(),
        })?;
        let port = match var(PORT_ENV) {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidValue {
                name: PORT_ENV,
                value: port.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTls),
        };

        Ok(Self {
            settings,
            policy,
            debug_mode: flag(JWT_AUTH_DEBUG_MODE_ENV)?,
            data_dir: var(DATA_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            bind_addr: SocketAddr::new(ip, port),
            tls,
        })
    }

    /// Path of the account database.
    pub fn accounts_db_path(&self) -> PathBuf {
        self.data_dir.join(ACCOUNTS_DB_FILE)
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: value.to_string(),
        }),
    }
}
