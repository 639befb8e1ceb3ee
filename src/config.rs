use anyhow::{Context, Result};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

/// Service settings read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub admin: Option<AdminBootstrap>,
}

/// Admin account created at startup when no account with that email exists
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let max_upload_mb: usize = try_load("MAX_UPLOAD_MB", "25")?;
        let max_upload_bytes = upload_limit_bytes(max_upload_mb)?;

        Ok(Self {
            bind_addr: try_load("BIND_ADDR", "0.0.0.0")?,
            port: try_load("PORT", "5000")?,
            upload_dir: try_load::<String>("UPLOAD_DIR", "uploads")?.into(),
            max_upload_bytes,
            admin: load_admin(),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw:?}"))
}

fn upload_limit_bytes(megabytes: usize) -> Result<usize> {
    megabytes
        .checked_mul(1024 * 1024)
        .with_context(|| format!("Invalid MAX_UPLOAD_MB value: {megabytes} is too large"))
}

fn load_admin() -> Option<AdminBootstrap> {
    match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
        (Ok(email), Ok(password)) if !email.trim().is_empty() && !password.is_empty() => {
            Some(AdminBootstrap {
                email: email.trim().to_string(),
                password,
            })
        }
        (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
            warn!("ADMIN_EMAIL and ADMIN_PASSWORD must both be set, skipping admin bootstrap");
            None
        }
        _ => None,
    }
}
