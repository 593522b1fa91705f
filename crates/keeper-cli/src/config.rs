//! Runtime configuration: flags, environment, password input

use anyhow::{bail, Context};
use secrecy::SecretString;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

pub const PASSWORD_ENV: &str = "KEEPER_PASSWORD";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
    pub cache: PathBuf,
    pub user: Option<String>,
    pub timeout: Duration,
}

impl Config {
    pub fn new(
        server: String,
        cache: Option<PathBuf>,
        user: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            cache: cache.unwrap_or_else(default_cache_path),
            user,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn user(&self) -> anyhow::Result<&str> {
        match self.user.as_deref() {
            Some(user) if !user.is_empty() => Ok(user),
            _ => bail!("no account given: pass --user or set KEEPER_USER"),
        }
    }
}

/// `<data_dir>/keeper/cache.db`, falling back to the working directory
pub fn default_cache_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keeper")
        .join("cache.db")
}

/// Master password from `KEEPER_PASSWORD`, else one line from stdin
pub fn read_password() -> anyhow::Result<SecretString> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::new(password));
    }

    eprint!("Master password: ");
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("master password must not be empty");
    }
    Ok(SecretString::new(password))
}
