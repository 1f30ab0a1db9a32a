use std::{env, fmt, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_safe_limit: usize,

    // Access control for `/monitor` (empty = open)
    pub monitor_allowed_users: Vec<i64>,

    pub database: DatabaseConfig,
    pub ssh: SshConfig,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub pool_size: usize,
}

#[derive(Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
}

impl Config {
    /// Load from the process environment, seeding it from `.env` if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"))?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars { lookup: &lookup };

        let telegram_bot_token = vars
            .get("API_TOKEN")
            .or_else(|| vars.get("TELEGRAM_BOT_TOKEN"))
            .ok_or_else(|| {
                Error::Config("API_TOKEN environment variable is required".to_string())
            })?;
        let telegram_safe_limit = vars.parse::<usize>("TELEGRAM_SAFE_LIMIT")?.unwrap_or(4000);
        let monitor_allowed_users = parse_csv_i64(vars.get("MONITOR_ALLOWED_USERS"))?;

        let database = DatabaseConfig {
            name: vars.required("DB_NAME")?,
            user: vars.required("DB_USER")?,
            password: vars.required("DB_PASSWORD")?,
            host: vars.required("DB_HOST")?,
            port: vars.parse::<u16>("DB_PORT")?.unwrap_or(5432),
            pool_size: vars.parse::<usize>("DB_POOL_SIZE")?.unwrap_or(8).max(1),
        };

        let ssh = SshConfig {
            host: vars.required("SSH_HOST")?,
            port: vars.parse::<u16>("SSH_PORT")?.unwrap_or(22),
            user: vars.required("SSH_USER")?,
            password: vars.required("SSH_PASS")?,
            timeout: Duration::from_secs(vars.parse::<u64>("SSH_TIMEOUT_SECS")?.unwrap_or(30)),
        };

        Ok(Self {
            telegram_bot_token,
            telegram_safe_limit,
            monitor_allowed_users,
            database,
            ssh,
        })
    }
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).and_then(non_empty)
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw}")))
    }
}

fn load_dotenv_if_present(path: &Path) -> Result<()> {
    // dotenvy never overrides variables that are already set.
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(Error::Config(format!("failed to read {}: {e}", path.display()))),
    }
}

fn parse_csv_i64(v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("MONITOR_ALLOWED_USERS: invalid id {s}")))
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("telegram_safe_limit", &self.telegram_safe_limit)
            .field("monitor_allowed_users", &self.monitor_allowed_users)
            .field("database", &self.database)
            .field("ssh", &self.ssh)
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

impl fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
