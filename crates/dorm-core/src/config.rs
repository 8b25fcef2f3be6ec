use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Which storage backend to open at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageConfig {
    /// Embedded single-file database.
    Sqlite { path: PathBuf },
    /// Client/server database reached through a connection URL.
    Postgres { url: String },
}

/// Typed configuration, loaded once at process start.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub admin_ids: Vec<i64>,

    // Storage
    pub storage: StorageConfig,
    pub db_max_connections: u32,

    // Content links (DB settings take precedence at read time)
    pub official_channel_link: String,
    pub general_chat_link: String,
    pub guide_website_link: String,

    // Behavior flags
    pub stats_enabled: bool,
    pub log_level: String,
    /// Directory for daily-rotated log files; `None` logs to stdout only.
    pub log_dir: Option<PathBuf>,

    /// `None` keeps conversation states until they are completed or cancelled.
    pub conversation_timeout: Option<Duration>,

    // Outbound throttling
    pub broadcast_min_interval: Duration,

    // Liveness endpoint
    pub health_enabled: bool,
    pub health_port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admin_ids = parse_csv_i64(env_str("ADMIN_IDS"))?;
        let storage = storage_from_env(env_str("DATABASE_URL"), env_str("DATABASE_PATH"))?;
        let db_max_connections = env_u32("DB_MAX_CONNECTIONS").unwrap_or(5).max(1);

        let official_channel_link = env_str("OFFICIAL_CHANNEL_LINK").unwrap_or_default();
        let general_chat_link = env_str("GENERAL_CHAT_LINK").unwrap_or_default();
        let guide_website_link = env_str("GUIDE_WEBSITE_LINK").unwrap_or_default();

        let stats_enabled = env_bool("STATS_ENABLED").unwrap_or(true);
        let log_level = env_str("LOG_LEVEL")
            .and_then(non_empty)
            .unwrap_or_else(|| "info".to_string());
        let log_dir = log_dir_from_env(env_str("LOG_DIR"));

        let conversation_timeout = match env_u64("CONVERSATION_TIMEOUT_SECS").unwrap_or(1800) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let broadcast_min_interval =
            Duration::from_millis(env_u64("BROADCAST_MIN_INTERVAL_MS").unwrap_or(40));

        let health_enabled = env_bool("HEALTH_ENABLED").unwrap_or(true);
        let health_port = env_str("PORT")
            .and_then(|s| s.trim().parse::<u16>().ok())
            .unwrap_or(8000);

        Ok(Self {
            bot_token,
            admin_ids,
            storage,
            db_max_connections,
            official_channel_link,
            general_chat_link,
            guide_website_link,
            stats_enabled,
            log_level,
            log_dir,
            conversation_timeout,
            broadcast_min_interval,
            health_enabled,
            health_port,
        })
    }
}

fn storage_from_env(url: Option<String>, path: Option<String>) -> Result<StorageConfig> {
    if let Some(url) = url.and_then(non_empty) {
        let url = url.trim().to_string();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(StorageConfig::Postgres { url });
        }
        if let Some(rest) = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:")) {
            if rest.is_empty() || rest.starts_with(":memory:") || rest.contains("mode=memory") {
                return Err(Error::Config(
                    "DATABASE_URL points at an in-memory SQLite database; use a file path".to_string(),
                ));
            }
            return Ok(StorageConfig::Sqlite {
                path: PathBuf::from(rest),
            });
        }
        return Err(Error::Config(format!(
            "unsupported DATABASE_URL scheme: {url}"
        )));
    }

    let path = path
        .and_then(non_empty)
        .unwrap_or_else(|| "data/bot.db".to_string());
    Ok(StorageConfig::Sqlite {
        path: PathBuf::from(path),
    })
}

/// Unset means `logs`; an empty value or `off` disables file logging.
fn log_dir_from_env(v: Option<String>) -> Option<PathBuf> {
    match v {
        None => Some(PathBuf::from("logs")),
        Some(v) if v.trim().is_empty() || v.trim().eq_ignore_ascii_case("off") => None,
        Some(v) => Some(PathBuf::from(v.trim())),
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("invalid id in ADMIN_IDS: {s}")))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_ids_parse_and_reject_garbage() {
        assert_eq!(
            parse_csv_i64(Some(" 1, 22 ,,333".to_string())).unwrap(),
            vec![1, 22, 333]
        );
        assert!(parse_csv_i64(None).unwrap().is_empty());
        assert!(matches!(
            parse_csv_i64(Some("1,abc".to_string())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn storage_selection() {
        assert_eq!(
            storage_from_env(Some("postgres://u:p@db/bot".to_string()), None).unwrap(),
            StorageConfig::Postgres {
                url: "postgres://u:p@db/bot".to_string()
            }
        );
        assert_eq!(
            storage_from_env(Some("sqlite:///var/lib/bot.db".to_string()), None).unwrap(),
            StorageConfig::Sqlite {
                path: PathBuf::from("/var/lib/bot.db")
            }
        );
        assert_eq!(
            storage_from_env(None, Some("/tmp/x.db".to_string())).unwrap(),
            StorageConfig::Sqlite {
                path: PathBuf::from("/tmp/x.db")
            }
        );
        assert_eq!(
            storage_from_env(Some("  ".to_string()), None).unwrap(),
            StorageConfig::Sqlite {
                path: PathBuf::from("data/bot.db")
            }
        );
        assert!(storage_from_env(Some("mysql://x".to_string()), None).is_err());
    }

    #[test]
    fn in_memory_sqlite_urls_are_rejected() {
        for url in ["sqlite::memory:", "sqlite://:memory:", "sqlite:", "sqlite:file:x?mode=memory"] {
            assert!(
                matches!(storage_from_env(Some(url.to_string()), None), Err(Error::Config(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn log_dir_defaults_to_logs() {
        assert_eq!(log_dir_from_env(None), Some(PathBuf::from("logs")));
        assert_eq!(log_dir_from_env(Some("off".to_string())), None);
        assert_eq!(log_dir_from_env(Some(" ".to_string())), None);
        assert_eq!(
            log_dir_from_env(Some("/var/log/dorm".to_string())),
            Some(PathBuf::from("/var/log/dorm"))
        );
    }
}
