//! Host configuration from the environment.
//!
//! `.env.local` and `.env` at the repo root are loaded first; real
//! environment variables win over both.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Default interval between connection table polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7878";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub bind_addr: SocketAddr,
    pub poll_interval: Duration,
    pub debug: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7878)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            debug: false,
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv_from_repo_root();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("FARI_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind_addr
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: "FARI_BIND_ADDR",
                value: bind_addr.clone(),
            })?;

        let poll_interval = match lookup("FARI_POLL_INTERVAL_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "FARI_POLL_INTERVAL_MS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            bind_addr,
            poll_interval,
            debug: lookup("FARI_DEBUG").is_some_and(|v| is_truthy(&v)),
        })
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "fari_host=debug,fari_shared=debug,tower_http=debug"
        } else {
            "fari_host=info,tower_http=info"
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn load_dotenv_from_repo_root() {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
