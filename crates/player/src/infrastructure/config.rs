//! Player configuration from the environment and command line.
//!
//! `fari-player [HOST_ID] [PLAYER_NAME]`; positional arguments win over
//! `FARI_HOST_ID` and `FARI_PLAYER_NAME`.

use fari_domain::PeerId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerConfig {
    pub host_id: Option<PeerId>,
    pub player_name: Option<String>,
    pub debug: bool,
}

impl PlayerConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host_id: non_empty(lookup("FARI_HOST_ID")).map(PeerId::new),
            player_name: non_empty(lookup("FARI_PLAYER_NAME")),
            debug: lookup("FARI_DEBUG").is_some_and(|v| is_truthy(&v)),
        }
    }

    /// Apply positional arguments (program name already skipped).
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        let mut args = args.into_iter();
        if let Some(host) = non_empty(args.next()) {
            self.host_id = Some(PeerId::new(host));
        }
        let name: Vec<String> = args.collect();
        if let Some(name) = non_empty(Some(name.join(" "))) {
            self.player_name = Some(name);
        }
        self
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "fari_player=debug,fari_shared=debug"
        } else {
            "fari_player=info"
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_override_the_environment() {
        let config = PlayerConfig::from_lookup(|name| match name {
            "FARI_HOST_ID" => Some("ws://env/play/1".into()),
            "FARI_PLAYER_NAME" => Some("Env".into()),
            _ => None,
        })
        .with_args(["ws://arg/play/2".to_string(), "Magnus".into(), "Bold".into()]);

        assert_eq!(config.host_id, Some(PeerId::new("ws://arg/play/2")));
        assert_eq!(config.player_name.as_deref(), Some("Magnus Bold"));
        assert!(!config.debug);
    }

    #[test]
    fn blank_values_count_as_missing() {
        let config = PlayerConfig::from_lookup(|name| match name {
            "FARI_PLAYER_NAME" => Some("   ".into()),
            "FARI_DEBUG" => Some("1".into()),
            _ => None,
        })
        .with_args(Vec::new());
        assert_eq!(config.player_name, None);
        assert_eq!(config.host_id, None);
        assert!(config.debug);
    }
}
