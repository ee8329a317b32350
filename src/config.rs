use std::collections::HashSet;
use std::{
    fs,
    path::{Path, PathBuf},
};

use log::warn;
use serde::Deserialize;
use url::Url;

use crate::error::Error;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorOptions,
    pub email: Option<EmailOptions>,
    pub slack: Option<SlackOptions>,
    pub discord: Option<DiscordOptions>,
    pub targets: Vec<Target>,
}

#[derive(Debug, Deserialize)]
pub struct MonitorOptions {
    #[serde(default = "default_check_delay")]
    pub check_delay_secs: u64,
    #[serde(default)]
    pub check_jitter_secs: u64,
    #[serde(default = "default_loop_delay")]
    pub loop_delay_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            check_delay_secs: default_check_delay(),
            check_jitter_secs: 0,
            loop_delay_secs: default_loop_delay(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_check_delay() -> u64 {
    10
}

fn default_loop_delay() -> u64 {
    60
}

fn default_fetch_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct EmailOptions {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    pub sender: String,
    pub password: Option<String>,
    pub receivers: Vec<String>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SlackOptions {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiscordOptions {
    pub webhook_url: Option<String>,
    pub user_id: Option<u64>,
}

/// A monitored endpoint. The URL doubles as the state-tracking key, so it
/// must be unique across the target list.
#[derive(Debug, Deserialize)]
pub struct Target {
    pub name: String,
    pub url: String,
    #[serde(flatten)]
    pub mode: CheckMode,
}

/// How a target's page content is interpreted.
#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CheckMode {
    /// Aggregated user-report pages with fixed indicator phrases.
    Aggregated,
    /// Official status pages checked for positive keywords.
    Keyword { keywords: Vec<String> },
}

impl Config {
    /// Loads configuration from `STATUSWATCH_CONFIG` or the default path.
    pub fn load() -> Result<Config, Error> {
        let path = std::env::var_os("STATUSWATCH_CONFIG")
            .map_or_else(default_path, PathBuf::from);
        Self::load_from(path)
    }

    /// Loads and validates configuration from a specific TOML file.
    ///
    /// Secrets missing from the file are filled in from the environment
    /// (via `dotenvy`, so a `.env` file works too): `EMAIL_PASSWORD`,
    /// `SLACK_WEBHOOK_URL` and `DISCORD_WEBHOOK_URL`. A channel section
    /// that is absent entirely just disables that channel, as does a webhook
    /// section whose URL cannot be resolved at all; only an email section
    /// without a resolvable password is an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        if let Some(email) = &mut config.email {
            if email.password.is_none() {
                email.password = Some(dotenvy::var("EMAIL_PASSWORD")?);
            }
        }

        if let Some(slack) = &mut config.slack {
            if slack.webhook_url.is_none() {
                slack.webhook_url = dotenvy::var("SLACK_WEBHOOK_URL").ok();
            }
        }
        if config.slack.as_ref().is_some_and(|s| s.webhook_url.is_none()) {
            warn!("Slack webhook URL is not set, Slack alerts disabled");
            config.slack = None;
        }

        if let Some(discord) = &mut config.discord {
            if discord.webhook_url.is_none() {
                discord.webhook_url = dotenvy::var("DISCORD_WEBHOOK_URL").ok();
            }
        }
        if config.discord.as_ref().is_some_and(|d| d.webhook_url.is_none()) {
            warn!("Discord webhook URL is not set, Discord alerts disabled");
            config.discord = None;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.targets.is_empty() {
            return Err(Error::Config("no targets configured".to_string()));
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            Url::parse(&target.url)?;
            if !seen.insert(target.url.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate target url: {}",
                    target.url
                )));
            }
            if let CheckMode::Keyword { keywords } = &target.mode {
                if keywords.is_empty() {
                    warn!(
                        "{}: keyword mode with an empty keyword list, target will never classify",
                        target.name
                    );
                }
            }
        }

        if let Some(email) = &self.email {
            if email.receivers.is_empty() {
                return Err(Error::Config(
                    "email.receivers must list at least one address".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("statuswatch").join("config.toml"))
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}
