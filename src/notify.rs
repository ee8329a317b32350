use std::time::Duration;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, DiscordOptions, EmailOptions, SlackOptions};
use crate::error::Error;
use crate::state::StatusChange;

#[derive(Error, Debug)]
pub enum SendError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("message build error: {0}")]
    Message(#[from] lettre::error::Error),
}

/// A notification delivery mechanism. Each implementation owns its transport
/// and its failure domain; the dispatcher never lets one channel's failure
/// affect another.
#[allow(async_fn_in_trait)]
pub trait Notify {
    fn name(&self) -> &'static str;
    async fn send(&self, change: &StatusChange) -> Result<(), SendError>;
}

/// Delivers `change` to every channel, logging per-channel outcomes.
///
/// Returns how many channels accepted the notification. Failures are logged
/// and not retried; if the condition persists, the next detected transition
/// will attempt delivery again.
pub async fn dispatch<C: Notify>(change: &StatusChange, channels: &[C]) -> usize {
    let mut delivered = 0;

    for channel in channels {
        match channel.send(change).await {
            Ok(()) => {
                info!("{}: {} notification sent", change.target, channel.name());
                delivered += 1;
            }
            Err(e) => error!(
                "{}: {} notification failed: {e}",
                change.target,
                channel.name()
            ),
        }
    }

    delivered
}

/// The closed set of configured channels.
pub enum Channel {
    Email(EmailChannel),
    Slack(SlackChannel),
    Discord(DiscordChannel),
}

impl Notify for Channel {
    fn name(&self) -> &'static str {
        match self {
            Channel::Email(_) => "email",
            Channel::Slack(_) => "slack",
            Channel::Discord(_) => "discord",
        }
    }

    async fn send(&self, change: &StatusChange) -> Result<(), SendError> {
        match self {
            Channel::Email(channel) => channel.send(change).await,
            Channel::Slack(channel) => channel.send(change).await,
            Channel::Discord(channel) => channel.send(change).await,
        }
    }
}

/// Builds one channel per configured section. A section that is absent
/// disables its channel silently; a section that is present but malformed
/// is a startup error.
pub fn channels_from_config(config: &Config) -> Result<Vec<Channel>, Error> {
    let mut channels = Vec::new();

    if let Some(options) = &config.email {
        channels.push(Channel::Email(EmailChannel::new(options)?));
    }
    if let Some(options) = &config.slack {
        channels.push(Channel::Slack(SlackChannel::new(options)?));
    }
    if let Some(options) = &config.discord {
        channels.push(Channel::Discord(DiscordChannel::new(options)?));
    }

    Ok(channels)
}

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

fn webhook_client() -> Result<Client, reqwest::Error> {
    Client::builder().timeout(WEBHOOK_TIMEOUT).build()
}

/// SMTP alert mail, one message per transition to all receivers.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    receivers: Vec<Mailbox>,
}

impl EmailChannel {
    pub fn new(options: &EmailOptions) -> Result<Self, Error> {
        let sender: Mailbox = options.sender.parse()?;
        let receivers = options
            .receivers
            .iter()
            .map(|receiver| receiver.parse())
            .collect::<Result<Vec<Mailbox>, _>>()?;

        let credentials = Credentials::new(
            options.sender.clone(),
            options.password.clone().unwrap_or_default(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&options.smtp_host)?
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            sender,
            receivers,
        })
    }

    async fn send(&self, change: &StatusChange) -> Result<(), SendError> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(email_subject(change))
            .header(ContentType::TEXT_PLAIN);
        for receiver in &self.receivers {
            builder = builder.to(receiver.clone());
        }

        let message = builder.body(email_body(change))?;
        self.transport.send(message).await?;
        Ok(())
    }
}

fn email_subject(change: &StatusChange) -> String {
    format!("ALERT: {} is {}", change.target, change.current)
}

fn email_body(change: &StatusChange) -> String {
    let mut body = format!(
        "Monitor alert\n\n\
         Site: {}\n\
         Previous status: {}\n\
         New status: {}\n\
         Link: {}\n",
        change.target, change.previous, change.current, change.url
    );
    if let Some(context) = &change.context {
        body.push_str(&format!("\n{context}\n"));
    }
    body
}

#[derive(Serialize)]
struct SlackMessage {
    text: String,
}

/// Slack incoming-webhook channel.
pub struct SlackChannel {
    webhook_url: String,
    client: Client,
}

impl SlackChannel {
    pub fn new(options: &SlackOptions) -> Result<Self, Error> {
        let webhook_url = options
            .webhook_url
            .clone()
            .ok_or_else(|| Error::Config("slack webhook url is not set".to_string()))?;
        Ok(Self {
            webhook_url,
            client: webhook_client()?,
        })
    }

    async fn send(&self, change: &StatusChange) -> Result<(), SendError> {
        let payload = SlackMessage {
            text: slack_text(change),
        };

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn slack_text(change: &StatusChange) -> String {
    format!(
        "*Monitor alert: {}*\n*Status:* {} -> {}\n<{}|View status page>",
        change.target, change.previous, change.current, change.url
    )
}

#[derive(Serialize)]
struct DiscordMessage {
    content: String,
}

/// Discord webhook channel with an optional user mention.
pub struct DiscordChannel {
    webhook_url: String,
    user_id: Option<u64>,
    client: Client,
}

impl DiscordChannel {
    pub fn new(options: &DiscordOptions) -> Result<Self, Error> {
        let webhook_url = options
            .webhook_url
            .clone()
            .ok_or_else(|| Error::Config("discord webhook url is not set".to_string()))?;
        Ok(Self {
            webhook_url,
            user_id: options.user_id,
            client: webhook_client()?,
        })
    }

    async fn send(&self, change: &StatusChange) -> Result<(), SendError> {
        // If user_id is None, we don't want to mention anyone
        let tag = self.user_id.map_or(String::new(), |id| format!("<@{id}> "));

        let payload = DiscordMessage {
            content: format!(
                "{tag}Alert: {} is {} (was {})\n{}",
                change.target, change.current, change.previous, change.url
            ),
        };

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
