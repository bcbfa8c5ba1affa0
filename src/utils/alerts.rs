//! Wake-up alerts: the alert log and the notification dispatcher
//!
//! Delivery is best effort. Each channel gets one HTTP request per alert,
//! no retry, and a failing channel never stops the others.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::modules::classifier::Severity;
use crate::utils::settings::{has_value, NotificationConfig};
use crate::utils::MetricsService;

const ALERT_HISTORY_CAPACITY: usize = 1000;
const CHANNEL_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Transfer,
    Balance,
    Activity,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Transfer => "transfer",
            AlertType::Balance => "balance",
            AlertType::Activity => "activity",
        }
    }
}

/// What the newest movement looked like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDetails {
    pub signature: String,
    /// SOL moved by the newest transaction
    pub amount: f64,
    pub token: String,
    pub new_transactions: usize,
    pub description: String,
}

/// An immutable alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAlert {
    pub id: u64,
    pub wallet_address: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub details: AlertDetails,
    /// Unix seconds
    pub timestamp: i64,
}

/// Alert history, newest first, with live fan-out to subscribers
pub struct AlertLog {
    history: RwLock<VecDeque<WalletAlert>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<WalletAlert>,
}

impl AlertLog {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(ALERT_HISTORY_CAPACITY);
        Self {
            history: RwLock::new(VecDeque::with_capacity(ALERT_HISTORY_CAPACITY)),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    /// Assign an id, store, and broadcast
    pub fn append(&self, mut alert: WalletAlert) -> WalletAlert {
        alert.id = self.next_id.fetch_add(1, Ordering::SeqCst);

        {
            let mut history = self.history.write();
            history.push_front(alert.clone());
            history.truncate(ALERT_HISTORY_CAPACITY);
        }

        let _ = self.sender.send(alert.clone());
        alert
    }

    pub fn recent(&self, limit: usize) -> Vec<WalletAlert> {
        self.history.read().iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.read().len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletAlert> {
        self.sender.subscribe()
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Compact SOL amount: `1.50M`, `120.00K`, `512.25`
pub fn format_number(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.2}K", value / 1_000.0)
    } else {
        format!("{:.2}", value)
    }
}

/// Channel-agnostic alert text
pub fn format_alert_message(alert: &WalletAlert) -> String {
    let emoji = match alert.severity {
        Severity::High => "🚨",
        Severity::Medium => "⚠️",
        Severity::Low => "ℹ️",
    };
    let time = Utc
        .timestamp_opt(alert.timestamp, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| alert.timestamp.to_string());

    format!(
        "{} {} Alert\nTime: {}\nWallet: {}\nDetails: {}\nSeverity: {}",
        emoji,
        alert.alert_type.as_str().to_uppercase(),
        time,
        alert.wallet_address,
        alert.details.description,
        alert.severity.as_str()
    )
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{channel} API error: HTTP {status}")]
    Status {
        channel: &'static str,
        status: reqwest::StatusCode,
    },
}

/// One outbound notification channel
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Enable flag set and credentials present
    fn is_configured(&self, config: &NotificationConfig) -> bool;

    async fn deliver(&self, config: &NotificationConfig, message: &str) -> Result<(), ChannelError>;
}

fn check_status(channel: &'static str, response: reqwest::Response) -> Result<(), ChannelError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ChannelError::Status { channel, status })
    }
}

/// Telegram Bot API `sendMessage`
pub struct TelegramChannel {
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn is_configured(&self, config: &NotificationConfig) -> bool {
        config.telegram_enabled
            && has_value(&config.telegram_bot_token)
            && has_value(&config.telegram_chat_id)
    }

    async fn deliver(&self, config: &NotificationConfig, message: &str) -> Result<(), ChannelError> {
        let token = config.telegram_bot_token.as_deref().unwrap_or_default().trim();
        let chat_id = config.telegram_chat_id.as_deref().unwrap_or_default().trim();

        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);
        let params = serde_json::json!({
            "chat_id": chat_id,
            "text": message,
            "parse_mode": "HTML",
        });

        let response = self.client.post(&url).json(&params).send().await?;
        check_status("Telegram", response)
    }
}

/// Discord incoming webhook
pub struct DiscordChannel {
    client: reqwest::Client,
}

impl DiscordChannel {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn is_configured(&self, config: &NotificationConfig) -> bool {
        config.discord_enabled && has_value(&config.discord_webhook)
    }

    async fn deliver(&self, config: &NotificationConfig, message: &str) -> Result<(), ChannelError> {
        let webhook = config.discord_webhook.as_deref().unwrap_or_default().trim();
        let response = self
            .client
            .post(webhook)
            .json(&serde_json::json!({ "content": message }))
            .send()
            .await?;
        check_status("Discord", response)
    }
}

/// Email through an HTTP relay; without a relay the message is only logged
pub struct EmailChannel {
    client: reqwest::Client,
    relay_url: Option<String>,
}

impl EmailChannel {
    pub fn new(client: reqwest::Client, relay_url: Option<String>) -> Self {
        Self { client, relay_url }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn is_configured(&self, config: &NotificationConfig) -> bool {
        config.email_enabled && has_value(&config.email_address)
    }

    async fn deliver(&self, config: &NotificationConfig, message: &str) -> Result<(), ChannelError> {
        let to = config.email_address.as_deref().unwrap_or_default().trim();
        let subject = message.lines().next().unwrap_or("GiantWatch alert");

        let Some(relay) = &self.relay_url else {
            info!(target: "ALERTS", "Email to {} (no relay configured):\n{}", to, message);
            return Ok(());
        };

        let response = self
            .client
            .post(relay)
            .json(&serde_json::json!({
                "to": to,
                "subject": subject,
                "text": message,
            }))
            .send()
            .await?;
        check_status("Email relay", response)
    }
}

/// Fans alerts out to every enabled, configured channel
pub struct NotificationDispatcher {
    log: Arc<AlertLog>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    metrics: Arc<MetricsService>,
}

impl NotificationDispatcher {
    pub fn new(
        log: Arc<AlertLog>,
        channels: Vec<Arc<dyn NotificationChannel>>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            log,
            channels,
            metrics,
        }
    }

    /// Email, Telegram and Discord sharing one HTTP client
    pub fn with_default_channels(
        log: Arc<AlertLog>,
        email_relay_url: Option<String>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CHANNEL_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(EmailChannel::new(client.clone(), email_relay_url)),
            Arc::new(TelegramChannel::new(client.clone())),
            Arc::new(DiscordChannel::new(client)),
        ];
        Self::new(log, channels, metrics)
    }

    pub fn log(&self) -> &Arc<AlertLog> {
        &self.log
    }

    /// Record the alert in the log, then notify
    pub async fn dispatch(&self, alert: WalletAlert, config: &NotificationConfig) -> WalletAlert {
        let alert = self.log.append(alert);
        self.send_notification(&alert, config).await;
        alert
    }

    /// Deliver to each enabled channel; returns the names of channels that
    /// accepted the message.
    pub async fn send_notification(
        &self,
        alert: &WalletAlert,
        config: &NotificationConfig,
    ) -> Vec<&'static str> {
        let message = format_alert_message(alert);
        let mut delivered = Vec::new();

        for channel in self.channels.iter().filter(|c| c.is_configured(config)) {
            match channel.deliver(config, &message).await {
                Ok(()) => {
                    self.metrics
                        .notifications
                        .with_label_values(&[channel.name(), "sent"])
                        .inc();
                    delivered.push(channel.name());
                }
                Err(e) => {
                    self.metrics
                        .notifications
                        .with_label_values(&[channel.name(), "failed"])
                        .inc();
                    error!(
                        target: "ALERTS",
                        "Failed to send {} notification: {}",
                        channel.name(),
                        e
                    );
                }
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records attempts; fails when `fail` is set
    struct RecordingChannel {
        name: &'static str,
        fail: bool,
        attempts: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                attempts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_configured(&self, config: &NotificationConfig) -> bool {
            match self.name {
                "email" => config.email_enabled,
                "telegram" => config.telegram_enabled,
                _ => config.discord_enabled,
            }
        }

        async fn deliver(&self, _config: &NotificationConfig, message: &str) -> Result<(), ChannelError> {
            self.attempts.lock().push(message.to_string());
            if self.fail {
                Err(ChannelError::Status {
                    channel: "test",
                    status: reqwest::StatusCode::BAD_GATEWAY,
                })
            } else {
                Ok(())
            }
        }
    }

    fn as_channels(list: &[&Arc<RecordingChannel>]) -> Vec<Arc<dyn NotificationChannel>> {
        list.iter()
            .map(|c| Arc::clone(*c) as Arc<dyn NotificationChannel>)
            .collect()
    }

    fn sample_alert(severity: Severity) -> WalletAlert {
        WalletAlert {
            id: 0,
            wallet_address: "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".to_string(),
            alert_type: AlertType::Transfer,
            severity,
            details: AlertDetails {
                signature: "sig".to_string(),
                amount: 1_500.0,
                token: "SOL".to_string(),
                new_transactions: 1,
                description: "Sleeping giant with 120.00K SOL has awakened!".to_string(),
            },
            timestamp: 1_700_000_000,
        }
    }

    fn all_enabled() -> NotificationConfig {
        NotificationConfig {
            email_enabled: true,
            telegram_enabled: true,
            discord_enabled: true,
            ..NotificationConfig::default()
        }
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_others() {
        let email = RecordingChannel::new("email", true);
        let telegram = RecordingChannel::new("telegram", true);
        let discord = RecordingChannel::new("discord", false);
        let dispatcher = NotificationDispatcher::new(
            Arc::new(AlertLog::new()),
            as_channels(&[&email, &telegram, &discord]),
            Arc::new(MetricsService::new()),
        );

        let delivered = dispatcher
            .send_notification(&sample_alert(Severity::High), &all_enabled())
            .await;

        assert_eq!(delivered, vec!["discord"]);
        assert_eq!(email.attempts.lock().len(), 1);
        assert_eq!(telegram.attempts.lock().len(), 1);
        assert_eq!(discord.attempts.lock().len(), 1);
        // Same text for every channel
        assert_eq!(email.attempts.lock()[0], discord.attempts.lock()[0]);
    }

    #[tokio::test]
    async fn disabled_channels_are_skipped() {
        let email = RecordingChannel::new("email", false);
        let discord = RecordingChannel::new("discord", false);
        let dispatcher = NotificationDispatcher::new(
            Arc::new(AlertLog::new()),
            as_channels(&[&email, &discord]),
            Arc::new(MetricsService::new()),
        );
        let config = NotificationConfig {
            discord_enabled: true,
            ..NotificationConfig::default()
        };

        dispatcher
            .send_notification(&sample_alert(Severity::Low), &config)
            .await;

        assert!(email.attempts.lock().is_empty());
        assert_eq!(discord.attempts.lock().len(), 1);
    }

    #[tokio::test]
    async fn dispatch_appends_to_log() {
        let log = Arc::new(AlertLog::new());
        let mut live = log.subscribe();
        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&log),
            Vec::new(),
            Arc::new(MetricsService::new()),
        );

        let first = dispatcher
            .dispatch(sample_alert(Severity::Low), &NotificationConfig::default())
            .await;
        let second = dispatcher
            .dispatch(sample_alert(Severity::High), &NotificationConfig::default())
            .await;

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 2);
        assert_eq!(live.recv().await.unwrap().id, 1);
    }

    #[test]
    fn enable_flag_without_credentials_is_not_configured() {
        let client = reqwest::Client::new();
        let telegram = TelegramChannel::new(client.clone());
        let discord = DiscordChannel::new(client.clone());
        let email = EmailChannel::new(client, None);

        let mut config = all_enabled();
        config.telegram_bot_token = Some("123:abc".to_string());
        config.telegram_chat_id = Some("".to_string());
        config.discord_webhook = Some("  ".to_string());
        assert!(!telegram.is_configured(&config));
        assert!(!discord.is_configured(&config));
        assert!(!email.is_configured(&config));

        config.telegram_chat_id = Some("-100123".to_string());
        config.email_address = Some("ops@example.com".to_string());
        assert!(telegram.is_configured(&config));
        assert!(email.is_configured(&config));

        config.telegram_enabled = false;
        assert!(!telegram.is_configured(&config));
    }

    #[test]
    fn message_carries_type_wallet_and_severity() {
        let message = format_alert_message(&sample_alert(Severity::High));
        assert!(message.starts_with("🚨 TRANSFER Alert"));
        assert!(message.contains("Time: 2023-11-14 22:13:20 UTC"));
        assert!(message.contains("Wallet: 9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM"));
        assert!(message.contains("Details: Sleeping giant with 120.00K SOL has awakened!"));
        assert!(message.ends_with("Severity: high"));
    }

    #[test]
    fn balances_are_abbreviated() {
        assert_eq!(format_number(1_500_000.0), "1.50M");
        assert_eq!(format_number(120_000.0), "120.00K");
        assert_eq!(format_number(999.5), "999.50");
    }

    #[tokio::test]
    async fn email_without_relay_is_logged_only() {
        let email = EmailChannel::new(reqwest::Client::new(), None);
        let config = NotificationConfig {
            email_enabled: true,
            email_address: Some("ops@example.com".to_string()),
            ..NotificationConfig::default()
        };
        assert!(email.deliver(&config, "hello").await.is_ok());
    }
}
