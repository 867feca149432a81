//! SMS delivery for OTP codes.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SmsProvider;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<()>;
}

/// Build the sender selected by configuration.
pub fn from_provider(provider: &SmsProvider) -> Result<Arc<dyn SmsSender>> {
    Ok(match provider {
        SmsProvider::Log => Arc::new(LogSms),
        SmsProvider::Twilio {
            account_sid,
            auth_token,
            from_number,
        } => Arc::new(TwilioSms::new(account_sid, auth_token, from_number)?),
    })
}

/// Writes messages to the log instead of sending them (development only).
pub struct LogSms;

#[async_trait]
impl SmsSender for LogSms {
    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        info!(to = to, body = body, "SMS (log provider)");
        Ok(())
    }
}

/// Twilio Programmable Messaging
pub struct TwilioSms {
    client: Client,
    url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

impl TwilioSms {
    pub fn new(account_sid: &str, auth_token: &str, from_number: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: format!("{}/Accounts/{}/Messages.json", TWILIO_API_BASE, account_sid),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from_number: from_number.to_string(),
        })
    }

    fn retry_policy() -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..ExponentialBackoff::default()
        }
    }
}

#[async_trait]
impl SmsSender for TwilioSms {
    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        let params = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];

        let send = || async {
            let response = self
                .client
                .post(&self.url)
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .form(&params)
                .send()
                .await
                .map_err(|e| {
                    warn!(error = %e, "Twilio request failed, retrying");
                    backoff::Error::transient(anyhow::Error::new(e))
                })?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let text = response.text().await.unwrap_or_default();
            let err = anyhow!("Twilio returned {}: {}", status, text);
            if status.is_server_error() || status.as_u16() == 429 {
                warn!(status = %status, "Twilio unavailable, retrying");
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            }
        };

        backoff::future::retry(Self::retry_policy(), send).await?;
        debug!("SMS sent via Twilio");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_provider_always_succeeds() {
        let sender = from_provider(&SmsProvider::Log).unwrap();
        assert!(sender.send_sms("+972501234567", "Your code is 123456").await.is_ok());
    }

    #[test]
    fn twilio_url_includes_account() {
        let twilio = TwilioSms::new("AC123", "secret", "+15550001111").unwrap();
        assert_eq!(
            twilio.url,
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }
}
