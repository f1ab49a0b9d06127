use anyhow::Context;
use async_trait::async_trait;

use super::MessagingProvider;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

pub struct TwilioSmsProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioSmsProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: reqwest::Client::new(),
        }
    }

    fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }
}

#[async_trait]
impl MessagingProvider for TwilioSmsProvider {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        if !self.is_configured() {
            tracing::warn!(to = %to, "Twilio credentials not set, SMS not sent");
            return Ok(());
        }

        let url = format!("{TWILIO_API_BASE}/Accounts/{}/Messages.json", self.account_sid);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .context("failed to reach Twilio")?
            .error_for_status()
            .context("Twilio rejected the message")?;

        let sid = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v["sid"].as_str().map(str::to_string))
            .unwrap_or_default();
        tracing::info!(to = %to, sid = %sid, "SMS sent");

        Ok(())
    }
}
