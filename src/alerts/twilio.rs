use super::{format, AlertChannel, AlertError};
use crate::models::SignalRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const TWILIO_API_BASE: &str = "https://api.twilio.com";
const WHATSAPP_SANDBOX_NUMBER: &str = "whatsapp:+14155238886";

/// Account SID and auth token for the Twilio REST API
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Shared Messages API client for the SMS and WhatsApp channels
#[derive(Clone)]
struct TwilioClient {
    client: Client,
    base_url: String,
    credentials: TwilioCredentials,
}

impl TwilioClient {
    fn new(credentials: TwilioCredentials) -> Self {
        Self {
            client: Client::new(),
            base_url: TWILIO_API_BASE.to_string(),
            credentials,
        }
    }

    async fn create_message(
        &self,
        channel: &'static str,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<(), AlertError> {
        if self.credentials.account_sid.is_empty() {
            return Err(AlertError::NotConfigured {
                channel,
                missing: "TWILIO_ACCOUNT_SID",
            });
        }
        if self.credentials.auth_token.is_empty() {
            return Err(AlertError::NotConfigured {
                channel,
                missing: "TWILIO_AUTH_TOKEN",
            });
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.credentials.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.credentials.account_sid,
                Some(&self.credentials.auth_token),
            )
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        let parsed: Option<MessageResponse> = response.json().await.ok();

        if !status.is_success() {
            return Err(AlertError::Rejected {
                channel,
                status,
                detail: parsed
                    .and_then(|r| r.message)
                    .unwrap_or_else(|| "no error message".to_string()),
            });
        }

        let sid = parsed.and_then(|r| r.sid).unwrap_or_default();
        tracing::debug!(channel, to, sid = %sid, "Twilio message created");
        Ok(())
    }
}

/// Ensure an SMS number carries the international `+` prefix
pub fn normalize_sms_number(number: &str) -> String {
    let number = number.trim();
    if number.starts_with('+') {
        number.to_string()
    } else {
        format!("+{}", number)
    }
}

/// Ensure a number is addressed through the WhatsApp transport
pub fn normalize_whatsapp_number(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", normalize_sms_number(number))
    }
}

/// SMS alerts through Twilio
#[derive(Clone)]
pub struct SmsChannel {
    twilio: TwilioClient,
    from: String,
    to: String,
}

impl SmsChannel {
    pub fn new(credentials: TwilioCredentials, from: &str, to: &str) -> Self {
        Self {
            twilio: TwilioClient::new(credentials),
            from: from.trim().to_string(),
            to: normalize_sms_number(to),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.twilio.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl AlertChannel for SmsChannel {
    fn name(&self) -> &str {
        "sms"
    }

    async fn send(&self, record: &SignalRecord) -> Result<(), AlertError> {
        if self.from.is_empty() {
            return Err(AlertError::NotConfigured {
                channel: "sms",
                missing: "TWILIO_PHONE_NUMBER",
            });
        }
        self.twilio
            .create_message("sms", &self.from, &self.to, &format::sms_message(record))
            .await
    }
}

/// WhatsApp alerts through Twilio
#[derive(Clone)]
pub struct WhatsAppChannel {
    twilio: TwilioClient,
    from: String,
    to: String,
}

impl WhatsAppChannel {
    /// `from` defaults to the Twilio sandbox sender when not given
    pub fn new(credentials: TwilioCredentials, from: Option<&str>, to: &str) -> Self {
        Self {
            twilio: TwilioClient::new(credentials),
            from: normalize_whatsapp_number(from.unwrap_or(WHATSAPP_SANDBOX_NUMBER)),
            to: normalize_whatsapp_number(to),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.twilio.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl AlertChannel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, record: &SignalRecord) -> Result<(), AlertError> {
        self.twilio
            .create_message(
                "whatsapp",
                &self.from,
                &self.to,
                &format::whatsapp_message(record),
            )
            .await
    }
}
