//! Fan-out over email and SMS. Channels are attempted independently; a failing channel
//! never stops the other one and never surfaces as an error to the caller.

use serde::Serialize;

use crate::services::email::EmailProvider;
use crate::services::messaging::MessagingProvider;

#[derive(Debug, Clone, Default)]
pub struct Recipient {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub sms_opt_in: bool,
}

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub subject: String,
    pub email_body: String,
    pub sms_body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub attempted: bool,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelResult {
    fn skipped() -> Self {
        Self::default()
    }

    fn from_outcome(outcome: anyhow::Result<()>) -> Self {
        match outcome {
            Ok(()) => Self {
                attempted: true,
                delivered: true,
                error: None,
            },
            Err(e) => Self {
                attempted: true,
                delivered: false,
                error: Some(format!("{e:#}")),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub email: ChannelResult,
    pub sms: ChannelResult,
}

pub struct Notifier<'a> {
    email: &'a dyn EmailProvider,
    sms: &'a dyn MessagingProvider,
}

impl<'a> Notifier<'a> {
    pub fn new(email: &'a dyn EmailProvider, sms: &'a dyn MessagingProvider) -> Self {
        Self { email, sms }
    }

    pub async fn dispatch(&self, recipient: &Recipient, message: &OutboundMessage) -> DeliveryReport {
        let email = async {
            match recipient.email.as_deref().filter(|e| !e.trim().is_empty()) {
                Some(to) => {
                    let result = ChannelResult::from_outcome(
                        self.email.send_email(to, &message.subject, &message.email_body).await,
                    );
                    if let Some(e) = &result.error {
                        tracing::warn!(error = %e, "email delivery failed");
                    }
                    result
                }
                None => ChannelResult::skipped(),
            }
        };

        let sms = async {
            let phone = recipient.phone.as_deref().filter(|p| !p.trim().is_empty());
            match phone {
                Some(to) if recipient.sms_opt_in => {
                    let result =
                        ChannelResult::from_outcome(self.sms.send_sms(to, &message.sms_body).await);
                    if let Some(e) = &result.error {
                        tracing::warn!(error = %e, "sms delivery failed");
                    }
                    result
                }
                _ => ChannelResult::skipped(),
            }
        };

        let (email, sms) = tokio::join!(email, sms);
        DeliveryReport { email, sms }
    }
}
