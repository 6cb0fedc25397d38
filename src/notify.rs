//! Outbound email.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail provider rejected the message with status {status}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), NotifyError>;
}

/// Picks SendGrid when an API key is configured, otherwise logs the mail.
pub fn from_config(config: &MailConfig) -> Result<Box<dyn Notifier>, NotifyError> {
    Ok(match &config.sendgrid_api_key {
        Some(key) => Box::new(SendGridNotifier::new(
            key.clone(),
            config.sendgrid_base_url.clone(),
            config.from.clone(),
        )?),
        None => Box::new(LogNotifier),
    })
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: OutboundEmail) -> Result<(), NotifyError> {
        info!(
            to = ?email.to,
            subject = %email.subject,
            attachment = ?email.attachment.as_ref().map(|a| &a.filename),
            "mail delivery disabled, message logged"
        );
        Ok(())
    }
}

pub struct SendGridNotifier {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    from: String,
}

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<MailAttachment<'a>>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Serialize)]
struct MailAttachment<'a> {
    content: String,
    filename: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    disposition: &'static str,
}

impl SendGridNotifier {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        from: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    #[instrument(skip(self, email), fields(subject = %email.subject))]
    async fn send(&self, email: OutboundEmail) -> Result<(), NotifyError> {
        let attachments = email
            .attachment
            .as_ref()
            .map(|a| MailAttachment {
                content: STANDARD.encode(&a.bytes),
                filename: &a.filename,
                kind: &a.content_type,
                disposition: "attachment",
            })
            .into_iter()
            .collect();

        let payload = MailSend {
            personalizations: [Personalization {
                to: email.to.iter().map(|e| Address { email: e }).collect(),
            }],
            from: Address { email: &self.from },
            subject: &email.subject,
            content: [Content {
                kind: "text/html",
                value: &email.html,
            }],
            attachments,
        };

        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "sendgrid rejected message");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    use super::*;

    fn email() -> OutboundEmail {
        OutboundEmail {
            to: vec!["jane@example.com".into()],
            subject: "Invoice INV-1".into(),
            html: "<p>hi</p>".into(),
            attachment: Some(Attachment {
                filename: "invoice.pdf".into(),
                content_type: "application/pdf".into(),
                bytes: b"%PDF".to_vec(),
            }),
        }
    }

    #[tokio::test]
    async fn sendgrid_posts_base64_attachment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("authorization", "Bearer sg-key"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            SendGridNotifier::new(SecretString::from("sg-key"), server.uri(), "shop@example.com")
                .unwrap();
        notifier.send(email()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["attachments"][0]["content"], "JVBERg==");
        assert_eq!(body["personalizations"][0]["to"][0]["email"], "jane@example.com");
        assert_eq!(body["from"]["email"], "shop@example.com");
    }

    #[tokio::test]
    async fn sendgrid_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let notifier =
            SendGridNotifier::new(SecretString::from("nope"), server.uri(), "shop@example.com")
                .unwrap();
        let err = notifier.send(email()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        LogNotifier.send(email()).await.unwrap();
    }
}
