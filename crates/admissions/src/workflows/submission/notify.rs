use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use super::domain::EmailMessage;
use crate::config::{MailConfig, SmtpSecurity};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid attachment content type '{0}'")]
    ContentType(String),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("mail relay rejected the message: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("mail relay {0} is unavailable")]
    Unavailable(String),
}

/// Delivers composed notifications. One send attempt per call.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Mail-relay client shared by every request for the process lifetime.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    relay_host: String,
}

impl SmtpNotifier {
    pub fn from_config(config: &MailConfig) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let builder = match config.security {
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.relay_host)?
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.relay_host)?,
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.relay_host)
            }
        };

        let transport = builder
            .port(config.relay_port)
            .credentials(credentials)
            .build();

        info!(
            host = %config.relay_host,
            port = config.relay_port,
            security = ?config.security,
            "mail relay configured"
        );

        Ok(Self {
            transport,
            relay_host: config.relay_host.clone(),
        })
    }

    /// Opens a connection to the relay without sending anything.
    pub async fn verify(&self) -> Result<(), NotifyError> {
        if self.transport.test_connection().await? {
            Ok(())
        } else {
            Err(NotifyError::Unavailable(self.relay_host.clone()))
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let email = compose(message).await?;
        self.transport.send(email).await?;
        info!(
            to = %message.to,
            attachments = message.attachments.len(),
            "notification sent"
        );
        Ok(())
    }
}

/// Builds the MIME message, reading attachments from disk.
pub async fn compose(message: &EmailMessage) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(message.from.clone())
        .to(message.to.clone())
        .subject(message.subject.clone());
    if let Some(cc) = &message.cc {
        builder = builder.cc(cc.clone());
    }

    if message.attachments.is_empty() {
        return Ok(builder
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())?);
    }

    let mut parts = MultiPart::mixed().singlepart(SinglePart::html(message.html_body.clone()));
    for attachment in &message.attachments {
        let body = tokio::fs::read(&attachment.path)
            .await
            .map_err(|source| NotifyError::Attachment {
                path: attachment.path.clone(),
                source,
            })?;
        let content_type = ContentType::parse(attachment.content_type.as_ref())
            .map_err(|_| NotifyError::ContentType(attachment.content_type.to_string()))?;
        parts = parts
            .singlepart(Attachment::new(attachment.filename.clone()).body(body, content_type));
    }

    Ok(builder.multipart(parts)?)
}
