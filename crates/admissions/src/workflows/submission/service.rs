use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::Multipart;
use lettre::message::Mailbox;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::document::{RegistrationDocument, RenderError};
use super::domain::{
    EmailAttachment, EmailMessage, Enquiry, FormSubmission, GeneratedDocument, SubmissionId,
    SubmissionStage, UploadedFile,
};
use super::intake::{FileIntake, IntakeError, RegistrationRequest};
use super::notify::{Notifier, NotifyError};
use super::templates::{EmailTemplates, TemplateError};
use super::transient::TransientFiles;

pub const REGISTRATION_PDF_NAME: &str = "registration.pdf";

/// Fixed addresses every notification is sent from and to.
#[derive(Debug, Clone)]
pub struct Mailboxes {
    pub from: Mailbox,
    pub admin: Mailbox,
}

/// What a successful submission tells the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub submission: SubmissionId,
    pub message: &'static str,
    pub confirmation_sent: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] IntakeError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Send(#[from] NotifyError),
}

impl SubmissionError {
    /// Terminal workflow state this error ends in.
    pub fn stage(&self) -> SubmissionStage {
        match self {
            SubmissionError::Validation(_) => SubmissionStage::ValidationFailed,
            SubmissionError::Render(_) | SubmissionError::Template(_) => {
                SubmissionStage::RenderFailed
            }
            SubmissionError::Send(_) => SubmissionStage::SendFailed,
        }
    }

    /// Human-readable message returned to the client.
    pub fn public_message(&self, registration: bool) -> String {
        match self {
            SubmissionError::Validation(err) => err.to_string(),
            SubmissionError::Render(_) | SubmissionError::Template(_) if registration => {
                "Error processing registration".to_string()
            }
            SubmissionError::Render(_) | SubmissionError::Template(_) => {
                "Error processing enquiry".to_string()
            }
            SubmissionError::Send(_) => "Failed to send email".to_string(),
        }
    }
}

/// Runs intake, rendering and notification for both forms.
pub struct SubmissionService<N> {
    notifier: Arc<N>,
    intake: FileIntake,
    templates: EmailTemplates,
    mailboxes: Mailboxes,
}

impl<N> SubmissionService<N>
where
    N: Notifier + 'static,
{
    pub fn new(
        notifier: Arc<N>,
        intake: FileIntake,
        templates: EmailTemplates,
        mailboxes: Mailboxes,
    ) -> Self {
        Self {
            notifier,
            intake,
            templates,
            mailboxes,
        }
    }

    /// Reads and validates a registration body, then runs [`Self::register`].
    pub async fn register_multipart(
        &self,
        multipart: Multipart,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        debug!(stage = SubmissionStage::Validating.label(), "registration received");
        let request = self.intake.receive(multipart).await?;
        self.register(request).await
    }

    /// Renders the registration PDF and emails it with the uploads to the
    /// admin address. Every transient file of the request is deleted before
    /// this returns, whether or not the send succeeded.
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let (id, form, uploads, mut transient) = request.into_parts();

        let outcome = self
            .dispatch_registration(id, &form, &uploads, &mut transient)
            .await;

        debug!(
            submission = %id.id,
            stage = SubmissionStage::CleaningUp.label(),
            "releasing transient files"
        );
        let report = transient.release().await;
        if !report.is_clean() {
            warn!(
                submission = %id.id,
                failures = report.failures.len(),
                "some transient files could not be removed"
            );
        }

        match &outcome {
            Ok(_) => info!(
                submission = %id.id,
                stage = SubmissionStage::Done.label(),
                uploads = uploads.len(),
                "registration delivered"
            ),
            Err(err) => warn!(
                submission = %id.id,
                stage = err.stage().label(),
                error = %err,
                "registration failed"
            ),
        }
        outcome
    }

    async fn dispatch_registration(
        &self,
        id: SubmissionId,
        form: &FormSubmission,
        uploads: &[UploadedFile],
        transient: &mut TransientFiles,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        debug!(
            submission = %id.id,
            stage = SubmissionStage::Rendering.label(),
            "rendering registration"
        );
        let document = self.render_registration(id, form, transient).await?;

        debug!(
            submission = %id.id,
            stage = SubmissionStage::Sending.label(),
            "sending registration"
        );
        let message = self.registration_message(form, &document, uploads)?;
        self.notifier.send(&message).await?;

        Ok(SubmissionReceipt {
            submission: id,
            message: "Registration submitted successfully",
            confirmation_sent: message.cc.is_some(),
        })
    }

    /// Writes the PDF next to the uploads and returns only once the file is
    /// flushed and synced.
    async fn render_registration(
        &self,
        id: SubmissionId,
        form: &FormSubmission,
        transient: &mut TransientFiles,
    ) -> Result<GeneratedDocument, SubmissionError> {
        let bytes = RegistrationDocument::from_submission(form).to_pdf()?;

        let dir = self.intake.upload_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(RenderError::from)?;
        let path: PathBuf =
            dir.join(format!("registration-{}-{}.pdf", id.stamp(), id.id.simple()));

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(RenderError::from)?;
        transient.track(&path);
        file.write_all(&bytes).await.map_err(RenderError::from)?;
        file.sync_all().await.map_err(RenderError::from)?;

        Ok(GeneratedDocument {
            path,
            size_bytes: bytes.len() as u64,
        })
    }

    fn registration_message(
        &self,
        form: &FormSubmission,
        document: &GeneratedDocument,
        uploads: &[UploadedFile],
    ) -> Result<EmailMessage, SubmissionError> {
        let cc = submitter_mailbox(form.get("email"));
        if cc.is_none() {
            warn!("registration has no usable submitter email; sending without cc");
        }

        let mut ordered: Vec<&UploadedFile> = uploads.iter().collect();
        ordered.sort_by_key(|upload| upload.field);

        let mut attachments = vec![EmailAttachment {
            filename: REGISTRATION_PDF_NAME.to_string(),
            path: document.path.clone(),
            content_type: mime::APPLICATION_PDF,
        }];
        attachments.extend(ordered.into_iter().map(|upload| EmailAttachment {
            filename: upload.attachment_name(),
            path: upload.stored_path.clone(),
            content_type: upload.mime_type.clone(),
        }));

        Ok(EmailMessage {
            from: self.mailboxes.from.clone(),
            to: self.mailboxes.admin.clone(),
            cc,
            subject: format!("New Registration: {}", form.full_name()),
            html_body: self.templates.registration_admin(form)?,
            attachments,
        })
    }

    /// Notifies the admin address, then sends a confirmation to the
    /// submitter. Only the first send decides the outcome.
    pub async fn enquire(&self, enquiry: Enquiry) -> Result<SubmissionReceipt, SubmissionError> {
        let id = SubmissionId::new();
        debug!(submission = %id.id, stage = SubmissionStage::Received.label(), "enquiry received");

        let admin_message = EmailMessage {
            from: self.mailboxes.from.clone(),
            to: self.mailboxes.admin.clone(),
            cc: None,
            subject: format!("New Enquiry from {}", enquiry.full_name()),
            html_body: self.templates.enquiry_admin(&enquiry)?,
            attachments: Vec::new(),
        };

        debug!(submission = %id.id, stage = SubmissionStage::Sending.label(), "sending enquiry");
        if let Err(err) = self.notifier.send(&admin_message).await {
            let err = SubmissionError::from(err);
            warn!(submission = %id.id, stage = err.stage().label(), error = %err, "enquiry failed");
            return Err(err);
        }

        let confirmation_sent = self.send_confirmation(id, &enquiry).await;
        info!(
            submission = %id.id,
            stage = SubmissionStage::Done.label(),
            confirmation_sent,
            "enquiry delivered"
        );

        Ok(SubmissionReceipt {
            submission: id,
            message: "Enquiry submitted successfully",
            confirmation_sent,
        })
    }

    async fn send_confirmation(&self, id: SubmissionId, enquiry: &Enquiry) -> bool {
        let Some(to) = submitter_mailbox(enquiry.email.as_deref()) else {
            warn!(submission = %id.id, "enquiry has no usable email; confirmation skipped");
            return false;
        };

        let body = match self.templates.enquiry_confirmation(enquiry) {
            Ok(body) => body,
            Err(err) => {
                warn!(submission = %id.id, error = %err, "confirmation could not be rendered");
                return false;
            }
        };

        let confirmation = EmailMessage {
            from: self.mailboxes.from.clone(),
            to,
            cc: None,
            subject: "Your Enquiry Has Been Received".to_string(),
            html_body: body,
            attachments: Vec::new(),
        };

        match self.notifier.send(&confirmation).await {
            Ok(()) => true,
            Err(err) => {
                warn!(submission = %id.id, error = %err, "confirmation email failed");
                false
            }
        }
    }
}

fn submitter_mailbox(email: Option<&str>) -> Option<Mailbox> {
    email
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse().ok())
}
