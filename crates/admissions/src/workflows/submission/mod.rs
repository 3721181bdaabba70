//! Registration and enquiry submissions: upload intake, PDF rendering,
//! email notification and transient-file cleanup.

pub mod document;
pub mod domain;
pub mod intake;
pub mod notify;
pub mod router;
pub mod service;
pub mod templates;
pub mod transient;

#[cfg(test)]
mod tests;

pub use document::{Block, RegistrationDocument, RenderError};
pub use domain::{
    ApiResponse, EmailAttachment, EmailMessage, Enquiry, FormSubmission, GeneratedDocument,
    SubmissionId, SubmissionStage, UploadField, UploadedFile,
};
pub use intake::{
    FileIntake, IntakeError, IntakePolicy, RegistrationRequest, MAX_UPLOAD_BYTES,
    REGISTRATION_BODY_LIMIT,
};
pub use notify::{Notifier, NotifyError, SmtpNotifier};
pub use router::{submission_router, SubmittedForm};
pub use service::{
    Mailboxes, SubmissionError, SubmissionReceipt, SubmissionService, REGISTRATION_PDF_NAME,
};
pub use templates::{EmailTemplates, TemplateError};
pub use transient::{CleanupError, CleanupReport, TransientFiles};
