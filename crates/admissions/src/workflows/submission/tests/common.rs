use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use serde_json::Value;

use crate::workflows::submission::domain::{EmailMessage, Enquiry, FormSubmission};
use crate::workflows::submission::intake::{FileIntake, IntakePolicy};
use crate::workflows::submission::notify::{Notifier, NotifyError};
use crate::workflows::submission::service::{Mailboxes, SubmissionService};
use crate::workflows::submission::templates::EmailTemplates;

pub(super) const ADMIN: &str = "admissions@college.test";
pub(super) const SENDER: &str = "relay@college.test";
pub(super) const BOUNDARY: &str = "----admissions-test-boundary";

pub(super) const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";
pub(super) const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x02\0\0\0";
pub(super) const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0\x01\x01\0\0\x01\0\x01\0\0";

/// What the notifier saw, including attachment contents read at send time.
#[derive(Debug, Clone)]
pub(super) struct SentEmail {
    pub(super) message: EmailMessage,
    pub(super) attachments: Vec<(String, Option<Vec<u8>>)>,
}

/// In-memory stand-in for the mail relay.
#[derive(Debug, Default)]
pub(super) struct RecordingNotifier {
    sent: Mutex<Vec<SentEmail>>,
    rejected_recipients: Vec<String>,
}

impl RecordingNotifier {
    pub(super) fn rejecting(recipient: &str) -> Self {
        Self {
            sent: Mutex::default(),
            rejected_recipients: vec![recipient.to_string()],
        }
    }

    pub(super) fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let recipient = message.to.email.to_string();
        if self.rejected_recipients.contains(&recipient) {
            return Err(NotifyError::Unavailable("relay.test".to_string()));
        }

        let attachments = message
            .attachments
            .iter()
            .map(|attachment| {
                (
                    attachment.filename.clone(),
                    std::fs::read(&attachment.path).ok(),
                )
            })
            .collect();

        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(SentEmail {
                message: message.clone(),
                attachments,
            });
        Ok(())
    }
}

pub(super) fn mailboxes() -> Mailboxes {
    Mailboxes {
        from: SENDER.parse().expect("sender mailbox"),
        admin: ADMIN.parse().expect("admin mailbox"),
    }
}

pub(super) fn intake(dir: &Path) -> FileIntake {
    FileIntake::new(dir, IntakePolicy::default())
}

pub(super) fn build_service_with(
    dir: &Path,
    notifier: RecordingNotifier,
) -> (Arc<SubmissionService<RecordingNotifier>>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(notifier);
    let service = Arc::new(SubmissionService::new(
        notifier.clone(),
        intake(dir),
        EmailTemplates::new().expect("templates compile"),
        mailboxes(),
    ));
    (service, notifier)
}

pub(super) fn build_service(
    dir: &Path,
) -> (Arc<SubmissionService<RecordingNotifier>>, Arc<RecordingNotifier>) {
    build_service_with(dir, RecordingNotifier::default())
}

pub(super) fn registration_form() -> FormSubmission {
    [
        ("firstName", "Asha"),
        ("lastName", "Rao"),
        ("dob", "2006-04-12"),
        ("gender", "Female"),
        ("countryCode", "+91"),
        ("mobile", "9998887776"),
        ("email", "a@x.com"),
        ("address", "12 Lake Road"),
        ("city", "Chennai"),
        ("state", "Tamil Nadu"),
        ("pincode", "600001"),
        ("preferredCollege", "ABC"),
        ("preferredCourse", "CS"),
        ("schoolName10th", "St. Mary's"),
        ("math10thMarks", "91"),
    ]
    .into_iter()
    .collect()
}

pub(super) fn enquiry() -> Enquiry {
    Enquiry {
        first_name: Some("Asha".to_string()),
        last_name: Some("Rao".to_string()),
        email: Some("a@x.com".to_string()),
        country_code: Some("+91".to_string()),
        mobile: Some("9998887776".to_string()),
        college: Some("ABC".to_string()),
        course: Some("CS".to_string()),
        message: Some("Hi".to_string()),
    }
}

pub(super) fn dir_entries(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub(super) struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub(super) fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub(super) fn file(
        mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        body: &[u8],
    ) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(body);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub(super) fn form(mut self, form: &FormSubmission, keys: &[&str]) -> Self {
        for key in keys {
            self = self.text(key, form.text(key));
        }
        self
    }

    pub(super) fn into_request(mut self, uri: &str) -> Request<Body> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.bytes))
            .expect("request builds")
    }
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
