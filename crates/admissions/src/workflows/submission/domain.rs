use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use mime::Mime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flat field name → value mapping taken from a form body.
///
/// Nothing is required; lookups for absent fields return `None` and
/// [`FormSubmission::text`] renders them as empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormSubmission {
    fields: BTreeMap<String, String>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a field; a repeated name replaces the earlier value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn text(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The submitter's full name as shown in subjects and greetings.
    pub fn full_name(&self) -> String {
        join_name(self.get("firstName"), self.get("lastName"))
    }
}

impl<K, V> FromIterator<(K, V)> for FormSubmission
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = Self::new();
        for (name, value) in iter {
            form.insert(name, value);
        }
        form
    }
}

/// The enquiry form body, accepted as JSON or url-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Enquiry {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub country_code: Option<String>,
    pub mobile: Option<String>,
    pub college: Option<String>,
    pub course: Option<String>,
    pub message: Option<String>,
}

impl Enquiry {
    pub fn full_name(&self) -> String {
        join_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    format!("{} {}", first.unwrap_or_default(), last.unwrap_or_default())
        .trim()
        .to_string()
}

/// The named file inputs on the registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum UploadField {
    AadharCard,
    TenthMarksheet,
    TwelfthMarksheet,
    Photo,
}

impl UploadField {
    /// Resolves a multipart field name. The form posts `twelthMarksheet`;
    /// the correctly spelled name is accepted as well.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "aadharCard" => Some(Self::AadharCard),
            "tenthMarksheet" => Some(Self::TenthMarksheet),
            "twelthMarksheet" | "twelfthMarksheet" => Some(Self::TwelfthMarksheet),
            "photo" => Some(Self::Photo),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::AadharCard => "aadharCard",
            Self::TenthMarksheet => "tenthMarksheet",
            Self::TwelfthMarksheet => "twelthMarksheet",
            Self::Photo => "photo",
        }
    }

    /// File name stem used when the upload is attached to an email.
    pub fn attachment_stem(self) -> &'static str {
        match self {
            Self::AadharCard => "aadhar_card",
            Self::TenthMarksheet => "10th_marksheet",
            Self::TwelfthMarksheet => "12th_marksheet",
            Self::Photo => "photo",
        }
    }
}

/// A file accepted by intake and stored in the transient directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub field: UploadField,
    pub original_name: String,
    pub stored_path: PathBuf,
    pub mime_type: Mime,
    pub size_bytes: u64,
}

impl UploadedFile {
    /// `aadhar_card.pdf`, `photo.jpg`, ... keeping the client's extension.
    pub fn attachment_name(&self) -> String {
        match Path::new(&self.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some(ext) => format!("{}.{ext}", self.field.attachment_stem()),
            None => self.field.attachment_stem().to_string(),
        }
    }
}

/// A rendered registration PDF on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub filename: String,
    pub path: PathBuf,
    pub content_type: Mime,
}

/// One outgoing notification, built per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: Mailbox,
    pub to: Mailbox,
    pub cc: Option<Mailbox>,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Lifecycle of one form post, used to label log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStage {
    Received,
    Validating,
    Rendering,
    Sending,
    CleaningUp,
    Responding,
    Done,
    ValidationFailed,
    RenderFailed,
    SendFailed,
}

impl SubmissionStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Rendering => "rendering",
            Self::Sending => "sending",
            Self::CleaningUp => "cleaning_up",
            Self::Responding => "responding",
            Self::Done => "done",
            Self::ValidationFailed => "validation_failed",
            Self::RenderFailed => "render_failed",
            Self::SendFailed => "send_failed",
        }
    }
}

/// Identifies one submission across log lines and transient file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionId {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
}

impl SubmissionId {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
        }
    }

    /// Milliseconds since the epoch, the prefix of transient file names.
    pub fn stamp(&self) -> i64 {
        self.received_at.timestamp_millis()
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON body returned by both submission endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
