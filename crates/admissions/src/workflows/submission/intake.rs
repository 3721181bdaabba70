use std::io;
use std::path::{Path, PathBuf};

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use mime::Mime;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::domain::{FormSubmission, SubmissionId, UploadField, UploadedFile};
use super::transient::{CleanupReport, TransientFiles};

/// Largest accepted upload, per file.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Request body cap for registrations: four full-size files plus text fields.
pub const REGISTRATION_BODY_LIMIT: usize = 4 * MAX_UPLOAD_BYTES as usize + 1024 * 1024;

const ALLOWED_TYPES: [Mime; 3] = [mime::IMAGE_JPEG, mime::IMAGE_PNG, mime::APPLICATION_PDF];

const MAX_NAME_ATTEMPTS: u32 = 32;

/// Rules applied to every uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakePolicy {
    pub max_bytes: u64,
    /// Require the file's magic bytes to match an allowed type as well.
    pub sniff_content: bool,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            sniff_content: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Only JPG, PNG, and PDF files are allowed")]
    DisallowedType {
        field: UploadField,
        declared: Option<String>,
    },
    #[error("Only JPG, PNG, and PDF files are allowed")]
    ContentMismatch {
        field: UploadField,
        detected: Option<&'static str>,
    },
    #[error("File too large")]
    TooLarge { field: UploadField, limit: u64 },
    #[error("Unexpected field")]
    UnexpectedField(String),
    #[error("Malformed form data")]
    Multipart(#[from] MultipartError),
    #[error("Could not store upload")]
    Storage(#[from] io::Error),
}

/// Text fields and stored uploads of one registration, plus ownership of the
/// files written for it.
#[derive(Debug)]
pub struct RegistrationRequest {
    pub id: SubmissionId,
    pub form: FormSubmission,
    pub uploads: Vec<UploadedFile>,
    transient: TransientFiles,
}

impl RegistrationRequest {
    pub fn new(form: FormSubmission) -> Self {
        Self {
            id: SubmissionId::new(),
            form,
            uploads: Vec::new(),
            transient: TransientFiles::new(),
        }
    }

    pub fn upload(&self, field: UploadField) -> Option<&UploadedFile> {
        self.uploads.iter().find(|upload| upload.field == field)
    }

    pub fn transient(&self) -> &TransientFiles {
        &self.transient
    }

    pub(crate) fn into_parts(
        self,
    ) -> (SubmissionId, FormSubmission, Vec<UploadedFile>, TransientFiles) {
        (self.id, self.form, self.uploads, self.transient)
    }

    /// Deletes everything stored for this request.
    pub async fn discard(self) -> CleanupReport {
        self.transient.release().await
    }
}

/// Validates uploads and writes accepted files to the transient directory.
#[derive(Debug, Clone)]
pub struct FileIntake {
    upload_dir: PathBuf,
    policy: IntakePolicy,
}

impl FileIntake {
    pub fn new(upload_dir: impl Into<PathBuf>, policy: IntakePolicy) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            policy,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Reads a registration multipart body. On any rejection the rest of the
    /// body is drained and files already stored are deleted.
    pub async fn receive(
        &self,
        mut multipart: Multipart,
    ) -> Result<RegistrationRequest, IntakeError> {
        let mut request = RegistrationRequest::new(FormSubmission::new());

        match self.read_fields(&mut multipart, &mut request).await {
            Ok(()) => Ok(request),
            Err(err) => {
                warn!(submission = %request.id.id, error = %err, "registration upload rejected");
                drain(&mut multipart).await;
                request.discard().await;
                Err(err)
            }
        }
    }

    async fn read_fields(
        &self,
        multipart: &mut Multipart,
        request: &mut RegistrationRequest,
    ) -> Result<(), IntakeError> {
        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            let original_name = match field.file_name() {
                None => {
                    let value = field.text().await?;
                    request.form.insert(name, value);
                    continue;
                }
                Some(file_name) => file_name.to_string(),
            };

            if original_name.is_empty() {
                // An <input type="file"> left blank still posts an empty part.
                while field.chunk().await?.is_some() {}
                continue;
            }

            let upload_field = UploadField::from_key(&name)
                .ok_or_else(|| IntakeError::UnexpectedField(name.clone()))?;
            let declared = field.content_type().map(str::to_string);
            self.check_declared(upload_field, declared.as_deref())?;

            let mut body = Vec::new();
            while let Some(chunk) = field.chunk().await? {
                if (body.len() + chunk.len()) as u64 > self.policy.max_bytes {
                    return Err(IntakeError::TooLarge {
                        field: upload_field,
                        limit: self.policy.max_bytes,
                    });
                }
                body.extend_from_slice(&chunk);
            }

            self.accept(
                request,
                upload_field,
                &original_name,
                declared.as_deref(),
                &body,
            )
            .await?;
        }

        Ok(())
    }

    /// Validates one file and stores it as `<timestamp>-<original name>`.
    pub async fn accept(
        &self,
        request: &mut RegistrationRequest,
        field: UploadField,
        original_name: &str,
        declared: Option<&str>,
        body: &[u8],
    ) -> Result<(), IntakeError> {
        if request.upload(field).is_some() {
            return Err(IntakeError::UnexpectedField(field.key().to_string()));
        }

        let mime_type = self.check_declared(field, declared)?;
        let size_bytes = body.len() as u64;
        if size_bytes > self.policy.max_bytes {
            return Err(IntakeError::TooLarge {
                field,
                limit: self.policy.max_bytes,
            });
        }
        if self.policy.sniff_content {
            check_content(field, body)?;
        }

        fs::create_dir_all(&self.upload_dir).await?;
        let (stored_path, mut file) = self
            .create_unique(request.id.stamp(), original_name)
            .await?;
        request.transient.track(&stored_path);

        file.write_all(body).await?;
        file.sync_all().await?;

        debug!(
            submission = %request.id.id,
            field = field.key(),
            path = %stored_path.display(),
            size_bytes,
            "upload stored"
        );

        request.uploads.push(UploadedFile {
            field,
            original_name: original_name.to_string(),
            stored_path,
            mime_type,
            size_bytes,
        });
        Ok(())
    }

    fn check_declared(
        &self,
        field: UploadField,
        declared: Option<&str>,
    ) -> Result<Mime, IntakeError> {
        let parsed = declared.and_then(|value| value.parse::<Mime>().ok());
        parsed
            .and_then(|mime| {
                ALLOWED_TYPES
                    .iter()
                    .find(|allowed| allowed.essence_str() == mime.essence_str())
                    .cloned()
            })
            .ok_or_else(|| IntakeError::DisallowedType {
                field,
                declared: declared.map(str::to_string),
            })
    }

    async fn create_unique(
        &self,
        stamp: i64,
        original_name: &str,
    ) -> io::Result<(PathBuf, fs::File)> {
        let safe_name = stored_file_name(original_name);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{stamp}-{safe_name}")
            } else {
                format!("{stamp}-{attempt}-{safe_name}")
            };
            let path = self.upload_dir.join(name);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free transient name for '{safe_name}'"),
        ))
    }
}

fn check_content(field: UploadField, body: &[u8]) -> Result<(), IntakeError> {
    let detected = infer::get(body).map(|kind| kind.mime_type());
    match detected {
        Some(found) if ALLOWED_TYPES.iter().any(|allowed| allowed.essence_str() == found) => Ok(()),
        _ => Err(IntakeError::ContentMismatch { field, detected }),
    }
}

/// Client file names are sanitised before they become part of a path.
pub(crate) fn stored_file_name(original_name: &str) -> String {
    let cleaned = sanitize_filename::sanitize(original_name.trim());
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

async fn drain(multipart: &mut Multipart) {
    while let Ok(Some(mut field)) = multipart.next_field().await {
        while let Ok(Some(_)) = field.chunk().await {}
    }
}
