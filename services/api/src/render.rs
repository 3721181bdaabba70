use admissions::config::TelemetryConfig;
use admissions::error::AppError;
use admissions::telemetry;
use admissions::workflows::submission::{FormSubmission, RegistrationDocument, TransientFiles};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct RenderArgs {
    /// JSON object mapping registration field names to values
    #[arg(long)]
    pub(crate) fields: PathBuf,
    /// Where to write the PDF
    #[arg(long, short)]
    pub(crate) output: PathBuf,
}

pub(crate) async fn run_render(args: RenderArgs) -> Result<(), AppError> {
    telemetry::init(&TelemetryConfig::from_env()?)?;

    let written = render_to(&args.fields, &args.output).await?;
    println!(
        "Registration PDF written to {} ({written} bytes)",
        args.output.display()
    );
    Ok(())
}

/// Renders the registration document for the fields in `fields` into
/// `output`. A partially written new output is removed on failure.
pub(crate) async fn render_to(fields: &Path, output: &Path) -> Result<u64, AppError> {
    let raw = tokio::fs::read(fields).await?;
    let form: FormSubmission = serde_json::from_slice(&raw)?;
    let pdf = RegistrationDocument::from_submission(&form).to_pdf()?;

    let mut pending = guard_new_output(output).await?;
    tokio::fs::write(output, &pdf).await?;
    pending.forget(output);

    info!(
        output = %output.display(),
        fields = form.len(),
        bytes = pdf.len(),
        "registration rendered"
    );
    Ok(pdf.len() as u64)
}

/// Tracks `output` for removal only when this command is about to create it.
async fn guard_new_output(output: &Path) -> Result<TransientFiles, AppError> {
    let mut pending = TransientFiles::new();
    if !tokio::fs::try_exists(output).await? {
        pending.track(output.to_path_buf());
    }
    Ok(pending)
}
