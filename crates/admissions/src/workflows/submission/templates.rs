use tera::{Context, Tera};

use super::domain::{Enquiry, FormSubmission};

const REGISTRATION_ADMIN: &str = "registration_admin.html";
const ENQUIRY_ADMIN: &str = "enquiry_admin.html";
const ENQUIRY_CONFIRMATION: &str = "enquiry_confirmation.html";

const REGISTRATION_ADMIN_BODY: &str = r#"<h2>New Student Registration</h2>
<p><strong>Name:</strong> {{ first_name }} {{ last_name }}</p>
<p><strong>Email:</strong> {{ email }}</p>
<p><strong>Phone:</strong> {{ country_code }} {{ mobile }}</p>
<p><strong>College Preference:</strong> {{ preferred_college }}</p>
<p><strong>Course Preference:</strong> {{ preferred_course }}</p>
<p>Please see the attached PDF for complete registration details.</p>
"#;

const ENQUIRY_ADMIN_BODY: &str = r#"<h2>New Enquiry Submission</h2>
<p><strong>Name:</strong> {{ first_name }} {{ last_name }}</p>
<p><strong>Email:</strong> {{ email }}</p>
<p><strong>Phone:</strong> {{ country_code }} {{ mobile }}</p>
<p><strong>College of Interest:</strong> {{ college }}</p>
<p><strong>Course of Interest:</strong> {{ course }}</p>
<p><strong>Message:</strong></p>
<p>{{ message }}</p>
"#;

const ENQUIRY_CONFIRMATION_BODY: &str = r#"<h2>Thank You for Your Enquiry</h2>
<p>Dear {{ first_name }} {{ last_name }},</p>
<p>We have received your enquiry about {{ course }} at {{ college }}. Our admissions team will review your message and get back to you shortly.</p>
<p>Here's a summary of your enquiry:</p>
<p><strong>College of Interest:</strong> {{ college }}</p>
<p><strong>Course of Interest:</strong> {{ course }}</p>
<p><strong>Your Message:</strong></p>
<p>{{ message }}</p>
<p>If you have any urgent questions, please feel free to call our admissions office.</p>
<p>Best regards,<br>Admissions Team</p>
"#;

#[derive(Debug, thiserror::Error)]
#[error("email template error: {0}")]
pub struct TemplateError(#[from] tera::Error);

/// HTML bodies for outgoing notifications. Submitted values are escaped.
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    tera: Tera,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (REGISTRATION_ADMIN, REGISTRATION_ADMIN_BODY),
            (ENQUIRY_ADMIN, ENQUIRY_ADMIN_BODY),
            (ENQUIRY_CONFIRMATION, ENQUIRY_CONFIRMATION_BODY),
        ])?;
        Ok(Self { tera })
    }

    pub fn registration_admin(&self, form: &FormSubmission) -> Result<String, TemplateError> {
        let mut context = Context::new();
        for (key, field) in [
            ("first_name", "firstName"),
            ("last_name", "lastName"),
            ("email", "email"),
            ("country_code", "countryCode"),
            ("mobile", "mobile"),
            ("preferred_college", "preferredCollege"),
            ("preferred_course", "preferredCourse"),
        ] {
            context.insert(key, form.text(field));
        }
        Ok(self.tera.render(REGISTRATION_ADMIN, &context)?)
    }

    pub fn enquiry_admin(&self, enquiry: &Enquiry) -> Result<String, TemplateError> {
        Ok(self.tera.render(ENQUIRY_ADMIN, &enquiry_context(enquiry))?)
    }

    pub fn enquiry_confirmation(&self, enquiry: &Enquiry) -> Result<String, TemplateError> {
        Ok(self
            .tera
            .render(ENQUIRY_CONFIRMATION, &enquiry_context(enquiry))?)
    }
}

fn enquiry_context(enquiry: &Enquiry) -> Context {
    let mut context = Context::new();
    for (key, value) in [
        ("first_name", &enquiry.first_name),
        ("last_name", &enquiry.last_name),
        ("email", &enquiry.email),
        ("country_code", &enquiry.country_code),
        ("mobile", &enquiry.mobile),
        ("college", &enquiry.college),
        ("course", &enquiry.course),
        ("message", &enquiry.message),
    ] {
        context.insert(key, value.as_deref().unwrap_or_default());
    }
    context
}
