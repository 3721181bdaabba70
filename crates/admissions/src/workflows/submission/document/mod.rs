//! Registration PDF: a fixed vertical flow of sections built from the
//! submitted fields, then encoded by [`pdf`].

mod pdf;

use std::io::{self, Write};

use super::domain::FormSubmission;

pub const DOCUMENT_TITLE: &str = "Student Registration Form";

const DECLARATION: [&str; 4] = [
    "- Would like to join the selected college",
    "- Information provided is true to the best of knowledge",
    "- Has read and agreed to the terms and conditions",
    "- Consents to the processing of personal data",
];

const TENTH_MARKS: [(&str, &str); 5] = [
    ("Mathematics", "math10thMarks"),
    ("Science", "science10thMarks"),
    ("English", "english10thMarks"),
    ("Social Studies", "social10thMarks"),
    ("Language", "language10thMarks"),
];

const TWELFTH_MARKS: [(&str, &str); 5] = [
    ("Physics", "physics12thMarks"),
    ("Chemistry", "chemistry12thMarks"),
    ("Mathematics", "math12thMarks"),
    ("English", "english12thMarks"),
    ("Optional Subject", "optional12thMarks"),
];

const EDUCATION_FIELDS: [&str; 6] = [
    "schoolName10th",
    "boardName10th",
    "yearOfPassing10th",
    "schoolName12th",
    "boardName12th",
    "yearOfPassing12th",
];

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("pdf encoding failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("pdf write failed: {0}")]
    Io(#[from] io::Error),
}

/// One element of the vertical flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// 20pt, centred.
    Title(String),
    /// 16pt, underlined.
    Heading(String),
    /// 12pt body text, wrapped to the column.
    Line(String),
    /// A blank line at the preceding font size.
    Gap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDocument {
    blocks: Vec<Block>,
}

impl RegistrationDocument {
    pub fn from_submission(form: &FormSubmission) -> Self {
        let mut doc = Flow::default();

        doc.title(DOCUMENT_TITLE);
        doc.gap();

        doc.heading("Personal Details");
        doc.gap();
        doc.line(format!(
            "Name: {} {}",
            form.text("firstName"),
            form.text("lastName")
        ));
        doc.line(format!("Date of Birth: {}", form.text("dob")));
        doc.line(format!("Gender: {}", form.text("gender")));
        doc.line(format!(
            "Mobile: {} {}",
            form.text("countryCode"),
            form.text("mobile")
        ));
        doc.line(format!("Email: {}", form.text("email")));
        doc.line(format!("Address: {}", form.text("address")));
        doc.line(format!(
            "City: {}, State: {}, Pincode: {}",
            form.text("city"),
            form.text("state"),
            form.text("pincode")
        ));
        doc.gap();

        doc.heading("College Preference");
        doc.gap();
        doc.line(format!(
            "Preferred College: {}",
            form.text("preferredCollege")
        ));
        doc.line(format!("Preferred Course: {}", form.text("preferredCourse")));
        doc.gap();

        if has_education(form) {
            doc.heading("Educational Details");
            doc.gap();
            doc.line(format!("10th School: {}", form.text("schoolName10th")));
            doc.line(format!("10th Board: {}", form.text("boardName10th")));
            doc.line(format!(
                "Year of Passing 10th: {}",
                form.text("yearOfPassing10th")
            ));
            doc.gap();
            doc.marks("10th Marks:", &TENTH_MARKS, form);
            doc.gap();

            doc.line(format!(
                "12th School/College: {}",
                form.text("schoolName12th")
            ));
            doc.line(format!("12th Board: {}", form.text("boardName12th")));
            doc.line(format!(
                "Year of Passing 12th: {}",
                form.text("yearOfPassing12th")
            ));
            doc.gap();
            doc.marks("12th Marks:", &TWELFTH_MARKS, form);
            doc.gap();
        }

        doc.heading("Declaration");
        doc.gap();
        doc.line("The student has agreed to the following:");
        for statement in DECLARATION {
            doc.line(statement);
        }

        Self { blocks: doc.blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn headings(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Heading(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn contains_line(&self, text: &str) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block, Block::Line(line) if line == text))
    }

    pub fn to_pdf(&self) -> Result<Vec<u8>, RenderError> {
        pdf::encode(&self.blocks)
    }

    /// Encodes the document and writes it to `sink`, flushing before return.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<u64, RenderError> {
        let bytes = self.to_pdf()?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(bytes.len() as u64)
    }
}

fn has_education(form: &FormSubmission) -> bool {
    EDUCATION_FIELDS
        .iter()
        .chain(TENTH_MARKS.iter().map(|(_, key)| key))
        .chain(TWELFTH_MARKS.iter().map(|(_, key)| key))
        .any(|key| !form.text(key).trim().is_empty())
}

#[derive(Default)]
struct Flow {
    blocks: Vec<Block>,
}

impl Flow {
    fn title(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Title(text.into()));
    }

    fn heading(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Heading(text.into()));
    }

    fn line(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Line(text.into()));
    }

    fn gap(&mut self) {
        self.blocks.push(Block::Gap);
    }

    fn marks(&mut self, label: &str, subjects: &[(&str, &str)], form: &FormSubmission) {
        self.line(label);
        for (subject, key) in subjects {
            self.line(format!("{subject}: {}/100", form.text(key)));
        }
    }
}
