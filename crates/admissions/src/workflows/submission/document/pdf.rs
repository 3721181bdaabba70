use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use super::{Block, RenderError};

// US Letter, in points.
const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 72;
const COLUMN_WIDTH: i64 = PAGE_WIDTH - 2 * MARGIN;

const TITLE_SIZE: i64 = 20;
const HEADING_SIZE: i64 = 16;
const BODY_SIZE: i64 = 12;

const FONT_NAME: &[u8] = b"F1";

/// Lays the blocks out on as many pages as they need and serialises the
/// result with the standard Helvetica font.
pub(super) fn encode(blocks: &[Block]) -> Result<Vec<u8>, RenderError> {
    let mut pages = PageWriter::new();
    for block in blocks {
        match block {
            Block::Title(text) => pages.text(text, TITLE_SIZE, Align::Center, false),
            Block::Heading(text) => pages.text(text, HEADING_SIZE, Align::Left, true),
            Block::Line(text) => pages.text(text, BODY_SIZE, Align::Left, false),
            Block::Gap => pages.gap(),
        }
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for operations in pages.finish() {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(count),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
}

struct PageWriter {
    finished: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    // Top of the next line, measured from the page bottom.
    cursor: i64,
    last_size: i64,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            finished: Vec::new(),
            current: Vec::new(),
            cursor: PAGE_HEIGHT - MARGIN,
            last_size: BODY_SIZE,
        }
    }

    fn text(&mut self, text: &str, size: i64, align: Align, underline: bool) {
        self.last_size = size;
        for line in wrap(text, size, COLUMN_WIDTH) {
            self.reserve(leading(size));
            let width = text_width(&line, size);
            let x = match align {
                Align::Left => MARGIN,
                Align::Center => MARGIN + (COLUMN_WIDTH - width).max(0) / 2,
            };
            let baseline = self.cursor - size;

            self.current.extend([
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(FONT_NAME.to_vec()), Object::Integer(size)],
                ),
                Operation::new("Td", vec![Object::Integer(x), Object::Integer(baseline)]),
                Operation::new("Tj", vec![Object::string_literal(latin1(&line))]),
                Operation::new("ET", vec![]),
            ]);

            if underline {
                let y = baseline - 2;
                self.current.extend([
                    Operation::new("w", vec![Object::Integer(1)]),
                    Operation::new("m", vec![Object::Integer(x), Object::Integer(y)]),
                    Operation::new("l", vec![Object::Integer(x + width), Object::Integer(y)]),
                    Operation::new("S", vec![]),
                ]);
            }

            self.cursor -= leading(size);
        }
    }

    fn gap(&mut self) {
        let height = leading(self.last_size);
        if self.cursor - height < MARGIN {
            self.break_page();
        } else {
            self.cursor -= height;
        }
    }

    fn reserve(&mut self, height: i64) {
        if self.cursor - height < MARGIN {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        self.finished.push(std::mem::take(&mut self.current));
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.current.is_empty() || self.finished.is_empty() {
            self.finished.push(self.current);
        }
        self.finished
    }
}

fn leading(size: i64) -> i64 {
    (size * 116 + 50) / 100
}

/// Approximate Helvetica advance width in thousandths of an em.
fn glyph_width(ch: char) -> i64 {
    match ch {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 278,
        ' ' | 'f' | 't' | 'I' | '/' | '-' | '(' | ')' | '[' | ']' => 333,
        'm' | 'M' | 'W' => 833,
        'w' => 722,
        c if c.is_ascii_uppercase() => 667,
        _ => 556,
    }
}

fn text_width(text: &str, size: i64) -> i64 {
    let units: i64 = text.chars().map(glyph_width).sum();
    (units * size + 999) / 1000
}

/// Breaks at every line ending, then wraps each piece to `width`.
fn wrap(text: &str, size: i64, width: i64) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split(|ch: char| ch == '\n' || ch == '\r')
        .flat_map(|paragraph| wrap_paragraph(paragraph, size, width))
        .collect()
}

/// Greedy word wrap; words wider than the column are split by character.
fn wrap_paragraph(text: &str, size: i64, width: i64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if text_width(&candidate, size) <= width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        for ch in word.chars() {
            current.push(ch);
            if text_width(&current, size) > width {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Standard fonts only cover a single-byte encoding. WinAnsi assigns
/// 0x80..=0x9F to punctuation, so C1 controls are replaced too.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match u8::try_from(u32::from(ch)) {
            Ok(byte) if !(0x80..=0x9f).contains(&byte) => byte,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_stays_on_one_line() {
        assert_eq!(wrap("Gender: Female", BODY_SIZE, COLUMN_WIDTH).len(), 1);
    }

    #[test]
    fn long_text_wraps_within_column() {
        let address = "Flat 4B, Green Meadows Apartments, 221 Old Mahabalipuram Road, \
                       Sholinganallur, Chennai, near the bus depot opposite the temple";
        let lines = wrap(address, BODY_SIZE, COLUMN_WIDTH);
        assert!(lines.len() > 1);
        assert!(lines
            .iter()
            .all(|line| text_width(line, BODY_SIZE) <= COLUMN_WIDTH));
        assert_eq!(lines.join(" "), address);
    }

    #[test]
    fn unbroken_words_are_split() {
        let token = "x".repeat(200);
        let lines = wrap(&token, BODY_SIZE, COLUMN_WIDTH);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), token);
    }

    #[test]
    fn non_latin_characters_are_replaced() {
        assert_eq!(latin1("Café ₹"), b"Caf\xe9 ?".to_vec());
    }

    #[test]
    fn c1_controls_are_replaced() {
        assert_eq!(latin1("a\u{0085}b\u{009f}"), b"a?b?".to_vec());
    }

    #[test]
    fn line_endings_start_new_lines() {
        let lines = wrap(
            "Address: 12 Lake Road\r\nChennai\nTamil Nadu\rIndia",
            BODY_SIZE,
            COLUMN_WIDTH,
        );
        assert_eq!(
            lines,
            vec!["Address: 12 Lake Road", "Chennai", "Tamil Nadu", "India"]
        );
        assert!(lines
            .iter()
            .all(|line| !line.contains('\r') && !line.contains('\n')));
    }

    #[test]
    fn blank_lines_are_kept() {
        assert_eq!(wrap("a\n\nb", BODY_SIZE, COLUMN_WIDTH), vec!["a", "", "b"]);
    }

    #[test]
    fn overflowing_content_starts_new_pages() {
        let blocks: Vec<Block> = (0..120)
            .map(|n| Block::Line(format!("Line {n}")))
            .collect();
        let bytes = encode(&blocks).expect("pdf renders");
        let parsed = lopdf::Document::load_mem(&bytes).expect("pdf parses");
        assert!(parsed.get_pages().len() >= 2);
    }

    #[test]
    fn empty_document_still_has_a_page() {
        let bytes = encode(&[]).expect("pdf renders");
        let parsed = lopdf::Document::load_mem(&bytes).expect("pdf parses");
        assert_eq!(parsed.get_pages().len(), 1);
    }
}
