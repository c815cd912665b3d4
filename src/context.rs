//! Context text assembled from a file's name and light metadata.
//!
//! The phrases added here only bias the embedding toward useful vocabulary;
//! they are not classification rules. Building context never fails: anything
//! unreadable degrades to a filename-only description.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use tracing::{debug, warn};

pub const DEFAULT_MAX_DOCUMENT_CHARS: usize = 2000;

const ELLIPSIS: &str = "...";

/// Bytes read from a plain-text document before truncation.
const SNIPPET_READ_BYTES: u64 = 64 * 1024;

/// PDF pages scanned for text.
const PDF_PAGES: usize = 3;

/// Rows read from the first sheet of a spreadsheet.
const SPREADSHEET_ROWS: usize = 20;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif", "heic", "heif", "avif", "ico",
    "svg",
];

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "xml", "html", "htm", "log", "yaml", "yml",
    "toml", "ini", "rs", "py", "js", "ts", "go", "java", "c", "cpp", "h", "sh",
];

// Aspect-ratio and size thresholds for the image hints.
const SQUARE_TOLERANCE: f64 = 0.05;
const WIDE_RATIO: f64 = 1.6;
const TALL_RATIO: f64 = 0.625;
const SMALL_EDGE: u32 = 256;
const HIGH_RES_PIXELS: u64 = 2_000_000;

/// Check whether `extension` (without the dot) names an image format.
#[must_use]
pub fn is_image_extension(extension: &str) -> bool {
    IMAGE_EXTENSIONS
        .iter()
        .any(|e| e.eq_ignore_ascii_case(extension))
}

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    max_document_chars: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DOCUMENT_CHARS)
    }
}

impl ContextBuilder {
    #[must_use]
    pub fn new(max_document_chars: usize) -> Self {
        Self { max_document_chars }
    }

    /// Context for a file whose content could not be inspected.
    #[must_use]
    pub fn filename_context(&self, file_name: &str) -> String {
        format!("File name: {}.", humanize_file_name(file_name))
    }

    /// Filename, pixel dimensions and descriptive size/shape hints.
    #[must_use]
    pub fn image_context(&self, file_name: &str, width: u32, height: u32) -> String {
        if width == 0 || height == 0 {
            return self.filename_context(file_name);
        }

        let mut text = format!(
            "File name: {}. Image {width}x{height} pixels.",
            humanize_file_name(file_name)
        );
        for hint in image_hints(width, height) {
            text.push(' ');
            text.push_str(hint);
            text.push('.');
        }
        text
    }

    /// Filename, extension and document text cut to the character budget.
    #[must_use]
    pub fn document_context(&self, file_name: &str, extension: &str, snippet: &str) -> String {
        let mut text = format!("File name: {}.", humanize_file_name(file_name));

        let extension = extension.trim_start_matches('.').to_lowercase();
        if !extension.is_empty() {
            text.push_str(" Document type: ");
            text.push_str(&extension);
            text.push('.');
        }

        let content = truncate_chars(&collapse_whitespace(snippet), self.max_document_chars);
        if !content.is_empty() {
            text.push_str(" Content: ");
            text.push_str(&content);
        }
        text
    }

    /// Image context read from disk; filename-only when the header is unreadable.
    #[must_use]
    pub fn image_context_for_path(&self, path: &Path) -> String {
        let file_name = file_name_of(path);
        match read_image_dimensions(path) {
            Ok((width, height)) => self.image_context(&file_name, width, height),
            Err(e) => {
                warn!("Could not read image metadata for {}: {e}", path.display());
                self.filename_context(&file_name)
            }
        }
    }

    /// Document context read from disk; filename and extension only when no
    /// text can be extracted.
    #[must_use]
    pub fn document_context_for_path(&self, path: &Path) -> String {
        let file_name = file_name_of(path);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let snippet = read_document_snippet(path).unwrap_or_default();
        self.document_context(&file_name, &extension, &snippet)
    }
}

/// Leading text of a document, if its format is readable.
///
/// Plain-text formats are read directly, PDFs go through `lopdf`, DOCX
/// through its `word/document.xml` part and spreadsheets through `calamine`.
/// Anything else, or any read failure, yields `None`.
#[must_use]
pub fn read_document_snippet(path: &Path) -> Option<String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)?;

    let result = match extension.as_str() {
        "pdf" => read_pdf_text(path),
        "docx" => read_docx_text(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_spreadsheet_text(path),
        ext if TEXT_EXTENSIONS.contains(&ext) => read_text_prefix(path),
        _ => {
            debug!("No text extractor for .{extension}");
            return None;
        }
    };

    match result {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Could not read document text from {}: {e}", path.display());
            None
        }
    }
}

fn read_text_prefix(path: &Path) -> anyhow::Result<String> {
    let file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.take(SNIPPET_READ_BYTES).read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_pdf_text(path: &Path) -> anyhow::Result<String> {
    let doc = lopdf::Document::load(path)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().take(PDF_PAGES).collect();
    Ok(doc.extract_text(&pages)?)
}

/// Text runs (`<w:t>`) of a DOCX body, one line per paragraph.
fn read_docx_text(path: &Path) -> anyhow::Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;

    let mut reader = quick_xml::Reader::from_str(&xml);
    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => text.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
        if text.len() as u64 >= SNIPPET_READ_BYTES {
            break;
        }
    }

    Ok(text)
}

/// Sheet names plus the first rows of the first sheet, tab-separated.
fn read_spreadsheet_text(path: &Path) -> anyhow::Result<String> {
    use calamine::{Reader, open_workbook_auto};

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| anyhow::anyhow!("failed to open spreadsheet: {e}"))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut text = format!("Sheets: {}\n", sheet_names.join(", "));

    if let Some(sheet_name) = sheet_names.first() {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| anyhow::anyhow!("failed to read sheet {sheet_name}: {e}"))?;
        for row in range.rows().take(SPREADSHEET_ROWS) {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            text.push_str(&cells.join("\t"));
            text.push('\n');
        }
    }

    Ok(text)
}

/// Dimensions from the image header, detecting the format from the content
/// rather than trusting the extension.
fn read_image_dimensions(path: &Path) -> image::ImageResult<(u32, u32)> {
    image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
}

fn image_hints(width: u32, height: u32) -> Vec<&'static str> {
    let mut hints = Vec::new();
    let aspect = f64::from(width) / f64::from(height);

    if (aspect - 1.0).abs() <= SQUARE_TOLERANCE {
        hints.push("Square image, like an icon, logo or profile picture");
    } else if aspect >= WIDE_RATIO {
        hints.push("Wide landscape image, like a wallpaper, banner or panorama");
    } else if aspect <= TALL_RATIO {
        hints.push("Tall narrow image, like a phone screenshot or scanned page");
    }

    let pixels = u64::from(width) * u64::from(height);
    if width.max(height) <= SMALL_EDGE {
        hints.push("Small image, likely an icon or thumbnail");
    } else if pixels >= HIGH_RES_PIXELS {
        hints.push("High resolution photo, likely taken with a camera");
    }
    hints
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `IMG_2024-05-01.final.jpg` → `IMG 2024 05 01 final`.
fn humanize_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(file_name);

    stem.split(|c: char| c.is_whitespace() || matches!(c, '_' | '-' | '.'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_humanize_file_name() {
        assert_eq!(humanize_file_name("IMG_2024-05-01.final.jpg"), "IMG 2024 05 01 final");
        assert_eq!(humanize_file_name("Screenshot 2024.png"), "Screenshot 2024");
        assert_eq!(humanize_file_name(".bashrc"), "bashrc");
        assert_eq!(humanize_file_name(""), "");
    }

    #[test]
    fn test_image_context_square_small() {
        let text = ContextBuilder::default().image_context("app_icon.png", 128, 128);
        assert!(text.starts_with("File name: app icon. Image 128x128 pixels."));
        assert!(text.contains("Square image"));
        assert!(text.contains("Small image"));
    }

    #[test]
    fn test_image_context_wide_high_res() {
        let text = ContextBuilder::default().image_context("beach.jpg", 6000, 3000);
        assert!(text.contains("Wide landscape"));
        assert!(text.contains("High resolution photo"));
        assert!(!text.contains("Square"));
    }

    #[test]
    fn test_image_context_tall() {
        let text = ContextBuilder::default().image_context("Screenshot_20240101.png", 1170, 2532);
        assert!(text.contains("Tall narrow image"));
        assert!(text.contains("High resolution"));
    }

    #[test]
    fn test_image_context_ordinary_has_no_hints() {
        let text = ContextBuilder::default().image_context("chart.png", 800, 600);
        assert_eq!(text, "File name: chart. Image 800x600 pixels.");
    }

    #[test]
    fn test_image_context_zero_dimension() {
        let text = ContextBuilder::default().image_context("broken.png", 0, 100);
        assert_eq!(text, "File name: broken.");
    }

    #[test]
    fn test_document_context_short() {
        let text = ContextBuilder::default().document_context(
            "invoice_0042.pdf",
            ".PDF",
            "Total   due:\n\n 120 EUR",
        );
        assert_eq!(
            text,
            "File name: invoice 0042. Document type: pdf. Content: Total due: 120 EUR"
        );
    }

    #[test]
    fn test_document_context_without_extension() {
        let builder = ContextBuilder::default();
        assert_eq!(
            builder.document_context("README", "", "setup steps"),
            "File name: README. Content: setup steps"
        );
        assert_eq!(builder.document_context("LICENSE", ".", ""), "File name: LICENSE.");
    }

    #[test]
    fn test_document_context_for_path_without_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Makefile");
        std::fs::write(&path, "all: build").unwrap();

        let text = ContextBuilder::default().document_context_for_path(&path);
        assert_eq!(text, "File name: Makefile.");
    }

    #[test]
    fn test_document_context_empty_snippet() {
        let text = ContextBuilder::default().document_context("notes.txt", "txt", "   ");
        assert_eq!(text, "File name: notes. Document type: txt.");
    }

    #[test]
    fn test_document_truncation_boundary() {
        let builder = ContextBuilder::default();
        let exact = "a".repeat(2000);
        let text = builder.document_context("a.txt", "txt", &exact);
        assert!(text.ends_with(&exact));
        assert!(!text.ends_with(ELLIPSIS));

        let over = "a".repeat(2001);
        let text = builder.document_context("a.txt", "txt", &over);
        assert!(text.ends_with(&format!("{exact}{ELLIPSIS}")));
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_chars("résumé", 3), "rés...");
        assert_eq!(truncate_chars("写真写真", 4), "写真写真");
    }

    #[test]
    fn test_is_image_extension() {
        assert!(is_image_extension("JPG"));
        assert!(is_image_extension("webp"));
        assert!(!is_image_extension("pdf"));
    }

    #[test]
    fn test_image_context_for_path_reads_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("avatar.png");
        image::RgbImage::new(64, 64).save(&path).unwrap();

        let text = ContextBuilder::default().image_context_for_path(&path);
        assert!(text.contains("Image 64x64 pixels"));
        assert!(text.contains("Square image"));
    }

    #[test]
    fn test_image_context_for_path_ignores_wrong_extension() {
        let dir = tempdir().unwrap();
        let png = dir.path().join("source.png");
        image::RgbImage::new(64, 64).save(&png).unwrap();
        let misnamed = dir.path().join("avatar.jpg");
        std::fs::copy(&png, &misnamed).unwrap();

        let text = ContextBuilder::default().image_context_for_path(&misnamed);
        assert!(text.starts_with("File name: avatar. Image 64x64 pixels."));
        assert!(text.contains("Square image"));
    }

    #[test]
    fn test_image_context_for_path_degrades() {
        let dir = tempdir().unwrap();
        let corrupt = dir.path().join("holiday_photo.jpg");
        std::fs::write(&corrupt, b"not really a jpeg").unwrap();

        let builder = ContextBuilder::default();
        assert_eq!(
            builder.image_context_for_path(&corrupt),
            "File name: holiday photo."
        );
        assert_eq!(
            builder.image_context_for_path(&dir.path().join("missing.png")),
            "File name: missing."
        );
    }

    #[test]
    fn test_document_context_for_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meeting-notes.md");
        std::fs::write(&path, "# Weekly sync\n\n- budget review\n").unwrap();

        let text = ContextBuilder::new(20).document_context_for_path(&path);
        assert_eq!(
            text,
            "File name: meeting notes. Document type: md. Content: # Weekly sync - budg..."
        );
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            std::io::Write::write_all(&mut zip, body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_read_docx_snippet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resume.docx");
        write_zip(
            &path,
            &[(
                "word/document.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Senior engineer </w:t></w:r><w:r><w:t>&amp; team lead</w:t></w:r></w:p></w:body></w:document>"#,
            )],
        );

        let text = read_document_snippet(&path).unwrap();
        assert_eq!(text, "Jane Doe\nSenior engineer & team lead\n");

        let context = ContextBuilder::default().document_context_for_path(&path);
        assert_eq!(
            context,
            "File name: resume. Document type: docx. Content: Jane Doe Senior engineer & team lead"
        );
    }

    #[test]
    fn test_read_spreadsheet_snippet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("budget.xlsx");
        write_zip(
            &path,
            &[
                (
                    "[Content_Types].xml",
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#,
                ),
                (
                    "_rels/.rels",
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
                ),
                (
                    "xl/workbook.xml",
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Budget" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                ),
                (
                    "xl/_rels/workbook.xml.rels",
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
                ),
                (
                    "xl/worksheets/sheet1.xml",
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Item</t></is></c><c r="B1" t="inlineStr"><is><t>Cost</t></is></c></row><row r="2"><c r="A2" t="inlineStr"><is><t>Rent</t></is></c><c r="B2" t="inlineStr"><is><t>monthly</t></is></c></row></sheetData></worksheet>"#,
                ),
            ],
        );

        let text = read_document_snippet(&path).unwrap();
        assert!(text.starts_with("Sheets: Budget\n"));
        assert!(text.contains("Item\tCost"));
        assert!(text.contains("Rent\tmonthly"));
    }

    #[test]
    fn test_read_document_snippet_unsupported_or_broken() {
        let dir = tempdir().unwrap();
        let docx = dir.path().join("letter.docx");
        std::fs::write(&docx, b"PK").unwrap();
        assert_eq!(read_document_snippet(&docx), None);

        let no_body = dir.path().join("empty.docx");
        write_zip(&no_body, &[("docProps/app.xml", "<Properties/>")]);
        assert_eq!(read_document_snippet(&no_body), None);

        let sheet = dir.path().join("broken.xlsx");
        std::fs::write(&sheet, b"not a workbook").unwrap();
        assert_eq!(read_document_snippet(&sheet), None);

        let keynote = dir.path().join("deck.key");
        std::fs::write(&keynote, b"keynote").unwrap();
        assert_eq!(read_document_snippet(&keynote), None);

        let pdf = dir.path().join("broken.pdf");
        std::fs::write(&pdf, b"%PDF-garbage").unwrap();
        assert_eq!(read_document_snippet(&pdf), None);

        assert_eq!(read_document_snippet(&dir.path().join("absent.txt")), None);
    }
}
