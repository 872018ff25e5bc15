use crate::error::IngestError;
use crate::models::SourceMetadata;
use chrono::Utc;
use lopdf::Document;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

/// Uploads above this size are refused before any parsing.
pub const MAX_SOURCE_BYTES: u64 = 10 * 1024 * 1024;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Pages that carried text, plus how many pages the file has in total.
#[derive(Debug, Clone)]
pub struct ExtractedPdf {
    pub pages: Vec<PageText>,
    pub page_count: u32,
}

/// Raw text of one source file plus what ingestion records about it.
#[derive(Debug, Clone)]
pub struct ExtractedSource {
    pub text: String,
    pub metadata: SourceMetadata,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<ExtractedPdf, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<ExtractedPdf, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let all_pages = document.get_pages();
        let page_count = all_pages.len() as u32;
        let mut pages = Vec::new();
        for (page_no, _page_id) in all_pages {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(ExtractedPdf { pages, page_count })
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn is_supported_source(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Recursively lists ingestible files under `folder`, sorted by path.
pub fn discover_source_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file() && is_supported_source(entry.path()))
        .map(|entry| entry.path().to_path_buf())
        .collect();

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    Ok(digest_bytes(&fs::read(path)?))
}

pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// Checks type and size, then pulls the text out of `path`.
///
/// PDFs are read page by page and joined with blank lines; `.txt` and `.md`
/// files are taken as UTF-8.
pub fn load_source(path: &Path) -> Result<ExtractedSource, IngestError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
        .to_string();

    let extension = extension_of(path)
        .filter(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| IngestError::UnsupportedSource(file_name.clone()))?;

    let size = fs::metadata(path)?.len();
    if size > MAX_SOURCE_BYTES {
        return Err(IngestError::SourceTooLarge {
            size,
            limit: MAX_SOURCE_BYTES,
        });
    }

    let bytes = fs::read(path)?;
    let checksum = digest_bytes(&bytes);

    let (text, pages_count) = if extension == "pdf" {
        let pdf = LopdfExtractor.extract_pages(path)?;
        let count = pdf.page_count;
        let joined = pdf
            .pages
            .into_iter()
            .map(|page| page.text)
            .collect::<Vec<_>>()
            .join("\n\n");
        (joined, count)
    } else {
        let text = String::from_utf8(bytes).map_err(|error| {
            IngestError::UnsupportedSource(format!("{file_name} is not valid UTF-8: {error}"))
        })?;
        (text, 1)
    };

    debug!(file = %file_name, size, pages_count, "source extracted");

    Ok(ExtractedSource {
        text,
        metadata: SourceMetadata {
            original_filename: file_name,
            file_size: size,
            pages_count,
            upload_time: Some(Utc::now()),
            checksum: Some(checksum),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discovery_is_recursive_and_skips_unsupported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(nested.join("b.TXT"), "notes")?;
        fs::write(nested.join("c.docx"), "binary")?;

        let files = discover_source_files(base);
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|path| is_supported_source(path)));
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.txt");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        assert_eq!(first, digest_file(&file_path)?);
        assert_eq!(
            first,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        Ok(())
    }

    #[test]
    fn text_sources_are_loaded_with_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("notes.md");
        fs::write(&file_path, "Học máy là một lĩnh vực.")?;

        let source = load_source(&file_path)?;
        assert_eq!(source.text, "Học máy là một lĩnh vực.");
        assert_eq!(source.metadata.original_filename, "notes.md");
        assert_eq!(source.metadata.pages_count, 1);
        assert_eq!(source.metadata.file_size, fs::metadata(&file_path)?.len());
        assert!(source.metadata.checksum.is_some());
        Ok(())
    }

    #[test]
    fn unsupported_extension_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("report.docx");
        fs::write(&file_path, "x")?;

        assert!(matches!(
            load_source(&file_path),
            Err(IngestError::UnsupportedSource(_))
        ));
        Ok(())
    }

    #[test]
    fn oversized_source_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("big.txt");
        let file = File::create(&file_path)?;
        file.set_len(MAX_SOURCE_BYTES + 1)?;

        assert!(matches!(
            load_source(&file_path),
            Err(IngestError::SourceTooLarge { .. })
        ));
        Ok(())
    }

    #[test]
    fn unreadable_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("broken.pdf");
        fs::write(&file_path, b"%PDF-1.4\n%broken")?;

        assert!(matches!(
            load_source(&file_path),
            Err(IngestError::PdfParse(_))
        ));
        Ok(())
    }

    fn write_pdf(path: &Path, page_texts: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in page_texts {
            let operations = if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path)?;
        Ok(())
    }

    #[test]
    fn blank_pdf_pages_still_count() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("scan.pdf");
        write_pdf(&file_path, &["Hello World!", ""])?;

        let source = load_source(&file_path)?;
        assert_eq!(source.metadata.pages_count, 2);
        assert!(source.text.contains("Hello World!"));
        Ok(())
    }

    #[test]
    fn document_ids_are_unique() {
        assert_ne!(new_document_id(), new_document_id());
    }
}
