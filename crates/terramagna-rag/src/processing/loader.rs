use anyhow::{Context, Result};
use regex::Regex;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::types::DocumentFormat;

static DOCX_PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("docx paragraph regex is valid"));
static DOCX_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("docx text regex is valid"));

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// File name relative to the knowledge directory.
    pub source: String,
    pub content: String,
}

/// Reads every supported file under a knowledge directory.
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load all `.txt`, `.md`, `.pdf` and `.docx` files below `dir`.
    ///
    /// Files that fail to parse are logged and skipped; only an unreadable
    /// directory is an error.
    pub fn load_dir(&self, dir: &Path) -> Result<Vec<LoadedDocument>> {
        if !dir.is_dir() {
            anyhow::bail!("Knowledge directory not found: {}", dir.display());
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(format) = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(DocumentFormat::from_extension)
            else {
                continue;
            };

            match self.parse_file(path, format) {
                Ok(content) if !content.trim().is_empty() => {
                    let source = path
                        .strip_prefix(dir)
                        .unwrap_or(path)
                        .display()
                        .to_string();
                    tracing::info!(
                        chars = content.chars().count(),
                        format = ?format,
                        "Loaded {}",
                        source
                    );
                    documents.push(LoadedDocument { source, content });
                }
                Ok(_) => tracing::warn!("Skipping empty document: {}", path.display()),
                Err(e) => tracing::warn!("Failed to load {}: {:#}", path.display(), e),
            }
        }

        Ok(documents)
    }

    fn parse_file(&self, path: &Path, format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::TXT | DocumentFormat::MD => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display())),
            DocumentFormat::PDF => self.parse_pdf(path),
            DocumentFormat::DOCX => self.parse_docx(path),
        }
    }

    fn parse_pdf(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read PDF: {}", path.display()))?;
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

        Ok(text
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn parse_docx(&self, path: &Path) -> Result<String> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open DOCX: {}", path.display()))?;

        let mut archive = zip::ZipArchive::new(file)
            .with_context(|| format!("Failed to read DOCX as ZIP: {}", path.display()))?;

        let mut xml_content = String::new();
        archive
            .by_name("word/document.xml")
            .with_context(|| format!("DOCX missing word/document.xml: {}", path.display()))?
            .read_to_string(&mut xml_content)
            .context("Failed to read document.xml from DOCX")?;

        Ok(extract_docx_text(&xml_content))
    }
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-readable names of the property sheets (`.txt` files) in `dir`,
/// e.g. `villa_los_cristianos.txt` -> `villa los cristianos`.
pub fn property_titles(dir: &Path) -> Result<Vec<String>> {
    let mut titles: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("txt")
        })
        .map(|path| file_title(&path).replace('_', " "))
        .collect();
    titles.sort();
    Ok(titles)
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("untitled")
        .to_string()
}

fn extract_docx_text(xml: &str) -> String {
    DOCX_PARAGRAPH_RE
        .find_iter(xml)
        .map(|paragraph| {
            DOCX_TEXT_RE
                .captures_iter(paragraph.as_str())
                .filter_map(|c| c.get(1))
                .map(|m| decode_xml_entities(m.as_str()))
                .collect::<String>()
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
