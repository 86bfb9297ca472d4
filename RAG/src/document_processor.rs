use crate::error::{RagError, Result};
use crate::models::*;
use pdf_extract::extract_text_by_pages;
use regex::Regex;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Text,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" | "md" => Ok(Self::Text),
            _ => Err(RagError::UnsupportedFileType(ext)),
        }
    }
}

/// Turns files into cleaned, overlapping text chunks.
#[derive(Debug, Clone, Copy)]
pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than a non-zero chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn load(&self, file_path: &Path) -> Result<Vec<Document>> {
        let kind = FileKind::from_path(file_path)?;
        let source = file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.display().to_string());

        log::info!("Loading {:?} document: {}", kind, source);

        let documents: Vec<Document> = match kind {
            FileKind::Pdf => extract_text_by_pages(file_path)?
                .into_iter()
                .enumerate()
                .filter(|(_, text)| !text.trim().is_empty())
                .map(|(idx, text)| new_document(&source, Some(idx + 1), text))
                .collect(),
            FileKind::Docx => vec![new_document(&source, None, extract_docx_text(file_path)?)],
            FileKind::Text => vec![new_document(&source, None, fs::read_to_string(file_path)?)],
        };

        if documents.iter().all(|d| d.content.trim().is_empty()) {
            return Err(RagError::EmptyDocument(source));
        }

        log::info!("Loaded {} page(s) from {}", documents.len(), source);
        Ok(documents)
    }

    /// Loads an uploaded file by spilling it to a temporary file that keeps
    /// the upload's extension. The temporary file is removed on drop.
    pub fn load_bytes(&self, filename: &str, bytes: &[u8]) -> Result<Vec<Document>> {
        let upload_path = Path::new(filename);
        FileKind::from_path(upload_path)?;
        let suffix = upload_path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let mut tmp_file = tempfile::Builder::new()
            .prefix("docqa-upload-")
            .suffix(&suffix)
            .tempfile()?;
        tmp_file.write_all(bytes)?;
        tmp_file.flush()?;

        let mut documents = self.load(tmp_file.path()).map_err(|e| match e {
            RagError::EmptyDocument(_) => RagError::EmptyDocument(filename.to_string()),
            other => other,
        })?;
        for document in documents.iter_mut() {
            document.source = filename.to_string();
        }
        Ok(documents)
    }

    pub fn split(&self, documents: &[Document]) -> Vec<DocumentChunk> {
        let chunks: Vec<DocumentChunk> = documents
            .iter()
            .flat_map(|document| self.create_chunks(document))
            .collect();

        log::info!(
            "Created {} chunks from {} documents",
            chunks.len(),
            documents.len()
        );
        chunks
    }

    fn create_chunks(&self, document: &Document) -> Vec<DocumentChunk> {
        let cleaned_content = clean_text(&document.content);
        let mut chunks = Vec::new();

        let mut current_chunk = String::new();
        let mut current_len = 0;
        let mut start_pos = 0;

        // Raw sentences keep their trailing whitespace, so concatenating them
        // reproduces the cleaned text and positions stay exact. Long sentences
        // leave room for the overlap carried in front of them.
        let max_piece = self.chunk_size - self.chunk_overlap;
        let pieces = cleaned_content
            .unicode_sentences()
            .flat_map(|sentence| split_long_sentence(sentence, max_piece));

        for piece in pieces {
            let piece_len = piece.chars().count();

            if current_len + piece_len > self.chunk_size && current_len > 0 {
                let end_pos = start_pos + current_len;
                self.push_chunk(&mut chunks, document, &current_chunk, start_pos, end_pos);

                let mut overlap_text = self.overlap_tail(&current_chunk, current_len);
                let mut overlap_len = overlap_text.chars().count();
                if overlap_len + piece_len > self.chunk_size {
                    overlap_text.clear();
                    overlap_len = 0;
                }

                start_pos = end_pos - overlap_len;
                current_chunk = overlap_text;
                current_len = overlap_len;
            }

            current_chunk.push_str(piece);
            current_len += piece_len;
        }

        if !current_chunk.trim().is_empty() {
            let end_pos = start_pos + current_len;
            self.push_chunk(&mut chunks, document, &current_chunk, start_pos, end_pos);
        }

        chunks
    }

    fn push_chunk(
        &self,
        chunks: &mut Vec<DocumentChunk>,
        document: &Document,
        text: &str,
        start_position: usize,
        end_position: usize,
    ) {
        let content = text.trim();
        if content.is_empty() {
            return;
        }
        chunks.push(DocumentChunk {
            id: Uuid::new_v4().to_string(),
            source: document.source.clone(),
            page: document.page,
            content: content.to_string(),
            start_position,
            end_position,
        });
    }

    /// Trailing `chunk_overlap` characters, advanced to the next word start.
    fn overlap_tail(&self, chunk: &str, chunk_len: usize) -> String {
        if self.chunk_overlap == 0 {
            return String::new();
        }
        let tail: String = chunk
            .chars()
            .skip(chunk_len.saturating_sub(self.chunk_overlap))
            .collect();

        match tail.find(char::is_whitespace) {
            Some(idx) if chunk_len > self.chunk_overlap => tail[idx..].trim_start().to_string(),
            _ => tail,
        }
    }
}

fn new_document(source: &str, page: Option<usize>, content: String) -> Document {
    Document {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        page,
        content,
    }
}

/// Cuts a sentence longer than `max_chars` at word boundaries, and inside a
/// word only when the word alone is too long. The pieces concatenate back to
/// the sentence.
fn split_long_sentence(sentence: &str, max_chars: usize) -> Vec<&str> {
    if sentence.chars().count() <= max_chars {
        return vec![sentence];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut len = 0;

    for (offset, word) in sentence.split_word_bound_indices() {
        let word_len = word.chars().count();
        if len + word_len > max_chars && len > 0 {
            pieces.push(&sentence[start..offset]);
            start = offset;
            len = 0;
        }

        if word_len > max_chars {
            let mut count = 0;
            for (idx, _) in word.char_indices() {
                if count == max_chars {
                    pieces.push(&sentence[start..offset + idx]);
                    start = offset + idx;
                    count = 0;
                }
                count += 1;
            }
            len = count;
            continue;
        }

        len += word_len;
    }

    if start < sentence.len() {
        pieces.push(&sentence[start..]);
    }
    pieces
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

fn special_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[^\w\s.,!?;:()\[\]{}/%&'"$#@+=*<>\-]"#).expect("special-char pattern is valid")
    })
}

pub fn clean_text(text: &str) -> String {
    let cleaned = special_chars_re().replace_all(text, " ");
    let cleaned = whitespace_re().replace_all(&cleaned, " ");
    cleaned.trim().to_string()
}

pub fn extract_docx_text(file_path: &Path) -> Result<String> {
    let file = fs::File::open(file_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut document_xml = archive.by_name("word/document.xml")?;

    let mut xml = String::new();
    document_xml.read_to_string(&mut xml)?;
    Ok(docx_xml_to_text(&xml))
}

/// Keeps `<w:t>` run text, one line per `<w:p>` paragraph.
pub fn docx_xml_to_text(xml: &str) -> String {
    let mut result = String::new();
    let mut in_text = false;
    let mut in_tab_stops = false;
    let mut chars = xml.chars();

    while let Some(c) = chars.next() {
        if c != '<' {
            if in_text {
                result.push(c);
            }
            continue;
        }

        let tag: String = chars.by_ref().take_while(|&tc| tc != '>').collect();
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_end_matches('/')
            .split(|ch: char| ch.is_whitespace())
            .next()
            .unwrap_or("");

        match name {
            "w:t" if !self_closing => in_text = true,
            "/w:t" => in_text = false,
            "w:tabs" if !self_closing => in_tab_stops = true,
            "/w:tabs" => in_tab_stops = false,
            "w:tab" if !in_tab_stops => result.push('\t'),
            "w:br" | "w:cr" => result.push('\n'),
            "w:p" if !self_closing => {
                if !result.is_empty() && !result.ends_with('\n') {
                    result.push('\n');
                }
            }
            _ => {}
        }
    }

    result
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
