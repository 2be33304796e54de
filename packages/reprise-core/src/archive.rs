//! # Document Loading
//!
//! Reads a score from disk, transparently unpacking compressed `.mxl` containers.
//!
//! ## Compressed MusicXML
//! An `.mxl` file is a zip archive. Its manifest `META-INF/container.xml` names
//! the root score entry:
//!
//! ```text
//! <container>
//!   <rootfiles>
//!     <rootfile full-path="score.xml"/>
//!   </rootfiles>
//! </container>
//! ```
//!
//! Archives are recognized by their zip signature, not by file extension, so a
//! compressed score with a `.xml` name still loads.

use crate::error::ScoreError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Read the score markup at `path`, extracting it from a zip container if needed.
pub fn load_document(path: &Path) -> Result<String, ScoreError> {
    if !path.exists() {
        return Err(ScoreError::NotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    log::debug!("read {} bytes from {}", bytes.len(), path.display());
    document_from_bytes(&bytes)
}

/// Decode raw file contents into score markup.
pub fn document_from_bytes(bytes: &[u8]) -> Result<String, ScoreError> {
    if is_archive(bytes) {
        return extract_root_document(bytes);
    }
    decode_text(bytes.to_vec())
}

pub fn is_archive(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Locate the root entry through the container manifest and return its text.
pub fn extract_root_document(bytes: &[u8]) -> Result<String, ScoreError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let manifest = {
        let mut entry = archive
            .by_name(CONTAINER_PATH)
            .map_err(|_| ScoreError::Archive(format!("missing {}", CONTAINER_PATH)))?;
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        text
    };

    let root_path = root_entry_path(&manifest)?;
    log::debug!("container root entry: {}", root_path);

    let mut entry = archive
        .by_name(&root_path)
        .map_err(|_| ScoreError::Archive(format!("root entry '{}' not found", root_path)))?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    decode_text(data)
}

/// Find the first `rootfile/@full-path` in a container manifest.
fn root_entry_path(manifest: &str) -> Result<String, ScoreError> {
    let mut reader = Reader::from_str(manifest);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() != b"rootfile" {
                    continue;
                }
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        let value = attr
                            .unescape_value()
                            .map_err(|err| ScoreError::Archive(err.to_string()))?;
                        return Ok(value.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ScoreError::Archive(format!(
                    "unreadable container manifest: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Err(ScoreError::Archive(
        "container manifest names no root file".to_string(),
    ))
}

fn decode_text(bytes: Vec<u8>) -> Result<String, ScoreError> {
    let text = String::from_utf8(bytes)
        .map_err(|e| ScoreError::MalformedDocument(format!("document is not UTF-8: {}", e)))?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}
