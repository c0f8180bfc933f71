//! Contact source
//!
//! Loads the phone-number CSV in file order. Encoding is auto-detected with a
//! fallback chain (UTF-8, then Latin-1, then Windows-1252) because the contact
//! exports come from spreadsheets saved on varied systems; only the ability to
//! read the file at all is retried across encodings, never its content.

use std::fs;
use std::path::Path;

use encoding_rs::WINDOWS_1252;
use thiserror::Error;
use tracing::info;

/// Header of the phone-number column. When absent the first column is used.
const PHONE_COLUMN: &str = "cellphones";

/// Contact-source errors
#[derive(Error, Debug)]
pub enum ContactError {
    #[error("Failed to read contact file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse contact file: {0}")]
    Parse(#[from] csv::Error),

    #[error("Invalid phone number: {0:?}")]
    InvalidPhone(String),
}

/// One phone-number record plus its ordinal position in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub ordinal: usize,
    pub raw: String,
}

impl Contact {
    /// Normalize the raw field to a leading `+` followed only by digits.
    ///
    /// Normalization failure fails this contact's dispatch, never the run.
    pub fn phone(&self) -> Result<String, ContactError> {
        let trimmed = self.raw.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ContactError::InvalidPhone(self.raw.clone()));
        }
        Ok(format!("+{digits}"))
    }
}

/// Load all contacts from `path`, preserving row order.
pub fn load_contacts(path: &Path) -> Result<Vec<Contact>, ContactError> {
    let bytes = fs::read(path)?;
    let text = decode_with_fallback(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(PHONE_COLUMN))
        .unwrap_or(0);

    let mut contacts = Vec::new();
    for (ordinal, record) in reader.records().enumerate() {
        let record = record?;
        let raw = record.get(column).unwrap_or_default().to_string();
        contacts.push(Contact { ordinal, raw });
    }
    Ok(contacts)
}

/// Decode the raw file bytes, retrying with legacy encodings on invalid UTF-8.
///
/// Latin-1 maps every byte, but bytes in 0x80..=0x9F decode to C1 control
/// characters there; real spreadsheet exports with those bytes are
/// Windows-1252, so that case falls through to cp1252.
fn decode_with_fallback(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    info!("Retrying read CSV with latin1...");
    let latin1 = encoding_rs::mem::decode_latin1(bytes);
    if latin1.chars().any(|c| ('\u{80}'..='\u{9f}').contains(&c)) {
        info!("Retrying read CSV with cp1252...");
        let (cp1252, _, _) = WINDOWS_1252.decode(bytes);
        return cp1252.into_owned();
    }
    latin1.into_owned()
}
