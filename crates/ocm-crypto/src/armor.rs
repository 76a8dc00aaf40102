//! # PEM Signature Scanning
//!
//! Extracts the bytes of a labelled block from PEM text that may contain
//! several blocks. Text before a `-----BEGIN` line is ignored, as in RFC
//! 7468 parsers. Scanning is strict: every block must parse, and anything
//! other than whitespace after the last block is an error, even when the
//! wanted block was already found.

use crate::error::SignatureError;

const BEGIN: &str = "-----BEGIN ";
const DASHES: &str = "-----";

/// Return the contents of the first block labelled `label`.
///
/// # Errors
///
/// - [`SignatureError::MalformedPem`] if a block does not parse or a
///   non-whitespace fragment trails the last block.
/// - [`SignatureError::NoMatchingBlock`] if every block parsed but none
///   carries `label`.
pub fn find_block(input: &str, label: &str) -> Result<Vec<u8>, SignatureError> {
    let mut found: Option<Vec<u8>> = None;
    let mut rest = input;

    loop {
        let Some(begin) = rest.find(BEGIN) else {
            if !rest.trim().is_empty() {
                return Err(SignatureError::MalformedPem(format!(
                    "unparsable trailing data: {:?}",
                    truncate(rest.trim())
                )));
            }
            break;
        };
        let block_start = &rest[begin..];
        let label_end = block_start[BEGIN.len()..]
            .find(DASHES)
            .ok_or_else(|| SignatureError::MalformedPem("unterminated BEGIN line".to_string()))?;
        let block_label = &block_start[BEGIN.len()..BEGIN.len() + label_end];
        let end_marker = format!("-----END {block_label}-----");
        let end = block_start.find(&end_marker).ok_or_else(|| {
            SignatureError::MalformedPem(format!("missing END line for {block_label} block"))
        })?;
        let block_len = end + end_marker.len();

        let block = pem::parse(&block_start[..block_len])
            .map_err(|e| SignatureError::MalformedPem(format!("{block_label} block: {e}")))?;
        if found.is_none() && block.tag() == label {
            found = Some(block.into_contents());
        }
        rest = &block_start[block_len..];
    }

    found.ok_or_else(|| SignatureError::NoMatchingBlock {
        label: label.to_string(),
    })
}

/// Armor `bytes` as a single PEM block with LF line endings.
pub fn encode_block(label: &str, bytes: Vec<u8>) -> String {
    let config = pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF);
    pem::encode_config(&pem::Pem::new(label, bytes), config)
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(32) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
