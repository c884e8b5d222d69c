/*
 * Reversible clipboard "encryption". Content is wrapped as the literal marker
 * `ENCRYPTED:` followed by the standard base64 encoding of the bytes.
 *
 * This is obfuscation only. Anyone who can read the clipboard can undo it; it
 * must never be presented as a confidentiality mechanism.
 */
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub const MARKER: &str = "ENCRYPTED:";

pub fn encode(content: &[u8]) -> String {
    format!("{MARKER}{}", STANDARD.encode(content))
}

pub fn is_marked(text: &str) -> bool {
    text.starts_with(MARKER)
}

/*
 * Reverses `encode`. Returns `None` if `text` lacks the marker or the payload is
 * not valid base64.
 */
pub fn decode(text: &str) -> Option<Vec<u8>> {
    let payload = text.strip_prefix(MARKER)?;
    match STANDARD.decode(payload.trim_end()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("Obfuscation: Marked content is not valid base64: {e}");
            None
        }
    }
}

/*
 * Convenience for clipboard reads: decodes marked content into text, leaving
 * anything unmarked or undecodable untouched.
 */
pub fn reveal(text: String) -> String {
    if !is_marked(&text) {
        return text;
    }
    match decode(&text) {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => text,
    }
}
