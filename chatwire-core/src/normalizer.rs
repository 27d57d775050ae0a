use unicode_normalization::UnicodeNormalization;

use crate::error::{ChatWireError, CoreResult};

fn clean_text(s: &str) -> String {
    // Unicode NFC normalization + BOM strip + CRLF -> LF + trim
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t.trim().to_string()
}

/// Clean up user input before it enters the transcript. Blank input is rejected.
pub fn normalize_input(raw: &str) -> CoreResult<String> {
    let text = clean_text(raw);
    if text.is_empty() {
        return Err(ChatWireError::Validation("message is empty".into()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_input() {
        assert_eq!(normalize_input("  Hello world   ").unwrap(), "Hello world");
    }

    #[test]
    fn blank_input_is_rejected() {
        for raw in ["", "   ", "\u{FEFF}", "\r\n\t"] {
            match normalize_input(raw) {
                Err(ChatWireError::Validation(msg)) => assert!(msg.contains("empty")),
                other => panic!("expected Validation error for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn unicode_nfc_and_crlf_normalization() {
        // "e" + combining acute accent should normalize to "é"
        assert_eq!(normalize_input("e\u{301}").unwrap(), "é");
        assert_eq!(normalize_input("line1\r\nline2").unwrap(), "line1\nline2");
        assert_eq!(normalize_input("\u{FEFF}hi").unwrap(), "hi");
    }
}
