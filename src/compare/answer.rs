//! `\boxed{...}` answer extraction for verifiable scenarios.

const BOXED: &str = "\\boxed{";

/// Content of the last `\boxed{...}` in `text`, trimmed. Nested braces are
/// balanced; an unterminated box yields `None`.
pub fn extract_boxed_answer(text: &str) -> Option<String> {
    let start = text.rfind(BOXED)? + BOXED.len();
    let mut depth = 1usize;

    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset].trim().to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Compare an extracted answer with the expected one, ignoring surrounding
/// whitespace.
pub fn answer_matches(expected: &str, found: &str) -> bool {
    expected.trim() == found.trim()
}
