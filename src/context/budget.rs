//! Budget helpers for context assembly.
//!
//! Token counts use the ~4-chars-per-token heuristic; it is close enough
//! for source code and costs nothing. Truncation preserves whole lines and
//! appends an explicit marker so consumers can tell a slice was cut.

/// Marker appended to truncated code blocks.
pub const TRUNCATION_MARKER: &str = "… [truncated]";

/// Estimate tokens in `text` (ceiling of len/4).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Trim `text` to at most `max_tokens`, keeping whole lines. The first
/// line is always kept so the caller gets something.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if max_tokens == 0 {
        return String::new();
    }
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0usize;
    for (i, line) in text.lines().enumerate() {
        let cost = estimate_tokens(line) + 1;
        if used + cost > max_tokens && i > 0 {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
        used += cost;
    }
    out
}

/// Cap a code block at `max_chars` characters, keeping whole lines and
/// appending [`TRUNCATION_MARKER`] when anything was dropped.
///
/// Returns the (possibly cut) text and whether truncation happened.
pub fn clip_code_block(code: &str, max_chars: usize) -> (String, bool) {
    if code.chars().count() <= max_chars {
        return (code.to_string(), false);
    }

    let mut out = String::new();
    for line in code.lines() {
        let candidate_len = out.chars().count() + line.chars().count() + 1;
        if !out.is_empty() && candidate_len > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
        if out.chars().count() >= max_chars {
            out = out.chars().take(max_chars).collect();
            break;
        }
    }
    out.push('\n');
    out.push_str(TRUNCATION_MARKER);
    (out, true)
}

/// Collapse a signature onto one line with normalized spacing.
pub fn compact_signature(signature: &str) -> String {
    signature.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
