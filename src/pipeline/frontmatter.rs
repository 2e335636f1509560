//! Front-matter removal on raw Markdown bytes.
//!
//! Works on bytes rather than `str` so that stripping never depends on the
//! document's encoding being valid; decoding happens once, later, in the
//! orchestrator.

/// Delimiter line that opens and closes a front-matter block.
pub const FRONT_MATTER_DELIMITER: &[u8] = b"---\n";

/// Remove every `---\n … ---\n` block from `content`.
///
/// Scans for an opening delimiter, then the next delimiter after it, and
/// deletes the whole span including both delimiters. Scanning resumes at the
/// deletion point, backed up by `delimiter.len() - 1` bytes so a delimiter
/// formed across the splice is also seen; this keeps the function idempotent.
/// An opening delimiter without a closing partner ends the scan: it and
/// everything after it are kept.
pub fn remove_front_matter(content: &[u8]) -> Vec<u8> {
    let delim = FRONT_MATTER_DELIMITER;
    let mut result = content.to_vec();
    let mut position = 0;

    loop {
        let Some(start) = find(&result, delim, position) else {
            break;
        };
        let Some(end) = find(&result, delim, start + delim.len()) else {
            break;
        };
        result.drain(start..end + delim.len());
        position = start.saturating_sub(delim.len() - 1);
    }

    result
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
