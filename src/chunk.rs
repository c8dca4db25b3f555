//! Paragraph-boundary passage splitter.
//!
//! Off by default: a document is stored as one point. When
//! `ingest.max_chunk_chars` is set, text is split on paragraph boundaries
//! (`\n\n`) into passages of at most that many characters; a paragraph that
//! alone exceeds the limit is hard-split at the last newline or space before
//! the limit.

/// Split `text` into passages.
///
/// `None` returns the trimmed text as a single passage. Empty input yields no
/// passages. Limits are counted in characters, never splitting a code point.
pub fn split_passages(text: &str, max_chars: Option<usize>) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let max_chars = match max_chars {
        Some(max) if max > 0 => max,
        _ => return vec![trimmed.to_string()],
    };

    let mut passages = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for para in trimmed.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let para_chars = para.chars().count();

        let would_be = if current.is_empty() {
            para_chars
        } else {
            current_chars + 2 + para_chars
        };

        if would_be > max_chars && !current.is_empty() {
            passages.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        if para_chars > max_chars {
            hard_split(para, max_chars, &mut passages);
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
                current_chars += 2;
            }
            current.push_str(para);
            current_chars += para_chars;
        }
    }

    if !current.is_empty() {
        passages.push(current);
    }

    passages
}

/// Split one oversized paragraph, preferring newline then space boundaries.
fn hard_split(para: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = para;
    while !remaining.is_empty() {
        let limit = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(remaining.len());

        let split_at = if limit < remaining.len() {
            remaining[..limit]
                .rfind('\n')
                .or_else(|| remaining[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            limit
        };

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}
