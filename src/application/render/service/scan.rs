//! Delimiter-bounded span scanning shared by normalization, conversion and
//! the math pass, plus the code ranges that Markdown-level scans must skip.
//!
//! Scanning walks the text left to right. At each position the delimiters
//! are tried in order and the first one whose left token matches and whose
//! right token can be found wins. The closing search honours backslash
//! escapes and brace nesting, so `$\text{$}$` closes on the final dollar.
//! A matched span is consumed in full before scanning resumes, which keeps
//! symmetric fences such as `$…$` from overlapping. Inline spans end at a
//! blank line, so they never reach across a paragraph break.

use std::ops::Range;

use crate::domain::delimiters::MathDelimiter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MathSpan {
    /// Byte range of the whole span, delimiters included.
    pub(crate) outer: Range<usize>,
    /// Byte range of the expression between the delimiters.
    pub(crate) inner: Range<usize>,
    pub(crate) display: bool,
}

pub(crate) fn find_spans(text: &str, delimiters: &[MathDelimiter]) -> Vec<MathSpan> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut index = 0;

    'scan: while index < bytes.len() {
        for delimiter in delimiters.iter().filter(|d| d.is_usable()) {
            let left = delimiter.left.as_bytes();
            if !bytes[index..].starts_with(left) {
                continue;
            }

            let content_start = index + left.len();
            if let Some(content_end) = find_end(
                bytes,
                content_start,
                delimiter.right.as_bytes(),
                delimiter.display,
            ) && content_end > content_start
            {
                let outer_end = content_end + delimiter.right.len();
                spans.push(MathSpan {
                    outer: index..outer_end,
                    inner: content_start..content_end,
                    display: delimiter.display,
                });
                index = outer_end;
                continue 'scan;
            }
        }

        // An escaped character never opens a span.
        index += if bytes[index] == b'\\' { 2 } else { 1 };
    }

    spans
}

fn find_end(bytes: &[u8], start: usize, right: &[u8], display: bool) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut index = start;

    while index < bytes.len() {
        if depth <= 0 && bytes[index..].starts_with(right) {
            return Some(index);
        }
        if !display && bytes[index] == b'\n' && blank_line_follows(bytes, index + 1) {
            return None;
        }
        match bytes[index] {
            b'\\' if bytes.get(index + 1) != Some(&b'\n') => index += 1,
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ => {}
        }
        index += 1;
    }

    None
}

/// True when the line starting at `start` holds only spaces or tabs and is
/// itself terminated by a line break.
fn blank_line_follows(bytes: &[u8], start: usize) -> bool {
    bytes[start.min(bytes.len())..]
        .iter()
        .find(|b| !matches!(b, b' ' | b'\t'))
        .is_some_and(|b| *b == b'\n')
}

/// Cheap pre-check: does any usable left token occur at all?
pub(crate) fn may_contain_math(text: &str, delimiters: &[MathDelimiter]) -> bool {
    delimiters
        .iter()
        .filter(|d| d.is_usable())
        .any(|d| text.contains(d.left.as_str()))
}

/// Byte ranges of fenced code blocks and backtick code spans, in order and
/// non-overlapping. An unclosed fence runs to the end of the text; an
/// unmatched backtick run is ordinary text.
pub(crate) fn code_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut fence: Option<(u8, usize, usize)> = None;
    let mut prose_start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        match fence {
            Some((marker, width, start)) => {
                if fence_marker(line).is_some_and(|(m, w)| m == marker && w >= width) {
                    ranges.push(start..offset);
                    fence = None;
                    prose_start = offset;
                }
            }
            None => {
                if let Some((marker, width)) = fence_marker(line) {
                    push_inline_code(text, prose_start..line_start, &mut ranges);
                    fence = Some((marker, width, line_start));
                }
            }
        }
    }

    match fence {
        Some((_, _, start)) => ranges.push(start..text.len()),
        None => push_inline_code(text, prose_start..text.len(), &mut ranges),
    }
    ranges
}

fn fence_marker(line: &str) -> Option<(u8, usize)> {
    let indent = line.bytes().take_while(|b| *b == b' ').count();
    if indent > 3 {
        return None;
    }
    let rest = &line.as_bytes()[indent..];
    let marker = *rest.first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let width = rest.iter().take_while(|b| **b == marker).count();
    (width >= 3).then_some((marker, width))
}

fn push_inline_code(text: &str, prose: Range<usize>, ranges: &mut Vec<Range<usize>>) {
    let bytes = text.as_bytes();
    let mut index = prose.start;

    while index < prose.end {
        if bytes[index] != b'`' {
            index += 1;
            continue;
        }
        let run = run_length(bytes, index, prose.end);
        let mut search = index + run;
        let mut closed = None;
        while search < prose.end {
            if bytes[search] == b'`' {
                let closing = run_length(bytes, search, prose.end);
                if closing == run {
                    closed = Some(search + closing);
                    break;
                }
                search += closing;
            } else {
                search += 1;
            }
        }
        match closed {
            Some(end) => {
                ranges.push(index..end);
                index = end;
            }
            None => index += run,
        }
    }
}

fn run_length(bytes: &[u8], start: usize, end: usize) -> usize {
    bytes[start..end].iter().take_while(|b| **b == b'`').count()
}
