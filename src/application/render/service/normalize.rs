use crate::domain::delimiters::MathDelimiter;

use super::scan::{code_ranges, find_spans, may_contain_math};

/// Prepare raw message text for conversion.
///
/// Line endings become `\n`. Inside inline math spans every line break is
/// folded into a space (dropping a dangling continuation backslash); inside
/// display spans blank lines collapse so the span stays in one paragraph.
/// Text outside math spans is returned untouched, and so are fenced blocks
/// and backtick code.
pub fn normalize_source(text: &str, delimiters: &[MathDelimiter]) -> String {
    let unified = unify_line_endings(text);
    if !may_contain_math(&unified, delimiters) {
        return unified;
    }

    let mut output = String::with_capacity(unified.len());
    let mut cursor = 0;
    for code in code_ranges(&unified) {
        normalize_segment(&unified[cursor..code.start], delimiters, &mut output);
        output.push_str(&unified[code.clone()]);
        cursor = code.end;
    }
    normalize_segment(&unified[cursor..], delimiters, &mut output);
    output
}

fn normalize_segment(segment: &str, delimiters: &[MathDelimiter], output: &mut String) {
    let mut cursor = 0;
    for span in find_spans(segment, delimiters) {
        output.push_str(&segment[cursor..span.inner.start]);
        let inner = &segment[span.inner.clone()];
        if span.display {
            output.push_str(&collapse_blank_lines(inner));
        } else {
            output.push_str(&fold_line_breaks(inner));
        }
        cursor = span.inner.end;
    }
    output.push_str(&segment[cursor..]);
}

fn unify_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn fold_line_breaks(inner: &str) -> String {
    let mut folded = String::with_capacity(inner.len());
    for (idx, line) in inner.split('\n').enumerate() {
        if idx > 0 {
            folded.push(' ');
        }
        folded.push_str(strip_continuation(line));
    }
    folded
}

/// Drops a trailing backslash that escapes the line break. `\\` (a TeX
/// newline) is an even run and stays.
fn strip_continuation(line: &str) -> &str {
    let trailing = line.bytes().rev().take_while(|b| *b == b'\\').count();
    if trailing % 2 == 1 {
        &line[..line.len() - 1]
    } else {
        line
    }
}

/// Keeps the first and last line (the fences' own line breaks) and drops
/// blank lines in between.
fn collapse_blank_lines(inner: &str) -> String {
    let lines: Vec<&str> = inner.split('\n').collect();
    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .filter(|(idx, line)| *idx == 0 || *idx == last || !line.trim().is_empty())
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::delimiters::default_delimiters;

    #[test]
    fn crlf_becomes_lf() {
        let output = normalize_source("a\r\nb\rc", &default_delimiters());
        assert_eq!(output, "a\nb\nc");
    }

    #[test]
    fn inline_math_line_breaks_fold_into_spaces() {
        let output = normalize_source("see $a +\nb$ here\nnext", &default_delimiters());
        assert_eq!(output, "see $a + b$ here\nnext");
    }

    #[test]
    fn continuation_backslash_is_dropped() {
        let output = normalize_source("$a + \\\nb$", &default_delimiters());
        assert_eq!(output, "$a +  b$");
    }

    #[test]
    fn tex_newline_is_kept() {
        let output = normalize_source("\\(a \\\\\nb\\)", &default_delimiters());
        assert_eq!(output, "\\(a \\\\ b\\)");
    }

    #[test]
    fn display_math_blank_lines_collapse() {
        let output = normalize_source("$$\na = 1\n\n\nb = 2\n$$", &default_delimiters());
        assert_eq!(output, "$$\na = 1\nb = 2\n$$");
    }

    #[test]
    fn text_without_math_is_unchanged() {
        let text = "plain\n\nparagraphs";
        assert_eq!(normalize_source(text, &default_delimiters()), text);
    }

    #[test]
    fn fenced_code_lines_are_not_joined() {
        let text = "```sh\necho $A\necho $B\n```\n";
        assert_eq!(normalize_source(text, &default_delimiters()), text);
    }

    #[test]
    fn backtick_code_is_left_alone() {
        let text = "run `echo $A\necho $B` then $x +\ny$";
        assert_eq!(
            normalize_source(text, &default_delimiters()),
            "run `echo $A\necho $B` then $x + y$"
        );
    }

    #[test]
    fn paragraphs_with_two_amounts_keep_their_break() {
        let text = "I paid $5 today.\n\nYou paid $10 yesterday.";
        assert_eq!(normalize_source(text, &default_delimiters()), text);
    }
}
