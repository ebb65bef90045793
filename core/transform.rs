//! Content transforms applied to each file before it is framed into a bundle.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    BlockComment,
    Literal(char),
}

/// Removes `//` and `/* */` comments from C-family source.
///
/// String literals are tracked so comment markers inside them survive.
/// Double-quoted and backtick literals may span lines; a single-quoted literal
/// ends at the next newline, so lifetimes and stray apostrophes cannot swallow
/// the rest of the file. Line comments stop before the line break, which is kept.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                '"' | '\'' | '`' => {
                    out.push(c);
                    state = State::Literal(c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' || c == '\r' {
                    out.push(c);
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                }
            }
            State::Literal(delimiter) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == delimiter || (delimiter == '\'' && c == '\n') {
                    state = State::Code;
                }
            }
        }
    }
    out
}

/// Whitespace-only lines become empty, then any run of three or more line
/// breaks collapses to two.
pub fn compact_whitespace(source: &str) -> String {
    let blanked = source
        .split('\n')
        .map(|line| if line.trim().is_empty() { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = String::with_capacity(blanked.len());
    let mut newline_run = 0;
    for c in blanked.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run > 2 {
                continue;
            }
        } else {
            newline_run = 0;
        }
        out.push(c);
    }
    out
}

/// Drops every blank line and trims the result.
pub fn minify(source: &str) -> String {
    source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_and_block_comments() {
        let src = "int a = 1; // one\n/* block\n spanning */int b = 2;\n";
        assert_eq!(strip_comments(src), "int a = 1; \nint b = 2;\n");
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let src = r#"String url = "http://example.com/*x*/"; // trailing"#;
        assert_eq!(strip_comments(src), r#"String url = "http://example.com/*x*/"; "#);
    }

    #[test]
    fn escaped_quotes_do_not_end_a_string() {
        let src = r#"s = "a \" // not a comment"; // comment"#;
        assert_eq!(strip_comments(src), r#"s = "a \" // not a comment"; "#);
    }

    #[test]
    fn template_literals_may_span_lines() {
        let src = "const t = `line one\n// still text\n`; // gone";
        assert_eq!(strip_comments(src), "const t = `line one\n// still text\n`; ");
    }

    #[test]
    fn single_quote_literal_ends_at_newline() {
        let src = "fn f<'a>(x: &'a str) {} // note\nlet c = 'x'; // char\nit's // fine\nnext();";
        let out = strip_comments(src);
        assert!(out.contains("let c = 'x'; \n"));
        assert!(out.ends_with("next();"));
    }

    #[test]
    fn unterminated_block_comment_eats_the_rest() {
        assert_eq!(strip_comments("a /* open\nb"), "a ");
    }

    #[test]
    fn compaction_collapses_blank_runs() {
        let src = "a\n   \n\n\t\nb\n\nc\n";
        assert_eq!(compact_whitespace(src), "a\n\nb\n\nc\n");
    }

    #[test]
    fn compaction_keeps_a_single_trailing_blank_line() {
        assert_eq!(compact_whitespace("a\n\n"), "a\n\n");
        assert_eq!(compact_whitespace("a\n  \n"), "a\n\n");
        assert_eq!(compact_whitespace("a\n\n\n\n"), "a\n\n");
    }

    #[test]
    fn compaction_keeps_code_lines_untouched() {
        assert_eq!(compact_whitespace("  indented  \nnext"), "  indented  \nnext");
    }

    #[test]
    fn minify_removes_blank_lines_and_trims() {
        assert_eq!(minify("\n\n  first\n\n   \nsecond  \n\n"), "first\nsecond");
    }
}
