//! Markdown subset used for chat messages
//!
//! Three inline rules applied in a fixed order, each a single
//! non-recursive pass: `**bold**`, then `*italic*`, then `` `code` ``,
//! then newlines become line breaks. Content is escaped before any rule
//! runs, so markup inside a message is always shown as text.
//!
//! Two projections share the rules: [`to_html`] for markup output and
//! [`to_lines`] for front ends that draw styled spans.

use regex::Regex;
use std::sync::OnceLock;

const BOLD_OPEN: char = '\u{E000}';
const BOLD_CLOSE: char = '\u{E001}';
const ITALIC_OPEN: char = '\u{E002}';
const ITALIC_CLOSE: char = '\u{E003}';
const CODE_OPEN: char = '\u{E004}';
const CODE_CLOSE: char = '\u{E005}';

struct Rules {
    bold: Regex,
    italic: Regex,
    code: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        bold: Regex::new(r"\*\*(.*?)\*\*").expect("valid bold pattern"),
        italic: Regex::new(r"\*(.*?)\*").expect("valid italic pattern"),
        code: Regex::new(r"`(.*?)`").expect("valid code pattern"),
    })
}

/// Escape text for safe inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render message content as an HTML fragment
pub fn to_html(content: &str) -> String {
    let rules = rules();
    let escaped = escape_html(content);
    let html = rules.bold.replace_all(&escaped, "<strong>${1}</strong>");
    let html = rules.italic.replace_all(&html, "<em>${1}</em>");
    let html = rules.code.replace_all(&html, "<code>${1}</code>");
    html.replace('\n', "<br>")
}

/// Inline style of a run of text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
}

/// A run of text sharing one style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: InlineStyle,
}

/// Render message content as lines of styled segments.
///
/// The rules run on sentinel characters instead of tags, so the
/// structure matches [`to_html`] exactly without ever producing markup.
pub fn to_lines(content: &str) -> Vec<Vec<Segment>> {
    let rules = rules();
    let cleaned: String = content.chars().filter(|c| !is_sentinel(*c)).collect();

    let bold_rep = format!("{}${{1}}{}", BOLD_OPEN, BOLD_CLOSE);
    let italic_rep = format!("{}${{1}}{}", ITALIC_OPEN, ITALIC_CLOSE);
    let code_rep = format!("{}${{1}}{}", CODE_OPEN, CODE_CLOSE);

    let marked = rules.bold.replace_all(&cleaned, bold_rep.as_str());
    let marked = rules.italic.replace_all(&marked, italic_rep.as_str());
    let marked = rules.code.replace_all(&marked, code_rep.as_str());

    let mut lines = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut text = String::new();
    let mut style = InlineStyle::default();

    for c in marked.chars() {
        let next_style = match c {
            BOLD_OPEN => Some(InlineStyle { bold: true, ..style }),
            BOLD_CLOSE => Some(InlineStyle { bold: false, ..style }),
            ITALIC_OPEN => Some(InlineStyle { italic: true, ..style }),
            ITALIC_CLOSE => Some(InlineStyle { italic: false, ..style }),
            CODE_OPEN => Some(InlineStyle { code: true, ..style }),
            CODE_CLOSE => Some(InlineStyle { code: false, ..style }),
            _ => None,
        };

        if let Some(next) = next_style {
            flush(&mut current, &mut text, style);
            style = next;
        } else if c == '\n' {
            flush(&mut current, &mut text, style);
            lines.push(std::mem::take(&mut current));
        } else {
            text.push(c);
        }
    }
    flush(&mut current, &mut text, style);
    lines.push(current);
    lines
}

fn flush(segments: &mut Vec<Segment>, text: &mut String, style: InlineStyle) {
    if !text.is_empty() {
        segments.push(Segment {
            text: std::mem::take(text),
            style,
        });
    }
}

fn is_sentinel(c: char) -> bool {
    ('\u{E000}'..='\u{E005}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_applies_rules_in_order() {
        let html = to_html("**bold** and *italic* and `code`");
        assert_eq!(
            html,
            "<strong>bold</strong> and <em>italic</em> and <code>code</code>"
        );
    }

    #[test]
    fn test_html_newline_becomes_break() {
        assert_eq!(to_html("one\ntwo"), "one<br>two");
    }

    #[test]
    fn test_html_escapes_before_formatting() {
        let html = to_html("<script>alert('x')</script> **hi**");
        assert_eq!(
            html,
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; <strong>hi</strong>"
        );
    }

    #[test]
    fn test_html_italic_inside_bold() {
        assert_eq!(
            to_html("**a *b* c**"),
            "<strong>a <em>b</em> c</strong>"
        );
    }

    #[test]
    fn test_html_rules_do_not_span_lines() {
        assert_eq!(to_html("*a\nb*"), "*a<br>b*");
    }

    #[test]
    fn test_lines_styles_match_html() {
        let lines = to_lines("**bold** and *italic* and `code`");
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line[0].text, "bold");
        assert!(line[0].style.bold);
        assert_eq!(line[1].text, " and ");
        assert_eq!(line[1].style, InlineStyle::default());
        assert_eq!(line[2].text, "italic");
        assert!(line[2].style.italic);
        assert_eq!(line[4].text, "code");
        assert!(line[4].style.code);
    }

    #[test]
    fn test_lines_split_on_newline() {
        let lines = to_lines("first\n\nthird");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0][0].text, "first");
        assert!(lines[1].is_empty());
        assert_eq!(lines[2][0].text, "third");
    }

    #[test]
    fn test_lines_keep_markup_literal() {
        let lines = to_lines("<b>not bold</b>");
        assert_eq!(lines[0].len(), 1);
        assert_eq!(lines[0][0].text, "<b>not bold</b>");
    }

    #[test]
    fn test_lines_nested_styles() {
        let lines = to_lines("**a *b* c**");
        let b = &lines[0][1];
        assert_eq!(b.text, "b");
        assert!(b.style.bold && b.style.italic);
    }

    #[test]
    fn test_lines_drop_sentinel_characters_from_input() {
        let lines = to_lines("x\u{E000}y");
        assert_eq!(lines[0][0].text, "xy");
    }
}
