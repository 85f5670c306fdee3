//! Lexical highlighter for the source pane.
//!
//! A single left-to-right scan over one compiled alternation of token rules. Text
//! between tokens is emitted as [`StyleClass::Plain`], so the spans always tile the
//! input exactly.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleClass {
    Plain,
    Keyword,
    Identifier,
    Boolean,
    Type,
    Number,
    Comment,
    String,
    Char,
    Symbol,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StyledSpan<'a> {
    pub text: &'a str,
    pub style: StyleClass,
}

const KEYWORDS: &str = r"\b(?:public|private|protected|abstract|class|extends|final|implements|interface|native|new|static|strictfp|synchronized|transient|volatile|break|case|continue|default|do|else|for|if|return|switch|while|assert|finally|throw|throws|try|import|package|super|this|void|enum|instanceof|var|yield|sealed|permits|record|module|requires|exports|opens|uses|provides|to|with|transitive)\b";

// Priority order: the first rule that accepts a whole token decides its class.
const RULES: &[(StyleClass, &str)] = &[
    (StyleClass::Keyword, KEYWORDS),
    (StyleClass::Identifier, r"\b[A-Za-z][A-Za-z0-9_]*\b"),
    (StyleClass::Boolean, r"\b(?:true|false)\b"),
    (
        StyleClass::Type,
        r"\b(?:boolean|byte|char|double|float|int|long|short|void|null)\b",
    ),
    (StyleClass::Number, r"\b[0-9]+\b"),
    (
        StyleClass::Comment,
        r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/|//[^\n]*",
    ),
    (StyleClass::String, r#""[^"\\]*(?:\\.[^"\\]*)*""#),
    (StyleClass::Char, r#"'(?:[^'\\]|\\[btnfr'"\\])'"#),
    (StyleClass::Symbol, r"[!@#$%^&*()\[\]{}\-+=|:;/?.,<>~]"),
];

static SCANNER: Lazy<Regex> = Lazy::new(|| {
    let alternation = RULES
        .iter()
        .map(|(_, pattern)| format!("(?:{pattern})"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).unwrap_or_else(|e| panic!("invalid scanner pattern: {e}"))
});

static CLASSIFIER: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new(RULES.iter().map(|(_, pattern)| format!("^(?:{pattern})$")))
        .unwrap_or_else(|e| panic!("invalid classifier pattern: {e}"))
});

/// Classify a whole token against the rule list; the lowest matching rule wins.
pub fn classify(token: &str) -> StyleClass {
    CLASSIFIER
        .matches(token)
        .iter()
        .next()
        .map(|idx| RULES[idx].0)
        .unwrap_or(StyleClass::Error)
}

/// Split `text` into styled spans whose concatenation is exactly `text`.
pub fn highlight(text: &str) -> Vec<StyledSpan<'_>> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let Some(m) = SCANNER.find_at(text, cursor) else {
            break;
        };
        if m.start() > cursor {
            spans.push(StyledSpan {
                text: &text[cursor..m.start()],
                style: StyleClass::Plain,
            });
        }
        // Every rule consumes at least one character.
        debug_assert!(m.end() > m.start());
        spans.push(StyledSpan {
            text: m.as_str(),
            style: classify(m.as_str()),
        });
        cursor = m.end();
    }

    if cursor < text.len() {
        spans.push(StyledSpan {
            text: &text[cursor..],
            style: StyleClass::Plain,
        });
    }
    spans
}
