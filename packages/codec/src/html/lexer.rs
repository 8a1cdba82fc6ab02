//! HTML tokenizer
//!
//! Logos provides the DFA. Comments and start tags need callbacks: the
//! first scans to `-->`, the second scans to the closing `>` while
//! skipping quoted attribute values.

use logos::{Lexer, Logos};

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token<'src> {
    /// Comment body without the delimiters
    #[token("<!--", lex_comment)]
    Comment(&'src str),

    /// `<!DOCTYPE …>` and processing instructions
    #[regex(r"<[!?][a-zA-Z][^>]*>")]
    Declaration,

    /// Whole start tag including attributes
    #[regex(r"<[a-zA-Z][a-zA-Z0-9-]*", lex_start_tag)]
    StartTag(&'src str),

    #[regex(r"</[a-zA-Z][a-zA-Z0-9-]*[ \t\n\r]*>", |lex| lex.slice())]
    EndTag(&'src str),

    #[regex(r"[^<]+", |lex| lex.slice())]
    Text(&'src str),

    /// A `<` that opens nothing
    #[token("<")]
    Lt,
}

fn lex_comment<'src>(lex: &mut Lexer<'src, Token<'src>>) -> Option<&'src str> {
    let end = lex.remainder().find("-->")?;
    let body = &lex.remainder()[..end];
    lex.bump(end + 3);
    Some(body)
}

fn lex_start_tag<'src>(lex: &mut Lexer<'src, Token<'src>>) -> Option<&'src str> {
    let mut quote = None;
    for (index, c) in lex.remainder().char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => {
                lex.bump(index + 1);
                return Some(lex.slice());
            }
            _ => {}
        }
    }
    None
}

/// Reason a token failed, from the input starting at the failed span
pub fn describe_error(rest: &str) -> &'static str {
    if rest.starts_with("<!--") {
        "unterminated comment"
    } else {
        "unterminated tag"
    }
}
