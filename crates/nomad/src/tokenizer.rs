//! Source text to flat token sequence.
//!
//! Single-pass, rune-at-a-time scanning with one-character lookahead
//! (`peek`/`consume`, quote-escape via the previously consumed
//! character). Identifiers may start and continue with a letter,
//! underscore, or emoji.

use tracing::trace;

use crate::error::Error;
use crate::token::{Span, Token, TokenKind};

pub fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    Tokenizer::new(source).run()
}

/// Identifier-grade emoji: the common pictograph/emoticon/symbol blocks,
/// mirroring the scope of a plain emoji-range check without pulling in
/// a full grapheme-segmentation dependency.
fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x2600..=0x27BF
        | 0x1F300..=0x1F5FF
        | 0x1F600..=0x1F64F
        | 0x1F680..=0x1F6FF
        | 0x1F900..=0x1F9FF
        | 0x1FA70..=0x1FAFF
    )
}

struct Tokenizer {
    chars: Vec<char>,
    idx: usize,
    line: usize,
    col: usize,
}

impl Tokenizer {
    fn new(source: &str) -> Self {
        Self { chars: source.chars().collect(), idx: 0, line: 1, col: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).copied()
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn span_from(&self, start_line: usize, start_col: usize) -> Span {
        Span::new(start_line, start_col, self.col)
    }

    fn run(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens: Vec<Token> = Vec::new();
        while let Some(c) = self.peek() {
            let (line, col) = (self.line, self.col);
            match c {
                ' ' | '\t' | '\r' => {
                    self.consume();
                }
                '\n' => {
                    self.consume();
                    if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::NewLine) {
                        tokens.push(Token::new(TokenKind::NewLine, "\n", self.span_from(line, col)));
                    }
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.consume();
                    }
                }
                '\'' | '"' => tokens.push(self.scan_string(c)?),
                c if c.is_ascii_digit() => tokens.push(self.scan_number()),
                c if c.is_alphabetic() || c == '_' || is_emoji(c) => tokens.push(self.scan_identifier()),
                _ => tokens.push(self.scan_operator()?),
            }
        }
        tokens.push(Token::eof(Span::new(self.line, self.col, self.col)));
        trace!(count = tokens.len(), "tokenized source");
        Ok(tokens)
    }

    fn scan_string(&mut self, quote: char) -> Result<Token, Error> {
        let (line, col) = (self.line, self.col);
        let mut content = String::new();
        content.push(self.consume().unwrap());
        let mut prev = quote;
        loop {
            match self.consume() {
                None => return Err(Error::parse(self.span_from(line, col), "unterminated string literal", true)),
                Some(c) => {
                    content.push(c);
                    if c == quote && prev != '\\' {
                        break;
                    }
                    prev = c;
                }
            }
        }
        Ok(Token::new(TokenKind::StringLit, content, self.span_from(line, col)))
    }

    fn scan_number(&mut self) -> Token {
        let (line, col) = (self.line, self.col);
        let mut content = String::new();
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                content.push(c);
                self.consume();
            } else if c == '.' && !seen_dot && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) {
                seen_dot = true;
                content.push(c);
                self.consume();
            } else {
                break;
            }
        }
        Token::new(TokenKind::NumLit, content, self.span_from(line, col))
    }

    fn scan_identifier(&mut self) -> Token {
        let (line, col) = (self.line, self.col);
        let mut content = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || is_emoji(c) {
                content.push(c);
                self.consume();
            } else {
                break;
            }
        }
        let span = self.span_from(line, col);
        let lowered = content.to_lowercase();
        match TokenKind::keyword(&lowered) {
            Some(kind) => Token::new(kind, content, span),
            None => Token::new(TokenKind::Id, content, span),
        }
    }

    fn scan_operator(&mut self) -> Result<Token, Error> {
        let (line, col) = (self.line, self.col);
        let c = self.consume().unwrap();
        let two_char = |first: char, second: char| first == c && self.peek() == Some(second);

        macro_rules! two {
            ($second:expr, $kind:expr) => {
                if self.peek() == Some($second) {
                    self.consume();
                    let span = self.span_from(line, col);
                    return Ok(Token::new($kind, format!("{c}{}", $second), span));
                }
            };
        }

        let _ = two_char;
        match c {
            '+' => two!('+', TokenKind::DbPlus),
            '-' => {
                two!('-', TokenKind::DbMinus);
            }
            '=' => two!('=', TokenKind::DoubleEqual),
            '<' => two!('=', TokenKind::InferiorOrEq),
            '>' => two!('=', TokenKind::SuperiorOrEq),
            ':' => two!(':', TokenKind::DoubleColon),
            _ => {}
        }
        if c == '-' && self.peek() == Some('>') {
            self.consume();
            let span = self.span_from(line, col);
            return Ok(Token::new(TokenKind::Arrow, "->", span));
        }

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '<' => TokenKind::Inferior,
            '>' => TokenKind::Superior,
            '=' => TokenKind::Equal,
            '!' => TokenKind::Bang,
            '&' => TokenKind::AndSign,
            '|' => TokenKind::Bar,
            '#' => TokenKind::Hash,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '(' => TokenKind::LeftBracket,
            ')' => TokenKind::RightBracket,
            '[' => TokenKind::LeftSquare,
            ']' => TokenKind::RightSquare,
            '{' => TokenKind::LeftCurly,
            '}' => TokenKind::RightCurly,
            other => return Err(Error::lex(self.span_from(line, col), other)),
        };
        Ok(Token::new(kind, c.to_string(), self.span_from(line, col)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn collapses_blank_line_runs() {
        let k = kinds("1\n\n\n2");
        assert_eq!(k, vec![TokenKind::NumLit, TokenKind::NewLine, TokenKind::NumLit, TokenKind::Eof]);
    }

    #[test]
    fn recognises_two_char_operators() {
        let k = kinds("x :: 1 <= 2 >= 3 == 4 ++ -- ->");
        assert_eq!(
            k,
            vec![
                TokenKind::Id,
                TokenKind::DoubleColon,
                TokenKind::NumLit,
                TokenKind::InferiorOrEq,
                TokenKind::NumLit,
                TokenKind::SuperiorOrEq,
                TokenKind::NumLit,
                TokenKind::DoubleEqual,
                TokenKind::NumLit,
                TokenKind::DbPlus,
                TokenKind::DbMinus,
                TokenKind::Arrow,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let k = kinds("TRUE False");
        assert_eq!(k, vec![TokenKind::True, TokenKind::False, TokenKind::Eof]);
    }

    #[test]
    fn line_comment_runs_to_newline() {
        let k = kinds("1 // comment\n2");
        assert_eq!(k, vec![TokenKind::NumLit, TokenKind::NewLine, TokenKind::NumLit, TokenKind::Eof]);
    }

    #[test]
    fn unknown_character_is_a_lex_error() {
        assert!(tokenize("@").is_err());
    }

    #[test]
    fn emoji_is_a_valid_identifier() {
        let tokens = tokenize("🔥 :: 1").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Id);
        assert_eq!(tokens[0].content, "🔥");
    }
}
