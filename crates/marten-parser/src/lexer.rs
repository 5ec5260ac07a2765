//! Hand-written lexer.
//!
//! Produces the cursor-style token stream the parser consumes, including
//! `Whitespace` and `LineTerminator` tokens: the parser skips those itself
//! while tracking line breaks for automatic semicolon insertion. A block
//! comment containing a newline lexes as a line terminator for the same
//! reason.

use crate::error::ParseError;
use crate::source::{SourceExtent, SourceFile};
use crate::token::{keyword_kind, Token, TokenKind, TokenValue};

fn is_whitespace_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0B' | '\x0C')
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

/// A cursor over the token stream of one source file.
pub struct Lexer {
    file: SourceFile,
    pos: u32,
    current: Token,
}

impl Lexer {
    /// Create a lexer and scan the first token.
    pub fn new(file: SourceFile) -> Result<Self, ParseError> {
        let mut lexer = Self {
            file,
            pos: 0,
            current: Token {
                kind: TokenKind::Eof,
                start: 0,
                end: 0,
                value: TokenValue::None,
            },
        };
        lexer.advance()?;
        Ok(lexer)
    }

    /// The token under the cursor. Stays at `Eof` once the input ends.
    pub fn current_token(&self) -> &Token {
        &self.current
    }

    /// End offset of the current token.
    pub fn text_position(&self) -> u32 {
        self.current.end
    }

    /// Advance the cursor to the next token.
    pub fn next_token(&mut self) -> Result<(), ParseError> {
        self.advance()
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let (kind, value) = self.scan()?;
        self.current = Token {
            kind,
            start,
            end: self.pos,
            value,
        };
        Ok(())
    }

    fn peek(&self, offset: u32) -> Option<char> {
        self.file.text().get((self.pos + offset) as usize).copied()
    }

    fn error_at(&self, start: u32, message: impl Into<String>) -> ParseError {
        // Span at least one character when there is one to span.
        let end = (start + 1).max(self.pos).min(self.file.len()).max(start);
        ParseError {
            extent: SourceExtent::new(self.file.clone(), start, end),
            rule: "lexer",
            message: message.into(),
        }
    }

    fn scan(&mut self) -> Result<(TokenKind, TokenValue), ParseError> {
        let Some(c) = self.peek(0) else {
            return Ok((TokenKind::Eof, TokenValue::None));
        };
        match c {
            '\r' => {
                self.pos += 1;
                // CRLF is one terminator.
                if self.peek(0) == Some('\n') {
                    self.pos += 1;
                }
                Ok((TokenKind::LineTerminator, TokenValue::None))
            }
            '\n' => {
                self.pos += 1;
                Ok((TokenKind::LineTerminator, TokenValue::None))
            }
            c if is_whitespace_char(c) => {
                while matches!(self.peek(0), Some(c) if is_whitespace_char(c)) {
                    self.pos += 1;
                }
                Ok((TokenKind::Whitespace, TokenValue::None))
            }
            '/' if self.peek(1) == Some('/') => {
                self.pos += 2;
                while !matches!(self.peek(0), None | Some('\n') | Some('\r')) {
                    self.pos += 1;
                }
                Ok((TokenKind::Whitespace, TokenValue::None))
            }
            '/' if self.peek(1) == Some('*') => self.scan_block_comment(),
            c if is_identifier_start(c) => {
                let start = self.pos;
                while matches!(self.peek(0), Some(c) if is_identifier_part(c)) {
                    self.pos += 1;
                }
                let text = self.file.slice(start, self.pos);
                match keyword_kind(&text) {
                    Some(kind) => Ok((kind, TokenValue::None)),
                    None => Ok((TokenKind::Identifier, TokenValue::Text(text))),
                }
            }
            c if c.is_ascii_digit() => self.scan_number(),
            '.' if matches!(self.peek(1), Some(c) if c.is_ascii_digit()) => self.scan_number(),
            '\'' | '"' => self.scan_string(c),
            _ => self.scan_punctuator(c),
        }
    }

    fn scan_block_comment(&mut self) -> Result<(TokenKind, TokenValue), ParseError> {
        let start = self.pos;
        self.pos += 2;
        let mut saw_line_terminator = false;
        loop {
            match self.peek(0) {
                None => return Err(self.error_at(start, "unterminated block comment")),
                Some('*') if self.peek(1) == Some('/') => {
                    self.pos += 2;
                    break;
                }
                Some('\n') | Some('\r') => {
                    saw_line_terminator = true;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
        // A comment spanning lines acts as a line terminator for ASI.
        Ok((
            if saw_line_terminator {
                TokenKind::LineTerminator
            } else {
                TokenKind::Whitespace
            },
            TokenValue::None,
        ))
    }

    fn scan_number(&mut self) -> Result<(TokenKind, TokenValue), ParseError> {
        let start = self.pos;
        if self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            let mut value = 0.0f64;
            while let Some(digit) = self.peek(0).and_then(|c| c.to_digit(16)) {
                value = value * 16.0 + f64::from(digit);
                self.pos += 1;
            }
            if self.pos == digits_start {
                return Err(self.error_at(start, "missing digits in hex literal"));
            }
            return Ok((TokenKind::NumberLiteral, TokenValue::Number(value)));
        }

        // Legacy octal: a zero followed only by octal digits.
        if self.peek(0) == Some('0') && matches!(self.peek(1), Some(c) if c.is_ascii_digit()) {
            let mut lookahead = 1;
            let mut all_octal = true;
            while let Some(c) = self.peek(lookahead) {
                if !c.is_ascii_digit() {
                    break;
                }
                all_octal &= ('0'..='7').contains(&c);
                lookahead += 1;
            }
            let follows = self.peek(lookahead);
            if all_octal && !matches!(follows, Some('.' | 'e' | 'E')) {
                let mut value = 0.0f64;
                for offset in 1..lookahead {
                    let digit = self.peek(offset).and_then(|c| c.to_digit(8)).ok_or_else(
                        || self.error_at(start, "malformed octal literal"),
                    )?;
                    value = value * 8.0 + f64::from(digit);
                }
                self.pos += lookahead;
                return Ok((TokenKind::NumberLiteral, TokenValue::Number(value)));
            }
        }

        while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek(0) == Some('.') {
            self.pos += 1;
            while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), Some('e' | 'E')) {
            self.pos += 1;
            if matches!(self.peek(0), Some('+' | '-')) {
                self.pos += 1;
            }
            if !matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
                return Err(self.error_at(start, "missing digits in exponent"));
            }
            while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = self.file.slice(start, self.pos);
        let value = text
            .parse::<f64>()
            .map_err(|_| self.error_at(start, format!("malformed number literal {text:?}")))?;
        Ok((TokenKind::NumberLiteral, TokenValue::Number(value)))
    }

    fn scan_string(&mut self, quote: char) -> Result<(TokenKind, TokenValue), ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek(0) {
                None | Some('\n') | Some('\r') => {
                    return Err(self.error_at(start, "unterminated string literal"));
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok((TokenKind::StringLiteral, TokenValue::Text(text)));
                }
                Some('\\') => {
                    self.pos += 1;
                    text.push(self.scan_escape(start)?);
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn scan_escape(&mut self, string_start: u32) -> Result<char, ParseError> {
        let Some(c) = self.peek(0) else {
            return Err(self.error_at(string_start, "unterminated string literal"));
        };
        self.pos += 1;
        Ok(match c {
            'b' => '\x08',
            't' => '\t',
            'n' => '\n',
            'v' => '\x0B',
            'f' => '\x0C',
            'r' => '\r',
            'x' => self.scan_hex_escape(string_start, 2)?,
            'u' => self.scan_hex_escape(string_start, 4)?,
            '0'..='7' => {
                // Octal escape, up to three digits.
                let mut value = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek(0).and_then(|c| c.to_digit(8)) {
                        Some(digit) if value * 8 + digit <= 0xFF => {
                            value = value * 8 + digit;
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                char::from_u32(value).unwrap_or('\u{FFFD}')
            }
            '\n' | '\r' => {
                return Err(self.error_at(string_start, "unterminated string literal"));
            }
            other => other,
        })
    }

    fn scan_hex_escape(&mut self, string_start: u32, len: u32) -> Result<char, ParseError> {
        let mut value = 0u32;
        for _ in 0..len {
            let digit = self
                .peek(0)
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error_at(string_start, "malformed escape sequence"))?;
            value = value * 16 + digit;
            self.pos += 1;
        }
        char::from_u32(value)
            .ok_or_else(|| self.error_at(string_start, "escape is not a valid code point"))
    }

    fn matches_str(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek(i as u32) == Some(c))
    }

    fn scan_punctuator(&mut self, c: char) -> Result<(TokenKind, TokenValue), ParseError> {
        // Longest match first.
        const MULTI: &[(&str, TokenKind)] = &[
            (">>>=", TokenKind::URShiftAssign),
            (">>>", TokenKind::URShift),
            ("<<=", TokenKind::LShiftAssign),
            (">>=", TokenKind::RShiftAssign),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::NotEq),
            ("<=", TokenKind::LtEq),
            (">=", TokenKind::GtEq),
            ("&&", TokenKind::AndAnd),
            ("||", TokenKind::OrOr),
            ("++", TokenKind::PlusPlus),
            ("--", TokenKind::MinusMinus),
            ("+=", TokenKind::PlusAssign),
            ("-=", TokenKind::MinusAssign),
            ("*=", TokenKind::MultiplyAssign),
            ("/=", TokenKind::DivideAssign),
            ("%=", TokenKind::ModAssign),
            ("&=", TokenKind::BitAndAssign),
            ("|=", TokenKind::BitOrAssign),
            ("^=", TokenKind::BitXorAssign),
            ("<<", TokenKind::LShift),
            (">>", TokenKind::RShift),
        ];
        for (pattern, kind) in MULTI {
            if self.matches_str(pattern) {
                self.pos += pattern.len() as u32;
                return Ok((*kind, TokenValue::None));
            }
        }
        let kind = match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Multiply,
            '/' => TokenKind::Divide,
            '%' => TokenKind::Mod,
            '&' => TokenKind::BitAnd,
            '|' => TokenKind::BitOr,
            '^' => TokenKind::BitXor,
            '!' => TokenKind::Not,
            '~' => TokenKind::BitNot,
            '=' => TokenKind::Assign,
            other => {
                return Err(self.error_at(self.pos, format!("unexpected character {other:?}")));
            }
        };
        self.pos += 1;
        Ok((kind, TokenValue::None))
    }
}
