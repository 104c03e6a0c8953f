//! Lexer for the C front-end.
//!
//! Converts source text into a stream of tokens. Preprocessing is out of
//! scope; the only `#` directive given meaning is `#pragma align (N)`,
//! which is turned into a token so the parser can freeze the value into
//! subsequent declarations. Any other `#` line is skipped.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::errors::{LexerError, LexerErrorKind};
use crate::utils::location::{SourceLocation, Span};
use std::iter::Peekable;
use std::str::Chars;
use unicode_xid::UnicodeXID;

/// A lexer for tokenizing C source code.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
    line: u32,
    column: u32,
    token_start: SourceLocation,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            column: 1,
            token_start: SourceLocation::start(),
            at_line_start: true,
        }
    }

    /// Tokenize the entire source, ending with an Eof token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.is_eof();
            tokens.push(tok);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.offset)
    }

    fn make_span(&self) -> Span {
        Span::new(self.token_start, self.current_location())
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
            if !c.is_whitespace() {
                self.at_line_start = false;
            }
        }
        Some(c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, kind: LexerErrorKind, message: impl Into<String>) -> LexerError {
        LexerError { message: message.into(), span: self.make_span(), kind }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexerError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') => {
                    // Need two-char lookahead; clone the iterator cheaply.
                    let mut probe = self.chars.clone();
                    probe.next();
                    match probe.peek() {
                        Some('/') => {
                            while self.peek().is_some() && self.peek() != Some('\n') {
                                self.advance();
                            }
                        }
                        Some('*') => {
                            self.advance();
                            self.advance();
                            loop {
                                match self.advance() {
                                    Some('*') if self.peek() == Some('/') => {
                                        self.advance();
                                        break;
                                    }
                                    Some(_) => {}
                                    None => {
                                        return Err(self.error(
                                            LexerErrorKind::UnterminatedComment,
                                            "unterminated block comment",
                                        ))
                                    }
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        loop {
            self.skip_whitespace_and_comments()?;
            self.token_start = self.current_location();

            let c = match self.peek() {
                Some(c) => c,
                None => return Ok(Token::new(TokenKind::Eof, self.make_span(), String::new())),
            };

            if c == '#' && self.at_line_start {
                if let Some(tok) = self.lex_hash_line() {
                    return Ok(tok);
                }
                continue;
            }

            if c == '_' || c.is_xid_start() {
                return Ok(self.lex_identifier());
            }
            if c.is_ascii_digit() {
                return self.lex_number();
            }
            if c == '.' {
                // Could be `...`, `.`, or the start of a float like `.5`.
                let mut probe = self.chars.clone();
                probe.next();
                if probe.peek().is_some_and(|d| d.is_ascii_digit()) {
                    return self.lex_number();
                }
                return self.lex_punct();
            }
            match c {
                '\'' => return self.lex_char(),
                '"' => return self.lex_string(),
                _ => return self.lex_punct(),
            }
        }
    }

    fn lex_identifier(&mut self) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c.is_xid_continue() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, self.make_span(), text)
    }

    fn lex_number(&mut self) -> Result<Token, LexerError> {
        let mut text = String::new();
        let mut is_float = false;

        if self.peek() == Some('0') {
            text.push('0');
            self.advance();
            if matches!(self.peek(), Some('x') | Some('X')) {
                text.push(self.advance().unwrap());
                let mut any = false;
                while let Some(c) = self.peek() {
                    if c.is_ascii_hexdigit() {
                        text.push(c);
                        self.advance();
                        any = true;
                    } else {
                        break;
                    }
                }
                if !any {
                    return Err(self
                        .error(LexerErrorKind::InvalidNumber, "hex literal without digits"));
                }
                self.lex_int_suffix(&mut text);
                return Ok(Token::new(TokenKind::IntLit, self.make_span(), text));
            }
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            text.push(self.advance().unwrap());
            if matches!(self.peek(), Some('+') | Some('-')) {
                text.push(self.advance().unwrap());
            }
            let mut any = false;
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                    any = true;
                } else {
                    break;
                }
            }
            if !any {
                return Err(self.error(LexerErrorKind::InvalidNumber, "exponent without digits"));
            }
        }

        if is_float {
            if matches!(self.peek(), Some('f') | Some('F') | Some('l') | Some('L')) {
                text.push(self.advance().unwrap());
            }
            return Ok(Token::new(TokenKind::FloatLit, self.make_span(), text));
        }
        self.lex_int_suffix(&mut text);
        Ok(Token::new(TokenKind::IntLit, self.make_span(), text))
    }

    fn lex_int_suffix(&mut self, text: &mut String) {
        // u/U and l/L/ll/LL in either order
        for _ in 0..3 {
            match self.peek() {
                Some('u') | Some('U') | Some('l') | Some('L') => {
                    text.push(self.advance().unwrap());
                }
                _ => break,
            }
        }
    }

    fn lex_escape(&mut self) -> Result<char, LexerError> {
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('a') => Ok('\x07'),
            Some('b') => Ok('\x08'),
            Some('f') => Ok('\x0c'),
            Some('v') => Ok('\x0b'),
            Some('\\') => Ok('\\'),
            Some('\'') => Ok('\''),
            Some('"') => Ok('"'),
            Some('?') => Ok('?'),
            Some('x') => {
                let mut val: u32 = 0;
                let mut any = false;
                while let Some(c) = self.peek() {
                    if let Some(d) = c.to_digit(16) {
                        val = val.wrapping_mul(16).wrapping_add(d);
                        self.advance();
                        any = true;
                    } else {
                        break;
                    }
                }
                if !any {
                    return Err(self
                        .error(LexerErrorKind::InvalidEscape, "\\x escape without hex digits"));
                }
                Ok(char::from_u32(val & 0xff).unwrap_or('\0'))
            }
            Some(other) => {
                Err(self.error(LexerErrorKind::InvalidEscape, format!("unknown escape '\\{}'", other)))
            }
            None => Err(self.error(LexerErrorKind::UnterminatedLiteral, "unterminated escape")),
        }
    }

    fn lex_char(&mut self) -> Result<Token, LexerError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    // Octal escapes need the first digit back; handle inline.
                    if let Some(d @ '0'..='7') = self.peek() {
                        let mut val = d.to_digit(8).unwrap();
                        self.advance();
                        for _ in 0..2 {
                            if let Some(n @ '0'..='7') = self.peek() {
                                val = val * 8 + n.to_digit(8).unwrap();
                                self.advance();
                            } else {
                                break;
                            }
                        }
                        value.push(char::from_u32(val & 0xff).unwrap_or('\0'));
                    } else {
                        value.push(self.lex_escape()?);
                    }
                }
                Some('\n') | None => {
                    return Err(self.error(
                        LexerErrorKind::UnterminatedLiteral,
                        "unterminated character literal",
                    ))
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        if value.is_empty() {
            return Err(self.error(LexerErrorKind::UnterminatedLiteral, "empty character literal"));
        }
        Ok(Token::new(TokenKind::CharLit, self.make_span(), value))
    }

    fn lex_string(&mut self) -> Result<Token, LexerError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(d @ '0'..='7') = self.peek() {
                        let mut val = d.to_digit(8).unwrap();
                        self.advance();
                        for _ in 0..2 {
                            if let Some(n @ '0'..='7') = self.peek() {
                                val = val * 8 + n.to_digit(8).unwrap();
                                self.advance();
                            } else {
                                break;
                            }
                        }
                        value.push(char::from_u32(val & 0xff).unwrap_or('\0'));
                    } else {
                        value.push(self.lex_escape()?);
                    }
                }
                Some('\n') | None => {
                    return Err(self
                        .error(LexerErrorKind::UnterminatedLiteral, "unterminated string literal"))
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Ok(Token::new(TokenKind::StrLit, self.make_span(), value))
    }

    /// Consume a `#` line. Returns a PragmaAlign token for
    /// `#pragma align (N)`; any other directive is skipped.
    fn lex_hash_line(&mut self) -> Option<Token> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.advance();
        }
        let rest = text.trim_start_matches('#').trim();
        let rest = rest.strip_prefix("pragma")?.trim();
        let rest = rest.strip_prefix("align")?.trim();
        let rest = rest.strip_prefix('(')?;
        let rest = rest.strip_suffix(')')?;
        let value = rest.trim();
        if value.chars().all(|c| c.is_ascii_digit()) && !value.is_empty() {
            Some(Token::new(TokenKind::PragmaAlign, self.make_span(), value.to_string()))
        } else {
            None
        }
    }

    fn lex_punct(&mut self) -> Result<Token, LexerError> {
        use TokenKind::*;
        let c = self.advance().unwrap();
        let kind = match c {
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            '{' => LBrace,
            '}' => RBrace,
            ',' => Comma,
            ';' => Semicolon,
            ':' => Colon,
            '?' => Question,
            '~' => Tilde,
            '.' => {
                if self.peek() == Some('.') {
                    let mut probe = self.chars.clone();
                    probe.next();
                    if probe.peek() == Some(&'.') {
                        self.advance();
                        self.advance();
                        Ellipsis
                    } else {
                        Dot
                    }
                } else {
                    Dot
                }
            }
            '+' => {
                if self.match_char('+') {
                    PlusPlus
                } else if self.match_char('=') {
                    PlusEqual
                } else {
                    Plus
                }
            }
            '-' => {
                if self.match_char('-') {
                    MinusMinus
                } else if self.match_char('=') {
                    MinusEqual
                } else if self.match_char('>') {
                    Arrow
                } else {
                    Minus
                }
            }
            '*' => {
                if self.match_char('=') {
                    StarEqual
                } else {
                    Star
                }
            }
            '/' => {
                if self.match_char('=') {
                    SlashEqual
                } else {
                    Slash
                }
            }
            '%' => {
                if self.match_char('=') {
                    PercentEqual
                } else {
                    Percent
                }
            }
            '^' => {
                if self.match_char('=') {
                    CaretEqual
                } else {
                    Caret
                }
            }
            '=' => {
                if self.match_char('=') {
                    EqualEqual
                } else {
                    Equal
                }
            }
            '!' => {
                if self.match_char('=') {
                    BangEqual
                } else {
                    Bang
                }
            }
            '&' => {
                if self.match_char('&') {
                    AmpAmp
                } else if self.match_char('=') {
                    AmpEqual
                } else {
                    Amp
                }
            }
            '|' => {
                if self.match_char('|') {
                    PipePipe
                } else if self.match_char('=') {
                    PipeEqual
                } else {
                    Pipe
                }
            }
            '<' => {
                if self.match_char('<') {
                    if self.match_char('=') {
                        ShlEqual
                    } else {
                        Shl
                    }
                } else if self.match_char('=') {
                    LessEqual
                } else {
                    Less
                }
            }
            '>' => {
                if self.match_char('>') {
                    if self.match_char('=') {
                        ShrEqual
                    } else {
                        Shr
                    }
                } else if self.match_char('=') {
                    GreaterEqual
                } else {
                    Greater
                }
            }
            other => {
                return Err(self.error(
                    LexerErrorKind::UnexpectedChar,
                    format!("unexpected character '{}'", other),
                ))
            }
        };
        let lexeme = kind.name().to_string();
        Ok(Token::new(kind, self.make_span(), lexeme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        use TokenKind::*;
        assert_eq!(
            kinds("int foo; while"),
            vec![Int, Identifier, Semicolon, While, Eof]
        );
    }

    #[test]
    fn test_numbers() {
        let toks = Lexer::new("0x1f 017 42u 7ull 1.5 2e3 1.0f").tokenize().unwrap();
        use TokenKind::*;
        let ks: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(ks, vec![IntLit, IntLit, IntLit, IntLit, FloatLit, FloatLit, FloatLit, Eof]);
        assert_eq!(toks[0].lexeme, "0x1f");
        assert_eq!(toks[2].lexeme, "42u");
    }

    #[test]
    fn test_operators_maximal_munch() {
        use TokenKind::*;
        assert_eq!(kinds("a <<= b >> c"), vec![Identifier, ShlEqual, Identifier, Shr, Identifier, Eof]);
        assert_eq!(kinds("p->q"), vec![Identifier, Arrow, Identifier, Eof]);
        assert_eq!(kinds("f(a, ...)"), vec![Identifier, LParen, Identifier, Comma, Ellipsis, RParen, Eof]);
    }

    #[test]
    fn test_string_and_char_escapes() {
        let toks = Lexer::new(r#" "ab\n" '\t' '\101' "#).tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::StrLit);
        assert_eq!(toks[0].lexeme, "ab\n");
        assert_eq!(toks[1].kind, TokenKind::CharLit);
        assert_eq!(toks[1].lexeme, "\t");
        assert_eq!(toks[2].lexeme, "A");
    }

    #[test]
    fn test_comments() {
        use TokenKind::*;
        assert_eq!(kinds("a // line\n b /* block\n */ c"), vec![Identifier, Identifier, Identifier, Eof]);
    }

    #[test]
    fn test_pragma_align() {
        let toks = Lexer::new("#pragma align (8)\nint x;").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::PragmaAlign);
        assert_eq!(toks[0].lexeme, "8");
        assert_eq!(toks[1].kind, TokenKind::Int);
    }

    #[test]
    fn test_other_hash_lines_skipped() {
        use TokenKind::*;
        assert_eq!(kinds("#include <stdio.h>\nint x;"), vec![Int, Identifier, Semicolon, Eof]);
    }

    #[test]
    fn test_line_tracking() {
        let toks = Lexer::new("a\nb").tokenize().unwrap();
        assert_eq!(toks[0].span.line(), 1);
        assert_eq!(toks[1].span.line(), 2);
    }
}
