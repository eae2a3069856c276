//! Lexical analysis
//!
//! A forward-only cursor machine over a UTF-8 source buffer. The lexer
//! buffers nothing beyond the token it is producing: each call to
//! [`Lexer::lex`] yields the next token, and the end of input yields
//! `EndOfFile` tokens forever.

use crate::diagnostics::Diagnostics;
use crate::source::SourceLocation;
use crate::token::{Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a [u8],
    cursor: usize,
    loc: SourceLocation,
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_part(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer { source: source.as_bytes(), cursor: 0, loc: SourceLocation::default() }
    }

    /// Test if the end of the source buffer has been reached.
    pub fn is_eof(&self) -> bool {
        self.cursor >= self.source.len()
    }

    /// The byte under the cursor, or NUL at the end of the buffer.
    fn curr(&self) -> u8 {
        if self.is_eof() { 0 } else { self.source[self.cursor] }
    }

    /// The byte `n` positions ahead of the cursor, or NUL past the end.
    fn peek(&self, n: usize) -> u8 {
        if self.cursor + n < self.source.len() { self.source[self.cursor + n] } else { 0 }
    }

    /// Move the cursor `n` bytes forward on the current line.
    fn bump(&mut self, n: u16) {
        self.cursor += n as usize;
        self.loc.col += n;
    }

    /// Consume a newline byte and reset the location to the next line.
    fn newline(&mut self) {
        self.cursor += 1;
        self.loc.line += 1;
        self.loc.col = 1;
    }

    fn skip_trivia(&mut self, diags: &mut Diagnostics) {
        loop {
            match self.curr() {
                b' ' | b'\t' | b'\r' => self.bump(1),
                b'\n' => self.newline(),
                b'/' if self.peek(1) == b'/' => {
                    while !self.is_eof() && self.curr() != b'\n' {
                        self.bump(1);
                    }
                }
                b'/' if self.peek(1) == b'*' => {
                    let start = self.loc;
                    self.bump(2);
                    loop {
                        if self.is_eof() {
                            diags.error_at("unterminated block comment", start);
                            break;
                        }
                        if self.curr() == b'*' && self.peek(1) == b'/' {
                            self.bump(2);
                            break;
                        }
                        if self.curr() == b'\n' { self.newline() } else { self.bump(1) }
                    }
                }
                _ => break,
            }
        }
    }

    /// Decode one escape sequence after a consumed backslash.
    fn lex_escape(&mut self, diags: &mut Diagnostics) -> u8 {
        let byte = self.curr();
        self.bump(1);
        match byte {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'v' => 0x0b,
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            b'0' => 0,
            _ => {
                diags.error_at("unknown escape sequence", self.loc);
                byte
            }
        }
    }

    fn lex_number(&mut self) -> Token {
        let loc = self.loc;
        let mut value = String::new();

        while self.curr().is_ascii_digit() {
            value.push(self.curr() as char);
            self.bump(1);
        }

        // A dot turns the literal into a float; a trailing letter group
        // is left for the next token.
        if self.curr() == b'.' {
            value.push('.');
            self.bump(1);
            while self.curr().is_ascii_digit() {
                value.push(self.curr() as char);
                self.bump(1);
            }
            return Token::with_value(TokenKind::Float, loc, value);
        }

        Token::with_value(TokenKind::Integer, loc, value)
    }

    fn lex_identifier(&mut self) -> Token {
        let loc = self.loc;
        let start = self.cursor;

        while is_ident_part(self.curr()) {
            self.bump(1);
        }

        let value = String::from_utf8_lossy(&self.source[start..self.cursor]).into_owned();
        Token::with_value(TokenKind::Identifier, loc, value)
    }

    fn lex_character(&mut self, diags: &mut Diagnostics) -> Token {
        let loc = self.loc;
        self.bump(1); // opening quote

        let byte = match self.curr() {
            0 | b'\n' => {
                diags.error_at("unterminated character literal", loc);
                return Token::with_value(TokenKind::Character, loc, String::new());
            }
            b'\\' => {
                self.bump(1);
                self.lex_escape(diags)
            }
            byte => {
                self.bump(1);
                byte
            }
        };

        if self.curr() == b'\'' {
            self.bump(1);
        } else {
            diags.error_at("unterminated character literal", loc);
        }

        Token::with_value(TokenKind::Character, loc, (byte as char).to_string())
    }

    fn lex_string(&mut self, diags: &mut Diagnostics) -> Token {
        let loc = self.loc;
        self.bump(1); // opening quote

        let mut value = String::new();
        loop {
            match self.curr() {
                0 => {
                    diags.error_at("unterminated string literal", loc);
                    break;
                }
                b'"' => {
                    self.bump(1);
                    break;
                }
                b'\\' => {
                    self.bump(1);
                    value.push(self.lex_escape(diags) as char);
                }
                b'\n' => {
                    self.newline();
                    value.push('\n');
                }
                byte => {
                    self.bump(1);
                    value.push(byte as char);
                }
            }
        }

        Token::with_value(TokenKind::String, loc, value)
    }

    /// Lex the next token. Unrecognized bytes are diagnosed, consumed,
    /// and skipped; the end of input lexes to `EndOfFile` idempotently.
    pub fn lex(&mut self, diags: &mut Diagnostics) -> Token {
        use TokenKind::*;

        loop {
            self.skip_trivia(diags);

            let loc = self.loc;
            if self.is_eof() {
                return Token::new(EndOfFile, loc);
            }

            let byte = self.curr();
            if byte.is_ascii_digit() {
                return self.lex_number();
            }
            if byte == b'.' && self.peek(1).is_ascii_digit() {
                return self.lex_number();
            }
            if is_ident_start(byte) {
                return self.lex_identifier();
            }
            if byte == b'\'' {
                return self.lex_character(diags);
            }
            if byte == b'"' {
                return self.lex_string(diags);
            }

            // Punctuation and operators, maximal munch: three bytes,
            // then two, then one.
            let kind = match (byte, self.peek(1), self.peek(2)) {
                (b'<', b'<', b'=') => Some((LeftLeftEq, 3)),
                (b'>', b'>', b'=') => Some((RightRightEq, 3)),
                _ => None,
            }
            .or(match (byte, self.peek(1)) {
                (b'=', b'=') => Some((EqEq, 2)),
                (b'!', b'=') => Some((BangEq, 2)),
                (b'<', b'=') => Some((LeftEq, 2)),
                (b'>', b'=') => Some((RightEq, 2)),
                (b'<', b'<') => Some((LeftLeft, 2)),
                (b'>', b'>') => Some((RightRight, 2)),
                (b'&', b'&') => Some((AndAnd, 2)),
                (b'|', b'|') => Some((OrOr, 2)),
                (b'-', b'>') => Some((Arrow, 2)),
                (b':', b':') => Some((Path, 2)),
                (b'+', b'+') => Some((PlusPlus, 2)),
                (b'-', b'-') => Some((MinusMinus, 2)),
                (b'+', b'=') => Some((PlusEq, 2)),
                (b'-', b'=') => Some((MinusEq, 2)),
                (b'*', b'=') => Some((StarEq, 2)),
                (b'/', b'=') => Some((SlashEq, 2)),
                (b'%', b'=') => Some((PercentEq, 2)),
                (b'&', b'=') => Some((AndEq, 2)),
                (b'|', b'=') => Some((OrEq, 2)),
                (b'^', b'=') => Some((XorEq, 2)),
                _ => None,
            })
            .or(match byte {
                b'(' => Some((OpenParen, 1)),
                b')' => Some((CloseParen, 1)),
                b'{' => Some((OpenBrace, 1)),
                b'}' => Some((CloseBrace, 1)),
                b'[' => Some((OpenBrack, 1)),
                b']' => Some((CloseBrack, 1)),
                b'=' => Some((Eq, 1)),
                b'!' => Some((Bang, 1)),
                b'+' => Some((Plus, 1)),
                b'-' => Some((Minus, 1)),
                b'*' => Some((Star, 1)),
                b'/' => Some((Slash, 1)),
                b'%' => Some((Percent, 1)),
                b'<' => Some((Left, 1)),
                b'>' => Some((Right, 1)),
                b'&' => Some((And, 1)),
                b'|' => Some((Or, 1)),
                b'^' => Some((Xor, 1)),
                b'~' => Some((Tilde, 1)),
                b'.' => Some((Dot, 1)),
                b',' => Some((Comma, 1)),
                b':' => Some((Colon, 1)),
                b';' => Some((Semi, 1)),
                b'$' => Some((Sign, 1)),
                _ => None,
            });

            match kind {
                Some((kind, len)) => {
                    self.bump(len);
                    return Token::new(kind, loc);
                }
                None => {
                    diags.error_at(&format!("unrecognized character '{}'", byte as char), loc);
                    self.bump(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &str) -> Vec<(TokenKind, String)> {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.lex(&mut diags);
            if token.is_eof() {
                break;
            }
            out.push((token.kind, token.value));
        }
        out
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        drain(source).into_iter().map(|(kind, _)| kind).collect()
    }

    #[test]
    fn test_identifiers() {
        let tokens = drain("one_ _two three_ _four");
        let names: Vec<&str> = tokens.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(names, ["one_", "_two", "three_", "_four"]);
        assert!(tokens.iter().all(|(k, _)| *k == TokenKind::Identifier));
    }

    #[test]
    fn test_integer_suffix_splits_off() {
        let tokens = drain("1 0u 1L 5ul");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Integer, "1".to_string()),
                (TokenKind::Integer, "0".to_string()),
                (TokenKind::Identifier, "u".to_string()),
                (TokenKind::Integer, "1".to_string()),
                (TokenKind::Identifier, "L".to_string()),
                (TokenKind::Integer, "5".to_string()),
                (TokenKind::Identifier, "ul".to_string()),
            ]
        );
    }

    #[test]
    fn test_float_forms() {
        let tokens = drain("1.0 1.f .1 3.14F");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Float, "1.0".to_string()),
                (TokenKind::Float, "1.".to_string()),
                (TokenKind::Identifier, "f".to_string()),
                (TokenKind::Float, ".1".to_string()),
                (TokenKind::Float, "3.14".to_string()),
                (TokenKind::Identifier, "F".to_string()),
            ]
        );
    }

    #[test]
    fn test_character_literals() {
        let tokens = drain(r"'a' '0' '\n' '\t' '\''");
        let values: Vec<&str> = tokens.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(values, ["a", "0", "\n", "\t", "'"]);
        assert!(tokens.iter().all(|(k, _)| *k == TokenKind::Character));
    }

    #[test]
    fn test_string_escapes_decode() {
        let tokens = drain(r#""hello,\tworld!\n" "\"quoted\"""#);
        assert_eq!(
            tokens,
            vec![
                (TokenKind::String, "hello,\tworld!\n".to_string()),
                (TokenKind::String, "\"quoted\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_isolated_and_compound_tokens() {
        assert_eq!(kinds("."), vec![TokenKind::Dot]);
        assert_eq!(kinds("->"), vec![TokenKind::Arrow]);
        assert_eq!(kinds("::"), vec![TokenKind::Path]);
        assert_eq!(kinds("<<="), vec![TokenKind::LeftLeftEq]);
        assert_eq!(kinds("< <= << <<="), vec![
            TokenKind::Left,
            TokenKind::LeftEq,
            TokenKind::LeftLeft,
            TokenKind::LeftLeftEq,
        ]);
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = drain("a // line comment\nb /* block\ncomment */ c");
        let names: Vec<&str> = tokens.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_complete_declaration() {
        use TokenKind::*;
        let tokens = drain("main :: (argc: s32, argv: **char) { ret argc * 3; }");
        let expected = vec![
            Identifier, Path, OpenParen, Identifier, Colon, Identifier, Comma, Identifier,
            Colon, Star, Star, Identifier, CloseParen, OpenBrace, Identifier, Identifier,
            Star, Integer, Semi, CloseBrace,
        ];
        let kinds: Vec<TokenKind> = tokens.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, expected);
    }

    #[test]
    fn test_eof_is_idempotent() {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.lex(&mut diags).kind, TokenKind::Identifier);
        assert!(lexer.lex(&mut diags).is_eof());
        assert!(lexer.lex(&mut diags).is_eof());
        assert!(lexer.lex(&mut diags).is_eof());
    }

    #[test]
    fn test_locations_track_lines_and_columns() {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let mut lexer = Lexer::new("a\n  b");
        let a = lexer.lex(&mut diags);
        assert_eq!((a.loc.line, a.loc.col), (1, 1));
        let b = lexer.lex(&mut diags);
        assert_eq!((b.loc.line, b.loc.col), (2, 3));
    }

    #[test]
    fn test_unrecognized_byte_is_diagnosed_and_skipped() {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let mut lexer = Lexer::new("a ` b");
        assert_eq!(lexer.lex(&mut diags).value, "a");
        let next = lexer.lex(&mut diags);
        assert_eq!(next.value, "b");
        assert!(diags.has_errors());
    }

    #[test]
    fn test_lexing_is_deterministic() {
        let source = "f :: (a: s64) -> *char { ret \"x\"; } // tail";
        assert_eq!(drain(source), drain(source));
    }
}
