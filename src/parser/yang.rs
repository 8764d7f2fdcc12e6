//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG text front-end.
//!
//! Tokenizes the compact YANG grammar (RFC 6020 section 6) and builds
//! the statement tree consumed by the shared builder. Handles comments,
//! single- and double-quoted strings with escape sequences, the
//! indentation-trimming rule for multi-line double-quoted strings, and
//! string concatenation with `+`.

use crate::error::{Error, ErrorCode, Result};
use crate::parser::{Keyword, Stmt};

#[derive(Debug, PartialEq)]
enum Token {
    Str(String),
    Semicolon,
    LBrace,
    RBrace,
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: u32,
    /// Column of the current position, used for the double-quoted
    /// string indentation rule.
    col: u32,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Lexer<'a> {
        Lexer {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
            col: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.input.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(byte)
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek2() == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek2() == Some(b'*') => {
                    let start_line = self.line;
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek2() == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(Error::new(
                                    ErrorCode::Inval,
                                    "Unterminated block comment",
                                )
                                .with_line(start_line));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<(Token, u32)>> {
        self.skip_trivia()?;
        let line = self.line;
        let token = match self.peek() {
            None => return Ok(None),
            Some(b';') => {
                self.bump();
                Token::Semicolon
            }
            Some(b'{') => {
                self.bump();
                Token::LBrace
            }
            Some(b'}') => {
                self.bump();
                Token::RBrace
            }
            Some(b'"') | Some(b'\'') => {
                let mut value = self.quoted_string()?;
                // Quoted strings may be concatenated with '+'.
                loop {
                    let save = (self.pos, self.line, self.col);
                    self.skip_trivia()?;
                    if self.peek() == Some(b'+') {
                        self.bump();
                        self.skip_trivia()?;
                        match self.peek() {
                            Some(b'"') | Some(b'\'') => {
                                value.push_str(&self.quoted_string()?);
                            }
                            _ => {
                                return Err(Error::new(
                                    ErrorCode::Inval,
                                    "Expected string after '+'",
                                )
                                .with_line(self.line));
                            }
                        }
                    } else {
                        self.pos = save.0;
                        self.line = save.1;
                        self.col = save.2;
                        break;
                    }
                }
                Token::Str(value)
            }
            Some(_) => Token::Str(self.unquoted_string()?),
        };
        Ok(Some((token, line)))
    }

    fn quoted_string(&mut self) -> Result<String> {
        let quote = self.peek().unwrap();
        let quote_col = self.col;
        let start_line = self.line;
        self.bump();
        let mut value: Vec<u8> = Vec::new();

        if quote == b'\'' {
            loop {
                match self.bump() {
                    Some(b'\'') => break,
                    Some(b) => value.push(b),
                    None => {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            "Unterminated string",
                        )
                        .with_line(start_line));
                    }
                }
            }
            return utf8_string(value, start_line);
        }

        loop {
            match self.bump() {
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => value.push(b'\n'),
                    Some(b't') => value.push(b'\t'),
                    Some(b'"') => value.push(b'"'),
                    Some(b'\\') => value.push(b'\\'),
                    _ => {
                        return Err(Error::new(
                            ErrorCode::Inchar,
                            "Invalid escape sequence in string",
                        )
                        .with_line(self.line));
                    }
                },
                Some(b'\n') => {
                    // Trailing whitespace before a line break is
                    // stripped, leading whitespace on the next line is
                    // trimmed up to the column after the opening quote.
                    while matches!(value.last(), Some(b' ') | Some(b'\t')) {
                        value.pop();
                    }
                    value.push(b'\n');
                    let limit = quote_col + 1;
                    let mut trimmed = 0;
                    while trimmed < limit {
                        match self.peek() {
                            Some(b' ') => {
                                self.bump();
                                trimmed += 1;
                            }
                            Some(b'\t') => {
                                self.bump();
                                trimmed += 8;
                            }
                            _ => break,
                        }
                    }
                }
                Some(b) => value.push(b),
                None => {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        "Unterminated string",
                    )
                    .with_line(start_line));
                }
            }
        }
        utf8_string(value, start_line)
    }

    fn unquoted_string(&mut self) -> Result<String> {
        let mut value: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(b) if b.is_ascii_whitespace() => break,
                Some(b';') | Some(b'{') | Some(b'}') | Some(b'"')
                | Some(b'\'') => break,
                Some(b'/')
                    if matches!(self.peek2(), Some(b'/') | Some(b'*')) =>
                {
                    break
                }
                Some(b) => {
                    value.push(b);
                    self.bump();
                }
            }
        }
        if value.is_empty() {
            return Err(Error::new(
                ErrorCode::Inchar,
                "Unexpected character in input",
            )
            .with_line(self.line));
        }
        utf8_string(value, self.line)
    }
}

fn utf8_string(bytes: Vec<u8>, line: u32) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| {
        Error::new(ErrorCode::Inchar, "Invalid UTF-8 in input")
            .with_line(line)
    })
}

/// Parse YANG text into a statement tree. The result is the single
/// top-level `module`/`submodule` statement.
pub(crate) fn parse(data: &str) -> Result<Stmt> {
    let mut lexer = Lexer::new(data);
    let stmt = parse_stmt(&mut lexer)?;
    if lexer.next_token()?.is_some() {
        return Err(Error::new(
            ErrorCode::Inval,
            "Trailing input after module statement",
        )
        .with_line(lexer.line));
    }
    Ok(stmt)
}

fn parse_stmt(lexer: &mut Lexer<'_>) -> Result<Stmt> {
    let (token, line) = lexer.next_token()?.ok_or_else(|| {
        Error::new(ErrorCode::Inval, "Unexpected end of input")
    })?;
    let keyword = match token {
        Token::Str(keyword) => Keyword::from_name(&keyword),
        _ => {
            return Err(Error::new(
                ErrorCode::Inval,
                "Expected a statement keyword",
            )
            .with_line(line));
        }
    };
    parse_stmt_rest(lexer, keyword, line)
}

fn parse_stmt_rest(
    lexer: &mut Lexer<'_>,
    keyword: Keyword,
    line: u32,
) -> Result<Stmt> {
    let mut stmt = Stmt {
        keyword,
        arg: None,
        children: Vec::new(),
        line,
    };

    let (token, token_line) = lexer.next_token()?.ok_or_else(|| {
        Error::new(ErrorCode::Inval, "Unexpected end of input")
            .with_line(line)
    })?;
    let token = match token {
        Token::Str(arg) => {
            stmt.arg = Some(arg);
            lexer.next_token()?.ok_or_else(|| {
                Error::new(ErrorCode::Inval, "Unexpected end of input")
                    .with_line(line)
            })?
        }
        token => (token, token_line),
    };

    match token.0 {
        Token::Semicolon => Ok(stmt),
        Token::LBrace => {
            loop {
                let (next, next_line) =
                    lexer.next_token()?.ok_or_else(|| {
                        Error::new(
                            ErrorCode::Inval,
                            "Unexpected end of input inside a block",
                        )
                        .with_line(line)
                    })?;
                match next {
                    Token::RBrace => break,
                    Token::Str(keyword) => {
                        let keyword = Keyword::from_name(&keyword);
                        let child =
                            parse_stmt_rest(lexer, keyword, next_line)?;
                        stmt.children.push(child);
                    }
                    _ => {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            "Expected a statement keyword",
                        )
                        .with_line(next_line));
                    }
                }
            }
            Ok(stmt)
        }
        _ => Err(Error::new(
            ErrorCode::Inval,
            "Expected ';' or '{' after statement argument",
        )
        .with_line(token.1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_module() {
        let stmt = parse(
            "module test { namespace \"urn:test\"; prefix t; leaf x { type string; } }",
        )
        .unwrap();
        assert_eq!(stmt.keyword, Keyword::Module);
        assert_eq!(stmt.arg.as_deref(), Some("test"));
        assert_eq!(stmt.children.len(), 3);
        assert_eq!(stmt.children[2].keyword, Keyword::Leaf);
        assert_eq!(stmt.children[2].children[0].keyword, Keyword::Type);
    }

    #[test]
    fn comments_and_concat() {
        let stmt = parse(
            "module test { // comment\n  /* block\n     comment */\n  namespace \"urn:\" + 'test';\n  prefix t;\n}",
        )
        .unwrap();
        assert_eq!(stmt.children[0].arg.as_deref(), Some("urn:test"));
    }

    #[test]
    fn escapes() {
        let stmt = parse(
            "module test { namespace \"a\\\"b\\\\c\\td\"; prefix t; }",
        )
        .unwrap();
        assert_eq!(stmt.children[0].arg.as_deref(), Some("a\"b\\c\td"));
    }

    #[test]
    fn unterminated() {
        assert!(parse("module test { namespace \"urn:test; }").is_err());
        assert!(parse("module test {").is_err());
    }
}
