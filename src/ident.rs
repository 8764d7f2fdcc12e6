//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Identifier and path lexical utilities.
//!
//! Syntax-level checks and parsers shared by the schema parsers, the
//! resolver and the data-tree parser: YANG identifiers, prefixed names,
//! schema-node-ids, leafref paths, instance-identifiers and the purely
//! lexical XPath check applied to `when`/`must` arguments.

use crate::error::{Error, ErrorCode, Result};

/// Validate a YANG identifier: `[A-Za-z_][A-Za-z0-9_.-]*`.
pub(crate) fn check_identifier(s: &str) -> Result<()> {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => (),
        _ => {
            return Err(Error::new(
                ErrorCode::Inchar,
                format!("Invalid identifier \"{}\"", s),
            ));
        }
    }
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.') {
            return Err(Error::new(
                ErrorCode::Inchar,
                format!("Invalid character '{}' in identifier \"{}\"", c, s),
            ));
        }
    }
    Ok(())
}

/// Split an optionally prefixed name into `(prefix, local-name)`.
pub(crate) fn split_prefix(s: &str) -> (Option<&str>, &str) {
    match s.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, s),
    }
}

/// Validate a revision date argument (`YYYY-MM-DD`).
pub(crate) fn check_date(s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    let valid = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !valid {
        return Err(Error::new(
            ErrorCode::Inval,
            format!("Invalid revision date \"{}\"", s),
        ));
    }
    Ok(())
}

/// A single `prefix:name` step of a schema-node-id.
pub(crate) type NodeId = (Option<String>, String);

/// Parse a schema-node-id (absolute `/p:a/b` or descendant `a/b/c`)
/// into its steps. Used for augment targets and list `unique`
/// arguments.
pub(crate) fn parse_schema_nodeid(s: &str) -> Result<(bool, Vec<NodeId>)> {
    let absolute = s.starts_with('/');
    let trimmed = if absolute { &s[1..] } else { s };
    if trimmed.is_empty() {
        return Err(Error::new(
            ErrorCode::Inval,
            format!("Invalid schema node id \"{}\"", s),
        ));
    }
    let mut steps = Vec::new();
    for part in trimmed.split('/') {
        let (prefix, name) = split_prefix(part);
        if let Some(prefix) = prefix {
            check_identifier(prefix)?;
        }
        check_identifier(name)?;
        steps.push((prefix.map(str::to_string), name.to_string()));
    }
    Ok((absolute, steps))
}

/// One `[key = current()/../rel/path]` predicate of a leafref path.
#[derive(Clone, Debug)]
pub(crate) struct LeafrefPred {
    pub key: NodeId,
    /// Number of `../` steps after `current()`.
    pub up: usize,
    /// Downward steps after the `../` sequence.
    pub path: Vec<NodeId>,
}

/// One step of a leafref path.
#[derive(Clone, Debug)]
pub(crate) struct LeafrefStep {
    pub node: NodeId,
    pub preds: Vec<LeafrefPred>,
}

/// Parsed leafref `path` argument (RFC 6020 section 9.9.2).
#[derive(Clone, Debug)]
pub(crate) struct LeafrefPath {
    pub absolute: bool,
    /// Number of leading `../` steps (relative paths only).
    pub up: usize,
    pub steps: Vec<LeafrefStep>,
}

struct PathLexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PathLexer<'a> {
    fn new(input: &'a str) -> PathLexer<'a> {
        PathLexer { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_ws(&mut self) {
        while self.rest().starts_with(|c: char| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if !self.eat(token) {
            return Err(Error::new(
                ErrorCode::Inchar,
                format!(
                    "Expected \"{}\" at offset {} in path \"{}\"",
                    token, self.pos, self.input
                ),
            ));
        }
        Ok(())
    }

    fn node_identifier(&mut self) -> Result<NodeId> {
        let start = self.pos;
        for c in self.rest().chars() {
            if c.is_ascii_alphanumeric()
                || c == '_'
                || c == '-'
                || c == '.'
                || c == ':'
            {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        let ident = &self.input[start..self.pos];
        let (prefix, name) = split_prefix(ident);
        if let Some(prefix) = prefix {
            check_identifier(prefix)?;
        }
        check_identifier(name)?;
        Ok((prefix.map(str::to_string), name.to_string()))
    }
}

/// Parse a leafref `path` argument.
pub(crate) fn parse_leafref_path(input: &str) -> Result<LeafrefPath> {
    let mut lexer = PathLexer::new(input.trim());
    let absolute = lexer.rest().starts_with('/');
    let mut up = 0;

    if !absolute {
        while lexer.eat("../") {
            up += 1;
        }
        if up == 0 {
            return Err(Error::new(
                ErrorCode::Inchar,
                format!("Invalid leafref path \"{}\"", input),
            ));
        }
    }

    let mut steps = Vec::new();
    loop {
        if absolute || !steps.is_empty() {
            if !lexer.eat("/") {
                break;
            }
        }
        let node = lexer.node_identifier()?;
        let mut preds = Vec::new();
        while lexer.eat("[") {
            preds.push(parse_leafref_pred(&mut lexer)?);
        }
        steps.push(LeafrefStep { node, preds });
        if lexer.rest().is_empty() {
            break;
        }
    }

    if steps.is_empty() || !lexer.rest().is_empty() {
        return Err(Error::new(
            ErrorCode::Inchar,
            format!("Invalid leafref path \"{}\"", input),
        ));
    }
    Ok(LeafrefPath { absolute, up, steps })
}

fn parse_leafref_pred(lexer: &mut PathLexer<'_>) -> Result<LeafrefPred> {
    lexer.skip_ws();
    let key = lexer.node_identifier()?;
    lexer.skip_ws();
    lexer.expect("=")?;
    lexer.skip_ws();
    lexer.expect("current()")?;
    lexer.expect("/")?;
    let mut up = 0;
    while lexer.eat("../") {
        up += 1;
    }
    if up == 0 {
        return Err(Error::new(
            ErrorCode::Inchar,
            "Expected \"../\" after current()/ in leafref predicate",
        ));
    }
    let mut path = vec![lexer.node_identifier()?];
    while lexer.eat("/") {
        path.push(lexer.node_identifier()?);
    }
    lexer.skip_ws();
    lexer.expect("]")?;
    Ok(LeafrefPred { key, up, path })
}

/// One predicate of an instance-identifier step.
#[derive(Clone, Debug)]
pub(crate) enum InstidPred {
    /// `[key='value']`
    Key(NodeId, String),
    /// `[.='value']` (leaf-list entry)
    Value(String),
    /// `[N]` (position, 1-based)
    Position(u32),
}

/// One step of an instance-identifier.
#[derive(Clone, Debug)]
pub(crate) struct InstidStep {
    pub node: NodeId,
    pub preds: Vec<InstidPred>,
}

/// Parse an instance-identifier value into its steps. The path must be
/// absolute.
pub(crate) fn parse_instance_identifier(
    input: &str,
) -> Result<Vec<InstidStep>> {
    let mut lexer = PathLexer::new(input.trim());
    let mut steps = Vec::new();

    while lexer.eat("/") {
        let node = lexer.node_identifier()?;
        let mut preds = Vec::new();
        while lexer.eat("[") {
            lexer.skip_ws();
            let pred = if lexer.eat(".") {
                lexer.skip_ws();
                lexer.expect("=")?;
                lexer.skip_ws();
                InstidPred::Value(parse_quoted(&mut lexer)?)
            } else if lexer.rest().starts_with(|c: char| c.is_ascii_digit()) {
                let start = lexer.pos;
                while lexer
                    .rest()
                    .starts_with(|c: char| c.is_ascii_digit())
                {
                    lexer.pos += 1;
                }
                let pos = lexer.input[start..lexer.pos]
                    .parse::<u32>()
                    .map_err(|_| {
                        Error::new(
                            ErrorCode::Inval,
                            format!("Invalid position predicate in \"{}\"", input),
                        )
                    })?;
                InstidPred::Position(pos)
            } else {
                let key = lexer.node_identifier()?;
                lexer.skip_ws();
                lexer.expect("=")?;
                lexer.skip_ws();
                InstidPred::Key(key, parse_quoted(&mut lexer)?)
            };
            lexer.skip_ws();
            lexer.expect("]")?;
            preds.push(pred);
        }
        steps.push(InstidStep { node, preds });
    }

    if steps.is_empty() || !lexer.rest().is_empty() {
        return Err(Error::new(
            ErrorCode::Inchar,
            format!("Invalid instance-identifier \"{}\"", input),
        ));
    }
    Ok(steps)
}

fn parse_quoted(lexer: &mut PathLexer<'_>) -> Result<String> {
    let quote = match lexer.rest().chars().next() {
        Some(c @ ('\'' | '"')) => c,
        _ => {
            return Err(Error::new(
                ErrorCode::Inchar,
                "Expected quoted literal in predicate",
            ));
        }
    };
    lexer.pos += 1;
    let start = lexer.pos;
    match lexer.rest().find(quote) {
        Some(idx) => {
            let value = lexer.input[start..start + idx].to_string();
            lexer.pos += idx + 1;
            Ok(value)
        }
        None => Err(Error::new(
            ErrorCode::Inchar,
            "Unterminated literal in predicate",
        )),
    }
}

/// Purely lexical check of an XPath expression (`when`/`must`
/// arguments): valid tokens and balanced parentheses/brackets only.
/// Semantic resolution of the expression is not performed.
pub(crate) fn check_xpath_syntax(expr: &str) -> Result<()> {
    let bytes = expr.as_bytes();
    let mut depth_paren = 0i32;
    let mut depth_bracket = 0i32;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            '(' => depth_paren += 1,
            ')' => depth_paren -= 1,
            '[' => depth_bracket += 1,
            ']' => depth_bracket -= 1,
            '\'' | '"' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i == bytes.len() {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        format!("Unterminated literal in expression \"{}\"", expr),
                    ));
                }
            }
            '/' | '|' | '+' | '-' | '*' | '=' | '!' | '<' | '>' | '@'
            | '$' | ',' | '.' | ':' => (),
            c if c.is_ascii_whitespace() => (),
            c if c.is_ascii_alphanumeric() || c == '_' => (),
            c => {
                return Err(Error::new(
                    ErrorCode::Inchar,
                    format!("Invalid character '{}' in expression \"{}\"", c, expr),
                ));
            }
        }
        if depth_paren < 0 || depth_bracket < 0 {
            return Err(Error::new(
                ErrorCode::Inval,
                format!("Unbalanced expression \"{}\"", expr),
            ));
        }
        i += 1;
    }

    if depth_paren != 0 || depth_bracket != 0 {
        return Err(Error::new(
            ErrorCode::Inval,
            format!("Unbalanced expression \"{}\"", expr),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(check_identifier("interface").is_ok());
        assert!(check_identifier("_if0.x-y").is_ok());
        assert!(check_identifier("0if").is_err());
        assert!(check_identifier("if/0").is_err());
        assert!(check_identifier("").is_err());
    }

    #[test]
    fn dates() {
        assert!(check_date("2015-01-01").is_ok());
        assert!(check_date("2015-1-1").is_err());
        assert!(check_date("yesterday").is_err());
    }

    #[test]
    fn leafref_paths() {
        let path = parse_leafref_path("/if:interfaces/if:interface/if:name")
            .unwrap();
        assert!(path.absolute);
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[0].node.0.as_deref(), Some("if"));

        let path = parse_leafref_path(
            "../../interface[name = current()/../ifname]/mtu",
        )
        .unwrap();
        assert!(!path.absolute);
        assert_eq!(path.up, 2);
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0].preds.len(), 1);
        assert_eq!(path.steps[0].preds[0].up, 1);

        assert!(parse_leafref_path("interface/name").is_err());
        assert!(parse_leafref_path("/a/[b]").is_err());
    }

    #[test]
    fn instance_identifiers() {
        let steps = parse_instance_identifier(
            "/mod:list[key='val'][2]/leaf",
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].preds.len(), 2);

        assert!(parse_instance_identifier("mod:list").is_err());
        assert!(parse_instance_identifier("/mod:list[key=val]").is_err());
    }

    #[test]
    fn xpath_syntax() {
        assert!(check_xpath_syntax("../type = 'ethernet'").is_ok());
        assert!(check_xpath_syntax("count(interface) > 0").is_ok());
        assert!(check_xpath_syntax("count(interface > 0").is_err());
        assert!(check_xpath_syntax("a = 'unterminated").is_err());
        assert!(check_xpath_syntax("a # b").is_err());
    }
}
