//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YIN (XML) front-end.
//!
//! Reads the XML serialization of YANG (RFC 6020 section 11) into the
//! same statement tree the YANG front-end produces, so both formats
//! feed one builder. Per the YIN mapping, most statement arguments are
//! carried in an attribute; a handful (`description`, `reference`,
//! `organization`, `contact`, `error-message`) wrap the argument in a
//! child element instead.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, ErrorCode, Result};
use crate::parser::{Keyword, Stmt};

/// YIN argument mapping: attribute or element name carrying the
/// argument of the keyword, and whether it is an element.
fn yin_arg(keyword: &Keyword) -> Option<(&'static str, bool)> {
    let arg = match keyword {
        Keyword::Module
        | Keyword::Submodule
        | Keyword::Feature
        | Keyword::IfFeature
        | Keyword::Identity
        | Keyword::Base
        | Keyword::Typedef
        | Keyword::Type
        | Keyword::Units
        | Keyword::Container
        | Keyword::Leaf
        | Keyword::LeafList
        | Keyword::List
        | Keyword::Choice
        | Keyword::Case
        | Keyword::Anyxml
        | Keyword::Uses
        | Keyword::Grouping
        | Keyword::Rpc
        | Keyword::Notification
        | Keyword::Enum
        | Keyword::Bit => ("name", false),
        Keyword::Namespace => ("uri", false),
        Keyword::Prefix
        | Keyword::YangVersion
        | Keyword::Default
        | Keyword::Status
        | Keyword::Config
        | Keyword::Mandatory
        | Keyword::Presence
        | Keyword::OrderedBy
        | Keyword::MinElements
        | Keyword::MaxElements
        | Keyword::Key
        | Keyword::ErrorAppTag
        | Keyword::Length
        | Keyword::Range
        | Keyword::Pattern
        | Keyword::Value
        | Keyword::Position
        | Keyword::FractionDigits
        | Keyword::Path
        | Keyword::RequireInstance => ("value", false),
        Keyword::Import | Keyword::Include | Keyword::BelongsTo => {
            ("module", false)
        }
        Keyword::Revision | Keyword::RevisionDate => ("date", false),
        Keyword::Unique => ("tag", false),
        Keyword::Must | Keyword::When => ("condition", false),
        Keyword::Augment | Keyword::Refine => ("target-node", false),
        Keyword::Organization
        | Keyword::Contact
        | Keyword::Description
        | Keyword::Reference => ("text", true),
        Keyword::ErrorMessage => ("value", true),
        Keyword::Input | Keyword::Output | Keyword::Unknown(_) => {
            return None;
        }
    };
    Some(arg)
}

enum Frame {
    Stmt(Stmt),
    /// Capturing the text content of an argument element into the
    /// enclosing statement's argument.
    ArgCapture(String),
}

/// Parse YIN into a statement tree. The result is the single top-level
/// `module`/`submodule` statement.
pub(crate) fn parse(data: &str) -> Result<Stmt> {
    let mut reader = Reader::from_str(data);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Stmt> = None;

    loop {
        let pos = reader.buffer_position();
        let line = line_at(data, pos as usize);
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                open_element(&e, line, &mut stack, &mut root, false)?;
            }
            Ok(Event::Empty(e)) => {
                open_element(&e, line, &mut stack, &mut root, true)?;
            }
            Ok(Event::Text(t)) => {
                if let Some(Frame::ArgCapture(buf)) = stack.last_mut() {
                    let text = t.unescape().map_err(|err| {
                        xml_error(err.into(), line)
                    })?;
                    buf.push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(Frame::ArgCapture(buf)) = stack.last_mut() {
                    buf.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Ok(Event::End(_)) => {
                close_element(&mut stack, &mut root, line)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => (),
            Err(err) => return Err(xml_error(err, line)),
        }
    }

    if !stack.is_empty() {
        return Err(Error::new(ErrorCode::Inval, "Truncated YIN document"));
    }
    root.ok_or_else(|| {
        Error::new(ErrorCode::Inval, "Empty YIN document")
    })
}

fn open_element(
    e: &quick_xml::events::BytesStart<'_>,
    line: u32,
    stack: &mut Vec<Frame>,
    root: &mut Option<Stmt>,
    empty: bool,
) -> Result<()> {
    let local = e.local_name();
    let name = std::str::from_utf8(local.as_ref()).map_err(|_| {
        Error::new(ErrorCode::Inchar, "Invalid UTF-8 in element name")
            .with_line(line)
    })?;

    // Argument-as-element of the enclosing statement?
    if let Some(Frame::Stmt(parent)) = stack.last() {
        if let Some((argname, true)) = yin_arg(&parent.keyword) {
            if name == argname && parent.arg.is_none() {
                if empty {
                    if let Some(Frame::Stmt(parent)) = stack.last_mut() {
                        parent.arg = Some(String::new());
                    }
                } else {
                    stack.push(Frame::ArgCapture(String::new()));
                }
                return Ok(());
            }
        }
    }

    let keyword = Keyword::from_name(name);
    let mut stmt = Stmt {
        keyword: keyword.clone(),
        arg: None,
        children: Vec::new(),
        line,
    };
    if let Some((argname, false)) = yin_arg(&keyword) {
        for attr in e.attributes() {
            let attr = attr.map_err(|_| {
                Error::new(ErrorCode::Inattr, "Malformed attribute")
                    .with_line(line)
            })?;
            if attr.key.local_name().as_ref() == argname.as_bytes() {
                let value = attr.unescape_value().map_err(|err| {
                    xml_error(err.into(), line)
                })?;
                stmt.arg = Some(value.into_owned());
            }
        }
        if stmt.arg.is_none() {
            return Err(Error::new(
                ErrorCode::Missattr,
                format!(
                    "Missing \"{}\" attribute of \"{}\"",
                    argname, name
                ),
            )
            .with_line(line));
        }
    }
    if empty {
        attach(stack, root, stmt, line)?;
    } else {
        stack.push(Frame::Stmt(stmt));
    }
    Ok(())
}

fn close_element(
    stack: &mut Vec<Frame>,
    root: &mut Option<Stmt>,
    line: u32,
) -> Result<()> {
    match stack.pop() {
        Some(Frame::ArgCapture(buf)) => {
            match stack.last_mut() {
                Some(Frame::Stmt(parent)) => {
                    parent.arg = Some(buf.trim().to_string());
                }
                _ => {
                    return Err(Error::new(
                        ErrorCode::Int,
                        "Argument element without enclosing statement",
                    )
                    .with_line(line));
                }
            }
            Ok(())
        }
        Some(Frame::Stmt(stmt)) => attach(stack, root, stmt, line),
        None => Err(Error::new(
            ErrorCode::Inval,
            "Unbalanced YIN document",
        )
        .with_line(line)),
    }
}

fn attach(
    stack: &mut [Frame],
    root: &mut Option<Stmt>,
    stmt: Stmt,
    line: u32,
) -> Result<()> {
    match stack.last_mut() {
        Some(Frame::Stmt(parent)) => {
            parent.children.push(stmt);
            Ok(())
        }
        Some(Frame::ArgCapture(_)) => Err(Error::new(
            ErrorCode::Inval,
            "Unexpected element inside an argument element",
        )
        .with_line(line)),
        None => {
            if root.is_some() {
                return Err(Error::new(
                    ErrorCode::Inval,
                    "Multiple top-level elements in YIN document",
                )
                .with_line(line));
            }
            *root = Some(stmt);
            Ok(())
        }
    }
}

fn xml_error(err: quick_xml::Error, line: u32) -> Error {
    Error::new(ErrorCode::Inval, format!("XML error: {}", err))
        .with_line(line)
}

fn line_at(data: &str, pos: usize) -> u32 {
    let pos = pos.min(data.len());
    data.as_bytes()[..pos]
        .iter()
        .filter(|&&b| b == b'\n')
        .count() as u32
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_module() {
        let stmt = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<module name="test"
        xmlns="urn:ietf:params:xml:ns:yang:yin:1"
        xmlns:t="urn:test">
  <namespace uri="urn:test"/>
  <prefix value="t"/>
  <description>
    <text>A test module.</text>
  </description>
  <leaf name="x">
    <type name="string"/>
  </leaf>
</module>"#,
        )
        .unwrap();
        assert_eq!(stmt.keyword, Keyword::Module);
        assert_eq!(stmt.arg.as_deref(), Some("test"));
        assert_eq!(stmt.children.len(), 4);
        assert_eq!(stmt.children[0].keyword, Keyword::Namespace);
        assert_eq!(stmt.children[0].arg.as_deref(), Some("urn:test"));
        assert_eq!(
            stmt.children[2].arg.as_deref(),
            Some("A test module.")
        );
        assert_eq!(stmt.children[3].children[0].keyword, Keyword::Type);
    }

    #[test]
    fn missing_argument() {
        assert!(parse(
            r#"<module xmlns="urn:ietf:params:xml:ns:yang:yin:1"><namespace uri="urn:t"/></module>"#
        )
        .is_err());
    }
}
