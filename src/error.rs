//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

use num_derive::FromPrimitive;

/// A convenience wrapper around `Result` for `yangtree::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error kinds.
///
/// Every diagnostic produced by the library carries exactly one of
/// these kinds, plus an optional message, source line and a path
/// locating the offending schema or data node.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
pub enum ErrorCode {
    /// Memory allocation failure (fatal).
    Mem = 1,
    /// Internal invariant broken (fatal).
    Int = 2,
    /// Lexical value does not match the type.
    Inval = 3,
    /// Value out of range/length.
    Oorval = 4,
    /// Invalid character in an identifier or path.
    Inchar = 5,
    /// Unknown element.
    Inelem = 6,
    /// Required element missing.
    Misselem = 7,
    /// Unexpected attribute.
    Inattr = 8,
    /// Required attribute missing.
    Missattr = 9,
    /// Statement or attribute repeated where only one is permitted.
    TooMany = 10,
    /// Duplicated name.
    DupName = 11,
    /// Duplicated list instance (same key values).
    DupList = 12,
    /// Duplicated leaf-list value.
    DupLeaflist = 13,
    /// Statement nested under an invalid parent.
    BadNesting = 14,
    /// Circular dependency (import, include, identity or feature).
    Circular = 15,
    /// Leafref points to a non-existing schema node.
    LeafrefTarget = 16,
    /// Unknown module or namespace.
    Inmod = 17,
    /// Data from multiple cases of a single choice.
    McaseData = 18,
    /// Miscellaneous error with a parameterized message.
    Spec = 19,
}

/// Enum listing possible errors from yangtree.
#[derive(Debug, Eq, PartialEq)]
pub struct Error {
    pub errcode: ErrorCode,
    pub msg: Option<String>,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub apptag: Option<String>,
}

impl Error {
    pub(crate) fn new(errcode: ErrorCode, msg: impl Into<String>) -> Error {
        Error {
            errcode,
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    pub(crate) fn with_path(mut self, path: impl Into<String>) -> Error {
        self.path = Some(path.into());
        self
    }

    pub(crate) fn with_line(mut self, line: u32) -> Error {
        if line != 0 {
            self.line = Some(line);
        }
        self
    }

    pub fn other(msg: &str) -> Error {
        Error {
            msg: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

impl Default for Error {
    fn default() -> Self {
        Self {
            errcode: ErrorCode::Spec,
            msg: None,
            path: None,
            line: None,
            apptag: None,
        }
    }
}

impl std::fmt::Display for Error {
    // Print only the base error message by default.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(msg) = &self.msg {
            write!(f, "{}", msg)?;
        } else {
            write!(f, "Unknown error: {:?}", self.errcode)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        if let Some(line) = &self.line {
            write!(f, " (line: {})", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}
