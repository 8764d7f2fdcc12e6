//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG schema parsers.
//!
//! Both front-ends (YANG text and YIN) produce the same intermediate
//! statement tree, which the shared builder in this module turns into
//! the schema model. The builder only performs checks that are local to
//! a statement; everything else is enqueued for the resolver.

pub(crate) mod yang;
pub(crate) mod yin;

use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, ErrorCode, Result};
use crate::ident;
use crate::resolver::{self, ParseSession, UnresItem, UnresKind};
use crate::schema::{
    snode_link, FeatId, FeatureData, IdentId, IdentityData, ModuleData,
    ModuleId, MustStmt, RefineSpec, Revision, SchemaInputFormat,
    SchemaNodeKind, SchemaParent, SnodeData, SnodeFlags, SnodeId,
    SnodeOrigin, SnodePayload, TypeData, TypeEnum, TypeBit, TypeId,
    UniqueSpec, WhenStmt, DataValueType, Import,
};

/// YANG statement keywords understood by the builder. Extension
/// statements (prefixed keywords) map to `Unknown` and are skipped with
/// a warning.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Keyword {
    Module,
    Submodule,
    YangVersion,
    Namespace,
    Prefix,
    Import,
    Include,
    RevisionDate,
    BelongsTo,
    Organization,
    Contact,
    Description,
    Reference,
    Revision,
    Container,
    Leaf,
    LeafList,
    List,
    Choice,
    Case,
    Anyxml,
    Uses,
    Grouping,
    Augment,
    Rpc,
    Input,
    Output,
    Notification,
    Typedef,
    Type,
    Units,
    Default,
    Status,
    Config,
    Mandatory,
    Presence,
    OrderedBy,
    MinElements,
    MaxElements,
    Key,
    Unique,
    Must,
    When,
    ErrorMessage,
    ErrorAppTag,
    Feature,
    IfFeature,
    Identity,
    Base,
    Length,
    Range,
    Pattern,
    Enum,
    Bit,
    Value,
    Position,
    FractionDigits,
    Path,
    RequireInstance,
    Refine,
    Unknown(String),
}

impl Keyword {
    pub(crate) fn from_name(name: &str) -> Keyword {
        match name {
            "module" => Keyword::Module,
            "submodule" => Keyword::Submodule,
            "yang-version" => Keyword::YangVersion,
            "namespace" => Keyword::Namespace,
            "prefix" => Keyword::Prefix,
            "import" => Keyword::Import,
            "include" => Keyword::Include,
            "revision-date" => Keyword::RevisionDate,
            "belongs-to" => Keyword::BelongsTo,
            "organization" => Keyword::Organization,
            "contact" => Keyword::Contact,
            "description" => Keyword::Description,
            "reference" => Keyword::Reference,
            "revision" => Keyword::Revision,
            "container" => Keyword::Container,
            "leaf" => Keyword::Leaf,
            "leaf-list" => Keyword::LeafList,
            "list" => Keyword::List,
            "choice" => Keyword::Choice,
            "case" => Keyword::Case,
            "anyxml" => Keyword::Anyxml,
            "uses" => Keyword::Uses,
            "grouping" => Keyword::Grouping,
            "augment" => Keyword::Augment,
            "rpc" => Keyword::Rpc,
            "input" => Keyword::Input,
            "output" => Keyword::Output,
            "notification" => Keyword::Notification,
            "typedef" => Keyword::Typedef,
            "type" => Keyword::Type,
            "units" => Keyword::Units,
            "default" => Keyword::Default,
            "status" => Keyword::Status,
            "config" => Keyword::Config,
            "mandatory" => Keyword::Mandatory,
            "presence" => Keyword::Presence,
            "ordered-by" => Keyword::OrderedBy,
            "min-elements" => Keyword::MinElements,
            "max-elements" => Keyword::MaxElements,
            "key" => Keyword::Key,
            "unique" => Keyword::Unique,
            "must" => Keyword::Must,
            "when" => Keyword::When,
            "error-message" => Keyword::ErrorMessage,
            "error-app-tag" => Keyword::ErrorAppTag,
            "feature" => Keyword::Feature,
            "if-feature" => Keyword::IfFeature,
            "identity" => Keyword::Identity,
            "base" => Keyword::Base,
            "length" => Keyword::Length,
            "range" => Keyword::Range,
            "pattern" => Keyword::Pattern,
            "enum" => Keyword::Enum,
            "bit" => Keyword::Bit,
            "value" => Keyword::Value,
            "position" => Keyword::Position,
            "fraction-digits" => Keyword::FractionDigits,
            "path" => Keyword::Path,
            "require-instance" => Keyword::RequireInstance,
            "refine" => Keyword::Refine,
            other => Keyword::Unknown(other.to_string()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            Keyword::Module => "module",
            Keyword::Submodule => "submodule",
            Keyword::YangVersion => "yang-version",
            Keyword::Namespace => "namespace",
            Keyword::Prefix => "prefix",
            Keyword::Import => "import",
            Keyword::Include => "include",
            Keyword::RevisionDate => "revision-date",
            Keyword::BelongsTo => "belongs-to",
            Keyword::Organization => "organization",
            Keyword::Contact => "contact",
            Keyword::Description => "description",
            Keyword::Reference => "reference",
            Keyword::Revision => "revision",
            Keyword::Container => "container",
            Keyword::Leaf => "leaf",
            Keyword::LeafList => "leaf-list",
            Keyword::List => "list",
            Keyword::Choice => "choice",
            Keyword::Case => "case",
            Keyword::Anyxml => "anyxml",
            Keyword::Uses => "uses",
            Keyword::Grouping => "grouping",
            Keyword::Augment => "augment",
            Keyword::Rpc => "rpc",
            Keyword::Input => "input",
            Keyword::Output => "output",
            Keyword::Notification => "notification",
            Keyword::Typedef => "typedef",
            Keyword::Type => "type",
            Keyword::Units => "units",
            Keyword::Default => "default",
            Keyword::Status => "status",
            Keyword::Config => "config",
            Keyword::Mandatory => "mandatory",
            Keyword::Presence => "presence",
            Keyword::OrderedBy => "ordered-by",
            Keyword::MinElements => "min-elements",
            Keyword::MaxElements => "max-elements",
            Keyword::Key => "key",
            Keyword::Unique => "unique",
            Keyword::Must => "must",
            Keyword::When => "when",
            Keyword::ErrorMessage => "error-message",
            Keyword::ErrorAppTag => "error-app-tag",
            Keyword::Feature => "feature",
            Keyword::IfFeature => "if-feature",
            Keyword::Identity => "identity",
            Keyword::Base => "base",
            Keyword::Length => "length",
            Keyword::Range => "range",
            Keyword::Pattern => "pattern",
            Keyword::Enum => "enum",
            Keyword::Bit => "bit",
            Keyword::Value => "value",
            Keyword::Position => "position",
            Keyword::FractionDigits => "fraction-digits",
            Keyword::Path => "path",
            Keyword::RequireInstance => "require-instance",
            Keyword::Refine => "refine",
            Keyword::Unknown(name) => name,
        }
    }
}

/// One parsed statement: keyword, optional argument, substatements.
#[derive(Clone, Debug)]
pub(crate) struct Stmt {
    pub keyword: Keyword,
    pub arg: Option<String>,
    pub children: Vec<Stmt>,
    pub line: u32,
}

impl Stmt {
    fn arg(&self) -> Result<&str> {
        self.arg.as_deref().ok_or_else(|| {
            Error::new(
                ErrorCode::Misselem,
                format!(
                    "Statement \"{}\" requires an argument",
                    self.keyword.name()
                ),
            )
            .with_line(self.line)
        })
    }
}

fn too_many(keyword: &Keyword, line: u32) -> Error {
    Error::new(
        ErrorCode::TooMany,
        format!("Statement \"{}\" can appear only once", keyword.name()),
    )
    .with_line(line)
}

fn bad_nesting(stmt: &Stmt, parent: &str) -> Error {
    Error::new(
        ErrorCode::BadNesting,
        format!(
            "Statement \"{}\" cannot appear under \"{}\"",
            stmt.keyword.name(),
            parent
        ),
    )
    .with_line(stmt.line)
}

fn set_once<T>(slot: &mut Option<T>, value: T, stmt: &Stmt) -> Result<()> {
    if slot.is_some() {
        return Err(too_many(&stmt.keyword, stmt.line));
    }
    *slot = Some(value);
    Ok(())
}

/// Parse and resolve a module from a source string.
pub(crate) fn parse_module(
    ctx: &mut Context,
    data: &str,
    format: SchemaInputFormat,
    filepath: Option<String>,
    implemented: bool,
) -> Result<ModuleId> {
    let stmt = match format {
        SchemaInputFormat::YANG => yang::parse(data)?,
        SchemaInputFormat::YIN => yin::parse(data)?,
    };
    match stmt.keyword {
        Keyword::Module => (),
        Keyword::Submodule => {
            return Err(Error::new(
                ErrorCode::Inval,
                "Submodules cannot be parsed directly, load the main module instead",
            ));
        }
        _ => {
            return Err(Error::new(
                ErrorCode::Inval,
                format!(
                    "Expected a module, found \"{}\"",
                    stmt.keyword.name()
                ),
            ));
        }
    }

    let name = stmt.arg()?.to_string();
    ident::check_identifier(&name)?;
    ctx.parsing.push(name.clone());
    let result = build_module(ctx, &stmt, &name, filepath, implemented);
    ctx.parsing.pop();
    result
}

fn build_module(
    ctx: &mut Context,
    stmt: &Stmt,
    name: &str,
    filepath: Option<String>,
    implemented: bool,
) -> Result<ModuleId> {
    let mut session = ParseSession::default();

    // Header pass: split the statement list into header metadata,
    // imports/includes and body statements.
    let mut header = ModuleHeader::default();
    let mut body: Vec<Stmt> = Vec::new();
    collect_module_stmts(ctx, stmt, &mut header, &mut body, false)?;

    let ns = header.ns.clone().ok_or_else(|| {
        Error::new(
            ErrorCode::Misselem,
            format!("Missing namespace in module \"{}\"", name),
        )
    })?;
    let prefix = header.prefix.clone().ok_or_else(|| {
        Error::new(
            ErrorCode::Misselem,
            format!("Missing prefix in module \"{}\"", name),
        )
    })?;
    ident::check_identifier(&prefix)?;

    // Keep the revision array ordered newest-first while inserting.
    let mut revisions: Vec<Revision> = Vec::new();
    for (date, dsc, ref_) in header.revisions.drain(..) {
        let date = ctx.intern(&date);
        let dsc = dsc.map(|s| ctx.intern(&s));
        let ref_ = ref_.map(|s| ctx.intern(&s));
        revisions.push(Revision { date, dsc, ref_ });
        let last = revisions.len() - 1;
        if revisions[last].date > revisions[0].date {
            revisions.swap(0, last);
        }
    }

    // Already present in the context?
    let latest = revisions.first().map(|rev| rev.date.clone());
    if let Some(existing) = ctx
        .modules
        .iter()
        .position(|mdata| {
            mdata.name.as_ref() == name
                && mdata.latest_revision() == latest.as_ref()
        })
        .map(|idx| ModuleId(idx as u32))
    {
        if implemented {
            ctx.module_data_mut(existing).implemented = true;
        }
        return Ok(existing);
    }
    if let Some(other) = ctx
        .modules
        .iter()
        .find(|mdata| mdata.ns.as_ref() == ns && mdata.name.as_ref() != name)
    {
        return Err(Error::new(
            ErrorCode::DupName,
            format!(
                "Namespace \"{}\" already used by module \"{}\"",
                ns, other.name
            ),
        ));
    }

    // Load the imported modules. Loading reenters the parser; the
    // context's parsing stack catches import cycles.
    let mut imports = Vec::new();
    for import in &header.imports {
        if header
            .imports
            .iter()
            .filter(|other| other.name == import.name)
            .count()
            > 1
        {
            return Err(Error::new(
                ErrorCode::DupName,
                format!("Duplicated import of module \"{}\"", import.name),
            )
            .with_line(import.line));
        }
        if import.prefix == prefix
            || header
                .imports
                .iter()
                .filter(|other| other.prefix == import.prefix)
                .count()
                > 1
        {
            return Err(Error::new(
                ErrorCode::DupName,
                format!("Duplicated prefix \"{}\"", import.prefix),
            )
            .with_line(import.line));
        }
        let mid = ctx.load_module_internal(
            &import.name,
            import.revision.as_deref(),
            false,
        )?;
        let prefix = ctx.intern(&import.prefix);
        let revision = import.revision.as_deref().map(|s| ctx.intern(s));
        imports.push(Import { module: mid, prefix, revision });
    }

    // Register the module. From this point on, any error must unwind
    // the partially-built module so the context remains consistent.
    let mid = ModuleId(ctx.modules.len() as u32);
    let mdata = ModuleData {
        name: ctx.intern(name),
        ns: ctx.intern(&ns),
        prefix: ctx.intern(&prefix),
        version: header.version.as_deref().map(|s| ctx.dict.insert(s)),
        filepath,
        org: header.org.as_deref().map(|s| ctx.dict.insert(s)),
        contact: header.contact.as_deref().map(|s| ctx.dict.insert(s)),
        dsc: header.dsc.as_deref().map(|s| ctx.dict.insert(s)),
        ref_: header.ref_.as_deref().map(|s| ctx.dict.insert(s)),
        implemented,
        revisions,
        imports,
        includes: header
            .includes
            .iter()
            .map(|(name, rev, _)| {
                (
                    ctx.dict.insert(name),
                    rev.as_deref().map(|s| ctx.dict.insert(s)),
                )
            })
            .collect(),
        typedefs: Vec::new(),
        identities: Vec::new(),
        features: Vec::new(),
        augments: Vec::new(),
        data: None,
    };
    ctx.modules.push(mdata);

    let result = build_module_body(ctx, &mut session, mid, &body)
        .and_then(|()| resolver::resolve(ctx, mid, &mut session));
    if let Err(err) = result {
        // Unwind the partial module wholesale.
        debug_assert_eq!(ctx.modules.len() - 1, mid.0 as usize);
        ctx.modules.pop();
        return Err(err);
    }
    ctx.recompute_features();
    Ok(mid)
}

#[derive(Default)]
struct ModuleHeader {
    ns: Option<String>,
    prefix: Option<String>,
    version: Option<String>,
    org: Option<String>,
    contact: Option<String>,
    dsc: Option<String>,
    ref_: Option<String>,
    revisions: Vec<(String, Option<String>, Option<String>)>,
    imports: Vec<ImportMeta>,
    includes: Vec<(String, Option<String>, u32)>,
}

struct ImportMeta {
    name: String,
    prefix: String,
    revision: Option<String>,
    line: u32,
}

/// Split module/submodule statements into header and body, loading and
/// inlining included submodules on the way.
fn collect_module_stmts(
    ctx: &mut Context,
    stmt: &Stmt,
    header: &mut ModuleHeader,
    body: &mut Vec<Stmt>,
    submodule: bool,
) -> Result<()> {
    for child in &stmt.children {
        match &child.keyword {
            Keyword::Namespace if !submodule => {
                set_once(&mut header.ns, child.arg()?.to_string(), child)?
            }
            Keyword::Prefix if !submodule => {
                set_once(&mut header.prefix, child.arg()?.to_string(), child)?
            }
            Keyword::BelongsTo if submodule => (),
            Keyword::YangVersion => {
                let version = child.arg()?;
                if version != "1" && version != "1.1" {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        format!("Unsupported YANG version \"{}\"", version),
                    )
                    .with_line(child.line));
                }
                if !submodule {
                    set_once(
                        &mut header.version,
                        version.to_string(),
                        child,
                    )?;
                }
            }
            Keyword::Organization => {
                set_once(&mut header.org, child.arg()?.to_string(), child)?
            }
            Keyword::Contact => {
                set_once(&mut header.contact, child.arg()?.to_string(), child)?
            }
            Keyword::Description => {
                set_once(&mut header.dsc, child.arg()?.to_string(), child)?
            }
            Keyword::Reference => {
                set_once(&mut header.ref_, child.arg()?.to_string(), child)?
            }
            Keyword::Revision => {
                let date = child.arg()?.to_string();
                ident::check_date(&date)?;
                let mut dsc = None;
                let mut ref_ = None;
                for sub in &child.children {
                    match &sub.keyword {
                        Keyword::Description => {
                            set_once(&mut dsc, sub.arg()?.to_string(), sub)?
                        }
                        Keyword::Reference => {
                            set_once(&mut ref_, sub.arg()?.to_string(), sub)?
                        }
                        Keyword::Unknown(name) => {
                            log::warn!("ignoring unknown statement \"{}\"", name)
                        }
                        _ => return Err(bad_nesting(sub, "revision")),
                    }
                }
                header.revisions.push((date, dsc, ref_));
            }
            Keyword::Import => {
                let name = child.arg()?.to_string();
                let mut prefix = None;
                let mut revision = None;
                for sub in &child.children {
                    match &sub.keyword {
                        Keyword::Prefix => {
                            set_once(&mut prefix, sub.arg()?.to_string(), sub)?
                        }
                        Keyword::RevisionDate => {
                            let date = sub.arg()?.to_string();
                            ident::check_date(&date)?;
                            set_once(&mut revision, date, sub)?
                        }
                        _ => return Err(bad_nesting(sub, "import")),
                    }
                }
                let prefix = prefix.ok_or_else(|| {
                    Error::new(
                        ErrorCode::Misselem,
                        format!("Missing prefix in import of \"{}\"", name),
                    )
                    .with_line(child.line)
                })?;
                header.imports.push(ImportMeta {
                    name,
                    prefix,
                    revision,
                    line: child.line,
                });
            }
            Keyword::Include => {
                let name = child.arg()?.to_string();
                let mut revision = None;
                for sub in &child.children {
                    match &sub.keyword {
                        Keyword::RevisionDate => {
                            let date = sub.arg()?.to_string();
                            ident::check_date(&date)?;
                            set_once(&mut revision, date, sub)?
                        }
                        _ => return Err(bad_nesting(sub, "include")),
                    }
                }
                inline_submodule(
                    ctx,
                    &name,
                    revision.as_deref(),
                    header,
                    body,
                )?;
                header.includes.push((name, revision, child.line));
            }
            Keyword::Typedef
            | Keyword::Feature
            | Keyword::Identity
            | Keyword::Grouping
            | Keyword::Container
            | Keyword::Leaf
            | Keyword::LeafList
            | Keyword::List
            | Keyword::Choice
            | Keyword::Anyxml
            | Keyword::Uses
            | Keyword::Rpc
            | Keyword::Notification
            | Keyword::Augment => body.push(child.clone()),
            Keyword::Unknown(name) => {
                log::warn!("ignoring unknown statement \"{}\"", name)
            }
            _ => {
                return Err(bad_nesting(
                    child,
                    if submodule { "submodule" } else { "module" },
                ));
            }
        }
    }
    Ok(())
}

/// Load a submodule's source, parse it and merge its statements into
/// the including module.
fn inline_submodule(
    ctx: &mut Context,
    name: &str,
    revision: Option<&str>,
    header: &mut ModuleHeader,
    body: &mut Vec<Stmt>,
) -> Result<()> {
    if ctx.parsing.iter().any(|parsing| parsing == name) {
        return Err(Error::new(
            ErrorCode::Circular,
            format!("Circular dependency on submodule \"{}\"", name),
        ));
    }

    let (source, format, _) = ctx
        .find_module_source(name, revision, true)
        .or_else(|| ctx.find_module_source(name, revision, false))
        .ok_or_else(|| {
            Error::new(
                ErrorCode::Inmod,
                format!("Submodule \"{}\" not found", name),
            )
        })?;
    let stmt = match format {
        SchemaInputFormat::YANG => yang::parse(&source)?,
        SchemaInputFormat::YIN => yin::parse(&source)?,
    };
    if stmt.keyword != Keyword::Submodule {
        return Err(Error::new(
            ErrorCode::Inval,
            format!("\"{}\" is not a submodule", name),
        ));
    }

    // The submodule must belong to the module currently being parsed.
    let belongs_to = stmt
        .children
        .iter()
        .find(|child| child.keyword == Keyword::BelongsTo)
        .ok_or_else(|| {
            Error::new(
                ErrorCode::Misselem,
                format!("Missing belongs-to in submodule \"{}\"", name),
            )
        })?;
    let owner = ctx.parsing.first().cloned().unwrap_or_default();
    if belongs_to.arg()? != owner {
        return Err(Error::new(
            ErrorCode::Inval,
            format!(
                "Submodule \"{}\" belongs to \"{}\", not \"{}\"",
                name,
                belongs_to.arg()?,
                owner
            ),
        ));
    }

    ctx.parsing.push(name.to_string());
    let result = collect_module_stmts(ctx, &stmt, header, body, true);
    ctx.parsing.pop();
    result
}

fn build_module_body(
    ctx: &mut Context,
    session: &mut ParseSession,
    mid: ModuleId,
    body: &[Stmt],
) -> Result<()> {
    for stmt in body {
        match &stmt.keyword {
            Keyword::Typedef => {
                let tid = build_typedef(ctx, session, mid, None, stmt)?;
                ctx.module_data_mut(mid).typedefs.push(tid);
            }
            Keyword::Feature => {
                let feat = build_feature(ctx, session, mid, stmt)?;
                ctx.module_data_mut(mid).features.push(feat);
            }
            Keyword::Identity => {
                let ident = build_identity(ctx, session, mid, stmt)?;
                ctx.module_data_mut(mid).identities.push(ident);
            }
            Keyword::Augment => {
                let augment = build_augment(ctx, session, mid, stmt)?;
                ctx.module_data_mut(mid).augments.push(augment);
            }
            _ => {
                build_node(
                    ctx,
                    session,
                    mid,
                    SchemaParent::Module(mid),
                    stmt,
                    false,
                )?;
            }
        }
    }
    Ok(())
}

fn new_snode(
    ctx: &mut Context,
    kind: SchemaNodeKind,
    name: &str,
    mid: ModuleId,
    line: u32,
    payload: SnodePayload,
) -> SnodeId {
    let name = ctx.intern(name);
    let id = ctx.alloc_snode(SnodeData {
        kind,
        name,
        module: mid,
        parent: None,
        prev: SnodeId(0),
        next: None,
        child: None,
        flags: SnodeFlags::empty(),
        dsc: None,
        ref_: None,
        when: None,
        musts: Vec::new(),
        iffeature_names: Vec::new(),
        iffeatures: Vec::new(),
        typedefs: Vec::new(),
        origin: SnodeOrigin::Declared,
        line,
        payload,
    });
    ctx.snode_mut(id).prev = id;
    id
}

pub(crate) fn build_node(
    ctx: &mut Context,
    session: &mut ParseSession,
    mid: ModuleId,
    parent: SchemaParent,
    stmt: &Stmt,
    in_grouping: bool,
) -> Result<SnodeId> {
    let (kind, payload) = match &stmt.keyword {
        Keyword::Container => (
            SchemaNodeKind::Container,
            SnodePayload::Container { presence: None },
        ),
        Keyword::Leaf => (
            SchemaNodeKind::Leaf,
            SnodePayload::Leaf {
                ty: TypeId(u32::MAX),
                default: None,
                units: None,
            },
        ),
        Keyword::LeafList => (
            SchemaNodeKind::LeafList,
            SnodePayload::LeafList {
                ty: TypeId(u32::MAX),
                units: None,
                min: 0,
                max: None,
            },
        ),
        Keyword::List => (
            SchemaNodeKind::List,
            SnodePayload::List {
                keys: Vec::new(),
                keys_str: None,
                uniques: Vec::new(),
                min: 0,
                max: None,
            },
        ),
        Keyword::Choice => (
            SchemaNodeKind::Choice,
            SnodePayload::Choice {
                default_name: None,
                default: None,
            },
        ),
        Keyword::Case => (SchemaNodeKind::Case, SnodePayload::Case),
        Keyword::Anyxml => (SchemaNodeKind::AnyXml, SnodePayload::AnyXml),
        Keyword::Grouping => {
            (SchemaNodeKind::Grouping, SnodePayload::Grouping)
        }
        Keyword::Uses => (
            SchemaNodeKind::Uses,
            SnodePayload::Uses {
                grouping: Arc::from(stmt.arg()?),
                refines: Vec::new(),
                augments: Vec::new(),
                expanded: false,
            },
        ),
        Keyword::Rpc => (SchemaNodeKind::Rpc, SnodePayload::Rpc),
        Keyword::Input => (SchemaNodeKind::Input, SnodePayload::Input),
        Keyword::Output => (SchemaNodeKind::Output, SnodePayload::Output),
        Keyword::Notification => {
            (SchemaNodeKind::Notification, SnodePayload::Notification)
        }
        _ => {
            return Err(bad_nesting(stmt, "schema node"));
        }
    };

    let name = match kind {
        SchemaNodeKind::Input => "input".to_string(),
        SchemaNodeKind::Output => "output".to_string(),
        SchemaNodeKind::Uses => {
            // The argument names the grouping, possibly prefixed.
            let (_, name) = ident::split_prefix(stmt.arg()?);
            name.to_string()
        }
        _ => {
            let name = stmt.arg()?;
            ident::check_identifier(name)?;
            name.to_string()
        }
    };

    let in_grouping = in_grouping || kind == SchemaNodeKind::Grouping;
    let id = new_snode(ctx, kind, &name, mid, stmt.line, payload);
    snode_link(ctx, parent, id)?;

    let mut ty: Option<TypeId> = None;
    let mut ordered_by_seen = false;
    let mut min_seen = false;
    let mut max_seen = false;

    for sub in &stmt.children {
        match &sub.keyword {
            Keyword::Description => {
                let dsc = ctx.intern(sub.arg()?);
                set_once(&mut ctx.snode_mut(id).dsc, dsc, sub)?;
            }
            Keyword::Reference => {
                let ref_ = ctx.intern(sub.arg()?);
                set_once(&mut ctx.snode_mut(id).ref_, ref_, sub)?;
            }
            Keyword::Status => {
                apply_status(&mut ctx.snode_mut(id).flags, sub)?;
            }
            Keyword::Config => {
                let flags = &mut ctx.snode_mut(id).flags;
                if flags.contains(SnodeFlags::CONFIG_SET) {
                    return Err(too_many(&sub.keyword, sub.line));
                }
                flags.insert(SnodeFlags::CONFIG_SET);
                match sub.arg()? {
                    "true" => flags.insert(SnodeFlags::CONFIG_W),
                    "false" => flags.insert(SnodeFlags::CONFIG_R),
                    arg => {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            format!("Invalid config value \"{}\"", arg),
                        )
                        .with_line(sub.line));
                    }
                }
            }
            Keyword::Mandatory
                if matches!(
                    kind,
                    SchemaNodeKind::Leaf
                        | SchemaNodeKind::Choice
                        | SchemaNodeKind::AnyXml
                ) =>
            {
                let flags = &mut ctx.snode_mut(id).flags;
                if flags.intersects(
                    SnodeFlags::MAND_TRUE | SnodeFlags::MAND_FALSE,
                ) {
                    return Err(too_many(&sub.keyword, sub.line));
                }
                match sub.arg()? {
                    "true" => flags.insert(SnodeFlags::MAND_TRUE),
                    "false" => flags.insert(SnodeFlags::MAND_FALSE),
                    arg => {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            format!("Invalid mandatory value \"{}\"", arg),
                        )
                        .with_line(sub.line));
                    }
                }
            }
            Keyword::When => {
                let when = parse_when(ctx, sub)?;
                set_once(&mut ctx.snode_mut(id).when, when, sub)?;
            }
            Keyword::Must
                if !matches!(
                    kind,
                    SchemaNodeKind::Choice
                        | SchemaNodeKind::Case
                        | SchemaNodeKind::Uses
                        | SchemaNodeKind::Grouping
                ) =>
            {
                let must = parse_must(ctx, sub)?;
                ctx.snode_mut(id).musts.push(must);
            }
            Keyword::IfFeature => {
                let name = ctx.intern(sub.arg()?);
                ctx.snode_mut(id).iffeature_names.push(name.clone());
                session.unres.push(UnresItem {
                    kind: UnresKind::IfFeatSnode(id, name),
                    line: sub.line,
                });
            }
            Keyword::Presence
                if kind == SchemaNodeKind::Container =>
            {
                let presence = ctx.intern(sub.arg()?);
                if let SnodePayload::Container { presence: slot } =
                    &mut ctx.snode_mut(id).payload
                {
                    set_once(slot, presence, sub)?;
                }
            }
            Keyword::Type
                if matches!(
                    kind,
                    SchemaNodeKind::Leaf | SchemaNodeKind::LeafList
                ) =>
            {
                if ty.is_some() {
                    return Err(too_many(&sub.keyword, sub.line));
                }
                let tid =
                    build_type(ctx, session, mid, Some(id), sub, None)?;
                ty = Some(tid);
            }
            Keyword::Units
                if matches!(
                    kind,
                    SchemaNodeKind::Leaf | SchemaNodeKind::LeafList
                ) =>
            {
                let units = ctx.intern(sub.arg()?);
                match &mut ctx.snode_mut(id).payload {
                    SnodePayload::Leaf { units: slot, .. }
                    | SnodePayload::LeafList { units: slot, .. } => {
                        set_once(slot, units, sub)?
                    }
                    _ => unreachable!(),
                }
            }
            Keyword::Default if kind == SchemaNodeKind::Leaf => {
                let default = ctx.intern(sub.arg()?);
                if let SnodePayload::Leaf { default: slot, .. } =
                    &mut ctx.snode_mut(id).payload
                {
                    set_once(slot, default, sub)?;
                }
            }
            Keyword::Default if kind == SchemaNodeKind::Choice => {
                let default = ctx.intern(sub.arg()?);
                if let SnodePayload::Choice { default_name: slot, .. } =
                    &mut ctx.snode_mut(id).payload
                {
                    set_once(slot, default, sub)?;
                }
            }
            Keyword::MinElements
                if matches!(
                    kind,
                    SchemaNodeKind::LeafList | SchemaNodeKind::List
                ) =>
            {
                if min_seen {
                    return Err(too_many(&sub.keyword, sub.line));
                }
                min_seen = true;
                let arg = sub.arg()?;
                let min = arg.parse::<u32>().map_err(|_| {
                    Error::new(
                        ErrorCode::Inval,
                        format!("Invalid min-elements \"{}\"", arg),
                    )
                    .with_line(sub.line)
                })?;
                match &mut ctx.snode_mut(id).payload {
                    SnodePayload::LeafList { min: slot, .. }
                    | SnodePayload::List { min: slot, .. } => *slot = min,
                    _ => unreachable!(),
                }
            }
            Keyword::MaxElements
                if matches!(
                    kind,
                    SchemaNodeKind::LeafList | SchemaNodeKind::List
                ) =>
            {
                if max_seen {
                    return Err(too_many(&sub.keyword, sub.line));
                }
                max_seen = true;
                let arg = sub.arg()?;
                let max = if arg == "unbounded" {
                    None
                } else {
                    Some(arg.parse::<u32>().map_err(|_| {
                        Error::new(
                            ErrorCode::Inval,
                            format!("Invalid max-elements \"{}\"", arg),
                        )
                        .with_line(sub.line)
                    })?)
                };
                match &mut ctx.snode_mut(id).payload {
                    SnodePayload::LeafList { max: slot, .. }
                    | SnodePayload::List { max: slot, .. } => *slot = max,
                    _ => unreachable!(),
                }
            }
            Keyword::OrderedBy
                if matches!(
                    kind,
                    SchemaNodeKind::LeafList | SchemaNodeKind::List
                ) =>
            {
                if ordered_by_seen {
                    return Err(too_many(&sub.keyword, sub.line));
                }
                ordered_by_seen = true;
                match sub.arg()? {
                    "user" => ctx
                        .snode_mut(id)
                        .flags
                        .insert(SnodeFlags::ORDBY_USER),
                    "system" => (),
                    arg => {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            format!("Invalid ordered-by value \"{}\"", arg),
                        )
                        .with_line(sub.line));
                    }
                }
            }
            Keyword::Key if kind == SchemaNodeKind::List => {
                let keys_str = ctx.intern(sub.arg()?);
                if let SnodePayload::List { keys_str: slot, .. } =
                    &mut ctx.snode_mut(id).payload
                {
                    set_once(slot, keys_str, sub)?;
                }
                session.unres.push(UnresItem {
                    kind: UnresKind::ListKeys(id),
                    line: sub.line,
                });
            }
            Keyword::Unique if kind == SchemaNodeKind::List => {
                let arg = ctx.intern(sub.arg()?);
                if let SnodePayload::List { uniques, .. } =
                    &mut ctx.snode_mut(id).payload
                {
                    let first = uniques.is_empty();
                    uniques.push(UniqueSpec {
                        arg,
                        nodes: Vec::new(),
                    });
                    if first {
                        session.unres.push(UnresItem {
                            kind: UnresKind::ListUnique(id),
                            line: sub.line,
                        });
                    }
                }
            }
            Keyword::Typedef
                if matches!(
                    kind,
                    SchemaNodeKind::Container
                        | SchemaNodeKind::List
                        | SchemaNodeKind::Grouping
                        | SchemaNodeKind::Rpc
                        | SchemaNodeKind::Input
                        | SchemaNodeKind::Output
                        | SchemaNodeKind::Notification
                ) =>
            {
                let tid =
                    build_typedef(ctx, session, mid, Some(id), sub)?;
                ctx.snode_mut(id).typedefs.push(tid);
            }
            Keyword::Refine if kind == SchemaNodeKind::Uses => {
                let refine = parse_refine(ctx, sub)?;
                if let SnodePayload::Uses { refines, .. } =
                    &mut ctx.snode_mut(id).payload
                {
                    refines.push(refine);
                }
            }
            Keyword::Augment if kind == SchemaNodeKind::Uses => {
                let augment = build_uses_augment(ctx, session, mid, id, sub)?;
                if let SnodePayload::Uses { augments, .. } =
                    &mut ctx.snode_mut(id).payload
                {
                    augments.push(augment);
                }
            }
            Keyword::Container
            | Keyword::Leaf
            | Keyword::LeafList
            | Keyword::List
            | Keyword::Choice
            | Keyword::Case
            | Keyword::Anyxml
            | Keyword::Uses
            | Keyword::Grouping
            | Keyword::Input
            | Keyword::Output => {
                build_node(
                    ctx,
                    session,
                    mid,
                    SchemaParent::Node(id),
                    sub,
                    in_grouping,
                )?;
            }
            Keyword::Unknown(name) => {
                log::warn!("ignoring unknown statement \"{}\"", name)
            }
            _ => return Err(bad_nesting(sub, stmt.keyword.name())),
        }
    }

    // A leaf(-list) must carry exactly one type.
    if matches!(kind, SchemaNodeKind::Leaf | SchemaNodeKind::LeafList) {
        let tid = ty.ok_or_else(|| {
            Error::new(
                ErrorCode::Misselem,
                format!("Missing type in leaf \"{}\"", name),
            )
            .with_line(stmt.line)
        })?;
        match &mut ctx.snode_mut(id).payload {
            SnodePayload::Leaf { ty, .. }
            | SnodePayload::LeafList { ty, .. } => *ty = tid,
            _ => unreachable!(),
        }
        if !in_grouping {
            session.unres.push(UnresItem {
                kind: UnresKind::Leafref(id),
                line: stmt.line,
            });
        }
    }

    if kind == SchemaNodeKind::Uses {
        session.unres.push(UnresItem {
            kind: UnresKind::Uses(id),
            line: stmt.line,
        });
    }

    Ok(id)
}

fn apply_status(flags: &mut SnodeFlags, stmt: &Stmt) -> Result<()> {
    if flags.contains(SnodeFlags::STATUS_SET) {
        return Err(too_many(&stmt.keyword, stmt.line));
    }
    flags.insert(SnodeFlags::STATUS_SET);
    match stmt.arg()? {
        "current" => flags.insert(SnodeFlags::STATUS_CURR),
        "deprecated" => flags.insert(SnodeFlags::STATUS_DEPRC),
        "obsolete" => flags.insert(SnodeFlags::STATUS_OBSLT),
        arg => {
            return Err(Error::new(
                ErrorCode::Inval,
                format!("Invalid status value \"{}\"", arg),
            )
            .with_line(stmt.line));
        }
    }
    Ok(())
}

fn parse_when(ctx: &mut Context, stmt: &Stmt) -> Result<WhenStmt> {
    let cond = stmt.arg()?;
    ident::check_xpath_syntax(cond)?;
    let mut when = WhenStmt {
        cond: ctx.intern(cond),
        dsc: None,
        ref_: None,
    };
    for sub in &stmt.children {
        match &sub.keyword {
            Keyword::Description => {
                let dsc = ctx.intern(sub.arg()?);
                set_once(&mut when.dsc, dsc, sub)?
            }
            Keyword::Reference => {
                let ref_ = ctx.intern(sub.arg()?);
                set_once(&mut when.ref_, ref_, sub)?
            }
            _ => return Err(bad_nesting(sub, "when")),
        }
    }
    Ok(when)
}

fn parse_must(ctx: &mut Context, stmt: &Stmt) -> Result<MustStmt> {
    let cond = stmt.arg()?;
    ident::check_xpath_syntax(cond)?;
    let mut must = MustStmt {
        cond: ctx.intern(cond),
        dsc: None,
        ref_: None,
        emsg: None,
        eapptag: None,
    };
    for sub in &stmt.children {
        match &sub.keyword {
            Keyword::Description => {
                let dsc = ctx.intern(sub.arg()?);
                set_once(&mut must.dsc, dsc, sub)?
            }
            Keyword::Reference => {
                let ref_ = ctx.intern(sub.arg()?);
                set_once(&mut must.ref_, ref_, sub)?
            }
            Keyword::ErrorMessage => {
                let emsg = ctx.intern(sub.arg()?);
                set_once(&mut must.emsg, emsg, sub)?
            }
            Keyword::ErrorAppTag => {
                let eapptag = ctx.intern(sub.arg()?);
                set_once(&mut must.eapptag, eapptag, sub)?
            }
            _ => return Err(bad_nesting(sub, "must")),
        }
    }
    Ok(must)
}

fn parse_refine(ctx: &mut Context, stmt: &Stmt) -> Result<RefineSpec> {
    let mut refine = RefineSpec {
        target: stmt.arg()?.to_string(),
        ..Default::default()
    };
    let mut config = None;
    let mut mandatory = None;
    for sub in &stmt.children {
        match &sub.keyword {
            Keyword::Description => {
                let dsc = ctx.intern(sub.arg()?);
                set_once(&mut refine.dsc, dsc, sub)?
            }
            Keyword::Reference => {
                let ref_ = ctx.intern(sub.arg()?);
                set_once(&mut refine.ref_, ref_, sub)?
            }
            Keyword::Presence => {
                let presence = ctx.intern(sub.arg()?);
                set_once(&mut refine.presence, presence, sub)?
            }
            Keyword::Default => {
                let default = ctx.intern(sub.arg()?);
                set_once(&mut refine.default, default, sub)?
            }
            Keyword::Config => {
                set_once(&mut config, sub.arg()? == "true", sub)?
            }
            Keyword::Mandatory => {
                set_once(&mut mandatory, sub.arg()? == "true", sub)?
            }
            Keyword::MinElements => {
                let min = sub.arg()?.parse::<u32>().map_err(|_| {
                    Error::new(ErrorCode::Inval, "Invalid min-elements")
                        .with_line(sub.line)
                })?;
                set_once(&mut refine.min, min, sub)?
            }
            Keyword::MaxElements => {
                let arg = sub.arg()?;
                let max = if arg == "unbounded" {
                    u32::MAX
                } else {
                    arg.parse::<u32>().map_err(|_| {
                        Error::new(ErrorCode::Inval, "Invalid max-elements")
                            .with_line(sub.line)
                    })?
                };
                set_once(&mut refine.max, max, sub)?
            }
            Keyword::Must => {
                let must = parse_must(ctx, sub)?;
                refine.musts.push(must);
            }
            _ => return Err(bad_nesting(sub, "refine")),
        }
    }
    refine.config = config;
    refine.mandatory = mandatory;
    Ok(refine)
}

fn build_uses_augment(
    ctx: &mut Context,
    session: &mut ParseSession,
    mid: ModuleId,
    uses: SnodeId,
    stmt: &Stmt,
) -> Result<SnodeId> {
    let target = stmt.arg()?.to_string();
    let id = new_snode(
        ctx,
        SchemaNodeKind::Augment,
        &target,
        mid,
        stmt.line,
        SnodePayload::Augment {
            target: Arc::from(target.as_str()),
            target_node: None,
            children: Vec::new(),
        },
    );
    snode_link(ctx, SchemaParent::Node(uses), id)?;
    build_augment_body(ctx, session, mid, id, stmt)?;
    Ok(id)
}

fn build_augment(
    ctx: &mut Context,
    session: &mut ParseSession,
    mid: ModuleId,
    stmt: &Stmt,
) -> Result<SnodeId> {
    let target = stmt.arg()?.to_string();
    let id = new_snode(
        ctx,
        SchemaNodeKind::Augment,
        &target,
        mid,
        stmt.line,
        SnodePayload::Augment {
            target: Arc::from(target.as_str()),
            target_node: None,
            children: Vec::new(),
        },
    );
    build_augment_body(ctx, session, mid, id, stmt)?;
    session.unres.push(UnresItem {
        kind: UnresKind::Augment(id),
        line: stmt.line,
    });
    Ok(id)
}

fn build_augment_body(
    ctx: &mut Context,
    session: &mut ParseSession,
    mid: ModuleId,
    id: SnodeId,
    stmt: &Stmt,
) -> Result<()> {
    for sub in &stmt.children {
        match &sub.keyword {
            Keyword::Description => {
                let dsc = ctx.intern(sub.arg()?);
                set_once(&mut ctx.snode_mut(id).dsc, dsc, sub)?;
            }
            Keyword::Reference => {
                let ref_ = ctx.intern(sub.arg()?);
                set_once(&mut ctx.snode_mut(id).ref_, ref_, sub)?;
            }
            Keyword::Status => {
                apply_status(&mut ctx.snode_mut(id).flags, sub)?;
            }
            Keyword::When => {
                let when = parse_when(ctx, sub)?;
                set_once(&mut ctx.snode_mut(id).when, when, sub)?;
            }
            Keyword::IfFeature => {
                let name = ctx.intern(sub.arg()?);
                ctx.snode_mut(id).iffeature_names.push(name.clone());
                session.unres.push(UnresItem {
                    kind: UnresKind::IfFeatSnode(id, name),
                    line: sub.line,
                });
            }
            Keyword::Container
            | Keyword::Leaf
            | Keyword::LeafList
            | Keyword::List
            | Keyword::Choice
            | Keyword::Case
            | Keyword::Anyxml
            | Keyword::Uses => {
                build_node(
                    ctx,
                    session,
                    mid,
                    SchemaParent::Node(id),
                    sub,
                    false,
                )?;
            }
            Keyword::Unknown(name) => {
                log::warn!("ignoring unknown statement \"{}\"", name)
            }
            _ => return Err(bad_nesting(sub, "augment")),
        }
    }
    Ok(())
}

fn build_feature(
    ctx: &mut Context,
    session: &mut ParseSession,
    mid: ModuleId,
    stmt: &Stmt,
) -> Result<FeatId> {
    let name = stmt.arg()?;
    ident::check_identifier(name)?;
    let name = ctx.intern(name);
    let feat = ctx.alloc_feature(FeatureData {
        name,
        module: mid,
        iffeature_names: Vec::new(),
        iffeatures: Vec::new(),
        explicit: false,
        enabled: false,
        dsc: None,
        ref_: None,
        line: stmt.line,
    });

    for sub in &stmt.children {
        match &sub.keyword {
            Keyword::Description => {
                let dsc = ctx.intern(sub.arg()?);
                set_once(&mut ctx.features[feat.0 as usize].dsc, dsc, sub)?
            }
            Keyword::Reference => {
                let ref_ = ctx.intern(sub.arg()?);
                set_once(&mut ctx.features[feat.0 as usize].ref_, ref_, sub)?
            }
            Keyword::Status => (),
            Keyword::IfFeature => {
                let name = ctx.intern(sub.arg()?);
                ctx.features[feat.0 as usize]
                    .iffeature_names
                    .push(name.clone());
                session.unres.push(UnresItem {
                    kind: UnresKind::IfFeatFeature(feat, name),
                    line: sub.line,
                });
            }
            Keyword::Unknown(name) => {
                log::warn!("ignoring unknown statement \"{}\"", name)
            }
            _ => return Err(bad_nesting(sub, "feature")),
        }
    }
    Ok(feat)
}

fn build_identity(
    ctx: &mut Context,
    session: &mut ParseSession,
    mid: ModuleId,
    stmt: &Stmt,
) -> Result<IdentId> {
    let name = stmt.arg()?;
    ident::check_identifier(name)?;
    let name = ctx.intern(name);
    let ident = ctx.alloc_identity(IdentityData {
        name,
        module: mid,
        base_name: None,
        base: None,
        dsc: None,
        ref_: None,
        line: stmt.line,
    });

    for sub in &stmt.children {
        match &sub.keyword {
            Keyword::Description => {
                let dsc = ctx.intern(sub.arg()?);
                set_once(&mut ctx.identities[ident.0 as usize].dsc, dsc, sub)?
            }
            Keyword::Reference => {
                let ref_ = ctx.intern(sub.arg()?);
                set_once(
                    &mut ctx.identities[ident.0 as usize].ref_,
                    ref_,
                    sub,
                )?
            }
            Keyword::Status => (),
            Keyword::Base => {
                let base = ctx.intern(sub.arg()?);
                set_once(
                    &mut ctx.identities[ident.0 as usize].base_name,
                    base,
                    sub,
                )?;
            }
            Keyword::Unknown(name) => {
                log::warn!("ignoring unknown statement \"{}\"", name)
            }
            _ => return Err(bad_nesting(sub, "identity")),
        }
    }

    if ctx.identities[ident.0 as usize].base_name.is_some() {
        session.unres.push(UnresItem {
            kind: UnresKind::Identity(ident),
            line: stmt.line,
        });
    }
    Ok(ident)
}

fn build_typedef(
    ctx: &mut Context,
    session: &mut ParseSession,
    mid: ModuleId,
    scope: Option<SnodeId>,
    stmt: &Stmt,
) -> Result<TypeId> {
    let name = stmt.arg()?;
    ident::check_identifier(name)?;
    if DataValueType::from_name(name).is_some() {
        return Err(Error::new(
            ErrorCode::DupName,
            format!("Typedef \"{}\" collides with a built-in type", name),
        )
        .with_line(stmt.line));
    }

    let type_stmt = stmt
        .children
        .iter()
        .find(|sub| sub.keyword == Keyword::Type)
        .ok_or_else(|| {
            Error::new(
                ErrorCode::Misselem,
                format!("Missing type in typedef \"{}\"", name),
            )
            .with_line(stmt.line)
        })?;
    if stmt
        .children
        .iter()
        .filter(|sub| sub.keyword == Keyword::Type)
        .count()
        > 1
    {
        return Err(too_many(&Keyword::Type, stmt.line));
    }

    let tid = build_type(
        ctx,
        session,
        mid,
        scope,
        type_stmt,
        Some(name.to_string()),
    )?;

    let mut has_default = false;
    for sub in &stmt.children {
        match &sub.keyword {
            Keyword::Type => (),
            Keyword::Description => {
                let dsc = ctx.intern(sub.arg()?);
                set_once(&mut ctx.type_data_mut(tid).dsc, dsc, sub)?
            }
            Keyword::Reference => {
                let ref_ = ctx.intern(sub.arg()?);
                set_once(&mut ctx.type_data_mut(tid).ref_, ref_, sub)?
            }
            Keyword::Units => {
                let units = ctx.intern(sub.arg()?);
                set_once(&mut ctx.type_data_mut(tid).units, units, sub)?
            }
            Keyword::Default => {
                let default = ctx.intern(sub.arg()?);
                set_once(&mut ctx.type_data_mut(tid).default, default, sub)?;
                has_default = true;
            }
            Keyword::Status => (),
            Keyword::Unknown(name) => {
                log::warn!("ignoring unknown statement \"{}\"", name)
            }
            _ => return Err(bad_nesting(sub, "typedef")),
        }
    }

    if has_default {
        session.unres.push(UnresItem {
            kind: UnresKind::TypedefDflt(tid),
            line: stmt.line,
        });
    }
    Ok(tid)
}

/// Build a type skeleton from a `type` statement and enqueue its
/// resolution. Which restrictions are legal depends on the resolved
/// base and is re-checked by the resolver.
pub(crate) fn build_type(
    ctx: &mut Context,
    session: &mut ParseSession,
    mid: ModuleId,
    scope: Option<SnodeId>,
    stmt: &Stmt,
    typedef_name: Option<String>,
) -> Result<TypeId> {
    let base_name = stmt.arg()?;
    let name = typedef_name.as_deref().unwrap_or(base_name);

    let name = ctx.intern(name);
    let base_name = ctx.intern(base_name);
    let mut tdata = TypeData::new(name, base_name, mid, stmt.line);
    tdata.is_typedef = typedef_name.is_some();
    tdata.scope = scope;
    let tid = ctx.alloc_type(tdata);

    let mut next_enum_value: i64 = 0;
    let mut next_bit_pos: u64 = 0;

    for sub in &stmt.children {
        match &sub.keyword {
            Keyword::Length => {
                let length = ctx.intern(sub.arg()?);
                set_once(&mut ctx.type_data_mut(tid).length, length, sub)?
            }
            Keyword::Range => {
                let range = ctx.intern(sub.arg()?);
                set_once(&mut ctx.type_data_mut(tid).range, range, sub)?
            }
            Keyword::Pattern => {
                let pattern = ctx.intern(sub.arg()?);
                ctx.type_data_mut(tid).patterns.push(pattern);
            }
            Keyword::FractionDigits => {
                let fd = sub.arg()?.parse::<u8>().ok().filter(|fd| {
                    (1..=18).contains(fd)
                });
                let fd = fd.ok_or_else(|| {
                    Error::new(
                        ErrorCode::Inval,
                        format!(
                            "Invalid fraction-digits \"{}\"",
                            sub.arg().unwrap_or("")
                        ),
                    )
                    .with_line(sub.line)
                })?;
                if ctx.type_data(tid).frac_digits.is_some() {
                    return Err(too_many(&sub.keyword, sub.line));
                }
                ctx.type_data_mut(tid).frac_digits = Some(fd);
            }
            Keyword::Path => {
                let path = ctx.intern(sub.arg()?);
                set_once(&mut ctx.type_data_mut(tid).path, path, sub)?
            }
            Keyword::Base => {
                let base = ctx.intern(sub.arg()?);
                set_once(
                    &mut ctx.type_data_mut(tid).ident_base_name,
                    base,
                    sub,
                )?
            }
            Keyword::Enum => {
                let ename = sub.arg()?;
                let mut value = None;
                let mut dsc = None;
                let mut ref_ = None;
                for esub in &sub.children {
                    match &esub.keyword {
                        Keyword::Value => {
                            let parsed =
                                esub.arg()?.parse::<i32>().map_err(|_| {
                                    Error::new(
                                        ErrorCode::Inval,
                                        format!(
                                            "Invalid enum value \"{}\"",
                                            esub.arg().unwrap_or("")
                                        ),
                                    )
                                    .with_line(esub.line)
                                })?;
                            set_once(&mut value, parsed, esub)?;
                        }
                        Keyword::Description => {
                            let text = ctx.intern(esub.arg()?);
                            set_once(&mut dsc, text, esub)?
                        }
                        Keyword::Reference => {
                            let text = ctx.intern(esub.arg()?);
                            set_once(&mut ref_, text, esub)?
                        }
                        Keyword::Status => (),
                        _ => return Err(bad_nesting(esub, "enum")),
                    }
                }
                let value_set = value.is_some();
                let value = match value {
                    Some(value) => value,
                    None => {
                        if next_enum_value > i64::from(i32::MAX) {
                            return Err(Error::new(
                                ErrorCode::Oorval,
                                "Enum value overflow",
                            )
                            .with_line(sub.line));
                        }
                        next_enum_value as i32
                    }
                };
                next_enum_value = i64::from(value) + 1;
                let ename = ctx.intern(ename);
                let tdata = ctx.type_data_mut(tid);
                if tdata.enums.iter().any(|e| e.name == ename) {
                    return Err(Error::new(
                        ErrorCode::DupName,
                        format!("Duplicated enum name \"{}\"", ename),
                    )
                    .with_line(sub.line));
                }
                if tdata.enums.iter().any(|e| e.value == value) {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        format!("Duplicated enum value {}", value),
                    )
                    .with_line(sub.line));
                }
                tdata.enums.push(TypeEnum {
                    name: ename,
                    value,
                    value_set,
                    dsc,
                    ref_,
                });
            }
            Keyword::Bit => {
                let bname = sub.arg()?;
                ident::check_identifier(bname)?;
                let mut pos = None;
                let mut dsc = None;
                let mut ref_ = None;
                for bsub in &sub.children {
                    match &bsub.keyword {
                        Keyword::Position => {
                            let parsed =
                                bsub.arg()?.parse::<u32>().map_err(|_| {
                                    Error::new(
                                        ErrorCode::Inval,
                                        format!(
                                            "Invalid bit position \"{}\"",
                                            bsub.arg().unwrap_or("")
                                        ),
                                    )
                                    .with_line(bsub.line)
                                })?;
                            set_once(&mut pos, parsed, bsub)?;
                        }
                        Keyword::Description => {
                            let text = ctx.intern(bsub.arg()?);
                            set_once(&mut dsc, text, bsub)?
                        }
                        Keyword::Reference => {
                            let text = ctx.intern(bsub.arg()?);
                            set_once(&mut ref_, text, bsub)?
                        }
                        Keyword::Status => (),
                        _ => return Err(bad_nesting(bsub, "bit")),
                    }
                }
                let pos_set = pos.is_some();
                let pos = match pos {
                    Some(pos) => pos,
                    None => {
                        if next_bit_pos > u64::from(u32::MAX) {
                            return Err(Error::new(
                                ErrorCode::Oorval,
                                "Bit position overflow",
                            )
                            .with_line(sub.line));
                        }
                        next_bit_pos as u32
                    }
                };
                next_bit_pos = u64::from(pos) + 1;
                let bname = ctx.intern(bname);
                let tdata = ctx.type_data_mut(tid);
                if tdata.bits.iter().any(|b| b.name == bname) {
                    return Err(Error::new(
                        ErrorCode::DupName,
                        format!("Duplicated bit name \"{}\"", bname),
                    )
                    .with_line(sub.line));
                }
                if tdata.bits.iter().any(|b| b.pos == pos) {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        format!("Duplicated bit position {}", pos),
                    )
                    .with_line(sub.line));
                }
                tdata.bits.push(TypeBit {
                    name: bname,
                    pos,
                    pos_set,
                    dsc,
                    ref_,
                });
            }
            Keyword::Type => {
                // Union member type.
                let member =
                    build_type(ctx, session, mid, scope, sub, None)?;
                ctx.type_data_mut(tid).union_types.push(member);
            }
            Keyword::RequireInstance => {
                // Accepted for compatibility; instance checking is
                // driven by the parser options instead.
            }
            Keyword::Unknown(name) => {
                log::warn!("ignoring unknown statement \"{}\"", name)
            }
            _ => return Err(bad_nesting(sub, "type")),
        }
    }

    session.unres.push(UnresItem {
        kind: UnresKind::Type(tid),
        line: stmt.line,
    });
    Ok(tid)
}
