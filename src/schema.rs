//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG schema data.

use bitflags::bitflags;
use num_derive::FromPrimitive;
use regex::Regex;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, ErrorCode, Result};
use crate::iter;
use crate::printer;

/// Index of a module inside the context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct ModuleId(pub u32);

/// Index of a schema node inside the context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct SnodeId(pub u32);

/// Index of a type descriptor inside the context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct TypeId(pub u32);

/// Index of an identity inside the context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct IdentId(pub u32);

/// Index of a feature inside the context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct FeatId(pub u32);

/// Schema input formats accepted by the parsers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchemaInputFormat {
    YANG,
    YIN,
}

/// Schema output formats accepted by the printer.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchemaOutputFormat {
    YIN,
}

/// Schema path format.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchemaPathFormat {
    /// Descriptive path format used in log messages.
    LOG,
    /// Similar to LOG except that schema-only nodes (choice, case,
    /// uses) are skipped.
    DATA,
}

bitflags! {
    /// Schema printer flags.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct SchemaPrinterFlags: u32 {
        /// Flag for output without indentation and formatting new lines.
        const SHRINK = 0x01;
    }
}

bitflags! {
    /// Schema node flags word.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub(crate) struct SnodeFlags: u16 {
        const CONFIG_W = 0x0001;
        const CONFIG_R = 0x0002;
        /// `config` was given explicitly.
        const CONFIG_SET = 0x0004;
        const STATUS_CURR = 0x0008;
        const STATUS_DEPRC = 0x0010;
        const STATUS_OBSLT = 0x0020;
        /// `status` was given explicitly.
        const STATUS_SET = 0x0040;
        const MAND_TRUE = 0x0080;
        /// `mandatory false` was given explicitly.
        const MAND_FALSE = 0x0100;
        const ORDBY_USER = 0x0200;
        /// Leaf is a list key.
        const KEY = 0x0400;
    }
}

/// YANG schema node kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaNodeKind {
    Container,
    Case,
    Choice,
    Leaf,
    LeafList,
    List,
    AnyXml,
    Grouping,
    Uses,
    Augment,
    Rpc,
    Input,
    Output,
    Notification,
}

impl SchemaNodeKind {
    /// Kinds that instantiate data nodes.
    pub(crate) fn is_data(&self) -> bool {
        matches!(
            self,
            SchemaNodeKind::Container
                | SchemaNodeKind::Leaf
                | SchemaNodeKind::LeafList
                | SchemaNodeKind::List
                | SchemaNodeKind::AnyXml
        )
    }
}

/// YANG data value type (resolved base of a type derivation chain).
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
pub enum DataValueType {
    Unknown = 0,
    Binary = 1,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    String = 6,
    Bits = 7,
    Bool = 8,
    Dec64 = 9,
    Empty = 10,
    Enum = 11,
    IdentityRef = 12,
    InstanceId = 13,
    LeafRef = 14,
    Union = 15,
    Int8 = 16,
    Int16 = 17,
    Int32 = 18,
    Int64 = 19,
}

impl DataValueType {
    /// Look up a built-in type by its YANG name.
    pub(crate) fn from_name(name: &str) -> Option<DataValueType> {
        Some(match name {
            "binary" => DataValueType::Binary,
            "bits" => DataValueType::Bits,
            "boolean" => DataValueType::Bool,
            "decimal64" => DataValueType::Dec64,
            "empty" => DataValueType::Empty,
            "enumeration" => DataValueType::Enum,
            "identityref" => DataValueType::IdentityRef,
            "instance-identifier" => DataValueType::InstanceId,
            "leafref" => DataValueType::LeafRef,
            "string" => DataValueType::String,
            "union" => DataValueType::Union,
            "int8" => DataValueType::Int8,
            "int16" => DataValueType::Int16,
            "int32" => DataValueType::Int32,
            "int64" => DataValueType::Int64,
            "uint8" => DataValueType::Uint8,
            "uint16" => DataValueType::Uint16,
            "uint32" => DataValueType::Uint32,
            "uint64" => DataValueType::Uint64,
            _ => return None,
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            DataValueType::Unknown => "unknown",
            DataValueType::Binary => "binary",
            DataValueType::Bits => "bits",
            DataValueType::Bool => "boolean",
            DataValueType::Dec64 => "decimal64",
            DataValueType::Empty => "empty",
            DataValueType::Enum => "enumeration",
            DataValueType::IdentityRef => "identityref",
            DataValueType::InstanceId => "instance-identifier",
            DataValueType::LeafRef => "leafref",
            DataValueType::String => "string",
            DataValueType::Union => "union",
            DataValueType::Int8 => "int8",
            DataValueType::Int16 => "int16",
            DataValueType::Int32 => "int32",
            DataValueType::Int64 => "int64",
            DataValueType::Uint8 => "uint8",
            DataValueType::Uint16 => "uint16",
            DataValueType::Uint32 => "uint32",
            DataValueType::Uint64 => "uint64",
        }
    }
}

/// YANG data value.
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    Empty,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Other(String),
}

// ===== internal schema storage =====

#[derive(Debug)]
pub(crate) struct Revision {
    pub date: Arc<str>,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
}

#[derive(Debug)]
pub(crate) struct Import {
    pub module: ModuleId,
    pub prefix: Arc<str>,
    pub revision: Option<Arc<str>>,
}

#[derive(Debug)]
pub(crate) struct ModuleData {
    pub name: Arc<str>,
    pub ns: Arc<str>,
    pub prefix: Arc<str>,
    pub version: Option<Arc<str>>,
    pub filepath: Option<String>,
    pub org: Option<Arc<str>>,
    pub contact: Option<Arc<str>>,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
    pub implemented: bool,
    pub revisions: Vec<Revision>,
    pub imports: Vec<Import>,
    pub includes: Vec<(Arc<str>, Option<Arc<str>>)>,
    pub typedefs: Vec<TypeId>,
    pub identities: Vec<IdentId>,
    pub features: Vec<FeatId>,
    pub augments: Vec<SnodeId>,
    /// First node of the top-level sibling ring.
    pub data: Option<SnodeId>,
}

impl ModuleData {
    pub(crate) fn latest_revision(&self) -> Option<&Arc<str>> {
        self.revisions.first().map(|rev| &rev.date)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MustStmt {
    pub cond: Arc<str>,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
    pub emsg: Option<Arc<str>>,
    pub eapptag: Option<Arc<str>>,
}

#[derive(Clone, Debug)]
pub(crate) struct WhenStmt {
    pub cond: Arc<str>,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
}

/// Where a schema node came from. Nodes instantiated by `uses`
/// expansion or spliced by an augment are skipped by the printer, which
/// instead prints the originating statement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SnodeOrigin {
    Declared,
    Uses(SnodeId),
    Augment(SnodeId),
}

#[derive(Clone, Debug)]
pub(crate) struct UniqueSpec {
    pub arg: Arc<str>,
    pub nodes: Vec<SnodeId>,
}

/// A `refine` inside `uses`.
#[derive(Clone, Debug, Default)]
pub(crate) struct RefineSpec {
    pub target: String,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
    pub presence: Option<Arc<str>>,
    pub default: Option<Arc<str>>,
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub musts: Vec<MustStmt>,
}

#[derive(Clone, Debug)]
pub(crate) enum SnodePayload {
    Container {
        presence: Option<Arc<str>>,
    },
    Leaf {
        ty: TypeId,
        default: Option<Arc<str>>,
        units: Option<Arc<str>>,
    },
    LeafList {
        ty: TypeId,
        units: Option<Arc<str>>,
        min: u32,
        max: Option<u32>,
    },
    List {
        keys: Vec<SnodeId>,
        keys_str: Option<Arc<str>>,
        uniques: Vec<UniqueSpec>,
        min: u32,
        max: Option<u32>,
    },
    Choice {
        default_name: Option<Arc<str>>,
        default: Option<SnodeId>,
    },
    Case,
    AnyXml,
    Grouping,
    Uses {
        grouping: Arc<str>,
        refines: Vec<RefineSpec>,
        augments: Vec<SnodeId>,
        expanded: bool,
    },
    Augment {
        target: Arc<str>,
        target_node: Option<SnodeId>,
        children: Vec<SnodeId>,
    },
    Rpc,
    Input,
    Output,
    Notification,
}

#[derive(Clone, Debug)]
pub(crate) struct SnodeData {
    pub kind: SchemaNodeKind,
    pub name: Arc<str>,
    pub module: ModuleId,
    pub parent: Option<SnodeId>,
    pub prev: SnodeId,
    pub next: Option<SnodeId>,
    pub child: Option<SnodeId>,
    pub flags: SnodeFlags,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
    pub when: Option<WhenStmt>,
    pub musts: Vec<MustStmt>,
    pub iffeature_names: Vec<Arc<str>>,
    pub iffeatures: Vec<FeatId>,
    pub typedefs: Vec<TypeId>,
    pub origin: SnodeOrigin,
    pub line: u32,
    pub payload: SnodePayload,
}

#[derive(Clone, Debug)]
pub(crate) struct TypeEnum {
    pub name: Arc<str>,
    pub value: i32,
    pub value_set: bool,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
}

#[derive(Clone, Debug)]
pub(crate) struct TypeBit {
    pub name: Arc<str>,
    pub pos: u32,
    pub pos_set: bool,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
}

/// One level of a type derivation chain. Typedefs and their inner
/// `type` statement collapse into a single level; `parent` links toward
/// the built-in the chain terminates at.
#[derive(Debug)]
pub(crate) struct TypeData {
    /// Typedef name, or the written base-type name for inline types.
    pub name: Arc<str>,
    pub is_typedef: bool,
    /// Name of the type this level derives from, possibly prefixed.
    pub base_name: Arc<str>,
    pub module: ModuleId,
    /// Enclosing schema node for scoped typedef lookup.
    pub scope: Option<SnodeId>,
    pub line: u32,

    pub resolved: bool,
    pub base: DataValueType,
    pub parent: Option<TypeId>,

    // Restrictions as written at this level.
    pub range: Option<Arc<str>>,
    pub length: Option<Arc<str>>,
    pub patterns: Vec<Arc<str>>,
    pub frac_digits: Option<u8>,
    pub enums: Vec<TypeEnum>,
    pub bits: Vec<TypeBit>,
    pub path: Option<Arc<str>>,
    pub union_types: Vec<TypeId>,
    pub ident_base_name: Option<Arc<str>>,

    // Resolved restriction state. Range/length lists carry the full
    // intersection down the derivation chain.
    pub compiled_patterns: Vec<Regex>,
    pub resolved_range: Option<Vec<(i128, i128)>>,
    pub resolved_length: Option<Vec<(u64, u64)>>,
    pub leafref_target: Option<SnodeId>,
    pub ident_base: Option<IdentId>,

    // Typedef metadata.
    pub default: Option<Arc<str>>,
    pub units: Option<Arc<str>>,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
}

impl TypeData {
    pub(crate) fn new(
        name: Arc<str>,
        base_name: Arc<str>,
        module: ModuleId,
        line: u32,
    ) -> TypeData {
        TypeData {
            name,
            is_typedef: false,
            base_name,
            module,
            scope: None,
            line,
            resolved: false,
            base: DataValueType::Unknown,
            parent: None,
            range: None,
            length: None,
            patterns: Vec::new(),
            frac_digits: None,
            enums: Vec::new(),
            bits: Vec::new(),
            path: None,
            union_types: Vec::new(),
            ident_base_name: None,
            compiled_patterns: Vec::new(),
            resolved_range: None,
            resolved_length: None,
            leafref_target: None,
            ident_base: None,
            default: None,
            units: None,
            dsc: None,
            ref_: None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct IdentityData {
    pub name: Arc<str>,
    pub module: ModuleId,
    pub base_name: Option<Arc<str>>,
    pub base: Option<IdentId>,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
    pub line: u32,
}

#[derive(Debug)]
pub(crate) struct FeatureData {
    pub name: Arc<str>,
    pub module: ModuleId,
    pub iffeature_names: Vec<Arc<str>>,
    pub iffeatures: Vec<FeatId>,
    /// Explicitly enabled in the context.
    pub explicit: bool,
    /// Effective state: explicit and all if-feature dependencies
    /// enabled.
    pub enabled: bool,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
    pub line: u32,
}

// ===== sibling-ring and tree helpers =====

/// Parent slot of a schema node: a module's top-level ring or another
/// node's child ring.
#[derive(Clone, Copy, Debug)]
pub(crate) enum SchemaParent {
    Module(ModuleId),
    Node(SnodeId),
}

pub(crate) fn first_child(
    ctx: &Context,
    parent: SchemaParent,
) -> Option<SnodeId> {
    match parent {
        SchemaParent::Module(mid) => ctx.module_data(mid).data,
        SchemaParent::Node(sid) => ctx.snode(sid).child,
    }
}

fn set_first_child(ctx: &mut Context, parent: SchemaParent, id: SnodeId) {
    match parent {
        SchemaParent::Module(mid) => ctx.module_data_mut(mid).data = Some(id),
        SchemaParent::Node(sid) => ctx.snode_mut(sid).child = Some(id),
    }
}

fn kind_allowed_under(
    child: SchemaNodeKind,
    parent: Option<SchemaNodeKind>,
) -> bool {
    use SchemaNodeKind::*;
    match parent {
        None => !matches!(child, Case | Input | Output),
        Some(parent) => match parent {
            Container | List | Grouping | Case | Input | Output
            | Notification => match child {
                Container | Leaf | LeafList | List | Choice | AnyXml
                | Uses | Grouping => true,
                Rpc | Notification => parent == Grouping,
                _ => false,
            },
            Choice => matches!(
                child,
                Case | Container | Leaf | LeafList | List | AnyXml
            ),
            Uses => {
                // Children appear under `uses` only through grouping
                // expansion or uses-level augments.
                matches!(
                    child,
                    Container | Leaf | LeafList | List | Choice | AnyXml
                        | Uses | Augment
                )
            }
            Augment => matches!(
                child,
                Container | Leaf | LeafList | List | Choice | Case
                    | AnyXml | Uses
            ),
            Rpc => matches!(child, Input | Output | Grouping),
            _ => false,
        },
    }
}

/// Iterate the sibling ring starting at `first`, descending
/// transparently into `choice`, `case` and `uses` nodes, yielding the
/// nodes that occupy the data namespace of the parent (data kinds plus
/// `rpc`/`notification` at module top level).
pub(crate) fn effective_children(
    ctx: &Context,
    first: Option<SnodeId>,
    out: &mut Vec<SnodeId>,
) {
    let mut next = first;
    while let Some(id) = next {
        let snode = ctx.snode(id);
        match snode.kind {
            SchemaNodeKind::Choice
            | SchemaNodeKind::Case
            | SchemaNodeKind::Uses => {
                effective_children(ctx, snode.child, out);
            }
            kind if kind.is_data() => out.push(id),
            SchemaNodeKind::Rpc | SchemaNodeKind::Notification => {
                out.push(id)
            }
            _ => (),
        }
        next = snode.next;
    }
}

/// Attach `id` at the end of `parent`'s child ring, enforcing the
/// nesting rules and the effective-tree duplicate-name invariant.
pub(crate) fn snode_link(
    ctx: &mut Context,
    parent: SchemaParent,
    id: SnodeId,
) -> Result<()> {
    let kind = ctx.snode(id).kind;
    let parent_kind = match parent {
        SchemaParent::Module(_) => None,
        SchemaParent::Node(pid) => Some(ctx.snode(pid).kind),
    };
    if !kind_allowed_under(kind, parent_kind) {
        let snode = ctx.snode(id);
        return Err(Error::new(
            ErrorCode::BadNesting,
            format!(
                "Statement \"{}\" cannot appear under \"{}\"",
                snode.name,
                parent_kind
                    .map(|kind| format!("{:?}", kind))
                    .unwrap_or_else(|| "module".to_string()),
            ),
        )
        .with_line(snode.line));
    }

    // Duplicate-name check within the effective data tree of the
    // nearest data-tree parent.
    if kind.is_data()
        || matches!(
            kind,
            SchemaNodeKind::Rpc | SchemaNodeKind::Notification
        )
    {
        let dup_scope = effective_scope(ctx, parent);
        let mut existing = Vec::new();
        effective_children(ctx, first_child(ctx, dup_scope), &mut existing);
        let snode = ctx.snode(id);
        for other in existing {
            let odata = ctx.snode(other);
            if odata.name == snode.name && odata.module == snode.module {
                return Err(Error::new(
                    ErrorCode::DupName,
                    format!("Duplicated node name \"{}\"", snode.name),
                )
                .with_line(snode.line));
            }
        }
    }

    // Splice at the tail: the head's `prev` is the tail.
    match first_child(ctx, parent) {
        None => {
            set_first_child(ctx, parent, id);
            let snode = ctx.snode_mut(id);
            snode.prev = id;
            snode.next = None;
        }
        Some(head) => {
            let tail = ctx.snode(head).prev;
            ctx.snode_mut(tail).next = Some(id);
            {
                let snode = ctx.snode_mut(id);
                snode.prev = tail;
                snode.next = None;
            }
            ctx.snode_mut(head).prev = id;
        }
    }
    ctx.snode_mut(id).parent = match parent {
        SchemaParent::Module(_) => None,
        SchemaParent::Node(pid) => Some(pid),
    };
    Ok(())
}

/// Walk up from `parent` to the ring against which duplicate names are
/// checked: the nearest ancestor that is not a choice/case/uses.
fn effective_scope(ctx: &Context, parent: SchemaParent) -> SchemaParent {
    let mut parent = parent;
    loop {
        match parent {
            SchemaParent::Module(_) => return parent,
            SchemaParent::Node(pid) => {
                let snode = ctx.snode(pid);
                match snode.kind {
                    SchemaNodeKind::Choice
                    | SchemaNodeKind::Case
                    | SchemaNodeKind::Uses => {
                        parent = match snode.parent {
                            Some(gp) => SchemaParent::Node(gp),
                            None => SchemaParent::Module(snode.module),
                        };
                    }
                    _ => return parent,
                }
            }
        }
    }
}

/// Resolve the effective `config` state of a node: nearest explicit
/// `config` statement wins, RPC/notification subtrees are neither, the
/// default is `config true`.
pub(crate) fn snode_is_config(ctx: &Context, id: SnodeId) -> bool {
    let mut cursor = Some(id);
    while let Some(id) = cursor {
        let snode = ctx.snode(id);
        match snode.kind {
            SchemaNodeKind::Rpc
            | SchemaNodeKind::Input
            | SchemaNodeKind::Output
            | SchemaNodeKind::Notification => return false,
            _ => (),
        }
        if snode.flags.contains(SnodeFlags::CONFIG_SET) {
            return snode.flags.contains(SnodeFlags::CONFIG_W);
        }
        cursor = snode.parent;
    }
    true
}

/// Whether all if-feature references on the node are enabled.
pub(crate) fn snode_is_enabled(ctx: &Context, id: SnodeId) -> bool {
    ctx.snode(id)
        .iffeatures
        .iter()
        .all(|&feat| ctx.feature_data(feat).enabled)
}

/// The `case` a node belongs to when its ancestry crosses a `choice`:
/// returns `(choice, top-node-under-choice)`. The top node doubles as
/// the case for the choice-shorthand form.
pub(crate) fn snode_case_of(
    ctx: &Context,
    id: SnodeId,
) -> Option<(SnodeId, SnodeId)> {
    let mut cursor = id;
    while let Some(parent) = ctx.snode(cursor).parent {
        if ctx.snode(parent).kind == SchemaNodeKind::Choice {
            return Some((parent, cursor));
        }
        cursor = parent;
    }
    None
}

/// The type of a leaf or leaf-list node.
pub(crate) fn snode_type(ctx: &Context, id: SnodeId) -> Option<TypeId> {
    match &ctx.snode(id).payload {
        SnodePayload::Leaf { ty, .. } => Some(*ty),
        SnodePayload::LeafList { ty, .. } => Some(*ty),
        _ => None,
    }
}

/// Generate the path of a schema node. Module prefixes appear on the
/// first node and wherever the module changes.
pub(crate) fn snode_path(
    ctx: &Context,
    id: SnodeId,
    format: SchemaPathFormat,
) -> String {
    let mut parts = Vec::new();
    let mut cursor = Some(id);
    while let Some(id) = cursor {
        let snode = ctx.snode(id);
        let skip = match format {
            SchemaPathFormat::LOG => false,
            SchemaPathFormat::DATA => matches!(
                snode.kind,
                SchemaNodeKind::Choice
                    | SchemaNodeKind::Case
                    | SchemaNodeKind::Uses
            ),
        };
        if !skip {
            parts.push(id);
        }
        cursor = snode.parent;
    }
    parts.reverse();

    let mut path = String::new();
    let mut prev_module = None;
    for id in parts {
        let snode = ctx.snode(id);
        path.push('/');
        if prev_module != Some(snode.module) {
            path.push_str(&ctx.module_data(snode.module).name);
            path.push(':');
            prev_module = Some(snode.module);
        }
        path.push_str(&snode.name);
    }
    path
}

// ===== public wrappers =====

/// Available YANG schema tree structures representing a YANG module.
#[derive(Clone, Debug)]
pub struct SchemaModule<'a> {
    context: &'a Context,
    pub(crate) id: ModuleId,
}

/// Generic YANG schema node.
#[derive(Clone, Debug)]
pub struct SchemaNode<'a> {
    context: &'a Context,
    pub(crate) id: SnodeId,
    kind: SchemaNodeKind,
}

/// YANG must substatement.
#[derive(Clone, Debug)]
pub struct SchemaStmtMust<'a> {
    stmt: &'a MustStmt,
}

/// YANG when substatement.
#[derive(Clone, Debug)]
pub struct SchemaStmtWhen<'a> {
    stmt: &'a WhenStmt,
}

/// YANG leaf(-list) type.
#[derive(Clone, Debug)]
pub struct SchemaLeafType<'a> {
    context: &'a Context,
    pub(crate) id: TypeId,
}

// ===== impl SchemaModule =====

impl<'a> SchemaModule<'a> {
    pub(crate) fn new(context: &'a Context, id: ModuleId) -> SchemaModule<'a> {
        SchemaModule { context, id }
    }

    fn data_ref(&self) -> &'a ModuleData {
        self.context.module_data(self.id)
    }

    /// Name of the module.
    pub fn name(&self) -> &'a str {
        &self.data_ref().name
    }

    /// Latest revision of the module.
    pub fn revision(&self) -> Option<&'a str> {
        self.data_ref().latest_revision().map(|rev| rev.as_ref())
    }

    /// All revisions of the module, newest first.
    pub fn revisions(&self) -> impl Iterator<Item = &'a str> {
        self.data_ref().revisions.iter().map(|rev| rev.date.as_ref())
    }

    /// Namespace of the module.
    pub fn namespace(&self) -> &'a str {
        &self.data_ref().ns
    }

    /// Prefix of the module.
    pub fn prefix(&self) -> &'a str {
        &self.data_ref().prefix
    }

    /// File path, if the schema was read from a file.
    pub fn filepath(&self) -> Option<&'a str> {
        self.data_ref().filepath.as_deref()
    }

    /// Party/company responsible for the module.
    pub fn organization(&self) -> Option<&'a str> {
        self.data_ref().org.as_deref()
    }

    /// Contact information for the module.
    pub fn contact(&self) -> Option<&'a str> {
        self.data_ref().contact.as_deref()
    }

    /// Description of the module.
    pub fn description(&self) -> Option<&'a str> {
        self.data_ref().dsc.as_deref()
    }

    /// Cross-reference for the module.
    pub fn reference(&self) -> Option<&'a str> {
        self.data_ref().ref_.as_deref()
    }

    /// Return true if the module is implemented, not just imported.
    pub fn is_implemented(&self) -> bool {
        self.data_ref().implemented
    }

    /// Names of the submodules included by this module.
    pub fn submodule_names(&self) -> impl Iterator<Item = &'a str> {
        self.data_ref()
            .includes
            .iter()
            .map(|(name, _)| name.as_ref())
    }

    /// Get the current real status of the specified feature in the
    /// module.
    pub fn feature_value(&self, feature: &str) -> Result<bool> {
        let mdata = self.data_ref();
        for &feat in &mdata.features {
            let fdata = self.context.feature_data(feat);
            if fdata.name.as_ref() == feature {
                return Ok(fdata.enabled);
            }
        }
        Err(Error::new(
            ErrorCode::Inval,
            format!(
                "Feature \"{}\" not defined in module \"{}\"",
                feature, mdata.name
            ),
        ))
    }

    /// Print schema tree in the specified format into a string.
    pub fn print_string(
        &self,
        format: SchemaOutputFormat,
        options: SchemaPrinterFlags,
    ) -> Result<String> {
        match format {
            SchemaOutputFormat::YIN => {
                printer::print_module_yin(self.context, self.id, options)
            }
        }
    }

    /// Returns an iterator over the top-level data nodes.
    pub fn data(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        iter::siblings(context, self.data_ref().data)
            .map(move |id| SchemaNode::new(context, id))
            .filter(|snode| {
                !matches!(
                    snode.kind(),
                    SchemaNodeKind::Rpc
                        | SchemaNodeKind::Notification
                        | SchemaNodeKind::Grouping
                        | SchemaNodeKind::Augment
                )
            })
    }

    /// Returns an iterator over the list of RPCs.
    pub fn rpcs(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        iter::siblings(context, self.data_ref().data)
            .map(move |id| SchemaNode::new(context, id))
            .filter(|snode| snode.kind() == SchemaNodeKind::Rpc)
    }

    /// Returns an iterator over the list of notifications.
    pub fn notifications(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        iter::siblings(context, self.data_ref().data)
            .map(move |id| SchemaNode::new(context, id))
            .filter(|snode| snode.kind() == SchemaNodeKind::Notification)
    }

    /// Returns an iterator over all nodes in the schema module
    /// (depth-first search algorithm).
    ///
    /// NOTE: augmentations from other modules are also iterated over.
    pub fn traverse(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let data = self.data().flat_map(|snode| snode.traverse());
        let rpcs = self.rpcs().flat_map(|snode| snode.traverse());
        let notifications =
            self.notifications().flat_map(|snode| snode.traverse());
        data.chain(rpcs).chain(notifications)
    }
}

impl<'a> PartialEq for SchemaModule<'a> {
    fn eq(&self, other: &SchemaModule<'_>) -> bool {
        self.id == other.id
    }
}

// ===== impl SchemaNode =====

impl<'a> SchemaNode<'a> {
    pub(crate) fn new(context: &'a Context, id: SnodeId) -> SchemaNode<'a> {
        let kind = context.snode(id).kind;
        SchemaNode { context, id, kind }
    }

    fn data_ref(&self) -> &'a SnodeData {
        self.context.snode(self.id)
    }

    /// Schema node module (module of origin; differs from the parent's
    /// module for augmented nodes).
    pub fn module(&self) -> SchemaModule<'a> {
        SchemaModule::new(self.context, self.data_ref().module)
    }

    /// Returns the kind of the schema node.
    pub fn kind(&self) -> SchemaNodeKind {
        self.kind
    }

    /// Schema node name.
    pub fn name(&self) -> &'a str {
        &self.data_ref().name
    }

    /// Description statement.
    pub fn description(&self) -> Option<&'a str> {
        self.data_ref().dsc.as_deref()
    }

    /// Reference statement.
    pub fn reference(&self) -> Option<&'a str> {
        self.data_ref().ref_.as_deref()
    }

    /// Generate path of the node.
    pub fn path(&self, format: SchemaPathFormat) -> String {
        snode_path(self.context, self.id, format)
    }

    /// Returns whether the node is a configuration node.
    pub fn is_config(&self) -> bool {
        self.kind.is_data() && snode_is_config(self.context, self.id)
    }

    /// Returns whether the node is a state node.
    pub fn is_state(&self) -> bool {
        self.kind.is_data() && !snode_is_config(self.context, self.id)
    }

    /// Returns whether the node's status is "current".
    pub fn is_status_current(&self) -> bool {
        !self
            .data_ref()
            .flags
            .intersects(SnodeFlags::STATUS_DEPRC | SnodeFlags::STATUS_OBSLT)
    }

    /// Returns whether the node's status is "deprecated".
    pub fn is_status_deprecated(&self) -> bool {
        self.data_ref().flags.contains(SnodeFlags::STATUS_DEPRC)
    }

    /// Returns whether the node's status is "obsolete".
    pub fn is_status_obsolete(&self) -> bool {
        self.data_ref().flags.contains(SnodeFlags::STATUS_OBSLT)
    }

    /// Returns whether the node is mandatory.
    pub fn is_mandatory(&self) -> bool {
        self.data_ref().flags.contains(SnodeFlags::MAND_TRUE)
    }

    /// Returns whether the node is a non-presence container.
    pub fn is_np_container(&self) -> bool {
        matches!(
            &self.data_ref().payload,
            SnodePayload::Container { presence: None }
        )
    }

    /// The presence statement of the container.
    pub fn presence(&self) -> Option<&'a str> {
        match &self.data_ref().payload {
            SnodePayload::Container { presence } => presence.as_deref(),
            _ => None,
        }
    }

    /// Returns whether the node is a list's key.
    pub fn is_list_key(&self) -> bool {
        self.data_ref().flags.contains(SnodeFlags::KEY)
    }

    /// Returns whether the node is a keyless list.
    pub fn is_keyless_list(&self) -> bool {
        match &self.data_ref().payload {
            SnodePayload::List { keys, .. } => keys.is_empty(),
            _ => false,
        }
    }

    /// Returns whether the node is an user-ordered list or leaf-list.
    pub fn is_user_ordered(&self) -> bool {
        self.data_ref().flags.contains(SnodeFlags::ORDBY_USER)
    }

    /// Returns whether the node appears only in the schema tree and not
    /// in the data tree.
    pub fn is_schema_only(&self) -> bool {
        matches!(
            self.kind,
            SchemaNodeKind::Choice
                | SchemaNodeKind::Case
                | SchemaNodeKind::Uses
                | SchemaNodeKind::Grouping
                | SchemaNodeKind::Augment
        )
    }

    /// Returns whether the node is enabled given the current feature
    /// state of the context.
    pub fn is_enabled(&self) -> bool {
        snode_is_enabled(self.context, self.id)
    }

    /// Returns whether a default value is set.
    pub fn has_default(&self) -> bool {
        self.default_value_canonical().is_some()
    }

    /// The default value of the leaf. Falls back to the default of the
    /// typedef chain when the leaf itself has none.
    pub fn default_value_canonical(&self) -> Option<&'a str> {
        match &self.data_ref().payload {
            SnodePayload::Leaf { default, ty, .. } => match default {
                Some(default) => Some(default.as_ref()),
                None => {
                    // Inherit from the typedef chain.
                    let mut cursor = Some(*ty);
                    while let Some(tid) = cursor {
                        let tdata = self.context.type_data(tid);
                        if let Some(default) = &tdata.default {
                            return Some(default.as_ref());
                        }
                        cursor = tdata.parent;
                    }
                    None
                }
            },
            _ => None,
        }
    }

    /// The default case of the choice.
    pub fn default_case(&self) -> Option<SchemaNode<'a>> {
        match &self.data_ref().payload {
            SnodePayload::Choice { default, .. } => {
                default.map(|id| SchemaNode::new(self.context, id))
            }
            _ => None,
        }
    }

    /// Type of the leaf(-list) node.
    pub fn leaf_type(&self) -> Option<SchemaLeafType<'a>> {
        snode_type(self.context, self.id)
            .map(|ty| SchemaLeafType { context: self.context, id: ty })
    }

    /// Units of the leaf(-list)'s type. Falls back to the units of the
    /// typedef chain.
    pub fn units(&self) -> Option<&'a str> {
        let (units, ty) = match &self.data_ref().payload {
            SnodePayload::Leaf { units, ty, .. } => (units, *ty),
            SnodePayload::LeafList { units, ty, .. } => (units, *ty),
            _ => return None,
        };
        if let Some(units) = units {
            return Some(units.as_ref());
        }
        let mut cursor = Some(ty);
        while let Some(tid) = cursor {
            let tdata = self.context.type_data(tid);
            if let Some(units) = &tdata.units {
                return Some(units.as_ref());
            }
            cursor = tdata.parent;
        }
        None
    }

    /// The min-elements constraint.
    pub fn min_elements(&self) -> Option<u32> {
        let min = match &self.data_ref().payload {
            SnodePayload::LeafList { min, .. } => *min,
            SnodePayload::List { min, .. } => *min,
            _ => return None,
        };
        if min != 0 {
            Some(min)
        } else {
            None
        }
    }

    /// The max-elements constraint.
    pub fn max_elements(&self) -> Option<u32> {
        match &self.data_ref().payload {
            SnodePayload::LeafList { max, .. } => *max,
            SnodePayload::List { max, .. } => *max,
            _ => None,
        }
    }

    /// List of must restrictions.
    pub fn musts(&self) -> impl Iterator<Item = SchemaStmtMust<'a>> {
        self.data_ref()
            .musts
            .iter()
            .map(|stmt| SchemaStmtMust { stmt })
    }

    /// The when statement, if any.
    pub fn when(&self) -> Option<SchemaStmtWhen<'a>> {
        self.data_ref()
            .when
            .as_ref()
            .map(|stmt| SchemaStmtWhen { stmt })
    }

    /// Returns the parent schema node.
    pub fn parent(&self) -> Option<SchemaNode<'a>> {
        self.data_ref()
            .parent
            .map(|id| SchemaNode::new(self.context, id))
    }

    /// Returns the next sibling schema node.
    pub fn next_sibling(&self) -> Option<SchemaNode<'a>> {
        self.data_ref()
            .next
            .map(|id| SchemaNode::new(self.context, id))
    }

    /// Returns the first child schema node.
    pub fn first_child(&self) -> Option<SchemaNode<'a>> {
        self.data_ref()
            .child
            .map(|id| SchemaNode::new(self.context, id))
    }

    /// Returns an iterator over the ancestor schema nodes.
    pub fn ancestors(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        iter::ancestors(context, context.snode(self.id).parent)
            .map(move |id| SchemaNode::new(context, id))
    }

    /// Returns an iterator over this schema node and its ancestors.
    pub fn inclusive_ancestors(
        &self,
    ) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        iter::ancestors(context, Some(self.id))
            .map(move |id| SchemaNode::new(context, id))
    }

    /// Returns an iterator over the sibling schema nodes.
    pub fn siblings(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        iter::siblings(context, context.snode(self.id).next)
            .map(move |id| SchemaNode::new(context, id))
    }

    /// Returns an iterator over this schema node and its siblings.
    pub fn inclusive_siblings(
        &self,
    ) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        iter::siblings(context, Some(self.id))
            .map(move |id| SchemaNode::new(context, id))
    }

    /// Returns an iterator over the child schema nodes.
    pub fn children(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        iter::siblings(context, context.snode(self.id).child)
            .map(move |id| SchemaNode::new(context, id))
    }

    /// Returns an iterator over all elements in the schema tree
    /// (depth-first search algorithm).
    pub fn traverse(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        iter::traverse(context, self.id)
            .map(move |id| SchemaNode::new(context, id))
    }

    /// Returns an iterator over the keys of the list.
    pub fn list_keys(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        let keys = match &self.data_ref().payload {
            SnodePayload::List { keys, .. } => keys.clone(),
            _ => Vec::new(),
        };
        keys.into_iter().map(move |id| SchemaNode::new(context, id))
    }

    /// Returns an iterator over the unique-set arguments of the list.
    pub fn list_uniques(&self) -> impl Iterator<Item = &'a str> {
        let uniques = match &self.data_ref().payload {
            SnodePayload::List { uniques, .. } => uniques.as_slice(),
            _ => &[],
        };
        uniques.iter().map(|unique| unique.arg.as_ref())
    }
}

impl<'a> PartialEq for SchemaNode<'a> {
    fn eq(&self, other: &SchemaNode<'_>) -> bool {
        self.id == other.id
    }
}

// ===== impl SchemaStmtMust =====

impl<'a> SchemaStmtMust<'a> {
    /// The XPath condition (syntax-checked only).
    pub fn condition(&self) -> &'a str {
        &self.stmt.cond
    }

    /// description substatement.
    pub fn description(&self) -> Option<&'a str> {
        self.stmt.dsc.as_deref()
    }

    /// reference substatement.
    pub fn reference(&self) -> Option<&'a str> {
        self.stmt.ref_.as_deref()
    }

    /// error-message substatement.
    pub fn error_msg(&self) -> Option<&'a str> {
        self.stmt.emsg.as_deref()
    }

    /// error-app-tag substatement.
    pub fn error_apptag(&self) -> Option<&'a str> {
        self.stmt.eapptag.as_deref()
    }
}

// ===== impl SchemaStmtWhen =====

impl<'a> SchemaStmtWhen<'a> {
    /// The XPath condition (syntax-checked only).
    pub fn condition(&self) -> &'a str {
        &self.stmt.cond
    }

    /// description substatement.
    pub fn description(&self) -> Option<&'a str> {
        self.stmt.dsc.as_deref()
    }

    /// reference substatement.
    pub fn reference(&self) -> Option<&'a str> {
        self.stmt.ref_.as_deref()
    }
}

// ===== impl SchemaLeafType =====

impl<'a> SchemaLeafType<'a> {
    fn data_ref(&self) -> &'a TypeData {
        self.context.type_data(self.id)
    }

    /// Returns the resolved base type.
    pub fn base_type(&self) -> DataValueType {
        self.data_ref().base
    }

    /// Returns the typedef name if it exists.
    pub fn typedef_name(&self) -> Option<String> {
        let mut cursor = Some(self.id);
        while let Some(tid) = cursor {
            let tdata = self.context.type_data(tid);
            if tdata.is_typedef {
                return Some(tdata.name.to_string());
            }
            cursor = tdata.parent;
        }
        None
    }

    /// Returns the real type of the leafref, corresponding to the first
    /// non-leafref in a possible chain of leafrefs.
    pub fn leafref_real_type(&self) -> Option<SchemaLeafType<'a>> {
        if self.base_type() != DataValueType::LeafRef {
            return None;
        }
        let target = crate::resolver::leafref_chain_target(
            self.context,
            self.id,
        )?;
        Some(SchemaLeafType { context: self.context, id: target })
    }

    /// Returns the member types of a union, in declared order.
    pub fn union_types(&self) -> impl Iterator<Item = SchemaLeafType<'a>> {
        let context = self.context;
        self.data_ref()
            .union_types
            .iter()
            .map(move |&id| SchemaLeafType { context, id })
            .collect::<Vec<_>>()
            .into_iter()
    }
}
