//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG instance data.

use bitflags::bitflags;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::sync::Arc;

use crate::context::Context;
use crate::dict::Dict;
use crate::error::{Error, ErrorCode, Result};
use crate::ident::{self, InstidPred};
use crate::iter;
use crate::printer;
use crate::schema::{
    snode_is_config, snode_is_enabled, DataValue, DataValueType, SchemaNode,
    SchemaNodeKind, SnodeId,
};
use crate::validation;
use crate::value;

/// The NETCONF base namespace.
pub static NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// The YANG metadata namespace carrying `insert`/`value`/`key`
/// attributes of user-ordered nodes.
pub static YANG_NS: &str = "urn:ietf:params:xml:ns:yang:1";

/// Data input/output formats.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DataFormat {
    /// XML instance data format.
    XML,
}

bitflags! {
    /// Data parser options.
    ///
    /// Default parser behavior:
    /// - the complete input document is parsed; elements without a
    ///   matching schema node definition in an unknown namespace are
    ///   silently ignored.
    /// - list instances are checked to have all their keys.
    /// - leaf values are decoded and checked against their types.
    /// - structural validation (cardinality, uniqueness, choice
    ///   exclusivity, mandatory presence) runs during and after the
    ///   parse.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct DataParserFlags: u32 {
        /// Instead of silently ignoring data without schema definition
        /// raise an error.
        const STRICT = 0x01;
        /// Edit-config semantics: forbid state data, accept partial
        /// trees (mandatory presence is not enforced) and keep
        /// leafref/instance-identifier values unresolved.
        const EDIT = 0x02;
        /// NETCONF filter semantics: no mandatory or cardinality
        /// enforcement, duplicated nodes merge instead of failing.
        const FILTER = 0x04;
        /// The input buffer may be consumed during parsing. Accepted
        /// for API compatibility; with owned Rust buffers it has no
        /// observable effect.
        const DESTRUCT = 0x08;
    }
}

bitflags! {
    /// Data validation options.
    ///
    /// Various options to change data validation behaviour, both for
    /// the parser and separate validation.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct DataValidationFlags: u32 {
        /// Consider state data not allowed and raise an error if they
        /// are found.
        const NO_STATE = 0x01;
    }
}

bitflags! {
    /// Data printer flags.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct DataPrinterFlags: u32 {
        /// Flag for printing also the (following) sibling nodes of the
        /// data node.
        const WITH_SIBLINGS = 0x01;
        /// Flag for output without indentation and formatting new
        /// lines.
        const SHRINK = 0x02;
    }
}

/// Index of a data node inside its tree.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DnodeId(pub(crate) u32);

#[derive(Debug)]
pub(crate) struct AttrData {
    pub name: Arc<str>,
    pub value: Arc<str>,
}

#[derive(Debug)]
pub(crate) struct DnodeData {
    pub schema: SnodeId,
    pub parent: Option<DnodeId>,
    pub prev: DnodeId,
    pub next: Option<DnodeId>,
    pub child: Option<DnodeId>,
    /// Secondary ring linking instances of the same schema node under
    /// one parent (lists and leaf-lists), for O(1) peer location.
    pub inst_prev: Option<DnodeId>,
    pub inst_next: Option<DnodeId>,
    pub value_str: Option<Arc<str>>,
    pub value: Option<DataValue>,
    pub attrs: Vec<AttrData>,
    /// Verbatim XML subtree of an anyxml node.
    pub anyxml: Option<String>,
    /// Leafref/instance-identifier left unresolved (EDIT/FILTER).
    pub unresolved: bool,
    pub line: u32,
}

/// YANG data tree.
#[derive(Debug)]
pub struct DataTree<'a> {
    pub(crate) context: &'a Context,
    pub(crate) nodes: Vec<DnodeData>,
    pub(crate) first: Option<DnodeId>,
    pub(crate) dict: Dict,
    pub(crate) flags: DataParserFlags,
}

/// YANG data node reference.
#[derive(Clone, Debug)]
pub struct DataNodeRef<'a> {
    pub(crate) tree: &'a DataTree<'a>,
    pub(crate) id: DnodeId,
}

/// An attribute attached to a data node. In XML these are regular
/// attributes (NETCONF operation attributes, user-ordered insert
/// hints); the insert hints themselves are consumed by the parser and
/// the rest is preserved here.
#[derive(Clone, Debug)]
pub struct Metadata<'a> {
    tree: &'a DataTree<'a>,
    node: DnodeId,
    index: usize,
}

/// Methods common to data trees and data node references.
pub trait Data<'a> {
    #[doc(hidden)]
    fn tree(&'a self) -> &'a DataTree<'a>;

    #[doc(hidden)]
    fn print_first(&self) -> Option<DnodeId>;

    #[doc(hidden)]
    fn print_with_siblings(&self, options: DataPrinterFlags) -> bool;

    /// Search in the given data for a single node matching the
    /// provided path.
    ///
    /// The expected format of the expression is JSON, meaning the
    /// first node in every path must have its module name as prefix.
    fn find_path(&'a self, path: &str) -> Result<DataNodeRef<'a>> {
        let tree = self.tree();
        let steps = ident::parse_instance_identifier(path)?;
        let id = locate_instance(tree, &steps, &|name| {
            tree.context.module_latest(name).map(|mid| {
                tree.context.module_data(mid).name.clone()
            })
        })?
        .ok_or_else(|| {
            Error::new(
                ErrorCode::Inelem,
                format!("No data node found at \"{}\"", path),
            )
        })?;
        Ok(DataNodeRef { tree, id })
    }

    /// Print data tree in the specified format to a `String`.
    fn print_string(
        &'a self,
        format: DataFormat,
        options: DataPrinterFlags,
    ) -> Result<String> {
        match format {
            DataFormat::XML => printer::print_data_xml(
                self.tree(),
                self.print_first(),
                self.print_with_siblings(options),
                options,
            ),
        }
    }
}

// ===== impl DataTree =====

impl<'a> DataTree<'a> {
    /// Create new empty data tree.
    pub fn new(context: &'a Context) -> DataTree<'a> {
        DataTree {
            context,
            nodes: Vec::new(),
            first: None,
            dict: Dict::default(),
            flags: DataParserFlags::empty(),
        }
    }

    /// Parse (and validate) input data as a YANG data tree.
    pub fn parse_string(
        context: &'a Context,
        data: &str,
        format: DataFormat,
        parser_options: DataParserFlags,
        validation_options: DataValidationFlags,
    ) -> Result<DataTree<'a>> {
        let mut tree = DataTree::new(context);
        tree.flags = parser_options;
        match format {
            DataFormat::XML => {
                let mut parser = XmlDataParser {
                    tree: &mut tree,
                    options: parser_options,
                    ns_bindings: Vec::new(),
                    unres: Vec::new(),
                };
                parser.parse(data)?;
            }
        }
        if !parser_options
            .intersects(DataParserFlags::EDIT | DataParserFlags::FILTER)
        {
            validation::validate_tree(&tree, validation_options)?;
        } else if parser_options.contains(DataParserFlags::EDIT)
            || validation_options.contains(DataValidationFlags::NO_STATE)
        {
            validation::check_no_state(&tree)?;
        }
        Ok(tree)
    }

    /// Fully validate the data tree.
    pub fn validate(
        &mut self,
        options: DataValidationFlags,
    ) -> Result<()> {
        if !self
            .flags
            .intersects(DataParserFlags::EDIT | DataParserFlags::FILTER)
        {
            validation::validate_tree(self, options)?;
        } else if options.contains(DataValidationFlags::NO_STATE) {
            validation::check_no_state(self)?;
        }
        Ok(())
    }

    /// Returns an iterator over all elements in the data tree and its
    /// siblings (depth-first search algorithm).
    pub fn traverse(&self) -> impl Iterator<Item = DataNodeRef<'_>> {
        let tree: &DataTree<'_> = self;
        iter::siblings(tree, tree.first)
            .flat_map(move |root| iter::traverse(tree, root))
            .map(move |id| DataNodeRef { tree, id })
    }

    pub(crate) fn dnode(&self, id: DnodeId) -> &DnodeData {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn dnode_mut(&mut self, id: DnodeId) -> &mut DnodeData {
        &mut self.nodes[id.0 as usize]
    }

    pub(crate) fn alloc(&mut self, data: DnodeData) -> DnodeId {
        let id = DnodeId(self.nodes.len() as u32);
        self.nodes.push(data);
        self.dnode_mut(id).prev = id;
        id
    }

    pub(crate) fn first_child_of(
        &self,
        parent: Option<DnodeId>,
    ) -> Option<DnodeId> {
        match parent {
            Some(parent) => self.dnode(parent).child,
            None => self.first,
        }
    }

    fn set_first_child_of(
        &mut self,
        parent: Option<DnodeId>,
        id: Option<DnodeId>,
    ) {
        match parent {
            Some(parent) => self.dnode_mut(parent).child = id,
            None => self.first = id,
        }
    }

    /// Append a node at the tail of its parent's sibling ring and into
    /// the same-schema instance ring.
    pub(crate) fn link_child(
        &mut self,
        parent: Option<DnodeId>,
        id: DnodeId,
    ) {
        match self.first_child_of(parent) {
            None => {
                self.set_first_child_of(parent, Some(id));
                self.dnode_mut(id).prev = id;
                self.dnode_mut(id).next = None;
            }
            Some(head) => {
                let tail = self.dnode(head).prev;
                self.dnode_mut(tail).next = Some(id);
                self.dnode_mut(id).prev = tail;
                self.dnode_mut(id).next = None;
                self.dnode_mut(head).prev = id;
            }
        }
        self.dnode_mut(id).parent = parent;
        self.link_instance(parent, id);
    }

    fn link_instance(&mut self, parent: Option<DnodeId>, id: DnodeId) {
        let schema = self.dnode(id).schema;
        let mut last = None;
        let mut next = self.first_child_of(parent);
        while let Some(sibling) = next {
            if sibling != id && self.dnode(sibling).schema == schema {
                last = Some(sibling);
            }
            next = self.dnode(sibling).next;
        }
        if let Some(last) = last {
            let tail_next = self.dnode(last).inst_next;
            self.dnode_mut(id).inst_prev = Some(last);
            self.dnode_mut(id).inst_next = tail_next;
            self.dnode_mut(last).inst_next = Some(id);
            if let Some(tail_next) = tail_next {
                self.dnode_mut(tail_next).inst_prev = Some(id);
            }
        }
    }

    /// Remove a node from its sibling and instance rings. The arena
    /// slot stays allocated but unreachable.
    pub(crate) fn unlink(&mut self, id: DnodeId) {
        let parent = self.dnode(id).parent;
        let head = self.first_child_of(parent);
        let prev = self.dnode(id).prev;
        let next = self.dnode(id).next;

        if head == Some(id) {
            match next {
                Some(next_id) => {
                    self.dnode_mut(next_id).prev = prev;
                    self.set_first_child_of(parent, Some(next_id));
                }
                None => self.set_first_child_of(parent, None),
            }
        } else {
            self.dnode_mut(prev).next = next;
            match next {
                Some(next_id) => self.dnode_mut(next_id).prev = prev,
                None => {
                    // Removing the tail updates the head's back link.
                    if let Some(head) = self.first_child_of(parent) {
                        self.dnode_mut(head).prev = prev;
                    }
                }
            }
        }

        let inst_prev = self.dnode(id).inst_prev;
        let inst_next = self.dnode(id).inst_next;
        if let Some(inst_prev) = inst_prev {
            self.dnode_mut(inst_prev).inst_next = inst_next;
        }
        if let Some(inst_next) = inst_next {
            self.dnode_mut(inst_next).inst_prev = inst_prev;
        }
        let dnode = self.dnode_mut(id);
        dnode.parent = None;
        dnode.next = None;
        dnode.prev = id;
        dnode.inst_prev = None;
        dnode.inst_next = None;
    }

    /// Move a node right before `anchor` within the same parent.
    pub(crate) fn move_before(&mut self, anchor: DnodeId, id: DnodeId) {
        let parent = self.dnode(anchor).parent;
        self.unlink(id);
        let head = self.first_child_of(parent);
        if head == Some(anchor) {
            let tail = self.dnode(anchor).prev;
            self.dnode_mut(id).prev = tail;
            self.dnode_mut(id).next = Some(anchor);
            self.dnode_mut(anchor).prev = id;
            self.set_first_child_of(parent, Some(id));
        } else {
            let prev = self.dnode(anchor).prev;
            self.dnode_mut(prev).next = Some(id);
            self.dnode_mut(id).prev = prev;
            self.dnode_mut(id).next = Some(anchor);
            self.dnode_mut(anchor).prev = id;
        }
        self.dnode_mut(id).parent = parent;
        self.link_instance(parent, id);
    }

    /// Move a node right after `anchor` within the same parent.
    pub(crate) fn move_after(&mut self, anchor: DnodeId, id: DnodeId) {
        let parent = self.dnode(anchor).parent;
        self.unlink(id);
        match self.dnode(anchor).next {
            None => {
                // Anchor is the tail.
                self.dnode_mut(anchor).next = Some(id);
                self.dnode_mut(id).prev = anchor;
                self.dnode_mut(id).next = None;
                if let Some(head) = self.first_child_of(parent) {
                    self.dnode_mut(head).prev = id;
                }
            }
            Some(next) => {
                self.dnode_mut(anchor).next = Some(id);
                self.dnode_mut(id).prev = anchor;
                self.dnode_mut(id).next = Some(next);
                self.dnode_mut(next).prev = id;
            }
        }
        self.dnode_mut(id).parent = parent;
        self.link_instance(parent, id);
    }

    /// Move a node to the front of its same-schema instance group.
    pub(crate) fn move_first(&mut self, id: DnodeId) {
        let parent = self.dnode(id).parent;
        let schema = self.dnode(id).schema;
        let mut next = self.first_child_of(parent);
        while let Some(sibling) = next {
            if sibling != id && self.dnode(sibling).schema == schema {
                self.move_before(sibling, id);
                return;
            }
            next = self.dnode(sibling).next;
        }
    }
}

impl<'a> Data<'a> for DataTree<'a> {
    fn tree(&'a self) -> &'a DataTree<'a> {
        self
    }

    fn print_first(&self) -> Option<DnodeId> {
        self.first
    }

    fn print_with_siblings(&self, _options: DataPrinterFlags) -> bool {
        true
    }
}

impl<'a> Data<'a> for DataNodeRef<'a> {
    fn tree(&'a self) -> &'a DataTree<'a> {
        self.tree
    }

    fn print_first(&self) -> Option<DnodeId> {
        Some(self.id)
    }

    fn print_with_siblings(&self, options: DataPrinterFlags) -> bool {
        options.contains(DataPrinterFlags::WITH_SIBLINGS)
    }
}

// ===== impl DataNodeRef =====

impl<'a> DataNodeRef<'a> {
    /// Schema definition of this data node.
    pub fn schema(&self) -> SchemaNode<'a> {
        SchemaNode::new(self.tree.context, self.tree.dnode(self.id).schema)
    }

    /// Returns the parent data node.
    pub fn parent(&self) -> Option<DataNodeRef<'a>> {
        self.tree
            .dnode(self.id)
            .parent
            .map(|id| DataNodeRef { tree: self.tree, id })
    }

    /// Returns the next sibling data node.
    pub fn next_sibling(&self) -> Option<DataNodeRef<'a>> {
        self.tree
            .dnode(self.id)
            .next
            .map(|id| DataNodeRef { tree: self.tree, id })
    }

    /// Returns the first child data node.
    pub fn first_child(&self) -> Option<DataNodeRef<'a>> {
        self.tree
            .dnode(self.id)
            .child
            .map(|id| DataNodeRef { tree: self.tree, id })
    }

    /// Returns an iterator over the ancestor data nodes.
    pub fn ancestors(&self) -> impl Iterator<Item = DataNodeRef<'a>> {
        let tree = self.tree;
        iter::ancestors(tree, tree.dnode(self.id).parent)
            .map(move |id| DataNodeRef { tree, id })
    }

    /// Returns an iterator over this data node and its ancestors.
    pub fn inclusive_ancestors(
        &self,
    ) -> impl Iterator<Item = DataNodeRef<'a>> {
        let tree = self.tree;
        iter::ancestors(tree, Some(self.id))
            .map(move |id| DataNodeRef { tree, id })
    }

    /// Returns an iterator over the sibling data nodes.
    pub fn siblings(&self) -> impl Iterator<Item = DataNodeRef<'a>> {
        let tree = self.tree;
        iter::siblings(tree, tree.dnode(self.id).next)
            .map(move |id| DataNodeRef { tree, id })
    }

    /// Returns an iterator over this data node and its siblings.
    pub fn inclusive_siblings(
        &self,
    ) -> impl Iterator<Item = DataNodeRef<'a>> {
        let tree = self.tree;
        iter::siblings(tree, Some(self.id))
            .map(move |id| DataNodeRef { tree, id })
    }

    /// Returns an iterator over the child data nodes.
    pub fn children(&self) -> impl Iterator<Item = DataNodeRef<'a>> {
        let tree = self.tree;
        iter::siblings(tree, tree.dnode(self.id).child)
            .map(move |id| DataNodeRef { tree, id })
    }

    /// Returns an iterator over all elements in the data tree
    /// (depth-first search algorithm).
    pub fn traverse(&self) -> impl Iterator<Item = DataNodeRef<'a>> {
        let tree = self.tree;
        iter::traverse(tree, self.id).map(move |id| DataNodeRef { tree, id })
    }

    /// Returns an iterator over the keys of the list.
    pub fn list_keys(&self) -> impl Iterator<Item = DataNodeRef<'a>> {
        self.children().filter(|dnode| dnode.schema().is_list_key())
    }

    /// Returns an iterator over the attributes of the node.
    pub fn meta(&self) -> impl Iterator<Item = Metadata<'a>> {
        let tree = self.tree;
        let node = self.id;
        (0..tree.dnode(node).attrs.len())
            .map(move |index| Metadata { tree, node, index })
    }

    /// Generate the path of this data node, including list key
    /// predicates.
    pub fn path(&self) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(self.clone());
        while let Some(dnode) = cursor {
            parts.push(dnode.clone());
            cursor = dnode.parent();
        }
        parts.reverse();

        let mut path = String::new();
        let mut prev_module = None;
        for dnode in parts {
            let snode = dnode.schema();
            let module = snode.module();
            path.push('/');
            if prev_module.as_deref() != Some(module.name()) {
                path.push_str(module.name());
                path.push(':');
                prev_module = Some(module.name().to_string());
            }
            path.push_str(snode.name());
            match snode.kind() {
                SchemaNodeKind::List => {
                    for key in dnode.list_keys() {
                        path.push_str(&format!(
                            "[{}='{}']",
                            key.schema().name(),
                            key.value_canonical().unwrap_or_default()
                        ));
                    }
                }
                SchemaNodeKind::LeafList => {
                    path.push_str(&format!(
                        "[.='{}']",
                        dnode.value_canonical().unwrap_or_default()
                    ));
                }
                _ => (),
            }
        }
        path
    }

    /// Returns the canonical string value of the node.
    pub fn value_canonical(&self) -> Option<String> {
        self.tree
            .dnode(self.id)
            .value_str
            .as_ref()
            .map(|value| value.to_string())
    }

    /// Returns the typed value of the node.
    pub fn value(&self) -> Option<DataValue> {
        self.tree.dnode(self.id).value.clone()
    }

    /// The verbatim XML subtree of an anyxml node.
    pub fn anyxml(&self) -> Option<&'a str> {
        self.tree.dnode(self.id).anyxml.as_deref()
    }

    /// Whether the node holds a leafref or instance-identifier value
    /// that was accepted without resolving its target instance.
    pub fn is_unresolved(&self) -> bool {
        self.tree.dnode(self.id).unresolved
    }
}

impl<'a> PartialEq for DataNodeRef<'a> {
    fn eq(&self, other: &DataNodeRef<'_>) -> bool {
        self.id == other.id
    }
}

// ===== impl Metadata =====

impl<'a> Metadata<'a> {
    /// Attribute name.
    pub fn name(&self) -> &'a str {
        &self.tree.dnode(self.node).attrs[self.index].name
    }

    /// Attribute value.
    pub fn value(&self) -> &'a str {
        &self.tree.dnode(self.node).attrs[self.index].value
    }
}

// ===== XML data parser =====

/// The `insert` attribute of a user-ordered node.
#[derive(Debug, PartialEq)]
enum InsertHint {
    First,
    Last,
    Before(String),
    After(String),
}

struct XmlDataParser<'a, 'b> {
    tree: &'b mut DataTree<'a>,
    options: DataParserFlags,
    /// In-scope xmlns bindings: (prefix, uri), innermost last, with a
    /// per-element count for scoped removal.
    ns_bindings: Vec<(String, String)>,
    /// Data nodes awaiting leafref/instance-identifier resolution.
    unres: Vec<(DnodeId, u32)>,
}

enum Frame {
    /// A container/list data node being filled in.
    Node(DnodeId, usize),
    /// A leaf/leaf-list element whose text is being accumulated.
    Leaf(DnodeId, String, usize),
    /// An element without schema match being skipped.
    Ignored(usize),
}

impl<'a, 'b> XmlDataParser<'a, 'b> {
    fn parse(&mut self, data: &str) -> Result<()> {
        let mut reader = Reader::from_str(data);
        reader.config_mut().expand_empty_elements = true;
        let mut stack: Vec<Frame> = Vec::new();

        loop {
            let line = line_at(data, reader.buffer_position() as usize);
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if let Some(Frame::Ignored(_)) = stack.last() {
                        stack.push(Frame::Ignored(0));
                        continue;
                    }
                    if let Some(Frame::Leaf(..)) = stack.last() {
                        return Err(Error::new(
                            ErrorCode::Inelem,
                            "Child element inside a leaf value",
                        )
                        .with_line(line));
                    }
                    let ns_count = self.push_ns_bindings(&e, line)?;
                    let frame = self.open_element(
                        &e,
                        &mut reader,
                        &mut stack,
                        ns_count,
                        line,
                    )?;
                    if let Some(frame) = frame {
                        stack.push(frame);
                    }
                }
                Ok(Event::Text(t)) => {
                    if let Some(Frame::Leaf(_, text, _)) = stack.last_mut()
                    {
                        let chunk = t.unescape().map_err(|err| {
                            Error::new(
                                ErrorCode::Inval,
                                format!("XML error: {}", err),
                            )
                            .with_line(line)
                        })?;
                        text.push_str(&chunk);
                    }
                }
                Ok(Event::CData(t)) => {
                    if let Some(Frame::Leaf(_, text, _)) = stack.last_mut()
                    {
                        text.push_str(&String::from_utf8_lossy(t.as_ref()));
                    }
                }
                Ok(Event::End(_)) => match stack.pop() {
                    Some(Frame::Ignored(ns_count)) => {
                        self.pop_ns_bindings(ns_count);
                    }
                    Some(Frame::Node(id, ns_count)) => {
                        self.pop_ns_bindings(ns_count);
                        validation::node_completed(
                            self.tree,
                            id,
                            self.options,
                        )?;
                    }
                    Some(Frame::Leaf(id, text, ns_count)) => {
                        self.finalize_leaf(id, &text, line)?;
                        self.pop_ns_bindings(ns_count);
                    }
                    None => {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            "Unbalanced XML document",
                        )
                        .with_line(line));
                    }
                },
                Ok(Event::Eof) => break,
                Ok(_) => (),
                Err(err) => {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        format!("XML error: {}", err),
                    )
                    .with_line(line));
                }
            }
        }

        if !stack.is_empty() {
            return Err(Error::new(
                ErrorCode::Inval,
                "Truncated XML document",
            ));
        }

        self.resolve_instances()
    }

    /// Record the xmlns declarations of an element; returns how many
    /// bindings to drop when the element closes.
    fn push_ns_bindings(
        &mut self,
        e: &quick_xml::events::BytesStart<'_>,
        line: u32,
    ) -> Result<usize> {
        let mut count = 0;
        for attr in e.attributes() {
            let attr = attr.map_err(|_| {
                Error::new(ErrorCode::Inattr, "Malformed attribute")
                    .with_line(line)
            })?;
            let key = attr.key.as_ref();
            let value = attr
                .unescape_value()
                .map_err(|err| {
                    Error::new(
                        ErrorCode::Inval,
                        format!("XML error: {}", err),
                    )
                    .with_line(line)
                })?
                .into_owned();
            if key == b"xmlns" {
                self.ns_bindings.push((String::new(), value));
                count += 1;
            } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
                self.ns_bindings.push((
                    String::from_utf8_lossy(prefix).into_owned(),
                    value,
                ));
                count += 1;
            }
        }
        Ok(count)
    }

    fn pop_ns_bindings(&mut self, count: usize) {
        for _ in 0..count {
            self.ns_bindings.pop();
        }
    }

    fn lookup_ns(&self, prefix: &str) -> Option<&str> {
        self.ns_bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn open_element(
        &mut self,
        e: &quick_xml::events::BytesStart<'_>,
        reader: &mut Reader<&[u8]>,
        stack: &mut [Frame],
        ns_count: usize,
        line: u32,
    ) -> Result<Option<Frame>> {
        let qname = e.name();
        let (local, prefix) = match qname.as_ref().iter().position(|&b| b == b':') {
            Some(pos) => (
                String::from_utf8_lossy(&qname.as_ref()[pos + 1..])
                    .into_owned(),
                String::from_utf8_lossy(&qname.as_ref()[..pos]).into_owned(),
            ),
            None => (
                String::from_utf8_lossy(qname.as_ref()).into_owned(),
                String::new(),
            ),
        };
        let ns = self.lookup_ns(&prefix).unwrap_or("").to_string();

        // Locate the schema definition: top-level elements match a
        // module by namespace, nested elements match the parent's
        // children (transparently crossing choice/case/uses).
        let parent = stack.iter().rev().find_map(|frame| match frame {
            Frame::Node(id, _) => Some(*id),
            _ => None,
        });
        let first_schema = match parent {
            Some(parent) => {
                self.tree.context.snode(self.tree.dnode(parent).schema).child
            }
            None => match self.tree.context.module_by_ns(&ns) {
                Some(mid) => self.tree.context.module_data(mid).data,
                None => None,
            },
        };
        let snode = find_data_child(self.tree.context, first_schema, &ns, &local);

        let snode = match snode {
            Some(snode) => snode,
            None => {
                let known_ns =
                    self.tree.context.module_by_ns(&ns).is_some();
                if self.options.contains(DataParserFlags::STRICT) || known_ns
                {
                    return Err(Error::new(
                        ErrorCode::Inelem,
                        format!("Unknown element \"{}\"", local),
                    )
                    .with_line(line));
                }
                log::debug!(
                    "ignoring unknown element \"{}\" (namespace \"{}\")",
                    local,
                    ns
                );
                return Ok(Some(Frame::Ignored(ns_count)));
            }
        };

        // A schema node disabled by feature state matches nothing.
        if !snode_is_enabled(self.tree.context, snode) {
            return Err(Error::new(
                ErrorCode::Inelem,
                format!(
                    "Element \"{}\" is disabled by its if-feature conditions",
                    local
                ),
            )
            .with_line(line));
        }

        // Edit-config payloads cannot carry state data.
        if self.options.contains(DataParserFlags::EDIT)
            && !snode_is_config(self.tree.context, snode)
        {
            return Err(Error::new(
                ErrorCode::Inval,
                format!("State data node \"{}\" in edit-config input", local),
            )
            .with_line(line));
        }

        let kind = self.tree.context.snode(snode).kind;

        // Filter mode merges a repeated container instead of
        // duplicating it.
        if self.options.contains(DataParserFlags::FILTER)
            && kind == SchemaNodeKind::Container
        {
            if let Some(existing) =
                find_instance(self.tree, parent, snode)
            {
                return Ok(Some(Frame::Node(existing, ns_count)));
            }
        }

        let (insert, attrs) = self.parse_attributes(e, snode, line)?;

        let id = self.tree.alloc(DnodeData {
            schema: snode,
            parent: None,
            prev: DnodeId(0),
            next: None,
            child: None,
            inst_prev: None,
            inst_next: None,
            value_str: None,
            value: None,
            attrs,
            anyxml: None,
            unresolved: false,
            line,
        });
        self.tree.link_child(parent, id);

        // Structural checks that depend only on the node's identity
        // run as soon as it is spliced in.
        validation::node_inserted(self.tree, id, self.options)?;

        if let Some(insert) = insert {
            self.apply_insert(id, insert, line)?;
        }

        match kind {
            SchemaNodeKind::Leaf | SchemaNodeKind::LeafList => {
                Ok(Some(Frame::Leaf(id, String::new(), ns_count)))
            }
            SchemaNodeKind::AnyXml => {
                // Detach the subtree verbatim.
                let raw = reader
                    .read_text(qname)
                    .map_err(|err| {
                        Error::new(
                            ErrorCode::Inval,
                            format!("XML error: {}", err),
                        )
                        .with_line(line)
                    })?
                    .into_owned();
                self.tree.dnode_mut(id).anyxml = Some(raw);
                self.pop_ns_bindings(ns_count);
                validation::node_completed(self.tree, id, self.options)?;
                Ok(None)
            }
            _ => Ok(Some(Frame::Node(id, ns_count))),
        }
    }

    /// Split the element's attributes into the user-ordered insert
    /// hint and the preserved attribute list.
    fn parse_attributes(
        &mut self,
        e: &quick_xml::events::BytesStart<'_>,
        snode: SnodeId,
        line: u32,
    ) -> Result<(Option<InsertHint>, Vec<AttrData>)> {
        let mut insert: Option<String> = None;
        let mut insert_count = 0;
        let mut anchor: Option<String> = None;
        let mut anchor_count = 0;
        let mut attrs = Vec::new();

        for attr in e.attributes() {
            let attr = attr.map_err(|_| {
                Error::new(ErrorCode::Inattr, "Malformed attribute")
                    .with_line(line)
            })?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let (prefix, name) = match key.iter().position(|&b| b == b':') {
                Some(pos) => (
                    String::from_utf8_lossy(&key[..pos]).into_owned(),
                    String::from_utf8_lossy(&key[pos + 1..]).into_owned(),
                ),
                None => (
                    String::new(),
                    String::from_utf8_lossy(key).into_owned(),
                ),
            };
            let value = attr
                .unescape_value()
                .map_err(|err| {
                    Error::new(
                        ErrorCode::Inval,
                        format!("XML error: {}", err),
                    )
                    .with_line(line)
                })?
                .into_owned();
            let attr_ns = self.lookup_ns(&prefix).unwrap_or("");

            if attr_ns == YANG_NS {
                match name.as_str() {
                    "insert" => {
                        insert_count += 1;
                        insert = Some(value);
                        continue;
                    }
                    "value" | "key" => {
                        anchor_count += 1;
                        anchor = Some(value);
                        continue;
                    }
                    _ => (),
                }
            }

            let name = self.tree.dict.insert(&name);
            let value = self.tree.dict.insert(&value);
            attrs.push(AttrData { name, value });
        }

        if insert_count > 1 || anchor_count > 1 {
            return Err(Error::new(
                ErrorCode::TooMany,
                "Duplicated insert attribute",
            )
            .with_line(line));
        }

        let insert = match insert.as_deref() {
            None => {
                if anchor.is_some() {
                    return Err(Error::new(
                        ErrorCode::Inattr,
                        "Attribute \"value\" without \"insert\"",
                    )
                    .with_line(line));
                }
                None
            }
            Some(insert_str) => {
                if !self
                    .tree
                    .context
                    .snode(snode)
                    .flags
                    .contains(crate::schema::SnodeFlags::ORDBY_USER)
                {
                    return Err(Error::new(
                        ErrorCode::Inattr,
                        "Insert attribute on a node that is not user-ordered",
                    )
                    .with_line(line));
                }
                match insert_str {
                    "first" => Some(InsertHint::First),
                    "last" => Some(InsertHint::Last),
                    "before" | "after" => {
                        let anchor = anchor.ok_or_else(|| {
                            Error::new(
                                ErrorCode::Missattr,
                                format!(
                                    "Insert \"{}\" requires a \"value\" attribute",
                                    insert_str
                                ),
                            )
                            .with_line(line)
                        })?;
                        if insert_str == "before" {
                            Some(InsertHint::Before(anchor))
                        } else {
                            Some(InsertHint::After(anchor))
                        }
                    }
                    other => {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            format!("Invalid insert value \"{}\"", other),
                        )
                        .with_line(line));
                    }
                }
            }
        };

        Ok((insert, attrs))
    }

    /// Apply a user-ordered insert hint. Before/after anchors are
    /// located among the node's same-schema siblings, by value for
    /// leaf-lists and by key predicates for lists.
    fn apply_insert(
        &mut self,
        id: DnodeId,
        insert: InsertHint,
        line: u32,
    ) -> Result<()> {
        match insert {
            InsertHint::Last => Ok(()),
            InsertHint::First => {
                self.tree.move_first(id);
                Ok(())
            }
            InsertHint::Before(anchor) => {
                let target = self.locate_anchor(id, &anchor, line)?;
                self.tree.move_before(target, id);
                Ok(())
            }
            InsertHint::After(anchor) => {
                let target = self.locate_anchor(id, &anchor, line)?;
                self.tree.move_after(target, id);
                Ok(())
            }
        }
    }

    fn locate_anchor(
        &self,
        id: DnodeId,
        anchor: &str,
        line: u32,
    ) -> Result<DnodeId> {
        let schema = self.tree.dnode(id).schema;
        let parent = self.tree.dnode(id).parent;
        let kind = self.tree.context.snode(schema).kind;

        let mut next = self.tree.first_child_of(parent);
        while let Some(sibling) = next {
            next = self.tree.dnode(sibling).next;
            if sibling == id || self.tree.dnode(sibling).schema != schema {
                continue;
            }
            let matches = match kind {
                SchemaNodeKind::LeafList => self
                    .tree
                    .dnode(sibling)
                    .value_str
                    .as_deref()
                    .map(|value| value == anchor)
                    .unwrap_or(false),
                SchemaNodeKind::List => {
                    list_matches_key_predicates(self.tree, sibling, anchor)?
                }
                _ => false,
            };
            if matches {
                return Ok(sibling);
            }
        }
        Err(Error::new(
            ErrorCode::Inval,
            format!("Insert anchor \"{}\" not found", anchor),
        )
        .with_line(line))
    }

    /// Decode the accumulated text of a leaf element.
    fn finalize_leaf(
        &mut self,
        id: DnodeId,
        text: &str,
        line: u32,
    ) -> Result<()> {
        let ctx = self.tree.context;
        let snode = self.tree.dnode(id).schema;
        let tid = crate::schema::snode_type(ctx, snode).ok_or_else(|| {
            Error::new(ErrorCode::Int, "Leaf node without a type")
        })?;
        let module = ctx.snode(snode).module;

        let bindings = &self.ns_bindings;
        let result = value::decode_value(ctx, tid, text, module, &|prefix| {
            bindings
                .iter()
                .rev()
                .find(|(p, _)| p == prefix)
                .and_then(|(_, uri)| ctx.module_by_ns(uri))
        })
        .map_err(|err| err.with_line(line))?;

        {
            let canonical = self.tree.dict.insert(&result.canonical);
            let dnode = self.tree.dnode_mut(id);
            dnode.value_str = Some(canonical);
            dnode.value = Some(result.value);
        }

        if result.needs_instance {
            if self
                .options
                .intersects(DataParserFlags::EDIT | DataParserFlags::FILTER)
            {
                self.tree.dnode_mut(id).unresolved = true;
            } else {
                self.unres.push((id, line));
            }
        }

        validation::node_completed(self.tree, id, self.options)
    }

    /// Drain the unresolved-data queue: every queued leafref must have
    /// a target instance with an equal value, every queued
    /// instance-identifier must point to an existing node.
    fn resolve_instances(&mut self) -> Result<()> {
        let unres = std::mem::take(&mut self.unres);
        for (id, line) in unres {
            let ctx = self.tree.context;
            let snode = self.tree.dnode(id).schema;
            let tid = match crate::schema::snode_type(ctx, snode) {
                Some(tid) => tid,
                None => continue,
            };
            let base = effective_instance_base(ctx, tid);
            match base {
                DataValueType::LeafRef => {
                    self.resolve_data_leafref(id, tid, line)?;
                }
                DataValueType::InstanceId => {
                    self.resolve_data_instanceid(id, line)?;
                }
                _ => (),
            }
        }
        Ok(())
    }

    fn resolve_data_leafref(
        &mut self,
        id: DnodeId,
        tid: crate::schema::TypeId,
        line: u32,
    ) -> Result<()> {
        let ctx = self.tree.context;
        let target_snode = leafref_target_snode(ctx, tid).ok_or_else(|| {
            Error::new(ErrorCode::Int, "Leafref without a resolved target")
        })?;
        let wanted = self.tree.dnode(id).value_str.clone();

        // Evaluate against the completed tree: an instance of the
        // target schema node must carry an equal value.
        let mut stack: Vec<DnodeId> = Vec::new();
        let mut next = self.tree.first;
        while let Some(node) = next {
            stack.push(node);
            next = self.tree.dnode(node).next;
        }
        while let Some(node) = stack.pop() {
            let dnode = self.tree.dnode(node);
            if dnode.schema == target_snode
                && dnode.value_str == wanted
            {
                return Ok(());
            }
            let mut child = dnode.child;
            while let Some(c) = child {
                stack.push(c);
                child = self.tree.dnode(c).next;
            }
        }

        Err(Error::new(
            ErrorCode::LeafrefTarget,
            format!(
                "Leafref \"{}\" has no existing target instance",
                wanted.as_deref().unwrap_or("")
            ),
        )
        .with_line(line)
        .with_path(DataNodeRef { tree: self.tree, id }.path()))
    }

    fn resolve_data_instanceid(
        &mut self,
        id: DnodeId,
        line: u32,
    ) -> Result<()> {
        let path = self.tree.dnode(id).value_str.clone().unwrap_or_default();
        let steps = ident::parse_instance_identifier(&path)?;
        let tree = &*self.tree;
        let found = locate_instance(tree, &steps, &|name| {
            tree.context
                .module_latest(name)
                .map(|mid| tree.context.module_data(mid).name.clone())
        })?;
        if found.is_none() {
            return Err(Error::new(
                ErrorCode::Spec,
                format!(
                    "Instance-identifier \"{}\" has no existing target",
                    path
                ),
            )
            .with_line(line));
        }
        Ok(())
    }
}

/// Whether the effective base of a type (following unions is not
/// needed here; union members were already chosen) requires an
/// instance check.
fn effective_instance_base(
    ctx: &Context,
    tid: crate::schema::TypeId,
) -> DataValueType {
    ctx.type_data(tid).base
}

pub(crate) fn leafref_target_snode(
    ctx: &Context,
    tid: crate::schema::TypeId,
) -> Option<SnodeId> {
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        if let Some(target) = ctx.type_data(id).leafref_target {
            return Some(target);
        }
        cursor = ctx.type_data(id).parent;
    }
    None
}

/// Find a data child schema node by namespace and name, walking
/// transparently through choice, case and uses, and skipping
/// groupings.
fn find_data_child(
    ctx: &Context,
    first: Option<SnodeId>,
    ns: &str,
    name: &str,
) -> Option<SnodeId> {
    let mut next = first;
    while let Some(id) = next {
        let snode = ctx.snode(id);
        match snode.kind {
            SchemaNodeKind::Choice
            | SchemaNodeKind::Case
            | SchemaNodeKind::Uses => {
                if let Some(found) =
                    find_data_child(ctx, snode.child, ns, name)
                {
                    return Some(found);
                }
            }
            kind if kind.is_data() => {
                if snode.name.as_ref() == name
                    && ctx.module_data(snode.module).ns.as_ref() == ns
                {
                    return Some(id);
                }
            }
            _ => (),
        }
        next = snode.next;
    }
    None
}

/// First existing instance of a schema node under a parent.
pub(crate) fn find_instance(
    tree: &DataTree<'_>,
    parent: Option<DnodeId>,
    schema: SnodeId,
) -> Option<DnodeId> {
    let mut next = tree.first_child_of(parent);
    while let Some(id) = next {
        if tree.dnode(id).schema == schema {
            return Some(id);
        }
        next = tree.dnode(id).next;
    }
    None
}

/// Check a list instance against a `[key='value']...` predicate
/// string.
fn list_matches_key_predicates(
    tree: &DataTree<'_>,
    list: DnodeId,
    predicates: &str,
) -> Result<bool> {
    // The anchor format reuses the instance-identifier predicate
    // syntax, without the leading path.
    let wrapped = format!("/anchor{}", predicates);
    let steps = ident::parse_instance_identifier(&wrapped)?;
    let preds = &steps[0].preds;

    for pred in preds {
        if let InstidPred::Key((_, key), value) = pred {
            let mut matched = false;
            let mut child = tree.dnode(list).child;
            while let Some(c) = child {
                let dnode = tree.dnode(c);
                if tree.context.snode(dnode.schema).name.as_ref()
                    == key.as_str()
                    && dnode.value_str.as_deref() == Some(value.as_str())
                {
                    matched = true;
                    break;
                }
                child = dnode.next;
            }
            if !matched {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Locate a data node from parsed instance-identifier steps. The
/// `module_name` mapping canonicalizes the step prefix (module names
/// in the canonical form).
fn locate_instance(
    tree: &DataTree<'_>,
    steps: &[ident::InstidStep],
    module_name: &dyn Fn(&str) -> Option<Arc<str>>,
) -> Result<Option<DnodeId>> {
    let mut parent: Option<DnodeId> = None;
    let mut found: Option<DnodeId> = None;
    let mut prev_module: Option<Arc<str>> = None;

    for step in steps {
        let module = match &step.node.0 {
            Some(prefix) => module_name(prefix).ok_or_else(|| {
                Error::new(
                    ErrorCode::Inmod,
                    format!("Unknown module \"{}\"", prefix),
                )
            })?,
            None => prev_module.clone().ok_or_else(|| {
                Error::new(
                    ErrorCode::Inval,
                    "First node of a data path must be prefixed",
                )
            })?,
        };

        let mut candidates = Vec::new();
        let mut next = tree.first_child_of(parent);
        while let Some(id) = next {
            let dnode = tree.dnode(id);
            let snode = tree.context.snode(dnode.schema);
            if snode.name.as_ref() == step.node.1
                && tree
                    .context
                    .module_data(snode.module)
                    .name
                    == module
            {
                candidates.push(id);
            }
            next = dnode.next;
        }

        // Apply the predicates.
        let mut position = 0;
        candidates.retain(|&id| {
            position += 1;
            step.preds.iter().all(|pred| match pred {
                InstidPred::Key((_, key), value) => {
                    let mut child = tree.dnode(id).child;
                    while let Some(c) = child {
                        let dnode = tree.dnode(c);
                        if tree
                            .context
                            .snode(dnode.schema)
                            .name
                            .as_ref()
                            == key.as_str()
                            && dnode.value_str.as_deref()
                                == Some(value.as_str())
                        {
                            return true;
                        }
                        child = dnode.next;
                    }
                    false
                }
                InstidPred::Value(value) => {
                    tree.dnode(id).value_str.as_deref()
                        == Some(value.as_str())
                }
                InstidPred::Position(pos) => position == *pos,
            })
        });

        found = candidates.first().copied();
        match found {
            Some(id) => parent = Some(id),
            None => return Ok(None),
        }
        prev_module = Some(module);
    }
    Ok(found)
}

fn line_at(data: &str, pos: usize) -> u32 {
    let pos = pos.min(data.len());
    data.as_bytes()[..pos]
        .iter()
        .filter(|&&b| b == b'\n')
        .count() as u32
        + 1
}
