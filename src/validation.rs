//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Structural validation of data trees.
//!
//! Per-node checkpoints run while the XML parser splices nodes in
//! (cardinality, choice exclusivity, keys, duplicate instances);
//! whole-tree checks (mandatory presence, min/max-elements, state-data
//! rejection) run once the tree is complete. In filter mode the
//! duplicate errors turn into merges.

use crate::data::{
    find_instance, DataParserFlags, DataTree, DataValidationFlags, DnodeId,
};
use crate::error::{Error, ErrorCode, Result};
use crate::schema::{
    snode_is_enabled, snode_path, ModuleId, SchemaNodeKind,
    SchemaPathFormat, SnodeFlags, SnodeId, SnodePayload,
};

/// Checks that only depend on the node's identity, run as soon as the
/// node is spliced into the tree.
pub(crate) fn node_inserted(
    tree: &mut DataTree<'_>,
    id: DnodeId,
    options: DataParserFlags,
) -> Result<()> {
    let ctx = tree.context;
    let schema = tree.dnode(id).schema;
    let kind = ctx.snode(schema).kind;
    let line = tree.dnode(id).line;

    if options.contains(DataParserFlags::FILTER) {
        return Ok(());
    }

    // Non-list nodes appear at most once per parent.
    if matches!(
        kind,
        SchemaNodeKind::Container
            | SchemaNodeKind::Leaf
            | SchemaNodeKind::AnyXml
    ) && tree.dnode(id).inst_prev.is_some()
    {
        return Err(Error::new(
            ErrorCode::TooMany,
            format!(
                "Duplicated instance of node \"{}\"",
                ctx.snode(schema).name
            ),
        )
        .with_line(line)
        .with_path(snode_path(ctx, schema, SchemaPathFormat::DATA)));
    }

    // Data from at most one case of each choice.
    let chain = choice_chain(ctx, schema);
    if !chain.is_empty() {
        let parent = tree.dnode(id).parent;
        let mut next = tree.first_child_of(parent);
        while let Some(sibling) = next {
            next = tree.dnode(sibling).next;
            if sibling == id {
                continue;
            }
            let other_chain = choice_chain(ctx, tree.dnode(sibling).schema);
            for (choice, case) in &chain {
                for (other_choice, other_case) in &other_chain {
                    if choice == other_choice && case != other_case {
                        return Err(Error::new(
                            ErrorCode::McaseData,
                            format!(
                                "Data from multiple cases of choice \"{}\"",
                                ctx.snode(*choice).name
                            ),
                        )
                        .with_line(line)
                        .with_path(snode_path(
                            ctx,
                            schema,
                            SchemaPathFormat::LOG,
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

/// All (choice, member) pairs along the schema ancestry of a node. The
/// member doubles as the case in the choice-shorthand form.
fn choice_chain(
    ctx: &crate::context::Context,
    schema: SnodeId,
) -> Vec<(SnodeId, SnodeId)> {
    let mut chain = Vec::new();
    let mut cursor = schema;
    while let Some(parent) = ctx.snode(cursor).parent {
        if ctx.snode(parent).kind == SchemaNodeKind::Choice {
            chain.push((parent, cursor));
        }
        cursor = parent;
    }
    chain
}

/// Checks that need the node's content, run when its element closes.
pub(crate) fn node_completed(
    tree: &mut DataTree<'_>,
    id: DnodeId,
    options: DataParserFlags,
) -> Result<()> {
    let kind = tree.context.snode(tree.dnode(id).schema).kind;
    let filter = options.contains(DataParserFlags::FILTER);

    match kind {
        SchemaNodeKind::Leaf if filter => {
            // A repeated selection leaf is absorbed.
            if tree.dnode(id).inst_prev.is_some() {
                tree.unlink(id);
            }
            Ok(())
        }
        SchemaNodeKind::LeafList => leaflist_completed(tree, id, filter),
        SchemaNodeKind::List => list_completed(tree, id, options),
        _ => Ok(()),
    }
}

fn leaflist_completed(
    tree: &mut DataTree<'_>,
    id: DnodeId,
    filter: bool,
) -> Result<()> {
    let value = tree.dnode(id).value_str.clone();
    let line = tree.dnode(id).line;

    // Compare canonical forms by content, never by interning identity.
    let mut peer = tree.dnode(id).inst_prev;
    while let Some(other) = peer {
        if tree.dnode(other).value_str.as_deref() == value.as_deref() {
            if filter {
                tree.unlink(id);
                return Ok(());
            }
            let schema = tree.dnode(id).schema;
            return Err(Error::new(
                ErrorCode::DupLeaflist,
                format!(
                    "Duplicated leaf-list value \"{}\"",
                    value.as_deref().unwrap_or("")
                ),
            )
            .with_line(line)
            .with_path(snode_path(
                tree.context,
                schema,
                SchemaPathFormat::DATA,
            )));
        }
        peer = tree.dnode(other).inst_prev;
    }
    Ok(())
}

fn list_completed(
    tree: &mut DataTree<'_>,
    id: DnodeId,
    options: DataParserFlags,
) -> Result<()> {
    let ctx = tree.context;
    let schema = tree.dnode(id).schema;
    let line = tree.dnode(id).line;
    let filter = options.contains(DataParserFlags::FILTER);

    let (keys, uniques) = match &ctx.snode(schema).payload {
        SnodePayload::List { keys, uniques, .. } => {
            (keys.clone(), uniques.clone())
        }
        _ => return Ok(()),
    };

    // Every declared key must be instantiated.
    if !filter {
        for &key in &keys {
            if find_instance(tree, Some(id), key).is_none() {
                return Err(Error::new(
                    ErrorCode::Misselem,
                    format!(
                        "List instance is missing its key \"{}\"",
                        ctx.snode(key).name
                    ),
                )
                .with_line(line)
                .with_path(snode_path(ctx, schema, SchemaPathFormat::DATA)));
            }
        }
    }

    // Key-based duplicate detection against the peer instances. This
    // check is always enforced.
    if !keys.is_empty() {
        let mut peer = tree.dnode(id).inst_prev;
        while let Some(other) = peer {
            peer = tree.dnode(other).inst_prev;
            if !keys_equal(tree, id, other, &keys) {
                continue;
            }
            if filter {
                merge_list_instances(tree, other, id);
                return Ok(());
            }
            return Err(Error::new(
                ErrorCode::DupList,
                "Duplicated list instance (same key values)",
            )
            .with_line(line)
            .with_path(snode_path(ctx, schema, SchemaPathFormat::DATA)));
        }
    }

    // Unique sets: no two instances may agree on every member. Partial
    // trees (edit-config, filters) skip the check.
    if !options.intersects(DataParserFlags::FILTER | DataParserFlags::EDIT)
    {
        for unique in &uniques {
            let mut peer = tree.dnode(id).inst_prev;
            while let Some(other) = peer {
                peer = tree.dnode(other).inst_prev;
                if unique_values_equal(tree, id, other, &unique.nodes) {
                    return Err(Error::new(
                        ErrorCode::Spec,
                        format!(
                            "Unique constraint \"{}\" violated",
                            unique.arg
                        ),
                    )
                    .with_line(line)
                    .with_path(snode_path(
                        ctx,
                        schema,
                        SchemaPathFormat::DATA,
                    )));
                }
            }
        }
    }

    Ok(())
}

fn keys_equal(
    tree: &DataTree<'_>,
    a: DnodeId,
    b: DnodeId,
    keys: &[SnodeId],
) -> bool {
    keys.iter().all(|&key| {
        let va = find_instance(tree, Some(a), key)
            .and_then(|id| tree.dnode(id).value_str.clone());
        let vb = find_instance(tree, Some(b), key)
            .and_then(|id| tree.dnode(id).value_str.clone());
        va.is_some() && va.as_deref() == vb.as_deref()
    })
}

/// Two instances agree on a unique set only if every member leaf is
/// present in both and all values match.
fn unique_values_equal(
    tree: &DataTree<'_>,
    a: DnodeId,
    b: DnodeId,
    members: &[SnodeId],
) -> bool {
    !members.is_empty()
        && members.iter().all(|&member| {
            let va = find_descendant_value(tree, a, member);
            let vb = find_descendant_value(tree, b, member);
            match (va, vb) {
                (Some(va), Some(vb)) => va == vb,
                _ => false,
            }
        })
}

fn find_descendant_value(
    tree: &DataTree<'_>,
    root: DnodeId,
    schema: SnodeId,
) -> Option<String> {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if id != root && tree.dnode(id).schema == schema {
            return tree
                .dnode(id)
                .value_str
                .as_ref()
                .map(|value| value.to_string());
        }
        let mut child = tree.dnode(id).child;
        while let Some(c) = child {
            stack.push(c);
            child = tree.dnode(c).next;
        }
    }
    None
}

/// Filter-mode merge of two list instances: the newer instance's
/// non-key children move into the older one. Children that repeat a
/// selection already present in the surviving instance are absorbed.
fn merge_list_instances(
    tree: &mut DataTree<'_>,
    existing: DnodeId,
    dup: DnodeId,
) {
    let ctx = tree.context;
    let mut child = tree.dnode(dup).child;
    while let Some(id) = child {
        child = tree.dnode(id).next;
        let schema = tree.dnode(id).schema;
        if ctx.snode(schema).flags.contains(SnodeFlags::KEY) {
            continue;
        }
        let absorbed = match ctx.snode(schema).kind {
            SchemaNodeKind::LeafList => {
                let value = tree.dnode(id).value_str.clone();
                let mut peer = find_instance(tree, Some(existing), schema);
                let mut found = false;
                while let Some(other) = peer {
                    if tree.dnode(other).value_str.as_deref()
                        == value.as_deref()
                    {
                        found = true;
                        break;
                    }
                    peer = tree.dnode(other).inst_next;
                }
                found
            }
            SchemaNodeKind::Leaf
            | SchemaNodeKind::Container
            | SchemaNodeKind::AnyXml => {
                find_instance(tree, Some(existing), schema).is_some()
            }
            _ => false,
        };
        tree.unlink(id);
        if !absorbed {
            tree.link_child(Some(existing), id);
        }
    }
    tree.unlink(dup);
}

/// Reject state data anywhere in the tree.
pub(crate) fn check_no_state(tree: &DataTree<'_>) -> Result<()> {
    for dnode in tree.traverse() {
        if dnode.schema().is_state() {
            return Err(Error::new(
                ErrorCode::Inval,
                format!(
                    "State data node \"{}\" is not allowed",
                    dnode.schema().name()
                ),
            )
            .with_path(dnode.path()));
        }
    }
    Ok(())
}

/// Whole-tree validation: state-data rejection and mandatory/
/// min-elements/max-elements enforcement.
pub(crate) fn validate_tree(
    tree: &DataTree<'_>,
    options: DataValidationFlags,
) -> Result<()> {
    if options.contains(DataValidationFlags::NO_STATE) {
        check_no_state(tree)?;
    }

    // Mandatory constraints are enforced for every implemented module
    // in the context, whether or not the tree instantiates any of its
    // data. An empty document is invalid against a module with a
    // mandatory top-level node.
    let ctx = tree.context;
    for idx in 0..ctx.modules.len() {
        let module = ModuleId(idx as u32);
        if !ctx.module_data(module).implemented {
            continue;
        }
        check_mandatory_ring(
            tree,
            ctx.module_data(module).data,
            Presence::Present(None),
        )?;
    }
    Ok(())
}

/// Data-side context for the mandatory walk: either an existing parent
/// (or the tree root), or a non-presence container that is absent but
/// still propagates mandatory constraints.
#[derive(Clone, Copy)]
enum Presence {
    Present(Option<DnodeId>),
    Absent,
}

fn count_instances(
    tree: &DataTree<'_>,
    presence: Presence,
    schema: SnodeId,
) -> usize {
    let parent = match presence {
        Presence::Present(parent) => parent,
        Presence::Absent => return 0,
    };
    let mut count = 0;
    let mut next = tree.first_child_of(parent);
    while let Some(id) = next {
        if tree.dnode(id).schema == schema {
            count += 1;
        }
        next = tree.dnode(id).next;
    }
    count
}

fn missing_node_error(tree: &DataTree<'_>, schema: SnodeId) -> Error {
    Error::new(
        ErrorCode::Misselem,
        format!(
            "Mandatory node \"{}\" is missing",
            tree.context.snode(schema).name
        ),
    )
    .with_path(snode_path(tree.context, schema, SchemaPathFormat::DATA))
}

fn check_mandatory_ring(
    tree: &DataTree<'_>,
    first: Option<SnodeId>,
    presence: Presence,
) -> Result<()> {
    let mut next = first;
    while let Some(schema) = next {
        next = tree.context.snode(schema).next;
        check_mandatory_node(tree, schema, presence)?;
    }
    Ok(())
}

/// The mandatory/min/max check for one schema node in a given data
/// context.
fn check_mandatory_node(
    tree: &DataTree<'_>,
    schema: SnodeId,
    presence: Presence,
) -> Result<()> {
    let ctx = tree.context;
    let snode = ctx.snode(schema);

    // Disabled subtrees and nodes guarded by an (unevaluated) when
    // expression are exempt.
    if !snode_is_enabled(ctx, schema) || snode.when.is_some() {
        return Ok(());
    }

    match snode.kind {
        SchemaNodeKind::Uses => {
            check_mandatory_ring(tree, snode.child, presence)
        }
        SchemaNodeKind::Leaf | SchemaNodeKind::AnyXml => {
            if snode.flags.contains(SnodeFlags::MAND_TRUE)
                && count_instances(tree, presence, schema) == 0
            {
                return Err(missing_node_error(tree, schema));
            }
            Ok(())
        }
        SchemaNodeKind::LeafList | SchemaNodeKind::List => {
            let (min, max) = match &snode.payload {
                SnodePayload::LeafList { min, max, .. } => (*min, *max),
                SnodePayload::List { min, max, .. } => (*min, *max),
                _ => (0, None),
            };
            let count = count_instances(tree, presence, schema);
            if count < min as usize {
                return Err(missing_node_error(tree, schema));
            }
            if let Some(max) = max {
                if count > max as usize {
                    return Err(Error::new(
                        ErrorCode::TooMany,
                        format!(
                            "Node \"{}\" has more than {} instances",
                            snode.name, max
                        ),
                    )
                    .with_path(snode_path(
                        ctx,
                        schema,
                        SchemaPathFormat::DATA,
                    )));
                }
            }
            // Constraints inside each list instance.
            if snode.kind == SchemaNodeKind::List {
                if let Presence::Present(parent) = presence {
                    let mut child = tree.first_child_of(parent);
                    while let Some(id) = child {
                        child = tree.dnode(id).next;
                        if tree.dnode(id).schema == schema {
                            check_mandatory_ring(
                                tree,
                                snode.child,
                                Presence::Present(Some(id)),
                            )?;
                        }
                    }
                }
            }
            Ok(())
        }
        SchemaNodeKind::Container => {
            let instance = match presence {
                Presence::Present(parent) => {
                    find_instance(tree, parent, schema)
                }
                Presence::Absent => None,
            };
            let is_np = matches!(
                &snode.payload,
                SnodePayload::Container { presence: None }
            );
            match instance {
                Some(instance) => check_mandatory_ring(
                    tree,
                    snode.child,
                    Presence::Present(Some(instance)),
                ),
                // A non-presence container exists implicitly, so
                // constraints below it still apply.
                None if is_np => check_mandatory_ring(
                    tree,
                    snode.child,
                    Presence::Absent,
                ),
                None => Ok(()),
            }
        }
        SchemaNodeKind::Choice => {
            let selected = match presence {
                Presence::Present(parent) => {
                    selected_case(tree, parent, schema)
                }
                Presence::Absent => None,
            };
            match selected {
                Some(case) => {
                    // Constraints apply within the selected case only.
                    // A shorthand member is its own case.
                    let case_snode = ctx.snode(case);
                    if case_snode.kind == SchemaNodeKind::Case {
                        check_mandatory_ring(
                            tree,
                            case_snode.child,
                            presence,
                        )
                    } else {
                        check_mandatory_node(tree, case, presence)
                    }
                }
                None => {
                    if snode.flags.contains(SnodeFlags::MAND_TRUE) {
                        return Err(missing_node_error(tree, schema));
                    }
                    Ok(())
                }
            }
        }
        _ => Ok(()),
    }
}

/// The case member selected by the data under a choice, if any.
fn selected_case(
    tree: &DataTree<'_>,
    parent: Option<DnodeId>,
    choice: SnodeId,
) -> Option<SnodeId> {
    let ctx = tree.context;
    let mut next = tree.first_child_of(parent);
    while let Some(id) = next {
        next = tree.dnode(id).next;
        let mut cursor = tree.dnode(id).schema;
        while let Some(sparent) = ctx.snode(cursor).parent {
            if sparent == choice {
                return Some(cursor);
            }
            cursor = sparent;
        }
    }
    None
}
