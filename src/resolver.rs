//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Deferred-reference resolver.
//!
//! The schema parsers enqueue everything that cannot be checked
//! locally. This module drains the queue with fixed-point iteration:
//! each pass visits the entries in insertion order and every entry
//! reports resolved, deferred (a prerequisite is itself pending) or
//! fails fatally. A pass that resolves at least one entry schedules
//! another pass; a pass without progress reports the missing
//! dependency of every remaining entry.

use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, ErrorCode, Result};
use crate::ident::{self, split_prefix};
use crate::schema::{
    snode_is_config, snode_link, DataValueType, FeatId, IdentId, ModuleId,
    SchemaNodeKind, SchemaParent, SnodeFlags, SnodeId, SnodeOrigin,
    SnodePayload, TypeId,
};
use crate::value;

/// Parse-time state: the unresolved-reference queue.
#[derive(Default)]
pub(crate) struct ParseSession {
    pub unres: Vec<UnresItem>,
}

#[derive(Clone, Debug)]
pub(crate) struct UnresItem {
    pub kind: UnresKind,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub(crate) enum UnresKind {
    Type(TypeId),
    Identity(IdentId),
    Leafref(SnodeId),
    Uses(SnodeId),
    Augment(SnodeId),
    IfFeatSnode(SnodeId, Arc<str>),
    IfFeatFeature(FeatId, Arc<str>),
    ListKeys(SnodeId),
    ListUnique(SnodeId),
    TypedefDflt(TypeId),
}

enum Outcome {
    Resolved,
    /// Cannot be resolved in this pass; carries the diagnostic used if
    /// the queue stalls.
    Deferred(Error),
}

/// Drain the unresolved queue for a freshly parsed module.
pub(crate) fn resolve(
    ctx: &mut Context,
    mid: ModuleId,
    session: &mut ParseSession,
) -> Result<()> {
    let mut pending = std::mem::take(&mut session.unres);
    let mut done = vec![false; pending.len()];

    let mut pass = 0;
    loop {
        pass += 1;
        let mut progress = false;
        let mut remaining = 0;

        let mut idx = 0;
        while idx < pending.len() {
            if done.len() < pending.len() {
                done.resize(pending.len(), false);
            }
            if done[idx] {
                idx += 1;
                continue;
            }
            let item = pending[idx].clone();
            match resolve_item(ctx, mid, session, &item)? {
                Outcome::Resolved => {
                    done[idx] = true;
                    progress = true;
                }
                Outcome::Deferred(_) => remaining += 1,
            }
            // Entries enqueued by this item (e.g. for nodes
            // instantiated by a grouping expansion) join the same
            // queue, in order.
            pending.append(&mut session.unres);
            idx += 1;
        }
        if done.len() < pending.len() {
            done.resize(pending.len(), false);
        }

        if remaining == 0 && pending.len() == done.iter().filter(|d| **d).count()
        {
            break;
        }
        if !progress {
            // Stalled: report the missing dependency of every entry.
            let mut first = None;
            for (idx, item) in pending.iter().enumerate() {
                if done[idx] {
                    continue;
                }
                if let Outcome::Deferred(err) =
                    resolve_item(ctx, mid, session, item)?
                {
                    log::warn!("unresolved: {}", err);
                    if first.is_none() {
                        first = Some(err);
                    }
                }
            }
            return Err(first.unwrap_or_else(|| {
                Error::new(ErrorCode::Int, "Resolver stalled")
            }));
        }
        log::debug!(
            "resolver pass {} done, {} entries remaining",
            pass,
            remaining
        );
    }

    finalize(ctx, mid)
}

fn resolve_item(
    ctx: &mut Context,
    mid: ModuleId,
    session: &mut ParseSession,
    item: &UnresItem,
) -> Result<Outcome> {
    match &item.kind {
        UnresKind::Type(tid) => resolve_type(ctx, *tid, item.line),
        UnresKind::Identity(ident) => {
            resolve_identity(ctx, *ident, item.line)
        }
        UnresKind::Leafref(snode) => resolve_leafref(ctx, *snode, item.line),
        UnresKind::Uses(snode) => {
            resolve_uses(ctx, mid, session, *snode, item.line)
        }
        UnresKind::Augment(snode) => resolve_augment(ctx, *snode, item.line),
        UnresKind::IfFeatSnode(snode, name) => {
            let module = ctx.snode(*snode).module;
            match lookup_feature(ctx, module, name, item.line)? {
                Ok(feat) => {
                    ctx.snode_mut(*snode).iffeatures.push(feat);
                    Ok(Outcome::Resolved)
                }
                Err(err) => Ok(Outcome::Deferred(err)),
            }
        }
        UnresKind::IfFeatFeature(owner, name) => {
            let module = ctx.feature_data(*owner).module;
            match lookup_feature(ctx, module, name, item.line)? {
                Ok(feat) => {
                    if feat == *owner {
                        return Err(Error::new(
                            ErrorCode::Circular,
                            format!(
                                "Feature \"{}\" references itself",
                                name
                            ),
                        )
                        .with_line(item.line));
                    }
                    ctx.features[owner.0 as usize].iffeatures.push(feat);
                    Ok(Outcome::Resolved)
                }
                Err(err) => Ok(Outcome::Deferred(err)),
            }
        }
        UnresKind::ListKeys(list) => resolve_list_keys(ctx, *list, item.line),
        UnresKind::ListUnique(list) => {
            resolve_list_unique(ctx, *list, item.line)
        }
        UnresKind::TypedefDflt(tid) => {
            resolve_typedef_default(ctx, *tid, item.line)
        }
    }
}

// ===== TYPE =====

fn resolve_type(ctx: &mut Context, tid: TypeId, line: u32) -> Result<Outcome> {
    if ctx.type_data(tid).resolved {
        return Ok(Outcome::Resolved);
    }
    let base_name = ctx.type_data(tid).base_name.clone();
    let module = ctx.type_data(tid).module;
    let scope = ctx.type_data(tid).scope;
    let (prefix, name) = split_prefix(&base_name);

    let (base, parent) = if prefix.is_none()
        && DataValueType::from_name(name).is_some()
    {
        (DataValueType::from_name(name).unwrap(), None)
    } else {
        let target = match prefix {
            Some(prefix) => {
                let tmod =
                    ctx.resolve_prefix(module, prefix).ok_or_else(|| {
                        Error::new(
                            ErrorCode::Inmod,
                            format!("Unknown prefix \"{}\"", prefix),
                        )
                        .with_line(line)
                    })?;
                find_typedef(ctx, tmod, None, name)
            }
            None => find_typedef(ctx, module, scope, name),
        };
        let target = target.ok_or_else(|| {
            Error::new(
                ErrorCode::Inval,
                format!("Unknown type \"{}\"", base_name),
            )
            .with_line(line)
        })?;
        if !ctx.type_data(target).resolved {
            return Ok(Outcome::Deferred(
                Error::new(
                    ErrorCode::Inval,
                    format!("Type \"{}\" depends on an unresolved typedef", base_name),
                )
                .with_line(line),
            ));
        }
        (ctx.type_data(target).base, Some(target))
    };

    check_restrictions(ctx, tid, base, parent, line)?;

    // Resolve the base identity of an identityref.
    if base == DataValueType::IdentityRef {
        if let Some(base_name) = ctx.type_data(tid).ident_base_name.clone() {
            let ident = lookup_identity(ctx, module, &base_name)
                .ok_or_else(|| {
                    Error::new(
                        ErrorCode::Inval,
                        format!("Unknown identity \"{}\"", base_name),
                    )
                    .with_line(line)
                })?;
            ctx.type_data_mut(tid).ident_base = Some(ident);
        }
    }

    let tdata = ctx.type_data_mut(tid);
    tdata.base = base;
    tdata.parent = parent;
    tdata.resolved = true;
    Ok(Outcome::Resolved)
}

/// Search for a typedef: enclosing schema-node scopes first, then the
/// module level.
fn find_typedef(
    ctx: &Context,
    module: ModuleId,
    scope: Option<SnodeId>,
    name: &str,
) -> Option<TypeId> {
    let mut cursor = scope;
    while let Some(id) = cursor {
        let snode = ctx.snode(id);
        for &tid in &snode.typedefs {
            if ctx.type_data(tid).name.as_ref() == name {
                return Some(tid);
            }
        }
        cursor = snode.parent;
    }
    ctx.module_data(module)
        .typedefs
        .iter()
        .copied()
        .find(|&tid| ctx.type_data(tid).name.as_ref() == name)
}

/// Validate that the restrictions attached to a type are legal for its
/// resolved base, and compute the effective range/length intersections
/// and compiled patterns.
fn check_restrictions(
    ctx: &mut Context,
    tid: TypeId,
    base: DataValueType,
    parent: Option<TypeId>,
    line: u32,
) -> Result<()> {
    use DataValueType::*;

    let illegal = |what: &str| {
        Err::<(), Error>(
            Error::new(
                ErrorCode::Inval,
                format!(
                    "Restriction \"{}\" not allowed for base type {}",
                    what,
                    base.name()
                ),
            )
            .with_line(line),
        )
    };

    // Restriction legality matrix.
    let tdata = ctx.type_data(tid);
    if tdata.length.is_some() && !matches!(base, String | Binary) {
        illegal("length")?;
    }
    if tdata.range.is_some()
        && !matches!(
            base,
            Int8 | Int16 | Int32 | Int64 | Uint8 | Uint16 | Uint32
                | Uint64 | Dec64
        )
    {
        illegal("range")?;
    }
    if !tdata.patterns.is_empty() && base != String {
        illegal("pattern")?;
    }
    if tdata.frac_digits.is_some() && base != Dec64 {
        illegal("fraction-digits")?;
    }
    if !tdata.enums.is_empty() && base != Enum {
        illegal("enum")?;
    }
    if !tdata.bits.is_empty() && base != Bits {
        illegal("bit")?;
    }
    if tdata.path.is_some() && base != LeafRef {
        illegal("path")?;
    }
    if tdata.ident_base_name.is_some() && base != IdentityRef {
        illegal("base")?;
    }
    if !tdata.union_types.is_empty() && base != Union {
        illegal("type")?;
    }

    // Mandatory substatements at the level where the built-in is
    // named directly.
    if parent.is_none() {
        let missing = match base {
            Dec64 if tdata.frac_digits.is_none() => {
                Some("fraction-digits")
            }
            Enum if tdata.enums.is_empty() => Some("enum"),
            Bits if tdata.bits.is_empty() => Some("bit"),
            LeafRef if tdata.path.is_none() => Some("path"),
            IdentityRef if tdata.ident_base_name.is_none() => Some("base"),
            Union if tdata.union_types.is_empty() => Some("type"),
            _ => None,
        };
        if let Some(missing) = missing {
            return Err(Error::new(
                ErrorCode::Misselem,
                format!(
                    "Missing \"{}\" substatement of type {}",
                    missing,
                    base.name()
                ),
            )
            .with_line(line));
        }
    } else {
        if tdata.frac_digits.is_some() {
            return Err(Error::new(
                ErrorCode::Inval,
                "fraction-digits cannot be changed in a derived type",
            )
            .with_line(line));
        }
    }

    // Derived enums/bits may only restrict the parent's set.
    if matches!(base, Enum | Bits) && parent.is_some() {
        check_subset_members(ctx, tid, parent.unwrap(), base, line)?;
    }

    // Effective fraction-digits for decimal64 range parsing.
    let frac_digits = match base {
        Dec64 => {
            let mut fd = ctx.type_data(tid).frac_digits;
            let mut cursor = parent;
            while fd.is_none() {
                match cursor {
                    Some(pid) => {
                        fd = ctx.type_data(pid).frac_digits;
                        cursor = ctx.type_data(pid).parent;
                    }
                    None => {
                        return Err(Error::new(
                            ErrorCode::Int,
                            "decimal64 chain without fraction-digits",
                        )
                        .with_line(line));
                    }
                }
            }
            fd
        }
        _ => None,
    };

    // Range intersection.
    if let Some(range) = ctx.type_data(tid).range.clone() {
        let bounds = value::base_range_bounds(base, frac_digits);
        let parsed = parse_range_arg(
            &range,
            bounds,
            &|part| value::parse_range_value(base, frac_digits, part),
            line,
        )?;
        let effective = match parent.and_then(|pid| effective_range(ctx, pid))
        {
            Some(parent_range) => {
                intersect_intervals(&parsed, parent_range)
            }
            None => intersect_intervals(&parsed, &[bounds]),
        };
        if effective.is_empty() {
            return Err(Error::new(
                ErrorCode::Inval,
                "Range restriction is outside the parent type's range",
            )
            .with_line(line));
        }
        ctx.type_data_mut(tid).resolved_range = Some(effective);
    }

    // Length intersection.
    if let Some(length) = ctx.type_data(tid).length.clone() {
        let bounds = (0, u64::MAX as i128);
        let parsed = parse_range_arg(
            &length,
            bounds,
            &|part| {
                part.parse::<u64>().map(|v| v as i128).map_err(|_| {
                    Error::new(
                        ErrorCode::Inval,
                        format!("Invalid length value \"{}\"", part),
                    )
                })
            },
            line,
        )?;
        let parsed: Vec<(u64, u64)> = parsed
            .into_iter()
            .map(|(lo, hi)| (lo as u64, hi as u64))
            .collect();
        let effective =
            match parent.and_then(|pid| effective_length(ctx, pid)) {
                Some(parent_length) => parsed
                    .iter()
                    .flat_map(|&(lo, hi)| {
                        parent_length.iter().filter_map(move |&(plo, phi)| {
                            let lo = lo.max(plo);
                            let hi = hi.min(phi);
                            if lo <= hi {
                                Some((lo, hi))
                            } else {
                                None
                            }
                        })
                    })
                    .collect(),
                None => parsed,
            };
        if effective.is_empty() {
            return Err(Error::new(
                ErrorCode::Inval,
                "Length restriction is outside the parent type's length",
            )
            .with_line(line));
        }
        ctx.type_data_mut(tid).resolved_length = Some(effective);
    }

    // Compile the patterns once; they are reused for every decoded
    // value.
    let patterns = ctx.type_data(tid).patterns.clone();
    let mut compiled = Vec::with_capacity(patterns.len());
    for pattern in &patterns {
        compiled.push(value::compile_pattern(pattern).map_err(|err| {
            err.with_line(line)
        })?);
    }
    ctx.type_data_mut(tid).compiled_patterns = compiled;

    Ok(())
}

/// Members of a derived enumeration/bits type must name members of the
/// parent type; values/positions are inherited unless restated
/// identically.
fn check_subset_members(
    ctx: &mut Context,
    tid: TypeId,
    parent: TypeId,
    base: DataValueType,
    line: u32,
) -> Result<()> {
    if base == DataValueType::Enum {
        let parent_enums = match effective_enums(ctx, parent) {
            Some(enums) => enums.to_vec(),
            None => return Ok(()),
        };
        for member in &mut ctx.type_data_mut(tid).enums {
            match parent_enums.iter().find(|p| p.name == member.name) {
                Some(pmember) => {
                    if member.value_set && member.value != pmember.value {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            format!(
                                "Enum \"{}\" changes the value inherited from the base type",
                                member.name
                            ),
                        )
                        .with_line(line));
                    }
                    member.value = pmember.value;
                }
                None => {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        format!(
                            "Enum \"{}\" is not defined in the base type",
                            member.name
                        ),
                    )
                    .with_line(line));
                }
            }
        }
    } else {
        let parent_bits = match effective_bits(ctx, parent) {
            Some(bits) => bits.to_vec(),
            None => return Ok(()),
        };
        for member in &mut ctx.type_data_mut(tid).bits {
            match parent_bits.iter().find(|p| p.name == member.name) {
                Some(pmember) => {
                    if member.pos_set && member.pos != pmember.pos {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            format!(
                                "Bit \"{}\" changes the position inherited from the base type",
                                member.name
                            ),
                        )
                        .with_line(line));
                    }
                    member.pos = pmember.pos;
                }
                None => {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        format!(
                            "Bit \"{}\" is not defined in the base type",
                            member.name
                        ),
                    )
                    .with_line(line));
                }
            }
        }
    }
    Ok(())
}

/// Parse a range/length argument (`"min..10|20..max"`) into a sorted
/// list of disjoint closed intervals.
fn parse_range_arg(
    arg: &str,
    bounds: (i128, i128),
    parse: &dyn Fn(&str) -> Result<i128>,
    line: u32,
) -> Result<Vec<(i128, i128)>> {
    let mut intervals = Vec::new();
    for part in arg.split('|') {
        let part = part.trim();
        let (lo, hi) = match part.split_once("..") {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => (part, part),
        };
        let parse_bound = |bound: &str| -> Result<i128> {
            match bound {
                "min" => Ok(bounds.0),
                "max" => Ok(bounds.1),
                _ => parse(bound),
            }
        };
        let lo = parse_bound(lo).map_err(|err| err.with_line(line))?;
        let hi = parse_bound(hi).map_err(|err| err.with_line(line))?;
        if lo > hi {
            return Err(Error::new(
                ErrorCode::Inval,
                format!("Invalid range part \"{}\"", part),
            )
            .with_line(line));
        }
        if let Some(&(_, prev_hi)) = intervals.last() {
            if lo <= prev_hi {
                return Err(Error::new(
                    ErrorCode::Inval,
                    format!(
                        "Range parts must be disjoint and ascending: \"{}\"",
                        arg
                    ),
                )
                .with_line(line));
            }
        }
        intervals.push((lo, hi));
    }
    if intervals.is_empty() {
        return Err(Error::new(
            ErrorCode::Inval,
            format!("Empty range argument \"{}\"", arg),
        )
        .with_line(line));
    }
    Ok(intervals)
}

/// Intersection of two sorted disjoint interval lists.
pub(crate) fn intersect_intervals(
    a: &[(i128, i128)],
    b: &[(i128, i128)],
) -> Vec<(i128, i128)> {
    let mut out = Vec::new();
    for &(alo, ahi) in a {
        for &(blo, bhi) in b {
            let lo = alo.max(blo);
            let hi = ahi.min(bhi);
            if lo <= hi {
                out.push((lo, hi));
            }
        }
    }
    out
}

// ===== effective restriction lookups (nearest level wins) =====

pub(crate) fn effective_range(
    ctx: &Context,
    tid: TypeId,
) -> Option<&Vec<(i128, i128)>> {
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        let tdata = ctx.type_data(id);
        if tdata.resolved_range.is_some() {
            return tdata.resolved_range.as_ref();
        }
        cursor = tdata.parent;
    }
    None
}

pub(crate) fn effective_length(
    ctx: &Context,
    tid: TypeId,
) -> Option<&Vec<(u64, u64)>> {
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        let tdata = ctx.type_data(id);
        if tdata.resolved_length.is_some() {
            return tdata.resolved_length.as_ref();
        }
        cursor = tdata.parent;
    }
    None
}

pub(crate) fn effective_frac_digits(ctx: &Context, tid: TypeId) -> Option<u8> {
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        let tdata = ctx.type_data(id);
        if tdata.frac_digits.is_some() {
            return tdata.frac_digits;
        }
        cursor = tdata.parent;
    }
    None
}

pub(crate) fn effective_enums(
    ctx: &Context,
    tid: TypeId,
) -> Option<&Vec<crate::schema::TypeEnum>> {
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        let tdata = ctx.type_data(id);
        if !tdata.enums.is_empty() {
            return Some(&tdata.enums);
        }
        cursor = tdata.parent;
    }
    None
}

pub(crate) fn effective_bits(
    ctx: &Context,
    tid: TypeId,
) -> Option<&Vec<crate::schema::TypeBit>> {
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        let tdata = ctx.type_data(id);
        if !tdata.bits.is_empty() {
            return Some(&tdata.bits);
        }
        cursor = tdata.parent;
    }
    None
}

pub(crate) fn effective_union_types(
    ctx: &Context,
    tid: TypeId,
) -> Option<&Vec<TypeId>> {
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        let tdata = ctx.type_data(id);
        if !tdata.union_types.is_empty() {
            return Some(&tdata.union_types);
        }
        cursor = tdata.parent;
    }
    None
}

pub(crate) fn effective_ident_base(
    ctx: &Context,
    tid: TypeId,
) -> Option<IdentId> {
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        let tdata = ctx.type_data(id);
        if tdata.ident_base.is_some() {
            return tdata.ident_base;
        }
        cursor = tdata.parent;
    }
    None
}

pub(crate) fn effective_leafref_path(
    ctx: &Context,
    tid: TypeId,
) -> Option<(TypeId, Arc<str>)> {
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        let tdata = ctx.type_data(id);
        if let Some(path) = &tdata.path {
            return Some((id, path.clone()));
        }
        cursor = tdata.parent;
    }
    None
}

/// All patterns along the derivation chain, ancestor-most first.
pub(crate) fn collect_patterns<'a>(
    ctx: &'a Context,
    tid: TypeId,
) -> Vec<&'a regex::Regex> {
    let mut levels = Vec::new();
    let mut cursor = Some(tid);
    while let Some(id) = cursor {
        levels.push(id);
        cursor = ctx.type_data(id).parent;
    }
    levels
        .into_iter()
        .rev()
        .flat_map(|id| ctx.type_data(id).compiled_patterns.iter())
        .collect()
}

/// The effective type of a leafref: the target leaf's type, following
/// chained leafrefs to a non-leafref type.
pub(crate) fn leafref_chain_target(
    ctx: &Context,
    tid: TypeId,
) -> Option<TypeId> {
    let mut cursor = tid;
    for _ in 0..32 {
        let target_snode = {
            let mut level = Some(cursor);
            let mut found = None;
            while let Some(id) = level {
                if let Some(target) = ctx.type_data(id).leafref_target {
                    found = Some(target);
                    break;
                }
                level = ctx.type_data(id).parent;
            }
            found?
        };
        let target_type = crate::schema::snode_type(ctx, target_snode)?;
        if ctx.type_data(target_type).base != DataValueType::LeafRef {
            return Some(target_type);
        }
        cursor = target_type;
    }
    None
}

/// Whether `candidate` is the given base identity or transitively
/// derived from it. Accepting the base itself matches YANG 1.0
/// identityref semantics.
pub(crate) fn identity_derived_from(
    ctx: &Context,
    candidate: IdentId,
    base: IdentId,
) -> bool {
    let mut cursor = Some(candidate);
    while let Some(id) = cursor {
        if id == base {
            return true;
        }
        cursor = ctx.ident_data(id).base;
    }
    false
}

// ===== IDENTITY =====

fn resolve_identity(
    ctx: &mut Context,
    ident: IdentId,
    line: u32,
) -> Result<Outcome> {
    let idata = ctx.ident_data(ident);
    if idata.base.is_some() {
        return Ok(Outcome::Resolved);
    }
    let base_name = idata.base_name.clone().unwrap();
    let module = idata.module;

    let base = match lookup_identity(ctx, module, &base_name) {
        Some(base) => base,
        None => {
            return Ok(Outcome::Deferred(
                Error::new(
                    ErrorCode::Inval,
                    format!("Unknown identity \"{}\"", base_name),
                )
                .with_line(line),
            ));
        }
    };
    if base == ident {
        return Err(Error::new(
            ErrorCode::Circular,
            format!(
                "Identity \"{}\" references itself",
                ctx.ident_data(ident).name
            ),
        )
        .with_line(line));
    }
    // Walk the existing chain from the base: finding ourselves there
    // closes a cycle.
    let mut cursor = ctx.ident_data(base).base;
    while let Some(id) = cursor {
        if id == ident {
            return Err(Error::new(
                ErrorCode::Circular,
                format!(
                    "Identity \"{}\" base hierarchy forms a cycle",
                    ctx.ident_data(ident).name
                ),
            )
            .with_line(line));
        }
        cursor = ctx.ident_data(id).base;
    }

    ctx.identities[ident.0 as usize].base = Some(base);
    Ok(Outcome::Resolved)
}

pub(crate) fn lookup_identity(
    ctx: &Context,
    module: ModuleId,
    name: &str,
) -> Option<IdentId> {
    let (prefix, name) = split_prefix(name);
    let module = match prefix {
        Some(prefix) => ctx.resolve_prefix(module, prefix)?,
        None => module,
    };
    ctx.module_data(module)
        .identities
        .iter()
        .copied()
        .find(|&ident| ctx.ident_data(ident).name.as_ref() == name)
}

// ===== features =====

/// Resolve a possibly-prefixed feature name in the scope of a module.
/// The outer Result is fatal (unknown prefix); the inner one separates
/// found from deferred.
fn lookup_feature(
    ctx: &Context,
    module: ModuleId,
    name: &str,
    line: u32,
) -> Result<std::result::Result<FeatId, Error>> {
    let (prefix, fname) = split_prefix(name);
    let module = match prefix {
        Some(prefix) => match ctx.resolve_prefix(module, prefix) {
            Some(module) => module,
            None => {
                return Err(Error::new(
                    ErrorCode::Inmod,
                    format!("Unknown prefix \"{}\"", prefix),
                )
                .with_line(line));
            }
        },
        None => module,
    };
    let found = ctx
        .module_data(module)
        .features
        .iter()
        .copied()
        .find(|&feat| ctx.feature_data(feat).name.as_ref() == fname);
    Ok(found.ok_or_else(|| {
        Error::new(
            ErrorCode::Inval,
            format!("Unknown feature \"{}\"", name),
        )
        .with_line(line)
    }))
}

// ===== LEAFREF =====

fn resolve_leafref(
    ctx: &mut Context,
    snode: SnodeId,
    line: u32,
) -> Result<Outcome> {
    let tid = match crate::schema::snode_type(ctx, snode) {
        Some(tid) => tid,
        None => return Ok(Outcome::Resolved),
    };
    if !ctx.type_data(tid).resolved {
        return Ok(Outcome::Deferred(
            Error::new(ErrorCode::Inval, "Leaf type not yet resolved")
                .with_line(line),
        ));
    }
    if ctx.type_data(tid).base != DataValueType::LeafRef {
        return Ok(Outcome::Resolved);
    }
    if ctx.type_data(tid).leafref_target.is_some() {
        return Ok(Outcome::Resolved);
    }

    let (path_tid, path) = match effective_leafref_path(ctx, tid) {
        Some(found) => found,
        None => return Ok(Outcome::Resolved),
    };
    let path_module = ctx.type_data(path_tid).module;
    let parsed = ident::parse_leafref_path(&path)?;

    // Establish the starting position.
    let mut position = if parsed.absolute {
        SchemaParent::Module(path_module)
    } else {
        let mut position = match ctx.snode(snode).parent {
            Some(parent) => SchemaParent::Node(parent),
            None => SchemaParent::Module(ctx.snode(snode).module),
        };
        for _ in 0..parsed.up - 1 {
            position = match position {
                SchemaParent::Node(id) => match ctx.snode(id).parent {
                    Some(parent) => SchemaParent::Node(parent),
                    None => SchemaParent::Module(ctx.snode(id).module),
                },
                SchemaParent::Module(_) => {
                    return Err(Error::new(
                        ErrorCode::LeafrefTarget,
                        format!("Leafref path \"{}\" escapes the schema tree", path),
                    )
                    .with_line(line));
                }
            };
        }
        position
    };

    let mut target = None;
    for (idx, step) in parsed.steps.iter().enumerate() {
        let module = match &step.node.0 {
            Some(prefix) => {
                ctx.resolve_prefix(path_module, prefix).ok_or_else(|| {
                    Error::new(
                        ErrorCode::Inmod,
                        format!("Unknown prefix \"{}\"", prefix),
                    )
                    .with_line(line)
                })?
            }
            None => path_module,
        };
        // When the path is absolute, the first step starts at the
        // target module's top level.
        if parsed.absolute && idx == 0 {
            position = SchemaParent::Module(module);
        }
        let first = crate::schema::first_child(ctx, position);
        let found =
            find_schema_step(ctx, first, module, &step.node.1);
        let found = match found {
            Some(found) => found,
            None => {
                return Ok(Outcome::Deferred(
                    Error::new(
                        ErrorCode::LeafrefTarget,
                        format!(
                            "Leafref path \"{}\": node \"{}\" not found",
                            path, step.node.1
                        ),
                    )
                    .with_line(line),
                ));
            }
        };
        // Key predicates must name keys of the stepped list.
        for pred in &step.preds {
            let keys: Vec<SnodeId> = match &ctx.snode(found).payload {
                SnodePayload::List { keys, .. } => keys.clone(),
                _ => {
                    return Err(Error::new(
                        ErrorCode::LeafrefTarget,
                        format!(
                            "Leafref predicate on non-list node \"{}\"",
                            step.node.1
                        ),
                    )
                    .with_line(line));
                }
            };
            if keys.is_empty() {
                // List keys may not be resolved yet.
                return Ok(Outcome::Deferred(
                    Error::new(
                        ErrorCode::LeafrefTarget,
                        format!(
                            "Leafref path \"{}\": keys of \"{}\" not resolved",
                            path, step.node.1
                        ),
                    )
                    .with_line(line),
                ));
            }
            if !keys
                .iter()
                .any(|&key| ctx.snode(key).name.as_ref() == pred.key.1)
            {
                return Err(Error::new(
                    ErrorCode::LeafrefTarget,
                    format!(
                        "Leafref predicate names \"{}\" which is not a key of \"{}\"",
                        pred.key.1, step.node.1
                    ),
                )
                .with_line(line));
            }
        }
        position = SchemaParent::Node(found);
        target = Some(found);
    }

    let target = target.unwrap();
    if !matches!(
        ctx.snode(target).kind,
        SchemaNodeKind::Leaf | SchemaNodeKind::LeafList
    ) {
        return Err(Error::new(
            ErrorCode::LeafrefTarget,
            format!("Leafref path \"{}\" does not point to a leaf", path),
        )
        .with_line(line));
    }
    let target_type = crate::schema::snode_type(ctx, target).unwrap();
    if !ctx.type_data(target_type).resolved {
        return Ok(Outcome::Deferred(
            Error::new(
                ErrorCode::LeafrefTarget,
                format!("Leafref target type of \"{}\" not resolved", path),
            )
            .with_line(line),
        ));
    }

    ctx.type_data_mut(tid).leafref_target = Some(target);
    Ok(Outcome::Resolved)
}

/// Find a named schema child, walking transparently through `uses`
/// nodes and skipping groupings. Choice and case nodes are addressable
/// (schema-node-ids name them explicitly).
pub(crate) fn find_schema_step(
    ctx: &Context,
    first: Option<SnodeId>,
    module: ModuleId,
    name: &str,
) -> Option<SnodeId> {
    let mut next = first;
    while let Some(id) = next {
        let snode = ctx.snode(id);
        match snode.kind {
            SchemaNodeKind::Uses => {
                if let Some(found) =
                    find_schema_step(ctx, snode.child, module, name)
                {
                    return Some(found);
                }
            }
            SchemaNodeKind::Grouping | SchemaNodeKind::Augment => (),
            _ => {
                if snode.name.as_ref() == name && snode.module == module {
                    return Some(id);
                }
            }
        }
        next = snode.next;
    }
    None
}

// ===== USES =====

fn resolve_uses(
    ctx: &mut Context,
    mid: ModuleId,
    session: &mut ParseSession,
    uses: SnodeId,
    line: u32,
) -> Result<Outcome> {
    let (grouping_arg, expanded) = match &ctx.snode(uses).payload {
        SnodePayload::Uses {
            grouping, expanded, ..
        } => (grouping.clone(), *expanded),
        _ => return Ok(Outcome::Resolved),
    };
    if expanded {
        return Ok(Outcome::Resolved);
    }

    let grouping = match lookup_grouping(ctx, uses, &grouping_arg) {
        Some(grouping) => grouping,
        None => {
            return Ok(Outcome::Deferred(
                Error::new(
                    ErrorCode::Inval,
                    format!("Unknown grouping \"{}\"", grouping_arg),
                )
                .with_line(line),
            ));
        }
    };

    // Wait until the grouping itself contains no unexpanded uses, so a
    // single deep copy captures the complete subtree. A cyclic
    // uses/grouping pair never converges and is reported when the
    // queue stalls.
    if has_unexpanded_uses(ctx, grouping) {
        return Ok(Outcome::Deferred(
            Error::new(
                ErrorCode::Circular,
                format!(
                    "Grouping \"{}\" is not fully expanded",
                    grouping_arg
                ),
            )
            .with_line(line),
        ));
    }

    let enqueue_leafrefs = !inside_grouping(ctx, uses);

    // Instantiate a deep copy of the grouping's children.
    let mut child = ctx.snode(grouping).child;
    while let Some(src) = child {
        child = ctx.snode(src).next;
        if ctx.snode(src).kind == SchemaNodeKind::Grouping {
            continue;
        }
        dup_subtree(
            ctx,
            session,
            src,
            mid,
            SnodeOrigin::Uses(uses),
            SchemaParent::Node(uses),
            enqueue_leafrefs,
        )?;
    }

    // Apply refinements.
    let refines = match &ctx.snode(uses).payload {
        SnodePayload::Uses { refines, .. } => refines.clone(),
        _ => unreachable!(),
    };
    for refine in &refines {
        apply_refine(ctx, uses, refine, line)?;
    }

    // Apply uses-level augments within the expanded subtree.
    let augments = match &ctx.snode(uses).payload {
        SnodePayload::Uses { augments, .. } => augments.clone(),
        _ => unreachable!(),
    };
    for augment in augments {
        let target_path = match &ctx.snode(augment).payload {
            SnodePayload::Augment { target, .. } => target.clone(),
            _ => continue,
        };
        let (absolute, steps) = ident::parse_schema_nodeid(&target_path)?;
        if absolute {
            return Err(Error::new(
                ErrorCode::Inval,
                "Augment inside uses takes a relative target path",
            )
            .with_line(line));
        }
        let target =
            walk_schema_steps(ctx, SchemaParent::Node(uses), &steps, mid)
                .ok_or_else(|| {
                    Error::new(
                        ErrorCode::Inelem,
                        format!(
                            "Augment target \"{}\" not found",
                            target_path
                        ),
                    )
                    .with_line(line)
                })?;
        splice_augment(ctx, augment, target)?;
    }

    if let SnodePayload::Uses { expanded, .. } =
        &mut ctx.snode_mut(uses).payload
    {
        *expanded = true;
    }
    Ok(Outcome::Resolved)
}

/// Search for a grouping: ancestor scopes first, then the module (or
/// the prefixed module's) top level.
fn lookup_grouping(
    ctx: &Context,
    uses: SnodeId,
    name: &str,
) -> Option<SnodeId> {
    let (prefix, gname) = split_prefix(name);
    let module = ctx.snode(uses).module;

    if let Some(prefix) = prefix {
        let tmod = ctx.resolve_prefix(module, prefix)?;
        if tmod != module {
            return find_grouping_in_ring(
                ctx,
                ctx.module_data(tmod).data,
                gname,
            );
        }
    }

    // Walk the ancestor scopes.
    let mut scope = ctx.snode(uses).parent;
    while let Some(id) = scope {
        if let Some(found) =
            find_grouping_in_ring(ctx, ctx.snode(id).child, gname)
        {
            return Some(found);
        }
        scope = ctx.snode(id).parent;
    }
    find_grouping_in_ring(ctx, ctx.module_data(module).data, gname)
}

fn find_grouping_in_ring(
    ctx: &Context,
    first: Option<SnodeId>,
    name: &str,
) -> Option<SnodeId> {
    let mut next = first;
    while let Some(id) = next {
        let snode = ctx.snode(id);
        if snode.kind == SchemaNodeKind::Grouping
            && snode.name.as_ref() == name
        {
            return Some(id);
        }
        next = snode.next;
    }
    None
}

fn has_unexpanded_uses(ctx: &Context, root: SnodeId) -> bool {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let snode = ctx.snode(id);
        if let SnodePayload::Uses { expanded, .. } = &snode.payload {
            if !expanded {
                return true;
            }
        }
        let mut child = snode.child;
        while let Some(c) = child {
            stack.push(c);
            child = ctx.snode(c).next;
        }
    }
    false
}

fn inside_grouping(ctx: &Context, snode: SnodeId) -> bool {
    let mut cursor = ctx.snode(snode).parent;
    while let Some(id) = cursor {
        if ctx.snode(id).kind == SchemaNodeKind::Grouping {
            return true;
        }
        cursor = ctx.snode(id).parent;
    }
    false
}

/// Deep-copy a schema subtree for a grouping instantiation.
fn dup_subtree(
    ctx: &mut Context,
    session: &mut ParseSession,
    src: SnodeId,
    module: ModuleId,
    origin: SnodeOrigin,
    parent: SchemaParent,
    enqueue_leafrefs: bool,
) -> Result<SnodeId> {
    let mut data = ctx.snode(src).clone();
    let line = data.line;
    data.parent = None;
    data.next = None;
    data.child = None;
    data.module = module;
    data.origin = origin;
    // If-feature references are re-resolved per instance.
    data.iffeatures = Vec::new();
    let iffeature_names = data.iffeature_names.clone();

    match &mut data.payload {
        SnodePayload::Leaf { ty, .. } | SnodePayload::LeafList { ty, .. } => {
            // Each instance owns its type level, so leafref targets
            // and restriction state stay per-instance.
            let mut tdata = clone_type_level(ctx, *ty);
            tdata.leafref_target = None;
            let new_ty = ctx.alloc_type(tdata);
            *ty = new_ty;
            session.unres.push(UnresItem {
                kind: UnresKind::Type(new_ty),
                line,
            });
        }
        SnodePayload::List { keys, uniques, .. } => {
            keys.clear();
            for unique in uniques.iter_mut() {
                unique.nodes.clear();
            }
        }
        SnodePayload::Choice { default, .. } => {
            *default = None;
        }
        SnodePayload::Uses {
            refines, augments, ..
        } => {
            // The copy is already expanded; the originating statements
            // are only printed for the declared instance.
            refines.clear();
            augments.clear();
        }
        SnodePayload::Augment {
            target_node,
            children,
            ..
        } => {
            *target_node = None;
            children.clear();
        }
        _ => (),
    }

    let id = ctx.alloc_snode(data);
    ctx.snode_mut(id).prev = id;
    snode_link(ctx, parent, id)?;

    for name in iffeature_names {
        session.unres.push(UnresItem {
            kind: UnresKind::IfFeatSnode(id, name),
            line,
        });
    }
    match &ctx.snode(id).payload {
        SnodePayload::List { keys_str, uniques, .. } => {
            if keys_str.is_some() {
                session.unres.push(UnresItem {
                    kind: UnresKind::ListKeys(id),
                    line,
                });
            }
            if !uniques.is_empty() {
                session.unres.push(UnresItem {
                    kind: UnresKind::ListUnique(id),
                    line,
                });
            }
        }
        SnodePayload::Leaf { .. } | SnodePayload::LeafList { .. } => {
            if enqueue_leafrefs {
                session.unres.push(UnresItem {
                    kind: UnresKind::Leafref(id),
                    line,
                });
            }
        }
        _ => (),
    }

    let mut child = ctx.snode(src).child;
    while let Some(c) = child {
        child = ctx.snode(c).next;
        if ctx.snode(c).kind == SchemaNodeKind::Grouping {
            continue;
        }
        dup_subtree(
            ctx,
            session,
            c,
            module,
            SnodeOrigin::Declared,
            SchemaParent::Node(id),
            enqueue_leafrefs,
        )?;
    }
    Ok(id)
}

fn clone_type_level(ctx: &Context, tid: TypeId) -> crate::schema::TypeData {
    let src = ctx.type_data(tid);
    crate::schema::TypeData {
        name: src.name.clone(),
        is_typedef: src.is_typedef,
        base_name: src.base_name.clone(),
        module: src.module,
        scope: src.scope,
        line: src.line,
        resolved: false,
        base: DataValueType::Unknown,
        parent: None,
        range: src.range.clone(),
        length: src.length.clone(),
        patterns: src.patterns.clone(),
        frac_digits: src.frac_digits,
        enums: src.enums.clone(),
        bits: src.bits.clone(),
        path: src.path.clone(),
        union_types: src.union_types.clone(),
        ident_base_name: src.ident_base_name.clone(),
        compiled_patterns: Vec::new(),
        resolved_range: None,
        resolved_length: None,
        leafref_target: None,
        ident_base: None,
        default: src.default.clone(),
        units: src.units.clone(),
        dsc: src.dsc.clone(),
        ref_: src.ref_.clone(),
    }
}

/// Apply a `refine` to its target inside the expanded `uses` subtree.
fn apply_refine(
    ctx: &mut Context,
    uses: SnodeId,
    refine: &crate::schema::RefineSpec,
    line: u32,
) -> Result<()> {
    let (absolute, steps) = ident::parse_schema_nodeid(&refine.target)?;
    if absolute {
        return Err(Error::new(
            ErrorCode::Inval,
            "Refine takes a descendant target path",
        )
        .with_line(line));
    }
    let module = ctx.snode(uses).module;
    let target =
        walk_schema_steps(ctx, SchemaParent::Node(uses), &steps, module)
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::Inelem,
                    format!("Refine target \"{}\" not found", refine.target),
                )
                .with_line(line)
            })?;

    if let Some(dsc) = &refine.dsc {
        ctx.snode_mut(target).dsc = Some(dsc.clone());
    }
    if let Some(ref_) = &refine.ref_ {
        ctx.snode_mut(target).ref_ = Some(ref_.clone());
    }
    if let Some(config) = refine.config {
        let flags = &mut ctx.snode_mut(target).flags;
        flags.insert(SnodeFlags::CONFIG_SET);
        flags.remove(SnodeFlags::CONFIG_W | SnodeFlags::CONFIG_R);
        flags.insert(if config {
            SnodeFlags::CONFIG_W
        } else {
            SnodeFlags::CONFIG_R
        });
    }
    if let Some(mandatory) = refine.mandatory {
        let flags = &mut ctx.snode_mut(target).flags;
        flags.remove(SnodeFlags::MAND_TRUE | SnodeFlags::MAND_FALSE);
        flags.insert(if mandatory {
            SnodeFlags::MAND_TRUE
        } else {
            SnodeFlags::MAND_FALSE
        });
    }
    for must in &refine.musts {
        ctx.snode_mut(target).musts.push(must.clone());
    }
    match &mut ctx.snode_mut(target).payload {
        SnodePayload::Container { presence } => {
            if let Some(new) = &refine.presence {
                *presence = Some(new.clone());
            }
        }
        SnodePayload::Leaf { default, .. } => {
            if let Some(new) = &refine.default {
                *default = Some(new.clone());
            }
        }
        SnodePayload::Choice { default_name, .. } => {
            if let Some(new) = &refine.default {
                *default_name = Some(new.clone());
            }
        }
        SnodePayload::LeafList { min, max, .. }
        | SnodePayload::List { min, max, .. } => {
            if let Some(new) = refine.min {
                *min = new;
            }
            if let Some(new) = refine.max {
                *max = if new == u32::MAX { None } else { Some(new) };
            }
        }
        _ => (),
    }
    Ok(())
}

/// Walk a multi-step schema-node-id from a starting position.
fn walk_schema_steps(
    ctx: &Context,
    start: SchemaParent,
    steps: &[(Option<String>, String)],
    default_module: ModuleId,
) -> Option<SnodeId> {
    let mut position = start;
    let mut found = None;
    for (prefix, name) in steps {
        let module = match prefix {
            Some(prefix) => ctx.resolve_prefix(default_module, prefix)?,
            None => default_module,
        };
        let first = crate::schema::first_child(ctx, position);
        let target = find_schema_step(ctx, first, module, name)?;
        position = SchemaParent::Node(target);
        found = Some(target);
    }
    found
}

// ===== AUGMENT =====

fn resolve_augment(
    ctx: &mut Context,
    augment: SnodeId,
    line: u32,
) -> Result<Outcome> {
    let (target_path, already) = match &ctx.snode(augment).payload {
        SnodePayload::Augment {
            target,
            target_node,
            ..
        } => (target.clone(), target_node.is_some()),
        _ => return Ok(Outcome::Resolved),
    };
    if already {
        return Ok(Outcome::Resolved);
    }

    let module = ctx.snode(augment).module;
    let (absolute, steps) = ident::parse_schema_nodeid(&target_path)?;
    if !absolute {
        return Err(Error::new(
            ErrorCode::Inval,
            format!("Augment target \"{}\" must be absolute", target_path),
        )
        .with_line(line));
    }

    // The first step determines the target module.
    let first_module = match &steps[0].0 {
        Some(prefix) => {
            ctx.resolve_prefix(module, prefix).ok_or_else(|| {
                Error::new(
                    ErrorCode::Inmod,
                    format!("Unknown prefix \"{}\"", prefix),
                )
                .with_line(line)
            })?
        }
        None => module,
    };

    let target = walk_schema_steps(
        ctx,
        SchemaParent::Module(first_module),
        &steps,
        module,
    );
    let target = match target {
        Some(target) => target,
        None => {
            return Ok(Outcome::Deferred(
                Error::new(
                    ErrorCode::Inelem,
                    format!("Augment target \"{}\" not found", target_path),
                )
                .with_line(line),
            ));
        }
    };

    splice_augment(ctx, augment, target)?;
    Ok(Outcome::Resolved)
}

/// Move the children of an augment node into the target's child ring,
/// tagging each with the augment so the printer and the module of
/// origin stay correct.
fn splice_augment(
    ctx: &mut Context,
    augment: SnodeId,
    target: SnodeId,
) -> Result<()> {
    let mut moved = Vec::new();
    let mut child = ctx.snode(augment).child;
    ctx.snode_mut(augment).child = None;
    while let Some(id) = child {
        child = ctx.snode(id).next;
        {
            let snode = ctx.snode_mut(id);
            snode.parent = None;
            snode.next = None;
            snode.prev = id;
            snode.origin = SnodeOrigin::Augment(augment);
        }
        snode_link(ctx, SchemaParent::Node(target), id)?;
        moved.push(id);
    }
    if let SnodePayload::Augment {
        target_node,
        children,
        ..
    } = &mut ctx.snode_mut(augment).payload
    {
        *target_node = Some(target);
        *children = moved;
    }
    Ok(())
}

// ===== LIST_KEYS / LIST_UNIQUE =====

fn resolve_list_keys(
    ctx: &mut Context,
    list: SnodeId,
    line: u32,
) -> Result<Outcome> {
    let keys_str = match &ctx.snode(list).payload {
        SnodePayload::List { keys_str, keys, .. } => {
            if !keys.is_empty() {
                return Ok(Outcome::Resolved);
            }
            match keys_str {
                Some(keys_str) => keys_str.clone(),
                None => return Ok(Outcome::Resolved),
            }
        }
        _ => return Ok(Outcome::Resolved),
    };

    // Direct children may still arrive through unexpanded uses.
    let mut child = ctx.snode(list).child;
    while let Some(id) = child {
        if let SnodePayload::Uses { expanded, .. } = &ctx.snode(id).payload {
            if !expanded {
                return Ok(Outcome::Deferred(
                    Error::new(
                        ErrorCode::Inval,
                        format!(
                            "Keys of list \"{}\" depend on an unexpanded grouping",
                            ctx.snode(list).name
                        ),
                    )
                    .with_line(line),
                ));
            }
        }
        child = ctx.snode(id).next;
    }

    let list_config = snode_is_config(ctx, list);
    let mut keys = Vec::new();
    for token in keys_str.split_whitespace() {
        ident::check_identifier(token)?;
        if keys
            .iter()
            .any(|&key: &SnodeId| ctx.snode(key).name.as_ref() == token)
        {
            return Err(Error::new(
                ErrorCode::DupName,
                format!("Duplicated key \"{}\"", token),
            )
            .with_line(line));
        }
        let module = ctx.snode(list).module;
        let found = find_direct_leaf(ctx, list, module, token);
        let key = match found {
            Some(key) => key,
            None => {
                return Ok(Outcome::Deferred(
                    Error::new(
                        ErrorCode::Misselem,
                        format!(
                            "Key \"{}\" is not a direct leaf of list \"{}\"",
                            token,
                            ctx.snode(list).name
                        ),
                    )
                    .with_line(line),
                ));
            }
        };
        if ctx.snode(key).kind != SchemaNodeKind::Leaf {
            return Err(Error::new(
                ErrorCode::Inval,
                format!("Key \"{}\" must be a leaf", token),
            )
            .with_line(line));
        }
        if ctx.snode(key).flags.contains(SnodeFlags::MAND_FALSE) {
            return Err(Error::new(
                ErrorCode::Inval,
                format!("Key \"{}\" cannot be mandatory false", token),
            )
            .with_line(line));
        }
        if ctx.snode(key).flags.contains(SnodeFlags::CONFIG_SET)
            && snode_is_config(ctx, key) != list_config
        {
            return Err(Error::new(
                ErrorCode::Inval,
                format!(
                    "Key \"{}\" must have the same config value as its list",
                    token
                ),
            )
            .with_line(line));
        }
        let flags = &mut ctx.snode_mut(key).flags;
        flags.insert(SnodeFlags::KEY | SnodeFlags::MAND_TRUE);
        keys.push(key);
    }

    if let SnodePayload::List { keys: slot, .. } =
        &mut ctx.snode_mut(list).payload
    {
        *slot = keys;
    }
    Ok(Outcome::Resolved)
}

/// Find a direct child leaf of a list, walking through expanded uses
/// but not into choices.
fn find_direct_leaf(
    ctx: &Context,
    list: SnodeId,
    module: ModuleId,
    name: &str,
) -> Option<SnodeId> {
    fn walk(
        ctx: &Context,
        first: Option<SnodeId>,
        module: ModuleId,
        name: &str,
    ) -> Option<SnodeId> {
        let mut next = first;
        while let Some(id) = next {
            let snode = ctx.snode(id);
            match snode.kind {
                SchemaNodeKind::Uses => {
                    if let Some(found) =
                        walk(ctx, snode.child, module, name)
                    {
                        return Some(found);
                    }
                }
                SchemaNodeKind::Leaf | SchemaNodeKind::LeafList => {
                    if snode.name.as_ref() == name
                        && snode.module == module
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
    walk(ctx, ctx.snode(list).child, module, name)
}

fn resolve_list_unique(
    ctx: &mut Context,
    list: SnodeId,
    line: u32,
) -> Result<Outcome> {
    let uniques = match &ctx.snode(list).payload {
        SnodePayload::List { uniques, .. } => uniques.clone(),
        _ => return Ok(Outcome::Resolved),
    };
    let module = ctx.snode(list).module;

    let mut resolved = Vec::with_capacity(uniques.len());
    for unique in &uniques {
        let mut nodes = Vec::new();
        for token in unique.arg.split_whitespace() {
            let (absolute, steps) = ident::parse_schema_nodeid(token)?;
            if absolute {
                return Err(Error::new(
                    ErrorCode::Inval,
                    format!(
                        "Unique argument \"{}\" must be a descendant path",
                        token
                    ),
                )
                .with_line(line));
            }
            let target = walk_schema_steps(
                ctx,
                SchemaParent::Node(list),
                &steps,
                module,
            );
            let target = match target {
                Some(target) => target,
                None => {
                    return Ok(Outcome::Deferred(
                        Error::new(
                            ErrorCode::Misselem,
                            format!(
                                "Unique argument \"{}\" not found in list \"{}\"",
                                token,
                                ctx.snode(list).name
                            ),
                        )
                        .with_line(line),
                    ));
                }
            };
            if ctx.snode(target).kind != SchemaNodeKind::Leaf {
                return Err(Error::new(
                    ErrorCode::Inval,
                    format!(
                        "Unique argument \"{}\" does not point to a leaf",
                        token
                    ),
                )
                .with_line(line));
            }
            if nodes.contains(&target) {
                return Err(Error::new(
                    ErrorCode::DupName,
                    format!(
                        "Duplicated node \"{}\" in unique statement",
                        token
                    ),
                )
                .with_line(line));
            }
            nodes.push(target);
        }
        resolved.push(nodes);
    }

    if let SnodePayload::List { uniques, .. } =
        &mut ctx.snode_mut(list).payload
    {
        for (unique, nodes) in uniques.iter_mut().zip(resolved) {
            unique.nodes = nodes;
        }
    }
    Ok(Outcome::Resolved)
}

// ===== TYPEDEF_DFLT =====

fn resolve_typedef_default(
    ctx: &mut Context,
    tid: TypeId,
    line: u32,
) -> Result<Outcome> {
    if !ctx.type_data(tid).resolved {
        return Ok(Outcome::Deferred(
            Error::new(
                ErrorCode::Inval,
                format!(
                    "Default of typedef \"{}\" awaits type resolution",
                    ctx.type_data(tid).name
                ),
            )
            .with_line(line),
        ));
    }
    let default = match &ctx.type_data(tid).default {
        Some(default) => default.clone(),
        None => return Ok(Outcome::Resolved),
    };
    // Leafref and instance-identifier defaults can only be checked
    // against data.
    if matches!(
        ctx.type_data(tid).base,
        DataValueType::LeafRef | DataValueType::InstanceId
    ) {
        return Ok(Outcome::Resolved);
    }
    let module = ctx.type_data(tid).module;
    value::decode_with_type(ctx, tid, &default, module)
        .map_err(|err| err.with_line(line))?;
    Ok(Outcome::Resolved)
}

// ===== finalization =====

/// Checks that run once the queue is drained: choice defaults and
/// statement conflicts, leaf default validation.
fn finalize(ctx: &mut Context, mid: ModuleId) -> Result<()> {
    for idx in 0..ctx.snodes.len() {
        let id = SnodeId(idx as u32);
        if ctx.snode(id).module != mid {
            continue;
        }
        let line = ctx.snode(id).line;
        match &ctx.snode(id).payload {
            SnodePayload::Choice { default_name, default } => {
                if let (Some(default_name), None) = (default_name, default) {
                    if ctx.snode(id).flags.contains(SnodeFlags::MAND_TRUE) {
                        return Err(Error::new(
                            ErrorCode::Inval,
                            "A mandatory choice cannot have a default case",
                        )
                        .with_line(line));
                    }
                    let default_name = default_name.clone();
                    let module = ctx.snode(id).module;
                    let found = find_schema_step(
                        ctx,
                        ctx.snode(id).child,
                        module,
                        &default_name,
                    )
                    .ok_or_else(|| {
                        Error::new(
                            ErrorCode::Inval,
                            format!(
                                "Default case \"{}\" not found in choice \"{}\"",
                                default_name,
                                ctx.snode(id).name
                            ),
                        )
                        .with_line(line)
                    })?;
                    if let SnodePayload::Choice { default, .. } =
                        &mut ctx.snode_mut(id).payload
                    {
                        *default = Some(found);
                    }
                }
            }
            SnodePayload::Leaf { default, ty, .. } => {
                if default.is_some()
                    && ctx.snode(id).flags.contains(SnodeFlags::MAND_TRUE)
                {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        "A mandatory leaf cannot have a default value",
                    )
                    .with_line(line));
                }
                if let Some(default) = default.clone() {
                    let ty = *ty;
                    if !inside_grouping(ctx, id)
                        && !matches!(
                            ctx.type_data(ty).base,
                            DataValueType::LeafRef
                                | DataValueType::InstanceId
                        )
                    {
                        let module = ctx.snode(id).module;
                        value::decode_with_type(ctx, ty, &default, module)
                            .map_err(|err| err.with_line(line))?;
                    }
                }
            }
            _ => (),
        }
    }
    Ok(())
}
