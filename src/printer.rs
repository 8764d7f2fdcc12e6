//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Schema (YIN) and data (XML) printers.
//!
//! Round-trip contract: printing a parsed schema or data tree and
//! parsing the output again yields an equal model, up to whitespace
//! normalization and canonicalization of values.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::context::Context;
use crate::data::{DataPrinterFlags, DataTree, DnodeId};
use crate::error::{Error, ErrorCode, Result};
use crate::schema::{
    DataValueType, ModuleId, SchemaNodeKind, SchemaPrinterFlags, SnodeFlags,
    SnodeId, SnodeOrigin, SnodePayload, TypeId,
};

static YIN_NS: &str = "urn:ietf:params:xml:ns:yang:yin:1";

type XmlWriter = Writer<Vec<u8>>;

fn writer_error(err: impl std::fmt::Display) -> Error {
    Error::new(ErrorCode::Mem, format!("Write error: {}", err))
}

// ===== YIN schema printer =====

pub(crate) fn print_module_yin(
    ctx: &Context,
    mid: ModuleId,
    options: SchemaPrinterFlags,
) -> Result<String> {
    let mut writer = if options.contains(SchemaPrinterFlags::SHRINK) {
        Writer::new(Vec::new())
    } else {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    };
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(writer_error)?;

    let mdata = ctx.module_data(mid);
    let mut root = BytesStart::new("module");
    root.push_attribute(("name", mdata.name.as_ref()));
    root.push_attribute(("xmlns", YIN_NS));
    root.push_attribute((
        format!("xmlns:{}", mdata.prefix).as_str(),
        mdata.ns.as_ref(),
    ));
    for import in &mdata.imports {
        let imported = ctx.module_data(import.module);
        root.push_attribute((
            format!("xmlns:{}", import.prefix).as_str(),
            imported.ns.as_ref(),
        ));
    }
    writer
        .write_event(Event::Start(root))
        .map_err(writer_error)?;

    if let Some(version) = &mdata.version {
        simple_stmt(&mut writer, "yang-version", "value", version)?;
    }
    simple_stmt(&mut writer, "namespace", "uri", &mdata.ns)?;
    simple_stmt(&mut writer, "prefix", "value", &mdata.prefix)?;

    for import in &mdata.imports {
        let imported = ctx.module_data(import.module);
        let mut elem = BytesStart::new("import");
        elem.push_attribute(("module", imported.name.as_ref()));
        writer
            .write_event(Event::Start(elem))
            .map_err(writer_error)?;
        simple_stmt(&mut writer, "prefix", "value", &import.prefix)?;
        if let Some(revision) = &import.revision {
            simple_stmt(&mut writer, "revision-date", "date", revision)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("import")))
            .map_err(writer_error)?;
    }
    for (name, revision) in &mdata.includes {
        let mut elem = BytesStart::new("include");
        elem.push_attribute(("module", name.as_ref()));
        match revision {
            Some(revision) => {
                writer
                    .write_event(Event::Start(elem))
                    .map_err(writer_error)?;
                simple_stmt(&mut writer, "revision-date", "date", revision)?;
                writer
                    .write_event(Event::End(BytesEnd::new("include")))
                    .map_err(writer_error)?;
            }
            None => writer
                .write_event(Event::Empty(elem))
                .map_err(writer_error)?,
        }
    }

    if let Some(org) = &mdata.org {
        text_stmt(&mut writer, "organization", "text", org)?;
    }
    if let Some(contact) = &mdata.contact {
        text_stmt(&mut writer, "contact", "text", contact)?;
    }
    if let Some(dsc) = &mdata.dsc {
        text_stmt(&mut writer, "description", "text", dsc)?;
    }
    if let Some(ref_) = &mdata.ref_ {
        text_stmt(&mut writer, "reference", "text", ref_)?;
    }

    for revision in &mdata.revisions {
        let mut elem = BytesStart::new("revision");
        elem.push_attribute(("date", revision.date.as_ref()));
        if revision.dsc.is_none() && revision.ref_.is_none() {
            writer
                .write_event(Event::Empty(elem))
                .map_err(writer_error)?;
        } else {
            writer
                .write_event(Event::Start(elem))
                .map_err(writer_error)?;
            if let Some(dsc) = &revision.dsc {
                text_stmt(&mut writer, "description", "text", dsc)?;
            }
            if let Some(ref_) = &revision.ref_ {
                text_stmt(&mut writer, "reference", "text", ref_)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("revision")))
                .map_err(writer_error)?;
        }
    }

    for &feat in &mdata.features {
        let fdata = ctx.feature_data(feat);
        let mut elem = BytesStart::new("feature");
        elem.push_attribute(("name", fdata.name.as_ref()));
        let empty = fdata.iffeature_names.is_empty()
            && fdata.dsc.is_none()
            && fdata.ref_.is_none();
        if empty {
            writer
                .write_event(Event::Empty(elem))
                .map_err(writer_error)?;
            continue;
        }
        writer
            .write_event(Event::Start(elem))
            .map_err(writer_error)?;
        for name in &fdata.iffeature_names {
            simple_stmt(&mut writer, "if-feature", "name", name)?;
        }
        if let Some(dsc) = &fdata.dsc {
            text_stmt(&mut writer, "description", "text", dsc)?;
        }
        if let Some(ref_) = &fdata.ref_ {
            text_stmt(&mut writer, "reference", "text", ref_)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("feature")))
            .map_err(writer_error)?;
    }

    for &ident in &mdata.identities {
        let idata = ctx.ident_data(ident);
        let mut elem = BytesStart::new("identity");
        elem.push_attribute(("name", idata.name.as_ref()));
        let empty = idata.base_name.is_none()
            && idata.dsc.is_none()
            && idata.ref_.is_none();
        if empty {
            writer
                .write_event(Event::Empty(elem))
                .map_err(writer_error)?;
            continue;
        }
        writer
            .write_event(Event::Start(elem))
            .map_err(writer_error)?;
        if let Some(base) = &idata.base_name {
            simple_stmt(&mut writer, "base", "name", base)?;
        }
        if let Some(dsc) = &idata.dsc {
            text_stmt(&mut writer, "description", "text", dsc)?;
        }
        if let Some(ref_) = &idata.ref_ {
            text_stmt(&mut writer, "reference", "text", ref_)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("identity")))
            .map_err(writer_error)?;
    }

    for &tid in &mdata.typedefs {
        print_typedef(&mut writer, ctx, tid)?;
    }

    let mut child = mdata.data;
    while let Some(id) = child {
        child = ctx.snode(id).next;
        print_snode(&mut writer, ctx, id)?;
    }

    for &augment in &mdata.augments {
        print_snode(&mut writer, ctx, augment)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("module")))
        .map_err(writer_error)?;

    let out = writer.into_inner();
    String::from_utf8(out).map_err(|_| {
        Error::new(ErrorCode::Int, "Printed module is not valid UTF-8")
    })
}

fn simple_stmt(
    writer: &mut XmlWriter,
    keyword: &str,
    arg: &str,
    value: &str,
) -> Result<()> {
    let mut elem = BytesStart::new(keyword);
    elem.push_attribute((arg, value));
    writer.write_event(Event::Empty(elem)).map_err(writer_error)
}

fn text_stmt(
    writer: &mut XmlWriter,
    keyword: &str,
    arg: &str,
    value: &str,
) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(keyword)))
        .map_err(writer_error)?;
    writer
        .write_event(Event::Start(BytesStart::new(arg)))
        .map_err(writer_error)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(writer_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(arg)))
        .map_err(writer_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(keyword)))
        .map_err(writer_error)
}

fn print_typedef(
    writer: &mut XmlWriter,
    ctx: &Context,
    tid: TypeId,
) -> Result<()> {
    let tdata = ctx.type_data(tid);
    let mut elem = BytesStart::new("typedef");
    elem.push_attribute(("name", tdata.name.as_ref()));
    writer
        .write_event(Event::Start(elem))
        .map_err(writer_error)?;
    print_type_body(writer, ctx, tid, &tdata.base_name.clone())?;
    if let Some(units) = &tdata.units {
        simple_stmt(writer, "units", "name", units)?;
    }
    if let Some(default) = &tdata.default {
        simple_stmt(writer, "default", "value", default)?;
    }
    if let Some(dsc) = &tdata.dsc {
        text_stmt(writer, "description", "text", dsc)?;
    }
    if let Some(ref_) = &tdata.ref_ {
        text_stmt(writer, "reference", "text", ref_)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("typedef")))
        .map_err(writer_error)
}

/// Print the `type` statement of a type level.
fn print_type_body(
    writer: &mut XmlWriter,
    ctx: &Context,
    tid: TypeId,
    name: &str,
) -> Result<()> {
    let tdata = ctx.type_data(tid);
    let has_substmts = tdata.range.is_some()
        || tdata.length.is_some()
        || !tdata.patterns.is_empty()
        || tdata.frac_digits.is_some()
        || !tdata.enums.is_empty()
        || !tdata.bits.is_empty()
        || tdata.path.is_some()
        || tdata.ident_base_name.is_some()
        || !tdata.union_types.is_empty();

    let mut elem = BytesStart::new("type");
    elem.push_attribute(("name", name));
    if !has_substmts {
        return writer
            .write_event(Event::Empty(elem))
            .map_err(writer_error);
    }
    writer
        .write_event(Event::Start(elem))
        .map_err(writer_error)?;

    if let Some(range) = &tdata.range {
        simple_stmt(writer, "range", "value", range)?;
    }
    if let Some(length) = &tdata.length {
        simple_stmt(writer, "length", "value", length)?;
    }
    for pattern in &tdata.patterns {
        simple_stmt(writer, "pattern", "value", pattern)?;
    }
    if let Some(fd) = tdata.frac_digits {
        simple_stmt(writer, "fraction-digits", "value", &fd.to_string())?;
    }
    if let Some(path) = &tdata.path {
        simple_stmt(writer, "path", "value", path)?;
    }
    if let Some(base) = &tdata.ident_base_name {
        simple_stmt(writer, "base", "name", base)?;
    }
    for member in &tdata.enums {
        let mut elem = BytesStart::new("enum");
        elem.push_attribute(("name", member.name.as_ref()));
        if member.value_set {
            writer
                .write_event(Event::Start(elem))
                .map_err(writer_error)?;
            simple_stmt(
                writer,
                "value",
                "value",
                &member.value.to_string(),
            )?;
            writer
                .write_event(Event::End(BytesEnd::new("enum")))
                .map_err(writer_error)?;
        } else {
            writer
                .write_event(Event::Empty(elem))
                .map_err(writer_error)?;
        }
    }
    for member in &tdata.bits {
        let mut elem = BytesStart::new("bit");
        elem.push_attribute(("name", member.name.as_ref()));
        if member.pos_set {
            writer
                .write_event(Event::Start(elem))
                .map_err(writer_error)?;
            simple_stmt(
                writer,
                "position",
                "value",
                &member.pos.to_string(),
            )?;
            writer
                .write_event(Event::End(BytesEnd::new("bit")))
                .map_err(writer_error)?;
        } else {
            writer
                .write_event(Event::Empty(elem))
                .map_err(writer_error)?;
        }
    }
    for &member in &tdata.union_types {
        let member_name = ctx.type_data(member).base_name.clone();
        print_type_body(writer, ctx, member, &member_name)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("type")))
        .map_err(writer_error)
}

fn kind_keyword(kind: SchemaNodeKind) -> &'static str {
    match kind {
        SchemaNodeKind::Container => "container",
        SchemaNodeKind::Case => "case",
        SchemaNodeKind::Choice => "choice",
        SchemaNodeKind::Leaf => "leaf",
        SchemaNodeKind::LeafList => "leaf-list",
        SchemaNodeKind::List => "list",
        SchemaNodeKind::AnyXml => "anyxml",
        SchemaNodeKind::Grouping => "grouping",
        SchemaNodeKind::Uses => "uses",
        SchemaNodeKind::Augment => "augment",
        SchemaNodeKind::Rpc => "rpc",
        SchemaNodeKind::Input => "input",
        SchemaNodeKind::Output => "output",
        SchemaNodeKind::Notification => "notification",
    }
}

fn print_snode(
    writer: &mut XmlWriter,
    ctx: &Context,
    id: SnodeId,
) -> Result<()> {
    // Instantiated and spliced nodes are printed through their
    // originating uses/augment statement.
    if ctx.snode(id).origin != SnodeOrigin::Declared {
        return Ok(());
    }
    print_snode_impl(writer, ctx, id)
}

fn print_snode_impl(
    writer: &mut XmlWriter,
    ctx: &Context,
    id: SnodeId,
) -> Result<()> {
    let snode = ctx.snode(id);
    let keyword = kind_keyword(snode.kind);
    let mut elem = BytesStart::new(keyword);
    match &snode.payload {
        SnodePayload::Uses { grouping, .. } => {
            elem.push_attribute(("name", grouping.as_ref()));
        }
        SnodePayload::Augment { target, .. } => {
            elem.push_attribute(("target-node", target.as_ref()));
        }
        _ if matches!(
            snode.kind,
            SchemaNodeKind::Input | SchemaNodeKind::Output
        ) => {}
        _ => elem.push_attribute(("name", snode.name.as_ref())),
    }
    writer
        .write_event(Event::Start(elem))
        .map_err(writer_error)?;

    if let Some(when) = &snode.when {
        let mut elem = BytesStart::new("when");
        elem.push_attribute(("condition", when.cond.as_ref()));
        writer
            .write_event(Event::Empty(elem))
            .map_err(writer_error)?;
    }
    for name in &snode.iffeature_names {
        simple_stmt(writer, "if-feature", "name", name)?;
    }
    for must in &snode.musts {
        let mut elem = BytesStart::new("must");
        elem.push_attribute(("condition", must.cond.as_ref()));
        if must.emsg.is_none() && must.eapptag.is_none() {
            writer
                .write_event(Event::Empty(elem))
                .map_err(writer_error)?;
        } else {
            writer
                .write_event(Event::Start(elem))
                .map_err(writer_error)?;
            if let Some(emsg) = &must.emsg {
                text_stmt(writer, "error-message", "value", emsg)?;
            }
            if let Some(eapptag) = &must.eapptag {
                simple_stmt(writer, "error-app-tag", "value", eapptag)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("must")))
                .map_err(writer_error)?;
        }
    }

    // Kind-specific substatements.
    match &snode.payload {
        SnodePayload::Container { presence } => {
            if let Some(presence) = presence {
                simple_stmt(writer, "presence", "value", presence)?;
            }
        }
        SnodePayload::Leaf { ty, default, units } => {
            let name = ctx.type_data(*ty).base_name.clone();
            print_type_body(writer, ctx, *ty, &name)?;
            if let Some(units) = units {
                simple_stmt(writer, "units", "name", units)?;
            }
            if let Some(default) = default {
                simple_stmt(writer, "default", "value", default)?;
            }
        }
        SnodePayload::LeafList { ty, units, min, max } => {
            let name = ctx.type_data(*ty).base_name.clone();
            print_type_body(writer, ctx, *ty, &name)?;
            if let Some(units) = units {
                simple_stmt(writer, "units", "name", units)?;
            }
            print_min_max(writer, *min, *max)?;
        }
        SnodePayload::List {
            keys_str,
            uniques,
            min,
            max,
            ..
        } => {
            if let Some(keys_str) = keys_str {
                simple_stmt(writer, "key", "value", keys_str)?;
            }
            for unique in uniques {
                simple_stmt(writer, "unique", "tag", &unique.arg)?;
            }
            print_min_max(writer, *min, *max)?;
        }
        SnodePayload::Choice { default_name, .. } => {
            if let Some(default_name) = default_name {
                simple_stmt(writer, "default", "value", default_name)?;
            }
        }
        _ => (),
    }

    // Flags.
    if snode.flags.contains(SnodeFlags::ORDBY_USER) {
        simple_stmt(writer, "ordered-by", "value", "user")?;
    }
    if snode.flags.contains(SnodeFlags::CONFIG_SET) {
        let value = if snode.flags.contains(SnodeFlags::CONFIG_W) {
            "true"
        } else {
            "false"
        };
        simple_stmt(writer, "config", "value", value)?;
    }
    if snode.flags.contains(SnodeFlags::MAND_TRUE) {
        simple_stmt(writer, "mandatory", "value", "true")?;
    } else if snode.flags.contains(SnodeFlags::MAND_FALSE) {
        simple_stmt(writer, "mandatory", "value", "false")?;
    }
    if snode.flags.contains(SnodeFlags::STATUS_SET) {
        let value = if snode.flags.contains(SnodeFlags::STATUS_DEPRC) {
            "deprecated"
        } else if snode.flags.contains(SnodeFlags::STATUS_OBSLT) {
            "obsolete"
        } else {
            "current"
        };
        simple_stmt(writer, "status", "value", value)?;
    }

    if let Some(dsc) = &snode.dsc {
        text_stmt(writer, "description", "text", dsc)?;
    }
    if let Some(ref_) = &snode.ref_ {
        text_stmt(writer, "reference", "text", ref_)?;
    }

    // Scoped typedefs.
    for &tid in &snode.typedefs {
        print_typedef(writer, ctx, tid)?;
    }

    // Substatement nodes.
    match &snode.payload {
        SnodePayload::Uses { refines, .. } => {
            for refine in refines {
                print_refine(writer, refine)?;
            }
            // Uses-level augments are children of the uses node.
            let mut child = snode.child;
            while let Some(cid) = child {
                child = ctx.snode(cid).next;
                if ctx.snode(cid).kind == SchemaNodeKind::Augment {
                    print_snode(writer, ctx, cid)?;
                }
            }
        }
        SnodePayload::Augment { children, .. } => {
            // The children were spliced into the target; print them
            // from the recorded list.
            for &cid in children {
                print_augment_child(writer, ctx, cid)?;
            }
            // Not yet resolved: children still linked below.
            let mut child = snode.child;
            while let Some(cid) = child {
                child = ctx.snode(cid).next;
                print_snode(writer, ctx, cid)?;
            }
        }
        _ => {
            let mut child = snode.child;
            while let Some(cid) = child {
                child = ctx.snode(cid).next;
                print_snode(writer, ctx, cid)?;
            }
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new(keyword)))
        .map_err(writer_error)
}

/// Print a node that an augment spliced into its target, bypassing the
/// origin check.
fn print_augment_child(
    writer: &mut XmlWriter,
    ctx: &Context,
    id: SnodeId,
) -> Result<()> {
    print_snode_impl(writer, ctx, id)
}

fn print_min_max(
    writer: &mut XmlWriter,
    min: u32,
    max: Option<u32>,
) -> Result<()> {
    if min != 0 {
        simple_stmt(writer, "min-elements", "value", &min.to_string())?;
    }
    if let Some(max) = max {
        simple_stmt(writer, "max-elements", "value", &max.to_string())?;
    }
    Ok(())
}

fn print_refine(
    writer: &mut XmlWriter,
    refine: &crate::schema::RefineSpec,
) -> Result<()> {
    let mut elem = BytesStart::new("refine");
    elem.push_attribute(("target-node", refine.target.as_str()));
    writer
        .write_event(Event::Start(elem))
        .map_err(writer_error)?;
    if let Some(presence) = &refine.presence {
        simple_stmt(writer, "presence", "value", presence)?;
    }
    if let Some(default) = &refine.default {
        simple_stmt(writer, "default", "value", default)?;
    }
    if let Some(config) = refine.config {
        simple_stmt(
            writer,
            "config",
            "value",
            if config { "true" } else { "false" },
        )?;
    }
    if let Some(mandatory) = refine.mandatory {
        simple_stmt(
            writer,
            "mandatory",
            "value",
            if mandatory { "true" } else { "false" },
        )?;
    }
    if let Some(min) = refine.min {
        simple_stmt(writer, "min-elements", "value", &min.to_string())?;
    }
    if let Some(max) = refine.max {
        simple_stmt(writer, "max-elements", "value", &max.to_string())?;
    }
    if let Some(dsc) = &refine.dsc {
        text_stmt(writer, "description", "text", dsc)?;
    }
    if let Some(ref_) = &refine.ref_ {
        text_stmt(writer, "reference", "text", ref_)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("refine")))
        .map_err(writer_error)
}

// ===== XML data printer =====

pub(crate) fn print_data_xml(
    tree: &DataTree<'_>,
    first: Option<DnodeId>,
    with_siblings: bool,
    options: DataPrinterFlags,
) -> Result<String> {
    let mut writer = if options.contains(DataPrinterFlags::SHRINK) {
        Writer::new(Vec::new())
    } else {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    };

    let mut next = first;
    while let Some(id) = next {
        print_dnode(&mut writer, tree, id, true)?;
        if !with_siblings {
            break;
        }
        next = tree.dnode(id).next;
    }

    let out = writer.into_inner();
    String::from_utf8(out).map_err(|_| {
        Error::new(ErrorCode::Int, "Printed data is not valid UTF-8")
    })
}

fn print_dnode(
    writer: &mut XmlWriter,
    tree: &DataTree<'_>,
    id: DnodeId,
    declare_ns: bool,
) -> Result<()> {
    let ctx = tree.context;
    let dnode = tree.dnode(id);
    let snode = ctx.snode(dnode.schema);
    let mdata = ctx.module_data(snode.module);
    let name = snode.name.to_string();

    let mut elem = BytesStart::new(name.as_str());
    if declare_ns {
        elem.push_attribute(("xmlns", mdata.ns.as_ref()));
    }

    // Identityref values are printed with a namespace-qualified
    // prefix.
    let mut text = dnode.value_str.as_deref().map(|s| s.to_string());
    if let Some(tid) = crate::schema::snode_type(ctx, dnode.schema) {
        if effective_printed_base(ctx, tid) == DataValueType::IdentityRef {
            if let Some(value) = &text {
                if let Some((module_name, local)) = value.split_once(':') {
                    if let Some(target) = ctx.module_latest(module_name) {
                        let target = ctx.module_data(target);
                        if target.ns == mdata.ns {
                            text = Some(local.to_string());
                        } else {
                            elem.push_attribute((
                                format!("xmlns:{}", target.prefix).as_str(),
                                target.ns.as_ref(),
                            ));
                            text = Some(format!(
                                "{}:{}",
                                target.prefix, local
                            ));
                        }
                    }
                }
            }
        }
    }

    for attr in &dnode.attrs {
        elem.push_attribute((attr.name.as_ref(), attr.value.as_ref()));
    }

    let has_content = dnode.child.is_some()
        || text.as_deref().map(|t| !t.is_empty()).unwrap_or(false)
        || dnode.anyxml.is_some();
    if !has_content {
        return writer
            .write_event(Event::Empty(elem))
            .map_err(writer_error);
    }

    writer
        .write_event(Event::Start(elem))
        .map_err(writer_error)?;

    if let Some(text) = &text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(writer_error)?;
    }
    if let Some(anyxml) = &dnode.anyxml {
        // The subtree was detached verbatim; write it back unescaped.
        writer
            .write_event(Event::Text(BytesText::from_escaped(
                anyxml.as_str(),
            )))
            .map_err(writer_error)?;
    }

    let mut child = dnode.child;
    while let Some(cid) = child {
        let child_module = ctx.snode(tree.dnode(cid).schema).module;
        print_dnode(writer, tree, cid, child_module != snode.module)?;
        child = tree.dnode(cid).next;
    }

    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(writer_error)
}

/// The base type that decides the printed representation, following
/// leafrefs to their effective type.
fn effective_printed_base(ctx: &Context, tid: TypeId) -> DataValueType {
    match ctx.type_data(tid).base {
        DataValueType::LeafRef => {
            match crate::resolver::leafref_chain_target(ctx, tid) {
                Some(target) => ctx.type_data(target).base,
                None => DataValueType::LeafRef,
            }
        }
        base => base,
    }
}
