//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG context.

use bitflags::bitflags;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dict::Dict;
use crate::error::{Error, ErrorCode, Result};
use crate::ident;
use crate::parser;
use crate::schema::{
    effective_children, FeatId, FeatureData, IdentId, IdentityData,
    ModuleData, ModuleId, SchemaInputFormat, SchemaModule, SchemaNode,
    SnodeData, SnodeId, TypeData, TypeId,
};

/// Context of the YANG schemas.
///
/// The context holds all information about schemas. Usually, the
/// application is supposed to work with a single context in which all
/// schemas (and other internal information) are held, and according to
/// which the data trees will be processed and validated.
pub struct Context {
    pub(crate) dict: Dict,
    pub(crate) modules: Vec<ModuleData>,
    pub(crate) snodes: Vec<SnodeData>,
    pub(crate) types: Vec<TypeData>,
    pub(crate) identities: Vec<IdentityData>,
    pub(crate) features: Vec<FeatureData>,
    options: ContextFlags,
    searchdirs: Vec<PathBuf>,
    embedded: Option<EmbeddedModules>,
    import_cb: Option<ModuleImportCb>,
    /// Names of the modules currently being parsed, used to detect
    /// circular imports.
    pub(crate) parsing: Vec<String>,
}

bitflags! {
    /// Options to change context behavior.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ContextFlags: u16 {
        /// All the imported modules of the schema being parsed are
        /// implemented.
        const ALL_IMPLEMENTED = 0x01;

        /// Do not search for schemas in the context's searchdirs.
        const DISABLE_SEARCHDIRS = 0x02;

        /// When searching for schema, prefer searchdirs instead of the
        /// user callback.
        const PREFER_SEARCHDIRS = 0x04;
    }
}

/// Embedded module key containing the module/submodule name and optional
/// revision.
#[derive(Debug, Eq, Hash, PartialEq)]
pub struct EmbeddedModuleKey {
    mod_name: &'static str,
    mod_rev: Option<&'static str>,
    submod_name: Option<&'static str>,
    submod_rev: Option<&'static str>,
}

/// A hashmap containing embedded YANG modules.
pub type EmbeddedModules = HashMap<EmbeddedModuleKey, &'static str>;

/// Callback for retrieving missing included or imported modules in a
/// custom way. Takes the module name and optional revision, and returns
/// the module source text plus its format.
pub type ModuleImportCb = Box<
    dyn Fn(&str, Option<&str>) -> Option<(String, SchemaInputFormat)>
        + Send
        + Sync,
>;

// ===== impl Context =====

impl Context {
    /// Create a context.
    pub fn new(options: ContextFlags) -> Result<Context> {
        Ok(Context {
            dict: Dict::default(),
            modules: Vec::new(),
            snodes: Vec::new(),
            types: Vec::new(),
            identities: Vec::new(),
            features: Vec::new(),
            options,
            searchdirs: Vec::new(),
            embedded: None,
            import_cb: None,
            parsing: Vec::new(),
        })
    }

    /// Add the search path into the context.
    pub fn set_searchdir<P: AsRef<Path>>(
        &mut self,
        search_dir: P,
    ) -> Result<()> {
        let search_dir = search_dir.as_ref();
        if !search_dir.is_dir() {
            return Err(Error::new(
                ErrorCode::Inval,
                format!(
                    "Search directory \"{}\" does not exist",
                    search_dir.display()
                ),
            ));
        }
        let search_dir = search_dir.to_path_buf();
        if !self.searchdirs.contains(&search_dir) {
            self.searchdirs.push(search_dir);
        }
        Ok(())
    }

    /// Clean the search path from the context.
    pub fn unset_searchdir<P: AsRef<Path>>(
        &mut self,
        search_dir: P,
    ) -> Result<()> {
        let search_dir = search_dir.as_ref();
        self.searchdirs.retain(|dir| dir != search_dir);
        Ok(())
    }

    /// Clean all search paths from the context.
    pub fn unset_searchdirs(&mut self) -> Result<()> {
        self.searchdirs.clear();
        Ok(())
    }

    /// Set hash map containing embedded YANG modules, which are loaded
    /// on demand.
    pub fn set_embedded_modules(&mut self, modules: &EmbeddedModules) {
        self.embedded = Some(
            modules
                .iter()
                .map(|(key, data)| {
                    (
                        EmbeddedModuleKey {
                            mod_name: key.mod_name,
                            mod_rev: key.mod_rev,
                            submod_name: key.submod_name,
                            submod_rev: key.submod_rev,
                        },
                        *data,
                    )
                })
                .collect(),
        );
    }

    /// Remove all embedded modules from the context.
    pub fn unset_embedded_modules(&mut self) {
        self.embedded = None;
    }

    /// Set missing include or import module callback. It is meant to be
    /// used when the models are not locally available (such as when
    /// downloading modules from a NETCONF server), it should not be
    /// required in other cases.
    pub fn set_module_import_callback(&mut self, callback: ModuleImportCb) {
        self.import_cb = Some(callback);
    }

    /// Get the currently set context's options.
    pub fn get_options(&self) -> ContextFlags {
        self.options
    }

    /// Get YANG module of the given name and revision.
    ///
    /// If the revision is not specified, the schema with no revision is
    /// returned (if it is present in the context).
    pub fn get_module(
        &self,
        name: &str,
        revision: Option<&str>,
    ) -> Option<SchemaModule<'_>> {
        self.modules
            .iter()
            .position(|mdata| {
                mdata.name.as_ref() == name
                    && mdata.latest_revision().map(|rev| rev.as_ref())
                        == revision
            })
            .map(|idx| SchemaModule::new(self, ModuleId(idx as u32)))
    }

    /// Get the latest revision of the YANG module specified by its
    /// name.
    ///
    /// YANG modules with no revision are supposed to be the oldest one.
    pub fn get_module_latest(&self, name: &str) -> Option<SchemaModule<'_>> {
        self.module_latest(name)
            .map(|mid| SchemaModule::new(self, mid))
    }

    /// YANG module of the given namespace and revision.
    pub fn get_module_ns(
        &self,
        ns: &str,
        revision: Option<&str>,
    ) -> Option<SchemaModule<'_>> {
        self.modules
            .iter()
            .position(|mdata| {
                mdata.ns.as_ref() == ns
                    && mdata.latest_revision().map(|rev| rev.as_ref())
                        == revision
            })
            .map(|idx| SchemaModule::new(self, ModuleId(idx as u32)))
    }

    /// Get the latest revision of the YANG module specified by its
    /// namespace.
    pub fn get_module_latest_ns(&self, ns: &str) -> Option<SchemaModule<'_>> {
        self.module_latest_by(|mdata| mdata.ns.as_ref() == ns)
            .map(|mid| SchemaModule::new(self, mid))
    }

    /// Get list of loaded modules.
    pub fn modules(
        &self,
    ) -> impl Iterator<Item = SchemaModule<'_>> + '_ {
        (0..self.modules.len())
            .map(move |idx| SchemaModule::new(self, ModuleId(idx as u32)))
    }

    /// Names of all loaded modules.
    pub fn module_names(&self) -> Vec<String> {
        self.modules
            .iter()
            .map(|mdata| mdata.name.to_string())
            .collect()
    }

    /// Returns an iterator over all data nodes from all modules in the
    /// YANG context (depth-first search algorithm).
    pub fn traverse(&self) -> impl Iterator<Item = SchemaNode<'_>> {
        self.modules().flat_map(|module| module.traverse())
    }

    /// Try to find the module in the searchpaths, embedded modules or
    /// the import callback, and load it.
    ///
    /// The context itself is searched for the requested module first.
    /// If the revision is not specified, the latest revision is loaded.
    ///
    /// The `features` parameter specifies the module features that
    /// should be enabled. If left empty, no features are enabled. The
    /// feature string '*' enables all module features.
    pub fn load_module(
        &mut self,
        name: &str,
        revision: Option<&str>,
        features: &[&str],
    ) -> Result<SchemaModule<'_>> {
        let mid = self.load_module_internal(name, revision, true)?;
        for feature in features {
            self.feature_enable_by_id(mid, feature)?;
        }
        self.recompute_features();
        Ok(SchemaModule::new(self, mid))
    }

    /// Parse a module from a string and resolve it.
    pub fn parse_module_str(
        &mut self,
        data: &str,
        format: SchemaInputFormat,
    ) -> Result<SchemaModule<'_>> {
        let mid = parser::parse_module(self, data, format, None, true)?;
        Ok(SchemaModule::new(self, mid))
    }

    /// Enable a feature in the given module, re-evaluating the
    /// effective feature state of the whole context. The feature name
    /// '*' enables all features of the module.
    pub fn feature_enable(
        &mut self,
        module: &str,
        feature: &str,
    ) -> Result<()> {
        let mid = self.module_latest(module).ok_or_else(|| {
            Error::new(
                ErrorCode::Inmod,
                format!("Module \"{}\" not found", module),
            )
        })?;
        self.feature_enable_by_id(mid, feature)?;
        self.recompute_features();
        Ok(())
    }

    /// Disable a feature in the given module. The feature name '*'
    /// disables all features of the module.
    pub fn feature_disable(
        &mut self,
        module: &str,
        feature: &str,
    ) -> Result<()> {
        let mid = self.module_latest(module).ok_or_else(|| {
            Error::new(
                ErrorCode::Inmod,
                format!("Module \"{}\" not found", module),
            )
        })?;
        let feats = self.module_feature_ids(mid, feature)?;
        for feat in feats {
            self.features[feat.0 as usize].explicit = false;
        }
        self.recompute_features();
        Ok(())
    }

    /// Get a schema node based on the given data path (JSON format,
    /// i.e. module names as prefixes).
    pub fn find_path(&self, path: &str) -> Result<SchemaNode<'_>> {
        let (absolute, steps) = ident::parse_schema_nodeid(path)?;
        if !absolute {
            return Err(Error::new(
                ErrorCode::Inval,
                format!("Path \"{}\" is not absolute", path),
            ));
        }

        let mut module = None;
        let mut first: Option<SnodeId> = None;
        let mut found = None;

        for (step_idx, (prefix, name)) in steps.iter().enumerate() {
            match prefix {
                Some(prefix) => {
                    module =
                        Some(self.module_latest(prefix).ok_or_else(|| {
                            Error::new(
                                ErrorCode::Inmod,
                                format!("Module \"{}\" not found", prefix),
                            )
                        })?);
                }
                None if step_idx == 0 => {
                    return Err(Error::new(
                        ErrorCode::Inval,
                        "First node of a path must be prefixed by its module name",
                    ));
                }
                None => (),
            }
            if step_idx == 0 {
                first = self.module_data(module.unwrap()).data;
            }

            let mut children = Vec::new();
            effective_children(self, first, &mut children);
            found = children.into_iter().find(|&id| {
                let snode = self.snode(id);
                snode.name.as_ref() == name && snode.module == module.unwrap()
            });
            match found {
                Some(id) => first = self.snode(id).child,
                None => {
                    return Err(Error::new(
                        ErrorCode::Inelem,
                        format!("Schema node \"{}\" not found", name),
                    )
                    .with_path(path));
                }
            }
        }

        found
            .map(|id| SchemaNode::new(self, id))
            .ok_or_else(|| Error::new(ErrorCode::Inval, "Empty path"))
    }
}

// ===== internal helpers =====

impl Context {
    pub(crate) fn snode(&self, id: SnodeId) -> &SnodeData {
        &self.snodes[id.0 as usize]
    }

    pub(crate) fn snode_mut(&mut self, id: SnodeId) -> &mut SnodeData {
        &mut self.snodes[id.0 as usize]
    }

    pub(crate) fn module_data(&self, id: ModuleId) -> &ModuleData {
        &self.modules[id.0 as usize]
    }

    pub(crate) fn module_data_mut(&mut self, id: ModuleId) -> &mut ModuleData {
        &mut self.modules[id.0 as usize]
    }

    pub(crate) fn type_data(&self, id: TypeId) -> &TypeData {
        &self.types[id.0 as usize]
    }

    pub(crate) fn type_data_mut(&mut self, id: TypeId) -> &mut TypeData {
        &mut self.types[id.0 as usize]
    }

    pub(crate) fn ident_data(&self, id: IdentId) -> &IdentityData {
        &self.identities[id.0 as usize]
    }

    pub(crate) fn feature_data(&self, id: FeatId) -> &FeatureData {
        &self.features[id.0 as usize]
    }

    pub(crate) fn alloc_snode(&mut self, data: SnodeData) -> SnodeId {
        let id = SnodeId(self.snodes.len() as u32);
        self.snodes.push(data);
        id
    }

    pub(crate) fn alloc_type(&mut self, data: TypeData) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(data);
        id
    }

    pub(crate) fn alloc_identity(&mut self, data: IdentityData) -> IdentId {
        let id = IdentId(self.identities.len() as u32);
        self.identities.push(data);
        id
    }

    pub(crate) fn alloc_feature(&mut self, data: FeatureData) -> FeatId {
        let id = FeatId(self.features.len() as u32);
        self.features.push(data);
        id
    }

    pub(crate) fn intern(&mut self, s: &str) -> Arc<str> {
        self.dict.insert(s)
    }

    /// Latest revision of a module by name.
    pub(crate) fn module_latest(&self, name: &str) -> Option<ModuleId> {
        self.module_latest_by(|mdata| mdata.name.as_ref() == name)
    }

    fn module_latest_by<F>(&self, filter: F) -> Option<ModuleId>
    where
        F: Fn(&ModuleData) -> bool,
    {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, mdata)| filter(mdata))
            .max_by(|(_, a), (_, b)| {
                a.latest_revision().cmp(&b.latest_revision())
            })
            .map(|(idx, _)| ModuleId(idx as u32))
    }

    pub(crate) fn module_by_ns(&self, ns: &str) -> Option<ModuleId> {
        self.module_latest_by(|mdata| mdata.ns.as_ref() == ns)
    }

    /// Resolve a prefix in the scope of a module: the module's own
    /// prefix or one of its import prefixes.
    pub(crate) fn resolve_prefix(
        &self,
        module: ModuleId,
        prefix: &str,
    ) -> Option<ModuleId> {
        let mdata = self.module_data(module);
        if mdata.prefix.as_ref() == prefix {
            return Some(module);
        }
        mdata
            .imports
            .iter()
            .find(|import| import.prefix.as_ref() == prefix)
            .map(|import| import.module)
    }

    /// Load a module for an import or an explicit request. Returns the
    /// existing module when already present in the context.
    pub(crate) fn load_module_internal(
        &mut self,
        name: &str,
        revision: Option<&str>,
        implemented: bool,
    ) -> Result<ModuleId> {
        // Catch circular imports before attempting to load.
        if self.parsing.iter().any(|parsing| parsing == name) {
            return Err(Error::new(
                ErrorCode::Circular,
                format!("Circular dependency on module \"{}\"", name),
            ));
        }

        // The context itself is searched first.
        if let Some(mid) = self.module_latest(name) {
            let mdata = self.module_data(mid);
            let matches = match revision {
                Some(revision) => {
                    mdata.latest_revision().map(|rev| rev.as_ref())
                        == Some(revision)
                }
                None => true,
            };
            if matches {
                if implemented {
                    self.module_data_mut(mid).implemented = true;
                }
                return Ok(mid);
            }
        }

        let (source, format, filepath) = self
            .find_module_source(name, revision, false)
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::Inmod,
                    format!("Module \"{}\" not found", name),
                )
            })?;

        let implemented =
            implemented || self.options.contains(ContextFlags::ALL_IMPLEMENTED);
        let mid = parser::parse_module(
            self,
            &source,
            format,
            filepath,
            implemented,
        )?;

        let mdata = self.module_data(mid);
        if mdata.name.as_ref() != name {
            return Err(Error::new(
                ErrorCode::Inval,
                format!(
                    "Requested module \"{}\" but found \"{}\"",
                    name, mdata.name
                ),
            ));
        }
        if let Some(revision) = revision {
            if mdata.latest_revision().map(|rev| rev.as_ref())
                != Some(revision)
            {
                return Err(Error::new(
                    ErrorCode::Inval,
                    format!(
                        "Requested revision \"{}\" of module \"{}\" but found \"{}\"",
                        revision,
                        name,
                        mdata
                            .latest_revision()
                            .map(|rev| rev.as_ref())
                            .unwrap_or("none"),
                    ),
                ));
            }
        }
        log::debug!("loaded module \"{}\"", name);
        Ok(mid)
    }

    /// Locate the source text of a module or submodule.
    pub(crate) fn find_module_source(
        &self,
        name: &str,
        revision: Option<&str>,
        submodule: bool,
    ) -> Option<(String, SchemaInputFormat, Option<String>)> {
        let from_searchdirs = |ctx: &Context| {
            if ctx.options.contains(ContextFlags::DISABLE_SEARCHDIRS) {
                return None;
            }
            ctx.find_file_source(name, revision)
        };
        let from_embedded = |ctx: &Context| {
            let embedded = ctx.embedded.as_ref()?;
            let data = find_embedded_module(embedded, name, revision, submodule)?;
            Some((data.to_string(), SchemaInputFormat::YANG, None))
        };
        let from_cb = |ctx: &Context| {
            let cb = ctx.import_cb.as_ref()?;
            cb(name, revision).map(|(data, format)| (data, format, None))
        };

        if self.options.contains(ContextFlags::PREFER_SEARCHDIRS) {
            from_searchdirs(self)
                .or_else(|| from_embedded(self))
                .or_else(|| from_cb(self))
        } else {
            from_embedded(self)
                .or_else(|| from_cb(self))
                .or_else(|| from_searchdirs(self))
        }
    }

    fn find_file_source(
        &self,
        name: &str,
        revision: Option<&str>,
    ) -> Option<(String, SchemaInputFormat, Option<String>)> {
        for dir in &self.searchdirs {
            let candidates: Vec<String> = match revision {
                Some(revision) => vec![
                    format!("{}@{}.yang", name, revision),
                    format!("{}@{}.yin", name, revision),
                ],
                None => vec![
                    format!("{}.yang", name),
                    format!("{}.yin", name),
                ],
            };
            for candidate in candidates {
                let path = dir.join(&candidate);
                if let Ok(source) = std::fs::read_to_string(&path) {
                    let format = if candidate.ends_with(".yin") {
                        SchemaInputFormat::YIN
                    } else {
                        SchemaInputFormat::YANG
                    };
                    return Some((
                        source,
                        format,
                        Some(path.display().to_string()),
                    ));
                }
            }

            // Fall back to any revision of the module, latest first.
            if revision.is_none() {
                let mut revised: Vec<PathBuf> = std::fs::read_dir(dir)
                    .ok()?
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|path| {
                        path.file_name()
                            .and_then(|fname| fname.to_str())
                            .map(|fname| {
                                fname.starts_with(&format!("{}@", name))
                                    && (fname.ends_with(".yang")
                                        || fname.ends_with(".yin"))
                            })
                            .unwrap_or(false)
                    })
                    .collect();
                revised.sort();
                if let Some(path) = revised.pop() {
                    if let Ok(source) = std::fs::read_to_string(&path) {
                        let format = if path.extension().and_then(|e| e.to_str())
                            == Some("yin")
                        {
                            SchemaInputFormat::YIN
                        } else {
                            SchemaInputFormat::YANG
                        };
                        return Some((
                            source,
                            format,
                            Some(path.display().to_string()),
                        ));
                    }
                }
            }
        }
        None
    }

    fn module_feature_ids(
        &self,
        mid: ModuleId,
        feature: &str,
    ) -> Result<Vec<FeatId>> {
        let mdata = self.module_data(mid);
        if feature == "*" {
            return Ok(mdata.features.clone());
        }
        mdata
            .features
            .iter()
            .find(|&&feat| self.feature_data(feat).name.as_ref() == feature)
            .map(|&feat| vec![feat])
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::Inval,
                    format!(
                        "Feature \"{}\" not defined in module \"{}\"",
                        feature, mdata.name
                    ),
                )
            })
    }

    fn feature_enable_by_id(
        &mut self,
        mid: ModuleId,
        feature: &str,
    ) -> Result<()> {
        let feats = self.module_feature_ids(mid, feature)?;
        for feat in feats {
            self.features[feat.0 as usize].explicit = true;
        }
        Ok(())
    }

    /// Recompute the effective feature state: a feature is enabled iff
    /// explicitly enabled and all its if-feature dependencies are
    /// enabled. Computed as a fixed point from the all-disabled bottom,
    /// so dependency cycles settle as disabled.
    pub(crate) fn recompute_features(&mut self) {
        for feature in &mut self.features {
            feature.enabled = false;
        }
        loop {
            let mut progress = false;
            for idx in 0..self.features.len() {
                if self.features[idx].enabled {
                    continue;
                }
                let enabled = self.features[idx].explicit
                    && self.features[idx]
                        .iffeatures
                        .iter()
                        .all(|dep| self.features[dep.0 as usize].enabled);
                if enabled {
                    self.features[idx].enabled = true;
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("modules", &self.modules.len())
            .field("snodes", &self.snodes.len())
            .finish()
    }
}

// ===== impl EmbeddedModuleKey =====

impl EmbeddedModuleKey {
    pub fn new(
        mod_name: &'static str,
        mod_rev: Option<&'static str>,
        submod_name: Option<&'static str>,
        submod_rev: Option<&'static str>,
    ) -> EmbeddedModuleKey {
        EmbeddedModuleKey {
            mod_name,
            mod_rev,
            submod_name,
            submod_rev,
        }
    }
}

// ===== helper functions =====

fn find_embedded_module<'a>(
    modules: &'a EmbeddedModules,
    name: &str,
    revision: Option<&str>,
    submodule: bool,
) -> Option<&'a &'static str> {
    modules
        .iter()
        .find(|(key, _)| {
            if submodule {
                key.submod_name == Some(name)
                    && (revision.is_none() || key.submod_rev == revision)
            } else {
                key.mod_name == name
                    && key.submod_name.is_none()
                    && (revision.is_none() || key.mod_rev == revision)
            }
        })
        .map(|(_, data)| data)
}
