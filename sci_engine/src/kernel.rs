//! Static kernel map and the per-version kernel table built from it.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use crate::names::NameTables;
use crate::reg::Reg;
use crate::signature::{Signature, SignatureError};
use crate::version::{SciVersion, VersionRange};
use crate::workarounds::{WorkaroundEntry, WorkaroundTable};

/// Native kernel function over engine state `S`.
pub type KernelFn<S> = fn(&mut S, &[Reg]) -> KernelReturn;

/// What a native function asks the interpreter to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelReturn {
    Value(Reg),
    /// Leave the accumulator unchanged.
    Keep,
    Restart,
    Quit,
}

pub enum EntryPoint<S> {
    Native(KernelFn<S>),
    /// Known function that intentionally does nothing.
    Empty,
    Unimplemented,
}

impl<S> Clone for EntryPoint<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for EntryPoint<S> {}

impl<S> EntryPoint<S> {
    pub fn status(&self) -> EntryStatus {
        match self {
            EntryPoint::Native(_) => EntryStatus::Native,
            EntryPoint::Empty => EntryStatus::Empty,
            EntryPoint::Unimplemented => EntryStatus::Unimplemented,
        }
    }
}

impl<S> fmt::Debug for EntryPoint<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.status())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Native,
    Empty,
    Unimplemented,
}

/// One line of the static kernel map.
pub struct KernelMapEntry<S: 'static> {
    pub name: &'static str,
    pub entry: EntryPoint<S>,
    pub versions: VersionRange,
    pub signature: Option<&'static str>,
    pub sub_functions: &'static [KernelSubEntry<S>],
    pub workarounds: &'static [WorkaroundEntry],
}

impl<S: 'static> KernelMapEntry<S> {
    pub const fn new(
        name: &'static str,
        entry: EntryPoint<S>,
        signature: Option<&'static str>,
    ) -> Self {
        KernelMapEntry {
            name,
            entry,
            versions: VersionRange::ALL,
            signature,
            sub_functions: &[],
            workarounds: &[],
        }
    }

    pub const fn versions(mut self, versions: VersionRange) -> Self {
        self.versions = versions;
        self
    }

    pub const fn sub_functions(mut self, sub_functions: &'static [KernelSubEntry<S>]) -> Self {
        self.sub_functions = sub_functions;
        self
    }

    pub const fn workarounds(mut self, workarounds: &'static [WorkaroundEntry]) -> Self {
        self.workarounds = workarounds;
        self
    }
}

/// One line of a sub-function map. A missing signature is inherited from
/// the closest earlier line naming the same function.
pub struct KernelSubEntry<S: 'static> {
    pub versions: VersionRange,
    pub id: usize,
    pub name: &'static str,
    pub entry: EntryPoint<S>,
    pub signature: Option<&'static str>,
    pub workarounds: &'static [WorkaroundEntry],
}

impl<S: 'static> KernelSubEntry<S> {
    pub const fn new(
        versions: VersionRange,
        id: usize,
        name: &'static str,
        entry: EntryPoint<S>,
        signature: Option<&'static str>,
    ) -> Self {
        KernelSubEntry {
            versions,
            id,
            name,
            entry,
            signature,
            workarounds: &[],
        }
    }

    pub const fn workarounds(mut self, workarounds: &'static [WorkaroundEntry]) -> Self {
        self.workarounds = workarounds;
        self
    }
}

/// Resolved kernel function for one interpreter version.
pub struct KernelFunction<S> {
    pub name: String,
    pub entry: EntryPoint<S>,
    pub signature: Option<Signature>,
    pub workarounds: WorkaroundTable,
    /// Present for functions whose first argument selects a sub-function.
    pub sub_functions: Option<Vec<Option<KernelFunction<S>>>>,
    /// Log calls to this function even when call tracing is off.
    pub debug_logging: bool,
}

impl<S> KernelFunction<S> {
    fn unimplemented(name: &str) -> Self {
        KernelFunction {
            name: name.to_string(),
            entry: EntryPoint::Unimplemented,
            signature: None,
            workarounds: WorkaroundTable::default(),
            sub_functions: None,
            debug_logging: false,
        }
    }

    pub fn is_implemented(&self) -> bool {
        !matches!(self.entry, EntryPoint::Unimplemented)
    }

    pub fn sub_function(&self, id: usize) -> Option<&KernelFunction<S>> {
        self.sub_functions.as_ref()?.get(id)?.as_ref()
    }
}

#[derive(Debug, Error)]
pub enum KernelTableError {
    #[error("bad signature for {name}")]
    Signature {
        name: String,
        #[source]
        source: SignatureError,
    },
    #[error("{name}: sub-function {id} defined twice for this version")]
    DuplicateSubFunction { name: String, id: usize },
}

/// Kernel functions indexed by kernel number for a single version.
pub struct KernelTable<S> {
    version: SciVersion,
    functions: Vec<KernelFunction<S>>,
}

impl<S: 'static> KernelTable<S> {
    /// Resolves every name of the kernel name table against `map`. Names
    /// the map does not know (and the `Dummy` placeholder) stay
    /// unimplemented; malformed signatures fail the whole build.
    pub fn build(names: &NameTables, map: &[KernelMapEntry<S>]) -> Result<Self, KernelTableError> {
        let version = names.version;
        let mut functions = Vec::with_capacity(names.kernel_names.len());
        let mut unmapped = 0;

        for name in &names.kernel_names {
            let mapped = if name == "Dummy" {
                None
            } else {
                map.iter()
                    .find(|entry| entry.name == name.as_str() && entry.versions.contains(version))
            };

            let Some(entry) = mapped else {
                unmapped += 1;
                functions.push(KernelFunction::unimplemented(name));
                continue;
            };

            let signature = parse_signature(name, entry.signature)?;
            let sub_functions = if entry.sub_functions.is_empty() {
                None
            } else {
                Some(build_sub_functions(name, entry.sub_functions, version)?)
            };

            functions.push(KernelFunction {
                name: name.clone(),
                entry: entry.entry,
                signature,
                workarounds: WorkaroundTable::new(entry.workarounds),
                sub_functions,
                debug_logging: false,
            });
        }

        debug!(
            "built {} kernel table: {} functions, {} unmapped",
            version,
            functions.len(),
            unmapped
        );

        Ok(KernelTable { version, functions })
    }
}

impl<S> KernelTable<S> {
    pub fn version(&self) -> SciVersion {
        self.version
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get(&self, number: usize) -> Option<&KernelFunction<S>> {
        self.functions.get(number)
    }

    pub fn functions(&self) -> &[KernelFunction<S>] {
        &self.functions
    }

    /// Kernel number of `name` in this version.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.functions
            .iter()
            .position(|function| function.name == name)
    }

    /// Name of a kernel function or, with `sub`, of one of its
    /// sub-functions.
    pub fn name_of(&self, number: usize, sub: Option<usize>) -> Option<&str> {
        let function = self.get(number)?;
        match sub {
            None => Some(function.name.as_str()),
            Some(id) => function.sub_function(id).map(|sub| sub.name.as_str()),
        }
    }

    /// Turns call logging on or off for every function or sub-function
    /// whose name matches `pattern` (exact, or a prefix ending in `*`).
    /// Flagging a function flags all of its sub-functions. Returns how many
    /// entries matched.
    pub fn set_debug_logging(&mut self, pattern: &str, enabled: bool) -> usize {
        let mut flagged = 0;
        for function in &mut self.functions {
            let whole = name_matches(pattern, &function.name);
            if whole {
                function.debug_logging = enabled;
                flagged += 1;
            }
            for sub in function.sub_functions.iter_mut().flatten().flatten() {
                if whole || name_matches(pattern, &sub.name) {
                    sub.debug_logging = enabled;
                    flagged += 1;
                }
            }
        }
        let state = if enabled { "on" } else { "off" };
        debug!("debug logging {state} for {flagged} entries matching '{pattern}'");
        flagged
    }

    pub fn manifest(&self) -> KernelManifest {
        KernelManifest {
            version: self.version,
            functions: self
                .functions
                .iter()
                .enumerate()
                .map(|(number, function)| KernelManifestEntry {
                    number,
                    name: function.name.clone(),
                    status: function.entry.status(),
                    signature: function.signature.as_ref().map(ToString::to_string),
                    workarounds: function.workarounds.len(),
                    sub_functions: function
                        .sub_functions
                        .iter()
                        .flatten()
                        .enumerate()
                        .filter_map(|(id, sub)| {
                            sub.as_ref().map(|sub| SubFunctionManifest {
                                id,
                                name: sub.name.clone(),
                                status: sub.entry.status(),
                                signature: sub.signature.as_ref().map(ToString::to_string),
                            })
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

fn name_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

#[derive(Debug, Serialize)]
pub struct KernelManifest {
    pub version: SciVersion,
    pub functions: Vec<KernelManifestEntry>,
}

#[derive(Debug, Serialize)]
pub struct KernelManifestEntry {
    pub number: usize,
    pub name: String,
    pub status: EntryStatus,
    pub signature: Option<String>,
    pub workarounds: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_functions: Vec<SubFunctionManifest>,
}

#[derive(Debug, Serialize)]
pub struct SubFunctionManifest {
    pub id: usize,
    pub name: String,
    pub status: EntryStatus,
    pub signature: Option<String>,
}

fn parse_signature(name: &str, text: Option<&str>) -> Result<Option<Signature>, KernelTableError> {
    text.map(Signature::parse)
        .transpose()
        .map_err(|source| KernelTableError::Signature {
            name: name.to_string(),
            source,
        })
}

fn build_sub_functions<S: 'static>(
    parent: &str,
    entries: &[KernelSubEntry<S>],
    version: SciVersion,
) -> Result<Vec<Option<KernelFunction<S>>>, KernelTableError> {
    let mut table: Vec<Option<KernelFunction<S>>> = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        if !entry.versions.contains(version) {
            continue;
        }

        let signature_text = entry.signature.or_else(|| {
            entries[..index]
                .iter()
                .rev()
                .find(|earlier| earlier.name == entry.name && earlier.signature.is_some())
                .and_then(|earlier| earlier.signature)
        });
        if signature_text.is_none() {
            warn!("{parent}: {} has no signature to inherit", entry.name);
        }

        if table.len() <= entry.id {
            table.resize_with(entry.id + 1, || None);
        }
        if table[entry.id].is_some() {
            return Err(KernelTableError::DuplicateSubFunction {
                name: parent.to_string(),
                id: entry.id,
            });
        }

        table[entry.id] = Some(KernelFunction {
            name: entry.name.to_string(),
            entry: entry.entry,
            signature: parse_signature(entry.name, signature_text)?,
            workarounds: WorkaroundTable::new(entry.workarounds),
            sub_functions: None,
            debug_logging: false,
        });
    }

    Ok(table)
}
