//! Selector and kernel name tables.
//!
//! Both tables normally come from vocabulary resources (997 for selectors,
//! 999 for kernel functions). Sierra never kept 999 up to date and several
//! releases ship damaged copies of either, so every resource table is
//! cross-checked against well-known entries and replaced with the
//! compiled-in table when it does not line up.

use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, warn};
use sci_formats::{
    find_patch_file, parse_name_table, parse_packed_name_table, NameTableLayout, PatchFile,
    ResourceType, VOCAB_KERNEL, VOCAB_SELECTORS,
};
use serde::Serialize;
use thiserror::Error;

use crate::version::SciVersion;

/// Kernel names in SCI1 order. Other versions are derived from this list.
pub const BASE_KERNEL_NAMES: &[&str] = &[
    /*0x00*/ "Load", "UnLoad", "ScriptID", "DisposeScript",
    /*0x04*/ "Clone", "DisposeClone", "IsObject", "RespondsTo",
    /*0x08*/ "DrawPic", "Dummy", "PicNotValid", "Animate",
    /*0x0c*/ "SetNowSeen", "NumLoops", "NumCels", "CelWide",
    /*0x10*/ "CelHigh", "DrawCel", "AddToPic", "NewWindow",
    /*0x14*/ "GetPort", "SetPort", "DisposeWindow", "DrawControl",
    /*0x18*/ "HiliteControl", "EditControl", "TextSize", "Display",
    /*0x1c*/ "GetEvent", "GlobalToLocal", "LocalToGlobal", "MapKeyToDir",
    /*0x20*/ "DrawMenuBar", "MenuSelect", "AddMenu", "DrawStatus",
    /*0x24*/ "Parse", "Said", "SetSynonyms", "HaveMouse",
    /*0x28*/ "SetCursor", "SaveGame", "RestoreGame", "RestartGame",
    /*0x2c*/ "GameIsRestarting", "DoSound", "NewList", "DisposeList",
    /*0x30*/ "NewNode", "FirstNode", "LastNode", "EmptyList",
    /*0x34*/ "NextNode", "PrevNode", "NodeValue", "AddAfter",
    /*0x38*/ "AddToFront", "AddToEnd", "FindKey", "DeleteKey",
    /*0x3c*/ "Random", "Abs", "Sqrt", "GetAngle",
    /*0x40*/ "GetDistance", "Wait", "GetTime", "StrEnd",
    /*0x44*/ "StrCat", "StrCmp", "StrLen", "StrCpy",
    /*0x48*/ "Format", "GetFarText", "ReadNumber", "BaseSetter",
    /*0x4c*/ "DirLoop", "CanBeHere", "OnControl", "InitBresen",
    /*0x50*/ "DoBresen", "Platform", "SetJump", "SetDebug",
    /*0x54*/ "InspectObj", "ShowSends", "ShowObjs", "ShowFree",
    /*0x58*/ "MemoryInfo", "StackUsage", "Profiler", "GetMenu",
    /*0x5c*/ "SetMenu", "GetSaveFiles", "GetCWD", "CheckFreeSpace",
    /*0x60*/ "ValidPath", "CoordPri", "StrAt", "DeviceInfo",
    /*0x64*/ "GetSaveDir", "CheckSaveGame", "ShakeScreen", "FlushResources",
    /*0x68*/ "SinMult", "CosMult", "SinDiv", "CosDiv",
    /*0x6c*/ "Graph", "Joystick", "ShiftScreen", "Palette",
    /*0x70*/ "MemorySegment", "Intersections", "Memory", "ListOps",
    /*0x74*/ "FileIO", "DoAudio", "DoSync", "AvoidPath",
    /*0x78*/ "Sort", "ATan", "Lock", "StrSplit",
    /*0x7c*/ "GetMessage", "IsItSkip", "MergePoly", "ResCheck",
    /*0x80*/ "AssertPalette", "TextColors", "TextFonts", "Record",
    /*0x84*/ "PlayBack", "ShowMovie", "SetVideoMode", "SetQuitStr",
    /*0x88*/ "DbugStr",
];

/// Properties every class starts with before SCI1.1.
const CLASS_HEADER_SELECTORS: &[&str] = &["species", "superClass", "-info-"];

const SCI0_SELECTORS: &[&str] = &[
    "y", "x", "view", "loop", "cel", "underBits", "nowSeen", "lsTop", "lsLeft", "lsBottom",
    "lsRight", "nsTop", "nsLeft", "nsBottom", "nsRight", "illegalBits", "xStep", "yStep",
    "signal", "priority", "cycler", "moveSpeed", "client", "looper", "mover", "cycleSpeed",
    "heading", "completed", "b-moveCnt", "b-i1", "b-i2", "b-di", "b-xAxis", "b-incr", "xLast",
    "yLast", "moveDone", "elements", "add", "delete", "firstNode", "lastNode", "nextNode",
    "value", "key", "init", "dispose", "doit", "changeState", "cue", "state", "seconds",
    "cycles", "script", "number", "handle", "min", "sec", "frame", "vol", "pri",
    "nodePtr", "name", "new", "yourself", "owner", "caller", "setCel", "setLoop", "setCycle",
    "setMotion", "setScript", "play", "stop", "fade", "pause", "curEvent", "type", "message",
    "modifiers", "claimed",
];

const SCI1_SELECTORS: &[&str] = &[
    "parseLang", "printLang", "subtitleLang", "size", "points", "palette", "dataInc",
    "handsOff", "handsOn", "flags", "lastCel", "scaleSignal", "scaleX", "scaleY",
    "maxScale", "vanishingX", "vanishingY",
];

/// Selector names used to cross-check a resource against the static table.
const WELL_KNOWN_SELECTORS: &[&str] = &["y", "x", "view", "loop", "cel", "signal"];

/// Kernel entries that sit at the same position in every known vocabulary.
const WELL_KNOWN_KERNEL_NAMES: &[&str] = &["Load", "UnLoad", "ScriptID", "DisposeScript", "Clone"];

/// Compiled-in kernel names for `version`.
pub fn default_kernel_names(version: SciVersion) -> Vec<String> {
    let mut names: Vec<String> = BASE_KERNEL_NAMES.iter().map(|name| name.to_string()).collect();

    match version {
        SciVersion::Sci0Early | SciVersion::Sci0Late => {
            // SCI0 has the file calls right after SetCursor.
            let file_calls = ["FOpen", "FPuts", "FGets", "FClose"];
            for (index, name) in file_calls.iter().enumerate() {
                names.insert(0x29 + index, name.to_string());
            }
            names[0x55] = "DoAvoider".to_string();
            names.truncate(0x72);
        }
        SciVersion::Sci01 => {
            names.truncate(0x79);
        }
        SciVersion::Sci1Egaonly | SciVersion::Sci1Early => {}
        SciVersion::Sci1Middle | SciVersion::Sci1Late => {
            names[0x71] = "MoveCursor".to_string();
        }
        SciVersion::Sci11 => {
            names[0x26] = "Empty".to_string();
            names[0x71] = "PalVary".to_string();
            names[0x7c] = "Message".to_string();
        }
    }

    names
}

/// Compiled-in selector names, if the version has a static table.
///
/// SCI1.1 games always ship vocabulary 997 and have no fallback.
pub fn static_selector_names(version: SciVersion) -> Option<Vec<String>> {
    if version == SciVersion::Sci11 {
        return None;
    }

    let mut names: Vec<String> = CLASS_HEADER_SELECTORS
        .iter()
        .chain(SCI0_SELECTORS)
        .map(|name| name.to_string())
        .collect();
    if version > SciVersion::Sci01 {
        names.extend(SCI1_SELECTORS.iter().map(|name| name.to_string()));
    }
    if version == SciVersion::Sci0Early {
        names = double_selectors(names);
    }
    Some(names)
}

/// Early SCI0 used the low bit of a selector id as a read/write toggle, so
/// every name occupies two consecutive ids.
fn double_selectors(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .flat_map(|name| [name.clone(), name])
        .collect()
}

/// Id the well-known selector `name` has in every table of `version`.
fn well_known_selector_id(version: SciVersion, name: &str) -> Option<usize> {
    let offset = if version < SciVersion::Sci11 {
        CLASS_HEADER_SELECTORS.len()
    } else {
        0
    };
    let index = SCI0_SELECTORS.iter().position(|candidate| *candidate == name)? + offset;
    Some(if version == SciVersion::Sci0Early {
        index * 2
    } else {
        index
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameTableError {
    #[error("vocabulary {number} not found")]
    Missing { number: u16 },
    #[error("could not read {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("'{name}' expected at {expected}, found '{found}'")]
    Mismatch {
        name: String,
        expected: usize,
        found: String,
    },
    #[error("table has {found} entries, at least {required} required")]
    TooShort { required: usize, found: usize },
    #[error("{version} has no static selector table and vocabulary 997 is unusable")]
    NoSelectorTable { version: SciVersion },
}

/// Where a loaded table came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum NameSource {
    Resource { path: PathBuf },
    Static { reason: String },
}

/// Ids of the selectors the interpreter reads or sends itself, resolved
/// once after the selector names are loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectorCache {
    pub y: Option<u16>,
    pub x: Option<u16>,
    pub view: Option<u16>,
    #[serde(rename = "loop")]
    pub loop_: Option<u16>,
    pub cel: Option<u16>,
    pub signal: Option<u16>,
    pub client: Option<u16>,
    pub elements: Option<u16>,
    pub first_node: Option<u16>,
    pub last_node: Option<u16>,
    pub next_node: Option<u16>,
    pub key: Option<u16>,
    pub value: Option<u16>,
    pub init: Option<u16>,
    pub dispose: Option<u16>,
    pub doit: Option<u16>,
    pub cue: Option<u16>,
    pub handle: Option<u16>,
    pub number: Option<u16>,
    pub name: Option<u16>,
    /// SCI1 only.
    pub scale_signal: Option<u16>,
}

impl SelectorCache {
    /// Resolves every cached selector against `selector_names`. Doubled
    /// SCI0-early tables resolve to the even (read) id.
    pub fn map(selector_names: &[String]) -> Self {
        let find = |name: &str| {
            selector_names
                .iter()
                .position(|candidate| candidate == name)
                .and_then(|id| u16::try_from(id).ok())
        };
        SelectorCache {
            y: find("y"),
            x: find("x"),
            view: find("view"),
            loop_: find("loop"),
            cel: find("cel"),
            signal: find("signal"),
            client: find("client"),
            elements: find("elements"),
            first_node: find("firstNode"),
            last_node: find("lastNode"),
            next_node: find("nextNode"),
            key: find("key"),
            value: find("value"),
            init: find("init"),
            dispose: find("dispose"),
            doit: find("doit"),
            cue: find("cue"),
            handle: find("handle"),
            number: find("number"),
            name: find("name"),
            scale_signal: find("scaleSignal"),
        }
    }

    fn entries(&self) -> [(&'static str, Option<u16>); 21] {
        [
            ("y", self.y),
            ("x", self.x),
            ("view", self.view),
            ("loop", self.loop_),
            ("cel", self.cel),
            ("signal", self.signal),
            ("client", self.client),
            ("elements", self.elements),
            ("firstNode", self.first_node),
            ("lastNode", self.last_node),
            ("nextNode", self.next_node),
            ("key", self.key),
            ("value", self.value),
            ("init", self.init),
            ("dispose", self.dispose),
            ("doit", self.doit),
            ("cue", self.cue),
            ("handle", self.handle),
            ("number", self.number),
            ("name", self.name),
            ("scaleSignal", self.scale_signal),
        ]
    }

    /// Cached selectors the loaded table does not contain.
    pub fn missing(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .filter(|(_, id)| id.is_none())
            .map(|(name, _)| name)
            .collect()
    }

    pub fn resolved(&self) -> usize {
        self.entries().iter().filter(|(_, id)| id.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NameTables {
    pub version: SciVersion,
    pub kernel_names: Vec<String>,
    pub selector_names: Vec<String>,
    pub kernel_source: NameSource,
    pub selector_source: NameSource,
    pub selectors: SelectorCache,
}

impl NameTables {
    /// Loads both tables, falling back to the compiled-in ones when a
    /// resource is missing or does not pass the cross-check.
    pub fn load(resource_dir: Option<&Path>, version: SciVersion) -> Result<Self, NameTableError> {
        let (selector_names, selector_source) = match load_selector_resource(resource_dir, version)
        {
            Ok((names, path)) => {
                debug!("loaded {} selector names from {}", names.len(), path.display());
                (names, NameSource::Resource { path })
            }
            Err(err) => {
                let names = static_selector_names(version)
                    .ok_or(NameTableError::NoSelectorTable { version })?;
                if !matches!(err, NameTableError::Missing { .. }) {
                    warn!("selector vocabulary rejected ({err}); using static selector table");
                }
                (
                    names,
                    NameSource::Static {
                        reason: err.to_string(),
                    },
                )
            }
        };

        let (kernel_names, kernel_source) = match load_kernel_resource(resource_dir, version) {
            Ok((names, path)) => {
                debug!("loaded {} kernel names from {}", names.len(), path.display());
                (names, NameSource::Resource { path })
            }
            Err(err) => {
                if !matches!(err, NameTableError::Missing { .. }) {
                    warn!("kernel vocabulary rejected ({err}); using built-in kernel names");
                }
                (
                    default_kernel_names(version),
                    NameSource::Static {
                        reason: err.to_string(),
                    },
                )
            }
        };

        let selectors = SelectorCache::map(&selector_names);
        let missing = selectors.missing();
        if !missing.is_empty() {
            debug!("selectors not in {version} table: {}", missing.join(", "));
        }

        Ok(NameTables {
            version,
            kernel_names,
            selector_names,
            kernel_source,
            selector_source,
            selectors,
        })
    }

    /// Compiled-in tables only. Fails for versions without a static
    /// selector table.
    pub fn builtin(version: SciVersion) -> Result<Self, NameTableError> {
        NameTables::load(None, version)
    }

    pub fn from_parts(
        version: SciVersion,
        kernel_names: Vec<String>,
        selector_names: Vec<String>,
    ) -> Self {
        let reason = String::from("supplied by caller");
        NameTables {
            version,
            selectors: SelectorCache::map(&selector_names),
            kernel_names,
            selector_names,
            kernel_source: NameSource::Static {
                reason: reason.clone(),
            },
            selector_source: NameSource::Static { reason },
        }
    }

    pub fn kernel_name(&self, number: usize) -> Option<&str> {
        self.kernel_names.get(number).map(String::as_str)
    }

    pub fn find_kernel_name(&self, name: &str) -> Option<usize> {
        self.kernel_names.iter().position(|candidate| candidate == name)
    }

    pub fn selector_name(&self, id: usize) -> Option<&str> {
        self.selector_names.get(id).map(String::as_str)
    }

    pub fn find_selector(&self, name: &str) -> Option<usize> {
        self.selector_names
            .iter()
            .position(|candidate| candidate == name)
    }
}

fn read_vocab(
    resource_dir: Option<&Path>,
    number: u16,
    parse: impl Fn(&[u8]) -> anyhow::Result<Vec<String>>,
) -> Result<(Vec<String>, PathBuf), NameTableError> {
    let path = resource_dir
        .and_then(|dir| find_patch_file(dir, ResourceType::Vocab, number))
        .ok_or(NameTableError::Missing { number })?;

    let names = PatchFile::open(&path)
        .and_then(|patch| {
            anyhow::ensure!(
                patch.resource_type() == ResourceType::Vocab,
                "patch holds a {:?} resource",
                patch.resource_type()
            );
            parse(patch.data())
        })
        .map_err(|err| NameTableError::Unreadable {
            path: path.clone(),
            reason: format!("{err:#}"),
        })?;

    Ok((names, path))
}

fn load_selector_resource(
    resource_dir: Option<&Path>,
    version: SciVersion,
) -> Result<(Vec<String>, PathBuf), NameTableError> {
    let little = read_vocab(resource_dir, VOCAB_SELECTORS, |data| {
        parse_name_table(data, NameTableLayout::SELECTORS).context("parsing selector table")
    })
    .and_then(|(names, path)| finish_selectors(names, version).map(|names| (names, path)));
    match little {
        Err(NameTableError::Missing { number }) => Err(NameTableError::Missing { number }),
        Err(first) => {
            // Late Mac releases store the table big-endian.
            read_vocab(resource_dir, VOCAB_SELECTORS, |data| {
                parse_name_table(data, NameTableLayout::SELECTORS_BE)
                    .context("parsing big-endian selector table")
            })
            .and_then(|(names, path)| finish_selectors(names, version).map(|names| (names, path)))
            .map_err(|_| first)
        }
        ok => ok,
    }
}

fn finish_selectors(names: Vec<String>, version: SciVersion) -> Result<Vec<String>, NameTableError> {
    let names = if version == SciVersion::Sci0Early {
        double_selectors(names)
    } else {
        names
    };
    check_selectors(&names, version)?;
    Ok(names)
}

fn check_selectors(names: &[String], version: SciVersion) -> Result<(), NameTableError> {
    for name in WELL_KNOWN_SELECTORS {
        let Some(expected) = well_known_selector_id(version, name) else {
            continue;
        };
        match names.get(expected) {
            Some(found) if found == name => {}
            found => {
                return Err(NameTableError::Mismatch {
                    name: name.to_string(),
                    expected,
                    found: found.cloned().unwrap_or_default(),
                })
            }
        }
    }
    Ok(())
}

fn load_kernel_resource(
    resource_dir: Option<&Path>,
    version: SciVersion,
) -> Result<(Vec<String>, PathBuf), NameTableError> {
    let (names, path) = if uses_packed_kernel_table(version) {
        read_vocab(resource_dir, VOCAB_KERNEL, |data| {
            parse_packed_name_table(data).context("parsing SCI1 kernel table")
        })?
    } else {
        read_vocab(resource_dir, VOCAB_KERNEL, |data| {
            parse_name_table(data, NameTableLayout::KERNEL).context("parsing SCI0 kernel table")
        })?
    };
    check_kernel_names(&names, version)?;
    Ok((names, path))
}

/// The kernel vocabulary lost its offset table with SCI1.
fn uses_packed_kernel_table(version: SciVersion) -> bool {
    version >= SciVersion::Sci1Egaonly
}

fn check_kernel_names(names: &[String], version: SciVersion) -> Result<(), NameTableError> {
    let required = default_kernel_names(version).len();
    if names.len() < required {
        return Err(NameTableError::TooShort {
            required,
            found: names.len(),
        });
    }
    for (expected, name) in WELL_KNOWN_KERNEL_NAMES.iter().enumerate() {
        if names[expected] != *name {
            return Err(NameTableError::Mismatch {
                name: name.to_string(),
                expected,
                found: names[expected].clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn indexed_table(names: &[String], stored_count: usize, big_endian: bool) -> Vec<u8> {
        let put = |out: &mut Vec<u8>, value: usize| {
            let value = value as u16;
            if big_endian {
                out.extend_from_slice(&value.to_be_bytes());
            } else {
                out.extend_from_slice(&value.to_le_bytes());
            }
        };
        let mut data = Vec::new();
        put(&mut data, stored_count);
        let mut cursor = 2 + names.len() * 2;
        for name in names {
            put(&mut data, cursor);
            cursor += 2 + name.len();
        }
        for name in names {
            put(&mut data, name.len());
            data.extend_from_slice(name.as_bytes());
        }
        data
    }

    fn packed_table(names: &[String]) -> Vec<u8> {
        let mut data = (names.len() as u16).to_le_bytes().to_vec();
        for name in names {
            data.extend_from_slice(name.as_bytes());
            data.push(0);
        }
        data
    }

    fn write_vocab(dir: &Path, number: u16, table: &[u8]) {
        let mut bytes = vec![0x86, 0x00];
        bytes.extend_from_slice(table);
        fs::write(dir.join(format!("vocab.{number}")), bytes).unwrap();
    }

    fn selector_vocab(names: &[String], big_endian: bool) -> Vec<u8> {
        indexed_table(names, names.len() - 1, big_endian)
    }

    fn static_reason(source: &NameSource) -> &str {
        match source {
            NameSource::Static { reason } => reason,
            other => panic!("expected static fallback, got {other:?}"),
        }
    }

    fn resource_file(source: &NameSource) -> String {
        match source {
            NameSource::Resource { path } => path.file_name().unwrap().to_string_lossy().into_owned(),
            other => panic!("expected resource, got {other:?}"),
        }
    }

    #[test]
    fn little_endian_resources_are_loaded() {
        let dir = tempdir().unwrap();
        let selectors = static_selector_names(SciVersion::Sci0Late).unwrap();
        let kernel = default_kernel_names(SciVersion::Sci0Late);
        write_vocab(dir.path(), 997, &selector_vocab(&selectors, false));
        write_vocab(dir.path(), 999, &indexed_table(&kernel, kernel.len(), false));

        let tables = NameTables::load(Some(dir.path()), SciVersion::Sci0Late).unwrap();
        assert_eq!(resource_file(&tables.selector_source), "vocab.997");
        assert_eq!(resource_file(&tables.kernel_source), "vocab.999");
        assert_eq!(tables.selector_names, selectors);
        assert_eq!(tables.find_kernel_name("Abs"), Some(0x41));
        assert_eq!(tables.selectors.y, Some(3));
        assert_eq!(tables.selectors.view, Some(5));
    }

    #[test]
    fn big_endian_selector_table_is_accepted() {
        let dir = tempdir().unwrap();
        let selectors = static_selector_names(SciVersion::Sci1Late).unwrap();
        write_vocab(dir.path(), 997, &selector_vocab(&selectors, true));

        let tables = NameTables::load(Some(dir.path()), SciVersion::Sci1Late).unwrap();
        assert_eq!(resource_file(&tables.selector_source), "vocab.997");
        assert_eq!(tables.selector_names, selectors);
        assert_eq!(
            static_reason(&tables.kernel_source),
            "vocabulary 999 not found"
        );
    }

    #[test]
    fn truncated_selector_table_falls_back_to_static() {
        let dir = tempdir().unwrap();
        let selectors = static_selector_names(SciVersion::Sci0Late).unwrap();
        let mut table = selector_vocab(&selectors, false);
        table.truncate(10);
        write_vocab(dir.path(), 997, &table);

        let tables = NameTables::load(Some(dir.path()), SciVersion::Sci0Late).unwrap();
        let reason = static_reason(&tables.selector_source);
        assert!(reason.contains("parsing selector table"), "{reason}");
        assert!(reason.contains("offset table is truncated"), "{reason}");
        assert_eq!(tables.selector_names, selectors);
    }

    #[test]
    fn shifted_selector_table_falls_back_to_static() {
        let dir = tempdir().unwrap();
        let mut shifted = static_selector_names(SciVersion::Sci0Late).unwrap();
        shifted.insert(0, "bogus".to_string());
        write_vocab(dir.path(), 997, &selector_vocab(&shifted, false));

        let tables = NameTables::load(Some(dir.path()), SciVersion::Sci0Late).unwrap();
        assert_eq!(
            static_reason(&tables.selector_source),
            "'y' expected at 3, found '-info-'"
        );
        assert_eq!(tables.selector_name(3), Some("y"));
    }

    #[test]
    fn sci0_early_resource_selectors_are_doubled() {
        let dir = tempdir().unwrap();
        let selectors = static_selector_names(SciVersion::Sci0Late).unwrap();
        write_vocab(dir.path(), 997, &selector_vocab(&selectors, false));

        let tables = NameTables::load(Some(dir.path()), SciVersion::Sci0Early).unwrap();
        assert_eq!(resource_file(&tables.selector_source), "vocab.997");
        assert_eq!(tables.selector_names.len(), selectors.len() * 2);
        assert_eq!(tables.selector_name(6), Some("y"));
        assert_eq!(tables.selector_name(7), Some("y"));
        assert_eq!(tables.selectors.y, Some(6));
    }

    #[test]
    fn sci1_kernel_table_uses_the_packed_layout() {
        let dir = tempdir().unwrap();
        let kernel = default_kernel_names(SciVersion::Sci1Late);
        write_vocab(dir.path(), 999, &packed_table(&kernel));

        let tables = NameTables::load(Some(dir.path()), SciVersion::Sci1Late).unwrap();
        assert_eq!(resource_file(&tables.kernel_source), "vocab.999");
        assert_eq!(tables.kernel_names, kernel);
    }

    #[test]
    fn sci0_kernel_layout_is_rejected_for_sci1() {
        let dir = tempdir().unwrap();
        let kernel = default_kernel_names(SciVersion::Sci1Late);
        write_vocab(dir.path(), 999, &indexed_table(&kernel, kernel.len(), false));

        let tables = NameTables::load(Some(dir.path()), SciVersion::Sci1Late).unwrap();
        let reason = static_reason(&tables.kernel_source);
        assert!(reason.starts_with("'Load' expected at 0"), "{reason}");
        assert_eq!(tables.kernel_names, kernel);
    }

    #[test]
    fn unterminated_sci1_kernel_table_names_the_layout() {
        let dir = tempdir().unwrap();
        let kernel = default_kernel_names(SciVersion::Sci1Late);
        let mut table = packed_table(&kernel);
        table.pop();
        write_vocab(dir.path(), 999, &table);

        let tables = NameTables::load(Some(dir.path()), SciVersion::Sci1Late).unwrap();
        let reason = static_reason(&tables.kernel_source);
        assert!(reason.contains("parsing SCI1 kernel table"), "{reason}");
        assert!(reason.contains("not terminated"), "{reason}");
    }

    #[test]
    fn selector_cache_tracks_the_loaded_table() {
        let sci0 = NameTables::builtin(SciVersion::Sci0Late).unwrap();
        assert_eq!(sci0.selectors.x, Some(4));
        assert_eq!(sci0.selectors.loop_, sci0.find_selector("loop").map(|id| id as u16));
        assert_eq!(sci0.selectors.missing(), vec!["scaleSignal"]);

        let sci1 = NameTables::builtin(SciVersion::Sci1Late).unwrap();
        assert!(sci1.selectors.scale_signal.is_some());
        assert_eq!(sci1.selectors.resolved(), sci1.selectors.len());

        let custom = NameTables::from_parts(
            SciVersion::Sci11,
            Vec::new(),
            vec!["x".to_string(), "y".to_string()],
        );
        assert_eq!(custom.selectors.x, Some(0));
        assert_eq!(custom.selectors.y, Some(1));
        assert_eq!(custom.selectors.view, None);
    }

    #[test]
    fn sci0_inserts_file_calls_and_renames_avoider() {
        let names = default_kernel_names(SciVersion::Sci0Late);
        assert_eq!(names.len(), 0x72);
        assert_eq!(names[0x28], "SetCursor");
        assert_eq!(&names[0x29..0x2d], ["FOpen", "FPuts", "FGets", "FClose"]);
        assert_eq!(names[0x2d], "SaveGame");
        assert_eq!(names[0x55], "DoAvoider");
        assert_eq!(names[0x41], "Abs");
        assert_eq!(names[0x71], "Joystick");
    }

    #[test]
    fn later_versions_rename_shared_slots() {
        assert_eq!(default_kernel_names(SciVersion::Sci01).len(), 0x79);
        let middle = default_kernel_names(SciVersion::Sci1Middle);
        assert_eq!(middle[0x71], "MoveCursor");
        assert_eq!(middle[0x3d], "Abs");
        let sci11 = default_kernel_names(SciVersion::Sci11);
        assert_eq!(sci11[0x26], "Empty");
        assert_eq!(sci11[0x71], "PalVary");
        assert_eq!(sci11[0x7c], "Message");
        assert_eq!(sci11.len(), BASE_KERNEL_NAMES.len());
    }

    #[test]
    fn static_selectors_follow_class_header() {
        let late = static_selector_names(SciVersion::Sci0Late).unwrap();
        assert_eq!(late[0], "species");
        assert_eq!(late[3], "y");
        assert_eq!(late[4], "x");

        let early = static_selector_names(SciVersion::Sci0Early).unwrap();
        assert_eq!(early.len(), late.len() * 2);
        assert_eq!(early[6], "y");
        assert_eq!(early[7], "y");

        let sci1 = static_selector_names(SciVersion::Sci1Late).unwrap();
        assert!(sci1.len() > late.len());
        assert!(static_selector_names(SciVersion::Sci11).is_none());
    }

    #[test]
    fn kernel_cross_check_rejects_shifted_tables() {
        let mut names = default_kernel_names(SciVersion::Sci1Late);
        assert!(check_kernel_names(&names, SciVersion::Sci1Late).is_ok());
        names.remove(2);
        assert!(matches!(
            check_kernel_names(&names, SciVersion::Sci1Late),
            Err(NameTableError::TooShort { .. })
        ));
        names.insert(0, "Bogus".to_string());
        assert!(matches!(
            check_kernel_names(&names, SciVersion::Sci1Late),
            Err(NameTableError::Mismatch { expected: 0, .. })
        ));
    }

    #[test]
    fn builtin_tables_resolve_names() {
        let tables = NameTables::builtin(SciVersion::Sci0Late).unwrap();
        assert_eq!(tables.find_kernel_name("Abs"), Some(0x41));
        assert_eq!(tables.kernel_name(0x2c), Some("FClose"));
        assert_eq!(tables.find_selector("view"), Some(5));
        assert_eq!(tables.selector_name(3), Some("y"));
        assert!(matches!(tables.kernel_source, NameSource::Static { .. }));
        assert!(matches!(
            NameTables::builtin(SciVersion::Sci11),
            Err(NameTableError::NoSelectorTable { .. })
        ));
    }
}
