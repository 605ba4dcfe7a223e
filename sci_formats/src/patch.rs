use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use memmap2::{Mmap, MmapOptions};
use serde::Serialize;
use walkdir::WalkDir;

/// Resource types as stored in the first byte of a patch file (with the
/// high bit set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    View,
    Pic,
    Script,
    Text,
    Sound,
    Memory,
    Vocab,
    Font,
    Cursor,
    Patch,
}

impl ResourceType {
    pub fn from_byte(raw: u8) -> Option<Self> {
        match raw & 0x7F {
            0 => Some(Self::View),
            1 => Some(Self::Pic),
            2 => Some(Self::Script),
            3 => Some(Self::Text),
            4 => Some(Self::Sound),
            5 => Some(Self::Memory),
            6 => Some(Self::Vocab),
            7 => Some(Self::Font),
            8 => Some(Self::Cursor),
            9 => Some(Self::Patch),
            _ => None,
        }
    }

    /// Extension used by SCI1.1+ patch files (`997.voc`).
    pub fn patch_extension(self) -> &'static str {
        match self {
            Self::View => "v56",
            Self::Pic => "p56",
            Self::Script => "scr",
            Self::Text => "tex",
            Self::Sound => "snd",
            Self::Memory => "mem",
            Self::Vocab => "voc",
            Self::Font => "fon",
            Self::Cursor => "cur",
            Self::Patch => "pat",
        }
    }

    /// Prefix used by SCI0/SCI1 patch files (`vocab.997`).
    pub fn patch_prefix(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Pic => "pic",
            Self::Script => "script",
            Self::Text => "text",
            Self::Sound => "sound",
            Self::Memory => "memory",
            Self::Vocab => "vocab",
            Self::Font => "font",
            Self::Cursor => "cursor",
            Self::Patch => "patch",
        }
    }
}

/// A memory-mapped resource patch file.
///
/// Layout: one byte resource type (high bit set), one byte extra header
/// length, then the extra header, then the resource payload.
#[derive(Debug)]
pub struct PatchFile {
    path: PathBuf,
    mmap: Mmap,
    resource_type: ResourceType,
    data_offset: usize,
}

impl PatchFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = File::open(&path_buf)
            .with_context(|| format!("opening patch file at {}", path_buf.display()))?;
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .with_context(|| format!("memory-mapping patch file {}", path_buf.display()))?;

        let (resource_type, data_offset) = parse_header(&mmap)
            .with_context(|| format!("parsing patch header of {}", path_buf.display()))?;

        Ok(PatchFile {
            path: path_buf,
            mmap,
            resource_type,
            data_offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn data(&self) -> &[u8] {
        &self.mmap[self.data_offset..]
    }
}

fn parse_header(bytes: &[u8]) -> Result<(ResourceType, usize)> {
    ensure!(bytes.len() >= 2, "patch file is too small to contain a header");

    let type_byte = bytes[0];
    if type_byte & 0x80 == 0 {
        bail!("patch type byte 0x{type_byte:02X} lacks the patch marker bit");
    }
    let Some(resource_type) = ResourceType::from_byte(type_byte) else {
        bail!("unknown patch resource type 0x{type_byte:02X}");
    };

    let data_offset = 2 + bytes[1] as usize;
    ensure!(
        data_offset <= bytes.len(),
        "patch header claims {} bytes but file has {}",
        data_offset,
        bytes.len()
    );

    Ok((resource_type, data_offset))
}

/// Locates the patch file for a resource in `dir`, accepting both the old
/// (`vocab.997`) and the SCI1.1 (`997.voc`) naming, case-insensitively.
pub fn find_patch_file(dir: &Path, resource_type: ResourceType, number: u16) -> Option<PathBuf> {
    let old_name = format!("{}.{number:03}", resource_type.patch_prefix());
    let new_name = format!("{number}.{}", resource_type.patch_extension());

    let mut candidates: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| {
                    name.eq_ignore_ascii_case(&old_name) || name.eq_ignore_ascii_case(&new_name)
                })
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
