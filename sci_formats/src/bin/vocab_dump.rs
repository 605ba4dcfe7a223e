use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use sci_formats::{
    NameTableLayout, PatchFile, ResourceType, parse_name_table, parse_packed_name_table,
};
use serde::Serialize;

/// Print the names stored in a selector (997) or kernel (999) vocabulary patch.
#[derive(Parser)]
struct Args {
    /// Path to the `vocab.997` / `997.voc` style patch file
    path: PathBuf,

    /// Treat the file as a kernel name table (exact entry count)
    #[arg(long)]
    kernel: bool,

    /// Kernel table in the SCI1 layout (packed NUL-terminated names)
    #[arg(long, requires = "kernel")]
    packed: bool,

    /// Read the offset table big-endian (late Mac releases)
    #[arg(long)]
    big_endian: bool,

    /// Emit JSON instead of the aligned listing
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct VocabDump<'a> {
    path: String,
    resource_type: ResourceType,
    names: &'a [String],
}

fn main() -> Result<()> {
    let args = Args::parse();
    let patch = PatchFile::open(&args.path)?;
    if patch.resource_type() != ResourceType::Vocab {
        bail!(
            "{} is a {:?} patch, not a vocabulary",
            patch.path().display(),
            patch.resource_type()
        );
    }

    let names = if args.packed {
        parse_packed_name_table(patch.data())?
    } else {
        let layout = match (args.kernel, args.big_endian) {
            (true, _) => NameTableLayout::KERNEL,
            (false, true) => NameTableLayout::SELECTORS_BE,
            (false, false) => NameTableLayout::SELECTORS,
        };
        parse_name_table(patch.data(), layout)?
    };

    if args.json {
        let dump = VocabDump {
            path: patch.path().display().to_string(),
            resource_type: patch.resource_type(),
            names: &names,
        };
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    println!("{} names in {}", names.len(), patch.path().display());
    for (id, name) in names.iter().enumerate() {
        println!("{id:>5} 0x{id:04x}  {name}");
    }
    Ok(())
}
