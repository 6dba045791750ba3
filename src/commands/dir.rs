//! Directory listing for cartridge images

use std::fs;
use std::path::Path;

use p2kflash_core::directory::{read_directory, validate_directory_layout, DirectoryEntry};
use p2kflash_core::RawImage;

/// Render one listing line
fn format_entry(index: usize, entry: &DirectoryEntry) -> String {
    format!(
        "{:3}  {:<16} {:<3} {:6} {:3}  {:#06X}  {}{}",
        index,
        entry.display_name(),
        entry.extension.trim_end(),
        entry.size,
        entry.declared_blocks,
        entry.load_address,
        entry.chain_string(),
        if entry.invalid { "  invalid" } else { "" }
    )
}

/// Listing lines for every entry, broken ones included so indices match
/// `extract -n`
pub fn list_entries(image: &RawImage) -> Vec<String> {
    read_directory(image)
        .iter()
        .enumerate()
        .map(|(index, result)| match result {
            Ok(entry) => format_entry(index, entry),
            Err(e) => format!("{:3}  <broken: {}>", index, e),
        })
        .collect()
}

pub fn cmd_dir(path: &Path, check: bool) -> Result<(), Box<dyn std::error::Error>> {
    let image = RawImage::from(fs::read(path)?);

    if check {
        validate_directory_layout(&image)?;
        println!("Directory layout OK");
    }

    let lines = list_entries(&image);
    println!("  #  Name             Ext   Size Blk  Load    Chain");
    for line in &lines {
        println!("{}", line);
    }
    println!("{} file(s)", lines.len());
    Ok(())
}
