//! Extract a file from a cartridge image

use std::fs;
use std::path::Path;

use p2kflash_core::directory::{build_media_image, read_directory};
use p2kflash_core::RawImage;

/// Media image of the `index`-th directory entry
pub fn extract_entry(image: &RawImage, index: usize) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut entries = read_directory(image);
    if index >= entries.len() {
        return Err(format!("no entry {} ({} file(s) in image)", index, entries.len()).into());
    }
    let entry = entries.swap_remove(index)?;
    if entry.invalid {
        log::warn!(
            "{}: block count mismatch, extracting the {} chained block(s)",
            entry.display_name(),
            entry.chain.len()
        );
    }
    Ok(build_media_image(image, &entry))
}

pub fn cmd_extract(path: &Path, index: usize, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let image = RawImage::from(fs::read(path)?);
    let media = extract_entry(&image, index)?;
    fs::write(output, &media)?;
    println!("Wrote {} bytes to {}", media.len(), output.display());
    Ok(())
}
