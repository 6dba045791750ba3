//! Build a cartridge image from media images

use std::fs;
use std::path::{Path, PathBuf};

use p2kflash_core::directory::ImageBuilder;

pub fn cmd_pack(output: &Path, inputs: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = ImageBuilder::new();

    for input in inputs {
        let media = fs::read(input)?;
        let start = builder
            .add_media(&media)
            .map_err(|e| format!("{}: {}", input.display(), e))?;
        println!("{} -> {}", input.display(), start);
    }

    let free = builder.free_blocks();
    let image = builder.finish();
    fs::write(output, image.as_bytes())?;
    println!(
        "Wrote {} ({} file(s), {} free block(s)) to {}",
        super::format_size(image.len()),
        inputs.len(),
        free,
        output.display()
    );
    Ok(())
}
