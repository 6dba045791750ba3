//! On-cartridge directory format
//!
//! The cartridge stores named files in a simple chained-block scheme:
//!
//! - each bank begins with a table of start markers (one byte per file
//!   that begins in that bank, 0xFF for unused entries),
//! - every block has a 0x40-byte header holding the chain pointer, the
//!   declared block count and a 32-byte media header fragment with the
//!   filename, extension and size,
//! - every block has a 1 KiB data payload.
//!
//! [`read_directory`] turns an image into [`DirectoryEntry`] values,
//! [`build_media_image`] rebuilds a playable media image for one entry and
//! [`ImageBuilder`] goes the other way.

mod builder;
mod entry;
pub mod layout;
mod media;

pub use builder::ImageBuilder;
pub use entry::{
    decode_entry, read_directory, scan_directory, validate_directory_layout, DirectoryEntry,
};
pub use media::{build_media_image, parse_media_image, MediaRecord, LEADER_LEN, RECORD_LEN};
