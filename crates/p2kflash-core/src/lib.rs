//! p2kflash-core - Cartridge data model and directory codec
//!
//! This crate contains everything about the cartridge that does not need a
//! serial port: the flash geometry, slot and block addressing, the chip
//! identity whitelist, and the on-flash directory format used to store
//! named files inside a cartridge image.
//!
//! # Example
//!
//! ```ignore
//! use p2kflash_core::directory;
//! use p2kflash_core::image::RawImage;
//!
//! let image = RawImage::from(std::fs::read("tape01-06.bin")?);
//! for result in directory::read_directory(&image) {
//!     match result {
//!         Ok(entry) => println!("{} {}", entry.display_name(), entry.chain_string()),
//!         Err(e) => println!("broken entry: {}", e),
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod address;
pub mod cartridge;
pub mod chip;
pub mod directory;
pub mod error;
pub mod image;

pub use address::BlockAddress;
pub use cartridge::Slot;
pub use chip::ChipIdentity;
pub use error::{CodecError, Result};
pub use image::RawImage;
