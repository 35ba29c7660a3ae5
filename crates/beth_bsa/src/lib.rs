//! This library handles reading, writing and extracting the **BSA**/**BA2**
//! archive formats used by Bethesda's games, from Morrowind through
//! Starfield.
//!
//! # Archive Format Documentation
//!
//! An archive is a single file holding many game assets (meshes, textures,
//! scripts, audio) grouped into logical folders. Three header families
//! share the container idea but differ in nearly every record shape; the
//! first four bytes select the family, a version word then pins the exact
//! dialect.
//!
//! | Magic | Family | Dialects |
//! |--------------|--------|----------|
//! | `0x00000100` | Morrowind | flat file list, paths in a dense name table |
//! | `0x00415342` (`BSA\0`) | Oblivion era | version 0x67 Oblivion, 0x68 Fallout 3/NV/Skyrim LE, 0x69 Skyrim SE |
//! | `0x58445442` (`BTDX`) | Fallout 4 era | version 1 Fallout 4, 2 Starfield, 3 Starfield LZ4 textures; kind tag `GNRL` or `DX10` |
//!
//! All multi-byte fields are little endian. Two string shapes appear:
//! *BString* (1-byte length prefix, no terminator) and *ZString*
//! (NUL-terminated).
//!
//! ## `BSA\0` layout
//!
//! | Offset | Field | Description |
//! |--------|----------------------|--------------------------------------|
//! | 0x00   | Magic                | `BSA\0`                              |
//! | 0x04   | Version              | selects the dialect                  |
//! | 0x08   | Offset               | header size, always 0x24             |
//! | 0x0C   | Archive flags        | folder/file names, default compression, name prefixing |
//! | 0x10   | Folder count         | |
//! | 0x14   | File count           | |
//! | 0x18   | Folder name length   | total, terminators included          |
//! | 0x1C   | File name length     | total, terminators included          |
//! | 0x20   | File flags           | content bitmask derived from extensions |
//!
//! Folder records follow the header (`hash:8, count:4, offset:4`; Skyrim SE
//! interleaves a padding word and widens the offset to 8 bytes). Each
//! record's offset — biased by the total file-name length — points at the
//! folder's name-and-file block: a BString full path followed by file
//! records of `hash:8, size:4, offset:4`. Bit 30 of the size word toggles
//! compression against the archive default; compressed payloads start with
//! their 4-byte uncompressed size. The file-name table (dense ZStrings,
//! assigned in record order) sits after the furthest block.
//!
//! ## Morrowind layout
//!
//! `hash table offset:4, file count:4`, then size/offset pairs, a
//! name-offset table, the dense name table and a hash table. File data
//! starts at `12 + offset + count * 8`; names are full paths with backslash
//! separators.
//!
//! ## `BTDX` layout
//!
//! `version:4, kind:4, file count:4, name table offset:8`. `GNRL` entries
//! are `{name hash, extension, dir hash, offset, packed size, unpacked
//! size}` — packed size 0 means stored raw, otherwise the payload is a zlib
//! stream. `DX10` entries carry texture metadata (dimensions, mip count,
//! DXGI format) plus per-mip-range chunks, each raw, zlib or LZ4-block
//! compressed depending on the dialect; extraction synthesizes the DDS
//! header the games strip. The name table stores `u16`-length-prefixed
//! paths.
//!
//! # Example
//!
//! ```no_run
//! use beth_bsa::{Archive, ExtractOptions, ReadOptions};
//!
//! fn unpack() -> beth_bsa::Result<()> {
//!     let archive = Archive::read(
//!         "Skyrim - Textures.bsa",
//!         ReadOptions::builder().verify_hashes(true).build(),
//!     )?;
//!     archive.extract_all(
//!         "out",
//!         |percent, name| {
//!             println!("{percent:3}% {name}");
//!             true
//!         },
//!         ExtractOptions::default(),
//!     )?;
//!     Ok(())
//! }
//! ```

pub mod compression;
pub mod dds;
pub mod error;
pub mod extract;
pub mod hash;
pub mod read;
pub mod tree;
pub mod types;
pub mod write;

pub use error::{Error, Result};
pub use extract::ExtractOptions;
pub use read::{Archive, ReadOptions};
pub use tree::{File, Folder};
pub use types::{ArchiveType, TextureChunk, TextureHeader};
