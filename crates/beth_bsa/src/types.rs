//! Base types for the on-disk structure of BSA and BA2 archives.
//!
//! All multi-byte fields are little endian. Strings come in two shapes:
//! `BString` (1-byte length prefix, no terminator) and `ZString`
//! (NUL-terminated). Fixed-shape headers and records are modelled as
//! [`binrw`] structs; the string codecs are plain [`byteorder`] reads since
//! they interleave with seeks.

use crate::error::{Error, Result};
use binrw::{BinRead, BinWrite};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// "BSA\0", the Oblivion through Skyrim SE magic
pub const MAGIC_BSA: u32 = 0x0041_5342;
/// "BTDX", the Fallout 4 / Starfield magic
pub const MAGIC_BTDX: u32 = 0x5844_5442;
/// Morrowind archives start with a bare version word instead of a tag
pub const MAGIC_MORROWIND: u32 = 0x0000_0100;

/// Archive flag: folder names are stored
pub const FLAG_HAS_DIR_NAMES: u32 = 0x0000_0001;
/// Archive flag: file names are stored
pub const FLAG_HAS_FILE_NAMES: u32 = 0x0000_0002;
/// Archive flag: files are compressed unless their record toggles it off
pub const FLAG_DEFAULT_COMPRESSED: u32 = 0x0000_0004;
/// Archive flag: each data block is prefixed with the file's full path
pub const FLAG_NAME_PREFIXED: u32 = 0x0000_0100;

/// Bit 30 of a file record's size word toggles compression relative to
/// [`FLAG_DEFAULT_COMPRESSED`]
pub const SIZE_COMPRESS_TOGGLE: u32 = 0x4000_0000;
/// Mask covering both flag bits of the size word; the remainder is the
/// stored byte count
pub const SIZE_FLAG_MASK: u32 = 0xC000_0000;

/// The supported archive dialects.
///
/// `Fallout3` covers Fallout 3, Fallout NV and Skyrim LE, which share a
/// version byte and record shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Morrowind,
    Oblivion,
    Fallout3,
    SkyrimSe,
    Fallout4,
    Starfield,
    StarfieldLz4Texture,
}

impl ArchiveType {
    /// Map the version word following the magic to an archive type.
    pub(crate) fn from_id(id: u32) -> Result<Self> {
        match id {
            0x100 => Ok(ArchiveType::Morrowind),
            0x67 => Ok(ArchiveType::Oblivion),
            0x68 => Ok(ArchiveType::Fallout3),
            0x69 => Ok(ArchiveType::SkyrimSe),
            0x01 => Ok(ArchiveType::Fallout4),
            0x02 => Ok(ArchiveType::Starfield),
            0x03 => Ok(ArchiveType::StarfieldLz4Texture),
            other => Err(Error::data(format!("invalid archive version {other:#x}"))),
        }
    }

    pub(crate) fn to_id(self) -> u32 {
        match self {
            ArchiveType::Morrowind => 0x100,
            ArchiveType::Oblivion => 0x67,
            ArchiveType::Fallout3 => 0x68,
            ArchiveType::SkyrimSe => 0x69,
            ArchiveType::Fallout4 => 0x01,
            ArchiveType::Starfield => 0x02,
            ArchiveType::StarfieldLz4Texture => 0x03,
        }
    }

    /// True for the Fallout 4 / Starfield family with the `BTDX` magic.
    pub(crate) fn is_btdx(self) -> bool {
        matches!(
            self,
            ArchiveType::Fallout4 | ArchiveType::Starfield | ArchiveType::StarfieldLz4Texture
        )
    }

    /// Absolute offset of the first file record in a `BTDX` archive. The
    /// header grew by a few words with each Starfield revision.
    pub(crate) fn btdx_records_start(self) -> u64 {
        match self {
            ArchiveType::Starfield => 32,
            ArchiveType::StarfieldLz4Texture => 36,
            _ => 24,
        }
    }
}

/// `BSA\0` header body, read after the magic. The leading `offset` field is
/// the header size and is always 0x24.
#[derive(BinRead, BinWrite, Debug, Default, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct BsaHeader {
    pub offset: u32,
    pub archive_flags: u32,
    pub folder_count: u32,
    pub file_count: u32,
    pub folder_name_length: u32,
    pub file_name_length: u32,
    pub file_flags: u32,
}

/// Morrowind header body: offset of the hash table relative to the end of
/// the 12-byte header, then the file count.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct MorrowindHeader {
    pub hash_offset: u32,
    pub file_count: u32,
}

/// `BTDX` header body, read after the magic and version: a four-character
/// archive kind tag (`GNRL` or `DX10`), file count and the absolute
/// name-table offset.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct BtdxHeader {
    pub kind: [u8; 4],
    pub file_count: u32,
    pub name_table_offset: u64,
}

/// Folder record for Oblivion through Skyrim LE.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct FolderRecord {
    pub hash: u64,
    pub file_count: u32,
    pub offset: u32,
}

/// Skyrim SE folder record: a padding word between the count and a
/// widened 8-byte offset.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct FolderRecordSe {
    pub hash: u64,
    pub file_count: u32,
    pub padding: u32,
    pub offset: u64,
}

/// File record inside a folder's name-and-file block. The size word carries
/// the compression toggle in its top bits, see [`SIZE_COMPRESS_TOGGLE`].
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct FileRecord {
    pub hash: u64,
    pub size: u32,
    pub offset: u32,
}

/// Morrowind size/offset pair; the offset is relative to the data region.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct MorrowindFileRecord {
    pub size: u32,
    pub offset: u32,
}

/// `GNRL` file record. The skipped words carry flags the extractor does not
/// consume.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct GnrlRecord {
    pub name_hash: u32,
    pub extension: [u8; 4],
    pub dir_hash: u32,
    #[brw(pad_before = 4)]
    pub offset: u64,
    pub packed_size: u32,
    #[brw(pad_after = 4)]
    pub unpacked_size: u32,
}

/// `DX10` texture file record; followed on disk by `chunk_count` chunk
/// records.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct Dx10Record {
    pub name_hash: u32,
    pub extension: [u8; 4],
    pub dir_hash: u32,
    pub unknown: u8,
    pub chunk_count: u8,
    pub chunk_header_size: u16,
    pub height: u16,
    pub width: u16,
    pub mip_count: u8,
    pub format: u16,
    pub cubemap_marker: u8,
}

/// One mip range of a `DX10` texture, independently compressed.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub(crate) struct TextureChunkRecord {
    pub offset: u64,
    pub packed_size: u32,
    pub unpacked_size: u32,
    pub start_mip: u16,
    #[brw(pad_after = 4)]
    pub end_mip: u16,
}

/// Texture metadata kept on a file entry after parsing a `DX10` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHeader {
    pub width: u16,
    pub height: u16,
    pub mip_count: u8,
    /// DXGI format code
    pub format: u16,
    /// 2049 on cubemap textures
    pub cubemap_marker: u16,
}

/// Packed/unpacked sizes and the source location of one texture chunk.
/// Chunks are ordered by mip; their unpacked sizes sum to the DDS body size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureChunk {
    pub offset: u64,
    pub packed_size: u32,
    pub unpacked_size: u32,
    pub start_mip: u16,
    pub end_mip: u16,
}

/// Read a length-prefixed string (no terminator).
pub(crate) fn read_bstring<R: Read>(reader: &mut R) -> Result<String> {
    let length = reader.read_u8()? as usize;
    let mut raw = vec![0u8; length];
    reader.read_exact(&mut raw)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Write a length-prefixed string (no terminator).
pub(crate) fn write_bstring<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let length = u8::try_from(value.len())
        .map_err(|_| Error::data(format!("name too long for a length prefix: {value}")))?;
    writer.write_u8(length)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// Read a NUL-terminated string.
pub(crate) fn read_zstring<R: Read>(reader: &mut R) -> Result<String> {
    let mut raw = Vec::new();
    loop {
        let byte = reader.read_u8()?;
        if byte == b'\0' {
            break;
        }
        raw.push(byte);
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Write a NUL-terminated string.
pub(crate) fn write_zstring<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    writer.write_all(value.as_bytes())?;
    writer.write_u8(0)?;
    Ok(())
}
