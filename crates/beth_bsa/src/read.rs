//! Opening and parsing archives.
//!
//! The first four bytes select one of three header families (Morrowind's
//! bare version word, `BSA\0`, `BTDX`); the version word then pins the exact
//! record shapes. Whatever the dialect, parsing ends with one unified
//! folder/file tree.

use binrw::BinRead;
use bon::Builder;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::hash;
use crate::tree::{File, FileId, FileNode, FileSource, Folder, Tree, ROOT};
use crate::types::{
    read_bstring, read_zstring, ArchiveType, BsaHeader, BtdxHeader, Dx10Record, FileRecord,
    FolderRecord, FolderRecordSe, GnrlRecord, MorrowindFileRecord, MorrowindHeader, TextureChunk,
    TextureChunkRecord, TextureHeader, FLAG_DEFAULT_COMPRESSED, FLAG_HAS_DIR_NAMES,
    FLAG_HAS_FILE_NAMES, FLAG_NAME_PREFIXED, MAGIC_BSA, MAGIC_BTDX, MAGIC_MORROWIND,
    SIZE_COMPRESS_TOGGLE, SIZE_FLAG_MASK,
};

/// Options for [`Archive::read`].
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct ReadOptions {
    /// Cross-check each stored file-name hash against the name table. Costs
    /// a hash per file; [`Archive::hashes_valid`] reports the verdict.
    #[builder(default)]
    pub verify_hashes: bool,
}

/// An opened archive: the parsed folder/file tree plus the source handle
/// that extraction and re-writing read payloads from.
///
/// ```no_run
/// use beth_bsa::{Archive, ReadOptions};
///
/// fn list(path: &str) -> beth_bsa::Result<()> {
///     let archive = Archive::read(path, ReadOptions::default())?;
///     for name in archive.file_names() {
///         println!("{name}");
///     }
///     Ok(())
/// }
/// ```
pub struct Archive {
    pub(crate) source: Option<fs::File>,
    pub(crate) tree: Tree,
    pub(crate) archive_type: ArchiveType,
    pub(crate) flags: u32,
    hashes_valid: bool,
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive {
    /// An empty archive ready to be filled via [`Archive::create_file`] and
    /// written out. Defaults to the Skyrim LE dialect with folder and file
    /// names stored.
    pub fn new() -> Self {
        Archive {
            source: None,
            tree: Tree::new(),
            archive_type: ArchiveType::Fallout3,
            flags: FLAG_HAS_DIR_NAMES | FLAG_HAS_FILE_NAMES,
            hashes_valid: true,
        }
    }

    /// Open `path` and parse its folder/file tree.
    ///
    /// A hash mismatch under `verify_hashes` does not abort the parse; the
    /// archive comes back populated and [`Archive::hashes_valid`] returns
    /// false.
    #[instrument(skip(path, options), fields(path = %path.as_ref().display()))]
    pub fn read(path: impl AsRef<Path>, options: ReadOptions) -> Result<Archive> {
        let path = path.as_ref();
        let mut file = fs::File::open(path).map_err(|err| classify_open(err, path))?;

        let header = read_header(&mut file)?;
        let mut tree = Tree::new();
        let mut hashes_valid = true;

        let archive_type;
        let flags;
        match header {
            Header::Btdx { ty, body } => {
                archive_type = ty;
                flags = FLAG_HAS_DIR_NAMES | FLAG_HAS_FILE_NAMES;
                read_btdx(&mut file, ty, &body, &mut tree)?;
            }
            Header::Morrowind(body) => {
                archive_type = ArchiveType::Morrowind;
                flags = FLAG_HAS_DIR_NAMES | FLAG_HAS_FILE_NAMES;
                read_morrowind(&mut file, &body, &mut tree)?;
            }
            Header::Bsa { ty, body } => {
                archive_type = ty;
                flags = body.archive_flags;
                hashes_valid = read_bsa(&mut file, ty, &body, &mut tree, options.verify_hashes)?;
            }
        }

        debug!(
            files = tree.count_files(),
            valid_hashes = hashes_valid,
            "archive parsed"
        );

        Ok(Archive {
            source: Some(file),
            tree,
            archive_type,
            flags,
            hashes_valid,
        })
    }

    /// Drop the source file handle. Extraction and re-writing are no longer
    /// possible afterwards; enumerating the tree still is.
    pub fn close(&mut self) {
        self.source = None;
    }

    /// The top-level folder. Every enumeration starts here.
    pub fn root(&self) -> Folder<'_> {
        Folder {
            tree: &self.tree,
            id: ROOT,
        }
    }

    pub fn archive_type(&self) -> ArchiveType {
        self.archive_type
    }

    pub fn set_archive_type(&mut self, archive_type: ArchiveType) {
        self.archive_type = archive_type;
    }

    /// The archive flag bitset (see the `FLAG_` constants).
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// False when `verify_hashes` was requested and at least one stored
    /// file-name hash contradicted the name table.
    pub fn hashes_valid(&self) -> bool {
        self.hashes_valid
    }

    /// Surface the hash verdict as a status code.
    pub fn verify_hashes(&self) -> Result<()> {
        if self.hashes_valid {
            Ok(())
        } else {
            Err(Error::InvalidHashes)
        }
    }

    pub fn file_count(&self) -> u32 {
        self.tree.count_files()
    }

    /// Every file in the archive, depth first.
    pub fn files(&self) -> impl Iterator<Item = File<'_>> {
        let tree = &self.tree;
        tree.all_files().into_iter().map(move |id| File { tree, id })
    }

    /// Archive-relative path of every file, depth first.
    pub fn file_names(&self) -> Vec<String> {
        self.tree
            .all_files()
            .into_iter()
            .map(|id| self.tree.file_path(id))
            .collect()
    }

    /// Full path of every folder that owns files.
    pub fn folder_names(&self) -> Vec<String> {
        self.tree.folder_paths_with_files()
    }

    /// Whether a file's payload is stored compressed. For the `BSA\0`
    /// dialects this is the archive's default-compressed flag XORed with the
    /// record's toggle bit; `BTDX` entries are compressed exactly when they
    /// carry a packed size.
    pub fn is_compressed(&self, file: File<'_>) -> bool {
        let node = self.tree.file(file.id);
        if self.archive_type.is_btdx() {
            node.size > 0
        } else {
            node.compress_toggle ^ self.default_compressed()
        }
    }

    /// Stage a loose file for inclusion the next time the archive is
    /// written. `name` is the archive-relative path (folders are created as
    /// needed), `source_name` the on-disk file the payload comes from.
    pub fn create_file(
        &mut self,
        name: &str,
        source_name: impl Into<PathBuf>,
        compressed: bool,
    ) {
        let (folder, leaf) = self.tree.split_file_path(name);
        let mut node = FileNode::new(leaf, folder);
        node.source = FileSource::Loose(source_name.into());
        node.compress_toggle = self.default_compressed() != compressed;
        self.tree.add_file(node);
    }

    pub(crate) fn default_compressed(&self) -> bool {
        self.flags & FLAG_DEFAULT_COMPRESSED != 0
    }

    /// Data blocks start with a full-path BString when flag 0x100 is set;
    /// Oblivion predates the flag and never prefixes.
    pub(crate) fn name_prefixed(&self) -> bool {
        self.archive_type != ArchiveType::Oblivion && self.flags & FLAG_NAME_PREFIXED != 0
    }

    pub(crate) fn source_file(&self) -> Result<&fs::File> {
        self.source
            .as_ref()
            .ok_or_else(|| Error::data("archive has no open source file"))
    }
}

fn classify_open(err: io::Error, path: &Path) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound { path: path.into() },
        _ => Error::AccessFailed { path: path.into() },
    }
}

enum Header {
    Morrowind(MorrowindHeader),
    Bsa { ty: ArchiveType, body: BsaHeader },
    Btdx { ty: ArchiveType, body: BtdxHeader },
}

/// Read the magic and dispatch to the matching header body. A magic/version
/// combination outside the table is invalid even when both halves exist in
/// other dialects.
fn read_header<R: Read + Seek>(reader: &mut R) -> Result<Header> {
    let magic = reader.read_u32::<LittleEndian>()?;
    match magic {
        MAGIC_MORROWIND => Ok(Header::Morrowind(MorrowindHeader::read(reader)?)),
        MAGIC_BSA => {
            let ty = ArchiveType::from_id(reader.read_u32::<LittleEndian>()?)?;
            if ty.is_btdx() || ty == ArchiveType::Morrowind {
                return Err(Error::data(format!(
                    "version {:#x} does not belong to a BSA archive",
                    ty.to_id()
                )));
            }
            Ok(Header::Bsa {
                ty,
                body: BsaHeader::read(reader)?,
            })
        }
        MAGIC_BTDX => {
            let ty = ArchiveType::from_id(reader.read_u32::<LittleEndian>()?)?;
            if !ty.is_btdx() {
                return Err(Error::data(format!(
                    "version {:#x} does not belong to a BTDX archive",
                    ty.to_id()
                )));
            }
            Ok(Header::Btdx {
                ty,
                body: BtdxHeader::read(reader)?,
            })
        }
        other => Err(Error::data(format!("not a bsa or ba2 file: magic {other:#010x}"))),
    }
}

/// Morrowind: size/offset pairs, a name-offset table, a dense name table.
/// The data region starts past the hash table at `12 + offset + count * 8`.
fn read_morrowind<R: Read + Seek>(
    reader: &mut R,
    header: &MorrowindHeader,
    tree: &mut Tree,
) -> Result<()> {
    let data_start = 12 + u64::from(header.hash_offset) + u64::from(header.file_count) * 8;

    let mut records = Vec::with_capacity(header.file_count as usize);
    for _ in 0..header.file_count {
        records.push(MorrowindFileRecord::read(reader)?);
    }

    // the name-offset table is redundant with the dense names that follow
    for _ in 0..header.file_count {
        reader.read_u32::<LittleEndian>()?;
    }

    for record in records {
        let path = read_zstring(reader)?;
        let (folder, name) = tree.split_file_path(&path);
        let mut node = FileNode::new(name, folder);
        node.size = record.size;
        node.data_offset = data_start + u64::from(record.offset);
        tree.add_file(node);
    }

    Ok(())
}

/// `BSA\0`: folder records up front, each pointing (biased by the total
/// file-name length) at its name-and-file block, then a dense file-name
/// table after the furthest block.
fn read_bsa<R: Read + Seek>(
    reader: &mut R,
    ty: ArchiveType,
    header: &BsaHeader,
    tree: &mut Tree,
    verify_hashes: bool,
) -> Result<bool> {
    // files in record order, for name assignment afterwards
    let mut read_order: Vec<FileId> = Vec::with_capacity(header.file_count as usize);
    let mut name_table_start = u64::from(header.offset);

    for _ in 0..header.folder_count {
        let (folder_hash, file_count, block_offset) = match ty {
            ArchiveType::SkyrimSe => {
                let record = FolderRecordSe::read(reader)?;
                (record.hash, record.file_count, record.offset)
            }
            _ => {
                let record = FolderRecord::read(reader)?;
                (record.hash, record.file_count, u64::from(record.offset))
            }
        };

        let next_record = reader.stream_position()?;

        let block_start = block_offset
            .checked_sub(u64::from(header.file_name_length))
            .ok_or_else(|| Error::data("folder block offset underflows the name-table bias"))?;
        reader.seek(SeekFrom::Start(block_start))?;

        let folder_path = read_bstring(reader)?;
        let folder = tree.insert_folder_path(&folder_path);
        tree.folder_mut(folder).hash = folder_hash;

        for _ in 0..file_count {
            let record = FileRecord::read(reader)?;
            let mut node = FileNode::new(String::new(), folder);
            node.hash = record.hash;
            node.size = record.size & !SIZE_FLAG_MASK;
            node.compress_toggle = record.size & SIZE_COMPRESS_TOGGLE != 0;
            node.data_offset = u64::from(record.offset);
            read_order.push(tree.add_file(node));
        }

        name_table_start = name_table_start.max(reader.stream_position()?);
        reader.seek(SeekFrom::Start(next_record))?;
    }

    reader.seek(SeekFrom::Start(name_table_start))?;

    let mut mismatches = 0u32;
    for id in read_order {
        let name = read_zstring(reader)?;
        if verify_hashes && hash::hash_file(&name) != tree.file(id).hash {
            mismatches += 1;
        }
        tree.file_mut(id).name = name;
    }

    if mismatches > 0 {
        debug!(mismatches, "file name hashes disagree with the name table");
    }
    Ok(mismatches == 0)
}

/// `BTDX`: name table at the recorded offset, then fixed-size file records
/// (plus chunk records for `DX10` textures) right after the header.
fn read_btdx<R: Read + Seek>(
    reader: &mut R,
    ty: ArchiveType,
    header: &BtdxHeader,
    tree: &mut Tree,
) -> Result<()> {
    reader.seek(SeekFrom::Start(header.name_table_offset))?;
    let mut names = Vec::with_capacity(header.file_count as usize);
    for _ in 0..header.file_count {
        let length = reader.read_u16::<LittleEndian>()? as usize;
        let mut raw = vec![0u8; length];
        reader.read_exact(&mut raw)?;
        names.push(String::from_utf8_lossy(&raw).into_owned());
    }

    reader.seek(SeekFrom::Start(ty.btdx_records_start()))?;

    match &header.kind {
        b"GNRL" => {
            for name in names {
                let record = GnrlRecord::read(reader)?;
                let (folder, leaf) = tree.split_file_path(&name);
                let mut node = FileNode::new(leaf, folder);
                node.size = record.packed_size;
                node.uncompressed_size = record.unpacked_size;
                node.data_offset = record.offset;
                tree.add_file(node);
            }
        }
        b"DX10" => {
            for name in names {
                let record = Dx10Record::read(reader)?;
                let mut chunks = Vec::with_capacity(record.chunk_count as usize);
                for _ in 0..record.chunk_count {
                    let chunk = TextureChunkRecord::read(reader)?;
                    chunks.push(TextureChunk {
                        offset: chunk.offset,
                        packed_size: chunk.packed_size,
                        unpacked_size: chunk.unpacked_size,
                        start_mip: chunk.start_mip,
                        end_mip: chunk.end_mip,
                    });
                }
                let first = chunks
                    .first()
                    .copied()
                    .ok_or_else(|| Error::data(format!("texture entry {name} has no chunks")))?;

                let (folder, leaf) = tree.split_file_path(&name);
                let mut node = FileNode::new(leaf, folder);
                node.size = first.packed_size;
                node.uncompressed_size = first.unpacked_size;
                node.data_offset = first.offset;
                node.texture = Some(TextureHeader {
                    width: record.width,
                    height: record.height,
                    mip_count: record.mip_count,
                    format: record.format,
                    cubemap_marker: u16::from(record.cubemap_marker),
                });
                node.chunks = chunks;
                tree.add_file(node);
            }
        }
        other => {
            return Err(Error::data(format!(
                "unknown archive kind {:?}",
                String::from_utf8_lossy(other)
            )))
        }
    }

    Ok(())
}
