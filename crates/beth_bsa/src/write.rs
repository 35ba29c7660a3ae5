//! Writing archives back to disk.
//!
//! Only the `BSA\0` layout (Oblivion through Skyrim SE) is emitted. The
//! writer runs two passes: the first lays down the header, placeholder
//! folder/file records, both name blocks and the payload data while
//! collecting the real offsets; the second seeks back to the record area and
//! rewrites it with the collected values. Folder records and the file
//! records inside each folder are sorted by hash, which is the order the
//! games' own readers binary-search.

use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, instrument};

use crate::compression;
use crate::error::{Error, Result};
use crate::read::Archive;
use crate::tree::{FileId, FileSource};
use crate::types::{
    write_bstring, write_zstring, ArchiveType, BsaHeader, FileRecord, FolderRecord, FolderRecordSe,
    MAGIC_BSA, SIZE_COMPRESS_TOGGLE,
};

/// Header size of the `BSA\0` layout; folder records start here.
const HEADER_SIZE: u32 = 0x24;

/// Extensions tracked by the header's content bitmask, one bit each in
/// order.
const FLAGGED_EXTENSIONS: [&str; 9] = [
    ".nif", ".dds", ".xml", ".wav", ".mp3", ".txt", ".spt", ".tex", ".ctl",
];

struct FilePlan {
    id: FileId,
    hash: u64,
    name: String,
    /// size word as written: stored byte count plus the toggle bit
    size_word: u32,
    offset: u32,
}

struct FolderPlan {
    hash: u64,
    path: String,
    files: Vec<FilePlan>,
    /// the folder record's offset field: block position biased by the
    /// file-name table length
    block_offset: u64,
}

impl Archive {
    /// Write the archive to `path` in the `BSA\0` layout selected by the
    /// archive type. Payloads of entries read from a source archive are
    /// copied verbatim; entries staged with [`Archive::create_file`] are
    /// ingested from disk and compressed on the way in when requested.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !matches!(
            self.archive_type,
            ArchiveType::Oblivion | ArchiveType::Fallout3 | ArchiveType::SkyrimSe
        ) {
            return Err(Error::data(format!(
                "the {:?} dialect cannot be written",
                self.archive_type
            )));
        }

        let mut plans = self.plan_folders();
        let folder_name_length: u32 = plans.iter().map(|f| f.path.len() as u32 + 1).sum();
        let file_name_length: u32 = plans
            .iter()
            .flat_map(|f| f.files.iter())
            .map(|f| f.name.len() as u32 + 1)
            .sum();
        let file_flags = determine_file_flags(
            plans
                .iter()
                .flat_map(|f| f.files.iter())
                .map(|f| f.name.as_str()),
        );
        let file_count: u32 = plans.iter().map(|f| f.files.len() as u32).sum();

        let mut out = fs::File::create(path).map_err(|_| Error::AccessFailed { path: path.into() })?;

        out.write_u32::<LittleEndian>(MAGIC_BSA)?;
        out.write_u32::<LittleEndian>(self.archive_type.to_id())?;
        BsaHeader {
            offset: HEADER_SIZE,
            archive_flags: self.flags,
            folder_count: plans.len() as u32,
            file_count,
            folder_name_length,
            file_name_length,
            file_flags,
        }
        .write(&mut out)?;

        // placeholder pass
        self.write_folder_records(&mut out, &plans)?;
        self.write_folder_blocks(&mut out, &mut plans, file_name_length, true)?;

        for plan in plans.iter().flat_map(|f| f.files.iter()) {
            write_zstring(&mut out, &plan.name)?;
        }

        self.write_file_data(&mut out, &mut plans)?;

        // fixup pass with the collected offsets
        out.seek(SeekFrom::Start(u64::from(HEADER_SIZE)))?;
        self.write_folder_records(&mut out, &plans)?;
        self.write_folder_blocks(&mut out, &mut plans, file_name_length, false)?;

        out.flush()?;
        debug!(folders = plans.len(), "archive written");
        Ok(())
    }

    /// Collect folders with files and their file lists, both sorted by
    /// hash.
    fn plan_folders(&self) -> Vec<FolderPlan> {
        let mut plans: Vec<FolderPlan> = self
            .tree
            .folders_with_files()
            .into_iter()
            .map(|id| {
                let mut files: Vec<FilePlan> = self
                    .tree
                    .folder(id)
                    .files
                    .iter()
                    .map(|&file| {
                        let node = self.tree.file(file);
                        FilePlan {
                            id: file,
                            hash: node.hash,
                            name: node.name.clone(),
                            size_word: node.size
                                | if node.compress_toggle {
                                    SIZE_COMPRESS_TOGGLE
                                } else {
                                    0
                                },
                            offset: 0,
                        }
                    })
                    .collect();
                files.sort_by_key(|f| f.hash);

                FolderPlan {
                    hash: self.tree.folder(id).hash,
                    path: self.tree.full_path(id),
                    files,
                    block_offset: 0,
                }
            })
            .collect();
        plans.sort_by_key(|f| f.hash);
        plans
    }

    fn write_folder_records(&self, out: &mut fs::File, plans: &[FolderPlan]) -> Result<()> {
        for plan in plans {
            match self.archive_type {
                ArchiveType::SkyrimSe => FolderRecordSe {
                    hash: plan.hash,
                    file_count: plan.files.len() as u32,
                    padding: 0,
                    offset: plan.block_offset,
                }
                .write(out)?,
                _ => FolderRecord {
                    hash: plan.hash,
                    file_count: plan.files.len() as u32,
                    offset: u32::try_from(plan.block_offset)
                        .map_err(|_| Error::data("folder block offset exceeds 32 bits"))?,
                }
                .write(out)?,
            }
        }
        Ok(())
    }

    /// Emit each folder's name-and-file block. On the placeholder pass the
    /// block positions are recorded; the fixup pass re-emits the same bytes
    /// with the real file offsets.
    fn write_folder_blocks(
        &self,
        out: &mut fs::File,
        plans: &mut [FolderPlan],
        file_name_length: u32,
        record_offsets: bool,
    ) -> Result<()> {
        for plan in plans.iter_mut() {
            if record_offsets {
                plan.block_offset = out.stream_position()? + u64::from(file_name_length);
            }
            write_bstring(out, &plan.path)?;
            for file in plan.files.iter() {
                FileRecord {
                    hash: file.hash,
                    size: file.size_word,
                    offset: file.offset,
                }
                .write(out)?;
            }
        }
        Ok(())
    }

    /// Copy every payload into the target, recording real offsets and, for
    /// loose files, the stored sizes.
    fn write_file_data(&self, out: &mut fs::File, plans: &mut [FolderPlan]) -> Result<()> {
        for plan in plans.iter_mut() {
            for file in plan.files.iter_mut() {
                file.offset = u32::try_from(out.stream_position()?)
                    .map_err(|_| Error::data("file data offset exceeds 32 bits"))?;

                let node = self.tree.file(file.id);
                match &node.source {
                    FileSource::Archived => {
                        let mut source = self.source_file()?;
                        source.seek(SeekFrom::Start(node.data_offset))?;
                        let mut payload = vec![0u8; node.size as usize];
                        source.read_exact(&mut payload)?;
                        out.write_all(&payload)?;
                    }
                    FileSource::Loose(source_path) => {
                        let data = fs::read(source_path).map_err(|_| Error::FileNotFound {
                            path: source_path.clone(),
                        })?;

                        let mut stored = Vec::with_capacity(data.len());
                        if self.name_prefixed() {
                            write_bstring(&mut stored, &self.tree.file_path(file.id))?;
                        }
                        if node.compress_toggle ^ self.default_compressed() {
                            let packed = match self.archive_type {
                                ArchiveType::SkyrimSe => compression::lz4_frame_compress(&data)?,
                                _ => compression::deflate(&data)?,
                            };
                            stored.extend_from_slice(&packed);
                        } else {
                            stored.extend_from_slice(&data);
                        }

                        file.size_word = stored.len() as u32
                            | if node.compress_toggle {
                                SIZE_COMPRESS_TOGGLE
                            } else {
                                0
                            };
                        out.write_all(&stored)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// One bit per tracked extension, set when at least one file carries it.
fn determine_file_flags<'a>(names: impl Iterator<Item = &'a str>) -> u32 {
    let mut result = 0u32;
    for name in names {
        let lower = name.to_ascii_lowercase();
        for (bit, extension) in FLAGGED_EXTENSIONS.iter().enumerate() {
            if lower.ends_with(extension) {
                result |= 1 << bit;
            }
        }
    }
    result
}
