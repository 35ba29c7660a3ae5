//! Extracting entries to the filesystem.
//!
//! A single entry goes through seek → optional name-prefix consumption →
//! read → decompress → (for textures) DDS header synthesis → write. Bulk
//! extraction runs the read half and the write half on two threads joined by
//! a bounded channel, so decompression and target I/O overlap with source
//! reads. The controlling thread polls a progress callback every 100 ms;
//! returning `false` from it cancels the run cooperatively.

use bon::Builder;
use byteorder::{LittleEndian, ReadBytesExt};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::compression;
use crate::dds;
use crate::error::{Error, Result};
use crate::read::Archive;
use crate::tree::{File, FileId, FolderId, ROOT};
use crate::types::{read_bstring, ArchiveType};

/// Work items buffered between the reader and the extractor thread.
const QUEUE_BOUND: usize = 100;

/// Cadence of the progress callback and of the worker joins.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Options for [`Archive::extract_all`].
#[derive(Debug, Clone, Copy, Builder)]
pub struct ExtractOptions {
    /// Replace pre-existing target files. When false they are skipped.
    #[builder(default = true)]
    pub overwrite: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions { overwrite: true }
    }
}

/// How a buffered payload still needs to be transformed before it can be
/// written out.
enum Payload {
    /// Write as-is.
    Raw,
    /// zlib stream; `unpacked_size` is `None` when the stream is preceded by
    /// its own 4-byte size word (the older dialects).
    Zlib { unpacked_size: Option<u32> },
    /// Skyrim SE LZ4 frame; the size word was already consumed.
    Lz4Frame { unpacked_size: u32 },
    /// Texture chunks, already decompressed and concatenated; needs the
    /// synthesized DDS prefix.
    Texture,
}

struct WorkItem {
    file: FileId,
    data: Vec<u8>,
    payload: Payload,
}

impl Archive {
    /// Extract one entry into `output_directory`, under its archive-relative
    /// path. Parent directories are created as needed.
    #[instrument(skip_all, fields(file = %file.full_path()))]
    pub fn extract(&self, file: File<'_>, output_directory: impl AsRef<Path>) -> Result<()> {
        let target = target_path(output_directory.as_ref(), &file.full_path());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|_| Error::AccessFailed {
                path: parent.to_path_buf(),
            })?;
        }
        let mut out = fs::File::create(&target).map_err(|_| Error::AccessFailed {
            path: target.clone(),
        })?;

        let mut source = self.source_file()?;
        let (data, payload) = self.read_payload(&mut source, file.id)?;
        self.write_payload(&mut out, file.id, &data, &payload)
    }

    /// Extract every entry into `output_directory`.
    ///
    /// `progress` is called roughly every 100 ms with the completed
    /// percentage and the name of the entry most recently finished;
    /// returning `false` cancels the run. Cancellation is cooperative:
    /// already-buffered work may still be written (at most the buffer bound
    /// of 100 entries), and partially extracted output is left in place.
    #[instrument(skip_all, fields(target = %output_directory.as_ref().display()))]
    pub fn extract_all<F>(
        &self,
        output_directory: impl AsRef<Path>,
        mut progress: F,
        options: ExtractOptions,
    ) -> Result<()>
    where
        F: FnMut(u32, &str) -> bool,
    {
        let output_directory = output_directory.as_ref();
        fs::create_dir_all(output_directory).map_err(|_| Error::AccessFailed {
            path: output_directory.to_path_buf(),
        })?;
        self.create_folders(output_directory, ROOT)?;

        let mut files = self.tree.all_files();
        if files.is_empty() {
            return Ok(());
        }
        // ascending source offset: the single reader handle only seeks
        // forward
        files.sort_by_key(|&id| self.tree.file(id).data_offset);
        let total = files.len();

        let source = self.source_file()?;

        let (sender, receiver) = bounded::<WorkItem>(QUEUE_BOUND);
        let cancel_read = AtomicBool::new(false);
        let cancel_extract = AtomicBool::new(false);
        let finished = AtomicUsize::new(0);

        thread::scope(|scope| {
            let files = &files;
            let cancel_read = &cancel_read;
            let cancel_extract = &cancel_extract;
            let finished = &finished;

            let reader = scope.spawn(move || {
                let mut source = source;
                for &id in files.iter() {
                    if cancel_read.load(Ordering::Relaxed) {
                        break;
                    }
                    match self.read_payload(&mut source, id) {
                        Ok((data, payload)) => {
                            let item = WorkItem {
                                file: id,
                                data,
                                payload,
                            };
                            if sender.send(item).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(
                                file = %self.tree.file_path(id),
                                %err,
                                "skipping unreadable entry"
                            );
                            finished.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                // sender drops here; the extractor drains and stops
            });

            let extractor = scope.spawn(move || {
                loop {
                    if cancel_extract.load(Ordering::Relaxed) {
                        break;
                    }
                    let item = match receiver.recv_timeout(PROGRESS_INTERVAL) {
                        Ok(item) => item,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    };
                    if let Err(err) = self.write_item(output_directory, &item, options.overwrite) {
                        warn!(
                            file = %self.tree.file_path(item.file),
                            %err,
                            "skipping unwritable entry"
                        );
                    }
                    finished.fetch_add(1, Ordering::Relaxed);
                }
            });

            let mut canceled = false;
            loop {
                thread::sleep(PROGRESS_INTERVAL);
                let reader_done = reader.is_finished();
                let extractor_done = extractor.is_finished();

                let done = finished.load(Ordering::Relaxed).min(total);
                let index = done.min(total - 1);
                let name = &self.tree.file(files[index]).name;
                if !progress((done * 100 / total) as u32, name) && !canceled {
                    cancel_read.store(true, Ordering::Relaxed);
                    canceled = true;
                }
                // only stop the extractor once the reader can no longer
                // block on a full queue
                if canceled && reader_done {
                    cancel_extract.store(true, Ordering::Relaxed);
                }
                if reader_done && extractor_done {
                    break;
                }
            }
        });

        Ok(())
    }

    /// Mirror the folder tree below `target`; every archive folder gets a
    /// directory whether or not it holds files.
    fn create_folders(&self, target: &Path, folder: FolderId) -> Result<()> {
        for (name, &child) in self.tree.folder(folder).children.iter() {
            let child_dir = target.join(name);
            fs::create_dir_all(&child_dir).map_err(|_| Error::AccessFailed {
                path: child_dir.clone(),
            })?;
            self.create_folders(&child_dir, child)?;
        }
        Ok(())
    }

    /// Read one entry's stored bytes, classifying what is left to do with
    /// them. Texture chunks are decompressed inline so the consumer sees an
    /// already-materialized DDS body.
    fn read_payload<R: Read + Seek>(
        &self,
        source: &mut R,
        id: FileId,
    ) -> Result<(Vec<u8>, Payload)> {
        let node = self.tree.file(id);

        if self.archive_type.is_btdx() {
            if node.chunks.is_empty() {
                let compressed = node.size > 0;
                let stored = if compressed {
                    node.size
                } else {
                    node.uncompressed_size
                };
                source.seek(SeekFrom::Start(node.data_offset))?;
                let mut data = vec![0u8; stored as usize];
                source.read_exact(&mut data)?;
                let payload = if compressed {
                    Payload::Zlib {
                        unpacked_size: Some(node.uncompressed_size),
                    }
                } else {
                    Payload::Raw
                };
                return Ok((data, payload));
            }

            let total: usize = node
                .chunks
                .iter()
                .map(|chunk| chunk.unpacked_size as usize)
                .sum();
            let mut data = Vec::with_capacity(total);
            for chunk in &node.chunks {
                source.seek(SeekFrom::Start(chunk.offset))?;
                if chunk.packed_size > 0 {
                    let mut packed = vec![0u8; chunk.packed_size as usize];
                    source.read_exact(&mut packed)?;
                    let unpacked = match self.archive_type {
                        ArchiveType::StarfieldLz4Texture => compression::lz4_block_decompress(
                            &packed,
                            chunk.unpacked_size as usize,
                        )?,
                        _ => compression::inflate(&packed, Some(chunk.unpacked_size as usize))?,
                    };
                    data.extend_from_slice(&unpacked);
                } else {
                    let start = data.len();
                    data.resize(start + chunk.unpacked_size as usize, 0);
                    source.read_exact(&mut data[start..])?;
                }
            }
            return Ok((data, Payload::Texture));
        }

        if node.size == 0 {
            return Ok((Vec::new(), Payload::Raw));
        }

        source.seek(SeekFrom::Start(node.data_offset))?;
        let mut remaining = node.size;
        if self.name_prefixed() {
            let prefix = read_bstring(source)?;
            let consumed = prefix.len() as u32 + 1;
            if remaining <= consumed {
                return Err(Error::data(format!(
                    "name prefix of {} swallows the whole entry",
                    self.tree.file_path(id)
                )));
            }
            remaining -= consumed;
        }

        let compressed = node.compress_toggle ^ self.default_compressed();
        let payload = if compressed && self.archive_type == ArchiveType::SkyrimSe {
            if remaining <= 4 {
                return Err(Error::data("compressed entry shorter than its size prefix"));
            }
            let unpacked_size = source.read_u32::<LittleEndian>()?;
            remaining -= 4;
            Payload::Lz4Frame { unpacked_size }
        } else if compressed {
            // the 4-byte size word stays in the buffer for the decoder
            Payload::Zlib {
                unpacked_size: None,
            }
        } else {
            Payload::Raw
        };

        let mut data = vec![0u8; remaining as usize];
        source.read_exact(&mut data)?;
        Ok((data, payload))
    }

    /// Finish a buffered entry: decompress where needed, synthesize the DDS
    /// prefix for textures, write.
    fn write_payload<W: Write>(
        &self,
        out: &mut W,
        id: FileId,
        data: &[u8],
        payload: &Payload,
    ) -> Result<()> {
        match payload {
            Payload::Raw => out.write_all(data)?,
            Payload::Zlib { unpacked_size } => {
                let plain =
                    compression::inflate(data, unpacked_size.map(|size| size as usize))?;
                out.write_all(&plain)?;
            }
            Payload::Lz4Frame { unpacked_size } => {
                let plain =
                    compression::lz4_frame_decompress(data, *unpacked_size as usize)?;
                out.write_all(&plain)?;
            }
            Payload::Texture => {
                let texture = self
                    .tree
                    .file(id)
                    .texture
                    .as_ref()
                    .ok_or_else(|| Error::data("texture payload without a texture record"))?;
                out.write_all(&dds::dds_prefix(texture)?)?;
                out.write_all(data)?;
            }
        }
        Ok(())
    }

    fn write_item(&self, output_directory: &Path, item: &WorkItem, overwrite: bool) -> Result<()> {
        let target = target_path(output_directory, &self.tree.file_path(item.file));
        if !overwrite && target.exists() {
            return Ok(());
        }
        let mut out = fs::File::create(&target).map_err(|_| Error::AccessFailed {
            path: target.clone(),
        })?;
        self.write_payload(&mut out, item.file, &item.data, &item.payload)
    }
}

/// Turn an archive-relative path (backslash separators) into a target path
/// below `directory`.
fn target_path(directory: &Path, relative: &str) -> PathBuf {
    let mut path = directory.to_path_buf();
    for segment in relative.split(['\\', '/']).filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}
