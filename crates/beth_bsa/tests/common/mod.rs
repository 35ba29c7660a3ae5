//! Builders that assemble synthetic archives byte by byte, so the tests
//! control every record field independently of the library's writer.
#![allow(dead_code)]

use beth_bsa::hash;

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_bstring(out: &mut Vec<u8>, value: &str) {
    out.push(value.len() as u8);
    out.extend_from_slice(value.as_bytes());
}

fn push_zstring(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(value.as_bytes());
    out.push(0);
}

/// Split `a\b\c.nif` into the folder path and the file name.
fn split(path: &str) -> (&str, &str) {
    match path.rfind('\\') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// A file entry for [`build_bsa`]; `stored` is the payload exactly as it
/// sits in the data region (prefixes and compression included).
pub struct BsaEntry {
    pub path: String,
    pub stored: Vec<u8>,
    pub compress_toggle: bool,
}

impl BsaEntry {
    pub fn new(path: &str, stored: &[u8]) -> Self {
        BsaEntry {
            path: path.to_owned(),
            stored: stored.to_vec(),
            compress_toggle: false,
        }
    }

    pub fn toggled(path: &str, stored: &[u8]) -> Self {
        BsaEntry {
            compress_toggle: true,
            ..Self::new(path, stored)
        }
    }
}

/// Assemble a `BSA\0` archive (version 0x67/0x68/0x69). Entries keep their
/// given order; folders are formed from the paths in first-seen order.
pub fn build_bsa(version: u32, archive_flags: u32, entries: &[BsaEntry]) -> Vec<u8> {
    let se = version == 0x69;
    let folder_record_size: u32 = if se { 24 } else { 16 };

    // group by folder, first-seen order
    let mut folders: Vec<(&str, Vec<&BsaEntry>)> = Vec::new();
    for entry in entries {
        let (folder, _) = split(&entry.path);
        match folders.iter_mut().find(|(name, _)| *name == folder) {
            Some((_, files)) => files.push(entry),
            None => folders.push((folder, vec![entry])),
        }
    }

    let folder_name_length: u32 = folders.iter().map(|(name, _)| name.len() as u32 + 1).sum();
    let file_name_length: u32 = entries
        .iter()
        .map(|entry| split(&entry.path).1.len() as u32 + 1)
        .sum();

    let records_end = 0x24 + folders.len() as u32 * folder_record_size;
    let blocks_size: u32 = folders
        .iter()
        .map(|(name, files)| 1 + name.len() as u32 + files.len() as u32 * 16)
        .sum();
    let name_table_start = records_end + blocks_size;
    let mut data_pos = name_table_start + file_name_length;

    // per-entry absolute data offsets
    let mut offsets = Vec::new();
    for (_, files) in &folders {
        for entry in files {
            offsets.push((entry.path.as_str(), data_pos));
            data_pos += entry.stored.len() as u32;
        }
    }
    let offset_of = |path: &str| offsets.iter().find(|(p, _)| *p == path).unwrap().1;

    let mut out = Vec::new();
    push_u32(&mut out, 0x0041_5342);
    push_u32(&mut out, version);
    push_u32(&mut out, 0x24);
    push_u32(&mut out, archive_flags);
    push_u32(&mut out, folders.len() as u32);
    push_u32(&mut out, entries.len() as u32);
    push_u32(&mut out, folder_name_length);
    push_u32(&mut out, file_name_length);
    push_u32(&mut out, 0);

    // folder records
    let mut block_pos = records_end;
    for (name, files) in &folders {
        push_u64(&mut out, hash::hash_folder(name));
        push_u32(&mut out, files.len() as u32);
        if se {
            push_u32(&mut out, 0);
            push_u64(&mut out, u64::from(block_pos + file_name_length));
        } else {
            push_u32(&mut out, block_pos + file_name_length);
        }
        block_pos += 1 + name.len() as u32 + files.len() as u32 * 16;
    }

    // folder name-and-file blocks
    for (name, files) in &folders {
        push_bstring(&mut out, name);
        for entry in files {
            let (_, file_name) = split(&entry.path);
            push_u64(&mut out, hash::hash_file(file_name));
            let toggle = if entry.compress_toggle { 0x4000_0000 } else { 0 };
            push_u32(&mut out, entry.stored.len() as u32 | toggle);
            push_u32(&mut out, offset_of(&entry.path));
        }
    }

    // file name table
    for (_, files) in &folders {
        for entry in files {
            push_zstring(&mut out, split(&entry.path).1);
        }
    }

    // data
    for (_, files) in &folders {
        for entry in files {
            out.extend_from_slice(&entry.stored);
        }
    }

    out
}

/// Assemble a Morrowind archive. Paths use backslash separators.
pub fn build_morrowind(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let count = entries.len() as u32;
    let name_block: u32 = entries.iter().map(|(path, _)| path.len() as u32 + 1).sum();
    // records + name offsets + names; the hash table follows at this offset
    let hash_offset = count * 8 + count * 4 + name_block;

    let mut out = Vec::new();
    push_u32(&mut out, 0x0000_0100);
    push_u32(&mut out, hash_offset);
    push_u32(&mut out, count);

    let mut data_offset = 0u32;
    for (_, data) in entries {
        push_u32(&mut out, data.len() as u32);
        push_u32(&mut out, data_offset);
        data_offset += data.len() as u32;
    }

    let mut name_offset = 0u32;
    for (path, _) in entries {
        push_u32(&mut out, name_offset);
        name_offset += path.len() as u32 + 1;
    }

    for (path, _) in entries {
        push_zstring(&mut out, path);
    }

    // hash table, not consumed by the reader
    for _ in entries {
        push_u64(&mut out, 0);
    }

    for (_, data) in entries {
        out.extend_from_slice(data);
    }

    out
}

/// A `GNRL` entry: `packed` is the zlib stream when Some, otherwise the
/// entry is stored raw.
pub struct GnrlEntry {
    pub path: String,
    pub packed: Option<Vec<u8>>,
    pub unpacked: Vec<u8>,
}

/// Assemble a `BTDX` `GNRL` archive for the given version (1, 2 or 3).
pub fn build_btdx_gnrl(version: u32, entries: &[GnrlEntry]) -> Vec<u8> {
    let records_start = match version {
        2 => 32,
        3 => 36,
        _ => 24,
    };
    let mut data_pos = records_start + entries.len() as u64 * 36;

    let mut out = Vec::new();
    push_u32(&mut out, 0x5844_5442);
    push_u32(&mut out, version);
    out.extend_from_slice(b"GNRL");
    push_u32(&mut out, entries.len() as u32);

    let data_size: u64 = entries
        .iter()
        .map(|entry| {
            entry
                .packed
                .as_ref()
                .map_or(entry.unpacked.len(), Vec::len) as u64
        })
        .sum();
    push_u64(&mut out, data_pos + data_size);

    // newer headers carry extra words before the records
    out.resize(records_start as usize, 0);

    for entry in entries {
        let stored = entry.packed.as_ref().unwrap_or(&entry.unpacked);
        push_u32(&mut out, 0);
        out.extend_from_slice(b"xxx\0");
        push_u32(&mut out, 0);
        push_u32(&mut out, 0);
        push_u64(&mut out, data_pos);
        push_u32(&mut out, entry.packed.as_ref().map_or(0, |p| p.len() as u32));
        push_u32(&mut out, entry.unpacked.len() as u32);
        push_u32(&mut out, 0);
        data_pos += stored.len() as u64;
    }

    for entry in entries {
        out.extend_from_slice(entry.packed.as_ref().unwrap_or(&entry.unpacked));
    }

    for entry in entries {
        push_u16(&mut out, entry.path.len() as u16);
        out.extend_from_slice(entry.path.as_bytes());
    }

    out
}

/// One stored chunk of a [`Dx10Entry`]: the bytes as they sit in the data
/// region, plus the unpacked size the record advertises. `packed` is true
/// when the bytes are compressed.
pub struct Dx10Chunk {
    pub stored: Vec<u8>,
    pub unpacked_size: u32,
    pub packed: bool,
}

pub struct Dx10Entry {
    pub path: String,
    pub width: u16,
    pub height: u16,
    pub mip_count: u8,
    pub format: u16,
    pub chunks: Vec<Dx10Chunk>,
}

/// Assemble a `BTDX` `DX10` archive for the given version (1, 2 or 3).
pub fn build_btdx_dx10(version: u32, entries: &[Dx10Entry]) -> Vec<u8> {
    let records_start: u64 = match version {
        2 => 32,
        3 => 36,
        _ => 24,
    };
    let records_size: u64 = entries
        .iter()
        .map(|entry| 24 + entry.chunks.len() as u64 * 24)
        .sum();
    let mut data_pos = records_start + records_size;

    let mut out = Vec::new();
    push_u32(&mut out, 0x5844_5442);
    push_u32(&mut out, version);
    out.extend_from_slice(b"DX10");
    push_u32(&mut out, entries.len() as u32);

    let data_size: u64 = entries
        .iter()
        .flat_map(|entry| entry.chunks.iter())
        .map(|chunk| chunk.stored.len() as u64)
        .sum();
    push_u64(&mut out, data_pos + data_size);

    out.resize(records_start as usize, 0);

    for entry in entries {
        push_u32(&mut out, 0);
        out.extend_from_slice(b"dds\0");
        push_u32(&mut out, 0);
        out.push(0);
        out.push(entry.chunks.len() as u8);
        push_u16(&mut out, 24);
        push_u16(&mut out, entry.height);
        push_u16(&mut out, entry.width);
        out.push(entry.mip_count);
        push_u16(&mut out, entry.format);
        out.push(0);

        for (index, chunk) in entry.chunks.iter().enumerate() {
            push_u64(&mut out, data_pos);
            push_u32(&mut out, if chunk.packed { chunk.stored.len() as u32 } else { 0 });
            push_u32(&mut out, chunk.unpacked_size);
            push_u16(&mut out, index as u16);
            push_u16(&mut out, index as u16);
            push_u32(&mut out, 0);
            data_pos += chunk.stored.len() as u64;
        }
    }

    for entry in entries {
        for chunk in &entry.chunks {
            out.extend_from_slice(&chunk.stored);
        }
    }

    for entry in entries {
        push_u16(&mut out, entry.path.len() as u16);
        out.extend_from_slice(entry.path.as_bytes());
    }

    out
}
