//! Decompression and compression adapters.
//!
//! Three codecs appear across the archive dialects: zlib (Oblivion through
//! Skyrim LE entries, Fallout 4/Starfield general files and texture chunks),
//! LZ4 frame (Skyrim SE entries) and raw LZ4 blocks (Starfield texture
//! chunks, which carry their output size in the chunk record). Each adapter
//! takes and returns whole buffers; entries are never streamed in pieces.

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use std::io::{Read, Write};
use tracing::trace;

use crate::error::{Error, Result};

/// zlib window size used throughout; combined with header auto-detection
/// this matches `inflateInit2(15 + 32)`.
const WINDOW_BITS: u8 = 15;

fn check_window_bits(bits: u8) -> Result<()> {
    if !(9..=15).contains(&bits) {
        return Err(Error::ZlibInitFailed);
    }
    Ok(())
}

/// Inflate a zlib (or gzip) stream. When `expected_size` is `None` the
/// buffer starts with the 4-byte uncompressed size, which is the layout of
/// every compressed entry in the older dialects.
pub(crate) fn inflate(data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
    check_window_bits(WINDOW_BITS)?;

    let (expected, stream) = match expected_size {
        Some(size) => (size, data),
        None => {
            if data.len() < 4 {
                return Err(Error::data("compressed entry shorter than its size prefix"));
            }
            (LittleEndian::read_u32(&data[..4]) as usize, &data[4..])
        }
    };

    if stream.is_empty() || expected == 0 {
        return Ok(Vec::new());
    }

    trace!("inflating {} bytes into {}", stream.len(), expected);

    let mut output = Vec::with_capacity(expected);
    // header auto-detection: gzip magic, else zlib
    let read = if stream.starts_with(&[0x1F, 0x8B]) {
        GzDecoder::new(stream).read_to_end(&mut output)
    } else {
        ZlibDecoder::new(stream).read_to_end(&mut output)
    };
    read.map_err(|err| Error::data(format!("zlib stream is corrupt: {err}")))?;

    Ok(output)
}

/// Deflate a buffer into the on-disk shape of an older-dialect compressed
/// entry: 4-byte uncompressed size, then the zlib stream.
pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = vec![0u8; 4];
    LittleEndian::write_u32(&mut output[..4], data.len() as u32);

    let mut encoder = ZlibEncoder::new(output, Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress an LZ4 frame with a known output size.
pub(crate) fn lz4_frame_decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_size);
    FrameDecoder::new(data)
        .read_to_end(&mut output)
        .map_err(|err| Error::data(format!("lz4 frame is corrupt: {err}")))?;
    Ok(output)
}

/// Compress a buffer into the on-disk shape of a Skyrim SE compressed
/// entry: 4-byte uncompressed size, then an LZ4 frame.
pub(crate) fn lz4_frame_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = vec![0u8; 4];
    LittleEndian::write_u32(&mut output[..4], data.len() as u32);

    let mut encoder = FrameEncoder::new(output);
    encoder.write_all(data)?;
    encoder
        .finish()
        .map_err(|err| Error::data(format!("lz4 frame could not be finished: {err}")))
}

/// Decompress a raw LZ4 block. The output size comes from the chunk record;
/// it is never guessed from the stream.
pub(crate) fn lz4_block_decompress(data: &[u8], unpacked_size: usize) -> Result<Vec<u8>> {
    lz4_flex::decompress(data, unpacked_size)
        .map_err(|err| Error::data(format!("lz4 block is corrupt: {err}")))
}
