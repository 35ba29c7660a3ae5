//! DDS header synthesis for texture entries.
//!
//! `DX10` archives store textures headerless; extraction rebuilds the
//! 124-byte DDS header (and, for formats DDS cannot describe natively, the
//! 20-byte DX10 extension) from the texture record before the chunk data is
//! written out.

use binrw::BinWrite;
use std::io::Cursor;

use crate::error::Result;
use crate::types::TextureHeader;

/// Value of [`TextureHeader::cubemap_marker`] on cubemap textures.
pub const CUBEMAP_MARKER: u16 = 2049;

const DDS_MAGIC: &[u8; 4] = b"DDS ";

// dwFlags
const HEADER_FLAGS_TEXTURE: u32 = 0x0000_1007;
const HEADER_FLAGS_MIPMAP: u32 = 0x0002_0000;
const HEADER_FLAGS_LINEARSIZE: u32 = 0x0008_0000;

// dwCaps / dwCaps2
const SURFACE_FLAGS_TEXTURE: u32 = 0x0000_1000;
const SURFACE_FLAGS_MIPMAP: u32 = 0x0040_0008;
const CUBEMAP_ALLFACES: u32 = 0x0000_FE00;

// pixel format flags
const PF_FOURCC: u32 = 0x0000_0004;
const PF_RGB: u32 = 0x0000_0040;
const PF_RGBA: u32 = 0x0000_0041;
const PF_LUMINANCE: u32 = 0x0002_0000;

const fn four_cc(cc: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*cc)
}

// DXGI_FORMAT codes
const DXGI_R8G8B8A8_UNORM: u16 = 28;
const DXGI_R8_UNORM: u16 = 61;
const DXGI_BC1_UNORM: u16 = 71;
const DXGI_BC1_UNORM_SRGB: u16 = 72;
const DXGI_BC2_UNORM: u16 = 74;
const DXGI_BC2_UNORM_SRGB: u16 = 75;
const DXGI_BC3_UNORM: u16 = 77;
const DXGI_BC3_UNORM_SRGB: u16 = 78;
const DXGI_BC4_UNORM: u16 = 80;
const DXGI_BC5_UNORM: u16 = 83;
const DXGI_BC5_SNORM: u16 = 84;
const DXGI_B8G8R8A8_UNORM: u16 = 87;
const DXGI_B8G8R8X8_UNORM: u16 = 88;
const DXGI_BC7_UNORM: u16 = 98;
const DXGI_BC7_UNORM_SRGB: u16 = 99;

const DX10_DIMENSION_TEXTURE2D: u32 = 3;

#[derive(BinWrite, Debug, Default, Clone, Copy)]
#[bw(little)]
struct PixelFormat {
    size: u32,
    flags: u32,
    four_cc: u32,
    rgb_bit_count: u32,
    r_mask: u32,
    g_mask: u32,
    b_mask: u32,
    a_mask: u32,
}

impl PixelFormat {
    fn four_cc(flags: u32, cc: &[u8; 4]) -> Self {
        PixelFormat {
            size: 32,
            flags,
            four_cc: four_cc(cc),
            ..Default::default()
        }
    }

    fn rgb(flags: u32, bit_count: u32, masks: [u32; 4]) -> Self {
        PixelFormat {
            size: 32,
            flags,
            rgb_bit_count: bit_count,
            r_mask: masks[0],
            g_mask: masks[1],
            b_mask: masks[2],
            a_mask: masks[3],
            ..Default::default()
        }
    }
}

#[derive(BinWrite, Debug, Default, Clone, Copy)]
#[bw(little)]
struct DdsHeader {
    size: u32,
    flags: u32,
    height: u32,
    width: u32,
    pitch_or_linear_size: u32,
    depth: u32,
    mip_map_count: u32,
    reserved1: [u32; 11],
    pixel_format: PixelFormat,
    caps: u32,
    caps2: u32,
    caps3: u32,
    caps4: u32,
    reserved2: u32,
}

#[derive(BinWrite, Debug, Default, Clone, Copy)]
#[bw(little)]
struct Dx10Extension {
    dxgi_format: u32,
    resource_dimension: u32,
    misc_flag: u32,
    array_size: u32,
    misc_flags2: u32,
}

/// Build `"DDS "` plus the synthesized header (and DX10 extension where the
/// format requires one) for a texture entry. Formats outside the supported
/// table yield an empty buffer and the entry's chunks are written bare.
pub(crate) fn dds_prefix(texture: &TextureHeader) -> Result<Vec<u8>> {
    let width = u32::from(texture.width);
    let height = u32::from(texture.height);

    let mut header = DdsHeader {
        size: 124,
        flags: HEADER_FLAGS_TEXTURE | HEADER_FLAGS_LINEARSIZE | HEADER_FLAGS_MIPMAP,
        height,
        width,
        mip_map_count: u32::from(texture.mip_count),
        caps: SURFACE_FLAGS_TEXTURE | SURFACE_FLAGS_MIPMAP,
        ..Default::default()
    };

    if texture.cubemap_marker == CUBEMAP_MARKER {
        header.caps2 = CUBEMAP_ALLFACES;
    }

    let mut dx10 = None;
    match texture.format {
        DXGI_BC1_UNORM | DXGI_BC1_UNORM_SRGB => {
            header.pixel_format = PixelFormat::four_cc(PF_FOURCC, b"DXT1");
            header.pitch_or_linear_size = width * height / 2;
        }
        DXGI_BC2_UNORM | DXGI_BC2_UNORM_SRGB => {
            header.pixel_format = PixelFormat::four_cc(PF_FOURCC, b"DXT3");
            header.pitch_or_linear_size = width * height;
        }
        DXGI_BC3_UNORM | DXGI_BC3_UNORM_SRGB => {
            header.pixel_format = PixelFormat::four_cc(PF_FOURCC, b"DXT5");
            header.pitch_or_linear_size = width * height;
        }
        DXGI_BC4_UNORM => {
            header.pixel_format = PixelFormat::four_cc(PF_FOURCC, b"BC4U");
            header.pitch_or_linear_size = width * height;
        }
        DXGI_BC5_UNORM => {
            header.pixel_format = PixelFormat::four_cc(PF_FOURCC, b"ATI2");
            header.pitch_or_linear_size = width * height;
        }
        DXGI_BC5_SNORM => {
            header.pixel_format = PixelFormat::four_cc(PF_FOURCC, b"BC5S");
            header.pitch_or_linear_size = width * height;
        }
        DXGI_BC7_UNORM | DXGI_BC7_UNORM_SRGB => {
            header.pixel_format = PixelFormat::four_cc(PF_FOURCC, b"DX10");
            header.pitch_or_linear_size = width * height;
            dx10 = Some(Dx10Extension {
                dxgi_format: u32::from(texture.format),
                resource_dimension: DX10_DIMENSION_TEXTURE2D,
                misc_flag: 0,
                array_size: 1,
                misc_flags2: 0,
            });
        }
        DXGI_R8G8B8A8_UNORM => {
            header.pixel_format = PixelFormat::rgb(
                PF_RGBA,
                32,
                [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000],
            );
            header.pitch_or_linear_size = width * height * 4;
        }
        DXGI_B8G8R8A8_UNORM => {
            header.pixel_format = PixelFormat::rgb(
                PF_RGBA,
                32,
                [0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000],
            );
            header.pitch_or_linear_size = width * height * 4;
        }
        DXGI_B8G8R8X8_UNORM => {
            header.pixel_format =
                PixelFormat::rgb(PF_RGB, 32, [0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0]);
        }
        DXGI_R8_UNORM => {
            header.pixel_format = PixelFormat::rgb(PF_LUMINANCE, 8, [0xFF, 0, 0, 0]);
            header.pitch_or_linear_size = width * height;
        }
        _ => return Ok(Vec::new()),
    }

    let mut output = Cursor::new(Vec::with_capacity(148));
    std::io::Write::write_all(&mut output, DDS_MAGIC)?;
    header.write(&mut output)?;
    if let Some(extension) = dx10 {
        extension.write(&mut output)?;
    }

    Ok(output.into_inner())
}
