// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Header-only image inspection.
//!
//! This crate answers exactly one question — "what is this file, and how big
//! a picture does it contain?" — by reading magic bytes and the handful of
//! dimension fields every common container stores near the front of the
//! file. It never decodes pixel data, never resizes, and never re-encodes:
//! rendering or transforming image content is explicitly out of scope.

use std::fs;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

pub use error::ImageError;

mod error;

/// Image container format detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    WebP,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::WebP => "image/webp",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::WebP => "webp",
        }
    }
}

/// Metadata extracted from an image file's header.
#[derive(Debug, Clone)]
pub struct ImageMeta {
    pub format: ImageFormat,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    /// Total file size in bytes.
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the whole file, if requested.
    pub sha256: Option<String>,
}

/// Number of leading bytes read to sniff the format and locate dimensions.
/// JPEG SOF markers can sit arbitrarily far into the file when preceded by
/// large APP/EXIF/ICC segments, so the JPEG path streams past this prefix
/// when needed rather than being bounded by it.
const SNIFF_LEN: usize = 32;

/// Inspect an image file, optionally hashing its full contents.
pub fn inspect(path: &Path, with_sha256: bool) -> Result<ImageMeta, ImageError> {
    let meta = fs::metadata(path).map_err(|e| ImageError::Io(path.display().to_string(), e))?;
    let file_len = meta.len();

    let mut file =
        fs::File::open(path).map_err(|e| ImageError::Io(path.display().to_string(), e))?;
    let mut head = vec![0u8; SNIFF_LEN.min(file_len as usize)];
    file.read_exact(&mut head)
        .map_err(|_| ImageError::Truncated(path.display().to_string()))?;

    let (format, width, height) = if let Some(dims) = sniff_png(&head) {
        (ImageFormat::Png, dims.0, dims.1)
    } else if let Some(dims) = sniff_gif(&head) {
        (ImageFormat::Gif, dims.0, dims.1)
    } else if let Some(dims) = sniff_bmp(&head) {
        (ImageFormat::Bmp, dims.0, dims.1)
    } else if is_webp_magic(&head) {
        let dims = sniff_webp(&mut file, &head, path)?;
        (ImageFormat::WebP, dims.0, dims.1)
    } else if is_jpeg_magic(&head) {
        let dims = sniff_jpeg(&mut file, path)?;
        (ImageFormat::Jpeg, dims.0, dims.1)
    } else {
        return Err(ImageError::UnsupportedFormat(path.display().to_string()));
    };

    let sha256 = if with_sha256 {
        Some(hash_file(path)?)
    } else {
        None
    };

    Ok(ImageMeta {
        format,
        mime: format.mime_type().to_string(),
        width,
        height,
        bytes: file_len,
        sha256,
    })
}

fn hash_file(path: &Path) -> Result<String, ImageError> {
    let mut file =
        fs::File::open(path).map_err(|e| ImageError::Io(path.display().to_string(), e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| ImageError::Io(path.display().to_string(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `\x89PNG\r\n\x1a\n` signature, then an IHDR chunk with big-endian u32
/// width/height starting at byte 16.
fn sniff_png(head: &[u8]) -> Option<(u32, u32)> {
    const SIG: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    if head.len() < 24 || head[..8] != SIG {
        return None;
    }
    let width = u32::from_be_bytes(head[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(head[20..24].try_into().ok()?);
    Some((width, height))
}

/// `GIF87a`/`GIF89a`, then little-endian u16 width/height.
fn sniff_gif(head: &[u8]) -> Option<(u32, u32)> {
    if head.len() < 10 || &head[..3] != b"GIF" {
        return None;
    }
    if &head[3..6] != b"87a" && &head[3..6] != b"89a" {
        return None;
    }
    let width = u16::from_le_bytes(head[6..8].try_into().ok()?) as u32;
    let height = u16::from_le_bytes(head[8..10].try_into().ok()?) as u32;
    Some((width, height))
}

/// `BM` signature, then little-endian i32 width/height at offset 18
/// (BITMAPINFOHEADER). Height may be negative (top-down DIB); report the
/// magnitude.
fn sniff_bmp(head: &[u8]) -> Option<(u32, u32)> {
    if head.len() < 26 || &head[..2] != b"BM" {
        return None;
    }
    let width = i32::from_le_bytes(head[18..22].try_into().ok()?);
    let height = i32::from_le_bytes(head[22..26].try_into().ok()?);
    Some((width.unsigned_abs(), height.unsigned_abs()))
}

fn is_webp_magic(head: &[u8]) -> bool {
    head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WEBP"
}

fn is_jpeg_magic(head: &[u8]) -> bool {
    head.len() >= 2 && head[0] == 0xFF && head[1] == 0xD8
}

/// WEBP has three sub-formats (VP8, VP8L, VP8X) each with its own dimension
/// encoding. Re-reads the file since the chunk payload may start past our
/// sniff window for VP8X-extended files with a large ICC/EXIF chunk ahead
/// of VP8/VP8L, though in practice VP8 data is always the first chunk.
fn sniff_webp(file: &mut fs::File, head: &[u8], path: &Path) -> Result<(u32, u32), ImageError> {
    use std::io::{Seek, SeekFrom};

    if head.len() < 16 {
        return Err(ImageError::Truncated(path.display().to_string()));
    }
    let chunk_tag = &head[12..16];
    file.seek(SeekFrom::Start(20))
        .map_err(|e| ImageError::Io(path.display().to_string(), e))?;
    let mut buf = [0u8; 10];
    file.read_exact(&mut buf)
        .map_err(|_| ImageError::Truncated(path.display().to_string()))?;

    match chunk_tag {
        b"VP8 " => {
            // Lossy: 3-byte frame tag, 3-byte start code (0x9d 0x01 0x2a),
            // then little-endian 14-bit width/height (top 2 bits are scale).
            if buf[3] != 0x9d || buf[4] != 0x01 || buf[5] != 0x2a {
                return Err(ImageError::Truncated(path.display().to_string()));
            }
            let w = (u16::from_le_bytes([buf[6], buf[7]]) & 0x3fff) as u32;
            let h = (u16::from_le_bytes([buf[8], buf[9]]) & 0x3fff) as u32;
            Ok((w, h))
        }
        b"VP8L" => {
            // Lossless: 1-byte signature (0x2f), then a 32-bit little-endian
            // bitstream: 14 bits width-1, 14 bits height-1.
            if buf[0] != 0x2f {
                return Err(ImageError::Truncated(path.display().to_string()));
            }
            let bits = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]);
            let w = (bits & 0x3fff) + 1;
            let h = ((bits >> 14) & 0x3fff) + 1;
            Ok((w, h))
        }
        b"VP8X" => {
            // Extended: 24-bit little-endian width-1 and height-1 starting
            // at byte 4 of the chunk payload (after the 4-byte flags word).
            let w = (u32::from(buf[4]) | (u32::from(buf[5]) << 8) | (u32::from(buf[6]) << 16)) + 1;
            let h = (u32::from(buf[7]) | (u32::from(buf[8]) << 8) | (u32::from(buf[9]) << 16)) + 1;
            Ok((w, h))
        }
        _ => Err(ImageError::UnsupportedFormat(path.display().to_string())),
    }
}

/// JPEG stores dimensions in the SOFn marker (baseline/progressive variants),
/// which can appear after arbitrarily large APPn/EXIF/ICC segments. Walk the
/// marker chain, skipping each segment by its declared length, until a SOF
/// marker or end of file.
fn sniff_jpeg(file: &mut fs::File, path: &Path) -> Result<(u32, u32), ImageError> {
    use std::io::{Seek, SeekFrom};

    file.seek(SeekFrom::Start(2))
        .map_err(|e| ImageError::Io(path.display().to_string(), e))?;

    let err = || ImageError::Truncated(path.display().to_string());
    let mut marker_buf = [0u8; 2];

    loop {
        // Markers are prefixed by any number of 0xFF fill bytes.
        file.read_exact(&mut marker_buf[..1]).map_err(|_| err())?;
        if marker_buf[0] != 0xFF {
            continue;
        }
        let mut kind = 0u8;
        loop {
            file.read_exact(std::slice::from_mut(&mut kind))
                .map_err(|_| err())?;
            if kind != 0xFF {
                break;
            }
        }
        match kind {
            0x00 | 0x01 | 0xD0..=0xD9 => continue, // no-length markers
            0xC0..=0xCF if kind != 0xC4 && kind != 0xC8 && kind != 0xCC => {
                // SOFn (baseline/progressive/extended), skip length + precision byte.
                file.read_exact(&mut marker_buf).map_err(|_| err())?; // segment length
                let mut sof = [0u8; 5];
                file.read_exact(&mut sof).map_err(|_| err())?;
                let height = u16::from_be_bytes([sof[1], sof[2]]) as u32;
                let width = u16::from_be_bytes([sof[3], sof[4]]) as u32;
                return Ok((width, height));
            }
            0xD8 | 0xD9 => continue,
            _ => {
                file.read_exact(&mut marker_buf).map_err(|_| err())?;
                let len = u16::from_be_bytes(marker_buf) as i64;
                if len < 2 {
                    return Err(err());
                }
                file.seek(SeekFrom::Current(len - 2))
                    .map_err(|_| err())?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_PNG: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xde, 0x00, 0x00, 0x00, 0x0c, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0xf8,
        0xcf, 0xc0, 0x00, 0x00, 0x03, 0x01, 0x01, 0x00, 0xc9, 0xfe, 0x92, 0xef, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    fn write_tmp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), bytes).unwrap();
        tmp
    }

    #[test]
    fn png_dimensions_and_mime() {
        let tmp = write_tmp(MINIMAL_PNG);
        let meta = inspect(tmp.path(), false).unwrap();
        assert_eq!(meta.format, ImageFormat::Png);
        assert_eq!(meta.mime, "image/png");
        assert_eq!(meta.width, 1);
        assert_eq!(meta.height, 1);
        assert!(meta.sha256.is_none());
    }

    #[test]
    fn sha256_only_computed_when_requested() {
        let tmp = write_tmp(MINIMAL_PNG);
        let meta = inspect(tmp.path(), true).unwrap();
        assert!(meta.sha256.is_some());
        assert_eq!(meta.sha256.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn gif_dimensions() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&10u16.to_le_bytes());
        bytes.extend_from_slice(&20u16.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        let tmp = write_tmp(&bytes);
        let meta = inspect(tmp.path(), false).unwrap();
        assert_eq!(meta.format, ImageFormat::Gif);
        assert_eq!((meta.width, meta.height), (10, 20));
    }

    #[test]
    fn bmp_dimensions() {
        let mut bytes = b"BM".to_vec();
        bytes.extend_from_slice(&[0u8; 16]); // file size, reserved, data offset
        bytes.extend_from_slice(&100i32.to_le_bytes());
        bytes.extend_from_slice(&(-50i32).to_le_bytes()); // top-down DIB
        let tmp = write_tmp(&bytes);
        let meta = inspect(tmp.path(), false).unwrap();
        assert_eq!(meta.format, ImageFormat::Bmp);
        assert_eq!((meta.width, meta.height), (100, 50));
    }

    #[test]
    fn unsupported_format_is_rejected() {
        let tmp = write_tmp(b"not an image, just some text padding to be long enough");
        assert!(inspect(tmp.path(), false).is_err());
    }

    #[test]
    fn truncated_png_header_is_rejected() {
        let tmp = write_tmp(&MINIMAL_PNG[..10]);
        assert!(inspect(tmp.path(), false).is_err());
    }
}
