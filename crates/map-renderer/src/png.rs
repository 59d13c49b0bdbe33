//! PNG encoding for finished chart images.
//!
//! Two encodings are produced depending on the image content:
//! - **Indexed (color type 3)** when the chart uses at most 256 unique
//!   colors, which is common for legend-heavy categorical charts.
//! - **RGBA (color type 6)** otherwise, which antialiased text and smooth
//!   gradients usually force.
//!
//! `encode_png` picks between them automatically.

use rayon::prelude::*;
use std::collections::HashMap;
use std::io::Write;

use crate::error::{RenderError, RenderResult};

/// Palette limit for PNG8 output.
const MAX_PALETTE_SIZE: usize = 256;

/// Images below this pixel count build their palette on one thread.
const PARALLEL_THRESHOLD: usize = 4096;

/// Encode RGBA pixels as a PNG, choosing indexed or truecolor output.
pub fn encode_png(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    if pixels.len() != width * height * 4 {
        return Err(RenderError::InvalidInput(format!(
            "pixel buffer is {} bytes but {}x{} RGBA needs {}",
            pixels.len(),
            width,
            height,
            width * height * 4
        )));
    }

    let palette = if pixels.len() / 4 >= PARALLEL_THRESHOLD {
        build_palette_parallel(pixels)
    } else {
        build_palette(pixels)
    };

    match palette {
        Some((colors, indices)) => encode_indexed(width, height, &colors, &indices),
        None => encode_rgba(pixels, width, height),
    }
}

/// Pack RGBA bytes into a u32 key for palette hashing.
#[inline(always)]
fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

#[inline(always)]
fn unpack_rgba(packed: u32) -> (u8, u8, u8, u8) {
    (
        packed as u8,
        (packed >> 8) as u8,
        (packed >> 16) as u8,
        (packed >> 24) as u8,
    )
}

/// Single-pass palette extraction. Returns `None` once the image exceeds
/// 256 unique colors.
fn build_palette(pixels: &[u8]) -> Option<(Vec<(u8, u8, u8, u8)>, Vec<u8>)> {
    let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut colors: Vec<(u8, u8, u8, u8)> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / 4);

    for px in pixels.chunks_exact(4) {
        let packed = pack_rgba(px[0], px[1], px[2], px[3]);
        let index = match lookup.get(&packed) {
            Some(&idx) => idx,
            None => {
                if colors.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = colors.len() as u8;
                colors.push((px[0], px[1], px[2], px[3]));
                lookup.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((colors, indices))
}

/// Parallel palette extraction for full-size charts.
///
/// Collects per-chunk unique colors first, merges them into one palette,
/// then maps every pixel to its index in a second parallel pass.
fn build_palette_parallel(pixels: &[u8]) -> Option<(Vec<(u8, u8, u8, u8)>, Vec<u8>)> {
    let pixels_per_chunk = (pixels.len() / 4 / rayon::current_num_threads()).max(256);
    let chunk_size = pixels_per_chunk * 4;

    let candidates: Vec<u32> = pixels
        .par_chunks(chunk_size)
        .flat_map(|chunk| {
            let mut local: HashMap<u32, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE);
            for px in chunk.chunks_exact(4) {
                local.insert(pack_rgba(px[0], px[1], px[2], px[3]), ());
                if local.len() > MAX_PALETTE_SIZE {
                    break;
                }
            }
            local.into_keys().collect::<Vec<_>>()
        })
        .collect();

    let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut colors: Vec<(u8, u8, u8, u8)> = Vec::with_capacity(MAX_PALETTE_SIZE);
    for packed in candidates {
        if !lookup.contains_key(&packed) {
            if colors.len() >= MAX_PALETTE_SIZE {
                return None;
            }
            let idx = colors.len() as u8;
            lookup.insert(packed, idx);
            colors.push(unpack_rgba(packed));
        }
    }

    let mut indices = vec![0u8; pixels.len() / 4];
    indices
        .par_chunks_mut(pixels_per_chunk)
        .enumerate()
        .for_each(|(chunk_idx, out)| {
            let base = chunk_idx * pixels_per_chunk * 4;
            for (i, idx) in out.iter_mut().enumerate() {
                let off = base + i * 4;
                if off + 3 < pixels.len() {
                    let packed =
                        pack_rgba(pixels[off], pixels[off + 1], pixels[off + 2], pixels[off + 3]);
                    *idx = *lookup.get(&packed).unwrap_or(&0);
                }
            }
        });

    Some((colors, indices))
}

/// Write an indexed PNG (color type 3).
fn encode_indexed(
    width: usize,
    height: usize,
    colors: &[(u8, u8, u8, u8)],
    indices: &[u8],
) -> RenderResult<Vec<u8>> {
    let mut png = Vec::new();
    png.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);

    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));

    let mut plte = Vec::with_capacity(colors.len() * 3);
    for (r, g, b, _) in colors {
        plte.push(*r);
        plte.push(*g);
        plte.push(*b);
    }
    write_chunk(&mut png, b"PLTE", &plte);

    // tRNS only when some palette entry is not fully opaque
    if colors.iter().any(|(_, _, _, a)| *a < 255) {
        let trns: Vec<u8> = colors.iter().map(|(_, _, _, a)| *a).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = compress_scanlines(indices, width, height, 1)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Write a truecolor PNG with alpha (color type 6).
fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    let mut png = Vec::new();
    png.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);

    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));

    let idat = compress_scanlines(pixels, width, height, 4)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn ihdr(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    data.push(8); // bit depth
    data.push(color_type);
    data.push(0); // compression method
    data.push(0); // filter method
    data.push(0); // interlace method
    data
}

/// Prefix each scanline with filter type 0 and zlib-compress the result.
fn compress_scanlines(
    data: &[u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> RenderResult<Vec<u8>> {
    let stride = width * bytes_per_pixel;
    let mut raw = Vec::with_capacity(height * (1 + stride));
    for y in 0..height {
        raw.push(0); // filter type: none
        raw.extend_from_slice(&data[y * stride..(y + 1) * stride]);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(&raw)
        .map_err(|e| RenderError::Encoding(format!("deflate failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| RenderError::Encoding(format!("deflate failed: {e}")))
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut crc_input = Vec::with_capacity(4 + data.len());
    crc_input.extend_from_slice(chunk_type);
    crc_input.extend_from_slice(data);
    png.extend_from_slice(&crc32fast::hash(&crc_input).to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

    // IHDR data starts at byte 16; color type is its 10th byte.
    fn color_type(png: &[u8]) -> u8 {
        png[25]
    }

    #[test]
    fn test_build_palette_dedupes_colors() {
        let pixels = [
            255, 0, 0, 255, //
            0, 255, 0, 255, //
            0, 0, 255, 255, //
            255, 0, 0, 255, //
        ];
        let (colors, indices) = build_palette(&pixels).unwrap();
        assert_eq!(colors.len(), 3);
        assert_eq!(indices.len(), 4);
        assert_eq!(indices[0], indices[3]);
    }

    #[test]
    fn test_build_palette_keeps_alpha() {
        let pixels = [255, 0, 0, 255, 0, 0, 0, 0];
        let (colors, _) = build_palette(&pixels).unwrap();
        assert!(colors.iter().any(|(_, _, _, a)| *a == 0));
        assert!(colors.iter().any(|(_, _, _, a)| *a == 255));
    }

    #[test]
    fn test_build_palette_parallel_matches_sequential() {
        // 128x128 image, well above the parallel threshold, ~40 colors.
        let mut pixels = Vec::with_capacity(128 * 128 * 4);
        for y in 0..128u32 {
            for x in 0..128u32 {
                let band = ((x / 8 + y / 8) % 40) as u8;
                pixels.extend_from_slice(&[band * 6, 90 + band, 220 - band, 255]);
            }
        }
        let (seq_colors, seq_indices) = build_palette(&pixels).unwrap();
        let (par_colors, par_indices) = build_palette_parallel(&pixels).unwrap();
        assert_eq!(seq_colors.len(), par_colors.len());
        // Index assignment order may differ between the two paths, so compare
        // the resolved colors per pixel instead of the raw indices.
        for (s, p) in seq_indices.iter().zip(par_indices.iter()) {
            assert_eq!(seq_colors[*s as usize], par_colors[*p as usize]);
        }
    }

    #[test]
    fn test_encode_png_indexed_for_flat_colors() {
        let pixels = [
            255, 0, 0, 255, //
            0, 255, 0, 255, //
            0, 255, 0, 255, //
            255, 0, 0, 255, //
        ];
        let png = encode_png(&pixels, 2, 2).unwrap();
        assert_eq!(&png[0..8], &SIGNATURE);
        assert_eq!(color_type(&png), 3);
    }

    #[test]
    fn test_encode_png_falls_back_to_rgba() {
        // 300 unique colors in one row forces truecolor output.
        let mut pixels = Vec::with_capacity(300 * 4);
        for i in 0..300usize {
            pixels.push((i % 256) as u8);
            pixels.push((i / 2) as u8);
            pixels.push((i / 3) as u8);
            pixels.push(255);
        }
        let png = encode_png(&pixels, 300, 1).unwrap();
        assert_eq!(&png[0..8], &SIGNATURE);
        assert_eq!(color_type(&png), 6);
    }

    #[test]
    fn test_encode_png_rejects_short_buffer() {
        let pixels = [0u8; 12];
        assert!(matches!(
            encode_png(&pixels, 2, 2),
            Err(RenderError::InvalidInput(_))
        ));
    }
}
