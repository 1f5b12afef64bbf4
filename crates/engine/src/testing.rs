//! JPEG fixtures built in memory.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

pub fn encode(img: &RgbImage) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 95)
        .encode_image(img)
        .unwrap();
    out
}

pub fn solid_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode(&RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Red top-left quadrant, blue elsewhere.
pub fn marked_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        if x < width / 2 && y < height / 2 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    });
    encode(&img)
}

pub fn jpeg_with_exif(
    width: u32,
    height: u32,
    orientation: Option<u16>,
    taken: Option<&str>,
) -> Vec<u8> {
    insert_app1(
        solid_jpeg(width, height, [120, 130, 140]),
        &exif_app1(orientation, taken),
    )
}

/// Splices an APP1 segment right after SOI.
pub fn insert_app1(mut jpeg: Vec<u8>, segment: &[u8]) -> Vec<u8> {
    jpeg.splice(2..2, segment.iter().copied());
    jpeg
}

/// Little-endian TIFF with IFD0 `Orientation` and an Exif IFD holding `DateTimeOriginal`.
pub fn exif_app1(orientation: Option<u16>, taken: Option<&str>) -> Vec<u8> {
    let ifd0_entries = orientation.is_some() as u16 + taken.is_some() as u16;
    let exif_ifd_offset = 8 + 2 + 12 * u32::from(ifd0_entries) + 4;
    let string_offset = exif_ifd_offset + 2 + 12 + 4;

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());

    tiff.extend_from_slice(&ifd0_entries.to_le_bytes());
    if let Some(code) = orientation {
        tiff.extend_from_slice(&0x0112u16.to_le_bytes());
        tiff.extend_from_slice(&3u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&code.to_le_bytes());
        tiff.extend_from_slice(&[0, 0]);
    }
    if taken.is_some() {
        tiff.extend_from_slice(&0x8769u16.to_le_bytes());
        tiff.extend_from_slice(&4u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&exif_ifd_offset.to_le_bytes());
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());

    if let Some(taken) = taken {
        let mut ascii = taken.as_bytes().to_vec();
        ascii.push(0);
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x9003u16.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&(ascii.len() as u32).to_le_bytes());
        tiff.extend_from_slice(&string_offset.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        tiff.extend_from_slice(&ascii);
    }

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((tiff.len() + 8) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(&tiff);
    segment
}
