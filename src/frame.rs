//! 8-bit grayscale frames and their construction from camera raw files.
//!
//! The sensor delivers 12-bit samples packed in little-endian 16-bit words;
//! only the top 8 bits are kept (`raw >> 4`), matching the on-board
//! conversion the flight code performs while copying out of the grab
//! buffer. Frames can also be built from any container the `image` crate
//! decodes, via luma8 conversion.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};

/// Default sensor height in pixels.
pub const DEFAULT_ROWS: usize = 1944;
/// Default sensor width in pixels.
pub const DEFAULT_COLS: usize = 2592;

/// An 8-bit grayscale image, row-major. Immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap row-major pixel data as a frame.
    ///
    /// Fails with an I/O error (UnexpectedEof) if `data` holds fewer than
    /// `rows * cols` pixels; surplus data is truncated.
    pub fn from_pixels(data: Vec<u8>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() < rows * cols {
            return Err(short_input(data.len(), rows * cols, "pixels"));
        }
        let mut data = data;
        data.truncate(rows * cols);
        Ok(Self { rows, cols, data })
    }

    /// Decode a raw 12-bit camera dump already in memory.
    ///
    /// `bytes` is a sequence of `rows * cols` little-endian 16-bit words of
    /// which only the lowest 12 bits are significant; each pixel becomes
    /// `word >> 4`.
    pub fn from_raw_bytes(bytes: &[u8], rows: usize, cols: usize) -> Result<Self> {
        let needed = rows * cols * 2;
        if bytes.len() < needed {
            return Err(short_input(bytes.len(), needed, "bytes"));
        }

        let data: Vec<u8> = bytes[..needed]
            .chunks_exact(2)
            .map(|w| (u16::from_le_bytes([w[0], w[1]]) >> 4) as u8)
            .collect();

        Ok(Self { rows, cols, data })
    }

    /// Load a raw 12-bit camera dump from a file.
    ///
    /// Fails with `Error::Io` if the file is missing or holds fewer than
    /// `rows * cols` 16-bit words.
    pub fn from_raw_file(path: impl AsRef<Path>, rows: usize, cols: usize) -> Result<Self> {
        let mut buf = vec![0u8; rows * cols * 2];
        File::open(path.as_ref())?.read_exact(&mut buf)?;
        let frame = Self::from_raw_bytes(&buf, rows, cols)?;
        info!(
            "Loaded {}x{} raw frame from {}",
            rows,
            cols,
            path.as_ref().display()
        );
        Ok(frame)
    }

    /// Build a frame from a decoded image, converting to 8-bit grayscale.
    pub fn from_image(img: &image::DynamicImage) -> Self {
        let gray = img.to_luma8();
        Self {
            rows: gray.height() as usize,
            cols: gray.width() as usize,
            data: gray.into_raw(),
        }
    }

    /// Load a frame from any image container the `image` crate decodes.
    pub fn from_image_file(path: impl AsRef<Path>) -> Result<Self> {
        let img = image::open(path.as_ref())?;
        Ok(Self::from_image(&img))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row-major pixel data.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at (row, col). Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.cols + col]
    }

    /// Threshold to zero: pixels at or below `threshold` become 0, the rest
    /// keep their value.
    pub fn thresholded(&self, threshold: u8) -> Frame {
        let mut out = Vec::new();
        self.threshold_into(threshold, &mut out);
        Frame {
            rows: self.rows,
            cols: self.cols,
            data: out,
        }
    }

    /// Allocation-reusing variant of [`thresholded`](Self::thresholded):
    /// writes the thresholded pixels into `out`, clearing previous content.
    pub fn threshold_into(&self, threshold: u8, out: &mut Vec<u8>) {
        out.clear();
        out.extend(
            self.data
                .iter()
                .map(|&p| if p > threshold { p } else { 0 }),
        );
    }
}

/// A 16-bit label image with the shape of a frame. Label 0 is background;
/// labels `1..=N` denote connected components in row-major first-touch
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    rows: usize,
    cols: usize,
    data: Vec<u16>,
}

impl LabelMap {
    pub(crate) fn new(rows: usize, cols: usize, data: Vec<u16>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    /// Label at (row, col). Panics when out of bounds.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> u16 {
        self.data[row * self.cols + col]
    }
}

fn short_input(got: usize, needed: usize, unit: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("raw frame truncated: got {got} {unit}, need {needed}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_words(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_raw_conversion_keeps_high_bits() {
        // 12-bit full scale 0x0FFF -> 255, 0x0040 -> 4, 0x000F -> 0
        let bytes = raw_words(&[0x0FFF, 0x0040, 0x000F, 0x0800]);
        let frame = Frame::from_raw_bytes(&bytes, 2, 2).unwrap();
        assert_eq!(frame.as_slice(), &[255, 4, 0, 128]);
    }

    #[test]
    fn test_raw_truncated() {
        let bytes = raw_words(&[1, 2, 3]);
        let err = Frame::from_raw_bytes(&bytes, 2, 2).unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_file_roundtrip() {
        let path = std::env::temp_dir().join("starcam_frame_roundtrip.raw");
        let words: Vec<u16> = (0..12).map(|i| i * 256).collect();
        std::fs::write(&path, raw_words(&words)).unwrap();

        let frame = Frame::from_raw_file(&path, 3, 4).unwrap();
        assert_eq!(frame.rows(), 3);
        assert_eq!(frame.cols(), 4);
        assert_eq!(frame.at(0, 0), 0);
        assert_eq!(frame.at(2, 3), (11 * 256 >> 4) as u8);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_raw_file_missing() {
        let err = Frame::from_raw_file("/nonexistent/frame.raw", 2, 2).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_image_luma() {
        let img = image::GrayImage::from_raw(3, 2, vec![0, 50, 100, 150, 200, 250]).unwrap();
        let frame = Frame::from_image(&image::DynamicImage::ImageLuma8(img));
        assert_eq!(frame.rows(), 2);
        assert_eq!(frame.cols(), 3);
        assert_eq!(frame.at(1, 2), 250);
    }

    #[test]
    fn test_threshold_to_zero() {
        let frame = Frame::from_pixels(vec![0, 64, 65, 200, 63, 255], 2, 3).unwrap();
        let th = frame.thresholded(64);
        assert_eq!(th.as_slice(), &[0, 0, 65, 200, 0, 255]);

        // out[y,x] > 0 implies in[y,x] > t
        for (&out, &inp) in th.as_slice().iter().zip(frame.as_slice()) {
            if out > 0 {
                assert!(inp > 64);
                assert_eq!(out, inp);
            }
        }
    }

    #[test]
    fn test_threshold_into_reuses_buffer() {
        let frame = Frame::from_pixels(vec![10, 100, 10, 100], 2, 2).unwrap();
        let mut buf = vec![7u8; 32];
        frame.threshold_into(64, &mut buf);
        assert_eq!(buf, vec![0, 100, 0, 100]);
    }
}
