//! Readers for the IDX files MNIST-like image sets are distributed as.
//!
//! Image files (magic `0x00000803`) hold a 16-byte header with the item
//! count, row count and column count, then the `u8` pixels row-major.
//! Label files (magic `0x00000801`) hold an 8-byte header with the item
//! count, then one `u8` label per item.

use crate::data::ImageDataset;
use crate::error::{Error, Result};
use num_traits::AsPrimitive;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

pub const IMAGES_MAGIC: u32 = 0x0000_0803;
pub const LABELS_MAGIC: u32 = 0x0000_0801;

/// Images of an IDX file, as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct IdxImages {
    pub height: usize,
    pub width: usize,
    /// One `height * width` row of brightnesses per image.
    pub images: Vec<Vec<u8>>,
}

impl IdxImages {
    /// Pixel rows as features in between 0.0 and 1.0.
    pub fn features(&self) -> Vec<Vec<f32>> {
        self.images
            .iter()
            .map(|image| {
                image
                    .iter()
                    .map(|brightness| {
                        let brightness: f32 = (*brightness).as_();
                        brightness / 255.0
                    })
                    .collect()
            })
            .collect()
    }
}

fn malformed(path: &Path, reason: impl Into<String>) -> Error {
    Error::MalformedIdx {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Reads `N` big-endian `u32` header fields from the start of the file.
fn read_header<const N: usize>(f: &mut File, path: &Path) -> Result<[u32; N]> {
    let mut header = [0u32; N];
    let _ = f.seek(SeekFrom::Start(0))?;
    for field in header.iter_mut() {
        let mut buf = [0u8; 4];
        match f.read_exact(&mut buf) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                return Err(malformed(path, "truncated header"));
            }
            Err(err) => return Err(err.into()),
        }
        *field = u32::from_be_bytes(buf);
    }
    Ok(header)
}

/// Checks that `len` body bytes fit in the file after its `header_len` bytes.
fn check_body_len(f: &File, path: &Path, header_len: u64, len: Option<usize>) -> Result<usize> {
    let available = f.metadata()?.len().saturating_sub(header_len);
    match len {
        Some(len) if len as u64 <= available => Ok(len),
        _ => Err(malformed(
            path,
            format!("header announces more data than the {available} bytes after it"),
        )),
    }
}

/// Reads every image of an IDX image file.
pub fn read_images(path: &Path) -> Result<IdxImages> {
    let mut f = File::open(path)?;
    let [magic, size, height, width] = read_header::<4>(&mut f, path)?;
    if magic != IMAGES_MAGIC {
        return Err(malformed(path, format!("unexpected magic number {magic:#010x}")));
    }
    let (size, height, width) = (size as usize, height as usize, width as usize);
    if height == 0 || width == 0 {
        return Err(malformed(path, "empty image dimensions"));
    }

    let image_len = height
        .checked_mul(width)
        .ok_or_else(|| malformed(path, format!("images of {height}x{width} are too large")))?;
    let len = check_body_len(&f, path, 16, image_len.checked_mul(size))?;
    let mut buf_images: Vec<u8> = vec![0u8; len];
    let _ = f.seek(SeekFrom::Start(16))?;
    f.read_exact(&mut buf_images)
        .map_err(|_| malformed(path, format!("expected {size} images of {height}x{width}")))?;

    tracing::debug!(?path, size, height, width, "read idx images");
    Ok(IdxImages {
        height,
        width,
        images: buf_images
            .chunks(image_len)
            .map(|chunk| chunk.to_vec())
            .collect(),
    })
}

/// Reads every label of an IDX label file.
pub fn read_labels(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let [magic, size] = read_header::<2>(&mut f, path)?;
    if magic != LABELS_MAGIC {
        return Err(malformed(path, format!("unexpected magic number {magic:#010x}")));
    }

    let len = check_body_len(&f, path, 8, Some(size as usize))?;
    let mut buf_labels: Vec<u8> = vec![0u8; len];
    let _ = f.seek(SeekFrom::Start(8))?;
    f.read_exact(&mut buf_labels)
        .map_err(|_| malformed(path, format!("expected {size} labels")))?;

    tracing::debug!(?path, size, "read idx labels");
    Ok(buf_labels)
}

/// Reads an image file and its label file into a dataset of scaled features.
///
/// Returns the dataset along with the `(height, width)` of its images.
pub fn read_dataset(images: &Path, labels: &Path) -> Result<(ImageDataset, [usize; 2])> {
    let images = read_images(images)?;
    let labels = read_labels(labels)?;
    let labels: Vec<usize> = labels.into_iter().map(|label| label.as_()).collect();
    let dataset = ImageDataset::from_rows(images.features(), labels)?;
    Ok((dataset, [images.height, images.width]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::Dataset;
    use std::io::Write;
    use temp_dir::TempDir;

    fn write(path: &Path, header: &[u32], body: &[u8]) {
        let mut f = File::create(path).unwrap();
        for field in header {
            f.write_all(&field.to_be_bytes()).unwrap();
        }
        f.write_all(body).unwrap();
    }

    #[test]
    fn images_and_labels_are_read() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.child("images-idx3-ubyte");
        let labels = tmp.child("labels-idx1-ubyte");
        write(&images, &[IMAGES_MAGIC, 2, 2, 3], &[0, 51, 102, 153, 204, 255, 1, 2, 3, 4, 5, 6]);
        write(&labels, &[LABELS_MAGIC, 2], &[7, 3]);

        let read = read_images(&images).unwrap();
        assert_eq!((read.height, read.width), (2, 3));
        assert_eq!(read.images, vec![vec![0, 51, 102, 153, 204, 255], vec![1, 2, 3, 4, 5, 6]]);
        assert_eq!(read.features()[0], vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
        assert_eq!(read_labels(&labels).unwrap(), vec![7, 3]);

        let (dataset, shape) = read_dataset(&images, &labels).unwrap();
        assert_eq!(shape, [2, 3]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(1).unwrap().label, 3);
    }

    #[test]
    fn malformed_files_are_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.child("bad");

        write(&path, &[LABELS_MAGIC, 1, 2, 2], &[0; 4]);
        assert!(matches!(read_images(&path), Err(Error::MalformedIdx { .. })));

        write(&path, &[IMAGES_MAGIC, 3, 2, 2], &[0; 8]);
        assert!(matches!(read_images(&path), Err(Error::MalformedIdx { .. })));

        write(&path, &[LABELS_MAGIC], &[]);
        assert!(matches!(read_labels(&path), Err(Error::MalformedIdx { .. })));
    }

    #[test]
    fn oversized_headers_are_rejected_before_allocating() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.child("huge");

        // u32::MAX cubed overflows usize
        write(&path, &[IMAGES_MAGIC, u32::MAX, u32::MAX, u32::MAX], &[0; 4]);
        assert!(matches!(read_images(&path), Err(Error::MalformedIdx { .. })));

        // fits in usize, but not in the file
        write(&path, &[IMAGES_MAGIC, 1 << 20, 1 << 10, 1 << 10], &[0; 4]);
        assert!(matches!(read_images(&path), Err(Error::MalformedIdx { .. })));

        write(&path, &[LABELS_MAGIC, u32::MAX], &[0; 4]);
        assert!(matches!(read_labels(&path), Err(Error::MalformedIdx { .. })));
    }

    #[test]
    fn io_failures_are_not_reported_as_truncation() {
        let tmp = TempDir::new().unwrap();
        // reading a directory fails with an I/O error other than end of file
        assert!(matches!(read_images(tmp.path()), Err(Error::Io(_))));
        assert!(matches!(read_labels(tmp.path()), Err(Error::Io(_))));

        let path = tmp.child("short");
        write(&path, &[IMAGES_MAGIC, 1], &[]);
        match read_images(&path) {
            Err(Error::MalformedIdx { reason, .. }) => assert_eq!(reason, "truncated header"),
            other => panic!("expected a truncated header, got {other:?}"),
        }
    }

    #[test]
    fn label_count_must_match_image_count() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.child("images");
        let labels = tmp.child("labels");
        write(&images, &[IMAGES_MAGIC, 2, 1, 1], &[0, 1]);
        write(&labels, &[LABELS_MAGIC, 1], &[0]);
        assert!(matches!(
            read_dataset(&images, &labels),
            Err(Error::LabelCountMismatch {
                features: 2,
                labels: 1
            })
        ));
    }
}
