//! MNIST IDX dataset loading.
//!
//! Parses the big-endian IDX binary format:
//! - image files: 16-byte header (magic, count, rows, cols), then
//!   `count * rows * cols` pixel bytes,
//! - label files: 8-byte header (magic, count), then `count` label bytes.
//!
//! Pixels are scaled to `f64` in `[0, 1]`; labels are expanded to 1×10
//! one-hot rows. A full load reads the training shard followed by the test
//! shard and concatenates them in that order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The four canonical MNIST shard filenames, in load order.
pub const MNIST_SHARDS: [&str; 4] = [
    "train-images-idx3-ubyte",
    "train-labels-idx1-ubyte",
    "t10k-images-idx3-ubyte",
    "t10k-labels-idx1-ubyte",
];

/// One image as a row-major grid of pixels in `[0, 1]`.
pub type Image = Vec<Vec<f64>>;

/// One label as a 1×10 one-hot row.
pub type Label = Vec<f64>;

/// Mapping from digit class to the smallest dataset index carrying it.
pub type SampleIndex = BTreeMap<u8, usize>;

/// Errors surfaced by IDX parsing. All are fatal to a pipeline invocation.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IDX file {path} is truncated: need at least {needed} header bytes, found {found}")]
    TruncatedHeader {
        path: PathBuf,
        needed: usize,
        found: usize,
    },

    #[error(
        "IDX file {path} header declares {declared} payload bytes but the file carries {found}"
    )]
    CountMismatch {
        path: PathBuf,
        declared: usize,
        found: usize,
    },

    #[error("IDX file {path} label #{index} is {value}, outside 0..=9")]
    InvalidLabel {
        path: PathBuf,
        index: usize,
        value: u8,
    },
}

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Parse an IDX image payload into pixel grids.
pub fn parse_idx_images(bytes: &[u8], path: &Path) -> Result<Vec<Image>, DatasetError> {
    const HEADER: usize = 16;
    if bytes.len() < HEADER {
        return Err(DatasetError::TruncatedHeader {
            path: path.to_path_buf(),
            needed: HEADER,
            found: bytes.len(),
        });
    }
    // Magic is ignored; count/rows/cols drive the layout.
    let count = be_u32(bytes, 4) as usize;
    let rows = be_u32(bytes, 8) as usize;
    let cols = be_u32(bytes, 12) as usize;
    let declared = count.saturating_mul(rows).saturating_mul(cols);
    let payload = &bytes[HEADER..];
    if payload.len() != declared {
        return Err(DatasetError::CountMismatch {
            path: path.to_path_buf(),
            declared,
            found: payload.len(),
        });
    }

    let mut images = Vec::with_capacity(count);
    let mut cursor = 0usize;
    for _ in 0..count {
        let mut image = Vec::with_capacity(rows);
        for _ in 0..rows {
            let row: Vec<f64> = payload[cursor..cursor + cols]
                .iter()
                .map(|&b| f64::from(b) / 255.0)
                .collect();
            cursor += cols;
            image.push(row);
        }
        images.push(image);
    }
    Ok(images)
}

/// Parse an IDX label payload into one-hot rows.
pub fn parse_idx_labels(bytes: &[u8], path: &Path) -> Result<Vec<Label>, DatasetError> {
    const HEADER: usize = 8;
    if bytes.len() < HEADER {
        return Err(DatasetError::TruncatedHeader {
            path: path.to_path_buf(),
            needed: HEADER,
            found: bytes.len(),
        });
    }
    let count = be_u32(bytes, 4) as usize;
    let payload = &bytes[HEADER..];
    if payload.len() != count {
        return Err(DatasetError::CountMismatch {
            path: path.to_path_buf(),
            declared: count,
            found: payload.len(),
        });
    }

    let mut labels = Vec::with_capacity(count);
    for (index, &value) in payload.iter().enumerate() {
        if value > 9 {
            return Err(DatasetError::InvalidLabel {
                path: path.to_path_buf(),
                index,
                value,
            });
        }
        let mut row = vec![0.0; 10];
        row[value as usize] = 1.0;
        labels.push(row);
    }
    Ok(labels)
}

fn read_file(path: &Path) -> Result<Vec<u8>, DatasetError> {
    std::fs::read(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load one image/label shard pair from `dir`.
pub fn load_split(
    dir: &Path,
    images_name: &str,
    labels_name: &str,
) -> Result<(Vec<Image>, Vec<Label>), DatasetError> {
    let images_path = dir.join(images_name);
    let labels_path = dir.join(labels_name);
    let images = parse_idx_images(&read_file(&images_path)?, &images_path)?;
    let labels = parse_idx_labels(&read_file(&labels_path)?, &labels_path)?;
    Ok((images, labels))
}

/// Load the full MNIST corpus: training shard, then test shard, concatenated.
pub fn load_mnist(dir: &Path) -> Result<(Vec<Image>, Vec<Label>), DatasetError> {
    let (mut images, mut labels) = load_split(dir, MNIST_SHARDS[0], MNIST_SHARDS[1])?;
    let (test_images, test_labels) = load_split(dir, MNIST_SHARDS[2], MNIST_SHARDS[3])?;
    images.extend(test_images);
    labels.extend(test_labels);
    Ok((images, labels))
}

/// Digit class encoded by a one-hot row (position of the maximum).
pub fn label_digit(label: &[f64]) -> u8 {
    let mut best = 0usize;
    for (i, &v) in label.iter().enumerate() {
        if v > label[best] {
            best = i;
        }
    }
    best as u8
}

/// First-occurrence index for each digit class, built in one linear scan.
///
/// Contains all 10 keys whenever the dataset covers every digit; a digit
/// absent from the dataset is simply absent from the map.
pub fn build_sample_index(labels: &[Label]) -> SampleIndex {
    let mut index = SampleIndex::new();
    for (i, label) in labels.iter().enumerate() {
        let digit = label_digit(label);
        index.entry(digit).or_insert(i);
        if index.len() == 10 {
            break;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx_images(images: &[&[u8]], rows: u32, cols: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x0000_0803u32.to_be_bytes());
        bytes.extend_from_slice(&(images.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&rows.to_be_bytes());
        bytes.extend_from_slice(&cols.to_be_bytes());
        for image in images {
            bytes.extend_from_slice(image);
        }
        bytes
    }

    fn idx_labels(labels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x0000_0801u32.to_be_bytes());
        bytes.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        bytes.extend_from_slice(labels);
        bytes
    }

    #[test]
    fn parses_pixels_scaled_to_unit_interval() {
        let raw = idx_images(&[&[0, 128, 255, 51]], 2, 2);
        let images = parse_idx_images(&raw, Path::new("t")).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].len(), 2);
        assert_eq!(images[0][0], vec![0.0, 128.0 / 255.0]);
        assert_eq!(images[0][1], vec![1.0, 51.0 / 255.0]);
    }

    #[test]
    fn parses_labels_as_one_hot_rows() {
        let raw = idx_labels(&[3, 0, 9]);
        let labels = parse_idx_labels(&raw, Path::new("t")).unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0][3], 1.0);
        assert_eq!(labels[0].iter().sum::<f64>(), 1.0);
        assert_eq!(labels[1][0], 1.0);
        assert_eq!(labels[2][9], 1.0);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let err = parse_idx_images(&[0; 5], Path::new("t")).unwrap_err();
        assert!(matches!(err, DatasetError::TruncatedHeader { .. }));
        let err = parse_idx_labels(&[0; 3], Path::new("t")).unwrap_err();
        assert!(matches!(err, DatasetError::TruncatedHeader { .. }));
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let mut raw = idx_images(&[&[1, 2, 3, 4]], 2, 2);
        raw.pop();
        let err = parse_idx_images(&raw, Path::new("t")).unwrap_err();
        assert!(matches!(err, DatasetError::CountMismatch { .. }));

        let mut raw = idx_labels(&[1, 2]);
        raw.push(7);
        let err = parse_idx_labels(&raw, Path::new("t")).unwrap_err();
        assert!(matches!(err, DatasetError::CountMismatch { .. }));
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let raw = idx_labels(&[4, 11]);
        let err = parse_idx_labels(&raw, Path::new("t")).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::InvalidLabel {
                index: 1,
                value: 11,
                ..
            }
        ));
    }

    #[test]
    fn load_concatenates_train_then_test() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MNIST_SHARDS[0]),
            idx_images(&[&[10], &[20]], 1, 1),
        )
        .unwrap();
        std::fs::write(dir.path().join(MNIST_SHARDS[1]), idx_labels(&[1, 2])).unwrap();
        std::fs::write(dir.path().join(MNIST_SHARDS[2]), idx_images(&[&[30]], 1, 1)).unwrap();
        std::fs::write(dir.path().join(MNIST_SHARDS[3]), idx_labels(&[3])).unwrap();

        let (images, labels) = load_mnist(dir.path()).unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(labels.len(), 3);
        assert_eq!(images[0][0][0], 10.0 / 255.0);
        assert_eq!(images[2][0][0], 30.0 / 255.0);
        assert_eq!(label_digit(&labels[0]), 1);
        assert_eq!(label_digit(&labels[2]), 3);
    }

    #[test]
    fn reload_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MNIST_SHARDS[0]),
            idx_images(&[&[9, 8, 7, 6]], 2, 2),
        )
        .unwrap();
        std::fs::write(dir.path().join(MNIST_SHARDS[1]), idx_labels(&[5])).unwrap();
        std::fs::write(dir.path().join(MNIST_SHARDS[2]), idx_images(&[&[1, 2, 3, 4]], 2, 2))
            .unwrap();
        std::fs::write(dir.path().join(MNIST_SHARDS[3]), idx_labels(&[0])).unwrap();

        let first = load_mnist(dir.path()).unwrap();
        let second = load_mnist(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_mnist(dir.path()).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }

    #[test]
    fn sample_index_keeps_first_occurrence() {
        let labels: Vec<Label> = [2u8, 0, 2, 1, 0, 3]
            .iter()
            .map(|&d| {
                let mut row = vec![0.0; 10];
                row[d as usize] = 1.0;
                row
            })
            .collect();
        let index = build_sample_index(&labels);
        assert_eq!(index.get(&2), Some(&0));
        assert_eq!(index.get(&0), Some(&1));
        assert_eq!(index.get(&1), Some(&3));
        assert_eq!(index.get(&3), Some(&5));
        assert_eq!(index.get(&4), None);
        assert_eq!(index.len(), 4);
    }
}
