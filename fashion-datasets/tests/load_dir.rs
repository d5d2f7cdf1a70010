use anyhow::Result;
use byteorder::{BigEndian, WriteBytesExt};
use fashion_datasets::idx::{IMAGES_MAGIC, LABELS_MAGIC};
use fashion_datasets::{load_dir, Error, TEST_IMAGES, TEST_LABELS, TRAIN_IMAGES, TRAIN_LABELS};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;

fn images_file_with_side(samples: usize, rows: usize, cols: usize) -> Vec<u8> {
    let mut buf = vec![];
    buf.write_u32::<BigEndian>(IMAGES_MAGIC).unwrap();
    for v in [samples, rows, cols] {
        buf.write_u32::<BigEndian>(v as u32).unwrap();
    }
    buf.resize(buf.len() + samples * rows * cols, 0);
    buf
}

fn images_file(samples: usize, fill: impl Fn(usize) -> u8) -> Vec<u8> {
    let mut buf = images_file_with_side(samples, 28, 28);
    buf.truncate(16);
    buf.extend((0..samples * 28 * 28).map(fill));
    buf
}

fn labels_file(labels: &[u8]) -> Vec<u8> {
    let mut buf = vec![];
    buf.write_u32::<BigEndian>(LABELS_MAGIC).unwrap();
    buf.write_u32::<BigEndian>(labels.len() as u32).unwrap();
    buf.extend_from_slice(labels);
    buf
}

fn write_plain(dir: &Path, name: &str, data: &[u8]) -> Result<()> {
    std::fs::write(dir.join(name), data)?;
    Ok(())
}

fn write_gz(dir: &Path, name: &str, data: &[u8]) -> Result<()> {
    let file = std::fs::File::create(dir.join(format!("{name}.gz")))?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(data)?;
    encoder.finish()?;
    Ok(())
}

#[test]
fn plain_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_plain(dir.path(), TRAIN_IMAGES, &images_file(6, |i| (i % 256) as u8))?;
    write_plain(dir.path(), TRAIN_LABELS, &labels_file(&[0, 1, 2, 3, 4, 9]))?;
    write_plain(dir.path(), TEST_IMAGES, &images_file(2, |_| 255))?;
    write_plain(dir.path(), TEST_LABELS, &labels_file(&[5, 7]))?;

    let dataset = load_dir(dir.path())?;
    assert_eq!(dataset.train_images.dims(), [6, 28, 28]);
    assert_eq!(dataset.train_labels.dims(), [6]);
    assert_eq!(dataset.test_images.dims(), [2, 28, 28]);
    assert_eq!((dataset.train_len(), dataset.test_len()), (6, 2));
    assert_eq!(dataset.labels, 10);

    let pixels = dataset.train_images.flatten_all()?.to_vec1::<f32>()?;
    assert!(pixels.iter().all(|v| (0.0..=1.0).contains(v)));
    let max = dataset.test_images.flatten_all()?.max(0)?.to_scalar::<f32>()?;
    assert_eq!(max, 1.0);
    assert_eq!(dataset.test_labels.to_vec1::<u8>()?, [5, 7]);
    Ok(())
}

#[test]
fn gzipped_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_gz(dir.path(), TRAIN_IMAGES, &images_file(3, |_| 51))?;
    write_gz(dir.path(), TRAIN_LABELS, &labels_file(&[1, 1, 8]))?;
    write_gz(dir.path(), TEST_IMAGES, &images_file(1, |_| 0))?;
    write_plain(dir.path(), TEST_LABELS, &labels_file(&[3]))?;

    let dataset = load_dir(dir.path())?;
    assert_eq!(dataset.train_images.dims(), [3, 28, 28]);
    let first = dataset.train_images.flatten_all()?.to_vec1::<f32>()?[0];
    assert!((first - 0.2).abs() < 1e-6);
    assert_eq!(dataset.train_labels.to_vec1::<u8>()?, [1, 1, 8]);
    Ok(())
}

#[test]
fn misaligned_split() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_plain(dir.path(), TRAIN_IMAGES, &images_file(4, |_| 0))?;
    write_plain(dir.path(), TRAIN_LABELS, &labels_file(&[0, 1, 2]))?;
    write_plain(dir.path(), TEST_IMAGES, &images_file(1, |_| 0))?;
    write_plain(dir.path(), TEST_LABELS, &labels_file(&[0]))?;

    match load_dir(dir.path()) {
        Err(Error::LengthMismatch { images, labels }) => assert_eq!((images, labels), (4, 3)),
        Err(err) => panic!("unexpected error {err}"),
        Ok(_) => panic!("misaligned split was accepted"),
    }
    Ok(())
}

#[test]
fn out_of_range_label() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_plain(dir.path(), TRAIN_IMAGES, &images_file(2, |_| 0))?;
    write_plain(dir.path(), TRAIN_LABELS, &labels_file(&[0, 1]))?;
    write_plain(dir.path(), TEST_IMAGES, &images_file(2, |_| 0))?;
    write_plain(dir.path(), TEST_LABELS, &labels_file(&[4, 12]))?;

    match load_dir(dir.path()) {
        Err(Error::InvalidLabel { index, label }) => assert_eq!((index, label), (1, 12)),
        Err(err) => panic!("unexpected error {err}"),
        Ok(_) => panic!("invalid label was accepted"),
    }
    Ok(())
}

#[test]
fn missing_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_plain(dir.path(), TRAIN_IMAGES, &images_file(1, |_| 0))?;
    match load_dir(dir.path()) {
        Err(Error::MissingFile(path)) => assert!(path.ends_with(TRAIN_LABELS)),
        Err(err) => panic!("unexpected error {err}"),
        Ok(_) => panic!("missing file went unnoticed"),
    }
    Ok(())
}

#[test]
fn wrong_image_side() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_plain(dir.path(), TRAIN_IMAGES, &images_file_with_side(2, 27, 5))?;
    write_plain(dir.path(), TRAIN_LABELS, &labels_file(&[0, 1]))?;
    write_plain(dir.path(), TEST_IMAGES, &images_file(1, |_| 0))?;
    write_plain(dir.path(), TEST_LABELS, &labels_file(&[0]))?;

    match load_dir(dir.path()) {
        Err(Error::ImageShape { rows, cols }) => assert_eq!((rows, cols), (27, 5)),
        Err(err) => panic!("unexpected error {err}"),
        Ok(_) => panic!("27x5 images were accepted"),
    }
    Ok(())
}

#[test]
fn truncated_gzipped_images() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut images = images_file(100, |_| 0);
    images.truncate(16 + 3 * 784);
    write_gz(dir.path(), TRAIN_IMAGES, &images)?;
    write_plain(dir.path(), TRAIN_LABELS, &labels_file(&[0; 100]))?;
    write_plain(dir.path(), TEST_IMAGES, &images_file(1, |_| 0))?;
    write_plain(dir.path(), TEST_LABELS, &labels_file(&[0]))?;

    match load_dir(dir.path()) {
        Err(Error::Truncated { what, expected }) => {
            assert_eq!((what, expected), ("images", 100 * 784))
        }
        Err(err) => panic!("unexpected error {err}"),
        Ok(_) => panic!("truncated file was accepted"),
    }
    Ok(())
}
