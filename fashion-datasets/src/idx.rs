//! Readers for the IDX binary format used by the MNIST family of datasets.
//!
//! Both files start with a big-endian magic number followed by the item count. Image files
//! then carry the number of rows and columns, and the raw `u8` pixels in row-major order.
use crate::error::{Error, Result};
use crate::IMAGE_SIDE;
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub const LABELS_MAGIC: u32 = 2049;
pub const IMAGES_MAGIC: u32 = 2051;

/// Images as stored on disk, before any normalization.
#[derive(Debug, Clone)]
pub struct RawImages {
    pub samples: usize,
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<u8>,
}

fn check_magic_number<R: Read>(reader: &mut R, expected: u32) -> Result<()> {
    let got = reader.read_u32::<BigEndian>()?;
    if got != expected {
        return Err(Error::MagicNumber { expected, got });
    }
    Ok(())
}

// Reads at most `expected` bytes, the buffer only grows with the data actually present.
fn read_body<R: Read>(reader: &mut R, what: &'static str, expected: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    Read::take(&mut *reader, expected as u64).read_to_end(&mut data)?;
    if data.len() != expected {
        return Err(Error::Truncated { what, expected });
    }
    Ok(data)
}

pub fn read_labels<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    check_magic_number(reader, LABELS_MAGIC)?;
    let samples = reader.read_u32::<BigEndian>()? as usize;
    read_body(reader, "labels", samples)
}

/// Reads an image file, the header must announce 28x28 images.
pub fn read_images<R: Read>(reader: &mut R) -> Result<RawImages> {
    check_magic_number(reader, IMAGES_MAGIC)?;
    let samples = reader.read_u32::<BigEndian>()? as usize;
    let rows = reader.read_u32::<BigEndian>()? as usize;
    let cols = reader.read_u32::<BigEndian>()? as usize;
    if rows != IMAGE_SIDE || cols != IMAGE_SIDE {
        return Err(Error::ImageShape { rows, cols });
    }
    let expected = samples.checked_mul(rows * cols).ok_or(Error::Truncated {
        what: "images",
        expected: usize::MAX,
    })?;
    let pixels = read_body(reader, "images", expected)?;
    Ok(RawImages {
        samples,
        rows,
        cols,
        pixels,
    })
}

/// Opens `dir/name`, falling back on the gzipped `dir/name.gz` when the plain file is absent.
pub fn open<P: AsRef<Path>>(dir: P, name: &str) -> Result<Box<dyn Read>> {
    let dir = dir.as_ref();
    let plain = dir.join(name);
    if plain.is_file() {
        tracing::debug!(path = ?plain, "reading idx file");
        return Ok(Box::new(BufReader::new(File::open(plain)?)));
    }
    let gzipped = dir.join(format!("{name}.gz"));
    if gzipped.is_file() {
        tracing::debug!(path = ?gzipped, "reading gzipped idx file");
        let file = BufReader::new(File::open(gzipped)?);
        return Ok(Box::new(GzDecoder::new(file)));
    }
    Err(Error::MissingFile(plain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn labels_file(labels: &[u8]) -> Vec<u8> {
        let mut buf = vec![];
        buf.write_u32::<BigEndian>(LABELS_MAGIC).unwrap();
        buf.write_u32::<BigEndian>(labels.len() as u32).unwrap();
        buf.extend_from_slice(labels);
        buf
    }

    #[test]
    fn labels() {
        let buf = labels_file(&[3, 1, 4]);
        assert_eq!(read_labels(&mut buf.as_slice()).unwrap(), vec![3, 1, 4]);
    }

    fn images_header(samples: u32, rows: u32, cols: u32) -> Vec<u8> {
        let mut buf = vec![];
        buf.write_u32::<BigEndian>(IMAGES_MAGIC).unwrap();
        for v in [samples, rows, cols] {
            buf.write_u32::<BigEndian>(v).unwrap();
        }
        buf
    }

    #[test]
    fn images() {
        let mut buf = images_header(2, 28, 28);
        buf.extend((0..2 * 784).map(|i| (i % 256) as u8));
        let raw = read_images(&mut buf.as_slice()).unwrap();
        assert_eq!((raw.samples, raw.rows, raw.cols), (2, 28, 28));
        assert_eq!(raw.pixels.len(), 2 * 784);
        assert_eq!(raw.pixels[783], 15);
    }

    #[test]
    fn image_shape() {
        let mut buf = images_header(2, 27, 5);
        buf.extend([0u8; 2 * 27 * 5]);
        assert!(matches!(
            read_images(&mut buf.as_slice()),
            Err(Error::ImageShape { rows: 27, cols: 5 })
        ));

        let buf = images_header(60000, 65535, 65535);
        assert!(matches!(
            read_images(&mut buf.as_slice()),
            Err(Error::ImageShape {
                rows: 65535,
                cols: 65535
            })
        ));
    }

    #[test]
    fn header_larger_than_body() {
        let mut buf = images_header(u32::MAX, 28, 28);
        buf.extend([0u8; 16]);
        match read_images(&mut buf.as_slice()) {
            Err(Error::Truncated { what, expected }) => {
                assert_eq!(what, "images");
                assert_eq!(expected, u32::MAX as usize * 784);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn wrong_magic() {
        let buf = labels_file(&[0]);
        match read_images(&mut buf.as_slice()) {
            Err(Error::MagicNumber { expected, got }) => {
                assert_eq!(expected, IMAGES_MAGIC);
                assert_eq!(got, LABELS_MAGIC);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn truncated() {
        let mut buf = labels_file(&[1, 2, 3, 4]);
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            read_labels(&mut buf.as_slice()),
            Err(Error::Truncated {
                what: "labels",
                expected: 4
            })
        ));
    }
}
