//! Download of the dataset from the Hugging Face hub.
//!
//! The parquet conversion of the dataset is fetched once and kept in the local hub cache, later
//! calls only read the cached files.
use crate::error::{Error, Result};
use crate::idx::RawImages;
use crate::{Dataset, IMAGE_SIDE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use std::fs::File;

pub const DATASET_ID: &str = "zalando-datasets/fashion_mnist";
const REVISION: &str = "refs/convert/parquet";
const TRAIN_FILE: &str = "fashion_mnist/train/0000.parquet";
const TEST_FILE: &str = "fashion_mnist/test/0000.parquet";

fn load_parquet(parquet: SerializedFileReader<File>) -> Result<(RawImages, Vec<u8>)> {
    let num_rows = parquet.metadata().file_metadata().num_rows() as usize;
    let mut pixels: Vec<u8> = Vec::with_capacity(num_rows * IMAGE_SIDE * IMAGE_SIDE);
    let mut labels: Vec<u8> = Vec::with_capacity(num_rows);
    let mut samples = 0;
    for row in parquet.into_iter() {
        let row = row?;
        for (_name, field) in row.get_column_iter() {
            match field {
                Field::Group(subrow) => {
                    for (_name, field) in subrow.get_column_iter() {
                        if let Field::Bytes(value) = field {
                            let image = image::load_from_memory(value.data())?.to_luma8();
                            let (cols, rows) = image.dimensions();
                            if (rows as usize, cols as usize) != (IMAGE_SIDE, IMAGE_SIDE) {
                                return Err(Error::ImageShape {
                                    rows: rows as usize,
                                    cols: cols as usize,
                                });
                            }
                            pixels.extend(image.as_raw());
                            samples += 1;
                        }
                    }
                }
                Field::Long(label) => {
                    let label = u8::try_from(*label).map_err(|_| Error::InvalidLabel {
                        index: labels.len(),
                        label: *label,
                    })?;
                    labels.push(label);
                }
                _ => {}
            }
        }
    }
    let images = RawImages {
        samples,
        rows: IMAGE_SIDE,
        cols: IMAGE_SIDE,
        pixels,
    };
    Ok((images, labels))
}

fn fetch(repo: &hf_hub::api::sync::ApiRepo, filename: &str) -> Result<(RawImages, Vec<u8>)> {
    let local = repo.get(filename)?;
    tracing::debug!(path = ?local, "reading parquet file");
    let reader = SerializedFileReader::new(File::open(local)?)?;
    load_parquet(reader)
}

/// Fetches the train and test splits from the hub, normalizes the images and checks that labels
/// line up with images.
pub fn load() -> Result<Dataset> {
    tracing::info!("fetching {DATASET_ID} from the hub");
    let api = Api::new()?;
    let repo = api.repo(Repo::with_revision(
        DATASET_ID.to_string(),
        RepoType::Dataset,
        REVISION.to_string(),
    ));
    let (train_images, train_labels) = fetch(&repo, TRAIN_FILE)?;
    let (test_images, test_labels) = fetch(&repo, TEST_FILE)?;
    Dataset::from_raw(train_images, train_labels, test_images, test_labels)
}
