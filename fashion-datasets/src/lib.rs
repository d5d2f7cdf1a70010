//! The Fashion-MNIST dataset of Zalando article images.
//!
//! 70,000 grayscale 28x28 images split into 60,000 training and 10,000 test samples, each
//! labelled with one of ten clothing classes. The data can be read from a local directory of IDX
//! files (plain or gzipped) with [`load_dir`] or fetched from the Hugging Face hub with
//! [`hub::load`].
//!
//! Images are returned as `f32` tensors of shape `(n, 28, 28)` with values in `[0, 1]`, labels
//! as `u8` tensors of shape `(n,)`.
pub mod batcher;
pub mod error;
#[cfg(feature = "hub")]
pub mod hub;
pub mod idx;

pub use batcher::Batcher;
pub use error::{Error, Result};

use candle::{DType, Device, Tensor};
use idx::RawImages;

pub const IMAGE_SIDE: usize = 28;
pub const LABELS: usize = 10;

pub const CLASS_NAMES: [&str; LABELS] = [
    "T-shirt/top",
    "Trouser",
    "Pullover",
    "Dress",
    "Coat",
    "Sandal",
    "Shirt",
    "Sneaker",
    "Bag",
    "Ankle boot",
];

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

pub fn class_name(label: usize) -> Option<&'static str> {
    CLASS_NAMES.get(label).copied()
}

/// Rescales raw `u8` intensities to `f32` values in `[0, 1]`.
pub fn normalize(raw: &Tensor) -> candle::Result<Tensor> {
    raw.to_dtype(DType::F32)? / 255.
}

pub struct Dataset {
    pub train_images: Tensor,
    pub train_labels: Tensor,
    pub test_images: Tensor,
    pub test_labels: Tensor,
    pub labels: usize,
}

fn images_tensor(raw: RawImages) -> Result<Tensor> {
    let tensor = Tensor::from_vec(raw.pixels, (raw.samples, raw.rows, raw.cols), &Device::Cpu)?;
    Ok(normalize(&tensor)?)
}

fn labels_tensor(labels: Vec<u8>) -> Result<Tensor> {
    let samples = labels.len();
    Ok(Tensor::from_vec(labels, samples, &Device::Cpu)?)
}

fn check_split(images: &Tensor, labels: &Tensor) -> Result<()> {
    match images.dims() {
        &[_, IMAGE_SIDE, IMAGE_SIDE] => {}
        &[_, rows, cols] => return Err(Error::ImageShape { rows, cols }),
        dims => {
            let msg = format!("expected images of shape (n, 28, 28), got {dims:?}");
            return Err(candle::Error::Msg(msg).into());
        }
    }
    let n_images = images.dim(0)?;
    let n_labels = labels.dim(0)?;
    if n_images != n_labels {
        return Err(Error::LengthMismatch {
            images: n_images,
            labels: n_labels,
        });
    }
    let labels = labels.to_vec1::<u8>()?;
    if let Some(index) = labels.iter().position(|&l| l as usize >= LABELS) {
        return Err(Error::InvalidLabel {
            index,
            label: labels[index] as i64,
        });
    }
    Ok(())
}

impl Dataset {
    pub fn from_raw(
        train_images: RawImages,
        train_labels: Vec<u8>,
        test_images: RawImages,
        test_labels: Vec<u8>,
    ) -> Result<Self> {
        let dataset = Self {
            train_images: images_tensor(train_images)?,
            train_labels: labels_tensor(train_labels)?,
            test_images: images_tensor(test_images)?,
            test_labels: labels_tensor(test_labels)?,
            labels: LABELS,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Checks that each split holds 28x28 images, as many labels as images and that every label
    /// is a class index.
    pub fn validate(&self) -> Result<()> {
        check_split(&self.train_images, &self.train_labels)?;
        check_split(&self.test_images, &self.test_labels)
    }

    pub fn train_len(&self) -> usize {
        self.train_images.dims().first().copied().unwrap_or(0)
    }

    pub fn test_len(&self) -> usize {
        self.test_images.dims().first().copied().unwrap_or(0)
    }
}

/// Reads the four IDX files of the dataset from `dir`, each either plain or with a `.gz` suffix.
pub fn load_dir<T: AsRef<std::path::Path>>(dir: T) -> Result<Dataset> {
    let dir = dir.as_ref();
    let train_images = idx::read_images(&mut idx::open(dir, TRAIN_IMAGES)?)?;
    let train_labels = idx::read_labels(&mut idx::open(dir, TRAIN_LABELS)?)?;
    let test_images = idx::read_images(&mut idx::open(dir, TEST_IMAGES)?)?;
    let test_labels = idx::read_labels(&mut idx::open(dir, TEST_LABELS)?)?;
    Dataset::from_raw(train_images, train_labels, test_images, test_labels)
}
