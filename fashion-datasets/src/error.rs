use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("CandleError : {0}")]
    Candle(#[from] candle::Error),

    #[error("IoError : {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "hub")]
    #[error("ApiError : {0}")]
    Api(#[from] hf_hub::api::sync::ApiError),

    #[cfg(feature = "hub")]
    #[error("ParquetError : {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[cfg(feature = "hub")]
    #[error("ImageError : {0}")]
    Image(#[from] image::ImageError),

    #[error("incorrect magic number {got} != {expected}")]
    MagicNumber { expected: u32, got: u32 },

    #[error("truncated {what}: expected {expected} bytes")]
    Truncated { what: &'static str, expected: usize },

    #[error("{images} images but {labels} labels")]
    LengthMismatch { images: usize, labels: usize },

    #[error("label {label} at index {index} is not a valid class")]
    InvalidLabel { index: usize, label: i64 },

    #[error("expected 28x28 images, got {rows}x{cols}")]
    ImageShape { rows: usize, cols: usize },

    #[error("cannot find {0:?} (plain or gzipped)")]
    MissingFile(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
