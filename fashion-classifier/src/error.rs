#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("CandleError : {0}")]
    Candle(#[from] candle::Error),

    #[error("DatasetError : {0}")]
    Dataset(#[from] fashion_datasets::Error),

    #[error("ImageError : {0}")]
    Image(#[from] image::ImageError),

    #[error("IoError : {0}")]
    Io(#[from] std::io::Error),

    #[error("ConfigError : {0}")]
    Config(#[from] serde_json::Error),

    /// The mean training loss of an epoch was NaN or infinite.
    #[error("training diverged at epoch {epoch}, loss is {loss}")]
    Diverged { epoch: usize, loss: f32 },

    #[error("{images} images but {labels} labels")]
    LengthMismatch { images: usize, labels: usize },

    #[error("cannot {0} on an empty set of images")]
    Empty(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
