//! A fully-connected Fashion-MNIST classifier built on candle.
//!
//! ```no_run
//! use candle::Device;
//! use fashion_classifier::{evaluate, Classifier, Trainer, TrainingConfig};
//!
//! # fn main() -> fashion_classifier::Result<()> {
//! let dataset = fashion_datasets::load_dir("data")?;
//! let classifier = Classifier::new(&Device::Cpu)?;
//! let trainer = Trainer::new(TrainingConfig::default());
//! let (model, _history) = trainer.fit(classifier, &dataset.train_images, &dataset.train_labels)?;
//! let evaluation = evaluate(&model, &dataset.test_images, &dataset.test_labels, 32)?;
//! println!("test accuracy: {}", evaluation.accuracy);
//! # Ok(()) }
//! ```
pub mod error;
pub mod evaluation;
pub mod model;
pub mod prediction;
pub mod render;
pub mod training;

pub use error::{Error, Result};
pub use evaluation::{evaluate, Evaluation};
pub use model::{Classifier, Mlp, TrainedClassifier};
pub use prediction::{argmax, expand_dims, Prediction, ProbabilityModel};
pub use training::{EpochStats, History, Trainer, TrainingConfig};

use candle::Device;

pub fn device(cpu: bool) -> candle::Result<Device> {
    if cpu {
        Ok(Device::Cpu)
    } else if candle::utils::cuda_is_available() {
        Device::new_cuda(0)
    } else if candle::utils::metal_is_available() {
        Device::new_metal(0)
    } else {
        tracing::info!("running on CPU, build with `--features cuda` or `--features metal` for GPU");
        Ok(Device::Cpu)
    }
}
