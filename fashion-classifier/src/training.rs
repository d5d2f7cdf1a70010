use crate::error::{Error, Result};
use crate::evaluation::{check_alignment, count_correct};
use crate::model::{Classifier, TrainedClassifier};
use candle::{DType, Tensor};
use candle_nn::{loss, AdamW, Optimizer, ParamsAdamW};
use fashion_datasets::Batcher;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    /// Seed for the shuffling of the training set, drawn at random when missing.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-7,
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Reads a JSON config, fields that are not set keep their default value.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::io::BufReader::new(std::fs::File::open(path)?);
        Ok(serde_json::from_reader(file)?)
    }

    fn adam(&self) -> ParamsAdamW {
        ParamsAdamW {
            lr: self.learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            eps: self.eps,
            weight_decay: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
}

/// Per-epoch training loss and accuracy.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub epochs: Vec<EpochStats>,
}

impl History {
    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }
}

pub struct Trainer {
    config: TrainingConfig,
    span: tracing::Span,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        let span = tracing::span!(tracing::Level::TRACE, "train");
        Self { config, span }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fits `classifier` on the given images and `u8` labels and hands back the frozen model.
    ///
    /// Each epoch visits the whole set once in a freshly shuffled order, taking an Adam step per
    /// mini-batch on the cross-entropy of the logits.
    pub fn fit(
        &self,
        classifier: Classifier,
        images: &Tensor,
        labels: &Tensor,
    ) -> Result<(TrainedClassifier, History)> {
        let _enter = self.span.enter();
        let samples = check_alignment(images, labels)?;
        if samples == 0 {
            return Err(Error::Empty("train"));
        }
        let device = classifier.device().clone();
        let images = images.to_device(&device)?;
        let labels = labels.to_dtype(DType::U32)?.to_device(&device)?;

        let mut optimizer = AdamW::new(classifier.vars(), self.config.adam())?;
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        tracing::info!(seed, samples, epochs = self.config.epochs, "training");

        let mut history = History::default();
        for epoch in 1..=self.config.epochs {
            let batches = Batcher::new(images.clone(), labels.clone())?
                .batch_size(self.config.batch_size)
                .return_last_incomplete_batch(true)
                .shuffle(&mut rng);
            let mut sum_loss = 0f64;
            let mut correct = 0usize;
            for batch in batches {
                let (xs, ys) = batch?;
                let logits = classifier.logits(&xs)?;
                let loss = loss::cross_entropy(&logits, &ys)?;
                optimizer.backward_step(&loss)?;
                sum_loss += loss.to_scalar::<f32>()? as f64 * ys.dim(0)? as f64;
                correct += count_correct(&logits, &ys)?;
            }
            let stats = EpochStats {
                epoch,
                loss: (sum_loss / samples as f64) as f32,
                accuracy: correct as f32 / samples as f32,
            };
            if !stats.loss.is_finite() {
                return Err(Error::Diverged {
                    epoch,
                    loss: stats.loss,
                });
            }
            tracing::info!(epoch, loss = stats.loss, accuracy = stats.accuracy, "epoch done");
            history.epochs.push(stats);
        }
        Ok((classifier.into_trained(), history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 10);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.learning_rate, 1e-3);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn partial_json() -> anyhow::Result<()> {
        let config: TrainingConfig = serde_json::from_str(r#"{"epochs": 3, "seed": 7}"#)?;
        assert_eq!(config.epochs, 3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.batch_size, 32);
        Ok(())
    }
}
