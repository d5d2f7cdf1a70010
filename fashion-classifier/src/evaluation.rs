use crate::error::{Error, Result};
use crate::model::TrainedClassifier;
use candle::{DType, Tensor, D};
use candle_nn::loss;
use fashion_datasets::Batcher;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f32,
    pub accuracy: f32,
}

/// Number of rows whose highest logit matches the `u32` label.
pub(crate) fn count_correct(logits: &Tensor, labels: &Tensor) -> candle::Result<usize> {
    let sum_ok = logits
        .argmax(D::Minus1)?
        .eq(labels)?
        .to_dtype(DType::F32)?
        .sum_all()?
        .to_scalar::<f32>()?;
    Ok(sum_ok as usize)
}

pub(crate) fn check_alignment(images: &Tensor, labels: &Tensor) -> Result<usize> {
    let n_images = images.dim(0)?;
    let n_labels = labels.dim(0)?;
    if n_images != n_labels {
        return Err(Error::LengthMismatch {
            images: n_images,
            labels: n_labels,
        });
    }
    Ok(n_images)
}

/// Mean cross-entropy and accuracy of `model` over a labelled set.
///
/// Samples are visited in order and the per-batch losses are weighted by the batch size, so the
/// result does not depend on `batch_size` beyond rounding and repeated calls agree exactly.
pub fn evaluate(
    model: &TrainedClassifier,
    images: &Tensor,
    labels: &Tensor,
    batch_size: usize,
) -> Result<Evaluation> {
    let samples = check_alignment(images, labels)?;
    if samples == 0 {
        return Err(Error::Empty("evaluate"));
    }
    let device = model.device();
    let images = images.to_device(device)?;
    let labels = labels.to_dtype(DType::U32)?.to_device(device)?;
    let batches = Batcher::new(images, labels)?
        .batch_size(batch_size)
        .return_last_incomplete_batch(true);

    let mut sum_loss = 0f64;
    let mut correct = 0usize;
    for batch in batches {
        let (xs, ys) = batch?;
        let logits = model.logits(&xs)?;
        let batch_loss = loss::cross_entropy(&logits, &ys)?.to_scalar::<f32>()?;
        sum_loss += batch_loss as f64 * ys.dim(0)? as f64;
        correct += count_correct(&logits, &ys)?;
    }
    let evaluation = Evaluation {
        loss: (sum_loss / samples as f64) as f32,
        accuracy: correct as f32 / samples as f32,
    };
    tracing::debug!(?evaluation, samples, "evaluated");
    Ok(evaluation)
}
