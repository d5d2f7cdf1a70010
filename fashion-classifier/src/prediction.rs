use crate::model::Mlp;
use candle::{Device, Module, Tensor, D};
use fashion_datasets::IMAGE_SIDE;

/// Index of the largest score, the first one wins on ties.
pub fn argmax(xs: &[f32]) -> usize {
    let mut best = 0;
    for (i, &x) in xs.iter().enumerate() {
        if x > xs[best] {
            best = i
        }
    }
    best
}

/// Ground-truth labels as class indices, whatever the integer dtype of the tensor.
pub fn label_indices(labels: &Tensor) -> candle::Result<Vec<usize>> {
    let labels = labels.to_dtype(candle::DType::U32)?.to_vec1::<u32>()?;
    Ok(labels.into_iter().map(|l| l as usize).collect())
}

/// Turns a single `(28, 28)` image into a batch of one, `(1, 28, 28)`.
pub fn expand_dims(image: &Tensor) -> candle::Result<Tensor> {
    match image.dims() {
        [IMAGE_SIDE, IMAGE_SIDE] => image.unsqueeze(0),
        dims => candle::bail!("expected a single (28, 28) image, got {dims:?}"),
    }
}

/// Class probabilities for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    probabilities: Vec<f32>,
}

impl Prediction {
    pub fn new(probabilities: Vec<f32>) -> Self {
        Self { probabilities }
    }

    pub fn probabilities(&self) -> &[f32] {
        &self.probabilities
    }

    /// The predicted class.
    pub fn label(&self) -> usize {
        argmax(&self.probabilities)
    }

    /// Probability of the predicted class.
    pub fn confidence(&self) -> f32 {
        self.probabilities.get(self.label()).copied().unwrap_or(0.)
    }

    pub fn is_correct(&self, truth: usize) -> bool {
        self.label() == truth
    }
}

/// The trained model with a softmax appended to its output.
#[derive(Debug, Clone)]
pub struct ProbabilityModel {
    mlp: Mlp,
    device: Device,
}

impl ProbabilityModel {
    pub(crate) fn new(mlp: Mlp, device: Device) -> Self {
        Self { mlp, device }
    }

    /// Probabilities of shape `(b, 10)`, each row is non-negative and sums to one.
    pub fn predict(&self, images: &Tensor) -> candle::Result<Tensor> {
        self.forward(&images.to_device(&self.device)?)
    }

    pub fn predictions(&self, images: &Tensor) -> candle::Result<Vec<Prediction>> {
        let probs = self.predict(images)?.to_vec2::<f32>()?;
        Ok(probs.into_iter().map(Prediction::new).collect())
    }

    /// Predicts a single `(28, 28)` image by running it as a batch of one.
    pub fn predict_single(&self, image: &Tensor) -> candle::Result<Prediction> {
        let batch = expand_dims(image)?;
        match self.predictions(&batch)?.pop() {
            Some(prediction) => Ok(prediction),
            None => candle::bail!("no prediction for a batch of one"),
        }
    }
}

impl Module for ProbabilityModel {
    fn forward(&self, xs: &Tensor) -> candle::Result<Tensor> {
        let logits = self.mlp.forward(xs)?;
        candle_nn::ops::softmax(&logits, D::Minus1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_first_max() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn prediction_accessors() {
        let p = Prediction::new(vec![0.05, 0.05, 0.8, 0.1]);
        assert_eq!(p.label(), 2);
        assert_eq!(p.confidence(), 0.8);
        assert!(p.is_correct(2));
        assert!(!p.is_correct(3));
    }

    #[test]
    fn expand_single_image() -> candle::Result<()> {
        let image = Tensor::zeros((28, 28), candle::DType::F32, &Device::Cpu)?;
        assert_eq!(expand_dims(&image)?.dims(), [1, 28, 28]);
        let batch = Tensor::zeros((2, 28, 28), candle::DType::F32, &Device::Cpu)?;
        assert!(expand_dims(&batch).is_err());
        Ok(())
    }
}
