//! The fully-connected classifier.
//!
//! Images are flattened to 784 features, go through a 128 unit hidden layer with a ReLU
//! activation, and end up as 10 raw class scores (logits).
//!
//! The model goes through two states: a [`Classifier`] holds freshly initialized trainable
//! weights and can only be handed to the trainer, a [`TrainedClassifier`] is what the trainer
//! returns and is the only one that can be evaluated, queried for predictions or saved.
use crate::prediction::ProbabilityModel;
use candle::{DType, Device, Module, Tensor, Var};
use candle_nn::{Linear, VarBuilder, VarMap};
use fashion_datasets::{IMAGE_SIDE, LABELS};

pub const IMAGE_DIM: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const HIDDEN_DIM: usize = 128;

/// Flattens a batch of `(b, 28, 28)` images to `(b, 784)`, batches that are already flat are
/// returned as is.
pub fn flatten_images(xs: &Tensor) -> candle::Result<Tensor> {
    match xs.dims() {
        [_, IMAGE_DIM] => Ok(xs.clone()),
        [_, IMAGE_SIDE, IMAGE_SIDE] => xs.flatten_from(1),
        dims => candle::bail!("expected images of shape (b, 28, 28) or (b, 784), got {dims:?}"),
    }
}

fn frozen(linear: &Linear) -> Linear {
    Linear::new(linear.weight().detach(), linear.bias().map(|b| b.detach()))
}

#[derive(Debug, Clone)]
pub struct Mlp {
    ln1: Linear,
    ln2: Linear,
    span: tracing::Span,
}

impl Mlp {
    pub fn new(vb: VarBuilder) -> candle::Result<Self> {
        let ln1 = candle_nn::linear(IMAGE_DIM, HIDDEN_DIM, vb.pp("ln1"))?;
        let ln2 = candle_nn::linear(HIDDEN_DIM, LABELS, vb.pp("ln2"))?;
        let span = tracing::span!(tracing::Level::TRACE, "mlp");
        Ok(Self { ln1, ln2, span })
    }

    /// A copy of the model whose weights are no longer tracked for gradients.
    fn frozen(&self) -> Self {
        Self {
            ln1: frozen(&self.ln1),
            ln2: frozen(&self.ln2),
            span: self.span.clone(),
        }
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> candle::Result<Tensor> {
        let _enter = self.span.enter();
        let xs = flatten_images(xs)?;
        let xs = self.ln1.forward(&xs)?.relu()?;
        self.ln2.forward(&xs)
    }
}

/// A classifier with freshly initialized weights, waiting to be trained.
pub struct Classifier {
    varmap: VarMap,
    mlp: Mlp,
    device: Device,
}

impl Classifier {
    pub fn new(device: &Device) -> candle::Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let mlp = Mlp::new(vb)?;
        Ok(Self {
            varmap,
            mlp,
            device: device.clone(),
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub(crate) fn logits(&self, xs: &Tensor) -> candle::Result<Tensor> {
        self.mlp.forward(xs)
    }

    pub(crate) fn into_trained(self) -> TrainedClassifier {
        TrainedClassifier {
            mlp: self.mlp.frozen(),
            varmap: self.varmap,
            device: self.device,
        }
    }
}

/// A classifier whose weights are frozen, used for evaluation and inference.
pub struct TrainedClassifier {
    varmap: VarMap,
    mlp: Mlp,
    device: Device,
}

impl TrainedClassifier {
    /// Restores weights previously written by [`TrainedClassifier::save`].
    pub fn load<P: AsRef<std::path::Path>>(path: P, device: &Device) -> candle::Result<Self> {
        let mut classifier = Classifier::new(device)?;
        classifier.varmap.load(path)?;
        Ok(classifier.into_trained())
    }

    /// Saves the weights in the safetensors format.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> candle::Result<()> {
        self.varmap.save(path)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Raw class scores of shape `(b, 10)`.
    pub fn logits(&self, xs: &Tensor) -> candle::Result<Tensor> {
        self.mlp.forward(&xs.to_device(&self.device)?)
    }

    /// The model followed by a softmax, producing class probabilities.
    pub fn probability_model(&self) -> ProbabilityModel {
        ProbabilityModel::new(self.mlp.clone(), self.device.clone())
    }
}

impl Module for TrainedClassifier {
    fn forward(&self, xs: &Tensor) -> candle::Result<Tensor> {
        self.logits(xs)
    }
}
