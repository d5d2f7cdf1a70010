use candle::{Result, Tensor};
use rand::seq::SliceRandom;
use rand::Rng;

/// Iterates over aligned `(images, labels)` tensors in mini-batches along the first dimension.
pub struct Batcher {
    images: Tensor,
    labels: Tensor,
    order: Vec<u32>,
    position: usize,
    batch_size: usize,
    return_last_incomplete_batch: bool,
}

impl Batcher {
    pub fn new(images: Tensor, labels: Tensor) -> Result<Self> {
        let samples = images.dim(0)?;
        let n_labels = labels.dim(0)?;
        if samples != n_labels {
            candle::bail!("batcher got {samples} images but {n_labels} labels")
        }
        Ok(Self {
            images,
            labels,
            order: (0..samples as u32).collect(),
            position: 0,
            batch_size: 16,
            return_last_incomplete_batch: false,
        })
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn return_last_incomplete_batch(mut self, r: bool) -> Self {
        self.return_last_incomplete_batch = r;
        self
    }

    /// Visits the samples in a random order drawn from `rng`.
    pub fn shuffle<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        self.order.shuffle(rng);
        self
    }

    pub fn samples(&self) -> usize {
        self.order.len()
    }
}

impl Iterator for Batcher {
    type Item = Result<(Tensor, Tensor)>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.order.len() - self.position;
        if remaining == 0 || (remaining < self.batch_size && !self.return_last_incomplete_batch) {
            return None;
        }
        let len = remaining.min(self.batch_size);
        let ids = &self.order[self.position..self.position + len];
        self.position += len;
        let batch = Tensor::from_slice(ids, len, self.images.device()).and_then(|ids| {
            let xs = self.images.index_select(&ids, 0)?;
            let ys = self.labels.index_select(&ids.to_device(self.labels.device())?, 0)?;
            Ok((xs, ys))
        });
        Some(batch)
    }
}
