use anyhow::Result;
use candle::IndexOp;
use clap::Parser;
use fashion_classifier::prediction::label_indices;
use fashion_classifier::{
    device, evaluate, expand_dims, render, Classifier, TrainedClassifier, Trainer, TrainingConfig,
};
use fashion_datasets::{class_name, Dataset};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the IDX files (plain or gzipped), the hub copy is used otherwise.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Where the figures are written.
    #[arg(long, default_value = "plots")]
    out_dir: PathBuf,

    /// Do not render any figure.
    #[arg(long)]
    no_plots: bool,

    /// JSON file with training settings, the flags below take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Seed used to shuffle the training set.
    #[arg(long)]
    seed: Option<u64>,

    /// The file where to save the trained weights, in safetensors format.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Skip training and use the weights from this safetensors file.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Run on CPU rather than on GPU.
    #[arg(long)]
    cpu: bool,

    /// Enable tracing (generates a trace-timestamp.json file).
    #[arg(long)]
    tracing: bool,
}

impl Args {
    fn training_config(&self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_file(path)?,
            None => TrainingConfig::default(),
        };
        if let Some(epochs) = self.epochs {
            config.epochs = epochs
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate
        }
        if self.seed.is_some() {
            config.seed = self.seed
        }
        Ok(config)
    }
}

fn load_dataset(data_dir: Option<&Path>) -> Result<Dataset> {
    let dataset = match data_dir {
        Some(dir) => fashion_datasets::load_dir(dir)?,
        #[cfg(feature = "hub")]
        None => fashion_datasets::hub::load()?,
        #[cfg(not(feature = "hub"))]
        None => anyhow::bail!("built without the hub feature, pass --data-dir"),
    };
    Ok(dataset)
}

struct Figures {
    dir: Option<PathBuf>,
}

impl Figures {
    fn save(&self, image: &image::RgbImage, name: &str, captions: &[String]) -> Result<()> {
        if let Some(dir) = &self.dir {
            let path = render::save(image, dir, name)?;
            println!("saved {}", path.display());
            for (i, caption) in captions.iter().enumerate() {
                println!("  [{i}] {caption}");
            }
        }
        Ok(())
    }

    fn enabled(&self) -> bool {
        self.dir.is_some()
    }
}

fn name(label: usize) -> &'static str {
    class_name(label).unwrap_or("?")
}

fn main() -> Result<()> {
    use tracing_chrome::ChromeLayerBuilder;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let args = Args::parse();
    let (chrome_layer, _guard) = if args.tracing {
        let (chrome_layer, guard) = ChromeLayerBuilder::new().build();
        (Some(chrome_layer), Some(guard))
    } else {
        (None, None)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .with(chrome_layer)
        .init();

    let device = device(args.cpu)?;
    let figures = Figures {
        dir: (!args.no_plots).then(|| args.out_dir.clone()),
    };

    let dataset = load_dataset(args.data_dir.as_deref())?;
    println!("train images shape: {:?}", dataset.train_images.dims());
    println!("train images size: {}", dataset.train_len());
    println!("test images shape: {:?}", dataset.test_images.dims());
    println!("test images size: {}", dataset.test_len());

    let train_labels = label_indices(&dataset.train_labels)?;
    let test_labels = label_indices(&dataset.test_labels)?;

    if figures.enabled() {
        let first = render::render_heatmap(&dataset.train_images.i(0)?)?;
        figures.save(&first, "train_first.png", &[])?;
        let (grid, captions) = render::render_grid(&dataset.train_images, &train_labels, 5, 5)?;
        figures.save(&grid, "train_grid.png", &captions)?;
    }

    let model = match &args.load {
        Some(path) => {
            println!("loading weights from {}", path.display());
            TrainedClassifier::load(path, &device)?
        }
        None => {
            let trainer = Trainer::new(args.training_config()?);
            let classifier = Classifier::new(&device)?;
            let (model, history) =
                trainer.fit(classifier, &dataset.train_images, &dataset.train_labels)?;
            let epochs = trainer.config().epochs;
            for stats in history.epochs.iter() {
                println!(
                    "Epoch {:2}/{epochs} - loss: {:.4} - accuracy: {:.4}",
                    stats.epoch, stats.loss, stats.accuracy
                );
            }
            model
        }
    };
    if let Some(path) = &args.save {
        println!("saving trained weights in {}", path.display());
        model.save(path)?
    }

    let evaluation = evaluate(&model, &dataset.test_images, &dataset.test_labels, 32)?;
    println!("test loss: {:.4} - test accuracy: {:.4}", evaluation.loss, evaluation.accuracy);
    println!("\nTest accuracy: {}", evaluation.accuracy);

    let probability_model = model.probability_model();
    let predictions = probability_model.predictions(&dataset.test_images)?;
    if let (Some(first), Some(&truth)) = (predictions.first(), test_labels.first()) {
        println!("Prediction for the first image: {:?}", first.probabilities());
        println!("Predicted label & ground truth: {}, {truth}", first.label());
    }

    if figures.enabled() {
        for i in [0, 12] {
            if let (Some(prediction), Some(&truth)) = (predictions.get(i), test_labels.get(i)) {
                let image = dataset.test_images.i(i)?;
                let (figure, caption) = render::render_prediction(prediction, truth, &image)?;
                figures.save(&figure, &format!("prediction_{i}.png"), &[caption])?;
            }
        }
        let (grid, captions) = render::render_prediction_grid(
            &predictions,
            &test_labels,
            &dataset.test_images,
            5,
            3,
        )?;
        figures.save(&grid, "prediction_grid.png", &captions)?;
    }

    if dataset.test_len() > 1 {
        let image = dataset.test_images.i(1)?;
        println!("{:?}", image.dims());
        let batch = expand_dims(&image)?;
        println!("{:?}", batch.dims());
        let prediction = probability_model.predict_single(&image)?;
        println!("{:?}", prediction.probabilities());
        if figures.enabled() {
            let bars = render::render_value_array(&prediction, test_labels[1]);
            let ticks = fashion_datasets::CLASS_NAMES
                .iter()
                .enumerate()
                .map(|(i, n)| format!("{i}: {n}"))
                .collect::<Vec<_>>();
            figures.save(&bars, "single_prediction.png", &ticks)?;
        }
        let label = prediction.label();
        println!("Predicted label: {label} ({})", name(label));
    }
    Ok(())
}
