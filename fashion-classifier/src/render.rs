//! Rendering of images and predictions to PNG figures.
//!
//! Each 28x28 image is drawn with `SCALE` pixels per input pixel. Text does not go on the
//! figures, the renderers hand back captions that the caller prints next to the saved file.
use crate::error::Result;
use crate::prediction::Prediction;
use candle::{DType, IndexOp, Tensor};
use fashion_datasets::{class_name, IMAGE_SIDE, LABELS};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

pub const SCALE: u32 = 8;
pub const SIDE: u32 = IMAGE_SIDE as u32 * SCALE;
pub const MARGIN: u32 = 16;
const COLORBAR_WIDTH: u32 = 16;
const BAR_WIDTH: u32 = 16;
const BAR_GAP: u32 = 8;
const PLOT_HEIGHT: u32 = SIDE;
const FRAME: u32 = 4;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const GRAY: Rgb<u8> = Rgb([0x77, 0x77, 0x77]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

// Anchors of the viridis color map at 0, 0.25, 0.5, 0.75 and 1.
const VIRIDIS: [[f32; 3]; 5] = [
    [68., 1., 84.],
    [59., 82., 139.],
    [33., 145., 140.],
    [94., 201., 98.],
    [253., 231., 37.],
];

/// Inverted grayscale, 0 is white and 1 is black.
pub fn binary(v: f32) -> Rgb<u8> {
    let g = 255 - (v.clamp(0., 1.) * 255.).round() as u8;
    Rgb([g, g, g])
}

pub fn viridis(v: f32) -> Rgb<u8> {
    let v = v.clamp(0., 1.) * (VIRIDIS.len() - 1) as f32;
    let i = (v.floor() as usize).min(VIRIDIS.len() - 2);
    let t = v - i as f32;
    let (a, b) = (VIRIDIS[i], VIRIDIS[i + 1]);
    Rgb([0, 1, 2].map(|c| (a[c] + (b[c] - a[c]) * t).round() as u8))
}

/// Blue when the predicted class matches the ground truth, red otherwise.
pub fn panel_color(prediction: &Prediction, truth: usize) -> Rgb<u8> {
    if prediction.is_correct(truth) {
        BLUE
    } else {
        RED
    }
}

fn name(label: usize) -> &'static str {
    class_name(label).unwrap_or("?")
}

/// `"<predicted> <confidence>% (<truth>)"`, the label shown under a prediction panel.
pub fn caption(prediction: &Prediction, truth: usize) -> String {
    format!(
        "{} {:2.0}% ({})",
        name(prediction.label()),
        100. * prediction.confidence(),
        name(truth)
    )
}

fn pixels(image: &Tensor) -> candle::Result<Vec<Vec<f32>>> {
    match image.dims() {
        [IMAGE_SIDE, IMAGE_SIDE] => image.to_dtype(DType::F32)?.to_vec2::<f32>(),
        dims => candle::bail!("expected a single (28, 28) image, got {dims:?}"),
    }
}

fn paint(
    canvas: &mut RgbImage,
    x0: u32,
    y0: u32,
    pixels: &[Vec<f32>],
    cmap: impl Fn(f32) -> Rgb<u8>,
) {
    for (r, row) in pixels.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            let x = x0 + c as u32 * SCALE;
            let y = y0 + r as u32 * SCALE;
            let rect = Rect::at(x as i32, y as i32).of_size(SCALE, SCALE);
            draw_filled_rect_mut(canvas, rect, cmap(v));
        }
    }
}

fn hstack(panels: &[RgbImage]) -> RgbImage {
    let width = panels.iter().map(|p| p.width()).sum::<u32>();
    let height = panels.iter().map(|p| p.height()).max().unwrap_or(0);
    let mut canvas = RgbImage::from_pixel(width, height, WHITE);
    let mut x = 0;
    for panel in panels {
        imageops::replace(&mut canvas, panel, x, 0);
        x += panel.width() as i64;
    }
    canvas
}

/// A single image in the viridis map, rescaled to its own value range, with a color bar.
pub fn render_heatmap(image: &Tensor) -> Result<RgbImage> {
    let pixels = pixels(image)?;
    let values = pixels.iter().flatten();
    let min = values.clone().copied().fold(f32::INFINITY, f32::min);
    let max = values.copied().fold(f32::NEG_INFINITY, f32::max);
    let range = if max - min == 0. { 1. } else { max - min };

    let width = 3 * MARGIN + SIDE + COLORBAR_WIDTH;
    let mut canvas = RgbImage::from_pixel(width, SIDE + 2 * MARGIN, WHITE);
    paint(&mut canvas, MARGIN, MARGIN, &pixels, |v| viridis((v - min) / range));

    let bar_x = 2 * MARGIN + SIDE;
    for y in 0..SIDE {
        let t = 1. - y as f32 / (SIDE - 1) as f32;
        let rect = Rect::at(bar_x as i32, (MARGIN + y) as i32).of_size(COLORBAR_WIDTH, 1);
        draw_filled_rect_mut(&mut canvas, rect, viridis(t));
    }
    let border =
        Rect::at(bar_x as i32 - 1, MARGIN as i32 - 1).of_size(COLORBAR_WIDTH + 2, SIDE + 2);
    draw_hollow_rect_mut(&mut canvas, border, BLACK);
    Ok(canvas)
}

/// The first `rows * cols` images in a grid, with the class name of each as its caption.
pub fn render_grid(
    images: &Tensor,
    labels: &[usize],
    rows: usize,
    cols: usize,
) -> Result<(RgbImage, Vec<String>)> {
    let n = images.dim(0)?.min(labels.len()).min(rows * cols);
    let cell = SIDE + MARGIN;
    let width = cols as u32 * cell + MARGIN;
    let height = rows as u32 * cell + MARGIN;
    let mut canvas = RgbImage::from_pixel(width, height, WHITE);
    let mut captions = Vec::with_capacity(n);
    for (i, &label) in labels.iter().enumerate().take(n) {
        let x = MARGIN + (i % cols) as u32 * cell;
        let y = MARGIN + (i / cols) as u32 * cell;
        paint(&mut canvas, x, y, &pixels(&images.i(i)?)?, binary);
        let border = Rect::at(x as i32 - 1, y as i32 - 1).of_size(SIDE + 2, SIDE + 2);
        draw_hollow_rect_mut(&mut canvas, border, BLACK);
        captions.push(name(label).to_string());
    }
    Ok((canvas, captions))
}

/// The image with a frame colored after the correctness of the prediction.
pub fn render_image_panel(
    prediction: &Prediction,
    truth: usize,
    image: &Tensor,
) -> Result<(RgbImage, String)> {
    let mut canvas = RgbImage::from_pixel(SIDE + 2 * MARGIN, SIDE + 2 * MARGIN, WHITE);
    paint(&mut canvas, MARGIN, MARGIN, &pixels(image)?, binary);
    let color = panel_color(prediction, truth);
    for k in 1..=FRAME {
        let rect = Rect::at((MARGIN - k) as i32, (MARGIN - k) as i32)
            .of_size(SIDE + 2 * k, SIDE + 2 * k);
        draw_hollow_rect_mut(&mut canvas, rect, color);
    }
    Ok((canvas, caption(prediction, truth)))
}

/// Horizontal position of the bar for `class` in [`render_value_array`].
pub fn bar_x(class: usize) -> u32 {
    MARGIN + class as u32 * (BAR_WIDTH + BAR_GAP)
}

/// Vertical position of the x axis in [`render_value_array`], bars end right above it.
pub fn axis_y() -> u32 {
    MARGIN + PLOT_HEIGHT
}

/// A bar per class on a `[0, 1]` scale: the predicted class in red, the true class in blue and
/// the others in gray.
pub fn render_value_array(prediction: &Prediction, truth: usize) -> RgbImage {
    let width = 2 * MARGIN + LABELS as u32 * (BAR_WIDTH + BAR_GAP) - BAR_GAP;
    let mut canvas = RgbImage::from_pixel(width, PLOT_HEIGHT + 2 * MARGIN, WHITE);

    let mut colors = [GRAY; LABELS];
    if let Some(c) = colors.get_mut(prediction.label()) {
        *c = RED;
    }
    if let Some(c) = colors.get_mut(truth) {
        *c = BLUE;
    }
    for (class, &p) in prediction.probabilities().iter().take(LABELS).enumerate() {
        let height = (p.clamp(0., 1.) * PLOT_HEIGHT as f32).round() as u32;
        if height == 0 {
            continue;
        }
        let rect =
            Rect::at(bar_x(class) as i32, (axis_y() - height) as i32).of_size(BAR_WIDTH, height);
        draw_filled_rect_mut(&mut canvas, rect, colors[class]);
    }

    let axis = Rect::at(MARGIN as i32, axis_y() as i32).of_size(width - 2 * MARGIN, 1);
    draw_filled_rect_mut(&mut canvas, axis, BLACK);
    for class in 0..LABELS {
        let tick = Rect::at((bar_x(class) + BAR_WIDTH / 2) as i32, axis_y() as i32).of_size(1, 4);
        draw_filled_rect_mut(&mut canvas, tick, BLACK);
    }
    canvas
}

/// The image panel next to its bar chart.
pub fn render_prediction(
    prediction: &Prediction,
    truth: usize,
    image: &Tensor,
) -> Result<(RgbImage, String)> {
    let (panel, caption) = render_image_panel(prediction, truth, image)?;
    let bars = render_value_array(prediction, truth);
    Ok((hstack(&[panel, bars]), caption))
}

/// Image/bar-chart pairs for the first `rows * cols` predictions.
pub fn render_prediction_grid(
    predictions: &[Prediction],
    truths: &[usize],
    images: &Tensor,
    rows: usize,
    cols: usize,
) -> Result<(RgbImage, Vec<String>)> {
    let n = predictions
        .len()
        .min(truths.len())
        .min(images.dim(0)?)
        .min(rows * cols);
    let mut cells = Vec::with_capacity(n);
    let mut captions = Vec::with_capacity(n);
    for i in 0..n {
        let (cell, caption) = render_prediction(&predictions[i], truths[i], &images.i(i)?)?;
        cells.push(cell);
        captions.push(caption);
    }
    let (cell_w, cell_h) = match cells.first() {
        Some(cell) => (cell.width(), cell.height()),
        None => (1, 1),
    };
    let mut canvas = RgbImage::from_pixel(cols as u32 * cell_w, rows as u32 * cell_h, WHITE);
    for (i, cell) in cells.iter().enumerate() {
        let x = (i % cols) as u32 * cell_w;
        let y = (i / cols) as u32 * cell_h;
        imageops::replace(&mut canvas, cell, x as i64, y as i64);
    }
    Ok((canvas, captions))
}

/// Writes `image` as `dir/name`, creating `dir` if needed.
pub fn save<P: AsRef<Path>>(image: &RgbImage, dir: P, name: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    image.save(&path)?;
    tracing::debug!(?path, "saved figure");
    Ok(path)
}
