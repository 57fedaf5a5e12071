//! Perceptual image comparison
//!
//! Mean SSIM between a candidate plot and the reference plot, both reduced
//! to 8-bit luminance with ITU-R 601-2 weights. The candidate is resampled
//! to the reference's dimensions first. Window statistics use a 7x7 uniform
//! window with sample covariance and are averaged over windows that lie
//! fully inside the image.

use crate::config::types::Result;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

pub const WINDOW: u32 = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Decode PNG bytes
pub fn decode_png(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?)
}

/// 8-bit luminance, `L = R*299/1000 + G*587/1000 + B*114/1000` in 16.16
/// fixed point with rounding. Alpha is ignored; grey images pass through.
pub fn to_luminance(img: &DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(gray_alpha) => {
            GrayImage::from_fn(gray_alpha.width(), gray_alpha.height(), |x, y| {
                Luma([gray_alpha.get_pixel(x, y)[0]])
            })
        }
        other => {
            let rgb = other.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
                Luma([l as u8])
            })
        }
    }
}

/// Similarity of `candidate` to an already-reduced reference, in `[0, 1]`
pub fn similarity(candidate: &DynamicImage, reference: &GrayImage) -> f64 {
    let gray = to_luminance(candidate);
    let resized = if gray.dimensions() == reference.dimensions() {
        gray
    } else {
        imageops::resize(
            &gray,
            reference.width(),
            reference.height(),
            FilterType::CatmullRom,
        )
    };
    ssim(&resized, reference)
}

/// Mean SSIM of two equally sized grey images, clamped to `[0, 1]`
pub fn ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        log::warn!(
            "ssim: dimension mismatch {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        );
        return 0.0;
    }
    let (width, height) = a.dimensions();
    if width < WINDOW || height < WINDOW {
        log::warn!(
            "ssim: {}x{} image is smaller than the {}x{} window",
            width,
            height,
            WINDOW,
            WINDOW
        );
        return 0.0;
    }

    let sums = WindowSums::new(a, b);
    let n = (WINDOW * WINDOW) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;
    for y in 0..=(height - WINDOW) {
        for x in 0..=(width - WINDOW) {
            let [sx, sy, sxx, syy, sxy] = sums.window(x as usize, y as usize);
            let ux = sx / n;
            let uy = sy / n;
            let vx = cov_norm * (sxx / n - ux * ux);
            let vy = cov_norm * (syy / n - uy * uy);
            let vxy = cov_norm * (sxy / n - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    (total / count as f64).clamp(0.0, 1.0)
}

/// Summed-area tables for x, y, x², y² and xy
struct WindowSums {
    stride: usize,
    tables: [Vec<f64>; 5],
}

impl WindowSums {
    fn new(a: &GrayImage, b: &GrayImage) -> Self {
        let (width, height) = (a.width() as usize, a.height() as usize);
        let stride = width + 1;
        let size = stride * (height + 1);
        let mut tables: [Vec<f64>; 5] = std::array::from_fn(|_| vec![0.0; size]);

        for y in 0..height {
            for x in 0..width {
                let xv = a.get_pixel(x as u32, y as u32)[0] as f64;
                let yv = b.get_pixel(x as u32, y as u32)[0] as f64;
                let values = [xv, yv, xv * xv, yv * yv, xv * yv];
                let at = (y + 1) * stride + (x + 1);
                for (table, value) in tables.iter_mut().zip(values) {
                    table[at] = value + table[at - 1] + table[at - stride] - table[at - stride - 1];
                }
            }
        }

        Self { stride, tables }
    }

    /// Sums over the window whose top-left pixel is (x, y)
    fn window(&self, x: usize, y: usize) -> [f64; 5] {
        let w = WINDOW as usize;
        let top_left = y * self.stride + x;
        let top_right = top_left + w;
        let bottom_left = (y + w) * self.stride + x;
        let bottom_right = bottom_left + w;
        std::array::from_fn(|i| {
            let t = &self.tables[i];
            t[bottom_right] - t[top_right] - t[bottom_left] + t[top_left]
        })
    }
}
