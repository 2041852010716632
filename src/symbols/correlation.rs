//! Zero-mean normalized cross-correlation (correlation coefficient).
//!
//! Both the window and the template are mean-centred, so a flat window
//! scores 0 and an exact match (up to brightness and contrast) scores 1.
//!
//! The window statistics come from summed-area tables. The cross term is a
//! direct sum for small templates and an FFT correlation otherwise; the
//! image spectrum is computed once and shared by every template matched
//! against the same image.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::template_matching::find_extremes;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::cell::OnceCell;
use std::sync::Arc;

/// Score map with one value in `[-1, 1]` per template placement.
pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

// Integer pixels give a variance of at least ~0.5 for any non-flat window
const EPSILON: f64 = 1e-3;

/// Summed-area table over pixel values and squared values.
struct Integrals {
    width: usize,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl Integrals {
    fn new(pixels: &[f64], w: usize, h: usize) -> Self {
        let width = w + 1;
        let mut sum = vec![0.0; width * (h + 1)];
        let mut sq_sum = vec![0.0; width * (h + 1)];

        for (y, row) in pixels.chunks_exact(w).enumerate() {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for (x, &v) in row.iter().enumerate() {
                row_sum += v;
                row_sq += v * v;
                let i = (y + 1) * width + (x + 1);
                sum[i] = sum[i - width] + row_sum;
                sq_sum[i] = sq_sum[i - width] + row_sq;
            }
        }

        Self { width, sum, sq_sum }
    }

    /// Sums over the window `[x, x + w) x [y, y + h)`.
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let at = |table: &[f64], cx: usize, cy: usize| table[cy * self.width + cx];
        let rect = |table: &[f64]| {
            at(table, x + w, y + h) - at(table, x, y + h) - at(table, x + w, y) + at(table, x, y)
        };
        (rect(&self.sum), rect(&self.sq_sum))
    }
}

/// How the template/window cross term is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossMethod {
    /// Pick whichever is cheaper for the template size
    Auto,
    Direct,
    Fft,
}

/// Forward and inverse plans for one 2D transform size.
struct Plans {
    row: Arc<dyn Fft<f64>>,
    col: Arc<dyn Fft<f64>>,
    row_inv: Arc<dyn Fft<f64>>,
    col_inv: Arc<dyn Fft<f64>>,
}

/// An image prepared for matching many templates against it.
pub struct Correlator {
    width: usize,
    height: usize,
    pixels: Vec<f64>,
    integrals: Integrals,
    plans: OnceCell<Plans>,
    spectrum: OnceCell<Vec<Complex<f64>>>,
}

impl Correlator {
    pub fn new(image: &GrayImage) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let pixels: Vec<f64> = image.as_raw().iter().map(|&v| v as f64).collect();
        let integrals = Integrals::new(&pixels, width, height);
        Self {
            width,
            height,
            pixels,
            integrals,
            plans: OnceCell::new(),
            spectrum: OnceCell::new(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    /// Correlation coefficient of `template` at every placement.
    ///
    /// Returns `None` when the template is empty or larger than the image.
    pub fn scores(&self, template: &GrayImage) -> Option<ScoreMap> {
        self.scores_with(template, CrossMethod::Auto)
    }

    /// Best correlation of `template` anywhere, or `None` if it does not fit.
    pub fn best(&self, template: &GrayImage) -> Option<f32> {
        let scores = self.scores(template)?;
        Some(find_extremes(&scores).max_value)
    }

    pub fn scores_with(&self, template: &GrayImage, method: CrossMethod) -> Option<ScoreMap> {
        let (tw, th) = (template.width() as usize, template.height() as usize);
        if tw == 0 || th == 0 || tw > self.width || th > self.height {
            return None;
        }

        let n = (tw * th) as f64;
        let raw = template.as_raw();
        let t_mean = raw.iter().map(|&v| v as f64).sum::<f64>() / n;
        let centred: Vec<f64> = raw.iter().map(|&v| v as f64 - t_mean).collect();
        let t_norm = centred.iter().map(|v| v * v).sum::<f64>();

        let (pw, ph) = (self.width - tw + 1, self.height - th + 1);
        let use_fft = match method {
            CrossMethod::Auto => self.fft_is_cheaper(pw * ph * tw * th),
            CrossMethod::Direct => false,
            CrossMethod::Fft => true,
        };
        // The template is mean-centred, so the window mean drops out of the cross term
        let cross = if use_fft {
            self.cross_fft(&centred, tw, th, pw, ph)
        } else {
            self.cross_direct(&centred, tw, th, pw, ph)
        };

        let mut scores = ScoreMap::new(pw as u32, ph as u32);
        for (x, y, out) in scores.enumerate_pixels_mut() {
            let (x, y) = (x as usize, y as usize);
            let (win_sum, win_sq) = self.integrals.window(x, y, tw, th);
            let win_var = win_sq - win_sum * win_sum / n;
            let denom = (win_var * t_norm).sqrt();
            let score = if win_var <= EPSILON || denom <= EPSILON {
                0.0
            } else {
                (cross[y * pw + x] / denom).clamp(-1.0, 1.0)
            };
            *out = Luma([score as f32]);
        }

        Some(scores)
    }

    fn fft_is_cheaper(&self, direct_ops: usize) -> bool {
        let n = (self.width * self.height) as f64;
        // Two 2D transforms plus transposes per template
        let fft_ops = 8.0 * n * n.log2().max(1.0);
        direct_ops as f64 > fft_ops
    }

    fn cross_direct(&self, centred: &[f64], tw: usize, th: usize, pw: usize, ph: usize) -> Vec<f64> {
        let mut out = vec![0.0; pw * ph];
        for y in 0..ph {
            for x in 0..pw {
                let mut acc = 0.0;
                for (ty, t_row) in centred.chunks_exact(tw).enumerate().take(th) {
                    let start = (y + ty) * self.width + x;
                    let row = &self.pixels[start..start + tw];
                    acc += row.iter().zip(t_row).map(|(a, b)| a * b).sum::<f64>();
                }
                out[y * pw + x] = acc;
            }
        }
        out
    }

    /// Circular correlation over the full image size. Valid placements never
    /// wrap, so no padding beyond the image is needed.
    fn cross_fft(&self, centred: &[f64], tw: usize, th: usize, pw: usize, ph: usize) -> Vec<f64> {
        let (w, h) = (self.width, self.height);
        let plans = self.plans();
        let spectrum = self.spectrum.get_or_init(|| {
            let mut data: Vec<Complex<f64>> =
                self.pixels.iter().map(|&v| Complex::new(v, 0.0)).collect();
            transform_2d(&mut data, w, h, &plans.row, &plans.col);
            data
        });

        let mut data = vec![Complex::new(0.0, 0.0); w * h];
        for (ty, t_row) in centred.chunks_exact(tw).enumerate().take(th) {
            for (tx, &v) in t_row.iter().enumerate() {
                data[ty * w + tx] = Complex::new(v, 0.0);
            }
        }
        transform_2d(&mut data, w, h, &plans.row, &plans.col);

        for (t, s) in data.iter_mut().zip(spectrum) {
            *t = *s * t.conj();
        }
        transform_2d(&mut data, w, h, &plans.row_inv, &plans.col_inv);

        let scale = 1.0 / (w * h) as f64;
        let mut out = Vec::with_capacity(pw * ph);
        for y in 0..ph {
            out.extend(data[y * w..y * w + pw].iter().map(|c| c.re * scale));
        }
        out
    }

    fn plans(&self) -> &Plans {
        self.plans.get_or_init(|| {
            let mut planner = FftPlanner::new();
            Plans {
                row: planner.plan_fft_forward(self.width),
                col: planner.plan_fft_forward(self.height),
                row_inv: planner.plan_fft_inverse(self.width),
                col_inv: planner.plan_fft_inverse(self.height),
            }
        })
    }
}

/// In-place 2D FFT of a row-major `w x h` buffer.
fn transform_2d(
    data: &mut [Complex<f64>],
    w: usize,
    h: usize,
    row: &Arc<dyn Fft<f64>>,
    col: &Arc<dyn Fft<f64>>,
) {
    row.process(data);
    let mut columns = transpose(data, w, h);
    col.process(&mut columns);
    data.copy_from_slice(&transpose(&columns, h, w));
}

fn transpose(data: &[Complex<f64>], w: usize, h: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); w * h];
    for (y, row) in data.chunks_exact(w).enumerate() {
        for (x, &v) in row.iter().enumerate() {
            out[x * h + y] = v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            Luma([((x * x * 13 + y * y * 7 + x * y * 31 + x * 3 + y) % 251) as u8])
        })
    }

    #[test]
    fn test_exact_match_scores_one() {
        let img = pattern(30, 20);
        let template = image::imageops::crop_imm(&img, 7, 5, 10, 8).to_image();

        let scores = Correlator::new(&img).scores(&template).unwrap();
        assert_eq!(scores.dimensions(), (21, 13));

        let extremes = find_extremes(&scores);
        assert!((extremes.max_value - 1.0).abs() < 1e-4);
        assert_eq!(extremes.max_value_location, (7, 5));
    }

    #[test]
    fn test_fft_matches_direct() {
        let img = pattern(37, 23);
        let template = image::imageops::crop_imm(&img, 11, 4, 9, 7).to_image();
        let correlator = Correlator::new(&img);

        let direct = correlator.scores_with(&template, CrossMethod::Direct).unwrap();
        let fft = correlator.scores_with(&template, CrossMethod::Fft).unwrap();

        assert_eq!(direct.dimensions(), fft.dimensions());
        for (a, b) in direct.pixels().zip(fft.pixels()) {
            assert!((a[0] - b[0]).abs() < 1e-4, "direct {} vs fft {}", a[0], b[0]);
        }
        assert_eq!(find_extremes(&fft).max_value_location, (11, 4));
    }

    #[test]
    fn test_spectrum_reused_across_templates() {
        let img = pattern(40, 30);
        let correlator = Correlator::new(&img);
        for (x, y) in [(3, 2), (20, 15), (25, 9)] {
            let template = image::imageops::crop_imm(&img, x, y, 12, 10).to_image();
            let scores = correlator.scores_with(&template, CrossMethod::Fft).unwrap();
            let extremes = find_extremes(&scores);
            assert_eq!(extremes.max_value_location, (x, y));
            assert!((extremes.max_value - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_auto_uses_fft_for_large_templates() {
        let correlator = Correlator::new(&pattern(64, 64));
        assert!(!correlator.fft_is_cheaper(60 * 60 * 4 * 4));
        assert!(correlator.fft_is_cheaper(33 * 33 * 32 * 32));
    }

    #[test]
    fn test_brightness_shift_still_matches() {
        let template = pattern(8, 8);
        let img = GrayImage::from_fn(8, 8, |x, y| Luma([template.get_pixel(x, y)[0] / 2 + 40]));

        let best = Correlator::new(&img).best(&template).unwrap();
        assert!(best > 0.99, "affine intensity change should not matter: {}", best);
    }

    #[test]
    fn test_flat_image_scores_zero() {
        let img = GrayImage::from_pixel(20, 20, Luma([128]));
        let template = pattern(5, 5);
        assert_eq!(Correlator::new(&img).best(&template), Some(0.0));
    }

    #[test]
    fn test_template_larger_than_image() {
        let correlator = Correlator::new(&pattern(5, 5));
        assert!(correlator.scores(&pattern(6, 5)).is_none());
        assert!(correlator.best(&GrayImage::new(0, 0)).is_none());
    }
}
