// src/analysis/heatmap.rs
//
// Decaying 2-D occupancy heatmap on a coarse cell grid.
//
// Each frame builds a temporary grid with unit mass at every detection
// center, smooths it with a separable Gaussian of fixed radius, then blends:
//
//     heat = (1 - alpha) * heat + alpha * temp
//
// Memory is fixed by frame size and cell size; old activity fades
// geometrically at (1 - alpha) per frame.

use crate::types::Point;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Cell edge in frame pixels
    pub cell_size: f32,
    /// Gaussian kernel radius in cells
    pub kernel_radius: usize,
    /// Gaussian sigma in cells
    pub sigma: f32,
    /// Blend factor for the newest frame
    pub alpha: f32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            cell_size: 16.0,
            kernel_radius: 2,
            sigma: 1.0,
            alpha: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hotspot {
    /// Cell center in frame pixels
    pub position: Point,
    pub intensity: f32,
}

#[derive(Debug, Clone)]
pub struct Heatmap {
    config: HeatmapConfig,
    grid: Array2<f32>,
    kernel: Vec<f32>,
}

impl Heatmap {
    pub fn new(config: HeatmapConfig, frame_w: f32, frame_h: f32) -> Self {
        let cell = config.cell_size.max(1.0);
        let rows = ((frame_h / cell).ceil() as usize).max(1);
        let cols = ((frame_w / cell).ceil() as usize).max(1);
        let kernel = gaussian_kernel(config.kernel_radius, config.sigma);
        Self {
            config,
            grid: Array2::zeros((rows, cols)),
            kernel,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.grid.dim()
    }

    fn cell_of(&self, p: Point) -> Option<(usize, usize)> {
        if !p.is_finite() || p.x < 0.0 || p.y < 0.0 {
            return None;
        }
        let cell = self.config.cell_size.max(1.0);
        let (r, c) = ((p.y / cell) as usize, (p.x / cell) as usize);
        let (rows, cols) = self.grid.dim();
        (r < rows && c < cols).then_some((r, c))
    }

    /// Fold one frame of centers into the map. An empty slice is a pure decay step.
    pub fn update(&mut self, centers: &[Point]) {
        let alpha = self.config.alpha.clamp(0.0, 1.0);
        let mut temp = Array2::<f32>::zeros(self.grid.dim());
        for p in centers {
            if let Some(idx) = self.cell_of(*p) {
                temp[idx] += 1.0;
            }
        }
        if centers.is_empty() {
            self.grid.mapv_inplace(|v| v * (1.0 - alpha));
            return;
        }
        let smoothed = self.smooth(&temp);
        self.grid.zip_mut_with(&smoothed, |h, t| *h = (1.0 - alpha) * *h + alpha * *t);
    }

    fn smooth(&self, src: &Array2<f32>) -> Array2<f32> {
        let (rows, cols) = src.dim();
        let r = self.config.kernel_radius as isize;
        let mut horiz = Array2::<f32>::zeros((rows, cols));
        for ((y, x), out) in horiz.indexed_iter_mut() {
            let mut acc = 0.0;
            for k in -r..=r {
                let xx = x as isize + k;
                if xx >= 0 && (xx as usize) < cols {
                    acc += src[(y, xx as usize)] * self.kernel[(k + r) as usize];
                }
            }
            *out = acc;
        }
        let mut out = Array2::<f32>::zeros((rows, cols));
        for ((y, x), cell) in out.indexed_iter_mut() {
            let mut acc = 0.0;
            for k in -r..=r {
                let yy = y as isize + k;
                if yy >= 0 && (yy as usize) < rows {
                    acc += horiz[(yy as usize, x)] * self.kernel[(k + r) as usize];
                }
            }
            *cell = acc;
        }
        out
    }

    /// Heat at the cell containing `p` (0 outside the frame).
    pub fn value_at(&self, p: Point) -> f32 {
        self.cell_of(p).map(|idx| self.grid[idx]).unwrap_or(0.0)
    }

    pub fn total_mass(&self) -> f32 {
        self.grid.sum()
    }

    pub fn peak(&self) -> f32 {
        self.grid.iter().copied().fold(0.0, f32::max)
    }

    /// The `n` hottest cells, hottest first. Zero cells are never reported.
    pub fn hotspots(&self, n: usize) -> Vec<Hotspot> {
        let cell = self.config.cell_size.max(1.0);
        let mut cells: Vec<Hotspot> = self
            .grid
            .indexed_iter()
            .filter(|(_, v)| **v > 0.0)
            .map(|((r, c), v)| Hotspot {
                position: Point::new((c as f32 + 0.5) * cell, (r as f32 + 0.5) * cell),
                intensity: *v,
            })
            .collect();
        cells.sort_by(|a, b| {
            b.intensity
                .partial_cmp(&a.intensity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        cells.truncate(n);
        cells
    }
}

/// Normalized 1-D Gaussian of length 2r+1.
fn gaussian_kernel(radius: usize, sigma: f32) -> Vec<f32> {
    let sigma = if sigma > 0.0 { sigma } else { 1.0 };
    let r = radius as isize;
    let mut k: Vec<f32> = (-r..=r)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = k.iter().sum();
    for v in k.iter_mut() {
        *v /= sum;
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heatmap(alpha: f32) -> Heatmap {
        let cfg = HeatmapConfig {
            alpha,
            ..HeatmapConfig::default()
        };
        Heatmap::new(cfg, 320.0, 240.0)
    }

    #[test]
    fn test_kernel_is_normalized() {
        let k = gaussian_kernel(3, 1.5);
        assert_eq!(k.len(), 7);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(k[3] > k[0]);
    }

    #[test]
    fn test_single_detection_mass_is_alpha() {
        let mut h = heatmap(0.1);
        h.update(&[Point::new(160.0, 120.0)]);
        // Interior point: the smoothed unit mass is preserved
        assert!((h.total_mass() - 0.1).abs() < 1e-4);
        assert!(h.value_at(Point::new(160.0, 120.0)) > 0.0);
        assert_eq!(h.value_at(Point::new(-5.0, 0.0)), 0.0);
    }

    #[test]
    fn test_geometric_decay_without_detections() {
        let alpha = 0.1;
        let mut h = heatmap(alpha);
        let p = Point::new(100.0, 100.0);
        h.update(&[p]);
        let initial = h.value_at(p);
        assert!(initial > 0.0);

        for n in 1..=20 {
            h.update(&[]);
            let expected = initial * (1.0 - alpha).powi(n);
            assert!((h.value_at(p) - expected).abs() < 1e-6);
        }
        assert!(h.value_at(p) < initial * 0.2);
    }

    #[test]
    fn test_hotspots_ordered_by_intensity() {
        let mut h = heatmap(0.5);
        let busy = Point::new(40.0, 40.0);
        let quiet = Point::new(280.0, 200.0);
        h.update(&[busy, busy, quiet]);
        let spots = h.hotspots(3);
        assert_eq!(spots.len(), 3);
        assert!(spots[0].intensity >= spots[1].intensity);
        assert!(spots[0].position.distance(&busy) < 16.0);
        assert!(h.peak() == spots[0].intensity);
    }

    #[test]
    fn test_out_of_frame_centers_are_ignored() {
        let mut h = heatmap(0.1);
        h.update(&[Point::new(5000.0, 5000.0), Point::new(f32::NAN, 1.0)]);
        assert_eq!(h.total_mass(), 0.0);
    }
}
