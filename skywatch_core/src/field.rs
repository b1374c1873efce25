//! Anomaly field - the environment the swarm is sensing.
//!
//! The field keeps a short list of point-like anomaly sources and derives the
//! intensity grid from them on every update:
//! - Sources spawn at random cells and decay geometrically
//! - The grid is rebuilt from the live sources, never accumulated
//! - A single neighbour-spread pass approximates diffusion
//!
//! Because the grid is recomputed from scratch each step, intensity cannot
//! grow without bound: decay shrinks every source and the final clamp caps
//! every cell at 1.0.

use serde::{Deserialize, Serialize};
use skywatch_env::EntropySource;

/// Sources at or below this intensity are considered dead.
pub const EXTINCTION_THRESHOLD: f64 = 1e-3;

/// Lower bound of a freshly spawned source's intensity.
pub const SPAWN_INTENSITY_MIN: f64 = 0.5;

/// Upper bound of a freshly spawned source's intensity.
pub const SPAWN_INTENSITY_MAX: f64 = 1.0;

/// Offsets of the 8 Moore neighbours.
const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Field dynamics parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldParams {
    pub width: usize,
    pub height: usize,
    pub spawn_probability: f64,
    pub decay_rate: f64,
    pub diffusion_factor: f64,
}

/// A decaying, point-like contributor to the intensity field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySource {
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
    /// Field time at creation (ms)
    pub created_ms: u64,
}

impl AnomalySource {
    /// Returns true while the source still contributes to the field.
    pub fn is_alive(&self) -> bool {
        self.intensity > EXTINCTION_THRESHOLD
    }

    /// Grid cell nearest to the source, if it lies inside the grid.
    ///
    /// Halves round up on both axes, so `-0.5` lands in cell 0.
    fn cell(&self, width: usize, height: usize) -> Option<(usize, usize)> {
        let ix = (self.x + 0.5).floor();
        let iy = (self.y + 0.5).floor();
        if ix < 0.0 || iy < 0.0 || ix >= width as f64 || iy >= height as f64 {
            return None;
        }
        Some((ix as usize, iy as usize))
    }
}

/// Read-only copy of the intensity grid, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<f64>,
}

impl GridSnapshot {
    /// Cell value at integer coordinates, or `None` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y * self.width + x).copied()
    }
}

/// What happened during one field update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    /// Source created this step, if any
    pub spawned: Option<AnomalySource>,

    /// Number of sources that died this step
    pub expired: usize,
}

/// The anomaly field: intensity grid plus live sources.
pub struct AnomalyField<E: EntropySource> {
    params: FieldParams,

    /// Row-major intensity grid
    cells: Vec<f64>,

    /// Diffusion output buffer, kept to avoid reallocating every step
    scratch: Vec<f64>,

    sources: Vec<AnomalySource>,

    /// RNG for spawning (separate stream from sensor noise)
    entropy: E,

    elapsed_ms: u64,
}

impl<E: EntropySource> AnomalyField<E> {
    /// Creates an empty field.
    pub fn new(params: FieldParams, entropy: E) -> Self {
        let len = params.width * params.height;
        Self {
            params,
            cells: vec![0.0; len],
            scratch: vec![0.0; len],
            sources: Vec::new(),
            entropy,
            elapsed_ms: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.params.width
    }

    pub fn height(&self) -> usize {
        self.params.height
    }

    pub fn params(&self) -> &FieldParams {
        &self.params
    }

    /// Live anomaly sources.
    pub fn sources(&self) -> &[AnomalySource] {
        &self.sources
    }

    /// Number of live anomaly sources.
    pub fn live_count(&self) -> usize {
        self.sources.len()
    }

    /// Field time accumulated by [`update`](Self::update).
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Row-major view of the intensity grid.
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    /// Copies the intensity grid.
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            width: self.params.width,
            height: self.params.height,
            cells: self.cells.clone(),
        }
    }

    /// Value of the cell at integer coordinates; 0 outside the grid.
    pub fn cell(&self, x: usize, y: usize) -> f64 {
        if x >= self.params.width || y >= self.params.height {
            return 0.0;
        }
        self.cells[y * self.params.width + x]
    }

    /// Intensity at a continuous position.
    ///
    /// Reads the cell at `floor(x), floor(y)`. Positions on or beyond the
    /// grid edge, and non-finite positions, read as 0.
    pub fn sample_at(&self, x: f64, y: f64) -> f64 {
        if !x.is_finite() || !y.is_finite() {
            return 0.0;
        }
        let fx = x.floor();
        let fy = y.floor();
        if fx < 0.0 || fy < 0.0 || fx >= self.params.width as f64 || fy >= self.params.height as f64 {
            return 0.0;
        }
        self.cell(fx as usize, fy as usize)
    }

    /// Adds a source directly, bypassing the spawn lottery.
    ///
    /// The grid reflects it after the next [`update`](Self::update).
    pub fn inject(&mut self, x: f64, y: f64, intensity: f64) {
        self.sources.push(AnomalySource {
            x,
            y,
            intensity: intensity.clamp(0.0, 1.0),
            created_ms: self.elapsed_ms,
        });
    }

    /// Advances the field by `dt_ms`.
    ///
    /// Order is fixed: spawn, decay, rebuild, diffuse, clamp, cull.
    pub fn update(&mut self, dt_ms: u64) -> FieldUpdate {
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);

        let spawned = self.spawn();

        for source in &mut self.sources {
            source.intensity *= self.params.decay_rate;
        }

        self.rebuild();
        self.diffuse();

        let before = self.sources.len();
        self.sources.retain(AnomalySource::is_alive);

        FieldUpdate {
            spawned,
            expired: before - self.sources.len(),
        }
    }

    /// Clears all sources, zeroes the grid and rewinds field time.
    pub fn reset(&mut self) {
        self.sources.clear();
        self.cells.fill(0.0);
        self.scratch.fill(0.0);
        self.elapsed_ms = 0;
    }

    fn spawn(&mut self) -> Option<AnomalySource> {
        if !self.entropy.chance(self.params.spawn_probability) {
            return None;
        }

        let x = self.entropy.below(self.params.width) as f64;
        let y = self.entropy.below(self.params.height) as f64;
        let intensity = self.entropy.uniform(SPAWN_INTENSITY_MIN, SPAWN_INTENSITY_MAX);

        let source = AnomalySource {
            x,
            y,
            intensity,
            created_ms: self.elapsed_ms,
        };
        self.sources.push(source.clone());
        Some(source)
    }

    /// Re-accumulates the grid from the live sources.
    fn rebuild(&mut self) {
        let (width, height) = (self.params.width, self.params.height);

        self.cells.fill(0.0);
        for source in &self.sources {
            if let Some((ix, iy)) = source.cell(width, height) {
                self.cells[iy * width + ix] += source.intensity;
            }
        }
    }

    /// One neighbour-spread pass, then clamp to [0, 1].
    ///
    /// Spread is read from `cells` and written into `scratch`, so a cell that
    /// just received intensity does not spread it again in the same step.
    fn diffuse(&mut self) {
        let (width, height) = (self.params.width, self.params.height);
        let share = self.params.diffusion_factor / 8.0;

        self.scratch.copy_from_slice(&self.cells);

        for y in 0..height {
            for x in 0..width {
                let value = self.cells[y * width + x];
                if value <= 0.0 {
                    continue;
                }
                let spread = value * share;

                for (dx, dy) in NEIGHBOURS {
                    let nx = x as isize + dx;
                    let ny = y as isize + dy;
                    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                        continue;
                    }
                    self.scratch[ny as usize * width + nx as usize] += spread;
                }
            }
        }

        for (cell, value) in self.cells.iter_mut().zip(&self.scratch) {
            *cell = value.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use skywatch_env::SeededEntropy;

    fn params(width: usize, height: usize) -> FieldParams {
        FieldParams {
            width,
            height,
            spawn_probability: 0.0,
            decay_rate: 0.9,
            diffusion_factor: 0.1,
        }
    }

    #[test]
    fn test_source_cell_rounds_halves_up() {
        let still = FieldParams {
            diffusion_factor: 0.0,
            ..params(10, 10)
        };

        let mut field = AnomalyField::new(still, SeededEntropy::new(1));
        field.inject(-0.5, -0.5, 1.0);
        field.update(200);
        assert_relative_eq!(field.cell(0, 0), 0.9, epsilon = 1e-12);

        let mut field = AnomalyField::new(still, SeededEntropy::new(1));
        field.inject(2.5, 2.5, 1.0);
        field.update(200);
        assert_relative_eq!(field.cell(3, 3), 0.9, epsilon = 1e-12);
        assert_eq!(field.cell(2, 2), 0.0);

        // Just below the half rounds off the grid
        let mut field = AnomalyField::new(still, SeededEntropy::new(1));
        field.inject(-0.6, 0.0, 1.0);
        field.inject(9.5, 0.0, 1.0);
        field.update(200);
        assert!(field.cells().iter().all(|&v| v == 0.0));
        assert_eq!(field.live_count(), 2);
    }

    #[test]
    fn test_single_source_decay_then_diffuse() {
        let mut field = AnomalyField::new(params(10, 10), SeededEntropy::new(42));
        field.inject(5.0, 5.0, 1.0);

        let outcome = field.update(200);

        assert!(outcome.spawned.is_none());
        assert_relative_eq!(field.cell(5, 5), 0.9, epsilon = 1e-12);

        let expected = 0.9 * 0.1 / 8.0;
        for (dx, dy) in NEIGHBOURS {
            let x = (5 + dx) as usize;
            let y = (5 + dy) as usize;
            assert_relative_eq!(field.cell(x, y), expected, epsilon = 1e-12);
        }

        // Two cells away nothing arrives in a single pass
        assert_eq!(field.cell(7, 5), 0.0);
        assert_eq!(field.cell(3, 3), 0.0);
    }

    #[test]
    fn test_corner_spreads_to_three_neighbours() {
        let mut field = AnomalyField::new(params(4, 4), SeededEntropy::new(1));
        field.inject(0.0, 0.0, 1.0);
        field.update(200);

        let expected = 0.9 * 0.1 / 8.0;
        assert_relative_eq!(field.cell(1, 0), expected, epsilon = 1e-12);
        assert_relative_eq!(field.cell(0, 1), expected, epsilon = 1e-12);
        assert_relative_eq!(field.cell(1, 1), expected, epsilon = 1e-12);

        let total: f64 = field.cells().iter().sum();
        assert_relative_eq!(total, 0.9 + 3.0 * expected, epsilon = 1e-12);
    }

    #[test]
    fn test_colocated_sources_sum_and_clamp() {
        let mut field = AnomalyField::new(params(5, 5), SeededEntropy::new(1));
        field.inject(2.2, 1.8, 0.8);
        field.inject(1.6, 2.4, 0.8);
        field.update(200);

        // Both round to (2, 2); 0.72 + 0.72 is clamped
        assert_eq!(field.cell(2, 2), 1.0);
    }

    #[test]
    fn test_sources_die_when_decayed() {
        let mut field = AnomalyField::new(params(5, 5), SeededEntropy::new(1));
        field.inject(1.0, 1.0, 0.5);

        let mut expired = 0;
        for _ in 0..200 {
            expired += field.update(200).expired;
        }

        assert_eq!(field.live_count(), 0);
        assert_eq!(expired, 1);
        assert!(field.cells().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_sample_at_bounds() {
        let mut field = AnomalyField::new(params(10, 10), SeededEntropy::new(42));
        field.inject(9.0, 9.0, 1.0);
        field.update(200);

        assert_relative_eq!(field.sample_at(9.99, 9.5), 0.9, epsilon = 1e-12);
        assert_eq!(field.sample_at(10.0, 5.0), 0.0);
        assert_eq!(field.sample_at(5.0, 10.0), 0.0);
        assert_eq!(field.sample_at(-0.01, 5.0), 0.0);
        assert_eq!(field.sample_at(f64::NAN, 5.0), 0.0);
        assert_eq!(field.sample_at(f64::INFINITY, 5.0), 0.0);
    }

    #[test]
    fn test_spawn_is_seeded() {
        let p = FieldParams {
            spawn_probability: 1.0,
            ..params(20, 20)
        };
        let mut a = AnomalyField::new(p, SeededEntropy::new(9));
        let mut b = AnomalyField::new(p, SeededEntropy::new(9));

        for _ in 0..10 {
            let sa = a.update(200).spawned.unwrap();
            let sb = b.update(200).spawned.unwrap();
            assert_eq!(sa, sb);
            assert!(sa.intensity >= SPAWN_INTENSITY_MIN && sa.intensity < SPAWN_INTENSITY_MAX);
            assert!(sa.x < 20.0 && sa.y < 20.0);
        }
        assert_eq!(a.cells(), b.cells());
    }

    #[test]
    fn test_reset_clears_everything() {
        let p = FieldParams {
            spawn_probability: 1.0,
            ..params(8, 8)
        };
        let mut field = AnomalyField::new(p, SeededEntropy::new(5));
        for _ in 0..5 {
            field.update(200);
        }
        assert!(field.live_count() > 0);

        field.reset();

        assert_eq!(field.live_count(), 0);
        assert_eq!(field.elapsed_ms(), 0);
        assert!(field.cells().iter().all(|&v| v == 0.0));
    }

    proptest! {
        #[test]
        fn prop_cells_stay_in_unit_interval(
            seed in any::<u64>(),
            spawn in 0.0f64..=1.0,
            decay in 0.5f64..0.999,
            diffusion in 0.0f64..=1.0,
            steps in 1usize..60,
        ) {
            let p = FieldParams {
                width: 12,
                height: 9,
                spawn_probability: spawn,
                decay_rate: decay,
                diffusion_factor: diffusion,
            };
            let mut field = AnomalyField::new(p, SeededEntropy::new(seed));
            for _ in 0..steps {
                field.update(200);
                prop_assert!(field.cells().iter().all(|&v| (0.0..=1.0).contains(&v)));
            }
        }

        #[test]
        fn prop_sample_never_panics(x in -100.0f64..100.0, y in -100.0f64..100.0) {
            let field = AnomalyField::new(params(10, 10), SeededEntropy::new(0));
            let v = field.sample_at(x, y);
            prop_assert!((0.0..=1.0).contains(&v));
            if x >= 10.0 || y >= 10.0 || x < 0.0 || y < 0.0 {
                prop_assert_eq!(v, 0.0);
            }
        }
    }
}
