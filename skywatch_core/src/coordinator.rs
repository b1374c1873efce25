//! Coordinator - coverage planning and adaptive re-tasking.
//!
//! Two planners write drone paths, both through [`Agent::assign_path`]:
//! - [`plan_coverage`] splits the grid into one rectangle per drone and
//!   sweeps each rectangle in a serpentine pattern
//! - [`Coordinator::retask`] periodically sends the closest roaming drone to
//!   any strong hotspot nobody is watching
//!
//! Re-tasking is greedy and myopic. It may pick the same drone for several
//! hotspots in one pass (the last one wins), and the drone's remaining
//! coverage sweep is discarded.

use crate::agent::{base, Agent};
use crate::field::AnomalyField;
use crate::lifecycle::AgentMode;
use nalgebra::Vector2;
use skywatch_env::EntropySource;
use tracing::{debug, info, warn};

/// Half-open rectangle of grid cells `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl Region {
    pub fn cell_count(&self) -> usize {
        (self.x1 - self.x0) * (self.y1 - self.y0)
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.x0..self.x1).contains(&x) && (self.y0..self.y1).contains(&y)
    }
}

/// Regions per side for a fleet of `num_agents`: `ceil(sqrt(n))`.
pub fn regions_per_side(num_agents: usize) -> usize {
    let mut side = (num_agents as f64).sqrt().ceil() as usize;
    // Guard against float rounding on perfect squares
    while side * side < num_agents {
        side += 1;
    }
    while side > 1 && (side - 1) * (side - 1) >= num_agents {
        side -= 1;
    }
    side
}

/// Region assigned to drone `index`, row-major over a `side × side` split.
///
/// Boundaries are spread evenly so remainder rows and columns are absorbed
/// rather than left uncovered.
pub fn region_for(index: usize, num_agents: usize, width: usize, height: usize) -> Region {
    let side = regions_per_side(num_agents).max(1);
    let row = index / side;
    let col = index % side;

    Region {
        x0: col * width / side,
        x1: (col + 1) * width / side,
        y0: row * height / side,
        y1: (row + 1) * height / side,
    }
}

/// Serpentine sweep of a region, terminated by the base.
///
/// Even local rows run left to right, odd rows right to left, visiting every
/// cell once.
pub fn boustrophedon(region: Region) -> Vec<Vector2<f64>> {
    let mut waypoints = Vec::with_capacity(region.cell_count() + 1);

    for y in region.y0..region.y1 {
        let local_row = y - region.y0;
        if local_row % 2 == 0 {
            for x in region.x0..region.x1 {
                waypoints.push(Vector2::new(x as f64, y as f64));
            }
        } else {
            for x in (region.x0..region.x1).rev() {
                waypoints.push(Vector2::new(x as f64, y as f64));
            }
        }
    }

    waypoints.push(base());
    waypoints
}

/// Initial coverage plan: one serpentine path per drone, in drone order.
///
/// Deterministic in its inputs.
pub fn plan_coverage(num_agents: usize, width: usize, height: usize) -> Vec<Vec<Vector2<f64>>> {
    (0..num_agents)
        .map(|i| boustrophedon(region_for(i, num_agents, width, height)))
        .collect()
}

/// Tracks which cells any drone has flown over.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageTracker {
    width: usize,
    height: usize,
    visited: Vec<bool>,
    visited_count: usize,
}

impl CoverageTracker {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            visited: vec![false; width * height],
            visited_count: 0,
        }
    }

    /// Marks the cell under `position`; positions off the grid are ignored.
    pub fn observe(&mut self, position: Vector2<f64>) {
        let (fx, fy) = (position.x.floor(), position.y.floor());
        if !(fx >= 0.0 && fy >= 0.0 && fx < self.width as f64 && fy < self.height as f64) {
            return;
        }
        let idx = fy as usize * self.width + fx as usize;
        if !self.visited[idx] {
            self.visited[idx] = true;
            self.visited_count += 1;
        }
    }

    pub fn visited_count(&self) -> usize {
        self.visited_count
    }

    /// Fraction of cells visited at least once; 0 for an empty grid.
    pub fn fraction(&self) -> f64 {
        if self.visited.is_empty() {
            return 0.0;
        }
        self.visited_count as f64 / self.visited.len() as f64
    }

    pub fn reset(&mut self) {
        self.visited.fill(false);
        self.visited_count = 0;
    }
}

/// Re-tasking thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorParams {
    /// Cells strictly above this intensity are hotspots
    pub hotspot_threshold: f64,

    /// A roaming drone closer than this covers the hotspot
    pub retask_radius: f64,
}

/// An emergency path handed out by [`Coordinator::retask`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retask {
    pub agent_id: usize,
    pub hotspot: (usize, usize),
    pub distance: f64,
}

/// Path planner and re-tasker.
///
/// The only state kept between ticks is the visited-cell cache.
#[derive(Debug, Clone)]
pub struct Coordinator {
    params: CoordinatorParams,
    coverage: CoverageTracker,
}

impl Coordinator {
    pub fn new(params: CoordinatorParams, width: usize, height: usize) -> Self {
        Self {
            params,
            coverage: CoverageTracker::new(width, height),
        }
    }

    pub fn params(&self) -> &CoordinatorParams {
        &self.params
    }

    pub fn coverage(&self) -> &CoverageTracker {
        &self.coverage
    }

    /// Records the cells currently under each airborne drone.
    pub fn observe(&mut self, agents: &[Agent]) {
        for agent in agents {
            if agent.mode() != AgentMode::Charging {
                self.coverage.observe(agent.position());
            }
        }
    }

    /// Assigns the initial serpentine sweep to every drone.
    pub fn assign_coverage(&self, agents: &mut [Agent], width: usize, height: usize) {
        let plan = plan_coverage(agents.len(), width, height);
        for (agent, path) in agents.iter_mut().zip(plan) {
            debug!(agent = agent.id(), waypoints = path.len(), "Assigned coverage sweep");
            agent.assign_path(path);
        }
    }

    /// Cells above the hotspot threshold, in row-major order.
    pub fn hotspots<E: EntropySource>(&self, field: &AnomalyField<E>) -> Vec<(usize, usize)> {
        let mut hotspots = Vec::new();
        for y in 0..field.height() {
            for x in 0..field.width() {
                if field.cell(x, y) > self.params.hotspot_threshold {
                    hotspots.push((x, y));
                }
            }
        }
        hotspots
    }

    /// Sends the nearest roaming drone to every unwatched hotspot.
    ///
    /// `agents` is expected in id order; equal distances go to the lower id.
    pub fn retask<E: EntropySource>(
        &self,
        agents: &mut [Agent],
        field: &AnomalyField<E>,
    ) -> Vec<Retask> {
        let hotspots = self.hotspots(field);
        let mut assignments = Vec::new();

        for (hx, hy) in hotspots {
            let spot = Vector2::new(hx as f64, hy as f64);

            let watched = agents.iter().any(|a| {
                a.mode() == AgentMode::Roaming && (a.position() - spot).norm() < self.params.retask_radius
            });
            if watched {
                continue;
            }

            let nearest = agents
                .iter_mut()
                .filter(|a| a.mode() == AgentMode::Roaming)
                .map(|a| {
                    let d = (a.position() - spot).norm();
                    (d, a)
                })
                .min_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id().cmp(&b.id())));

            match nearest {
                Some((distance, agent)) => {
                    agent.assign_path([spot, base()]);
                    info!(
                        agent = agent.id(),
                        hotspot_x = hx,
                        hotspot_y = hy,
                        distance,
                        "Re-tasked drone to hotspot"
                    );
                    assignments.push(Retask {
                        agent_id: agent.id(),
                        hotspot: (hx, hy),
                        distance,
                    });
                }
                None => {
                    warn!(hotspot_x = hx, hotspot_y = hy, "Hotspot unwatched, no roaming drone available");
                }
            }
        }

        assignments
    }

    /// Clears the visited-cell cache.
    pub fn reset(&mut self) {
        self.coverage.reset();
    }
}
