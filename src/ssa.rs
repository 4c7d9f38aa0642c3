use crate::error::{Result, SimulationError};
use crate::graph::{AdjacencyGraph, ContactGraph};
use crate::network::ContactNetwork;
use crate::propensity::{choose_channel, Reaction, ReactionCounts};
use crate::snapshot::{new_storage, record, NetworkStorage};
use indicatif::ProgressBar;
use rand::distributions::OpenClosed01;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use tracing::{info, trace};

/// Progress bar resolution.
pub(crate) const PROGRESS_TICKS: u64 = 10000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepRunResult {
    NoStep,
    Step { reaction: Reaction },
}

impl StepRunResult {
    pub fn success(&self) -> bool {
        match self {
            StepRunResult::NoStep => false,
            StepRunResult::Step { .. } => true,
        }
    }
}

/// Exponential waiting time for a total propensity `total > 0`.
pub(crate) fn waiting_time<R: Rng>(total: f64, rng: &mut R) -> Result<f64> {
    let distr = Exp::new(total).map_err(|e| {
        SimulationError::inconsistency(format!("invalid total propensity {}: {}", total, e))
    })?;
    Ok(distr.sample(rng))
}

/// Uniform point in `(0, total]`.
pub(crate) fn search_bound<R: Rng>(total: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.sample(OpenClosed01);
    total * u
}

pub(crate) fn set_progress(pb: &ProgressBar, time: f64, start: f64, end: f64) {
    if end > start {
        pb.set_position((PROGRESS_TICKS as f64 * (time - start) / (end - start)) as u64);
    }
}

/// Gillespie's direct method over all six channels.
#[derive(Clone, Debug)]
pub struct Ssa<G: ContactGraph = AdjacencyGraph> {
    network: ContactNetwork<G>,
    start_time: f64,
    time: f64,
    end_time: f64,
    storage: NetworkStorage,
    record_snapshots: bool,
    counts: ReactionCounts,
    stepnumber: usize,
}

impl<G: ContactGraph> Ssa<G> {
    pub fn new(network: ContactNetwork<G>, start_time: f64, end_time: f64) -> Ssa<G> {
        let mut ssa = Ssa {
            network,
            start_time,
            time: start_time,
            end_time,
            storage: new_storage(),
            record_snapshots: true,
            counts: ReactionCounts::default(),
            stepnumber: 0,
        };
        ssa.snapshot();
        ssa
    }

    /// Disables the snapshot list; only counters and the final network are kept.
    pub fn without_snapshots(mut self) -> Ssa<G> {
        self.record_snapshots = false;
        self.storage.clear();
        self
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn network(&self) -> &ContactNetwork<G> {
        &self.network
    }

    pub fn storage(&self) -> &NetworkStorage {
        &self.storage
    }

    pub fn counts(&self) -> &ReactionCounts {
        &self.counts
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.end_time
    }

    pub fn into_parts(self) -> (ContactNetwork<G>, NetworkStorage, ReactionCounts) {
        (self.network, self.storage, self.counts)
    }

    fn snapshot(&mut self) {
        if self.record_snapshots {
            record(&mut self.storage, self.time, &self.network);
        }
    }

    fn terminate(&mut self) -> StepRunResult {
        self.time = self.end_time;
        self.snapshot();
        StepRunResult::NoStep
    }

    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<StepRunResult> {
        if self.is_finished() {
            return Ok(StepRunResult::NoStep);
        }
        self.stepnumber += 1;

        let tables = self.network.rate_tables();
        let weights = tables.weights();
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0. {
            return Ok(self.terminate());
        }

        let timestep = waiting_time(total, rng)?;
        if self.time + timestep > self.end_time {
            return Ok(self.terminate());
        }
        self.time += timestep;

        let bound = search_bound(total, rng);
        let (kind, local) = choose_channel(&weights, bound).ok_or_else(|| {
            SimulationError::inconsistency(format!(
                "no channel for bound {} of total {}",
                bound, total
            ))
        })?;
        let reaction = tables.resolve(kind, local)?;
        self.network.execute(reaction, self.time)?;
        self.counts.record(kind);
        self.snapshot();
        Ok(StepRunResult::Step { reaction })
    }

    pub fn run<R: Rng>(&mut self, rng: &mut R, pb: &ProgressBar) -> Result<()> {
        info!(
            nodes = self.network.size(),
            edges = self.network.count_edges(),
            end_time = self.end_time,
            "starting SSA"
        );
        while !self.is_finished() {
            if let StepRunResult::Step { reaction } = self.step(rng)? {
                trace!(?reaction, time = self.time, "fired");
            }
            if self.stepnumber % 1000 == 0 {
                set_progress(pb, self.time, self.start_time, self.end_time);
            }
        }
        set_progress(pb, self.time, self.start_time, self.end_time);
        info!(steps = self.stepnumber, reactions = self.counts.total(), "SSA finished");
        Ok(())
    }
}
