//! Stochastic simulation of an epidemic on a dynamic contact network.
//!
//! Two algorithms drive the same [`ContactNetwork`]: the exact [`Ssa`] and the
//! hybrid [`Ssatanx`], which thins the epidemic reactions against an upper bound
//! and tau-leaps the network rewiring in between.

pub mod config;
pub mod ensemble;
pub mod error;
pub mod graph;
pub mod network;
pub mod propensity;
pub mod report;
pub mod snapshot;
pub mod specie;
pub mod ssa;
pub mod ssatanx;
pub mod tau_leap;


use indicatif::{ProgressBar, ProgressStyle};

pub use config::{RunMode, Settings, SpecieSettings, UniformRange};
pub use ensemble::{run_ensemble, EnsembleSummary, StateStatistics};
pub use error::{Result, SimulationError};
pub use graph::{AdjacencyGraph, ContactGraph, EdgeRef, NodeId};
pub use network::{ContactNetwork, ReactionRates};
pub use propensity::{CumulativeTable, Reaction, ReactionCounts, ReactionKind};
pub use report::{RunReport, StateCounts};
pub use snapshot::{NetworkSnapshot, NetworkStorage, SpecieState};
pub use specie::{EpidemicState, Specie};
pub use ssa::{Ssa, StepRunResult};
pub use ssatanx::{AnalyticBound, HybridCounters, NaiveBound, PropensityBound, Ssatanx};
pub use tau_leap::{AndersonTauLeap, LeapOutcome, LeapStats};

/// Bar over `len` ticks in the crate wide style.
pub fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% ({eta})")
            .progress_chars("#>-"),
    );
    pb
}

/// Bar tracking simulated time of a single run.
pub fn time_progress_bar() -> ProgressBar {
    progress_bar(ssa::PROGRESS_TICKS)
}
