use crate::config::{RunMode, Settings};
use crate::error::Result;
use crate::report::{unix_millis, RunReport, StateCounts};
use crate::specie::EpidemicState;
use crate::tau_leap::LeapStats;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use serde::Serialize;
use stats::OnlineStats;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StateStatistics {
    pub state: EpidemicState,
    pub mean: f64,
    pub stddev: f64,
}

/// Final state counts of independently seeded replicates.
#[derive(Clone, Debug, Serialize)]
pub struct EnsembleSummary {
    pub algorithm: &'static str,
    pub base_seed: u64,
    pub repetitions: usize,
    pub final_counts: Vec<StateCounts>,
    pub statistics: Vec<StateStatistics>,
    pub mean_duration_ms: f64,
    /// Tau-leap totals over all replicates, SSATAN-X only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaps: Option<LeapStats>,
}

impl EnsembleSummary {
    pub fn statistic(&self, state: EpidemicState) -> Option<&StateStatistics> {
        self.statistics.iter().find(|s| s.state == state)
    }

    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_ensemble_{}.json", self.algorithm, unix_millis()));
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), self)?;
        info!(path = %path.display(), "ensemble summary written");
        Ok(path)
    }
}

/// Runs `repetitions` replicates in parallel; replicate `i` uses seed `base_seed + i`.
pub fn run_ensemble(
    settings: &Settings,
    mode: RunMode,
    base_seed: u64,
    repetitions: usize,
    pb: ProgressBar,
) -> Result<EnsembleSummary> {
    info!(%mode, base_seed, repetitions, "ensemble started");
    let hidden = ProgressBar::hidden();
    let runs: Vec<(StateCounts, u128, Option<LeapStats>)> = (0..repetitions)
        .into_par_iter()
        .progress_with(pb)
        .map(|i| {
            let seed = base_seed.wrapping_add(i as u64);
            RunReport::simulate(settings, mode, seed, false, &hidden).map(|report| {
                let leaps = report.hybrid.map(|counters| counters.leaps);
                (report.final_counts, report.duration_ms, leaps)
            })
        })
        .collect::<Result<_>>()?;

    let statistics = EpidemicState::ALL
        .iter()
        .map(|&state| {
            let mut online = OnlineStats::new();
            for (counts, _, _) in &runs {
                online.add(counts.get(state));
            }
            StateStatistics {
                state,
                mean: online.mean(),
                stddev: online.stddev(),
            }
        })
        .collect();
    let mut durations = OnlineStats::new();
    let mut leaps: Option<LeapStats> = None;
    for (_, duration, run_leaps) in &runs {
        durations.add(*duration as f64);
        if let Some(run_leaps) = run_leaps {
            *leaps.get_or_insert_with(LeapStats::default) += run_leaps;
        }
    }

    Ok(EnsembleSummary {
        algorithm: mode.label(),
        base_seed,
        repetitions,
        final_counts: runs.into_iter().map(|(counts, _, _)| counts).collect(),
        statistics,
        mean_duration_ms: durations.mean(),
        leaps,
    })
}
