use crate::config::{RunMode, Settings, UniformRange};
use crate::error::Result;
use crate::graph::{AdjacencyGraph, ContactGraph};
use crate::network::ContactNetwork;
use crate::propensity::ReactionCounts;
use crate::snapshot::NetworkStorage;
use crate::specie::EpidemicState;
use crate::ssa::Ssa;
use crate::ssatanx::{HybridCounters, Ssatanx};
use indicatif::ProgressBar;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct StateCounts {
    #[serde(rename = "S")]
    pub susceptible: usize,
    #[serde(rename = "I")]
    pub infected: usize,
    #[serde(rename = "D")]
    pub diagnosed: usize,
}

impl StateCounts {
    pub fn of<G: ContactGraph>(network: &ContactNetwork<G>) -> StateCounts {
        StateCounts {
            susceptible: network.count_by_state(EpidemicState::Susceptible),
            infected: network.count_by_state(EpidemicState::Infected),
            diagnosed: network.count_by_state(EpidemicState::Diagnosed),
        }
    }

    pub fn get(&self, state: EpidemicState) -> usize {
        match state {
            EpidemicState::Susceptible => self.susceptible,
            EpidemicState::Infected => self.infected,
            EpidemicState::Diagnosed => self.diagnosed,
        }
    }

    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.diagnosed
    }
}

/// Summary and trajectory of one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub algorithm: &'static str,
    pub seed: u64,
    pub simulation_time: f64,
    pub initial_counts: StateCounts,
    pub final_counts: StateCounts,
    pub initial_edges: usize,
    pub final_edges: usize,
    pub new_contact_rate: UniformRange,
    pub loose_contact_rate: UniformRange,
    pub transmission_rate: f64,
    pub diagnosis_rate: f64,
    pub birth_rate: f64,
    pub duration_ms: u128,
    pub reactions: ReactionCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<HybridCounters>,
    pub snapshots: NetworkStorage,
}

impl RunReport {
    /// Builds the network from `settings` and runs it to the configured end time.
    pub fn simulate(
        settings: &Settings,
        mode: RunMode,
        seed: u64,
        record_snapshots: bool,
        pb: &ProgressBar,
    ) -> Result<RunReport> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let network: ContactNetwork<AdjacencyGraph> = ContactNetwork::new(settings, &mut rng)?;
        let initial_counts = StateCounts::of(&network);
        let initial_edges = network.count_edges();
        let end_time = settings.simulation_time;

        info!(%mode, seed, "run started");
        let started = Instant::now();
        let (network, snapshots, reactions, hybrid) = match mode {
            RunMode::Ssa => {
                let mut ssa = Ssa::new(network, 0., end_time);
                if !record_snapshots {
                    ssa = ssa.without_snapshots();
                }
                ssa.run(&mut rng, pb)?;
                let (network, storage, counts) = ssa.into_parts();
                (network, storage, counts, None)
            }
            RunMode::Ssatanx => {
                let mut driver = Ssatanx::new(network, 0., end_time);
                if !record_snapshots {
                    driver = driver.without_snapshots();
                }
                driver.run(&mut rng, pb)?;
                let (network, storage, counts, counters) = driver.into_parts();
                (network, storage, counts, Some(counters))
            }
        };
        let duration_ms = started.elapsed().as_millis();

        let report = RunReport {
            algorithm: mode.label(),
            seed,
            simulation_time: end_time,
            initial_counts,
            final_counts: StateCounts::of(&network),
            initial_edges,
            final_edges: network.count_edges(),
            new_contact_rate: settings.new_contact_rate,
            loose_contact_rate: settings.loose_contact_rate,
            transmission_rate: settings.transmission_rate,
            diagnosis_rate: settings.diagnosis_rate,
            birth_rate: settings.birth_rate,
            duration_ms,
            reactions,
            hybrid,
            snapshots,
        };
        info!(
            duration_ms,
            final_counts = ?report.final_counts,
            snapshots = report.snapshots.len(),
            "run finished"
        );
        Ok(report)
    }

    /// `<SSA|SSX>_<unix millis>.json`
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.algorithm, unix_millis())
    }

    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!(path = %path.display(), "report written");
        Ok(path)
    }
}

pub(crate) fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_summary_and_trajectory() {
        let settings = crate::tests::settings(8, 2, 1, 6);
        let report =
            RunReport::simulate(&settings, RunMode::Ssa, 21, true, &ProgressBar::hidden()).unwrap();
        assert_eq!(report.algorithm, "SSA");
        assert_eq!(report.initial_counts.total(), 11);
        assert_eq!(report.initial_edges, 6);
        assert!(report.hybrid.is_none());
        assert_eq!(report.snapshots.len(), report.reactions.total() + 2);

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["initial_counts"]["I"], 2);
        assert_eq!(json["new_contact_rate"].as_array().unwrap().len(), 2);
        assert!(json.get("hybrid").is_none());
        let first = &json["snapshots"][0];
        assert_eq!(first["time"], 0.0);
        assert_eq!(first["nw_states"].as_array().unwrap().len(), 11);
        assert!(first["nw_states"][0]["neighbors"].is_array());
    }

    #[test]
    fn hybrid_report_carries_counters() {
        let settings = crate::tests::settings(8, 2, 1, 6);
        let report =
            RunReport::simulate(&settings, RunMode::Ssatanx, 4, false, &ProgressBar::hidden())
                .unwrap();
        assert_eq!(report.algorithm, "SSX");
        assert!(report.snapshots.is_empty());
        assert!(report.file_name().starts_with("SSX_"));
        let hybrid = report.hybrid.as_ref().unwrap();
        assert_eq!(hybrid.accepted, report.reactions.total());
    }
}
