use crate::error::{Result, SimulationError};
use crate::specie::EpidemicState;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecieSettings {
    pub state: EpidemicState,
    pub amount: usize,
    pub death_rate: f64,
}

/// Bounds `[a, b]` of a uniform distribution, written as a two element array.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniformRange(pub f64, pub f64);

impl UniformRange {
    pub fn low(&self) -> f64 {
        self.0
    }
    pub fn high(&self) -> f64 {
        self.1
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub species: Vec<SpecieSettings>,
    /// 0 means "derive one from the clock and the process id".
    #[serde(default)]
    pub seed: u64,
    pub initial_edges: usize,
    pub simulation_time: f64,
    pub new_contact_rate: UniformRange,
    pub loose_contact_rate: UniformRange,
    pub transmission_rate: f64,
    pub diagnosis_rate: f64,
    #[serde(default)]
    pub birth_rate: f64,
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SimulationError::config(format!("can not read {}: {}", path.display(), e))
        })?;
        Settings::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Settings> {
        let settings: Settings = serde_json::from_str(content)
            .map_err(|e| SimulationError::config(format!("malformed settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        for state in EpidemicState::ALL {
            let n = self.species.iter().filter(|s| s.state == state).count();
            if n != 1 {
                return Err(SimulationError::config(format!(
                    "state {} must be configured exactly once, found {}",
                    state, n
                )));
            }
        }
        for sp in &self.species {
            check_rate(&format!("death_rate of {}", sp.state), sp.death_rate)?;
        }
        for (name, range) in [
            ("new_contact_rate", self.new_contact_rate),
            ("loose_contact_rate", self.loose_contact_rate),
        ] {
            check_rate(name, range.low())?;
            check_rate(name, range.high())?;
            if range.low() > range.high() {
                return Err(SimulationError::config(format!(
                    "{}: lower bound {} is above upper bound {}",
                    name,
                    range.low(),
                    range.high()
                )));
            }
        }
        check_rate("transmission_rate", self.transmission_rate)?;
        check_rate("diagnosis_rate", self.diagnosis_rate)?;
        check_rate("birth_rate", self.birth_rate)?;
        check_rate("simulation_time", self.simulation_time)?;

        let n = self.population();
        let pairs = n * n.saturating_sub(1) / 2;
        if self.initial_edges > pairs {
            return Err(SimulationError::config(format!(
                "initial_edges = {} but a population of {} only has {} node pairs",
                self.initial_edges, n, pairs
            )));
        }
        Ok(())
    }

    pub fn specie(&self, state: EpidemicState) -> Option<&SpecieSettings> {
        self.species.iter().find(|s| s.state == state)
    }

    pub fn amount(&self, state: EpidemicState) -> usize {
        self.specie(state).map_or(0, |s| s.amount)
    }

    pub fn death_rate(&self, state: EpidemicState) -> f64 {
        self.specie(state).map_or(0., |s| s.death_rate)
    }

    pub fn population(&self) -> usize {
        self.species.iter().map(|s| s.amount).sum()
    }

    /// The configured seed, or one derived from wall-clock time and process id when it is 0.
    pub fn effective_seed(&self) -> u64 {
        match self.seed {
            0 => environment_seed(),
            seed => seed,
        }
    }
}

fn check_rate(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0. {
        return Err(SimulationError::config(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

fn environment_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1);
    nanos.wrapping_mul(u64::from(std::process::id()).max(1)).max(1)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    Ssa,
    Ssatanx,
}

impl RunMode {
    /// Prefix of the output file name.
    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Ssa => "SSA",
            RunMode::Ssatanx => "SSX",
        }
    }
}

impl Display for RunMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for RunMode {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<RunMode> {
        match s.trim_start_matches('-').to_ascii_uppercase().as_str() {
            "SSA" => Ok(RunMode::Ssa),
            "SSX" | "SSATANX" => Ok(RunMode::Ssatanx),
            _ => Err(SimulationError::config(format!(
                "invalid algorithm '{}', expected SSA or SSX",
                s
            ))),
        }
    }
}
