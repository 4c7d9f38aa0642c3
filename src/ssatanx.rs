//! SSATAN-X: exact thinning for the epidemic channels, tau-leaping for rewiring.

use crate::error::{Result, SimulationError};
use crate::graph::{AdjacencyGraph, ContactGraph};
use crate::network::ContactNetwork;
use crate::propensity::{choose_channel, Reaction, ReactionCounts, SlowTables};
use crate::snapshot::{new_storage, record, NetworkStorage};
use crate::specie::EpidemicState;
use crate::ssa::{search_bound, set_progress, waiting_time, StepRunResult};
use crate::tau_leap::{AndersonTauLeap, LeapStats};
use indicatif::ProgressBar;
use rand::Rng;
use serde::Serialize;
use tracing::{info, trace, warn};

/// Ceiling of the epidemic propensity over a look-ahead window.
pub trait PropensityBound {
    fn upper_bound<G: ContactGraph>(
        &self,
        network: &ContactNetwork<G>,
        look_ahead: f64,
        slow: &SlowTables,
    ) -> Result<f64>;
}

/// Transmission bound from the projected contact growth of each state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnalyticBound;

/// Every S node in contact with every I and D node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NaiveBound;

fn untouched_rates(slow: &SlowTables) -> f64 {
    // diagnosis, death and birth only change through epidemic reactions
    slow.diagnosis.total() + slow.death.total() + slow.birth
}

impl PropensityBound for NaiveBound {
    fn upper_bound<G: ContactGraph>(
        &self,
        network: &ContactNetwork<G>,
        _look_ahead: f64,
        slow: &SlowTables,
    ) -> Result<f64> {
        let rate = network.transmission_rate_limit();
        let infected = network.count_by_state(EpidemicState::Infected) as f64;
        let diagnosed = network.count_by_state(EpidemicState::Diagnosed) as f64;
        let susceptible = network.count_by_state(EpidemicState::Susceptible) as f64;
        Ok((infected * rate + diagnosed * rate * 0.5) * susceptible + untouched_rates(slow))
    }
}

impl PropensityBound for AnalyticBound {
    fn upper_bound<G: ContactGraph>(
        &self,
        network: &ContactNetwork<G>,
        look_ahead: f64,
        slow: &SlowTables,
    ) -> Result<f64> {
        let rate = network.transmission_rate_limit();
        let infected = network.count_by_state(EpidemicState::Infected) as f64;
        let diagnosed = network.count_by_state(EpidemicState::Diagnosed) as f64;
        let susceptible = network.count_by_state(EpidemicState::Susceptible) as f64;

        let max_infected = network
            .max_contacts_limit_by_state(EpidemicState::Infected, look_ahead)?
            .min(susceptible * infected);
        let max_diagnosed = network
            .max_contacts_limit_by_state(EpidemicState::Diagnosed, look_ahead)?
            .min(susceptible * diagnosed);
        let max_susceptible = network
            .max_contacts_limit_by_state(EpidemicState::Susceptible, look_ahead)?
            .min(susceptible * (infected + diagnosed));

        // S contacts are spent on I partners first, those carry the full rate
        let by_growth = if max_infected + max_diagnosed <= max_susceptible {
            max_infected * rate + max_diagnosed * rate * 0.5
        } else if max_susceptible <= max_infected {
            max_susceptible * rate
        } else {
            max_infected * rate + (max_susceptible - max_infected) * rate * 0.5
        };
        let by_population = (infected * rate + diagnosed * rate * 0.5) * susceptible;

        let pairs = (infected + diagnosed) * susceptible;
        let transmission = if (max_infected + max_diagnosed).min(max_susceptible) < pairs {
            by_growth
        } else {
            by_population
        };
        Ok(transmission + untouched_rates(slow))
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct HybridCounters {
    /// Candidate reactions that passed the thinning test.
    pub accepted: usize,
    /// Candidate times beyond the look-ahead window.
    pub rejected: usize,
    /// Candidate reactions discarded by thinning.
    pub thinned: usize,
    pub leaps: LeapStats,
}

#[derive(Clone, Debug)]
pub struct Ssatanx<G: ContactGraph = AdjacencyGraph, B: PropensityBound = AnalyticBound> {
    network: ContactNetwork<G>,
    bound: B,
    tau_leap: AndersonTauLeap,
    start_time: f64,
    time: f64,
    end_time: f64,
    network_last_update: f64,
    storage: NetworkStorage,
    record_snapshots: bool,
    counts: ReactionCounts,
    counters: HybridCounters,
    stepnumber: usize,
}

impl<G: ContactGraph> Ssatanx<G, AnalyticBound> {
    pub fn new(network: ContactNetwork<G>, start_time: f64, end_time: f64) -> Ssatanx<G> {
        Ssatanx::with_bound(network, start_time, end_time, AnalyticBound)
    }
}

impl<G: ContactGraph, B: PropensityBound> Ssatanx<G, B> {
    pub fn with_bound(
        network: ContactNetwork<G>,
        start_time: f64,
        end_time: f64,
        bound: B,
    ) -> Ssatanx<G, B> {
        let mut driver = Ssatanx {
            network,
            bound,
            tau_leap: AndersonTauLeap::new(),
            start_time,
            time: start_time,
            end_time,
            network_last_update: start_time,
            storage: new_storage(),
            record_snapshots: true,
            counts: ReactionCounts::default(),
            counters: HybridCounters::default(),
            stepnumber: 0,
        };
        driver.snapshot();
        driver
    }

    pub fn without_snapshots(mut self) -> Ssatanx<G, B> {
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

    pub fn counters(&self) -> HybridCounters {
        HybridCounters {
            leaps: self.tau_leap.stats().clone(),
            ..self.counters.clone()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.end_time
    }

    pub fn into_parts(self) -> (ContactNetwork<G>, NetworkStorage, ReactionCounts, HybridCounters) {
        let counters = self.counters();
        (self.network, self.storage, self.counts, counters)
    }

    fn snapshot(&mut self) {
        if self.record_snapshots {
            record(&mut self.storage, self.time, &self.network);
        }
    }

    /// Lets the rewiring process catch up with `time`.
    fn catch_up<R: Rng>(&mut self, time: f64, rng: &mut R) -> Result<()> {
        self.tau_leap
            .advance(&mut self.network, self.network_last_update, time, rng)?;
        self.network_last_update = time;
        Ok(())
    }

    fn terminate<R: Rng>(&mut self, rng: &mut R) -> Result<StepRunResult> {
        self.catch_up(self.end_time, rng)?;
        self.time = self.end_time;
        self.snapshot();
        Ok(StepRunResult::NoStep)
    }

    /// One outer step: a thinned candidate, a window rejection or one epidemic reaction.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<StepRunResult> {
        if self.is_finished() {
            return Ok(StepRunResult::NoStep);
        }
        self.stepnumber += 1;

        let look_ahead = self.end_time - self.time;
        let slow = self.network.slow_tables();
        let limit = self.bound.upper_bound(&self.network, look_ahead, &slow)?;
        if limit <= 0. {
            return self.terminate(rng);
        }

        let proposed = waiting_time(limit, rng)?;
        if proposed > look_ahead {
            self.counters.rejected += 1;
            return self.terminate(rng);
        }

        self.time += proposed;
        self.catch_up(self.time, rng)?;

        let slow = self.network.slow_tables();
        let weights = slow.weights();
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total > limit {
            warn!(total, limit, time = self.time, "propensity above its bound");
        }

        let bound = search_bound(limit, rng);
        if total < bound {
            self.counters.thinned += 1;
            return Ok(StepRunResult::NoStep);
        }
        self.counters.accepted += 1;

        let (kind, local) = choose_channel(&weights, bound).ok_or_else(|| {
            SimulationError::inconsistency(format!(
                "no epidemic channel for bound {} of total {}",
                bound, total
            ))
        })?;
        let reaction = slow.resolve(kind, local)?;
        self.network.execute(reaction, self.time)?;
        if let Reaction::Diagnosis(_) = reaction {
            self.network_last_update = self.time;
        }
        self.counts.record(kind);
        self.snapshot();
        Ok(StepRunResult::Step { reaction })
    }

    pub fn run<R: Rng>(&mut self, rng: &mut R, pb: &ProgressBar) -> Result<()> {
        info!(
            nodes = self.network.size(),
            edges = self.network.count_edges(),
            end_time = self.end_time,
            "starting SSATAN-X"
        );
        while !self.is_finished() {
            if let StepRunResult::Step { reaction } = self.step(rng)? {
                trace!(?reaction, time = self.time, "fired");
            }
            if self.stepnumber % 100 == 0 {
                set_progress(pb, self.time, self.start_time, self.end_time);
            }
        }
        set_progress(pb, self.time, self.start_time, self.end_time);

        let counters = self.counters();
        info!(
            accepted = counters.accepted,
            rejected = counters.rejected,
            thinned = counters.thinned,
            leaps = counters.leaps.accepted,
            rejected_leaps = counters.leaps.rejected,
            fallback_steps = counters.leaps.fallback_steps,
            "SSATAN-X finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ReactionRates;
    use crate::specie::Specie;
    use assert_float_eq::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn rates() -> ReactionRates {
        ReactionRates {
            transmission: 1.,
            diagnosis: 0.2,
            birth: 0.,
            death: [0.; 3],
        }
    }

    fn mixed_network(edges: &[(usize, usize)], new_rate: f64, loose_rate: f64) -> ContactNetwork {
        use EpidemicState::*;
        let r = rates();
        let population = [Susceptible, Susceptible, Susceptible, Infected, Diagnosed]
            .into_iter()
            .map(|st| {
                let diagnosis = if st == Infected { r.diagnosis } else { 0. };
                Specie::new(4, st, 0., new_rate, loose_rate, diagnosis)
            })
            .collect();
        ContactNetwork::from_population(population, edges, r).unwrap()
    }

    #[test]
    fn naive_bound_counts_all_pairs() {
        let nw = mixed_network(&[(0, 3)], 0.5, 0.5);
        let slow = nw.slow_tables();
        let limit = NaiveBound.upper_bound(&nw, 1., &slow).unwrap();
        // (1 * 1 + 1 * 0.5) * 3 plus one diagnosis
        assert_float_absolute_eq!(limit, 4.5 + 0.2);
    }

    #[test]
    fn frozen_contacts_give_exact_transmission_bound() {
        let nw = mixed_network(&[(0, 3), (1, 4)], 0., 0.);
        let slow = nw.slow_tables();
        let analytic = AnalyticBound.upper_bound(&nw, 10., &slow).unwrap();
        let naive = NaiveBound.upper_bound(&nw, 10., &slow).unwrap();
        assert_float_absolute_eq!(analytic, slow.total());
        assert!(analytic <= naive);
    }

    #[test]
    fn bounds_dominate_true_propensity() {
        let nw = mixed_network(&[(0, 3), (1, 3), (2, 4)], 0.7, 0.2);
        let slow = nw.slow_tables();
        for look_ahead in [0.01, 0.5, 5., 50.] {
            let analytic = AnalyticBound.upper_bound(&nw, look_ahead, &slow).unwrap();
            assert!(analytic >= slow.total());
            assert!(analytic <= NaiveBound.upper_bound(&nw, look_ahead, &slow).unwrap() + 1e-9);
        }
    }

    #[test]
    fn no_epidemic_means_no_step() {
        let population = (0..3)
            .map(|_| Specie::new(2, EpidemicState::Susceptible, 0., 1., 1., 0.))
            .collect();
        let healthy: ContactNetwork =
            ContactNetwork::from_population(population, &[], rates()).unwrap();
        let mut rng = SmallRng::seed_from_u64(2);
        let mut driver = Ssatanx::new(healthy, 0., 4.);
        assert_eq!(driver.step(&mut rng).unwrap(), StepRunResult::NoStep);
        assert_eq!(driver.time(), 4.);
        assert_eq!(driver.storage().len(), 2);
        driver.network().check_invariants().unwrap();
    }

    #[test]
    fn run_reaches_end_time() {
        let nw = mixed_network(&[(0, 3), (1, 3), (2, 4)], 0.7, 0.4);
        let mut rng = SmallRng::seed_from_u64(8);
        let mut driver = Ssatanx::new(nw, 0., 5.);
        let mut last = driver.time();
        while !driver.is_finished() {
            driver.step(&mut rng).unwrap();
            assert!(driver.time() >= last);
            assert!(driver.time() <= 5.);
            last = driver.time();
        }
        let counters = driver.counters();
        assert_eq!(driver.counts().total(), counters.accepted);
        assert_eq!(driver.storage().len(), counters.accepted + 2);
        driver.network().check_invariants().unwrap();
    }
}
