//! Anderson's modified tau-leaping for the rewiring channels.
//!
//! Each channel keeps its integrated propensity `T`, its committed firing count `C`
//! and a history of `(threshold, count)` checkpoints ascending by threshold, whose
//! front is always `(T, C)`. A leap samples the firings up to `T + a * tau` from that
//! history: Poisson beyond the last checkpoint, Binomial between two of them. A
//! rejected leap only stores its sample as a new checkpoint, the network is
//! touched on acceptance only.

use crate::error::{Result, SimulationError};
use crate::graph::ContactGraph;
use crate::network::ContactNetwork;
use crate::propensity::{choose_channel, FastTables, Reaction, ReactionKind};
use crate::ssa::{search_bound, waiting_time};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Binomial, Distribution, Poisson};
use serde::Serialize;
use std::collections::VecDeque;
use std::ops::AddAssign;
use tracing::{debug, trace};

/// Relative change tolerance.
const EPSILON: f64 = 0.03;
/// Step factor after a rejected leap.
const REJECT_FACTOR: f64 = 0.75;
/// Step factor after an accepted leap that only passed the loose check.
const SHRINK_FACTOR: f64 = 0.9;
const SMALL_TAU_EXPONENT: f64 = 0.98;
const LARGE_TAU_EXPONENT: f64 = 1.02;
/// Share of the tolerance an accepted leap must stay within to grow the step.
const TIGHT_FRACTION: f64 = 0.75;
/// Leaps shorter than this many mean waiting times run exact steps instead.
const FALLBACK_THRESHOLD: f64 = 10.;
const FALLBACK_STEPS: usize = 100;

const CHANNELS: [ReactionKind; 2] = ReactionKind::FAST;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct LeapStats {
    pub accepted: usize,
    pub rejected: usize,
    pub fallback_steps: usize,
    /// Edge toggles committed by accepted leaps.
    pub firings: usize,
}

impl AddAssign<&LeapStats> for LeapStats {
    fn add_assign(&mut self, rhs: &LeapStats) {
        self.accepted += rhs.accepted;
        self.rejected += rhs.rejected;
        self.fallback_steps += rhs.fallback_steps;
        self.firings += rhs.firings;
    }
}

#[derive(Clone, Debug, PartialEq)]
struct ChannelHistory {
    integrated: f64,
    fired: usize,
    checkpoints: VecDeque<(f64, usize)>,
}

impl ChannelHistory {
    fn new() -> ChannelHistory {
        ChannelHistory {
            integrated: 0.,
            fired: 0,
            checkpoints: VecDeque::from([(0., 0)]),
        }
    }

    /// Firings in `(T, target]` and the index of the last checkpoint not above `target`.
    fn sample<R: Rng>(&self, target: f64, rng: &mut R) -> Result<(usize, usize)> {
        let last_row = self.checkpoints.len() - 1;
        let &(last_threshold, last_count) = self
            .checkpoints
            .back()
            .ok_or_else(|| SimulationError::inconsistency("empty leap history"))?;

        let (reached, row) = if target >= last_threshold {
            let mean = target - last_threshold;
            let extra = if mean > 0. {
                let poisson = Poisson::new(mean).map_err(|e| {
                    SimulationError::inconsistency(format!("poisson mean {}: {}", mean, e))
                })?;
                poisson.sample(rng) as usize
            } else {
                0
            };
            (last_count + extra, last_row)
        } else {
            let idx = self.checkpoints.partition_point(|(thr, _)| *thr <= target);
            if idx == 0 || idx > last_row {
                return Err(SimulationError::inconsistency(format!(
                    "no checkpoint brackets {} in {:?}",
                    target, self.checkpoints
                )));
            }
            let (lo_thr, lo_count) = self.checkpoints[idx - 1];
            let (hi_thr, hi_count) = self.checkpoints[idx];
            let ratio = ((target - lo_thr) / (hi_thr - lo_thr)).clamp(0., 1.);
            let trials = hi_count.checked_sub(lo_count).ok_or_else(|| {
                SimulationError::inconsistency(format!(
                    "leap history counts decrease: {:?}",
                    self.checkpoints
                ))
            })?;
            let binomial = Binomial::new(trials as u64, ratio).map_err(|e| {
                SimulationError::inconsistency(format!("binomial({}, {}): {}", trials, ratio, e))
            })?;
            (lo_count + binomial.sample(rng) as usize, idx - 1)
        };

        let change = reached.checked_sub(self.fired).ok_or_else(|| {
            SimulationError::inconsistency(format!(
                "checkpoint count {} below committed count {}",
                reached, self.fired
            ))
        })?;
        Ok((change, row))
    }

    fn accept(&mut self, increment: f64, change: usize, row: usize) {
        self.integrated += increment;
        self.fired += change;
        self.checkpoints.drain(..=row);
        self.checkpoints.push_front((self.integrated, self.fired));
    }

    fn reject(&mut self, target: f64, change: usize, row: usize) {
        self.checkpoints.insert(row + 1, (target, self.fired + change));
    }

    /// Commits one exact step of length with integrated propensity `increment`.
    fn exact_step(&mut self, increment: f64, fired: bool) {
        self.integrated += increment;
        if fired {
            self.fired += 1;
        }
        let (integrated, count) = (self.integrated, self.fired);
        self.checkpoints
            .retain(|&(thr, c)| thr > integrated && c >= count);
        self.checkpoints.push_front((integrated, count));
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LeapOutcome {
    /// Firings per rewiring channel (deletion, addition) have been applied.
    Accepted { changes: [usize; 2], next_tau: f64 },
    Rejected { next_tau: f64 },
}

/// Leap size proposal from the mean drift and variance of both edge counts.
pub fn proposed_tau(tables: &FastTables) -> f64 {
    let deletion = tables.edge_deletion.total();
    let addition = tables.edge_addition.total();
    let drift = (addition - deletion).abs();
    let variance = deletion + addition;

    CHANNELS
        .iter()
        .map(|&kind| (EPSILON * tables.count(kind) as f64).max(1.))
        .flat_map(|allowed| [allowed / drift, allowed * allowed / variance])
        .fold(f64::INFINITY, f64::min)
}

fn within_tolerance(changes: &[usize; 2], counts: &[usize; 2], fraction: f64) -> bool {
    changes
        .iter()
        .zip(counts)
        .all(|(&change, &count)| change as f64 <= (fraction * EPSILON * count as f64).max(1.))
}

#[derive(Clone, Debug, PartialEq)]
pub struct AndersonTauLeap {
    channels: [ChannelHistory; 2],
    stats: LeapStats,
}

impl Default for AndersonTauLeap {
    fn default() -> Self {
        AndersonTauLeap::new()
    }
}

impl AndersonTauLeap {
    pub fn new() -> AndersonTauLeap {
        AndersonTauLeap {
            channels: [ChannelHistory::new(), ChannelHistory::new()],
            stats: LeapStats::default(),
        }
    }

    /// Totals over every call since construction.
    pub fn stats(&self) -> &LeapStats {
        &self.stats
    }

    /// Number of stored checkpoints per channel.
    pub fn history_len(&self) -> [usize; 2] {
        [
            self.channels[0].checkpoints.len(),
            self.channels[1].checkpoints.len(),
        ]
    }

    fn reset_history(&mut self) {
        self.channels = [ChannelHistory::new(), ChannelHistory::new()];
    }

    /// Brings the network rewiring from time `from` to time `to`.
    pub fn advance<G: ContactGraph, R: Rng>(
        &mut self,
        network: &mut ContactNetwork<G>,
        from: f64,
        to: f64,
        rng: &mut R,
    ) -> Result<()> {
        self.reset_history();
        let mut t = from;
        let mut tables = network.fast_tables();
        let mut tau = proposed_tau(&tables);

        while t < to {
            let total = tables.total();
            if total <= 0. {
                break;
            }
            tau = tau.min(to - t);

            if tau < FALLBACK_THRESHOLD / total {
                t = self.exact_steps(network, t, to, rng)?;
                tables = network.fast_tables();
                tau = proposed_tau(&tables);
                continue;
            }

            match self.try_leap(network, &mut tables, tau, rng)? {
                LeapOutcome::Accepted { next_tau, .. } => {
                    t = (t + tau).min(to);
                    tau = next_tau;
                }
                LeapOutcome::Rejected { next_tau } => tau = next_tau,
            }
        }
        Ok(())
    }

    /// One leap of size `tau`. `tables` must describe the current network and
    /// are rebuilt after an accepted leap.
    pub fn try_leap<G: ContactGraph, R: Rng>(
        &mut self,
        network: &mut ContactNetwork<G>,
        tables: &mut FastTables,
        tau: f64,
        rng: &mut R,
    ) -> Result<LeapOutcome> {
        let increments = CHANNELS.map(|kind| tables.propensity(kind) * tau);
        let counts = CHANNELS.map(|kind| tables.count(kind));

        let mut changes = [0; 2];
        let mut rows = [0; 2];
        for (i, history) in self.channels.iter().enumerate() {
            let (change, row) = history.sample(history.integrated + increments[i], rng)?;
            changes[i] = change;
            rows[i] = row;
        }

        if !within_tolerance(&changes, &counts, 1.) {
            for (i, history) in self.channels.iter_mut().enumerate() {
                let target = history.integrated + increments[i];
                history.reject(target, changes[i], rows[i]);
            }
            self.stats.rejected += 1;
            debug!(tau, ?changes, ?counts, "leap rejected");
            return Ok(LeapOutcome::Rejected {
                next_tau: tau * REJECT_FACTOR,
            });
        }

        for (i, history) in self.channels.iter_mut().enumerate() {
            history.accept(increments[i], changes[i], rows[i]);
        }
        let next_tau = if within_tolerance(&changes, &counts, TIGHT_FRACTION) {
            if tau <= 1. {
                tau.powf(SMALL_TAU_EXPONENT)
            } else {
                tau.powf(LARGE_TAU_EXPONENT)
            }
        } else {
            tau * SHRINK_FACTOR
        };

        self.fire(network, tables, changes, rng)?;
        *tables = network.fast_tables();
        self.stats.accepted += 1;
        debug!(tau, ?changes, "leap accepted");
        Ok(LeapOutcome::Accepted { changes, next_tau })
    }

    /// Applies the sampled firings in random order, each drawn from the live tables.
    fn fire<G: ContactGraph, R: Rng>(
        &mut self,
        network: &mut ContactNetwork<G>,
        tables: &mut FastTables,
        changes: [usize; 2],
        rng: &mut R,
    ) -> Result<()> {
        let mut order: Vec<ReactionKind> = CHANNELS
            .iter()
            .zip(changes)
            .flat_map(|(&kind, n)| std::iter::repeat(kind).take(n))
            .collect();
        order.shuffle(rng);

        for kind in order {
            match kind {
                ReactionKind::EdgeDeletion => {
                    let bound = search_bound(tables.edge_deletion.total(), rng);
                    let edge = tables.edge_deletion.take(bound)?;
                    network.remove_edge(edge)?;
                    let rate = network.edge_addition_rate(edge);
                    if rate > 0. {
                        tables.edge_addition.push(rate, edge);
                    }
                }
                ReactionKind::EdgeAddition => {
                    let bound = search_bound(tables.edge_addition.total(), rng);
                    let edge = tables.edge_addition.take(bound)?;
                    network.add_edge(edge)?;
                    let rate = network.edge_deletion_rate(edge);
                    if rate > 0. {
                        tables.edge_deletion.push(rate, edge);
                    }
                }
                other => {
                    return Err(SimulationError::inconsistency(format!(
                        "{:?} fired inside a leap",
                        other
                    )))
                }
            }
            self.stats.firings += 1;
        }
        Ok(())
    }

    /// Up to [`FALLBACK_STEPS`] exact rewiring steps. Returns the time reached.
    fn exact_steps<G: ContactGraph, R: Rng>(
        &mut self,
        network: &mut ContactNetwork<G>,
        mut t: f64,
        to: f64,
        rng: &mut R,
    ) -> Result<f64> {
        for _ in 0..FALLBACK_STEPS {
            let tables = network.fast_tables();
            let weights = tables.weights();
            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            if total <= 0. {
                return Ok(to);
            }
            let timestep = waiting_time(total, rng)?;
            if t + timestep > to {
                return Ok(to);
            }
            t += timestep;

            let bound = search_bound(total, rng);
            let (kind, local) = choose_channel(&weights, bound).ok_or_else(|| {
                SimulationError::inconsistency(format!(
                    "no rewiring channel for bound {} of total {}",
                    bound, total
                ))
            })?;
            let reaction = tables.resolve(kind, local)?;
            trace!(?reaction, t, "exact rewiring step");
            match reaction {
                Reaction::EdgeDeletion(e) => network.remove_edge(e)?,
                Reaction::EdgeAddition(e) => network.add_edge(e)?,
                other => {
                    return Err(SimulationError::inconsistency(format!(
                        "{:?} drawn from the rewiring tables",
                        other
                    )))
                }
            }

            for (i, history) in self.channels.iter_mut().enumerate() {
                let (channel, weight) = weights[i];
                history.exact_step(weight * timestep, channel == kind);
            }
            self.stats.fallback_steps += 1;
        }
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ReactionRates;
    use crate::specie::{EpidemicState, Specie};
    use assert_float_eq::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn rewiring_network(n: usize, new_rate: f64, loose_rate: f64) -> ContactNetwork {
        let population = (0..n)
            .map(|_| Specie::new(n - 1, EpidemicState::Susceptible, 0., new_rate, loose_rate, 0.))
            .collect();
        let rates = ReactionRates {
            transmission: 0.,
            diagnosis: 0.,
            birth: 0.,
            death: [0.; 3],
        };
        let edges: Vec<_> = (1..n).map(|v| (0, v)).collect();
        ContactNetwork::from_population(population, &edges, rates).unwrap()
    }

    #[test]
    fn tau_proposal() {
        let nw = rewiring_network(30, 1., 1.);
        let tables = nw.fast_tables();
        // 29 edges with rate 1 and 406 pairs with rate 1; both allowances are 1 or above
        let allowed_del = (EPSILON * 29.).max(1.);
        let allowed_add = EPSILON * 406.;
        let expected = (allowed_del / 377.)
            .min(allowed_del * allowed_del / 435.)
            .min(allowed_add / 377.)
            .min(allowed_add * allowed_add / 435.);
        assert_float_relative_eq!(proposed_tau(&tables), expected);
    }

    #[test]
    fn history_bookkeeping() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut history = ChannelHistory::new();
        history.reject(4., 6, 0);
        assert_eq!(history.checkpoints, VecDeque::from([(0., 0), (4., 6)]));
        // between the two checkpoints at most 6 firings are possible
        for _ in 0..20 {
            let (change, row) = history.sample(2., &mut rng).unwrap();
            assert!(change <= 6);
            assert_eq!(row, 0);
        }
        // beyond the last one at least the recorded 6 happened
        let (change, row) = history.sample(5., &mut rng).unwrap();
        assert!(change >= 6);
        assert_eq!(row, 1);

        history.accept(2., 3, 0);
        assert_eq!(history.checkpoints, VecDeque::from([(2., 3), (4., 6)]));
        let (change, _) = history.sample(4., &mut rng).unwrap();
        assert_eq!(change, 3);

        history.exact_step(3., true);
        assert_eq!(history.checkpoints, VecDeque::from([(5., 4)]));
    }

    #[test]
    fn rejected_leap_keeps_network() {
        let mut nw = rewiring_network(40, 2., 2.);
        let before = nw.clone();
        let mut tables = nw.fast_tables();
        let mut engine = AndersonTauLeap::new();
        let mut rng = SmallRng::seed_from_u64(11);
        // far too long a leap for a 3% tolerance
        let outcome = engine.try_leap(&mut nw, &mut tables, 10., &mut rng).unwrap();
        assert_eq!(outcome, LeapOutcome::Rejected { next_tau: 7.5 });
        assert_eq!(nw, before);
        assert_eq!(tables, before.fast_tables());
        assert_eq!(engine.history_len(), [2, 2]);
        assert_eq!(engine.stats().rejected, 1);
    }

    #[test]
    fn accepted_leap_applies_sampled_changes() {
        let mut nw = rewiring_network(60, 0.5, 0.5);
        let mut tables = nw.fast_tables();
        let mut engine = AndersonTauLeap::new();
        let mut rng = SmallRng::seed_from_u64(5);
        let edges = nw.count_edges();
        let mut tau = proposed_tau(&tables);
        loop {
            match engine.try_leap(&mut nw, &mut tables, tau, &mut rng).unwrap() {
                LeapOutcome::Accepted { changes, .. } => {
                    assert_eq!(nw.count_edges() + changes[0], edges + changes[1]);
                    break;
                }
                LeapOutcome::Rejected { next_tau } => tau = next_tau,
            }
        }
        assert_eq!(tables, nw.fast_tables());
        nw.check_invariants().unwrap();
    }

    #[test]
    fn advance_keeps_invariants() {
        let mut nw = rewiring_network(50, 0.3, 0.6);
        let mut engine = AndersonTauLeap::new();
        let mut rng = SmallRng::seed_from_u64(17);
        engine.advance(&mut nw, 0., 2., &mut rng).unwrap();
        nw.check_invariants().unwrap();
        let stats = engine.stats();
        assert!(stats.accepted + stats.fallback_steps > 0);
    }

    #[test]
    fn short_leaps_fall_back_to_exact_steps() {
        // every pair rewires at rate 1, so the total stays at 10 while the
        // proposal never exceeds 1 / 10, well below 10 mean waiting times
        let mut nw = rewiring_network(5, 1., 1.);
        let tables = nw.fast_tables();
        assert_float_absolute_eq!(tables.total(), 10.);
        assert!(proposed_tau(&tables) < FALLBACK_THRESHOLD / tables.total());

        let mut engine = AndersonTauLeap::new();
        let mut rng = SmallRng::seed_from_u64(23);
        engine.advance(&mut nw, 0., 5., &mut rng).unwrap();
        let stats = engine.stats();
        assert!(stats.fallback_steps > 0);
        assert_eq!(stats.accepted, 0);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.firings, 0);
        nw.check_invariants().unwrap();
    }

    /// Stores a checkpoint exactly at the leap target, so the next leap of
    /// length `tau` samples `changes` without randomness.
    fn pin_changes(
        engine: &mut AndersonTauLeap,
        tables: &FastTables,
        tau: f64,
        changes: [usize; 2],
    ) {
        for (i, &kind) in CHANNELS.iter().enumerate() {
            let history = &mut engine.channels[i];
            let target = history.integrated + tables.propensity(kind) * tau;
            history.reject(target, changes[i], 0);
        }
    }

    fn leap_with(tau: f64, changes: [usize; 2]) -> LeapOutcome {
        // 40 edges and 780 free pairs
        let mut nw = rewiring_network(41, 1., 1.);
        let mut tables = nw.fast_tables();
        let mut engine = AndersonTauLeap::new();
        let mut rng = SmallRng::seed_from_u64(29);
        pin_changes(&mut engine, &tables, tau, changes);
        let outcome = engine.try_leap(&mut nw, &mut tables, tau, &mut rng).unwrap();
        nw.check_invariants().unwrap();
        outcome
    }

    #[test]
    fn step_control_after_leap() {
        // tight allowance is max(0.75 * 0.03 * count, 1): 1 deletion, 17.55 additions
        assert_eq!(
            leap_with(0.5, [1, 10]),
            LeapOutcome::Accepted {
                changes: [1, 10],
                next_tau: 0.5f64.powf(0.98)
            }
        );
        assert_eq!(
            leap_with(2., [0, 17]),
            LeapOutcome::Accepted {
                changes: [0, 17],
                next_tau: 2f64.powf(1.02)
            }
        );
        // within 0.03 * 780 but not within the tight share
        assert_eq!(
            leap_with(0.5, [0, 20]),
            LeapOutcome::Accepted {
                changes: [0, 20],
                next_tau: 0.5 * 0.9
            }
        );
        // 2 deletions exceed max(0.03 * 40, 1)
        assert_eq!(leap_with(0.5, [2, 0]), LeapOutcome::Rejected { next_tau: 0.375 });
    }

    #[test]
    fn frozen_network_is_untouched() {
        let mut nw = rewiring_network(5, 0., 0.);
        let before = nw.clone();
        let mut engine = AndersonTauLeap::new();
        let mut rng = SmallRng::seed_from_u64(1);
        engine.advance(&mut nw, 0., 10., &mut rng).unwrap();
        assert_eq!(nw, before);
        assert_eq!(engine.stats(), &LeapStats::default());
    }
}
