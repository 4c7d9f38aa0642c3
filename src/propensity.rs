//! Cumulative propensity tables and the closed set of reactions.

use crate::error::{Result, SimulationError};
use crate::graph::{EdgeRef, NodeId};
use serde::Serialize;
use std::fmt::Debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    EdgeDeletion,
    EdgeAddition,
    Transmission,
    Diagnosis,
    Death,
    Birth,
}

impl ReactionKind {
    /// Enumeration order used when a channel is picked.
    pub const ALL: [ReactionKind; 6] = [
        ReactionKind::EdgeDeletion,
        ReactionKind::EdgeAddition,
        ReactionKind::Transmission,
        ReactionKind::Diagnosis,
        ReactionKind::Death,
        ReactionKind::Birth,
    ];
    /// Channels simulated exactly by the hybrid driver.
    pub const SLOW: [ReactionKind; 4] = [
        ReactionKind::Transmission,
        ReactionKind::Diagnosis,
        ReactionKind::Death,
        ReactionKind::Birth,
    ];
    /// Channels approximated by tau-leaping.
    pub const FAST: [ReactionKind; 2] = [ReactionKind::EdgeDeletion, ReactionKind::EdgeAddition];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One concrete event, bound to the edge or node it acts on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reaction {
    EdgeDeletion(EdgeRef),
    EdgeAddition(EdgeRef),
    Transmission(EdgeRef),
    Diagnosis(NodeId),
    Death(NodeId),
    /// Carries probability mass but changes nothing.
    Birth,
}

impl Reaction {
    pub fn kind(&self) -> ReactionKind {
        match self {
            Reaction::EdgeDeletion(_) => ReactionKind::EdgeDeletion,
            Reaction::EdgeAddition(_) => ReactionKind::EdgeAddition,
            Reaction::Transmission(_) => ReactionKind::Transmission,
            Reaction::Diagnosis(_) => ReactionKind::Diagnosis,
            Reaction::Death(_) => ReactionKind::Death,
            Reaction::Birth => ReactionKind::Birth,
        }
    }
}

/// Ascending cumulative sums of event rates, starting with a `(0, None)` sentinel.
#[derive(Clone, Debug, PartialEq)]
pub struct CumulativeTable<R> {
    entries: Vec<(f64, Option<R>)>,
}

impl<R: Copy + Debug> Default for CumulativeTable<R> {
    fn default() -> Self {
        CumulativeTable::new()
    }
}

impl<R: Copy + Debug> CumulativeTable<R> {
    pub fn new() -> CumulativeTable<R> {
        CumulativeTable::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> CumulativeTable<R> {
        let mut entries = Vec::with_capacity(capacity + 1);
        entries.push((0., None));
        CumulativeTable { entries }
    }

    pub fn push(&mut self, rate: f64, item: R) {
        let total = self.total();
        self.entries.push((total + rate, Some(item)));
    }

    pub fn total(&self) -> f64 {
        self.entries.last().map_or(0., |(sum, _)| *sum)
    }

    /// Number of listed events (sentinel excluded).
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items(&self) -> impl Iterator<Item = R> + '_ {
        self.entries.iter().filter_map(|(_, item)| *item)
    }

    fn position(&self, bound: f64) -> Result<usize> {
        let idx = self.entries.partition_point(|(sum, _)| *sum < bound);
        if idx == 0 || idx >= self.entries.len() {
            return Err(SimulationError::inconsistency(format!(
                "no event for bound {} in a table of {} events with total {}",
                bound,
                self.len(),
                self.total()
            )));
        }
        Ok(idx)
    }

    /// First event whose cumulative rate reaches `bound`.
    pub fn select(&self, bound: f64) -> Result<R> {
        let idx = self.position(bound)?;
        self.entries[idx]
            .1
            .ok_or_else(|| SimulationError::inconsistency("selected the table sentinel"))
    }

    /// Like [`select`](Self::select) but removes the event and its rate, so the
    /// remaining events keep their own weights.
    pub fn take(&mut self, bound: f64) -> Result<R> {
        let idx = self.position(bound)?;
        let rate = self.entries[idx].0 - self.entries[idx - 1].0;
        let (_, item) = self.entries.remove(idx);
        for (sum, _) in self.entries[idx..].iter_mut() {
            *sum -= rate;
        }
        item.ok_or_else(|| SimulationError::inconsistency("selected the table sentinel"))
    }
}

/// Weighted choice over channels, visited in the order given.
/// Returns the channel and the bound relative to the start of that channel.
pub fn choose_channel(
    weights: &[(ReactionKind, f64)],
    bound: f64,
) -> Option<(ReactionKind, f64)> {
    let mut sum = 0.;
    for &(kind, weight) in weights {
        if weight > 0. && sum + weight >= bound {
            return Some((kind, (bound - sum).min(weight)));
        }
        sum += weight;
    }
    None
}

/// Tables of the network rewiring channels.
#[derive(Clone, Debug, PartialEq)]
pub struct FastTables {
    pub edge_deletion: CumulativeTable<EdgeRef>,
    pub edge_addition: CumulativeTable<EdgeRef>,
}

/// Tables of the epidemic channels.
#[derive(Clone, Debug, PartialEq)]
pub struct SlowTables {
    pub transmission: CumulativeTable<EdgeRef>,
    pub diagnosis: CumulativeTable<NodeId>,
    pub death: CumulativeTable<NodeId>,
    pub birth: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RateTables {
    pub fast: FastTables,
    pub slow: SlowTables,
}

impl FastTables {
    pub fn propensity(&self, kind: ReactionKind) -> f64 {
        match kind {
            ReactionKind::EdgeDeletion => self.edge_deletion.total(),
            ReactionKind::EdgeAddition => self.edge_addition.total(),
            _ => 0.,
        }
    }

    pub fn weights(&self) -> Vec<(ReactionKind, f64)> {
        ReactionKind::FAST
            .iter()
            .map(|&kind| (kind, self.propensity(kind)))
            .collect()
    }

    pub fn total(&self) -> f64 {
        self.edge_deletion.total() + self.edge_addition.total()
    }

    /// Number of listed events of a rewiring channel.
    pub fn count(&self, kind: ReactionKind) -> usize {
        match kind {
            ReactionKind::EdgeDeletion => self.edge_deletion.len(),
            ReactionKind::EdgeAddition => self.edge_addition.len(),
            _ => 0,
        }
    }

    pub fn resolve(&self, kind: ReactionKind, bound: f64) -> Result<Reaction> {
        match kind {
            ReactionKind::EdgeDeletion => Ok(Reaction::EdgeDeletion(self.edge_deletion.select(bound)?)),
            ReactionKind::EdgeAddition => Ok(Reaction::EdgeAddition(self.edge_addition.select(bound)?)),
            _ => Err(SimulationError::inconsistency(format!(
                "{:?} is not a rewiring channel",
                kind
            ))),
        }
    }
}

impl SlowTables {
    pub fn propensity(&self, kind: ReactionKind) -> f64 {
        match kind {
            ReactionKind::Transmission => self.transmission.total(),
            ReactionKind::Diagnosis => self.diagnosis.total(),
            ReactionKind::Death => self.death.total(),
            ReactionKind::Birth => self.birth,
            ReactionKind::EdgeDeletion | ReactionKind::EdgeAddition => 0.,
        }
    }

    pub fn weights(&self) -> Vec<(ReactionKind, f64)> {
        ReactionKind::SLOW
            .iter()
            .map(|&kind| (kind, self.propensity(kind)))
            .collect()
    }

    pub fn total(&self) -> f64 {
        ReactionKind::SLOW.iter().map(|&k| self.propensity(k)).sum()
    }

    pub fn resolve(&self, kind: ReactionKind, bound: f64) -> Result<Reaction> {
        Ok(match kind {
            ReactionKind::Transmission => Reaction::Transmission(self.transmission.select(bound)?),
            ReactionKind::Diagnosis => Reaction::Diagnosis(self.diagnosis.select(bound)?),
            ReactionKind::Death => Reaction::Death(self.death.select(bound)?),
            ReactionKind::Birth => Reaction::Birth,
            ReactionKind::EdgeDeletion | ReactionKind::EdgeAddition => {
                return Err(SimulationError::inconsistency(format!(
                    "{:?} is not an epidemic channel",
                    kind
                )))
            }
        })
    }
}

impl RateTables {
    pub fn propensity(&self, kind: ReactionKind) -> f64 {
        match kind {
            ReactionKind::EdgeDeletion => self.fast.edge_deletion.total(),
            ReactionKind::EdgeAddition => self.fast.edge_addition.total(),
            _ => self.slow.propensity(kind),
        }
    }

    pub fn weights(&self) -> Vec<(ReactionKind, f64)> {
        ReactionKind::ALL
            .iter()
            .map(|&kind| (kind, self.propensity(kind)))
            .collect()
    }

    pub fn total(&self) -> f64 {
        self.fast.total() + self.slow.total()
    }

    pub fn resolve(&self, kind: ReactionKind, bound: f64) -> Result<Reaction> {
        match kind {
            ReactionKind::EdgeDeletion | ReactionKind::EdgeAddition => {
                self.fast.resolve(kind, bound)
            }
            _ => self.slow.resolve(kind, bound),
        }
    }
}

/// Number of executed reactions per kind.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReactionCounts {
    pub edge_deletion: usize,
    pub edge_addition: usize,
    pub transmission: usize,
    pub diagnosis: usize,
    pub death: usize,
    pub birth: usize,
}

impl ReactionCounts {
    fn slot(&mut self, kind: ReactionKind) -> &mut usize {
        match kind {
            ReactionKind::EdgeDeletion => &mut self.edge_deletion,
            ReactionKind::EdgeAddition => &mut self.edge_addition,
            ReactionKind::Transmission => &mut self.transmission,
            ReactionKind::Diagnosis => &mut self.diagnosis,
            ReactionKind::Death => &mut self.death,
            ReactionKind::Birth => &mut self.birth,
        }
    }

    pub fn record(&mut self, kind: ReactionKind) {
        self.add(kind, 1);
    }

    pub fn add(&mut self, kind: ReactionKind, n: usize) {
        *self.slot(kind) += n;
    }

    pub fn get(&self, kind: ReactionKind) -> usize {
        match kind {
            ReactionKind::EdgeDeletion => self.edge_deletion,
            ReactionKind::EdgeAddition => self.edge_addition,
            ReactionKind::Transmission => self.transmission,
            ReactionKind::Diagnosis => self.diagnosis,
            ReactionKind::Death => self.death,
            ReactionKind::Birth => self.birth,
        }
    }

    pub fn total(&self) -> usize {
        ReactionKind::ALL.iter().map(|&k| self.get(k)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;

    #[test]
    fn empty_table_has_only_sentinel() {
        let table: CumulativeTable<NodeId> = CumulativeTable::new();
        assert_eq!(table.total(), 0.);
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert!(matches!(
            table.select(0.5),
            Err(SimulationError::Inconsistency(_))
        ));
    }

    #[test]
    fn select_first_reaching_bound() {
        let mut table = CumulativeTable::new();
        table.push(1.0, 10);
        table.push(0.0, 11);
        table.push(2.0, 12);
        assert_float_absolute_eq!(table.total(), 3.0);
        assert_eq!(table.select(0.3).unwrap(), 10);
        assert_eq!(table.select(1.0).unwrap(), 10);
        assert_eq!(table.select(1.0001).unwrap(), 12);
        assert_eq!(table.select(3.0).unwrap(), 12);
        assert!(table.select(3.5).is_err());
        assert!(table.select(0.).is_err());
    }

    #[test]
    fn take_removes_the_event() {
        let mut table = CumulativeTable::new();
        table.push(1.0, 'a');
        table.push(1.0, 'b');
        table.push(1.0, 'c');
        assert_eq!(table.take(1.5).unwrap(), 'b');
        assert_eq!(table.len(), 2);
        assert_eq!(table.items().collect::<Vec<_>>(), vec!['a', 'c']);
        assert_float_absolute_eq!(table.total(), 2.0);
        assert_eq!(table.take(1.9).unwrap(), 'c');
        assert_float_absolute_eq!(table.total(), 1.0);
    }

    #[test]
    fn take_keeps_remaining_weights() {
        let mut table = CumulativeTable::new();
        table.push(1.0, 'a');
        table.push(5.0, 'b');
        table.push(0.5, 'c');
        table.push(2.0, 'd');
        assert_eq!(table.take(3.0).unwrap(), 'b');
        assert_float_absolute_eq!(table.total(), 3.5);
        // 'c' owns (1, 1.5] and nothing more
        assert_eq!(table.select(1.2).unwrap(), 'c');
        assert_eq!(table.select(1.5).unwrap(), 'c');
        assert_eq!(table.select(1.6).unwrap(), 'd');
        assert!(table.select(3.6).is_err());
    }

    #[test]
    fn channel_choice_skips_empty_channels() {
        let weights = [
            (ReactionKind::EdgeDeletion, 0.),
            (ReactionKind::EdgeAddition, 2.),
            (ReactionKind::Transmission, 0.),
            (ReactionKind::Death, 1.),
        ];
        let (kind, local) = choose_channel(&weights, 0.5).unwrap();
        assert_eq!(kind, ReactionKind::EdgeAddition);
        assert_float_absolute_eq!(local, 0.5);
        let (kind, local) = choose_channel(&weights, 2.5).unwrap();
        assert_eq!(kind, ReactionKind::Death);
        assert_float_absolute_eq!(local, 0.5);
        assert!(choose_channel(&weights, 3.5).is_none());
    }
}
