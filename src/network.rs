//! The contact network: population, contacts and all reaction rates.

use crate::config::Settings;
use crate::error::{Result, SimulationError};
use crate::graph::{AdjacencyGraph, ContactGraph, EdgeRef, NodeId};
use crate::propensity::{CumulativeTable, FastTables, RateTables, Reaction, SlowTables};
use crate::snapshot::SpecieState;
use crate::specie::{EpidemicState, Specie};
use rand::distributions::Uniform;
use rand::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::trace;

/// Diagnosed individuals keep this share of their new contact rate.
const DIAGNOSED_CONTACT_FACTOR: f64 = 0.3;
/// Transmission over an S-D contact relative to an S-I contact.
const DIAGNOSED_TRANSMISSION_FACTOR: f64 = 0.5;
/// Standard deviations added to the expected contact count.
const CONTACT_SIGMAS: f64 = 3.;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReactionRates {
    pub transmission: f64,
    pub diagnosis: f64,
    pub birth: f64,
    /// Indexed by [`EpidemicState`].
    pub death: [f64; 3],
}

impl ReactionRates {
    pub fn from_settings(settings: &Settings) -> ReactionRates {
        ReactionRates {
            transmission: settings.transmission_rate,
            diagnosis: settings.diagnosis_rate,
            birth: settings.birth_rate,
            death: EpidemicState::ALL.map(|st| settings.death_rate(st)),
        }
    }

    pub fn death(&self, state: EpidemicState) -> f64 {
        self.death[state as usize]
    }

    fn between(&self, a: EpidemicState, b: EpidemicState) -> f64 {
        use EpidemicState::*;
        match (a, b) {
            (Susceptible, Infected) | (Infected, Susceptible) => self.transmission,
            (Susceptible, Diagnosed) | (Diagnosed, Susceptible) => {
                self.transmission * DIAGNOSED_TRANSMISSION_FACTOR
            }
            _ => 0.,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContactNetwork<G: ContactGraph = AdjacencyGraph> {
    graph: G,
    population: Vec<Specie>,
    transmission_rates: HashMap<EdgeRef, f64>,
    rates: ReactionRates,
}

impl<G: ContactGraph> ContactNetwork<G> {
    /// Population and initial contacts as described by `settings`.
    pub fn new<R: Rng>(settings: &Settings, rng: &mut R) -> Result<ContactNetwork<G>> {
        settings.validate()?;
        let n = settings.population();
        let rates = ReactionRates::from_settings(settings);
        let loose = Uniform::new_inclusive(
            settings.loose_contact_rate.low(),
            settings.loose_contact_rate.high(),
        );
        let new = Uniform::new_inclusive(
            settings.new_contact_rate.low(),
            settings.new_contact_rate.high(),
        );

        let mut population = Vec::with_capacity(n);
        for state in EpidemicState::ALL {
            for _ in 0..settings.amount(state) {
                let loose_rate = loose.sample(rng);
                let mut new_rate = new.sample(rng);
                if state == EpidemicState::Diagnosed {
                    new_rate *= DIAGNOSED_CONTACT_FACTOR;
                }
                let diagnosis = match state {
                    EpidemicState::Infected => rates.diagnosis,
                    _ => 0.,
                };
                population.push(Specie::new(
                    n.saturating_sub(1),
                    state,
                    rates.death(state),
                    new_rate,
                    loose_rate,
                    diagnosis,
                ));
            }
        }

        let mut network = Self::from_population(population, &[], rates)?;
        let mut candidates: Vec<EdgeRef> = network.graph.complement_edges().collect();
        candidates.shuffle(rng);
        for edge in candidates.into_iter().take(settings.initial_edges) {
            if network.edge_addition_rate(edge) > 0. {
                network.add_edge(edge)?;
            }
        }
        Ok(network)
    }

    /// Network over an explicit population; node ids are the vector indices.
    pub fn from_population(
        population: Vec<Specie>,
        edges: &[(NodeId, NodeId)],
        rates: ReactionRates,
    ) -> Result<ContactNetwork<G>> {
        let mut network = ContactNetwork {
            graph: G::with_population(population.len()),
            population,
            transmission_rates: HashMap::new(),
            rates,
        };
        for &(a, b) in edges {
            network.add_edge(EdgeRef::new(a, b))?;
        }
        Ok(network)
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn rates(&self) -> &ReactionRates {
        &self.rates
    }

    /// `None` for ids that never existed or whose node died.
    pub fn specie(&self, node: NodeId) -> Option<&Specie> {
        if self.graph.contains_node(node) {
            self.population.get(node)
        } else {
            None
        }
    }

    pub fn size(&self) -> usize {
        self.graph.size()
    }

    pub fn count_edges(&self) -> usize {
        self.graph.count_edges()
    }

    pub fn count_by_state(&self, state: EpidemicState) -> usize {
        self.graph
            .nodes()
            .filter(|&n| self.population[n].state() == state)
            .count()
    }

    /// Highest transmission rate any edge can carry.
    pub fn transmission_rate_limit(&self) -> f64 {
        self.rates.transmission
    }

    pub fn transmission_rate(&self, edge: EdgeRef) -> f64 {
        self.transmission_rates.get(&edge).copied().unwrap_or(0.)
    }

    pub fn edge_addition_rate(&self, edge: EdgeRef) -> f64 {
        self.population[edge.u()].new_contact_rate() * self.population[edge.v()].new_contact_rate()
    }

    pub fn edge_deletion_rate(&self, edge: EdgeRef) -> f64 {
        self.population[edge.u()].loose_contact_rate()
            * self.population[edge.v()].loose_contact_rate()
    }

    /* Rate sums */

    pub fn edge_deletion_rate_sum(&self) -> CumulativeTable<EdgeRef> {
        let mut table = CumulativeTable::with_capacity(self.graph.count_edges());
        for edge in self.graph.active_edges() {
            let rate = self.edge_deletion_rate(edge);
            if rate > 0. {
                table.push(rate, edge);
            }
        }
        table
    }

    pub fn edge_addition_rate_sum(&self) -> CumulativeTable<EdgeRef> {
        let n = self.graph.size();
        let pairs = n * n.saturating_sub(1) / 2;
        let mut table = CumulativeTable::with_capacity(pairs - self.graph.count_edges());
        for edge in self.graph.complement_edges() {
            let rate = self.edge_addition_rate(edge);
            if rate > 0. {
                table.push(rate, edge);
            }
        }
        table
    }

    pub fn transmission_rate_sum(&self) -> CumulativeTable<EdgeRef> {
        let mut table = CumulativeTable::new();
        for edge in self.graph.active_edges() {
            let rate = self.transmission_rate(edge);
            if rate > 0. {
                table.push(rate, edge);
            }
        }
        table
    }

    pub fn diagnosis_rate_sum(&self) -> CumulativeTable<NodeId> {
        let mut table = CumulativeTable::new();
        for node in self.graph.nodes() {
            let rate = self.population[node].diagnosis_rate();
            if rate > 0. {
                table.push(rate, node);
            }
        }
        table
    }

    /// Every surviving node is listed, whatever its rate.
    pub fn death_rate_sum(&self) -> CumulativeTable<NodeId> {
        let mut table = CumulativeTable::with_capacity(self.graph.size());
        for node in self.graph.nodes() {
            table.push(self.population[node].death_rate(), node);
        }
        table
    }

    pub fn birth_rate_sum(&self) -> f64 {
        self.rates.birth
    }

    pub fn fast_tables(&self) -> FastTables {
        FastTables {
            edge_deletion: self.edge_deletion_rate_sum(),
            edge_addition: self.edge_addition_rate_sum(),
        }
    }

    pub fn slow_tables(&self) -> SlowTables {
        SlowTables {
            transmission: self.transmission_rate_sum(),
            diagnosis: self.diagnosis_rate_sum(),
            death: self.death_rate_sum(),
            birth: self.birth_rate_sum(),
        }
    }

    pub fn rate_tables(&self) -> RateTables {
        RateTables {
            fast: self.fast_tables(),
            slow: self.slow_tables(),
        }
    }

    /* Reactions */

    pub fn add_edge(&mut self, edge: EdgeRef) -> Result<()> {
        self.graph.activate(edge)?;
        for node in [edge.u(), edge.v()] {
            let specie = &mut self.population[node];
            specie.inc_contacts();
            if specie.contacts() > specie.max_contacts() {
                return Err(SimulationError::inconsistency(format!(
                    "node {} has {} contacts but at most {} are possible",
                    node,
                    specie.contacts(),
                    specie.max_contacts()
                )));
            }
        }
        self.refresh_transmission(edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, edge: EdgeRef) -> Result<()> {
        self.graph.deactivate(edge)?;
        self.transmission_rates.remove(&edge);
        self.population[edge.u()].dec_contacts();
        self.population[edge.v()].dec_contacts();
        Ok(())
    }

    /// Infects the susceptible end of `edge`. Returns the newly infected node.
    pub fn execute_transmission(&mut self, edge: EdgeRef, time: f64) -> Result<NodeId> {
        if !self.graph.is_active(edge) {
            return Err(SimulationError::inconsistency(format!(
                "transmission over inactive edge {}-{}",
                edge.u(),
                edge.v()
            )));
        }
        let infected = [edge.u(), edge.v()]
            .into_iter()
            .find(|&n| self.population[n].state() == EpidemicState::Susceptible)
            .ok_or_else(|| {
                SimulationError::inconsistency(format!(
                    "transmission over edge {}-{} without a susceptible end",
                    edge.u(),
                    edge.v()
                ))
            })?;

        let specie = &mut self.population[infected];
        specie.change_state(EpidemicState::Infected, time);
        specie.set_death_rate(self.rates.death(EpidemicState::Infected));
        specie.set_diagnosis_rate(self.rates.diagnosis);

        let incident: Vec<EdgeRef> = self.graph.incident_edges(infected).collect();
        for e in incident {
            self.refresh_transmission(e);
        }
        Ok(infected)
    }

    /// Diagnosis cuts every contact of the node and slows down its new contacts.
    pub fn execute_diagnosis(&mut self, node: NodeId, time: f64) -> Result<()> {
        match self.specie(node).map(|s| s.state()) {
            Some(EpidemicState::Infected) => {}
            other => {
                return Err(SimulationError::inconsistency(format!(
                    "diagnosis of node {} in state {:?}",
                    node, other
                )))
            }
        }
        let specie = &mut self.population[node];
        specie.change_state(EpidemicState::Diagnosed, time);
        specie.set_diagnosis_rate(0.);

        let incident: Vec<EdgeRef> = self.graph.incident_edges(node).collect();
        for e in incident {
            self.remove_edge(e)?;
        }

        let specie = &mut self.population[node];
        specie.set_death_rate(self.rates.death(EpidemicState::Diagnosed));
        specie.set_new_contact_rate(specie.new_contact_rate() * DIAGNOSED_CONTACT_FACTOR);
        Ok(())
    }

    /// Removes the node; every survivor loses one possible contact.
    pub fn execute_death(&mut self, node: NodeId) -> Result<()> {
        let former = self.graph.erase_node(node)?;
        for v in former {
            self.transmission_rates.remove(&EdgeRef::new(node, v));
            self.population[v].dec_contacts();
        }
        let survivors: Vec<NodeId> = self.graph.nodes().collect();
        for n in survivors {
            self.population[n].dec_max_contacts();
        }
        Ok(())
    }

    pub fn execute(&mut self, reaction: Reaction, time: f64) -> Result<()> {
        trace!(?reaction, time, "execute");
        match reaction {
            Reaction::EdgeDeletion(e) => self.remove_edge(e),
            Reaction::EdgeAddition(e) => self.add_edge(e),
            Reaction::Transmission(e) => self.execute_transmission(e, time).map(|_| ()),
            Reaction::Diagnosis(n) => self.execute_diagnosis(n, time),
            Reaction::Death(n) => self.execute_death(n),
            Reaction::Birth => Ok(()),
        }
    }

    fn refresh_transmission(&mut self, edge: EdgeRef) {
        let rate = self.rates.between(
            self.population[edge.u()].state(),
            self.population[edge.v()].state(),
        );
        if rate > 0. {
            self.transmission_rates.insert(edge, rate);
        } else {
            self.transmission_rates.remove(&edge);
        }
    }

    /* Contact growth bound */

    fn mean_edge_deletion_rate(&self, node: NodeId) -> f64 {
        mean(
            self.graph
                .incident_edges(node)
                .map(|e| self.edge_deletion_rate(e)),
        )
    }

    fn mean_edge_addition_rate(&self, node: NodeId) -> f64 {
        mean(
            self.graph
                .complement_incident_edges(node)
                .map(|e| self.edge_addition_rate(e)),
        )
    }

    /// Upper estimate of the total number of contacts the nodes in `state` can
    /// reach within the next `t` time units.
    pub fn max_contacts_limit_by_state(&self, state: EpidemicState, t: f64) -> Result<f64> {
        let c_max = self.graph.size().saturating_sub(1) as f64;
        let mut result = 0.;
        for node in self.graph.nodes() {
            let specie = &self.population[node];
            if specie.state() != state {
                continue;
            }
            let theta = self.mean_edge_deletion_rate(node);
            let lambda = self.mean_edge_addition_rate(node);
            let c0 = specie.contacts() as f64;

            let mut max_contacts = c0.max(contact_estimate(lambda, theta, t, c_max, c0)?);
            if let Some(extremum) = contact_extremum(lambda, theta, t, c_max, c0)? {
                max_contacts = max_contacts.max(extremum);
            }
            result += max_contacts.min(c_max);
        }
        Ok(result)
    }

    pub fn network_state(&self) -> Vec<SpecieState> {
        self.graph
            .nodes()
            .map(|node| {
                let sp = &self.population[node];
                SpecieState {
                    id: node,
                    state: sp.state(),
                    new_contact_rate: sp.new_contact_rate(),
                    loose_contact_rate: sp.loose_contact_rate(),
                    death_rate: sp.death_rate(),
                    diagnosis_rate: sp.diagnosis_rate(),
                    last_state_change: sp.last_state_change(),
                    neighbors: self.graph.neighbors(node).collect(),
                }
            })
            .collect()
    }

    /// Verifies contact counters and transmission rates against the graph.
    pub fn check_invariants(&self) -> Result<()> {
        for node in self.graph.nodes() {
            let sp = &self.population[node];
            if sp.contacts() != self.graph.degree(node) || sp.contacts() > sp.max_contacts() {
                return Err(SimulationError::inconsistency(format!(
                    "node {}: {} contacts, degree {}, max {}",
                    node,
                    sp.contacts(),
                    self.graph.degree(node),
                    sp.max_contacts()
                )));
            }
        }
        for (edge, rate) in &self.transmission_rates {
            let expected = self.rates.between(
                self.population[edge.u()].state(),
                self.population[edge.v()].state(),
            );
            if !self.graph.is_active(*edge) || *rate <= 0. || *rate != expected {
                return Err(SimulationError::inconsistency(format!(
                    "stale transmission rate {} on {}-{}",
                    rate,
                    edge.u(),
                    edge.v()
                )));
            }
        }
        for edge in self.graph.active_edges() {
            let expected = self.rates.between(
                self.population[edge.u()].state(),
                self.population[edge.v()].state(),
            );
            if self.transmission_rate(edge) != expected {
                return Err(SimulationError::inconsistency(format!(
                    "missing transmission rate on {}-{}",
                    edge.u(),
                    edge.v()
                )));
            }
        }
        Ok(())
    }
}

fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values.fold((0., 0usize), |(s, c), v| (s + v, c + 1));
    if count > 0 {
        sum / count as f64
    } else {
        0.
    }
}

/// Expected contact count after `t` plus three standard deviations, for a node
/// gaining contacts at `lambda * (c_max)` and losing them at `lambda + theta`
/// per contact. Without any rewiring the count stays at `c0`.
pub(crate) fn contact_estimate(lambda: f64, theta: f64, t: f64, c_max: f64, c0: f64) -> Result<f64> {
    let a = lambda * c_max;
    let b = lambda + theta;
    if !(t > 0. && b > 0. && a + c0 > 0.) {
        return Ok(c0);
    }
    let expectation = a / b - (a / b - c0) * (-b * t).exp();
    let variance = expectation - c0 * (-2. * b * t).exp();
    let estimate = expectation + CONTACT_SIGMAS * variance.max(0.).sqrt();
    if !(estimate >= 0.) {
        return Err(SimulationError::inconsistency(format!(
            "negative contact estimate {} (lambda={}, theta={}, t={})",
            estimate, lambda, theta, t
        )));
    }
    Ok(estimate)
}

/// Value of [`contact_estimate`] at its interior extremum, if that lies in `(0, t]`.
pub(crate) fn contact_extremum(
    lambda: f64,
    theta: f64,
    t: f64,
    c_max: f64,
    c0: f64,
) -> Result<Option<f64>> {
    let a = lambda * c_max;
    let b = lambda + theta;
    if !(a >= 0. && b > 0. && c0 > 0. && c0 > a / b) {
        return Ok(None);
    }
    let root = (9. * b * b * c0 + (a - b * c0).powi(2)).sqrt();
    let under_log = ((b * c0 - a) * root + (a * a - (b * c0).powi(2)).abs()) / (2. * b * c0 * root);
    if !(under_log > 0.) {
        return Ok(None);
    }
    let extremum = -under_log.ln() / b;
    if extremum > 0. && extremum <= t {
        Ok(Some(contact_estimate(lambda, theta, extremum, c_max, c0)?))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;

    fn rates() -> ReactionRates {
        ReactionRates {
            transmission: 2.,
            diagnosis: 0.5,
            birth: 0.,
            death: [0.1, 0.2, 0.3],
        }
    }

    fn person(state: EpidemicState, n: usize) -> Specie {
        let r = rates();
        let diagnosis = if state == EpidemicState::Infected { r.diagnosis } else { 0. };
        Specie::new(n - 1, state, r.death(state), 1.0, 0.5, diagnosis)
    }

    /// 0:S - 1:I - 2:S, 3:D isolated
    fn small_network() -> ContactNetwork {
        use EpidemicState::*;
        let population = vec![
            person(Susceptible, 4),
            person(Infected, 4),
            person(Susceptible, 4),
            person(Diagnosed, 4),
        ];
        ContactNetwork::from_population(population, &[(0, 1), (1, 2)], rates()).unwrap()
    }

    #[test]
    fn rate_sums() {
        let nw = small_network();
        nw.check_invariants().unwrap();
        assert_eq!(nw.edge_deletion_rate_sum().len(), 2);
        assert_float_absolute_eq!(nw.edge_deletion_rate_sum().total(), 0.5);
        assert_eq!(nw.edge_addition_rate_sum().len(), 4);
        assert_float_absolute_eq!(nw.edge_addition_rate_sum().total(), 4.0);
        assert_float_absolute_eq!(nw.transmission_rate_sum().total(), 4.0);
        assert_eq!(nw.diagnosis_rate_sum().items().collect::<Vec<_>>(), vec![1]);
        assert_eq!(nw.death_rate_sum().len(), 4);
        assert_float_absolute_eq!(nw.death_rate_sum().total(), 0.7);
        assert_eq!(nw.rate_tables(), nw.rate_tables());
    }

    #[test]
    fn adding_an_s_d_edge_gives_half_transmission() {
        let mut nw = small_network();
        nw.add_edge(EdgeRef::new(0, 3)).unwrap();
        assert_float_absolute_eq!(nw.transmission_rate(EdgeRef::new(0, 3)), 1.0);
        assert_eq!(nw.specie(0).unwrap().contacts(), 2);
        assert!(nw.add_edge(EdgeRef::new(0, 3)).is_err());
        nw.remove_edge(EdgeRef::new(0, 3)).unwrap();
        assert_eq!(nw.transmission_rate(EdgeRef::new(0, 3)), 0.);
        assert!(nw.remove_edge(EdgeRef::new(0, 3)).is_err());
        nw.check_invariants().unwrap();
    }

    #[test]
    fn transmission_updates_neighbourhood() {
        let mut nw = small_network();
        let infected = nw.execute_transmission(EdgeRef::new(0, 1), 1.5).unwrap();
        assert_eq!(infected, 0);
        let sp = nw.specie(0).unwrap();
        assert_eq!(sp.state(), EpidemicState::Infected);
        assert_eq!(sp.last_state_change(), 1.5);
        assert_eq!(sp.diagnosis_rate(), 0.5);
        assert_eq!(sp.death_rate(), 0.2);
        assert_eq!(nw.transmission_rate(EdgeRef::new(0, 1)), 0.);
        assert_eq!(nw.transmission_rate(EdgeRef::new(1, 2)), 2.);
        assert!(nw.execute_transmission(EdgeRef::new(0, 1), 2.).is_err());
        assert!(nw.execute_transmission(EdgeRef::new(0, 2), 2.).is_err());
        nw.check_invariants().unwrap();
    }

    #[test]
    fn diagnosis_detaches_node() {
        let mut nw = small_network();
        nw.execute_diagnosis(1, 3.).unwrap();
        let sp = nw.specie(1).unwrap();
        assert_eq!(sp.state(), EpidemicState::Diagnosed);
        assert_eq!(sp.contacts(), 0);
        assert_eq!(sp.diagnosis_rate(), 0.);
        assert_eq!(sp.death_rate(), 0.3);
        assert_float_absolute_eq!(sp.new_contact_rate(), 0.3);
        assert_eq!(nw.count_edges(), 0);
        assert_eq!(nw.transmission_rate_sum().total(), 0.);
        assert!(nw.execute_diagnosis(1, 4.).is_err());
        assert!(nw.execute_diagnosis(0, 4.).is_err());
        nw.check_invariants().unwrap();
    }

    #[test]
    fn death_shrinks_capacity() {
        let mut nw = small_network();
        nw.execute_death(1).unwrap();
        assert_eq!(nw.size(), 3);
        assert!(nw.specie(1).is_none());
        assert_eq!(nw.count_edges(), 0);
        for n in [0, 2, 3] {
            assert_eq!(nw.specie(n).unwrap().max_contacts(), 2);
        }
        assert_eq!(nw.edge_addition_rate_sum().len(), 3);
        assert!(nw.execute_death(1).is_err());
        nw.check_invariants().unwrap();
    }

    #[test]
    fn birth_changes_nothing() {
        let mut nw = small_network();
        let before = nw.clone();
        nw.execute(Reaction::Birth, 1.).unwrap();
        assert_eq!(nw, before);
    }

    #[test]
    fn contact_estimate_behaviour() {
        // no rewiring at all
        assert_eq!(contact_estimate(0., 0., 5., 10., 3.).unwrap(), 3.);
        // t -> infinity approaches a/b plus noise
        let est = contact_estimate(1., 1., 100., 10., 0.).unwrap();
        assert_float_absolute_eq!(est, 5. + 3. * 5f64.sqrt(), 1e-9);
        // a node above its equilibrium has an interior maximum of the estimate
        let ext = contact_extremum(0.1, 1.0, 10., 10., 8.).unwrap();
        assert!(ext.is_some());
        assert!(ext.unwrap() >= contact_estimate(0.1, 1.0, 10., 10., 8.).unwrap());
        // below equilibrium there is none
        assert!(contact_extremum(1., 1., 10., 10., 1.).unwrap().is_none());
    }

    #[test]
    fn contact_limit_is_clipped() {
        let nw = small_network();
        let limit = nw
            .max_contacts_limit_by_state(EpidemicState::Susceptible, 100.)
            .unwrap();
        assert!(limit >= 2.);
        assert!(limit <= 6.);
        let none = nw
            .max_contacts_limit_by_state(EpidemicState::Infected, 0.)
            .unwrap();
        assert_eq!(none, 2.);
    }

    #[test]
    fn initial_network_from_settings() {
        let settings = crate::tests::settings(20, 3, 2, 30);
        let mut rng = rand::rngs::SmallRng::seed_from_u64(7);
        let nw: ContactNetwork = ContactNetwork::new(&settings, &mut rng).unwrap();
        assert_eq!(nw.size(), 25);
        assert_eq!(nw.count_by_state(EpidemicState::Susceptible), 20);
        assert_eq!(nw.count_by_state(EpidemicState::Infected), 3);
        assert_eq!(nw.count_by_state(EpidemicState::Diagnosed), 2);
        assert_eq!(nw.count_edges(), 30);
        nw.check_invariants().unwrap();
        for n in 0..20 {
            assert_eq!(nw.specie(n).unwrap().diagnosis_rate(), 0.);
        }
        for n in 20..23 {
            assert_eq!(nw.specie(n).unwrap().diagnosis_rate(), settings.diagnosis_rate);
        }
    }
}
