use crate::graph::{ContactGraph, NodeId};
use crate::network::ContactNetwork;
use crate::specie::EpidemicState;
use serde::Serialize;

/// Initial capacity reserved for the snapshot list of a run.
pub const SNAPSHOT_RESERVE: usize = 1 << 14;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpecieState {
    pub id: NodeId,
    pub state: EpidemicState,
    pub new_contact_rate: f64,
    pub loose_contact_rate: f64,
    pub death_rate: f64,
    pub diagnosis_rate: f64,
    pub last_state_change: f64,
    pub neighbors: Vec<NodeId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    pub time: f64,
    pub nw_states: Vec<SpecieState>,
}

impl NetworkSnapshot {
    pub fn count_by_state(&self, state: EpidemicState) -> usize {
        self.nw_states.iter().filter(|s| s.state == state).count()
    }
}

/// Append-only, time ordered list of snapshots of one run.
pub type NetworkStorage = Vec<NetworkSnapshot>;

pub fn new_storage() -> NetworkStorage {
    Vec::with_capacity(SNAPSHOT_RESERVE)
}

pub fn record<G: ContactGraph>(storage: &mut NetworkStorage, time: f64, network: &ContactNetwork<G>) {
    storage.push(NetworkSnapshot {
        time,
        nw_states: network.network_state(),
    });
}
