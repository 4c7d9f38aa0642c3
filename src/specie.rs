use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Epidemic state of a node. Transitions only go S -> I -> D.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum EpidemicState {
    #[serde(rename = "S")]
    Susceptible,
    #[serde(rename = "I")]
    Infected,
    #[serde(rename = "D")]
    Diagnosed,
}

impl EpidemicState {
    pub const ALL: [EpidemicState; 3] = [
        EpidemicState::Susceptible,
        EpidemicState::Infected,
        EpidemicState::Diagnosed,
    ];
}

impl Display for EpidemicState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                EpidemicState::Susceptible => "S",
                EpidemicState::Infected => "I",
                EpidemicState::Diagnosed => "D",
            }
        )
    }
}

/// One individual of the population.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Specie {
    max_contacts: usize,
    contacts: usize,
    death_rate: f64,
    new_contact_rate: f64,
    loose_contact_rate: f64,
    diagnosis_rate: f64,
    last_state_change: f64,
    state: EpidemicState,
}

impl Specie {
    pub fn new(
        max_contacts: usize,
        state: EpidemicState,
        death_rate: f64,
        new_contact_rate: f64,
        loose_contact_rate: f64,
        diagnosis_rate: f64,
    ) -> Specie {
        Specie {
            max_contacts,
            contacts: 0,
            death_rate,
            new_contact_rate,
            loose_contact_rate,
            diagnosis_rate,
            last_state_change: 0.,
            state,
        }
    }

    pub fn state(&self) -> EpidemicState {
        self.state
    }
    pub fn max_contacts(&self) -> usize {
        self.max_contacts
    }
    pub fn contacts(&self) -> usize {
        self.contacts
    }
    pub fn death_rate(&self) -> f64 {
        self.death_rate
    }
    pub fn new_contact_rate(&self) -> f64 {
        self.new_contact_rate
    }
    pub fn loose_contact_rate(&self) -> f64 {
        self.loose_contact_rate
    }
    pub fn diagnosis_rate(&self) -> f64 {
        self.diagnosis_rate
    }
    pub fn last_state_change(&self) -> f64 {
        self.last_state_change
    }

    pub(crate) fn change_state(&mut self, state: EpidemicState, time: f64) {
        self.state = state;
        self.last_state_change = time;
    }
    pub(crate) fn set_death_rate(&mut self, rate: f64) {
        self.death_rate = rate;
    }
    pub(crate) fn set_diagnosis_rate(&mut self, rate: f64) {
        self.diagnosis_rate = rate;
    }
    pub(crate) fn set_new_contact_rate(&mut self, rate: f64) {
        self.new_contact_rate = rate;
    }
    pub(crate) fn inc_contacts(&mut self) {
        self.contacts += 1;
    }
    pub(crate) fn dec_contacts(&mut self) {
        self.contacts = self.contacts.saturating_sub(1);
    }
    pub(crate) fn dec_max_contacts(&mut self) {
        self.max_contacts = self.max_contacts.saturating_sub(1);
    }
}
