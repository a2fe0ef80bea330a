/*
 * Loimos
 * Copyright (c) 2020  ThoughtWorks, Inc.
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 *
 */

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use rand::Rng;

use crate::config::scenario::Scenario;
use crate::disease_model::DiseaseModel;
use crate::entity::Entity;
use crate::models::constants::DAY_LENGTH;
use crate::models::custom_types::{Count, Day, PartitionId, Time};
use crate::models::messages::{InteractionMessage, Visit};
use crate::person::Person;
use crate::transport::aggregator::{Aggregator, AggregatorParam};
use crate::transport::{DailySummary, PeopleCommand, Reduction};

/// Actor owning a contiguous slice of people. Each day it emits their
/// scheduled visits, collects incoming interaction bundles, and advances
/// disease state; message handling is serialized by the command loop.
pub struct PeoplePartition {
    partition_id: PartitionId,
    people: Vec<Person>,
    scenario: Arc<Scenario>,
    visit_outbox: Aggregator<Visit>,
    day: Day,
}

impl PeoplePartition {
    pub fn new(
        partition_id: PartitionId,
        people: Vec<Person>,
        scenario: Arc<Scenario>,
        visit_senders: Vec<Sender<Vec<Visit>>>,
        aggregation: Option<AggregatorParam>,
    ) -> PeoplePartition {
        debug!(
            "people partition {} owns {} people ({}-{})",
            partition_id,
            people.len(),
            scenario.partitioner.people.global_id(0, partition_id),
            scenario.partitioner.people.global_id(people.len().saturating_sub(1), partition_id),
        );
        PeoplePartition {
            partition_id,
            people,
            scenario,
            visit_outbox: Aggregator::new(visit_senders, aggregation),
            day: 0,
        }
    }

    /// The actor loop: one command at a time, acknowledged to the
    /// coordinator once handled.
    pub fn run(
        mut self,
        commands: Receiver<PeopleCommand>,
        interactions: Receiver<Vec<InteractionMessage>>,
        reductions: Sender<Reduction>,
    ) {
        for command in commands.iter() {
            match command {
                PeopleCommand::SendVisits => {
                    self.send_visit_messages();
                    ack(&reductions, Reduction::VisitsSent { partition: self.partition_id });
                }
                PeopleCommand::EndOfDay => {
                    // The compute barrier guarantees every interaction send
                    // finished before this command arrived.
                    for batch in interactions.try_iter() {
                        for message in batch {
                            self.receive_interactions(message);
                        }
                    }
                    let summary = self.end_of_day_state_update();
                    ack(&reductions, Reduction::EndOfDay(summary));
                }
                PeopleCommand::ApplyIntervention(index) => {
                    self.apply_intervention(index);
                    ack(&reductions, Reduction::InterventionDone { partition: self.partition_id });
                }
                PeopleCommand::RevertIntervention(index) => {
                    self.revert_intervention(index);
                    ack(&reductions, Reduction::InterventionDone { partition: self.partition_id });
                }
                PeopleCommand::Finish => {
                    ack(&reductions, Reduction::Finished { partition: self.partition_id });
                    break;
                }
            }
        }
    }

    /// Visit phase: overlay each person's current state and transmission
    /// modifier on their schedule for today and route the visits to the
    /// owning location partitions.
    pub fn send_visit_messages(&mut self) {
        let day_index = self.day as usize % self.scenario.num_visit_days;
        let scenario = &self.scenario;
        for person in &self.people {
            for visit in &person.visits_by_day[day_index] {
                // Interventions may cancel some visits.
                if !person.accepts_visit(visit) {
                    continue;
                }
                let mut visit = visit.clone();
                visit.person_state = person.state;
                visit.transmission_modifier = transmission_modifier(scenario, person);

                let destination = scenario.partitioner.locations.partition_of(visit.location_id);
                self.visit_outbox.send(destination, visit);
            }
        }
        self.visit_outbox.flush_all();
    }

    /// Concatenates an incoming interaction bundle onto its person; ordering
    /// across bundles is irrelevant because the end-of-day aggregation is
    /// commutative.
    pub fn receive_interactions(&mut self, message: InteractionMessage) {
        let partitioning = &self.scenario.partitioner.people;
        let local = partitioning.local_index(message.person_id, self.partition_id);
        if local >= self.people.len() {
            panic!(
                "partition {}: exposure of person {} at location {} outside of local range [0, {})",
                self.partition_id,
                message.person_id,
                message.location_id,
                self.people.len()
            );
        }
        let person = &mut self.people[local];
        if person.unique_id() != message.person_id {
            panic!(
                "partition {}: person {}'s exposure at location {} received by person {}",
                self.partition_id,
                message.person_id,
                message.location_id,
                person.unique_id()
            );
        }
        person.interactions.extend(message.interactions);
    }

    /// End-of-day phase: roll each person's competing exposures, advance
    /// state timers, and tally today's histogram for the sum reduction.
    pub fn end_of_day_state_update(&mut self) -> DailySummary {
        let disease_model = &self.scenario.disease_model;
        let mut state_counts: Vec<Count> = vec![0; disease_model.number_of_states()];
        let mut infectious_count: Count = 0;

        for person in &mut self.people {
            process_interactions(person, disease_model);
            update_disease_state(person, disease_model);

            state_counts[person.state] += 1;
            if disease_model.is_infectious(person.state) {
                infectious_count += 1;
            }
        }

        self.day += 1;
        DailySummary { partition: self.partition_id, state_counts, infectious_count }
    }

    pub fn apply_intervention(&mut self, index: usize) {
        let intervention = &self.scenario.intervention_model.person_interventions[index];
        for person in &mut self.people {
            if person.complies_with(index) && intervention.test(person) {
                intervention.apply(person);
            }
        }
    }

    pub fn revert_intervention(&mut self, index: usize) {
        let intervention = &self.scenario.intervention_model.person_interventions[index];
        for person in &mut self.people {
            intervention.revert(person);
        }
    }
}

/// The susceptibility or infectivity attribute of the person, depending on
/// their current role; neutral states carry no modifier.
fn transmission_modifier(scenario: &Scenario, person: &Person) -> f64 {
    if scenario.disease_model.is_susceptible(person.state) {
        if let Some(index) = scenario.susceptibility_index {
            return person.values()[index].as_double();
        }
    } else if scenario.disease_model.is_infectious(person.state) {
        if let Some(index) = scenario.infectivity_index {
            return person.values()[index].as_double();
        }
    }
    1.0
}

/// One Poisson trial over the sum of the day's propensities: with total
/// propensity S, `-ln(U)/S <= 1` exposes the person, and a second weighted
/// draw picks the responsible interaction.
pub(crate) fn process_interactions(person: &mut Person, disease_model: &DiseaseModel) {
    if person.interactions.is_empty() {
        return;
    }
    if disease_model.is_susceptible(person.state) {
        let total: f64 = person.interactions.iter().map(|i| i.propensity).sum();
        let uniform: f64 = person.rng().get().gen();
        let roll = -uniform.ln() / total;

        if roll <= 1.0 {
            let pick: f64 = person.rng().get().gen_range(0.0..total);
            let mut partial = 0.0;
            let mut responsible = person.interactions.len() - 1;
            for (index, interaction) in person.interactions.iter().enumerate() {
                partial += interaction.propensity;
                if partial > pick {
                    responsible = index;
                    break;
                }
            }
            trace!(
                "person {} exposed by person {}",
                person.unique_id(),
                person.interactions[responsible].infectious_id
            );

            // Mark the exposure so the timer step below actualizes it.
            let (next_state, _) = disease_model.transition_from(person.state, person.rng());
            person.next_state = next_state;
            person.seconds_left_in_state = -1;
        }
    }
    person.interactions.clear();
}

/// Transition to the next state or mark the passage of time. The timer's
/// "forever" sentinel never counts down.
pub(crate) fn update_disease_state(person: &mut Person, disease_model: &DiseaseModel) {
    if person.seconds_left_in_state == Time::MAX {
        return;
    }
    person.seconds_left_in_state -= DAY_LENGTH;
    if person.seconds_left_in_state <= 0 {
        person.state = person.next_state;
        let (next_state, seconds) = disease_model.transition_from(person.state, person.rng());
        person.next_state = next_state;
        person.seconds_left_in_state = seconds;
    }
}

fn ack(reductions: &Sender<Reduction>, reduction: Reduction) {
    if reductions.send(reduction).is_err() {
        panic!("coordinator hung up mid-run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::custom_types::Time;
    use crate::models::messages::Interaction;

    fn model() -> DiseaseModel {
        DiseaseModel::from_json_str(
            r#"{
                "transmissibility": 1.0,
                "starting_states": [{"starting_state": "susceptible"}],
                "disease_states": [
                    {"state_label": "susceptible", "susceptibility": 1.0,
                     "exposure_transition": {"next_state": "exposed"}},
                    {"state_label": "exposed",
                     "timed_transition": {"transitions": [
                        {"next_state": "infectious", "with_prob": 1.0,
                         "fixed": {"time_in_state": {"days": 2}}}]}},
                    {"state_label": "infectious", "infectivity": 1.0}
                ]
            }"#,
        )
        .unwrap()
    }

    fn certain_interaction() -> Interaction {
        Interaction {
            propensity: 1e300,
            infectious_id: 9,
            infectious_state: 2,
            start_time: 0,
            end_time: 3600,
        }
    }

    #[test]
    fn overwhelming_propensity_schedules_the_exposure() {
        let disease = model();
        let mut person = Person::new(0, Vec::new(), 0, 7, 42);
        person.interactions.push(certain_interaction());

        process_interactions(&mut person, &disease);

        assert!(person.interactions.is_empty());
        assert_eq!(person.next_state, disease.state_index("exposed").unwrap());
        assert_eq!(person.seconds_left_in_state, -1);
    }

    #[test]
    fn exposure_is_actualized_by_the_timer_step() {
        let disease = model();
        let mut person = Person::new(0, Vec::new(), 0, 7, 42);
        person.interactions.push(certain_interaction());

        process_interactions(&mut person, &disease);
        update_disease_state(&mut person, &disease);

        let exposed = disease.state_index("exposed").unwrap();
        let infectious = disease.state_index("infectious").unwrap();
        assert_eq!(person.state, exposed);
        assert_eq!(person.next_state, infectious);
        assert_eq!(person.seconds_left_in_state, 2 * DAY_LENGTH);

        // Two more days tick the timer down and actualize the next state.
        update_disease_state(&mut person, &disease);
        assert_eq!(person.state, exposed);
        update_disease_state(&mut person, &disease);
        assert_eq!(person.state, infectious);
    }

    #[test]
    fn no_interactions_means_no_draws_and_no_transition() {
        let disease = model();
        let mut person = Person::new(0, Vec::new(), 0, 7, 42);

        process_interactions(&mut person, &disease);
        update_disease_state(&mut person, &disease);

        assert_eq!(person.state, 0);
        assert!(!person.is_in_disease_progression());
    }

    #[test]
    fn non_susceptible_people_ignore_interactions() {
        let disease = model();
        let mut person = Person::new(0, Vec::new(), 0, 7, 42);
        person.state = disease.state_index("infectious").unwrap();
        person.next_state = person.state;
        person.interactions.push(certain_interaction());

        process_interactions(&mut person, &disease);
        assert!(person.interactions.is_empty());
        assert_eq!(person.seconds_left_in_state, Time::MAX);
    }

    #[test]
    fn escape_probability_uses_the_propensity_sum() {
        // With two tiny propensities the escape chance is exp(-(p1 + p2));
        // over many people the exposure rate should track 1 - exp(-S), which
        // a per-interaction independent-trial scheme would overshoot.
        let disease = model();
        let total: f64 = 0.5;
        let expected = 1.0 - (-total).exp();

        let mut exposed = 0;
        let trials = 4000;
        for id in 0..trials {
            let mut person = Person::new(id, Vec::new(), 0, 7, 42);
            for _ in 0..2 {
                person.interactions.push(Interaction {
                    propensity: total / 2.0,
                    infectious_id: 1,
                    infectious_state: 2,
                    start_time: 0,
                    end_time: 1,
                });
            }
            process_interactions(&mut person, &disease);
            if person.seconds_left_in_state == -1 {
                exposed += 1;
            }
        }

        let observed = exposed as f64 / trials as f64;
        assert!((observed - expected).abs() < 0.03, "observed {}", observed);
    }
}
