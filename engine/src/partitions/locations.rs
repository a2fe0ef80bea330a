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

use crate::config::scenario::Scenario;
use crate::entity::Entity;
use crate::location::Location;
use crate::models::custom_types::{Day, PartitionId};
use crate::models::events::{Event, EventType};
use crate::models::messages::{InteractionMessage, Visit};
use crate::transport::aggregator::{Aggregator, AggregatorParam};
use crate::transport::{LocationCommand, Reduction};

/// Actor owning a contiguous range of locations. Buffers the day's visits as
/// paired events and, at the compute barrier, sweeps each location's events
/// to emit interaction bundles back to the people collective.
pub struct LocationPartition {
    partition_id: PartitionId,
    locations: Vec<Location>,
    scenario: Arc<Scenario>,
    interaction_outbox: Aggregator<InteractionMessage>,
    day: Day,
}

impl LocationPartition {
    pub fn new(
        partition_id: PartitionId,
        locations: Vec<Location>,
        scenario: Arc<Scenario>,
        interaction_senders: Vec<Sender<Vec<InteractionMessage>>>,
        aggregation: Option<AggregatorParam>,
    ) -> LocationPartition {
        debug!(
            "location partition {} owns {} locations",
            partition_id,
            locations.len()
        );
        LocationPartition {
            partition_id,
            locations,
            scenario,
            interaction_outbox: Aggregator::new(interaction_senders, aggregation),
            day: 0,
        }
    }

    pub fn run(
        mut self,
        commands: Receiver<LocationCommand>,
        visits: Receiver<Vec<Visit>>,
        reductions: Sender<Reduction>,
    ) {
        for command in commands.iter() {
            match command {
                LocationCommand::ComputeInteractions => {
                    // The visit barrier guarantees every visit send finished
                    // before this command arrived.
                    for batch in visits.try_iter() {
                        for visit in batch {
                            self.receive_visit_message(visit);
                        }
                    }
                    self.compute_interactions();
                    ack(&reductions, Reduction::ComputeDone { partition: self.partition_id });
                }
                LocationCommand::ApplyIntervention(index) => {
                    self.apply_intervention(index);
                    ack(&reductions, Reduction::InterventionDone { partition: self.partition_id });
                }
                LocationCommand::RevertIntervention(index) => {
                    self.revert_intervention(index);
                    ack(&reductions, Reduction::InterventionDone { partition: self.partition_id });
                }
                LocationCommand::Finish => {
                    ack(&reductions, Reduction::Finished { partition: self.partition_id });
                    break;
                }
            }
        }
    }

    /// Wraps an accepted visit into a paired arrival/departure and queues
    /// both at the target location. Full-closure interventions act here, by
    /// the filters they installed; interventions only change between days,
    /// so a filtered location holds no events at compute time.
    pub fn receive_visit_message(&mut self, visit: Visit) {
        let partitioning = &self.scenario.partitioner.locations;
        let local = partitioning.local_index(visit.location_id, self.partition_id);
        if local >= self.locations.len() {
            panic!(
                "partition {}: received visit to location {} outside of local range [0, {})",
                self.partition_id,
                visit.location_id,
                self.locations.len()
            );
        }
        let location = &mut self.locations[local];
        if location.unique_id() != visit.location_id {
            panic!(
                "partition {}: visit by person {} to location {} received by location {}",
                self.partition_id,
                visit.person_id,
                visit.location_id,
                location.unique_id()
            );
        }

        if !location.accepts_visit(&visit) {
            return;
        }

        let mut arrival = Event {
            event_type: EventType::Arrival,
            person_id: visit.person_id,
            person_state: visit.person_state,
            transmission_modifier: visit.transmission_modifier,
            scheduled_time: visit.visit_start,
            partner_time: 0,
        };
        let mut departure =
            Event { event_type: EventType::Departure, scheduled_time: visit.visit_end, ..arrival };
        Event::pair(&mut arrival, &mut departure);

        if arrival.scheduled_time > departure.scheduled_time {
            panic!(
                "partition {}: visit by person {} to location {} has departure ({}) before \
                 arrival ({})",
                self.partition_id,
                visit.person_id,
                visit.location_id,
                departure.scheduled_time,
                arrival.scheduled_time
            );
        }

        location.add_event(arrival);
        location.add_event(departure);
    }

    /// Compute phase: sweep every location and route the resulting
    /// interaction bundles to the partitions owning the exposed people.
    pub fn compute_interactions(&mut self) {
        let scenario = &self.scenario;
        for location in &mut self.locations {
            let messages = location
                .process_events(&scenario.disease_model, scenario.contact_model.as_ref());
            for message in messages {
                let destination = scenario.partitioner.people.partition_of(message.person_id);
                self.interaction_outbox.send(destination, message);
            }
        }
        self.interaction_outbox.flush_all();
        self.day += 1;
    }

    pub fn apply_intervention(&mut self, index: usize) {
        let intervention = &self.scenario.intervention_model.location_interventions[index];
        for location in &mut self.locations {
            if location.complies_with(index) && intervention.test(location) {
                intervention.apply(location);
            }
        }
    }

    pub fn revert_intervention(&mut self, index: usize) {
        let intervention = &self.scenario.intervention_model.location_interventions[index];
        for location in &mut self.locations {
            intervention.revert(location);
        }
    }
}

fn ack(reductions: &Sender<Reduction>, reduction: Reduction) {
    if reductions.send(reduction).is_err() {
        panic!("coordinator hung up mid-run");
    }
}
