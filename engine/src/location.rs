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

use std::collections::BinaryHeap;

use fxhash::FxHashMap;

use crate::attributes::Value;
use crate::contact_model::ContactModel;
use crate::disease_model::DiseaseModel;
use crate::entity::{Entity, VisitFilters};
use crate::models::custom_types::Id;
use crate::models::events::{Event, EventType, PendingArrival};
use crate::models::messages::{Interaction, InteractionMessage, Visit};
use crate::utils::RandomWrapper;

/// A single place people visit. Holds the day's arrival/departure events
/// while they accumulate; the buffer is empty between days.
pub struct Location {
    unique_id: Id,
    pub events: Vec<Event>,
    values: Vec<Value>,
    compliance: Vec<bool>,
    filters: VisitFilters,
    rng: RandomWrapper,
}

impl Location {
    pub fn new(unique_id: Id, values: Vec<Value>, num_interventions: usize, seed: u64) -> Location {
        Location {
            unique_id,
            events: Vec::new(),
            values,
            compliance: vec![false; num_interventions],
            filters: VisitFilters::new(),
            rng: RandomWrapper::for_location(seed, unique_id),
        }
    }

    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Clears any state kept for tracking a specific day's visits.
    pub fn reset(&mut self) {
        self.events.clear();
    }

    /// Sweeps the day's events in time order, computing the exposure
    /// interactions between co-present infectious and susceptible visitors.
    /// Each susceptible person's interactions at this location are flushed as
    /// one message when their departure is processed.
    ///
    /// Both heaps are keyed by partner (departure) time. Because events are
    /// processed in sorted order and each departure's partner time equals its
    /// visitor's arrival time, the visitor departing now is always the root
    /// of its heap, so removal is a pop rather than a scan.
    pub fn process_events(
        &mut self,
        disease_model: &DiseaseModel,
        contact_model: &dyn ContactModel,
    ) -> Vec<InteractionMessage> {
        let mut events = std::mem::take(&mut self.events);
        events.sort();

        let mut susceptible_arrivals: BinaryHeap<PendingArrival> = BinaryHeap::new();
        let mut infectious_arrivals: BinaryHeap<PendingArrival> = BinaryHeap::new();
        let mut interactions: FxHashMap<Id, Vec<Interaction>> = FxHashMap::default();
        let mut messages = Vec::new();

        for event in events {
            let susceptible = disease_model.is_susceptible(event.person_state);
            let infectious = disease_model.is_infectious(event.person_state);
            // A person who can neither infect nor be infected is ignored.
            if !susceptible && !infectious {
                continue;
            }

            let arrivals =
                if susceptible { &mut susceptible_arrivals } else { &mut infectious_arrivals };
            match event.event_type {
                EventType::Arrival => arrivals.push(PendingArrival(event)),
                EventType::Departure => {
                    let arrival = match arrivals.pop() {
                        Some(arrival) => arrival.0,
                        None => panic!(
                            "departure of person {} at location {} without a matching arrival",
                            event.person_id, self.unique_id
                        ),
                    };
                    debug_assert_eq!(
                        arrival.person_id, event.person_id,
                        "heap root does not match the departing visitor at location {}",
                        self.unique_id
                    );

                    if susceptible {
                        // Each infectious person still present might have
                        // infected this susceptible person.
                        for present in infectious_arrivals.iter() {
                            let infectious_arrival = &present.0;
                            if !contact_model.made_contact(
                                &event,
                                infectious_arrival,
                                &self.values,
                                &mut self.rng,
                            ) {
                                continue;
                            }
                            let start = infectious_arrival.scheduled_time.max(event.partner_time);
                            let end = event.scheduled_time;
                            interactions.entry(event.person_id).or_default().push(Interaction {
                                propensity: disease_model.propensity(
                                    event.person_state,
                                    infectious_arrival.person_state,
                                    end - start,
                                    event.transmission_modifier,
                                    infectious_arrival.transmission_modifier,
                                ),
                                infectious_id: infectious_arrival.person_id,
                                infectious_state: infectious_arrival.person_state,
                                start_time: start,
                                end_time: end,
                            });
                        }
                        if let Some(list) = interactions.remove(&event.person_id) {
                            messages.push(InteractionMessage {
                                location_id: self.unique_id,
                                person_id: event.person_id,
                                interactions: list,
                            });
                        }
                    } else {
                        // Each susceptible person still present might have
                        // been infected by this infectious person.
                        for present in susceptible_arrivals.iter() {
                            let susceptible_arrival = &present.0;
                            if !contact_model.made_contact(
                                susceptible_arrival,
                                &event,
                                &self.values,
                                &mut self.rng,
                            ) {
                                continue;
                            }
                            let start = susceptible_arrival.scheduled_time.max(event.partner_time);
                            let end = event.scheduled_time;
                            interactions.entry(susceptible_arrival.person_id).or_default().push(
                                Interaction {
                                    propensity: disease_model.propensity(
                                        susceptible_arrival.person_state,
                                        event.person_state,
                                        end - start,
                                        susceptible_arrival.transmission_modifier,
                                        event.transmission_modifier,
                                    ),
                                    infectious_id: event.person_id,
                                    infectious_state: event.person_state,
                                    start_time: start,
                                    end_time: end,
                                },
                            );
                        }
                    }
                }
            }
        }

        debug_assert!(
            susceptible_arrivals.is_empty() && infectious_arrivals.is_empty(),
            "unpaired arrivals left at location {} after the day's sweep",
            self.unique_id
        );
        self.reset();
        messages
    }
}

impl Entity for Location {
    fn unique_id(&self) -> Id {
        self.unique_id
    }

    fn values(&self) -> &[Value] {
        &self.values
    }

    fn values_mut(&mut self) -> &mut Vec<Value> {
        &mut self.values
    }

    fn rng(&mut self) -> &mut RandomWrapper {
        &mut self.rng
    }

    fn complies_with(&self, intervention: usize) -> bool {
        self.compliance[intervention]
    }

    fn set_compliance(&mut self, intervention: usize, comply: bool) {
        self.compliance[intervention] = comply;
    }

    fn filters_mut(&mut self) -> &mut VisitFilters {
        &mut self.filters
    }

    fn accepts_visit(&self, visit: &Visit) -> bool {
        self.filters.accepts(visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::custom_types::Time;

    struct AlwaysContact;

    impl ContactModel for AlwaysContact {
        fn made_contact(
            &self,
            _susceptible_event: &Event,
            _infectious_event: &Event,
            _location_values: &[Value],
            _rng: &mut RandomWrapper,
        ) -> bool {
            true
        }
    }

    fn model() -> DiseaseModel {
        DiseaseModel::from_json_str(
            r#"{
                "transmissibility": 1.0,
                "starting_states": [{"starting_state": "susceptible"}],
                "disease_states": [
                    {"state_label": "susceptible", "susceptibility": 1.0,
                     "exposure_transition": {"next_state": "infectious"}},
                    {"state_label": "infectious", "infectivity": 1.0},
                    {"state_label": "recovered"}
                ]
            }"#,
        )
        .unwrap()
    }

    fn add_visit(location: &mut Location, person_id: Id, state: usize, start: Time, end: Time) {
        let mut arrival = Event {
            event_type: EventType::Arrival,
            person_id,
            person_state: state,
            transmission_modifier: 1.0,
            scheduled_time: start,
            partner_time: 0,
        };
        let mut departure = Event { event_type: EventType::Departure, scheduled_time: end, ..arrival };
        Event::pair(&mut arrival, &mut departure);
        location.add_event(arrival);
        location.add_event(departure);
    }

    #[test]
    fn overlapping_visitors_interact_over_their_overlap_window() {
        let disease = model();
        let mut location = Location::new(0, Vec::new(), 0, 0);
        // Infectious person 1 is present 100..1000, susceptible person 2
        // 500..2000; they overlap for 500 seconds.
        add_visit(&mut location, 1, 1, 100, 1000);
        add_visit(&mut location, 2, 0, 500, 2000);

        let messages = location.process_events(&disease, &AlwaysContact);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].person_id, 2);

        let interaction = &messages[0].interactions[0];
        assert_eq!(interaction.infectious_id, 1);
        assert_eq!(interaction.start_time, 500);
        assert_eq!(interaction.end_time, 1000);
        assert_eq!(interaction.propensity, 500.0);
    }

    #[test]
    fn disjoint_visitors_never_interact() {
        let disease = model();
        let mut location = Location::new(0, Vec::new(), 0, 0);
        add_visit(&mut location, 1, 1, 0, 400);
        add_visit(&mut location, 2, 0, 400, 900);

        // The infectious departure at 400 sorts before the susceptible
        // arrival at 400, so the two are never co-present.
        let messages = location.process_events(&disease, &AlwaysContact);
        assert!(messages.is_empty());
    }

    #[test]
    fn neutral_visitors_are_ignored() {
        let disease = model();
        let mut location = Location::new(0, Vec::new(), 0, 0);
        add_visit(&mut location, 1, 2, 0, 1000);
        add_visit(&mut location, 2, 0, 0, 1000);

        let messages = location.process_events(&disease, &AlwaysContact);
        assert!(messages.is_empty());
        assert!(location.events.is_empty());
    }

    #[test]
    fn susceptible_interactions_flush_on_their_departure() {
        let disease = model();
        let mut location = Location::new(0, Vec::new(), 0, 0);
        // Two infectious people overlap one susceptible person; both
        // exposures travel in a single message.
        add_visit(&mut location, 1, 1, 0, 3000);
        add_visit(&mut location, 3, 1, 0, 500);
        add_visit(&mut location, 2, 0, 100, 1000);

        let messages = location.process_events(&disease, &AlwaysContact);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].interactions.len(), 2);

        let by_infector: Vec<Id> =
            messages[0].interactions.iter().map(|i| i.infectious_id).collect();
        assert!(by_infector.contains(&1) && by_infector.contains(&3));
    }

    #[test]
    #[should_panic]
    fn unmatched_departure_is_fatal() {
        let disease = model();
        let mut location = Location::new(0, Vec::new(), 0, 0);
        location.add_event(Event {
            event_type: EventType::Departure,
            person_id: 5,
            person_state: 0,
            transmission_modifier: 1.0,
            scheduled_time: 100,
            partner_time: 0,
        });
        location.process_events(&disease, &AlwaysContact);
    }
}
