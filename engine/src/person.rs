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

use crate::attributes::Value;
use crate::entity::{Entity, VisitFilters};
use crate::models::custom_types::{Id, StateId, Time};
use crate::models::messages::{Interaction, Visit};
use crate::utils::RandomWrapper;

/// A single simulated person: current and scheduled disease state, the
/// periodic weekly visit schedule, and the day's accumulated interactions.
pub struct Person {
    unique_id: Id,
    pub state: StateId,
    /// Set at exposure (or by a timed transition), actualized when the state
    /// timer runs out.
    pub next_state: StateId,
    pub seconds_left_in_state: Time,
    /// `visits_by_day[d]` holds the visits scheduled for weekday `d`, sorted
    /// by start time. Length is the schedule periodicity W.
    pub visits_by_day: Vec<Vec<Visit>>,
    /// Interactions received from location partitions; cleared at end of day.
    pub interactions: Vec<Interaction>,
    values: Vec<Value>,
    compliance: Vec<bool>,
    filters: VisitFilters,
    rng: RandomWrapper,
}

impl Person {
    pub fn new(
        unique_id: Id,
        values: Vec<Value>,
        num_interventions: usize,
        num_visit_days: usize,
        seed: u64,
    ) -> Person {
        Person {
            unique_id,
            state: 0,
            next_state: 0,
            seconds_left_in_state: Time::MAX,
            visits_by_day: vec![Vec::new(); num_visit_days],
            interactions: Vec::new(),
            values,
            compliance: vec![false; num_interventions],
            filters: VisitFilters::new(),
            rng: RandomWrapper::for_person(seed, unique_id),
        }
    }

    pub fn schedule_visit(&mut self, day: usize, visit: Visit) {
        self.visits_by_day[day].push(visit);
    }

    /// Called once after loading; the engine relies on per-day schedules
    /// being ordered by start time.
    pub fn sort_schedule(&mut self) {
        for visits in &mut self.visits_by_day {
            visits.sort_by_key(|v| (v.visit_start, v.visit_end, v.location_id));
        }
    }

    pub fn is_in_disease_progression(&self) -> bool {
        self.seconds_left_in_state != Time::MAX
    }
}

impl Entity for Person {
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

    fn visit(location_id: Id, start: Time, end: Time) -> Visit {
        Visit {
            location_id,
            person_id: 0,
            person_state: 0,
            visit_start: start,
            visit_end: end,
            transmission_modifier: 1.0,
        }
    }

    #[test]
    fn schedule_sorts_by_start_time() {
        let mut person = Person::new(0, Vec::new(), 0, 2, 0);
        person.schedule_visit(0, visit(1, 500, 700));
        person.schedule_visit(0, visit(2, 100, 300));
        person.schedule_visit(1, visit(3, 0, 50));
        person.sort_schedule();

        let starts: Vec<Time> = person.visits_by_day[0].iter().map(|v| v.visit_start).collect();
        assert_eq!(starts, vec![100, 500]);
        assert_eq!(person.visits_by_day[1].len(), 1);
    }

    #[test]
    fn new_person_is_outside_any_progression() {
        let person = Person::new(9, Vec::new(), 0, 7, 0);
        assert!(!person.is_in_disease_progression());
        assert_eq!(person.state, person.next_state);
    }
}
