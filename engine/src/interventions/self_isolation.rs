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

use crate::interventions::{install_reject_all, remove_visit_filter, Intervention};
use crate::models::custom_types::Percentage;
use crate::person::Person;

/// Symptomatic people stay home: a filter cancelling the whole schedule is
/// installed while the trigger holds.
pub struct SelfIsolationIntervention {
    index: usize,
    compliance: Percentage,
    trigger_index: usize,
    /// Snapshot of the disease model's per-state symptomatic flags.
    symptomatic: Vec<bool>,
}

impl SelfIsolationIntervention {
    pub fn new(
        index: usize,
        compliance: Percentage,
        trigger_index: usize,
        symptomatic: Vec<bool>,
    ) -> SelfIsolationIntervention {
        SelfIsolationIntervention { index, compliance, trigger_index, symptomatic }
    }
}

impl Intervention<Person> for SelfIsolationIntervention {
    fn trigger_index(&self) -> usize {
        self.trigger_index
    }

    fn compliance(&self) -> Percentage {
        self.compliance
    }

    fn test(&self, person: &mut Person) -> bool {
        self.symptomatic[person.state]
    }

    fn apply(&self, person: &mut Person) {
        install_reject_all(person, self.index);
    }

    fn revert(&self, person: &mut Person) {
        remove_visit_filter(person, self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::models::custom_types::Time;
    use crate::models::messages::Visit;

    fn visit() -> Visit {
        Visit {
            location_id: 0,
            person_id: 0,
            person_state: 0,
            visit_start: 0,
            visit_end: 100 as Time,
            transmission_modifier: 1.0,
        }
    }

    #[test]
    fn only_symptomatic_people_pass_the_test() {
        let intervention = SelfIsolationIntervention::new(0, 1.0, 0, vec![false, true]);
        let mut person = Person::new(0, Vec::new(), 1, 7, 0);

        person.state = 0;
        assert!(!intervention.test(&mut person));
        person.state = 1;
        assert!(intervention.test(&mut person));
    }

    #[test]
    fn apply_cancels_the_schedule_and_revert_restores_it() {
        let intervention = SelfIsolationIntervention::new(0, 1.0, 0, vec![true]);
        let mut person = Person::new(0, Vec::new(), 1, 7, 0);

        assert!(person.accepts_visit(&visit()));
        intervention.apply(&mut person);
        assert!(!person.accepts_visit(&visit()));
        intervention.revert(&mut person);
        assert!(person.accepts_visit(&visit()));
    }
}
