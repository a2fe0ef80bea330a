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

use rand::Rng;

use crate::attributes::{AttributeTable, Value};
use crate::entity::Entity;
use crate::interventions::Intervention;
use crate::models::custom_types::Percentage;
use crate::person::Person;

/// Vaccinates unvaccinated people with a per-day probability, lowering their
/// susceptibility modifier. Vaccination is not undone on trigger-off.
pub struct VaccinationIntervention {
    compliance: Percentage,
    trigger_index: usize,
    vaccination_probability: f64,
    vaccinated_susceptibility: f64,
    vaccinated_index: usize,
    susceptibility_index: usize,
}

impl VaccinationIntervention {
    pub fn new(
        compliance: Percentage,
        trigger_index: usize,
        probability: f64,
        vaccinated_susceptibility: f64,
        person_attributes: &mut AttributeTable,
    ) -> VaccinationIntervention {
        VaccinationIntervention {
            compliance,
            trigger_index,
            vaccination_probability: probability,
            vaccinated_susceptibility,
            vaccinated_index: person_attributes.ensure("vaccinated", Value::Bool(false)),
            susceptibility_index: person_attributes.ensure("susceptibility", Value::Double(1.0)),
        }
    }
}

impl Intervention<Person> for VaccinationIntervention {
    fn trigger_index(&self) -> usize {
        self.trigger_index
    }

    fn compliance(&self) -> Percentage {
        self.compliance
    }

    fn test(&self, person: &mut Person) -> bool {
        if person.values()[self.vaccinated_index].truthy() {
            return false;
        }
        person.rng().get().gen::<f64>() < self.vaccination_probability
    }

    fn apply(&self, person: &mut Person) {
        let values = person.values_mut();
        values[self.vaccinated_index] = Value::Bool(true);
        values[self.susceptibility_index] = Value::Double(self.vaccinated_susceptibility);
    }

    fn revert(&self, _person: &mut Person) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_person(table: &AttributeTable) -> Person {
        Person::new(0, table.defaults(), 1, 7, 42)
    }

    #[test]
    fn apply_sets_the_vaccinated_attributes() {
        let mut table = AttributeTable::new();
        let intervention = VaccinationIntervention::new(1.0, 0, 1.0, 0.2, &mut table);
        let mut person = make_person(&table);

        assert!(intervention.test(&mut person));
        intervention.apply(&mut person);

        assert!(person.values()[0].truthy());
        assert_eq!(person.values()[1].as_double(), 0.2);
    }

    #[test]
    fn already_vaccinated_people_fail_the_test() {
        let mut table = AttributeTable::new();
        let intervention = VaccinationIntervention::new(1.0, 0, 1.0, 0.2, &mut table);
        let mut person = make_person(&table);

        intervention.apply(&mut person);
        assert!(!intervention.test(&mut person));
    }
}
