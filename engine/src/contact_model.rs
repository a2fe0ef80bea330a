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

use anyhow::Result;
use rand::Rng;

use crate::attributes::{AttributeTable, Value};
use crate::models::events::Event;
use crate::utils::RandomWrapper;

const DEFAULT_CONTACT_PROBABILITY: f64 = 0.5;

// Constants shaping each location's contact probability in the
// min-max-alpha model.
const MIN: f64 = 5.0;
const MAX: f64 = 40.0;
const ALPHA: f64 = 1000.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContactModelType {
    ConstantProbability,
    MinMaxAlpha,
}

/// Decides whether two co-present visitors actually came into contact.
/// Implementations may precompute a per-location value at load time by
/// appending an attribute to the location schema.
pub trait ContactModel: Send + Sync {
    /// Called once per location after its attributes are loaded.
    fn compute_location_values(&self, _values: &mut Vec<Value>) {}

    fn made_contact(
        &self,
        susceptible_event: &Event,
        infectious_event: &Event,
        location_values: &[Value],
        rng: &mut RandomWrapper,
    ) -> bool;
}

pub fn create_contact_model(
    model_type: ContactModelType,
    location_attributes: &mut AttributeTable,
) -> Result<Box<dyn ContactModel>> {
    Ok(match model_type {
        ContactModelType::ConstantProbability => Box::new(ConstantProbabilityModel),
        ContactModelType::MinMaxAlpha => Box::new(MinMaxAlphaModel::new(location_attributes)?),
    })
}

/// Every pair of co-present visitors meets with a flat probability.
pub struct ConstantProbabilityModel;

impl ContactModel for ConstantProbabilityModel {
    fn made_contact(
        &self,
        _susceptible_event: &Event,
        _infectious_event: &Event,
        _location_values: &[Value],
        rng: &mut RandomWrapper,
    ) -> bool {
        rng.get().gen::<f64>() < DEFAULT_CONTACT_PROBABILITY
    }
}

/// Contact probability saturating with a location's capacity: busier places
/// dilute the chance that any two particular visitors meet.
pub struct MinMaxAlphaModel {
    max_visits_index: usize,
    contact_probability_index: usize,
}

impl MinMaxAlphaModel {
    pub fn new(location_attributes: &mut AttributeTable) -> Result<MinMaxAlphaModel> {
        let max_visits_index = location_attributes.require("max_simultaneous_visits")?;
        let contact_probability_index =
            location_attributes.push("contact_probability", Value::Double(0.0));
        Ok(MinMaxAlphaModel { max_visits_index, contact_probability_index })
    }
}

impl ContactModel for MinMaxAlphaModel {
    fn compute_location_values(&self, values: &mut Vec<Value>) {
        let max_visits = values[self.max_visits_index].as_double();
        let probability =
            ((MIN + (MAX - MIN) * (1.0 - (-max_visits / ALPHA).exp())) / (max_visits - 1.0)).min(1.0);
        values[self.contact_probability_index] = Value::Double(probability);
    }

    fn made_contact(
        &self,
        _susceptible_event: &Event,
        _infectious_event: &Event,
        location_values: &[Value],
        rng: &mut RandomWrapper,
    ) -> bool {
        let probability = location_values[self.contact_probability_index].as_double();
        rng.get().gen::<f64>() < probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::custom_types::Time;
    use crate::models::events::EventType;

    fn event(time: Time) -> Event {
        Event {
            event_type: EventType::Arrival,
            person_id: 0,
            person_state: 0,
            transmission_modifier: 1.0,
            scheduled_time: time,
            partner_time: time + 100,
        }
    }

    #[test]
    fn min_max_alpha_appends_the_probability_attribute() {
        let mut table = AttributeTable::new();
        table.push("max_simultaneous_visits", Value::Int(0));
        let model = MinMaxAlphaModel::new(&mut table).unwrap();

        let mut values = vec![Value::Int(1000)];
        values.push(Value::Double(0.0));
        model.compute_location_values(&mut values);

        let p = values[1].as_double();
        let expected = ((5.0 + 35.0 * (1.0 - (-1.0f64).exp())) / 999.0).min(1.0);
        assert!((p - expected).abs() < 1e-12);
    }

    #[test]
    fn tiny_locations_saturate_at_probability_one() {
        let mut table = AttributeTable::new();
        table.push("max_simultaneous_visits", Value::Int(0));
        let model = MinMaxAlphaModel::new(&mut table).unwrap();

        let mut values = vec![Value::Int(2), Value::Double(0.0)];
        model.compute_location_values(&mut values);
        assert_eq!(values[1].as_double(), 1.0);

        // With probability one the draw can never miss.
        let mut rng = RandomWrapper::for_location(0, 0);
        for _ in 0..50 {
            assert!(model.made_contact(&event(0), &event(10), &values, &mut rng));
        }
    }

    #[test]
    fn min_max_alpha_requires_the_capacity_attribute() {
        let mut table = AttributeTable::new();
        assert!(MinMaxAlphaModel::new(&mut table).is_err());
    }

    #[test]
    fn constant_model_is_roughly_fair() {
        let model = ConstantProbabilityModel;
        let mut rng = RandomWrapper::for_location(0, 0);
        let contacts = (0..1000)
            .filter(|_| model.made_contact(&event(0), &event(10), &[], &mut rng))
            .count();
        assert!(contacts > 400 && contacts < 600);
    }
}
