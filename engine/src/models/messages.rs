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

use serde::{Deserialize, Serialize};

use crate::models::custom_types::{Id, StateId, Time};

/// A scheduled presence of a person at a location. Instances stored in a
/// person's weekly schedule carry a placeholder state and modifier; both are
/// overlaid with the person's current values when the visit is dispatched.
/// Visits never cross midnight; the loader splits them at the day boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Visit {
    pub location_id: Id,
    pub person_id: Id,
    pub person_state: StateId,
    pub visit_start: Time,
    pub visit_end: Time,
    /// Susceptibility or infectivity, depending on disease state.
    pub transmission_modifier: f64,
}

/// One potential infection: a susceptible and an infectious person were
/// co-present at a location and the contact model said they met.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Interaction {
    /// Poisson-process parameter; `P(no infection) = exp(-propensity)`.
    pub propensity: f64,
    pub infectious_id: Id,
    pub infectious_state: StateId,
    pub start_time: Time,
    pub end_time: Time,
}

/// All interactions a single susceptible person accumulated at one location
/// during a day, routed back to the partition owning that person.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InteractionMessage {
    pub location_id: Id,
    pub person_id: Id,
    pub interactions: Vec<Interaction>,
}
