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

use crate::models::custom_types::{Day, Time};

pub const DAY_LENGTH: Time = 86400;
pub const HOUR_LENGTH: Time = 3600;
pub const MINUTE_LENGTH: Time = 60;

pub const DAYS_IN_WEEK: usize = 7;

pub const DAYS_TO_SEED_INFECTION: Day = 7;
pub const INITIAL_INFECTIONS_PER_DAY: usize = 10;

/// Propensity assigned to the synthetic contact injected for seeded
/// infections. Large enough that the end-of-day roll always exposes the
/// person, small enough that summing it with real propensities stays finite.
pub const SEED_PROPENSITY: f64 = 1e300;

/// Mean grid distance of an on-the-fly visit from the home location.
pub const LOCATION_LAMBDA: f64 = 1.5;
