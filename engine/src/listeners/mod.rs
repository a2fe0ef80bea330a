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

use crate::models::custom_types::{Count, Day};

pub mod csv_service;

/// One output row: a state's population on a day and its change since the
/// day before.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryRow {
    pub day: Day,
    pub state: String,
    pub total_in_state: Count,
    pub change_in_state: Count,
}

/// Observer of the coordinator's daily totals.
pub trait Listener {
    fn day_summarized(&mut self, rows: &[SummaryRow]);
    fn simulation_ended(&mut self);
}

/// Fans coordinator callbacks out to every registered listener.
pub struct Listeners {
    listeners: Vec<Box<dyn Listener>>,
}

impl Listeners {
    pub fn from(listeners: Vec<Box<dyn Listener>>) -> Listeners {
        Listeners { listeners }
    }

    pub fn day_summarized(&mut self, rows: &[SummaryRow]) {
        for listener in &mut self.listeners {
            listener.day_summarized(rows);
        }
    }

    pub fn simulation_ended(&mut self) {
        for listener in &mut self.listeners {
            listener.simulation_ended();
        }
    }
}
