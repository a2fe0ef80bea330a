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

use crate::attributes::AttributeTable;
use crate::entity::Entity;
use crate::interventions::{install_reject_all, remove_visit_filter, Intervention};
use crate::location::Location;
use crate::models::custom_types::Percentage;

/// Closes locations flagged as schools: while the trigger holds, every visit
/// to a complying school is rejected.
pub struct SchoolClosureIntervention {
    index: usize,
    compliance: Percentage,
    trigger_index: usize,
    school_index: usize,
}

impl SchoolClosureIntervention {
    pub fn new(
        index: usize,
        compliance: Percentage,
        trigger_index: usize,
        location_attributes: &AttributeTable,
    ) -> Result<SchoolClosureIntervention> {
        Ok(SchoolClosureIntervention {
            index,
            compliance,
            trigger_index,
            school_index: location_attributes.require("school")?,
        })
    }
}

impl Intervention<Location> for SchoolClosureIntervention {
    fn trigger_index(&self) -> usize {
        self.trigger_index
    }

    fn compliance(&self) -> Percentage {
        self.compliance
    }

    fn test(&self, location: &mut Location) -> bool {
        location.values()[self.school_index].truthy()
    }

    fn apply(&self, location: &mut Location) {
        install_reject_all(location, self.index);
    }

    fn revert(&self, location: &mut Location) {
        remove_visit_filter(location, self.index);
    }
}
