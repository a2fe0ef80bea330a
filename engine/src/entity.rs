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

use std::sync::Arc;

use fxhash::FxHashMap;

use crate::attributes::Value;
use crate::models::custom_types::Id;
use crate::models::messages::Visit;
use crate::utils::RandomWrapper;

/// Predicate installed by an intervention; a visit is kept only while every
/// installed filter returns true for it.
pub type VisitTest = Arc<dyn Fn(&Visit) -> bool + Send + Sync>;

/// The capability set people and locations share: a stable id, a dynamic
/// attribute vector, a seeded random stream, per-intervention compliance, and
/// a set of visit filters. The intervention dispatcher is generic in this.
pub trait Entity {
    fn unique_id(&self) -> Id;
    fn values(&self) -> &[Value];
    fn values_mut(&mut self) -> &mut Vec<Value>;
    fn rng(&mut self) -> &mut RandomWrapper;
    fn complies_with(&self, intervention: usize) -> bool;
    fn set_compliance(&mut self, intervention: usize, comply: bool);
    fn filters_mut(&mut self) -> &mut VisitFilters;
    fn accepts_visit(&self, visit: &Visit) -> bool;
}

/// Visit filters keyed by the index of the installing intervention, so that
/// reverting an intervention removes exactly its own filter. Reinstalling a
/// present filter is idempotent.
#[derive(Clone, Default)]
pub struct VisitFilters {
    filters: FxHashMap<usize, VisitTest>,
}

impl VisitFilters {
    pub fn new() -> VisitFilters {
        VisitFilters::default()
    }

    pub fn install(&mut self, intervention: usize, keep: VisitTest) {
        self.filters.entry(intervention).or_insert(keep);
    }

    pub fn remove(&mut self, intervention: usize) {
        self.filters.remove(&intervention);
    }

    pub fn accepts(&self, visit: &Visit) -> bool {
        self.filters.values().all(|keep| keep(visit))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
