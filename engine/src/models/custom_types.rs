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

/// Stable global identifier of a person or location.
pub type Id = i64;

/// Index of a chare-like partition within one of the two collectives.
pub type PartitionId = usize;

/// Seconds, either within a day or as a state-timer balance.
pub type Time = i64;

pub type Day = u32;

/// Index into the disease model's state table.
pub type StateId = usize;

pub type Count = i64;

pub type Percentage = f64;
