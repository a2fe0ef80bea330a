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

//! Distributed agent-based epidemic simulation engine: people and location
//! partitions exchange visits and exposure interactions under a strict
//! per-day phase barrier driven by the coordinator.

#[macro_use]
extern crate log;

pub mod attributes;
pub mod config;
pub mod contact_model;
pub mod disease_model;
pub mod entity;
pub mod epidemiology_simulation;
pub mod interventions;
pub mod listeners;
pub mod location;
pub mod models;
pub mod partitioner;
pub mod partitions;
pub mod person;
pub mod transport;
pub mod utils;

pub use epidemiology_simulation::Epidemiology;
