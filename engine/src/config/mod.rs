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

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::contact_model::ContactModelType;
use crate::models::constants::{DAYS_TO_SEED_INFECTION, INITIAL_INFECTIONS_PER_DAY};
use crate::models::custom_types::{Day, Id};
use crate::transport::aggregator::AggregatorParam;

pub mod scenario;
pub mod schema;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridDim {
    pub width: Id,
    pub height: Id,
}

impl GridDim {
    pub fn new(width: Id, height: Id) -> GridDim {
        GridDim { width, height }
    }

    pub fn area(&self) -> Id {
        self.width * self.height
    }
}

/// Parameters of a procedurally generated scenario: people on a grid of
/// locations, split into rectangular location-partition blocks.
#[derive(Clone, Debug)]
pub struct OnTheFlyArguments {
    pub people_grid: GridDim,
    pub location_grid: GridDim,
    pub location_partition_grid: GridDim,
    /// Block of locations owned by one partition; derived.
    pub local_location_grid: GridDim,
    pub average_visits_per_day: f64,
}

impl OnTheFlyArguments {
    pub fn new(
        people_grid: GridDim,
        location_grid: GridDim,
        location_partition_grid: GridDim,
        average_visits_per_day: f64,
    ) -> Result<OnTheFlyArguments> {
        if people_grid.width < location_grid.width || people_grid.height < location_grid.height {
            bail!("people grid must be at least as large as the location grid");
        }
        if location_grid.width % location_partition_grid.width != 0
            || location_grid.height % location_partition_grid.height != 0
        {
            bail!(
                "dimensions of the location partition grid must divide those of the \
                 location grid: partition grid is {} by {}, location grid is {} by {}",
                location_partition_grid.width,
                location_partition_grid.height,
                location_grid.width,
                location_grid.height
            );
        }
        let local_location_grid = GridDim::new(
            location_grid.width / location_partition_grid.width,
            location_grid.height / location_partition_grid.height,
        );
        Ok(OnTheFlyArguments {
            people_grid,
            location_grid,
            location_partition_grid,
            local_location_grid,
            average_visits_per_day,
        })
    }
}

#[derive(Clone, Debug)]
pub enum RunMode {
    RealData { scenario_dir: PathBuf },
    OnTheFly(OnTheFlyArguments),
}

/// Everything a run needs, resolved from the command line and environment.
#[derive(Clone, Debug)]
pub struct Arguments {
    pub run_mode: RunMode,
    pub num_people_partitions: usize,
    pub num_location_partitions: usize,
    pub num_days: Day,
    /// The schedule periodicity W.
    pub num_visit_days: usize,
    pub output_dir: PathBuf,
    pub disease_model_path: PathBuf,
    pub intervention_path: Option<PathBuf>,
    pub contact_model: ContactModelType,
    pub seed: u64,
    pub days_to_seed_infection: Day,
    pub initial_infections_per_day: usize,
    /// Explicit seed targets; when set, all are injected on day zero instead
    /// of drawing ids from the coordinator's stream.
    pub initial_infections: Option<Vec<Id>>,
    pub visit_aggregation: Option<AggregatorParam>,
    pub interact_aggregation: Option<AggregatorParam>,
}

impl Arguments {
    pub fn new(
        run_mode: RunMode,
        num_people_partitions: usize,
        num_location_partitions: usize,
        num_days: Day,
        num_visit_days: usize,
        output_dir: PathBuf,
        disease_model_path: PathBuf,
    ) -> Arguments {
        Arguments {
            run_mode,
            num_people_partitions,
            num_location_partitions,
            num_days,
            num_visit_days,
            output_dir,
            disease_model_path,
            intervention_path: None,
            contact_model: ContactModelType::ConstantProbability,
            seed: 0,
            days_to_seed_infection: DAYS_TO_SEED_INFECTION,
            initial_infections_per_day: INITIAL_INFECTIONS_PER_DAY,
            initial_infections: None,
            visit_aggregation: None,
            interact_aggregation: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_people_partitions == 0 || self.num_location_partitions == 0 {
            bail!("partition counts must be positive");
        }
        if self.num_days == 0 {
            bail!("number of days must be positive");
        }
        if self.num_visit_days == 0 {
            bail!("number of distinct visit days must be positive");
        }
        Ok(())
    }
}
