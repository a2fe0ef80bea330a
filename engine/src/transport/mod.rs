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

//! Phase commands and reductions exchanged between the coordinator and the
//! partition threads. Data messages (visits, interactions) travel on their
//! own channels, batched per sender; mpsc gives FIFO delivery per
//! sender-receiver pair, and the coordinator's barriers give happens-before
//! between phases.

pub mod aggregator;

use crate::models::custom_types::{Count, PartitionId};

/// Commands broadcast to the people collective.
#[derive(Clone, Debug)]
pub enum PeopleCommand {
    SendVisits,
    EndOfDay,
    ApplyIntervention(usize),
    RevertIntervention(usize),
    Finish,
}

/// Commands broadcast to the locations collective.
#[derive(Clone, Debug)]
pub enum LocationCommand {
    ComputeInteractions,
    ApplyIntervention(usize),
    RevertIntervention(usize),
    Finish,
}

/// A people partition's contribution to the end-of-day sum reduction.
#[derive(Clone, Debug)]
pub struct DailySummary {
    pub partition: PartitionId,
    /// One slot per disease state.
    pub state_counts: Vec<Count>,
    pub infectious_count: Count,
}

/// Acks and reduction contributions flowing back to the coordinator.
#[derive(Clone, Debug)]
pub enum Reduction {
    VisitsSent { partition: PartitionId },
    ComputeDone { partition: PartitionId },
    EndOfDay(DailySummary),
    InterventionDone { partition: PartitionId },
    Finished { partition: PartitionId },
}
