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

use anyhow::{bail, Result};

use crate::models::custom_types::{Id, PartitionId};

/// Bidirectional mapping between global entity ids and (partition, local
/// index) pairs for one entity kind. Partition `p` owns the id range
/// `[offsets[p], offsets[p+1])`; the last partition ends at
/// `first_id + num_entities`. Pure and immutable once built.
#[derive(Clone, Debug)]
pub struct Partitioning {
    offsets: Vec<Id>,
    num_entities: Id,
    first_id: Id,
}

impl Partitioning {
    /// Builds from explicit scenario-provided offsets.
    pub fn from_offsets(offsets: Vec<Id>, num_entities: Id, first_id: Id) -> Result<Partitioning> {
        if offsets.is_empty() {
            bail!("partitioning requires at least one offset");
        }
        if num_entities < offsets.len() as Id {
            bail!(
                "running with more partitions ({}) than entities ({})",
                offsets.len(),
                num_entities
            );
        }
        let last_id = first_id + num_entities;
        for (i, &offset) in offsets.iter().enumerate() {
            if offset < first_id || offset >= last_id {
                bail!("offset {} outside of valid range [{}, {})", offset, first_id, last_id);
            }
            if i > 0 && offsets[i - 1] > offset {
                bail!("offset {} ({}-th offset) out of order", offset, i);
            }
        }
        Ok(Partitioning { offsets, num_entities, first_id })
    }

    /// Puts about the same number of entities in each partition, larger
    /// partitions first.
    pub fn uniform(
        num_partitions: PartitionId,
        num_entities: Id,
        first_id: Id,
    ) -> Result<Partitioning> {
        if num_partitions == 0 {
            bail!("partitioning requires at least one partition");
        }
        if num_entities < num_partitions as Id {
            bail!(
                "running with more partitions ({}) than entities ({})",
                num_partitions,
                num_entities
            );
        }
        let per_partition = (num_entities + num_partitions as Id - 1) / num_partitions as Id;
        let mut num_larger = num_entities % num_partitions as Id;
        if num_larger == 0 {
            num_larger = num_partitions as Id;
        }

        let offsets = (0..num_partitions as Id)
            .map(|p| {
                let offset = p * per_partition + first_id;
                if p < num_larger {
                    offset
                } else {
                    offset - (p - num_larger)
                }
            })
            .collect();
        Partitioning::from_offsets(offsets, num_entities, first_id)
    }

    /// The partition owning a global id: `upper_bound(offsets, id) - 1`.
    pub fn partition_of(&self, global_id: Id) -> PartitionId {
        if global_id < self.first_id || global_id >= self.first_id + self.num_entities {
            panic!(
                "id {} outside of valid range [{}, {})",
                global_id,
                self.first_id,
                self.first_id + self.num_entities
            );
        }
        self.offsets.partition_point(|&offset| offset <= global_id) - 1
    }

    pub fn local_index(&self, global_id: Id, partition: PartitionId) -> usize {
        (global_id - self.offsets[partition]) as usize
    }

    pub fn global_id(&self, local_index: usize, partition: PartitionId) -> Id {
        self.offsets[partition] + local_index as Id
    }

    pub fn size_of(&self, partition: PartitionId) -> usize {
        if partition == self.offsets.len() - 1 {
            (self.num_entities + self.first_id - self.offsets[partition]) as usize
        } else {
            (self.offsets[partition + 1] - self.offsets[partition]) as usize
        }
    }

    pub fn num_partitions(&self) -> PartitionId {
        self.offsets.len()
    }

    pub fn num_entities(&self) -> Id {
        self.num_entities
    }

    pub fn first_id(&self) -> Id {
        self.first_id
    }
}

/// The two partitionings a run needs, bundled for the scenario.
#[derive(Clone, Debug)]
pub struct Partitioner {
    pub people: Partitioning,
    pub locations: Partitioning,
}
