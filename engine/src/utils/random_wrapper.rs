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

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::models::custom_types::Id;

// Stream salts keep person, location, and coordinator draws independent even
// when a person and a location share a numeric id.
const PERSON_STREAM: u64 = 0x01;
const LOCATION_STREAM: u64 = 0x02;

/// A seeded random stream. Every agent owns one, derived from the global seed
/// and its unique id, so its draws do not depend on which partition hosts it.
#[derive(Clone, Debug)]
pub struct RandomWrapper {
    rng: StdRng,
}

impl RandomWrapper {
    pub fn for_person(seed: u64, unique_id: Id) -> RandomWrapper {
        RandomWrapper::from_stream(seed, PERSON_STREAM, unique_id)
    }

    pub fn for_location(seed: u64, unique_id: Id) -> RandomWrapper {
        RandomWrapper::from_stream(seed, LOCATION_STREAM, unique_id)
    }

    /// The coordinator's stream, used only for picking seeded infections.
    pub fn global(seed: u64) -> RandomWrapper {
        RandomWrapper { rng: StdRng::seed_from_u64(splitmix64(seed)) }
    }

    fn from_stream(seed: u64, stream: u64, unique_id: Id) -> RandomWrapper {
        let mixed = splitmix64(seed ^ splitmix64(stream ^ splitmix64(unique_id as u64)));
        RandomWrapper { rng: StdRng::seed_from_u64(mixed) }
    }

    pub fn get(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn same_seed_and_id_give_the_same_stream() {
        let mut a = RandomWrapper::for_person(42, 7);
        let mut b = RandomWrapper::for_person(42, 7);
        for _ in 0..10 {
            assert_eq!(a.get().gen::<u64>(), b.get().gen::<u64>());
        }
    }

    #[test]
    fn different_ids_give_different_streams() {
        let mut a = RandomWrapper::for_person(42, 7);
        let mut b = RandomWrapper::for_person(42, 8);
        assert_ne!(a.get().gen::<u64>(), b.get().gen::<u64>());
    }

    #[test]
    fn person_and_location_streams_are_independent() {
        let mut a = RandomWrapper::for_person(42, 7);
        let mut b = RandomWrapper::for_location(42, 7);
        assert_ne!(a.get().gen::<u64>(), b.get().gen::<u64>());
    }
}
