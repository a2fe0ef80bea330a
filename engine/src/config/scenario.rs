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

use std::collections::BinaryHeap;
use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::attributes::AttributeTable;
use crate::attributes::Value;
use crate::config::schema::CsvDefinition;
use crate::config::{Arguments, OnTheFlyArguments, RunMode};
use crate::contact_model::{create_contact_model, ContactModel};
use crate::disease_model::DiseaseModel;
use crate::entity::Entity;
use crate::interventions::InterventionModel;
use crate::location::Location;
use crate::models::constants::{DAY_LENGTH, LOCATION_LAMBDA};
use crate::models::custom_types::{Day, Id, Time};
use crate::models::messages::Visit;
use crate::partitioner::{Partitioner, Partitioning};
use crate::person::Person;

/// The immutable world every partition captures at construction: counts,
/// models, schemas, and run parameters. Shared by `Arc` across the partition
/// threads; nothing in here changes once the simulation starts.
pub struct Scenario {
    pub seed: u64,
    pub num_days: Day,
    pub num_visit_days: usize,
    pub partitioner: Partitioner,
    pub disease_model: DiseaseModel,
    pub contact_model: Box<dyn ContactModel>,
    pub intervention_model: InterventionModel,
    pub person_attributes: AttributeTable,
    pub location_attributes: AttributeTable,
    pub age_index: Option<usize>,
    pub susceptibility_index: Option<usize>,
    pub infectivity_index: Option<usize>,
    pub output_dir: PathBuf,
    pub days_to_seed_infection: Day,
    pub initial_infections_per_day: usize,
    pub initial_infections: Option<Vec<Id>>,
}

impl Scenario {
    pub fn num_people(&self) -> Id {
        self.partitioner.people.num_entities()
    }

    pub fn num_locations(&self) -> Id {
        self.partitioner.locations.num_entities()
    }

    /// Loads (or generates) the whole scenario and hands back the entity
    /// slices each partition will own.
    pub fn build(args: Arguments) -> Result<(Scenario, Vec<Vec<Person>>, Vec<Vec<Location>>)> {
        args.validate()?;
        let disease_model = DiseaseModel::load(&args.disease_model_path)?;

        let (mut person_attributes, mut location_attributes, person_def, location_def, visit_def) =
            match &args.run_mode {
                RunMode::RealData { scenario_dir } => {
                    let person_def = CsvDefinition::load(&scenario_dir.join("people.json"))?;
                    let location_def = CsvDefinition::load(&scenario_dir.join("locations.json"))?;
                    let visit_def = CsvDefinition::load(&scenario_dir.join("visits.json"))?;
                    (
                        person_def.attribute_table(),
                        location_def.attribute_table(),
                        Some(person_def),
                        Some(location_def),
                        Some(visit_def),
                    )
                }
                RunMode::OnTheFly(_) => {
                    let mut person_attributes = AttributeTable::new();
                    person_attributes.push("age", Value::Int(0));
                    let mut location_attributes = AttributeTable::new();
                    location_attributes.push("max_simultaneous_visits", Value::Int(50));
                    (person_attributes, location_attributes, None, None, None)
                }
            };

        let intervention_model = match &args.intervention_path {
            Some(path) => InterventionModel::load(
                path,
                &mut person_attributes,
                &mut location_attributes,
                &disease_model,
            )?,
            None => InterventionModel::empty(),
        };

        let contact_model = create_contact_model(args.contact_model, &mut location_attributes)?;

        let age_index = person_attributes.index_of("age");
        let susceptibility_index = person_attributes.index_of("susceptibility");
        let infectivity_index = person_attributes.index_of("infectivity");

        let num_person_interventions = intervention_model.person_interventions.len();
        let num_location_interventions = intervention_model.location_interventions.len();

        let (partitioner, mut people, mut locations) = match &args.run_mode {
            RunMode::RealData { scenario_dir } => load_scenario(
                scenario_dir,
                &args,
                person_def.as_ref().expect("schema loaded above"),
                location_def.as_ref().expect("schema loaded above"),
                visit_def.as_ref().expect("schema loaded above"),
                &person_attributes,
                &location_attributes,
                num_person_interventions,
                num_location_interventions,
            )?,
            RunMode::OnTheFly(on_the_fly) => generate_scenario(
                on_the_fly,
                &args,
                &person_attributes,
                &location_attributes,
                num_person_interventions,
                num_location_interventions,
            )?,
        };

        for person in people.iter_mut() {
            person.state = disease_model.healthy_state_for(person.values(), age_index)?;
            person.next_state = person.state;
            person.sort_schedule();
            for (index, intervention) in intervention_model.person_interventions.iter().enumerate()
            {
                let comply = intervention.will_comply(person.rng());
                person.set_compliance(index, comply);
            }
        }

        for location in locations.iter_mut() {
            contact_model.compute_location_values(location.values_mut());
            for (index, intervention) in
                intervention_model.location_interventions.iter().enumerate()
            {
                let comply = intervention.will_comply(location.rng());
                location.set_compliance(index, comply);
            }
        }

        let people_slices = split_by_partition(people, &partitioner.people);
        let location_slices = split_by_partition(locations, &partitioner.locations);

        let scenario = Scenario {
            seed: args.seed,
            num_days: args.num_days,
            num_visit_days: args.num_visit_days,
            partitioner,
            disease_model,
            contact_model,
            intervention_model,
            person_attributes,
            location_attributes,
            age_index,
            susceptibility_index,
            infectivity_index,
            output_dir: args.output_dir,
            days_to_seed_infection: args.days_to_seed_infection,
            initial_infections_per_day: args.initial_infections_per_day,
            initial_infections: args.initial_infections,
        };
        Ok((scenario, people_slices, location_slices))
    }
}

fn partitioning_for(
    def: &CsvDefinition,
    num_partitions: usize,
    num_entities: Id,
    first_id: Id,
) -> Result<Partitioning> {
    if def.partition_offsets.is_empty() {
        return Partitioning::uniform(num_partitions, num_entities, first_id);
    }
    if def.partition_offsets.len() != num_partitions {
        bail!(
            "attempting to run with {} partitions but {} provided offsets",
            num_partitions,
            def.partition_offsets.len()
        );
    }
    Partitioning::from_offsets(def.partition_offsets.clone(), num_entities, first_id)
}

#[allow(clippy::too_many_arguments)]
fn load_scenario(
    scenario_dir: &Path,
    args: &Arguments,
    person_def: &CsvDefinition,
    location_def: &CsvDefinition,
    visit_def: &CsvDefinition,
    person_attributes: &AttributeTable,
    location_attributes: &AttributeTable,
    num_person_interventions: usize,
    num_location_interventions: usize,
) -> Result<(Partitioner, Vec<Person>, Vec<Location>)> {
    let mut people = load_people(
        &scenario_dir.join("people.csv"),
        person_def,
        person_attributes,
        num_person_interventions,
        args.num_visit_days,
        args.seed,
    )?;
    let locations = load_locations(
        &scenario_dir.join("locations.csv"),
        location_def,
        location_attributes,
        num_location_interventions,
        args.seed,
    )?;

    let first_person_id = people.first().map(|p| p.unique_id()).unwrap_or(0);
    let first_location_id = locations.first().map(|l| l.unique_id()).unwrap_or(0);
    let partitioner = Partitioner {
        people: partitioning_for(
            person_def,
            args.num_people_partitions,
            people.len() as Id,
            first_person_id,
        )?,
        locations: partitioning_for(
            location_def,
            args.num_location_partitions,
            locations.len() as Id,
            first_location_id,
        )?,
    };

    load_visits(
        &scenario_dir.join("visits.csv"),
        visit_def,
        &mut people,
        first_person_id,
        &partitioner.locations,
        args.num_visit_days,
    )?;

    Ok((partitioner, people, locations))
}

fn load_people(
    path: &Path,
    def: &CsvDefinition,
    attributes: &AttributeTable,
    num_interventions: usize,
    num_visit_days: usize,
    seed: u64,
) -> Result<Vec<Person>> {
    let id_column = def.unique_id_column()?;
    let defaults = attributes.defaults();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("could not open person data at {}", path.display()))?;

    let mut people = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("bad row in {}", path.display()))?;
        let unique_id = def.parse_id(&record, id_column)?;
        let mut values = def.parse_attributes(&record)?;
        // Columns appended to the schema after the file was written (by the
        // intervention file or the contact model) fall back to their defaults.
        values.extend(defaults[values.len()..].iter().cloned());
        people.push(Person::new(unique_id, values, num_interventions, num_visit_days, seed));
    }
    if people.is_empty() {
        bail!("no people in {}", path.display());
    }

    people.sort_by_key(|p| p.unique_id());
    let first = people[0].unique_id();
    for (offset, person) in people.iter().enumerate() {
        if person.unique_id() != first + offset as Id {
            bail!("person ids are not contiguous near {}", person.unique_id());
        }
    }
    if let Some(num_rows) = def.num_rows {
        if num_rows != people.len() as Id {
            bail!("schema promises {} people, file holds {}", num_rows, people.len());
        }
    }
    Ok(people)
}

fn load_locations(
    path: &Path,
    def: &CsvDefinition,
    attributes: &AttributeTable,
    num_interventions: usize,
    seed: u64,
) -> Result<Vec<Location>> {
    let id_column = def.unique_id_column()?;
    let defaults = attributes.defaults();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("could not open location data at {}", path.display()))?;

    let mut locations = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("bad row in {}", path.display()))?;
        let unique_id = def.parse_id(&record, id_column)?;
        let mut values = def.parse_attributes(&record)?;
        values.extend(defaults[values.len()..].iter().cloned());
        locations.push(Location::new(unique_id, values, num_interventions, seed));
    }
    if locations.is_empty() {
        bail!("no locations in {}", path.display());
    }

    locations.sort_by_key(|l| l.unique_id());
    let first = locations[0].unique_id();
    for (offset, location) in locations.iter().enumerate() {
        if location.unique_id() != first + offset as Id {
            bail!("location ids are not contiguous near {}", location.unique_id());
        }
    }
    if let Some(num_rows) = def.num_rows {
        if num_rows != locations.len() as Id {
            bail!("schema promises {} locations, file holds {}", num_rows, locations.len());
        }
    }
    Ok(locations)
}

/// Streams the visit file, which must be sorted by `(person_id, start_time)`
/// with no overlapping visits per person, splitting any visit that crosses
/// midnight at the day boundary.
fn load_visits(
    path: &Path,
    def: &CsvDefinition,
    people: &mut [Person],
    first_person_id: Id,
    locations: &Partitioning,
    num_visit_days: usize,
) -> Result<()> {
    let person_column = def.unique_id_column()?;
    let location_column = def.foreign_id_column()?;
    let start_column = def.start_time_column()?;
    let duration_column = def.duration_column()?;

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("could not open visit data at {}", path.display()))?;

    let mut previous: Option<(Id, Time, Time)> = None;
    for record in reader.records() {
        let record = record.with_context(|| format!("bad row in {}", path.display()))?;
        let person_id = def.parse_id(&record, person_column)?;
        let location_id = def.parse_id(&record, location_column)?;
        let start = def.parse_id(&record, start_column)? as Time;
        let duration = def.parse_id(&record, duration_column)? as Time;

        if duration <= 0 || start < def.start_day * DAY_LENGTH {
            bail!("visit by person {} has an empty or misplaced time window", person_id);
        }
        if let Some((last_person, last_start, last_end)) = previous {
            if person_id < last_person || (person_id == last_person && start < last_start) {
                bail!("visit data is not sorted by (person, start time) near person {}", person_id);
            }
            if person_id == last_person && start < last_end {
                bail!("person {} has overlapping visits at {}", person_id, start);
            }
        }
        previous = Some((person_id, start, start + duration));

        if location_id < locations.first_id()
            || location_id >= locations.first_id() + locations.num_entities()
        {
            bail!("visit by person {} references unknown location {}", person_id, location_id);
        }
        let person_index = person_id - first_person_id;
        if person_index < 0 || person_index as usize >= people.len() {
            bail!("visit references unknown person {}", person_id);
        }
        let person = &mut people[person_index as usize];

        schedule_split_visit(
            person,
            location_id,
            person_id,
            start,
            duration,
            def.start_day,
            num_visit_days,
        );
    }
    Ok(())
}

/// Splits `[start, start + duration)` (absolute seconds) at day boundaries
/// and schedules each piece on its weekday, wrapping modulo the schedule
/// periodicity.
fn schedule_split_visit(
    person: &mut Person,
    location_id: Id,
    person_id: Id,
    start: Time,
    duration: Time,
    start_day: i64,
    num_visit_days: usize,
) {
    let visit_end = start + duration;
    let mut segment_start = start;
    while segment_start < visit_end {
        let day = segment_start / DAY_LENGTH;
        let day_boundary = (day + 1) * DAY_LENGTH;
        let segment_end = visit_end.min(day_boundary);
        let day_index = ((day - start_day) as usize) % num_visit_days;
        person.schedule_visit(
            day_index,
            Visit {
                location_id,
                person_id,
                person_state: 0,
                visit_start: segment_start - day * DAY_LENGTH,
                visit_end: segment_end - day * DAY_LENGTH,
                transmission_modifier: 1.0,
            },
        );
        segment_start = segment_end;
    }
}

/// Procedurally populates a location grid with people and a Poisson visit
/// schedule. Everything about a person (home block, visit counts, times,
/// destinations) derives from the person's own seeded stream and id, so the
/// generated world does not depend on partition counts.
fn generate_scenario(
    on_the_fly: &OnTheFlyArguments,
    args: &Arguments,
    person_attributes: &AttributeTable,
    location_attributes: &AttributeTable,
    num_person_interventions: usize,
    num_location_interventions: usize,
) -> Result<(Partitioner, Vec<Person>, Vec<Location>)> {
    let num_people = on_the_fly.people_grid.area();
    let num_locations = on_the_fly.location_grid.area();
    let num_location_partitions = on_the_fly.location_partition_grid.area() as usize;
    if num_location_partitions != args.num_location_partitions {
        bail!(
            "location partition grid covers {} partitions but {} were requested",
            num_location_partitions,
            args.num_location_partitions
        );
    }

    let partitioner = Partitioner {
        people: Partitioning::uniform(args.num_people_partitions, num_people, 0)?,
        locations: Partitioning::uniform(num_location_partitions, num_locations, 0)?,
    };

    let location_defaults = location_attributes.defaults();
    let locations = (0..num_locations)
        .map(|id| {
            Location::new(id, location_defaults.clone(), num_location_interventions, args.seed)
        })
        .collect();

    let age_index = person_attributes.index_of("age");
    let person_defaults = person_attributes.defaults();
    let mut people = Vec::with_capacity(num_people as usize);
    for id in 0..num_people {
        let mut person = Person::new(
            id,
            person_defaults.clone(),
            num_person_interventions,
            args.num_visit_days,
            args.seed,
        );
        if let Some(age_index) = age_index {
            let age = person.rng().get().gen_range(0..=100);
            person.values_mut()[age_index] = Value::Int(age);
        }
        generate_visits(&mut person, on_the_fly, args.num_visit_days);
        people.push(person);
    }

    Ok((partitioner, people, locations))
}

fn generate_visits(person: &mut Person, on_the_fly: &OnTheFlyArguments, num_visit_days: usize) {
    if on_the_fly.average_visits_per_day <= 0.0 {
        return;
    }
    let num_visits_distribution =
        Poisson::new(on_the_fly.average_visits_per_day).expect("positive mean");
    let hops_distribution = Poisson::new(LOCATION_LAMBDA).expect("positive mean");

    let person_id = person.unique_id();
    let grid = on_the_fly.location_grid;
    let local = on_the_fly.local_location_grid;
    let partition_grid = on_the_fly.location_partition_grid;
    let locations_per_partition = local.area();

    // Each person's home block is fixed by their id.
    let home_partition = person_id % partition_grid.area();
    let local_index = person_id % locations_per_partition;
    let home_x = (home_partition % partition_grid.width) * local.width + local_index % local.width;
    let home_y = (home_partition / partition_grid.width) * local.height + local_index / local.width;

    for day in 0..num_visit_days {
        let rng = person.rng().get();
        let num_visits = num_visits_distribution.sample(rng) as usize;

        // Drawing through a min-heap pairs the times so starts precede ends.
        let mut times: BinaryHeap<Reverse<Time>> = BinaryHeap::new();
        for _ in 0..2 * num_visits {
            times.push(Reverse(rng.gen_range(0..=DAY_LENGTH)));
        }

        let mut visits = Vec::new();
        for _ in 0..num_visits {
            let visit_start = times.pop().map(|Reverse(t)| t).unwrap_or(0);
            let visit_end = times.pop().map(|Reverse(t)| t).unwrap_or(0);
            if visit_start == visit_end {
                continue;
            }

            let mut hops =
                (hops_distribution.sample(rng) as Id).min(grid.width + grid.height - 2);
            let mut offset_x = 0;
            let mut offset_y = 0;
            if hops != 0 {
                let max_negative_x = hops.min(home_x);
                let max_positive_x = hops.min(grid.width - 1 - home_x);
                offset_x = rng.gen_range(-max_negative_x..=max_positive_x);

                // Spend the remaining hops in the Y direction.
                hops -= offset_x.abs();
                if hops != 0 {
                    offset_y = if rng.gen_range(0..2) == 0 {
                        hops.min(grid.height - 1 - home_y)
                    } else {
                        -hops.min(home_y)
                    };
                }
            }

            let destination_x = home_x + offset_x;
            let destination_y = home_y + offset_y;
            // 2D to 1D, respecting the block layout of locations across
            // partitions.
            let destination = (destination_x % local.width)
                + (destination_y % local.height) * local.width
                + (destination_x / local.width) * locations_per_partition
                + (destination_y / local.height) * partition_grid.width * locations_per_partition;

            visits.push(Visit {
                location_id: destination,
                person_id,
                person_state: 0,
                visit_start,
                visit_end,
                transmission_modifier: 1.0,
            });
        }
        for visit in visits {
            person.schedule_visit(day, visit);
        }
    }
}

fn split_by_partition<T>(entities: Vec<T>, partitioning: &Partitioning) -> Vec<Vec<T>> {
    let mut slices = Vec::with_capacity(partitioning.num_partitions());
    let mut iter = entities.into_iter();
    for partition in 0..partitioning.num_partitions() {
        slices.push(iter.by_ref().take(partitioning.size_of(partition)).collect());
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridDim;
    use std::fs;

    fn write_scenario(dir: &Path, visits: &str) {
        fs::write(
            dir.join("people.json"),
            r#"{"fields": [{"name": "pid", "role": "unique_id"}, {"name": "age", "role": "int32"}]}"#,
        )
        .unwrap();
        fs::write(dir.join("people.csv"), "pid,age\n0,30\n1,40\n").unwrap();
        fs::write(
            dir.join("locations.json"),
            r#"{"fields": [
                {"name": "lid", "role": "unique_id"},
                {"name": "max_simultaneous_visits", "role": "uint32"}
            ]}"#,
        )
        .unwrap();
        fs::write(dir.join("locations.csv"), "lid,max_simultaneous_visits\n0,10\n").unwrap();
        fs::write(
            dir.join("visits.json"),
            r#"{"fields": [
                {"name": "pid", "role": "unique_id"},
                {"name": "lid", "role": "foreign_id"},
                {"name": "start_time", "role": "start_time"},
                {"name": "duration", "role": "duration"}
            ]}"#,
        )
        .unwrap();
        fs::write(dir.join("visits.csv"), visits).unwrap();
    }

    fn disease_file(dir: &Path) -> PathBuf {
        let path = dir.join("disease.json");
        fs::write(
            &path,
            r#"{
                "transmissibility": 0.0,
                "starting_states": [{"starting_state": "healthy"}],
                "disease_states": [{"state_label": "healthy", "susceptibility": 1.0}]
            }"#,
        )
        .unwrap();
        path
    }

    fn real_data_args(dir: &Path) -> Arguments {
        Arguments::new(
            RunMode::RealData { scenario_dir: dir.to_path_buf() },
            1,
            1,
            3,
            7,
            dir.join("out"),
            disease_file(dir),
        )
    }

    #[test]
    fn splits_visits_at_midnight() {
        let dir = tempfile::tempdir().unwrap();
        write_scenario(dir.path(), "pid,lid,start_time,duration\n1,0,86000,1000\n");

        let (_, people, _) = Scenario::build(real_data_args(dir.path())).unwrap();
        let person = &people[0][1];

        assert_eq!(person.visits_by_day[0].len(), 1);
        assert_eq!(person.visits_by_day[0][0].visit_start, 86000);
        assert_eq!(person.visits_by_day[0][0].visit_end, DAY_LENGTH);
        assert_eq!(person.visits_by_day[1].len(), 1);
        assert_eq!(person.visits_by_day[1][0].visit_start, 0);
        assert_eq!(person.visits_by_day[1][0].visit_end, 600);
    }

    #[test]
    fn rejects_overlapping_visits() {
        let dir = tempfile::tempdir().unwrap();
        write_scenario(
            dir.path(),
            "pid,lid,start_time,duration\n0,0,100,1000\n0,0,500,1000\n",
        );
        assert!(Scenario::build(real_data_args(dir.path())).is_err());
    }

    #[test]
    fn rejects_unsorted_visits() {
        let dir = tempfile::tempdir().unwrap();
        write_scenario(
            dir.path(),
            "pid,lid,start_time,duration\n1,0,100,50\n0,0,100,50\n",
        );
        assert!(Scenario::build(real_data_args(dir.path())).is_err());
    }

    #[test]
    fn rejects_visits_to_unknown_locations() {
        let dir = tempfile::tempdir().unwrap();
        write_scenario(dir.path(), "pid,lid,start_time,duration\n0,9,100,50\n");
        assert!(Scenario::build(real_data_args(dir.path())).is_err());
    }

    #[test]
    fn weekly_schedule_wraps_modulo_the_periodicity() {
        let dir = tempfile::tempdir().unwrap();
        // Day 8 wraps onto weekday 1 of a 7-day schedule.
        let start = 8 * DAY_LENGTH + 100;
        write_scenario(
            dir.path(),
            &format!("pid,lid,start_time,duration\n0,0,{},50\n", start),
        );

        let (_, people, _) = Scenario::build(real_data_args(dir.path())).unwrap();
        assert_eq!(people[0][0].visits_by_day[1].len(), 1);
        assert_eq!(people[0][0].visits_by_day[1][0].visit_start, 100);
    }

    #[test]
    fn generated_scenarios_are_independent_of_people_partitioning() {
        let dir = tempfile::tempdir().unwrap();
        let on_the_fly = OnTheFlyArguments::new(
            GridDim::new(4, 4),
            GridDim::new(2, 2),
            GridDim::new(1, 1),
            1.5,
        )
        .unwrap();

        let mut args = Arguments::new(
            RunMode::OnTheFly(on_the_fly.clone()),
            1,
            1,
            3,
            7,
            dir.path().join("out"),
            disease_file(dir.path()),
        );
        args.seed = 42;
        let (_, people_single, _) = Scenario::build(args.clone()).unwrap();

        args.num_people_partitions = 4;
        let (_, people_split, _) = Scenario::build(args).unwrap();

        let flat_single: Vec<&Person> = people_single.iter().flatten().collect();
        let flat_split: Vec<&Person> = people_split.iter().flatten().collect();
        assert_eq!(flat_single.len(), flat_split.len());
        for (a, b) in flat_single.iter().zip(flat_split.iter()) {
            assert_eq!(a.unique_id(), b.unique_id());
            for (day_a, day_b) in a.visits_by_day.iter().zip(b.visits_by_day.iter()) {
                assert_eq!(day_a.len(), day_b.len());
                for (va, vb) in day_a.iter().zip(day_b.iter()) {
                    assert_eq!(va.location_id, vb.location_id);
                    assert_eq!(va.visit_start, vb.visit_start);
                    assert_eq!(va.visit_end, vb.visit_end);
                }
            }
        }
    }

    #[test]
    fn generated_destinations_stay_on_the_grid() {
        let dir = tempfile::tempdir().unwrap();
        let on_the_fly = OnTheFlyArguments::new(
            GridDim::new(6, 6),
            GridDim::new(4, 2),
            GridDim::new(2, 1),
            3.0,
        )
        .unwrap();
        let mut args = Arguments::new(
            RunMode::OnTheFly(on_the_fly),
            2,
            2,
            3,
            7,
            dir.path().join("out"),
            disease_file(dir.path()),
        );
        args.seed = 7;

        let (scenario, people, _) = Scenario::build(args).unwrap();
        for person in people.iter().flatten() {
            for visits in &person.visits_by_day {
                for visit in visits {
                    assert!(visit.location_id >= 0);
                    assert!(visit.location_id < scenario.num_locations());
                    assert!(visit.visit_start < visit.visit_end);
                    assert!(visit.visit_end <= DAY_LENGTH);
                }
            }
        }
    }
}
