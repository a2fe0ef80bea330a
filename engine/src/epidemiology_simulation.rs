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

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{Context, Result};
use fxhash::FxHashSet;
use ndarray::Array2;
use rand::Rng;

use crate::config::scenario::Scenario;
use crate::config::Arguments;
use crate::listeners::csv_service::CsvListener;
use crate::listeners::{Listener, Listeners, SummaryRow};
use crate::models::constants::SEED_PROPENSITY;
use crate::models::custom_types::{Count, Day, Id};
use crate::models::messages::{Interaction, InteractionMessage};
use crate::partitions::locations::LocationPartition;
use crate::partitions::people::PeoplePartition;
use crate::transport::{DailySummary, LocationCommand, PeopleCommand, Reduction};
use crate::utils::RandomWrapper;

/// The coordinator: spawns the two partitioned collectives, drives the
/// strict per-day phase barrier (visit, compute, end-of-day, summarize,
/// intervene), seeds initial infections, and collects the day-by-day state
/// histogram.
pub struct Epidemiology {
    scenario: Arc<Scenario>,
    people_commands: Vec<Sender<PeopleCommand>>,
    location_commands: Vec<Sender<LocationCommand>>,
    /// Senders into the people partitions' interaction inboxes, used for
    /// injecting seeded infections.
    interaction_injectors: Vec<Sender<Vec<InteractionMessage>>>,
    reductions: Receiver<Reduction>,
    handles: Vec<JoinHandle<()>>,
    state_summaries: Array2<Count>,
    accumulated: Vec<Count>,
    trigger_flags: Vec<bool>,
    pending_seeds: Vec<Id>,
    last_infectious_count: Count,
    listeners: Listeners,
}

impl Epidemiology {
    pub fn new(args: Arguments) -> Result<Epidemiology> {
        let start = Instant::now();
        let visit_aggregation = args.visit_aggregation;
        let interact_aggregation = args.interact_aggregation;

        let (scenario, people_slices, location_slices) = Scenario::build(args)?;
        let scenario = Arc::new(scenario);
        let num_people_partitions = scenario.partitioner.people.num_partitions();
        let num_location_partitions = scenario.partitioner.locations.num_partitions();

        let csv_listener = CsvListener::new(&scenario.output_dir.join("summary.csv"))?;
        let listeners = Listeners::from(vec![Box::new(csv_listener) as Box<dyn Listener>]);

        let (reduction_sender, reductions) = channel();

        let mut visit_senders = Vec::with_capacity(num_location_partitions);
        let mut visit_receivers = Vec::with_capacity(num_location_partitions);
        for _ in 0..num_location_partitions {
            let (sender, receiver) = channel();
            visit_senders.push(sender);
            visit_receivers.push(Some(receiver));
        }
        let mut interaction_senders = Vec::with_capacity(num_people_partitions);
        let mut interaction_receivers = Vec::with_capacity(num_people_partitions);
        for _ in 0..num_people_partitions {
            let (sender, receiver) = channel();
            interaction_senders.push(sender);
            interaction_receivers.push(Some(receiver));
        }

        let mut handles = Vec::new();
        let mut people_commands = Vec::with_capacity(num_people_partitions);
        for (index, people) in people_slices.into_iter().enumerate() {
            let (commands, command_receiver) = channel();
            let partition = PeoplePartition::new(
                index,
                people,
                Arc::clone(&scenario),
                visit_senders.clone(),
                visit_aggregation,
            );
            let inbox = interaction_receivers[index].take().expect("each inbox taken once");
            let acks = reduction_sender.clone();
            let handle = thread::Builder::new()
                .name(format!("people-{}", index))
                .spawn(move || partition.run(command_receiver, inbox, acks))
                .context("could not spawn people partition")?;
            handles.push(handle);
            people_commands.push(commands);
        }

        let mut location_commands = Vec::with_capacity(num_location_partitions);
        for (index, locations) in location_slices.into_iter().enumerate() {
            let (commands, command_receiver) = channel();
            let partition = LocationPartition::new(
                index,
                locations,
                Arc::clone(&scenario),
                interaction_senders.clone(),
                interact_aggregation,
            );
            let inbox = visit_receivers[index].take().expect("each inbox taken once");
            let acks = reduction_sender.clone();
            let handle = thread::Builder::new()
                .name(format!("locations-{}", index))
                .spawn(move || partition.run(command_receiver, inbox, acks))
                .context("could not spawn location partition")?;
            handles.push(handle);
            location_commands.push(commands);
        }

        let num_states = scenario.disease_model.number_of_states();
        let num_days = scenario.num_days as usize;
        let trigger_flags = vec![false; scenario.intervention_model.triggers.len()];

        info!(
            "Initialization completed in {} seconds",
            start.elapsed().as_secs_f32()
        );
        Ok(Epidemiology {
            scenario,
            people_commands,
            location_commands,
            interaction_injectors: interaction_senders,
            reductions,
            handles,
            state_summaries: Array2::zeros((num_days, num_states)),
            accumulated: vec![0; num_states],
            trigger_flags,
            pending_seeds: Vec::new(),
            last_infectious_count: 0,
            listeners,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let start = Instant::now();
        let num_days = self.scenario.num_days;
        let num_people = self.scenario.num_people();
        info!(
            "Running Loimos with {} people, {} locations, {} people partitions, \
             {} location partitions, and {} days",
            num_people,
            self.scenario.num_locations(),
            self.people_commands.len(),
            self.location_commands.len(),
            num_days
        );

        for day in 0..num_days {
            self.seed_infections(day);

            self.broadcast_people(PeopleCommand::SendVisits);
            self.await_acks(self.people_commands.len(), "visit phase");

            self.broadcast_locations(LocationCommand::ComputeInteractions);
            self.await_acks(self.location_commands.len(), "compute phase");

            self.broadcast_people(PeopleCommand::EndOfDay);
            let infectious_count = self.collect_daily_summaries(day);

            let new_daily_infections = (infectious_count - self.last_infectious_count).max(0);
            self.last_infectious_count = infectious_count;
            let infection_rate = new_daily_infections as f64 / num_people as f64;

            let previous_flags = self.trigger_flags.clone();
            self.scenario.intervention_model.evaluate_triggers(
                &mut self.trigger_flags,
                day,
                infection_rate,
            );
            self.dispatch_interventions(&previous_flags);

            let rows = self.summary_rows(day);
            self.listeners.day_summarized(&rows);

            debug!(
                "day {} of {}: {} infectious, {} new",
                day, num_days, infectious_count, new_daily_infections
            );
        }

        self.broadcast_people(PeopleCommand::Finish);
        self.broadcast_locations(LocationCommand::Finish);
        self.await_acks(self.people_commands.len() + self.location_commands.len(), "shutdown");
        for handle in self.handles.drain(..) {
            handle.join().expect("partition thread panicked");
        }
        self.listeners.simulation_ended();

        let elapsed = start.elapsed().as_secs_f32();
        info!("Number of days: {}, total time taken {} seconds", num_days, elapsed);
        info!("Days/sec: {}", num_days as f32 / elapsed);
        Ok(())
    }

    /// The per-day histogram, one row per day and one column per disease
    /// state; filled as the run progresses.
    pub fn state_summaries(&self) -> &Array2<Count> {
        &self.state_summaries
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Injects synthetic never-escape exposures for today's quota of seeded
    /// infections. The full set of targets is drawn up front from the
    /// coordinator's stream, without replacement, so seeding is independent
    /// of partition placement.
    fn seed_infections(&mut self, day: Day) {
        let explicit = self.scenario.initial_infections.is_some();
        if day == 0 {
            self.pending_seeds = match &self.scenario.initial_infections {
                Some(ids) => ids.clone(),
                None => self.draw_seed_targets(),
            };
        }

        let quota = if explicit {
            if day == 0 {
                self.pending_seeds.len()
            } else {
                0
            }
        } else if day < self.scenario.days_to_seed_infection {
            self.scenario.initial_infections_per_day
        } else {
            0
        };

        for _ in 0..quota {
            let person_id = match self.pending_seeds.pop() {
                Some(id) => id,
                None => break,
            };
            let partition = self.scenario.partitioner.people.partition_of(person_id);
            let message = InteractionMessage {
                location_id: -1,
                person_id,
                interactions: vec![Interaction {
                    propensity: SEED_PROPENSITY,
                    infectious_id: -1,
                    infectious_state: 0,
                    start_time: 0,
                    end_time: 0,
                }],
            };
            if self.interaction_injectors[partition].send(vec![message]).is_err() {
                panic!("people partition {} hung up before seeding", partition);
            }
        }
    }

    /// Distinct seed targets for the whole seeding window; set-checked so
    /// small test populations cannot loop forever.
    fn draw_seed_targets(&self) -> Vec<Id> {
        let total =
            self.scenario.days_to_seed_infection as usize * self.scenario.initial_infections_per_day;
        let first = self.scenario.partitioner.people.first_id();
        let num_people = self.scenario.num_people();

        let mut rng = RandomWrapper::global(self.scenario.seed);
        let mut seen = FxHashSet::default();
        let mut targets = Vec::with_capacity(total);
        while targets.len() < total && (targets.len() as Id) < num_people {
            let person_id = rng.get().gen_range(first..first + num_people);
            if seen.insert(person_id) {
                targets.push(person_id);
            }
        }
        targets
    }

    fn broadcast_people(&self, command: PeopleCommand) {
        for sender in &self.people_commands {
            if sender.send(command.clone()).is_err() {
                panic!("a people partition hung up mid-run");
            }
        }
    }

    fn broadcast_locations(&self, command: LocationCommand) {
        for sender in &self.location_commands {
            if sender.send(command.clone()).is_err() {
                panic!("a location partition hung up mid-run");
            }
        }
    }

    /// Barrier: waits for one ack per broadcast target. Phases are strict,
    /// so anything else arriving here is a protocol bug.
    fn await_acks(&self, expected: usize, phase: &str) {
        for _ in 0..expected {
            match self.reductions.recv() {
                Ok(Reduction::VisitsSent { .. })
                | Ok(Reduction::ComputeDone { .. })
                | Ok(Reduction::InterventionDone { .. })
                | Ok(Reduction::Finished { .. }) => {}
                Ok(other) => panic!("unexpected reduction {:?} during {}", other, phase),
                Err(_) => panic!("a partition died during {}", phase),
            }
        }
    }

    /// Sum reduction of the end-of-day summaries into today's histogram row;
    /// returns the total infectious count.
    fn collect_daily_summaries(&mut self, day: Day) -> Count {
        let mut infectious_count = 0;
        for _ in 0..self.people_commands.len() {
            match self.reductions.recv() {
                Ok(Reduction::EndOfDay(DailySummary {
                    state_counts, infectious_count: partial, ..
                })) => {
                    for (state, count) in state_counts.iter().enumerate() {
                        self.state_summaries[[day as usize, state]] += *count;
                    }
                    infectious_count += partial;
                }
                Ok(other) => panic!("unexpected reduction {:?} during end of day", other),
                Err(_) => panic!("a partition died during end of day"),
            }
        }
        infectious_count
    }

    /// Applies newly-triggered interventions and reverts newly-expired ones,
    /// awaiting each broadcast before the next so intervention handlers
    /// never interleave.
    fn dispatch_interventions(&self, previous_flags: &[bool]) {
        let model = &self.scenario.intervention_model;
        for (index, intervention) in model.person_interventions.iter().enumerate() {
            let trigger = intervention.trigger_index();
            match (previous_flags[trigger], self.trigger_flags[trigger]) {
                (false, true) => {
                    info!("applying person intervention {}", index);
                    self.broadcast_people(PeopleCommand::ApplyIntervention(index));
                    self.await_acks(self.people_commands.len(), "person intervention");
                }
                (true, false) => {
                    info!("reverting person intervention {}", index);
                    self.broadcast_people(PeopleCommand::RevertIntervention(index));
                    self.await_acks(self.people_commands.len(), "person intervention");
                }
                _ => {}
            }
        }
        for (index, intervention) in model.location_interventions.iter().enumerate() {
            let trigger = intervention.trigger_index();
            match (previous_flags[trigger], self.trigger_flags[trigger]) {
                (false, true) => {
                    info!("applying location intervention {}", index);
                    self.broadcast_locations(LocationCommand::ApplyIntervention(index));
                    self.await_acks(self.location_commands.len(), "location intervention");
                }
                (true, false) => {
                    info!("reverting location intervention {}", index);
                    self.broadcast_locations(LocationCommand::RevertIntervention(index));
                    self.await_acks(self.location_commands.len(), "location intervention");
                }
                _ => {}
            }
        }
    }

    /// Rows for today's output: states with a nonzero population or a
    /// nonzero change since yesterday.
    fn summary_rows(&mut self, day: Day) -> Vec<SummaryRow> {
        let disease_model = &self.scenario.disease_model;
        let mut rows = Vec::new();
        for state in 0..disease_model.number_of_states() {
            let total_in_state = self.state_summaries[[day as usize, state]];
            let change_in_state = total_in_state - self.accumulated[state];
            if total_in_state != 0 || change_in_state != 0 {
                rows.push(SummaryRow {
                    day,
                    state: disease_model.state_label(state).to_string(),
                    total_in_state,
                    change_in_state,
                });
            }
            self.accumulated[state] = total_in_state;
        }
        rows
    }
}
