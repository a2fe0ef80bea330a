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

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

use crate::attributes::Value;
use crate::models::constants::{DAY_LENGTH, HOUR_LENGTH, MINUTE_LENGTH};
use crate::models::custom_types::{StateId, Time};
use crate::utils::RandomWrapper;

const PROBABILITY_SUM_EPSILON: f64 = 1e-6;

/// The timed probabilistic finite automaton over disease states. Immutable
/// after loading and shared by reference across every partition.
pub struct DiseaseModel {
    states: Vec<DiseaseState>,
    starting_states: Vec<StartingCondition>,
    transmissibility: f64,
}

pub struct DiseaseState {
    pub label: String,
    pub susceptibility: f64,
    pub infectivity: f64,
    pub symptomatic: bool,
    pub transition: Transition,
}

pub enum Transition {
    /// The person leaves by a random draw over the set; any probability mass
    /// left over means staying put forever.
    Timed(Vec<TimedTransition>),
    /// The person leaves only when an exposure interaction fires.
    Exposure { next_state: StateId },
    Terminal,
}

pub struct TimedTransition {
    pub next_state: StateId,
    pub with_prob: f64,
    pub duration: DurationDistribution,
}

pub enum DurationDistribution {
    Fixed(Time),
    Uniform { lower: Time, upper: Time },
    Normal { mean: f64, std_dev: f64 },
    Discrete(Vec<(f64, Time)>),
    Forever,
}

struct StartingCondition {
    state: StateId,
    age_lower: i64,
    age_upper: i64,
}

impl DiseaseModel {
    /// Reads a model file, JSON or YAML by extension.
    pub fn load(path: &Path) -> Result<DiseaseModel> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read disease model at {}", path.display()))?;
        let raw: RawDiseaseModel = if path.extension().map_or(false, |e| e == "yaml" || e == "yml")
        {
            serde_yaml::from_str(&text)
                .with_context(|| format!("could not parse disease model at {}", path.display()))?
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("could not parse disease model at {}", path.display()))?
        };
        DiseaseModel::from_raw(raw)
    }

    pub fn from_json_str(text: &str) -> Result<DiseaseModel> {
        DiseaseModel::from_raw(serde_json::from_str(text)?)
    }

    fn from_raw(raw: RawDiseaseModel) -> Result<DiseaseModel> {
        if raw.disease_states.is_empty() {
            bail!("disease model defines no states");
        }

        let index_of = |label: &str| -> Result<StateId> {
            raw.disease_states
                .iter()
                .position(|s| s.state_label == label)
                .ok_or_else(|| anyhow!("transition references undefined state {:?}", label))
        };

        let mut states = Vec::with_capacity(raw.disease_states.len());
        for raw_state in &raw.disease_states {
            if !(0.0..=1.0).contains(&raw_state.susceptibility) {
                bail!("state {:?}: susceptibility must be in [0, 1]", raw_state.state_label);
            }
            if raw_state.infectivity < 0.0 {
                bail!("state {:?}: infectivity must be non-negative", raw_state.state_label);
            }

            let transition = match (&raw_state.timed_transition, &raw_state.exposure_transition) {
                (Some(_), Some(_)) => {
                    bail!("state {:?} has both timed and exposure transitions", raw_state.state_label)
                }
                (Some(set), None) => {
                    let mut total = 0.0;
                    let mut transitions = Vec::with_capacity(set.transitions.len());
                    for t in &set.transitions {
                        if t.with_prob < 0.0 {
                            bail!("state {:?}: negative transition probability", raw_state.state_label);
                        }
                        total += t.with_prob;
                        transitions.push(TimedTransition {
                            next_state: index_of(&t.next_state)?,
                            with_prob: t.with_prob,
                            duration: t.distribution.compile(&raw_state.state_label)?,
                        });
                    }
                    if total > 1.0 + PROBABILITY_SUM_EPSILON {
                        bail!(
                            "state {:?}: transition probabilities sum to {}",
                            raw_state.state_label,
                            total
                        );
                    }
                    Transition::Timed(transitions)
                }
                (None, Some(exposure)) => {
                    Transition::Exposure { next_state: index_of(&exposure.next_state)? }
                }
                (None, None) => Transition::Terminal,
            };

            states.push(DiseaseState {
                label: raw_state.state_label.clone(),
                susceptibility: raw_state.susceptibility,
                infectivity: raw_state.infectivity,
                symptomatic: raw_state.symptomatic,
                transition,
            });
        }

        if raw.starting_states.is_empty() {
            bail!("disease model defines no starting states");
        }
        let mut starting_states = Vec::with_capacity(raw.starting_states.len());
        for s in &raw.starting_states {
            starting_states.push(StartingCondition {
                state: index_of(&s.starting_state)?,
                age_lower: s.age_lower,
                age_upper: s.age_upper,
            });
        }

        Ok(DiseaseModel { states, starting_states, transmissibility: raw.transmissibility })
    }

    pub fn number_of_states(&self) -> usize {
        self.states.len()
    }

    pub fn state_label(&self, state: StateId) -> &str {
        &self.states[state].label
    }

    pub fn state_index(&self, label: &str) -> Option<StateId> {
        self.states.iter().position(|s| s.label == label)
    }

    pub fn is_susceptible(&self, state: StateId) -> bool {
        self.states[state].susceptibility > 0.0
    }

    pub fn is_infectious(&self, state: StateId) -> bool {
        self.states[state].infectivity > 0.0
    }

    pub fn is_symptomatic(&self, state: StateId) -> bool {
        self.states[state].symptomatic
    }

    pub fn susceptibility(&self, state: StateId) -> f64 {
        self.states[state].susceptibility
    }

    pub fn infectivity(&self, state: StateId) -> f64 {
        self.states[state].infectivity
    }

    /// Per-state symptomatic flags; interventions snapshot this so they can
    /// test people without holding a reference to the model.
    pub fn symptomatic_flags(&self) -> Vec<bool> {
        self.states.iter().map(|s| s.symptomatic).collect()
    }

    /// The starting state for a person with the given attributes. Consults
    /// the age bands only when more than one starting state exists.
    pub fn healthy_state_for(&self, values: &[Value], age_index: Option<usize>) -> Result<StateId> {
        if self.starting_states.len() == 1 {
            return Ok(self.starting_states[0].state);
        }

        let age_index = age_index
            .ok_or_else(|| anyhow!("age attribute required for age-banded starting states"))?;
        let age = values[age_index].as_int();
        self.starting_states
            .iter()
            .find(|s| s.age_lower <= age && age <= s.age_upper)
            .map(|s| s.state)
            .ok_or_else(|| anyhow!("no starting state covers age {}", age))
    }

    /// Samples where a person goes after entering `from_state` and how long
    /// they stay there. Exposure states leave immediately (the caller treats
    /// a zero duration as "transition at the end of the day"); terminal
    /// states and unspent probability mass both mean staying forever.
    pub fn transition_from(&self, from_state: StateId, rng: &mut RandomWrapper) -> (StateId, Time) {
        match &self.states[from_state].transition {
            Transition::Timed(transitions) => {
                if transitions.is_empty() {
                    return (from_state, Time::MAX);
                }
                let cutoff: f64 = rng.get().gen();
                let mut cdf = 0.0;
                for transition in transitions {
                    cdf += transition.with_prob;
                    if cutoff <= cdf {
                        return (transition.next_state, transition.duration.sample(rng));
                    }
                }
                (from_state, Time::MAX)
            }
            Transition::Exposure { next_state } => (*next_state, 0),
            Transition::Terminal => (from_state, Time::MAX),
        }
    }

    /// The Poisson-process rate of a susceptible/infectious overlap lasting
    /// `dt` seconds. Each weight and modifier enters exactly once.
    pub fn propensity(
        &self,
        susceptible_state: StateId,
        infectious_state: StateId,
        dt: Time,
        susceptible_modifier: f64,
        infectious_modifier: f64,
    ) -> f64 {
        self.transmissibility
            * dt as f64
            * self.states[susceptible_state].susceptibility
            * susceptible_modifier
            * self.states[infectious_state].infectivity
            * infectious_modifier
    }
}

impl DurationDistribution {
    fn sample(&self, rng: &mut RandomWrapper) -> Time {
        match self {
            DurationDistribution::Fixed(seconds) => *seconds,
            DurationDistribution::Forever => Time::MAX,
            DurationDistribution::Uniform { lower, upper } => {
                if upper <= lower {
                    *lower
                } else {
                    rng.get().gen_range(*lower as f64..*upper as f64) as Time
                }
            }
            DurationDistribution::Normal { mean, std_dev } => {
                let normal = Normal::new(*mean, *std_dev).expect("validated at load");
                // Sampled times below zero are clipped rather than resampled.
                (normal.sample(rng.get()) as Time).max(0)
            }
            DurationDistribution::Discrete(bins) => {
                let cutoff: f64 = rng.get().gen();
                let mut cdf = 0.0;
                for (with_prob, seconds) in bins {
                    cdf += with_prob;
                    if cutoff < cdf {
                        return *seconds;
                    }
                }
                0
            }
        }
    }
}

/// A duration written as a day/hour/minute/second breakdown in model files.
#[derive(Copy, Clone, Debug, Default, Deserialize)]
pub struct TimeDef {
    #[serde(default)]
    pub days: f64,
    #[serde(default)]
    pub hours: f64,
    #[serde(default)]
    pub minutes: f64,
    #[serde(default)]
    pub seconds: f64,
}

impl TimeDef {
    pub fn to_seconds(self) -> Time {
        (self.days * DAY_LENGTH as f64
            + self.hours * HOUR_LENGTH as f64
            + self.minutes * MINUTE_LENGTH as f64
            + self.seconds) as Time
    }
}

#[derive(Deserialize)]
struct RawDiseaseModel {
    transmissibility: f64,
    starting_states: Vec<RawStartingCondition>,
    disease_states: Vec<RawDiseaseState>,
}

#[derive(Deserialize)]
struct RawStartingCondition {
    starting_state: String,
    #[serde(default)]
    age_lower: i64,
    #[serde(default = "max_age")]
    age_upper: i64,
}

fn max_age() -> i64 {
    i64::MAX
}

#[derive(Deserialize)]
struct RawDiseaseState {
    state_label: String,
    #[serde(default)]
    susceptibility: f64,
    #[serde(default)]
    infectivity: f64,
    #[serde(default)]
    symptomatic: bool,
    #[serde(default)]
    timed_transition: Option<RawTimedTransitionSet>,
    #[serde(default)]
    exposure_transition: Option<RawExposureTransition>,
}

#[derive(Deserialize)]
struct RawTimedTransitionSet {
    transitions: Vec<RawTransition>,
}

#[derive(Deserialize)]
struct RawExposureTransition {
    next_state: String,
}

#[derive(Deserialize)]
struct RawTransition {
    next_state: String,
    with_prob: f64,
    #[serde(flatten)]
    distribution: RawDistribution,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawDistribution {
    Fixed { time_in_state: TimeDef },
    Forever {},
    Uniform { tmin: TimeDef, tmax: TimeDef },
    Normal { tmean: TimeDef, tvariance: TimeDef },
    Discrete { bins: Vec<RawBin> },
}

#[derive(Deserialize)]
struct RawBin {
    tval: TimeDef,
    with_prob: f64,
}

impl RawDistribution {
    fn compile(&self, state_label: &str) -> Result<DurationDistribution> {
        Ok(match self {
            RawDistribution::Fixed { time_in_state } => {
                DurationDistribution::Fixed(time_in_state.to_seconds())
            }
            RawDistribution::Forever {} => DurationDistribution::Forever,
            RawDistribution::Uniform { tmin, tmax } => {
                let (lower, upper) = (tmin.to_seconds(), tmax.to_seconds());
                if upper < lower {
                    bail!("state {:?}: uniform duration has tmax < tmin", state_label);
                }
                DurationDistribution::Uniform { lower, upper }
            }
            RawDistribution::Normal { tmean, tvariance } => {
                let variance = tvariance.to_seconds() as f64;
                if variance < 0.0 {
                    bail!("state {:?}: normal duration has negative variance", state_label);
                }
                DurationDistribution::Normal {
                    mean: tmean.to_seconds() as f64,
                    std_dev: variance.sqrt(),
                }
            }
            RawDistribution::Discrete { bins } => DurationDistribution::Discrete(
                bins.iter().map(|b| (b.with_prob, b.tval.to_seconds())).collect(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIR: &str = r#"{
        "transmissibility": 0.5,
        "starting_states": [{"starting_state": "susceptible"}],
        "disease_states": [
            {"state_label": "susceptible", "susceptibility": 1.0,
             "exposure_transition": {"next_state": "infectious"}},
            {"state_label": "infectious", "infectivity": 0.8, "symptomatic": true,
             "timed_transition": {"transitions": [
                 {"next_state": "recovered", "with_prob": 1.0,
                  "fixed": {"time_in_state": {"days": 4}}}]}},
            {"state_label": "recovered"}
        ]
    }"#;

    #[test]
    fn should_load_and_classify_states() {
        let model = DiseaseModel::from_json_str(SIR).unwrap();
        let s = model.state_index("susceptible").unwrap();
        let i = model.state_index("infectious").unwrap();
        let r = model.state_index("recovered").unwrap();

        assert!(model.is_susceptible(s) && !model.is_infectious(s));
        assert!(model.is_infectious(i) && model.is_symptomatic(i));
        assert!(!model.is_susceptible(r) && !model.is_infectious(r));
    }

    #[test]
    fn exposure_states_transition_immediately() {
        let model = DiseaseModel::from_json_str(SIR).unwrap();
        let s = model.state_index("susceptible").unwrap();
        let mut rng = RandomWrapper::for_person(0, 0);

        let (next, seconds) = model.transition_from(s, &mut rng);
        assert_eq!(next, model.state_index("infectious").unwrap());
        assert_eq!(seconds, 0);
    }

    #[test]
    fn timed_transitions_sample_the_fixed_duration() {
        let model = DiseaseModel::from_json_str(SIR).unwrap();
        let i = model.state_index("infectious").unwrap();
        let mut rng = RandomWrapper::for_person(0, 0);

        let (next, seconds) = model.transition_from(i, &mut rng);
        assert_eq!(next, model.state_index("recovered").unwrap());
        assert_eq!(seconds, 4 * DAY_LENGTH);
    }

    #[test]
    fn terminal_states_stay_forever() {
        let model = DiseaseModel::from_json_str(SIR).unwrap();
        let r = model.state_index("recovered").unwrap();
        let mut rng = RandomWrapper::for_person(0, 0);

        assert_eq!(model.transition_from(r, &mut rng), (r, Time::MAX));
    }

    #[test]
    fn leftover_probability_mass_means_staying() {
        let model = DiseaseModel::from_json_str(
            r#"{
                "transmissibility": 0.0,
                "starting_states": [{"starting_state": "a"}],
                "disease_states": [
                    {"state_label": "a", "timed_transition": {"transitions": [
                        {"next_state": "b", "with_prob": 0.0,
                         "fixed": {"time_in_state": {"days": 1}}}]}},
                    {"state_label": "b"}
                ]
            }"#,
        )
        .unwrap();
        let a = model.state_index("a").unwrap();
        let mut rng = RandomWrapper::for_person(0, 0);

        for _ in 0..20 {
            assert_eq!(model.transition_from(a, &mut rng), (a, Time::MAX));
        }
    }

    #[test]
    fn normal_durations_clip_at_zero() {
        let duration = DurationDistribution::Normal { mean: -1e7, std_dev: 10.0 };
        let mut rng = RandomWrapper::for_person(0, 0);
        for _ in 0..20 {
            assert!(duration.sample(&mut rng) >= 0);
        }
    }

    #[test]
    fn propensity_multiplies_each_factor_once() {
        let model = DiseaseModel::from_json_str(SIR).unwrap();
        let s = model.state_index("susceptible").unwrap();
        let i = model.state_index("infectious").unwrap();

        let p = model.propensity(s, i, 3600, 0.5, 2.0);
        assert!((p - 0.5 * 3600.0 * 1.0 * 0.5 * 0.8 * 2.0).abs() < 1e-9);
    }

    #[test]
    fn age_banded_starting_states() {
        let model = DiseaseModel::from_json_str(
            r#"{
                "transmissibility": 0.0,
                "starting_states": [
                    {"starting_state": "young", "age_lower": 0, "age_upper": 17},
                    {"starting_state": "adult", "age_lower": 18, "age_upper": 200}
                ],
                "disease_states": [
                    {"state_label": "young", "susceptibility": 1.0},
                    {"state_label": "adult", "susceptibility": 1.0}
                ]
            }"#,
        )
        .unwrap();

        let values = vec![Value::Int(12)];
        assert_eq!(
            model.healthy_state_for(&values, Some(0)).unwrap(),
            model.state_index("young").unwrap()
        );
        let values = vec![Value::Int(40)];
        assert_eq!(
            model.healthy_state_for(&values, Some(0)).unwrap(),
            model.state_index("adult").unwrap()
        );
    }

    #[test]
    fn rejects_overweight_transition_sets() {
        let result = DiseaseModel::from_json_str(
            r#"{
                "transmissibility": 0.0,
                "starting_states": [{"starting_state": "a"}],
                "disease_states": [
                    {"state_label": "a", "timed_transition": {"transitions": [
                        {"next_state": "a", "with_prob": 0.7, "forever": {}},
                        {"next_state": "a", "with_prob": 0.7, "forever": {}}]}}
                ]
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_undefined_transition_targets() {
        let result = DiseaseModel::from_json_str(
            r#"{
                "transmissibility": 0.0,
                "starting_states": [{"starting_state": "a"}],
                "disease_states": [
                    {"state_label": "a", "exposure_transition": {"next_state": "ghost"}}
                ]
            }"#,
        );
        assert!(result.is_err());
    }
}
