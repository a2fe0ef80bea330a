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
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::Deserialize;

use crate::attributes::{AttributeTable, Value};
use crate::disease_model::DiseaseModel;
use crate::entity::Entity;
use crate::location::Location;
use crate::models::custom_types::{Day, Percentage};
use crate::person::Person;
use crate::utils::RandomWrapper;

pub mod school_closure;
pub mod self_isolation;
pub mod vaccination;

use school_closure::SchoolClosureIntervention;
use self_isolation::SelfIsolationIntervention;
use vaccination::VaccinationIntervention;

/// A person- or location-targeted policy. `test` may draw from the entity's
/// own random stream; `apply`/`revert` are exact inverses for filter-based
/// kinds and `revert` is a no-op where the effect cannot be undone.
pub trait Intervention<T: Entity>: Send + Sync {
    fn trigger_index(&self) -> usize;
    fn compliance(&self) -> Percentage;

    /// Rolled once per entity at load time.
    fn will_comply(&self, rng: &mut RandomWrapper) -> bool {
        rng.get().gen_bool(self.compliance().clamp(0.0, 1.0))
    }

    fn test(&self, entity: &mut T) -> bool;
    fn apply(&self, entity: &mut T);
    fn revert(&self, entity: &mut T);
}

/// Installs a filter rejecting every visit, keyed by the installing
/// intervention so the matching revert is exact.
pub(crate) fn install_reject_all<T: Entity>(entity: &mut T, intervention_index: usize) {
    entity.filters_mut().install(intervention_index, Arc::new(|_| false));
}

pub(crate) fn remove_visit_filter<T: Entity>(entity: &mut T, intervention_index: usize) {
    entity.filters_mut().remove(intervention_index);
}

/// A boolean condition with distinct on and off crossings. Off thresholds
/// only fire while the trigger is on, so a rate hovering between the two
/// keeps the current state (hysteresis).
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Day { trigger_on: Day, trigger_off: Day },
    NewDailyCases { trigger_on: f64, trigger_off: f64 },
}

impl Trigger {
    pub fn evaluate(&self, active: bool, day: Day, infection_rate: f64) -> bool {
        match *self {
            Trigger::Day { trigger_on, trigger_off } => {
                if active {
                    day < trigger_off
                } else {
                    day >= trigger_on && day < trigger_off
                }
            }
            Trigger::NewDailyCases { trigger_on, trigger_off } => {
                if active {
                    infection_rate > trigger_off
                } else {
                    infection_rate >= trigger_on
                }
            }
        }
    }
}

/// All interventions for a run: the shared trigger definitions plus the
/// person- and location-targeted intervention lists. Immutable after load;
/// the coordinator owns the mutable trigger flags.
pub struct InterventionModel {
    pub triggers: Vec<Trigger>,
    pub person_interventions: Vec<Box<dyn Intervention<Person>>>,
    pub location_interventions: Vec<Box<dyn Intervention<Location>>>,
}

impl InterventionModel {
    pub fn empty() -> InterventionModel {
        InterventionModel {
            triggers: Vec::new(),
            person_interventions: Vec::new(),
            location_interventions: Vec::new(),
        }
    }

    /// Reads an intervention file (JSON or YAML by extension), extending the
    /// attribute schemas with any columns the interventions need.
    pub fn load(
        path: &Path,
        person_attributes: &mut AttributeTable,
        location_attributes: &mut AttributeTable,
        disease_model: &DiseaseModel,
    ) -> Result<InterventionModel> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read intervention model at {}", path.display()))?;
        let raw: RawInterventionModel =
            if path.extension().map_or(false, |e| e == "yaml" || e == "yml") {
                serde_yaml::from_str(&text).with_context(|| {
                    format!("could not parse intervention model at {}", path.display())
                })?
            } else {
                serde_json::from_str(&text).with_context(|| {
                    format!("could not parse intervention model at {}", path.display())
                })?
            };

        for attribute in &raw.person_attributes {
            person_attributes.ensure(&attribute.name, attribute.default.clone());
        }
        for attribute in &raw.location_attributes {
            location_attributes.ensure(&attribute.name, attribute.default.clone());
        }

        let mut model = InterventionModel::empty();
        model.triggers = raw.triggers;

        for (index, spec) in raw.person_interventions.iter().enumerate() {
            if spec.trigger_index >= model.triggers.len() {
                bail!("person intervention {} references undefined trigger", index);
            }
            let intervention: Box<dyn Intervention<Person>> = match &spec.kind {
                RawKind::Vaccination { probability, vaccinated_susceptibility } => {
                    Box::new(VaccinationIntervention::new(
                        spec.compliance,
                        spec.trigger_index,
                        *probability,
                        *vaccinated_susceptibility,
                        person_attributes,
                    ))
                }
                RawKind::SelfIsolation {} => Box::new(SelfIsolationIntervention::new(
                    index,
                    spec.compliance,
                    spec.trigger_index,
                    disease_model.symptomatic_flags(),
                )),
                RawKind::SchoolClosures {} => {
                    bail!("school closures target locations, not people")
                }
            };
            model.person_interventions.push(intervention);
        }

        for (index, spec) in raw.location_interventions.iter().enumerate() {
            if spec.trigger_index >= model.triggers.len() {
                bail!("location intervention {} references undefined trigger", index);
            }
            let intervention: Box<dyn Intervention<Location>> = match &spec.kind {
                RawKind::SchoolClosures {} => Box::new(SchoolClosureIntervention::new(
                    index,
                    spec.compliance,
                    spec.trigger_index,
                    location_attributes,
                )?),
                _ => bail!("location intervention {} has a person-only kind", index),
            };
            model.location_interventions.push(intervention);
        }

        Ok(model)
    }

    /// Re-evaluates every trigger against today's totals, in place.
    pub fn evaluate_triggers(&self, flags: &mut [bool], day: Day, infection_rate: f64) {
        for (flag, trigger) in flags.iter_mut().zip(&self.triggers) {
            *flag = trigger.evaluate(*flag, day, infection_rate);
        }
    }
}

#[derive(Deserialize)]
struct RawInterventionModel {
    #[serde(default)]
    triggers: Vec<Trigger>,
    #[serde(default)]
    person_attributes: Vec<RawAttribute>,
    #[serde(default)]
    location_attributes: Vec<RawAttribute>,
    #[serde(default)]
    person_interventions: Vec<RawIntervention>,
    #[serde(default)]
    location_interventions: Vec<RawIntervention>,
}

#[derive(Deserialize)]
struct RawAttribute {
    name: String,
    default: Value,
}

#[derive(Deserialize)]
struct RawIntervention {
    #[serde(default = "full_compliance")]
    compliance: Percentage,
    trigger_index: usize,
    #[serde(flatten)]
    kind: RawKind,
}

fn full_compliance() -> Percentage {
    1.0
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawKind {
    Vaccination { probability: f64, vaccinated_susceptibility: f64 },
    SelfIsolation {},
    SchoolClosures {},
}
