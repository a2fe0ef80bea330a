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

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// One cell of an entity's dynamic attribute vector. The schema is decided at
/// load time from the scenario's column definitions plus any additions made
/// by the intervention file or the contact model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl Value {
    // Attribute cells are schema-typed; reading a cell at the wrong type is
    // an invariant violation, not a recoverable condition.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => panic!("attribute holds {:?}, expected bool", other),
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            other => panic!("attribute holds {:?}, expected int", other),
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            Value::Double(d) => *d,
            Value::Int(i) => *i as f64,
            other => panic!("attribute holds {:?}, expected double", other),
        }
    }

    /// Flag reading tolerant of scenarios that encode booleans as numbers.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i > 0,
            Value::Double(d) => *d > 0.0,
            other => panic!("attribute holds {:?}, expected a flag", other),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub default: Value,
}

/// Schema shared by every entity of one kind: attribute names, order, and
/// default values. Entities store a plain `Vec<Value>` parallel to this.
#[derive(Clone, Debug, Default)]
pub struct AttributeTable {
    list: Vec<Attribute>,
}

impl AttributeTable {
    pub fn new() -> AttributeTable {
        AttributeTable { list: Vec::new() }
    }

    pub fn push(&mut self, name: &str, default: Value) -> usize {
        self.list.push(Attribute { name: name.to_string(), default });
        self.list.len() - 1
    }

    /// Adds the attribute unless a column of the same name already exists,
    /// returning its index either way.
    pub fn ensure(&mut self, name: &str, default: Value) -> usize {
        match self.index_of(name) {
            Some(i) => i,
            None => self.push(name, default),
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.list.iter().position(|a| a.name == name)
    }

    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| anyhow!("no attribute named {:?} in schema", name))
    }

    pub fn defaults(&self) -> Vec<Value> {
        self.list.iter().map(|a| a.default.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.list[index].name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_resolve_indices_by_name() {
        let mut table = AttributeTable::new();
        table.push("age", Value::Int(0));
        table.push("susceptibility", Value::Double(1.0));

        assert_eq!(table.index_of("age"), Some(0));
        assert_eq!(table.require("susceptibility").unwrap(), 1);
        assert!(table.require("missing").is_err());
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut table = AttributeTable::new();
        assert_eq!(table.ensure("vaccinated", Value::Bool(false)), 0);
        assert_eq!(table.ensure("vaccinated", Value::Bool(false)), 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn defaults_follow_schema_order() {
        let mut table = AttributeTable::new();
        table.push("school", Value::Bool(true));
        table.push("max_simultaneous_visits", Value::Int(25));

        assert_eq!(table.defaults(), vec![Value::Bool(true), Value::Int(25)]);
    }
}
