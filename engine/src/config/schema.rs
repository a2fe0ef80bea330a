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
use serde::Deserialize;

use crate::attributes::{AttributeTable, Value};
use crate::models::custom_types::Id;

/// Sidecar schema describing one scenario CSV: the role of each column, plus
/// optional row counts and partition offsets from the preprocessing step.
#[derive(Clone, Debug, Deserialize)]
pub struct CsvDefinition {
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub partition_offsets: Vec<Id>,
    #[serde(default)]
    pub num_rows: Option<Id>,
    /// Day of the first row's absolute times in the visit file.
    #[serde(default)]
    pub start_day: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub role: ColumnRole,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Ignore,
    UniqueId,
    ForeignId,
    StartTime,
    Duration,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Double,
    Bool,
    String,
    Label,
}

impl ColumnRole {
    /// Whether the column lands in the entity's attribute vector.
    fn is_attribute(self) -> bool {
        !matches!(
            self,
            ColumnRole::Ignore
                | ColumnRole::UniqueId
                | ColumnRole::ForeignId
                | ColumnRole::StartTime
                | ColumnRole::Duration
        )
    }

    fn default_value(self) -> Value {
        match self {
            ColumnRole::Bool => Value::Bool(false),
            ColumnRole::Double => Value::Double(0.0),
            ColumnRole::String | ColumnRole::Label => Value::Str(String::new()),
            _ => Value::Int(0),
        }
    }

    pub fn parse(self, text: &str) -> Result<Value> {
        let text = text.trim();
        Ok(match self {
            ColumnRole::Bool => Value::Bool(matches!(text, "1" | "true" | "True" | "TRUE")),
            ColumnRole::Double => {
                Value::Double(text.parse().with_context(|| format!("bad double {:?}", text))?)
            }
            ColumnRole::String | ColumnRole::Label => Value::Str(text.to_string()),
            _ => Value::Int(text.parse().with_context(|| format!("bad integer {:?}", text))?),
        })
    }
}

impl CsvDefinition {
    pub fn load(path: &Path) -> Result<CsvDefinition> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read csv schema at {}", path.display()))?;
        let definition: CsvDefinition = serde_json::from_str(&text)
            .with_context(|| format!("could not parse csv schema at {}", path.display()))?;
        if definition.fields.is_empty() {
            bail!("csv schema at {} defines no columns", path.display());
        }
        Ok(definition)
    }

    fn column_with_role(&self, role: ColumnRole) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.role == role)
            .ok_or_else(|| anyhow!("csv schema has no {:?} column", role))
    }

    pub fn unique_id_column(&self) -> Result<usize> {
        self.column_with_role(ColumnRole::UniqueId)
    }

    pub fn foreign_id_column(&self) -> Result<usize> {
        self.column_with_role(ColumnRole::ForeignId)
    }

    pub fn start_time_column(&self) -> Result<usize> {
        self.column_with_role(ColumnRole::StartTime)
    }

    pub fn duration_column(&self) -> Result<usize> {
        self.column_with_role(ColumnRole::Duration)
    }

    /// The attribute schema induced by this file's data columns.
    pub fn attribute_table(&self) -> AttributeTable {
        let mut table = AttributeTable::new();
        for field in &self.fields {
            if field.role.is_attribute() {
                let default =
                    field.default.clone().unwrap_or_else(|| field.role.default_value());
                table.push(&field.name, default);
            }
        }
        table
    }

    /// Parses one record's attribute columns, in schema order.
    pub fn parse_attributes(&self, record: &csv::StringRecord) -> Result<Vec<Value>> {
        if record.len() != self.fields.len() {
            bail!("row has {} columns, schema expects {}", record.len(), self.fields.len());
        }
        let mut values = Vec::new();
        for (field, text) in self.fields.iter().zip(record.iter()) {
            if field.role.is_attribute() {
                values.push(
                    field.role.parse(text).with_context(|| format!("column {:?}", field.name))?,
                );
            }
        }
        Ok(values)
    }

    pub fn parse_id(&self, record: &csv::StringRecord, column: usize) -> Result<Id> {
        record
            .get(column)
            .ok_or_else(|| anyhow!("row is missing column {}", column))?
            .trim()
            .parse()
            .with_context(|| format!("bad id in column {}", column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people_schema() -> CsvDefinition {
        serde_json::from_str(
            r#"{
                "fields": [
                    {"name": "pid", "role": "unique_id"},
                    {"name": "age", "role": "int32"},
                    {"name": "employed", "role": "bool"},
                    {"name": "comment", "role": "ignore"}
                ],
                "num_rows": 100,
                "partition_offsets": [0, 50]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn attribute_table_skips_special_and_ignored_columns() {
        let schema = people_schema();
        let table = schema.attribute_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.index_of("age"), Some(0));
        assert_eq!(table.index_of("employed"), Some(1));
    }

    #[test]
    fn parses_rows_positionally() {
        let schema = people_schema();
        let record = csv::StringRecord::from(vec!["17", "42", "True", "whatever"]);

        assert_eq!(schema.parse_id(&record, schema.unique_id_column().unwrap()).unwrap(), 17);
        assert_eq!(
            schema.parse_attributes(&record).unwrap(),
            vec![Value::Int(42), Value::Bool(true)]
        );
    }

    #[test]
    fn rejects_rows_with_the_wrong_arity() {
        let schema = people_schema();
        let record = csv::StringRecord::from(vec!["17", "42"]);
        assert!(schema.parse_attributes(&record).is_err());
    }

    #[test]
    fn visit_schema_exposes_the_special_columns() {
        let schema: CsvDefinition = serde_json::from_str(
            r#"{
                "fields": [
                    {"name": "pid", "role": "unique_id"},
                    {"name": "lid", "role": "foreign_id"},
                    {"name": "start_time", "role": "start_time"},
                    {"name": "duration", "role": "duration"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(schema.unique_id_column().unwrap(), 0);
        assert_eq!(schema.foreign_id_column().unwrap(), 1);
        assert_eq!(schema.start_time_column().unwrap(), 2);
        assert_eq!(schema.duration_column().unwrap(), 3);
    }
}
