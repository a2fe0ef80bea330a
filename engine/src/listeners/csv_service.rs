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
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};

use crate::listeners::{Listener, SummaryRow};

/// Streams the day-by-day state histogram to `summary.csv`.
pub struct CsvListener {
    writer: csv::Writer<File>,
}

impl CsvListener {
    pub fn new(path: &Path) -> Result<CsvListener> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("could not create output directory {}", parent.display()))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("invalid output path {}", path.display()))?;
        writer
            .write_record(&["day", "state", "total_in_state", "change_in_state"])
            .with_context(|| format!("could not write to {}", path.display()))?;
        Ok(CsvListener { writer })
    }
}

impl Listener for CsvListener {
    fn day_summarized(&mut self, rows: &[SummaryRow]) {
        for row in rows {
            self.writer
                .write_record(&[
                    row.day.to_string(),
                    row.state.clone(),
                    row.total_in_state.to_string(),
                    row.change_in_state.to_string(),
                ])
                .expect("summary output failed mid-run");
        }
    }

    fn simulation_ended(&mut self) {
        self.writer.flush().expect("summary output failed at shutdown");
    }
}
