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

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Parser;

use engine::config::{Arguments, GridDim, OnTheFlyArguments, RunMode};
use engine::contact_model::ContactModelType;
use engine::models::constants::DAYS_IN_WEEK;
use engine::transport::aggregator::AggregatorParam;
use engine::Epidemiology;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// 0 runs a scenario directory; 1 generates an on-the-fly population
    mode: u8,

    /// Mode 0: <people partitions> <location partitions> <days>
    /// <distinct visit days> <output dir> <disease model> <scenario dir>.
    /// Mode 1: <people width> <people height> <location width>
    /// <location height> <avg visits/day> <partition grid width>
    /// <partition grid height> <people partitions> <days> <output dir>
    /// <disease model>
    rest: Vec<String>,

    #[arg(short = 'm', long = "min-max-alpha", default_value_t = false)]
    #[arg(help = "Use the min-max-alpha contact model instead of a constant probability")]
    min_max_alpha: bool,

    #[arg(short = 'i', long = "intervention", value_name = "FILE")]
    #[arg(help = "Apply the interventions described in this model file")]
    intervention: Option<PathBuf>,

    #[arg(long, default_value_t = 0)]
    #[arg(help = "Global seed for every random stream in the run")]
    seed: u64,
}

fn positional<T: FromStr>(rest: &[String], index: usize, name: &str) -> Result<T>
where
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
{
    rest.get(index)
        .ok_or_else(|| anyhow::anyhow!("missing argument <{}>", name))?
        .parse()
        .with_context(|| format!("bad value for <{}>", name))
}

fn to_arguments(args: &Args) -> Result<Arguments> {
    let rest = &args.rest;
    let mut arguments = match args.mode {
        0 => {
            if rest.len() != 7 {
                bail!(
                    "usage: loimos 0 <people partitions> <location partitions> <days> \
                     <distinct visit days> <output dir> <disease model> <scenario dir>"
                );
            }
            Arguments::new(
                RunMode::RealData { scenario_dir: PathBuf::from(&rest[6]) },
                positional(rest, 0, "people partitions")?,
                positional(rest, 1, "location partitions")?,
                positional(rest, 2, "days")?,
                positional(rest, 3, "distinct visit days")?,
                PathBuf::from(&rest[4]),
                PathBuf::from(&rest[5]),
            )
        }
        1 => {
            if rest.len() != 11 {
                bail!(
                    "usage: loimos 1 <people width> <people height> <location width> \
                     <location height> <avg visits/day> <partition grid width> \
                     <partition grid height> <people partitions> <days> <output dir> \
                     <disease model>"
                );
            }
            let people_grid =
                GridDim::new(positional(rest, 0, "people width")?, positional(rest, 1, "people height")?);
            let location_grid = GridDim::new(
                positional(rest, 2, "location width")?,
                positional(rest, 3, "location height")?,
            );
            let partition_grid = GridDim::new(
                positional(rest, 5, "partition grid width")?,
                positional(rest, 6, "partition grid height")?,
            );
            let on_the_fly = OnTheFlyArguments::new(
                people_grid,
                location_grid,
                partition_grid,
                positional(rest, 4, "avg visits/day")?,
            )?;
            let num_location_partitions = partition_grid.area() as usize;
            Arguments::new(
                RunMode::OnTheFly(on_the_fly),
                positional(rest, 7, "people partitions")?,
                num_location_partitions,
                positional(rest, 8, "days")?,
                DAYS_IN_WEEK,
                PathBuf::from(&rest[9]),
                PathBuf::from(&rest[10]),
            )
        }
        other => bail!("unknown mode {}; expected 0 (real data) or 1 (on the fly)", other),
    };

    arguments.intervention_path = args.intervention.clone();
    if args.min_max_alpha {
        arguments.contact_model = ContactModelType::MinMaxAlpha;
    }
    arguments.seed = args.seed;
    arguments.visit_aggregation = AggregatorParam::from_env("HC_VISIT_PARAMS")?;
    arguments.interact_aggregation = AggregatorParam::from_env("HC_INTERACT_PARAMS")?;
    Ok(arguments)
}

fn run() -> Result<()> {
    let args = Args::parse();
    let arguments = to_arguments(&args)?;
    Epidemiology::new(arguments)?.run()
}

fn main() {
    env_logger::init();
    if let Err(error) = run() {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }
}
