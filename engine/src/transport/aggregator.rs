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

use std::env;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::models::custom_types::PartitionId;

/// Aggregator tuning, parsed from an environment variable holding
/// `use,buffer_size,threshold,flush_period,node_level`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AggregatorParam {
    pub buffer_size: usize,
    /// Flush when buffered bytes exceed this fraction of `buffer_size`.
    pub threshold: f64,
    pub flush_period: Duration,
    /// Accepted for interface compatibility; partitions within one process
    /// already share a node.
    pub node_level: bool,
}

impl AggregatorParam {
    /// `Ok(None)` when the variable is unset or opts out with a leading `0`.
    pub fn from_env(var: &str) -> Result<Option<AggregatorParam>> {
        let raw = match env::var(var) {
            Ok(raw) => raw,
            Err(_) => return Ok(None),
        };
        let tokens: Vec<&str> = raw.split(',').collect();
        if tokens.len() != 5 {
            bail!("{} must hold 5 comma-separated values, got {:?}", var, raw);
        }
        let in_use: u8 = tokens[0].parse().with_context(|| format!("{}: use flag", var))?;
        if in_use == 0 {
            return Ok(None);
        }
        Ok(Some(AggregatorParam {
            buffer_size: tokens[1].parse().with_context(|| format!("{}: buffer size", var))?,
            threshold: tokens[2].parse().with_context(|| format!("{}: threshold", var))?,
            flush_period: Duration::from_secs_f64(
                tokens[3].parse().with_context(|| format!("{}: flush period", var))?,
            ),
            node_level: tokens[4].parse::<u8>().with_context(|| format!("{}: node level", var))?
                != 0,
        }))
    }
}

/// Buffers point-to-point messages per destination partition and flushes a
/// destination when its buffer grows past the byte threshold or its oldest
/// message has waited longer than the flush period. Without parameters every
/// message is forwarded as a singleton batch. Flushing is transparent to the
/// receiver and never reorders messages from the same sender; every buffer is
/// drained unconditionally at the end of the sending phase.
pub struct Aggregator<M> {
    senders: Vec<Sender<Vec<M>>>,
    buffers: Vec<Vec<M>>,
    first_insert: Vec<Option<Instant>>,
    param: Option<AggregatorParam>,
}

impl<M> Aggregator<M> {
    pub fn new(senders: Vec<Sender<Vec<M>>>, param: Option<AggregatorParam>) -> Aggregator<M> {
        let count = senders.len();
        Aggregator {
            senders,
            buffers: (0..count).map(|_| Vec::new()).collect(),
            first_insert: vec![None; count],
            param,
        }
    }

    pub fn send(&mut self, destination: PartitionId, message: M) {
        let param = match self.param {
            None => {
                deliver(&self.senders[destination], vec![message]);
                return;
            }
            Some(param) => param,
        };

        let buffer = &mut self.buffers[destination];
        if buffer.is_empty() {
            self.first_insert[destination] = Some(Instant::now());
        }
        buffer.push(message);

        let buffered_bytes = buffer.len() * std::mem::size_of::<M>();
        let over_size = buffered_bytes > param.buffer_size;
        let over_threshold = buffered_bytes as f64 > param.threshold * param.buffer_size as f64;
        let over_period = self.first_insert[destination]
            .map_or(false, |first| first.elapsed() > param.flush_period);
        if over_size || over_threshold || over_period {
            self.flush(destination);
        }
    }

    pub fn flush(&mut self, destination: PartitionId) {
        if self.buffers[destination].is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.buffers[destination]);
        self.first_insert[destination] = None;
        deliver(&self.senders[destination], batch);
    }

    /// Phase barrier: everything buffered goes out now.
    pub fn flush_all(&mut self) {
        for destination in 0..self.senders.len() {
            self.flush(destination);
        }
    }
}

// A closed channel means the receiving partition died; the run cannot
// continue without it.
fn deliver<M>(sender: &Sender<Vec<M>>, batch: Vec<M>) {
    if sender.send(batch).is_err() {
        panic!("destination partition hung up mid-run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn without_params_messages_pass_straight_through() {
        let (tx, rx) = channel();
        let mut aggregator: Aggregator<u64> = Aggregator::new(vec![tx], None);

        aggregator.send(0, 7);
        aggregator.send(0, 8);

        assert_eq!(rx.try_recv().unwrap(), vec![7]);
        assert_eq!(rx.try_recv().unwrap(), vec![8]);
    }

    #[test]
    fn buffers_until_the_byte_threshold() {
        let (tx, rx) = channel();
        let param = AggregatorParam {
            buffer_size: 4 * std::mem::size_of::<u64>(),
            threshold: 1.0,
            flush_period: Duration::from_secs(3600),
            node_level: false,
        };
        let mut aggregator: Aggregator<u64> = Aggregator::new(vec![tx], Some(param));

        for value in 0..4 {
            aggregator.send(0, value);
            assert!(rx.try_recv().is_err());
        }
        aggregator.send(0, 4);
        assert_eq!(rx.try_recv().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn flush_all_drains_every_destination() {
        let (tx_a, rx_a) = channel();
        let (tx_b, rx_b) = channel();
        let param = AggregatorParam {
            buffer_size: 1 << 20,
            threshold: 1.0,
            flush_period: Duration::from_secs(3600),
            node_level: false,
        };
        let mut aggregator: Aggregator<u64> = Aggregator::new(vec![tx_a, tx_b], Some(param));

        aggregator.send(0, 1);
        aggregator.send(1, 2);
        assert!(rx_a.try_recv().is_err());

        aggregator.flush_all();
        assert_eq!(rx_a.try_recv().unwrap(), vec![1]);
        assert_eq!(rx_b.try_recv().unwrap(), vec![2]);
    }

    #[test]
    fn batching_preserves_sender_order() {
        let (tx, rx) = channel();
        let param = AggregatorParam {
            buffer_size: 2 * std::mem::size_of::<u64>(),
            threshold: 1.0,
            flush_period: Duration::from_secs(3600),
            node_level: false,
        };
        let mut aggregator: Aggregator<u64> = Aggregator::new(vec![tx], Some(param));

        for value in 0..9 {
            aggregator.send(0, value);
        }
        aggregator.flush_all();

        let received: Vec<u64> = rx.try_iter().flatten().collect();
        assert_eq!(received, (0..9).collect::<Vec<u64>>());
    }

    #[test]
    fn parses_the_env_format() {
        env::set_var("TEST_AGG_PARAMS", "1,65536,0.5,0.25,0");
        let param = AggregatorParam::from_env("TEST_AGG_PARAMS").unwrap().unwrap();
        assert_eq!(param.buffer_size, 65536);
        assert_eq!(param.threshold, 0.5);
        assert_eq!(param.flush_period, Duration::from_secs_f64(0.25));
        assert!(!param.node_level);

        env::set_var("TEST_AGG_PARAMS_OFF", "0,1,1,1,1");
        assert!(AggregatorParam::from_env("TEST_AGG_PARAMS_OFF").unwrap().is_none());

        env::remove_var("TEST_AGG_PARAMS_UNSET");
        assert!(AggregatorParam::from_env("TEST_AGG_PARAMS_UNSET").unwrap().is_none());

        env::set_var("TEST_AGG_PARAMS_BAD", "1,2,3");
        assert!(AggregatorParam::from_env("TEST_AGG_PARAMS_BAD").is_err());
    }
}
