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

use std::cmp::Ordering;

use crate::models::custom_types::{Id, StateId, Time};

/// Departures sort before arrivals at equal times, so the discriminants
/// matter for the derived order below.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventType {
    Departure = 0,
    Arrival = 1,
}

/// One side of a visit as seen by a location queue: a person arriving at or
/// leaving a location at a second of the day. `partner_time` is the matching
/// departure's time on an arrival and vice versa.
#[derive(Copy, Clone, Debug)]
pub struct Event {
    pub event_type: EventType,
    pub person_id: Id,
    pub person_state: StateId,
    /// Susceptibility or infectivity modifier, depending on disease state.
    pub transmission_modifier: f64,
    pub scheduled_time: Time,
    pub partner_time: Time,
}

impl Event {
    /// Makes two events each other's partners.
    pub fn pair(arrival: &mut Event, departure: &mut Event) {
        arrival.partner_time = departure.scheduled_time;
        departure.partner_time = arrival.scheduled_time;
    }
}

// Total order for the location queues: time, then type (departures first),
// then visitor id, then visitor state. The transmission modifier is not part
// of an event's identity.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.scheduled_time, self.event_type, self.person_id, self.person_state).cmp(&(
            other.scheduled_time,
            other.event_type,
            other.person_id,
            other.person_state,
        ))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

/// Heap entry for the arrivals currently present at a location. The heap is
/// keyed by partner (departure) time so that its root is always the arrival
/// that departs next; ties break toward the smaller visitor id.
#[derive(Copy, Clone, Debug)]
pub struct PendingArrival(pub Event);

impl Ord for PendingArrival {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.0.partner_time, other.0.person_id, other.0.person_state).cmp(&(
            self.0.partner_time,
            self.0.person_id,
            self.0.person_state,
        ))
    }
}

impl PartialOrd for PendingArrival {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingArrival {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingArrival {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn event(event_type: EventType, person_id: Id, time: Time, partner: Time) -> Event {
        Event {
            event_type,
            person_id,
            person_state: 0,
            transmission_modifier: 1.0,
            scheduled_time: time,
            partner_time: partner,
        }
    }

    #[test]
    fn should_order_departures_before_arrivals_at_equal_times() {
        let mut events = vec![
            event(EventType::Arrival, 2, 100, 200),
            event(EventType::Departure, 1, 100, 50),
            event(EventType::Arrival, 1, 50, 100),
        ];
        events.sort();

        assert_eq!(events[0].scheduled_time, 50);
        assert_eq!(events[1].event_type, EventType::Departure);
        assert_eq!(events[2].event_type, EventType::Arrival);
    }

    #[test]
    fn should_break_time_ties_by_person_id() {
        let mut events = vec![
            event(EventType::Arrival, 9, 100, 300),
            event(EventType::Arrival, 3, 100, 200),
        ];
        events.sort();
        assert_eq!(events[0].person_id, 3);
    }

    #[test]
    fn heap_root_is_the_earliest_departure() {
        let mut heap = BinaryHeap::new();
        heap.push(PendingArrival(event(EventType::Arrival, 1, 0, 500)));
        heap.push(PendingArrival(event(EventType::Arrival, 2, 10, 300)));
        heap.push(PendingArrival(event(EventType::Arrival, 3, 20, 400)));

        assert_eq!(heap.pop().unwrap().0.person_id, 2);
        assert_eq!(heap.pop().unwrap().0.person_id, 3);
        assert_eq!(heap.pop().unwrap().0.person_id, 1);
    }

    #[test]
    fn should_pair_events() {
        let mut arrival = event(EventType::Arrival, 7, 100, 0);
        let mut departure = event(EventType::Departure, 7, 900, 0);
        Event::pair(&mut arrival, &mut departure);

        assert_eq!(arrival.partner_time, 900);
        assert_eq!(departure.partner_time, 100);
    }
}
