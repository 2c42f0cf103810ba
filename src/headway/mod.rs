//! Headway reconstruction from raw stop-visit telemetry.
//!
//! A headway is the time between successive departures from the same stop on
//! the same route, regardless of which vehicle made the previous departure.
//! Reconstruction is a single stateful pass over the visits in retrieval
//! order; the pass is total (one output record per input event) and the
//! unusable measurements are removed by a separate post-filter.

pub mod adherence;
pub mod policy;

use std::collections::HashMap;

use chrono::NaiveDateTime;

/// Gaps at or beyond this many minutes are layovers, not service gaps.
/// Overnight routes park for hours between runs; counting the parked gap
/// as a headway would swamp the averages.
pub const MAX_HEADWAY_MINUTES: f64 = 240.0;

/// One observed visit of a bus to a stop.
///
/// Both timestamps are naive local time in the reporting zone; the feed
/// provider converts from UTC before events reach this module. Mixing zones
/// here silently corrupts headways. `departure_time >= arrival_time` is
/// assumed, not verified.
#[derive(Debug, Clone, PartialEq)]
pub struct StopEvent {
    pub route_id: i64,
    pub route_name: String,
    pub stop_id: i64,
    pub stop_name: String,
    pub bus_id: String,
    pub arrival_time: NaiveDateTime,
    pub departure_time: NaiveDateTime,
    /// Boardings at this visit, when the feed reports them. Not consumed by
    /// the headway math.
    pub passenger_load: Option<u32>,
}

/// A stop visit enriched with its computed headway, when one was computable.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadwayRecord {
    pub event: StopEvent,
    /// Minutes since the previous departure from the same (route, stop)
    /// pair. `None` for the first visit to a pair and for same-stop
    /// re-reports by the same bus.
    pub headway_minutes: Option<f64>,
}

/// A post-filtered visit carrying a usable headway measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredHeadway {
    pub event: StopEvent,
    pub minutes: f64,
}

/// Reconstruct headways over one reporting window's visits.
///
/// Emits exactly one record per input event. A headway is attached when the
/// (route, stop) pair has a prior departure AND the bus is arriving from a
/// different stop; a bus dwelling at or re-reporting the same stop would
/// otherwise produce a spurious near-zero headway. Both state maps are
/// updated on every event, whether or not a headway was attached.
pub fn compute_headways(events: Vec<StopEvent>) -> Vec<HeadwayRecord> {
    let mut last_departure: HashMap<(i64, i64), NaiveDateTime> = HashMap::new();
    let mut last_stop_visited: HashMap<String, i64> = HashMap::new();

    let mut records = Vec::with_capacity(events.len());
    for event in events {
        let key = (event.route_id, event.stop_id);
        let same_stop_repeat = last_stop_visited.get(&event.bus_id) == Some(&event.stop_id);

        let headway_minutes = match last_departure.get(&key) {
            Some(prev) if !same_stop_repeat => {
                Some((event.departure_time - *prev).num_seconds() as f64 / 60.0)
            }
            _ => None,
        };

        last_departure.insert(key, event.departure_time);
        last_stop_visited.insert(event.bus_id.clone(), event.stop_id);

        records.push(HeadwayRecord {
            event,
            headway_minutes,
        });
    }
    records
}

/// Keep only records with a usable measurement: a headway was computed, it
/// is positive, and it is below the layover cutoff.
pub fn measured_headways(records: Vec<HeadwayRecord>) -> Vec<MeasuredHeadway> {
    records
        .into_iter()
        .filter_map(|record| {
            let minutes = record.headway_minutes?;
            if minutes > 0.0 && minutes < MAX_HEADWAY_MINUTES {
                Some(MeasuredHeadway {
                    event: record.event,
                    minutes,
                })
            } else {
                None
            }
        })
        .collect()
}
