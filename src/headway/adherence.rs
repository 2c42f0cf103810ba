//! Promise classification and per-route aggregation.

use std::collections::HashMap;

use super::policy;
use super::{MeasuredHeadway, StopEvent};

/// Fixed grace applied on top of every promised headway, in minutes.
pub const GRACE_MINUTES: f64 = 5.0;

/// Overall on-time rate at or above which a reporting period counts as good.
pub const GOOD_RATE_THRESHOLD: f64 = 0.80;

/// A measured headway judged against its route's promise.
#[derive(Debug, Clone, PartialEq)]
pub struct AdherenceVerdict {
    pub event: StopEvent,
    pub headway_minutes: f64,
    pub promised_minutes: f64,
    pub met_promise: bool,
}

/// Judge each measured headway against the promise table.
///
/// Records whose route carries no promise are dropped: they are excluded
/// from both the numerator and the denominator of every rate, never counted
/// as failures. The promise is resolved at the visit's arrival time of day,
/// and any headway within the promise plus the grace window counts as met;
/// arbitrarily early departures always count as met.
pub fn classify(measured: Vec<MeasuredHeadway>) -> Vec<AdherenceVerdict> {
    measured
        .into_iter()
        .filter_map(|m| {
            let promised = policy::promised_headway(
                m.event.route_id,
                &m.event.route_name,
                m.event.arrival_time.time(),
            )?;
            Some(AdherenceVerdict {
                headway_minutes: m.minutes,
                promised_minutes: promised,
                met_promise: m.minutes <= promised + GRACE_MINUTES,
                event: m.event,
            })
        })
        .collect()
}

/// On-time counts for one route over one reporting period.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePerformance {
    pub route_id: i64,
    pub route_name: String,
    pub total_met: u32,
    pub total: u32,
}

impl RoutePerformance {
    pub fn total_missed(&self) -> u32 {
        self.total - self.total_met
    }

    /// Always well defined: a route only appears here with at least one verdict.
    pub fn on_time_rate(&self) -> f64 {
        f64::from(self.total_met) / f64::from(self.total)
    }
}

/// Verdict for a whole reporting period, derived from the overall rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodStatus {
    Good,
    Bad,
}

/// Network-wide adherence over one reporting period.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPerformance {
    /// Sorted by on-time rate, best first; ties break on route name.
    pub routes: Vec<RoutePerformance>,
    pub overall_rate: f64,
    pub status: PeriodStatus,
}

impl NetworkPerformance {
    pub fn best_route(&self) -> &RoutePerformance {
        &self.routes[0]
    }

    pub fn worst_route(&self) -> &RoutePerformance {
        &self.routes[self.routes.len() - 1]
    }
}

/// Aggregate verdicts into per-route counts and the overall rate.
///
/// Returns `None` when there are no eligible verdicts at all: an empty
/// window is a distinct outcome, not 0% and not 100%.
pub fn aggregate(verdicts: &[AdherenceVerdict]) -> Option<NetworkPerformance> {
    if verdicts.is_empty() {
        return None;
    }

    let mut by_route: HashMap<(i64, &str), RoutePerformance> = HashMap::new();
    for verdict in verdicts {
        let entry = by_route
            .entry((verdict.event.route_id, verdict.event.route_name.as_str()))
            .or_insert_with(|| RoutePerformance {
                route_id: verdict.event.route_id,
                route_name: verdict.event.route_name.clone(),
                total_met: 0,
                total: 0,
            });
        entry.total += 1;
        if verdict.met_promise {
            entry.total_met += 1;
        }
    }

    let mut routes: Vec<RoutePerformance> = by_route.into_values().collect();
    routes.sort_by(|a, b| {
        b.on_time_rate()
            .total_cmp(&a.on_time_rate())
            .then_with(|| a.route_name.cmp(&b.route_name))
    });

    let total_met: u32 = routes.iter().map(|r| r.total_met).sum();
    let total: u32 = routes.iter().map(|r| r.total).sum();
    let overall_rate = f64::from(total_met) / f64::from(total);
    let status = if overall_rate >= GOOD_RATE_THRESHOLD {
        PeriodStatus::Good
    } else {
        PeriodStatus::Bad
    };

    Some(NetworkPerformance {
        routes,
        overall_rate,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 12)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn measured(
        route_id: i64,
        route_name: &str,
        minutes: f64,
        arrival: NaiveDateTime,
    ) -> MeasuredHeadway {
        MeasuredHeadway {
            event: StopEvent {
                route_id,
                route_name: route_name.to_string(),
                stop_id: 7,
                stop_name: "Main Quad".to_string(),
                bus_id: "B1".to_string(),
                arrival_time: arrival,
                departure_time: arrival,
                passenger_load: None,
            },
            minutes,
        }
    }

    fn verdict(route_id: i64, route_name: &str, met: bool) -> AdherenceVerdict {
        AdherenceVerdict {
            event: measured(route_id, route_name, 10.0, at(9, 0)).event,
            headway_minutes: 10.0,
            promised_minutes: 20.0,
            met_promise: met,
        }
    }

    #[test]
    fn grace_boundary_is_inclusive() {
        // Red Line/Arts Block promises 20; 25.0 is inside the grace, a hair
        // over is not.
        let verdicts = classify(vec![
            measured(48618, "Red Line/Arts Block", 25.0, at(9, 0)),
            measured(48618, "Red Line/Arts Block", 25.0001, at(9, 0)),
        ]);
        assert!(verdicts[0].met_promise);
        assert!(!verdicts[1].met_promise);
    }

    #[test]
    fn early_departures_count_as_met() {
        let verdicts = classify(vec![measured(48618, "Red Line/Arts Block", 0.2, at(9, 0))]);
        assert!(verdicts[0].met_promise);
    }

    #[test]
    fn promise_resolves_at_arrival_time_of_day() {
        let morning = classify(vec![measured(38732, "53rd Street Express", 18.0, at(9, 0))]);
        let midday = classify(vec![measured(38732, "53rd Street Express", 18.0, at(11, 0))]);
        // 18 minutes misses the 15-minute morning promise but meets the
        // 30-minute off-peak one.
        assert_eq!(morning[0].promised_minutes, 15.0);
        assert!(!morning[0].met_promise);
        assert_eq!(midday[0].promised_minutes, 30.0);
        assert!(midday[0].met_promise);
    }

    #[test]
    fn routes_without_a_promise_are_dropped() {
        let verdicts = classify(vec![
            measured(12345, "Game Day Charter", 10.0, at(9, 0)),
            measured(48618, "Red Line/Arts Block", 10.0, at(9, 0)),
        ]);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].event.route_id, 48618);
    }

    #[test]
    fn dropped_routes_are_absent_from_aggregation() {
        let verdicts = classify(vec![
            measured(12345, "Game Day Charter", 10.0, at(9, 0)),
            measured(48618, "Red Line/Arts Block", 10.0, at(9, 0)),
        ]);
        let performance = aggregate(&verdicts).unwrap();
        assert_eq!(performance.routes.len(), 1);
        assert_eq!(performance.routes[0].total, 1);
    }

    #[test]
    fn aggregate_counts_per_route() {
        let verdicts = vec![
            verdict(1, "Alpha", true),
            verdict(1, "Alpha", false),
            verdict(1, "Alpha", true),
            verdict(2, "Beta", true),
        ];
        let performance = aggregate(&verdicts).unwrap();
        let alpha = performance.routes.iter().find(|r| r.route_id == 1).unwrap();
        assert_eq!(alpha.total_met, 2);
        assert_eq!(alpha.total, 3);
        assert_eq!(alpha.total_missed(), 1);
        assert_eq!(performance.overall_rate, 0.75);
        assert_eq!(performance.status, PeriodStatus::Bad);
    }

    #[test]
    fn routes_sort_best_first() {
        let verdicts = vec![
            verdict(1, "Alpha", false),
            verdict(1, "Alpha", true),
            verdict(2, "Beta", true),
        ];
        let performance = aggregate(&verdicts).unwrap();
        assert_eq!(performance.best_route().route_name, "Beta");
        assert_eq!(performance.worst_route().route_name, "Alpha");
    }

    #[test]
    fn exact_threshold_rate_is_good() {
        let mut verdicts = vec![verdict(1, "Alpha", false)];
        verdicts.extend(std::iter::repeat_with(|| verdict(1, "Alpha", true)).take(4));
        let performance = aggregate(&verdicts).unwrap();
        assert_eq!(performance.overall_rate, 0.8);
        assert_eq!(performance.status, PeriodStatus::Good);
    }

    #[test]
    fn no_verdicts_is_an_explicit_no_data_outcome() {
        assert_eq!(aggregate(&[]), None);
    }
}
