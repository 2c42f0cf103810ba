//! Caption text for the posted reports.
//!
//! Bluesky gets the messages as a thread; Instagram gets them joined into
//! one caption under the status image.

use super::{Outcome, Report, ReportKind};
use crate::headway::adherence::{
    AdherenceVerdict, NetworkPerformance, PeriodStatus, RoutePerformance, GOOD_RATE_THRESHOLD,
};

const DATE_FORMAT: &str = "%A, %B %d, %Y";

/// The thread messages for a report: three for the daily report, four for
/// the weekly one, a single notice when the window held no data.
pub(crate) fn messages(report: &Report) -> Vec<String> {
    match &report.outcome {
        Outcome::NoData => vec![format!(
            "Shuttle check for {}: no recorded shuttle visits in this window, \
             so there is nothing to grade.",
            period_phrase(report)
        )],
        Outcome::Measured {
            performance,
            verdicts,
        } => {
            let mut messages = vec![
                lead_message(report, performance),
                best_route_message(performance.best_route()),
                worst_route_message(performance.worst_route(), verdicts),
            ];
            if report.kind == ReportKind::Weekly {
                messages.push(weekly_spread_message(performance));
            }
            messages
        }
    }
}

/// One caption for the Instagram post, with a short sign-off appended.
pub fn instagram_caption(report: &Report) -> String {
    let mut parts = messages(report);
    parts.push(
        "Automated report on campus shuttle headway adherence, \
         posted every morning from the previous day's telemetry."
            .to_string(),
    );
    parts.join("\n\n")
}

fn period_phrase(report: &Report) -> String {
    match report.kind {
        ReportKind::Daily => report.window.first_day.format(DATE_FORMAT).to_string(),
        ReportKind::Weekly => format!(
            "the week of {} through {}",
            report.window.first_day.format(DATE_FORMAT),
            report.window.last_day.format(DATE_FORMAT)
        ),
    }
}

fn lead_message(report: &Report, performance: &NetworkPerformance) -> String {
    let verdict = match (report.kind, performance.status) {
        (ReportKind::Daily, PeriodStatus::Good) => "A good day for the shuttles.",
        (ReportKind::Daily, PeriodStatus::Bad) => "Not a good day for the shuttles.",
        (ReportKind::Weekly, PeriodStatus::Good) => "A good week for the shuttles.",
        (ReportKind::Weekly, PeriodStatus::Bad) => "Not a good week for the shuttles.",
    };
    format!(
        "Shuttle check for {}: {} of tracked departures kept their promised headway. {}",
        period_phrase(report),
        percent(performance.overall_rate),
        verdict
    )
}

fn best_route_message(best: &RoutePerformance) -> String {
    format!(
        "Most dependable: {}, on its promise {} of {} times ({}).",
        best.route_name,
        best.total_met,
        best.total,
        percent(best.on_time_rate())
    )
}

fn worst_route_message(worst: &RoutePerformance, verdicts: &[AdherenceVerdict]) -> String {
    let mut message = format!(
        "Most delayed: {}, on its promise {} of {} times ({}).",
        worst.route_name,
        worst.total_met,
        worst.total,
        percent(worst.on_time_rate())
    );
    if let Some(excess) = average_miss_excess(worst, verdicts) {
        message.push_str(&format!(
            " Its {} missed departures ran {excess:.1} minutes over the promise on average.",
            worst.total_missed()
        ));
    }
    message
}

/// Average minutes over the promise across the route's missed departures.
fn average_miss_excess(route: &RoutePerformance, verdicts: &[AdherenceVerdict]) -> Option<f64> {
    let misses: Vec<f64> = verdicts
        .iter()
        .filter(|v| v.event.route_id == route.route_id && !v.met_promise)
        .map(|v| v.headway_minutes - v.promised_minutes)
        .collect();
    if misses.is_empty() {
        return None;
    }
    Some(misses.iter().sum::<f64>() / misses.len() as f64)
}

fn weekly_spread_message(performance: &NetworkPerformance) -> String {
    let reliable = performance
        .routes
        .iter()
        .filter(|r| r.on_time_rate() >= GOOD_RATE_THRESHOLD)
        .count();
    format!(
        "{} of {} tracked routes kept their promise at least 80% of the time this week.",
        reliable,
        performance.routes.len()
    )
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}
