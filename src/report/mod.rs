//! The parameterized reporting pipeline.
//!
//! One implementation serves both cadences: the daily report covers the
//! previous civil day, the weekly report covers the trailing seven civil
//! days. A cycle fetches the window's stop visits, runs the headway pass
//! and the adherence classifier over them, aggregates per route, and
//! renders the caption messages the posting handlers send out.

pub mod captions;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info};

use crate::headway::{
    self,
    adherence::{self, AdherenceVerdict, NetworkPerformance, PeriodStatus},
};
use crate::providers::shuttles::{FeedError, ShuttleClient};
use crate::providers::PostError;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("Post error: {0}")]
    Post(#[from] PostError),
    #[error("No local midnight exists for {0} in the reporting zone")]
    InvalidLocalTime(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Daily,
    Weekly,
}

impl ReportKind {
    /// Number of civil days the report covers.
    pub fn days(self) -> i64 {
        match self {
            ReportKind::Daily => 1,
            ReportKind::Weekly => 7,
        }
    }
}

/// The half-open `[start, end)` reporting window, aligned to local civil
/// days and carried as UTC instants for the feed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub first_day: NaiveDate,
    /// Inclusive; equals `first_day` for the daily report.
    pub last_day: NaiveDate,
}

impl ReportWindow {
    /// The window ending at local midnight today, covering the previous
    /// `kind.days()` civil days in `tz`.
    pub fn ending_today(
        kind: ReportKind,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<Self, ReportError> {
        let today = now.with_timezone(&tz).date_naive();
        let first_day = today - Duration::days(kind.days());
        let last_day = today - Duration::days(1);
        Ok(Self {
            start: local_midnight(first_day, tz)?,
            end: local_midnight(today, tz)?,
            first_day,
            last_day,
        })
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>, ReportError> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(ReportError::InvalidLocalTime(date))
}

/// Which pre-rendered status image a post should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTemplate {
    Good,
    Bad,
}

impl ImageTemplate {
    pub fn for_status(status: PeriodStatus) -> Self {
        match status {
            PeriodStatus::Good => ImageTemplate::Good,
            PeriodStatus::Bad => ImageTemplate::Bad,
        }
    }
}

/// What a window's data amounted to.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// No eligible measurements at all. Distinct from a 0% on-time period.
    NoData,
    Measured {
        performance: NetworkPerformance,
        /// The classified per-visit records, for drill-down captions.
        verdicts: Vec<AdherenceVerdict>,
    },
}

/// Everything a posting handler needs for one reporting cycle.
#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ReportKind,
    pub window: ReportWindow,
    pub outcome: Outcome,
}

impl Report {
    /// The thread messages for this report, in posting order.
    pub fn messages(&self) -> Vec<String> {
        captions::messages(self)
    }

    /// The status image to attach, or `None` when there is no data to grade.
    pub fn image(&self) -> Option<ImageTemplate> {
        match &self.outcome {
            Outcome::Measured { performance, .. } => {
                Some(ImageTemplate::for_status(performance.status))
            }
            Outcome::NoData => None,
        }
    }
}

/// Run the data half of one reporting cycle: fetch the window and push it
/// through the headway, policy, and aggregation stages.
pub async fn build_report(
    client: &ShuttleClient,
    kind: ReportKind,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Report, ReportError> {
    let window = ReportWindow::ending_today(kind, now, tz)?;
    let events = client.fetch_stop_events(window.start, window.end).await?;

    let records = headway::compute_headways(events);
    let measured = headway::measured_headways(records);
    debug!(measured = measured.len(), "Usable headway measurements");

    let verdicts = adherence::classify(measured);
    let outcome = match adherence::aggregate(&verdicts) {
        Some(performance) => {
            info!(
                kind = ?kind,
                routes = performance.routes.len(),
                overall_rate = performance.overall_rate,
                status = ?performance.status,
                "Built report"
            );
            Outcome::Measured {
                performance,
                verdicts,
            }
        }
        None => {
            info!(kind = ?kind, "Built report: no eligible measurements in window");
            Outcome::NoData
        }
    };

    Ok(Report {
        kind,
        window,
        outcome,
    })
}
