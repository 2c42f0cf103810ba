//! Post-time scheduling and the posting handlers.
//!
//! One loop per report kind: each computes the next fire instant in the
//! configured zone, sleeps until it, runs the cycle, and reschedules. A
//! failed cycle is logged and skipped; the next scheduled fire is the
//! retry policy.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{error, info};

use crate::config::Config;
use crate::providers::bluesky::BlueskyClient;
use crate::providers::instagram::InstagramClient;
use crate::providers::shuttles::{FeedError, ShuttleClient};
use crate::providers::PostError;
use crate::report::{self, captions, ImageTemplate, Report, ReportError, ReportKind};

/// A social platform the bot can post to. Closed set; every cycle matches
/// on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Bluesky,
    Instagram,
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Feed client error: {0}")]
    Feed(#[from] FeedError),
    #[error("Posting client error: {0}")]
    Post(#[from] PostError),
}

/// The assembled bot: one feed client plus a posting client per configured
/// platform, owned for the life of the process. Authentication sessions are
/// NOT held here; they are created per cycle.
pub struct ReportBot {
    config: Config,
    shuttles: ShuttleClient,
    bluesky: Option<BlueskyClient>,
    instagram: Option<InstagramClient>,
}

impl ReportBot {
    pub fn new(config: Config) -> Result<Self, InitError> {
        let shuttles = ShuttleClient::new(
            config.feed.base_url.clone(),
            config.feed.api_key.clone(),
            config.schedule.timezone,
        )?;
        let bluesky = config
            .bluesky
            .as_ref()
            .map(|c| BlueskyClient::new(c.service.clone(), c.identifier.clone(), c.password.clone()))
            .transpose()?;
        let instagram = config
            .instagram
            .as_ref()
            .map(|c| InstagramClient::new(c.account_id.clone(), c.access_token.clone()))
            .transpose()?;
        Ok(Self {
            config,
            shuttles,
            bluesky,
            instagram,
        })
    }

    fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self.bluesky.is_some() {
            platforms.push(Platform::Bluesky);
        }
        if self.instagram.is_some() {
            platforms.push(Platform::Instagram);
        }
        platforms
    }

    /// Run the posting loops forever.
    pub async fn start(self: Arc<Self>) {
        info!(platforms = ?self.platforms(), "Starting report bot");

        if self.config.schedule.post_immediately {
            info!("post_immediately set; running both cycles now");
            self.run_cycle(ReportKind::Daily).await;
            self.run_cycle(ReportKind::Weekly).await;
        }

        let daily_self = self.clone();
        let daily = tokio::spawn(async move {
            daily_self
                .schedule_loop(
                    ReportKind::Daily,
                    daily_self.config.schedule.daily_post_time,
                    None,
                )
                .await;
        });

        let weekly_self = self.clone();
        let weekly = tokio::spawn(async move {
            weekly_self
                .schedule_loop(
                    ReportKind::Weekly,
                    weekly_self.config.schedule.weekly_post_time,
                    Some(Weekday::Mon),
                )
                .await;
        });

        // Both loops run forever.
        let _ = tokio::join!(daily, weekly);
    }

    async fn schedule_loop(&self, kind: ReportKind, at: NaiveTime, weekday: Option<Weekday>) {
        let tz = self.config.schedule.timezone;
        loop {
            let now = Utc::now().with_timezone(&tz);
            let Some(fire) = next_fire(now, at, weekday) else {
                // Only possible if the post time falls inside a DST gap
                // every day for a week; bail rather than spin.
                error!(kind = ?kind, "Could not compute a next post time");
                return;
            };
            let wait = (fire - now).to_std().unwrap_or_default();
            info!(kind = ?kind, fire = %fire, "Sleeping until next report");
            tokio::time::sleep(wait).await;

            self.run_cycle(kind).await;

            // Settle before rescheduling so a fast cycle cannot double-fire
            // within the same minute.
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        }
    }

    async fn run_cycle(&self, kind: ReportKind) {
        match self.cycle(kind).await {
            Ok(()) => info!(kind = ?kind, "Reporting cycle complete"),
            Err(e) => error!(kind = ?kind, error = %e, "Reporting cycle failed"),
        }
    }

    /// One full reporting cycle: build the report, then post it to every
    /// configured platform.
    async fn cycle(&self, kind: ReportKind) -> Result<(), ReportError> {
        let report = report::build_report(
            &self.shuttles,
            kind,
            Utc::now(),
            self.config.schedule.timezone,
        )
        .await?;

        for platform in self.platforms() {
            match platform {
                Platform::Bluesky => self.post_bluesky(&report).await?,
                Platform::Instagram => self.post_instagram(&report).await?,
            }
        }
        Ok(())
    }

    async fn post_bluesky(&self, report: &Report) -> Result<(), ReportError> {
        let Some(client) = &self.bluesky else {
            return Ok(());
        };
        let session = client.create_session().await?;
        client.post_thread(&session, &report.messages()).await?;
        Ok(())
    }

    async fn post_instagram(&self, report: &Report) -> Result<(), ReportError> {
        let (Some(client), Some(config)) = (&self.instagram, &self.config.instagram) else {
            return Ok(());
        };
        let Some(template) = report.image() else {
            info!("No data in window; skipping the Instagram image post");
            return Ok(());
        };
        let image_url = match template {
            ImageTemplate::Good => config.good_image_url.as_str(),
            ImageTemplate::Bad => config.bad_image_url.as_str(),
        };
        client
            .publish_photo(image_url, &captions::instagram_caption(report))
            .await?;
        Ok(())
    }
}

/// Next local occurrence of `at` strictly after `now`, optionally pinned to
/// a weekday. Scans day by day so DST gaps skip to the following valid day.
fn next_fire(now: DateTime<Tz>, at: NaiveTime, weekday: Option<Weekday>) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    for _ in 0..8 {
        if weekday.is_none_or(|wd| date.weekday() == wd) {
            if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() {
                if candidate > now {
                    return Some(candidate);
                }
            }
        }
        date = date.succ_opt()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn chicago() -> Tz {
        chrono_tz::America::Chicago
    }

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        chicago()
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(h, min, 0)
                    .unwrap(),
            )
            .unwrap()
    }

    fn eight() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn fires_today_when_the_post_time_is_still_ahead() {
        let next = next_fire(local(2026, 1, 12, 6, 0), eight(), None).unwrap();
        assert_eq!(next, local(2026, 1, 12, 8, 0));
    }

    #[test]
    fn fires_tomorrow_when_the_post_time_has_passed() {
        let next = next_fire(local(2026, 1, 12, 9, 0), eight(), None).unwrap();
        assert_eq!(next, local(2026, 1, 13, 8, 0));
    }

    #[test]
    fn exact_post_time_rolls_to_the_next_day() {
        let next = next_fire(local(2026, 1, 12, 8, 0), eight(), None).unwrap();
        assert_eq!(next, local(2026, 1, 13, 8, 0));
    }

    #[test]
    fn weekday_pin_finds_the_next_monday() {
        // 2026-01-13 is a Tuesday.
        let next = next_fire(local(2026, 1, 13, 10, 0), eight(), Some(Weekday::Mon)).unwrap();
        assert_eq!(next, local(2026, 1, 19, 8, 0));
        assert_eq!(next.weekday(), Weekday::Mon);
    }

    #[test]
    fn monday_morning_still_fires_the_same_day() {
        // 2026-01-12 is a Monday.
        let next = next_fire(local(2026, 1, 12, 6, 0), eight(), Some(Weekday::Mon)).unwrap();
        assert_eq!(next, local(2026, 1, 12, 8, 0));
    }

    #[test]
    fn post_time_inside_a_dst_gap_skips_to_the_next_day() {
        // US DST began 2026-03-08 at 02:00; 02:30 does not exist that day.
        let half_past_two = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let next = next_fire(local(2026, 3, 7, 12, 0), half_past_two, None).unwrap();
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
    }
}
