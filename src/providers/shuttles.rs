//! Client for the campus shuttle telemetry feed.
//!
//! The feed serves one CSV row per observed stop visit for an explicit
//! `[start, end)` UTC window. Rows come back in retrieval order, which the
//! headway pass treats as arrival order; this client preserves it.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use futures::StreamExt;
use thiserror::Error;
use tracing::info;

use super::USER_AGENT;
use crate::headway::StopEvent;

/// Maximum allowed CSV response size (32 MB). A day of visits is a few
/// hundred KB; anything near this is a misbehaving feed.
const MAX_RESPONSE_SIZE: usize = 32 * 1024 * 1024;

/// Timestamp format used in the query string and in feed cells.
const FEED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Network error: {0}")]
    NetworkMessage(String),
    #[error("Feed parse error: {0}")]
    Parse(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub struct ShuttleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Zone all event times are normalized into before they reach the
    /// headway pass.
    timezone: Tz,
}

impl ShuttleClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timezone: Tz,
    ) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timezone,
        })
    }

    /// Fetch every stop visit in `[start, end)`, with arrival and departure
    /// times normalized to the reporting zone.
    pub async fn fetch_stop_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StopEvent>, FeedError> {
        let url = format!(
            "{}/api/getStops?start={}&end={}",
            self.base_url,
            urlencoding::encode(&start.format(FEED_TIME_FORMAT).to_string()),
            urlencoding::encode(&end.format(FEED_TIME_FORMAT).to_string()),
        );

        let response = self
            .http
            .get(&url)
            .header("key", &self.api_key)
            .timeout(std::time::Duration::from_secs(60))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::NetworkMessage(format!(
                "stop feed HTTP {}",
                response.status()
            )));
        }

        // Stream the body with an explicit cap rather than trusting
        // Content-Length.
        let mut body: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > MAX_RESPONSE_SIZE {
                return Err(FeedError::NetworkMessage(format!(
                    "stop feed response exceeded {} bytes",
                    MAX_RESPONSE_SIZE
                )));
            }
            body.extend_from_slice(&chunk);
        }

        let events = parse_stop_events(&body, self.timezone)?;
        info!(
            count = events.len(),
            start = %start,
            end = %end,
            "Fetched stop visits"
        );
        Ok(events)
    }
}

/// Parse the feed CSV into stop events.
///
/// Parsing is strict: a missing column or a malformed required cell aborts
/// the whole batch. A silently dropped row would bias every adherence rate
/// computed downstream, with no signal that it happened. `passengerLoad` is
/// the one optional cell.
pub fn parse_stop_events(body: &[u8], tz: Tz) -> Result<Vec<StopEvent>, FeedError> {
    let mut rdr = csv::Reader::from_reader(body);
    let headers = rdr.headers()?.clone();
    let required = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| FeedError::Parse(format!("feed is missing the {name} column")))
    };

    let idx_route_id = required("routeId")?;
    let idx_route_name = required("routeName")?;
    let idx_stop_id = required("stopId")?;
    let idx_stop_name = required("stopName")?;
    let idx_bus_id = required("busId")?;
    let idx_arrival = required("arrivalTime")?;
    let idx_departure = required("departureTime")?;
    let idx_load = headers.iter().position(|h| h == "passengerLoad");

    let mut events = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        // Header occupies line 1.
        let line = row + 2;
        let cell = |idx: usize, name: &'static str| {
            record
                .get(idx)
                .ok_or_else(|| FeedError::Parse(format!("line {line}: missing {name} cell")))
        };

        let route_id = parse_int(cell(idx_route_id, "routeId")?, line, "routeId")?;
        let stop_id = parse_int(cell(idx_stop_id, "stopId")?, line, "stopId")?;
        let route_name = non_empty(cell(idx_route_name, "routeName")?, line, "routeName")?;
        let stop_name = non_empty(cell(idx_stop_name, "stopName")?, line, "stopName")?;
        let bus_id = non_empty(cell(idx_bus_id, "busId")?, line, "busId")?;
        let arrival_utc = parse_feed_time(cell(idx_arrival, "arrivalTime")?, line, "arrivalTime")?;
        let departure_utc =
            parse_feed_time(cell(idx_departure, "departureTime")?, line, "departureTime")?;

        let passenger_load = match idx_load.and_then(|i| record.get(i)) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<u32>()
                    .map_err(|_| invalid(line, "passengerLoad", raw))?,
            ),
        };

        events.push(StopEvent {
            route_id,
            route_name,
            stop_id,
            stop_name,
            bus_id,
            arrival_time: utc_to_local(arrival_utc, tz),
            departure_time: utc_to_local(departure_utc, tz),
            passenger_load,
        });
    }
    Ok(events)
}

fn invalid(line: usize, name: &str, raw: &str) -> FeedError {
    FeedError::Parse(format!("line {line}: invalid {name} value {raw:?}"))
}

fn parse_int(raw: &str, line: usize, name: &'static str) -> Result<i64, FeedError> {
    raw.trim().parse().map_err(|_| invalid(line, name, raw))
}

fn non_empty(raw: &str, line: usize, name: &'static str) -> Result<String, FeedError> {
    if raw.is_empty() {
        return Err(FeedError::Parse(format!("line {line}: empty {name} cell")));
    }
    Ok(raw.to_string())
}

/// Feed timestamps are naive UTC, with or without fractional seconds.
fn parse_feed_time(raw: &str, line: usize, name: &'static str) -> Result<NaiveDateTime, FeedError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|_| invalid(line, name, raw))
}

fn utc_to_local(naive_utc: NaiveDateTime, tz: Tz) -> NaiveDateTime {
    Utc.from_utc_datetime(&naive_utc)
        .with_timezone(&tz)
        .naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HEADER: &str =
        "routeId,routeName,stopId,stopName,busId,arrivalTime,departureTime,passengerLoad\n";

    fn chicago() -> Tz {
        chrono_tz::America::Chicago
    }

    #[test]
    fn parses_rows_and_converts_to_the_reporting_zone() {
        // 2026-01-12 is deep in CST (UTC-6).
        let csv = format!(
            "{HEADER}48618,Red Line/Arts Block,4012,Reynolds Club,UGO71,\
             2026-01-12 14:05:00,2026-01-12 14:06:30,3\n"
        );
        let events = parse_stop_events(csv.as_bytes(), chicago()).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.route_id, 48618);
        assert_eq!(event.route_name, "Red Line/Arts Block");
        assert_eq!(event.stop_id, 4012);
        assert_eq!(event.bus_id, "UGO71");
        assert_eq!(event.passenger_load, Some(3));
        assert_eq!(
            event.arrival_time,
            NaiveDate::from_ymd_opt(2026, 1, 12)
                .unwrap()
                .and_hms_opt(8, 5, 0)
                .unwrap()
        );
        assert_eq!(
            event.departure_time,
            NaiveDate::from_ymd_opt(2026, 1, 12)
                .unwrap()
                .and_hms_opt(8, 6, 30)
                .unwrap()
        );
    }

    #[test]
    fn preserves_retrieval_order() {
        let csv = format!(
            "{HEADER}1,North,10,A,B1,2026-01-12 04:00:00,2026-01-12 04:01:00,\n\
             1,North,11,B,B1,2026-01-12 03:00:00,2026-01-12 03:01:00,\n"
        );
        let events = parse_stop_events(csv.as_bytes(), chicago()).unwrap();
        assert_eq!(events[0].stop_id, 10);
        assert_eq!(events[1].stop_id, 11);
    }

    #[test]
    fn empty_passenger_load_is_none() {
        let csv = format!(
            "{HEADER}38728,Drexel,9,Quad,UGO2,2026-01-12 14:00:00,2026-01-12 14:01:00,\n"
        );
        let events = parse_stop_events(csv.as_bytes(), chicago()).unwrap();
        assert_eq!(events[0].passenger_load, None);
    }

    #[test]
    fn missing_passenger_load_column_is_tolerated() {
        let csv = "routeId,routeName,stopId,stopName,busId,arrivalTime,departureTime\n\
                   38728,Drexel,9,Quad,UGO2,2026-01-12 14:00:00,2026-01-12 14:01:00\n";
        let events = parse_stop_events(csv.as_bytes(), chicago()).unwrap();
        assert_eq!(events[0].passenger_load, None);
    }

    #[test]
    fn missing_required_column_fails_the_batch() {
        let csv = "routeId,routeName,stopName,busId,arrivalTime,departureTime,passengerLoad\n";
        let err = parse_stop_events(csv.as_bytes(), chicago()).unwrap_err();
        assert!(err.to_string().contains("stopId"));
    }

    #[test]
    fn malformed_timestamp_fails_the_batch_with_its_line() {
        let csv = format!(
            "{HEADER}38728,Drexel,9,Quad,UGO2,2026-01-12 14:00:00,2026-01-12 14:01:00,\n\
             38728,Drexel,9,Quad,UGO2,noon-ish,2026-01-12 14:31:00,\n"
        );
        let err = parse_stop_events(csv.as_bytes(), chicago()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("line 3"));
        assert!(text.contains("arrivalTime"));
    }

    #[test]
    fn malformed_route_id_fails_the_batch() {
        let csv = format!(
            "{HEADER}not-a-number,Drexel,9,Quad,UGO2,2026-01-12 14:00:00,2026-01-12 14:01:00,\n"
        );
        let err = parse_stop_events(csv.as_bytes(), chicago()).unwrap_err();
        assert!(err.to_string().contains("routeId"));
    }

    #[test]
    fn accepts_fractional_seconds_and_t_separator() {
        let csv = format!(
            "{HEADER}38728,Drexel,9,Quad,UGO2,2026-01-12T14:00:00.250,2026-01-12 14:01:00.750,\n"
        );
        let events = parse_stop_events(csv.as_bytes(), chicago()).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn empty_body_yields_no_events() {
        let events = parse_stop_events(HEADER.as_bytes(), chicago()).unwrap();
        assert!(events.is_empty());
    }
}
