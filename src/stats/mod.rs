mod types;

pub use types::{FaceSummary, LabelCounts, ModalitySummary, SessionSummary, TimelineEntry};

use chrono::{Local, TimeZone};
use std::collections::BTreeMap;

use crate::history::HistoryBuffer;
use crate::models::{DetectionEvent, Modality, TimestampMs};

pub const DEFAULT_TIMELINE_LENGTH: usize = 50;

const MS_PER_MINUTE: i64 = 60_000;

/// Lifetime label counts per modality plus windowed summaries computed from
/// the retained history.
///
/// Lifetime counts only ever grow; buffer eviction does not touch them.
/// Windowed numbers are recomputed from the buffer on every call.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    lifetime: BTreeMap<Modality, LabelCounts>,
    timeline_length: usize,
}

impl StatsAggregator {
    pub fn new(timeline_length: usize) -> Self {
        Self {
            lifetime: BTreeMap::new(),
            timeline_length,
        }
    }

    pub fn record_batch<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a DetectionEvent>,
    {
        for event in events {
            *self
                .lifetime
                .entry(event.modality)
                .or_default()
                .entry(event.label.clone())
                .or_insert(0) += 1;
        }
    }

    pub fn lifetime_counts(&self, modality: Modality) -> LabelCounts {
        self.lifetime.get(&modality).cloned().unwrap_or_default()
    }

    pub fn all_lifetime_counts(&self) -> &BTreeMap<Modality, LabelCounts> {
        &self.lifetime
    }

    pub fn lifetime_total(&self, modality: Modality) -> u64 {
        self.lifetime
            .get(&modality)
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }

    /// Summarises one modality's buffer as of `now`. A window of zero minutes
    /// is treated the same as no window.
    pub fn summarize(
        &self,
        modality: Modality,
        history: &HistoryBuffer<DetectionEvent>,
        window_minutes: Option<u64>,
        now: TimestampMs,
    ) -> ModalitySummary {
        let window = window_minutes.filter(|minutes| *minutes > 0);
        let since = window.map(|minutes| {
            let span = i64::try_from(minutes).unwrap_or(i64::MAX).saturating_mul(MS_PER_MINUTE);
            now.saturating_sub(span)
        });
        let events = history.snapshot(since);

        let mut counts = LabelCounts::new();
        let mut total = 0usize;
        for event in events.clone() {
            *counts.entry(event.label.clone()).or_insert(0) += 1;
            total += 1;
        }

        let skip = total.saturating_sub(self.timeline_length);
        let timeline = events.skip(skip).map(timeline_entry).collect();

        ModalitySummary {
            modality,
            total_detections: total,
            counts,
            timeline,
            time_range: match window {
                Some(minutes) => format!("{minutes} minutes"),
                None => "entire session".to_string(),
            },
            session_duration_minutes: duration_minutes(history.oldest_timestamp(), now),
        }
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_TIMELINE_LENGTH)
    }
}

/// Whole minutes between `oldest` and `now`, rounded; zero without events.
pub fn duration_minutes(oldest: Option<TimestampMs>, now: TimestampMs) -> u64 {
    match oldest {
        Some(oldest) if now > oldest => {
            let elapsed = now - oldest;
            ((elapsed + MS_PER_MINUTE / 2) / MS_PER_MINUTE) as u64
        }
        _ => 0,
    }
}

fn timeline_entry(event: &DetectionEvent) -> TimelineEntry {
    TimelineEntry {
        time: format_time(event.timestamp),
        label: event.label.clone(),
        confidence: (event.confidence * 100.0).round().clamp(0.0, 100.0) as u8,
    }
}

fn format_time(timestamp: TimestampMs) -> String {
    Local
        .timestamp_millis_opt(timestamp)
        .single()
        .map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}
