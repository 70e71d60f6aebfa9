//! Dashboard summary and rendering

use crate::listing::{BidAttempt, ListingStatus, TrackedListing};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Listing counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub monitoring: usize,
    pub bidding: usize,
    pub won: usize,
    pub lost: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.monitoring + self.bidding + self.won + self.lost + self.error
    }

    fn bump(&mut self, status: ListingStatus) {
        match status {
            ListingStatus::Monitoring => self.monitoring += 1,
            ListingStatus::Bidding => self.bidding += 1,
            ListingStatus::Won => self.won += 1,
            ListingStatus::Lost => self.lost += 1,
            ListingStatus::Error => self.error += 1,
        }
    }
}

/// One dashboard line
#[derive(Debug, Clone, Serialize)]
pub struct DashboardRow {
    pub title: String,
    pub current_price: Decimal,
    pub max_price: Decimal,
    pub currency: Option<String>,
    /// `None` when the close time is unknown
    pub remaining_secs: Option<i64>,
    pub status: ListingStatus,
    pub note: Option<String>,
}

/// Point-in-time view of every tracked listing
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub counts: StatusCounts,
    pub rows: Vec<DashboardRow>,
}

impl Dashboard {
    /// Build from listings already in display order
    pub fn build(listings: &[TrackedListing], now: DateTime<Utc>) -> Self {
        let mut counts = StatusCounts::default();
        let rows = listings
            .iter()
            .map(|l| {
                counts.bump(l.status);
                DashboardRow {
                    title: l.title.clone(),
                    current_price: l.current_price,
                    max_price: l.max_price,
                    currency: l.currency.clone(),
                    remaining_secs: l.time_remaining(now).map(|d| d.num_seconds()),
                    status: l.status,
                    note: l.note.clone(),
                }
            })
            .collect();
        Self {
            generated_at: now,
            counts,
            rows,
        }
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let mut out = format!(
            "\n══════════════════════════════════════════════════════════════════════\n\
             {} tracked | {} monitoring | {} bidding | {} won | {} lost | {} error\n\
             ──────────────────────────────────────────────────────────────────────\n",
            self.counts.total(),
            self.counts.monitoring,
            self.counts.bidding,
            self.counts.won,
            self.counts.lost,
            self.counts.error,
        );
        if self.rows.is_empty() {
            out.push_str("No listings tracked\n");
        }
        for row in &self.rows {
            let remaining = row
                .remaining_secs
                .map_or_else(|| "unknown".to_string(), |s| format_remaining(Duration::seconds(s)));
            let currency = row.currency.as_deref().unwrap_or("");
            out.push_str(&format!(
                "{:<32} {:>10} / {:<10} {:<4} {:>12}  {}\n",
                truncate(&row.title, 32),
                row.current_price,
                row.max_price,
                currency,
                remaining,
                row.status,
            ));
            if let Some(note) = &row.note {
                out.push_str(&format!("    {note}\n"));
            }
        }
        out.push_str("══════════════════════════════════════════════════════════════════════\n");
        out
    }
}

/// Format bid history for CLI output, newest first
pub fn format_history(attempts: &[BidAttempt], titles: &dyn Fn(&BidAttempt) -> String) -> String {
    if attempts.is_empty() {
        return "No bids placed\n".to_string();
    }
    let mut out = String::new();
    for attempt in attempts {
        let outcome = if attempt.success {
            "won".to_string()
        } else {
            format!(
                "failed ({})",
                attempt.failure_reason.as_deref().unwrap_or("unknown")
            )
        };
        out.push_str(&format!(
            "{}  {:<32} {:>10}  {}\n",
            attempt.timestamp.format("%Y-%m-%d %H:%M:%S"),
            truncate(&titles(attempt), 32),
            attempt.amount,
            outcome,
        ));
    }
    out
}

/// `1d 02h 03m 04s`, dropping leading zero units
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        (total % 86_400) / 3_600,
        (total % 3_600) / 60,
        total % 60,
    );
    if days > 0 {
        format!("{days}d {hours:02}h {minutes:02}m {seconds:02}s")
    } else if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
