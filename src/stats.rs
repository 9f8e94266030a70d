//! Time-bucketed income/engagement aggregation.
//!
//! Pure function over a room's persisted chat/gift events plus a price
//! snapshot. Gifts are always priced from the current table, never from the
//! recorded payload, so editing a price re-values historical buckets on the
//! next query.

use crate::events::{EventKind, GiftPayload};
use crate::prices::PriceSnapshot;
use crate::store::StoredEvent;
use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BucketStat {
    pub time_range: String,
    pub income: f64,
    pub comments: u64,
}

/// 30-minute bucket label for a timestamp: minutes 0-29 map to
/// `"HH:00-HH:30"`, minutes 30-59 to `"HH:30-(H+1):00"`. An end hour of 24
/// renders as `"00:00"`; that is display only and does not merge the bucket
/// with the next day's first one.
pub fn bucket_label(timestamp: NaiveDateTime) -> String {
    let hour = timestamp.hour();
    if timestamp.minute() < 30 {
        format!("{:02}:00-{:02}:30", hour, hour)
    } else {
        format!("{:02}:30-{:02}:00", hour, (hour + 1) % 24)
    }
}

/// Fold events into per-bucket totals. One entry per bucket with at least one
/// contributing event; output order is unspecified.
pub fn aggregate(events: &[StoredEvent], prices: &PriceSnapshot) -> Vec<BucketStat> {
    let mut buckets: HashMap<String, (f64, u64)> = HashMap::new();

    for event in events {
        if !matches!(event.kind, EventKind::Chat | EventKind::Gift) {
            continue;
        }

        let entry = buckets.entry(bucket_label(event.timestamp)).or_default();
        match event.kind {
            EventKind::Chat => entry.1 += 1,
            EventKind::Gift => match serde_json::from_value::<GiftPayload>(event.payload.clone()) {
                Ok(gift) => {
                    entry.0 += gift.repeat_count as f64 * prices.price_of(&gift.gift_id.to_string());
                }
                Err(e) => {
                    log::warn!("Skipping unreadable gift payload in {}: {}", event.room_id, e);
                }
            },
            _ => {}
        }
    }

    buckets
        .into_iter()
        .map(|(time_range, (income, comments))| BucketStat {
            time_range,
            income,
            comments,
        })
        .collect()
}
