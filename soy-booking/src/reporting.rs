use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use soy_core::booking::{Booking, PaymentStatus};

pub const NO_COUPON: &str = "No Coupon";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    Last7Days,
    Last30Days,
    #[default]
    AllTime,
}

impl TimeRange {
    /// Unrecognised ranges fall back to all-time.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("last-7-days") => TimeRange::Last7Days,
            Some("last-30-days") => TimeRange::Last30Days,
            _ => TimeRange::AllTime,
        }
    }

    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::Last7Days => Some(now - Duration::days(7)),
            TimeRange::Last30Days => Some(now - Duration::days(30)),
            TimeRange::AllTime => None,
        }
    }

    fn contains(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.start(now).map_or(true, |start| at >= start)
    }
}

/// Chart-ready `{name, value}` pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingStats {
    pub total_bookings: usize,
    pub total_revenue: i64,
    pub tickets_sold_today: usize,
    pub category_distribution: Vec<NamedValue>,
    pub revenue_by_day: Vec<NamedValue>,
    pub coupon_usage: Vec<NamedValue>,
}

/// Aggregate admin statistics. Revenue, categories and coupons only count completed
/// payments; the time range restricts the daily revenue and coupon breakdowns.
pub fn compute_stats(bookings: &[Booking], range: TimeRange, now: DateTime<Utc>) -> BookingStats {
    let start_of_today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let completed: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.payment_status == PaymentStatus::Completed)
        .collect();

    let total_revenue = completed.iter().map(|b| b.total_amount).sum();
    let tickets_sold_today = completed
        .iter()
        .filter(|b| b.created_at >= start_of_today && b.created_at < start_of_today + Duration::days(1))
        .count();

    let mut categories: BTreeMap<&'static str, i64> = BTreeMap::new();
    for booking in &completed {
        *categories.entry(booking.ticket_type.as_str()).or_default() += i64::from(booking.quantity);
    }

    let mut revenue_by_day: BTreeMap<String, i64> = BTreeMap::new();
    let mut coupons: BTreeMap<String, i64> = BTreeMap::new();
    for booking in completed.iter().filter(|b| range.contains(b.created_at, now)) {
        *revenue_by_day
            .entry(booking.created_at.format("%Y-%m-%d").to_string())
            .or_default() += booking.total_amount;

        let code = booking.coupon_code.clone().unwrap_or_else(|| NO_COUPON.to_string());
        *coupons.entry(code).or_default() += 1;
    }

    let mut coupon_usage: Vec<NamedValue> = coupons
        .into_iter()
        .map(|(name, value)| NamedValue { name, value })
        .collect();
    // Most used first; BTreeMap order breaks ties by name
    coupon_usage.sort_by(|a, b| b.value.cmp(&a.value));

    BookingStats {
        total_bookings: bookings.len(),
        total_revenue,
        tickets_sold_today,
        category_distribution: categories
            .into_iter()
            .map(|(name, value)| NamedValue { name: name.to_string(), value })
            .collect(),
        revenue_by_day: revenue_by_day
            .into_iter()
            .map(|(name, value)| NamedValue { name, value })
            .collect(),
        coupon_usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soy_core::booking::{BookingDraft, PaymentMethod, TicketType};
    use uuid::Uuid;

    fn booking(ticket_type: TicketType, amount: i64, coupon: Option<&str>, created_at: DateTime<Utc>) -> Booking {
        let draft = BookingDraft {
            user_id: Some(Uuid::new_v4()),
            ticket_type: Some(ticket_type),
            quantity: Some(1),
            total_amount: Some(amount),
            coupon_code: coupon.map(str::to_string),
            aadhar_number: "123412341234".into(),
            ..Default::default()
        };
        Booking::from_draft(draft, "SOY3", created_at).unwrap()
    }

    fn paid(mut booking: Booking) -> Booking {
        let at = booking.created_at;
        booking
            .complete_payment("TXN".to_string(), PaymentMethod::Payu, None, at)
            .unwrap();
        booking
    }

    #[test]
    fn test_time_range_parsing() {
        assert_eq!(TimeRange::parse_lenient(Some("last-7-days")), TimeRange::Last7Days);
        assert_eq!(TimeRange::parse_lenient(Some("last-30-days")), TimeRange::Last30Days);
        assert_eq!(TimeRange::parse_lenient(Some("yesterday")), TimeRange::AllTime);
        assert_eq!(TimeRange::parse_lenient(None), TimeRange::AllTime);
    }

    #[test]
    fn test_stats_only_count_completed_payments() {
        let now = Utc::now();
        let old = now - Duration::days(20);
        let bookings = vec![
            paid(booking(TicketType::General, 1161, Some("COLLEGE100"), now)),
            paid(booking(TicketType::General, 1311, None, old)),
            paid(booking(TicketType::Pc, 1211, Some("COLLEGE100"), old)),
            booking(TicketType::Associate, 1311, None, now),
        ];

        let stats = compute_stats(&bookings, TimeRange::AllTime, now);
        assert_eq!(stats.total_bookings, 4);
        assert_eq!(stats.total_revenue, 1161 + 1311 + 1211);
        assert_eq!(stats.tickets_sold_today, 1);
        assert_eq!(
            stats.category_distribution,
            vec![
                NamedValue { name: "General".to_string(), value: 2 },
                NamedValue { name: "PC".to_string(), value: 1 },
            ]
        );
        assert_eq!(stats.coupon_usage[0], NamedValue { name: "COLLEGE100".to_string(), value: 2 });
        assert_eq!(stats.coupon_usage[1], NamedValue { name: NO_COUPON.to_string(), value: 1 });
        assert_eq!(stats.revenue_by_day.len(), 2);

        let recent = compute_stats(&bookings, TimeRange::Last7Days, now);
        assert_eq!(recent.total_revenue, stats.total_revenue);
        assert_eq!(recent.coupon_usage, vec![NamedValue { name: "COLLEGE100".to_string(), value: 1 }]);
        assert_eq!(recent.revenue_by_day.len(), 1);
    }
}
