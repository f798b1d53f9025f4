/// Listing order, top-up cooldown and view milestones
use chrono::{DateTime, Utc};

/// View counts that trigger a milestone notification to the owner
pub const VIEW_MILESTONES: [i64; 5] = [100, 500, 1000, 5000, 10000];

/// Category whose listings always put boosted ads right after top-up rank
pub const ESCORTS_CATEGORY: &str = "escorts";

/// Cooldown between top-ups for users who referred someone
pub const REFERRER_COOLDOWN_MINUTES: i64 = 40;

/// Cooldown between top-ups for everyone else
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 60;

/// Listing sort mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Newest,
    Oldest,
    PriceLow,
    PriceHigh,
    Boosted,
}

impl SortMode {
    /// Parse a sort mode; unknown or missing values mean `Newest`
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("oldest") => SortMode::Oldest,
            Some("price_low") => SortMode::PriceLow,
            Some("price_high") => SortMode::PriceHigh,
            Some("boosted") => SortMode::Boosted,
            _ => SortMode::Newest,
        }
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub descending: bool,
}

const fn desc(column: &'static str) -> SortKey {
    SortKey {
        column,
        descending: true,
    }
}

const fn asc(column: &'static str) -> SortKey {
    SortKey {
        column,
        descending: false,
    }
}

/// Sort keys for a listing query
///
/// Every mode except `Oldest` leads with `topup_rank` descending. The
/// escorts category forces `topup_rank, is_boosted` to the front and keeps
/// the remaining keys of the requested mode.
pub fn sort_keys(mode: SortMode, category_id: Option<&str>) -> Vec<SortKey> {
    let keys = match mode {
        SortMode::Newest => vec![desc("topup_rank"), desc("created_at")],
        SortMode::Oldest => vec![asc("created_at")],
        SortMode::PriceLow => vec![desc("topup_rank"), asc("price")],
        SortMode::PriceHigh => vec![desc("topup_rank"), desc("price")],
        SortMode::Boosted => vec![
            desc("topup_rank"),
            desc("is_boosted"),
            desc("boost_expires_at"),
            desc("created_at"),
        ],
    };

    if category_id != Some(ESCORTS_CATEGORY) {
        return keys;
    }

    let mut forced = vec![desc("topup_rank"), desc("is_boosted")];
    forced.extend(
        keys.into_iter()
            .filter(|k| k.column != "topup_rank" && k.column != "is_boosted"),
    );
    forced
}

/// Render sort keys as an SQL ORDER BY clause
pub fn order_by_clause(keys: &[SortKey]) -> String {
    let terms: Vec<String> = keys
        .iter()
        .map(|k| format!("{} {}", k.column, if k.descending { "DESC" } else { "ASC" }))
        .collect();
    format!("ORDER BY {}", terms.join(", "))
}

/// Lowest milestone crossed by going from `old_views` to `new_views`
pub fn crossed_milestone(old_views: i64, new_views: i64) -> Option<i64> {
    VIEW_MILESTONES
        .iter()
        .copied()
        .find(|&m| old_views < m && m <= new_views)
}

/// Top-up cooldown for a user with `referral_count` referrals
pub fn topup_cooldown_minutes(referral_count: i64) -> i64 {
    if referral_count > 0 {
        REFERRER_COOLDOWN_MINUTES
    } else {
        DEFAULT_COOLDOWN_MINUTES
    }
}

/// Whole minutes left before the next top-up is allowed, rounded down
pub fn remaining_cooldown_minutes(
    last_topup: DateTime<Utc>,
    now: DateTime<Utc>,
    cooldown_minutes: i64,
) -> i64 {
    let elapsed_secs = (now - last_topup).num_seconds().max(0);
    let remaining_secs = cooldown_minutes * 60 - elapsed_secs;
    (remaining_secs / 60).max(0)
}

/// Rank value for a top-up at `at`: epoch seconds with sub-second precision
pub fn rank_for(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn columns(keys: &[SortKey]) -> Vec<(&'static str, bool)> {
        keys.iter().map(|k| (k.column, k.descending)).collect()
    }

    #[test]
    fn test_topup_rank_leads_every_mode_but_oldest() {
        for mode in [
            SortMode::Newest,
            SortMode::PriceLow,
            SortMode::PriceHigh,
            SortMode::Boosted,
        ] {
            assert_eq!(sort_keys(mode, None)[0], desc("topup_rank"));
        }
        assert_eq!(columns(&sort_keys(SortMode::Oldest, None)), vec![("created_at", false)]);
    }

    #[test]
    fn test_escorts_forces_boosted_second() {
        assert_eq!(
            columns(&sort_keys(SortMode::PriceLow, Some("escorts"))),
            vec![("topup_rank", true), ("is_boosted", true), ("price", false)]
        );
        assert_eq!(
            columns(&sort_keys(SortMode::Oldest, Some("escorts"))),
            vec![("topup_rank", true), ("is_boosted", true), ("created_at", false)]
        );
        assert_eq!(
            columns(&sort_keys(SortMode::Boosted, Some("escorts"))),
            vec![
                ("topup_rank", true),
                ("is_boosted", true),
                ("boost_expires_at", true),
                ("created_at", true)
            ]
        );
        assert_eq!(
            sort_keys(SortMode::PriceLow, Some("cars")),
            sort_keys(SortMode::PriceLow, None)
        );
    }

    #[test]
    fn test_unknown_sort_falls_back_to_newest() {
        assert_eq!(SortMode::parse(Some("random")), SortMode::Newest);
        assert_eq!(SortMode::parse(None), SortMode::Newest);
        assert_eq!(SortMode::parse(Some("price_high")), SortMode::PriceHigh);
    }

    #[test]
    fn test_order_by_clause() {
        assert_eq!(
            order_by_clause(&sort_keys(SortMode::Newest, None)),
            "ORDER BY topup_rank DESC, created_at DESC"
        );
    }

    #[test]
    fn test_crossed_milestone() {
        assert_eq!(crossed_milestone(99, 100), Some(100));
        assert_eq!(crossed_milestone(100, 101), None);
        assert_eq!(crossed_milestone(0, 1), None);
        assert_eq!(crossed_milestone(4999, 5000), Some(5000));
        // Lowest newly crossed milestone wins
        assert_eq!(crossed_milestone(99, 600), Some(100));
    }

    #[test]
    fn test_cooldown_by_referrals() {
        assert_eq!(topup_cooldown_minutes(0), 60);
        assert_eq!(topup_cooldown_minutes(3), 40);
    }

    #[test]
    fn test_remaining_minutes_rounds_down() {
        let now = Utc::now();
        assert_eq!(remaining_cooldown_minutes(now, now, 60), 60);
        assert_eq!(
            remaining_cooldown_minutes(now - Duration::seconds(30), now, 60),
            59
        );
        assert_eq!(
            remaining_cooldown_minutes(now - Duration::minutes(25), now, 40),
            15
        );
        assert_eq!(
            remaining_cooldown_minutes(now - Duration::minutes(90), now, 60),
            0
        );
    }

    #[test]
    fn test_rank_increases_with_time() {
        let now = Utc::now();
        assert!(rank_for(now + Duration::milliseconds(5)) > rank_for(now));
    }
}
