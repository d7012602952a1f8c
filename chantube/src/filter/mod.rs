//! Candidate filter.
//!
//! Pure decision logic for whether a discovered item should be acquired.
//! Checks run in a fixed order and the first exclusion wins:
//!
//! 1. live-rule gating
//! 2. minimum duration
//! 3. deduplication against the local inventory
//! 4. age deferral
//! 5. title filter
//! 6. lookback cutoff (halts discovery)

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Candidate, Channel, Inventory, LiveRule};

/// Items at or below this duration (seconds) are treated as shorts and skipped.
pub const MIN_DURATION_SECS: u64 = 60;

/// Why a candidate was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    LiveRule,
    TooShort,
    AlreadyPresent,
    Deferred,
    TitleFilter,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LiveRule => "excluded by live rule",
            Self::TooShort => "too short",
            Self::AlreadyPresent => "already downloaded",
            Self::Deferred => "younger than deferral window",
            Self::TitleFilter => "excluded by title filter",
        };
        f.write_str(s)
    }
}

/// Outcome of evaluating one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Acquire and keep scanning.
    Accept,
    /// Acquire and stop scanning (`LiveRule::Only` after its first hit).
    AcceptAndStop,
    /// Ignore this candidate and keep scanning.
    Skip(SkipReason),
    /// The candidate is older than the lookback cutoff; stop scanning.
    Stop,
}

/// Case-insensitive substring rule on titles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleFilter {
    needle: String,
    negate: bool,
}

impl TitleFilter {
    pub fn new(text: &str, negate: bool) -> Self {
        Self {
            needle: text.trim().to_lowercase(),
            negate,
        }
    }

    /// Whether a title passes. An empty rule passes everything.
    pub fn matches(&self, title: &str) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        title.to_lowercase().contains(&self.needle) != self.negate
    }
}

/// Lookback cutoff: start of the UTC day `dl_days` days before `now`.
pub fn lookback_cutoff(now: DateTime<Utc>, dl_days: u32) -> DateTime<Utc> {
    let day = (now - Duration::days(i64::from(dl_days))).date_naive();
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Per-channel filter configuration for one pass.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    live_rule: LiveRule,
    title: TitleFilter,
    defer: Duration,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
}

impl CandidateFilter {
    pub fn new(
        live_rule: LiveRule,
        title: TitleFilter,
        defer_hours: u32,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            live_rule,
            title,
            defer: Duration::hours(i64::from(defer_hours)),
            cutoff,
            now,
        }
    }

    /// Build the filter for a channel at `now`.
    pub fn for_channel(channel: &Channel, defer_hours: u32, now: DateTime<Utc>) -> Self {
        Self::new(
            channel.live_rule,
            TitleFilter::new(&channel.filter_title_text, channel.negate_filter),
            defer_hours,
            lookback_cutoff(now, channel.dl_days),
            now,
        )
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    pub fn evaluate(&self, candidate: &Candidate, inventory: &Inventory) -> FilterDecision {
        let live = candidate.live_status;

        match self.live_rule {
            LiveRule::Only if !live.is_live_or_upcoming() => {
                return FilterDecision::Skip(SkipReason::LiveRule);
            }
            LiveRule::Ignore if live.is_tagged() => {
                return FilterDecision::Skip(SkipReason::LiveRule);
            }
            _ => {}
        }

        if !live.is_tagged()
            && let Some(duration) = candidate.duration
            && duration <= MIN_DURATION_SECS
        {
            return FilterDecision::Skip(SkipReason::TooShort);
        }

        if inventory.contains(candidate) {
            return FilterDecision::Skip(SkipReason::AlreadyPresent);
        }

        if !live.is_tagged()
            && let Some(uploaded) = candidate.uploaded_at
            && uploaded > self.now - self.defer
        {
            return FilterDecision::Skip(SkipReason::Deferred);
        }

        if !self.title.matches(&candidate.title) {
            return FilterDecision::Skip(SkipReason::TitleFilter);
        }

        if let Some(uploaded) = candidate.uploaded_at
            && uploaded < self.cutoff
        {
            return FilterDecision::Stop;
        }

        if self.live_rule == LiveRule::Only {
            FilterDecision::AcceptAndStop
        } else {
            FilterDecision::Accept
        }
    }
}

/// Result of running the filter over a discovery batch.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub accepted: Vec<Candidate>,
    pub skipped: usize,
    /// Scanning stopped before the end of the batch.
    pub halted: bool,
}

/// Apply `filter` to `candidates` in order, stopping at the first `Stop` or
/// `AcceptAndStop`. Candidates should already be sorted newest first.
pub fn select(
    filter: &CandidateFilter,
    candidates: Vec<Candidate>,
    inventory: &Inventory,
) -> Selection {
    let mut selection = Selection::default();

    for candidate in candidates {
        match filter.evaluate(&candidate, inventory) {
            FilterDecision::Accept => selection.accepted.push(candidate),
            FilterDecision::AcceptAndStop => {
                selection.accepted.push(candidate);
                selection.halted = true;
                break;
            }
            FilterDecision::Skip(reason) => {
                tracing::debug!(title = %candidate.title, %reason, "Skipping candidate");
                selection.skipped += 1;
            }
            FilterDecision::Stop => {
                tracing::debug!(title = %candidate.title, "Reached lookback cutoff");
                selection.halted = true;
                break;
            }
        }
    }

    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LiveStatus;
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 15, 0, 0).unwrap()
    }

    fn item(id: &str, days_ago: Option<i64>) -> Candidate {
        Candidate {
            id: id.to_string(),
            title: format!("Episode {id}"),
            link: format!("https://www.youtube.com/watch?v={id}"),
            duration: Some(900),
            uploaded_at: days_ago.map(|d| now() - Duration::days(d)),
            channel: "chan".to_string(),
            live_status: LiveStatus::None,
        }
    }

    fn filter(rule: LiveRule) -> CandidateFilter {
        CandidateFilter::new(rule, TitleFilter::default(), 0, lookback_cutoff(now(), 7), now())
    }

    #[test]
    fn test_cutoff_is_start_of_day() {
        let cutoff = lookback_cutoff(now(), 7);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 6, 13, 0, 0, 0).unwrap());
    }

    #[rstest]
    #[case("", false, "Anything", true)]
    #[case("podcast", false, "The PODCAST #4", true)]
    #[case("podcast", false, "Live show", false)]
    #[case("podcast", true, "The Podcast #4", false)]
    #[case("podcast", true, "Live show", true)]
    fn test_title_filter(
        #[case] text: &str,
        #[case] negate: bool,
        #[case] title: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(TitleFilter::new(text, negate).matches(title), expected);
    }

    #[test]
    fn test_dedup_wins_regardless_of_other_attributes() {
        let mut inventory = Inventory::new();
        inventory.insert_id("dup");
        let f = filter(LiveRule::Allow);

        let mut fresh = item("dup", Some(1));
        assert_eq!(
            f.evaluate(&fresh, &inventory),
            FilterDecision::Skip(SkipReason::AlreadyPresent)
        );

        // Matching title, in window, live-tagged: still a duplicate.
        fresh.live_status = LiveStatus::Live;
        fresh.title = "Totally different".to_string();
        assert_eq!(
            f.evaluate(&fresh, &inventory),
            FilterDecision::Skip(SkipReason::AlreadyPresent)
        );
    }

    #[test]
    fn test_short_items_skipped_unless_live() {
        let f = filter(LiveRule::Allow);
        let inventory = Inventory::new();
        let mut short = item("s", Some(1));
        short.duration = Some(60);
        assert_eq!(
            f.evaluate(&short, &inventory),
            FilterDecision::Skip(SkipReason::TooShort)
        );

        short.live_status = LiveStatus::Live;
        assert_eq!(f.evaluate(&short, &inventory), FilterDecision::Accept);
    }

    #[test]
    fn test_ignore_rule_skips_any_live_tag() {
        let f = filter(LiveRule::Ignore);
        let mut c = item("p", Some(1));
        c.live_status = LiveStatus::PostLive;
        assert_eq!(
            f.evaluate(&c, &Inventory::new()),
            FilterDecision::Skip(SkipReason::LiveRule)
        );
    }

    #[test]
    fn test_deferral() {
        let f = CandidateFilter::new(
            LiveRule::Ignore,
            TitleFilter::default(),
            24,
            lookback_cutoff(now(), 7),
            now(),
        );
        let mut c = item("d", None);
        c.uploaded_at = Some(now() - Duration::hours(3));
        assert_eq!(
            f.evaluate(&c, &Inventory::new()),
            FilterDecision::Skip(SkipReason::Deferred)
        );
        c.uploaded_at = Some(now() - Duration::hours(30));
        assert_eq!(f.evaluate(&c, &Inventory::new()), FilterDecision::Accept);
    }

    #[test]
    fn test_first_item_before_cutoff_halts() {
        let f = filter(LiveRule::Ignore);
        let batch = vec![
            item("a", Some(1)),
            item("b", Some(3)),
            item("old", Some(30)),
            item("c", Some(2)),
        ];
        let selection = select(&f, batch, &Inventory::new());
        let ids: Vec<_> = selection.accepted.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(selection.halted);
    }

    #[test]
    fn test_only_rule_accepts_at_most_one() {
        let f = filter(LiveRule::Only);
        let mut live = item("live", None);
        live.live_status = LiveStatus::Live;
        let mut upcoming = item("soon", None);
        upcoming.live_status = LiveStatus::Upcoming;
        let batch = vec![item("vod", Some(1)), live, upcoming];

        let selection = select(&f, batch, &Inventory::new());
        assert_eq!(selection.accepted.len(), 1);
        assert_eq!(selection.accepted[0].id, "live");
        assert_eq!(selection.skipped, 1);
        assert!(selection.halted);
    }
}
