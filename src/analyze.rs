use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::normalize::NormalizedEvent;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Failure count at or above which a user is flagged HIGH.
    pub high_threshold: u32,
    /// Hours in [off_hours_start, off_hours_end] are business hours.
    pub off_hours_start: u32,
    pub off_hours_end: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { high_threshold: 3, off_hours_start: 6, off_hours_end: 22 }
    }
}

impl AnalysisConfig {
    /// Boundary hours are in-hours: 6 and 22 do not qualify, 5 and 23 do.
    pub fn is_off_hours(&self, hour: u32) -> bool {
        hour < self.off_hours_start || hour > self.off_hours_end
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureRecord {
    pub count: u32,
    pub last_source_address: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OffHoursEntry {
    pub identity: String,
    pub timestamp: String,
    pub hour: u32,
    pub source_address: String,
}

#[derive(Clone, Debug, Default)]
pub struct Analysis {
    pub failed_logins: HashMap<String, FailureRecord>,
    pub off_hours: Vec<OffHoursEntry>,
    pub total_events: usize,
    pub skipped_timestamps: usize,
}

/// Single pass over the batch in input order. Never fails: events with no
/// resolvable hour are counted in `skipped_timestamps` when a timestamp was
/// present, and are never classified as off-hours.
pub fn analyze(events: &[NormalizedEvent], cfg: &AnalysisConfig) -> Analysis {
    let mut out = Analysis { total_events: events.len(), ..Default::default() };
    for e in events {
        if e.is_failure {
            let rec = out
                .failed_logins
                .entry(e.identity.clone())
                .or_insert_with(|| FailureRecord { count: 0, last_source_address: String::new() });
            rec.count += 1;
            rec.last_source_address = e.source_address.clone();
        }
        match e.local_hour {
            Some(h) if cfg.is_off_hours(h) => out.off_hours.push(OffHoursEntry {
                identity: e.identity.clone(),
                timestamp: e.timestamp.clone().unwrap_or_default(),
                hour: h,
                source_address: e.source_address.clone(),
            }),
            Some(_) => {}
            None => {
                if e.timestamp_unparsed() {
                    out.skipped_timestamps += 1;
                }
            }
        }
    }
    out
}

impl Analysis {
    /// Failure rows ordered count descending, ties identity ascending.
    pub fn sorted_failures(&self) -> Vec<(&str, &FailureRecord)> {
        let mut rows: Vec<(&str, &FailureRecord)> =
            self.failed_logins.iter().map(|(k, v)| (k.as_str(), v)).collect();
        rows.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
        rows
    }

    /// Identities with at least one failure and at least one off-hours event,
    /// sorted ascending so the rendered report is reproducible.
    pub fn high_priority(&self) -> Vec<String> {
        let off: HashSet<&str> = self.off_hours.iter().map(|e| e.identity.as_str()).collect();
        let mut both: Vec<String> = self
            .failed_logins
            .keys()
            .filter(|k| off.contains(k.as_str()))
            .cloned()
            .collect();
        both.sort();
        both
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(identity: &str, is_failure: bool, hour: Option<u32>, ip: &str) -> NormalizedEvent {
        NormalizedEvent {
            identity: identity.to_string(),
            is_failure,
            local_hour: hour,
            timestamp: hour.map(|h| format!("2026-02-28T{:02}:00:00Z", h)),
            source_address: ip.to_string(),
        }
    }

    #[test]
    fn failure_count_matches_failure_events() {
        let events = vec![
            ev("a@lab.local", true, Some(10), "10.0.0.1"),
            ev("a@lab.local", false, Some(11), "10.0.0.1"),
            ev("a@lab.local", true, Some(12), "10.0.0.2"),
            ev("b@lab.local", true, Some(13), "10.0.0.3"),
        ];
        let a = analyze(&events, &AnalysisConfig::default());
        assert_eq!(a.failed_logins.len(), 2);
        assert_eq!(a.failed_logins["a@lab.local"].count, 2);
        assert_eq!(a.failed_logins["b@lab.local"].count, 1);
    }

    #[test]
    fn last_source_address_follows_input_order() {
        let events = vec![
            ev("a@lab.local", true, None, "10.0.0.1"),
            ev("a@lab.local", true, None, "10.0.0.9"),
        ];
        let a = analyze(&events, &AnalysisConfig::default());
        assert_eq!(a.failed_logins["a@lab.local"].last_source_address, "10.0.0.9");
    }

    #[test]
    fn off_hours_boundaries() {
        let cfg = AnalysisConfig::default();
        for h in 0..24 {
            let expect = h < 6 || h > 22;
            assert_eq!(cfg.is_off_hours(h), expect, "hour {}", h);
        }
    }

    #[test]
    fn off_hours_entries_keep_encounter_order() {
        let events = vec![
            ev("b@lab.local", false, Some(23), "10.0.0.2"),
            ev("a@lab.local", false, Some(2), "10.0.0.1"),
            ev("c@lab.local", false, Some(12), "10.0.0.3"),
            ev("b@lab.local", false, Some(3), "10.0.0.2"),
        ];
        let a = analyze(&events, &AnalysisConfig::default());
        let seen: Vec<&str> = a.off_hours.iter().map(|e| e.identity.as_str()).collect();
        assert_eq!(seen, vec!["b@lab.local", "a@lab.local", "b@lab.local"]);
    }

    #[test]
    fn events_without_hour_never_flagged() {
        let mut e = ev("a@lab.local", false, None, "10.0.0.1");
        e.timestamp = Some("not-a-time".to_string());
        let a = analyze(&[e], &AnalysisConfig::default());
        assert!(a.off_hours.is_empty());
        assert_eq!(a.skipped_timestamps, 1);
    }

    #[test]
    fn absent_timestamp_is_not_counted_as_skipped() {
        let a = analyze(&[ev("a@lab.local", false, None, "10.0.0.1")], &AnalysisConfig::default());
        assert_eq!(a.skipped_timestamps, 0);
    }

    #[test]
    fn high_priority_requires_both_conditions() {
        let events = vec![
            ev("fail-only@lab.local", true, Some(12), "10.0.0.1"),
            ev("off-only@lab.local", false, Some(2), "10.0.0.2"),
            ev("both@lab.local", true, Some(23), "10.0.0.3"),
        ];
        let a = analyze(&events, &AnalysisConfig::default());
        assert_eq!(a.high_priority(), vec!["both@lab.local".to_string()]);
    }

    #[test]
    fn high_priority_sorted_ascending() {
        let events = vec![
            ev("zeta@lab.local", true, Some(1), "10.0.0.1"),
            ev("alpha@lab.local", true, Some(2), "10.0.0.2"),
            ev("mid@lab.local", true, Some(3), "10.0.0.3"),
        ];
        let a = analyze(&events, &AnalysisConfig::default());
        assert_eq!(
            a.high_priority(),
            vec!["alpha@lab.local".to_string(), "mid@lab.local".to_string(), "zeta@lab.local".to_string()]
        );
    }

    #[test]
    fn sorted_failures_count_desc_then_identity_asc() {
        let events = vec![
            ev("carol@lab.local", true, None, "10.0.0.3"),
            ev("alice@lab.local", true, None, "10.0.0.1"),
            ev("bob@lab.local", true, None, "10.0.0.2"),
            ev("bob@lab.local", true, None, "10.0.0.2"),
        ];
        let a = analyze(&events, &AnalysisConfig::default());
        let order: Vec<&str> = a.sorted_failures().iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec!["bob@lab.local", "alice@lab.local", "carol@lab.local"]);
    }

    #[test]
    fn custom_boundaries_respected() {
        let cfg = AnalysisConfig { high_threshold: 3, off_hours_start: 8, off_hours_end: 18 };
        assert!(cfg.is_off_hours(7));
        assert!(!cfg.is_off_hours(8));
        assert!(!cfg.is_off_hours(18));
        assert!(cfg.is_off_hours(19));
    }
}
