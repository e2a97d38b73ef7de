use serde::{Deserialize, Serialize};

use crate::analyze::{Analysis, AnalysisConfig, OffHoursEntry};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureLine {
    pub identity: String,
    pub count: u32,
    pub last_source_address: String,
    pub high: bool,
}

/// Fully ordered view of one analysis run. Building it from the aggregate
/// maps fixes every ordering here, so both the text and JSON renderings are
/// byte-identical across runs over the same batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_events: usize,
    pub failed_logins: Vec<FailureLine>,
    pub off_hours: Vec<OffHoursEntry>,
    pub high_priority: Vec<String>,
    pub skipped_timestamps: usize,
}

pub fn build_summary(analysis: &Analysis, cfg: &AnalysisConfig) -> ReportSummary {
    let failed_logins = analysis
        .sorted_failures()
        .into_iter()
        .map(|(identity, rec)| FailureLine {
            identity: identity.to_string(),
            count: rec.count,
            last_source_address: rec.last_source_address.clone(),
            high: rec.count >= cfg.high_threshold,
        })
        .collect();
    ReportSummary {
        total_events: analysis.total_events,
        failed_logins,
        off_hours: analysis.off_hours.clone(),
        high_priority: analysis.high_priority(),
        skipped_timestamps: analysis.skipped_timestamps,
    }
}

/// Text report with fixed section order: banner, failed logins, off-hours
/// authentications, high-priority cross-reference, banner. Pure function of
/// the summary; no color codes so the output is safe to diff and to pipe.
pub fn render_text(rep: &ReportSummary, emoji: bool) -> String {
    let mut s = String::new();
    s.push_str("\n========== SIGN-IN LOG ANALYSIS ==========\n\n");

    s.push_str("--- Failed Login Attempts ---\n");
    if rep.failed_logins.is_empty() {
        s.push_str("  No failed logins detected.\n");
    } else {
        for f in &rep.failed_logins {
            let flag = if !f.high {
                ""
            } else if emoji {
                " \u{26a0}\u{fe0f}  HIGH"
            } else {
                " HIGH"
            };
            s.push_str(&format!(
                "  {}: {} failed attempt(s) from {}{}\n",
                f.identity, f.count, f.last_source_address, flag
            ));
        }
    }

    s.push_str("\n--- Off-Hours Authentication ---\n");
    if rep.off_hours.is_empty() {
        s.push_str("  No off-hours logins detected.\n");
    } else {
        for e in &rep.off_hours {
            s.push_str(&format!(
                "  {} logged in at hour {} from {} ({})\n",
                e.identity, e.hour, e.source_address, e.timestamp
            ));
        }
    }

    let warn = if emoji { "\u{26a0}\u{fe0f}  " } else { "" };
    s.push_str(&format!("\n--- {}High Priority - Failed AND Off-Hours ---\n", warn));
    if rep.high_priority.is_empty() {
        s.push_str("  None detected.\n");
    } else {
        for identity in &rep.high_priority {
            let mark = if emoji { "\u{1f6a8}" } else { "[!]" };
            s.push_str(&format!(
                "  {} {} - multiple failed logins AND off-hours activity detected\n",
                mark, identity
            ));
        }
    }

    s.push_str("\n==========================================\n");
    s
}
