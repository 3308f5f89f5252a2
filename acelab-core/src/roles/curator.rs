//! Curator role: apply a reflection report to the playbook deterministically.
//! No LLM — the update algebra is add / increment / prune with guards.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{Insight, ReflectionReport, SuggestedAction};
use crate::playbook::{Entry, Playbook, SECTION_STRATEGIES};

/// Guards against premature deletion: both must hold before an entry is
/// pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneThresholds {
    /// `harmful_count >= min_harmful`.
    pub min_harmful: u32,
    /// `harmful_count >= helpful_count + margin`.
    pub margin: u32,
}

impl Default for PruneThresholds {
    fn default() -> Self {
        Self { min_harmful: 3, margin: 2 }
    }
}

/// Result of one curation pass: the new playbook version plus an audit trail.
#[derive(Debug)]
pub struct CuratorOutcome {
    pub playbook: Playbook,
    pub added: Vec<String>,
    pub pruned: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Curator {
    thresholds: PruneThresholds,
}

impl Curator {
    pub fn new(thresholds: PruneThresholds) -> Self {
        Self { thresholds }
    }

    /// Apply `report` to `playbook`, producing the next minor version.
    ///
    /// Insights apply in priority order (high → low, stable within a tier).
    /// The caller persists the result; saving snapshots the new version.
    pub fn apply(
        &self,
        playbook: &Playbook,
        report: &ReflectionReport,
        now: DateTime<Utc>,
    ) -> CuratorOutcome {
        let mut next = playbook.clone();
        next.metadata.pruned_in_version.clear();

        let mut added = Vec::new();
        let mut pruned = Vec::new();
        let mut warnings = Vec::new();

        let mut ordered: Vec<&Insight> = report.insights.iter().collect();
        ordered.sort_by_key(|insight| insight.priority);

        for insight in ordered {
            match insight.suggested_action {
                SuggestedAction::AddEntry => {
                    self.add_entry(&mut next, insight, now, &mut added, &mut warnings)
                }
                SuggestedAction::IncrementHelpful => {
                    increment(&mut next, insight, true, &mut warnings)
                }
                SuggestedAction::IncrementHarmful => {
                    increment(&mut next, insight, false, &mut warnings)
                }
                SuggestedAction::Prune => {
                    self.prune(&mut next, insight, &mut pruned, &mut warnings)
                }
            }
        }

        next.metadata.version = next.metadata.version.bump_minor();
        next.metadata.last_updated = now;
        next.metadata.total_entries = next.entry_count();
        next.metadata.pruned_in_version = pruned.clone();

        for violation in next.validate() {
            warnings.push(format!("post-curation invariant violation: {violation}"));
        }

        info!(
            version = %next.metadata.version,
            added = added.len(),
            pruned = pruned.len(),
            "curation applied"
        );
        CuratorOutcome { playbook: next, added, pruned, warnings }
    }

    fn add_entry(
        &self,
        next: &mut Playbook,
        insight: &Insight,
        now: DateTime<Utc>,
        added: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        let Some(content) = insight.proposed_content.as_deref().filter(|c| !c.is_empty()) else {
            warnings.push("add_entry insight without proposed_content; skipped".into());
            return;
        };
        if next.contains_content(content) {
            // Exact-content duplicate: rejected silently by contract.
            debug!("duplicate entry content skipped");
            return;
        }
        let section = insight
            .target_section
            .as_deref()
            .unwrap_or(SECTION_STRATEGIES)
            .to_string();
        let id = next.mint_entry_id(&section, content);
        next.insert_entry(&section, Entry::new(id.clone(), content, now));
        added.push(id);
    }

    fn prune(
        &self,
        next: &mut Playbook,
        insight: &Insight,
        pruned: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        let Some(id) = insight.target_entry_id.as_deref() else {
            warnings.push("prune insight without target_entry_id; skipped".into());
            return;
        };
        let Some(entry) = next.find_entry(id) else {
            warnings.push(format!("prune target '{id}' not found; skipped"));
            return;
        };
        let eligible = entry.harmful_count >= entry.helpful_count + self.thresholds.margin
            && entry.harmful_count >= self.thresholds.min_harmful;
        if !eligible {
            warnings.push(format!(
                "prune guard not met for '{id}' (helpful={}, harmful={}); kept",
                entry.helpful_count, entry.harmful_count
            ));
            return;
        }
        for entries in next.sections.values_mut() {
            entries.retain(|e| e.id != id);
        }
        pruned.push(id.to_string());
    }
}

fn increment(next: &mut Playbook, insight: &Insight, helpful: bool, warnings: &mut Vec<String>) {
    let Some(id) = insight.target_entry_id.as_deref() else {
        warnings.push("increment insight without target_entry_id; skipped".into());
        return;
    };
    match next.find_entry_mut(id) {
        Some(entry) => {
            if helpful {
                entry.helpful_count += 1;
            } else {
                entry.harmful_count += 1;
            }
        }
        None => {
            warn!(entry_id = %id, "increment target not found");
            warnings.push(format!("increment target '{id}' not found; skipped"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        InsightKind, Priority, ReflectionWindow, SuggestedAction, WeeklySummary,
    };
    use crate::playbook::{Version, SECTION_PITFALLS};
    use chrono::NaiveDate;

    fn window() -> ReflectionWindow {
        ReflectionWindow::trading_week_containing(NaiveDate::from_ymd_opt(2025, 10, 29).unwrap())
    }

    fn report(insights: Vec<Insight>) -> ReflectionReport {
        ReflectionReport {
            window: window(),
            summary: WeeklySummary::zero(),
            insights,
            market_regime_notes: String::new(),
            error: None,
        }
    }

    fn insight(action: SuggestedAction, priority: Priority) -> Insight {
        Insight {
            kind: InsightKind::SuccessPattern,
            description: "test".into(),
            evidence_plan_ids: vec![],
            suggested_action: action,
            target_section: None,
            target_entry_id: None,
            proposed_content: None,
            priority,
        }
    }

    #[test]
    fn add_and_prune_produce_next_version() {
        // Playbook at v1.3 with a repeatedly harmful entry.
        let mut playbook = Playbook::seed(Utc::now());
        playbook.metadata.version = "1.3".parse().unwrap();
        let mut harmful = Entry::new("strat-042", "chase momentum after news spikes", Utc::now());
        harmful.harmful_count = 4;
        playbook.insert_entry(SECTION_STRATEGIES, harmful);

        let mut add = insight(SuggestedAction::AddEntry, Priority::High);
        add.target_section = Some(SECTION_STRATEGIES.into());
        add.proposed_content = Some("Fade failed breakouts back into the prior range".into());
        let mut prune = insight(SuggestedAction::Prune, Priority::High);
        prune.target_entry_id = Some("strat-042".into());

        let outcome = Curator::default().apply(&playbook, &report(vec![add, prune]), Utc::now());
        let next = &outcome.playbook;

        assert_eq!(next.metadata.version, Version { major: 1, minor: 4 });
        assert!(next.find_entry("strat-042").is_none());
        assert_eq!(outcome.pruned, vec!["strat-042".to_string()]);
        assert_eq!(next.metadata.pruned_in_version, vec!["strat-042".to_string()]);
        assert_eq!(outcome.added.len(), 1);
        assert!(next.find_entry(&outcome.added[0]).is_some());
        assert_eq!(next.metadata.total_entries, next.entry_count());
        assert!(next.validate().is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn prune_guard_blocks_premature_deletion() {
        let mut playbook = Playbook::seed(Utc::now());
        // harmful=2 fails min_harmful; harmful=3 with helpful=2 fails margin.
        let mut a = Entry::new("strat-aa", "rule a", Utc::now());
        a.harmful_count = 2;
        let mut b = Entry::new("strat-bb", "rule b", Utc::now());
        b.harmful_count = 3;
        b.helpful_count = 2;
        playbook.insert_entry(SECTION_STRATEGIES, a);
        playbook.insert_entry(SECTION_STRATEGIES, b);

        let mut p1 = insight(SuggestedAction::Prune, Priority::High);
        p1.target_entry_id = Some("strat-aa".into());
        let mut p2 = insight(SuggestedAction::Prune, Priority::High);
        p2.target_entry_id = Some("strat-bb".into());

        let outcome = Curator::default().apply(&playbook, &report(vec![p1, p2]), Utc::now());
        assert!(outcome.pruned.is_empty());
        assert!(outcome.playbook.find_entry("strat-aa").is_some());
        assert!(outcome.playbook.find_entry("strat-bb").is_some());
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[test]
    fn increments_apply_and_unknown_targets_warn() {
        let playbook = Playbook::seed(Utc::now());
        let mut up = insight(SuggestedAction::IncrementHelpful, Priority::Medium);
        up.target_entry_id = Some("strat-001".into());
        let mut down = insight(SuggestedAction::IncrementHarmful, Priority::Medium);
        down.target_entry_id = Some("pit-001".into());
        let mut ghost = insight(SuggestedAction::IncrementHelpful, Priority::Low);
        ghost.target_entry_id = Some("strat-404".into());

        let outcome = Curator::default().apply(&playbook, &report(vec![up, down, ghost]), Utc::now());
        assert_eq!(outcome.playbook.find_entry("strat-001").unwrap().helpful_count, 1);
        assert_eq!(outcome.playbook.find_entry("pit-001").unwrap().harmful_count, 1);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn duplicate_content_rejected_silently() {
        let playbook = Playbook::seed(Utc::now());
        let existing = playbook.find_entry("strat-003").unwrap().content.clone();
        let mut add = insight(SuggestedAction::AddEntry, Priority::High);
        add.proposed_content = Some(existing);

        let before = playbook.entry_count();
        let outcome = Curator::default().apply(&playbook, &report(vec![add]), Utc::now());
        assert_eq!(outcome.playbook.entry_count(), before);
        assert!(outcome.added.is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn add_without_section_defaults_to_strategies() {
        let playbook = Playbook::seed(Utc::now());
        let mut add = insight(SuggestedAction::AddEntry, Priority::High);
        add.proposed_content = Some("New hard rule".into());

        let outcome = Curator::default().apply(&playbook, &report(vec![add]), Utc::now());
        let id = &outcome.added[0];
        assert!(id.starts_with("strat-"));
    }

    #[test]
    fn add_can_target_other_sections() {
        let playbook = Playbook::seed(Utc::now());
        let mut add = insight(SuggestedAction::AddEntry, Priority::High);
        add.target_section = Some(SECTION_PITFALLS.into());
        add.proposed_content = Some("Spread widens into the Friday close".into());

        let outcome = Curator::default().apply(&playbook, &report(vec![add]), Utc::now());
        assert!(outcome.added[0].starts_with("pit-"));
    }

    #[test]
    fn high_priority_applies_before_low() {
        // A low-priority add duplicates the content a high-priority add
        // introduces; if ordering were wrong both would land.
        let playbook = Playbook::seed(Utc::now());
        let mut low = insight(SuggestedAction::AddEntry, Priority::Low);
        low.proposed_content = Some("Respect the weekly open".into());
        let mut high = insight(SuggestedAction::AddEntry, Priority::High);
        high.proposed_content = Some("Respect the weekly open".into());

        let outcome = Curator::default().apply(&playbook, &report(vec![low, high]), Utc::now());
        assert_eq!(outcome.added.len(), 1);
    }

    #[test]
    fn version_strictly_increases_across_applications() {
        let playbook = Playbook::seed(Utc::now());
        let curator = Curator::default();
        let mut current = playbook;
        let mut last = current.metadata.version;
        for _ in 0..3 {
            current = curator.apply(&current, &report(vec![]), Utc::now()).playbook;
            assert!(current.metadata.version > last);
            last = current.metadata.version;
        }
    }

    #[test]
    fn empty_report_still_bumps_version() {
        let playbook = Playbook::seed(Utc::now());
        let outcome = Curator::default().apply(&playbook, &report(vec![]), Utc::now());
        assert_eq!(outcome.playbook.metadata.version, Version { major: 1, minor: 1 });
        assert_eq!(outcome.playbook.entry_count(), playbook.entry_count());
    }
}
