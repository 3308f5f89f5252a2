//! Path wiring for the persisted state layout.
//!
//! Every component receives its paths from here; nothing in the core reads
//! process-wide globals or assumes a working directory.
//!
//! ```text
//! <root>/
//!   data/playbook.json
//!   data/history/playbook_v{VERSION}.json
//!   trading_session/{YYYY_MM_DD}/{trading_plan.json, trading_plan.md,
//!                                 trade_log.json, debug/}
//!   weekly_reflections/{YYYY}_W{WW}_reflection.json
//!   artifact_summary.json
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use acelab_core::playbook::PlaybookStore;

#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn playbook_file(&self) -> PathBuf {
        self.data_dir().join("playbook.json")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.data_dir().join("history")
    }

    pub fn session_root(&self) -> PathBuf {
        self.root.join("trading_session")
    }

    pub fn session_dir(&self, date: NaiveDate) -> PathBuf {
        self.session_root().join(date.format("%Y_%m_%d").to_string())
    }

    pub fn plan_file(&self, date: NaiveDate) -> PathBuf {
        self.session_dir(date).join("trading_plan.json")
    }

    pub fn plan_markdown_file(&self, date: NaiveDate) -> PathBuf {
        self.session_dir(date).join("trading_plan.md")
    }

    pub fn trade_log_file(&self, date: NaiveDate) -> PathBuf {
        self.session_dir(date).join("trade_log.json")
    }

    /// Diagnostic sink for unparseable model responses on `date`.
    pub fn debug_dir(&self, date: NaiveDate) -> PathBuf {
        self.session_dir(date).join("debug")
    }

    pub fn reflections_dir(&self) -> PathBuf {
        self.root.join("weekly_reflections")
    }

    pub fn reflection_file(&self, iso_year: i32, iso_week: u32) -> PathBuf {
        self.reflections_dir()
            .join(format!("{iso_year}_W{iso_week:02}_reflection.json"))
    }

    pub fn artifact_summary_file(&self) -> PathBuf {
        self.root.join("artifact_summary.json")
    }

    /// Playbook store rooted at this layout.
    pub fn playbook_store(&self) -> PlaybookStore {
        PlaybookStore::new(self.playbook_file(), self.history_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_contract() {
        let paths = Paths::new("/state");
        let date = NaiveDate::from_ymd_opt(2025, 10, 29).unwrap();
        assert_eq!(paths.playbook_file(), PathBuf::from("/state/data/playbook.json"));
        assert_eq!(
            paths.plan_file(date),
            PathBuf::from("/state/trading_session/2025_10_29/trading_plan.json")
        );
        assert_eq!(
            paths.trade_log_file(date),
            PathBuf::from("/state/trading_session/2025_10_29/trade_log.json")
        );
        assert_eq!(
            paths.debug_dir(date),
            PathBuf::from("/state/trading_session/2025_10_29/debug")
        );
        assert_eq!(
            paths.reflection_file(2025, 44),
            PathBuf::from("/state/weekly_reflections/2025_W44_reflection.json")
        );
        assert_eq!(
            paths.artifact_summary_file(),
            PathBuf::from("/state/artifact_summary.json")
        );
    }

    #[test]
    fn week_numbers_are_zero_padded() {
        let paths = Paths::new("/state");
        assert!(paths
            .reflection_file(2026, 3)
            .to_string_lossy()
            .ends_with("2026_W03_reflection.json"));
    }
}
