//! Gather report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::{EnumGatherFailureKind, SpecGatherError};

/// Aggregate counters and diagnostics for one `gather_tree` run.
#[derive(Debug, Default, Clone)]
pub struct ReportGather {
    /// Regular files visited by the walk.
    pub cnt_scanned: u64,
    /// Visited files whose name ends with the suffix.
    pub cnt_matched: u64,
    /// Matches written into the destination (renamed copies included).
    pub cnt_copied: u64,
    /// Copies written under a disambiguated name.
    pub cnt_renamed: u64,
    /// Matches not written: duplicates, inside destination, skipped symlinks, dry run.
    pub cnt_skipped: u64,
    /// Non-fatal warnings collected during traversal/copy.
    pub warnings: Vec<String>,
    /// Per-file failures.
    pub errors: Vec<SpecGatherError>,
}

impl ReportGather {
    /// Number of failed matches.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_renamed".to_string(), self.cnt_renamed);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_failed".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} matched={} copied={} renamed={} skipped={} failed={} scanned={} warnings={}",
            dict_counts["cnt_matched"],
            dict_counts["cnt_copied"],
            dict_counts["cnt_renamed"],
            dict_counts["cnt_skipped"],
            dict_counts["cnt_failed"],
            dict_counts["cnt_scanned"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportGather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[GATHER]"))
    }
}

/// Mutable accumulator for gather statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportGatherBuilder {
    cnt_scanned: u64,
    cnt_matched: u64,
    cnt_copied: u64,
    cnt_renamed: u64,
    cnt_skipped: u64,
    errors: Vec<SpecGatherError>,
    warnings: Vec<String>,
}

impl ReportGatherBuilder {
    /// Count one directory entry examined.
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    /// Count one file whose name ends with the suffix.
    pub fn add_matched(&mut self) {
        self.cnt_matched += 1;
    }

    /// Count one copy written under its base name.
    pub fn add_copied(&mut self) {
        self.cnt_copied += 1;
    }

    /// Count one copy written under a disambiguated name.
    pub fn add_renamed(&mut self) {
        self.cnt_copied += 1;
        self.cnt_renamed += 1;
    }

    /// Count one match deliberately left uncopied.
    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    /// Add warning message; it is also logged.
    pub fn add_warning(&mut self, warning: String) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Add one path-scoped failure.
    pub fn add_error(&mut self, path: PathBuf, kind: EnumGatherFailureKind, exception: String) {
        tracing::warn!(path = %path.display(), %kind, "{exception}");
        self.errors.push(SpecGatherError {
            path,
            kind,
            exception,
        });
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportGather {
        ReportGather {
            cnt_scanned: self.cnt_scanned,
            cnt_matched: self.cnt_matched,
            cnt_copied: self.cnt_copied,
            cnt_renamed: self.cnt_renamed,
            cnt_skipped: self.cnt_skipped,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{ReportGather, ReportGatherBuilder};
    use crate::spec::EnumGatherFailureKind;

    #[test]
    fn report_gather_to_dict_and_format() {
        let report = ReportGather {
            cnt_scanned: 8,
            cnt_matched: 5,
            cnt_copied: 3,
            cnt_renamed: 1,
            cnt_skipped: 2,
            warnings: vec!["w".to_string()],
            errors: vec![],
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_matched"], 5);
        assert_eq!(dict_counts["cnt_scanned"], 8);
        assert_eq!(dict_counts["cnt_copied"], 3);
        assert_eq!(dict_counts["cnt_renamed"], 1);
        assert_eq!(dict_counts["cnt_skipped"], 2);
        assert_eq!(dict_counts["cnt_failed"], 0);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        let txt = report.format("[GATHER]");
        assert_eq!(
            txt,
            "[GATHER] matched=5 copied=3 renamed=1 skipped=2 failed=0 scanned=8 warnings=1"
        );
        assert_eq!(report.to_string(), txt);
    }

    #[test]
    fn builder_counts_renamed_copies_as_copied() {
        let mut builder = ReportGatherBuilder::default();
        builder.add_matched();
        builder.add_copied();
        builder.add_matched();
        builder.add_renamed();
        builder.add_error(
            PathBuf::from("x.opf"),
            EnumGatherFailureKind::SourceUnreadable,
            "gone".to_string(),
        );

        let report = builder.build();
        assert_eq!(report.cnt_copied, 2);
        assert_eq!(report.cnt_renamed, 1);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.errors[0].kind, EnumGatherFailureKind::SourceUnreadable);
    }
}
