use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::core::types::{Finding, OutputFormat, RunMetadata, ScanReport, SeverityCounts};

/// Collects findings in any order and hands them back ranked by tier.
#[derive(Debug, Default)]
pub struct FindingAggregator {
    findings: Vec<Finding>,
}

impl FindingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Stable sort by tier, so findings of one tier keep arrival order.
    pub fn finish(mut self) -> (Vec<Finding>, SeverityCounts) {
        let mut counts = SeverityCounts::default();
        for finding in &self.findings {
            counts.record(finding.severity_tier);
        }
        self.findings.sort_by_key(|f| f.severity_tier);
        (self.findings, counts)
    }

    pub fn into_report(self, metadata: RunMetadata) -> ScanReport {
        let (findings, severity_counts) = self.finish();
        ScanReport {
            findings,
            severity_counts,
            metadata,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum ReportRecord<'a> {
    Finding(&'a Finding),
    Summary {
        severity_counts: &'a SeverityCounts,
        metadata: &'a RunMetadata,
    },
}

pub fn render_report(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)? + "\n"),
        OutputFormat::Jsonl => {
            let mut out = String::new();
            for finding in &report.findings {
                out.push_str(&serde_json::to_string(&ReportRecord::Finding(finding))?);
                out.push('\n');
            }
            let summary = ReportRecord::Summary {
                severity_counts: &report.severity_counts,
                metadata: &report.metadata,
            };
            out.push_str(&serde_json::to_string(&summary)?);
            out.push('\n');
            Ok(out)
        }
    }
}

pub fn write_report(report: &ScanReport, format: OutputFormat, path: &Path) -> Result<()> {
    let rendered = render_report(report, format)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, rendered)?;
    Ok(())
}
