use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-rule evaluation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleResult {
    /// Rule satisfied
    Pass,
    /// Rule violated
    Fail,
    /// Evaluation error
    Error,
    /// Rule does not apply to this host
    NotApplicable,
    /// Rule was not evaluated
    NotChecked,
}

impl RuleResult {
    /// Map an XCCDF `<result>` value to a rule result.
    ///
    /// Returns `None` for `notselected`, which is not a finding at all.
    #[must_use]
    pub fn from_xccdf(value: &str) -> Option<Self> {
        match value.trim() {
            "pass" | "fixed" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            "notapplicable" => Some(Self::NotApplicable),
            "notchecked" | "informational" => Some(Self::NotChecked),
            "notselected" => None,
            // "error", "unknown" and anything unexpected
            _ => Some(Self::Error),
        }
    }
}

impl std::fmt::Display for RuleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
            Self::NotApplicable => "not_applicable",
            Self::NotChecked => "not_checked",
        };
        write!(f, "{s}")
    }
}

/// Rule severity as declared by the content bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Not declared
    #[default]
    Unknown,
    /// Informational
    Info,
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
}

impl Severity {
    /// Parse an XCCDF `severity` attribute
    #[must_use]
    pub fn from_xccdf(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" | "informational" => Self::Info,
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unknown,
        }
    }
}

/// A single rule outcome from a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// XCCDF rule identifier
    pub rule_id: String,

    /// Evaluation outcome
    pub result: RuleResult,

    /// Declared severity
    #[serde(default)]
    pub severity: Severity,
}

impl Finding {
    /// Create a finding
    #[must_use]
    pub fn new(rule_id: impl Into<String>, result: RuleResult, severity: Severity) -> Self {
        Self {
            rule_id: rule_id.into(),
            result,
            severity,
        }
    }
}

/// Counts per result category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Total findings
    pub total: u32,
    /// Passed rules
    pub pass: u32,
    /// Failed rules
    pub fail: u32,
    /// Rules that errored during evaluation
    pub error: u32,
    /// Rules that do not apply
    pub not_applicable: u32,
    /// Rules that were not checked
    pub not_checked: u32,
    /// `pass / (pass + fail)`, absent when nothing passed or failed
    pub compliance_score: Option<f64>,
}

impl Summary {
    /// Tally a sequence of findings
    #[must_use]
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for finding in findings {
            summary.total += 1;
            match finding.result {
                RuleResult::Pass => summary.pass += 1,
                RuleResult::Fail => summary.fail += 1,
                RuleResult::Error => summary.error += 1,
                RuleResult::NotApplicable => summary.not_applicable += 1,
                RuleResult::NotChecked => summary.not_checked += 1,
            }
        }
        summary.compliance_score = compliance_score(summary.pass, summary.fail);
        summary
    }
}

/// Compliance score: pass count over (pass + fail) count.
#[must_use]
pub fn compliance_score(pass: u32, fail: u32) -> Option<f64> {
    let denominator = pass + fail;
    if denominator == 0 {
        None
    } else {
        Some(f64::from(pass) / f64::from(denominator))
    }
}

/// Facts about the scanned host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Hostname
    pub hostname: String,
    /// Operating system family (e.g. "linux")
    pub os: String,
    /// CPU architecture
    pub architecture: String,
    /// Kernel release, when readable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    /// Logical CPU count
    #[serde(default)]
    pub cpu_count: usize,
}

/// Normalized result of one compliance scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Unique identifier for this scan
    pub scan_id: Uuid,

    /// Profile that was evaluated
    pub profile: String,

    /// Stable identifier for the scanned host
    pub host_identifier: String,

    /// When the scanner was started
    pub started_at: DateTime<Utc>,

    /// When the scanner finished
    pub finished_at: DateTime<Utc>,

    /// Findings in the order the scanner reported them
    #[serde(default)]
    pub findings: Vec<Finding>,

    /// Aggregate counts
    pub summary: Summary,

    /// Where the unparsed tool output was kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_artifact_ref: Option<String>,

    /// Content bundle the profile was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,

    /// Host facts collected alongside the scan
    #[serde(default)]
    pub system_info: SystemInfo,

    /// Set on synthetic reports produced when the scanner could not run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl ScanReport {
    /// Build a report from parsed findings, computing the summary.
    #[must_use]
    pub fn new(
        profile: impl Into<String>,
        host_identifier: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        findings: Vec<Finding>,
    ) -> Self {
        let summary = Summary::from_findings(&findings);
        Self {
            scan_id: Uuid::new_v4(),
            profile: profile.into(),
            host_identifier: host_identifier.into(),
            started_at,
            finished_at,
            findings,
            summary,
            raw_artifact_ref: None,
            content_ref: None,
            system_info: SystemInfo::default(),
            degraded: None,
        }
    }

    /// Synthetic report for a host where the scanner or its content is missing.
    ///
    /// Carries no findings and no score so it can never read as a passing scan.
    #[must_use]
    pub fn degraded(
        profile: impl Into<String>,
        host_identifier: impl Into<String>,
        at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        let mut report = Self::new(profile, host_identifier, at, at, Vec::new());
        report.degraded = Some(reason.into());
        report
    }

    /// Use a specific scan id
    #[must_use]
    pub fn with_scan_id(mut self, scan_id: Uuid) -> Self {
        self.scan_id = scan_id;
        self
    }

    /// Record where the raw artifact was written
    #[must_use]
    pub fn with_raw_artifact(mut self, reference: impl Into<String>) -> Self {
        self.raw_artifact_ref = Some(reference.into());
        self
    }

    /// Record the content bundle used
    #[must_use]
    pub fn with_content(mut self, reference: impl Into<String>) -> Self {
        self.content_ref = Some(reference.into());
        self
    }

    /// Attach host facts
    #[must_use]
    pub fn with_system_info(mut self, info: SystemInfo) -> Self {
        self.system_info = info;
        self
    }

    /// Returns true for synthetic "scanner unavailable" reports
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// JSON body delivered to the collector's ingestion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorPayload {
    /// Version of the agent that produced the report
    pub agent_version: String,

    /// The report itself, flattened into the top-level object
    #[serde(flatten)]
    pub report: ScanReport,
}

impl CollectorPayload {
    /// Wrap a report for delivery
    #[must_use]
    pub fn new(agent_version: impl Into<String>, report: ScanReport) -> Self {
        Self {
            agent_version: agent_version.into(),
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn findings(pass: usize, fail: usize) -> Vec<Finding> {
        let mut out = Vec::new();
        for i in 0..pass {
            out.push(Finding::new(format!("rule_pass_{i}"), RuleResult::Pass, Severity::Medium));
        }
        for i in 0..fail {
            out.push(Finding::new(format!("rule_fail_{i}"), RuleResult::Fail, Severity::High));
        }
        out
    }

    #[test]
    fn score_eight_pass_two_fail() {
        let now = Utc::now();
        let report = ScanReport::new("cis", "host-1", now, now, findings(8, 2));
        assert_eq!(report.summary.pass, 8);
        assert_eq!(report.summary.fail, 2);
        assert_eq!(report.summary.total, 10);
        let score = report.summary.compliance_score.unwrap();
        assert!((score - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn score_ignores_other_categories() {
        let mut list = findings(3, 1);
        list.push(Finding::new("na", RuleResult::NotApplicable, Severity::Low));
        list.push(Finding::new("err", RuleResult::Error, Severity::Low));
        let summary = Summary::from_findings(&list);
        assert_eq!(summary.compliance_score, Some(0.75));
        assert_eq!(summary.not_applicable, 1);
        assert_eq!(summary.error, 1);
    }

    #[test]
    fn score_undefined_without_pass_or_fail() {
        let list = vec![Finding::new("na", RuleResult::NotApplicable, Severity::Low)];
        assert_eq!(Summary::from_findings(&list).compliance_score, None);
        assert_eq!(compliance_score(0, 0), None);
    }

    #[test]
    fn xccdf_result_mapping() {
        assert_eq!(RuleResult::from_xccdf("pass"), Some(RuleResult::Pass));
        assert_eq!(RuleResult::from_xccdf("fixed"), Some(RuleResult::Pass));
        assert_eq!(RuleResult::from_xccdf("fail"), Some(RuleResult::Fail));
        assert_eq!(RuleResult::from_xccdf("unknown"), Some(RuleResult::Error));
        assert_eq!(
            RuleResult::from_xccdf("notapplicable"),
            Some(RuleResult::NotApplicable)
        );
        assert_eq!(
            RuleResult::from_xccdf("informational"),
            Some(RuleResult::NotChecked)
        );
        assert_eq!(RuleResult::from_xccdf("notselected"), None);
        assert_eq!(Severity::from_xccdf("HIGH"), Severity::High);
        assert_eq!(Severity::from_xccdf(""), Severity::Unknown);
    }

    #[test]
    fn degraded_report_is_flagged_and_unscored() {
        let report = ScanReport::degraded("cis", "host-1", Utc::now(), "oscap not installed");
        assert!(report.is_degraded());
        assert!(report.findings.is_empty());
        assert_eq!(report.summary.compliance_score, None);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["degraded"], "oscap not installed");
        assert!(json["summary"]["compliance_score"].is_null());
    }

    #[test]
    fn payload_round_trip_preserves_report() {
        let now = Utc::now();
        let mut list = findings(2, 1);
        list.insert(1, Finding::new("middle", RuleResult::NotChecked, Severity::Info));
        let report = ScanReport::new("stig", "host-9", now, now, list)
            .with_raw_artifact("/results/results_1.xml");
        let payload = CollectorPayload::new("1.0.0", report.clone());

        let json = serde_json::to_string(&payload).unwrap();
        let back: CollectorPayload = serde_json::from_str(&json).unwrap();

        assert_eq!(back.agent_version, "1.0.0");
        assert_eq!(back.report.profile, "stig");
        assert_eq!(back.report.findings, report.findings);
        assert_eq!(back.report.summary, report.summary);
    }

    #[test]
    fn payload_is_flat() {
        let now = Utc::now();
        let payload = CollectorPayload::new(
            "1.0.0",
            ScanReport::new("cis", "host-1", now, now, findings(1, 0)),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["host_identifier"], "host-1");
        assert_eq!(json["profile"], "cis");
        assert_eq!(json["findings"][0]["result"], "pass");
        assert!(json.get("report").is_none());
    }
}
