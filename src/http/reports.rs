//! CSP violation report receiver.
//!
//! Accepts both wire shapes browsers send:
//! - legacy `report-uri`: `{"csp-report": {...}}` as `application/csp-report`
//! - Reporting API: `[{"type": "csp-violation", "body": {...}}, ...]`
//!
//! Reports are logged and counted, never stored.

use axum::{body::Bytes, http::StatusCode};
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::observability::metrics;
use crate::security::Directive;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReportPayload {
    Legacy {
        #[serde(rename = "csp-report")]
        report: LegacyReport,
    },
    Batch(Vec<ReportingApiReport>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct LegacyReport {
    document_uri: String,
    violated_directive: String,
    effective_directive: Option<String>,
    blocked_uri: String,
    disposition: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportingApiReport {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    body: ReportingApiBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReportingApiBody {
    #[serde(rename = "documentURL")]
    document_url: String,
    #[serde(rename = "effectiveDirective")]
    effective_directive: String,
    #[serde(rename = "blockedURL")]
    blocked_url: String,
    disposition: Option<String>,
}

/// One violation, normalized across both shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub document: String,
    pub directive: String,
    pub blocked: String,
    pub disposition: String,
}

impl Violation {
    /// Metric label: a known directive name, else `other`.
    pub fn directive_label(&self) -> &'static str {
        self.directive
            .split_whitespace()
            .next()
            .and_then(Directive::from_name)
            .map_or("other", Directive::as_str)
    }
}

impl ReportPayload {
    fn into_violations(self) -> Vec<Violation> {
        match self {
            Self::Legacy { report } => vec![Violation {
                document: report.document_uri,
                directive: report
                    .effective_directive
                    .unwrap_or(report.violated_directive),
                blocked: report.blocked_uri,
                disposition: report.disposition.unwrap_or_else(|| "enforce".into()),
            }],
            Self::Batch(reports) => reports
                .into_iter()
                .filter(|r| r.kind == "csp-violation")
                .map(|r| Violation {
                    document: r.body.document_url,
                    directive: r.body.effective_directive,
                    blocked: r.body.blocked_url,
                    disposition: r.body.disposition.unwrap_or_else(|| "enforce".into()),
                })
                .collect(),
        }
    }
}

/// Parse a report body in either shape.
pub fn parse_reports(body: &[u8]) -> Result<Vec<Violation>, ApiError> {
    let payload: ReportPayload = serde_json::from_slice(body)?;
    Ok(payload.into_violations())
}

/// `POST /csp-report`
pub async fn receive_csp_report(body: Bytes) -> Result<StatusCode, ApiError> {
    let violations = parse_reports(&body)?;
    for v in &violations {
        tracing::warn!(
            document = %v.document,
            directive = %v.directive,
            blocked = %v.blocked,
            disposition = %v.disposition,
            "CSP violation reported"
        );
        metrics::record_csp_report(v.directive_label());
    }
    Ok(StatusCode::NO_CONTENT)
}
