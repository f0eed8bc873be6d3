//! Analyzer results and their persisted form.

use serde::{Deserialize, Serialize};

/// Verdict of one analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }
}

/// One analyzer's judgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    pub title: String,
    pub verdict: Verdict,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// A strict fail dominates the process exit code.
    #[serde(default)]
    pub strict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involved_object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_key: Option<String>,
    /// Set when the analyzer itself failed and this result is synthetic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalyzeResult {
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    #[must_use]
    pub fn is_warn(&self) -> bool {
        self.verdict == Verdict::Warn
    }

    #[must_use]
    pub fn is_fail(&self) -> bool {
        self.verdict == Verdict::Fail
    }
}

/// Entry of `analysis.json`, the stable serialization of a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEntry {
    pub name: String,
    pub severity: String,
    pub insight: Insight,
    pub labels: AnalysisLabels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub primary: String,
    pub detail: String,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisLabels {
    pub icon_key: String,
    pub icon_uri: String,
    pub desired_position: String,
}

/// Map verdicts to the persisted severity scale.
#[must_use]
pub fn severity_for(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Fail => "error",
        Verdict::Warn => "warn",
        Verdict::Pass => "info",
    }
}

/// Render the ordered result list as `analysis.json` bytes.
pub fn render_analysis(results: &[AnalyzeResult]) -> Result<Vec<u8>, serde_json::Error> {
    let entries: Vec<AnalysisEntry> = results
        .iter()
        .enumerate()
        .map(|(position, result)| AnalysisEntry {
            name: slug(&result.title),
            severity: severity_for(result.verdict).to_string(),
            insight: Insight {
                primary: result.title.clone(),
                detail: result.message.clone(),
                severity: severity_for(result.verdict).to_string(),
            },
            labels: AnalysisLabels {
                icon_key: result.icon_key.clone().unwrap_or_default(),
                icon_uri: String::new(),
                desired_position: position.to_string(),
            },
            error: result.error.clone(),
        })
        .collect();
    serde_json::to_vec_pretty(&entries)
}

fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
