//! Risk ranker: weighted signal scoring over taint flows (spec §4.7).
//!
//! Ported from the reference `RankerService`: substring-keyed sensitivity
//! tables for source/sink names, a path-length decay curve, and a flat
//! "implicit flow" bonus, combined with normalized weights into a 0-100
//! score and a discrete level.

use std::collections::BTreeMap;

use crate::features::taint_analysis::TaintFlow;
use crate::shared::models::Value;

const MAX_PATH_LENGTH: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
    Safe,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct RiskSignal {
    pub name: String,
    pub weight: f64,
    pub score: f64,
    pub rationale: String,
}

#[derive(Debug, Clone)]
pub struct RiskScore {
    pub level: RiskLevel,
    pub score: f64,
    pub confidence: f64,
    pub is_vulnerable: bool,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct RiskScoreItem {
    pub check_id: String,
    pub path: Option<String>,
    pub line: Option<i64>,
    pub column: Option<i64>,
    pub risk: RiskScore,
    pub signals: Vec<RiskSignal>,
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct RankerOutput {
    pub items: Vec<RiskScoreItem>,
    pub overall: Option<RiskScore>,
}

#[derive(Debug, Clone)]
pub struct SignalWeights {
    pub source_sensitivity: f64,
    pub sink_sensitivity: f64,
    pub path_length: f64,
    pub implicit_flow: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self { source_sensitivity: 0.35, sink_sensitivity: 0.25, path_length: 0.25, implicit_flow: 0.15 }
    }
}

impl SignalWeights {
    fn normalized(&self) -> Self {
        let total = self.source_sensitivity + self.sink_sensitivity + self.path_length + self.implicit_flow;
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            source_sensitivity: self.source_sensitivity / total,
            sink_sensitivity: self.sink_sensitivity / total,
            path_length: self.path_length / total,
            implicit_flow: self.implicit_flow / total,
        }
    }
}

fn source_sensitivity_table() -> &'static [(&'static str, f64)] {
    &[
        ("secret", 1.0),
        ("password", 1.0),
        ("ssn", 1.0),
        ("credit", 1.0),
        ("card", 1.0),
        ("token", 0.95),
        ("key", 0.9),
        ("credential", 0.9),
        ("private", 0.85),
        ("pii", 0.8),
    ]
}

fn sink_sensitivity_table() -> &'static [(&'static str, f64)] {
    &[
        ("exec", 1.0),
        ("eval", 1.0),
        ("system", 1.0),
        ("subprocess", 0.95),
        ("pickle", 0.85),
        ("yaml.load", 0.85),
        ("sql", 0.8),
        ("query", 0.75),
        ("open", 0.6),
        ("write", 0.6),
        ("send", 0.6),
        ("http", 0.6),
        ("request", 0.6),
        ("print", 0.4),
        ("sink", 0.4),
    ]
}

fn match_sensitivity(value: &str, table: &[(&str, f64)]) -> f64 {
    let lower = value.to_lowercase();
    table.iter().filter(|(key, _)| lower.contains(key)).map(|(_, score)| *score).fold(0.3_f64, f64::max)
}

fn score_path_length(path_length: usize) -> f64 {
    if path_length <= 2 {
        return 1.0;
    }
    if path_length >= MAX_PATH_LENGTH {
        return 0.1;
    }
    let decay = (path_length - 2) as f64 / (MAX_PATH_LENGTH - 2) as f64;
    (1.0 - decay).max(0.1)
}

fn score_confidence(path_length: usize, implicit: bool) -> f64 {
    let base = 0.6 + 0.05 * path_length as f64 + if implicit { 0.05 } else { 0.0 };
    base.min(1.0)
}

fn risk_level(score: f64) -> RiskLevel {
    if score >= 85.0 {
        RiskLevel::Critical
    } else if score >= 70.0 {
        RiskLevel::High
    } else if score >= 50.0 {
        RiskLevel::Medium
    } else if score >= 30.0 {
        RiskLevel::Low
    } else {
        RiskLevel::Safe
    }
}

/// Scores every flow and picks the maximum as the file's overall risk.
pub fn rank(flows: &[TaintFlow], weights: Option<SignalWeights>) -> RankerOutput {
    let weights = weights.unwrap_or_default().normalized();
    let items: Vec<RiskScoreItem> = flows.iter().map(|flow| score_flow(flow, &weights)).collect();
    let overall = items
        .iter()
        .max_by(|a, b| a.risk.score.partial_cmp(&b.risk.score).unwrap_or(std::cmp::Ordering::Equal))
        .map(|top| RiskScore {
            level: top.risk.level,
            score: top.risk.score,
            confidence: top.risk.confidence,
            is_vulnerable: top.risk.is_vulnerable,
            summary: "Highest risk taint flow.".to_string(),
        });
    RankerOutput { items, overall }
}

fn score_flow(flow: &TaintFlow, weights: &SignalWeights) -> RiskScoreItem {
    let path_length = flow.path.len().max(1);
    let source_score = match_sensitivity(&flow.source, source_sensitivity_table());
    let sink_score = match_sensitivity(&flow.sink, sink_sensitivity_table());
    let path_score = score_path_length(path_length);
    let implicit_score = if flow.implicit { 1.0 } else { 0.0 };

    let signals = vec![
        RiskSignal {
            name: "source_sensitivity".into(),
            weight: weights.source_sensitivity,
            score: source_score,
            rationale: format!("Matched source '{}'.", flow.source),
        },
        RiskSignal {
            name: "sink_sensitivity".into(),
            weight: weights.sink_sensitivity,
            score: sink_score,
            rationale: format!("Matched sink '{}'.", flow.sink),
        },
        RiskSignal {
            name: "path_length".into(),
            weight: weights.path_length,
            score: path_score,
            rationale: format!("Path length {path_length}."),
        },
        RiskSignal {
            name: "implicit_flow".into(),
            weight: weights.implicit_flow,
            score: implicit_score,
            rationale: if flow.implicit { "Implicit flow detected.".into() } else { "Explicit flow.".into() },
        },
    ];

    let weighted: f64 = signals.iter().map(|s| s.weight * s.score).sum();
    let score = (weighted * 100.0 * 100.0).round() / 100.0;
    let confidence = score_confidence(path_length, flow.implicit);
    let level = risk_level(score);

    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_string(), Value::from(flow.source.as_str()));
    metadata.insert("sink".to_string(), Value::from(flow.sink.as_str()));
    metadata.insert("path".to_string(), Value::List(flow.path.iter().map(|v| Value::from(v.as_str())).collect()));
    metadata.insert("path_length".to_string(), Value::Int(path_length as i64));
    metadata.insert("implicit".to_string(), Value::Bool(flow.implicit));

    RiskScoreItem {
        check_id: "TAINT_FLOW".to_string(),
        path: flow.sink_span.is_known().then(|| flow.sink_span.file.clone()),
        line: flow.sink_span.is_known().then_some(flow.sink_span.start_line),
        column: flow.sink_span.is_known().then_some(flow.sink_span.start_col),
        risk: RiskScore {
            level,
            score,
            confidence,
            is_vulnerable: score >= 50.0,
            summary: format!("{} -> {}", flow.source, flow.sink),
        },
        signals,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Span;

    fn flow(source: &str, sink: &str, path: Vec<&str>, implicit: bool) -> TaintFlow {
        TaintFlow {
            source: source.to_string(),
            sink: sink.to_string(),
            path: path.into_iter().map(String::from).collect(),
            implicit,
            sink_span: Span::new("f.py", 2, 4, 2, 12),
        }
    }

    #[test]
    fn explicit_sql_like_flow_is_high() {
        let output = rank(&[flow("input", "exec", vec!["x_1"], false)], None);
        assert_eq!(output.items.len(), 1);
        assert_eq!(output.items[0].risk.level, RiskLevel::High);
        assert!(output.items[0].risk.is_vulnerable);
    }

    #[test]
    fn longer_path_strictly_decreases_score() {
        let short = rank(&[flow("secret", "exec", vec!["a", "b"], false)], None);
        let long = rank(&[flow("secret", "exec", vec!["a", "b", "c", "d", "e", "f", "g"], false)], None);
        assert!(long.items[0].risk.score < short.items[0].risk.score);
    }

    #[test]
    fn overall_is_the_max_scoring_flow() {
        let output = rank(
            &[flow("pii", "print", vec!["a"], false), flow("secret", "exec", vec!["a"], true)],
            None,
        );
        let overall = output.overall.unwrap();
        assert_eq!(overall.level, RiskLevel::Critical);
    }
}
