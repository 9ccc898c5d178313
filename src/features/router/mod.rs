//! Router: maps ranker output to an LLM-vs-rules routing decision (spec
//! §4.8). Ported from the reference `RoutingService`: a fixed level set
//! routes to the LLM, everything else stays on the rule-based path.

use crate::features::ranker::{RankerOutput, RiskLevel, RiskScore, RiskScoreItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingTarget {
    Llm,
    Rules,
}

#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub target: RoutingTarget,
    pub level: RiskLevel,
    pub score: f64,
    pub confidence: f64,
    pub check_id: Option<String>,
    pub rationale: String,
}

#[derive(Debug, Clone)]
pub struct RoutingPlan {
    pub items: Vec<RoutingDecision>,
    pub overall: Option<RoutingDecision>,
}

fn routes_to_llm(level: RiskLevel) -> bool {
    matches!(level, RiskLevel::Critical | RiskLevel::High)
}

fn decide(risk: &RiskScore, check_id: Option<String>) -> RoutingDecision {
    let target = if routes_to_llm(risk.level) { RoutingTarget::Llm } else { RoutingTarget::Rules };
    let rationale = if target == RoutingTarget::Llm {
        "High-risk finding; route to LLM.".to_string()
    } else {
        "Low-risk finding; keep rule-based handling.".to_string()
    };
    RoutingDecision { target, level: risk.level, score: risk.score, confidence: risk.confidence, check_id, rationale }
}

fn decide_item(item: &RiskScoreItem) -> RoutingDecision {
    decide(&item.risk, Some(item.check_id.clone()))
}

/// Routes every ranked item, plus the overall file-level decision.
pub fn route(output: &RankerOutput) -> RoutingPlan {
    let items = output.items.iter().map(decide_item).collect();
    let overall = output.overall.as_ref().map(|risk| decide(risk, None));
    RoutingPlan { items, overall }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ranker::rank;
    use crate::features::taint_analysis::TaintFlow;
    use crate::shared::models::Span;

    fn flow(source: &str, sink: &str, implicit: bool) -> TaintFlow {
        TaintFlow { source: source.into(), sink: sink.into(), path: vec!["x_1".into()], implicit, sink_span: Span::unknown("f.py") }
    }

    #[test]
    fn critical_and_high_route_to_llm() {
        let ranked = rank(&[flow("secret", "exec", true)], None);
        let plan = route(&ranked);
        assert_eq!(plan.items[0].target, RoutingTarget::Llm);
    }

    #[test]
    fn low_and_safe_route_to_rules() {
        let ranked = rank(&[flow("pii", "print", false)], None);
        let plan = route(&ranked);
        assert_eq!(plan.items[0].target, RoutingTarget::Rules);
    }
}
