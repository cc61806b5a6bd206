use crate::finding::Finding;

pub const MAX_SCORE: u32 = 100;

/// 100 minus the severity penalty of each finding, floored at zero.
pub fn score(findings: &[Finding]) -> u32 {
    let penalty = findings
        .iter()
        .fold(0u32, |acc, f| acc.saturating_add(f.severity.penalty()));
    MAX_SCORE.saturating_sub(penalty)
}
