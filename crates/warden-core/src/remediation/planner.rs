use super::templates::edit_for;
use super::{Edit, Priority, RemediationPlanItem};
use crate::config::AnalysisConfig;
use crate::finding::{Finding, FindingId};
use crate::model::ProgramModel;
use std::collections::HashMap;
use tracing::debug;

/// One finding's proposed fix before conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCandidate {
    pub priority: Priority,
    pub finding: FindingId,
    pub description: String,
    pub edit: Option<Edit>,
}

pub struct RemediationPlanner<'a> {
    model: &'a ProgramModel,
    config: &'a AnalysisConfig,
}

impl<'a> RemediationPlanner<'a> {
    pub fn new(model: &'a ProgramModel, config: &'a AnalysisConfig) -> Self {
        Self { model, config }
    }

    fn describe(finding: &Finding, edit: Option<&Edit>) -> String {
        match edit {
            Some(edit) if edit.is_insertion() => {
                format!("{}: insert `{}`", finding.title, edit.after.trim())
            }
            Some(edit) if edit.after.is_empty() => {
                format!("{}: remove `{}`", finding.title, edit.before.trim())
            }
            Some(edit) => format!("{}: replace `{}` with `{}`", finding.title, edit.before, edit.after),
            None => format!("{}: {}", finding.title, finding.recommendation),
        }
    }

    /// Candidates for raw findings and compound findings. A compound takes
    /// the edit of its highest-priority source that has one.
    pub fn candidates(&self, findings: &[Finding], compounds: &[Finding]) -> Vec<PlanCandidate> {
        let mut raw: HashMap<&FindingId, (Priority, Option<Edit>)> = HashMap::new();
        let mut out = Vec::with_capacity(findings.len() + compounds.len());

        for finding in findings {
            let edit = edit_for(self.model, self.config, finding);
            raw.insert(&finding.id, (Priority::of(finding), edit.clone()));
            out.push(PlanCandidate {
                priority: Priority::of(finding),
                finding: finding.id.clone(),
                description: Self::describe(finding, edit.as_ref()),
                edit,
            });
        }

        for compound in compounds {
            let edit = compound
                .sources()
                .iter()
                .filter_map(|id| raw.get(id))
                .filter(|(_, edit)| edit.is_some())
                .min_by_key(|(priority, _)| *priority)
                .and_then(|(_, edit)| edit.clone());
            out.push(PlanCandidate {
                priority: Priority::Compound,
                finding: compound.id.clone(),
                description: Self::describe(compound, edit.as_ref()),
                edit,
            });
        }

        out
    }

    pub fn plan(&self, findings: &[Finding], compounds: &[Finding]) -> Vec<RemediationPlanItem> {
        resolve(self.candidates(findings, compounds))
    }
}

/// Order candidates by priority (stable) and accept them greedily. A
/// candidate whose edit overlaps an accepted edit is dropped. It counts as
/// superseded only when the kept edit fixes it too: the same edit, or an
/// insertion at the same point, which is appended to the kept one. Any other
/// dropped candidate is recorded as displaced and stays unresolved.
pub fn resolve(mut candidates: Vec<PlanCandidate>) -> Vec<RemediationPlanItem> {
    candidates.sort_by_key(|c| c.priority);
    let mut items: Vec<RemediationPlanItem> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if let Some(edit) = &candidate.edit {
            let survivor = items
                .iter_mut()
                .find(|item| item.span().map(|s| s.overlaps(&edit.span)).unwrap_or(false));
            if let Some(survivor) = survivor {
                let covered = match survivor.edit.as_mut() {
                    Some(kept) if *kept == *edit => true,
                    Some(kept) if kept.is_insertion() && edit.is_insertion() => {
                        kept.after.push_str(&edit.after);
                        true
                    }
                    _ => false,
                };
                debug!(
                    dropped = %candidate.finding,
                    kept = ?survivor.finding_refs,
                    covered,
                    "overlapping remediation dropped"
                );
                if covered {
                    survivor
                        .notes
                        .push(format!("also resolves {} ({})", candidate.finding, candidate.priority));
                    survivor.supersedes.push(candidate.finding);
                } else {
                    survivor.notes.push(format!(
                        "overrides {} ({}); its fix is not applied",
                        candidate.finding, candidate.priority
                    ));
                    survivor.displaced.push(candidate.finding);
                }
                continue;
            }
        }
        items.push(RemediationPlanItem {
            priority: candidate.priority,
            finding_refs: vec![candidate.finding],
            fix_description: candidate.description,
            edit: candidate.edit,
            supersedes: Vec::new(),
            displaced: Vec::new(),
            notes: Vec::new(),
        });
    }

    items
}
