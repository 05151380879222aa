use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::classify::{Subject, SubjectSet};
use crate::roster::CandidateRecord;

/// One saved session as the auditor sees it. Callers supply these ordered by
/// report date ascending; the auditor never touches the store itself.
#[derive(Debug, Clone)]
pub struct HistorySession {
    pub name: String,
    pub report_date: String,
    pub records: Vec<CandidateRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FindingKind {
    RetakePassed,
    OutsideFramework,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub session_name: String,
    pub report_date: String,
}

/// One detected anomaly. Ephemeral: recomputed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub student_id: String,
    pub full_name: String,
    pub subject: char,
    pub kind: FindingKind,
    pub message: String,
    pub citation: Citation,
}

#[derive(Debug, Clone)]
struct CandidateHistory {
    baseline: SubjectSet,
    baseline_citation: Citation,
    // A pass, once achieved, is permanent; a later failing session never
    // clears it. A later *passing* session overwrites the citation so the
    // most recent pass is the one cited.
    passed: [Option<Citation>; 4],
}

/// Cross-reference a new batch against the full saved history.
///
/// Per candidate, per declared subject: retaking an already-passed subject
/// is flagged first and short-circuits the framework check for that subject;
/// otherwise a subject missing from the candidate's first-ever recorded
/// subject set is flagged against that first appearance. Candidates with no
/// prior history produce no findings — their first appearance establishes
/// the baseline going forward.
pub fn audit_batch(batch: &[CandidateRecord], history: &[HistorySession]) -> Vec<Finding> {
    let mut by_candidate: HashMap<String, CandidateHistory> = HashMap::new();

    for session in history {
        let citation = Citation {
            session_name: session.name.clone(),
            report_date: session.report_date.clone(),
        };
        for rec in &session.records {
            let id = rec.student_id.trim();
            if id.is_empty() {
                continue;
            }
            let entry = by_candidate
                .entry(id.to_string())
                .or_insert_with(|| CandidateHistory {
                    baseline: rec.declared_subjects(),
                    baseline_citation: citation.clone(),
                    passed: [None, None, None, None],
                });
            let cells = rec.cells();
            for s in Subject::ALL {
                if cells[s.index()].passed {
                    entry.passed[s.index()] = Some(citation.clone());
                }
            }
        }
    }

    let mut findings = Vec::new();
    for rec in batch {
        let id = rec.student_id.trim();
        if id.is_empty() {
            continue;
        }
        let Some(hist) = by_candidate.get(id) else {
            continue;
        };
        for s in rec.declared_subjects().iter() {
            if let Some(cited) = &hist.passed[s.index()] {
                findings.push(Finding {
                    student_id: id.to_string(),
                    full_name: rec.full_name.clone(),
                    subject: s.code(),
                    kind: FindingKind::RetakePassed,
                    message: format!(
                        "registered to retake subject {} already passed in session \"{}\" ({})",
                        s.code(),
                        cited.session_name,
                        cited.report_date
                    ),
                    citation: cited.clone(),
                });
                continue;
            }
            if !hist.baseline.contains(s) {
                findings.push(Finding {
                    student_id: id.to_string(),
                    full_name: rec.full_name.clone(),
                    subject: s.code(),
                    kind: FindingKind::OutsideFramework,
                    message: format!(
                        "subject {} not part of original registered framework {{{}}} from session \"{}\" ({})",
                        s.code(),
                        hist.baseline.encode(),
                        hist.baseline_citation.session_name,
                        hist.baseline_citation.report_date
                    ),
                    citation: hist.baseline_citation.clone(),
                });
            }
        }
    }
    findings
}
