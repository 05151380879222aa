use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::{classify_candidate, Subject, Verdict};
use crate::roster::CandidateRecord;

/// Per-subject tally inside one class row. `fail` is always recomputed as
/// `total - pass` in a post-pass, never accumulated on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTally {
    pub total: u32,
    pub pass: u32,
    pub fail: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTallies {
    pub theory: SubjectTally,
    pub simulation: SubjectTally,
    pub practical_course: SubjectTally,
    pub on_road: SubjectTally,
}

impl SubjectTallies {
    pub fn get(&self, s: Subject) -> &SubjectTally {
        match s {
            Subject::Theory => &self.theory,
            Subject::Simulation => &self.simulation,
            Subject::PracticalCourse => &self.practical_course,
            Subject::OnRoad => &self.on_road,
        }
    }

    fn get_mut(&mut self, s: Subject) -> &mut SubjectTally {
        match s {
            Subject::Theory => &mut self.theory,
            Subject::Simulation => &mut self.simulation,
            Subject::PracticalCourse => &mut self.practical_course,
            Subject::OnRoad => &mut self.on_road,
        }
    }
}

/// One row of the results table: everything counted for a single license
/// class within one cohort (or the synthetic grand total).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAggregate {
    pub license_class: String,
    pub applications: u32,
    pub participants: u32,
    pub subjects: SubjectTallies,
    pub final_pass: u32,
}

impl ClassAggregate {
    fn absorb(&mut self, other: &ClassAggregate) {
        self.applications += other.applications;
        self.participants += other.participants;
        self.final_pass += other.final_pass;
        for s in Subject::ALL {
            let mine = self.subjects.get_mut(s);
            let theirs = other.subjects.get(s);
            mine.total += theirs.total;
            mine.pass += theirs.pass;
        }
    }
}

/// The two cohort tables plus the flat grand total across both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub first_time: Vec<ClassAggregate>,
    pub retake: Vec<ClassAggregate>,
    pub grand_total: ClassAggregate,
}

/// Cohort rule: organization convention, not business logic. A candidate is
/// in the retake/free cohort iff their id carries one of these prefixes.
pub fn is_retake(student_id: &str, retake_prefixes: &[String]) -> bool {
    let id = student_id.trim();
    retake_prefixes
        .iter()
        .any(|p| !p.is_empty() && id.starts_with(p.as_str()))
}

/// Fold normalized records into the two cohort tables and the grand total.
/// Pure and total: records with a blank license class are skipped (nothing
/// to group them into), everything else counts.
pub fn aggregate(records: &[CandidateRecord], retake_prefixes: &[String]) -> AppData {
    let mut first_time: BTreeMap<String, ClassAggregate> = BTreeMap::new();
    let mut retake: BTreeMap<String, ClassAggregate> = BTreeMap::new();

    for rec in records {
        let class_code = rec.license_class.trim().to_uppercase();
        if class_code.is_empty() {
            continue;
        }
        let table = if is_retake(&rec.student_id, retake_prefixes) {
            &mut retake
        } else {
            &mut first_time
        };
        let row = table
            .entry(class_code.clone())
            .or_insert_with(|| ClassAggregate {
                license_class: class_code,
                ..ClassAggregate::default()
            });

        let cells = rec.cells();
        let verdict = classify_candidate(&cells, rec.declared_subjects());

        row.applications += 1;
        if verdict != Verdict::Absent {
            row.participants += 1;
        }
        for s in Subject::ALL {
            let cell = cells[s.index()];
            let tally = row.subjects.get_mut(s);
            if cell.attempted {
                tally.total += 1;
            }
            if cell.passed {
                tally.pass += 1;
            }
        }
        if verdict == Verdict::Passed {
            row.final_pass += 1;
        }
    }

    // BTreeMap keys give the lexicographic class ordering for free.
    let mut first_time: Vec<ClassAggregate> = first_time.into_values().collect();
    let mut retake: Vec<ClassAggregate> = retake.into_values().collect();

    let mut grand_total = ClassAggregate {
        license_class: "TOTAL".to_string(),
        ..ClassAggregate::default()
    };
    for row in first_time.iter().chain(retake.iter()) {
        grand_total.absorb(row);
    }

    for row in first_time
        .iter_mut()
        .chain(retake.iter_mut())
        .chain(std::iter::once(&mut grand_total))
    {
        for s in Subject::ALL {
            let tally = row.subjects.get_mut(s);
            tally.fail = tally.total.saturating_sub(tally.pass);
        }
    }

    AppData {
        first_time,
        retake,
        grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::CandidateRecord;

    fn rec(id: &str, class: &str, subjects: &str, cells: [&str; 4]) -> CandidateRecord {
        CandidateRecord {
            student_id: id.to_string(),
            license_class: class.to_string(),
            subjects: subjects.to_string(),
            theory_score: cells[0].to_string(),
            simulation_score: cells[1].to_string(),
            practical_score: cells[2].to_string(),
            road_score: cells[3].to_string(),
            ..CandidateRecord::default()
        }
    }

    const RETAKE: [&str; 3] = ["2721", "2722", "2411"];

    fn prefixes() -> Vec<String> {
        RETAKE.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fail_is_always_total_minus_pass() {
        let records = vec![
            rec("99001", "B2", "LM", ["ĐẠT", "KHÔNG ĐẠT", "", ""]),
            rec("99002", "B2", "LM", ["ĐẠT", "ĐẠT", "", ""]),
            rec("99003", "B2", "L", ["TRƯỢT", "", "", ""]),
        ];
        let data = aggregate(&records, &prefixes());
        let b2 = &data.first_time[0];
        assert_eq!(b2.subjects.theory.total, 3);
        assert_eq!(b2.subjects.theory.pass, 2);
        assert_eq!(b2.subjects.theory.fail, 1);
        assert_eq!(b2.subjects.simulation.total, 2);
        assert_eq!(b2.subjects.simulation.pass, 1);
        assert_eq!(b2.subjects.simulation.fail, 1);
        for s in Subject::ALL {
            let t = data.grand_total.subjects.get(s);
            assert_eq!(t.fail, t.total - t.pass);
        }
    }

    #[test]
    fn cohort_partition_by_id_prefix_moves_rows_not_totals() {
        let base = vec![
            rec("2721034", "C", "L", ["ĐẠT", "", "", ""]),
            rec("99001", "C", "L", ["ĐẠT", "", "", ""]),
        ];
        let data = aggregate(&base, &prefixes());
        assert_eq!(data.retake.len(), 1);
        assert_eq!(data.first_time.len(), 1);
        assert_eq!(data.retake[0].applications, 1);
        assert_eq!(data.first_time[0].applications, 1);

        // Same records, one id shifted out of the retake prefix space.
        let moved = vec![
            rec("1721034", "C", "L", ["ĐẠT", "", "", ""]),
            rec("99001", "C", "L", ["ĐẠT", "", "", ""]),
        ];
        let data2 = aggregate(&moved, &prefixes());
        assert!(data2.retake.is_empty());
        assert_eq!(data2.first_time[0].applications, 2);
        assert_eq!(data.grand_total.applications, data2.grand_total.applications);
        assert_eq!(data.grand_total.final_pass, data2.grand_total.final_pass);
    }

    #[test]
    fn absent_counts_application_but_not_participant() {
        let records = vec![rec("99001", "B2", "LMHD", ["", "", "", ""])];
        let data = aggregate(&records, &prefixes());
        let b2 = &data.first_time[0];
        assert_eq!(b2.applications, 1);
        assert_eq!(b2.participants, 0);
        assert_eq!(b2.final_pass, 0);
        assert_eq!(b2.subjects.theory.total, 0);
    }

    #[test]
    fn blank_license_class_is_skipped() {
        let records = vec![
            rec("99001", "  ", "L", ["ĐẠT", "", "", ""]),
            rec("99002", "D", "L", ["ĐẠT", "", "", ""]),
        ];
        let data = aggregate(&records, &prefixes());
        assert_eq!(data.grand_total.applications, 1);
        assert_eq!(data.first_time.len(), 1);
        assert_eq!(data.first_time[0].license_class, "D");
    }

    #[test]
    fn class_rows_sort_lexicographically() {
        let records = vec![
            rec("1", "C", "L", ["ĐẠT", "", "", ""]),
            rec("2", "A1", "L", ["ĐẠT", "", "", ""]),
            rec("3", "B2", "L", ["ĐẠT", "", "", ""]),
        ];
        let data = aggregate(&records, &prefixes());
        let order: Vec<&str> = data
            .first_time
            .iter()
            .map(|r| r.license_class.as_str())
            .collect();
        assert_eq!(order, vec!["A1", "B2", "C"]);
    }

    #[test]
    fn aggregation_is_idempotent_over_the_same_input() {
        let records = vec![
            rec("2721034", "B2", "LM", ["ĐẠT", "Vắng", "", ""]),
            rec("99001", "C", "LMHD", ["ĐẠT", "ĐẠT", "ĐẠT", "ĐẠT"]),
        ];
        let a = aggregate(&records, &prefixes());
        let b = aggregate(&records, &prefixes());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
