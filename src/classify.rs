use serde::{Deserialize, Serialize};

/// The four testable components of a driving-test session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Theory,
    Simulation,
    PracticalCourse,
    OnRoad,
}

impl Subject {
    /// Canonical ordering used everywhere a fixed subject order matters
    /// (derived subject strings, tally arrays, finding output).
    pub const ALL: [Subject; 4] = [
        Subject::Theory,
        Subject::Simulation,
        Subject::PracticalCourse,
        Subject::OnRoad,
    ];

    pub fn code(self) -> char {
        match self {
            Subject::Theory => 'L',
            Subject::Simulation => 'M',
            Subject::PracticalCourse => 'H',
            Subject::OnRoad => 'D',
        }
    }

    pub fn from_code(c: char) -> Option<Subject> {
        match c {
            'L' => Some(Subject::Theory),
            'M' => Some(Subject::Simulation),
            'H' => Some(Subject::PracticalCourse),
            // 'Đ' is folded to 'D' before lookup; accept both here anyway.
            'D' | 'Đ' => Some(Subject::OnRoad),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Subject::Theory => 0,
            Subject::Simulation => 1,
            Subject::PracticalCourse => 2,
            Subject::OnRoad => 3,
        }
    }
}

/// Fixed-size set of subjects. The free-text "LMHD" encoding from roster
/// files exists only at the normalization boundary; everything internal
/// works on this bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubjectSet(u8);

impl SubjectSet {
    pub fn empty() -> SubjectSet {
        SubjectSet(0)
    }

    pub fn insert(&mut self, s: Subject) {
        self.0 |= 1 << s.index();
    }

    pub fn contains(self, s: Subject) -> bool {
        self.0 & (1 << s.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a roster subject-set string. Case-insensitive, folds 'Đ'/'đ'
    /// to 'D', and ignores separators or any other character.
    pub fn parse(raw: &str) -> SubjectSet {
        let mut set = SubjectSet::empty();
        for c in raw.trim().chars() {
            let folded = match c.to_uppercase().next().unwrap_or(c) {
                'Đ' => 'D',
                other => other,
            };
            if let Some(s) = Subject::from_code(folded) {
                set.insert(s);
            }
        }
        set
    }

    pub fn iter(self) -> impl Iterator<Item = Subject> {
        Subject::ALL.into_iter().filter(move |s| self.contains(*s))
    }

    /// Canonical "LMHD"-order string form.
    pub fn encode(self) -> String {
        self.iter().map(|s| s.code()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellResult {
    pub attempted: bool,
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    Absent,
    Passed,
    Failed,
}

/// Classify one raw score cell.
///
/// Empty cells and the absence markers mean the subject was not attempted.
/// The explicit pass vocabulary means attempted-and-passed. Anything else
/// non-empty (failing grades, "KHÔNG ĐẠT", "TRƯỢT", raw numeric scores) is
/// attempted-and-failed; there is no partial credit and unknown text never
/// grants a pass.
pub fn classify_cell(raw: &str) -> CellResult {
    let t = raw.trim().to_uppercase();
    if t.is_empty() || t == "VẮNG" || t == "V" {
        return CellResult {
            attempted: false,
            passed: false,
        };
    }
    if matches!(t.as_str(), "ĐẠT" | "PASSED" | "P" | "1") {
        return CellResult {
            attempted: true,
            passed: true,
        };
    }
    CellResult {
        attempted: true,
        passed: false,
    }
}

/// Classify a full candidate from their four cells and declared subject set.
///
/// Absent wins over everything: all four cells unattempted means the
/// candidate never showed up, whatever the subject-set string says. An empty
/// declared set can never be judged Passed. Otherwise the verdict is a
/// strict AND over the declared subjects only; subjects outside the declared
/// set do not affect the verdict either way.
pub fn classify_candidate(cells: &[CellResult; 4], declared: SubjectSet) -> Verdict {
    if cells.iter().all(|c| !c.attempted) {
        return Verdict::Absent;
    }
    if declared.is_empty() {
        return Verdict::Failed;
    }
    for s in declared.iter() {
        if !cells[s.index()].passed {
            return Verdict::Failed;
        }
    }
    Verdict::Passed
}
