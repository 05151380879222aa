use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::{classify_cell, CellResult, Subject, SubjectSet};

/// One canonical roster row. Raw score cells stay as the free text the
/// spreadsheet carried; classification happens on demand so a record can be
/// patched (name/id corrections) without recomputing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub report_no: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub residence: String,
    #[serde(default)]
    pub license_class: String,
    #[serde(default)]
    pub subjects: String,
    #[serde(default)]
    pub theory_score: String,
    #[serde(default)]
    pub simulation_score: String,
    #[serde(default)]
    pub practical_score: String,
    #[serde(default)]
    pub road_score: String,
    /// Columns the alias map did not recognize, preserved verbatim
    /// (uppercased/trimmed keys). Never dropped.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Default for CandidateRecord {
    fn default() -> Self {
        CandidateRecord {
            student_id: String::new(),
            report_no: String::new(),
            full_name: String::new(),
            national_id: String::new(),
            birth_date: String::new(),
            residence: String::new(),
            license_class: String::new(),
            subjects: String::new(),
            theory_score: String::new(),
            simulation_score: String::new(),
            practical_score: String::new(),
            road_score: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl CandidateRecord {
    pub fn score_cell(&self, s: Subject) -> &str {
        match s {
            Subject::Theory => &self.theory_score,
            Subject::Simulation => &self.simulation_score,
            Subject::PracticalCourse => &self.practical_score,
            Subject::OnRoad => &self.road_score,
        }
    }

    pub fn cells(&self) -> [CellResult; 4] {
        [
            classify_cell(&self.theory_score),
            classify_cell(&self.simulation_score),
            classify_cell(&self.practical_score),
            classify_cell(&self.road_score),
        ]
    }

    pub fn declared_subjects(&self) -> SubjectSet {
        SubjectSet::parse(&self.subjects)
    }
}

const CANONICAL_KEYS: [&str; 12] = [
    "studentId",
    "reportNo",
    "fullName",
    "nationalId",
    "birthDate",
    "residence",
    "licenseClass",
    "subjects",
    "theoryScore",
    "simulationScore",
    "practicalScore",
    "roadScore",
];

/// Header alias table: normalized spreadsheet header -> canonical key.
/// This is the organization default; callers may supply their own map
/// (settings or a per-request override) instead.
pub fn default_aliases() -> BTreeMap<String, String> {
    let pairs: [(&str, &str); 44] = [
        ("MA HOC VIEN", "studentId"),
        ("MÃ HỌC VIÊN", "studentId"),
        ("MA HV", "studentId"),
        ("SO QUAN LY", "studentId"),
        ("SỐ QUẢN LÝ", "studentId"),
        ("SBD", "reportNo"),
        ("SO BAO DANH", "reportNo"),
        ("SỐ BÁO DANH", "reportNo"),
        ("HO TEN", "fullName"),
        ("HỌ TÊN", "fullName"),
        ("HO VA TEN", "fullName"),
        ("HỌ VÀ TÊN", "fullName"),
        ("CMND", "nationalId"),
        ("CCCD", "nationalId"),
        ("SO CMND", "nationalId"),
        ("SỐ CMND", "nationalId"),
        ("SO CCCD", "nationalId"),
        ("SỐ CCCD", "nationalId"),
        ("NGAY SINH", "birthDate"),
        ("NGÀY SINH", "birthDate"),
        ("NAM SINH", "birthDate"),
        ("NĂM SINH", "birthDate"),
        ("NOI CU TRU", "residence"),
        ("NƠI CƯ TRÚ", "residence"),
        ("HO KHAU", "residence"),
        ("HỘ KHẨU", "residence"),
        ("DIA CHI", "residence"),
        ("ĐỊA CHỈ", "residence"),
        ("HANG", "licenseClass"),
        ("HẠNG", "licenseClass"),
        ("HANG GPLX", "licenseClass"),
        ("HẠNG GPLX", "licenseClass"),
        ("MON THI", "subjects"),
        ("MÔN THI", "subjects"),
        ("NOI DUNG THI", "subjects"),
        ("NỘI DUNG THI", "subjects"),
        ("LT", "theoryScore"),
        ("LY THUYET", "theoryScore"),
        ("LÝ THUYẾT", "theoryScore"),
        ("MO PHONG", "simulationScore"),
        ("MÔ PHỎNG", "simulationScore"),
        ("SA HINH", "practicalScore"),
        ("SA HÌNH", "practicalScore"),
        ("DUONG TRUONG", "roadScore"),
    ];
    let mut map = BTreeMap::new();
    for (alias, canonical) in pairs {
        map.insert(alias.to_string(), canonical.to_string());
    }
    // Short column forms seen on printed rosters.
    map.insert("ĐƯỜNG TRƯỜNG".to_string(), "roadScore".to_string());
    map.insert("MP".to_string(), "simulationScore".to_string());
    map.insert("TH".to_string(), "practicalScore".to_string());
    map.insert("DT".to_string(), "roadScore".to_string());
    map
}

/// Header lookup form: trimmed, uppercased, internal whitespace collapsed.
fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Map loosely-typed spreadsheet rows to canonical CandidateRecords.
///
/// Pure transform: missing fields stay empty, unknown columns land in
/// `extra`, and an absent subject-set column is derived from which score
/// cells are populated (L, M, H, D order). Never fails.
pub fn normalize_rows(
    rows: &[serde_json::Value],
    aliases: &BTreeMap<String, String>,
) -> Vec<CandidateRecord> {
    // Alias lookup is case/whitespace-insensitive; canonical keys always
    // map to themselves so already-canonical rows are a no-op.
    let mut lookup: BTreeMap<String, String> = BTreeMap::new();
    for key in CANONICAL_KEYS {
        lookup.insert(normalize_header(key), key.to_string());
    }
    for (alias, canonical) in aliases {
        lookup.insert(normalize_header(alias), canonical.clone());
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(obj) = row.as_object() else {
            out.push(CandidateRecord::default());
            continue;
        };
        let mut rec = CandidateRecord::default();
        for (key, value) in obj {
            let text = cell_text(value);
            match lookup.get(&normalize_header(key)).map(String::as_str) {
                Some("studentId") => rec.student_id = text,
                Some("reportNo") => rec.report_no = text,
                Some("fullName") => rec.full_name = text,
                Some("nationalId") => rec.national_id = text,
                Some("birthDate") => rec.birth_date = text,
                Some("residence") => rec.residence = text,
                Some("licenseClass") => rec.license_class = text,
                Some("subjects") => rec.subjects = text,
                Some("theoryScore") => rec.theory_score = text,
                Some("simulationScore") => rec.simulation_score = text,
                Some("practicalScore") => rec.practical_score = text,
                Some("roadScore") => rec.road_score = text,
                _ => {
                    rec.extra.insert(normalize_header(key), text);
                }
            }
        }
        if rec.subjects.trim().is_empty() {
            rec.subjects = derive_subjects(&rec);
        }
        out.push(rec);
    }
    out
}

/// Files that omit the "subjects registered" column still classify
/// correctly: a populated score cell implies the subject was registered.
fn derive_subjects(rec: &CandidateRecord) -> String {
    let mut derived = String::new();
    for s in Subject::ALL {
        if !rec.score_cell(s).trim().is_empty() {
            derived.push(s.code());
        }
    }
    derived
}
