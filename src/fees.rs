use serde::{Deserialize, Serialize};

use crate::aggregate::ClassAggregate;
use crate::classify::Subject;
use crate::roster::CandidateRecord;

/// Fee rates in whole đồng. Organization configuration, not business logic;
/// persisted in settings and overridable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRates {
    pub theory: u64,
    pub simulation: u64,
    pub practical_course: u64,
    pub on_road: u64,
    pub licensing: u64,
}

impl Default for FeeRates {
    fn default() -> Self {
        FeeRates {
            theory: 100_000,
            simulation: 100_000,
            practical_course: 350_000,
            on_road: 80_000,
            licensing: 135_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeLine {
    pub count: u64,
    pub rate: u64,
    pub amount: u64,
}

impl FeeLine {
    fn new(count: u64, rate: u64) -> FeeLine {
        FeeLine {
            count,
            rate,
            amount: count * rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTable {
    pub theory: FeeLine,
    pub simulation: FeeLine,
    pub practical_course: FeeLine,
    pub on_road: FeeLine,
    pub licensing: FeeLine,
    pub grand_total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeModel {
    /// Counted from the subject-set string, attendance ignored.
    pub by_registered: FeeTable,
    /// Counted from the cells that classify as attempted.
    pub by_attended: FeeTable,
    pub by_registered_words: String,
    pub by_attended_words: String,
}

fn build_table(counts: [u64; 4], final_pass: u64, rates: &FeeRates) -> FeeTable {
    let theory = FeeLine::new(counts[0], rates.theory);
    let simulation = FeeLine::new(counts[1], rates.simulation);
    let practical_course = FeeLine::new(counts[2], rates.practical_course);
    let on_road = FeeLine::new(counts[3], rates.on_road);
    let licensing = FeeLine::new(final_pass, rates.licensing);
    let grand_total = theory.amount
        + simulation.amount
        + practical_course.amount
        + on_road.amount
        + licensing.amount;
    FeeTable {
        theory,
        simulation,
        practical_course,
        on_road,
        licensing,
        grand_total,
    }
}

/// Derive both fee tables from the roster and the grand-total aggregate.
/// Integer arithmetic on whole currency units throughout.
pub fn compute_fees(
    records: &[CandidateRecord],
    grand_total: &ClassAggregate,
    rates: &FeeRates,
) -> FeeModel {
    let mut registered = [0u64; 4];
    let mut attended = [0u64; 4];
    for rec in records {
        let declared = rec.declared_subjects();
        let cells = rec.cells();
        for s in Subject::ALL {
            if declared.contains(s) {
                registered[s.index()] += 1;
            }
            if cells[s.index()].attempted {
                attended[s.index()] += 1;
            }
        }
    }
    let final_pass = u64::from(grand_total.final_pass);
    let by_registered = build_table(registered, final_pass, rates);
    let by_attended = build_table(attended, final_pass, rates);
    let by_registered_words = amount_in_words(by_registered.grand_total);
    let by_attended_words = amount_in_words(by_attended.grand_total);
    FeeModel {
        by_registered,
        by_attended,
        by_registered_words,
        by_attended_words,
    }
}

const DIGITS: [&str; 10] = [
    "không", "một", "hai", "ba", "bốn", "năm", "sáu", "bảy", "tám", "chín",
];

fn three_digits(n: u64, leading_group: bool) -> String {
    let hundreds = n / 100;
    let tens = (n / 10) % 10;
    let units = n % 10;
    let mut parts: Vec<String> = Vec::new();

    if hundreds > 0 || !leading_group {
        parts.push(format!("{} trăm", DIGITS[hundreds as usize]));
    }
    match tens {
        0 => {
            if units > 0 && (hundreds > 0 || !leading_group) {
                parts.push("lẻ".to_string());
            }
        }
        1 => parts.push("mười".to_string()),
        _ => parts.push(format!("{} mươi", DIGITS[tens as usize])),
    }
    match units {
        0 => {}
        1 if tens >= 2 => parts.push("mốt".to_string()),
        5 if tens >= 1 => parts.push("lăm".to_string()),
        u => parts.push(DIGITS[u as usize].to_string()),
    }
    parts.join(" ")
}

/// Vietnamese currency-in-words for whole đồng amounts, as printed on the
/// fee summary documents.
pub fn amount_in_words(amount: u64) -> String {
    if amount == 0 {
        return "Không đồng".to_string();
    }
    let scales = ["", " nghìn", " triệu", " tỷ"];
    let mut groups: Vec<u64> = Vec::new();
    let mut n = amount;
    while n > 0 {
        groups.push(n % 1000);
        n /= 1000;
    }
    let top = groups.len() - 1;
    let mut parts: Vec<String> = Vec::new();
    for (i, g) in groups.iter().enumerate().rev() {
        if *g == 0 {
            continue;
        }
        let words = three_digits(*g, i == top);
        parts.push(format!("{}{}", words, scales[i]));
    }
    let mut out = parts.join(" ");
    out.push_str(" đồng");
    let mut chars = out.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;

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

    #[test]
    fn registered_vs_attended_counts_differ() {
        // Registered LM but only sat theory.
        let records = vec![rec("99001", "B2", "LM", ["ĐẠT", "Vắng", "", ""])];
        let data = aggregate(&records, &[]);
        let rates = FeeRates {
            theory: 100,
            simulation: 200,
            practical_course: 300,
            on_road: 400,
            licensing: 500,
        };
        let model = compute_fees(&records, &data.grand_total, &rates);
        assert_eq!(model.by_registered.theory.count, 1);
        assert_eq!(model.by_registered.simulation.count, 1);
        assert_eq!(model.by_attended.theory.count, 1);
        assert_eq!(model.by_attended.simulation.count, 0);
        // Candidate failed (declared M never passed): no licensing fee.
        assert_eq!(model.by_registered.licensing.count, 0);
        assert_eq!(model.by_registered.grand_total, 100 + 200);
        assert_eq!(model.by_attended.grand_total, 100);
    }

    #[test]
    fn licensing_component_is_final_pass_times_rate_in_both_tables() {
        let grand_total = ClassAggregate {
            final_pass: 10,
            ..ClassAggregate::default()
        };
        let rates = FeeRates {
            theory: 0,
            simulation: 0,
            practical_course: 0,
            on_road: 0,
            licensing: 115_000,
        };
        let model = compute_fees(&[], &grand_total, &rates);
        assert_eq!(model.by_registered.licensing.amount, 1_150_000);
        assert_eq!(model.by_attended.licensing.amount, 1_150_000);
        assert_eq!(model.by_registered.grand_total, 1_150_000);
        assert_eq!(model.by_attended.grand_total, 1_150_000);
    }

    #[test]
    fn amounts_render_in_words() {
        assert_eq!(amount_in_words(0), "Không đồng");
        assert_eq!(amount_in_words(5), "Năm đồng");
        assert_eq!(amount_in_words(15), "Mười lăm đồng");
        assert_eq!(amount_in_words(21), "Hai mươi mốt đồng");
        assert_eq!(amount_in_words(105), "Một trăm lẻ năm đồng");
        assert_eq!(amount_in_words(1_150_000), "Một triệu một trăm năm mươi nghìn đồng");
        assert_eq!(amount_in_words(2_000_500), "Hai triệu năm trăm đồng");
    }
}
