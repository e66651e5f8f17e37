//! Payslip batch rendering.
//!
//! Both files are semicolon-separated with no quoting. Matricules and codes
//! are validated on the way in to never contain `;` or line breaks.

use easypaies_core::{AggregateRoot, PayCode};

use crate::dates::format_day;
use crate::ledger::{AbsenceEntry, BonusEntry, PayrollLedger};

pub const ABSENCE_HEADER: &str = "Matricule;Code;Valeur;Date début;Date fin";
pub const ABSENCES_FILE: &str = "absences.csv";
pub const PRIMES_FILE: &str = "primes.csv";

/// The rendered current batch of one ledger, pinned to the stream version it
/// was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayslipBatch {
    pub through_sequence: u64,
    pub absences_csv: String,
    pub primes_csv: String,
    pub absence_count: usize,
    pub bonus_count: usize,
    /// Codes of pending bonuses that no longer have a catalog column. Those
    /// entries are counted and closed with the batch but absent from the file.
    pub uncatalogued_codes: Vec<String>,
}

impl PayslipBatch {
    pub fn is_empty(&self) -> bool {
        self.absence_count == 0 && self.bonus_count == 0
    }
}

impl PayrollLedger {
    /// Render the current batch. `primes` is the entity's bonus catalog and
    /// fixes the column order of the bonus file.
    pub fn prepare_batch(&self, primes: &[PayCode]) -> PayslipBatch {
        PayslipBatch {
            through_sequence: self.version(),
            absences_csv: absence_csv(self.pending_absences()),
            primes_csv: bonus_csv(primes, self.pending_bonuses()),
            absence_count: self.pending_absences().len(),
            bonus_count: self.pending_bonuses().len(),
            uncatalogued_codes: uncatalogued_codes(primes, self.pending_bonuses()),
        }
    }
}

/// `Matricule;Code;Valeur;Date début;Date fin` then one row per entry.
pub fn absence_csv(entries: &[AbsenceEntry]) -> String {
    let mut out = String::with_capacity(64 + entries.len() * 48);
    out.push_str(ABSENCE_HEADER);
    out.push('\n');
    for e in entries {
        out.push_str(&format!(
            "{};{};{};{};{}\n",
            e.matricule,
            e.code,
            e.value,
            format_day(e.start_date),
            format_day(e.end_date)
        ));
    }
    out
}

/// Pivot of bonus entries: one column per catalog code, one row per
/// matricule (first-appearance order), summed cells.
///
/// Entries whose code is not in the catalog have no column and are left out.
pub fn bonus_csv(catalog: &[PayCode], entries: &[BonusEntry]) -> String {
    let mut rows: Vec<(&str, Vec<Option<f64>>)> = Vec::new();

    for entry in entries {
        let Some(col) = catalog.iter().position(|c| c.code == entry.code) else {
            continue;
        };
        let idx = match rows.iter().position(|(m, _)| *m == entry.matricule.as_str()) {
            Some(idx) => idx,
            None => {
                rows.push((entry.matricule.as_str(), vec![None; catalog.len()]));
                rows.len() - 1
            }
        };
        let cell = &mut rows[idx].1[col];
        *cell = Some(cell.unwrap_or(0.0) + entry.value);
    }

    let mut out = String::from("Matricule");
    for code in catalog {
        out.push(';');
        out.push_str(&code.code);
    }
    out.push('\n');

    for (matricule, cells) in rows {
        out.push_str(matricule);
        for cell in cells {
            out.push(';');
            if let Some(v) = cell {
                out.push_str(&format_amount(v));
            }
        }
        out.push('\n');
    }
    out
}

/// Distinct bonus codes with no catalog column, sorted.
pub fn uncatalogued_codes(catalog: &[PayCode], entries: &[BonusEntry]) -> Vec<String> {
    let mut codes: Vec<String> = entries
        .iter()
        .filter(|e| !catalog.iter().any(|c| c.code == e.code))
        .map(|e| e.code.clone())
        .collect();
    codes.sort();
    codes.dedup();
    codes
}

/// Shortest form: `150`, `12.5`, `0.1`. Sums are rounded to the cent first
/// so float noise from repeated additions never reaches the file.
pub fn format_amount(value: f64) -> String {
    let cents = (value * 100.0).round() / 100.0;
    let cents = if cents == 0.0 { 0.0 } else { cents };
    format!("{cents}")
}
