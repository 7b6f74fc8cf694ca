//! Fixed-width dumps of the process table and the allocation matrix

use crate::process_table::ProcessTable;
use resources::ResourceLedger;
use std::fmt::Write;

const MATRIX_COLUMN: usize = 8;

/// Renders the process table, one row per slot
pub fn process_table_report(table: &ProcessTable) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6}{:<10}{:<12}{:<12}{:<12}",
        "Index", "Occ", "PID", "StartSec", "StartNano"
    );
    let _ = writeln!(out, "{}", "-".repeat(52));
    for (index, slot) in table.slots().iter().enumerate() {
        match slot {
            Some(entry) => {
                let _ = writeln!(
                    out,
                    "{:<6}{:<10}{:<12}{:<12}{:<12}",
                    index,
                    1,
                    entry.pid.as_u32(),
                    entry.admitted_at.seconds(),
                    entry.admitted_at.nanoseconds()
                );
            }
            None => {
                let _ = writeln!(out, "{:<6}{:<10}{:<12}{:<12}{:<12}", index, 0, "-", "-", "-");
            }
        }
    }
    out.push('\n');
    out
}

/// Renders the allocation matrix, one row per slot and one column per class
pub fn allocation_matrix_report(ledger: &ResourceLedger) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:<width$}", "Index", width = MATRIX_COLUMN);
    for class in 0..ledger.classes() {
        let _ = write!(out, "{:>width$}", format!("R{class}"), width = MATRIX_COLUMN);
    }
    out.push('\n');
    out.push_str(&"-".repeat(MATRIX_COLUMN * (ledger.classes() + 1)));
    out.push('\n');
    for (index, row) in ledger.allocation_matrix().iter().enumerate() {
        let _ = write!(out, "{:<width$}", index, width = MATRIX_COLUMN);
        for count in row.iter() {
            let _ = write!(out, "{:>width$}", count, width = MATRIX_COLUMN);
        }
        out.push('\n');
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Pid, SlotIndex};
    use kernel_api::SimTime;

    #[test]
    fn test_process_table_report_layout() {
        let mut table = ProcessTable::new(2);
        table
            .bind(SlotIndex::new(1), Pid::new(42), SimTime::from_parts(3, 500))
            .unwrap();

        let report = process_table_report(&table);
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Index Occ"));
        assert_eq!(lines[1], "-".repeat(52));
        assert!(lines[2].starts_with("0     0         -"));
        assert!(lines[3].starts_with("1     1         42          3           500"));
        assert_eq!(lines[4], "");
    }

    #[test]
    fn test_allocation_matrix_report_layout() {
        let mut ledger = ResourceLedger::new([5, 5].into(), 2);
        ledger.try_allocate(SlotIndex::new(1), &[3, 1].into()).unwrap();

        let report = allocation_matrix_report(&ledger);
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "Index         R0      R1");
        assert_eq!(lines[1], "-".repeat(24));
        assert_eq!(lines[2], "0              0       0");
        assert_eq!(lines[3], "1              3       1");
    }
}
