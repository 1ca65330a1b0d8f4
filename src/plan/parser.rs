//! Turns free-text plans into steps.

use super::types::Step;

/// Whether a plan line is a numbered step.
///
/// The line is trimmed first. It must be longer than two characters, start
/// with an ASCII digit, and have a `.` within its first four characters
/// (`1.` through `99.`, plus `1.2`-style numbering).
pub fn is_step_line(line: &str) -> bool {
    let line = line.trim();
    if line.chars().count() <= 2 {
        return false;
    }
    if !line.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    line.chars().take(4).any(|c| c == '.')
}

/// Parse plan text into steps, one per numbered line, in input order.
///
/// Everything else (headings, notes, blank lines) is dropped.
pub fn parse_plan(plan_text: &str) -> Vec<Step> {
    plan_text
        .lines()
        .map(str::trim)
        .filter(|line| is_step_line(line))
        .map(Step::new)
        .collect()
}
