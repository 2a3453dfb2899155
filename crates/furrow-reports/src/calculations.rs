//! Pure report computations.

use crate::{Expense, Label};
use rand::Rng;

/// Sum of expense amounts. Empty is zero.
pub fn total(expenses: &[Expense]) -> f64 {
    expenses.iter().map(|e| e.amount).sum()
}

/// Sum of label counts. Empty is zero.
pub fn label_total(labels: &[Label]) -> u64 {
    labels.iter().map(|l| u64::from(l.count)).sum()
}

/// Client-side id for expenses and labels: random base36 followed by the
/// current time in base36.
pub fn generate_unique_id() -> String {
    let random: u64 = rand::thread_rng().gen();
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    format!("{}{}", to_base36(random), to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
