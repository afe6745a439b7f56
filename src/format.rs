//! KPI display helpers for the text dashboard.

/// `1234.567` → `$1,234.57`; negatives keep the sign in front of the `$`.
pub fn format_currency(x: f64) -> String {
    if !x.is_finite() {
        return "n/a".to_string();
    }
    let cents = (x.abs() * 100.0).round() as u128;
    let sign = if x < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{}${}.{:02}",
        sign,
        group_thousands(&(cents / 100).to_string()),
        cents % 100
    )
}

/// Optional mean: absent renders as `n/a`.
pub fn format_optional_currency(x: Option<f64>) -> String {
    x.map(format_currency).unwrap_or_else(|| "n/a".to_string())
}

/// `1234567` → `1,234,567`.
pub fn format_count(n: usize) -> String {
    group_thousands(&n.to_string())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
