//! Number formatting for tooltips.

/// Rounds to two significant digits and groups the integer part with
/// commas: `23456789` becomes `23,000,000`, `0.456` becomes `0.46`.
pub fn format_value(value: f64) -> String {
    format_significant(value, 2)
}

pub fn format_significant(value: f64, digits: u32) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let digits = digits.max(1) as i32;

    let magnitude = |v: f64| if v == 0.0 { 0 } else { v.abs().log10().floor() as i32 };
    let round_at = |v: f64, exponent: i32| {
        let step = 10f64.powi(exponent - digits + 1);
        (v / step).round() * step
    };

    // Rounding up near f64::MAX overflows; keep the unrounded value then
    let round_finite = |v: f64, exponent: i32| {
        let r = round_at(v, exponent);
        if r.is_finite() { r } else { v }
    };

    let mut rounded = round_finite(value, magnitude(value));
    // 9.96 rounds up to 10.0 and gains a digit
    let exponent = magnitude(rounded);
    rounded = round_finite(rounded, exponent);

    let decimals = (digits - 1 - exponent).max(0) as usize;
    let text = format!("{:.*}", decimals, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut out = String::with_capacity(text.len() + int_part.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
