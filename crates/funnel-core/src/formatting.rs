//! Display formatting for the text renderer and summary cards.

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use funnel_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Round to the requested decimal places. The epsilon counters IEEE 754
    // binary-representation issues at exact midpoints.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // `frac_str` starts with "0.", e.g. "0.50". Strip the leading "0".
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a monetary amount as a USD string with two decimal places and
/// thousands separators.
///
/// # Examples
///
/// ```
/// use funnel_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56), "$1,234.56");
/// assert_eq!(format_currency(59.98),   "$59.98");
/// assert_eq!(format_currency(0.0),     "$0.00");
/// ```
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("$-{}", format_number(amount.abs(), 2))
    } else {
        format!("${}", format_number(amount, 2))
    }
}

/// Convert a fractional rate to a percentage rounded to `decimal_places`.
///
/// Rates above 1.0 (possible with causally inconsistent funnel data) pass
/// through unclamped.
///
/// # Examples
///
/// ```
/// use funnel_core::formatting::rate_to_pct;
///
/// assert!((rate_to_pct(0.25, 1) - 25.0).abs() < 1e-9);
/// assert!((rate_to_pct(1.0 / 3.0, 2) - 33.33).abs() < 1e-9);
/// assert!((rate_to_pct(1.5, 0) - 150.0).abs() < 1e-9);
/// ```
pub fn rate_to_pct(rate: f64, decimal_places: u32) -> f64 {
    let factor = 10_f64.powi(decimal_places as i32);
    (rate * 100.0 * factor).round() / factor
}

/// Format a fractional rate as a percent string with one decimal place.
///
/// # Examples
///
/// ```
/// use funnel_core::formatting::format_percent;
///
/// assert_eq!(format_percent(0.5),   "50.0%");
/// assert_eq!(format_percent(0.069), "6.9%");
/// ```
pub fn format_percent(rate: f64) -> String {
    format!("{:.1}%", rate_to_pct(rate, 1))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
