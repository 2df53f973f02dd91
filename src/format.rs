use crate::aggregate::{percentage_share, UNAVAILABLE};

/// Currency suffix shown next to node totals
pub const CURRENCY: &str = "THB";

/// Format an amount with en-US digit grouping and at most three decimals.
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return UNAVAILABLE.to_string();
    }

    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let is_zero = int_part.chars().all(|c| c == '0') && frac.is_empty();
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

/// `1,234 THB`, or the unavailable marker
pub fn format_total(total: Option<f64>) -> String {
    match total {
        Some(total) => format!("{} {CURRENCY}", format_amount(total)),
        None => UNAVAILABLE.to_string(),
    }
}

/// Share as `12.34%`, or the unavailable marker
pub fn format_share(value: Option<f64>, base: Option<f64>) -> String {
    let share = percentage_share(value, base);
    if share == UNAVAILABLE {
        share
    } else {
        format!("{share}%")
    }
}

/// Node label as drawn on the diagram: `name • total (share)`.
///
/// Nodes with a zero or missing total show only their name.
pub fn node_label(name: &str, total: Option<f64>, parent_total: Option<f64>) -> String {
    match total {
        Some(t) if t != 0.0 => format!(
            "{name} • {} ({})",
            format_amount(t),
            format_share(total, parent_total)
        ),
        _ => name.to_string(),
    }
}

/// Escape text for display inside HTML
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1000.0), "1,000");
        assert_eq!(format_amount(3_752_700_000_000.0), "3,752,700,000,000");
        assert_eq!(format_amount(1234.5), "1,234.5");
        assert_eq!(format_amount(1234.56789), "1,234.568");
        assert_eq!(format_amount(-1500.0), "-1,500");
        assert_eq!(format_amount(-0.0001), "0");
    }

    #[test]
    fn test_format_total_and_share() {
        assert_eq!(format_total(Some(15.0)), "15 THB");
        assert_eq!(format_total(None), "—");
        assert_eq!(format_share(Some(1.0), Some(3.0)), "33.33%");
        assert_eq!(format_share(Some(1.0), Some(0.0)), "—");
    }

    #[test]
    fn test_node_label() {
        assert_eq!(
            node_label("Ministry of Finance", Some(1500.0), Some(6000.0)),
            "Ministry of Finance • 1,500 (25.00%)"
        );
        assert_eq!(node_label("Central Fund", Some(0.0), Some(10.0)), "Central Fund");
        assert_eq!(node_label("Root", Some(10.0), None), "Root • 10 (—)");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("a & \"b\""), "a &amp; &quot;b&quot;");
    }
}
