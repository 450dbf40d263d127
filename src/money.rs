use std::sync::OnceLock;

use fancy_regex::Regex;

/// Rendering style behind one `{{ placeholder }}` name: decimal precision and
/// the separator pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MoneyStyle {
    precision: u32,
    thousands: &'static str,
    decimal: &'static str,
}

const AMOUNT: MoneyStyle = MoneyStyle {
    precision: 2,
    thousands: ",",
    decimal: ".",
};

fn style_for(placeholder: &str) -> MoneyStyle {
    match placeholder {
        "amount" => AMOUNT,
        "amount_no_decimals" => MoneyStyle {
            precision: 0,
            thousands: ",",
            decimal: ".",
        },
        "amount_with_comma_separator" => MoneyStyle {
            precision: 2,
            thousands: ".",
            decimal: ",",
        },
        "amount_no_decimals_with_comma_separator" => MoneyStyle {
            precision: 0,
            thousands: ".",
            decimal: ",",
        },
        "amount_with_apostrophe_separator" => MoneyStyle {
            precision: 2,
            thousands: "'",
            decimal: ".",
        },
        "amount_no_decimals_with_space_separator" => MoneyStyle {
            precision: 0,
            thousands: " ",
            decimal: ".",
        },
        "amount_with_space_separator" => MoneyStyle {
            precision: 2,
            thousands: " ",
            decimal: ",",
        },
        "amount_with_period_and_space_separator" => MoneyStyle {
            precision: 2,
            thousands: " ",
            decimal: ".",
        },
        // A price readout must never show a raw template.
        _ => AMOUNT,
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").ok())
        .as_ref()
}

/// Formats an integer count of minor currency units through an optional
/// `{{ placeholder }}` template. Without a template the plain `amount` style
/// is used: `2500` renders as `25.00`.
pub fn format_money(cents: i64, template: Option<&str>) -> String {
    let Some(template) = template else {
        return render_amount(cents, AMOUNT);
    };

    let Some(re) = placeholder_regex() else {
        return render_amount(cents, AMOUNT);
    };

    let captures = match re.captures(template) {
        Ok(Some(captures)) => captures,
        _ => return template.to_string(),
    };
    let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
        return template.to_string();
    };

    let rendered = render_amount(cents, style_for(name.as_str()));
    let mut out = String::with_capacity(template.len() + rendered.len());
    out.push_str(&template[..whole.start()]);
    out.push_str(&rendered);
    out.push_str(&template[whole.end()..]);
    out
}

fn render_amount(cents: i64, style: MoneyStyle) -> String {
    let negative = cents < 0;
    let units = cents.unsigned_abs();

    let (whole, fraction) = if style.precision == 0 {
        // Round half away from zero, matching fixed-point display rounding.
        ((units + 50) / 100, None)
    } else {
        (units / 100, Some(units % 100))
    };

    let mut out = String::new();
    if negative && (whole > 0 || fraction.map(|f| f > 0).unwrap_or(false)) {
        out.push('-');
    }
    out.push_str(&group_digits(&whole.to_string(), style.thousands));
    if let Some(fraction) = fraction {
        out.push_str(style.decimal);
        out.push_str(&format!("{fraction:02}"));
    }
    out
}

fn group_digits(digits: &str, separator: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_style_renders_two_decimals() {
        assert_eq!(format_money(2500, None), "25.00");
        assert_eq!(format_money(7, None), "0.07");
        assert_eq!(format_money(0, None), "0.00");
    }

    #[test]
    fn named_placeholders_render_each_style() {
        assert_eq!(format_money(2500, Some("{{ amount }}")), "25.00");
        assert_eq!(format_money(2500, Some("{{ amount_no_decimals }}")), "25");
        assert_eq!(
            format_money(2500, Some("{{ amount_with_comma_separator }}")),
            "25,00"
        );
        assert_eq!(
            format_money(1234500, Some("{{ amount_no_decimals_with_comma_separator }}")),
            "12.345"
        );
        assert_eq!(
            format_money(1234500, Some("{{ amount_with_apostrophe_separator }}")),
            "12'345.00"
        );
        assert_eq!(
            format_money(1234500, Some("{{ amount_no_decimals_with_space_separator }}")),
            "12 345"
        );
        assert_eq!(
            format_money(1234500, Some("{{ amount_with_space_separator }}")),
            "12 345,00"
        );
        assert_eq!(
            format_money(1234500, Some("{{ amount_with_period_and_space_separator }}")),
            "12 345.00"
        );
    }

    #[test]
    fn template_text_around_placeholder_is_preserved() {
        assert_eq!(format_money(2500, Some("${{ amount }} CAD")), "$25.00 CAD");
        assert_eq!(format_money(2500, Some("€{{amount_with_comma_separator}}")), "€25,00");
    }

    #[test]
    fn unknown_placeholder_falls_back_to_amount() {
        assert_eq!(format_money(2500, Some("{{ amount_in_drachmas }}")), "25.00");
    }

    #[test]
    fn template_without_placeholder_is_returned_verbatim() {
        assert_eq!(format_money(2500, Some("free")), "free");
    }

    #[test]
    fn grouping_covers_long_amounts() {
        assert_eq!(format_money(123456789, None), "1,234,567.89");
        assert_eq!(
            format_money(100000000000, Some("{{ amount_no_decimals }}")),
            "1,000,000,000"
        );
    }

    #[test]
    fn no_decimals_rounds_half_away_from_zero() {
        assert_eq!(format_money(2550, Some("{{ amount_no_decimals }}")), "26");
        assert_eq!(format_money(2549, Some("{{ amount_no_decimals }}")), "25");
    }

    #[test]
    fn negative_amounts_keep_the_sign() {
        assert_eq!(format_money(-2500, None), "-25.00");
        assert_eq!(format_money(-2500, Some("{{ amount_no_decimals }}")), "-25");
    }
}
