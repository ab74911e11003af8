//! Display helpers shared by the CLI tables, CSV rows and PDF documents.

use chrono::NaiveDate;

use crate::money::Money;

pub fn format_grouped_int(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    let mut grouped: String = out.chars().rev().collect();
    if negative {
        grouped.insert(0, '-');
    }
    grouped
}

/// `€71,725.00`
pub fn format_money(value: Money, currency_symbol: &str) -> String {
    let sign = if value.is_negative() { "-" } else { "" };
    let abs = value.minor().unsigned_abs();
    format!(
        "{}{}{}.{:02}",
        sign,
        currency_symbol,
        format_grouped_int((abs / 100) as i64),
        abs % 100
    )
}

/// Whole units, right-aligned for table columns: `€ 1,250`
pub fn format_whole_money(value: Money, currency_symbol: &str) -> String {
    let grouped = format_grouped_int(value.round_major());
    format!("{}{:>6}", currency_symbol, grouped)
}

/// Render a date with `dd`, `MM` and `yyyy` tokens (case-insensitive).
pub fn format_date(date: NaiveDate, pattern: &str) -> String {
    pattern
        .to_lowercase()
        .replace("yyyy", &date.format("%Y").to_string())
        .replace("dd", &date.format("%d").to_string())
        .replace("mm", &date.format("%m").to_string())
}

pub fn format_opt_date(date: Option<NaiveDate>, pattern: &str) -> String {
    date.map(|d| format_date(d, pattern))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_grouped_int(0), "0");
        assert_eq!(format_grouped_int(999), "999");
        assert_eq!(format_grouped_int(71_725), "71,725");
        assert_eq!(format_grouped_int(-1_234_567), "-1,234,567");
    }

    #[test]
    fn money_keeps_cents() {
        assert_eq!(format_money(Money::from_minor(7_172_550), "€"), "€71,725.50");
        assert_eq!(format_money(Money::from_minor(-5), "$"), "-$0.05");
        assert_eq!(format_whole_money(Money::from_major(1250), "$"), "$ 1,250");
    }

    #[test]
    fn date_tokens() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(format_date(d, "dd/MM/yyyy"), "07/03/2024");
        assert_eq!(format_date(d, "YYYY-MM-DD"), "2024-03-07");
        assert_eq!(format_opt_date(None, "dd/MM/yyyy"), "-");
    }
}
