//! Invoice numbers from a template such as `YYYYMM-####`.

use chrono::NaiveDate;

use crate::error::{LedgerError, Result};

/// How many candidates are tried before giving up on a free number.
pub const MAX_NUMBER_ATTEMPTS: usize = 5;

const DEFAULT_WIDTH: usize = 4;

/// A template with its date tokens applied: `prefix` + zero-padded sequence + `suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberPattern {
    prefix: String,
    width: usize,
    suffix: String,
}

impl NumberPattern {
    /// Replace `YYYY`, `MM`, `DD` with the date, then split on the first run
    /// of `#`. Without one, a four-digit sequence is appended.
    pub fn for_date(template: &str, date: NaiveDate) -> Self {
        let applied = template
            .replace("YYYY", &date.format("%Y").to_string())
            .replace("MM", &date.format("%m").to_string())
            .replace("DD", &date.format("%d").to_string());

        match applied.find('#') {
            Some(start) => {
                let width = applied[start..].chars().take_while(|&c| c == '#').count();
                Self {
                    prefix: applied[..start].to_string(),
                    width,
                    suffix: applied[start + width..].to_string(),
                }
            }
            None => Self {
                prefix: applied,
                width: DEFAULT_WIDTH,
                suffix: String::new(),
            },
        }
    }

    pub fn format(&self, seq: u64) -> String {
        format!(
            "{}{:0width$}{}",
            self.prefix,
            seq,
            self.suffix,
            width = self.width
        )
    }

    /// The sequence embedded in `number`, if it was produced by this pattern.
    pub fn sequence_of(&self, number: &str) -> Option<u64> {
        let middle = number
            .strip_prefix(&self.prefix)?
            .strip_suffix(&self.suffix)?;
        if middle.is_empty() || !middle.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        middle.parse().ok()
    }

    /// One past the highest sequence among `existing`.
    pub fn next_sequence<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> Result<u64> {
        let highest = existing
            .into_iter()
            .filter_map(|n| self.sequence_of(n))
            .max()
            .unwrap_or(0);
        highest
            .checked_add(1)
            .ok_or_else(|| LedgerError::InvoiceSequenceOverflow(self.format(highest)))
    }

    /// First free number starting at `seq`, bumping the sequence on each
    /// collision for at most [`MAX_NUMBER_ATTEMPTS`] tries.
    pub fn claim(&self, mut seq: u64, is_taken: impl Fn(&str) -> bool) -> Result<String> {
        let mut candidate = self.format(seq);
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
            if attempt == MAX_NUMBER_ATTEMPTS {
                break;
            }
            tracing::debug!(number = %candidate, "invoice number taken, bumping sequence");
            seq = seq
                .checked_add(1)
                .ok_or_else(|| LedgerError::InvoiceSequenceOverflow(candidate.clone()))?;
            candidate = self.format(seq);
        }
        Err(LedgerError::InvoiceNumberExhausted {
            attempts: MAX_NUMBER_ATTEMPTS,
            last: candidate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn march() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn default_template() {
        let p = NumberPattern::for_date("YYYYMM-####", march());
        assert_eq!(p.format(1), "202403-0001");
        assert_eq!(p.format(12_345), "202403-12345");
    }

    #[test]
    fn template_with_suffix_and_day() {
        let p = NumberPattern::for_date("F-YYYY-DD/###/K", march());
        assert_eq!(p.format(7), "F-2024-09/007/K");
        assert_eq!(p.sequence_of("F-2024-09/042/K"), Some(42));
        assert_eq!(p.sequence_of("F-2024-09/042"), None);
    }

    #[test]
    fn template_without_hashes_appends_sequence() {
        let p = NumberPattern::for_date("INV-YYYY-", march());
        assert_eq!(p.format(3), "INV-2024-0003");
    }

    #[test]
    fn next_sequence_ignores_other_prefixes() {
        let p = NumberPattern::for_date("YYYYMM-####", march());
        let existing = ["202403-0001", "202403-0009", "202402-0040", "custom", "202403-x1"];
        assert_eq!(p.next_sequence(existing).unwrap(), 10);
        assert_eq!(p.next_sequence([]).unwrap(), 1);
    }

    #[test]
    fn sequence_at_u64_max_is_an_error() {
        let p = NumberPattern::for_date("YYYYMM-####", march());
        let top = format!("202403-{}", u64::MAX);
        assert!(matches!(
            p.next_sequence([top.as_str()]),
            Err(LedgerError::InvoiceSequenceOverflow(last)) if last == top
        ));
        assert!(matches!(
            p.claim(u64::MAX, |_| true),
            Err(LedgerError::InvoiceSequenceOverflow(_))
        ));
    }

    #[test]
    fn claim_bumps_past_taken_numbers() {
        let p = NumberPattern::for_date("YYYYMM-####", march());
        let taken = ["202403-0004", "202403-0005"];
        let n = p.claim(4, |c| taken.contains(&c)).unwrap();
        assert_eq!(n, "202403-0006");
    }

    #[test]
    fn claim_gives_up_after_bounded_attempts() {
        let p = NumberPattern::for_date("YYYYMM-####", march());
        match p.claim(1, |_| true) {
            Err(LedgerError::InvoiceNumberExhausted { attempts, last }) => {
                assert_eq!(attempts, MAX_NUMBER_ATTEMPTS);
                assert_eq!(last, "202403-0005");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }
}
