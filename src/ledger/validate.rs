use crate::error::FieldErrors;
use crate::money::Money;

/// Loose shape check: something before an `@`, and a dotted domain after it.
pub fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

/// Trim free text; blank becomes `None`.
pub(crate) fn clean(text: Option<String>) -> Option<String> {
    text.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub(crate) fn non_negative(errors: &mut FieldErrors, field: &'static str, value: Money) {
    if value.is_negative() {
        errors.push(field, "must not be negative");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(looks_like_email("arta@example.com"));
        assert!(looks_like_email("a.b+c@mail.co.uk"));
        for bad in ["", "arta", "@example.com", "arta@", "arta@example", "a b@x.io", "a@b@c.io", "a@.io"] {
            assert!(!looks_like_email(bad), "accepted {bad:?}");
        }
    }

    #[test]
    fn clean_drops_blank_text() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" note ".into())), Some("note".into()));
        assert_eq!(clean(None), None);
    }
}
