use once_cell::sync::Lazy;
use regex::Regex;

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+27[0-9]{9}$").unwrap());

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// South African mobile/landline numbers in `+27XXXXXXXXX` form.
pub fn validate_phone(phone: &str) -> bool {
    PHONE_REGEX.is_match(phone)
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// `082 123 4567`, `0821234567`, `27821234567` and `+27 82 123 4567` all become `+27821234567`.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with('0') && digits.len() == 10 {
        format!("+27{}", &digits[1..])
    } else if digits.starts_with("27") && digits.len() == 11 {
        format!("+{}", digits)
    } else {
        format!("+{}", digits)
    }
}

pub fn sanitize_string(input: &str) -> String {
    input.trim().to_string()
}

/// Page size capped at 100; pages are zero-based.
pub fn page_bounds(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(20).clamp(1, 100);
    let offset = page.unwrap_or(0).max(0) * limit;
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+27821234567"));
        assert!(!validate_phone("0821234567"));
        assert!(!validate_phone("+2782123456"));
        assert!(!validate_phone("+278212345678"));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("082 123 4567"), "+27821234567");
        assert_eq!(normalize_phone("27821234567"), "+27821234567");
        assert_eq!(normalize_phone("+27 82 123 4567"), "+27821234567");
        assert!(validate_phone(&normalize_phone("(011) 555-0123")));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("test@example.com"));
        assert!(validate_email("user.name@domain.co.za"));
        assert!(!validate_email("invalid"));
        assert!(!validate_email("@example.com"));
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None), (20, 0));
        assert_eq!(page_bounds(Some(2), Some(10)), (10, 20));
        assert_eq!(page_bounds(Some(-1), Some(1000)), (100, 0));
        assert_eq!(page_bounds(Some(0), Some(0)), (1, 0));
    }
}
