//! Luhn checksum for card-like digit sequences

/// Validate a number with the Luhn algorithm.
///
/// Spaces and dashes are ignored. Any other non-digit character, or an
/// input with no digits at all, fails validation.
pub fn luhn_valid(number: &str) -> bool {
    let mut sum = 0u32;
    let mut count = 0usize;

    for ch in number.chars().rev() {
        if ch == ' ' || ch == '-' {
            continue;
        }
        let Some(mut digit) = ch.to_digit(10) else {
            return false;
        };

        if count % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        count += 1;
    }

    count > 0 && sum % 10 == 0
}

/// True if `candidate` consists only of ASCII digits (ignoring dashes)
pub(crate) fn is_numeric_candidate(candidate: &str) -> bool {
    let mut digits = 0;
    for ch in candidate.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '-' => {}
            _ => return false,
        }
    }
    digits > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_cards() {
        assert!(luhn_valid("4532015112830366"));
        assert!(!luhn_valid("4532015112830367"));
        assert!(luhn_valid("5555555555554444"));
        assert!(luhn_valid("378282246310005"));
        assert!(luhn_valid("6011111111111117"));
    }

    #[test]
    fn test_separators_ignored() {
        assert!(luhn_valid("4532-0151-1283-0366"));
        assert!(luhn_valid("4532 0151 1283 0366"));
    }

    #[test]
    fn test_rejects_non_digits() {
        assert!(!luhn_valid(""));
        assert!(!luhn_valid("4532a15112830366"));
    }

    #[test]
    fn test_numeric_candidate() {
        assert!(is_numeric_candidate("4532015112830366"));
        assert!(is_numeric_candidate("123-45-6789"));
        assert!(!is_numeric_candidate("AKIA1234"));
        assert!(!is_numeric_candidate("-"));
    }
}
