//! Input limits for statements and value generators

/// Maximum repeat count accepted by `Times <n>` (9,999,999)
pub const MAX_REPEAT_COUNT: u32 = 9_999_999;

/// Maximum length accepted by `Text <n>` (100 chars)
pub const MAX_GENERATED_TEXT_LEN: u64 = 100;

/// Length bound used by a bare `Text` (10 chars)
pub const DEFAULT_GENERATED_TEXT_LEN: u64 = 10;

/// Maximum bound accepted by `Integer <n>`
pub const MAX_GENERATED_INTEGER: u64 = 99_999_999;

/// Maximum whole-part bound accepted by `Decimal <n>`
pub const MAX_GENERATED_DECIMAL: u64 = 999_999;

/// Whole-part bound used by a bare `Decimal`
pub const DEFAULT_GENERATED_DECIMAL: u64 = 9_999_999;

/// Fraction bound used by every generated decimal
pub const GENERATED_DECIMAL_FRACTION: u64 = 99;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    RepeatCountTooLarge { count: u64, max: u32 },
    RepeatCountZero,
    RepeatKeywordRepeated,
    RepeatCountMissing,
    InvalidRepeatCount(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RepeatCountTooLarge { max, .. } => {
                write!(f, "Only {} iterations are allowed.", group_thousands(*max))
            }
            Self::RepeatCountZero => write!(f, "The Times keyword requires at least 1 iteration."),
            Self::RepeatKeywordRepeated => {
                write!(f, "The Times keyword can only be used once in a statement.")
            }
            Self::RepeatCountMissing => write!(
                f,
                "The Times keyword must end the statement and be followed by a number of iterations."
            ),
            Self::InvalidRepeatCount(raw) => write!(f, "Invalid number of iterations: {}.", raw),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a repeat count given as decimal digits
pub fn validate_repeat_count(digits: &str) -> Result<u32, ValidationError> {
    // Digit runs longer than u64 are still "too large", not malformed.
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) && digits.len() > 19 {
        return Err(ValidationError::RepeatCountTooLarge {
            count: u64::MAX,
            max: MAX_REPEAT_COUNT,
        });
    }
    let count: u64 = digits
        .parse()
        .map_err(|_| ValidationError::InvalidRepeatCount(digits.to_string()))?;
    if count == 0 {
        return Err(ValidationError::RepeatCountZero);
    }
    if count > u64::from(MAX_REPEAT_COUNT) {
        return Err(ValidationError::RepeatCountTooLarge {
            count,
            max: MAX_REPEAT_COUNT,
        });
    }
    Ok(count as u32)
}

fn group_thousands(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_repeat_count() {
        assert_eq!(validate_repeat_count("1"), Ok(1));
        assert_eq!(validate_repeat_count("9999999"), Ok(9_999_999));
        assert_eq!(
            validate_repeat_count("0"),
            Err(ValidationError::RepeatCountZero)
        );
        assert!(validate_repeat_count("10000000").is_err());
        assert!(validate_repeat_count("123456789012345678901234").is_err());
        assert!(validate_repeat_count("12a").is_err());
    }

    #[test]
    fn test_too_large_message() {
        let err = validate_repeat_count("10000000").unwrap_err();
        assert_eq!(err.to_string(), "Only 9,999,999 iterations are allowed.");
    }
}
