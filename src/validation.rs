// ✅ Submission Validation
// Runs at the entry points, before the pipeline. The core trusts its input.

use crate::error::{Result, TrackerError};

/// Longest description the store accepts
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// A submission that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub amount: f64,
    pub description: String,
}

/// Parse raw form input (amount as text)
pub fn parse_submission(amount: &str, description: &str) -> Result<Submission> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::Validation("amount is required".to_string()));
    }

    let value: f64 = trimmed
        .parse()
        .map_err(|_| TrackerError::Validation(format!("amount is not a number: {:?}", trimmed)))?;

    validate_submission(value, description)
}

/// Check an already-numeric amount and a description
pub fn validate_submission(amount: f64, description: &str) -> Result<Submission> {
    if !amount.is_finite() {
        return Err(TrackerError::Validation(
            "amount must be a finite number".to_string(),
        ));
    }
    if amount <= 0.0 {
        return Err(TrackerError::Validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }

    let description = description.trim();
    if description.is_empty() {
        return Err(TrackerError::Validation("description is required".to_string()));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(TrackerError::Validation(format!(
            "description is longer than {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }

    Ok(Submission {
        amount,
        description: description.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_submission() {
        let submission = parse_submission(" 12.50 ", "  Groceries ").unwrap();

        assert_eq!(submission.amount, 12.5);
        assert_eq!(submission.description, "Groceries");
    }

    #[test]
    fn test_rejects_bad_amounts() {
        for raw in ["", "abc", "-5", "0", "NaN", "inf"] {
            let result = parse_submission(raw, "Lunch");
            assert!(
                matches!(result, Err(TrackerError::Validation(_))),
                "{:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_rejects_bad_descriptions() {
        assert!(validate_submission(5.0, "   ").is_err());
        assert!(validate_submission(5.0, &"x".repeat(MAX_DESCRIPTION_LEN + 1)).is_err());
        assert!(validate_submission(5.0, &"x".repeat(MAX_DESCRIPTION_LEN)).is_ok());
    }
}
