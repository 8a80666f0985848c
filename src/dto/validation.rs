//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a team identifier or name carries visible text.
///
/// # Examples
///
/// ```ignore
/// validate_team_field("Rocket Llamas") // Ok
/// validate_team_field("   ")           // Err - blank
/// validate_team_field("Owls\n")        // Err - control character
/// ```
pub fn validate_team_field(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("team_field_blank");
        err.message = Some("Team fields must not be blank".into());
        return Err(err);
    }

    if value.chars().any(char::is_control) {
        let mut err = ValidationError::new("team_field_format");
        err.message = Some("Team fields must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_team_field_valid() {
        assert!(validate_team_field("Rocket Llamas").is_ok());
        assert!(validate_team_field("42").is_ok());
        assert!(validate_team_field("Équipe Été").is_ok());
    }

    #[test]
    fn test_validate_team_field_blank() {
        assert!(validate_team_field("").is_err());
        assert!(validate_team_field("   ").is_err());
        assert!(validate_team_field("\t").is_err());
    }

    #[test]
    fn test_validate_team_field_control_characters() {
        assert!(validate_team_field("Owls\n").is_err());
        assert!(validate_team_field("a\u{0007}b").is_err());
    }
}
