//! Result type alias for the relay

use super::errors::RelayError;

/// Result type alias for relay operations
///
/// # Examples
///
/// ```
/// use interop_relay::domain::result::Result;
/// use interop_relay::domain::errors::RelayError;
///
/// fn failing_function() -> Result<()> {
///     Err(RelayError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(RelayError::Validation("test error".to_string()));
        assert!(result.is_err());
    }
}
