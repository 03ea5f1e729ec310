use anyhow::Error;
use steelproc::prelude::SteelError;

/// Process exit code for an error.
///
/// 2: invalid input or operation not allowed in the current state,
/// 3: server or transport failure, 1: anything else.
pub fn exit_code(err: &Error) -> i32 {
    match err.downcast_ref::<SteelError>() {
        Some(SteelError::Validation { .. } | SteelError::Precondition { .. }) => 2,
        Some(SteelError::Remote { .. }) => 3,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = Error::new(SteelError::Validation {
            message: "All fields are required".into(),
        });
        assert_eq!(exit_code(&err), 2);
        let err = Error::new(SteelError::Precondition {
            message: "No report available".into(),
        });
        assert_eq!(exit_code(&err), 2);
        let err = Error::new(SteelError::Remote {
            operation: "process".into(),
            message: "Failed to process database".into(),
            status: Some(500),
            raw_detail: None,
        });
        assert_eq!(exit_code(&err), 3);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
