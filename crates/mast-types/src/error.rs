//! Unified error-code interface.
//!
//! Every error type in the workspace implements [`ErrorCode`] so the
//! protocol layer can put a stable, machine-readable code into an Error
//! reply without matching on concrete error enums. Codes form the wire
//! contract: once published they do not change.

/// Machine-readable error code interface.
///
/// # Code format
///
/// - UPPER_SNAKE_CASE (`NOT_FOUND`, `TYPE_MISMATCH`)
/// - stable across versions — changing a code is a breaking change
///
/// # Recoverability
///
/// `is_recoverable` tells a gateway whether retrying the same request can
/// ever succeed. A vetoed write may pass later (hooks see machine state);
/// a type mismatch never will.
///
/// # Example
///
/// ```
/// use mast_types::ErrorCode;
///
/// enum AxisError {
///     Missing,
///     Busy,
/// }
///
/// impl ErrorCode for AxisError {
///     fn code(&self) -> &'static str {
///         match self {
///             Self::Missing => "NOT_FOUND",
///             Self::Busy => "VETOED",
///         }
///     }
///
///     fn is_recoverable(&self) -> bool {
///         matches!(self, Self::Busy)
///     }
/// }
///
/// assert_eq!(AxisError::Missing.code(), "NOT_FOUND");
/// assert!(AxisError::Busy.is_recoverable());
/// ```
pub trait ErrorCode {
    /// Returns the stable machine-readable code for this error.
    fn code(&self) -> &'static str;

    /// Returns whether retrying the failed operation may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error's code is well-formed.
///
/// Checks the code is non-empty UPPER_SNAKE_CASE. Intended for use in
/// each crate's tests over all enum variants.
///
/// # Panics
///
/// Panics with a descriptive message when the code is malformed.
pub fn assert_error_code<E: ErrorCode>(err: &E) {
    let code = err.code();
    assert!(!code.is_empty(), "error code must not be empty");
    assert!(
        is_upper_snake_case(code),
        "error code '{code}' must be UPPER_SNAKE_CASE"
    );
}

/// Asserts that every error in a slice has a well-formed code.
///
/// # Example
///
/// ```
/// use mast_types::{assert_error_codes, ErrorCode};
///
/// enum E { A, B }
/// impl ErrorCode for E {
///     fn code(&self) -> &'static str {
///         match self { E::A => "NOT_FOUND", E::B => "OUT_OF_RANGE" }
///     }
///     fn is_recoverable(&self) -> bool { false }
/// }
///
/// assert_error_codes(&[E::A, E::B]);
/// ```
pub fn assert_error_codes<E: ErrorCode>(errors: &[E]) {
    for err in errors {
        assert_error_code(err);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && !s.ends_with('_')
        && !s.contains("__")
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum Sample {
        Gone,
        Held,
    }

    impl ErrorCode for Sample {
        fn code(&self) -> &'static str {
            match self {
                Self::Gone => "NOT_FOUND",
                Self::Held => "VETOED",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Held)
        }
    }

    #[test]
    fn trait_surface() {
        assert_eq!(Sample::Gone.code(), "NOT_FOUND");
        assert!(!Sample::Gone.is_recoverable());
        assert!(Sample::Held.is_recoverable());
    }

    #[test]
    fn all_variants_validate() {
        assert_error_codes(&[Sample::Gone, Sample::Held]);
    }

    #[test]
    fn snake_case_check() {
        assert!(is_upper_snake_case("NOT_FOUND"));
        assert!(is_upper_snake_case("ERR_2"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("not_found"));
        assert!(!is_upper_snake_case("_X"));
        assert!(!is_upper_snake_case("X_"));
        assert!(!is_upper_snake_case("A__B"));
    }
}
