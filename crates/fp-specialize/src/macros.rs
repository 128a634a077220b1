/// Return early from a rule body with a raised condition.
///
/// `raise!("ArithmeticException", "integer overflow in {}", name)`
#[macro_export]
macro_rules! raise {
    ($kind:expr) => {
        return Err($crate::error::Raised::Condition($crate::error::Condition::new(
            $kind,
            String::new(),
        )))
    };
    ($kind:expr, $($arg:tt)*) => {
        return Err($crate::error::Raised::Condition($crate::error::Condition::new(
            $kind,
            format!($($arg)*),
        )))
    };
}

/// Return early with a generic error
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Generic(format!($($arg)*)).into())
    };
}

/// Record a declaration error against an element of the node being validated
#[macro_export]
macro_rules! declare_error {
    ($errors:expr, $context:expr, $code:expr, $($arg:tt)*) => {
        $errors.push(
            $crate::diagnostics::Diagnostic::error(format!($($arg)*))
                .with_source_context($context.to_string())
                .with_code($code),
        )
    };
}
