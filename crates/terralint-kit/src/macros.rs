#[macro_export]
macro_rules! diagnosed_error {
    ($($arg:tt)*) => {{
        use $crate::types::diagnostics::Diagnostic;

        let res = format_args!($($arg)*).to_string();
        Diagnostic::error_from_string(res)
    }};
}
