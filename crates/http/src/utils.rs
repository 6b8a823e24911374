/// Returns early with `$error` unless `$predicate` holds.
///
/// ```ignore
/// ensure!(!authority.is_empty(), ParseError::invalid_host_port(authority, "empty authority"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
