//! Component A — Error Classifier.
//!
//! A pure function from the store engine's extended status code to one of
//! four kinds (spec §4.A). Deliberately has no knowledge of statements,
//! connections, or transactions: [`crate::db`] is the only caller.

use rusqlite::ErrorCode;

/// The four-value result kind every store-engine status collapses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// The operation completed.
    Success,
    /// Transient: busy, I/O saturation, out-of-memory in the engine, lock
    /// contention, schema change. The caller may retry.
    RuntimeError,
    /// Caller-attributable: constraint violation, malformed input, range
    /// error. Do not retry.
    UserError,
    /// Unrecoverable for this worker: corruption, interrupt, misuse,
    /// permission, read-only, internal engine error. The worker aborts.
    HardError,
}

/// Classify a single `rusqlite::Error`.
///
/// `rusqlite::Error::SqliteFailure` carries the engine's extended result
/// code; every other `rusqlite::Error` variant (type conversion failures,
/// "query returned no rows", etc.) is a programming or caller error local to
/// this process, so it classifies as [`Kind::UserError`] unless it specifically
/// indicates the connection itself is unusable.
pub fn classify(err: &rusqlite::Error) -> Kind {
    match err {
        rusqlite::Error::SqliteFailure(ffi_err, _) => classify_code(ffi_err.code),
        rusqlite::Error::QueryReturnedNoRows => Kind::UserError,
        rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::InvalidColumnIndex(_)
        | rusqlite::Error::InvalidColumnName(_)
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::InvalidParameterCount(..) => Kind::UserError,
        rusqlite::Error::ExecuteReturnedResults => Kind::HardError,
        _ => Kind::HardError,
    }
}

fn classify_code(code: ErrorCode) -> Kind {
    use ErrorCode::*;
    match code {
        // Caller-attributable: the request itself was malformed or violated
        // a constraint. Do not retry.
        ConstraintViolation | TypeMismatch | TooBig | ParameterOutOfRange => Kind::UserError,

        // Transient: another connection (or this one, recursively) holds a
        // conflicting lock, or the engine is momentarily out of a resource.
        DatabaseBusy | DatabaseLocked | OperationInterrupted | SystemIoFailure | OutOfMemory
        | SchemaChanged | DiskFull | CannotOpen | FileLockingProtocolFailed => Kind::RuntimeError,

        // Unrecoverable for this worker: the connection or the file itself
        // is no longer trustworthy.
        CorruptDatabase | NotADatabase | PermissionDenied | ReadOnly | InternalMalfunction
        | ApiMisuse | NoLargeFileSupport | OperationAborted | NotFound | Unknown => {
            Kind::HardError
        }

        _ => Kind::HardError,
    }
}

/// Classify a closing/reset call's own result, given the step's outcome.
///
/// Spec §4.A: "if the statement-reset call fails (regardless of the step
/// result), classify as `HardError`."
pub fn classify_with_reset(
    step_result: &Result<(), rusqlite::Error>,
    reset_result: &Result<(), rusqlite::Error>,
) -> Kind {
    if reset_result.is_err() {
        return Kind::HardError;
    }
    match step_result {
        Ok(()) => Kind::Success,
        Err(e) => classify(e),
    }
}

/// `check_list` — returns the first non-`Success` kind from left to right
/// across `codes`, falling back to `reset_code` if every code in `codes`
/// succeeded (spec §4.A).
pub fn check_list<'a, I>(codes: I, reset_result: &Result<(), rusqlite::Error>) -> Kind
where
    I: IntoIterator<Item = &'a Result<(), rusqlite::Error>>,
{
    for r in codes {
        if let Err(e) = r {
            let k = classify(e);
            if reset_result.is_err() {
                return Kind::HardError;
            }
            return k;
        }
    }
    if reset_result.is_err() {
        return Kind::HardError;
    }
    Kind::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_failure_always_wins() {
        let step: Result<(), rusqlite::Error> = Ok(());
        let reset: Result<(), rusqlite::Error> = Err(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(classify_with_reset(&step, &reset), Kind::HardError);
    }

    #[test]
    fn step_error_propagates_when_reset_ok() {
        let step: Result<(), rusqlite::Error> = Err(rusqlite::Error::QueryReturnedNoRows);
        let reset: Result<(), rusqlite::Error> = Ok(());
        assert_eq!(classify_with_reset(&step, &reset), Kind::UserError);
    }

    #[test]
    fn success_when_both_ok() {
        let step: Result<(), rusqlite::Error> = Ok(());
        let reset: Result<(), rusqlite::Error> = Ok(());
        assert_eq!(classify_with_reset(&step, &reset), Kind::Success);
    }

    #[test]
    fn check_list_finds_first_error() {
        let ok: Result<(), rusqlite::Error> = Ok(());
        let bad: Result<(), rusqlite::Error> = Err(rusqlite::Error::QueryReturnedNoRows);
        let reset_ok: Result<(), rusqlite::Error> = Ok(());
        let codes = vec![ok.clone(), ok.clone(), bad, ok];
        assert_eq!(check_list(codes.iter(), &reset_ok), Kind::UserError);
    }

    #[test]
    fn check_list_all_success() {
        let ok: Result<(), rusqlite::Error> = Ok(());
        let reset_ok: Result<(), rusqlite::Error> = Ok(());
        let codes = vec![ok.clone(), ok.clone()];
        assert_eq!(check_list(codes.iter(), &reset_ok), Kind::Success);
    }
}
