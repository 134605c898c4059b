use crate::{Error, Result};

/// Decides what the [`Client`](crate::Client) does with errors that are not fatal to it, such as
/// requests for an experiment key that is not in the datafile.
///
/// Returning `Ok(())` swallows the error and the client carries on as if no variation was
/// assigned. Returning `Err` makes the client method return that error.
pub trait ErrorHandler {
    fn handle_error(&self, error: Error) -> Result<()>;
}

/// Swallows every error. This is the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpErrorHandler;

impl ErrorHandler for NoOpErrorHandler {
    fn handle_error(&self, _error: Error) -> Result<()> {
        Ok(())
    }
}

/// Propagates every error to the caller. Useful in development and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct RaiseErrorHandler;

impl ErrorHandler for RaiseErrorHandler {
    fn handle_error(&self, error: Error) -> Result<()> {
        Err(error)
    }
}

impl<T: Fn(Error) -> Result<()>> ErrorHandler for T {
    fn handle_error(&self, error: Error) -> Result<()> {
        self(error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::{ErrorHandler, NoOpErrorHandler, RaiseErrorHandler};
    use crate::{Error, Result};

    #[test]
    fn noop_swallows() {
        assert!(NoOpErrorHandler
            .handle_error(Error::UnknownExperiment("nope".to_owned()))
            .is_ok());
    }

    #[test]
    fn raise_propagates() {
        let result = RaiseErrorHandler.handle_error(Error::UnknownEventType("nope".to_owned()));

        assert!(matches!(result, Err(Error::UnknownEventType(key)) if key == "nope"));
    }

    #[test]
    fn closure_handler() {
        let seen = Mutex::new(Vec::new());
        let handler = |error: Error| -> Result<()> {
            seen.lock().unwrap().push(error.to_string());
            Ok(())
        };

        handler
            .handle_error(Error::UnknownExperiment("a".to_owned()))
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![r#"experiment "a" is not in the datafile"#.to_owned()]
        );
    }
}
