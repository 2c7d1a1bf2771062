use opgate_core::{Error, ErrorCode};

/// Decides whether a failed operation counts against its circuit.
///
/// Only failures that say something about the downstream's health trip the
/// breaker: transport errors, 5xx responses and errors nobody classified.
/// Local rejections, caller cancellations and 4xx responses are neutral.
pub fn should_trip_circuit(err: &Error) -> bool {
    if err.is_gating() {
        return false;
    }
    if err.context_error().is_some() {
        return false;
    }

    match err {
        Error::Api(api) => {
            if api.code == ErrorCode::Network {
                return true;
            }
            matches!(api.http_status, Some(status) if status >= 500)
        }
        _ => true,
    }
}
