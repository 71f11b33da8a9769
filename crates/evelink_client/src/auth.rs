//! Authorization capability.
//!
//! The client does not implement authentication schemes. An [`Authenticator`]
//! only produces the value of the `Authorization` header, which is asked for
//! again on every request so credentials can rotate.

use std::fmt;

/// Produces the `Authorization` header value for outgoing requests.
pub trait Authenticator: Send + Sync {
    /// The full header value, scheme included (e.g. `Bearer <token>`).
    fn authorization(&self) -> String;
}

impl<F> Authenticator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn authorization(&self) -> String {
        self()
    }
}

/// A fixed, pre-formatted header value.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticAuthorization {
    value: String,
}

impl StaticAuthorization {
    /// Wraps a header value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Authenticator for StaticAuthorization {
    fn authorization(&self) -> String {
        self.value.clone()
    }
}

impl fmt::Debug for StaticAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Credentials stay out of logs.
        f.debug_struct("StaticAuthorization")
            .field("value", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn static_value() {
        let auth = StaticAuthorization::new("Basic dXNlcjpwYXNz");
        assert_eq!(auth.authorization(), "Basic dXNlcjpwYXNz");
        assert!(!format!("{auth:?}").contains("dXNlcjpwYXNz"));
    }

    #[test]
    fn closure_is_asked_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let auth = move || format!("Bearer t{}", counter.fetch_add(1, Ordering::SeqCst));

        assert_eq!(auth.authorization(), "Bearer t0");
        assert_eq!(auth.authorization(), "Bearer t1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
