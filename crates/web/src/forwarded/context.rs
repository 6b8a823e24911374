use http::uri::Scheme;

use crate::forwarded::{AuthorityCandidate, Priority};

/// Evidence collected from one request's headers before it is applied.
#[derive(Debug, Default)]
pub struct ForwardedContext {
    authority: AuthorityCandidate,
    forwarded_for: AuthorityCandidate,
    proto: Option<Scheme>,
    proto_priority: Option<Priority>,
    cipher_suite: Option<String>,
    ssl_session_id: Option<String>,
}

impl ForwardedContext {
    pub fn authority(&self) -> &AuthorityCandidate {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut AuthorityCandidate {
        &mut self.authority
    }

    pub fn forwarded_for(&self) -> &AuthorityCandidate {
        &self.forwarded_for
    }

    pub fn forwarded_for_mut(&mut self) -> &mut AuthorityCandidate {
        &mut self.forwarded_for
    }

    pub fn proto(&self) -> Option<&Scheme> {
        self.proto.as_ref()
    }

    pub fn update_proto(&mut self, proto: Scheme, priority: Priority) {
        if self.proto_priority.is_none_or(|current| priority > current) {
            self.proto = Some(proto);
            self.proto_priority = Some(priority);
        }
    }

    pub fn record_cipher_suite<S: Into<String>>(&mut self, cipher_suite: S) {
        self.cipher_suite = Some(cipher_suite.into());
    }

    pub fn record_ssl_session_id<S: Into<String>>(&mut self, ssl_session_id: S) {
        self.ssl_session_id = Some(ssl_session_id.into());
    }

    /// Whether a TLS-terminating proxy left evidence of the original connection.
    pub fn has_tls_evidence(&self) -> bool {
        self.cipher_suite.is_some() || self.ssl_session_id.is_some()
    }

    pub(crate) fn take_cipher_suite(&mut self) -> Option<String> {
        self.cipher_suite.take()
    }

    pub(crate) fn take_ssl_session_id(&mut self) -> Option<String> {
        self.ssl_session_id.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_follows_priority() {
        let mut context = ForwardedContext::default();
        context.update_proto(Scheme::HTTP, Priority::X_PROXIED_HTTPS);
        context.update_proto(Scheme::HTTPS, Priority::FORWARDED);
        context.update_proto(Scheme::HTTP, Priority::X_FORWARDED_PROTO);

        assert_eq!(context.proto(), Some(&Scheme::HTTPS));
    }

    #[test]
    fn tls_evidence() {
        let mut context = ForwardedContext::default();
        assert!(!context.has_tls_evidence());

        context.record_ssl_session_id("0123abcd");
        assert!(context.has_tls_evidence());
        assert_eq!(context.take_ssl_session_id().as_deref(), Some("0123abcd"));
    }
}
