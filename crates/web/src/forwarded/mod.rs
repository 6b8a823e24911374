//! Resolution of the client-facing request from proxy headers.
//!
//! Proxies report the original request through the structured `Forwarded`
//! header (RFC 7239) and a family of legacy headers (`X-Forwarded-Host`,
//! `X-Forwarded-For`, `X-Forwarded-Port`, `X-Forwarded-Proto`,
//! `X-Forwarded-Server`, `X-Proxied-Https`) plus TLS evidence headers. The
//! [`ForwardedCustomizer`] reconciles them by [`Priority`] into the request's
//! scheme, authority and remote address.

mod authority;
mod config;
mod context;
mod customizer;
mod handler;

pub use authority::AuthorityCandidate;
pub use authority::Priority;
pub use config::ForwardedConfig;
pub use context::ForwardedContext;
pub use customizer::Customizer;
pub use customizer::ForwardedCipherSuite;
pub use customizer::ForwardedCustomizer;
pub use customizer::ForwardedHeader;
pub use customizer::ForwardedSslSessionId;
pub use customizer::HandlerTable;
pub use handler::ForwardedDecorator;
pub use handler::ForwardedHandler;
