//! HTTP request header handling implementation.
//!
//! [`RequestHeader`] wraps `http::Request<()>` and carries the connection
//! facts that proxy evidence may rewrite: the effective scheme, whether the
//! request counts as secure, the client-facing authority and the remote peer.

use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

use http::request::Parts;
use http::uri::Scheme;
use http::{Extensions, HeaderMap, HeaderValue, Method, Request, Uri, Version};

use crate::protocol::{HostPort, ParseError};

/// The address of the remote peer as the request sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddr {
    host: String,
    port: u16,
}

impl RemoteAddr {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl From<SocketAddr> for RemoteAddr {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::new(v4.ip().to_string(), v4.port()),
            SocketAddr::V6(v6) => Self::new(format!("[{}]", v6.ip()), v6.port()),
        }
    }
}

impl Display for RemoteAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
    scheme: Scheme,
    secure: bool,
    authority: Option<HostPort>,
    remote_addr: Option<RemoteAddr>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    /// Copies method, uri, version and headers into a fresh `Request<()>`.
    pub fn to_request(&self) -> Request<()> {
        let mut request = Request::new(());
        *request.method_mut() = self.inner.method().clone();
        *request.uri_mut() = self.inner.uri().clone();
        *request.version_mut() = self.inner.version();
        *request.headers_mut() = self.inner.headers().clone();
        request
    }

    /// Sets the address of the connected peer.
    #[must_use]
    pub fn with_remote_addr<A: Into<RemoteAddr>>(mut self, addr: A) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    pub fn extensions(&self) -> &Extensions {
        self.inner.extensions()
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        self.inner.extensions_mut()
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn set_scheme(&mut self, scheme: Scheme) {
        self.scheme = scheme;
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    /// The client-facing authority.
    ///
    /// An authority set through [`RequestHeader::set_authority`] wins, then the
    /// absolute request URI, then the `Host` header.
    pub fn authority(&self) -> Option<HostPort> {
        if let Some(authority) = &self.authority {
            return Some(authority.clone());
        }

        if let Some(authority) = self.inner.uri().authority() {
            return HostPort::parse(authority.as_str()).ok();
        }

        self.inner
            .headers()
            .get(http::header::HOST)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| HostPort::parse(value).ok())
    }

    /// Replaces the authority and writes it back as the `Host` header.
    pub fn set_authority(&mut self, authority: HostPort) -> Result<(), ParseError> {
        let host_value = HeaderValue::from_str(&authority.to_string()).map_err(ParseError::invalid_header)?;
        self.inner.headers_mut().insert(http::header::HOST, host_value);
        self.authority = Some(authority);
        Ok(())
    }

    pub fn remote_addr(&self) -> Option<&RemoteAddr> {
        self.remote_addr.as_ref()
    }

    pub fn set_remote_addr(&mut self, addr: RemoteAddr) {
        self.remote_addr = Some(addr);
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Request::from_parts(parts, ()).into()
    }
}

impl From<Request<()>> for RequestHeader {
    fn from(inner: Request<()>) -> Self {
        let scheme = inner.uri().scheme().cloned().unwrap_or(Scheme::HTTP);
        let secure = scheme == Scheme::HTTPS;
        Self { inner, scheme, secure, authority: None, remote_addr: None }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv6Addr, SocketAddrV6};

    use super::*;

    fn request(uri: &str, host: Option<&str>) -> RequestHeader {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(host) = host {
            builder = builder.header(http::header::HOST, host);
        }
        builder.body(()).unwrap().into()
    }

    #[test]
    fn scheme_follows_uri() {
        let header = request("/index.html", Some("127.0.0.1:8080"));
        assert_eq!(header.scheme(), &Scheme::HTTP);
        assert!(!header.is_secure());

        let header = request("https://example.com/index.html", None);
        assert_eq!(header.scheme(), &Scheme::HTTPS);
        assert!(header.is_secure());
    }

    #[test]
    fn authority_from_host_header() {
        let header = request("/index.html", Some("127.0.0.1:8080"));
        let authority = header.authority().unwrap();
        assert_eq!(authority.host(), "127.0.0.1");
        assert_eq!(authority.port(), Some(8080));
    }

    #[test]
    fn authority_prefers_absolute_uri() {
        let header = request("http://origin.example:81/", Some("other.example"));
        assert_eq!(header.authority().unwrap().host(), "origin.example");
    }

    #[test]
    fn set_authority_rewrites_host() {
        let mut header = request("/", Some("internal:8080"));
        header.set_authority(HostPort::new("public.example", Some(443))).unwrap();

        assert_eq!(header.authority().unwrap().to_string(), "public.example:443");
        assert_eq!(header.headers().get(http::header::HOST).unwrap(), "public.example:443");
    }

    #[test]
    fn remote_addr_from_socket_addr() {
        let header = request("/", None).with_remote_addr("10.0.0.1:5555".parse::<SocketAddr>().unwrap());
        assert_eq!(header.remote_addr().unwrap().to_string(), "10.0.0.1:5555");

        let v6 = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 80, 0, 0));
        let header = request("/", None).with_remote_addr(v6);
        assert_eq!(header.remote_addr().unwrap().host(), "[::1]");
    }
}
