use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use edge_http::protocol::{CsvElement, HostPort, ParseError, QuotedCsv, RemoteAddr, RequestHeader, parse_port};
use http::uri::Scheme;
use http::{HeaderName, HeaderValue};
use tracing::{trace, warn};

use crate::ConfigError;
use crate::forwarded::{ForwardedConfig, ForwardedContext, Priority};

/// Rewrites a request header before it is handled.
pub trait Customizer: Send + Sync {
    fn customize(&self, req: &mut RequestHeader) -> Result<(), ParseError>;
}

/// The value of the cipher-suite header left by a TLS-terminating proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedCipherSuite(pub String);

/// The value of the ssl-session-id header left by a TLS-terminating proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedSslSessionId(pub String);

/// The role a configured header name plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardedHeader {
    Forwarded,
    Host,
    Server,
    For,
    Port,
    Proto,
    Https,
    CipherSuite,
    SslSessionId,
}

/// Header name to role lookup, built from a [`ForwardedConfig`].
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<HeaderName, ForwardedHeader>,
}

impl HandlerTable {
    pub fn build(config: &ForwardedConfig) -> Result<Self, ConfigError> {
        let entries = [
            (config.forwarded_header(), ForwardedHeader::Forwarded),
            (config.forwarded_host_header(), ForwardedHeader::Host),
            (config.forwarded_for_header(), ForwardedHeader::For),
            (config.forwarded_port_header(), ForwardedHeader::Port),
            (config.forwarded_proto_header(), ForwardedHeader::Proto),
            (config.forwarded_https_header(), ForwardedHeader::Https),
            (config.forwarded_server_header(), ForwardedHeader::Server),
            (config.forwarded_cipher_suite_header(), ForwardedHeader::CipherSuite),
            (config.forwarded_ssl_session_id_header(), ForwardedHeader::SslSessionId),
        ];

        let mut handlers = HashMap::with_capacity(entries.len());
        for (name, kind) in entries {
            let Some(name) = name else { continue };
            let header_name = HeaderName::try_from(name).map_err(|e| ConfigError::invalid_header_name(name, e))?;
            if let Some(previous) = handlers.insert(header_name, kind) {
                warn!(header = name, ?previous, current = ?kind, "header configured twice, the later role wins");
            }
        }
        Ok(Self { handlers })
    }

    #[inline]
    pub fn get(&self, name: &HeaderName) -> Option<ForwardedHeader> {
        self.handlers.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[derive(Debug)]
struct Settings {
    config: ForwardedConfig,
    table: HandlerTable,
    forced_host: Option<HostPort>,
    secure_scheme: Scheme,
}

impl Settings {
    fn new(config: ForwardedConfig) -> Result<Self, ConfigError> {
        let table = HandlerTable::build(&config)?;
        let forced_host = config
            .forced_host()
            .map(|value| HostPort::parse(value).map_err(|e| ConfigError::invalid_forced_host(value, e)))
            .transpose()?;
        let secure_scheme = config
            .secure_scheme()
            .parse::<Scheme>()
            .map_err(|_e| ConfigError::invalid_scheme(config.secure_scheme()))?;
        Ok(Self { config, table, forced_host, secure_scheme })
    }
}

/// Resolves the client-facing scheme, authority and remote address from
/// proxy headers.
///
/// All configured headers are consumed in one pass. Host, port and scheme
/// are each taken from the most trusted source present (see [`Priority`]).
/// The settings can be replaced at runtime with [`ForwardedCustomizer::update`];
/// requests in flight keep the snapshot they started with.
#[derive(Debug)]
pub struct ForwardedCustomizer {
    settings: ArcSwap<Settings>,
}

impl ForwardedCustomizer {
    pub fn new(config: ForwardedConfig) -> Result<Self, ConfigError> {
        Ok(Self { settings: ArcSwap::from_pointee(Settings::new(config)?) })
    }

    pub fn config(&self) -> ForwardedConfig {
        self.settings.load().config.clone()
    }

    pub fn update(&self, config: ForwardedConfig) -> Result<(), ConfigError> {
        self.settings.store(Arc::new(Settings::new(config)?));
        Ok(())
    }

    /// Derives a new configuration from the current one and installs it.
    pub fn reconfigure<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(ForwardedConfig) -> ForwardedConfig,
    {
        self.update(f(self.config()))
    }

    fn collect(&self, settings: &Settings, req: &RequestHeader, context: &mut ForwardedContext) -> Result<(), ParseError> {
        for (name, value) in req.headers() {
            let Some(kind) = settings.table.get(name) else {
                continue;
            };

            if let Err(e) = handle_header(kind, value, &settings.config, context) {
                warn!(header = %name, cause = %e, "bad forwarded header");
                return Err(ParseError::bad_proxy_header(name, e));
            }
        }
        Ok(())
    }
}

impl Customizer for ForwardedCustomizer {
    fn customize(&self, req: &mut RequestHeader) -> Result<(), ParseError> {
        let settings = self.settings.load();

        let mut context = ForwardedContext::default();
        if let Some(forced_host) = &settings.forced_host {
            context.authority_mut().set_host_port(forced_host, Priority::FORCED);
        } else if let Some(authority) = req.authority() {
            context.authority_mut().set_host_port(&authority, Priority::REQUEST);
        }

        let collected = self.collect(&settings, req, &mut context);
        let tls_evidence = context.has_tls_evidence();
        apply_tls_evidence(&settings, req, &mut context);
        collected?;

        if let Some(proto) = context.proto() {
            if proto.as_str().eq_ignore_ascii_case(settings.secure_scheme.as_str()) {
                req.set_secure(true);
            }
            if !(tls_evidence && settings.config.ssl_is_secure()) {
                req.set_scheme(proto.clone());
            }
        }

        if let Some(authority) = context.authority().to_host_port() {
            req.set_authority(authority)?;
        }

        if let Some(host) = context.forwarded_for().host() {
            let port = context
                .forwarded_for()
                .port()
                .or_else(|| req.remote_addr().map(RemoteAddr::port))
                .unwrap_or_default();
            req.set_remote_addr(RemoteAddr::new(host, port));
        }

        trace!(
            scheme = %req.scheme(),
            secure = req.is_secure(),
            authority = ?req.authority(),
            remote_addr = ?req.remote_addr(),
            "resolved forwarded request"
        );
        Ok(())
    }
}

/// Records proxy TLS evidence on the request. This happens even when a later
/// header turns out to be malformed.
fn apply_tls_evidence(settings: &Settings, req: &mut RequestHeader, context: &mut ForwardedContext) {
    let tls_evidence = context.has_tls_evidence();

    if let Some(cipher_suite) = context.take_cipher_suite() {
        req.extensions_mut().insert(ForwardedCipherSuite(cipher_suite));
    }
    if let Some(ssl_session_id) = context.take_ssl_session_id() {
        req.extensions_mut().insert(ForwardedSslSessionId(ssl_session_id));
    }

    if tls_evidence && settings.config.ssl_is_secure() {
        req.set_secure(true);
        req.set_scheme(settings.secure_scheme.clone());
    }
}

fn handle_header(
    kind: ForwardedHeader,
    value: &HeaderValue,
    config: &ForwardedConfig,
    context: &mut ForwardedContext,
) -> Result<(), ParseError> {
    match kind {
        ForwardedHeader::CipherSuite => {
            context.record_cipher_suite(latin1(value));
            return Ok(());
        }
        ForwardedHeader::SslSessionId => {
            context.record_ssl_session_id(latin1(value));
            return Ok(());
        }
        _ => {}
    }

    let value = value.to_str().map_err(ParseError::invalid_header)?;

    match kind {
        ForwardedHeader::Forwarded => {
            for element in QuotedCsv::parse(value)? {
                handle_forwarded_element(&element, config, context)?;
            }
        }
        ForwardedHeader::Host => {
            if let Some(host) = left_most(value) {
                context.authority_mut().set_host_port(&HostPort::parse(host)?, Priority::X_FORWARDED_HOST);
            }
        }
        ForwardedHeader::Server => {
            if !config.proxy_as_authority() {
                return Ok(());
            }
            if let Some(server) = left_most(value) {
                context.authority_mut().set_host_port(&HostPort::parse(server)?, Priority::X_FORWARDED_SERVER);
            }
        }
        ForwardedHeader::For => {
            if let Some(forwarded_for) = left_most(value) {
                context.forwarded_for_mut().set_host_port(&HostPort::parse(forwarded_for)?, Priority::X_FORWARDED_FOR);
            }
        }
        ForwardedHeader::Port => {
            if let Some(port) = left_most(value) {
                update_port(config, context, parse_port(port)?, Priority::X_FORWARDED_PORT);
            }
        }
        ForwardedHeader::Proto => {
            if let Some(proto) = left_most(value) {
                let scheme = parse_scheme(proto)?;
                if let Some(port) = port_for_proto(proto) {
                    context.authority_mut().set_port(port, Priority::X_FORWARDED_PROTO);
                }
                context.update_proto(scheme, Priority::X_FORWARDED_PROTO);
            }
        }
        ForwardedHeader::Https => {
            let value = value.trim();
            if value.eq_ignore_ascii_case("on") || value.eq_ignore_ascii_case("true") {
                context.update_proto(Scheme::HTTPS, Priority::X_PROXIED_HTTPS);
                update_port(config, context, 443, Priority::X_PROXIED_HTTPS);
            }
        }
        ForwardedHeader::CipherSuite | ForwardedHeader::SslSessionId => {}
    }
    Ok(())
}

/// Decodes an opaque header value as ISO-8859-1, so obs-text bytes are kept.
fn latin1(value: &HeaderValue) -> String {
    value.as_bytes().iter().copied().map(char::from).collect()
}

fn handle_forwarded_element(element: &CsvElement, config: &ForwardedConfig, context: &mut ForwardedContext) -> Result<(), ParseError> {
    // parameters only count for elements without a bare value
    if element.value().is_some() {
        return Ok(());
    }

    for (name, value) in element.params() {
        if value.is_empty() {
            continue;
        }

        match name.as_str() {
            "by" => {
                if config.proxy_as_authority() && !is_obfuscated(value) {
                    context.authority_mut().set_host_port(&HostPort::parse(value)?, Priority::FORWARDED);
                }
            }
            "for" => {
                if !is_obfuscated(value) {
                    context.forwarded_for_mut().set_host_port(&HostPort::parse(value)?, Priority::FORWARDED);
                }
            }
            "host" => {
                if !is_obfuscated(value) {
                    context.authority_mut().set_host_port(&HostPort::parse(value)?, Priority::FORWARDED);
                }
            }
            "proto" => {
                let scheme = parse_scheme(value)?;
                context.update_proto(scheme, Priority::FORWARDED);
                if let Some(port) = port_for_proto(value) {
                    context.authority_mut().set_port(port, Priority::FORWARDED);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn update_port(config: &ForwardedConfig, context: &mut ForwardedContext, port: u16, priority: Priority) {
    if config.forwarded_port_as_authority() {
        context.authority_mut().set_port(port, priority);
    } else {
        context.forwarded_for_mut().set_port(port, priority);
    }
}

/// The first element of a comma separated list, trimmed; `None` when blank.
fn left_most(value: &str) -> Option<&str> {
    let first = value.split_once(',').map_or(value, |(first, _)| first).trim();
    (!first.is_empty()).then_some(first)
}

fn is_obfuscated(value: &str) -> bool {
    value.starts_with('_') || value == "unknown"
}

fn port_for_proto(proto: &str) -> Option<u16> {
    if proto.eq_ignore_ascii_case("http") {
        Some(80)
    } else if proto.eq_ignore_ascii_case("https") {
        Some(443)
    } else {
        None
    }
}

fn parse_scheme(proto: &str) -> Result<Scheme, ParseError> {
    proto.parse::<Scheme>().map_err(|e| ParseError::invalid_header(format!("invalid scheme `{proto}`: {e}")))
}
