use serde::Deserialize;

use crate::ConfigError;

pub const DEFAULT_FORWARDED_HEADER: &str = "Forwarded";
pub const DEFAULT_FORWARDED_HOST_HEADER: &str = "X-Forwarded-Host";
pub const DEFAULT_FORWARDED_SERVER_HEADER: &str = "X-Forwarded-Server";
pub const DEFAULT_FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";
pub const DEFAULT_FORWARDED_PORT_HEADER: &str = "X-Forwarded-Port";
pub const DEFAULT_FORWARDED_PROTO_HEADER: &str = "X-Forwarded-Proto";
pub const DEFAULT_FORWARDED_HTTPS_HEADER: &str = "X-Proxied-Https";
pub const DEFAULT_FORWARDED_CIPHER_SUITE_HEADER: &str = "Proxy-auth-cert";
pub const DEFAULT_FORWARDED_SSL_SESSION_ID_HEADER: &str = "Proxy-ssl-id";

/// Settings of the forwarded header resolution.
///
/// Every header name may be disabled by setting it to `None` or a blank
/// string. In JSON the keys are kebab-case, e.g.
///
/// ```json
/// { "forwarded-host-header": null, "proxy-as-authority": true, "forced-host": "www.example.com:443" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[allow(clippy::struct_excessive_bools, reason = "flat configuration keys")]
#[serde(default, rename_all = "kebab-case")]
pub struct ForwardedConfig {
    forwarded_header: Option<String>,
    forwarded_host_header: Option<String>,
    forwarded_server_header: Option<String>,
    forwarded_for_header: Option<String>,
    forwarded_port_header: Option<String>,
    forwarded_proto_header: Option<String>,
    forwarded_https_header: Option<String>,
    forwarded_cipher_suite_header: Option<String>,
    forwarded_ssl_session_id_header: Option<String>,
    forwarded_only: bool,
    proxy_as_authority: bool,
    forwarded_port_as_authority: bool,
    ssl_is_secure: bool,
    forced_host: Option<String>,
    secure_scheme: String,
}

impl Default for ForwardedConfig {
    fn default() -> Self {
        Self {
            forwarded_header: Some(DEFAULT_FORWARDED_HEADER.into()),
            forwarded_host_header: Some(DEFAULT_FORWARDED_HOST_HEADER.into()),
            forwarded_server_header: Some(DEFAULT_FORWARDED_SERVER_HEADER.into()),
            forwarded_for_header: Some(DEFAULT_FORWARDED_FOR_HEADER.into()),
            forwarded_port_header: Some(DEFAULT_FORWARDED_PORT_HEADER.into()),
            forwarded_proto_header: Some(DEFAULT_FORWARDED_PROTO_HEADER.into()),
            forwarded_https_header: Some(DEFAULT_FORWARDED_HTTPS_HEADER.into()),
            forwarded_cipher_suite_header: Some(DEFAULT_FORWARDED_CIPHER_SUITE_HEADER.into()),
            forwarded_ssl_session_id_header: Some(DEFAULT_FORWARDED_SSL_SESSION_ID_HEADER.into()),
            forwarded_only: false,
            proxy_as_authority: false,
            forwarded_port_as_authority: true,
            ssl_is_secure: true,
            forced_host: None,
            secure_scheme: "https".into(),
        }
    }
}

impl ForwardedConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Only honor the structured `Forwarded` header.
    ///
    /// Turning the mode on disables every legacy header and restores the
    /// `Forwarded` name if it was disabled. Turning it off restores the
    /// default legacy names.
    #[must_use]
    pub fn with_forwarded_only(mut self, forwarded_only: bool) -> Self {
        self.forwarded_only = forwarded_only;
        if forwarded_only {
            self.forwarded_host_header = None;
            self.forwarded_server_header = None;
            self.forwarded_for_header = None;
            self.forwarded_port_header = None;
            self.forwarded_proto_header = None;
            self.forwarded_https_header = None;
        } else {
            self.forwarded_host_header = Some(DEFAULT_FORWARDED_HOST_HEADER.into());
            self.forwarded_server_header = Some(DEFAULT_FORWARDED_SERVER_HEADER.into());
            self.forwarded_for_header = Some(DEFAULT_FORWARDED_FOR_HEADER.into());
            self.forwarded_port_header = Some(DEFAULT_FORWARDED_PORT_HEADER.into());
            self.forwarded_proto_header = Some(DEFAULT_FORWARDED_PROTO_HEADER.into());
            self.forwarded_https_header = Some(DEFAULT_FORWARDED_HTTPS_HEADER.into());
        }
        if self.forwarded_header().is_none() {
            self.forwarded_header = Some(DEFAULT_FORWARDED_HEADER.into());
        }
        self
    }

    #[must_use]
    pub fn with_forwarded_header<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.forwarded_header = name.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_forwarded_host_header<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.forwarded_host_header = name.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_forwarded_server_header<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.forwarded_server_header = name.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_forwarded_for_header<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.forwarded_for_header = name.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_forwarded_port_header<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.forwarded_port_header = name.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_forwarded_proto_header<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.forwarded_proto_header = name.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_forwarded_https_header<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.forwarded_https_header = name.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_forwarded_cipher_suite_header<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.forwarded_cipher_suite_header = name.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_forwarded_ssl_session_id_header<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.forwarded_ssl_session_id_header = name.map(Into::into);
        self
    }

    /// Use `Forwarded: by=` and `X-Forwarded-Server` as the authority.
    #[must_use]
    pub fn with_proxy_as_authority(mut self, proxy_as_authority: bool) -> Self {
        self.proxy_as_authority = proxy_as_authority;
        self
    }

    /// Apply `X-Forwarded-Port` and `X-Proxied-Https` ports to the authority
    /// (`true`) or to the remote address (`false`).
    #[must_use]
    pub fn with_forwarded_port_as_authority(mut self, forwarded_port_as_authority: bool) -> Self {
        self.forwarded_port_as_authority = forwarded_port_as_authority;
        self
    }

    /// Treat cipher-suite / ssl-session-id evidence as a secure request.
    #[must_use]
    pub fn with_ssl_is_secure(mut self, ssl_is_secure: bool) -> Self {
        self.ssl_is_secure = ssl_is_secure;
        self
    }

    #[must_use]
    pub fn with_forced_host<S: Into<String>>(mut self, forced_host: Option<S>) -> Self {
        self.forced_host = forced_host.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_secure_scheme<S: Into<String>>(mut self, secure_scheme: S) -> Self {
        self.secure_scheme = secure_scheme.into();
        self
    }

    pub fn forwarded_header(&self) -> Option<&str> {
        enabled(self.forwarded_header.as_ref())
    }

    pub fn forwarded_host_header(&self) -> Option<&str> {
        self.legacy(self.forwarded_host_header.as_ref())
    }

    pub fn forwarded_server_header(&self) -> Option<&str> {
        self.legacy(self.forwarded_server_header.as_ref())
    }

    pub fn forwarded_for_header(&self) -> Option<&str> {
        self.legacy(self.forwarded_for_header.as_ref())
    }

    pub fn forwarded_port_header(&self) -> Option<&str> {
        self.legacy(self.forwarded_port_header.as_ref())
    }

    pub fn forwarded_proto_header(&self) -> Option<&str> {
        self.legacy(self.forwarded_proto_header.as_ref())
    }

    pub fn forwarded_https_header(&self) -> Option<&str> {
        self.legacy(self.forwarded_https_header.as_ref())
    }

    pub fn forwarded_cipher_suite_header(&self) -> Option<&str> {
        enabled(self.forwarded_cipher_suite_header.as_ref())
    }

    pub fn forwarded_ssl_session_id_header(&self) -> Option<&str> {
        enabled(self.forwarded_ssl_session_id_header.as_ref())
    }

    pub fn forwarded_only(&self) -> bool {
        self.forwarded_only
    }

    pub fn proxy_as_authority(&self) -> bool {
        self.proxy_as_authority
    }

    pub fn forwarded_port_as_authority(&self) -> bool {
        self.forwarded_port_as_authority
    }

    pub fn ssl_is_secure(&self) -> bool {
        self.ssl_is_secure
    }

    pub fn forced_host(&self) -> Option<&str> {
        enabled(self.forced_host.as_ref())
    }

    pub fn secure_scheme(&self) -> &str {
        &self.secure_scheme
    }

    // a config deserialized with `forwarded-only: true` may still carry legacy names
    fn legacy<'a>(&self, name: Option<&'a String>) -> Option<&'a str> {
        if self.forwarded_only { None } else { enabled(name) }
    }
}

fn enabled(name: Option<&String>) -> Option<&str> {
    name.map(|name| name.trim()).filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn defaults() {
        let config = ForwardedConfig::default();
        assert_eq!(config.forwarded_header(), Some("Forwarded"));
        assert_eq!(config.forwarded_host_header(), Some("X-Forwarded-Host"));
        assert_eq!(config.forwarded_cipher_suite_header(), Some("Proxy-auth-cert"));
        assert!(!config.proxy_as_authority());
        assert!(config.forwarded_port_as_authority());
        assert!(config.ssl_is_secure());
        assert_eq!(config.secure_scheme(), "https");
    }

    #[test]
    fn forwarded_only_toggles_legacy_headers() {
        let config = ForwardedConfig::default().with_forwarded_header(None::<String>).with_forwarded_only(true);
        assert_eq!(config.forwarded_header(), Some("Forwarded"));
        assert_eq!(config.forwarded_host_header(), None);
        assert_eq!(config.forwarded_https_header(), None);
        assert_eq!(config.forwarded_ssl_session_id_header(), Some("Proxy-ssl-id"));

        let config = config.with_forwarded_only(false);
        assert_eq!(config.forwarded_for_header(), Some("X-Forwarded-For"));
    }

    #[test]
    fn blank_names_disable_headers() {
        let config = ForwardedConfig::default().with_forwarded_port_header(Some("  "));
        assert_eq!(config.forwarded_port_header(), None);
    }

    #[test]
    fn load_from_json() {
        let json = indoc! {r#"
        {
            "forwarded-host-header": null,
            "forwarded-for-header": "X-Real-Ip",
            "proxy-as-authority": true,
            "ssl-is-secure": false,
            "forced-host": "www.example.com:443"
        }
        "#};

        let config = ForwardedConfig::from_json(json).unwrap();
        assert_eq!(config.forwarded_host_header(), None);
        assert_eq!(config.forwarded_for_header(), Some("X-Real-Ip"));
        assert_eq!(config.forwarded_header(), Some("Forwarded"));
        assert!(config.proxy_as_authority());
        assert!(!config.ssl_is_secure());
        assert!(config.forwarded_port_as_authority());
        assert_eq!(config.forced_host(), Some("www.example.com:443"));
    }

    #[test]
    fn json_forwarded_only_hides_legacy_names() {
        let config = ForwardedConfig::from_json(r#"{ "forwarded-only": true }"#).unwrap();
        assert_eq!(config.forwarded_host_header(), None);
        assert_eq!(config.forwarded_header(), Some("Forwarded"));
    }

    #[test]
    fn reject_unknown_json_shape() {
        assert!(ForwardedConfig::from_json(r#"{ "proxy-as-authority": "yes" }"#).is_err());
    }
}
