use edge_http::protocol::HostPort;

/// Trust level of a piece of forwarding evidence. Higher values win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(i16);

impl Priority {
    pub const UNSET: Priority = Priority(-1);
    pub const X_PROXIED_HTTPS: Priority = Priority(1);
    pub const X_FORWARDED_PROTO: Priority = Priority(2);
    /// Authority seen in the request line or `Host` header.
    pub const REQUEST: Priority = Priority(3);
    pub const X_FORWARDED_SERVER: Priority = Priority(4);
    pub const X_FORWARDED_PORT: Priority = Priority(5);
    pub const X_FORWARDED_FOR: Priority = Priority(6);
    pub const X_FORWARDED_HOST: Priority = Priority(7);
    pub const FORWARDED: Priority = Priority(8);
    pub const FORCED: Priority = Priority(999);

    #[inline]
    pub fn value(self) -> i16 {
        self.0
    }
}

/// A host and a port accumulated from competing sources.
///
/// Each part only changes when a strictly higher [`Priority`] arrives, so for
/// equal priorities the first value seen sticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityCandidate {
    host: Option<String>,
    host_priority: Priority,
    port: Option<u16>,
    port_priority: Priority,
}

impl Default for AuthorityCandidate {
    fn default() -> Self {
        Self { host: None, host_priority: Priority::UNSET, port: None, port_priority: Priority::UNSET }
    }
}

impl AuthorityCandidate {
    pub fn set_host<S: Into<String>>(&mut self, host: S, priority: Priority) {
        if priority > self.host_priority {
            self.host = Some(host.into());
            self.host_priority = priority;
        }
    }

    pub fn set_port(&mut self, port: u16, priority: Priority) {
        if port > 0 && priority > self.port_priority {
            self.port = Some(port);
            self.port_priority = priority;
        }
    }

    /// Sets host and port together.
    ///
    /// The port is only considered when the host was accepted. A `Forwarded`
    /// host carries an authoritative port, which replaces the current one
    /// even when absent.
    pub fn set_host_port(&mut self, host_port: &HostPort, priority: Priority) {
        if self.host.is_some() && priority <= self.host_priority {
            return;
        }

        self.host = Some(host_port.host().to_string());
        self.host_priority = priority;

        if priority == Priority::FORWARDED {
            self.port = host_port.port();
            self.port_priority = priority;
        } else if let Some(port) = host_port.port() {
            self.set_port(port, priority);
        }
    }

    #[inline]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[inline]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    #[inline]
    pub fn host_priority(&self) -> Priority {
        self.host_priority
    }

    #[inline]
    pub fn port_priority(&self) -> Priority {
        self.port_priority
    }

    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    pub fn to_host_port(&self) -> Option<HostPort> {
        self.host.as_ref().map(|host| HostPort::new(host.clone(), self.port))
    }
}
