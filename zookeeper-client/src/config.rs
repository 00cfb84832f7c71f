//! Client configuration types and builders.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use zookeeper_core::validate_path;

/// Default connection string.
const DEFAULT_CONNECT_STRING: &str = "localhost:2181";
/// Default server port when a connection string entry has none.
pub const DEFAULT_PORT: u16 = 2181;
/// Default session timeout.
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_millis(30_000);
/// Default delay between attempts to reach successive servers.
const DEFAULT_SPIN_DELAY: Duration = Duration::from_millis(1_000);
/// Default first retry backoff.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1_000);
/// Default number of retries after a lost connection.
const DEFAULT_RETRIES: u32 = 0;

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for zookeeper_core::ZooKeeperError {
    fn from(err: ConfigError) -> Self {
        zookeeper_core::ZooKeeperError::Configuration(err.message)
    }
}

/// One `host:port` entry of a connection string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Creates a server address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the host name or IP literal.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::new("server address must not be empty"));
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let end = rest
                .find(']')
                .ok_or_else(|| ConfigError::new(format!("unterminated IPv6 literal: {}", s)))?;
            let port = rest[end + 1..].strip_prefix(':');
            (&rest[..end], port)
        } else {
            match s.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            }
        };

        if host.is_empty() {
            return Err(ConfigError::new(format!("missing host in: {}", s)));
        }
        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| ConfigError::new(format!("invalid port in: {}", s)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self::new(host, port))
    }
}

/// A parsed connection string: servers plus an optional chroot.
///
/// `"host1:2181,host2/app"` names two servers and the chroot `/app`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectString {
    servers: Vec<ServerAddress>,
    chroot: Option<String>,
}

impl ConnectString {
    /// Returns the servers in the order given.
    pub fn servers(&self) -> &[ServerAddress] {
        &self.servers
    }

    /// Returns the chroot, or `None` when operating at the real root.
    pub fn chroot(&self) -> Option<&str> {
        self.chroot.as_deref()
    }
}

impl FromStr for ConnectString {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hosts, chroot) = match s.find('/') {
            Some(index) => (&s[..index], Some(&s[index..])),
            None => (s, None),
        };

        let servers = hosts
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(ServerAddress::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if servers.is_empty() {
            return Err(ConfigError::new("connect string must name at least one server"));
        }

        let chroot = match chroot {
            Some("/") | None => None,
            Some(path) => {
                validate_path(path)
                    .map_err(|e| ConfigError::new(format!("invalid chroot: {}", e)))?;
                Some(path.to_string())
            }
        };

        Ok(Self { servers, chroot })
    }
}

impl fmt::Display for ConnectString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, server) in self.servers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", server)?;
        }
        if let Some(ref chroot) = self.chroot {
            f.write_str(chroot)?;
        }
        Ok(())
    }
}

/// Retry policy for operations that fail with a lost connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    retries: u32,
    initial_backoff: Duration,
}

impl RetryConfig {
    /// Returns how many times an operation is retried after a lost connection.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Returns the delay before the first retry; each later retry doubles it.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

/// Builder for `RetryConfig`.
#[derive(Debug, Clone, Default)]
pub struct RetryConfigBuilder {
    retries: Option<u32>,
    initial_backoff: Option<Duration>,
}

impl RetryConfigBuilder {
    /// Creates a new retry configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of retries.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Sets the delay before the first retry.
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    /// Builds the retry configuration.
    pub fn build(self) -> Result<RetryConfig, ConfigError> {
        let initial_backoff = self.initial_backoff.unwrap_or(DEFAULT_INITIAL_BACKOFF);
        if initial_backoff.is_zero() {
            return Err(ConfigError::new("initial_backoff must be positive"));
        }

        Ok(RetryConfig {
            retries: self.retries.unwrap_or(DEFAULT_RETRIES),
            initial_backoff,
        })
    }
}

/// Main client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    connect_string: ConnectString,
    session_timeout: Duration,
    spin_delay: Duration,
    retry: RetryConfig,
}

impl ClientConfig {
    /// Creates a new client configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the parsed connection string.
    pub fn connect_string(&self) -> &ConnectString {
        &self.connect_string
    }

    /// Returns the chroot of the connection string.
    pub fn chroot(&self) -> Option<&str> {
        self.connect_string.chroot()
    }

    /// Returns the requested session timeout.
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Returns the delay between attempts to reach successive servers.
    pub fn spin_delay(&self) -> Duration {
        self.spin_delay
    }

    /// Returns the retry configuration.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_string: ConnectString {
                servers: vec![ServerAddress::new("localhost", DEFAULT_PORT)],
                chroot: None,
            },
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            spin_delay: DEFAULT_SPIN_DELAY,
            retry: RetryConfig::default(),
        }
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    connect_string: Option<String>,
    session_timeout: Option<Duration>,
    spin_delay: Option<Duration>,
    retry: RetryConfigBuilder,
}

impl ClientConfigBuilder {
    /// Creates a new client configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connection string, e.g. `"zk1:2181,zk2:2181/app"`.
    pub fn connect_string(mut self, connect_string: impl Into<String>) -> Self {
        self.connect_string = Some(connect_string.into());
        self
    }

    /// Sets the requested session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the delay between attempts to reach successive servers.
    pub fn spin_delay(mut self, delay: Duration) -> Self {
        self.spin_delay = Some(delay);
        self
    }

    /// Sets the number of retries after a lost connection.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retry = self.retry.retries(retries);
        self
    }

    /// Configures retry settings using a builder function.
    pub fn retry<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RetryConfigBuilder) -> RetryConfigBuilder,
    {
        self.retry = f(self.retry);
        self
    }

    /// Builds the client configuration, returning an error if validation fails.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let connect_string = self
            .connect_string
            .as_deref()
            .unwrap_or(DEFAULT_CONNECT_STRING)
            .parse::<ConnectString>()?;

        let session_timeout = self.session_timeout.unwrap_or(DEFAULT_SESSION_TIMEOUT);
        if session_timeout.is_zero() {
            return Err(ConfigError::new("session_timeout must be positive"));
        }

        let retry = self.retry.build()?;

        Ok(ClientConfig {
            connect_string,
            session_timeout,
            spin_delay: self.spin_delay.unwrap_or(DEFAULT_SPIN_DELAY),
            retry,
        })
    }
}
