use crate::error::ConfigError;
use crate::zone::ZoneName;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which DNS transports to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Network {
    #[default]
    Udp,
    Tcp,
    Both,
}

impl Network {
    pub fn serves_udp(&self) -> bool {
        matches!(self, Network::Udp | Network::Both)
    }

    pub fn serves_tcp(&self) -> bool {
        matches!(self, Network::Tcp | Network::Both)
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "udp" => Ok(Network::Udp),
            "tcp" => Ok(Network::Tcp),
            "both" | "udp+tcp" => Ok(Network::Both),
            _ => Err(ConfigError::InvalidNetwork(s.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Udp => f.write_str("udp"),
            Network::Tcp => f.write_str("tcp"),
            Network::Both => f.write_str("both"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DnsConfig {
    /// Name this server answers as; used in the synthesized SOA and NS records
    pub server_name: ZoneName,

    /// Address to bind the DNS server to
    pub bind_addr: SocketAddr,

    /// Transports to serve
    pub network: Network,

    /// Whether responses use name compression
    pub compression: bool,

    /// Time allowed for the first query on a TCP connection
    pub read_timeout: Duration,

    /// Time allowed for writing a TCP response
    pub write_timeout: Duration,

    /// Time a TCP connection may sit idle between queries
    pub idle_timeout: Duration,

    /// HTTP API bind address (None = disabled)
    pub http_bind_addr: Option<SocketAddr>,

    /// Zone file loaded at startup and on SIGHUP
    pub zone_file: Option<PathBuf>,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            server_name: ZoneName::parse("localhost").unwrap_or_else(|_| ZoneName::root()),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8053)),
            network: Network::Udp,
            compression: false,
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(8),
            http_bind_addr: Some(SocketAddr::from(([127, 0, 0, 1], 5353))),
            zone_file: None,
        }
    }
}

impl DnsConfig {
    /// Create a DnsConfig from environment variables
    /// Returns Err if critical configuration is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DnsConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("WORKBENCH_DNS_NAME") {
            config.server_name =
                ZoneName::parse(&name).map_err(|_| ConfigError::InvalidServerName(name))?;
        }

        if let Some(bind_addr) = lookup("WORKBENCH_BIND_ADDR") {
            config.bind_addr = bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress(bind_addr))?;
        }

        if let Some(network) = lookup("WORKBENCH_NETWORK") {
            config.network = network.parse()?;
        }

        if let Some(compression) = lookup("WORKBENCH_COMPRESSION") {
            config.compression = parse_bool(&compression, false);
        }

        if let Some(value) = lookup("WORKBENCH_READ_TIMEOUT") {
            config.read_timeout = parse_timeout(&value)?;
        }

        if let Some(value) = lookup("WORKBENCH_WRITE_TIMEOUT") {
            config.write_timeout = parse_timeout(&value)?;
        }

        if let Some(value) = lookup("WORKBENCH_IDLE_TIMEOUT") {
            config.idle_timeout = parse_timeout(&value)?;
        }

        // HTTP API configuration
        if let Some(http_bind_addr) = lookup("WORKBENCH_API_ADDR") {
            if http_bind_addr.to_lowercase() == "disabled" || http_bind_addr.is_empty() {
                config.http_bind_addr = None;
            } else {
                config.http_bind_addr = Some(
                    http_bind_addr
                        .parse()
                        .map_err(|_| ConfigError::InvalidHttpBindAddress(http_bind_addr))?,
                );
            }
        }

        if let Some(zone_file) = lookup("WORKBENCH_ZONE_FILE") {
            if !zone_file.is_empty() {
                config.zone_file = Some(PathBuf::from(zone_file));
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (what, timeout) in [
            ("read", self.read_timeout),
            ("write", self.write_timeout),
            ("idle", self.idle_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout(format!(
                    "{} timeout must be greater than 0",
                    what
                )));
            }
            if timeout.as_secs() > 300 {
                return Err(ConfigError::InvalidTimeout(format!(
                    "{} timeout too large (max 300 seconds)",
                    what
                )));
            }
        }

        if self.server_name.is_root() {
            return Err(ConfigError::InvalidServerName(
                "server name cannot be the root".to_string(),
            ));
        }

        if let Some(http) = self.http_bind_addr {
            if http == self.bind_addr && self.network.serves_tcp() {
                return Err(ConfigError::InvalidHttpBindAddress(format!(
                    "{} is already used by the DNS TCP listener",
                    http
                )));
            }
        }

        Ok(())
    }
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidTimeout(value.to_string()))?;
    Ok(Duration::from_secs(secs))
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
