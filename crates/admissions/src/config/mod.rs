use lettre::address::AddressError;
use lettre::message::Mailbox;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application, read once at start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let storage = StorageConfig {
            static_root: PathBuf::from(
                env::var("APP_STATIC_ROOT").unwrap_or_else(|_| "public".to_string()),
            ),
            upload_dir: PathBuf::from(
                env::var("APP_UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
            sniff_content: flag("APP_UPLOAD_SNIFF_CONTENT", true)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig::from_env()?,
            storage,
            mail: MailConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

impl TelemetryConfig {
    /// Reads only the logging variables, for commands that never touch the
    /// mail relay.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            log_level: env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            ansi: flag("APP_LOG_ANSI", false)?,
        })
    }
}

/// Where static pages are served from and where transient files live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub static_root: PathBuf,
    pub upload_dir: PathBuf,
    pub sniff_content: bool,
}

/// How the relay connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    StartTls,
    Tls,
    None,
}

impl SmtpSecurity {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(Self::StartTls),
            "tls" | "ssl" => Ok(Self::Tls),
            "none" | "plain" => Ok(Self::None),
            _ => Err(ConfigError::InvalidSmtpSecurity(value.to_string())),
        }
    }
}

/// Mail-relay account and the fixed addresses used for notifications.
#[derive(Clone)]
pub struct MailConfig {
    pub relay_host: String,
    pub relay_port: u16,
    pub security: SmtpSecurity,
    pub username: String,
    pub password: String,
    pub from: Mailbox,
    pub admin: Mailbox,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("relay_host", &self.relay_host)
            .field("relay_port", &self.relay_port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from.to_string())
            .field("admin", &self.admin.to_string())
            .finish()
    }
}

impl MailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let relay_host = env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());
        let relay_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidSmtpPort)?;
        let security =
            SmtpSecurity::parse(&env::var("SMTP_SECURITY").unwrap_or_else(|_| "starttls".into()))?;

        let username = required("SMTP_USERNAME")?;
        let password = required("SMTP_PASSWORD")?;
        let from = env::var("MAIL_FROM").unwrap_or_else(|_| username.clone());
        let admin = required("MAIL_ADMIN_ADDRESS")?;

        Ok(Self {
            relay_host,
            relay_port,
            security,
            username,
            password,
            from: mailbox("MAIL_FROM", &from)?,
            admin: mailbox("MAIL_ADMIN_ADDRESS", &admin)?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag(name)),
        },
    }
}

fn mailbox(name: &'static str, value: &str) -> Result<Mailbox, ConfigError> {
    value
        .trim()
        .parse::<Mailbox>()
        .map_err(|source| ConfigError::InvalidMailbox { name, source })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSmtpPort,
    InvalidSmtpSecurity(String),
    InvalidFlag(&'static str),
    Missing(&'static str),
    InvalidMailbox {
        name: &'static str,
        source: AddressError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSmtpPort => write!(f, "SMTP_PORT must be a valid u16"),
            ConfigError::InvalidSmtpSecurity(value) => {
                write!(f, "SMTP_SECURITY '{value}' is not one of starttls, tls, none")
            }
            ConfigError::InvalidFlag(name) => write!(f, "{name} must be true or false"),
            ConfigError::Missing(name) => write!(f, "{name} must be set"),
            ConfigError::InvalidMailbox { name, .. } => {
                write!(f, "{name} must be a valid email address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidMailbox { source, .. } => Some(source),
            _ => None,
        }
    }
}
