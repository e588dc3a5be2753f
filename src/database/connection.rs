//! Connection resolution
//!
//! This module turns a provider plus runtime parameters into connection
//! string text and the driver factory that understands it. Nothing here
//! opens a connection on its own; [`ConnectionResolver::open`] is the one
//! place a factory is asked to connect.

use crate::database::drivers::{SqliteDriver, TiberiusDriver};
use crate::database::handle::Credentials;
use crate::error::{ForgeError, Result};
use crate::provider::{EngineKind, ProviderDescriptor, ProviderId, ProviderMechanism};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Keys whose values are replaced by `***` in redacted output
const SECRET_KEYS: [&str; 2] = ["password", "pwd"];

/// Ordered `key=value;` connection string with case-insensitive keys
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pairs: Vec<(String, String)>,
}

impl ConnectionString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` pairs separated by semicolons; `{...}` values may
    /// contain semicolons
    pub fn parse(text: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        let mut rest = text.trim();

        while !rest.is_empty() {
            let (key, after_key) = rest.split_once('=').ok_or_else(|| {
                ForgeError::Config(format!(
                    "connection string segment {} has no '='",
                    pairs.len() + 1
                ))
            })?;
            let after_key = after_key.trim_start();

            let (value, remainder) = if let Some(braced) = after_key.strip_prefix('{') {
                let end = braced.find('}').ok_or_else(|| {
                    ForgeError::Config("unterminated '{' in connection string".into())
                })?;
                let tail = braced[end + 1..].trim_start();
                (format!("{{{}}}", &braced[..end]), tail.strip_prefix(';').unwrap_or(tail))
            } else {
                match after_key.split_once(';') {
                    Some((value, tail)) => (value.trim().to_string(), tail),
                    None => (after_key.trim().to_string(), ""),
                }
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(ForgeError::Config("connection string has an empty key".into()));
            }
            pairs.push((key.to_string(), value));
            rest = remainder.trim_start_matches(';').trim();
        }

        Ok(Self { pairs })
    }

    /// Append a pair; later pairs with the same key shadow earlier ones
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    /// Text safe for logs and error messages
    pub fn redacted(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| {
                if redact && SECRET_KEYS.iter().any(|s| k.eq_ignore_ascii_case(s)) {
                    format!("{}=***", k)
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionString({})", self.redacted())
    }
}

/// Runtime parameters for one connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Server address, or the database file for file engines
    pub data_source: Option<String>,
    pub database: Option<String>,
    pub credentials: Credentials,
    pub encrypted: bool,
}

/// An open connection used for administrative commands
#[async_trait]
pub trait AdminConnection: Send {
    /// Execute a statement and return the number of affected rows
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run a query and return the first column of every row as text
    async fn query_column(&mut self, sql: &str) -> Result<Vec<String>>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Creates connections for one access mechanism
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Driver name for logs and errors
    fn name(&self) -> &str;

    /// Open a connection
    async fn connect(&self, connection_string: &ConnectionString) -> Result<Box<dyn AdminConnection>>;

    /// Create an empty database file through the engine's own initialization
    async fn initialize_file(&self, _path: &Path, _connection_string: &ConnectionString) -> Result<()> {
        Err(ForgeError::unsupported(self.name(), "InitializeFile"))
    }

    /// Drop pooled connections to the database so its files can be moved
    async fn clear_pools(&self, _connection_string: &ConnectionString) -> Result<()> {
        Ok(())
    }
}

/// How a (engine, mechanism) pair obtains its factory
enum FactoryBinding {
    /// Registered explicitly at configuration time
    Override(Arc<dyn DriverFactory>),
    /// Built-in default, computed on first use
    Default(OnceLock<Option<Arc<dyn DriverFactory>>>),
}

fn builtin_factory(engine: EngineKind, mechanism: ProviderMechanism) -> Option<Arc<dyn DriverFactory>> {
    match (engine, mechanism) {
        (EngineKind::Sqlite, ProviderMechanism::Native) => Some(Arc::new(SqliteDriver::new())),
        (EngineKind::SqlServer, ProviderMechanism::Native) => Some(Arc::new(TiberiusDriver::new())),
        _ => None,
    }
}

/// Resolves providers to connection strings and driver factories
pub struct ConnectionResolver {
    providers: HashMap<ProviderId, ProviderDescriptor>,
    bindings: HashMap<(EngineKind, ProviderMechanism), FactoryBinding>,
}

impl ConnectionResolver {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();
        for engine in EngineKind::ALL {
            for mechanism in ProviderMechanism::ALL {
                bindings.insert((engine, mechanism), FactoryBinding::Default(OnceLock::new()));
            }
        }
        Self {
            providers: HashMap::new(),
            bindings,
        }
    }

    /// Register a provider; identical descriptors collapse to one entry
    pub fn register_provider(&mut self, descriptor: ProviderDescriptor) -> Result<ProviderId> {
        let id = descriptor.identity()?;
        debug!(provider = %descriptor.display_name(), id = %id.short(), "Registered provider");
        self.providers.entry(id).or_insert(descriptor);
        Ok(id)
    }

    /// Bind a driver factory, replacing the built-in default
    pub fn register_factory(
        &mut self,
        engine: EngineKind,
        mechanism: ProviderMechanism,
        factory: Arc<dyn DriverFactory>,
    ) {
        self.bindings.insert((engine, mechanism), FactoryBinding::Override(factory));
    }

    pub fn provider(&self, id: ProviderId) -> Result<&ProviderDescriptor> {
        self.providers
            .get(&id)
            .ok_or_else(|| ForgeError::Config(format!("provider {} is not registered", id.short())))
    }

    /// Registered providers, sorted by identity
    pub fn providers(&self) -> Vec<(ProviderId, &ProviderDescriptor)> {
        let mut providers: Vec<_> = self.providers.iter().map(|(id, d)| (*id, d)).collect();
        providers.sort_by_key(|(id, _)| *id);
        providers
    }

    /// Driver factory for the provider's engine and mechanism
    pub fn driver_factory(&self, id: ProviderId) -> Result<Arc<dyn DriverFactory>> {
        let descriptor = self.provider(id)?;
        let engine = descriptor.engine()?;
        let mechanism = descriptor.mechanism()?;

        self.bound_factory(engine, mechanism).ok_or_else(|| {
            ForgeError::unsupported(
                format!("{} via {}", engine, mechanism),
                "CreateConnection",
            )
        })
    }

    fn bound_factory(&self, engine: EngineKind, mechanism: ProviderMechanism) -> Option<Arc<dyn DriverFactory>> {
        match self.bindings.get(&(engine, mechanism)) {
            Some(FactoryBinding::Override(factory)) => Some(factory.clone()),
            Some(FactoryBinding::Default(cell)) => cell
                .get_or_init(|| builtin_factory(engine, mechanism))
                .clone(),
            None => None,
        }
    }

    /// Build connection string text using the mechanism's key names
    pub fn connection_string(&self, id: ProviderId, params: &ConnectionParams) -> Result<ConnectionString> {
        let descriptor = self.provider(id)?;
        let mechanism = descriptor.mechanism()?;
        let data_source = params
            .data_source
            .clone()
            .or_else(|| descriptor.data_source.clone());

        let mut cs = ConnectionString::new();
        match mechanism {
            ProviderMechanism::Native | ProviderMechanism::OleDb => {
                if mechanism == ProviderMechanism::OleDb {
                    let class_id = descriptor.class_id.as_deref().ok_or_else(|| {
                        ForgeError::Config(format!(
                            "provider {} has no class id",
                            descriptor.display_name()
                        ))
                    })?;
                    cs.push("Provider", class_id);
                }
                if let Some(ds) = data_source {
                    cs.push("Data Source", ds);
                }
                if let Some(db) = &params.database {
                    cs.push("Database", db.as_str());
                }
                match (&params.credentials.user_id, params.credentials.is_integrated()) {
                    (Some(user), false) => {
                        cs.push("User ID", user.as_str());
                        cs.push("Password", params.credentials.password.clone().unwrap_or_default());
                    }
                    _ => cs.push("Integrated Security", "SSPI"),
                }
                if params.encrypted {
                    cs.push("Encrypt", "True");
                }
            }
            ProviderMechanism::Odbc => {
                let driver = descriptor
                    .class_id
                    .clone()
                    .or_else(|| descriptor.full_name.clone())
                    .ok_or_else(|| {
                        ForgeError::Config(format!(
                            "provider {} has no ODBC driver name",
                            descriptor.display_name()
                        ))
                    })?;
                cs.push("Driver", format!("{{{}}}", driver));
                if let Some(ds) = data_source {
                    cs.push("Dbq", ds);
                }
                match (&params.credentials.user_id, params.credentials.is_integrated()) {
                    (Some(user), false) => {
                        cs.push("UID", user.as_str());
                        cs.push("PWD", params.credentials.password.clone().unwrap_or_default());
                    }
                    _ => cs.push("Trusted_Connection", "Yes"),
                }
                if params.encrypted {
                    cs.push("Encrypt", "Yes");
                }
            }
        }

        Ok(cs)
    }

    /// Default file extension: the provider's first declared extension with
    /// wildcards stripped, else the engine's own
    pub fn default_file_ext(&self, id: ProviderId) -> Result<String> {
        let descriptor = self.provider(id)?;
        let engine = descriptor.engine()?;
        Ok(descriptor
            .declared_extension()
            .unwrap_or_else(|| engine.descriptor().default_extension.to_string()))
    }

    /// Open a connection through the provider's driver factory
    pub async fn open(&self, id: ProviderId, params: &ConnectionParams) -> Result<Box<dyn AdminConnection>> {
        let factory = self.driver_factory(id)?;
        let cs = self.connection_string(id, params)?;
        debug!(driver = factory.name(), connection = %cs.redacted(), "Opening connection");
        factory.connect(&cs).await
    }

    /// Flush pooled connections for the database described by `params`
    ///
    /// A provider with no bound driver has opened nothing, so there is
    /// nothing to flush.
    pub async fn clear_pools(&self, id: ProviderId, params: &ConnectionParams) -> Result<()> {
        let descriptor = self.provider(id)?;
        let (engine, mechanism) = (descriptor.engine()?, descriptor.mechanism()?);
        let Some(factory) = self.bound_factory(engine, mechanism) else {
            debug!(engine = %engine, mechanism = %mechanism, "No driver bound, no pools to clear");
            return Ok(());
        };
        let cs = self.connection_string(id, params)?;
        debug!(driver = factory.name(), connection = %cs.redacted(), "Clearing connection pools");
        factory.clear_pools(&cs).await
    }
}

impl Default for ConnectionResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(user: Option<(&str, &str)>) -> ConnectionParams {
        ConnectionParams {
            data_source: Some("db01".to_string()),
            database: Some("Orders".to_string()),
            credentials: match user {
                Some((u, p)) => Credentials::new(u, p),
                None => Credentials::integrated(),
            },
            encrypted: false,
        }
    }

    #[test]
    fn test_native_connection_string() {
        let mut resolver = ConnectionResolver::new();
        let id = resolver
            .register_provider(ProviderDescriptor::new(EngineKind::SqlServer, ProviderMechanism::Native))
            .unwrap();

        let cs = resolver.connection_string(id, &params(Some(("sa", "secret")))).unwrap();
        assert_eq!(cs.to_string(), "Data Source=db01;Database=Orders;User ID=sa;Password=secret");
        assert_eq!(cs.redacted(), "Data Source=db01;Database=Orders;User ID=sa;Password=***");
        assert!(!format!("{:?}", cs).contains("secret"));
    }

    #[test]
    fn test_integrated_security_without_user() {
        let mut resolver = ConnectionResolver::new();
        let id = resolver
            .register_provider(ProviderDescriptor::new(EngineKind::SqlServer, ProviderMechanism::Native))
            .unwrap();
        let mut p = params(None);
        p.encrypted = true;
        let cs = resolver.connection_string(id, &p).unwrap();
        assert_eq!(cs.get("Integrated Security"), Some("SSPI"));
        assert_eq!(cs.get("encrypt"), Some("True"));
        assert_eq!(cs.get("User ID"), None);
    }

    #[test]
    fn test_odbc_connection_string() {
        let mut resolver = ConnectionResolver::new();
        let id = resolver
            .register_provider(
                ProviderDescriptor::new(EngineKind::Access, ProviderMechanism::Odbc)
                    .with_class_id("Microsoft Access Driver (*.mdb)"),
            )
            .unwrap();
        let p = ConnectionParams {
            data_source: Some("C:\\data\\nw.mdb".to_string()),
            database: None,
            credentials: Credentials::new("admin", "pw"),
            encrypted: false,
        };
        let cs = resolver.connection_string(id, &p).unwrap();
        assert_eq!(
            cs.to_string(),
            "Driver={Microsoft Access Driver (*.mdb)};Dbq=C:\\data\\nw.mdb;UID=admin;PWD=pw"
        );
        assert_eq!(cs.redacted().matches("***").count(), 1);
    }

    #[test]
    fn test_oledb_requires_class_id() {
        let mut resolver = ConnectionResolver::new();
        let id = resolver
            .register_provider(ProviderDescriptor::new(EngineKind::Access, ProviderMechanism::OleDb))
            .unwrap();
        assert!(matches!(
            resolver.connection_string(id, &params(None)),
            Err(ForgeError::Config(_))
        ));
    }

    #[test]
    fn test_parse_round_trip_with_braces() {
        let text = "Driver={SQL Server; Native};Dbq=x.mdb;UID=u;PWD=p";
        let cs = ConnectionString::parse(text).unwrap();
        assert_eq!(cs.get("driver"), Some("{SQL Server; Native}"));
        assert_eq!(cs.get("PWD"), Some("p"));
        assert_eq!(cs.to_string(), text);
        assert!(ConnectionString::parse("novalue").is_err());
    }

    #[test]
    fn test_default_file_ext() {
        let mut resolver = ConnectionResolver::new();
        let declared = resolver
            .register_provider(
                ProviderDescriptor::new(EngineKind::Access, ProviderMechanism::OleDb)
                    .with_extension("*.accdb"),
            )
            .unwrap();
        let bare = resolver
            .register_provider(ProviderDescriptor::new(EngineKind::Access, ProviderMechanism::Native))
            .unwrap();
        assert_eq!(resolver.default_file_ext(declared).unwrap(), ".accdb");
        assert_eq!(resolver.default_file_ext(bare).unwrap(), ".mdb");
    }

    #[test]
    fn test_factory_resolution() {
        let mut resolver = ConnectionResolver::new();
        let sqlite = resolver
            .register_provider(ProviderDescriptor::new(EngineKind::Sqlite, ProviderMechanism::Native))
            .unwrap();
        let access = resolver
            .register_provider(ProviderDescriptor::new(EngineKind::Access, ProviderMechanism::OleDb))
            .unwrap();

        let first = resolver.driver_factory(sqlite).unwrap();
        let second = resolver.driver_factory(sqlite).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(matches!(
            resolver.driver_factory(access),
            Err(ForgeError::UnsupportedOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_pools_without_driver_is_noop() {
        let mut resolver = ConnectionResolver::new();
        let access = resolver
            .register_provider(ProviderDescriptor::new(EngineKind::Access, ProviderMechanism::Native))
            .unwrap();
        let p = ConnectionParams {
            data_source: Some("nw.mdb".to_string()),
            ..ConnectionParams::default()
        };
        assert!(resolver.clear_pools(access, &p).await.is_ok());

        let unknown = ProviderDescriptor::new(EngineKind::Sqlite, ProviderMechanism::Odbc)
            .identity()
            .unwrap();
        assert!(resolver.clear_pools(unknown, &p).await.is_err());
    }

    #[test]
    fn test_parse_error_hides_values() {
        let err = ConnectionString::parse("Data Source=db01;Password=hunter2;broken").unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
        assert!(err.to_string().contains("segment 3"));
    }

    #[test]
    fn test_register_provider_is_idempotent() {
        let mut resolver = ConnectionResolver::new();
        let a = resolver
            .register_provider(ProviderDescriptor::new(EngineKind::Sqlite, ProviderMechanism::Native))
            .unwrap();
        let b = resolver
            .register_provider(ProviderDescriptor::new(EngineKind::Sqlite, ProviderMechanism::Native))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(resolver.providers().len(), 1);
    }
}
