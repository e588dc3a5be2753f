//! SQL Server driver factory
//!
//! Uses tiberius over a tokio `TcpStream`. Each call to `connect` opens a
//! new TCP connection; nothing is pooled, so `clear_pools` has nothing to do.

use crate::database::connection::{AdminConnection, ConnectionString, DriverFactory};
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// Where to reach a server, parsed from `host[\instance][,port]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServerAddress {
    host: String,
    instance: Option<String>,
    port: Option<u16>,
}

impl ServerAddress {
    fn parse(data_source: &str) -> Result<Self> {
        let text = data_source.trim();
        let text = text.strip_prefix("tcp:").unwrap_or(text);

        let (host_part, port) = match text.split_once(',') {
            Some((host, port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    ForgeError::Config(format!("invalid port in data source '{}'", data_source))
                })?;
                (host, Some(port))
            }
            None => (text, None),
        };

        let (host, instance) = match host_part.split_once('\\') {
            Some((host, instance)) => (host, Some(instance.to_string())),
            None => (host_part, None),
        };

        let host = match host.trim() {
            "" | "." | "(local)" => "localhost".to_string(),
            other => other.to_string(),
        };

        Ok(Self { host, instance, port })
    }
}

/// SQL Server driver backed by tiberius
#[derive(Debug, Default)]
pub struct TiberiusDriver;

impl TiberiusDriver {
    pub fn new() -> Self {
        Self
    }

    fn build_config(connection_string: &ConnectionString) -> Result<(Config, bool)> {
        let data_source = connection_string
            .get("Data Source")
            .or_else(|| connection_string.get("Server"))
            .ok_or_else(|| ForgeError::Config("SQL Server connection string has no Data Source".into()))?;
        let address = ServerAddress::parse(data_source)?;

        let mut config = Config::new();
        config.host(&address.host);
        if let Some(port) = address.port {
            config.port(port);
        }
        if let Some(instance) = &address.instance {
            config.instance_name(instance);
        }
        if let Some(database) = connection_string.get("Database") {
            config.database(database);
        }

        match connection_string.get("User ID") {
            Some(user) => config.authentication(AuthMethod::sql_server(
                user,
                connection_string.get("Password").unwrap_or_default(),
            )),
            None => config.authentication(integrated_auth()?),
        }

        let encrypted = connection_string
            .get("Encrypt")
            .map_or(false, |v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"));
        if encrypted {
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }
        config.trust_cert();

        let named = address.instance.is_some() && address.port.is_none();
        Ok((config, named))
    }
}

#[cfg(windows)]
fn integrated_auth() -> Result<AuthMethod> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(windows))]
fn integrated_auth() -> Result<AuthMethod> {
    Err(ForgeError::connection(
        "sqlserver",
        "integrated authentication is only available on Windows; supply a user id",
    ))
}

#[async_trait]
impl DriverFactory for TiberiusDriver {
    fn name(&self) -> &str {
        "sqlserver"
    }

    async fn connect(&self, connection_string: &ConnectionString) -> Result<Box<dyn AdminConnection>> {
        let (config, named) = Self::build_config(connection_string)?;

        let tcp = if named {
            TcpStream::connect_named(&config).await?
        } else {
            TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| ForgeError::connection("sqlserver", e))?
        };
        tcp.set_nodelay(true)
            .map_err(|e| ForgeError::connection("sqlserver", e))?;

        let client = Client::connect(config, tcp.compat_write()).await?;
        debug!(connection = %connection_string.redacted(), "Connected to SQL Server");
        Ok(Box::new(TiberiusConnection { client }))
    }

    async fn clear_pools(&self, _connection_string: &ConnectionString) -> Result<()> {
        debug!("SQL Server connections are not pooled");
        Ok(())
    }
}

struct TiberiusConnection {
    client: Client<Compat<TcpStream>>,
}

#[async_trait]
impl AdminConnection for TiberiusConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = self.client.execute(sql, &[]).await?;
        Ok(result.total())
    }

    async fn query_column(&mut self, sql: &str) -> Result<Vec<String>> {
        let rows = self.client.simple_query(sql).await?.into_first_result().await?;
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(value) = row.try_get::<&str, _>(0)? {
                values.push(value.to_string());
            }
        }
        Ok(values)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_address() {
        assert_eq!(
            ServerAddress::parse("db01,1433").unwrap(),
            ServerAddress { host: "db01".into(), instance: None, port: Some(1433) }
        );
        assert_eq!(
            ServerAddress::parse(r".\SQLEXPRESS").unwrap(),
            ServerAddress { host: "localhost".into(), instance: Some("SQLEXPRESS".into()), port: None }
        );
        assert_eq!(ServerAddress::parse("tcp:db02").unwrap().host, "db02");
        assert!(ServerAddress::parse("db01,notaport").is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_integrated_auth_rejected() {
        let cs = ConnectionString::parse("Data Source=db01;Integrated Security=SSPI").unwrap();
        assert!(matches!(
            TiberiusDriver::build_config(&cs),
            Err(ForgeError::Connection { .. })
        ));
    }

    #[cfg(windows)]
    #[test]
    fn test_integrated_auth_accepted() {
        let cs = ConnectionString::parse("Data Source=db01;Integrated Security=SSPI").unwrap();
        assert!(TiberiusDriver::build_config(&cs).is_ok());
    }

    #[test]
    fn test_named_instance_uses_browser() {
        let cs = ConnectionString::parse(r"Data Source=db01\SALES;Database=master;User ID=sa;Password=x").unwrap();
        let (_, named) = TiberiusDriver::build_config(&cs).unwrap();
        assert!(named);

        let cs = ConnectionString::parse("Data Source=db01,1433;User ID=sa;Password=x").unwrap();
        let (_, named) = TiberiusDriver::build_config(&cs).unwrap();
        assert!(!named);
    }
}
