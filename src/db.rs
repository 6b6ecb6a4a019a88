use std::env;
use std::error::Error;

use log::info;
use postgres::{Client, Config, NoTls};

/// Open a blocking connection to `database`.
///
/// `POSTGRES_HOST` and `POSTGRES_PORT` default to localhost:5432.
/// `POSTGRES_USER` and `POSTGRES_PASSWORD` have no defaults and must be in
/// the environment (a `.env` file works, see the README).  Connection
/// failures propagate immediately; there is no retry.
pub fn connect(database: &str) -> Result<Client, Box<dyn Error>> {
    let host = env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_owned());
    let port: u16 = env::var("POSTGRES_PORT")
        .unwrap_or_else(|_| "5432".to_owned())
        .parse()
        .map_err(|e| format!("invalid POSTGRES_PORT: {}", e))?;
    let user = env::var("POSTGRES_USER").map_err(|_| "POSTGRES_USER is not set")?;
    let password = env::var("POSTGRES_PASSWORD").map_err(|_| "POSTGRES_PASSWORD is not set")?;

    info!("connecting to {}@{}:{}/{}", user, host, port, database);
    let client = Config::new()
        .host(&host)
        .port(port)
        .user(&user)
        .password(password)
        .dbname(database)
        .connect(NoTls)?;
    Ok(client)
}
