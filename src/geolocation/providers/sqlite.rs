//! Local SQL database provider.
//!
//! Exact-IP lookups against an `ip_locations` table, created on open if
//! absent. Useful for site-local overrides and air-gapped deployments
//! where a curated table replaces an online service.

use std::net::IpAddr;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::GeoProvider;
use crate::geolocation::{GeoError, GeoLocation};

pub struct SqliteProvider {
    conn: Mutex<Connection>,
}

impl SqliteProvider {
    /// Open (or create) the database at the given path.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, GeoError> {
        let conn = Connection::open(db_path)?;
        let provider = SqliteProvider {
            conn: Mutex::new(conn),
        };
        provider.initialize_schema()?;
        Ok(provider)
    }

    /// In-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, GeoError> {
        let conn = Connection::open_in_memory()?;
        let provider = SqliteProvider {
            conn: Mutex::new(conn),
        };
        provider.initialize_schema()?;
        Ok(provider)
    }

    fn initialize_schema(&self) -> Result<(), GeoError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ip_locations (
                ip TEXT PRIMARY KEY,
                country_code TEXT NOT NULL,
                country_name TEXT NOT NULL,
                city TEXT
            )",
        )?;
        Ok(())
    }

    /// Insert or replace a curated location row.
    pub fn add_location(
        &self,
        ip: &IpAddr,
        country_code: &str,
        country_name: &str,
        city: Option<&str>,
    ) -> Result<(), GeoError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO ip_locations (ip, country_code, country_name, city)
             VALUES (?, ?, ?, ?)",
            params![ip.to_string(), country_code, country_name, city],
        )?;
        Ok(())
    }

    fn lookup_sync(&self, ip: IpAddr) -> Result<Option<GeoLocation>, GeoError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT country_code, country_name, city FROM ip_locations WHERE ip = ?",
        )?;

        let result = stmt.query_row(params![ip.to_string()], |row| {
            let country_code: String = row.get(0)?;
            let country_name: String = row.get(1)?;
            let city: Option<String> = row.get(2)?;
            Ok(GeoLocation {
                country_code,
                country_name,
                city,
                extra: Default::default(),
            })
        });

        match result {
            Ok(location) => Ok(Some(location)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl GeoProvider for SqliteProvider {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoLocation>, GeoError> {
        self.lookup_sync(ip)
    }
}
