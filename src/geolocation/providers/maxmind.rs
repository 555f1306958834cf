//! MaxMind GeoLite2 database provider.
//!
//! Reads the City database file. Users must download the database
//! separately from MaxMind (free with registration).

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use maxminddb::{geoip2, Reader};

use super::GeoProvider;
use crate::geolocation::{GeoError, GeoLocation};

pub struct MaxMindProvider {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindProvider {
    /// Open a GeoLite2-City database file.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, GeoError> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        Ok(MaxMindProvider {
            reader: Arc::new(reader),
        })
    }

    fn lookup_sync(&self, ip: IpAddr) -> Result<Option<GeoLocation>, GeoError> {
        let city: geoip2::City = match self.reader.lookup(ip) {
            Ok(city) => city,
            Err(maxminddb::MaxMindDBError::AddressNotFoundError(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let country_code = city
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .map(String::from);
        let country_name = city
            .country
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|n| n.get("en").copied())
            .map(String::from);

        // A record without a country code is not a usable answer; let the
        // cascade fall through.
        let country_code = match country_code {
            Some(code) => code,
            None => return Ok(None),
        };

        let mut location = GeoLocation {
            country_name: country_name.unwrap_or_else(|| country_code.clone()),
            country_code,
            city: city
                .city
                .and_then(|c| c.names)
                .and_then(|n| n.get("en").copied())
                .map(String::from),
            extra: Default::default(),
        };
        if let Some(continent) = city
            .continent
            .and_then(|c| c.code)
        {
            location
                .extra
                .insert("continent".to_string(), continent.to_string());
        }
        if let Some(tz) = city.location.and_then(|l| l.time_zone) {
            location.extra.insert("timezone".to_string(), tz.to_string());
        }

        Ok(Some(location))
    }
}

impl Clone for MaxMindProvider {
    fn clone(&self) -> Self {
        MaxMindProvider {
            reader: Arc::clone(&self.reader),
        }
    }
}

#[async_trait]
impl GeoProvider for MaxMindProvider {
    fn name(&self) -> &'static str {
        "maxmind"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoLocation>, GeoError> {
        self.lookup_sync(ip)
    }
}
