//! Locations endpoint

use super::{resource_path, V2};
use crate::archivist::{decode, decode_all, Archivist};
use crate::error::{ArchivistError, ArchivistResult};
use crate::params::Criteria;
use archivist_model::{Attributes, Location};
use serde_json::{Map, Value};

const LABEL: &str = "locations";

/// Access to `v2/locations`
#[derive(Debug, Clone, Copy)]
pub struct LocationsClient<'a> {
    archivist: &'a Archivist,
}

impl<'a> LocationsClient<'a> {
    pub(crate) fn new(archivist: &'a Archivist) -> Self {
        Self { archivist }
    }

    fn collection() -> String {
        format!("{V2}/{LABEL}")
    }

    fn query(&self, criteria: &Criteria) -> Value {
        self.archivist.with_fixture(LABEL, criteria.to_value())
    }

    /// Create a location from properties and attributes
    pub async fn create(&self, props: Value, attrs: Attributes) -> ArchivistResult<Location> {
        let mut body = match props {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ArchivistError::invalid_request("location props must be an object")),
        };
        body.insert(
            "attributes".into(),
            Value::Object(attrs.into_inner().into_iter().collect()),
        );
        let body = self.archivist.with_fixture(LABEL, Value::Object(body));
        self.create_from_data(body).await
    }

    /// Create a location from a complete request body
    pub async fn create_from_data(&self, data: Value) -> ArchivistResult<Location> {
        let location: Location = decode(self.archivist.post(&Self::collection(), data).await?)?;
        tracing::info!(identity = %location.identity, "location created");
        Ok(location)
    }

    /// Create a location unless one matching `data.selector` exists
    ///
    /// Returns the location and whether it already existed.
    pub async fn create_if_not_exists(&self, data: Value) -> ArchivistResult<(Location, bool)> {
        let Value::Object(mut data) = data else {
            return Err(ArchivistError::invalid_request("location data must be an object"));
        };
        let selector = data
            .remove("selector")
            .ok_or_else(|| ArchivistError::invalid_request("location data has no selector"))?;
        let data = Value::Object(data);
        let criteria = Criteria::from_selector(&selector, &data)?;

        match self.read_by_signature(&criteria).await {
            Ok(location) => {
                tracing::info!(identity = %location.identity, "location already exists");
                Ok((location, true))
            }
            Err(ArchivistError::NotFound { .. }) => {
                tracing::info!("location does not exist, creating");
                let body = self.archivist.with_fixture(LABEL, data);
                Ok((self.create_from_data(body).await?, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Read a location
    pub async fn read(&self, identity: &str) -> ArchivistResult<Location> {
        decode(self.archivist.get(&resource_path(V2, identity)).await?)
    }

    /// List locations matching `criteria`
    pub async fn list(&self, criteria: &Criteria) -> ArchivistResult<Vec<Location>> {
        let records = self
            .archivist
            .list(&Self::collection(), LABEL, &self.query(criteria))
            .await?;
        decode_all(records)
    }

    /// Count locations matching `criteria`
    pub async fn count(&self, criteria: &Criteria) -> ArchivistResult<u64> {
        self.archivist
            .count(&Self::collection(), &self.query(criteria))
            .await
    }

    /// The single location matching `criteria`
    pub async fn read_by_signature(&self, criteria: &Criteria) -> ArchivistResult<Location> {
        let record = self
            .archivist
            .get_by_signature(&Self::collection(), LABEL, &self.query(criteria))
            .await?;
        decode(record)
    }
}
