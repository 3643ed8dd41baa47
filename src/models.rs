//! Data models for the feeds each feature consumes.
//!
//! Every feature owns its schema boundary; these are the typed shapes behind
//! those boundaries: the USGS event-detail GeoJSON document, the fdsnws
//! catalog FeatureCollection, and the PAGER exposure products.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::QuakeError;

/// Geographic geometry: `[longitude, latitude, depth_km]`.
#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// Always "Point"
    #[serde(rename = "type")]
    pub type_: String,

    pub coordinates: Vec<f64>,
}

impl Geometry {
    fn validate(&self) -> Result<(), QuakeError> {
        if self.coordinates.len() != 3 {
            return Err(QuakeError::Malformed(format!(
                "expected 3 coordinates, got {}",
                self.coordinates.len()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.coordinates.first().copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.coordinates.get(1).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn depth_km(&self) -> f64 {
        self.coordinates.get(2).copied().unwrap_or(0.0)
    }
}

// ============================================================================
// Event detail document (mainshock)
// ============================================================================

/// USGS event-detail GeoJSON document for a single event id.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDetail {
    /// Always "Feature"
    #[serde(rename = "type")]
    pub type_: String,

    pub id: String,
    pub geometry: Geometry,
    pub properties: EventProperties,
}

/// Properties of the event-detail document.
#[derive(Debug, Clone, Deserialize)]
pub struct EventProperties {
    pub mag: Option<f64>,

    #[serde(rename = "magType")]
    pub mag_type: Option<String>,

    pub place: Option<String>,

    /// Event time (ms since epoch)
    pub time: i64,

    /// Last update time (ms since epoch)
    pub updated: i64,

    pub status: Option<String>,

    pub alert: Option<String>,

    pub tsunami: Option<i32>,

    pub title: Option<String>,

    /// Derived data products keyed by product type ("shakemap",
    /// "losspager", "moment-tensor", ...); most recent first.
    #[serde(default)]
    pub products: HashMap<String, Vec<ProductSummary>>,
}

/// One entry in a product list.
///
/// USGS product properties are string-valued; `prop_f64` parses the numeric
/// ones on demand.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductSummary {
    pub code: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,

    #[serde(default)]
    pub properties: HashMap<String, Value>,

    #[serde(default)]
    pub contents: HashMap<String, ProductContent>,
}

/// A downloadable content entry inside a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductContent {
    pub url: String,

    #[serde(rename = "contentType")]
    pub content_type: Option<String>,

    pub length: Option<u64>,
}

impl ProductSummary {
    /// Read a product property as f64, tolerating string-encoded numbers.
    #[must_use]
    pub fn prop_f64(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl EventDetail {
    /// Validate the document structure.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Malformed` when the shape is not an event-detail
    /// Feature.
    pub fn validate(&self) -> Result<(), QuakeError> {
        if self.type_ != "Feature" {
            return Err(QuakeError::Malformed(format!(
                "expected type 'Feature', got '{}'",
                self.type_
            )));
        }
        if self.id.is_empty() {
            return Err(QuakeError::Malformed("empty event id".into()));
        }
        self.geometry.validate()
    }

    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.properties.time).single()
    }
}

/// Parsed mainshock projection shared with dependent features.
#[derive(Debug, Clone)]
pub struct Mainshock {
    pub id: String,
    pub mag: f64,
    pub mag_type: Option<String>,
    pub place: String,
    pub alert: Option<String>,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub products: HashMap<String, Vec<ProductSummary>>,
}

impl Mainshock {
    /// Project an event-detail document into the shared mainshock shape.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Malformed` when the document fails validation or
    /// lacks a magnitude or time.
    pub fn from_detail(detail: &EventDetail) -> Result<Self, QuakeError> {
        detail.validate()?;
        let mag = detail
            .properties
            .mag
            .ok_or_else(|| QuakeError::Malformed("event has no magnitude".into()))?;
        let time = detail
            .time()
            .ok_or_else(|| QuakeError::Malformed("event time out of range".into()))?;

        Ok(Self {
            id: detail.id.clone(),
            mag,
            mag_type: detail.properties.mag_type.clone(),
            place: detail
                .properties
                .place
                .clone()
                .unwrap_or_else(|| "Unknown location".into()),
            alert: detail.properties.alert.clone(),
            time,
            latitude: detail.geometry.latitude(),
            longitude: detail.geometry.longitude(),
            depth_km: detail.geometry.depth_km(),
            products: detail.properties.products.clone(),
        })
    }

    /// Most recent product of a given type, if the event carries one.
    #[must_use]
    pub fn product(&self, product_type: &str) -> Option<&ProductSummary> {
        self.products.get(product_type)?.first()
    }
}

// ============================================================================
// Catalog feeds (aftershocks, historical seismicity)
// ============================================================================

/// fdsnws catalog response (GeoJSON FeatureCollection shape).
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    /// Always "FeatureCollection"
    #[serde(rename = "type")]
    pub type_: String,

    pub metadata: Option<CatalogMetadata>,

    pub features: Vec<Earthquake>,
}

/// Metadata block of a catalog response.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogMetadata {
    pub generated: Option<i64>,
    pub count: Option<usize>,
    pub title: Option<String>,
}

/// A single catalog earthquake.
#[derive(Debug, Clone, Deserialize)]
pub struct Earthquake {
    pub id: String,
    pub geometry: Geometry,
    pub properties: EarthquakeProperties,
}

/// Catalog earthquake properties (the subset the features consume).
#[derive(Debug, Clone, Deserialize)]
pub struct EarthquakeProperties {
    pub mag: Option<f64>,
    pub place: Option<String>,
    pub time: i64,
    pub updated: Option<i64>,
}

impl Catalog {
    /// Validate the response structure.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Malformed` for a non-FeatureCollection document.
    pub fn validate(&self) -> Result<(), QuakeError> {
        if self.type_ != "FeatureCollection" {
            return Err(QuakeError::Malformed(format!(
                "expected type 'FeatureCollection', got '{}'",
                self.type_
            )));
        }
        Ok(())
    }
}

impl Earthquake {
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.properties.time).single()
    }
}

// ============================================================================
// PAGER products
// ============================================================================

/// PAGER city list (`cities.json` inside the losspager product).
#[derive(Debug, Clone, Deserialize)]
pub struct CityList {
    #[serde(rename = "onepager_cities", default)]
    pub cities: Vec<CityExposure>,
}

/// One exposed city.
#[derive(Debug, Clone, Deserialize)]
pub struct CityExposure {
    #[serde(rename = "city_name", alias = "name")]
    pub name: String,
    pub population: u64,
    pub mmi: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// PAGER population exposure table (`exposures.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct ExposureTable {
    pub population_exposure: PopulationExposure,
}

/// Population counts binned by Modified Mercalli Intensity.
#[derive(Debug, Clone, Deserialize)]
pub struct PopulationExposure {
    pub mmi: Vec<f64>,
    pub aggregated_exposure: Vec<u64>,
}

impl ExposureTable {
    /// Validate the bin/count alignment.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Malformed` when the two arrays disagree.
    pub fn validate(&self) -> Result<(), QuakeError> {
        let bins = self.population_exposure.mmi.len();
        let counts = self.population_exposure.aggregated_exposure.len();
        if bins != counts {
            return Err(QuakeError::Malformed(format!(
                "exposure table has {bins} MMI bins but {counts} counts"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_JSON: &str = r#"{
        "type": "Feature",
        "id": "us7000abcd",
        "geometry": {"type": "Point", "coordinates": [-117.5, 35.77, 8.0]},
        "properties": {
            "mag": 6.5,
            "magType": "mw",
            "place": "16km SW of Searles Valley, CA",
            "time": 1562383193040,
            "updated": 1562385000000,
            "status": "reviewed",
            "alert": "yellow",
            "tsunami": 0,
            "title": "M 6.5 - 16km SW of Searles Valley, CA",
            "products": {
                "moment-tensor": [{
                    "code": "us_7000abcd_mww",
                    "source": "us",
                    "status": "UPDATE",
                    "properties": {
                        "scalar-moment": "7.06e+18",
                        "derived-magnitude": "6.5",
                        "nodal-plane-1-strike": "137.9",
                        "nodal-plane-1-dip": "85.8",
                        "nodal-plane-1-rake": "-175.8",
                        "nodal-plane-2-strike": "47.6",
                        "nodal-plane-2-dip": "85.8",
                        "nodal-plane-2-rake": "-4.2"
                    }
                }]
            }
        }
    }"#;

    #[test]
    fn test_parse_event_detail() {
        let detail: EventDetail =
            serde_json::from_str(DETAIL_JSON).expect("failed to parse detail");
        detail.validate().expect("invalid detail");
        assert_eq!(detail.id, "us7000abcd");
        assert!((detail.geometry.latitude() - 35.77).abs() < 0.001);
        assert!((detail.geometry.depth_km() - 8.0).abs() < 0.001);
    }

    #[test]
    fn test_mainshock_projection() {
        let detail: EventDetail =
            serde_json::from_str(DETAIL_JSON).expect("failed to parse detail");
        let mainshock = Mainshock::from_detail(&detail).expect("invalid mainshock");
        assert!((mainshock.mag - 6.5).abs() < 0.001);

        let tensor = mainshock.product("moment-tensor").expect("missing product");
        assert!((tensor.prop_f64("scalar-moment").expect("moment") - 7.06e18).abs() < 1e15);
        assert!((tensor.prop_f64("nodal-plane-1-strike").expect("strike") - 137.9).abs() < 0.01);
        assert!(mainshock.product("shakemap").is_none());
    }

    #[test]
    fn test_mainshock_requires_magnitude() {
        let json = r#"{
            "type": "Feature",
            "id": "us7000abcd",
            "geometry": {"type": "Point", "coordinates": [0.0, 0.0, 0.0]},
            "properties": {"mag": null, "time": 0, "updated": 0}
        }"#;
        let detail: EventDetail = serde_json::from_str(json).expect("failed to parse");
        assert!(Mainshock::from_detail(&detail).is_err());
    }

    #[test]
    fn test_parse_empty_catalog() {
        let json = r#"{
            "type": "FeatureCollection",
            "metadata": {"generated": 1562383193040, "count": 0, "title": "USGS Earthquakes"},
            "features": []
        }"#;
        let catalog: Catalog = serde_json::from_str(json).expect("failed to parse catalog");
        catalog.validate().expect("invalid catalog");
        assert!(catalog.features.is_empty());
    }

    #[test]
    fn test_catalog_rejects_wrong_type() {
        let json = r#"{"type": "Feature", "metadata": null, "features": []}"#;
        let catalog: Catalog = serde_json::from_str(json).expect("failed to parse");
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_exposure_table_alignment() {
        let json = r#"{
            "population_exposure": {
                "mmi": [1.0, 2.0, 3.0],
                "aggregated_exposure": [0, 15000]
            }
        }"#;
        let table: ExposureTable = serde_json::from_str(json).expect("failed to parse");
        assert!(table.validate().is_err());
    }
}
