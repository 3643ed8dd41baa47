//! Historical seismicity preceding the mainshock.
//!
//! Same catalog endpoint as the aftershock feature but looking backwards:
//! three decades of nearby events up to the mainshock time. Thresholds are
//! wider and can be overridden through `hs-dist` / `hs-mag`.

use serde_json::Value;

use crate::app::keys;
use crate::errors::QuakeError;
use crate::feed::{FeedDescriptor, USGS_BASE_URL};
use crate::features::{
    FeedRequest, Feature, MapLayer, Marker, PlotSeries, SessionContext, Summary,
};
use crate::models::{Catalog, Mainshock};
use crate::util::format_mag;

pub const ID: &str = "historical";

const DEPENDENCIES: &[&str] = &[super::mainshock::ID];

/// How far back the historical window reaches.
const LOOKBACK_DAYS: i64 = 30 * 365;

/// Minimum search radius in km regardless of magnitude.
const MIN_RADIUS_KM: f64 = 15.0;

/// Minimum magnitude floor; historical queries never go below M 3.
const MIN_MAG_FLOOR: f64 = 3.0;

/// Default search radius: 15 km per rounded magnitude unit above M 2.
#[must_use]
pub fn default_radius_km(mag: f64) -> f64 {
    ((mag - 2.0).round_ties_even() * 15.0).max(MIN_RADIUS_KM)
}

/// Default magnitude floor: rounded magnitude minus 3, at least M 3.
#[must_use]
pub fn default_min_mag(mag: f64) -> f64 {
    (mag - 3.0).round_ties_even().max(MIN_MAG_FLOOR)
}

/// Catalog feature for events preceding the mainshock.
#[derive(Debug, Default)]
pub struct HistoricalFeature {
    layer: Option<MapLayer>,
    summary: Option<Summary>,
    plots: Vec<PlotSeries>,
}

impl HistoricalFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn thresholds(ctx: &SessionContext, mainshock: &Mainshock) -> (f64, f64) {
        let radius = ctx
            .params
            .get_f64(keys::HISTORICAL_DIST)
            .unwrap_or_else(|| default_radius_km(mainshock.mag));
        let min_mag = ctx
            .params
            .get_f64(keys::HISTORICAL_MAG)
            .unwrap_or_else(|| default_min_mag(mainshock.mag));
        (radius, min_mag)
    }
}

impl Feature for HistoricalFeature {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &str {
        "Historical Seismicity"
    }

    fn dependencies(&self) -> &[&'static str] {
        DEPENDENCIES
    }

    fn request(&self, ctx: &SessionContext) -> Option<FeedRequest> {
        let mainshock = ctx.mainshock.as_ref()?;
        let (radius, min_mag) = Self::thresholds(ctx, mainshock);
        let start = (mainshock.time - chrono::Duration::days(LOOKBACK_DAYS))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        let end = (mainshock.time - chrono::Duration::seconds(1))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        let url = format!(
            "{USGS_BASE_URL}/fdsnws/event/1/query?format=geojson&starttime={start}&endtime={end}\
             &latitude={lat}&longitude={lon}&maxradiuskm={radius}&minmagnitude={min_mag}\
             &orderby=time",
            lat = mainshock.latitude,
            lon = mainshock.longitude,
        );
        Some(FeedRequest::new(FeedDescriptor::new(ID, self.name(), url)))
    }

    fn add_data(&mut self, ctx: &mut SessionContext, payload: &Value) -> Result<(), QuakeError> {
        let catalog: Catalog = serde_json::from_value(payload.clone())?;
        catalog.validate()?;
        let mainshock = ctx.require_mainshock()?;

        self.layer = Some(MapLayer {
            markers: catalog
                .features
                .iter()
                .map(|q| Marker {
                    latitude: q.geometry.latitude(),
                    longitude: q.geometry.longitude(),
                    label: format!(
                        "M {} {}",
                        format_mag(q.properties.mag),
                        q.properties.place.as_deref().unwrap_or("unknown location"),
                    ),
                    magnitude: q.properties.mag,
                })
                .collect(),
        });

        if catalog.features.is_empty() {
            self.summary = Some(Summary::none_found(
                "Historical Seismicity",
                "prior earthquakes",
            ));
            self.plots.clear();
            return Ok(());
        }

        let (radius, min_mag) = Self::thresholds(ctx, mainshock);
        let largest = catalog
            .features
            .iter()
            .filter_map(|q| q.properties.mag)
            .fold(f64::NEG_INFINITY, f64::max);
        self.summary = Some(Summary::new(
            "Historical Seismicity",
            vec![
                format!(
                    "{} prior earthquakes of M {}+ within {radius} km",
                    catalog.features.len(),
                    format_mag(Some(min_mag)),
                ),
                format!("Largest: M {}", format_mag(Some(largest))),
            ],
            catalog.features.len(),
        ));

        let mut years: Vec<f64> = Vec::with_capacity(catalog.features.len());
        let mut mags: Vec<f64> = Vec::with_capacity(catalog.features.len());
        for quake in &catalog.features {
            if let (Some(time), Some(mag)) = (quake.time(), quake.properties.mag) {
                let before = (mainshock.time - time).num_seconds() as f64 / (86_400.0 * 365.25);
                years.push(-before);
                mags.push(mag);
            }
        }
        self.plots = vec![PlotSeries {
            name: "Magnitude vs. Time".into(),
            x: years,
            y: mags,
        }];
        Ok(())
    }

    fn clear(&mut self) {
        self.layer = None;
        self.summary = None;
        self.plots.clear();
    }

    fn map_layer(&self) -> Option<&MapLayer> {
        self.layer.as_ref()
    }

    fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    fn plots(&self) -> &[PlotSeries] {
        &self.plots
    }

    /// Background context: off by default so the map is not buried in
    /// decades of markers.
    fn show_layer(&self) -> bool {
        false
    }
}
