//! Aftershock catalog around the mainshock.
//!
//! Search thresholds scale with mainshock magnitude and can be overridden
//! per selection through the `as-dist` / `as-mag` parameters.

use serde_json::Value;

use crate::app::keys;
use crate::errors::QuakeError;
use crate::feed::{FeedDescriptor, USGS_BASE_URL};
use crate::features::{
    FeedRequest, Feature, MapLayer, Marker, PlotSeries, SessionContext, Summary,
};
use crate::models::{Catalog, Mainshock};
use crate::util::format_mag;

pub const ID: &str = "aftershocks";

const DEPENDENCIES: &[&str] = &[super::mainshock::ID];

/// Minimum search radius in km regardless of magnitude.
const MIN_RADIUS_KM: f64 = 5.0;

/// Default search radius: 5 km per rounded magnitude unit above M 2.
#[must_use]
pub fn default_radius_km(mag: f64) -> f64 {
    ((mag - 2.0).round_ties_even() * 5.0).max(MIN_RADIUS_KM)
}

/// Default magnitude floor: rounded magnitude minus 4, never negative.
#[must_use]
pub fn default_min_mag(mag: f64) -> f64 {
    (mag - 4.0).round_ties_even().max(0.0)
}

/// Catalog feature for events following the mainshock.
#[derive(Debug, Default)]
pub struct AftershocksFeature {
    layer: Option<MapLayer>,
    summary: Option<Summary>,
    plots: Vec<PlotSeries>,
}

impl AftershocksFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn thresholds(ctx: &SessionContext, mainshock: &Mainshock) -> (f64, f64) {
        let radius = ctx
            .params
            .get_f64(keys::AFTERSHOCKS_DIST)
            .unwrap_or_else(|| default_radius_km(mainshock.mag));
        let min_mag = ctx
            .params
            .get_f64(keys::AFTERSHOCKS_MAG)
            .unwrap_or_else(|| default_min_mag(mainshock.mag));
        (radius, min_mag)
    }
}

impl Feature for AftershocksFeature {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &str {
        "Aftershocks"
    }

    fn dependencies(&self) -> &[&'static str] {
        DEPENDENCIES
    }

    fn request(&self, ctx: &SessionContext) -> Option<FeedRequest> {
        let mainshock = ctx.mainshock.as_ref()?;
        let (radius, min_mag) = Self::thresholds(ctx, mainshock);
        let start = (mainshock.time + chrono::Duration::seconds(1))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        let url = format!(
            "{USGS_BASE_URL}/fdsnws/event/1/query?format=geojson&starttime={start}\
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

        // the query window starts after the mainshock, but the catalog can
        // still echo it back on boundary timestamps
        let quakes: Vec<_> = catalog
            .features
            .iter()
            .filter(|q| q.id != mainshock.id)
            .collect();

        self.layer = Some(MapLayer {
            markers: quakes
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

        if quakes.is_empty() {
            self.summary = Some(Summary::none_found("Aftershocks", "aftershocks"));
            self.plots.clear();
            return Ok(());
        }

        let (radius, min_mag) = Self::thresholds(ctx, mainshock);
        let largest = quakes
            .iter()
            .filter_map(|q| q.properties.mag)
            .fold(f64::NEG_INFINITY, f64::max);
        self.summary = Some(Summary::new(
            "Aftershocks",
            vec![
                format!(
                    "{} aftershocks of M {}+ within {radius} km",
                    quakes.len(),
                    format_mag(Some(min_mag)),
                ),
                format!("Largest: M {}", format_mag(Some(largest))),
            ],
            quakes.len(),
        ));

        let mut times: Vec<f64> = Vec::with_capacity(quakes.len());
        let mut mags: Vec<f64> = Vec::with_capacity(quakes.len());
        for quake in &quakes {
            if let (Some(time), Some(mag)) = (quake.time(), quake.properties.mag) {
                let days = (time - mainshock.time).num_seconds() as f64 / 86_400.0;
                times.push(days);
                mags.push(mag);
            }
        }
        let cumulative: Vec<f64> = (1..=times.len()).map(|n| n as f64).collect();
        self.plots = vec![
            PlotSeries {
                name: "Magnitude vs. Time".into(),
                x: times.clone(),
                y: mags,
            },
            PlotSeries {
                name: "Cumulative Aftershocks".into(),
                x: times,
                y: cumulative,
            },
        ];
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
}
