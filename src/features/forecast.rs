//! Aftershock forecast derived from the mainshock magnitude.
//!
//! Reasenberg & Jones (1989) rate model with generic parameters: the daily
//! rate of aftershocks of magnitude m or larger after a mainshock of
//! magnitude M is `10^(a + b(M - m)) * (t + c)^-p`. Expected counts over a
//! forward window come from integrating the rate; the probability of at
//! least one event is `1 - exp(-N)`. No fetch: everything follows from data
//! the mainshock feature already published.

use crate::errors::QuakeError;
use crate::features::{
    FeedRequest, Feature, MapLayer, PlotSeries, SessionContext, Summary,
};
use crate::util::round_to;

pub const ID: &str = "forecast";

const DEPENDENCIES: &[&str] = &[super::mainshock::ID];

/// Generic Reasenberg-Jones productivity constant.
const RJ_A: f64 = -1.67;
/// Magnitude scaling constant.
const RJ_B: f64 = 0.91;
/// Omori time offset in days.
const RJ_C: f64 = 0.05;
/// Omori decay exponent.
const RJ_P: f64 = 1.08;

/// Forward windows in days, labelled for the summary table.
const WINDOWS: &[(f64, &str)] = &[(1.0, "next day"), (7.0, "next 7 days"), (30.0, "next 30 days")];

/// Lowest magnitude bin the table reports.
const MIN_BIN: i32 = 3;

/// Expected number of aftershocks of magnitude `m` or larger within
/// `days` days of a magnitude-`mainshock_mag` mainshock.
#[must_use]
pub fn expected_count(mainshock_mag: f64, m: f64, days: f64) -> f64 {
    let productivity = 10_f64.powf(RJ_A + RJ_B * (mainshock_mag - m));
    let exponent = 1.0 - RJ_P;
    let integral = ((days + RJ_C).powf(exponent) - RJ_C.powf(exponent)) / exponent;
    productivity * integral
}

/// Probability of at least one event given a Poisson expectation.
#[must_use]
pub fn probability(expected: f64) -> f64 {
    1.0 - (-expected).exp()
}

/// Derived forecast feature; carries no map layer.
#[derive(Debug, Default)]
pub struct ForecastFeature {
    summary: Option<Summary>,
    plots: Vec<PlotSeries>,
}

impl ForecastFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Feature for ForecastFeature {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &str {
        "Aftershock Forecast"
    }

    fn dependencies(&self) -> &[&'static str] {
        DEPENDENCIES
    }

    fn request(&self, _ctx: &SessionContext) -> Option<FeedRequest> {
        None
    }

    fn derive(&mut self, ctx: &SessionContext) -> Result<(), QuakeError> {
        let mainshock = ctx.require_mainshock()?;

        let top_bin = mainshock.mag.floor() as i32;
        let bins: Vec<i32> = (MIN_BIN..=top_bin.max(MIN_BIN)).collect();

        let mut lines = Vec::with_capacity(bins.len() * WINDOWS.len());
        for &bin in &bins {
            for &(days, label) in WINDOWS {
                let expected = expected_count(mainshock.mag, f64::from(bin), days);
                let chance = probability(expected);
                lines.push(format!(
                    "M {bin}+ {label}: {} expected ({}% chance of one or more)",
                    round_to(expected, 1),
                    round_to(chance * 100.0, 0),
                ));
            }
        }
        self.summary = Some(Summary::new("Aftershock Forecast", lines, bins.len()));

        let week: Vec<f64> = bins
            .iter()
            .map(|&bin| expected_count(mainshock.mag, f64::from(bin), 7.0))
            .collect();
        self.plots = vec![PlotSeries {
            name: "Expected Aftershocks (7 days)".into(),
            x: bins.iter().map(|&b| f64::from(b)).collect(),
            y: week,
        }];
        Ok(())
    }

    fn clear(&mut self) {
        self.summary = None;
        self.plots.clear();
    }

    fn map_layer(&self) -> Option<&MapLayer> {
        None
    }

    fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    fn plots(&self) -> &[PlotSeries] {
        &self.plots
    }

    fn show_layer(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::QueryParams;
    use crate::models::{EventDetail, Mainshock};

    fn context_with_mainshock() -> SessionContext {
        let json = serde_json::json!({
            "type": "Feature",
            "id": "us7000abcd",
            "geometry": {"type": "Point", "coordinates": [-117.5, 35.77, 8.0]},
            "properties": {
                "mag": 6.5,
                "place": "16km SW of Searles Valley, CA",
                "time": 1_562_383_193_040_i64,
                "updated": 1_562_385_000_000_i64
            }
        });
        let detail: EventDetail = serde_json::from_value(json).expect("valid detail");
        let mut ctx = SessionContext::new("us7000abcd", 1, QueryParams::new());
        ctx.mainshock = Some(Mainshock::from_detail(&detail).expect("valid mainshock"));
        ctx
    }

    #[test]
    fn test_expected_count_decreases_with_magnitude() {
        let m3 = expected_count(6.5, 3.0, 7.0);
        let m5 = expected_count(6.5, 5.0, 7.0);
        let m6 = expected_count(6.5, 6.0, 7.0);
        assert!(m3 > m5);
        assert!(m5 > m6);
        assert!(m6 > 0.0);
    }

    #[test]
    fn test_expected_count_grows_with_window() {
        let day = expected_count(6.5, 4.0, 1.0);
        let month = expected_count(6.5, 4.0, 30.0);
        assert!(month > day);
    }

    #[test]
    fn test_probability_bounds() {
        assert!(probability(0.0).abs() < f64::EPSILON);
        assert!(probability(100.0) > 0.999);
        let p = probability(expected_count(6.5, 6.0, 7.0));
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn test_derive_builds_bins_up_to_mainshock() {
        let mut feature = ForecastFeature::new();
        let ctx = context_with_mainshock();
        feature.derive(&ctx).expect("derivable");

        // M 6.5 -> bins 3..=6, three windows each
        let summary = feature.summary().expect("summary built");
        assert_eq!(summary.count, 4);
        assert_eq!(summary.lines.len(), 12);
        assert!(summary.lines[0].starts_with("M 3+ next day"));

        assert_eq!(feature.plots().len(), 1);
        assert_eq!(feature.plots()[0].x, vec![3.0, 4.0, 5.0, 6.0]);
        assert!(feature.map_layer().is_none());
    }

    #[test]
    fn test_no_fetch() {
        let feature = ForecastFeature::new();
        let ctx = context_with_mainshock();
        assert!(feature.request(&ctx).is_none());
    }
}
