//! Population exposure by shaking intensity, from the PAGER loss product.
//!
//! Depends on `pager-cities` rather than the mainshock directly: the
//! exposure summary cross-references the city list, so it only makes sense
//! once that payload is in the session. The content url still comes from
//! the mainshock's losspager product.

use serde_json::Value;

use crate::errors::QuakeError;
use crate::feed::FeedDescriptor;
use crate::features::{
    FeedRequest, Feature, MapLayer, PlotSeries, SessionContext, Summary,
};
use crate::models::{CityList, ExposureTable};
use crate::util::format_count;

pub const ID: &str = "pager-exposures";

const DEPENDENCIES: &[&str] = &[super::pager_cities::ID];

/// Content path of the exposure table inside the losspager product.
const EXPOSURES_CONTENT: &str = "json/exposures.json";

/// Bins below this intensity are omitted from the summary.
const MIN_REPORTED_MMI: f64 = 5.0;

const ROMAN: [&str; 10] = ["I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X"];

/// Roman-numeral label for an MMI bin, as PAGER onepagers print them.
#[must_use]
pub fn mmi_label(mmi: f64) -> &'static str {
    let idx = mmi.round_ties_even() as usize;
    ROMAN.get(idx.saturating_sub(1)).copied().unwrap_or("X+")
}

/// PAGER population-exposure feature.
#[derive(Debug, Default)]
pub struct PagerExposuresFeature {
    summary: Option<Summary>,
    plots: Vec<PlotSeries>,
}

impl PagerExposuresFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Feature for PagerExposuresFeature {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &str {
        "Population Exposure"
    }

    fn dependencies(&self) -> &[&'static str] {
        DEPENDENCIES
    }

    fn request(&self, ctx: &SessionContext) -> Option<FeedRequest> {
        let mainshock = ctx.mainshock.as_ref()?;
        let product = mainshock.product("losspager")?;
        let url = product.contents.get(EXPOSURES_CONTENT)?.url.clone();
        Some(FeedRequest::new(FeedDescriptor::new(ID, self.name(), url)))
    }

    fn add_data(&mut self, ctx: &mut SessionContext, payload: &Value) -> Result<(), QuakeError> {
        let table: ExposureTable = serde_json::from_value(payload.clone())?;
        table.validate()?;

        let exposure = &table.population_exposure;
        let mut lines = Vec::new();
        let mut total: u64 = 0;
        for (mmi, count) in exposure.mmi.iter().zip(&exposure.aggregated_exposure) {
            if *mmi >= MIN_REPORTED_MMI && *count > 0 {
                lines.push(format!(
                    "MMI {:>4}: {} people",
                    mmi_label(*mmi),
                    format_count(*count)
                ));
                total += count;
            }
        }

        if lines.is_empty() {
            self.summary = Some(Summary::none_found(
                "Population Exposure",
                "population at MMI V or greater",
            ));
            self.plots.clear();
            return Ok(());
        }

        lines.insert(0, format!("{} people at MMI V+", format_count(total)));

        // joined from the dependency's payload snapshot
        if let Some(cities) = ctx.payload(super::pager_cities::ID) {
            if let Ok(list) = serde_json::from_value::<CityList>(cities.clone()) {
                lines.push(format!("{} exposed cities listed", list.cities.len()));
            }
        }

        let bin_count = lines.len();
        self.summary = Some(Summary::new("Population Exposure", lines, bin_count));
        self.plots = vec![PlotSeries {
            name: "Population by MMI".into(),
            x: exposure.mmi.clone(),
            y: exposure
                .aggregated_exposure
                .iter()
                .map(|&c| c as f64)
                .collect(),
        }];
        Ok(())
    }

    /// No losspager product on the event.
    fn derive(&mut self, _ctx: &SessionContext) -> Result<(), QuakeError> {
        self.summary = Some(Summary::new(
            "Population Exposure",
            vec!["PAGER exposure data not available for this event".into()],
            0,
        ));
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
