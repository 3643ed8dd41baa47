//! Cities exposed to shaking, from the PAGER loss product.
//!
//! PAGER is not produced for every event. When the mainshock carries no
//! losspager product the feature settles as derived with a "not available"
//! summary instead of fetching.

use serde_json::Value;

use crate::errors::QuakeError;
use crate::feed::FeedDescriptor;
use crate::features::{
    FeedRequest, Feature, MapLayer, Marker, PlotSeries, SessionContext, Summary,
};
use crate::models::CityList;
use crate::util::format_count;

pub const ID: &str = "pager-cities";

const DEPENDENCIES: &[&str] = &[super::mainshock::ID];

/// Content path of the city list inside the losspager product.
const CITIES_CONTENT: &str = "json/cities.json";

/// How many cities the summary lists.
const TOP_CITIES: usize = 5;

/// PAGER exposed-cities feature.
#[derive(Debug, Default)]
pub struct PagerCitiesFeature {
    layer: Option<MapLayer>,
    summary: Option<Summary>,
}

impl PagerCitiesFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Url of a content entry inside the mainshock's losspager product.
fn pager_content_url(ctx: &SessionContext, content: &str) -> Option<String> {
    let mainshock = ctx.mainshock.as_ref()?;
    let product = mainshock.product("losspager")?;
    product.contents.get(content).map(|c| c.url.clone())
}

impl Feature for PagerCitiesFeature {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &str {
        "PAGER Cities"
    }

    fn dependencies(&self) -> &[&'static str] {
        DEPENDENCIES
    }

    fn request(&self, ctx: &SessionContext) -> Option<FeedRequest> {
        let url = pager_content_url(ctx, CITIES_CONTENT)?;
        Some(FeedRequest::new(FeedDescriptor::new(ID, self.name(), url)))
    }

    fn add_data(&mut self, _ctx: &mut SessionContext, payload: &Value) -> Result<(), QuakeError> {
        let list: CityList = serde_json::from_value(payload.clone())?;

        self.layer = Some(MapLayer {
            markers: list
                .cities
                .iter()
                .map(|city| Marker {
                    latitude: city.latitude,
                    longitude: city.longitude,
                    label: format!(
                        "{} (pop {}, MMI {:.1})",
                        city.name,
                        format_count(city.population),
                        city.mmi
                    ),
                    magnitude: None,
                })
                .collect(),
        });

        if list.cities.is_empty() {
            self.summary = Some(Summary::none_found("PAGER Cities", "exposed cities"));
            return Ok(());
        }

        let mut ranked: Vec<_> = list.cities.iter().collect();
        ranked.sort_by(|a, b| b.population.cmp(&a.population));
        let mut lines = vec![format!("{} cities in the exposure area", list.cities.len())];
        for city in ranked.iter().take(TOP_CITIES) {
            lines.push(format!(
                "{}  pop {}  MMI {:.1}",
                city.name,
                format_count(city.population),
                city.mmi
            ));
        }
        self.summary = Some(Summary::new("PAGER Cities", lines, list.cities.len()));
        Ok(())
    }

    /// No losspager product on the event: settle with an explanatory
    /// summary rather than an error.
    fn derive(&mut self, _ctx: &SessionContext) -> Result<(), QuakeError> {
        self.layer = Some(MapLayer::default());
        self.summary = Some(Summary::new(
            "PAGER Cities",
            vec!["PAGER exposure data not available for this event".into()],
            0,
        ));
        Ok(())
    }

    fn clear(&mut self) {
        self.layer = None;
        self.summary = None;
    }

    fn map_layer(&self) -> Option<&MapLayer> {
        self.layer.as_ref()
    }

    fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    fn plots(&self) -> &[PlotSeries] {
        &[]
    }
}
