//! The selected event itself.
//!
//! Root of the dependency graph: every other feature waits for this one.
//! On success the parsed `Mainshock` projection is published into the
//! session context for dependents to read.

use serde_json::Value;

use crate::app::keys;
use crate::errors::QuakeError;
use crate::feed::{FeedDescriptor, USGS_BASE_URL};
use crate::features::{
    FeedRequest, Feature, MapLayer, Marker, PlotSeries, SessionContext, Summary,
};
use crate::models::{EventDetail, Mainshock};
use crate::util::format_mag;

pub const ID: &str = "mainshock";

/// Detail-feed feature for the selected event id.
#[derive(Debug, Default)]
pub struct MainshockFeature {
    layer: Option<MapLayer>,
    summary: Option<Summary>,
}

impl MainshockFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Feature for MainshockFeature {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &str {
        "Mainshock"
    }

    fn request(&self, ctx: &SessionContext) -> Option<FeedRequest> {
        let eqid = ctx.params.get(keys::EQID).unwrap_or(&ctx.eqid).to_string();
        let url = format!("{USGS_BASE_URL}/fdsnws/event/1/query?eventid={eqid}&format=geojson");
        Some(FeedRequest::new(
            FeedDescriptor::new(ID, self.name(), url).with_not_found_hint(&eqid),
        ))
    }

    fn add_data(&mut self, ctx: &mut SessionContext, payload: &Value) -> Result<(), QuakeError> {
        let detail: EventDetail = serde_json::from_value(payload.clone())?;
        let mainshock = Mainshock::from_detail(&detail)?;

        self.layer = Some(MapLayer {
            markers: vec![Marker {
                latitude: mainshock.latitude,
                longitude: mainshock.longitude,
                label: format!("M {} {}", format_mag(Some(mainshock.mag)), mainshock.place),
                magnitude: Some(mainshock.mag),
            }],
        });

        let title = format!("M {} - {}", format_mag(Some(mainshock.mag)), mainshock.place);
        let lines = vec![
            format!("Time      {}", mainshock.time.format("%Y-%m-%d %H:%M:%S UTC")),
            format!(
                "Location  {:.3}, {:.3}",
                mainshock.latitude, mainshock.longitude
            ),
            format!("Depth     {:.1} km", mainshock.depth_km),
            format!(
                "Magnitude {} {}",
                format_mag(Some(mainshock.mag)),
                mainshock.mag_type.as_deref().unwrap_or("")
            ),
        ];
        self.summary = Some(Summary::new(&title, lines, 1));

        ctx.mainshock = Some(mainshock);
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

    fn zoom_to_layer(&self) -> bool {
        true
    }
}
