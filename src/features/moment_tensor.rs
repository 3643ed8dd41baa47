//! Focal mechanism from the event's moment-tensor product.
//!
//! Fully derived: the detail document the mainshock feature fetched already
//! carries the product summary, so this feature never touches the network.
//! Events without a tensor settle with a "not available" summary.

use crate::errors::QuakeError;
use crate::features::{
    FeedRequest, Feature, MapLayer, PlotSeries, SessionContext, Summary,
};
use crate::models::ProductSummary;

pub const ID: &str = "moment-tensor";

const DEPENDENCIES: &[&str] = &[super::mainshock::ID];

/// One nodal plane of the focal mechanism.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodalPlane {
    pub strike: f64,
    pub dip: f64,
    pub rake: f64,
}

/// Parsed tensor parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSolution {
    pub scalar_moment: f64,
    pub derived_magnitude: Option<f64>,
    pub plane_1: Option<NodalPlane>,
    pub plane_2: Option<NodalPlane>,
}

impl TensorSolution {
    /// Read a solution out of a moment-tensor product summary.
    ///
    /// Returns `None` when the product lacks a scalar moment, the one field
    /// every usable tensor carries.
    #[must_use]
    pub fn from_product(product: &ProductSummary) -> Option<Self> {
        let scalar_moment = product.prop_f64("scalar-moment")?;
        Some(Self {
            scalar_moment,
            derived_magnitude: product.prop_f64("derived-magnitude"),
            plane_1: Self::plane(product, 1),
            plane_2: Self::plane(product, 2),
        })
    }

    fn plane(product: &ProductSummary, n: u8) -> Option<NodalPlane> {
        Some(NodalPlane {
            strike: product.prop_f64(&format!("nodal-plane-{n}-strike"))?,
            dip: product.prop_f64(&format!("nodal-plane-{n}-dip"))?,
            rake: product.prop_f64(&format!("nodal-plane-{n}-rake"))?,
        })
    }

    /// Moment magnitude from the scalar moment (Hanks & Kanamori), used
    /// when the product does not state a derived magnitude.
    #[must_use]
    pub fn moment_magnitude(&self) -> f64 {
        (2.0 / 3.0) * (self.scalar_moment.log10() - 9.1)
    }
}

/// Derived moment-tensor feature.
#[derive(Debug, Default)]
pub struct MomentTensorFeature {
    summary: Option<Summary>,
}

impl MomentTensorFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Feature for MomentTensorFeature {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &str {
        "Moment Tensor"
    }

    fn dependencies(&self) -> &[&'static str] {
        DEPENDENCIES
    }

    fn request(&self, _ctx: &SessionContext) -> Option<FeedRequest> {
        None
    }

    fn derive(&mut self, ctx: &SessionContext) -> Result<(), QuakeError> {
        let mainshock = ctx.require_mainshock()?;

        let solution = mainshock
            .product("moment-tensor")
            .and_then(TensorSolution::from_product);
        let Some(solution) = solution else {
            self.summary = Some(Summary::new(
                "Moment Tensor",
                vec!["No moment tensor available for this event".into()],
                0,
            ));
            return Ok(());
        };

        let mw = solution
            .derived_magnitude
            .unwrap_or_else(|| solution.moment_magnitude());
        let mut lines = vec![
            format!("Scalar moment  {:.2e} N-m", solution.scalar_moment),
            format!("Mw             {mw:.1}"),
        ];
        for (label, plane) in [("NP1", solution.plane_1), ("NP2", solution.plane_2)] {
            if let Some(p) = plane {
                lines.push(format!(
                    "{label}  strike {:.0}  dip {:.0}  rake {:.0}",
                    p.strike, p.dip, p.rake
                ));
            }
        }
        self.summary = Some(Summary::new("Moment Tensor", lines, 1));
        Ok(())
    }

    fn clear(&mut self) {
        self.summary = None;
    }

    fn map_layer(&self) -> Option<&MapLayer> {
        None
    }

    fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    fn plots(&self) -> &[PlotSeries] {
        &[]
    }

    fn show_layer(&self) -> bool {
        false
    }
}
