//! The per-data-source unit of work.
//!
//! A `Feature` owns one data product around the selected mainshock: it
//! declares its dependencies, describes the fetch it needs (or derives from
//! data already in the session), parses its payload at its own schema
//! boundary, and exposes renderable artifacts. The orchestrator in
//! `registry` drives the lifecycle; features never talk to the network
//! themselves.

pub mod aftershocks;
pub mod forecast;
pub mod historical;
pub mod mainshock;
pub mod moment_tensor;
pub mod pager_cities;
pub mod pager_exposures;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::app::{AppState, EventBus, QueryParams, Topic};
use crate::errors::QuakeError;
use crate::feed::{FeedDescriptor, FetchOptions};
use crate::models::Mainshock;

/// One fetch the orchestrator should perform on a feature's behalf.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub descriptor: FeedDescriptor,
    pub options: FetchOptions,
}

impl FeedRequest {
    #[must_use]
    pub fn new(descriptor: FeedDescriptor) -> Self {
        Self {
            descriptor,
            options: FetchOptions::default(),
        }
    }
}

/// Shared state of one selection, rebuilt on every `select`.
///
/// Payload snapshots published here are how features see each other's data;
/// a feature only ever reads snapshots of features it declared as
/// dependencies, which the orchestrator guarantees are ready first.
#[derive(Debug, Default)]
pub struct SessionContext {
    pub eqid: String,
    pub generation: u64,
    pub params: QueryParams,
    pub mainshock: Option<Mainshock>,
    payloads: HashMap<String, Arc<Value>>,
}

impl SessionContext {
    #[must_use]
    pub fn new(eqid: &str, generation: u64, params: QueryParams) -> Self {
        Self {
            eqid: eqid.to_string(),
            generation,
            params,
            mainshock: None,
            payloads: HashMap::new(),
        }
    }

    /// Publish a ready feature's raw payload for dependents to read.
    pub fn publish(&mut self, id: &str, payload: Value) {
        self.payloads.insert(id.to_string(), Arc::new(payload));
    }

    #[must_use]
    pub fn payload(&self, id: &str) -> Option<&Value> {
        self.payloads.get(id).map(Arc::as_ref)
    }

    /// The parsed mainshock, required by every dependent feature.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::DependencyUnmet` when no mainshock has been
    /// published yet.
    pub fn require_mainshock(&self) -> Result<&Mainshock, QuakeError> {
        self.mainshock.as_ref().ok_or_else(|| QuakeError::DependencyUnmet {
            id: mainshock::ID.to_string(),
        })
    }
}

/// A marker on the map layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
    pub magnitude: Option<f64>,
}

/// A feature's positional artifact. Empty layers are valid: a feature with
/// zero results still renders, it just has nothing to place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapLayer {
    pub markers: Vec<Marker>,
}

impl MapLayer {
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// A feature's textual artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub title: String,
    pub lines: Vec<String>,
    /// Result count behind the summary; 0 for "none found" summaries.
    pub count: usize,
}

impl Summary {
    #[must_use]
    pub fn new(title: &str, lines: Vec<String>, count: usize) -> Self {
        Self {
            title: title.to_string(),
            lines,
            count,
        }
    }

    /// The summary a feature shows when its source holds no results.
    #[must_use]
    pub fn none_found(title: &str, what: &str) -> Self {
        Self::new(title, vec![format!("No {what} found")], 0)
    }
}

/// A named numeric series for the plots pane.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Snapshot a `render` call produces. Two renders of the same feature state
/// compare equal.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub id: &'static str,
    pub title: String,
    pub body: Vec<String>,
    pub marker_count: usize,
    pub plot_count: usize,
}

/// One data product around the mainshock.
///
/// Implementations keep their parsed state and artifacts internal; the
/// orchestrator calls the lifecycle methods in a fixed order: `attach`,
/// `request`, then `add_data` (fetching features) or `derive` (fetchless
/// ones), `render` any number of times, and finally `detach` + `clear`.
pub trait Feature: Send {
    /// Stable feature id; also the status-bar key.
    fn id(&self) -> &'static str;

    /// Display name used in loading messages and summary headers.
    fn name(&self) -> &str;

    /// Ids of the features whose payloads must be ready before this one is
    /// created. Order is not significant.
    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    /// Describe the fetch this feature needs, as a pure function of the
    /// session context. `None` means the feature derives from data already
    /// in the session and `derive` will be called instead.
    fn request(&self, ctx: &SessionContext) -> Option<FeedRequest>;

    /// Accept a fetched payload and build artifacts.
    ///
    /// Must tolerate a zero-result payload, producing an empty layer and a
    /// "none found" summary rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload does not match the feature's
    /// schema.
    fn add_data(&mut self, _ctx: &mut SessionContext, _payload: &Value) -> Result<(), QuakeError> {
        Ok(())
    }

    /// Build artifacts from session data alone, for `request() == None`
    /// features.
    ///
    /// # Errors
    ///
    /// Returns an error when required session data is missing or malformed.
    fn derive(&mut self, _ctx: &SessionContext) -> Result<(), QuakeError> {
        Ok(())
    }

    /// Register this feature's event subscriptions. Paired with `detach`.
    fn attach(&mut self, bus: &mut EventBus) {
        bus.subscribe(self.id(), Topic::PaneShown);
        bus.subscribe(self.id(), Topic::ParamsChanged);
    }

    /// Remove every subscription `attach` registered.
    fn detach(&mut self, bus: &mut EventBus) {
        bus.unsubscribe_all(self.id());
    }

    /// Drop all artifacts and parsed state.
    fn clear(&mut self);

    fn map_layer(&self) -> Option<&MapLayer>;

    fn summary(&self) -> Option<&Summary>;

    fn plots(&self) -> &[PlotSeries] {
        &[]
    }

    /// Whether the map layer is shown by default.
    fn show_layer(&self) -> bool {
        true
    }

    /// Whether selecting this feature recenters the map on its layer.
    fn zoom_to_layer(&self) -> bool {
        false
    }

    /// Produce a render snapshot. Idempotent: repeated calls with unchanged
    /// feature state yield equal snapshots and register nothing new.
    fn render(&self, _state: &mut AppState) -> RenderedFeature {
        let (title, body) = match self.summary() {
            Some(summary) => (summary.title.clone(), summary.lines.clone()),
            None => (self.name().to_string(), Vec::new()),
        };
        RenderedFeature {
            id: self.id(),
            title,
            body,
            marker_count: self.map_layer().map_or(0, MapLayer::len),
            plot_count: self.plots().len(),
        }
    }
}
