//! Feature lifecycle orchestration.
//!
//! The orchestrator owns the selection lifecycle: destroy whatever the
//! previous selection created, bump the generation, create the mainshock
//! feature, and drive the rest of the dependency graph from fetch
//! completions. Completions are tagged with the generation they belong to;
//! a completion from a superseded selection is dropped without touching any
//! state, so a fast re-selection can never be corrupted by a slow response
//! racing in late.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::errors::{FeedFailure, QuakeError};
use crate::features::aftershocks::AftershocksFeature;
use crate::features::forecast::ForecastFeature;
use crate::features::historical::HistoricalFeature;
use crate::features::mainshock::MainshockFeature;
use crate::features::moment_tensor::MomentTensorFeature;
use crate::features::pager_cities::PagerCitiesFeature;
use crate::features::pager_exposures::PagerExposuresFeature;
use crate::features::{Feature, MapLayer, SessionContext};
use crate::feed::{FeedSource, FetchOutcome};
use crate::status::SharedStatusBar;
use crate::util::validate_event_id;

/// Lifecycle state of a registered feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    /// Created, fetch in flight (or derive pending)
    Fetching,
    /// Data accepted, artifacts built
    Ready,
    /// Fetch or schema failure
    Error,
    /// Never started because a dependency settled in error
    Skipped,
    /// Torn down by a newer selection
    Destroyed,
}

impl FeatureStatus {
    /// Whether this status is terminal for aggregate-readiness purposes.
    #[must_use]
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Fetching)
    }
}

/// A fetch completion, tagged with the generation that spawned it.
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub feature_id: String,
    pub outcome: FetchOutcome,
}

struct Entry {
    feature: Box<dyn Feature>,
    status: FeatureStatus,
    abort: Option<AbortHandle>,
    failure: Option<FeedFailure>,
}

/// Ordered collection of this selection's features.
///
/// Insertion order is creation order and is preserved through rendering, so
/// output is deterministic for a given completion interleaving.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(
        &mut self,
        feature: Box<dyn Feature>,
        status: FeatureStatus,
        abort: Option<AbortHandle>,
    ) -> Result<(), QuakeError> {
        if self.entries.iter().any(|e| e.feature.id() == feature.id()) {
            return Err(QuakeError::DuplicateFeature {
                id: feature.id().to_string(),
            });
        }
        self.entries.push(Entry {
            feature,
            status,
            abort,
            failure: None,
        });
        Ok(())
    }

    fn entry(&self, id: &str) -> Result<&Entry, QuakeError> {
        self.entries
            .iter()
            .find(|e| e.feature.id() == id)
            .ok_or_else(|| QuakeError::FeatureNotFound { id: id.to_string() })
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut Entry, QuakeError> {
        self.entries
            .iter_mut()
            .find(|e| e.feature.id() == id)
            .ok_or_else(|| QuakeError::FeatureNotFound { id: id.to_string() })
    }

    /// Lifecycle status of a feature.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::FeatureNotFound` before creation or after the
    /// registry was cleared.
    pub fn status(&self, id: &str) -> Result<FeatureStatus, QuakeError> {
        Ok(self.entry(id)?.status)
    }

    /// Borrow a live feature.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::FeatureNotFound` for unknown ids and
    /// `QuakeError::Destroyed` for features a newer selection tore down.
    pub fn feature(&self, id: &str) -> Result<&dyn Feature, QuakeError> {
        let entry = self.entry(id)?;
        if entry.status == FeatureStatus::Destroyed {
            return Err(QuakeError::Destroyed { id: id.to_string() });
        }
        Ok(entry.feature.as_ref())
    }

    /// Feature ids in creation order.
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.feature.id()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn all_settled(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_settled())
    }

    fn dep_ready(&self, id: &str) -> bool {
        matches!(self.status(id), Ok(FeatureStatus::Ready))
    }

    fn dep_failed(&self, id: &str) -> bool {
        matches!(
            self.status(id),
            Ok(FeatureStatus::Error | FeatureStatus::Skipped)
        )
    }
}

/// Per-feature slice of the finished document.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureReport {
    pub id: String,
    pub name: String,
    pub status: FeatureStatus,
    pub title: String,
    pub lines: Vec<String>,
    pub count: usize,
    pub marker_count: usize,
    pub show_layer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The assembled result of one selection, in creation order.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryDocument {
    pub eqid: String,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    pub features: Vec<FeatureReport>,
}

impl SummaryDocument {
    /// Names and messages of features that settled in error.
    #[must_use]
    pub fn unavailable(&self) -> Vec<&FeatureReport> {
        self.features
            .iter()
            .filter(|f| f.status == FeatureStatus::Error)
            .collect()
    }
}

/// The features a selection instantiates, in plan order.
fn standard_plan() -> Vec<Box<dyn Feature>> {
    vec![
        Box::new(MainshockFeature::new()),
        Box::new(AftershocksFeature::new()),
        Box::new(HistoricalFeature::new()),
        Box::new(ForecastFeature::new()),
        Box::new(MomentTensorFeature::new()),
        Box::new(PagerCitiesFeature::new()),
        Box::new(PagerExposuresFeature::new()),
    ]
}

/// Drives feature lifecycles for one selection at a time.
pub struct Orchestrator {
    feed: Arc<dyn FeedSource>,
    status: SharedStatusBar,
    registry: Registry,
    plan: Vec<Box<dyn Feature>>,
    ctx: SessionContext,
    generation: u64,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    finalized: bool,
}

impl Orchestrator {
    #[must_use]
    pub fn new(feed: Arc<dyn FeedSource>, status: SharedStatusBar) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            feed,
            status,
            registry: Registry::new(),
            plan: Vec::new(),
            ctx: SessionContext::default(),
            generation: 0,
            tx,
            rx,
            finalized: false,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Select an event id and drive every feature to a settled state.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Validation` for a rejected event id. Individual
    /// feature failures do not fail the selection; they are reported in the
    /// returned document.
    pub async fn select(
        &mut self,
        eqid: &str,
        state: &mut AppState,
    ) -> Result<SummaryDocument, QuakeError> {
        validate_event_id(eqid)?;

        self.destroy_selection(state);
        self.registry = Registry::new();
        self.generation += 1;
        self.finalized = false;
        state.begin_selection(eqid);
        self.ctx = SessionContext::new(eqid, self.generation, state.params.clone());
        self.plan = standard_plan();
        debug!("selection {eqid} begins (generation {})", self.generation);

        self.create_eligible(state);

        while !self.is_settled() {
            let Some(completion) = self.rx.recv().await else {
                break;
            };
            self.apply_completion(completion, state);
        }

        self.try_finalize().ok_or(QuakeError::Interrupted)
    }

    /// Tear down the current selection in reverse creation order.
    ///
    /// Safe to call with nothing selected.
    pub fn destroy_selection(&mut self, state: &mut AppState) {
        for entry in self.registry.entries.iter_mut().rev() {
            if let Some(abort) = entry.abort.take() {
                abort.abort();
            }
            entry.feature.detach(&mut state.bus);
            entry.feature.clear();
            entry.status = FeatureStatus::Destroyed;
        }
        self.plan.clear();
    }

    /// Whether every planned feature has been created and settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.plan.is_empty() && self.registry.all_settled()
    }

    /// Apply one fetch completion. Stale generations are dropped whole.
    pub fn apply_completion(&mut self, completion: Completion, state: &mut AppState) {
        if completion.generation != self.generation {
            debug!(
                "dropping completion for {} from superseded generation {}",
                completion.feature_id, completion.generation
            );
            return;
        }

        let Ok(entry) = self.registry.entry_mut(&completion.feature_id) else {
            warn!("completion for unknown feature {}", completion.feature_id);
            return;
        };
        if entry.status != FeatureStatus::Fetching {
            return;
        }
        entry.abort = None;

        match completion.outcome {
            Ok(value) => match entry.feature.add_data(&mut self.ctx, &value) {
                Ok(()) => {
                    entry.status = FeatureStatus::Ready;
                    let id = entry.feature.id();
                    self.ctx.publish(id, value);
                    debug!("{id} ready");
                }
                Err(e) => {
                    let failure = FeedFailure::parse(&e.to_string());
                    Self::report_error(&self.status, entry, failure);
                }
            },
            Err(failure) => {
                // the fetch layer already pushed this to the status bar
                entry.status = FeatureStatus::Error;
                entry.failure = Some(failure);
            }
        }

        self.create_eligible(state);
    }

    fn report_error(status: &SharedStatusBar, entry: &mut Entry, failure: FeedFailure) {
        if let Ok(mut bar) = status.lock() {
            bar.add_error(entry.feature.id(), &failure.message);
        }
        entry.status = FeatureStatus::Error;
        entry.failure = Some(failure);
    }

    /// Move every plan entry whose dependencies have settled into the
    /// registry: ready dependencies spawn the feature, failed ones record
    /// it as skipped. Loops until no entry makes progress, so fetchless
    /// features can cascade within one call.
    fn create_eligible(&mut self, state: &mut AppState) {
        loop {
            let mut progressed = false;
            let mut i = 0;
            while i < self.plan.len() {
                let deps = self.plan[i].dependencies();
                if deps.iter().any(|d| self.registry.dep_failed(d)) {
                    let feature = self.plan.remove(i);
                    debug!("skipping {}: dependency unavailable", feature.id());
                    if let Err(e) = self.registry.insert(feature, FeatureStatus::Skipped, None) {
                        warn!("{e}");
                    }
                    progressed = true;
                } else if deps.iter().all(|d| self.registry.dep_ready(d)) {
                    let feature = self.plan.remove(i);
                    self.create(feature, state);
                    progressed = true;
                } else {
                    i += 1;
                }
            }
            if !progressed {
                break;
            }
        }
    }

    fn create(&mut self, mut feature: Box<dyn Feature>, state: &mut AppState) {
        feature.attach(&mut state.bus);

        match feature.request(&self.ctx) {
            Some(request) => {
                let id = feature.id();
                debug!("{id} fetch spawned");
                let future = self.feed.fetch_json(request.descriptor, request.options);
                let tx = self.tx.clone();
                let generation = self.generation;
                let handle = tokio::spawn(async move {
                    let outcome = future.await;
                    let _ = tx.send(Completion {
                        generation,
                        feature_id: id.to_string(),
                        outcome,
                    });
                });
                if let Err(e) =
                    self.registry
                        .insert(feature, FeatureStatus::Fetching, Some(handle.abort_handle()))
                {
                    warn!("{e}");
                }
            }
            None => {
                let (status, failure) = match feature.derive(&self.ctx) {
                    Ok(()) => (FeatureStatus::Ready, None),
                    Err(e) => {
                        let failure = FeedFailure::parse(&e.to_string());
                        if let Ok(mut bar) = self.status.lock() {
                            bar.add_error(feature.id(), &failure.message);
                        }
                        (FeatureStatus::Error, Some(failure))
                    }
                };
                debug!("{} derived: {status:?}", feature.id());
                if let Err(e) = self.registry.insert(feature, status, None) {
                    warn!("{e}");
                } else if let Some(failure) = failure {
                    if let Some(entry) = self.registry.entries.last_mut() {
                        entry.failure = Some(failure);
                    }
                }
            }
        }
    }

    /// Assemble the selection's document once everything settled.
    ///
    /// Returns `None` while features are outstanding, and on every call
    /// after the first successful one.
    pub fn try_finalize(&mut self) -> Option<SummaryDocument> {
        if self.finalized || self.generation == 0 || !self.is_settled() {
            return None;
        }
        self.finalized = true;

        let features = self
            .registry
            .entries
            .iter()
            .map(|entry| {
                let summary = entry.feature.summary();
                FeatureReport {
                    id: entry.feature.id().to_string(),
                    name: entry.feature.name().to_string(),
                    status: entry.status,
                    title: summary.map_or_else(
                        || entry.feature.name().to_string(),
                        |s| s.title.clone(),
                    ),
                    lines: summary.map(|s| s.lines.clone()).unwrap_or_default(),
                    count: summary.map_or(0, |s| s.count),
                    marker_count: entry.feature.map_layer().map_or(0, MapLayer::len),
                    show_layer: entry.feature.show_layer(),
                    error: entry.failure.as_ref().map(|f| f.message.clone()),
                }
            })
            .collect();

        Some(SummaryDocument {
            eqid: self.ctx.eqid.clone(),
            generation: self.generation,
            mag: self.ctx.mainshock.as_ref().map(|m| m.mag),
            alert: self.ctx.mainshock.as_ref().and_then(|m| m.alert.clone()),
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::feed::{FeedDescriptor, FetchFuture, FetchOptions};
    use crate::status::{EntryKind, StatusBar};

    /// Test double for the fetch seam. Mimics `JsonFeed`'s status-bar
    /// contract (loading on start, removed on success, error on failure)
    /// and records every descriptor it is asked to fetch.
    struct ScriptedFeed {
        outcomes: Mutex<HashMap<String, FetchOutcome>>,
        calls: Mutex<Vec<FeedDescriptor>>,
        status: SharedStatusBar,
    }

    impl ScriptedFeed {
        fn new(status: SharedStatusBar) -> Self {
            Self {
                outcomes: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                status,
            }
        }

        fn script(&self, id: &str, outcome: FetchOutcome) {
            self.outcomes
                .lock()
                .expect("outcomes lock")
                .insert(id.to_string(), outcome);
        }

        fn called_ids(&self) -> Vec<String> {
            self.calls
                .lock()
                .expect("calls lock")
                .iter()
                .map(|d| d.id.clone())
                .collect()
        }

        fn url_for(&self, id: &str) -> Option<String> {
            self.calls
                .lock()
                .expect("calls lock")
                .iter()
                .find(|d| d.id == id)
                .map(|d| d.url.clone())
        }
    }

    impl FeedSource for ScriptedFeed {
        fn fetch_json(&self, desc: FeedDescriptor, _opts: FetchOptions) -> FetchFuture {
            self.calls.lock().expect("calls lock").push(desc.clone());
            let outcome = self
                .outcomes
                .lock()
                .expect("outcomes lock")
                .get(&desc.id)
                .cloned()
                .unwrap_or_else(|| Err(FeedFailure::timeout(desc.host())));
            let status = Arc::clone(&self.status);
            Box::pin(async move {
                if let Ok(mut bar) = status.lock() {
                    bar.add_item(&desc.id, &format!("Loading {}", desc.name));
                }
                match &outcome {
                    Ok(_) => {
                        if let Ok(mut bar) = status.lock() {
                            bar.remove_item(&desc.id);
                        }
                    }
                    Err(failure) => {
                        if let Ok(mut bar) = status.lock() {
                            bar.add_error(&desc.id, &failure.message);
                        }
                    }
                }
                outcome
            })
        }
    }

    fn detail_json() -> Value {
        serde_json::json!({
            "type": "Feature",
            "id": "us7000abcd",
            "geometry": {"type": "Point", "coordinates": [-117.5, 35.77, 8.0]},
            "properties": {
                "mag": 6.5,
                "magType": "mw",
                "place": "16km SW of Searles Valley, CA",
                "time": 1_562_383_193_040_i64,
                "updated": 1_562_385_000_000_i64,
                "products": {
                    "moment-tensor": [{
                        "code": "us_7000abcd_mww",
                        "properties": {
                            "scalar-moment": "7.06e+18",
                            "derived-magnitude": "6.5"
                        }
                    }],
                    "losspager": [{
                        "code": "us7000abcd",
                        "contents": {
                            "json/cities.json": {"url": "https://earthquake.usgs.gov/pager/cities.json"},
                            "json/exposures.json": {"url": "https://earthquake.usgs.gov/pager/exposures.json"}
                        }
                    }]
                }
            }
        })
    }

    fn catalog_json(count: usize) -> Value {
        let features: Vec<Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "id": format!("ci000{i}"),
                    "geometry": {"type": "Point", "coordinates": [-117.51, 35.78, 5.0]},
                    "properties": {
                        "mag": 4.0 - i as f64 * 0.5,
                        "place": "near Searles Valley",
                        "time": 1_562_386_793_040_i64 + i as i64 * 3_600_000
                    }
                })
            })
            .collect();
        serde_json::json!({"type": "FeatureCollection", "features": features})
    }

    fn cities_json() -> Value {
        serde_json::json!({
            "onepager_cities": [
                {"city_name": "Ridgecrest", "population": 28000, "mmi": 7.9,
                 "latitude": 35.62, "longitude": -117.67}
            ]
        })
    }

    fn exposures_json() -> Value {
        serde_json::json!({
            "population_exposure": {
                "mmi": [5.0, 6.0, 7.0],
                "aggregated_exposure": [450_000, 30_000, 2_000]
            }
        })
    }

    fn scripted_happy_path() -> (Arc<ScriptedFeed>, SharedStatusBar) {
        let status = StatusBar::shared();
        let feed = Arc::new(ScriptedFeed::new(Arc::clone(&status)));
        feed.script("mainshock", Ok(detail_json()));
        feed.script("aftershocks", Ok(catalog_json(2)));
        feed.script("historical", Ok(catalog_json(1)));
        feed.script("pager-cities", Ok(cities_json()));
        feed.script("pager-exposures", Ok(exposures_json()));
        (feed, status)
    }

    #[tokio::test]
    async fn test_select_drives_whole_graph_to_ready() {
        let (feed, status) = scripted_happy_path();
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status.clone());
        let mut state = AppState::new();

        let doc = orch.select("us7000abcd", &mut state).await.expect("selection settles");

        let ids: Vec<&str> = doc.features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "mainshock",
                "aftershocks",
                "historical",
                "forecast",
                "moment-tensor",
                "pager-cities",
                "pager-exposures"
            ]
        );
        assert!(doc.features.iter().all(|f| f.status == FeatureStatus::Ready));
        assert!(doc.unavailable().is_empty());

        // derived features never hit the network
        let called = feed.called_ids();
        assert!(!called.contains(&"forecast".to_string()));
        assert!(!called.contains(&"moment-tensor".to_string()));

        // successful selection leaves no status entries behind
        assert_eq!(status.lock().expect("status lock").entry_count(), 0);
    }

    #[tokio::test]
    async fn test_magnitude_scaled_query_parameters_end_to_end() {
        let (feed, status) = scripted_happy_path();
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status);
        let mut state = AppState::new();
        orch.select("us7000abcd", &mut state).await.expect("selection settles");

        // M 6.5 mainshock: 20 km radius, M 2 floor
        let url = feed.url_for("aftershocks").expect("aftershocks fetched");
        assert!(url.contains("maxradiuskm=20"), "url was {url}");
        assert!(url.contains("minmagnitude=2"), "url was {url}");

        let url = feed.url_for("historical").expect("historical fetched");
        assert!(url.contains("maxradiuskm=60"), "url was {url}");
        assert!(url.contains("minmagnitude=4"), "url was {url}");
    }

    #[tokio::test]
    async fn test_zero_results_settle_ready_with_empty_layer() {
        let (feed, status) = scripted_happy_path();
        feed.script("aftershocks", Ok(catalog_json(0)));
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status);
        let mut state = AppState::new();

        let doc = orch.select("us7000abcd", &mut state).await.expect("selection settles");
        let report = doc
            .features
            .iter()
            .find(|f| f.id == "aftershocks")
            .expect("report present");
        assert_eq!(report.status, FeatureStatus::Ready);
        assert_eq!(report.marker_count, 0);
        assert_eq!(report.count, 0);
        assert_eq!(report.lines, vec!["No aftershocks found"]);
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_dependents_silently() {
        let status = StatusBar::shared();
        let feed = Arc::new(ScriptedFeed::new(Arc::clone(&status)));
        feed.script(
            "mainshock",
            Err(FeedFailure::http(404, "Not Found")),
        );
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status.clone());
        let mut state = AppState::new();

        let doc = orch.select("us7000abcd", &mut state).await.expect("selection settles");

        // only the mainshock was ever fetched
        assert_eq!(feed.called_ids(), vec!["mainshock".to_string()]);

        let mainshock = &doc.features[0];
        assert_eq!(mainshock.status, FeatureStatus::Error);
        for report in &doc.features[1..] {
            assert_eq!(report.status, FeatureStatus::Skipped, "{} not skipped", report.id);
            assert!(report.error.is_none());
        }

        // exactly the mainshock error is visible, nothing for the skipped
        let bar = status.lock().expect("status lock");
        assert_eq!(bar.entry_count(), 1);
        assert_eq!(bar.entry("mainshock").map(|e| e.kind), Some(EntryKind::Error));
    }

    #[tokio::test]
    async fn test_timeout_reads_as_error_with_host_message() {
        let (feed, status) = scripted_happy_path();
        feed.script(
            "aftershocks",
            Err(FeedFailure::timeout("earthquake.usgs.gov")),
        );
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status.clone());
        let mut state = AppState::new();

        let doc = orch.select("us7000abcd", &mut state).await.expect("selection settles");
        let report = doc
            .features
            .iter()
            .find(|f| f.id == "aftershocks")
            .expect("report present");
        assert_eq!(report.status, FeatureStatus::Error);
        assert!(
            report.error.as_deref().is_some_and(|m| m.contains("earthquake.usgs.gov")),
            "error was {:?}",
            report.error
        );

        let bar = status.lock().expect("status lock");
        assert_eq!(bar.entry_count(), 1);
        let entry = bar.entry("aftershocks").expect("entry present");
        assert_eq!(entry.kind, EntryKind::Error);
        assert!(entry.message.contains("could not be reached"));
    }

    #[tokio::test]
    async fn test_stale_generation_completion_is_dropped() {
        let (feed, status) = scripted_happy_path();
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status);
        let mut state = AppState::new();
        let doc = orch.select("us7000abcd", &mut state).await.expect("selection settles");
        let before = doc
            .features
            .iter()
            .find(|f| f.id == "aftershocks")
            .map(|f| f.count)
            .expect("report present");

        // a slow response from a superseded selection arrives late
        orch.apply_completion(
            Completion {
                generation: orch.generation() + 1,
                feature_id: "aftershocks".to_string(),
                outcome: Ok(catalog_json(0)),
            },
            &mut state,
        );
        orch.apply_completion(
            Completion {
                generation: 0,
                feature_id: "aftershocks".to_string(),
                outcome: Err(FeedFailure::timeout("earthquake.usgs.gov")),
            },
            &mut state,
        );

        let registry = orch.registry();
        assert_eq!(
            registry.status("aftershocks").expect("status readable"),
            FeatureStatus::Ready
        );
        let feature = registry.feature("aftershocks").expect("feature readable");
        assert_eq!(feature.summary().map(|s| s.count), Some(before));
    }

    #[tokio::test]
    async fn test_finalize_runs_exactly_once_per_selection() {
        let (feed, status) = scripted_happy_path();
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status);
        let mut state = AppState::new();

        // nothing selected yet: no document
        assert!(orch.try_finalize().is_none());

        orch.select("us7000abcd", &mut state).await.expect("selection settles");
        // select already finalized this generation
        assert!(orch.try_finalize().is_none());

        // a new selection finalizes again, once
        let doc = orch.select("us7000abcd", &mut state).await.expect("selection settles");
        assert_eq!(doc.generation, 2);
        assert!(orch.try_finalize().is_none());
    }

    #[tokio::test]
    async fn test_reselect_destroys_previous_selection() {
        let (feed, status) = scripted_happy_path();
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status);
        let mut state = AppState::new();

        orch.select("us7000abcd", &mut state).await.expect("first selection");
        let subscriptions = state.bus.active_count();
        assert!(subscriptions > 0);

        orch.select("ci38457511", &mut state).await.expect("second selection");
        // same feature set, same subscription count: nothing leaked
        assert_eq!(state.bus.active_count(), subscriptions);
        assert_eq!(orch.generation(), 2);
    }

    #[tokio::test]
    async fn test_destroyed_and_unknown_lookups() {
        let (feed, status) = scripted_happy_path();
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status);
        let mut state = AppState::new();
        orch.select("us7000abcd", &mut state).await.expect("selection settles");

        assert!(matches!(
            orch.registry().feature("nope"),
            Err(QuakeError::FeatureNotFound { .. })
        ));

        orch.destroy_selection(&mut state);
        assert_eq!(state.bus.active_count(), 0);
        assert!(matches!(
            orch.registry().feature("mainshock"),
            Err(QuakeError::Destroyed { .. })
        ));
        assert_eq!(
            orch.registry().status("mainshock").expect("status readable"),
            FeatureStatus::Destroyed
        );
    }

    #[tokio::test]
    async fn test_render_is_idempotent() {
        let (feed, status) = scripted_happy_path();
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status);
        let mut state = AppState::new();
        orch.select("us7000abcd", &mut state).await.expect("selection settles");

        let subscriptions = state.bus.active_count();
        let feature = orch.registry().feature("aftershocks").expect("feature readable");
        let first = feature.render(&mut state);
        let second = feature.render(&mut state);
        assert_eq!(first, second);
        assert_eq!(state.bus.active_count(), subscriptions);
    }

    #[test]
    fn test_duplicate_feature_id_rejected() {
        let mut registry = Registry::new();
        registry
            .insert(Box::new(MainshockFeature::new()), FeatureStatus::Fetching, None)
            .expect("first insert");
        let result = registry.insert(
            Box::new(MainshockFeature::new()),
            FeatureStatus::Fetching,
            None,
        );
        assert!(matches!(result, Err(QuakeError::DuplicateFeature { .. })));
    }

    #[tokio::test]
    async fn test_invalid_event_id_rejected_before_any_fetch() {
        let (feed, status) = scripted_happy_path();
        let mut orch = Orchestrator::new(Arc::clone(&feed) as Arc<dyn FeedSource>, status);
        let mut state = AppState::new();

        let result = orch.select("us7000<script>", &mut state).await;
        assert!(matches!(result, Err(QuakeError::Validation(_))));
        assert!(feed.called_ids().is_empty());
    }
}
