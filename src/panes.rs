//! Pane and sidebar selection.
//!
//! The terminal rendition of the original's tabbed panes: one main pane
//! (map, plots, or summary) and an optional sidebar. Selections are
//! recorded in the query parameters so the state is shareable, remembered
//! in the session store, and announced on the event bus so features whose
//! artifacts belong to the shown pane can re-render.

use std::fmt;
use std::str::FromStr;

use crate::app::{AppState, Topic, keys};
use crate::errors::QuakeError;

/// The main content pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Map,
    Plots,
    Summary,
}

impl Pane {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Plots => "plots",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pane {
    type Err = QuakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "map" => Ok(Self::Map),
            "plots" => Ok(Self::Plots),
            "summary" => Ok(Self::Summary),
            _ => Err(QuakeError::Validation(format!(
                "unknown pane '{s}' (expected: map, plots, summary)"
            ))),
        }
    }
}

/// The sidebar, hidden unless asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideBar {
    #[default]
    Hidden,
    Settings,
    About,
}

impl SideBar {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Settings => "settings",
            Self::About => "about",
        }
    }
}

impl FromStr for SideBar {
    type Err = QuakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hidden" | "none" => Ok(Self::Hidden),
            "settings" => Ok(Self::Settings),
            "about" => Ok(Self::About),
            _ => Err(QuakeError::Validation(format!(
                "unknown sidebar '{s}' (expected: hidden, settings, about)"
            ))),
        }
    }
}

/// Tracks the visible pane/sidebar and delegates re-rendering.
#[derive(Debug, Default)]
pub struct PaneController {
    pane: Pane,
    sidebar: SideBar,
}

impl PaneController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore selections previously recorded in the parameters.
    /// Unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        let pane = state
            .params
            .get(keys::PANE)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let sidebar = state
            .params
            .get(keys::SIDEBAR)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Self { pane, sidebar }
    }

    #[must_use]
    pub fn pane(&self) -> Pane {
        self.pane
    }

    #[must_use]
    pub fn sidebar(&self) -> SideBar {
        self.sidebar
    }

    /// Show a pane: record it, remember it for the session, and return the
    /// owners subscribed to pane changes so the caller can re-render them.
    pub fn show_pane(&mut self, pane: Pane, state: &mut AppState) -> Vec<String> {
        self.pane = pane;
        state.params.set(keys::PANE, pane.as_str());
        state.session.remember_selection("pane", pane.as_str());
        state.bus.emit(Topic::PaneShown)
    }

    /// Show (or hide) the sidebar; same bookkeeping as `show_pane`.
    pub fn show_sidebar(&mut self, sidebar: SideBar, state: &mut AppState) -> Vec<String> {
        self.sidebar = sidebar;
        state.params.set(keys::SIDEBAR, sidebar.as_str());
        state.session.remember_selection("sidebar", sidebar.as_str());
        state.bus.emit(Topic::SideBarShown)
    }

    /// Remember how far the current pane is scrolled.
    pub fn remember_scroll(&self, offset: u64, state: &mut AppState) {
        state.session.remember_scroll(self.pane.as_str(), offset);
    }

    /// Scroll offset remembered for the current pane, 0 if never scrolled.
    #[must_use]
    pub fn scroll(&self, state: &AppState) -> u64 {
        state.session.scroll(self.pane.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pane_parse_round_trip() {
        for pane in [Pane::Map, Pane::Plots, Pane::Summary] {
            assert_eq!(pane.as_str().parse::<Pane>().ok(), Some(pane));
        }
        assert!("browser".parse::<Pane>().is_err());
        assert_eq!("PLOTS".parse::<Pane>().ok(), Some(Pane::Plots));
    }

    #[test]
    fn test_sidebar_parse() {
        assert_eq!("none".parse::<SideBar>().ok(), Some(SideBar::Hidden));
        assert_eq!("settings".parse::<SideBar>().ok(), Some(SideBar::Settings));
        assert!("menu".parse::<SideBar>().is_err());
    }

    #[test]
    fn test_show_pane_records_and_notifies() {
        let mut state = AppState::new();
        state.bus.subscribe("aftershocks", Topic::PaneShown);
        state.bus.subscribe("historical", Topic::PaneShown);
        state.bus.subscribe("forecast", Topic::ParamsChanged);

        let mut controller = PaneController::new();
        let notified = controller.show_pane(Pane::Plots, &mut state);

        assert_eq!(notified, vec!["aftershocks", "historical"]);
        assert_eq!(state.params.get(crate::app::keys::PANE), Some("plots"));
        assert_eq!(state.session.selection("pane"), Some("plots"));
        assert_eq!(controller.pane(), Pane::Plots);
    }

    #[test]
    fn test_scroll_is_remembered_per_pane() {
        let mut state = AppState::new();
        let mut controller = PaneController::new();

        controller.show_pane(Pane::Plots, &mut state);
        controller.remember_scroll(420, &mut state);
        assert_eq!(controller.scroll(&state), 420);

        controller.show_pane(Pane::Map, &mut state);
        assert_eq!(controller.scroll(&state), 0);

        controller.show_pane(Pane::Plots, &mut state);
        assert_eq!(controller.scroll(&state), 420);
    }

    #[test]
    fn test_from_state_restores_selection() {
        let mut state = AppState::new();
        state.params.set(keys::PANE, "summary");
        state.params.set(keys::SIDEBAR, "about");
        let controller = PaneController::from_state(&state);
        assert_eq!(controller.pane(), Pane::Summary);
        assert_eq!(controller.sidebar(), SideBar::About);

        state.params.set(keys::PANE, "bogus");
        let controller = PaneController::from_state(&state);
        assert_eq!(controller.pane(), Pane::Map);
    }
}
