//! App launch orchestration.
//!
//! A launch runs in two phases. First each candidate package (the requested
//! one, then its known alternates) is tried against a fixed list of start
//! strategies until one is accepted by the host. Then the foreground is polled
//! until one of the candidates shows up, clicking through chooser and
//! permission dialogs on the way.

use crate::engine::Automation;
use crate::error::{AutomationError, Result};
use crate::events::now_ms;
use crate::selector::{Matcher, SelectorExpr};
use crate::source::{LaunchIntent, NodeAction, NodeSource, PackageHost};
use crate::tables::{ConfirmPreference, ConfirmProbe};
use crate::walker::FindMode;
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const MIN_LAUNCH_WINDOW: Duration = Duration::from_millis(1000);
const RECENT_OBSERVATION: Duration = Duration::from_secs(8);
const POLL_STEP: Duration = Duration::from_millis(400);
const CONFIRM_SETTLE: Duration = Duration::from_millis(180);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAppRequest {
    pub package_name: String,
    pub activity: Option<String>,
    pub component: Option<String>,
    pub timeout: Duration,
    pub max_nodes: i64,
    pub handle_confirm_dialog: bool,
    pub preferred_confirm: ConfirmPreference,
}

impl OpenAppRequest {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            activity: None,
            component: None,
            timeout: Duration::from_millis(10_000),
            max_nodes: 1500,
            handle_confirm_dialog: true,
            preferred_confirm: ConfirmPreference::Always,
        }
    }
}

/// What confirmed the launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchedBy {
    ActivePackage,
    ObservedPackage,
    RecentObservation,
}

/// Outcome of an `openApp`, reported on success and on timeout alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchReport {
    pub package_name: String,
    pub resolved_package: String,
    pub active_package: Option<String>,
    pub observed_package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<MatchedBy>,
    pub confirm_clicks: u32,
    pub confirm_label: Option<String>,
}

/// Which start strategy a launch went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Component,
    Activity,
    Registered,
    ImplicitLauncher,
    QueriedLauncher,
    FallbackComponent,
}

/// Split `pkg/cls`, expanding a leading-dot class against its package.
pub fn parse_component(raw: &str) -> Option<(String, String)> {
    let (pkg, cls) = raw.trim().split_once('/')?;
    let cls = if cls.starts_with('.') {
        format!("{pkg}{cls}")
    } else {
        cls.to_string()
    };
    Some((pkg.to_string(), cls))
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl<S: NodeSource + PackageHost> Automation<S> {
    /// Start an app and wait for it to reach the foreground.
    pub fn open_app(&self, req: &OpenAppRequest) -> Result<LaunchReport> {
        let package = req.package_name.trim();
        if package.is_empty() {
            return Err(AutomationError::bad_request("missing packageName"));
        }

        let started = Instant::now();
        let deadline = started + req.timeout.max(MIN_LAUNCH_WINDOW);
        let candidates = self.tables.candidates(package);

        let resolved = candidates
            .iter()
            .find(|c| self.launch_candidate(c, req))
            .cloned()
            .ok_or_else(|| AutomationError::LaunchFailed {
                package: package.to_string(),
                candidates: candidates.clone(),
            })?;

        let mut report = LaunchReport {
            package_name: package.to_string(),
            resolved_package: resolved,
            active_package: None,
            observed_package: None,
            matched_by: None,
            confirm_clicks: 0,
            confirm_label: None,
        };

        while Instant::now() < deadline {
            let active = self.active_package();
            let observed = self.events.last_observed_package();

            let in_set = |p: &Option<String>| p.as_ref().is_some_and(|p| candidates.contains(p));
            let matched_by = if in_set(&active) {
                Some(MatchedBy::ActivePackage)
            } else if in_set(&observed) {
                Some(MatchedBy::ObservedPackage)
            } else if candidates
                .iter()
                .any(|c| self.events.is_recently_observed(c, RECENT_OBSERVATION))
            {
                Some(MatchedBy::RecentObservation)
            } else {
                None
            };

            if let Some(by) = matched_by {
                report.active_package = active;
                report.observed_package = observed;
                report.matched_by = Some(by);
                info!(
                    package = %report.package_name,
                    resolved = %report.resolved_package,
                    matched_by = ?by,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "app launched"
                );
                return Ok(report);
            }

            if req.handle_confirm_dialog {
                if let Some(label) = self.try_confirm_dialog(active.as_deref(), req) {
                    report.confirm_clicks += 1;
                    report.confirm_label = Some(label);
                    thread::sleep(CONFIRM_SETTLE);
                    continue;
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let since = now_ms();
            let step = remaining.min(POLL_STEP);
            if !self.events.wait_for_window_changed(since, step) {
                self.events.wait_for_content_changed(since, step);
            }
        }

        report.active_package = self.active_package();
        report.observed_package = self.events.last_observed_package();
        Err(AutomationError::LaunchTimeout(Box::new(report)))
    }

    fn start(&self, intent: LaunchIntent, strategy: Strategy) -> bool {
        match self.source.start_activity(&intent) {
            Ok(()) => {
                debug!(package = %intent.package, ?strategy, "activity started");
                true
            }
            Err(e) => {
                debug!(package = %intent.package, ?strategy, error = %e, "start strategy failed");
                false
            }
        }
    }

    fn start_component(&self, candidate: &str, component: &str, strategy: Strategy) -> bool {
        match parse_component(component) {
            Some((pkg, cls)) if pkg == candidate => self.start(LaunchIntent::explicit(pkg, cls), strategy),
            _ => false,
        }
    }

    fn launch_candidate(&self, candidate: &str, req: &OpenAppRequest) -> bool {
        if let Some(component) = non_blank(&req.component) {
            if self.start_component(candidate, component, Strategy::Component) {
                return true;
            }
        }

        if let Some(activity) = non_blank(&req.activity) {
            let class_name = if activity.starts_with('.') {
                format!("{candidate}{activity}")
            } else {
                activity.to_string()
            };
            if self.start(LaunchIntent::explicit(candidate, class_name), Strategy::Activity) {
                return true;
            }
        }

        if let Some(intent) = self.source.launch_intent_for_package(candidate) {
            if self.start(intent, Strategy::Registered) {
                return true;
            }
        }

        if self.start(LaunchIntent::implicit_launcher(candidate), Strategy::ImplicitLauncher) {
            return true;
        }

        if let Some(first) = self.source.query_launcher_activities(candidate).into_iter().next() {
            if self.start(LaunchIntent::explicit(candidate, first), Strategy::QueriedLauncher) {
                return true;
            }
        }

        self.tables
            .fallbacks_for(candidate)
            .iter()
            .any(|c| self.start_component(candidate, c, Strategy::FallbackComponent))
    }

    /// Click the first confirm button found when `active` hosts a dialog.
    /// Returns the id or label that was clicked.
    ///
    /// Dialog hosts such as `com.android.systemui` are also overlays that
    /// best-root selection skips, so buttons are searched under the host's
    /// active window directly.
    fn try_confirm_dialog(&self, active: Option<&str>, req: &OpenAppRequest) -> Option<String> {
        let rules = &self.tables.dialog;
        if !rules.is_host(active) {
            return None;
        }
        rules
            .probes(req.preferred_confirm)
            .into_iter()
            .find(|probe| self.click_first_match(probe, req.max_nodes))
            .map(|probe| {
                debug!(label = probe.label(), host = ?active, "confirm dialog clicked");
                probe.label().to_string()
            })
    }

    fn click_first_match(&self, probe: &ConfirmProbe<'_>, max_nodes: i64) -> bool {
        let selector = match probe {
            ConfirmProbe::ResourceId(id) => SelectorExpr::resource_id(*id),
            ConfirmProbe::TextContains(label) => SelectorExpr::text_contains(*label),
        };
        let Some(root) = self.source.active_root() else {
            return false;
        };
        let found = self.find_in(&root, &Matcher::compile(&selector), FindMode::First, max_nodes);
        match found.matches.first() {
            Some(hit) => self.perform_from(root, hit.target_path(), &NodeAction::Click).is_ok(),
            None => false,
        }
    }
}
