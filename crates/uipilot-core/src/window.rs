//! Best-root selection across windows.
//!
//! The host's "active" window is sometimes an empty shell or a system overlay
//! (status bar, vendor gesture strip, launcher). When that happens every
//! enumerable window root is scored and the largest non-overlay one wins.

use crate::source::NodeSource;
use serde::{Deserialize, Serialize};

const OVERLAY_PENALTY: i64 = 10_000_000;
const CHILD_BONUS_CAP: i64 = 1000;

/// Packages whose windows are treated as overlays rather than app content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayRules {
    pub exact: Vec<String>,
    pub prefixes: Vec<String>,
}

impl Default for OverlayRules {
    fn default() -> Self {
        Self {
            exact: vec!["com.android.systemui".into()],
            prefixes: [
                "com.vivo.upslide",
                "com.miui.systemui",
                "com.oplus.systemui",
                "com.coloros.systemui",
                "com.huawei.android.launcher",
                "com.android.launcher",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl OverlayRules {
    pub fn is_overlay(&self, package: Option<&str>) -> bool {
        let Some(pkg) = package.filter(|p| !p.is_empty()) else {
            return false;
        };
        self.exact.iter().any(|e| e == pkg) || self.prefixes.iter().any(|p| pkg.starts_with(p.as_str()))
    }
}

/// A root is usable when it has children, or when it has a class name and a
/// non-degenerate rect.
pub fn is_usable_root<S: NodeSource>(source: &S, root: &S::Node) -> bool {
    if source.child_count(root) > 0 {
        return true;
    }
    let info = source.info(root);
    info.bounds.width() > 0 && info.bounds.height() > 0 && info.class_name.is_some()
}

pub fn score_root<S: NodeSource>(source: &S, root: &S::Node, rules: &OverlayRules) -> i64 {
    let info = source.info(root);
    let children = i64::try_from(source.child_count(root)).unwrap_or(i64::MAX);
    let mut score = info.bounds.area() + children.saturating_mul(100).min(CHILD_BONUS_CAP);
    if rules.is_overlay(info.package.as_deref()) {
        score -= OVERLAY_PENALTY;
    }
    score
}

/// Pick the root every tree operation should read from.
pub fn select_best_root<S: NodeSource>(source: &S, rules: &OverlayRules) -> Option<S::Node> {
    if let Some(active) = source.active_root() {
        let pkg = source.info(&active).package;
        if is_usable_root(source, &active) && !rules.is_overlay(pkg.as_deref()) {
            return Some(active);
        }
        tracing::debug!(package = ?pkg, "active root rejected, scanning windows");
    }

    source
        .window_roots()
        .into_iter()
        .filter(|r| is_usable_root(source, r))
        .map(|r| (score_root(source, &r, rules), r))
        .fold(None, |best: Option<(i64, S::Node)>, (score, r)| match best {
            Some((top, _)) if top >= score => best,
            _ => Some((score, r)),
        })
        .map(|(_, r)| r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use serde_json::json;

    #[test]
    fn test_overlay_rules() {
        let rules = OverlayRules::default();
        assert!(rules.is_overlay(Some("com.android.systemui")));
        assert!(!rules.is_overlay(Some("com.android.systemui.extra")));
        assert!(rules.is_overlay(Some("com.miui.systemui.plugin")));
        assert!(rules.is_overlay(Some("com.android.launcher3")));
        assert!(!rules.is_overlay(Some("com.example")));
        assert!(!rules.is_overlay(None));
        assert!(!rules.is_overlay(Some("")));
    }

    #[test]
    fn test_usable_active_root_is_kept() {
        let src = MemorySource::from_json(&json!({
            "windows": [
                {"package": "com.example", "class": "android.widget.FrameLayout", "bounds": [0, 0, 100, 100]},
                {"package": "com.big", "class": "android.widget.FrameLayout", "bounds": [0, 0, 1080, 2400]}
            ],
            "active": 0
        }))
        .unwrap();
        let root = select_best_root(&src, &OverlayRules::default()).unwrap();
        assert_eq!(src.info(&root).package.as_deref(), Some("com.example"));
    }

    #[test]
    fn test_overlay_active_root_falls_back_to_largest_window() {
        let src = MemorySource::from_json(&json!({
            "windows": [
                {"package": "com.android.systemui", "class": "android.widget.FrameLayout", "bounds": [0, 0, 1080, 2400],
                 "children": [{"class": "android.view.View", "bounds": [0, 0, 10, 10]}]},
                {"package": "com.small", "class": "android.widget.FrameLayout", "bounds": [0, 0, 100, 100]},
                {"package": "com.example", "class": "android.widget.FrameLayout", "bounds": [0, 0, 1080, 2000]},
                {"package": "com.empty", "bounds": [0, 0, 0, 0]}
            ],
            "active": 0
        }))
        .unwrap();
        let root = select_best_root(&src, &OverlayRules::default()).unwrap();
        assert_eq!(src.info(&root).package.as_deref(), Some("com.example"));
    }

    #[test]
    fn test_unusable_active_root() {
        let src = MemorySource::from_json(&json!({
            "windows": [
                {"package": "com.shell", "bounds": [0, 0, 1080, 2400]},
                {"package": "com.example", "class": "android.widget.FrameLayout", "bounds": [0, 0, 10, 10]}
            ],
            "active": 0
        }))
        .unwrap();
        let root = select_best_root(&src, &OverlayRules::default()).unwrap();
        assert_eq!(src.info(&root).package.as_deref(), Some("com.example"));
    }

    #[test]
    fn test_no_usable_root() {
        let src = MemorySource::from_json(&json!({
            "windows": [{"package": "com.shell", "bounds": [0, 0, 0, 0]}],
            "active": 0
        }))
        .unwrap();
        assert!(select_best_root(&src, &OverlayRules::default()).is_none());
    }
}
