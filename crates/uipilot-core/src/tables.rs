//! Static package knowledge used by the launch orchestrator.
//!
//! Every table has built-in defaults overridable from the `[tables]` section
//! of the server config. Package-keyed maps merge per key over the built-in
//! entries (an empty list removes one); lists are replaced as a whole.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Package hosts and button labels of OS launch-confirmation dialogs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogRules {
    /// Packages that host chooser and permission dialogs.
    pub hosts: Vec<String>,
    /// Substrings that mark a package as a dialog host.
    pub host_fragments: Vec<String>,
    /// Never treated as a dialog host, whatever the other rules say.
    pub excluded_hosts: Vec<String>,
    pub always_ids: Vec<String>,
    pub always_labels: Vec<String>,
    pub once_ids: Vec<String>,
    pub once_labels: Vec<String>,
    pub positive_ids: Vec<String>,
    pub positive_labels: Vec<String>,
}

impl Default for DialogRules {
    fn default() -> Self {
        Self {
            hosts: strings(&[
                "android",
                "com.android.systemui",
                "com.vivo.appfilter",
                "com.google.android.permissioncontroller",
                "com.android.permissioncontroller",
            ]),
            host_fragments: strings(&["permissioncontroller", "resolver"]),
            excluded_hosts: strings(&["com.android.settings"]),
            always_ids: strings(&["android:id/button_always"]),
            always_labels: strings(&["Always", "always", "始终打开", "总是"]),
            once_ids: strings(&["android:id/button_once"]),
            once_labels: strings(&["Just once", "just once", "仅此一次", "只此一次"]),
            positive_ids: strings(&["android:id/button1", "android:id/button_positive"]),
            positive_labels: strings(&[
                "Allow", "allow", "Confirm", "confirm", "Continue", "continue", "允许", "确认", "继续",
                "确定", "同意",
            ]),
        }
    }
}

/// One confirm-button probe, tried in order until one clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmProbe<'a> {
    ResourceId(&'a str),
    TextContains(&'a str),
}

impl ConfirmProbe<'_> {
    pub fn label(&self) -> &str {
        match self {
            Self::ResourceId(s) | Self::TextContains(s) => s,
        }
    }
}

/// Which resolver button to prefer when both are offered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmPreference {
    #[default]
    Always,
    Once,
}

impl ConfirmPreference {
    /// `"once"` (any case, surrounding space ignored) selects [`Self::Once`];
    /// anything else means [`Self::Always`].
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("once") {
            Self::Once
        } else {
            Self::Always
        }
    }
}

impl DialogRules {
    pub fn is_host(&self, package: Option<&str>) -> bool {
        let Some(pkg) = package.filter(|p| !p.is_empty()) else {
            return false;
        };
        if self.excluded_hosts.iter().any(|e| e == pkg) {
            return false;
        }
        self.hosts.iter().any(|h| h == pkg)
            || self.host_fragments.iter().any(|f| pkg.contains(f.as_str()))
    }

    /// Probe order: preferred ids, preferred labels, the other choice's ids and
    /// labels, then generic positive buttons.
    pub fn probes(&self, preference: ConfirmPreference) -> Vec<ConfirmProbe<'_>> {
        let (first_ids, first_labels, second_ids, second_labels) = match preference {
            ConfirmPreference::Always => (&self.always_ids, &self.always_labels, &self.once_ids, &self.once_labels),
            ConfirmPreference::Once => (&self.once_ids, &self.once_labels, &self.always_ids, &self.always_labels),
        };

        let mut out = Vec::new();
        let groups: [(&Vec<String>, bool); 6] = [
            (first_ids, true),
            (first_labels, false),
            (second_ids, true),
            (second_labels, false),
            (&self.positive_ids, true),
            (&self.positive_labels, false),
        ];
        for (items, by_id) in groups {
            for item in items.iter().filter(|s| !s.is_empty()) {
                out.push(if by_id {
                    ConfirmProbe::ResourceId(item)
                } else {
                    ConfirmProbe::TextContains(item)
                });
            }
        }
        out
    }
}

/// Package alternates, component fallbacks and dialog rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchTables {
    /// Forks and channels tried after the requested package.
    #[serde(deserialize_with = "alternates_over_defaults")]
    pub alternates: BTreeMap<String, Vec<String>>,
    /// `pkg/cls` components started when every standard strategy fails.
    #[serde(deserialize_with = "fallbacks_over_defaults")]
    pub fallback_components: BTreeMap<String, Vec<String>>,
    pub dialog: DialogRules,
}

type PackageMap = BTreeMap<String, Vec<String>>;

fn default_alternates() -> PackageMap {
    let mut alternates = BTreeMap::new();
    alternates.insert(
        "org.telegram.messenger".to_string(),
        strings(&["org.thunderdog.challegram", "org.telegram.plus"]),
    );
    alternates.insert(
        "com.discord".to_string(),
        strings(&["com.discord.beta", "com.discord.ptb"]),
    );
    alternates
}

fn default_fallback_components() -> PackageMap {
    let mut fallbacks = BTreeMap::new();
    fallbacks.insert(
        "com.tencent.mm".to_string(),
        strings(&["com.tencent.mm/.ui.LauncherUI"]),
    );
    fallbacks.insert(
        "tv.danmaku.bili".to_string(),
        strings(&["tv.danmaku.bili/.MainActivityV2"]),
    );
    fallbacks
}

fn merge_over<'de, D: Deserializer<'de>>(mut base: PackageMap, deserializer: D) -> Result<PackageMap, D::Error> {
    base.extend(PackageMap::deserialize(deserializer)?);
    Ok(base)
}

fn alternates_over_defaults<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PackageMap, D::Error> {
    merge_over(default_alternates(), deserializer)
}

fn fallbacks_over_defaults<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PackageMap, D::Error> {
    merge_over(default_fallback_components(), deserializer)
}

impl Default for LaunchTables {
    fn default() -> Self {
        Self {
            alternates: default_alternates(),
            fallback_components: default_fallback_components(),
            dialog: DialogRules::default(),
        }
    }
}

impl LaunchTables {
    /// The requested package followed by its alternates, deduplicated in
    /// first-seen order.
    pub fn candidates(&self, package: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        if package.is_empty() {
            return out;
        }
        out.push(package.to_string());
        for alt in self.alternates.get(package).into_iter().flatten() {
            if !alt.is_empty() && !out.contains(alt) {
                out.push(alt.clone());
            }
        }
        out
    }

    pub fn fallbacks_for(&self, package: &str) -> &[String] {
        self.fallback_components
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_keep_order() {
        let t = LaunchTables::default();
        assert_eq!(
            t.candidates("org.telegram.messenger"),
            vec!["org.telegram.messenger", "org.thunderdog.challegram", "org.telegram.plus"]
        );
        assert_eq!(t.candidates("com.example"), vec!["com.example"]);
        assert!(t.candidates("").is_empty());
    }

    #[test]
    fn test_candidates_dedupe() {
        let mut t = LaunchTables::default();
        t.alternates
            .insert("com.a".into(), vec!["com.b".into(), "com.a".into(), "com.b".into()]);
        assert_eq!(t.candidates("com.a"), vec!["com.a", "com.b"]);
    }

    #[test]
    fn test_dialog_hosts() {
        let d = DialogRules::default();
        assert!(d.is_host(Some("android")));
        assert!(d.is_host(Some("com.vivo.appfilter")));
        assert!(d.is_host(Some("com.oem.permissioncontroller.ui")));
        assert!(d.is_host(Some("com.android.intentresolver")));
        assert!(!d.is_host(Some("com.android.settings")));
        assert!(!d.is_host(Some("com.example")));
        assert!(!d.is_host(None));
    }

    #[test]
    fn test_probe_order_follows_preference() {
        let d = DialogRules::default();
        let always = d.probes(ConfirmPreference::Always);
        assert_eq!(always[0], ConfirmProbe::ResourceId("android:id/button_always"));
        assert_eq!(always[1], ConfirmProbe::TextContains("Always"));
        assert_eq!(always[5], ConfirmProbe::ResourceId("android:id/button_once"));

        let once = d.probes(ConfirmPreference::Once);
        assert_eq!(once[0], ConfirmProbe::ResourceId("android:id/button_once"));
        assert_eq!(once[1].label(), "Just once");
        assert_eq!(
            once.last().copied(),
            Some(ConfirmProbe::TextContains("同意"))
        );
    }

    #[test]
    fn test_preference_parse() {
        assert_eq!(ConfirmPreference::parse(" ONCE "), ConfirmPreference::Once);
        assert_eq!(ConfirmPreference::parse("always"), ConfirmPreference::Always);
        assert_eq!(ConfirmPreference::parse("whatever"), ConfirmPreference::Always);
    }

    #[test]
    fn test_tables_from_partial_toml() {
        let t: LaunchTables = toml::from_str("[alternates]\n\"com.x\" = [\"com.y\"]\n").unwrap();
        assert_eq!(t.candidates("com.x"), vec!["com.x", "com.y"]);
        assert_eq!(t.candidates("org.telegram.messenger").len(), 3);
        assert_eq!(t.candidates("com.discord"), vec!["com.discord", "com.discord.beta", "com.discord.ptb"]);
        assert_eq!(t.fallbacks_for("com.tencent.mm"), ["com.tencent.mm/.ui.LauncherUI"]);
        assert_eq!(t.dialog, DialogRules::default());
    }

    #[test]
    fn test_table_entries_override_per_package() {
        let t: LaunchTables = toml::from_str(
            "[alternates]\n\"org.telegram.messenger\" = []\n[fallback_components]\n\"com.x\" = [\"com.x/.Main\"]\n",
        )
        .unwrap();
        assert_eq!(t.candidates("org.telegram.messenger"), vec!["org.telegram.messenger"]);
        assert_eq!(t.candidates("com.discord").len(), 3);
        assert_eq!(t.fallbacks_for("com.x"), ["com.x/.Main"]);
        assert_eq!(t.fallbacks_for("tv.danmaku.bili"), ["tv.danmaku.bili/.MainActivityV2"]);
    }
}
