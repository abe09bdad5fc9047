//! Node snapshot model.
//!
//! A [`NodeSnapshot`] is plain data copied out of the live tree during a single
//! traversal. It never refers back to a host handle, so matching, target
//! resolution and serialization can all happen after the walk has moved on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Screen rectangle in pixels, serialized as `[left, top, right, bottom]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Area with negative extents clamped to zero.
    pub fn area(&self) -> i64 {
        i64::from(self.width().max(0)) * i64::from(self.height().max(0))
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) >> 1, (self.top + self.bottom) >> 1)
    }

    /// Half-open containment; an empty rect contains nothing.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        !self.is_empty() && x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Whether a synthesized gesture may be aimed at this rect.
    pub fn is_gesture_target(&self) -> bool {
        self.width() > 1 && self.height() > 1
    }
}

impl From<[i32; 4]> for Bounds {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Bounds> for [i32; 4] {
    fn from(b: Bounds) -> Self {
        [b.left, b.top, b.right, b.bottom]
    }
}

/// Errors from parsing a client-supplied node id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("node id is empty")]
    Blank,

    #[error("non-numeric path segment: {0:?}")]
    BadSegment(String),

    #[error("no node at negative index {0}")]
    Negative(String),
}

/// Child-index path from the tree root; the root itself is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }

    pub fn segments(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(segments: Vec<usize>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", idx)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    /// Parses a client node id such as `"0/3/1"`. The empty string is not a
    /// valid client id even though it names the root internally.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(PathError::Blank);
        }
        let mut segments = Vec::new();
        for part in s.split('/') {
            let idx: i64 = part
                .parse()
                .map_err(|_| PathError::BadSegment(part.to_string()))?;
            let idx = usize::try_from(idx).map_err(|_| PathError::Negative(part.to_string()))?;
            segments.push(idx);
        }
        Ok(Self(segments))
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok(Self::root());
        }
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn default_true() -> bool {
    true
}

/// Everything the host reports about one node, minus its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content_desc: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub scrollable: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub bounds: Bounds,
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self {
            package: None,
            class_name: None,
            text: None,
            content_desc: None,
            resource_id: None,
            clickable: false,
            scrollable: false,
            enabled: true,
            visible: true,
            bounds: Bounds::default(),
        }
    }
}

impl NodeInfo {
    /// Visible, enabled, clickable and large enough to tap.
    pub fn is_action_target(&self) -> bool {
        self.visible && self.enabled && self.clickable && self.bounds.is_gesture_target()
    }

    /// Visible, enabled, scrollable and large enough to swipe.
    pub fn is_scroll_target(&self) -> bool {
        self.visible && self.enabled && self.scrollable && self.bounds.is_gesture_target()
    }
}

/// Immutable per-node record produced by a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    #[serde(rename = "nodeId")]
    pub path: NodePath,
    #[serde(flatten)]
    pub info: NodeInfo,
}

impl NodeSnapshot {
    pub fn new(path: NodePath, info: NodeInfo) -> Self {
        Self { path, info }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display_and_parse() {
        let path: NodePath = "0/3/1".parse().unwrap();
        assert_eq!(path.segments(), &[0, 3, 1]);
        assert_eq!(path.to_string(), "0/3/1");
        assert_eq!(NodePath::root().to_string(), "");
        assert_eq!(NodePath::root().child(2).child(0).to_string(), "2/0");
    }

    #[test]
    fn test_path_parse_errors() {
        assert_eq!("".parse::<NodePath>(), Err(PathError::Blank));
        assert_eq!("  ".parse::<NodePath>(), Err(PathError::Blank));
        assert!(matches!("0/a".parse::<NodePath>(), Err(PathError::BadSegment(_))));
        assert!(matches!("0//1".parse::<NodePath>(), Err(PathError::BadSegment(_))));
        assert!(matches!("0/-1".parse::<NodePath>(), Err(PathError::Negative(_))));
    }

    #[test]
    fn test_bounds_geometry() {
        let b = Bounds::new(0, 0, 100, 50);
        assert_eq!(b.center(), (50, 25));
        assert!(b.contains(0, 0));
        assert!(!b.contains(100, 10));
        assert!(b.intersects(&Bounds::new(99, 49, 200, 200)));
        assert!(!b.intersects(&Bounds::new(100, 0, 200, 50)));
        assert!(!Bounds::new(5, 5, 5, 9).contains(5, 6));
        assert!(!Bounds::new(0, 0, 1, 40).is_gesture_target());
        assert_eq!(Bounds::new(10, 10, 0, 0).area(), 0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snap = NodeSnapshot::new(
            "0/1".parse().unwrap(),
            NodeInfo {
                package: Some("com.example".into()),
                class_name: Some("android.widget.Button".into()),
                clickable: true,
                bounds: Bounds::new(1, 2, 3, 4),
                ..Default::default()
            },
        );
        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["nodeId"], "0/1");
        assert_eq!(v["class"], "android.widget.Button");
        assert_eq!(v["bounds"], serde_json::json!([1, 2, 3, 4]));
        assert!(v["text"].is_null());
        assert_eq!(v["visible"], true);
    }
}
