//! Selector compiler and matcher.
//!
//! A selector is a JSON object. Leaf fields:
//! - `packageName`, `className`, `resourceId`
//! - `text`, `textContains`
//! - `contentDesc`, `contentDescContains`
//! - `clickable`, `scrollable`, `enabled`, `visible`
//! - `boundsContains: [x, y]`
//! - `boundsIntersects: [l, t, r, b]`
//!
//! Composition: `and: [..]`, `or: [..]`, `not: {..}`. When one of these keys is
//! present the object is a composite and its leaf fields are ignored; `and` wins
//! over `or`, which wins over `not`.
//!
//! Structural: `parent` (immediate parent) and `ancestor` (any proper ancestor).
//!
//! Selectors are parsed into a [`SelectorExpr`] and compiled into a [`Matcher`]
//! that evaluates against the root-to-node stack kept by the tree walker.

use crate::node::{Bounds, NodeSnapshot};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Field predicates of a leaf selector. `None` means "don't care".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafFields {
    pub package_name: Option<String>,
    pub class_name: Option<String>,
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub text_contains: Option<String>,
    pub content_desc: Option<String>,
    pub content_desc_contains: Option<String>,
    pub clickable: Option<bool>,
    pub scrollable: Option<bool>,
    pub enabled: Option<bool>,
    pub visible: Option<bool>,
    pub bounds_contains: Option<(i32, i32)>,
    pub bounds_intersects: Option<Bounds>,
}

impl LeafFields {
    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            package_name: opt_string(obj, "packageName"),
            class_name: opt_string(obj, "className"),
            resource_id: opt_string(obj, "resourceId"),
            text: opt_string(obj, "text"),
            text_contains: opt_string(obj, "textContains"),
            content_desc: opt_string(obj, "contentDesc"),
            content_desc_contains: opt_string(obj, "contentDescContains"),
            clickable: opt_bool(obj, "clickable"),
            scrollable: opt_bool(obj, "scrollable"),
            enabled: opt_bool(obj, "enabled"),
            visible: opt_bool(obj, "visible"),
            bounds_contains: opt_ints(obj, "boundsContains", 2).map(|v| (v[0], v[1])),
            bounds_intersects: opt_ints(obj, "boundsIntersects", 4)
                .map(|v| Bounds::new(v[0], v[1], v[2], v[3])),
        }
    }

    /// Evaluate the field predicates against a single node.
    pub fn matches(&self, node: &NodeSnapshot) -> bool {
        let n = &node.info;

        if !eq_field(&self.package_name, &n.package)
            || !eq_field(&self.class_name, &n.class_name)
            || !eq_field(&self.resource_id, &n.resource_id)
            || !eq_field(&self.text, &n.text)
            || !contains_field(&self.text_contains, &n.text)
            || !eq_field(&self.content_desc, &n.content_desc)
            || !contains_field(&self.content_desc_contains, &n.content_desc)
        {
            return false;
        }

        if !flag_field(self.clickable, n.clickable)
            || !flag_field(self.scrollable, n.scrollable)
            || !flag_field(self.enabled, n.enabled)
            || !flag_field(self.visible, n.visible)
        {
            return false;
        }

        if let Some((x, y)) = self.bounds_contains {
            if !n.bounds.contains(x, y) {
                return false;
            }
        }
        if let Some(rect) = &self.bounds_intersects {
            if !n.bounds.intersects(rect) {
                return false;
            }
        }
        true
    }
}

fn eq_field(want: &Option<String>, have: &Option<String>) -> bool {
    match want {
        Some(w) => have.as_deref() == Some(w.as_str()),
        None => true,
    }
}

fn contains_field(needle: &Option<String>, have: &Option<String>) -> bool {
    match needle {
        Some(n) => have.as_deref().is_some_and(|h| h.contains(n.as_str())),
        None => true,
    }
}

fn flag_field(want: Option<bool>, have: bool) -> bool {
    want.map_or(true, |w| w == have)
}

/// Parsed selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorExpr {
    /// No selector at all; matches every node.
    All,
    And(Vec<SelectorExpr>),
    Or(Vec<SelectorExpr>),
    Not(Box<SelectorExpr>),
    Leaf {
        fields: LeafFields,
        parent: Option<Box<SelectorExpr>>,
        ancestor: Option<Box<SelectorExpr>>,
    },
}

impl SelectorExpr {
    /// Parse a selector from its JSON form. Parsing never fails: malformed
    /// fields are ignored the same way absent ones are.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::All;
        };

        if let Some(v) = obj.get("and") {
            return Self::And(sub_selectors(v));
        }
        if let Some(v) = obj.get("or") {
            return Self::Or(sub_selectors(v));
        }
        if let Some(v) = obj.get("not") {
            return Self::Not(Box::new(Self::from_json(v)));
        }

        Self::Leaf {
            fields: LeafFields::from_object(obj),
            parent: nested(obj, "parent"),
            ancestor: nested(obj, "ancestor"),
        }
    }

    /// A leaf with only field predicates.
    pub fn leaf(fields: LeafFields) -> Self {
        Self::Leaf {
            fields,
            parent: None,
            ancestor: None,
        }
    }

    pub fn resource_id(id: impl Into<String>) -> Self {
        Self::leaf(LeafFields {
            resource_id: Some(id.into()),
            ..Default::default()
        })
    }

    pub fn text_contains(needle: impl Into<String>) -> Self {
        Self::leaf(LeafFields {
            text_contains: Some(needle.into()),
            ..Default::default()
        })
    }
}

impl<'de> Deserialize<'de> for SelectorExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

fn sub_selectors(value: &Value) -> Vec<SelectorExpr> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|v| v.is_object())
                .map(SelectorExpr::from_json)
                .collect()
        })
        .unwrap_or_default()
}

fn nested(obj: &Map<String, Value>, key: &str) -> Option<Box<SelectorExpr>> {
    obj.get(key)
        .filter(|v| v.is_object())
        .map(|v| Box::new(SelectorExpr::from_json(v)))
}

fn opt_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn opt_bool(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    let v = obj.get(key)?;
    Some(match v {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn opt_ints(obj: &Map<String, Value>, key: &str, len: usize) -> Option<Vec<i32>> {
    let arr = obj.get(key)?.as_array()?;
    if arr.len() < len {
        return None;
    }
    Some(arr.iter().take(len).map(as_int).collect())
}

fn as_int(v: &Value) -> i32 {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(|i| i.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

type StackFn = Box<dyn Fn(&[NodeSnapshot]) -> bool + Send + Sync>;

/// Compiled selector, reusable across nodes and walks.
pub struct Matcher {
    test: StackFn,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher").finish_non_exhaustive()
    }
}

impl Matcher {
    pub fn compile(expr: &SelectorExpr) -> Self {
        Self {
            test: compile_stack(expr),
        }
    }

    /// Parse and compile a JSON selector in one step.
    pub fn from_json(value: &Value) -> Self {
        Self::compile(&SelectorExpr::from_json(value))
    }

    /// Evaluate against the root-to-current stack; the current node is last.
    pub fn matches_stack(&self, stack: &[NodeSnapshot]) -> bool {
        (self.test)(stack)
    }

    /// Evaluate with only the immediate parent available.
    pub fn matches(&self, node: &NodeSnapshot, parent: Option<&NodeSnapshot>) -> bool {
        match parent {
            Some(p) => self.matches_stack(&[p.clone(), node.clone()]),
            None => self.matches_stack(std::slice::from_ref(node)),
        }
    }
}

fn compile_stack(expr: &SelectorExpr) -> StackFn {
    match expr {
        SelectorExpr::All => Box::new(|_| true),
        SelectorExpr::And(items) => {
            let ms: Vec<StackFn> = items.iter().map(compile_stack).collect();
            Box::new(move |stack| ms.iter().all(|m| m(stack)))
        }
        SelectorExpr::Or(items) => {
            let ms: Vec<StackFn> = items.iter().map(compile_stack).collect();
            // An empty disjunction matches everything, same as an empty conjunction.
            Box::new(move |stack| ms.is_empty() || ms.iter().any(|m| m(stack)))
        }
        SelectorExpr::Not(inner) => {
            let m = compile_stack(inner);
            Box::new(move |stack| !m(stack))
        }
        SelectorExpr::Leaf {
            fields,
            parent,
            ancestor,
        } => {
            let fields = fields.clone();
            let parent = parent.as_deref().map(compile_stack);
            let ancestor = ancestor.as_deref().map(compile_stack);

            Box::new(move |stack| {
                let Some((current, ancestors)) = stack.split_last() else {
                    return false;
                };
                if !fields.matches(current) {
                    return false;
                }
                if let Some(parent) = &parent {
                    if ancestors.is_empty() || !parent(ancestors) {
                        return false;
                    }
                }
                if let Some(ancestor) = &ancestor {
                    // Each ancestor is evaluated as "current" with its own ancestors below it.
                    if !(1..=ancestors.len()).rev().any(|i| ancestor(&stack[..i])) {
                        return false;
                    }
                }
                true
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeInfo, NodePath};
    use serde_json::json;

    fn node(
        id: &str,
        class: &str,
        text: Option<&str>,
        res_id: Option<&str>,
        clickable: bool,
        bounds: Bounds,
    ) -> NodeSnapshot {
        let path = if id.is_empty() {
            NodePath::root()
        } else {
            id.parse().unwrap()
        };
        NodeSnapshot::new(
            path,
            NodeInfo {
                package: Some("com.example".into()),
                class_name: Some(class.into()),
                text: text.map(Into::into),
                resource_id: res_id.map(Into::into),
                clickable,
                bounds,
                ..Default::default()
            },
        )
    }

    fn button() -> NodeSnapshot {
        node(
            "0",
            "android.widget.Button",
            Some("Submit"),
            Some("com.example:id/submit"),
            true,
            Bounds::new(0, 0, 10, 10),
        )
    }

    #[test]
    fn test_match_by_resource_id() {
        let m = Matcher::from_json(&json!({"resourceId": "com.example:id/submit"}));
        assert!(m.matches(&button(), None));
        let m = Matcher::from_json(&json!({"resourceId": "com.example:id/other"}));
        assert!(!m.matches(&button(), None));
    }

    #[test]
    fn test_text_exact_and_contains_intersect() {
        let n = node("0", "android.widget.TextView", Some("Hello world"), None, false, Bounds::default());
        assert!(Matcher::from_json(&json!({"textContains": "world"})).matches(&n, None));
        assert!(!Matcher::from_json(&json!({"text": "Hello"})).matches(&n, None));
        assert!(Matcher::from_json(&json!({"text": "Hello world", "textContains": "lo w"})).matches(&n, None));
        assert!(!Matcher::from_json(&json!({"text": "Hello world", "textContains": "nope"})).matches(&n, None));
    }

    #[test]
    fn test_contains_fails_on_missing_value() {
        let n = node("0", "android.view.View", None, None, false, Bounds::default());
        assert!(!Matcher::from_json(&json!({"textContains": "x"})).matches(&n, None));
        assert!(!Matcher::from_json(&json!({"contentDescContains": "x"})).matches(&n, None));
    }

    #[test]
    fn test_empty_string_fields_are_ignored() {
        let m = Matcher::from_json(&json!({"text": "", "className": ""}));
        assert!(m.matches(&button(), None));
    }

    #[test]
    fn test_tri_state_flags() {
        assert!(Matcher::from_json(&json!({"clickable": true})).matches(&button(), None));
        assert!(!Matcher::from_json(&json!({"clickable": false})).matches(&button(), None));
        assert!(Matcher::from_json(&json!({"scrollable": false})).matches(&button(), None));
        // present but not a boolean reads as false
        assert!(!Matcher::from_json(&json!({"clickable": 1})).matches(&button(), None));
    }

    #[test]
    fn test_bounds_predicates() {
        let b = button();
        assert!(Matcher::from_json(&json!({"boundsContains": [5, 5]})).matches(&b, None));
        assert!(!Matcher::from_json(&json!({"boundsContains": [10, 5]})).matches(&b, None));
        assert!(Matcher::from_json(&json!({"boundsIntersects": [9, 9, 20, 20]})).matches(&b, None));
        assert!(!Matcher::from_json(&json!({"boundsIntersects": [10, 0, 20, 20]})).matches(&b, None));
        // too short to be a point: ignored
        assert!(Matcher::from_json(&json!({"boundsContains": [500]})).matches(&b, None));
    }

    #[test]
    fn test_and_or_not() {
        let n = button();
        let sel = json!({"and": [
            {"packageName": "com.example"},
            {"clickable": true},
            {"not": {"text": "Cancel"}}
        ]});
        assert!(Matcher::from_json(&sel).matches(&n, None));

        let sel = json!({"or": [{"text": "Cancel"}, {"resourceId": "com.example:id/submit"}]});
        assert!(Matcher::from_json(&sel).matches(&n, None));

        let sel = json!({"or": [{"text": "Cancel"}, {"text": "Back"}]});
        assert!(!Matcher::from_json(&sel).matches(&n, None));

        assert!(!Matcher::from_json(&json!({"not": {"text": "Submit"}})).matches(&n, None));
    }

    #[test]
    fn test_empty_and_matches_everything() {
        assert!(Matcher::from_json(&json!({"and": []})).matches(&button(), None));
    }

    #[test]
    fn test_empty_or_matches_everything() {
        // vacuously true, like an empty `and`
        assert!(Matcher::from_json(&json!({"or": []})).matches(&button(), None));
        assert!(Matcher::from_json(&json!({"or": "not-a-list"})).matches(&button(), None));
    }

    #[test]
    fn test_composite_takes_precedence_over_leaf_fields() {
        let sel = json!({"text": "Nope", "and": [{"text": "Submit"}]});
        assert!(Matcher::from_json(&sel).matches(&button(), None));
        let sel = json!({"and": [], "or": [{"text": "Nope"}]});
        assert!(Matcher::from_json(&sel).matches(&button(), None));
    }

    #[test]
    fn test_not_with_non_object_never_matches() {
        assert!(!Matcher::from_json(&json!({"not": 3})).matches(&button(), None));
    }

    #[test]
    fn test_null_selector_matches_everything() {
        assert!(Matcher::from_json(&Value::Null).matches(&button(), None));
        assert!(Matcher::from_json(&json!({})).matches(&button(), None));
    }

    #[test]
    fn test_parent_constraint() {
        let parent = node(
            "0",
            "android.widget.LinearLayout",
            None,
            Some("com.example:id/container"),
            false,
            Bounds::new(0, 0, 100, 100),
        );
        let child = node(
            "0/0",
            "android.widget.Button",
            Some("OK"),
            Some("com.example:id/ok"),
            true,
            Bounds::new(0, 0, 10, 10),
        );
        let m = Matcher::from_json(&json!({
            "resourceId": "com.example:id/ok",
            "parent": {"resourceId": "com.example:id/container"}
        }));
        assert!(m.matches(&child, Some(&parent)));
        assert!(!m.matches(&child, None));
        assert!(!m.matches(&child, Some(&child)));
    }

    #[test]
    fn test_parent_is_immediate_only() {
        let root = node("", "android.widget.FrameLayout", None, Some("com.example:id/root"), false, Bounds::default());
        let mid = node("0", "android.widget.LinearLayout", None, None, false, Bounds::default());
        let leaf = node("0/0", "android.widget.TextView", Some("OK"), None, false, Bounds::default());
        let m = Matcher::from_json(&json!({"text": "OK", "parent": {"resourceId": "com.example:id/root"}}));
        assert!(!m.matches_stack(&[root.clone(), mid.clone(), leaf.clone()]));

        let m = Matcher::from_json(&json!({"text": "OK", "ancestor": {"resourceId": "com.example:id/root"}}));
        assert!(m.matches_stack(&[root, mid, leaf]));
    }

    #[test]
    fn test_ancestor_excludes_self() {
        let root = node("", "android.widget.FrameLayout", None, None, false, Bounds::default());
        let leaf = node("0", "android.widget.TextView", Some("OK"), Some("com.example:id/label"), false, Bounds::default());
        let m = Matcher::from_json(&json!({"text": "OK", "ancestor": {"resourceId": "com.example:id/label"}}));
        assert!(!m.matches_stack(&[root, leaf.clone()]));
        assert!(!m.matches_stack(&[leaf]));
    }

    #[test]
    fn test_nested_parent_chain() {
        let root = node("", "android.widget.FrameLayout", None, Some("com.example:id/root"), false, Bounds::default());
        let mid = node("0", "android.widget.LinearLayout", None, Some("com.example:id/mid"), false, Bounds::default());
        let leaf = node("0/0", "android.widget.TextView", Some("OK"), None, false, Bounds::default());
        let m = Matcher::from_json(&json!({
            "text": "OK",
            "parent": {"resourceId": "com.example:id/mid", "parent": {"resourceId": "com.example:id/root"}}
        }));
        assert!(m.matches_stack(&[root, mid, leaf]));
    }

    #[test]
    fn test_deserialize_from_request_field() {
        #[derive(Deserialize)]
        struct Req {
            selector: SelectorExpr,
        }
        let req: Req = serde_json::from_value(json!({"selector": {"textContains": "ok"}})).unwrap();
        assert_eq!(req.selector, SelectorExpr::text_contains("ok"));
    }
}
