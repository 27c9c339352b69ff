// Sector Ripple - Dependency Graph
// nodes.rs - Sector nodes with baseline scores
//
// A node is one economic sector. Its baseline score is the precomputed
// risk score the ripple starts from. Position fields exist only so the
// dashboard's graph JSON round-trips; the engine never reads them.
//
// Copyright (c) 2026 Sector Ripple contributors. All rights reserved.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One sector in the dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Classification code, unique within a graph (e.g. "41").
    pub id: String,

    /// Baseline score on the 0-100 scale.
    #[serde(rename = "baseScore", alias = "base_score")]
    pub base_score: f64,

    /// Human-readable sector name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Layout x coordinate (presentation only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,

    /// Layout y coordinate (presentation only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<String>, base_score: f64) -> Self {
        Self {
            id: id.into(),
            base_score,
            label: None,
            x: None,
            y: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// Both coordinates, if the node has been laid out.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }

    /// Signed distance of the baseline from the neutral score.
    pub fn deviation(&self, neutral: f64) -> f64 {
        self.base_score - neutral
    }

    /// Label if present, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1})", self.display_name(), self.base_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_dashboard_field_names() {
        let node: Node = serde_json::from_str(
            r#"{"id": "41", "label": "Budownictwo", "baseScore": 62.5, "x": 10.0, "y": 20.0}"#,
        )
        .unwrap();
        assert_eq!(node.id, "41");
        assert_eq!(node.base_score, 62.5);
        assert_eq!(node.display_name(), "Budownictwo");
        assert_eq!(node.position(), Some((10.0, 20.0)));
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let node: Node = serde_json::from_str(r#"{"id": "62", "base_score": 48.0}"#).unwrap();
        assert_eq!(node.label, None);
        assert_eq!(node.position(), None);
        assert_eq!(node.display_name(), "62");
        assert_eq!(node.to_string(), "62 (48.0)");
    }

    #[test]
    fn test_builders_serialize_dashboard_fields() {
        let node = Node::new("41", 62.5)
            .with_label("Budownictwo")
            .with_position(10.0, 20.0);
        assert_eq!(node.position(), Some((10.0, 20.0)));
        assert_eq!(node.to_string(), "Budownictwo (62.5)");

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["baseScore"], 62.5);
        assert_eq!(json["label"], "Budownictwo");
        assert_eq!(json["x"], 10.0);

        let bare = serde_json::to_value(Node::new("62", 48.0)).unwrap();
        assert!(bare.get("label").is_none());
        assert!(bare.get("x").is_none());
    }

    #[test]
    fn test_partial_position_is_no_position() {
        let node = Node {
            x: Some(1.0),
            ..Node::new("01", 50.0)
        };
        assert_eq!(node.position(), None);
    }

    #[test]
    fn test_deviation_is_signed() {
        assert_eq!(Node::new("35", 58.0).deviation(50.0), 8.0);
        assert_eq!(Node::new("55", 41.0).deviation(50.0), -9.0);
    }
}
