//! # Prediction contract
//! Class selection over a score vector and the values derived from it.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Number of entries reported in `all_predictions`.
pub const TOP_K: usize = 3;

const SEVERE_ABOVE: f32 = 0.8;
const MODERATE_ABOVE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Thresholds are compared in `f32`, the precision the model emits.
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence > SEVERE_ABOVE {
            Severity::Severe
        } else if confidence > MODERATE_ABOVE {
            Severity::Moderate
        } else {
            Severity::Mild
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of the highest score; the lowest index wins ties. `None` for an empty vector.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Indices of the `k` highest scores, descending, ties broken by ascending index.
pub fn top_k_indices(scores: &[f32], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    indices.truncate(k);
    indices
}

/// Ordered `label -> score` pairs, serialized as a JSON object in rank order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopK(pub Vec<(String, f32)>);

impl TopK {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(label, score)| (label.as_str(), *score))
    }

    pub fn first(&self) -> Option<(&str, f32)> {
        self.iter().next()
    }
}

impl Serialize for TopK {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, score) in &self.0 {
            map.serialize_entry(label, score)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: String,
    pub index: usize,
    pub confidence: f32,
    pub severity: Severity,
    pub cause: String,
    pub cure: String,
    pub top_k: TopK,
}
