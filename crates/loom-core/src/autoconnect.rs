//! Auto-connect heuristic
//!
//! Proposes edges between components from their connection points alone:
//! an emitting point may feed an accepting point when the data types are
//! compatible and the names suggest they carry the same thing.

use serde::Serialize;

use crate::connection::{ConnectionManager, Endpoint};
use crate::types::{ConnectionPoint, DataType};

/// Output names that carry "the value" of a widget
const VALUE_LIKE_OUTPUTS: &[&str] = &["value", "change", "changed", "selected", "output", "result"];

/// Input names that accept "a value"
const VALUE_LIKE_INPUTS: &[&str] = &["value", "text", "data", "content", "input"];

/// Proposed connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proposal {
    pub source: Endpoint,
    pub target: Endpoint,
    /// Library transform to install, when the types need one
    pub transform: Option<String>,
}

/// Heuristic switches
#[derive(Debug, Clone, Copy)]
pub struct AutoConnectOptions {
    pub allow_number_to_text: bool,
}

impl Default for AutoConnectOptions {
    fn default() -> Self {
        Self {
            allow_number_to_text: true,
        }
    }
}

impl From<&loom_config::AutoConnectConfig> for AutoConnectOptions {
    fn from(config: &loom_config::AutoConnectConfig) -> Self {
        Self {
            allow_number_to_text: config.allow_number_to_text,
        }
    }
}

fn names_match(output: &ConnectionPoint, input: &ConnectionPoint) -> bool {
    if output.id.eq_ignore_ascii_case(&input.id) {
        return true;
    }
    let output_like = VALUE_LIKE_OUTPUTS
        .iter()
        .any(|n| output.id.eq_ignore_ascii_case(n));
    let input_like = VALUE_LIKE_INPUTS.iter().any(|n| input.id.eq_ignore_ascii_case(n));
    output_like && input_like
}

/// Transform needed to carry `from` into `to`; `None` when incompatible
fn type_bridge(from: DataType, to: DataType, options: AutoConnectOptions) -> Option<Option<String>> {
    if from.is_compatible_with(to) {
        Some(None)
    } else if from == DataType::Number && to == DataType::Text && options.allow_number_to_text {
        Some(Some("toString".to_string()))
    } else {
        None
    }
}

/// Propose connections among `components`
///
/// `points_of` lists every point a component exposes. Never proposes
/// self-connections, incompatible types, or edges that already exist.
pub fn propose<F>(
    components: &[&str],
    points_of: F,
    existing: &ConnectionManager,
    options: AutoConnectOptions,
) -> Vec<Proposal>
where
    F: Fn(&str) -> Vec<ConnectionPoint>,
{
    let mut proposals: Vec<Proposal> = Vec::new();
    let points: Vec<(&str, Vec<ConnectionPoint>)> =
        components.iter().map(|id| (*id, points_of(id))).collect();

    for (source_id, source_points) in &points {
        for output in source_points.iter().filter(|p| p.direction.emits()) {
            for (target_id, target_points) in &points {
                if source_id == target_id {
                    continue;
                }
                for input in target_points.iter().filter(|p| p.direction.accepts()) {
                    if !names_match(output, input) {
                        continue;
                    }
                    let Some(transform) = type_bridge(output.data_type, input.data_type, options)
                    else {
                        continue;
                    };
                    let source = Endpoint::new(*source_id, &output.id);
                    let target = Endpoint::new(*target_id, &input.id);
                    let duplicate = existing.exists(&source, &target)
                        || proposals.iter().any(|p| p.source == source && p.target == target);
                    if !duplicate {
                        proposals.push(Proposal {
                            source,
                            target,
                            transform,
                        });
                    }
                }
            }
        }
    }
    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn points() -> HashMap<&'static str, Vec<ConnectionPoint>> {
        let mut map = HashMap::new();
        map.insert(
            "input1",
            vec![ConnectionPoint::bidirectional("value", DataType::Text)],
        );
        map.insert("text1", vec![ConnectionPoint::input("text", DataType::Text)]);
        map.insert(
            "slider1",
            vec![ConnectionPoint::output("value", DataType::Number)],
        );
        map.insert(
            "check1",
            vec![ConnectionPoint::output("checked", DataType::Boolean)],
        );
        map
    }

    fn run(ids: &[&str], existing: &ConnectionManager, options: AutoConnectOptions) -> Vec<Proposal> {
        let table = points();
        propose(ids, |id| table.get(id).cloned().unwrap_or_default(), existing, options)
    }

    #[test]
    fn test_value_like_names_connect() {
        let proposals = run(&["input1", "text1"], &ConnectionManager::new(), AutoConnectOptions::default());
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].source, Endpoint::new("input1", "value"));
        assert_eq!(proposals[0].target, Endpoint::new("text1", "text"));
        assert!(proposals[0].transform.is_none());
    }

    #[test]
    fn test_number_to_text_needs_to_string() {
        let proposals = run(&["slider1", "text1"], &ConnectionManager::new(), AutoConnectOptions::default());
        assert_eq!(proposals[0].transform.as_deref(), Some("toString"));

        let strict = AutoConnectOptions {
            allow_number_to_text: false,
        };
        assert!(run(&["slider1", "text1"], &ConnectionManager::new(), strict).is_empty());
    }

    #[test]
    fn test_no_self_or_unmatched() {
        assert!(run(&["input1"], &ConnectionManager::new(), AutoConnectOptions::default()).is_empty());
        assert!(run(&["check1", "text1"], &ConnectionManager::new(), AutoConnectOptions::default()).is_empty());
    }

    #[test]
    fn test_existing_edges_not_duplicated() {
        let mut existing = ConnectionManager::new();
        existing.connect("input1", "value", "text1", "text", None);
        assert!(run(&["input1", "text1"], &existing, AutoConnectOptions::default()).is_empty());
    }
}
