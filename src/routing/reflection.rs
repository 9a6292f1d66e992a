//! Static description of a context tree.
//!
//! # Responsibilities
//! - `map`: tagged conditions, nested exactly like the tree
//! - `info`: merged human-oriented conditions plus descriptions and fields
//!
//! # Design Decisions
//! - Only condition branches are described; middleware and actions are opaque
//! - In `info`, a branch without a path segment (e.g. a bare `get`) is shown
//!   with an empty context and its own branches are lifted next to it,
//!   carrying its merged condition

use serde::Serialize;
use serde_json::{Map, Value};

use crate::routing::context::ContextNode;

/// One branch in [`ContextNode::map`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapEntry {
    pub condition: Value,
    pub context: Vec<MapEntry>,
}

/// One branch in [`ContextNode::info`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoEntry {
    pub condition: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub description: Vec<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    pub context: Vec<InfoEntry>,
}

impl ContextNode {
    pub fn map(&self) -> Vec<MapEntry> {
        self.branches()
            .map(|(condition, context)| MapEntry {
                condition: condition.serialize(),
                context: context.map(),
            })
            .collect()
    }

    pub fn info(&self) -> Vec<InfoEntry> {
        let mut entries = Vec::new();
        collect_info(self, &Map::new(), &mut entries);
        entries
    }
}

fn collect_info(node: &ContextNode, inherited: &Map<String, Value>, out: &mut Vec<InfoEntry>) {
    for (condition, context) in node.branches() {
        let own = condition.describe();
        let anonymous = !own.contains_key("path");

        let mut merged = inherited.clone();
        merged.extend(own);

        let handle = context.handle();
        let mut entry = InfoEntry {
            condition: merged,
            description: handle.description(),
            fields: handle.fields(),
            context: Vec::new(),
        };

        if anonymous {
            let lifted_from = entry.condition.clone();
            out.push(entry);
            collect_info(context, &lifted_from, out);
        } else {
            entry.context = context.info();
            out.push(entry);
        }
    }
}
