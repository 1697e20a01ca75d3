//! JSON output formatter for machine-readable results.

use super::formatter::ExtractionSummary;
use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use anyhow::Result;
use arctree_core::ContentTree;
use arctree_core::EntryIndex;
use arctree_core::TreeNode;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::io::{self};

pub struct JsonFormatter;

#[derive(Serialize)]
struct ListedEntry {
    index: usize,
    path: String,
    kind: &'static str,
    size: u64,
    encrypted: bool,
    duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
}

#[derive(Serialize)]
struct TreeOutput {
    name: String,
    path: String,
    kind: &'static str,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    implicit: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Self>,
}

fn kind_of(node: &TreeNode) -> &'static str {
    if node.is_folder() { "folder" } else { "file" }
}

fn tree_output(tree: &ContentTree, node: &TreeNode) -> TreeOutput {
    TreeOutput {
        name: node.name().to_string(),
        path: node.path().to_string(),
        kind: kind_of(node),
        size: node.size(),
        index: node.entry_index().map(EntryIndex::get),
        implicit: node.is_implicit(),
        children: tree
            .children(node.id())
            .map(|child| tree_output(tree, child))
            .collect(),
    }
}

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_listing(&self, tree: &ContentTree, _long: bool, _human_readable: bool) -> Result<()> {
        #[derive(Serialize)]
        struct ListingOutput {
            archive: String,
            total_entries: usize,
            total_size: u64,
            entries: Vec<ListedEntry>,
        }

        let entries = (0..tree.entry_count())
            .filter_map(|i| {
                let index = EntryIndex::new(i);
                tree.node_for(index).map(|node| ListedEntry {
                    index: i,
                    path: node.path().to_string(),
                    kind: kind_of(node),
                    size: node.size(),
                    encrypted: node.is_encrypted(),
                    duplicate: node.entry_index() != Some(index),
                    modified: node
                        .modified()
                        .map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
                })
            })
            .collect();

        let data = ListingOutput {
            archive: tree.display_root().to_string(),
            total_entries: tree.entry_count(),
            total_size: tree.total_size(),
            entries,
        };

        Self::output(&JsonOutput::success("list", data))
    }

    fn format_tree(&self, tree: &ContentTree, _sizes: bool) -> Result<()> {
        let mut root = tree_output(tree, tree.root());
        root.name = tree.display_root().to_string();
        Self::output(&JsonOutput::success("tree", root))
    }

    fn format_extraction_result(&self, summary: &ExtractionSummary) -> Result<()> {
        let output = if summary.cancelled || !summary.failed.is_empty() {
            JsonOutput::partial("extract", summary)
        } else {
            JsonOutput::success("extract", summary)
        };
        Self::output(&output)
    }

    fn format_error(&self, error: &anyhow::Error) {
        let output = JsonOutput::<()>::error("error", format!("{error:#}"));
        let _ = Self::output(&output);
    }

    fn format_warning(&self, message: &str) {
        #[derive(Serialize)]
        struct WarningData {
            message: String,
        }

        let output = JsonOutput::success(
            "warning",
            WarningData {
                message: message.to_string(),
            },
        );
        let _ = Self::output(&output);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope() {
        let output = JsonOutput::<()>::error("extract", "boom");
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_partial_envelope_keeps_data() {
        let summary = ExtractionSummary {
            requested: 3,
            cancelled: true,
            ..Default::default()
        };
        let json = serde_json::to_value(JsonOutput::partial("extract", &summary)).unwrap();
        assert_eq!(json["status"], "partial");
        assert_eq!(json["data"]["requested"], 3);
        assert_eq!(json["data"]["cancelled"], true);
    }
}
