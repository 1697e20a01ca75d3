//! Human-readable output formatter with colors and styling.

use super::formatter::ExtractionSummary;
use super::formatter::OutputFormatter;
use anyhow::Result;
use arctree_core::ContentTree;
use arctree_core::EntryIndex;
use arctree_core::TreeNode;
use arctree_core::tree::NodeId;
use chrono::DateTime;
use chrono::Local;
use console::Term;
use console::style;
use std::time::SystemTime;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
        }
    }

    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_number(n: usize) -> String {
        let s = n.to_string();
        let mut result = String::new();
        let mut count = 0;

        for c in s.chars().rev() {
            if count == 3 {
                result.push(',');
                count = 0;
            }
            result.push(c);
            count += 1;
        }

        result.chars().rev().collect()
    }

    fn format_time(time: Option<SystemTime>) -> String {
        time.map_or_else(
            || "-".to_string(),
            |t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string(),
        )
    }

    fn node_label(&self, node: &TreeNode, sizes: bool) -> String {
        let name = if node.is_folder() {
            format!("{}/", node.name())
        } else {
            node.name().to_string()
        };
        let name = if node.is_folder() && self.use_colors {
            style(name).blue().bold().to_string()
        } else {
            name
        };

        let mut label = name;
        if sizes && node.is_file() {
            label.push_str(&format!(" ({})", Self::format_size(node.size())));
        }
        if self.verbose && let Some(index) = node.entry_index() {
            label.push_str(&format!(" {index}"));
        }
        if node.is_encrypted() {
            label.push_str(" [encrypted]");
        }
        label
    }

    fn render_children(
        &self,
        tree: &ContentTree,
        id: NodeId,
        prefix: &str,
        sizes: bool,
        lines: &mut Vec<String>,
    ) {
        let children: Vec<&TreeNode> = tree.children(id).collect();
        let last = children.len().saturating_sub(1);

        for (i, child) in children.into_iter().enumerate() {
            let (branch, indent) = if i == last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            lines.push(format!("{prefix}{branch}{}", self.node_label(child, sizes)));
            if child.is_folder() {
                let nested = format!("{prefix}{indent}");
                self.render_children(tree, child.id(), &nested, sizes, lines);
            }
        }
    }

    fn write_warning_block(&self, summary: &ExtractionSummary) {
        for failure in &summary.failed {
            self.format_warning(&format!(
                "{} {}: {} ({})",
                EntryIndex::new(failure.index),
                failure.path,
                failure.message,
                failure.category
            ));
        }
        for skipped in &summary.skipped {
            self.format_warning(&format!("skipped {skipped}"));
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_listing(&self, tree: &ContentTree, long: bool, human_readable: bool) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        for i in 0..tree.entry_count() {
            let index = EntryIndex::new(i);
            let Some(node) = tree.node_for(index) else {
                continue;
            };
            let duplicate = node.entry_index() != Some(index);

            let mut line = if long {
                let size_str = if human_readable {
                    Self::format_size(node.size())
                } else {
                    node.size().to_string()
                };
                let type_char = if node.is_folder() { "d" } else { "-" };
                let flag = if node.is_encrypted() { "*" } else { " " };

                format!(
                    "{type_char}{flag}{i:>7} {size_str:>10}  {}  {}",
                    Self::format_time(node.modified()),
                    node.path()
                )
            } else {
                format!("{i:>7}  {}", node.path())
            };
            if duplicate {
                line.push_str(" (duplicate)");
            }
            let _ = self.term.write_line(&line);
        }

        if long {
            let _ = self.term.write_line("");
            let _ = self.term.write_line(&format!(
                "Total: {} entries, {}",
                Self::format_number(tree.entry_count()),
                Self::format_size(tree.total_size())
            ));
        }

        Ok(())
    }

    fn format_tree(&self, tree: &ContentTree, sizes: bool) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut lines = vec![tree.display_root().to_string()];
        self.render_children(tree, tree.root().id(), "", sizes, &mut lines);
        for line in &lines {
            let _ = self.term.write_line(line);
        }

        if self.verbose {
            let _ = self.term.write_line("");
            let _ = self.term.write_line(&format!(
                "{} entries, {} nodes, {} duplicate paths",
                Self::format_number(tree.entry_count()),
                Self::format_number(tree.node_count()),
                tree.duplicate_count()
            ));
        }

        Ok(())
    }

    fn format_extraction_result(&self, summary: &ExtractionSummary) -> Result<()> {
        self.write_warning_block(summary);

        if self.quiet {
            return Ok(());
        }

        let headline = if summary.cancelled {
            "Extraction cancelled"
        } else {
            "Extraction complete"
        };
        if self.use_colors {
            let mark = if summary.cancelled {
                style("⚠").yellow().bold()
            } else {
                style("✓").green().bold()
            };
            let _ = self.term.write_line(&format!("{mark} {headline}"));
        } else {
            let _ = self.term.write_line(headline);
        }

        let _ = self.term.write_line(&format!(
            "  Files extracted: {} of {}",
            Self::format_number(summary.extracted.len()),
            Self::format_number(summary.requested)
        ));
        if !summary.failed.is_empty() {
            let _ = self
                .term
                .write_line(&format!("  Failed: {}", summary.failed.len()));
        }
        let _ = self.term.write_line(&format!(
            "  Total size: {}",
            Self::format_size(summary.bytes_written)
        ));

        if self.verbose {
            let _ = self
                .term
                .write_line(&format!("  Output: {}", summary.output_dir.display()));
            let _ = self
                .term
                .write_line(&format!("  Duration: {} ms", summary.duration_ms));
            for entry in &summary.extracted {
                let _ = self.term.write_line(&format!(
                    "  {} -> {}",
                    entry.path,
                    entry.destination.display()
                ));
            }
        }

        Ok(())
    }

    fn format_error(&self, error: &anyhow::Error) {
        // Always show errors, even in quiet mode
        let term = Term::stderr();
        if self.use_colors {
            let _ = term.write_line(&format!("{} {error:?}", style("ERROR:").red().bold()));
        } else {
            let _ = term.write_line(&format!("ERROR: {error:?}"));
        }
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let term = Term::stderr();
        if self.use_colors {
            let _ = term.write_line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            let _ = term.write_line(&format!("WARNING: {message}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(HumanFormatter::format_size(512), "512 B");
        assert_eq!(HumanFormatter::format_size(1536), "1.5 KB");
        assert_eq!(HumanFormatter::format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(HumanFormatter::format_number(7), "7");
        assert_eq!(HumanFormatter::format_number(1234), "1,234");
        assert_eq!(HumanFormatter::format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_format_time_missing() {
        assert_eq!(HumanFormatter::format_time(None), "-");
    }
}
