//! Extract command implementation.

use super::new_session;
use super::open_session;
use crate::cli::ExtractArgs;
use crate::error::add_archive_context;
use crate::output::ExtractedEntry;
use crate::output::ExtractionSummary;
use crate::output::FailedEntry;
use crate::output::OutputFormatter;
use crate::progress::CliProgress;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use arctree_core::CancellationSource;
use arctree_core::CancellationToken;
use arctree_core::ContentTree;
use arctree_core::EntryFailure;
use arctree_core::EntryIndex;
use arctree_core::NoopReporter;
use arctree_core::SessionConfig;
use arctree_core::TreeNode;
use arctree_core::UnpackRequest;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

pub fn execute(
    args: &ExtractArgs,
    formatter: &dyn OutputFormatter,
    show_progress: bool,
) -> Result<()> {
    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("failed to get current directory")?,
    };
    fs::create_dir_all(&output_dir).with_context(|| {
        format!("failed to create output directory '{}'", output_dir.display())
    })?;

    // Temp files live next to their destination so persisting is a rename.
    // The prefix is unique to this run so an abort can find its leftovers.
    let temp_prefix = format!(".arctree-{}-", std::process::id());
    let defaults = SessionConfig::default();
    let config = SessionConfig {
        temp_dir: Some(output_dir.clone()),
        temp_prefix: temp_prefix.clone(),
        max_entry_count: args.max_entries,
        max_entry_size: args.max_entry_size.unwrap_or(defaults.max_entry_size),
        verify_sizes: !args.no_verify_sizes,
        ..defaults
    };

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone(), output_dir.clone(), temp_prefix);

    let session = new_session(&args.archive, config)
        .with_reporter(NoopReporter)
        .with_cancellation(cancel.clone());
    let mut session = open_session(&args.archive, session)?;

    let request = {
        let tree = session.tree().context("archive has no content tree")?;
        select_entries(tree, &args.entries, &args.indices)?
    };
    log::debug!("extracting {} entries from {}", request.len(), session.display_path());

    let result = if show_progress && CliProgress::should_show() {
        let mut progress = CliProgress::new(request.len(), "Extracting");
        session.extract_with_progress(&request, &mut progress)
    } else {
        session.extract(&request)
    };
    let mut result = add_archive_context(result, &args.archive)?;

    let tree = session.tree().context("archive has no content tree")?;
    let mut summary = ExtractionSummary {
        archive: session.display_path().to_string(),
        output_dir: output_dir.clone(),
        requested: request.len(),
        cancelled: result.is_cancelled() || cancel.is_cancelled(),
        bytes_written: result.bytes_written,
        duration_ms: result.duration.as_millis(),
        ..Default::default()
    };

    summary.failed = result.failures.iter().map(failed_entry).collect();

    for (index, temp) in std::mem::take(&mut result.files) {
        let Some(node) = tree.node_for(index) else {
            continue;
        };
        let Some(destination) = destination_for(&output_dir, node) else {
            summary
                .skipped
                .push(format!("{}: unsafe path", node.path()));
            continue;
        };
        if destination.exists() && !args.force {
            summary.skipped.push(format!(
                "{}: '{}' already exists (use --force to overwrite)",
                node.path(),
                destination.display()
            ));
            continue;
        }

        persist(temp, &destination)?;
        summary.extracted.push(ExtractedEntry {
            index: index.get(),
            path: node.path().to_string(),
            destination,
            size: node.size(),
        });
    }

    add_archive_context(session.close(), &args.archive)?;
    formatter.format_extraction_result(&summary)?;

    if summary.cancelled {
        bail!("extraction cancelled");
    }
    Ok(())
}

/// The entry path is reported separately, so only the reason is kept when
/// the error carries one.
fn failed_entry(failure: &EntryFailure) -> FailedEntry {
    FailedEntry {
        index: failure.index.get(),
        path: failure.path.to_string(),
        category: failure.category.to_string(),
        message: failure
            .error
            .context()
            .map_or_else(|| failure.error.to_string(), str::to_string),
    }
}

/// Resolves entry paths and indices into one request. Folders expand to
/// every file beneath them; no selection means every file.
fn select_entries(
    tree: &ContentTree,
    entries: &[String],
    indices: &[usize],
) -> Result<UnpackRequest> {
    if entries.is_empty() && indices.is_empty() {
        return Ok(tree.file_indices().collect());
    }

    let mut request = UnpackRequest::new();
    for path in entries {
        let node = tree.find(path).with_context(|| {
            format!(
                "entry not found in '{}': {path}\n\
                 HINT: Run 'arctree list' to see entry paths.",
                tree.display_root()
            )
        })?;
        if node.is_folder() {
            request.extend(files_under(tree, node));
        } else if let Some(index) = node.entry_index() {
            request.insert(index);
        }
    }
    request.extend(indices.iter().copied());
    Ok(request)
}

fn files_under(tree: &ContentTree, folder: &TreeNode) -> Vec<EntryIndex> {
    let mut files = Vec::new();
    let mut stack = vec![folder.id()];
    while let Some(id) = stack.pop() {
        for child in tree.children(id) {
            if child.is_folder() {
                stack.push(child.id());
            } else if let Some(index) = child.entry_index() {
                files.push(index);
            }
        }
    }
    files
}

/// Destination of `node` under `output_dir`, or `None` if its inner path
/// would leave the directory.
fn destination_for(output_dir: &Path, node: &TreeNode) -> Option<PathBuf> {
    let mut destination = output_dir.to_path_buf();
    for segment in node.path().segments() {
        if segment == ".." || segment.contains(':') {
            return None;
        }
        destination.push(segment);
    }
    Some(destination)
}

fn persist(temp: tempfile::TempPath, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    if let Err(err) = temp.persist(destination) {
        // Rename can fail across filesystems; fall back to a copy.
        fs::copy(&*err.path, destination)
            .with_context(|| format!("failed to write '{}'", destination.display()))?;
    }
    Ok(())
}

/// Deletes this run's temp files from `dir` and returns how many were
/// removed.
fn remove_partial_files(dir: &Path, prefix: &str) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .filter(|entry| fs::remove_file(entry.path()).is_ok())
        .count()
}

fn install_interrupt_handler(cancel: CancellationToken, output_dir: PathBuf, temp_prefix: String) {
    let result = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            // exit skips destructors, so temp files must be removed by hand
            let removed = remove_partial_files(&output_dir, &temp_prefix);
            eprintln!("\nInterrupted ({removed} partial files removed)");
            std::process::exit(130);
        }
        eprintln!("\nCancelling after the current entry (press Ctrl-C again to abort)");
        cancel.cancel();
    });
    if let Err(err) = result {
        log::debug!("Ctrl-C handler not installed: {err}");
    }
}
