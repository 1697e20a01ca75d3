//! Tree command implementation

use super::new_session;
use super::open_session;
use crate::cli::TreeArgs;
use crate::output::OutputFormatter;
use anyhow::Context;
use anyhow::Result;
use arctree_core::SessionConfig;

pub fn execute(args: &TreeArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let session = open_session(
        &args.archive,
        new_session(&args.archive, SessionConfig::default()),
    )?;
    let tree = session.tree().context("archive has no content tree")?;

    if tree.duplicate_count() > 0 {
        log::warn!(
            "{}: {} entries repeat an earlier path",
            tree.display_root(),
            tree.duplicate_count()
        );
    }

    formatter.format_tree(tree, args.sizes)
}
