//! List command implementation

use super::new_session;
use super::open_session;
use crate::cli::ListArgs;
use crate::output::OutputFormatter;
use anyhow::Context;
use anyhow::Result;
use arctree_core::SessionConfig;

pub fn execute(args: &ListArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let session = open_session(
        &args.archive,
        new_session(&args.archive, SessionConfig::default()),
    )?;
    let tree = session.tree().context("archive has no content tree")?;

    formatter.format_listing(tree, args.long, args.human_readable)
}
