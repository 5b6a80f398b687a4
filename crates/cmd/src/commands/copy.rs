use crate::common;
use anyhow::Result;
use clap::Args;
use curator::{CopyOptions, Curator};
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Source collection or data object
    pub source: String,

    /// Destination path
    pub dest: String,

    /// Also copy common metadata
    #[arg(long)]
    pub avu: bool,

    /// Also copy access control entries
    #[arg(long)]
    pub acl: bool,

    /// Recurse into collections
    #[arg(long)]
    pub recurse: bool,

    /// Skip destinations that already exist with a matching checksum
    #[arg(long)]
    pub exist_ok: bool,
}

pub async fn copy(args: &CopyArgs) -> Result<ExitCode> {
    let engine = Curator::new(common::depot_factory()?);
    let source = common::parse_path(&args.source)?;
    let dest = common::parse_path(&args.dest)?;
    let stats = engine
        .copy(
            &source,
            &dest,
            CopyOptions {
                avu: args.avu,
                acl: args.acl,
                recurse: args.recurse,
                exist_ok: args.exist_ok,
            },
        )
        .await?;
    println!(
        "copy: processed={} copied={}",
        stats.processed, stats.copied
    );
    Ok(ExitCode::SUCCESS)
}
