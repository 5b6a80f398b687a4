use crate::common::{self, BatchArgs};
use anyhow::Result;
use clap::{ArgAction, Args};
use curator::{CheckMetadataOptions, Curator, RepairMetadataOptions};
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct CheckMetadataArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Print the paths of objects passing the check
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub print_pass: bool,

    /// Print the paths of objects failing the check
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub print_fail: bool,
}

pub async fn check(args: &CheckMetadataArgs) -> Result<ExitCode> {
    let engine = Curator::new(common::depot_factory()?);
    let reader = common::open_input(args.batch.input.as_ref()).await?;
    let writer = common::open_output(args.batch.output.as_ref()).await?;
    let summary = engine
        .check_common_metadata(
            reader,
            writer,
            CheckMetadataOptions {
                batch: args.batch.options(),
                print_pass: args.print_pass,
                print_fail: args.print_fail,
            },
        )
        .await?;
    Ok(common::finish("check-common-metadata", summary))
}

#[derive(Args, Debug)]
pub struct RepairMetadataArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Creator recorded when creation metadata is missing
    #[arg(long)]
    pub creator: Option<String>,

    /// Print the paths of objects that were repaired
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub print_repair: bool,

    /// Print the paths of objects whose repair failed
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub print_fail: bool,
}

pub async fn repair(args: &RepairMetadataArgs) -> Result<ExitCode> {
    let engine = Curator::new(common::depot_factory()?);
    let reader = common::open_input(args.batch.input.as_ref()).await?;
    let writer = common::open_output(args.batch.output.as_ref()).await?;
    let summary = engine
        .repair_common_metadata(
            reader,
            writer,
            RepairMetadataOptions {
                batch: args.batch.options(),
                creator: args.creator.clone(),
                print_repair: args.print_repair,
                print_fail: args.print_fail,
            },
        )
        .await?;
    Ok(common::finish("repair-common-metadata", summary))
}
