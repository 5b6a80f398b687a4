use crate::common::{self, BatchArgs};
use anyhow::Result;
use clap::{ArgAction, Args};
use curator::{CheckChecksumsOptions, Curator, RecordPolicy, RepairChecksumsOptions};
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct CheckChecksumsArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Fail objects that have no checksum record
    #[arg(long)]
    pub require_record: bool,

    /// Print the paths of objects passing the check
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub print_pass: bool,

    /// Print the paths of objects failing the check
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub print_fail: bool,
}

pub async fn check(args: &CheckChecksumsArgs) -> Result<ExitCode> {
    let engine = Curator::new(common::depot_factory()?);
    let reader = common::open_input(args.batch.input.as_ref()).await?;
    let writer = common::open_output(args.batch.output.as_ref()).await?;
    let summary = engine
        .check_checksums(
            reader,
            writer,
            CheckChecksumsOptions {
                batch: args.batch.options(),
                record_policy: if args.require_record {
                    RecordPolicy::Require
                } else {
                    RecordPolicy::Lenient
                },
                print_pass: args.print_pass,
                print_fail: args.print_fail,
            },
        )
        .await?;
    Ok(common::finish("check-checksums", summary))
}

#[derive(Args, Debug)]
pub struct RepairChecksumsArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Print the paths of objects that were repaired
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub print_repair: bool,

    /// Print the paths of objects whose repair failed
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub print_fail: bool,
}

pub async fn repair(args: &RepairChecksumsArgs) -> Result<ExitCode> {
    let engine = Curator::new(common::depot_factory()?);
    let reader = common::open_input(args.batch.input.as_ref()).await?;
    let writer = common::open_output(args.batch.output.as_ref()).await?;
    let summary = engine
        .repair_checksums(
            reader,
            writer,
            RepairChecksumsOptions {
                batch: args.batch.options(),
                print_repair: args.print_repair,
                print_fail: args.print_fail,
            },
        )
        .await?;
    Ok(common::finish("repair-checksums", summary))
}
