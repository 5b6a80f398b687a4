use crate::common::{self, BatchArgs};
use anyhow::Result;
use clap::{ArgAction, Args};
use curator::{CheckReplicasOptions, Curator, RepairReplicasOptions};
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct CheckReplicasArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Expected number of valid replicas
    #[arg(long, default_value_t = 2)]
    pub replicas: usize,

    /// Print the paths of objects passing the check
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub print_pass: bool,

    /// Print the paths of objects failing the check
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub print_fail: bool,
}

pub async fn check(args: &CheckReplicasArgs) -> Result<ExitCode> {
    let engine = Curator::new(common::depot_factory()?);
    let reader = common::open_input(args.batch.input.as_ref()).await?;
    let writer = common::open_output(args.batch.output.as_ref()).await?;
    let summary = engine
        .check_replicas(
            reader,
            writer,
            CheckReplicasOptions {
                batch: args.batch.options(),
                num_replicas: args.replicas,
                print_pass: args.print_pass,
                print_fail: args.print_fail,
            },
        )
        .await?;
    Ok(common::finish("check-replicas", summary))
}

#[derive(Args, Debug)]
pub struct RepairReplicasArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Target number of valid replicas
    #[arg(long, default_value_t = 2)]
    pub replicas: usize,

    /// Candidate resource for new replicas; may be given more than once
    #[arg(long = "resource")]
    pub resources: Vec<String>,

    /// Print the paths of objects that were repaired
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub print_repair: bool,

    /// Print the paths of objects whose repair failed
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub print_fail: bool,
}

pub async fn repair(args: &RepairReplicasArgs) -> Result<ExitCode> {
    let engine = Curator::new(common::depot_factory()?);
    let reader = common::open_input(args.batch.input.as_ref()).await?;
    let writer = common::open_output(args.batch.output.as_ref()).await?;
    let summary = engine
        .repair_replicas(
            reader,
            writer,
            RepairReplicasOptions {
                batch: args.batch.options(),
                num_replicas: args.replicas,
                resources: args.resources.clone(),
                print_repair: args.print_repair,
                print_fail: args.print_fail,
            },
        )
        .await?;
    Ok(common::finish("repair-replicas", summary))
}
