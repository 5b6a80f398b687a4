use crate::common;
use anyhow::Result;
use clap::{ArgAction, Args};
use curator::{Curator, ScriptOptions};
use depot::{ClientFactory, DepotClient};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Data object to remove
    pub path: String,
}

pub async fn rm(args: &RmArgs) -> Result<ExitCode> {
    let factory = common::depot_factory()?;
    let path = common::parse_path(&args.path)?;
    let client = factory.connect().await?;
    client.remove_object(&path).await?;
    println!("removed {path}");
    Ok(ExitCode::SUCCESS)
}

#[derive(Args, Debug)]
pub struct RmdirArgs {
    /// Empty collection to remove
    pub path: String,
}

pub async fn rmdir(args: &RmdirArgs) -> Result<ExitCode> {
    let factory = common::depot_factory()?;
    let path = common::parse_path(&args.path)?;
    let client = factory.connect().await?;
    client.remove_collection(&path).await?;
    println!("removed {path}");
    Ok(ExitCode::SUCCESS)
}

#[derive(Args, Debug)]
pub struct SafeRemoveScriptArgs {
    /// Collection or data object to generate removal commands for
    pub target: String,

    /// Script file to write; commands go to stdout when omitted
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Add `set -e` so the script stops at the first error
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub stop_on_error: bool,

    /// Add `set -x` so the script echoes commands as they run
    #[arg(long)]
    pub echo_commands: bool,
}

pub async fn safe_remove_script(args: &SafeRemoveScriptArgs) -> Result<ExitCode> {
    let engine = Curator::new(common::depot_factory()?);
    let target = common::parse_path(&args.target)?;
    match &args.script {
        Some(script) => {
            engine
                .write_safe_remove_script(
                    &target,
                    script,
                    ScriptOptions {
                        stop_on_error: args.stop_on_error,
                        verbose: args.echo_commands,
                    },
                )
                .await?;
            println!("wrote {}", script.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            engine
                .write_safe_remove_commands(&target, &mut stdout)
                .await?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
