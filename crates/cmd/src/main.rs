//! weir - bulk integrity verification, repair, and replication for a
//! replicated depot.
//!
//! Batch commands read depot paths from a file or stdin, one per line,
//! and exit nonzero when any path could not be checked or repaired.
//! The depot root is taken from the WEIR_DEPOT environment variable.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod commands;
mod common;

use commands::checksums::{CheckChecksumsArgs, RepairChecksumsArgs};
use commands::copy::CopyArgs;
use commands::metadata::{CheckMetadataArgs, RepairMetadataArgs};
use commands::remove::{RmArgs, RmdirArgs, SafeRemoveScriptArgs};
use commands::replicas::{CheckReplicasArgs, RepairReplicasArgs};

#[derive(Parser)]
#[command(name = "weir")]
#[command(version, about = "Integrity checks and repairs for a replicated depot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that replica checksums agree and match the checksum record
    CheckChecksums(CheckChecksumsArgs),
    /// Fill missing checksum records from consistent replica checksums
    RepairChecksums(RepairChecksumsArgs),
    /// Check that each object has exactly the expected valid replicas
    CheckReplicas(CheckReplicasArgs),
    /// Trim invalid replicas and restore missing valid ones
    RepairReplicas(RepairReplicasArgs),
    /// Check that common metadata is present
    CheckCommonMetadata(CheckMetadataArgs),
    /// Rewrite absent or incorrect common metadata
    RepairCommonMetadata(RepairMetadataArgs),
    /// Copy a collection or data object, optionally with metadata and ACL
    Copy(CopyArgs),
    /// Remove a data object
    Rm(RmArgs),
    /// Remove an empty collection
    Rmdir(RmdirArgs),
    /// Write reviewable, non-recursive removal commands for a subtree
    SafeRemoveScript(SafeRemoveScriptArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    diagnostics::init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::CheckChecksums(args) => commands::checksums::check(args).await,
        Commands::RepairChecksums(args) => commands::checksums::repair(args).await,
        Commands::CheckReplicas(args) => commands::replicas::check(args).await,
        Commands::RepairReplicas(args) => commands::replicas::repair(args).await,
        Commands::CheckCommonMetadata(args) => commands::metadata::check(args).await,
        Commands::RepairCommonMetadata(args) => commands::metadata::repair(args).await,
        Commands::Copy(args) => commands::copy::copy(args).await,
        Commands::Rm(args) => commands::remove::rm(args).await,
        Commands::Rmdir(args) => commands::remove::rmdir(args).await,
        Commands::SafeRemoveScript(args) => commands::remove::safe_remove_script(args).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("weir: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_repair_replicas() {
        let cli = Cli::parse_from([
            "weir",
            "repair-replicas",
            "--replicas",
            "2",
            "--resource",
            "res-a",
            "--resource",
            "res-b",
            "--threads",
            "4",
            "--clients",
            "2",
        ]);
        match cli.command {
            Commands::RepairReplicas(args) => {
                assert_eq!(args.replicas, 2);
                assert_eq!(args.resources, ["res-a", "res-b"]);
                assert_eq!(args.batch.threads, 4);
                assert_eq!(args.batch.clients, 2);
                assert!(args.print_repair);
                assert!(!args.print_fail);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_parse_copy_flags() {
        let cli = Cli::parse_from([
            "weir", "copy", "/a/src", "/a/dst", "--recurse", "--exist-ok", "--avu",
        ]);
        match cli.command {
            Commands::Copy(args) => {
                assert!(args.recurse);
                assert!(args.exist_ok);
                assert!(args.avu);
                assert!(!args.acl);
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
