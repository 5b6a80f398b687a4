//! Safe-removal command generation.
//!
//! Rather than deleting anything itself, this writes the non-recursive
//! removal commands an operator can review and run: `weir rm` for every
//! data object, then `weir rmdir` for every collection, deepest first, so
//! no command ever removes more than one entry.

use crate::error::Result;
use depot::{DepotClient, DepotError, EntryKind, ObjectPath};
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// How a generated removal script behaves when run.
#[derive(Debug, Clone, Copy)]
pub struct ScriptOptions {
    /// Add `set -e` so the script stops at the first failure.
    pub stop_on_error: bool,
    /// Add `set -x` so the script echoes commands as it runs.
    pub verbose: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        ScriptOptions {
            stop_on_error: true,
            verbose: false,
        }
    }
}

/// Quote a path for use in a shell command line.
fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

async fn write_command<W: AsyncWrite + Unpin>(
    writer: &mut W,
    command: &str,
    path: &ObjectPath,
) -> Result<()> {
    let line = format!("{command} {}\n", shell_quote(path.as_str()));
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

/// Write removal commands for `target` and everything beneath it.
///
/// Data objects come first, in traversal order; collections follow,
/// deepest paths first, ending with `target` itself.
pub async fn write_safe_remove_commands<W: AsyncWrite + Unpin>(
    client: &dyn DepotClient,
    target: &ObjectPath,
    writer: &mut W,
) -> Result<()> {
    let kind = client
        .stat(target)
        .await?
        .ok_or_else(|| DepotError::NotFound {
            path: target.clone(),
        })?;
    if kind == EntryKind::DataObject {
        write_command(writer, "weir rm", target).await?;
        return Ok(());
    }

    let mut collections = Vec::new();
    let mut pending = vec![target.clone()];
    while let Some(collection) = pending.pop() {
        for child in client.list_children(&collection).await? {
            match client
                .stat(&child)
                .await?
                .ok_or_else(|| DepotError::NotFound { path: child.clone() })?
            {
                EntryKind::DataObject => {
                    write_command(writer, "weir rm", &child).await?;
                }
                EntryKind::Collection => {
                    collections.push(child.clone());
                    pending.push(child);
                }
            }
        }
    }

    collections.sort();
    collections.reverse();
    for collection in &collections {
        write_command(writer, "weir rmdir", collection).await?;
    }
    write_command(writer, "weir rmdir", target).await?;
    Ok(())
}

/// Write an executable shell script that safely removes `target`.
///
/// The script can be reviewed before being run; none of its commands are
/// recursive. Any existing file at `script_path` is overwritten.
pub async fn write_safe_remove_script(
    client: &dyn DepotClient,
    target: &ObjectPath,
    script_path: &Path,
    options: ScriptOptions,
) -> Result<()> {
    let mut file = tokio::fs::File::create(script_path).await?;
    let header = format!(
        "#!/bin/bash\n# Generated by weir {}\n",
        env!("CARGO_PKG_VERSION")
    );
    file.write_all(header.as_bytes()).await?;
    if options.stop_on_error {
        file.write_all(b"set -e\n").await?;
    }
    if options.verbose {
        file.write_all(b"set -x\n").await?;
    }
    write_safe_remove_commands(client, target, &mut file).await?;
    file.flush().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(script_path, perms).await?;
    }
    Ok(())
}
