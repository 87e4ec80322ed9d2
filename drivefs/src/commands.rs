use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use drivefs_adapter::{DriveAdapter, Item};

pub const USAGE: &str = "usage: drivefs [--config <file>] <command> [args]

commands:
  ls [path]                 list a directory (default: the root)
  stat <path>               print an item's cached record as JSON
  cat <path> [format]       write a file's content to stdout
  put <local-file> <path>   upload to <parent-id>/<name> or <parent-id>/<file-id>
  mkdir <path>              create <parent-id>/<name>
  rm <path>                 trash a file
  rmdir <path>              trash a directory
  mv <source> <dest>        move to <parent-id>[/<new-name>]
  cp <source> <dest>        copy a file to <parent-id>[/<new-name>]";

#[derive(Debug, PartialEq)]
pub enum Command {
    Ls { path: String },
    Stat { path: String },
    Cat { path: String, format: String },
    Put { local: PathBuf, remote: String },
    Mkdir { path: String },
    Rm { path: String },
    Rmdir { path: String },
    Mv { source: String, destination: String },
    Cp { source: String, destination: String },
}

impl Command {
    pub fn parse(args: &[String]) -> anyhow::Result<Self> {
        let arg = |i: usize, name: &str| -> anyhow::Result<String> {
            args.get(i)
                .cloned()
                .with_context(|| format!("missing <{}>\n\n{}", name, USAGE))
        };
        let name = args.first().map(String::as_str).unwrap_or("");
        let command = match name {
            "ls" => Command::Ls {
                path: args.get(1).cloned().unwrap_or_default(),
            },
            "stat" => Command::Stat { path: arg(1, "path")? },
            "cat" => Command::Cat {
                path: arg(1, "path")?,
                format: args.get(2).cloned().unwrap_or_default(),
            },
            "put" => Command::Put {
                local: PathBuf::from(arg(1, "local-file")?),
                remote: arg(2, "path")?,
            },
            "mkdir" => Command::Mkdir { path: arg(1, "path")? },
            "rm" => Command::Rm { path: arg(1, "path")? },
            "rmdir" => Command::Rmdir { path: arg(1, "path")? },
            "mv" => Command::Mv {
                source: arg(1, "source")?,
                destination: arg(2, "dest")?,
            },
            "cp" => Command::Cp {
                source: arg(1, "source")?,
                destination: arg(2, "dest")?,
            },
            "" => anyhow::bail!("no command given\n\n{}", USAGE),
            other => anyhow::bail!("unknown command '{}'\n\n{}", other, USAGE),
        };
        Ok(command)
    }
}

pub async fn run(adapter: &DriveAdapter, command: Command, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Ls { path } => {
            for item in adapter.list_contents(&path, false).await? {
                writeln!(out, "{}", format_entry(&item))?;
            }
        }
        Command::Stat { path } => {
            let item = adapter.get(&path).await?;
            serde_json::to_writer_pretty(&mut *out, &item.to_cache_record())?;
            writeln!(out)?;
        }
        Command::Cat { path, format } => {
            let body = adapter.read(&path, &format).await?;
            out.write_all(&body)?;
        }
        Command::Put { local, remote } => {
            let file = tokio::fs::File::open(&local)
                .await
                .with_context(|| format!("Failed to open {}", local.display()))?;
            let item = adapter.write_stream(&remote, file).await?;
            writeln!(out, "{}", item.path())?;
        }
        Command::Mkdir { path } => {
            let item = adapter.create_directory(&path).await?;
            writeln!(out, "{}", item.path())?;
        }
        Command::Rm { path } => adapter.delete(&path).await?,
        Command::Rmdir { path } => adapter.delete_directory(&path).await?,
        Command::Mv { source, destination } => {
            let item = adapter.move_item(&source, &destination).await?;
            writeln!(out, "{}", item.path())?;
        }
        Command::Cp { source, destination } => {
            let item = adapter.copy(&source, &destination).await?;
            writeln!(out, "{}", item.path())?;
        }
    }
    Ok(())
}

/// `d`/`-`, visibility, size, modification time, path, name.
fn format_entry(item: &Item) -> String {
    let (marker, size) = match item.as_file() {
        Some(file) => ('-', file.size().to_string()),
        None => ('d', "-".to_string()),
    };
    let modified = item
        .last_modified()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {:<7} {:>12} {} {}\t{}",
        marker,
        item.visibility(),
        size,
        modified,
        item.path(),
        item.name()
    )
}
