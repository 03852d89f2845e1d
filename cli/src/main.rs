mod client;
mod install;
mod types;

use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};

use crate::client::{Credentials, HubClient, DEFAULT_SERVER_URL};

/// Command-line client for a Script Hub server.
#[derive(Debug, Parser)]
#[command(name = "scripthub", version)]
struct Cli {
    /// Server base URL.
    #[arg(long, env = "SCRIPTHUB_URL", default_value = DEFAULT_SERVER_URL)]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every script, grouped by category.
    List,
    /// Print a script to stdout.
    Cat { path: String },
    /// Download a script.
    Get {
        path: String,
        /// Target directory.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Download a script and make it executable.
    Install {
        path: String,
        /// Defaults to ~/.local/bin.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Upload a local file (needs credentials).
    Push {
        file: PathBuf,
        #[arg(short, long)]
        category: Option<String>,
        /// Stored file name; defaults to the local one.
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Delete a script (needs credentials).
    Rm { path: String },
    /// Download the whole repository as a zip (needs credentials).
    Export {
        #[arg(short, long, default_value = "scripts.zip")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = HubClient::new(&cli.server, Credentials::from_env())?;

    if let Err(err) = run(&client, cli.command) {
        eprintln!("[scripthub] {err:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn run(client: &HubClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List => {
            let index = client.index()?;
            println!("{}", index.render());
        }
        Command::Cat { path } => {
            print!("{}", client.raw(&path)?);
        }
        Command::Get { path, out } => {
            let body = client.raw(&path)?;
            let saved = install::save(&out, &path, &body)?;
            println!("[scripthub] saved {}", saved.display());
        }
        Command::Install { path, dir } => {
            let dir = match dir {
                Some(d) => d,
                None => install::default_install_dir()?,
            };
            let body = client.raw(&path)?;
            let installed = install::install(&dir, &path, &body)?;
            println!("[scripthub] installed {}", installed.display());
            warn_if_not_on_path(&dir);
        }
        Command::Push {
            file,
            category,
            name,
        } => {
            client.push(&file, category.as_deref(), name.as_deref())?;
            println!("[scripthub] uploaded {}", file.display());
        }
        Command::Rm { path } => {
            client.remove(&path)?;
            println!("[scripthub] deleted {}", path);
        }
        Command::Export { out } => {
            let bytes = client.export()?;
            fs::write(&out, &bytes)?;
            println!("[scripthub] wrote {} ({} bytes)", out.display(), bytes.len());
        }
    }

    Ok(())
}

fn warn_if_not_on_path(dir: &Path) {
    let on_path = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).any(|entry| entry == dir))
        .unwrap_or(false);

    if !on_path {
        eprintln!("[scripthub] note: {} is not on PATH", dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from([
            "scripthub",
            "--server",
            "http://hub:9000",
            "push",
            "deploy.sh",
            "-c",
            "ops",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://hub:9000");
        match cli.command {
            Command::Push { file, category, name } => {
                assert_eq!(file, PathBuf::from("deploy.sh"));
                assert_eq!(category.as_deref(), Some("ops"));
                assert_eq!(name, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn get_defaults_to_current_directory() {
        let cli = Cli::try_parse_from(["scripthub", "get", "ops/a.sh"]).unwrap();
        match cli.command {
            Command::Get { out, .. } => assert_eq!(out, PathBuf::from(".")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cat_requires_a_path() {
        assert!(Cli::try_parse_from(["scripthub", "cat"]).is_err());
    }
}
