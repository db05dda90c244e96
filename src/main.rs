use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use xmlgrid::cli::{command_messages, render_table, resolve_table, CliArgs, Command};
use xmlgrid::clipboard::SystemClipboard;
use xmlgrid::commands::Notice;
use xmlgrid::config::EngineConfig;
use xmlgrid::document::FileDocument;
use xmlgrid::messages::GridMsg;
use xmlgrid::runtime::Runtime;
use xmlgrid::session::DocumentStatus;

type FileRuntime = Runtime<FileDocument, SystemClipboard>;

const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);
const WATCH_POLL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let args = CliArgs::parse();
    xmlgrid::tracing::init();

    let config = match &args.config {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };

    let store = FileDocument::open(&args.file, WATCH_DEBOUNCE)?;
    let mut runtime = Runtime::new(config, store, SystemClipboard);
    runtime.open()?;
    report_notices(&mut runtime);

    let session = runtime
        .engine()
        .session()
        .ok_or_else(|| anyhow::anyhow!("{} could not be parsed", args.file.display()))?;
    if let DocumentStatus::Incompatible(incompatibility) = session.status() {
        anyhow::bail!("{}", incompatibility.message());
    }

    match &args.command {
        Command::Tables => {
            println!("{}", serde_json::to_string_pretty(session.tables())?);
        }
        Command::Watch => watch(&mut runtime, args.table.as_deref())?,
        command => {
            select_table(&mut runtime, args.table.as_deref())?;
            if command.is_edit() {
                tracing::info!("Applying {:?} to {}", command, args.file.display());
            }
            run_command(&mut runtime, command)?;
        }
    }
    Ok(())
}

fn select_table(runtime: &mut FileRuntime, table: Option<&str>) -> Result<()> {
    let session = runtime
        .engine()
        .session()
        .ok_or_else(|| anyhow::anyhow!("No document is open"))?;
    let index = resolve_table(session, table).map_err(|e| anyhow::anyhow!(e))?;
    runtime.send(GridMsg::SelectTable(index).into());
    Ok(())
}

fn print_active(runtime: &FileRuntime) {
    if let Some(session) = runtime.engine().session() {
        println!("{}", render_table(session));
    }
}

fn run_command(runtime: &mut FileRuntime, command: &Command) -> Result<()> {
    let msgs = {
        let session = runtime
            .engine()
            .session()
            .ok_or_else(|| anyhow::anyhow!("No document is open"))?;
        command_messages(command, session).map_err(|e| anyhow::anyhow!(e))?
    };

    for msg in msgs {
        runtime.send(msg.into());
        let rejected = runtime
            .take_notices()
            .into_iter()
            .find_map(|notice| match notice {
                Notice::Rejected(err) => Some(err),
                other => {
                    eprintln!("{}", other);
                    None
                }
            });
        if let Some(err) = rejected {
            anyhow::bail!("{}", err);
        }
    }
    print_active(runtime);
    Ok(())
}

/// Print the table on every change until interrupted
fn watch(runtime: &mut FileRuntime, table: Option<&str>) -> Result<()> {
    select_table(runtime, table)?;
    print_active(runtime);
    eprintln!("Watching {} (Ctrl+C to stop)", runtime.store().path().display());

    loop {
        if runtime.process_async_messages() {
            report_notices(runtime);
            // External edits reset to the first table
            if table.is_some() {
                select_table(runtime, table)?;
            }
            println!();
            print_active(runtime);
        }
        std::thread::sleep(WATCH_POLL);
    }
}

fn report_notices(runtime: &mut FileRuntime) {
    for notice in runtime.take_notices() {
        eprintln!("{}", notice);
    }
}
