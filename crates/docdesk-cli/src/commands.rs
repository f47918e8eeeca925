use anyhow::Context;
use colored::Colorize;
use docdesk_console::{DatabaseStatus, DatabaseSummary, ProbeReport};
use docdesk_server::{AppState, ConsoleConfig, DocdeskServer};
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    tracing::debug!(?config, "resolved configuration");
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args),
        Command::List(args) => cmd_list(config, args, &format),
        Command::Register(args) => cmd_register(config, args, &format),
        Command::Create(args) => cmd_create(config, args, &format),
        Command::Unregister(args) => cmd_unregister(config, args, &format),
        Command::Delete(args) => cmd_delete(config, args, &format),
        Command::Status(args) => cmd_status(config, args, &format),
        Command::Docs(args) => cmd_docs(config, args, &format),
    }
}

/// Config file (if any) with command-line overrides applied.
fn resolve_config(cli: &Cli) -> anyhow::Result<ConsoleConfig> {
    let mut config = match &cli.config {
        Some(path) => ConsoleConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConsoleConfig::default(),
    };
    if let Some(registry) = &cli.registry {
        config.registry_file = registry.clone();
    }
    if let Command::Serve(ServeArgs { bind: Some(bind) }) = &cli.command {
        config.bind_addr = *bind;
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status_label(probe: &ProbeReport) -> colored::ColoredString {
    match probe.status {
        DatabaseStatus::Available => probe.status_message().green(),
        DatabaseStatus::Locked => probe.status_message().yellow(),
        DatabaseStatus::Error => probe.status_message().red(),
    }
}

fn print_summary(db: &DatabaseSummary) {
    println!(
        "  {}  {}  {}",
        db.name.bold(),
        db.path.display().to_string().dimmed(),
        status_label(&db.probe)
    );
}

fn cmd_serve(config: ConsoleConfig, _args: ServeArgs) -> anyhow::Result<()> {
    println!(
        "docdesk console on {} (registry: {})",
        format!("http://{}", config.bind_addr).bold(),
        config.registry_file.display()
    );
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(DocdeskServer::new(config).serve())?;
    Ok(())
}

fn cmd_list(config: ConsoleConfig, args: ListArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let page_size = args.page_size.unwrap_or(config.list_page_size);
    let state = AppState::new(config);
    let listing = state.registry.list_page(args.page, page_size)?;
    if let OutputFormat::Json = format {
        return print_json(&listing);
    }

    if listing.total_count == 0 {
        println!("No databases registered.");
        return Ok(());
    }
    println!(
        "Databases (page {} of {}, {} registered)",
        listing.current_page, listing.total_pages, listing.total_count
    );
    for db in &listing.databases {
        print_summary(db);
    }
    if listing.has_next_page {
        println!("{}", format!("  more: --page {}", listing.current_page + 1).dimmed());
    }
    Ok(())
}

fn cmd_register(
    config: ConsoleConfig,
    args: RegisterArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let state = AppState::new(config);
    let entry = state.registry.register_existing(&args.name, &args.path)?;
    match format {
        OutputFormat::Json => print_json(&entry)?,
        OutputFormat::Text => println!(
            "{} Registered {} → {}",
            "✓".green().bold(),
            entry.name.bold(),
            entry.path.display()
        ),
    }
    Ok(())
}

fn cmd_create(config: ConsoleConfig, args: CreateArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let state = AppState::new(config);
    let entry = state.registry.create_new(&args.name, &args.base_path)?;
    match format {
        OutputFormat::Json => print_json(&entry)?,
        OutputFormat::Text => println!(
            "{} Created {} at {}",
            "✓".green().bold(),
            entry.name.bold(),
            entry.path.display()
        ),
    }
    Ok(())
}

fn cmd_unregister(config: ConsoleConfig, args: NameArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let state = AppState::new(config);
    let entry = state.registry.unregister(&args.name)?;
    match format {
        OutputFormat::Json => print_json(&entry)?,
        OutputFormat::Text => println!(
            "Unregistered {} (data kept at {})",
            entry.name.yellow(),
            entry.path.display()
        ),
    }
    Ok(())
}

fn cmd_delete(config: ConsoleConfig, args: NameArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let state = AppState::new(config);
    let entry = state.registry.delete_database(&args.name)?;
    match format {
        OutputFormat::Json => print_json(&entry)?,
        OutputFormat::Text => println!(
            "{} Deleted {} and its data at {}",
            "✓".green().bold(),
            entry.name.red(),
            entry.path.display()
        ),
    }
    Ok(())
}

fn cmd_status(config: ConsoleConfig, args: NameArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let state = AppState::new(config);
    let summary = state.registry.status(&args.name)?;
    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => print_summary(&summary),
    }
    Ok(())
}

fn cmd_docs(config: ConsoleConfig, args: DocsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let page_size = args.page_size.unwrap_or(config.document_page_size);
    let state = AppState::new(config);
    let listing = state.documents.list(&args.name, args.page, page_size)?;
    if let OutputFormat::Json = format {
        return print_json(&listing);
    }

    let lock_note = if listing.locked {
        format!(" [{}]", listing.status_message).yellow()
    } else {
        String::new().normal()
    };
    println!(
        "{}: {} documents (page {} of {}){}",
        listing.name.bold(),
        listing.info.doc_count,
        listing.current_page,
        listing.total_pages,
        lock_note
    );
    for row in &listing.rows {
        println!("  {}  {}", row.id, row.rev.dimmed());
    }
    Ok(())
}
