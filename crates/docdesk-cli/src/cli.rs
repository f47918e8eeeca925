use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "docdesk",
    about = "Admin console for embedded document-store databases",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Registry file (overrides the config file)
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the web console
    Serve(ServeArgs),
    /// List registered databases and their status
    List(ListArgs),
    /// Register an existing database
    Register(RegisterArgs),
    /// Create a new database and register it
    Create(CreateArgs),
    /// Remove a database from the registry, keeping its data
    Unregister(NameArgs),
    /// Destroy a database and remove it from the registry
    Delete(NameArgs),
    /// Probe one registered database
    Status(NameArgs),
    /// List the documents of a registered database
    Docs(DocsArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides the config file)
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(short, long, default_value = "1")]
    pub page: usize,
    /// Databases per page (defaults to the configured size)
    #[arg(long)]
    pub page_size: Option<usize>,
}

#[derive(Args)]
pub struct RegisterArgs {
    pub name: String,
    /// Directory of the existing database
    pub path: PathBuf,
}

#[derive(Args)]
pub struct CreateArgs {
    pub name: String,
    /// Directory the new database is created in
    pub base_path: PathBuf,
}

#[derive(Args)]
pub struct NameArgs {
    pub name: String,
}

#[derive(Args)]
pub struct DocsArgs {
    pub name: String,
    #[arg(short, long, default_value = "1")]
    pub page: usize,
    #[arg(long)]
    pub page_size: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["docdesk", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:8080".parse().unwrap()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_serve_rejects_bad_address() {
        assert!(Cli::try_parse_from(["docdesk", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn parse_register() {
        let cli = Cli::try_parse_from(["docdesk", "register", "people", "/srv/people"]).unwrap();
        if let Command::Register(args) = cli.command {
            assert_eq!(args.name, "people");
            assert_eq!(args.path, PathBuf::from("/srv/people"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_create() {
        let cli = Cli::try_parse_from(["docdesk", "create", "orders", "/srv"]).unwrap();
        assert!(matches!(cli.command, Command::Create(_)));
    }

    #[test]
    fn parse_list_defaults() {
        let cli = Cli::try_parse_from(["docdesk", "list"]).unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.page, 1);
            assert!(args.page_size.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_docs_page() {
        let cli = Cli::try_parse_from(["docdesk", "docs", "people", "-p", "3"]).unwrap();
        if let Command::Docs(args) = cli.command {
            assert_eq!(args.name, "people");
            assert_eq!(args.page, 3);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn delete_requires_name() {
        assert!(Cli::try_parse_from(["docdesk", "delete"]).is_err());
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::try_parse_from([
            "docdesk",
            "status",
            "people",
            "--registry",
            "/tmp/reg.txt",
            "--format",
            "json",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.registry, Some(PathBuf::from("/tmp/reg.txt")));
    }
}
