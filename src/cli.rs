use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;

use std::fs::File;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use crate::client::{self, ApiClient};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::{self, OutputFormat};
use crate::types::RelicCreateRequest;
use crate::upload::{self, UploadOptions};

#[derive(Parser)]
#[command(name = "relic", version, about = "Command-line client for the Relic artifact storage service")]
pub struct Cli {
    /// File to upload; omit or pass "-" to read stdin
    pub file: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (human, json, url)
    #[arg(short, long, global = true, default_value = "human")]
    output: String,

    /// Quiet mode (URL only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// API server URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Client authentication key (overrides config)
    #[arg(long, global = true)]
    client_key: Option<String>,

    /// Relic name
    #[arg(short, long)]
    name: Option<String>,

    /// Relic description
    #[arg(short, long)]
    description: Option<String>,

    /// Language hint for syntax highlighting
    #[arg(short, long)]
    language: Option<String>,

    /// Access level (public or private)
    #[arg(short = 'a', long)]
    access_level: Option<String>,

    /// Make the relic public
    #[arg(short = 'P', long)]
    public: bool,

    /// Make the relic private (default)
    #[arg(short = 'S', long)]
    private: bool,

    /// Expiration time (1h, 24h, 7d, 30d, never)
    #[arg(short, long)]
    expires_in: Option<String>,

    /// Password protection
    #[arg(short, long)]
    password: Option<String>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Get information about a relic
    Info { id: String },
    /// Download relic content
    Get {
        id: String,
        /// Output file (default: stdout)
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
    /// List your relics
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Filter by access level
        #[arg(long)]
        access_level: Option<String>,
    },
    /// List recent public relics
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Fork a relic
    Fork {
        id: String,
        /// Relic name
        #[arg(short, long)]
        name: Option<String>,
        /// Relic description
        #[arg(short, long)]
        description: Option<String>,
        /// Access level (public or private)
        #[arg(short = 'a', long)]
        access_level: Option<String>,
    },
    /// Delete a relic
    Delete {
        id: String,
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Show client information
    Whoami,
    /// Initialize the configuration file
    Init,
    /// Get or set configuration values
    Config {
        key: Option<String>,
        value: Option<String>,
        /// List all config values
        #[arg(long)]
        list: bool,
    },
}

impl Cli {
    pub fn run(&self) -> Result<(), CliError> {
        match &self.command {
            Some(Commands::Info { id }) => self.handle_info(id),
            Some(Commands::Get { id, output_file }) => self.handle_get(id, output_file.as_deref()),
            Some(Commands::List {
                limit,
                offset,
                access_level,
            }) => self.handle_list(*limit, *offset, access_level.as_deref()),
            Some(Commands::Recent { limit, offset }) => self.handle_recent(*limit, *offset),
            Some(Commands::Fork {
                id,
                name,
                description,
                access_level,
            }) => self.handle_fork(id, name, description, access_level),
            Some(Commands::Delete { id, yes }) => self.handle_delete(id, *yes),
            Some(Commands::Whoami) => self.handle_whoami(),
            Some(Commands::Init) => self.handle_init(),
            Some(Commands::Config { key, value, list }) => {
                self.handle_config(key.as_deref(), value.as_deref(), *list)
            }
            None => self.handle_upload(),
        }
    }

    fn load_config(&self) -> Result<Config, CliError> {
        let mut cfg = Config::load()?;
        if let Some(server) = &self.server {
            cfg.server = server.clone();
        }
        if let Some(key) = &self.client_key {
            cfg.client_key = key.clone();
        }
        Ok(cfg)
    }

    fn format(&self) -> OutputFormat {
        if self.quiet {
            return OutputFormat::Url;
        }
        match self.output.as_str() {
            "json" => OutputFormat::Json,
            "url" => OutputFormat::Url,
            _ => OutputFormat::Human,
        }
    }

    /// Flags take precedence over the configured default.
    fn resolve_access_level(&self, flag: &Option<String>, cfg: &Config) -> String {
        if self.public {
            return "public".to_string();
        }
        if self.private {
            return "private".to_string();
        }
        flag.clone().unwrap_or_else(|| cfg.access_level.clone())
    }

    fn resolve_expires_in(&self, cfg: &Config) -> String {
        self.expires_in
            .clone()
            .unwrap_or_else(|| cfg.expires_in.clone())
    }

    fn announce_new_key(&self, cfg: &Config) {
        if !self.quiet {
            eprintln!(
                "{} Generated new client key: {}",
                output::SYMBOL_INFO.blue(),
                client::redact_key(&cfg.client_key)
            );
            eprintln!(
                "{} Client key saved to config",
                output::SYMBOL_SUCCESS.green()
            );
        }
    }

    fn handle_upload(&self) -> Result<(), CliError> {
        let mut cfg = self.load_config()?;
        if config::ensure_client_key(&mut cfg)? {
            self.announce_new_key(&cfg);
        }

        let opts = UploadOptions {
            name: self.name.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            language: self.language.clone().unwrap_or_default(),
            access_level: self.resolve_access_level(&self.access_level, &cfg),
            expires_in: self.resolve_expires_in(&cfg),
            password: self.password.clone().unwrap_or_default(),
            show_progress: !self.no_progress && cfg.progress && !self.quiet,
        };

        let api = ApiClient::new(&cfg)?;
        let resp = match self.file.as_deref() {
            Some(path) if path != "-" => upload::upload_file(&api, Path::new(path), &opts)?,
            file => {
                if file.is_none() && io::stdin().is_terminal() {
                    return Err(CliError::Validation(
                        "No input provided. Pipe content or specify a file.".into(),
                    ));
                }
                upload::upload_stdin(&api, &opts)?
            }
        };

        let format = self.format();
        // Best-effort detail fetch for the human view.
        let metadata = if format == OutputFormat::Human {
            api.get_relic(&resp.id).ok()
        } else {
            None
        };
        output::print_created(&resp, metadata.as_ref(), format, &cfg.server)
    }

    fn handle_info(&self, id: &str) -> Result<(), CliError> {
        let cfg = self.load_config()?;
        let api = ApiClient::new(&cfg)?;
        let metadata = api.get_relic(id)?;
        output::print_info(&metadata, self.format())
    }

    fn handle_get(&self, id: &str, output_file: Option<&Path>) -> Result<(), CliError> {
        let cfg = self.load_config()?;
        let api = ApiClient::new(&cfg)?;
        let mut content = api.get_relic_content(id)?;

        match output_file {
            Some(path) => {
                let mut file = File::create(path).map_err(|e| {
                    CliError::File(format!("Failed to create {}: {e}", path.display()))
                })?;
                write_content(&mut content, &mut file)
            }
            None => write_content(&mut content, &mut io::stdout().lock()),
        }
    }

    fn handle_list(
        &self,
        limit: u32,
        offset: u32,
        access_level: Option<&str>,
    ) -> Result<(), CliError> {
        let cfg = self.load_config()?;
        if cfg.client_key.is_empty() {
            return Err(CliError::Auth(
                "Client key required. Create a relic to generate one.".into(),
            ));
        }
        let api = ApiClient::new(&cfg)?;
        let list = api.list_client_relics(limit, offset, access_level)?;
        output::print_list(&list, self.format(), &cfg.server)
    }

    fn handle_recent(&self, limit: u32, offset: u32) -> Result<(), CliError> {
        let cfg = self.load_config()?;
        let api = ApiClient::new(&cfg)?;
        let list = api.list_relics(limit, offset)?;
        output::print_list(&list, self.format(), &cfg.server)
    }

    fn handle_fork(
        &self,
        id: &str,
        name: &Option<String>,
        description: &Option<String>,
        access_level: &Option<String>,
    ) -> Result<(), CliError> {
        let mut cfg = self.load_config()?;
        if config::ensure_client_key(&mut cfg)? {
            self.announce_new_key(&cfg);
        }

        let api = ApiClient::new(&cfg)?;
        let body = RelicCreateRequest {
            name: name.clone().unwrap_or_default(),
            description: description.clone().unwrap_or_default(),
            access_level: self.resolve_access_level(access_level, &cfg),
        };
        let resp = api.fork_relic(id, &body)?;

        let format = self.format();
        let metadata = if format == OutputFormat::Human {
            api.get_relic(&resp.id).ok()
        } else {
            None
        };
        output::print_created(&resp, metadata.as_ref(), format, &cfg.server)
    }

    fn handle_delete(&self, id: &str, skip_confirm: bool) -> Result<(), CliError> {
        let cfg = self.load_config()?;
        if cfg.client_key.is_empty() {
            return Err(CliError::Auth(
                "Client key required. You must be the owner to delete.".into(),
            ));
        }

        if !skip_confirm {
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete relic {id}?"))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Cancelled");
                return Ok(());
            }
        }

        let api = ApiClient::new(&cfg)?;
        api.delete_relic(id)?;
        if !self.quiet {
            println!("{} Deleted relic: {id}", output::SYMBOL_SUCCESS.green());
        }
        Ok(())
    }

    fn handle_whoami(&self) -> Result<(), CliError> {
        let cfg = self.load_config()?;
        if cfg.client_key.is_empty() {
            return Err(CliError::Auth(
                "No client key found. Create a relic to generate one.".into(),
            ));
        }
        let api = ApiClient::new(&cfg)?;
        let info = api.register_client()?;
        output::print_client_info(&info, self.format(), &cfg.server)
    }

    fn handle_init(&self) -> Result<(), CliError> {
        let path = config::init(&config::config_dir()?)?;
        println!(
            "{} Created config file at {}",
            output::SYMBOL_SUCCESS.green(),
            path.display()
        );
        Ok(())
    }

    fn handle_config(
        &self,
        key: Option<&str>,
        value: Option<&str>,
        list: bool,
    ) -> Result<(), CliError> {
        let cfg = self.load_config()?;

        if list {
            println!("core.server = {}", cfg.server);
            println!("core.timeout = {}", cfg.timeout_secs);
            println!("core.progress = {}", cfg.progress);
            if cfg.client_key.is_empty() {
                println!("client.key = (not set)");
            } else {
                println!("client.key = {}", client::redact_key(&cfg.client_key));
            }
            println!("defaults.access_level = {}", cfg.access_level);
            println!("defaults.expires_in = {}", cfg.expires_in);
            return Ok(());
        }

        match (key, value) {
            (None, _) => Err(CliError::Validation(
                "Usage: relic config [key] [value] or relic config --list".into(),
            )),
            (Some(key), None) => {
                println!("{}", cfg.get(key)?);
                Ok(())
            }
            (Some(key), Some(value)) => {
                cfg.set(key, value)?;
                println!(
                    "{} Set {key} = {value}",
                    output::SYMBOL_SUCCESS.green()
                );
                Ok(())
            }
        }
    }
}

/// Copies downloaded content to its destination. Write failures (disk
/// full, broken pipe) are local file errors, same as failing to open
/// the destination.
fn write_content(content: &mut impl Read, dest: &mut impl Write) -> Result<(), CliError> {
    io::copy(content, dest)
        .map_err(|e| CliError::File(format!("Failed to write content: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_means_upload() {
        let cli = Cli::parse_from(["relic", "notes.txt", "-n", "my notes", "--public"]);
        assert_eq!(cli.file.as_deref(), Some("notes.txt"));
        assert!(cli.command.is_none());
        assert!(cli.public);
    }

    #[test]
    fn quiet_forces_url_output() {
        let cli = Cli::parse_from(["relic", "-q", "notes.txt"]);
        assert_eq!(cli.format(), OutputFormat::Url);
        let cli = Cli::parse_from(["relic", "-o", "json", "notes.txt"]);
        assert_eq!(cli.format(), OutputFormat::Json);
    }

    #[test]
    fn public_flag_beats_access_level_flag() {
        let cli = Cli::parse_from(["relic", "--public", "-a", "private", "f.txt"]);
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(dir.path().to_path_buf()).unwrap();
        assert_eq!(cli.resolve_access_level(&cli.access_level, &cfg), "public");
    }

    #[test]
    fn config_default_fills_missing_access_level() {
        let cli = Cli::parse_from(["relic", "f.txt"]);
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(dir.path().to_path_buf()).unwrap();
        assert_eq!(cli.resolve_access_level(&cli.access_level, &cfg), "private");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::WriteZero, "device full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn download_write_failure_is_a_file_error() {
        let mut content: &[u8] = b"relic bytes";
        let err = write_content(&mut content, &mut FailingWriter).unwrap_err();
        assert!(matches!(err, CliError::File(_)), "got {err:?}");
        assert_eq!(err.exit_code(), crate::error::EXIT_FILE);
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::parse_from(["relic", "delete", "abc123", "-y"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Delete { ref id, yes: true }) if id == "abc123"
        ));

        let cli = Cli::parse_from(["relic", "list", "--limit", "5", "--access-level", "public"]);
        assert!(matches!(cli.command, Some(Commands::List { limit: 5, .. })));
    }
}
