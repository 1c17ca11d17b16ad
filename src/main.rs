// goat CLI

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use goat::executor::{ExecutorConfig, PlaybookExecutor};
use goat::inventory::{HostSelector, Inventory, ALL_GROUP};
use goat::output::{render_playbook_result, GoatError, JsonFormatter, OutputFormat, PlayRecap};
use goat::parser::Playbook;

#[derive(Parser)]
#[command(
    name = "goat",
    about = "Run ordered commands over SSH across an inventory of hosts",
    version,
    disable_colored_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a playbook
    Run {
        /// Path to the playbook file
        playbook: PathBuf,

        /// Path to the inventory file
        #[arg(short, long)]
        inventory: PathBuf,

        /// Maximum hosts working on a task at once
        #[arg(long, default_value = "1")]
        forks: usize,

        /// SSH connection timeout in seconds
        #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
        timeout: u64,

        /// Default SSH user, overridden by playbook and inventory vars
        #[arg(short, long)]
        user: Option<String>,

        /// Prompt for a default SSH password
        #[arg(short = 'k', long)]
        ask_pass: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        output_format: OutputFormat,
    },

    /// List the hosts targets resolve to
    Inventory {
        /// Path to the inventory file
        #[arg(short, long)]
        inventory: PathBuf,

        /// Host or group names
        #[arg(default_value = ALL_GROUP)]
        targets: Vec<String>,

        /// Show merged host variables
        #[arg(long)]
        vars: bool,
    },

    /// Validate a playbook without executing
    Validate {
        /// Path to the playbook file
        playbook: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            1
        }
    };
    std::process::exit(code);
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<GoatError>() {
        Some(goat_err) => {
            if err.chain().count() > 1 {
                eprintln!("{}", err);
            }
            eprint!("{}", goat_err.render());
        }
        None => eprintln!("{} {:#}", "ERROR:".red().bold(), err),
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Run {
            playbook,
            inventory,
            forks,
            timeout,
            user,
            ask_pass,
            output_format,
        } => {
            let mut config = ExecutorConfig::default()
                .with_forks(forks)
                .with_connect_timeout(Duration::from_secs(timeout));
            if let Some(user) = user {
                config = config.with_default_var("username", user);
            }
            if ask_pass {
                config = config.with_default_var("password", prompt_password("SSH Password: ")?);
            }
            run_playbook(playbook, inventory, config, output_format).await
        }
        Commands::Inventory {
            inventory,
            targets,
            vars,
        } => {
            list_inventory(inventory, &targets, vars)?;
            Ok(0)
        }
        Commands::Validate { playbook } => {
            validate_playbook(playbook)?;
            Ok(0)
        }
    }
}

async fn run_playbook(
    playbook_path: PathBuf,
    inventory_path: PathBuf,
    config: ExecutorConfig,
    output_format: OutputFormat,
) -> anyhow::Result<i32> {
    let playbook = Playbook::from_file(&playbook_path).context("Failed to load playbook")?;
    let inventory = Inventory::from_file(&inventory_path).context("Failed to load inventory")?;

    info!(
        playbook = %playbook_path.display(),
        inventory = %inventory_path.display(),
        forks = config.forks,
        "loaded playbook and inventory"
    );

    let executor = PlaybookExecutor::ssh(config);
    let result = executor.run(&playbook, &inventory).await?;

    let formatter = output_format.formatter();
    let mut stdout = io::stdout().lock();
    stdout.write_all(render_playbook_result(formatter.as_ref(), &result).as_bytes())?;

    let recap = PlayRecap::from_result(&result);
    match output_format {
        OutputFormat::Text => {
            for (host, err) in result.unreachable() {
                writeln!(stdout, "{} {}: {}", "UNREACHABLE".red().bold(), host, err)?;
            }
            stdout.flush()?;
            recap.print();
        }
        OutputFormat::Json => {
            stdout.write_all(JsonFormatter::new().recap(&recap).as_bytes())?;
        }
    }

    Ok(if result.all_succeeded() { 0 } else { 2 })
}

fn list_inventory(inventory_path: PathBuf, targets: &[String], show_vars: bool) -> anyhow::Result<()> {
    let inventory = Inventory::from_file(&inventory_path).context("Failed to load inventory")?;
    let hosts = HostSelector::new(&inventory).select(targets)?;

    println!(
        "{} {} host(s) matching {}",
        "Found".green(),
        hosts.len(),
        targets.join(", ")
    );
    println!();

    for host in hosts {
        println!("  {} {}", "•".cyan(), host.name.white().bold());
        if let Some(address) = host.get_var("address") {
            println!("    {} {}", "Address:".dimmed(), address);
        }

        if show_vars && !host.vars.is_empty() {
            println!("    {}:", "Variables".dimmed());
            for (k, v) in &host.vars {
                println!("      {} = {}", k.yellow(), v);
            }
        }
    }

    Ok(())
}

fn validate_playbook(playbook_path: PathBuf) -> anyhow::Result<()> {
    println!("{} {}", "Validating:".cyan(), playbook_path.display());

    let playbook = Playbook::from_file(&playbook_path).context("Failed to load playbook")?;

    println!("{} Playbook is valid", "✓".green());
    println!();
    println!("  {} {}", "Name:".dimmed(), playbook.name);
    println!("  {} {}", "Hosts:".dimmed(), playbook.hosts.join(", "));
    println!("  {} {}", "Tasks:".dimmed(), playbook.tasks.len());
    for task in &playbook.tasks {
        println!("    {} {} ({})", "•".cyan(), task.name, task.cmd.dimmed());
    }

    Ok(())
}

fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    if !io::stdin().is_terminal() {
        bail!("--ask-pass needs an interactive terminal");
    }

    let password = rpassword::prompt_password(prompt.cyan().to_string())
        .context("Failed to read password")?;
    let password = password.trim().to_string();

    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_must_be_positive() {
        let parse = |timeout: &str| {
            Cli::try_parse_from(["goat", "run", "site.yaml", "-i", "hosts.yaml", "--timeout", timeout])
        };

        assert!(parse("0").is_err());
        match parse("30").unwrap().command {
            Commands::Run { timeout, forks, .. } => {
                assert_eq!(timeout, 30);
                assert_eq!(forks, 1);
            }
            _ => panic!("expected run"),
        }
    }
}
