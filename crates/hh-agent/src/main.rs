use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use hh_core::models::AgentConfig;
use hh_core::services::host::HostAgent;

#[derive(Parser)]
#[command(name = "hh-agent", about = "Host agent for compose-deployed services")]
struct Cli {
    /// Emit results as JSON on stdout (errors become an error object, exit 0).
    #[arg(long, global = true)]
    json: bool,

    /// Agent config file; built-in host paths apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clone repositories: alternating <repo-url> <subdomain> pairs.
    Clone {
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// List deployed services with their checked-out commits.
    ListServices,
    /// Remove services by subdomain.
    Remove {
        #[arg(required = true)]
        subdomains: Vec<String>,
    },
    /// Rebuild services: down, build, rewrite descriptor, up.
    Rebuild {
        domain: String,
        subdomains: Vec<String>,
        /// Rebuild every deployed service, resetting the port ledger first.
        #[arg(long)]
        all: bool,
        /// Extra routing label (key=value) applied to each rebuilt service.
        #[arg(long = "label")]
        labels: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match AgentConfig::load(path) {
            Ok(config) => config,
            Err(e) => return finish(cli.json, vec![e.to_string()]),
        },
        None => AgentConfig::default(),
    };
    let agent = HostAgent::new(config);

    let errors = match cli.command {
        Command::Clone { args } => run_clone(&agent, &args).await,
        Command::ListServices => return run_list_services(&agent, cli.json).await,
        Command::Remove { subdomains } => run_remove(&agent, &subdomains).await,
        Command::Rebuild {
            domain,
            subdomains,
            all,
            labels,
        } => run_rebuild(&agent, &domain, subdomains, all, &labels).await,
    };

    finish(cli.json, errors)
}

async fn run_clone(agent: &HostAgent, args: &[String]) -> Vec<String> {
    if args.len() % 2 != 0 {
        return vec!["clone expects <repo-url> <subdomain> pairs".to_string()];
    }
    let mut errors = Vec::new();
    for pair in args.chunks(2) {
        let (repo, subdomain) = (&pair[0], &pair[1]);
        if let Err(e) = agent.clone_service(repo, subdomain).await {
            errors.push(format!("failed to clone repository {repo}: {e}"));
        }
    }
    errors
}

async fn run_list_services(agent: &HostAgent, json: bool) {
    match agent.list_services().await {
        Ok(services) => {
            if json {
                println!("{}", json!(services));
            } else {
                for service in services {
                    println!("{}", service.subdomain);
                }
            }
        }
        Err(e) => finish(json, vec![e.to_string()]),
    }
}

async fn run_remove(agent: &HostAgent, subdomains: &[String]) -> Vec<String> {
    let mut errors = Vec::new();
    for subdomain in subdomains {
        if let Err(e) = agent.remove_service(subdomain).await {
            errors.push(format!("failed to remove service {subdomain}: {e}"));
        }
    }
    errors
}

async fn run_rebuild(
    agent: &HostAgent,
    domain: &str,
    mut subdomains: Vec<String>,
    all: bool,
    labels: &[String],
) -> Vec<String> {
    if all {
        // Full-fleet rebuild remaps the whole port space from scratch.
        if let Err(e) = agent.reset_ledger() {
            return vec![e.to_string()];
        }
        match agent.list_services().await {
            Ok(services) => subdomains.extend(services.into_iter().map(|s| s.subdomain)),
            Err(e) => return vec![e.to_string()],
        }
    }

    let mut errors = Vec::new();
    for subdomain in &subdomains {
        if let Err(e) = agent.rebuild_service(domain, subdomain, labels).await {
            errors.push(format!("failed to rebuild service {subdomain}: {e}"));
        }
    }
    errors
}

/// One failed service never aborts the rest of a batch; failures are
/// aggregated and reported together. In JSON mode the driver parses the
/// error object, so the exit code stays 0.
fn finish(json: bool, errors: Vec<String>) {
    if errors.is_empty() {
        if json {
            println!("{}", json!({"success": true}));
        }
        return;
    }
    tracing::error!(failures = errors.len(), "command completed with errors");
    if json {
        println!("{}", json!({"error": errors.join("; ")}));
    } else {
        eprintln!("{}", errors.join("; "));
        std::process::exit(1);
    }
}
