use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use lake_membership::config::MembershipConfig;
use lake_membership::membership::{
    LakeMembership, MembershipService, NetworkAddress, Worker, WorkerGroupId, WorkerId,
};
use lake_membership::registry::{SnapshotRegistry, TimeoutRegistry};

#[derive(Parser, Debug)]
#[command(name = "lake-membership")]
#[command(version)]
#[command(about = "Inspect shared-data worker membership and round-robin placement")]
#[command(propagate_version = true)]
struct Args {
    /// Registry snapshot (JSON) to read membership from
    #[arg(long, short = 's', global = true, default_value = "workers.json")]
    snapshot: PathBuf,

    /// Upper bound on each registry query, in milliseconds
    #[arg(long, global = true, default_value = "5000")]
    timeout_ms: u64,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List workers
    Workers {
        /// Only list members of this worker group
        #[arg(long)]
        group: Option<u64>,

        /// Only list workers reported alive
        #[arg(long)]
        alive_only: bool,
    },
    /// Show a single worker and its health
    Worker {
        /// Worker ID
        id: u64,
    },
    /// Run successive round-robin selections against a group
    Choose {
        /// Worker group to choose from
        #[arg(long, default_value = "0")]
        group: u64,

        /// Number of distinct workers per selection
        #[arg(long, short = 'n')]
        count: usize,

        /// Number of successive selections
        #[arg(long, default_value = "1")]
        rounds: usize,
    },
    /// Resolve the admin address of the worker serving a data-path address
    AdminAddr {
        /// Data-path address (host:port)
        addr: NetworkAddress,
    },
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct WorkerOutput<'a> {
    #[serde(flatten)]
    worker: &'a Worker,
    #[serde(skip_serializing_if = "Option::is_none")]
    healthy: Option<bool>,
}

#[derive(Serialize)]
struct RoundOutput {
    round: usize,
    workers: Vec<WorkerId>,
    satisfied: bool,
}

#[derive(Serialize)]
struct AdminAddrOutput {
    data_address: String,
    admin_address: String,
}

type Membership = LakeMembership<TimeoutRegistry<SnapshotRegistry>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config =
        MembershipConfig::new(args.snapshot.clone()).with_query_timeout_ms(args.timeout_ms);
    let membership = LakeMembership::from_config(&config).await?;

    match args.command {
        Commands::Workers { group, alive_only } => {
            handle_workers(&membership, group, alive_only, &args.output).await
        }
        Commands::Worker { id } => handle_worker(&membership, WorkerId(id), &args.output).await,
        Commands::Choose {
            group,
            count,
            rounds,
        } => {
            handle_choose(
                &membership,
                WorkerGroupId(group),
                count,
                rounds,
                &args.output,
            )
            .await
        }
        Commands::AdminAddr { addr } => handle_admin_addr(&membership, &addr, &args.output).await,
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn handle_workers(
    membership: &Membership,
    group: Option<u64>,
    alive_only: bool,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let workers = match group {
        Some(g) => membership.workers_in_group(WorkerGroupId(g)).await?,
        None => membership.workers().await?,
    };
    let workers: Vec<Worker> = workers
        .into_iter()
        .filter(|w| !alive_only || w.alive)
        .collect();

    match output_format {
        OutputFormat::Json => {
            let output: Vec<WorkerOutput> = workers
                .iter()
                .map(|worker| WorkerOutput {
                    worker,
                    healthy: None,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            if workers.is_empty() {
                println!("No workers found.");
                return Ok(());
            }
            println!(
                "{:<12} {:<8} {:<24} {:<10} {:<10} {:<10} {:<6}",
                "ID", "GROUP", "HOST", "HEARTBEAT", "DATA", "RPC", "ALIVE"
            );
            println!("{}", "-".repeat(84));
            for w in &workers {
                println!(
                    "{:<12} {:<8} {:<24} {:<10} {:<10} {:<10} {:<6}",
                    w.id,
                    w.group_id,
                    w.host,
                    w.heartbeat_port,
                    w.data_port,
                    w.rpc_port,
                    if w.alive { "yes" } else { "no" }
                );
            }
            println!("\nTotal: {} worker(s)", workers.len());
        }
    }
    Ok(())
}

async fn handle_worker(
    membership: &Membership,
    id: WorkerId,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(worker) = membership.worker(id).await? else {
        return Err(format!("Worker {} is not registered", id).into());
    };
    let healthy = membership.is_worker_healthy(id).await?;

    match output_format {
        OutputFormat::Json => {
            let output = WorkerOutput {
                worker: &worker,
                healthy: Some(healthy),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("Worker ID:      {}", worker.id);
            println!("Group:          {}", worker.group_id);
            println!("Heartbeat:      {}", worker.heartbeat_address());
            println!("Data path:      {}", worker.data_address());
            println!("Admin:          {}", worker.admin_address());
            println!("Alive:          {}", worker.alive);
            println!("Healthy:        {}", healthy);
            if let Some(ts) = worker.last_heartbeat {
                println!("Last heartbeat: {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
    }
    Ok(())
}

async fn handle_choose(
    membership: &Membership,
    group: WorkerGroupId,
    count: usize,
    rounds: usize,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut results = Vec::with_capacity(rounds);
    for round in 1..=rounds {
        let workers = membership.choose_workers(count, group).await?;
        let satisfied = workers.len() == count;
        results.push(RoundOutput {
            round,
            workers,
            satisfied,
        });
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Table => {
            println!("{:<8} {:<10} WORKERS", "ROUND", "SATISFIED");
            println!("{}", "-".repeat(50));
            for r in &results {
                let ids: Vec<String> = r.workers.iter().map(|id| id.to_string()).collect();
                println!(
                    "{:<8} {:<10} {}",
                    r.round,
                    if r.satisfied { "yes" } else { "no" },
                    if ids.is_empty() {
                        "-".to_string()
                    } else {
                        ids.join(", ")
                    }
                );
            }
        }
    }
    Ok(())
}

async fn handle_admin_addr(
    membership: &Membership,
    addr: &NetworkAddress,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let admin = membership.to_admin_address(addr).await?;

    match output_format {
        OutputFormat::Json => {
            let output = AdminAddrOutput {
                data_address: addr.to_string(),
                admin_address: admin.to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("{} -> {}", addr, admin);
        }
    }
    Ok(())
}
