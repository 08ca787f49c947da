use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "jobmesh")]
#[command(about = "Job listing aggregation and normalization pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fetch pipeline once for the selected sources
    Fetch(FetchArgs),

    /// Start, stop, or inspect the background job scheduler
    Scheduler {
        #[command(subcommand)]
        command: SchedulerCommand,
    },

    /// One-off database bootstrap: creates tables and seeds reference data
    SetupDb(SetupDbArgs),
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// Only run these sources (mutually exclusive with --exclude-portals)
    #[arg(long, value_delimiter = ',')]
    pub include_portals: Vec<String>,

    /// Run every source except these (mutually exclusive with --include-portals)
    #[arg(long, value_delimiter = ',')]
    pub exclude_portals: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum SchedulerCommand {
    /// Register every job and block, running them on their configured cadence
    Start,
    /// Shut down a running scheduler (no-op for the one-shot CLI process)
    Stop,
    /// Print the names of every registered job
    ListJobs,
    /// Run a single named job immediately, bypassing its cadence
    RunJob { name: String },
    /// Drop every registered job without running it
    RemoveJobs,
}

#[derive(clap::Args, Debug)]
pub struct SetupDbArgs {
    #[arg(long)]
    pub db_name: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
}
