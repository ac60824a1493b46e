use crate::report::{run_assessment, run_route_risk, AssessArgs, RouteArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use roadrisk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Route Risk Service",
    about = "Run the route risk API or score vehicles and routes from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Assess a demo vehicle at a position using live weather
    Assess(AssessArgs),
    /// Calculate the composite risk for a catalogued route
    Route(RouteArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Assess(args) => run_assessment(args).await,
        Command::Route(args) => run_route_risk(args).await,
    }
}
