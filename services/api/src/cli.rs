use crate::demo::{run_demo, run_routing_test, DemoArgs, RoutingTestArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use leadgen::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Lead Routing Engine",
    about = "Capture seller leads and route them to local students",
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
    /// Inspect routing decisions against the rule tables
    Routing {
        #[command(subcommand)]
        command: RoutingCommand,
    },
    /// Route the sample postcodes and submit a demo lead
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RoutingCommand {
    /// Show which student a postcode would be routed to, with the full rule trail
    Test(RoutingTestArgs),
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
        Command::Routing {
            command: RoutingCommand::Test(args),
        } => run_routing_test(args),
        Command::Demo(args) => run_demo(args),
    }
}
