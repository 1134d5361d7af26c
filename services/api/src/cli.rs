use crate::demo::{run_demo, DemoArgs};
use crate::infra::{parse_date, read_input};
use crate::server;
use aid_assessment::calculator;
use aid_assessment::config::{AppConfig, ServerConfig};
use aid_assessment::disbursement::{self, DisbursementWriter, ScheduleRequest};
use aid_assessment::error::AppError;
use aid_assessment::workflow::{Clock, SystemClock};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Student Aid Assessment",
    about = "Run the student aid assessment service or assess a single application from the command line",
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
    /// Calculate awards for a consolidated input file and print the result as JSON
    Calculate(CalculateArgs),
    /// Calculate awards for a consolidated input file and print its disbursement schedule
    Schedule(ScheduleArgs),
    /// Walk an in-memory assessment run from start to disbursement
    Demo(DemoArgs),
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

impl ServeArgs {
    pub(crate) fn apply(self, server: &mut ServerConfig) {
        if let Some(host) = self.host {
            server.host = host;
        }
        if let Some(port) = self.port {
            server.port = port;
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct CalculateArgs {
    /// Path to a consolidated assessment input (JSON)
    #[arg(long)]
    pub(crate) input: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct ScheduleArgs {
    /// Path to a consolidated assessment input (JSON)
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Scheduling date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Emit CSV rows instead of JSON
    #[arg(long)]
    pub(crate) csv: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Calculate(args) => run_calculate(args),
        Command::Schedule(args) => run_schedule(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn run_calculate(args: CalculateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let input = read_input(&args.input, config.assessment.default_program_year)?;
    let output = calculator::calculate(&input);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_schedule(args: ScheduleArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let input = read_input(&args.input, config.assessment.default_program_year)?;
    let output = calculator::calculate(&input);
    let request = ScheduleRequest {
        start_date: input.offering.start_date,
        end_date: input.offering.end_date,
        weeks: input.offering.weeks,
        today: args.today.unwrap_or_else(|| SystemClock.today()),
        awards: disbursement::awards_from_output(&output),
    };
    let records = disbursement::schedule(&request);

    if args.csv {
        let mut writer = DisbursementWriter::new(std::io::stdout());
        writer.write_records(&records)?;
        writer.into_inner()?;
    } else {
        println!("{}", serde_json::to_string_pretty(&records)?);
    }
    Ok(())
}
