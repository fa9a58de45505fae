use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use hippodrome::config::EventConfig;
use hippodrome::runtime::{
    serve_region, setup_tracing, Endpoints, EventReport, Hippodrome, Policies, RegionKind,
};

#[derive(Parser, Debug)]
#[command(name = "hippodrome", about = "An afternoon at the races")]
struct Cli {
    #[command(flatten)]
    event: EventArgs,

    #[command(subcommand)]
    command: Command,
}

/// Event constants. Flags override the config file, which overrides the defaults.
#[derive(Args, Debug)]
struct EventArgs {
    /// TOML file with the event constants
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    seed: Option<u64>,

    #[arg(long, global = true)]
    races: Option<u32>,

    #[arg(long, global = true)]
    horses_per_race: Option<u32>,

    #[arg(long, global = true)]
    spectators: Option<u32>,

    #[arg(long, global = true)]
    track_length: Option<u32>,

    #[arg(long, global = true)]
    max_step: Option<u32>,

    #[arg(long, global = true)]
    wallet: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the whole event in this process
    Run {
        /// Put every region behind its own loopback TCP service
        #[arg(long)]
        distributed: bool,

        /// Print the event report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve one region over TCP
    Serve {
        #[arg(value_enum)]
        region: RegionArg,

        #[arg(long, default_value = "127.0.0.1:7100")]
        bind: SocketAddr,
    },
    /// Run the actors against regions started with `serve`
    Connect {
        /// TOML file with one address per region
        #[arg(long)]
        endpoints: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum RegionArg {
    Stable,
    Paddock,
    RacingTrack,
    BettingCentre,
    ControlCentre,
}

impl From<RegionArg> for RegionKind {
    fn from(arg: RegionArg) -> Self {
        match arg {
            RegionArg::Stable => RegionKind::Stable,
            RegionArg::Paddock => RegionKind::Paddock,
            RegionArg::RacingTrack => RegionKind::RacingTrack,
            RegionArg::BettingCentre => RegionKind::BettingCentre,
            RegionArg::ControlCentre => RegionKind::ControlCentre,
        }
    }
}

impl EventArgs {
    fn resolve(&self) -> anyhow::Result<EventConfig> {
        let mut config = match &self.config {
            Some(path) => EventConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => EventConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        let overrides = [
            (&mut config.races, self.races),
            (&mut config.horses_per_race, self.horses_per_race),
            (&mut config.spectators, self.spectators),
            (&mut config.track_length, self.track_length),
            (&mut config.max_step, self.max_step),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(wallet) = self.wallet {
            config.initial_wallet = wallet;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let config = cli.event.resolve()?;

    match cli.command {
        Command::Run { distributed, json } => {
            let hippodrome = if distributed {
                Hippodrome::start_distributed(config, Policies::default()).await?
            } else {
                Hippodrome::start(config, Policies::default())?
            };
            report(hippodrome.run_event().await?, json)
        }
        Command::Serve { region, bind } => {
            serve_region(region.into(), config, Policies::default(), bind).await?;
            Ok(())
        }
        Command::Connect { endpoints, json } => {
            let text = std::fs::read_to_string(&endpoints)
                .with_context(|| format!("reading {}", endpoints.display()))?;
            let endpoints: Endpoints = toml::from_str(&text)?;
            let hippodrome = Hippodrome::connect(config, endpoints)?;
            report(hippodrome.run_event().await?, json)
        }
    }
}

fn report(report: EventReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for result in &report.results {
        info!(race = result.race, winners = ?result.winners, "Result");
    }
    for spectator in &report.spectators {
        info!(spectator = spectator.id, wallet = spectator.wallet, "Final wallet");
    }
    info!(seed = report.seed, entries = report.log.len(), "Event over");
    Ok(())
}
