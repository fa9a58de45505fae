use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::actors::{ActorError, Broker, HorseJockey, Spectator};
use crate::adapter::{serve, RegionService, TcpPort};
use crate::betting_centre::{BetPolicy, BettingCentre, StrategyBook};
use crate::clients::{
    BettingClient, ControlClient, PaddockClient, Port, StableClient, TrackClient,
};
use crate::config::{Bounds, ConfigError, EventConfig};
use crate::control_centre::ControlCentre;
use crate::framework::{FrameworkError, RegionClient, RegionServer, SharedRegion};
use crate::model::{Caller, HorseContext, HorseId, RaceResult, SpectatorContext};
use crate::paddock::Paddock;
use crate::racing_track::RacingTrack;
use crate::repository::{GeneralRepository, LogEntry, SharedLog};
use crate::stable::{InverseAgility, LineupError, OddsPolicy, Stable};

/// Requests a region may have queued before senders start waiting.
const REGION_BUFFER: usize = 64;

/// How long shutdown waits for a region to drain before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum HippodromeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lineup(#[from] LineupError),

    #[error("Cannot expose region: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot fetch the lineup: {0}")]
    Setup(#[from] FrameworkError),

    #[error(transparent)]
    Actor(#[from] ActorError),

    #[error("Actor task failed: {0}")]
    Task(String),
}

/// The pluggable decisions of the event.
pub struct Policies {
    pub odds: Box<dyn OddsPolicy>,
    pub bets: Box<dyn BetPolicy>,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            odds: Box::new(InverseAgility),
            bets: Box::new(StrategyBook),
        }
    }
}

/// The five shared regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Stable,
    Paddock,
    RacingTrack,
    BettingCentre,
    ControlCentre,
}

/// Where each region service listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub stable: SocketAddr,
    pub paddock: SocketAddr,
    pub racing_track: SocketAddr,
    pub betting_centre: SocketAddr,
    pub control_centre: SocketAddr,
}

impl Endpoints {
    pub fn get(&self, kind: RegionKind) -> SocketAddr {
        match kind {
            RegionKind::Stable => self.stable,
            RegionKind::Paddock => self.paddock,
            RegionKind::RacingTrack => self.racing_track,
            RegionKind::BettingCentre => self.betting_centre,
            RegionKind::ControlCentre => self.control_centre,
        }
    }
}

/// Handles to every region, in-process or remote.
#[derive(Clone)]
struct Ports {
    stable: Port<Stable>,
    paddock: Port<Paddock>,
    track: Port<RacingTrack>,
    betting: Port<BettingCentre>,
    control: Port<ControlCentre>,
}

impl Ports {
    fn remote(endpoints: &Endpoints) -> Self {
        Self {
            stable: Arc::new(TcpPort::<Stable>::new(endpoints.stable)),
            paddock: Arc::new(TcpPort::<Paddock>::new(endpoints.paddock)),
            track: Arc::new(TcpPort::<RacingTrack>::new(endpoints.racing_track)),
            betting: Arc::new(TcpPort::<BettingCentre>::new(endpoints.betting_centre)),
            control: Arc::new(TcpPort::<ControlCentre>::new(endpoints.control_centre)),
        }
    }
}

/// Region state machines built from one configuration.
pub struct Regions {
    pub stable: Stable,
    pub paddock: Paddock,
    pub track: RacingTrack,
    pub betting: BettingCentre,
    pub control: ControlCentre,
}

impl Regions {
    /// Builds every region. Only the stable draws from `rng` (roster and race assignment).
    pub fn build(
        config: &EventConfig,
        policies: Policies,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self, HippodromeError> {
        config.validate()?;
        Ok(Self {
            stable: Stable::new(config, policies.odds, rng)?,
            paddock: Paddock::new(config.races, config.horses_per_race, config.spectators),
            track: RacingTrack::new(config.races, config.horses_per_race, config.track_length),
            betting: BettingCentre::new(
                config.races,
                config.horses_per_race,
                config.spectators,
                policies.bets,
            ),
            control: ControlCentre::new(config.races, config.spectators),
        })
    }
}

/// Clients of freshly spawned region servers.
struct Running {
    stable: RegionClient<Stable>,
    paddock: RegionClient<Paddock>,
    track: RegionClient<RacingTrack>,
    betting: RegionClient<BettingCentre>,
    control: RegionClient<ControlCentre>,
}

/// Spawns `region` behind a [`RegionServer`] and returns its client.
pub fn spawn_region<R>(
    region: R,
    bounds: Bounds,
    log: &SharedLog,
    handles: &mut Vec<JoinHandle<()>>,
) -> RegionClient<R>
where
    R: SharedRegion<Context = SharedLog>,
{
    let (server, client) = RegionServer::new(region, bounds, REGION_BUFFER);
    handles.push(tokio::spawn(server.run(Arc::clone(log))));
    client
}

/// Puts a region client behind a [`RegionService`] listening on `bind`.
pub async fn expose<R>(
    client: RegionClient<R>,
    bounds: Bounds,
    bind: SocketAddr,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)>
where
    R: SharedRegion,
    R::Op: Serialize + DeserializeOwned,
    R::Reply: Serialize + DeserializeOwned + Sync,
{
    let listener = TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;
    let service = Arc::new(RegionService::new(bounds, Arc::new(client)));
    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, service).await {
            error!(%addr, error = %e, "Listener stopped");
        }
    });
    Ok((addr, handle))
}

/// Everything a finished event produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReport {
    pub seed: u64,
    /// One result per race, in race order.
    pub results: Vec<RaceResult>,
    /// Final spectator contexts, by id.
    pub spectators: Vec<SpectatorContext>,
    /// Moves each horse needed to cross the line.
    pub moves: BTreeMap<HorseId, u32>,
    /// Repository contents. Empty when the regions ran in another process.
    pub log: Vec<LogEntry>,
}

impl EventReport {
    pub fn wallet_of(&self, spectator: u32) -> Option<u64> {
        self.spectators
            .iter()
            .find(|s| s.id == spectator)
            .map(|s| s.wallet)
    }
}

enum Finished {
    Broker(Vec<RaceResult>),
    Horse(HorseId, u32),
    Spectator(SpectatorContext),
}

/// The running event: region servers (local or remote) plus the actor cast.
///
/// # Example
///
/// ```ignore
/// let hippodrome = Hippodrome::start(EventConfig::default(), Policies::default())?;
/// let report = hippodrome.run_event().await?;
/// println!("winners of race 0: {:?}", report.results[0].winners);
/// ```
pub struct Hippodrome {
    config: EventConfig,
    seed: u64,
    repository: Arc<GeneralRepository>,
    ports: Ports,
    endpoints: Option<Endpoints>,
    servers: Vec<JoinHandle<()>>,
    listeners: Vec<JoinHandle<()>>,
}

impl Hippodrome {
    /// Starts every region in this process.
    pub fn start(config: EventConfig, policies: Policies) -> Result<Self, HippodromeError> {
        let seed = event_seed(&config);
        let repository = GeneralRepository::new();
        let mut servers = Vec::new();
        let running = launch(&config, policies, seed, &repository, &mut servers)?;

        let ports = Ports {
            stable: Arc::new(running.stable),
            paddock: Arc::new(running.paddock),
            track: Arc::new(running.track),
            betting: Arc::new(running.betting),
            control: Arc::new(running.control),
        };
        info!(seed, mode = "in-process", "Regions started");
        Ok(Self {
            config,
            seed,
            repository,
            ports,
            endpoints: None,
            servers,
            listeners: Vec::new(),
        })
    }

    /// Starts every region in this process behind its own loopback TCP service, and
    /// wires the actors through the wire.
    pub async fn start_distributed(
        config: EventConfig,
        policies: Policies,
    ) -> Result<Self, HippodromeError> {
        let seed = event_seed(&config);
        let repository = GeneralRepository::new();
        let bounds = config.bounds();
        let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let mut servers = Vec::new();
        let running = launch(&config, policies, seed, &repository, &mut servers)?;

        let (stable, a) = expose(running.stable, bounds, loopback).await?;
        let (paddock, b) = expose(running.paddock, bounds, loopback).await?;
        let (racing_track, c) = expose(running.track, bounds, loopback).await?;
        let (betting_centre, d) = expose(running.betting, bounds, loopback).await?;
        let (control_centre, e) = expose(running.control, bounds, loopback).await?;
        let endpoints = Endpoints {
            stable,
            paddock,
            racing_track,
            betting_centre,
            control_centre,
        };

        info!(seed, mode = "distributed", ?endpoints, "Regions started");
        Ok(Self {
            config,
            seed,
            repository,
            ports: Ports::remote(&endpoints),
            endpoints: Some(endpoints),
            servers,
            listeners: vec![a, b, c, d, e],
        })
    }

    /// Runs the actors against regions served elsewhere (see `hippodrome serve`).
    pub fn connect(config: EventConfig, endpoints: Endpoints) -> Result<Self, HippodromeError> {
        config.validate()?;
        let seed = event_seed(&config);
        info!(seed, mode = "remote", ?endpoints, "Connecting");
        Ok(Self {
            config,
            seed,
            repository: GeneralRepository::new(),
            ports: Ports::remote(&endpoints),
            endpoints: Some(endpoints),
            servers: Vec::new(),
            listeners: Vec::new(),
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn repository(&self) -> Arc<GeneralRepository> {
        Arc::clone(&self.repository)
    }

    /// Service addresses, when the regions are reached over TCP.
    pub fn endpoints(&self) -> Option<Endpoints> {
        self.endpoints
    }

    /// Runs the whole afternoon and shuts the regions down.
    ///
    /// The first actor failure aborts the region servers, which releases every parked
    /// actor with an error; the first failure is the one returned.
    pub async fn run_event(self) -> Result<EventReport, HippodromeError> {
        let lineups = self.lineups().await;
        let horses = match lineups {
            Ok(horses) => horses,
            Err(e) => {
                self.shutdown().await;
                return Err(e);
            }
        };
        let Hippodrome {
            config,
            seed,
            repository,
            ports,
            servers,
            listeners,
            ..
        } = self;
        info!(
            seed,
            races = config.races,
            horses = horses.len(),
            spectators = config.spectators,
            "Event starting"
        );

        let mut cast: JoinSet<Result<Finished, ActorError>> = JoinSet::new();
        let broker = Broker::new(
            config.races,
            StableClient::new(ports.stable.clone()),
            TrackClient::new(ports.track.clone()),
            BettingClient::new(ports.betting.clone()),
            ControlClient::new(ports.control.clone()),
        );
        cast.spawn(async move { broker.run().await.map(Finished::Broker) });

        for horse in horses {
            let jockey = HorseJockey::new(
                horse,
                ChaCha8Rng::seed_from_u64(horse_seed(seed, horse.id)),
                StableClient::new(ports.stable.clone()),
                PaddockClient::new(ports.paddock.clone()),
                TrackClient::new(ports.track.clone()),
            );
            cast.spawn(async move { jockey.run().await.map(|n| Finished::Horse(horse.id, n)) });
        }

        for id in 0..config.spectators {
            let spectator = Spectator::new(
                SpectatorContext::new(id, config.initial_wallet, id),
                config.races,
                ControlClient::new(ports.control.clone()),
                PaddockClient::new(ports.paddock.clone()),
                BettingClient::new(ports.betting.clone()),
            );
            cast.spawn(async move { spectator.run().await.map(Finished::Spectator) });
        }
        drop(ports);

        let mut results = Vec::new();
        let mut spectators = Vec::new();
        let mut moves = BTreeMap::new();
        let mut failure = None;
        while let Some(joined) = cast.join_next().await {
            let outcome = joined
                .map_err(|e| HippodromeError::Task(e.to_string()))
                .and_then(|r| r.map_err(HippodromeError::from));
            match outcome {
                Ok(Finished::Broker(r)) => results = r,
                Ok(Finished::Horse(id, n)) => {
                    moves.insert(id, n);
                }
                Ok(Finished::Spectator(s)) => spectators.push(s),
                Err(e) if failure.is_none() => {
                    error!(error = %e, "Aborting the event");
                    servers.iter().chain(listeners.iter()).for_each(JoinHandle::abort);
                    failure = Some(e);
                }
                Err(e) => warn!(error = %e, "Actor stopped"),
            }
        }

        stop(servers, listeners).await;
        if let Some(e) = failure {
            return Err(e);
        }

        spectators.sort_by_key(|s| s.id);
        info!(seed, races = results.len(), "Event finished");
        Ok(EventReport {
            seed,
            results,
            spectators,
            moves,
            log: repository.snapshot(),
        })
    }

    /// Stops the regions without running the event.
    pub async fn shutdown(self) {
        let Hippodrome {
            ports,
            servers,
            listeners,
            ..
        } = self;
        drop(ports);
        stop(servers, listeners).await;
    }

    /// Horse contexts of every race, as the stable lines them up.
    async fn lineups(&self) -> Result<Vec<HorseContext>, HippodromeError> {
        let stable = StableClient::new(self.ports.stable.clone());
        let mut horses = Vec::new();
        for race in 0..self.config.races {
            horses.extend(stable.lineup(Caller::broker(), race).await?);
        }
        Ok(horses)
    }
}

/// Serves a single region on `bind` until the process is stopped.
pub async fn serve_region(
    kind: RegionKind,
    config: EventConfig,
    policies: Policies,
    bind: SocketAddr,
) -> Result<(), HippodromeError> {
    let seed = event_seed(&config);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let regions = Regions::build(&config, policies, &mut rng)?;
    let bounds = config.bounds();
    let log: SharedLog = GeneralRepository::new();
    let mut servers = Vec::new();

    let (addr, listener) = match kind {
        RegionKind::Stable => {
            let client = spawn_region(regions.stable, bounds, &log, &mut servers);
            expose(client, bounds, bind).await?
        }
        RegionKind::Paddock => {
            let client = spawn_region(regions.paddock, bounds, &log, &mut servers);
            expose(client, bounds, bind).await?
        }
        RegionKind::RacingTrack => {
            let client = spawn_region(regions.track, bounds, &log, &mut servers);
            expose(client, bounds, bind).await?
        }
        RegionKind::BettingCentre => {
            let client = spawn_region(regions.betting, bounds, &log, &mut servers);
            expose(client, bounds, bind).await?
        }
        RegionKind::ControlCentre => {
            let client = spawn_region(regions.control, bounds, &log, &mut servers);
            expose(client, bounds, bind).await?
        }
    };
    info!(region = ?kind, %addr, seed, "Serving");
    listener
        .await
        .map_err(|e| HippodromeError::Task(e.to_string()))
}

fn launch(
    config: &EventConfig,
    policies: Policies,
    seed: u64,
    repository: &Arc<GeneralRepository>,
    servers: &mut Vec<JoinHandle<()>>,
) -> Result<Running, HippodromeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let regions = Regions::build(config, policies, &mut rng)?;
    let bounds = config.bounds();
    let log: SharedLog = repository.clone();

    Ok(Running {
        stable: spawn_region(regions.stable, bounds, &log, servers),
        paddock: spawn_region(regions.paddock, bounds, &log, servers),
        track: spawn_region(regions.track, bounds, &log, servers),
        betting: spawn_region(regions.betting, bounds, &log, servers),
        control: spawn_region(regions.control, bounds, &log, servers),
    })
}

async fn stop(servers: Vec<JoinHandle<()>>, listeners: Vec<JoinHandle<()>>) {
    for listener in &listeners {
        listener.abort();
    }
    for mut server in servers {
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
            warn!("Region did not drain in time");
            server.abort();
        }
    }
    info!("Shutdown complete");
}

fn event_seed(config: &EventConfig) -> u64 {
    config.seed.unwrap_or_else(|| rand::rng().random())
}

fn horse_seed(seed: u64, horse: HorseId) -> u64 {
    seed.wrapping_add(u64::from(horse) + 1)
}
