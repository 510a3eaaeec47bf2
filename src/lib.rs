#![allow(clippy::too_many_arguments)]
use {
    anyhow::{Context, Error, anyhow, bail, ensure},
    async_trait::async_trait,
    bitcoin::{
        Address, Amount, BlockHash, CompactTarget, Network, ScriptBuf, Target, TxOut, Txid,
        address::NetworkUnchecked,
        block::{self, Header},
        consensus::{self, Encodable, encode::VarInt},
        hashes::{Hash, sha256d},
        script::write_scriptint,
    },
    byteorder::{BigEndian, ByteOrder, LittleEndian},
    clap::Parser,
    clock::Clock,
    coinbase::Coinbaser,
    connection::Connection,
    daemon::Daemon,
    dashmap::DashMap,
    derive_more::Display,
    events::{BlockEvent, Event, ShareEvent},
    futures::{SinkExt, stream::StreamExt},
    hex::FromHex,
    hub::Hub,
    job::{Job, JobNotice},
    lru::LruCache,
    parking_lot::Mutex,
    pow::{Algorithm, PowVerifier},
    primitive_types::U256,
    registry::{JobId, Outcome, TemplateRegistry},
    serde::{
        Deserialize, Serialize, Serializer,
        de::{self, Deserializer},
        ser::SerializeSeq,
    },
    serde_json::{Value, json},
    serde_with::{DeserializeFromStr, SerializeDisplay},
    settings::{RewardType, Settings},
    std::{
        collections::{BTreeMap, HashMap, HashSet, VecDeque},
        env,
        fmt::{self, Formatter},
        net::SocketAddr,
        num::NonZeroUsize,
        path::PathBuf,
        process,
        str::FromStr,
        sync::{
            Arc, LazyLock, OnceLock,
            atomic::{AtomicU32, AtomicU64, Ordering},
        },
        time::Duration,
    },
    stratum::{
        Authorize, Extranonce, Id, JsonRpcError, MerkleNode, Message, Nbits, Nonce, Notify, Ntime,
        PrevHash, SetDifficulty, StratumError, Submit, Subscribe, SubscribeResult, Version,
        WorkId, merkle_branches, merkle_root,
    },
    template::BlockTemplate,
    tokio::{
        net::{TcpListener, TcpStream},
        runtime::Runtime,
        signal::ctrl_c,
        sync::{mpsc, watch},
        task::{self, JoinSet},
        time::sleep,
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
    tracing_subscriber::EnvFilter,
    updater::BlockUpdater,
    vardiff::Vardiff,
    workers::{Worker, Workers},
    worklog::WorkLog,
    zmq::Zmq,
};

mod clock;
mod coinbase;
mod connection;
mod daemon;
mod events;
mod hub;
mod job;
mod pow;
mod registry;
mod server;
mod settings;
pub mod stratum;
mod template;
mod updater;
mod vardiff;
mod workers;
mod worklog;
mod zmq;

pub const COIN_VALUE: u64 = 100_000_000;

/// Server-assigned extranonce1 is always four bytes: one instance byte
/// plus a 24-bit allocation counter.
pub const EXTRANONCE1_SIZE: usize = 4;

/// Submitted ntime may run ahead of wall clock by at most two hours.
pub const MAX_NTIME_OFFSET: u64 = 7200;

/// Slack for miner-side target rounding when comparing share difficulty
/// against the difficulty a work unit was issued at.
pub const SHARE_EPSILON: f64 = 1.0 / 65536.0;

pub(crate) const MAX_MESSAGE_SIZE: usize = 8 * 1024;
pub(crate) const SUBSCRIPTION_ID: &str = "ae6812eb4cd7735a302a8a9dd95cf71f";
pub(crate) const TEMPLATE_HISTORY_SIZE: usize = 16;
pub(crate) const VARDIFF_WINDOW_SHARES: usize = 20;
pub(crate) const WORK_ID_WRAP: u32 = 0xffff;

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::parse();

    match run(settings) {
        Err(err) => {
            error!("error: {err}");

            if env::var_os("RUST_BACKTRACE")
                .map(|val| val == "1")
                .unwrap_or_default()
            {
                error!("{}", err.backtrace());
            }
            process::exit(1);
        }
        Ok(_) => {
            process::exit(0);
        }
    }
}

fn run(settings: Settings) -> Result {
    Runtime::new()?.block_on(serve(Arc::new(settings)))
}

async fn serve(settings: Arc<Settings>) -> Result {
    let clock = Clock::System;
    let daemon = Arc::new(Daemon::new(&settings));

    info!("Connecting to daemon RPC at {}", settings.daemon_url());

    let initial = wait_for_daemon(&daemon, &settings).await;

    let (job_tx, job_rx) = watch::channel(None);

    let mut registry = TemplateRegistry::new(&settings, clock.clone(), job_tx)?;
    registry.add_template(initial, false)?;

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let events = events::spawn_queue(&settings, cancel.clone(), &mut tasks).await?;

    let hub = Arc::new(Hub::new(
        settings.clone(),
        registry,
        clock,
        daemon,
        events,
        job_rx,
    ));

    tasks.spawn(BlockUpdater::new(hub.clone(), cancel.clone()).run());
    tasks.spawn(worklog::prune_loop(hub.clone(), cancel.clone()));

    {
        let hub = hub.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            if let Err(err) = server::run(hub, cancel).await {
                error!("stratum server error: {err}");
            }
        });
    }

    ctrl_c().await?;

    info!("Shutting down");
    cancel.cancel();

    while tasks.join_next().await.is_some() {}

    Ok(())
}

async fn wait_for_daemon(daemon: &Daemon, settings: &Settings) -> BlockTemplate {
    let mut backoff = 1;

    loop {
        match daemon.get_block_template(settings.chain).await {
            Ok(template) => {
                info!(
                    "Connected to daemon RPC, block template at height {}",
                    template.height
                );
                return template;
            }
            Err(err) => {
                warn!("Waiting for daemon RPC: {err}");
                sleep(Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(30);
            }
        }
    }
}
