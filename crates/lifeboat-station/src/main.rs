//! lifeboat-station — the resilience station daemon.
//!
//! Startup sequence:
//!   1. Open (or initialize) the station's sled database
//!   2. Provision a keypair if this is a fresh station
//!   3. Wire the library crates together: event store, envelope verifier,
//!      session manager, OTA scheduler
//!   4. Run background tasks: OTA tick loop, pairing-code sweep,
//!      replay-protector sweep
//!
//! Invoked with no subcommand, the binary runs that daemon. Invoked with
//! `send`, `restore`, or `pair`, it performs that one operation against the
//! same on-disk station and exits — the offline transfer and mobile-pairing
//! paths an operator drives by hand between daemon runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use semver::Version;
use tracing::{error, info, warn};

use lifeboat_core::{ActorContext, DataType, EntityType, Event, EventDraft};
use lifeboat_crypto::{KeyManager, TrustedKeysRegistry};
use lifeboat_envelope::{EnvelopeBuilder, EnvelopeVerifier, ReplayProtector};
use lifeboat_hlc::HybridLogicalClock;
use lifeboat_ota::{OtaScheduler, SkipList, VersionStore};
use lifeboat_session::SessionManager;
use lifeboat_store::{EventStore, RestorePipeline, SystemConfigStore};

mod probes;

use probes::{
    Ed25519PackageVerifier, HttpUpdateServer, LoadAverageProbe, MonotonicClockGate,
    SledActiveCaseGuard, StationHealthProbe, SystemdRestarter,
};

#[derive(Parser, Debug)]
#[command(
    name = "lifeboat-station",
    version,
    about = "Lifeboat resilience station — offline-first inventory and anesthesia core"
)]
struct Args {
    /// Directory for the station's persistent data (database, keys, OTA versions).
    #[arg(long, default_value = "~/.lifeboat/data", global = true)]
    data_dir: PathBuf,

    /// Station identifier used when provisioning a fresh keypair.
    #[arg(long)]
    station_id: Option<String>,

    /// OTA update channel to track.
    #[arg(long, default_value = "stable")]
    ota_channel: String,

    /// Base URL of the fleet update server.
    #[arg(long, default_value = "https://updates.lifeboat.example")]
    ota_server: String,

    /// Seconds between OTA scheduler ticks.
    #[arg(long, default_value_t = lifeboat_core::constants::OTA_POLL_INTERVAL_SECS)]
    ota_interval_secs: u64,

    /// Seconds between pairing-code and replay-record sweeps.
    #[arg(long, default_value_t = 300)]
    sweep_interval_secs: u64,

    /// Base64url-encoded Ed25519 public key the update server signs releases with.
    #[arg(long)]
    ota_trusted_key: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a secure envelope for `recipient_id` from a JSON payload file
    /// and write it to `out_file` — a `.xirs` file ready for offline
    /// transport (USB stick, local network, satellite uplink).
    Send {
        recipient_id: String,
        payload_file: PathBuf,
        out_file: PathBuf,
        #[arg(long, default_value = "event_log")]
        data_type: String,
    },
    /// Verify, decrypt, and ingest the events carried in a `.xirs` envelope
    /// file produced by `send` (or by a peer station's C4 send path).
    Restore {
        envelope_file: PathBuf,
        #[arg(long, default_value = "offline-transfer")]
        source_device_id: String,
    },
    /// Issue a mobile pairing code using the fleet default role/scope grant.
    Pair {
        created_by: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lifeboat=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    // ── Data directory & database ────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let db = sled::open(data_dir.join("station.db")).context("opening station database")?;

    let config_store = Arc::new(SystemConfigStore::open(&db).context("opening system config")?);
    let config = config_store.get_or_init().context("loading system config")?;

    // ── Keys ──────────────────────────────────────────────────────────────────
    let key_manager = KeyManager::new(data_dir.join("keys"));
    if !key_manager.keys_exist() {
        info!("no keypair found — provisioning a fresh station identity");
        let generated = key_manager
            .generate_keys(args.station_id.as_deref().unwrap_or(&config.server_uuid))
            .context("generating station keys")?;
        info!(fingerprint = %generated.fingerprint, "station keys provisioned");
    }
    let keypair = Arc::new(key_manager.load_keypair().context("loading station keypair")?);

    let trusted_keys_path = data_dir.join("trusted_keys.json");
    let event_store = Arc::new(EventStore::open_in(&db).context("opening event store")?);

    if let Some(command) = args.command {
        return run_command(command, &config, &key_manager, &keypair, &trusted_keys_path, &db, &event_store).await;
    }

    info!(server_uuid = %config.server_uuid, "station starting as daemon");
    info!(fingerprint = %keypair.fingerprint(), "station identity");
    info!(events = event_store.len(), "event store ready");

    // ── Core stores ───────────────────────────────────────────────────────────
    let session_manager = Arc::new(SessionManager::open(&db).context("opening session manager")?);
    let replay_protector = Arc::new(ReplayProtector::open(&db).context("opening replay protector")?);

    // ── OTA scheduler ─────────────────────────────────────────────────────────
    let ota_dir = data_dir.join("ota");
    std::fs::create_dir_all(&ota_dir).context("creating OTA directory")?;
    let versions = VersionStore::new(ota_dir.join("versions"));
    let skip_list = SkipList::open(&db).context("opening OTA skip list")?;
    let current_version = versions
        .current_version()
        .and_then(|v| Version::parse(&v).ok())
        .unwrap_or_else(|| Version::new(0, 1, 0));

    let trusted_key = match &args.ota_trusted_key {
        Some(encoded) => {
            let bytes = base64_decode(encoded).context("decoding --ota-trusted-key")?;
            lifeboat_crypto::verify_key_from_bytes(&bytes).context("parsing --ota-trusted-key")?
        }
        None => {
            warn!("no --ota-trusted-key given, trusting this station's own signing key (dev only)");
            keypair.verifying_key()
        }
    };

    let clock = Arc::new(HybridLogicalClock::new(config.server_uuid.clone()));

    let mut scheduler = OtaScheduler::new(
        args.ota_channel.clone(),
        current_version,
        versions,
        skip_list,
        Arc::new(HttpUpdateServer::new(args.ota_server.clone())),
        Arc::new(SledActiveCaseGuard::new(Arc::clone(&event_store))),
        Arc::new(LoadAverageProbe::new(4.0)),
        Arc::new(MonotonicClockGate::new(Arc::clone(&config_store), config.server_uuid.clone())),
        Arc::new(Ed25519PackageVerifier::new(trusted_key)),
        Arc::new(StationHealthProbe::new(
            db.clone(),
            Arc::clone(&event_store),
            trusted_keys_path.clone(),
            Arc::clone(&clock),
        )),
        Arc::new(SystemdRestarter::new("lifeboat-station")),
    );

    // ── Background tasks ──────────────────────────────────────────────────────
    let ota_interval = Duration::from_secs(args.ota_interval_secs);
    let ota_event_store = Arc::clone(&event_store);
    let ota_clock = Arc::clone(&clock);
    let ota_station_id = config.server_uuid.clone();
    let ota_config_store = Arc::clone(&config_store);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(ota_interval);
        loop {
            tick.tick().await;
            let outcome_json = match scheduler.tick().await {
                Ok(outcome) => {
                    info!(?outcome, "OTA tick completed");
                    serde_json::json!({"outcome": format!("{outcome:?}")})
                }
                Err(e) => {
                    warn!(error = %e, "OTA tick did not apply an update");
                    serde_json::json!({"error": e.to_string()})
                }
            };
            record_audit_event(
                &ota_event_store,
                &ota_clock,
                &ota_station_id,
                "ota_tick",
                outcome_json,
            );
            if let Err(e) = ota_config_store.update_last_seen(chrono::Utc::now().timestamp_millis()) {
                warn!(error = %e, "failed to record last-seen wall clock");
            }
        }
    });

    let sweep_interval = Duration::from_secs(args.sweep_interval_secs);
    let sweep_sessions = Arc::clone(&session_manager);
    let sweep_replay = Arc::clone(&replay_protector);
    let sweep_config_store = Arc::clone(&config_store);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(sweep_interval);
        loop {
            tick.tick().await;
            let now_ms = chrono::Utc::now().timestamp_millis();
            match sweep_sessions.cleanup_expired_codes(now_ms) {
                Ok(n) if n > 0 => info!(removed = n, "swept expired pairing codes"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "pairing code sweep failed"),
            }
            match sweep_replay.cleanup_old_entries(now_ms, lifeboat_core::constants::REPLAY_RECORD_RETENTION_DAYS) {
                Ok(n) if n > 0 => info!(removed = n, "swept stale replay-protection records"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "replay-protector sweep failed"),
            }
            if let Err(e) = sweep_config_store.update_last_seen(now_ms) {
                warn!(error = %e, "failed to record last-seen wall clock during sweep");
            }
        }
    });

    info!("lifeboat station ready");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received, stopping");
    Ok(())
}

/// Run one of the one-shot CLI commands (`send`, `restore`, `pair`) against
/// the already-opened station database, then exit — these share the
/// daemon's on-disk state but don't start any background task.
async fn run_command(
    command: Command,
    config: &lifeboat_store::SystemConfig,
    key_manager: &KeyManager,
    keypair: &lifeboat_crypto::StationKeypair,
    trusted_keys_path: &Path,
    db: &sled::Db,
    event_store: &Arc<EventStore>,
) -> anyhow::Result<()> {
    let trusted = TrustedKeysRegistry::load_or_empty(trusted_keys_path).context("loading trusted-keys registry")?;

    match command {
        Command::Send { recipient_id, payload_file, out_file, data_type } => {
            let data_type = parse_data_type(&data_type)?;
            let payload_bytes = std::fs::read(&payload_file)
                .with_context(|| format!("reading {}", payload_file.display()))?;
            let payload: serde_json::Value =
                serde_json::from_slice(&payload_bytes).context("parsing payload file as JSON")?;

            let builder = EnvelopeBuilder::new(config.server_uuid.clone(), keypair, &trusted);
            let envelope = builder
                .build(payload, &recipient_id, data_type, chrono::Utc::now().timestamp())
                .context("building secure envelope")?;

            let bytes = serde_json::to_vec_pretty(&envelope).context("serializing envelope")?;
            std::fs::write(&out_file, bytes).with_context(|| format!("writing {}", out_file.display()))?;
            info!(envelope_id = %envelope.envelope_id, out_file = %out_file.display(), "envelope written");
        }
        Command::Restore { envelope_file, source_device_id } => {
            let bytes = std::fs::read(&envelope_file)
                .with_context(|| format!("reading {}", envelope_file.display()))?;
            let envelope: lifeboat_envelope::SecureEnvelope =
                serde_json::from_slice(&bytes).context("parsing envelope file")?;

            let replay = ReplayProtector::open(db).context("opening replay protector")?;
            let verifier = EnvelopeVerifier::new(config.server_uuid.clone(), key_manager, &trusted, &replay);
            let now_secs = chrono::Utc::now().timestamp();
            let decrypted = verifier
                .verify_and_decrypt(&envelope, false, now_secs)
                .context("verifying and decrypting envelope")?;

            let events: Vec<Event> =
                serde_json::from_value(decrypted.data).context("envelope payload is not an event batch")?;
            let pipeline = RestorePipeline::open(db, event_store).context("opening restore pipeline")?;
            let session = pipeline
                .start_session(&source_device_id, now_secs * 1000)
                .context("starting restore session")?;
            let entry = pipeline
                .restore_batch(&session.session_id, events, true, now_secs * 1000)
                .context("restoring event batch")?;
            info!(
                inserted = entry.inserted,
                already_present = entry.already_present,
                rejected = entry.rejected,
                "restore batch applied"
            );
        }
        Command::Pair { created_by } => {
            let session_manager = SessionManager::open(db).context("opening session manager")?;
            let now_ms = chrono::Utc::now().timestamp_millis();
            let pairing = session_manager
                .generate_pairing_code_with_defaults(&config.server_uuid, &created_by, now_ms)
                .context("generating pairing code")?;
            println!("{}", pairing.code);
        }
    }
    Ok(())
}

fn parse_data_type(s: &str) -> anyhow::Result<DataType> {
    match s {
        "inventory_transfer" => Ok(DataType::InventoryTransfer),
        "person_transfer" => Ok(DataType::PersonTransfer),
        "event_log" => Ok(DataType::EventLog),
        "full_backup" => Ok(DataType::FullBackup),
        "partial_sync" => Ok(DataType::PartialSync),
        "command" => Ok(DataType::Command),
        other => anyhow::bail!("unknown data type {other:?}"),
    }
}

/// Append a locally originated audit event (e.g. an OTA tick outcome) to the
/// event store, stamped by the station's own clock. Logged and otherwise
/// swallowed on failure — a missed audit row must never take the background
/// task down with it.
fn record_audit_event(
    event_store: &EventStore,
    clock: &HybridLogicalClock,
    station_id: &str,
    event_type: &str,
    payload: serde_json::Value,
) {
    let draft = EventDraft::new(
        EntityType::Other("station".into()),
        station_id,
        ActorContext {
            actor_id: "station".into(),
            actor_name: None,
            actor_role: None,
            device_id: None,
        },
        chrono::Utc::now().timestamp_millis(),
        event_type,
        payload,
    );
    if let Err(e) = event_store.append(draft, clock, None) {
        error!(error = %e, event_type, "failed to record audit event");
    }
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

fn base64_decode(s: &str) -> anyhow::Result<Vec<u8>> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD
        .decode(s.trim())
        .map_err(|e| anyhow::anyhow!("invalid base64url: {e}"))
}
