//! Inkless CLI tool
//!
//! Fingerprint, sign, anchor and verify documents from the command line.
//! Documents are only ever read locally; the relay sees fingerprints.

use clap::{Parser, Subcommand};
use inkless::{
    cancel::{self, Cancellation},
    config::ClientConfig,
    crypto::{negotiate, scheme_for},
    policy::{self, WarningLevel},
    AnchorClient, Fingerprint, FingerprintAlgorithm, FingerprintEngine, KeyPair, OfflineQueue,
    SchemePreference, SelectedDocument, SigningSession, SigningWorkflow, VerificationStatus,
    WebSocketRelay, WorkflowEvent,
};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Inkless: sign documents without sending them
#[derive(Parser)]
#[command(name = "inkless")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// State directory (default: ~/.inkless)
    #[arg(long, env = "INKLESS_HOME", global = true)]
    state_dir: Option<PathBuf>,

    /// Relay URL, overriding the config file
    #[arg(long, env = "INKLESS_RELAY_URL", global = true)]
    relay: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fingerprint of a file
    Fingerprint {
        /// File to fingerprint
        file: PathBuf,

        /// Digest algorithm (sha3-256, sha256, blake3)
        #[arg(short, long)]
        algorithm: Option<FingerprintAlgorithm>,
    },

    /// Generate a signing key
    Keygen {
        /// Where to write the key (default: <state dir>/signing.key)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Signature scheme preference (prefer-pq, require-pq, classical)
        #[arg(short, long)]
        scheme: Option<SchemePreference>,

        /// Overwrite an existing key
        #[arg(short, long)]
        force: bool,
    },

    /// Sign a document and anchor the signature
    Sign {
        /// Document to sign
        file: PathBuf,

        /// Document category (see `inkless categories`)
        #[arg(short, long, default_value = policy::DEFAULT_CATEGORY)]
        category: String,

        /// Signing key (default: <state dir>/signing.key, or a one-off key)
        #[arg(short, long)]
        key: Option<PathBuf>,

        /// Queue the signature instead of anchoring it now
        #[arg(long)]
        offline: bool,
    },

    /// Anchor every queued offline signature
    Sync,

    /// Check who has signed a document
    Verify {
        /// Document to check
        file: Option<PathBuf>,

        /// Check a hex fingerprint instead of a file
        #[arg(long, conflicts_with = "file")]
        fingerprint: Option<String>,
    },

    /// List recently anchored documents
    Recent {
        /// Maximum number of rows
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show relay counters
    Stats,

    /// Show the relay's audit trail for a document
    Audit {
        /// Document to look up
        file: Option<PathBuf>,

        /// Look up a hex fingerprint instead of a file
        #[arg(long, conflicts_with = "file")]
        fingerprint: Option<String>,
    },

    /// List document categories and their signing notices
    Categories,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load_or_default(cli.state_dir.as_deref()).unwrap_or_else(|e| fail(e));
    if let Some(url) = cli.relay {
        config.relay_url = url;
    }

    match cli.command {
        Commands::Fingerprint { file, algorithm } => {
            cmd_fingerprint(&file, algorithm.unwrap_or(config.fingerprint_algorithm))
        }
        Commands::Keygen { out, scheme, force } => cmd_keygen(&config, out, scheme, force),
        Commands::Sign {
            file,
            category,
            key,
            offline,
        } => cmd_sign(&config, &file, &category, key, offline).await,
        Commands::Sync => cmd_sync(&config).await,
        Commands::Verify { file, fingerprint } => {
            let fp = resolve_fingerprint(&config, file.as_deref(), fingerprint.as_deref());
            cmd_verify(&config, &fp).await
        }
        Commands::Recent { limit } => cmd_recent(&config, limit).await,
        Commands::Stats => cmd_stats(&config).await,
        Commands::Audit { file, fingerprint } => {
            let fp = resolve_fingerprint(&config, file.as_deref(), fingerprint.as_deref());
            cmd_audit(&config, &fp).await
        }
        Commands::Categories => cmd_categories(),
    }
}

fn fail(message: impl Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn state_path(path: inkless::Result<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|e| fail(e))
}

async fn connect(config: &ClientConfig) -> AnchorClient<WebSocketRelay> {
    let relay = WebSocketRelay::connect(&config.relay_url).await.unwrap_or_else(|e| {
        eprintln!("Error: could not reach relay at {}: {}", config.relay_url, e);
        eprintln!("Use 'inkless sign --offline' to sign now and sync later.");
        std::process::exit(1);
    });
    AnchorClient::new(relay).with_timeout(config.request_timeout())
}

/// Cancellation tripped by Ctrl-C
fn interruptible() -> Cancellation {
    let (handle, cancel) = cancel::cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });
    cancel
}

fn resolve_fingerprint(config: &ClientConfig, file: Option<&Path>, hex: Option<&str>) -> Fingerprint {
    match (file, hex) {
        (_, Some(hex)) => Fingerprint::from_hex(hex).unwrap_or_else(|e| fail(e)),
        (Some(file), None) => FingerprintEngine::new(config.fingerprint_algorithm)
            .fingerprint_file(file)
            .unwrap_or_else(|e| fail(e)),
        (None, None) => fail("give a file or --fingerprint"),
    }
}

fn load_key(path: &Path) -> KeyPair {
    let bytes = fs::read(path).unwrap_or_else(|_| {
        eprintln!("Error: No signing key found at {:?}", path);
        eprintln!("Run 'inkless keygen' to create one.");
        std::process::exit(1);
    });

    KeyPair::import_bytes(&bytes).unwrap_or_else(|e| {
        eprintln!("Error: Invalid key file: {}", e);
        std::process::exit(1);
    })
}

fn save_key(bytes: &[u8], path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap_or_else(|e| {
            eprintln!("Error creating directory: {}", e);
            std::process::exit(1);
        });
    }

    fs::write(path, bytes).unwrap_or_else(|e| {
        eprintln!("Error saving key: {}", e);
        std::process::exit(1);
    });
}

fn open_session(config: &ClientConfig, key: Option<PathBuf>) -> SigningSession {
    let default_key = state_path(config.key_path());
    let key = key.or_else(|| default_key.exists().then_some(default_key));

    match key {
        Some(path) => {
            let pair = load_key(&path);
            let scheme = scheme_for(pair.scheme()).unwrap_or_else(|| {
                fail(format!("{} keys are not supported by this build", pair.scheme().as_str()))
            });
            SigningSession::with_key_pair(scheme, pair).unwrap_or_else(|e| fail(e))
        }
        None => SigningSession::open(config.scheme_preference).unwrap_or_else(|e| fail(e)),
    }
}

fn cmd_fingerprint(file: &Path, algorithm: FingerprintAlgorithm) {
    let fp = FingerprintEngine::new(algorithm)
        .fingerprint_file(file)
        .unwrap_or_else(|e| fail(e));
    println!("{}", fp.to_hex());
}

fn cmd_keygen(config: &ClientConfig, out: Option<PathBuf>, scheme: Option<SchemePreference>, force: bool) {
    let path = out.unwrap_or_else(|| state_path(config.key_path()));
    if path.exists() && !force {
        eprintln!("Signing key already exists at {:?}", path);
        eprintln!("Use --force to overwrite.");
        std::process::exit(1);
    }

    let selection = negotiate(scheme.unwrap_or(config.scheme_preference));
    let scheme = selection.scheme().unwrap_or_else(|e| fail(e));
    let mut session = SigningSession::with_scheme(scheme);
    session.generate_key_pair().unwrap_or_else(|e| fail(e));
    let identity = session.identity().unwrap_or_else(|e| fail(e));
    let scheme_id = session.engine().scheme_id();
    let exported = session.export_key_pair().unwrap_or_else(|e| fail(e));
    save_key(&exported, &path);
    session.end();

    println!("Signing key created successfully!");
    println!();
    println!("Scheme:   {}", scheme_id.as_str());
    println!("Identity: {}", identity);
    println!();
    println!("Key saved to: {:?}", path);
    println!();
    println!("IMPORTANT: Back up your key file securely!");
}

async fn cmd_sign(config: &ClientConfig, file: &Path, category: &str, key: Option<PathBuf>, offline: bool) {
    if let Some(found) = policy::find(category) {
        if found.level != WarningLevel::Info {
            eprintln!("Notice: {}", found.notice);
        }
    }

    let mut session = open_session(config, key);
    let mut workflow = SigningWorkflow::new(FingerprintEngine::new(config.fingerprint_algorithm));
    workflow
        .handle(WorkflowEvent::ContentChosen(SelectedDocument::from_file(file, category)))
        .unwrap_or_else(|e| fail(e));
    let cancel = interruptible();

    if offline {
        let mut queue = OfflineQueue::open(state_path(config.queue_path())).unwrap_or_else(|e| fail(e));
        let outcome = workflow
            .sign_offline(&mut session, &mut queue, &cancel)
            .unwrap_or_else(|e| fail(e));
        println!("Signed offline.");
        println!("Fingerprint: {}", outcome.record.fingerprint.to_hex());
        println!("Signer:      {}", outcome.record.signer_identity);
        println!();
        println!("{} signature(s) queued. Run 'inkless sync' when online.", queue.len());
        session.end();
        return;
    }

    let client = connect(config).await;
    let outcome = match workflow.sign(&mut session, &client, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_retryable() {
                eprintln!("This may be temporary. Try again, or sign with --offline.");
            }
            std::process::exit(1);
        }
    };

    println!("Document signed.");
    println!("Fingerprint: {}", outcome.record.fingerprint.to_hex());
    println!("Signer:      {}", outcome.record.signer_identity);
    if let Some(anchor) = &outcome.anchor {
        println!("Ledger tx:   {}", anchor.ledger_tx_ref);
        println!("Status:      {}", anchor.status());
        println!("Anchored at: {}", anchor.anchored_at.to_rfc3339());
    }
    session.end();
}

async fn cmd_sync(config: &ClientConfig) {
    let mut queue = OfflineQueue::open(state_path(config.queue_path())).unwrap_or_else(|e| fail(e));
    if queue.is_empty() {
        println!("Nothing to sync.");
        return;
    }

    let client = connect(config).await;
    let report = queue.sync(&client).await.unwrap_or_else(|e| fail(e));

    for result in &report.results {
        match &result.error {
            Some(error) => println!("  {} {:?}: {}", result.fingerprint.short(), result.outcome, error),
            None => println!("  {} {:?}", result.fingerprint.short(), result.outcome),
        }
    }
    println!();
    println!(
        "Synced {}, already anchored {}, failed {}. {} still queued.",
        report.synced,
        report.already_exists,
        report.failed,
        queue.len()
    );
}

async fn cmd_verify(config: &ClientConfig, fingerprint: &Fingerprint) {
    let client = connect(config).await;
    let result = client
        .verify_cancellable(fingerprint, &interruptible())
        .await
        .unwrap_or_else(|e| fail(e));

    println!("Fingerprint: {}", result.fingerprint.to_hex());
    match result.status {
        VerificationStatus::NotFound => {
            println!("Not found: no signature for this document is on record.");
            std::process::exit(2);
        }
        VerificationStatus::Anchored => {
            println!("Anchored, {} signer(s):", result.signers.len());
            for signer in &result.signers {
                println!(
                    "  {}  {}  {}",
                    signer.identity,
                    signer.timestamp.to_rfc3339(),
                    signer.ledger_tx_ref
                );
            }
        }
    }
}

async fn cmd_recent(config: &ClientConfig, limit: usize) {
    let client = connect(config).await;
    let items = client.recent(limit).await.unwrap_or_else(|e| fail(e));
    if items.is_empty() {
        println!("No anchors yet.");
        return;
    }

    for item in items {
        println!(
            "{}  {:<9} {:<28} {:>10}  {}  {}",
            item.anchored_at.format("%Y-%m-%d %H:%M"),
            item.status.to_string(),
            item.file_name,
            item.file_size,
            item.category_label,
            item.signer_identity
        );
    }
}

async fn cmd_stats(config: &ClientConfig) {
    let client = connect(config).await;
    let stats = client.stats().await.unwrap_or_else(|e| fail(e));
    println!("Anchors:       {}", stats.total_anchors);
    println!("Documents:     {}", stats.documents);
    println!("Signers:       {}", stats.signers);
    println!("Verifications: {}", stats.verifications);
}

async fn cmd_audit(config: &ClientConfig, fingerprint: &Fingerprint) {
    let client = connect(config).await;
    let events = client.audit_trail(fingerprint).await.unwrap_or_else(|e| fail(e));
    if events.is_empty() {
        println!("No audit events for {}", fingerprint.short());
        return;
    }

    for event in events {
        let signer = event
            .signer_identity
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<9} {}  {}",
            event.at.to_rfc3339(),
            format!("{:?}", event.action).to_lowercase(),
            signer,
            event.detail
        );
    }
}

fn cmd_categories() {
    for category in policy::categories() {
        let marker = match category.level {
            WarningLevel::Info => " ",
            WarningLevel::Warning => "!",
            WarningLevel::Danger => "x",
        };
        println!("{} {:<22} {}", marker, category.id, category.label);
        if category.level != WarningLevel::Info {
            println!("    {}", category.notice);
        }
    }
    println!();
    println!("x = cannot be signed electronically, ! = extra requirements apply");
}
