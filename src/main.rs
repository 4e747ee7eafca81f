use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use edgevoice::client::{AudioStreamer, NavigationListener, attach_listener, attach_streamer, speak_once};
use edgevoice::config::{
    self, CaptureConfig, Config, ExtractorKind, ListenConfig, PlaybackConfig, Player,
    SpeechConfig,
};
use edgevoice::connection::{ConnectionManager, tls};
use edgevoice::dump::{self, DumpServer};
use edgevoice::protocol::{asr_stream_url, socketio_url};
use edgevoice::voice::{CommandAudioIo, HttpSpeechFetcher};
use edgevoice::{ClientIdentity, FrameJournal};

/// Edgevoice - resilient speech streaming client for edge devices
#[derive(Parser)]
#[command(name = "edgevoice", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Accept invalid TLS certificates (for TLS inspection proxies)
    #[arg(
        long,
        global = true,
        env = "EDGEVOICE_INSECURE_TLS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    insecure_tls: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record clips and stream them to the ASR service
    Stream {
        /// ASR server base URL
        #[arg(long, env = "WS_URL", default_value = config::DEFAULT_STREAM_URL)]
        url: String,

        /// ALSA capture device
        #[arg(long, env = "ARECORD_DEVICE", default_value = "hw:5,0")]
        device: String,

        /// Capture sample format
        #[arg(long, env = "ARECORD_FORMAT", default_value = "S16_LE")]
        format: String,

        /// Capture sample rate in Hz
        #[arg(long, env = "ARECORD_RATE", default_value = "16000")]
        rate: u32,

        /// Clip length in seconds
        #[arg(long, default_value = "2")]
        clip_secs: u64,

        /// Directory for recorded clips
        #[arg(long, env = "EDGEVOICE_SPOOL_DIR", default_value = ".")]
        spool_dir: PathBuf,

        /// Fixed client identifier (random when omitted)
        #[arg(long, env = "EDGEVOICE_CLIENT_ID")]
        client_id: Option<String>,

        /// Extra handshake header, `Name: value` (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,
    },
    /// Listen for navigation events and speak them
    Listen {
        /// Event server base URL
        #[arg(long, env = "WS_URL", default_value = config::DEFAULT_LISTEN_URL)]
        url: String,

        /// Device identifier sent when joining the namespace
        #[arg(long, env = "EDGEVOICE_DEVICE_ID", default_value = config::DEFAULT_DEVICE_ID)]
        device_id: String,

        /// Socket.IO namespace
        #[arg(long, default_value = config::DEFAULT_NAMESPACE)]
        namespace: String,

        /// Navigation event extraction strategy (marker, json)
        #[arg(long, default_value = "marker")]
        extractor: ExtractorKind,

        /// Directory for the frame journal (disabled when omitted)
        #[arg(long, env = "EDGEVOICE_JOURNAL_DIR")]
        journal_dir: Option<PathBuf>,

        /// Extra handshake header, `Name: value` (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,

        #[command(flatten)]
        speech: SpeechArgs,
    },
    /// Write every received binary frame to a timestamped file
    DumpServer {
        /// Port to listen on
        #[arg(short, long, default_value_t = dump::DEFAULT_PORT)]
        port: u16,

        /// Output directory
        #[arg(short, long, default_value = dump::DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
    },
    /// Fetch speech for a text and play it once
    Speak {
        /// Text to speak
        text: String,

        #[command(flatten)]
        speech: SpeechArgs,
    },
}

/// Speech fetch and playback options
#[derive(Args)]
struct SpeechArgs {
    /// Speech synthesis endpoint
    #[arg(long, env = "TTS_URL", default_value = config::DEFAULT_TTS_URL)]
    tts_url: String,

    /// Playback utility (aplay, paplay)
    #[arg(long, env = "EDGEVOICE_PLAYER", default_value = "aplay")]
    player: Player,

    /// ALSA playback device (aplay only)
    #[arg(long, env = "APLAY_DEVICE", default_value = "plughw:6,0")]
    playback_device: String,
}

impl SpeechArgs {
    fn apply(self, config: &mut Config, insecure_tls: bool) {
        config.speech = SpeechConfig {
            url: self.tts_url,
            accept_invalid_certs: insecure_tls,
            ..SpeechConfig::default()
        };
        config.playback = PlaybackConfig {
            player: self.player,
            device: self.playback_device,
            ..PlaybackConfig::default()
        };
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,edgevoice=info",
        1 => "info,edgevoice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Cancel the returned token on Ctrl-C
fn shutdown_on_ctrl_c() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown requested"),
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
        }
        trigger.cancel();
    });
    shutdown
}

fn parse_headers(raw: &[String]) -> edgevoice::Result<Vec<(String, String)>> {
    raw.iter().map(|h| config::parse_header(h)).collect()
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let insecure_tls = cli.insecure_tls;
    let mut config = Config::default();
    config.connection.accept_invalid_certs = insecure_tls;

    match cli.command {
        Command::Stream {
            url,
            device,
            format,
            rate,
            clip_secs,
            spool_dir,
            client_id,
            headers,
        } => {
            tls::warn_if_insecure(insecure_tls);
            config.capture = CaptureConfig {
                device,
                format,
                sample_rate: rate,
                clip_duration: std::time::Duration::from_secs(clip_secs),
                timeout: std::time::Duration::from_secs(clip_secs + 8),
                spool_dir,
                ..CaptureConfig::default()
            };
            config.connection.headers = parse_headers(&headers)?;
            config.connection.url = url;
            stream(config, client_id.as_deref()).await
        }
        Command::Listen {
            url,
            device_id,
            namespace,
            extractor,
            journal_dir,
            headers,
            speech,
        } => {
            tls::warn_if_insecure(insecure_tls);
            speech.apply(&mut config, insecure_tls);
            config.listen = ListenConfig {
                namespace,
                device_id,
                journal_dir,
                extractor,
                ..ListenConfig::default()
            };
            config.connection.headers = vec![
                ("ngrok-skip-browser-warning".to_string(), "true".to_string()),
                (
                    "User-Agent".to_string(),
                    format!("edgevoice/{}", env!("CARGO_PKG_VERSION")),
                ),
            ];
            config.connection.headers.extend(parse_headers(&headers)?);
            config.connection.url = url;
            listen(config).await
        }
        Command::DumpServer { port, output_dir } => {
            DumpServer::new(port, output_dir)
                .run(shutdown_on_ctrl_c())
                .await?;
            Ok(())
        }
        Command::Speak { text, speech } => {
            tls::warn_if_insecure(insecure_tls);
            speech.apply(&mut config, insecure_tls);
            speak(&config, &text).await
        }
    }
}

#[allow(clippy::future_not_send)]
async fn stream(config: Config, client_id: Option<&str>) -> anyhow::Result<()> {
    let identity = match client_id {
        Some(id) => ClientIdentity::fixed(id)?,
        None => ClientIdentity::generate(),
    };

    let manager = ConnectionManager::new(&config.connection);
    attach_streamer(&manager, &config.capture)?;

    let url = asr_stream_url(&config.connection.url, &identity);
    let audio = CommandAudioIo::new(config.capture.clone(), config.playback.clone());
    let mut streamer = AudioStreamer::new(
        manager,
        audio,
        identity,
        url,
        &config.capture,
        &config.connection,
    );

    streamer.run(&shutdown_on_ctrl_c()).await;
    Ok(())
}

#[allow(clippy::future_not_send)]
async fn listen(config: Config) -> anyhow::Result<()> {
    let identity = ClientIdentity::fixed(&config.listen.device_id)?;
    let journal = config
        .listen
        .journal_dir
        .as_deref()
        .map(FrameJournal::create)
        .transpose()?
        .map(Arc::new);

    let manager = ConnectionManager::new(&config.connection);
    let events = attach_listener(&manager, &config.listen, &identity, journal.clone());

    let fetcher = HttpSpeechFetcher::new(&config.speech)?;
    let audio = CommandAudioIo::new(config.capture.clone(), config.playback.clone());
    let mut listener = NavigationListener::new(
        manager,
        socketio_url(&config.connection.url),
        events,
        fetcher,
        audio,
        &config.connection,
    )
    .with_journal(journal);

    listener.run(&shutdown_on_ctrl_c()).await;
    Ok(())
}

#[allow(clippy::future_not_send)]
async fn speak(config: &Config, text: &str) -> anyhow::Result<()> {
    let fetcher = HttpSpeechFetcher::new(&config.speech)?;
    let audio = CommandAudioIo::new(config.capture.clone(), config.playback.clone());

    speak_once(&fetcher, &audio, text, &shutdown_on_ctrl_c()).await?;
    println!("Spoke: {text}");
    Ok(())
}
