use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parlance::config::{API_KEY_ENV, seconds};
use parlance::voice::{
    AudioCapture, AudioPlayback, PLAYBACK_SAMPLE_RATE, SAMPLE_RATE, match_emotion,
};
use parlance::{
    Config, ConversationLoop, CpalDevice, Error, GeminiChat, GeminiClient, GeminiSynthesizer,
    GeminiTranscriber, LoopOptions, Synthesizer, VoiceId,
};

/// Parlance - talk to Gemini and hear it talk back
#[derive(Parser)]
#[command(name = "parlance", version, about)]
struct Cli {
    /// Number of conversation turns
    #[arg(short, long, default_value = "1")]
    turns: u64,

    /// Keep talking until interrupted (Ctrl-C)
    #[arg(short, long, conflicts_with = "turns")]
    continuous: bool,

    /// Seconds of audio recorded per turn
    #[arg(short, long, env = "PARLANCE_RECORD_SECONDS")]
    duration: Option<f64>,

    /// Concurrent speech synthesis workers
    #[arg(short, long, env = "PARLANCE_TTS_WORKERS")]
    workers: Option<usize>,

    /// Starting voice (Kore, Charon, Fenrir, Aoede)
    #[arg(long, env = "PARLANCE_VOICE")]
    voice: Option<String>,

    /// Answer this text instead of recording the microphone
    #[arg(long)]
    text: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
        /// Voice to speak with
        #[arg(long, default_value = "Kore")]
        voice: String,
    },
    /// List available voices
    Voices,
    /// Show which emotion and voice a phrase would select
    Detect {
        /// Phrase to scan
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,parlance=info",
        1 => "info,parlance=debug",
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

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text, voice } => test_tts(&text, &voice).await,
            Command::Voices => {
                list_voices();
                Ok(())
            }
            Command::Detect { text } => {
                detect(&text);
                Ok(())
            }
        };
    }

    let mut config = load_config()?;
    if let Some(secs) = cli.duration {
        config.record_duration = seconds("--duration", secs)?;
    }
    if let Some(workers) = cli.workers {
        anyhow::ensure!(workers > 0, "--workers must be at least 1");
        config.workers = workers;
    }
    if let Some(name) = &cli.voice {
        config.voice = name.parse()?;
    }
    tracing::debug!(?config, "loaded configuration");

    let client = GeminiClient::with_base_url(config.api_key.clone(), config.base_url.clone())?;
    let generator = GeminiChat::new(client.clone(), config.chat_model.clone())
        .with_system_prompt(config.system_prompt.clone())
        .with_max_output_tokens(config.max_output_tokens);
    let transcriber = GeminiTranscriber::new(client.clone(), config.stt_model.clone());
    let synthesizer = GeminiSynthesizer::new(client, config.tts_model.clone());
    let device = CpalDevice::new()?;

    let mut conversation = ConversationLoop::new(
        Arc::new(generator),
        Arc::new(transcriber),
        Arc::new(synthesizer),
        Box::new(device),
        LoopOptions::from(&config),
    );

    tracing::info!(
        voice = %config.voice,
        workers = config.workers,
        record_ms = config.record_duration.as_millis(),
        "parlance ready"
    );

    if let Some(text) = cli.text {
        let result = tokio::select! {
            result = conversation.run_text_turn(&text) => result.map(Some),
            () = interrupted() => {
                println!("Stopping speech agent...");
                Ok(None)
            }
        };
        conversation.cleanup().await;
        result?;
        return Ok(());
    }

    let turns = (!cli.continuous).then_some(cli.turns);
    let summary = conversation
        .run(turns, interrupted())
        .await?;

    tracing::info!(
        turns = summary.turns,
        failed = summary.failed,
        interrupted = summary.interrupted,
        "conversation ended"
    );

    Ok(())
}

/// Resolves on Ctrl-C
async fn interrupted() {
    stop_when(tokio::signal::ctrl_c()).await;
}

/// Resolves when `signal` fires; never resolves if listening failed
async fn stop_when(signal: impl std::future::Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Load configuration, explaining how to provide a missing API key
fn load_config() -> anyhow::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(Error::Config(msg)) if msg.contains(API_KEY_ENV) => {
            eprintln!("Please set the {API_KEY_ENV} environment variable:");
            eprintln!("  export {API_KEY_ENV}='your-api-key'");
            eprintln!("or add api_key under [gemini] in ~/.config/parlance/config.toml");
            Err(Error::Config(msg).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Print a once-per-second level meter from the microphone
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    let mut capture = AudioCapture::new()?;
    println!("Listening for {duration}s at {SAMPLE_RATE} Hz, say something.");

    capture.start()?;
    let mut heard = false;
    for second in 1..=duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let level = Level::of(&capture.take_samples());
        heard |= level.rms > 0.01;
        println!("{second:>3}s  {level}");
    }
    capture.stop();

    if heard {
        println!("Microphone is picking up sound.");
    } else {
        println!("Only silence was captured. Check the default input source (pactl info, arecord -l).");
    }
    Ok(())
}

/// RMS and peak of one block of samples
struct Level {
    rms: f32,
    peak: f32,
}

impl Level {
    #[allow(clippy::cast_precision_loss)]
    fn of(samples: &[f32]) -> Self {
        if samples.is_empty() {
            return Self { rms: 0.0, peak: 0.0 };
        }
        let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        Self {
            rms: energy.sqrt(),
            peak,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const WIDTH: usize = 40;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let filled = ((self.rms * 80.0) as usize).min(WIDTH);
        write!(
            f,
            "rms {:.4}  peak {:.4}  |{}{}|",
            self.rms,
            self.peak,
            "#".repeat(filled),
            ".".repeat(WIDTH - filled)
        )
    }
}

/// Play a short two-note chime on the default output
fn test_speaker() -> anyhow::Result<()> {
    const NOTES: [f32; 2] = [523.25, 659.25];
    const NOTE_SECONDS: f32 = 0.75;

    let mut playback = AudioPlayback::new()?;

    #[allow(clippy::cast_precision_loss)]
    let rate = PLAYBACK_SAMPLE_RATE as f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let per_note = (rate * NOTE_SECONDS) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = NOTES
        .iter()
        .flat_map(|&freq| {
            (0..per_note).map(move |i| {
                let t = i as f32 / rate;
                let fade = 1.0 - i as f32 / per_note as f32;
                0.25 * fade * (std::f32::consts::TAU * freq * t).sin()
            })
        })
        .collect();

    println!("Playing a chime at {PLAYBACK_SAMPLE_RATE} Hz...");
    playback.play_samples(samples)?;
    println!("Done. No sound usually means the wrong default sink (pactl list sinks short).");

    Ok(())
}

/// Test TTS output via Gemini
async fn test_tts(text: &str, voice: &str) -> anyhow::Result<()> {
    let voice: VoiceId = voice.parse()?;
    println!("Testing TTS with voice {voice}: \"{text}\"\n");

    let config = load_config()?;
    let client = GeminiClient::with_base_url(config.api_key, config.base_url)?;
    let synthesizer = GeminiSynthesizer::new(client, config.tts_model);

    println!("Synthesizing speech...");
    let pcm = synthesizer.synthesize(text, voice).await?;
    anyhow::ensure!(!pcm.is_empty(), "synthesis returned no audio");
    println!("Got {} bytes of audio", pcm.len());

    let mut playback = AudioPlayback::new()?;
    println!("Playing audio...");
    playback.play_pcm16(&pcm)?;

    println!("\nTTS test complete!");
    Ok(())
}

fn list_voices() {
    for voice in VoiceId::ALL {
        let marker = if voice == VoiceId::default() { " (default)" } else { "" };
        println!("{voice}{marker}");
    }
}

fn detect(text: &str) {
    match match_emotion(text) {
        Some(emotion) => println!("Detected emotion: {emotion} - Using voice: {}", emotion.voice()),
        None => println!("No emotion detected - voice unchanged"),
    }
}
