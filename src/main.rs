//! Application entry point — Sahaay voice assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`Preferences`] from disk (returns default on first run).
//! 3. Build the HTTP intent responder and the speech output stack
//!    (remote TTS when a key is configured, rodio playback, platform
//!    speech fallback).
//! 4. Spawn the session (finalizer + scheduler tasks).
//! 5. Run the terminal loop — typed lines stand in for recognised
//!    speech, `/commands` control the session.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use sahaay_voice::{
    alert::EmergencyAlerter,
    capture::TypedCapture,
    config::Preferences,
    dispatch::HttpResponder,
    session::{spawn_session, SessionHandles},
    speech::{CommandSpeech, ElevenLabsClient, RodioSink, TtsBackend},
    turn::{ChatRole, SessionCommand},
    voices::{voices_in_category, VoiceCategory},
};

const HELP: &str = "\
Type anything to talk to the assistant.  Commands:
  /start        start listening
  /stop         stop the session
  /mute         toggle speech output
  /delay <n>    seconds to wait after speaking (1-10)
  /voice <id>   pick a remote voice (see /voices)
  /voices       list available remote voices
  /name <name>  set your name
  /emergency    notify your emergency contact
  /status       show the current phase
  /quit         exit";

// ---------------------------------------------------------------------------
// Transcript printer
// ---------------------------------------------------------------------------

/// Polls the shared session and prints chat messages as they appear.
/// Runs as its own task so replies show up while the loop waits on stdin.
async fn print_transcript(session: sahaay_voice::turn::SharedSession) {
    let mut printed = 0;
    let mut last_error: Option<String> = None;

    loop {
        {
            let state = session.lock().unwrap();
            while printed < state.chat.len() {
                let message = &state.chat[printed];
                match message.role {
                    ChatRole::User => println!("you: {}", message.text),
                    ChatRole::Assistant => println!("sahaay: {}", message.text),
                }
                printed += 1;
            }
            if state.error_message != last_error {
                if let Some(err) = &state.error_message {
                    eprintln!("error: {err}");
                }
                last_error = state.error_message.clone();
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Sahaay voice assistant starting up");

    // 2. Preferences
    let first_run = Preferences::is_first_run();
    let mut prefs = Preferences::load().unwrap_or_else(|e| {
        log::warn!("Failed to load preferences ({e}); using defaults");
        Preferences::default()
    });
    if first_run {
        if let Err(e) = prefs.save() {
            log::warn!("Could not write initial preferences: {e}");
        }
    }

    // 3. Responder + speech output stack
    let responder = Arc::new(HttpResponder::from_config(&prefs.responder));

    let remote_tts: Option<Arc<dyn TtsBackend>> = match ElevenLabsClient::from_config(&prefs.tts) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            if prefs.tts.use_remote {
                log::warn!("Remote TTS unavailable ({e}); using local speech");
            }
            None
        }
    };

    let alerter = EmergencyAlerter::from_config(&prefs.alert);

    // 4. Session
    let (capture_tx, capture_rx) = mpsc::channel(32);
    let capture = Arc::new(TypedCapture::new(capture_tx));

    let SessionHandles { commands, session } = spawn_session(
        prefs.clone(),
        Arc::clone(&capture) as Arc<dyn sahaay_voice::capture::CaptureSource>,
        capture_rx,
        responder,
        remote_tts,
        Arc::new(RodioSink::new()),
        Arc::new(CommandSpeech::platform_default()),
    );

    tokio::spawn(print_transcript(Arc::clone(&session)));

    // 5. Terminal loop
    println!("{HELP}\n");
    commands.send(SessionCommand::Start).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let mut parts = command.splitn(2, ' ');
            let verb = parts.next().unwrap_or_default();
            let arg = parts.next().map(str::trim).unwrap_or_default();

            match verb {
                "start" => commands.send(SessionCommand::Start).await?,
                "stop" => commands.send(SessionCommand::Stop).await?,
                "mute" => {
                    let muted = prefs.toggle_mute();
                    commands.send(SessionCommand::ToggleMute).await?;
                    prefs.save()?;
                    println!("output {}", if muted { "muted" } else { "unmuted" });
                }
                "delay" => match arg.parse::<u64>() {
                    Ok(secs) => {
                        prefs.set_cooldown_secs(secs);
                        commands
                            .send(SessionCommand::SetCooldown(prefs.cooldown_secs))
                            .await?;
                        prefs.save()?;
                        println!("cooldown set to {}s", prefs.cooldown_secs);
                    }
                    Err(_) => println!("usage: /delay <seconds>"),
                },
                "voice" => {
                    if sahaay_voice::voices::find_voice_by_id(arg).is_some() {
                        prefs.select_voice(arg);
                        prefs.save()?;
                        println!("voice set; takes effect on next start");
                    } else {
                        println!("unknown voice id, see /voices");
                    }
                }
                "voices" => {
                    for (heading, category) in [
                        ("standard", VoiceCategory::Default),
                        ("celebrity", VoiceCategory::Celebrity),
                    ] {
                        println!("{heading}:");
                        for voice in voices_in_category(category) {
                            println!(
                                "  {:<22} {:<10} {}",
                                voice.id, voice.name, voice.description
                            );
                        }
                    }
                }
                "name" => {
                    if arg.is_empty() {
                        println!("usage: /name <name>");
                    } else {
                        prefs.user_name = Some(arg.to_string());
                        prefs.save()?;
                        println!("hello, {arg}! takes effect on next start");
                    }
                }
                "emergency" => {
                    if !alerter.is_configured() {
                        println!(
                            "no emergency contact configured; set alert.endpoint in settings.toml"
                        );
                    } else {
                        match alerter.trigger().await {
                            Ok(confirmation) => println!("sahaay: {confirmation}"),
                            Err(e) => eprintln!("error: {e}"),
                        }
                    }
                }
                "status" => {
                    println!("{}", session.lock().unwrap().phase.label());
                }
                "quit" | "exit" => break,
                "help" => println!("{HELP}"),
                _ => println!("unknown command, try /help"),
            }
            continue;
        }

        capture.feed(line).await;
    }

    drop(commands);
    log::info!("Sahaay shutting down");
    Ok(())
}
