use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
};

use clap::{Parser, Subcommand, arg};
use log::{info, warn};

use liftright::{
    LiftRightError,
    config::EngineConfig,
    exercise::Exercise,
    landmarks::LandmarkFrame,
    scoring::ModelBundle,
    session::{FrameUpdate, SessionIdentity, SessionRegistry, SessionState},
    writer,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a recorded JSON-lines landmark file through a session
    Replay {
        #[arg(short, long)]
        exercise: Exercise,

        /// Trained model bundle (JSON)
        #[arg(short, long)]
        model: PathBuf,

        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the session summary, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Optional JSON-lines log with one line per counted rep
        #[arg(long)]
        rep_log: Option<PathBuf>,

        /// Engine config file, defaults to the user config directory
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        user_id: Option<String>,

        #[arg(long)]
        log_id: Option<String>,
    },
    /// Print the effective engine config
    Config {
        /// Write the config to the user config directory
        #[arg(long)]
        save: bool,
    },
}

struct ReplayArgs {
    exercise: Exercise,
    model: PathBuf,
    input: PathBuf,
    output: Option<PathBuf>,
    rep_log: Option<PathBuf>,
    config: Option<PathBuf>,
    identity: SessionIdentity,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, LiftRightError> {
    match path {
        Some(path) => EngineConfig::from_path(path),
        None => Ok(EngineConfig::from_local_file()?.unwrap_or_default()),
    }
}

fn replay(args: ReplayArgs, running: Arc<AtomicBool>) -> Result<(), LiftRightError> {
    if !args.input.exists() {
        return Err(LiftRightError::InvalidFrameFile {
            path: format!("{:?}", args.input),
        });
    }

    let registry = SessionRegistry::new(load_config(args.config.as_deref())?);
    let model = ModelBundle::from_file(&args.model)?;
    registry.register_model(args.exercise, Arc::new(model));
    let token = registry.start(args.exercise, args.identity)?;

    // rep log lines are written on their own thread so slow disks never hold up frames
    let (rep_tx, rep_writer) = match args.rep_log {
        Some(rep_log) => {
            let (tx, rx) = mpsc::channel::<FrameUpdate>();
            let handle = thread::spawn(move || writer::write_rep_log(&rep_log, rx));
            (Some(tx), Some(handle))
        }
        None => (None, None),
    };

    let frames = serde_jsonlines::json_lines::<LandmarkFrame, _>(&args.input)
        .map_err(|e| LiftRightError::FrameLoaderError { source: e })?;
    for frame in frames {
        if !running.load(Ordering::SeqCst) {
            warn!("Interrupted, finishing session {token}");
            break;
        }
        let frame = frame.map_err(|e| LiftRightError::FrameLoaderError { source: e })?;
        let update = registry.update(token, &frame)?;

        if let Some(rep) = &update.latest_rep {
            println!(
                "{}",
                update
                    .last_rep_text
                    .as_deref()
                    .unwrap_or(&format!("Rep {}", rep.rep_index))
            );
        }
        let stopped = update.state == SessionState::Stopped;
        if let Some(tx) = &rep_tx {
            tx.send(update)?;
        }
        if stopped {
            break;
        }
    }

    let summary = registry.finish(token)?;
    drop(rep_tx);
    if let Some(handle) = rep_writer {
        match handle.join() {
            Ok(result) => {
                result?;
            }
            Err(_) => warn!("Rep log writer thread panicked"),
        }
    }

    info!(
        "{} reps, {} bad, {} warning, fatigue stop: {}",
        summary.reps_total, summary.reps_bad, summary.reps_warn, summary.fatigue_flag
    );
    match args.output {
        Some(output) => writer::write_summary(&output, &summary),
        None => {
            let json = serde_json::to_string_pretty(&summary)
                .map_err(|e| LiftRightError::WriterError { source: e.into() })?;
            println!("{json}");
            Ok(())
        }
    }
}

fn show_config(save: bool) -> Result<(), LiftRightError> {
    let config = load_config(None)?;
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| LiftRightError::ConfigSerializeError { source: e })?;
    println!("{json}");
    if save {
        let path = config.save()?;
        println!("Saved config to {}", path.display());
    }
    Ok(())
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        println!("Finishing session...");
        handler_flag.store(false, Ordering::SeqCst);
    })
    .expect("Could not set Ctrl-C handler");

    let result = match cli.command {
        Commands::Replay {
            exercise,
            model,
            input,
            output,
            rep_log,
            config,
            user_id,
            log_id,
        } => replay(
            ReplayArgs {
                exercise,
                model,
                input,
                output,
                rep_log,
                config,
                identity: SessionIdentity { user_id, log_id },
            },
            running,
        ),
        Commands::Config { save } => show_config(save),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
