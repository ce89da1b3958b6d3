use std::fs;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};

use replaycam_core::replay::config::RawConfig;
use replaycam_core::replay::registry::{self, ModelRegistry};
use replaycam_core::replay::replay_source::ReplaySource;

/// Poll a replay camera and dump its frames as JPEG files.
#[derive(Parser)]
#[command(name = "replaycam")]
struct Cli {
    #[command(subcommand)]
    mode: ModeArgs,

    /// How many frames to poll before exiting.
    #[arg(long, default_value = "10")]
    frames: usize,

    /// Delay between polls in milliseconds.
    #[arg(long, default_value = "500")]
    poll_ms: u64,

    /// Directory to write frame_NNN.jpg files into. Frames are only
    /// logged when this is omitted.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ModeArgs {
    /// Replay a local video file.
    Local {
        /// Video file to open.
        video: PathBuf,

        /// Override the detected frame rate.
        #[arg(long)]
        fps: Option<f64>,

        /// Freeze on the last frame instead of looping.
        #[arg(long)]
        no_loop: bool,
    },
    /// Replay images from a remote dataset. Credentials fall back to the
    /// REPLAY_API_KEY / REPLAY_API_KEY_ID / REPLAY_ORG_ID env vars.
    Dataset {
        #[arg(long)]
        dataset_id: String,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        api_key_id: Option<String>,

        #[arg(long)]
        organization_id: Option<String>,

        /// Replay rate (default 30).
        #[arg(long)]
        fps: Option<f64>,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = to_raw_config(&cli.mode)?;

    let mut registry = ModelRegistry::new();
    registry::register_video_replay(&mut registry);
    let mut camera = registry
        .construct(registry::VIDEO_REPLAY_MODEL, &config)
        .expect("video-replay model registered above")?;

    let props = camera.properties()?;
    log::info!(
        "camera ready: mode={}, intrinsics={}x{}, encodings={:?}",
        camera.mode().name(),
        props.intrinsic_width,
        props.intrinsic_height,
        props.mime_types
    );

    if let Some(dir) = &cli.out_dir {
        fs::create_dir_all(dir)?;
    }

    poll_frames(&camera, cli.frames, cli.poll_ms, cli.out_dir.as_deref())?;

    camera.close();
    Ok(())
}

fn poll_frames(
    camera: &ReplaySource,
    frames: usize,
    poll_ms: u64,
    out_dir: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    for i in 0..frames {
        let frame = camera.latest()?;
        log::info!(
            "frame {i}: {}x{} captured at {:?}",
            frame.width(),
            frame.height(),
            frame.timestamp()
        );

        if let Some(dir) = out_dir {
            let bytes = camera.latest_jpeg()?;
            let path = dir.join(format!("frame_{i:03}.jpg"));
            fs::write(&path, &bytes)?;
            log::info!("wrote {} ({} bytes)", path.display(), bytes.len());
        }

        thread::sleep(Duration::from_millis(poll_ms));
    }
    Ok(())
}

fn to_raw_config(mode: &ModeArgs) -> Result<RawConfig, Box<dyn std::error::Error>> {
    match mode {
        ModeArgs::Local { video, fps, no_loop } => Ok(RawConfig {
            video_path: Some(video.display().to_string()),
            fps: *fps,
            loop_video: Some(!no_loop),
            ..Default::default()
        }),
        ModeArgs::Dataset {
            dataset_id,
            api_key,
            api_key_id,
            organization_id,
            fps,
        } => Ok(RawConfig {
            mode: Some("dataset".to_string()),
            dataset_id: Some(dataset_id.clone()),
            api_key: flag_or_env(api_key, "REPLAY_API_KEY")?,
            api_key_id: flag_or_env(api_key_id, "REPLAY_API_KEY_ID")?,
            organization_id: flag_or_env(organization_id, "REPLAY_ORG_ID")?,
            fps: *fps,
            ..Default::default()
        }),
    }
}

fn flag_or_env(
    flag: &Option<String>,
    var: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    if let Some(value) = flag {
        return Ok(Some(value.clone()));
    }
    match std::env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(format!("missing credential: pass the flag or set {var}").into()),
    }
}
