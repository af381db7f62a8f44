use std::{env, path::PathBuf};

use anyhow::{bail, Context, Result};
use chromaclick_controller::{FrameSource, MockController, PointerDriver, StillImageSource};
use chromaclick_ops::init_tracing;
use chromaclick_orchestrator::{
    pipeline_error, DetectionPipeline, DetectionResult, DetectionRunner,
};
use chromaclick_types::{
    color::Color,
    config::{ChromaConfig, Connectivity, ControllerBackend, ControllerConfig, DetectionSettings},
    geometry::Region,
    profile::{Profile, ProfileBook},
};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

mod ui;

use ui::{PanelSnapshot, UiCommand, UiMessage};

#[derive(Parser)]
#[command(name = "chromaclick", version, about = "Find a colour on screen and click it")]
struct Cli {
    /// Config file; falls back to $CHROMACLICK_CONFIG, then configs/dev.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single detection cycle.
    Detect(RunArgs),
    /// Interactive terminal panel: d = detect, r = reset, q = quit.
    Panel(RunArgs),
    /// Manage saved detection profiles.
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Args, Clone, Default)]
struct SettingsArgs {
    /// Target colour as #RRGGBB.
    #[arg(long)]
    color: Option<Color>,
    #[arg(long)]
    tolerance: Option<u32>,
    /// Restrict the search to x1,y1,x2,y2.
    #[arg(long)]
    region: Option<Region>,
    /// Search the whole frame even if the config or profile sets a region.
    #[arg(long, conflicts_with = "region")]
    full_frame: bool,
    /// Pixel adjacency for blobs: 4 or 8.
    #[arg(long)]
    connectivity: Option<Connectivity>,
}

impl SettingsArgs {
    fn apply(&self, mut settings: DetectionSettings) -> DetectionSettings {
        if let Some(color) = self.color {
            settings.color = color;
        }
        if let Some(tolerance) = self.tolerance {
            settings.tolerance = tolerance;
        }
        if self.full_frame {
            settings.region = None;
        } else if let Some(region) = self.region {
            settings.region = Some(region);
        }
        if let Some(connectivity) = self.connectivity {
            settings.connectivity = connectivity;
        }
        settings
    }
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    #[command(flatten)]
    settings: SettingsArgs,
    /// Start from a saved profile.
    #[arg(long)]
    profile: Option<String>,
    /// Read the frame from a PNG instead of the screen.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Record the click instead of moving the real pointer.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum ProfileCommand {
    List,
    Show { name: String },
    /// Store the effective settings under a name.
    Save {
        name: String,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    Delete { name: String },
}

type Pipeline = DetectionPipeline<Box<dyn FrameSource>, Box<dyn PointerDriver>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config);

    // The panel owns the terminal; log lines on stderr would tear it.
    if !matches!(cli.command, Command::Panel(_)) {
        init_tracing(&config.ops)?;
    }

    match cli.command {
        Command::Detect(args) => {
            let mut pipeline = build_pipeline(&config, &args)?;
            let result = pipeline.run_cycle().await?;
            print_result(&result);
            println!("clicks: {}", pipeline.clicks());
            for entry in pipeline.activity().entries() {
                println!("{entry}");
            }
        }
        Command::Panel(args) => {
            let pipeline = build_pipeline(&config, &args)?;
            run_panel(pipeline).await?;
        }
        Command::Profile(command) => manage_profiles(&config, command)?,
    }
    Ok(())
}

fn load_config(explicit: Option<PathBuf>) -> ChromaConfig {
    let from_env = env::var("CHROMACLICK_CONFIG").ok().map(PathBuf::from);
    let path = explicit
        .or(from_env)
        .unwrap_or_else(|| PathBuf::from("configs/dev.toml"));
    match ChromaConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                ChromaConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            ChromaConfig::default()
        }
    }
}

fn resolve_settings(config: &ChromaConfig, args: &RunArgs) -> Result<DetectionSettings> {
    let mut base = config.detection.settings();
    if let Some(name) = &args.profile {
        let book = ProfileBook::load(&config.ops.profiles_path)?;
        let profile = book
            .get(name)
            .with_context(|| format!("no profile named '{name}'"))?;
        base = DetectionSettings {
            min_area: base.min_area,
            connectivity: base.connectivity,
            ..profile.to_settings()
        };
    }
    Ok(args.settings.apply(base))
}

fn build_pipeline(config: &ChromaConfig, args: &RunArgs) -> Result<Pipeline> {
    let settings = resolve_settings(config, args)?;
    let image = args
        .image
        .clone()
        .or_else(|| config.controller.image.as_ref().map(PathBuf::from));

    let source: Box<dyn FrameSource> = match (image, config.controller.backend) {
        (Some(path), _) => Box::new(StillImageSource::new(path)),
        (None, ControllerBackend::Desktop) => desktop_source(&config.controller)?,
        (None, ControllerBackend::Mock) => {
            bail!("the mock backend needs --image or controller.image to read frames from")
        }
    };
    let pointer: Box<dyn PointerDriver> =
        if args.dry_run || config.controller.backend == ControllerBackend::Mock {
            Box::new(MockController::default())
        } else {
            desktop_pointer(&config.controller)?
        };

    info!(
        color = %settings.color,
        tolerance = settings.tolerance,
        region = ?settings.region,
        dry_run = args.dry_run,
        "pipeline ready"
    );
    Ok(DetectionPipeline::new(settings, source, pointer))
}

#[cfg(feature = "desktop")]
fn desktop_source(config: &ControllerConfig) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(chromaclick_controller::DesktopController::new(config)))
}

#[cfg(feature = "desktop")]
fn desktop_pointer(config: &ControllerConfig) -> Result<Box<dyn PointerDriver>> {
    Ok(Box::new(chromaclick_controller::DesktopController::new(config)))
}

#[cfg(not(feature = "desktop"))]
fn desktop_source(_config: &ControllerConfig) -> Result<Box<dyn FrameSource>> {
    bail!("built without the `desktop` feature; pass --image to read a still frame")
}

#[cfg(not(feature = "desktop"))]
fn desktop_pointer(_config: &ControllerConfig) -> Result<Box<dyn PointerDriver>> {
    bail!("built without the `desktop` feature; pass --dry-run to record clicks")
}

fn print_result(result: &DetectionResult) {
    let frame = &result.frame;
    let captured = frame.captured_at().format("%H:%M:%S%.3f UTC");
    match (result.centroid, &result.blob) {
        (Some(point), Some(blob)) => println!(
            "match at {point} (area {} px, bounds {}) in {}x{} frame captured {captured}",
            blob.area,
            blob.bounds,
            frame.width(),
            frame.height()
        ),
        _ => println!(
            "no match in region {} of {}x{} frame captured {captured}",
            result.region,
            frame.width(),
            frame.height()
        ),
    }
}

fn describe(result: &DetectionResult) -> String {
    match result.centroid {
        Some(point) => format!("match at {point}"),
        None => "no match".to_string(),
    }
}

fn snapshot(runner: &impl DetectionRunner, last: String) -> PanelSnapshot {
    let session = runner.session();
    PanelSnapshot {
        clicks: session.counter.get(),
        last,
        log: session.log.entries().map(ToString::to_string).collect(),
    }
}

/// Cycles run one at a time on this task; the panel thread only sends requests.
async fn run_panel(mut pipeline: Pipeline) -> Result<()> {
    let settings = *pipeline.settings();
    let summary = format!(
        "{} ±{} {}",
        settings.color,
        settings.tolerance,
        settings
            .region
            .map(|r| r.to_string())
            .unwrap_or_else(|| "full frame".into())
    );
    let (command_tx, mut command_rx) = tokio::sync::mpsc::unbounded_channel();
    let (message_tx, message_rx) = std::sync::mpsc::channel();
    let panel = tokio::task::spawn_blocking(move || ui::run(message_rx, command_tx, summary));

    serve_panel(&mut pipeline, &mut command_rx, &message_tx).await;
    drop(message_tx);

    panel
        .await
        .map_err(|err| pipeline_error(format!("panel task failed: {err}")))??;
    Ok(())
}

/// Handles panel requests until `Quit`, a closed command channel, or a closed panel.
async fn serve_panel<R>(
    runner: &mut R,
    commands: &mut UnboundedReceiver<UiCommand>,
    messages: &std::sync::mpsc::Sender<UiMessage>,
) where
    R: DetectionRunner + Send,
{
    while let Some(command) = commands.recv().await {
        let message = match command {
            UiCommand::Detect => match runner.detect().await {
                Ok(result) => UiMessage::Snapshot(snapshot(runner, describe(&result))),
                Err(err) => UiMessage::Failure(err.to_string()),
            },
            UiCommand::Reset => {
                runner.reset();
                UiMessage::Snapshot(snapshot(runner, "reset".into()))
            }
            UiCommand::Quit => break,
        };
        if messages.send(message).is_err() {
            break;
        }
    }
}

fn manage_profiles(config: &ChromaConfig, command: ProfileCommand) -> Result<()> {
    let path = &config.ops.profiles_path;
    let mut book = ProfileBook::load(path)?;
    match command {
        ProfileCommand::List => {
            if book.is_empty() {
                println!("no profiles in {path}");
            }
            for name in book.names() {
                println!("{name}");
            }
        }
        ProfileCommand::Show { name } => {
            let profile = book
                .get(&name)
                .with_context(|| format!("no profile named '{name}'"))?;
            print_profile(&name, profile);
        }
        ProfileCommand::Save { name, settings } => {
            let effective = settings.apply(config.detection.settings());
            let profile = Profile::from_settings(&effective);
            let replaced = book.insert(name.clone(), profile.clone())?.is_some();
            book.save(path)?;
            print_profile(&name, &profile);
            println!("{} profile '{name}'", if replaced { "updated" } else { "saved" });
        }
        ProfileCommand::Delete { name } => {
            if book.remove(&name).is_none() {
                bail!("no profile named '{name}'");
            }
            book.save(path)?;
            println!("deleted profile '{name}'");
        }
    }
    Ok(())
}

fn print_profile(name: &str, profile: &Profile) {
    let region = match (profile.use_region, profile.region) {
        (true, Some(region)) => region.to_string(),
        _ => "full frame".to_string(),
    };
    println!(
        "{name}: color {} tolerance {} region {region}",
        profile.color, profile.tolerance
    );
}
