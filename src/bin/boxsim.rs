use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr as _};

use boxsim::analysis::{partition_counts, speed_histogram};
use boxsim::config;
use boxsim::core::ExperimentSettings;
use boxsim::io::{open_trajectory, TrajectoryWriter};

#[derive(Parser)]
#[command(name = "boxsim")]
#[command(about = "Particles in a box split by a barrier with a hole", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an experiment and write its trajectory file
    Run {
        /// Experiment TOML file; omitted keys use the reference experiment
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Trajectory file to create
        #[arg(short, long)]
        output: PathBuf,

        /// Override the random seed
        #[arg(long)]
        seed: Option<i32>,

        /// Override the duration in minutes
        #[arg(long)]
        duration: Option<u32>,

        /// Override the sampling rate in frames per second
        #[arg(long)]
        fps: Option<u32>,
    },
    /// Print the header of a trajectory file, or one frame of it
    Inspect {
        file: PathBuf,

        /// Frame to summarize
        #[arg(long)]
        frame: Option<u64>,
    },
    /// Print the reference experiment as TOML
    Config,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    setup_logging()?;

    match Cli::parse().command {
        Command::Run {
            config,
            output,
            seed,
            duration,
            fps,
        } => {
            let mut settings = match config {
                Some(path) => config::load_settings(&path)
                    .wrap_err_with(|| format!("loading {}", path.display()))?,
                None => ExperimentSettings::default(),
            };
            let mut builder = settings.to_builder();
            if let Some(seed) = seed {
                builder = builder.seed(seed);
            }
            if let Some(duration) = duration {
                builder = builder.duration(duration);
            }
            if let Some(fps) = fps {
                builder = builder.fps(fps);
            }
            settings = builder.build();
            settings.validate()?;
            run(settings, output)
        }
        Command::Inspect { file, frame } => inspect(file, frame),
        Command::Config => {
            print!("{}", config::to_toml(&ExperimentSettings::default())?);
            Ok(())
        }
    }
}

fn setup_logging() -> color_eyre::Result<()> {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("info".parse()?)
        .with_env_var("BOXSIM_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run(settings: ExperimentSettings, output: PathBuf) -> color_eyre::Result<()> {
    let writer = TrajectoryWriter::new(settings);
    let progress = writer.progress();

    let summary = thread::scope(|scope| {
        let worker = scope.spawn(|| writer.write_to_path(&output));
        let mut last_percent = 0u64;
        while !worker.is_finished() {
            thread::sleep(Duration::from_millis(250));
            let p = progress.snapshot();
            let percent = (p.fraction() * 100.0) as u64;
            if percent >= last_percent + 10 {
                last_percent = percent - percent % 10;
                tracing::info!(
                    percent,
                    frames = p.frames_written,
                    sim_time_s = p.time_us as f64 / 1e6,
                    "progress"
                );
            }
        }
        worker
            .join()
            .map_err(|_| eyre!("simulation thread panicked"))
    })??;

    println!(
        "wrote {} frames ({} steps) to {}",
        summary.frames,
        summary.steps,
        output.display()
    );
    Ok(())
}

fn inspect(file: PathBuf, frame: Option<u64>) -> color_eyre::Result<()> {
    let mut reader = open_trajectory(&file).wrap_err_with(|| format!("opening {}", file.display()))?;
    println!("frames:     {}", reader.frame_count());
    println!("chunk size: {} bytes", reader.chunk_size());
    print!("{}", config::to_toml(reader.settings())?);

    if let Some(index) = frame {
        let state = reader.frame(index)?;
        let counts = partition_counts(&state);
        let speeds = speed_histogram(&state, 20)?;
        println!();
        println!("frame {index} at t = {:.6} s", state.time_seconds());
        println!("kinetic energy:       {:.6}", state.kinetic_energy());
        println!("most probable speed:  {:.6}", speeds.most_probable);
        println!(
            "left of barrier:      {} ({} from the left, {} from the right)",
            counts.left(),
            counts.left_origin_left,
            counts.right_origin_left
        );
        println!(
            "right of barrier:     {} ({} from the left, {} from the right)",
            counts.right(),
            counts.left_origin_right,
            counts.right_origin_right
        );
    }
    Ok(())
}
