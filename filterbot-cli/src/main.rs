mod console;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use std::path::{Path, PathBuf};

use filterbot::image::{self, ImageStore};
use filterbot::{filter, Config, Direction, Filter, SessionTracker};

use crate::console::ConsoleTransport;

#[derive(Parser)]
#[command(name = "filterbot-cli")]
#[command(about = "Apply image filters through a chat session or one-shot commands", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to ~/.config/filterbot/config.json)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory for received images and results
    #[arg(long, value_name = "DIR", global = true)]
    images_dir: Option<PathBuf>,

    /// JPEG quality of the results (1-100)
    #[arg(long, value_name = "QUALITY", global = true)]
    quality: Option<u8>,

    /// Verbose output
    #[arg(short, long, default_value_t, global = true)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, default_value_t, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the bot on stdin/stdout
    Chat {
        /// Conversation to start in
        #[arg(long, value_name = "ID", default_value_t = 1)]
        chat_id: i64,

        /// How two images sent in a row are joined
        #[arg(long, value_enum)]
        direction: Option<DirectionArg>,
    },
    /// Apply a single filter to an image
    Apply {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Filter name, e.g. blur, "oil painting", invert-colors
        #[arg(short, long, value_name = "FILTER")]
        filter: Filter,

        /// Output file (defaults to <images dir>/<input stem>_<filter>.jpg)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Join two images
    Concat {
        #[arg(value_name = "FIRST")]
        first: PathBuf,

        #[arg(value_name = "SECOND")]
        second: PathBuf,

        #[arg(short, long, value_enum, default_value_t = DirectionArg::Horizontal)]
        direction: DirectionArg,

        /// Output file (defaults to <images dir>/<first stem>_concatenated.jpg)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum DirectionArg {
    Horizontal,
    Vertical,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Horizontal => Direction::Horizontal,
            DirectionArg::Vertical => Direction::Vertical,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(args.verbose, args.quiet);

    let mut config = build_config(&args)?;

    match &args.command {
        Command::Chat { chat_id, direction } => {
            if let Some(direction) = direction {
                config.concat_direction = (*direction).into();
            }
            log::info!("Storing images in {}", config.images_dir.display());

            let tracker = SessionTracker::from_config(&config);
            let stdin = std::io::stdin().lock();
            let stdout = std::io::stdout().lock();
            ConsoleTransport::new(stdin, stdout, *chat_id).run(&tracker)?;
        }
        Command::Apply {
            input,
            filter,
            output,
        } => {
            let store = config.image_store();
            let img = load(&store, input)?;

            log::info!("Applying {} to `{}`", filter.command(), input.display());
            let filtered = filter
                .apply(&img, &config.filters, &mut rand::rng())
                .with_context(|| format!("Error applying {} filter", filter.command()))?;

            write_result(&store, input, &filtered, &filter.suffix(), output.as_deref())?;
        }
        Command::Concat {
            first,
            second,
            direction,
            output,
        } => {
            let store = config.image_store();
            let first_img = load(&store, first)?;
            let second_img = load(&store, second)?;

            let joined = filter::concat(&first_img, &second_img, (*direction).into())
                .context("Error concatenating images")?;

            write_result(&store, first, &joined, "_concatenated", output.as_deref())?;
        }
        Command::Config { save } => {
            println!("{}", config.to_json()?);

            if *save {
                let path = match &args.config {
                    Some(path) => path.clone(),
                    None => Config::config_path().context("Could not find home directory")?,
                };
                config.save_to(&path)?;
                log::info!("Saved config to {}", path.display());
            }
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };

    if let Some(dir) = &args.images_dir {
        config.images_dir = dir.clone();
    }

    if let Some(quality) = args.quality {
        // Validate quality
        if quality == 0 || quality > 100 {
            anyhow::bail!("Quality must be between 1 and 100");
        }
        config.jpeg_quality = quality;
    }

    Ok(config)
}

fn load(store: &ImageStore, path: &Path) -> Result<image::RgbImage> {
    store
        .load(path)
        .with_context(|| format!("Failed to load image `{}`", path.display()))
}

fn write_result(
    store: &ImageStore,
    source: &Path,
    img: &image::RgbImage,
    suffix: &str,
    output: Option<&Path>,
) -> Result<()> {
    let path = match output {
        Some(output) => {
            let mut file = std::fs::File::create(output)
                .with_context(|| format!("Failed to create `{}`", output.display()))?;
            let quality = store.jpeg_quality();
            image::compress_to_jpeg(img, &mut file, quality).context("Failed to write image")?;
            output.to_path_buf()
        }
        None => {
            store
                .save_output(source, img, suffix)
                .context("Failed to save image")?
                .path
        }
    };

    log::info!("Done: {}", path.display());
    Ok(())
}
