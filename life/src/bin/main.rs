use std::time::Duration;

use clap::Parser;
use log::info;
use tokio::signal;
use tokio::time;

use life::config::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use life::{Config, Driver, Frame, LifeError, RunState};

#[derive(Parser, Debug)]
#[clap(name = "life", about = "Run Conway's Game of Life on a background worker")]
struct Cli {
    #[clap(short = 'W', long, default_value_t = DEFAULT_WIDTH)]
    width: usize,

    #[clap(short = 'H', long, default_value_t = DEFAULT_HEIGHT)]
    height: usize,

    /// Milliseconds between generations
    #[clap(short = 'i', long, default_value = "75")]
    interval_ms: u64,

    /// Seed for reproducible runs
    #[clap(short = 's', long)]
    seed: Option<u64>,

    /// Stop by itself after this many generations
    #[clap(short = 'n', long)]
    generations: Option<u64>,

    /// Start from a named pattern (block, blinker, toad, beacon, glider, lwss, pulsar)
    #[clap(short = 'p', long)]
    pattern: Option<String>,

    /// Milliseconds between renders
    #[clap(short = 'r', long, default_value = "250")]
    render_ms: u64,

    /// Print every rendered generation as text
    #[clap(long)]
    print: bool,
}

impl Cli {
    fn config(&self) -> Result<Config, LifeError> {
        let config = Config {
            width: self.width,
            height: self.height,
            interval: Duration::from_millis(self.interval_ms),
            seed: self.seed,
            max_generations: self.generations,
            pattern: None,
        };
        match &self.pattern {
            Some(name) => config.with_pattern(name),
            None => Ok(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), LifeError> {
    // install global collector configured based on RUST_LOG env var.
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    let mut driver = Driver::new(args.config()?)?;
    driver.start()?;

    let mut frames = driver.subscribe();
    let mut redraw = time::interval(Duration::from_millis(args.render_ms.max(1)));
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = redraw.tick() => {
                // Only redraw when a new generation was published since the last one.
                if frames.has_changed().unwrap_or(false) {
                    render(&frames.borrow_and_update(), args.print);
                }
                if driver.state() == RunState::Stopped {
                    break;
                }
            }
        }
    }

    driver.stop();
    driver.join().await;
    render(&driver.frame(), args.print);
    Ok(())
}

fn render(frame: &Frame, print: bool) {
    info!("generation {} population {}", frame.iteration, frame.population());
    if !print {
        return;
    }

    let mut out = String::with_capacity((frame.width + 1) * frame.height);
    for row in frame.cells().chunks(frame.width.max(1)) {
        for &alive in row {
            out.push(if alive { '#' } else { '.' });
        }
        out.push('\n');
    }
    out.push_str(&format!("-- generation {}\n", frame.iteration));
    println!("{out}");
}
