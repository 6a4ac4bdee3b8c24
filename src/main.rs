use std::io;

use anyhow::Result;
use clap::Parser;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};

use wall_tracker_rs::display::Display;
use wall_tracker_rs::filters::wall_kf::FilterConfig;
use wall_tracker_rs::noise::{AxisStd, NoiseProfile};
use wall_tracker_rs::sim::Simulation;
use wall_tracker_rs::types::{Mat2, Vec2};

#[derive(Parser, Debug)]
#[command(name = "wall_tracker")]
#[command(about = "2D Kalman filter simulation with wall-distance sensing", long_about = None)]
struct Args {
    /// Region width in world units
    #[arg(long, default_value_t = 20.0)]
    width: f64,

    /// Region height in world units
    #[arg(long, default_value_t = 10.0)]
    height: f64,

    /// RNG seed for a reproducible run
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Run N steps without a UI and print the final snapshot as JSON
    #[arg(long, default_value_t = 0)]
    steps: u64,

    /// Output directory for session files
    #[arg(long, default_value = "wall_tracker_sessions")]
    output_dir: String,

    /// Injected process noise std devs (x, y)
    #[arg(long, num_args = 2, default_values_t = [0.1, 0.2])]
    process_std: Vec<f64>,

    /// Injected measurement noise std devs (x, y)
    #[arg(long, num_args = 2, default_values_t = [0.2, 0.2])]
    measurement_std: Vec<f64>,

    /// Control std devs (x, y)
    #[arg(long, num_args = 2, default_values_t = [1.0, 1.0])]
    control_std: Vec<f64>,
}

impl Args {
    fn noise_profile(&self) -> NoiseProfile {
        NoiseProfile {
            process: AxisStd::new(self.process_std[0], self.process_std[1]),
            measurement: AxisStd::new(self.measurement_std[0], self.measurement_std[1]),
            control: AxisStd::new(self.control_std[0], self.control_std[1]),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = FilterConfig {
        walls: Vec2::new(args.width, args.height),
        ..FilterConfig::default()
    };
    let mut sim = Simulation::new(
        config,
        args.noise_profile(),
        Mat2::new(0.3, 0.0, 0.0, 0.4),
        Mat2::new(0.4, 0.0, 0.0, 0.4),
        args.seed,
    )?;

    if args.steps > 0 {
        run_batch(&mut sim, &args)
    } else {
        run_interactive(&mut sim, &args)
    }
}

/// Headless mode: step N times, save the session, print the final
/// snapshot as JSON.
fn run_batch(sim: &mut Simulation, args: &Args) -> Result<()> {
    for _ in 0..args.steps {
        // A failed cycle is already logged; hold the belief and go on.
        let _ = sim.step();
    }
    sim.save(&args.output_dir)?;
    println!("{}", serde_json::to_string_pretty(&sim.latest())?);
    Ok(())
}

/// Interactive mode: Enter advances one step, `s` saves the session,
/// `q` or Esc quits.
fn run_interactive(sim: &mut Simulation, args: &Args) -> Result<()> {
    let display = Display::fit_terminal(sim.filter().walls())?;
    let mut out = io::stdout();

    enable_raw_mode()?;
    execute!(out, EnterAlternateScreen, Hide)?;
    let result = event_loop(sim, args, &display, &mut out);
    execute!(out, Show, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    result
}

fn event_loop(
    sim: &mut Simulation,
    args: &Args,
    display: &Display,
    out: &mut io::Stdout,
) -> Result<()> {
    display.draw(out, &sim.latest())?;
    loop {
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Enter => {
                    let _ = sim.step();
                    display.draw(out, &sim.latest())?;
                }
                KeyCode::Char('s') => {
                    sim.save(&args.output_dir)?;
                    display.draw(out, &sim.latest())?;
                }
                KeyCode::Char('q') | KeyCode::Esc => break,
                _ => {}
            },
            Event::Resize(_, _) => {
                display.draw(out, &sim.latest())?;
            }
            _ => {}
        }
    }
    sim.save(&args.output_dir)?;
    Ok(())
}
