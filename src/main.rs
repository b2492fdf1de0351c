//! PVSpice - Photovoltaic grid netlist generator
//!
//! Fits single-diode parameters from a module datasheet, writes LTspice
//! netlists for a grid of modules and reads the simulation results back.
//!
//! # Usage
//!
//! ```bash
//! pvspice fit --datasheet "voc=43.5 isc=3.45 vmp=35 imp=3.15 kv=-0.152 ki=0.0014 ns=72" -t 25 -t 60
//! pvspice netlist --datasheet "..." --series 2 --parallel 2 --bypass 0:35 --bypass 36:71 -o grid.cir
//! pvspice parse grid.raw --csv grid.csv --mpp
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pvspice_core::{
    circuit::BypassLayout,
    error::{PvError, Result},
    estimator::{DatasheetSpec, EstimatorConfig, FitMode, ParameterEstimator, SharedEstimator},
    netlist::{NetlistBuilder, NetlistOptions},
    results::parse_raw_file,
    Grid,
};
use tracing::info;

/// Photovoltaic grid netlist generator for LTspice
#[derive(Parser, Debug)]
#[command(name = "pvspice", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit single-diode parameters and print them
    Fit(FitArgs),
    /// Write a netlist for a grid
    Netlist(NetlistArgs),
    /// Summarize an LTspice raw result file
    Parse(ParseArgs),
}

#[derive(Args, Debug)]
struct DatasheetArgs {
    /// Datasheet ratings as `voc=.. isc=.. vmp=.. imp=.. kv=.. ki=.. ns=..`
    #[arg(short, long, value_parser = parse_datasheet)]
    datasheet: DatasheetSpec,

    /// Iteration ceiling of the fit
    #[arg(long, default_value_t = pvspice_core::estimator::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Relative convergence tolerance of the fit
    #[arg(long, default_value_t = pvspice_core::estimator::DEFAULT_TOLERANCE)]
    tolerance: f64,
}

impl DatasheetArgs {
    fn estimator(&self) -> Result<ParameterEstimator> {
        let config = EstimatorConfig::new()
            .with_max_iterations(self.max_iterations)
            .with_tolerance(self.tolerance);
        ParameterEstimator::fit_with_config(self.datasheet, config)
    }
}

#[derive(Args, Debug)]
struct FitArgs {
    #[command(flatten)]
    datasheet: DatasheetArgs,

    /// Cell temperatures (°C) to print parameters for
    #[arg(short, long = "temperature", default_value = "25")]
    temperatures: Vec<f64>,
}

#[derive(Args, Debug)]
struct NetlistArgs {
    #[command(flatten)]
    datasheet: DatasheetArgs,

    /// Modules in series per string
    #[arg(long, default_value_t = 1)]
    series: usize,

    /// Strings in parallel
    #[arg(long, default_value_t = 1)]
    parallel: usize,

    /// Grid temperature (°C)
    #[arg(short, long)]
    temperature: Option<f64>,

    /// Grid irradiance (W/m²)
    #[arg(short, long)]
    irradiance: Option<f64>,

    /// Bypass diode span `anode:cathode` applied to every module
    #[arg(short, long = "bypass", value_parser = parse_span)]
    bypass: Vec<(usize, usize)>,

    /// Bias sweep upper bound (V), defaults to series * (Voc + 1)
    #[arg(long)]
    upper: Option<f64>,

    /// Bias sweep step (V), defaults to upper / 100
    #[arg(long)]
    step: Option<f64>,

    /// Omit string current probes
    #[arg(long)]
    no_string_probes: bool,

    /// Omit bypass diode current probes
    #[arg(long)]
    no_bypass_probes: bool,

    /// Cell subcircuit library to include
    #[arg(long)]
    library: Option<String>,

    /// Output `.cir` file (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// LTspice raw file (ASCII)
    #[arg(value_name = "RAW_FILE")]
    raw_file: PathBuf,

    /// Write the current series against bias voltage to a CSV file
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Series to export by name (all if omitted)
    #[arg(long = "select")]
    select: Vec<String>,

    /// Report the maximum power point of every current series
    #[arg(long)]
    mpp: bool,
}

fn parse_datasheet(text: &str) -> std::result::Result<DatasheetSpec, String> {
    text.parse().map_err(|e: PvError| e.to_string())
}

fn parse_span(text: &str) -> std::result::Result<(usize, usize), String> {
    let (a, c) = text
        .split_once(':')
        .ok_or_else(|| format!("expected anode:cathode, got '{}'", text))?;
    let anode = a.trim().parse().map_err(|_| format!("invalid anode '{}'", a))?;
    let cathode = c.trim().parse().map_err(|_| format!("invalid cathode '{}'", c))?;
    Ok((anode, cathode))
}

fn run_fit(args: &FitArgs) -> Result<()> {
    let mut estimator = args.datasheet.estimator()?;
    if let FitMode::Fitted { iterations, converged } = estimator.mode() {
        let status = if converged { "converged" } else { "iteration ceiling reached" };
        println!("fit: {} after {} iterations", status, iterations);
    }
    if let Some(report) = estimator.report() {
        println!("Rsh (iterated) = {} Ω", report.rsh_iterated);
    }

    for &t in &args.temperatures {
        let p = estimator.parameters_at(t);
        println!("T = {} °C ({} K)", t, p.temperature);
        println!("  I0  = {} A", p.i0);
        println!("  Iph = {} A", p.iph);
        println!("  Rs  = {} Ω", p.rs);
        println!("  Rsh = {} Ω", p.rsh);
        println!("  A   = {}", p.a);
        println!("  Voc = {} V, Isc = {} A", p.voc, p.isc);
    }
    Ok(())
}

fn run_netlist(args: &NetlistArgs) -> Result<()> {
    let estimator = SharedEstimator::new(args.datasheet.estimator()?);
    let mut grid = Grid::new(args.series, args.parallel, estimator)?;

    if let Some(t) = args.temperature {
        grid.set_temperature(t)?;
    }
    if let Some(g) = args.irradiance {
        grid.set_irradiance(g)?;
    }
    if !args.bypass.is_empty() {
        let layout = BypassLayout::from_spans(grid.cells_per_module(), &args.bypass)?;
        grid.set_bypass_layout(&layout)?;
    }

    let mut options = NetlistOptions::for_grid(&grid)
        .with_string_probes(!args.no_string_probes)
        .with_bypass_probes(!args.no_bypass_probes);
    if let Some(upper) = args.upper {
        options.upper_bound = upper;
        options.step = upper / pvspice_core::netlist::DEFAULT_SWEEP_POINTS;
    }
    if let Some(step) = args.step {
        options = options.with_step(step);
    }
    if let Some(library) = &args.library {
        options = options.with_library(library.clone());
    }
    if let Some(path) = &args.output {
        if let Some(stem) = path.file_name() {
            options = options.with_title(stem.to_string_lossy());
        }
    }

    let doc = NetlistBuilder::new(options).render(&grid)?;
    match &args.output {
        Some(path) => {
            doc.write_to(path)?;
            info!(path = %path.display(), "netlist written");
        }
        None => print!("{}", doc),
    }
    Ok(())
}

fn run_parse(args: &ParseArgs) -> Result<()> {
    let set = parse_raw_file(&args.raw_file)?;
    println!("{} sweep points", set.points());
    for series in set.currents() {
        println!("  [{}] {} ({})", series.color, series.name, series.unit);
    }

    if args.mpp {
        for series in set.currents() {
            if let Some(mpp) = set.max_power_point(series) {
                println!(
                    "Maximum power point of the {}: Voltage: {:.1}V, Current: {:.1}A, Power: {:.1}W",
                    series.name, mpp.voltage, mpp.current, mpp.power
                );
            }
        }
    }

    if let Some(path) = &args.csv {
        let selection: Vec<&str> = args.select.iter().map(String::as_str).collect();
        set.write_csv(path, &selection)?;
        info!(path = %path.display(), "csv written");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Fit(args) => run_fit(args),
        Command::Netlist(args) => run_netlist(args),
        Command::Parse(args) => run_parse(args),
    }
}
