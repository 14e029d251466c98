use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use clap::{Parser, ValueEnum};
use log::{error, info, warn, LevelFilter};
use serde::Serialize;
use rns_amr::amr::Amr;
use rns_amr::box_array::BoxArray;
use rns_amr::config::{Chemistry, Config, TimeStepping};
use rns_amr::error::{Error, Result};
use rns_amr::index_space::range2d;
use rns_amr::multifab::MultiFab;
use rns_amr::physics::ReactiveAdvection;
use rns_amr::variables::{DENSITY, ENERGY, FIRST_SPEC, XMOM, YMOM};




#[derive(Clone, Copy, Debug, ValueEnum)]
enum Stepping {
    Subcycled,
    Mlsdc,
}




#[derive(Debug, Parser)]
#[clap(version, about = "Advect and react a Gaussian blob on an adaptive mesh")]
struct Opts {
    #[clap(short = 'n', long, default_value = "64")]
    n_cell: i64,

    #[clap(short = 'l', long, default_value = "1")]
    max_level: usize,

    #[clap(long, default_value = "2")]
    ref_ratio: i64,

    #[clap(short = 's', long, value_enum, default_value = "mlsdc")]
    time_stepping: Stepping,

    #[clap(long, default_value = "2")]
    rk_order: u32,

    #[clap(long, default_value = "0.5")]
    cfl: f64,

    #[clap(long)]
    fixed_dt: Option<f64>,

    #[clap(long, default_value = "8")]
    max_iters: usize,

    #[clap(long, default_value = "3")]
    nnodes0: usize,

    #[clap(long, default_value = "2")]
    trat: usize,

    #[clap(long, default_value = "3")]
    max_trefs: usize,

    #[clap(long, default_value = "1.0")]
    reaction_rate: f64,

    #[clap(long, default_value = "0.25")]
    stop_time: f64,

    #[clap(long, default_value = "1000000")]
    max_steps: usize,

    #[clap(short = 't', long, default_value = "1")]
    num_threads: usize,

    #[clap(long)]
    pin_cores: bool,

    #[clap(short = 'o', long, default_value = "state.cbor")]
    output: String,

    #[clap(long, default_value = "info")]
    log_level: String,
}




// ============================================================================
impl Opts {

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.amr.n_cell = (self.n_cell, self.n_cell);
        config.amr.max_level = self.max_level;
        config.amr.ref_ratio = self.ref_ratio;
        config.amr.cfl = self.cfl;
        config.amr.fixed_dt = self.fixed_dt;
        config.mlsdc.max_iters = self.max_iters;
        config.mlsdc.nnodes0 = self.nnodes0;
        config.mlsdc.trat = self.trat;
        config.mlsdc.max_trefs = self.max_trefs;
        config.rk_order = self.rk_order;
        config.time_stepping = match self.time_stepping {
            Stepping::Subcycled => TimeStepping::Subcycled,
            Stepping::Mlsdc => TimeStepping::Mlsdc,
        };
        config.physics.chemistry = if self.reaction_rate > 0.0 {
            Some(Chemistry { rate: self.reaction_rate })
        } else {
            None
        };
        config
    }
}




#[derive(Serialize)]
struct LevelSnapshot<'a> {
    level: usize,
    time: f64,
    grids: &'a BoxArray,
    state: &'a MultiFab,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    time: f64,
    iteration: usize,
    config: &'a Config,
    names: Vec<String>,
    levels: Vec<LevelSnapshot<'a>>,
}




/**
 * A square box on each level, centered in the domain, with each one
 * covering half the width of the one below it.
 */
fn nested_grids(n_cell: i64, ratio: i64, num_levels: usize) -> Vec<BoxArray> {
    (0..num_levels)
        .map(|lev| {
            let n = n_cell * ratio.pow(lev as u32);
            let half = n / 2i64.pow(lev as u32 + 1);
            let (lo, hi) = if lev == 0 { (0, n) } else { (n / 2 - half, n / 2 + half) };
            BoxArray::new(vec![range2d(lo..hi, lo..hi)])
        })
        .collect()
}




fn gaussian(x: (f64, f64), s: &mut [f64], velocity: (f64, f64), num_species: usize) {
    let r2 = (x.0 - 0.5).powi(2) + (x.1 - 0.5).powi(2);
    let y = (-r2 / 0.01).exp();
    let rho = 1.0 + 0.5 * y;

    s.iter_mut().for_each(|v| *v = 0.0);
    s[DENSITY] = rho;
    s[XMOM] = rho * velocity.0;
    s[YMOM] = rho * velocity.1;
    s[ENERGY] = 2.0 * rho;

    match num_species {
        0 => {}
        1 => s[FIRST_SPEC] = rho,
        _ => {
            s[FIRST_SPEC] = rho * y;
            s[FIRST_SPEC + 1] = rho * (1.0 - y);
        }
    }
}




fn write_snapshot(amr: &Amr, time: f64, iteration: usize, path: &str) -> Result<()> {
    let snapshot = Snapshot {
        time,
        iteration,
        config: amr.config(),
        names: amr.physics().variables().names(),
        levels: amr
            .levels()
            .iter()
            .map(|l| LevelSnapshot { level: l.level, time: l.state.new_time, grids: &l.grids, state: &l.state.new })
            .collect(),
    };
    let file = std::fs::File::create(path)?;
    let mut buffer = std::io::BufWriter::new(file);
    ciborium::ser::into_writer(&snapshot, &mut buffer).map_err(|e| Error::Snapshot(e.to_string()))?;
    info!("wrote {}", path);
    Ok(())
}




fn build_thread_pool(num_threads: usize, pin_cores: bool) {
    let mut builder = rayon::ThreadPoolBuilder::new().num_threads(num_threads);

    if pin_cores {
        match core_affinity::get_core_ids() {
            Some(core_ids) => {
                builder = builder.start_handler(move |n| {
                    if let Some(id) = core_ids.get(n % core_ids.len()) {
                        core_affinity::set_for_current(*id)
                    }
                })
            }
            None => warn!("could not read the core ids; worker threads are not pinned"),
        }
    }
    if let Err(e) = builder.build_global() {
        warn!("could not configure the global thread pool: {}", e)
    }
}




fn run(opts: &Opts, stop: &AtomicBool) -> Result<()> {
    let config = opts.config();
    let velocity = config.physics.velocity;
    let num_species = config.physics.num_species;
    let physics = Box::new(ReactiveAdvection::from_config(&config.physics));
    let grids = nested_grids(opts.n_cell, opts.ref_ratio, opts.max_level + 1);

    let mut amr = Amr::new(config, physics, grids)?;
    amr.init_data(|x, s| gaussian(x, s, velocity, num_species));

    for level in amr.levels() {
        info!("level {}: {} boxes, {} cells", level.level, level.grids.len(), level.grids.num_cells());
    }

    let mut time = 0.0;
    let mut iteration = 0;

    while time < opts.stop_time && iteration < opts.max_steps {
        time += amr.coarse_time_step(time, opts.stop_time)?;
        iteration += 1;

        if stop.load(Ordering::Relaxed) {
            warn!("stopping at t={:.6e} on request", time);
            break;
        }
    }
    write_snapshot(&amr, time, iteration, &opts.output)
}




// ============================================================================
fn main() {
    let opts = Opts::parse();

    let level = opts.log_level.parse().unwrap_or(LevelFilter::Info);
    simple_logger::SimpleLogger::new().with_level(level).init().unwrap();
    info!("{:?}", opts);

    build_thread_pool(opts.num_threads, opts.pin_cores);

    let stop = Arc::new(AtomicBool::new(false));

    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&stop)) {
            warn!("could not register signal {}: {}", signal, e)
        }
    }

    if let Err(e) = run(&opts, &stop) {
        error!("{}", e);
        std::process::exit(1)
    }
}
