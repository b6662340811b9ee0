use std::{path::Path, process::exit, time::Instant};

use clap::Parser as ClapParser;

use eusynth::{synthesize, OracleKind, SynthOptions};

/// The command line interface for the synthesizer
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
struct Args {
    /// The oracle used to check candidate solutions
    #[arg(long, value_enum, default_value_t = OracleKind::Smt)]
    oracle: OracleKind,

    /// The SMT solver command line, used with `--oracle smt`
    #[arg(long)]
    solver_cmd: Option<String>,

    /// The largest term size to enumerate before giving up
    #[arg(long)]
    max_size: Option<usize>,

    /// The maximum number of verification rounds before giving up
    #[arg(long)]
    max_rounds: Option<usize>,

    /// The largest absolute integer tried by the sample oracle
    #[arg(long)]
    sample_bound: Option<i64>,

    /// Print the classified specification before solving
    #[arg(long)]
    print_spec: bool,

    /// The SyGuS benchmark to solve
    file: String,
}

/// The main function of the synthesizer. Parses the command line arguments and runs the synthesizer.
fn main() {
    env_logger::init();
    let ts = Instant::now();
    let cli = Args::parse();
    let file = Path::new(&cli.file);
    let input = match std::fs::File::open(file) {
        Ok(f) => std::io::BufReader::new(f),
        Err(err) => {
            log::error!("Cannot open {}: {}", cli.file, err);
            println!("unknown");
            exit(1);
        }
    };

    let opts = convert_options(&cli);
    match synthesize(input, opts) {
        Ok(definitions) => {
            for d in definitions {
                println!("{}", d);
            }
        }
        Err(err) => {
            log::error!("Error: {}", err);
            println!("unknown");
            exit(1);
        }
    };

    log::info!("Done ({}ms).", ts.elapsed().as_millis());
}

fn convert_options(options: &Args) -> SynthOptions {
    let mut opts = SynthOptions {
        oracle: options.oracle,
        ..Default::default()
    };
    if let Some(cmd) = &options.solver_cmd {
        opts.solver_cmd = cmd.clone();
    }
    if let Some(max) = options.max_size {
        opts.max_size = max;
    }
    if let Some(max) = options.max_rounds {
        opts.max_rounds = max;
    }
    if let Some(b) = options.sample_bound {
        opts.sample_bound = b;
    }
    if options.print_spec {
        opts.print_spec = true;
    }
    opts
}
