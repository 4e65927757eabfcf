use clap::Parser;
use color_eyre::eyre;
use llcsim::config::{self, Config, InvalidatePolicy, Protocol};
use llcsim::interconn::LoggedInterconnect;
use llcsim::sim::Simulation;
use llcsim::Error;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn parse_line_size(value: &str) -> Result<u32, String> {
    let parsed: u32 = value
        .parse()
        .map_err(|_| format!("invalid line size {value:?}"))?;
    if !config::LINE_SIZES.contains(&parsed) {
        return Err(format!(
            "line size must be one of {:?} bytes (got {parsed})",
            config::LINE_SIZES
        ));
    }
    Ok(parsed)
}

fn parse_associativity(value: &str) -> Result<u32, String> {
    let parsed: u32 = value
        .parse()
        .map_err(|_| format!("invalid associativity {value:?}"))?;
    if !config::ASSOCIATIVITIES.contains(&parsed) {
        return Err(format!(
            "associativity must be one of {:?} (got {parsed})",
            config::ASSOCIATIVITIES
        ));
    }
    Ok(parsed)
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Trace-driven simulator of a shared, inclusive last-level cache")]
struct Options {
    #[clap(
        short = 'f',
        long = "file",
        default_value = "data/trace.txt",
        help = "trace file to process"
    )]
    file: PathBuf,

    #[clap(
        long = "capacity",
        env = "CACHE_CAPACITY_MB",
        default_value_t = 16,
        help = "total cache capacity in MiB"
    )]
    capacity: u64,

    #[clap(
        long = "line_size",
        env = "CACHE_LINE_SIZE",
        default_value_t = 64,
        value_parser = parse_line_size,
        help = "cache line size in bytes"
    )]
    line_size: u32,

    #[clap(
        long = "associativity",
        env = "CACHE_ASSOCIATIVITY",
        default_value_t = 16,
        value_parser = parse_associativity,
        help = "number of ways per set"
    )]
    associativity: u32,

    #[clap(
        long = "address_bits",
        env = "CACHE_ADDRESS_SIZE",
        default_value_t = 32,
        help = "width of the simulated address space"
    )]
    address_bits: u32,

    #[clap(
        long = "protocol",
        env = "CACHE_PROTOCOL",
        value_enum,
        default_value_t = Protocol::Mesi,
        help = "coherence protocol (MSI is declared but not implemented)"
    )]
    protocol: Protocol,

    #[clap(
        long = "invalidate_policy",
        value_enum,
        default_value_t = InvalidatePolicy::Keep,
        help = "what a snooped invalidate does to lines held in M or E"
    )]
    invalidate_policy: InvalidatePolicy,

    #[clap(long = "stats-file", help = "write final statistics as JSON")]
    stats_file: Option<PathBuf>,

    #[clap(
        short = 's',
        long = "silent",
        conflicts_with = "debug",
        help = "only the cache dump and final statistics"
    )]
    silent: bool,

    #[clap(short = 'd', long = "debug", help = "per-command entry/exit traces")]
    debug: bool,
}

impl Options {
    fn config(&self) -> Config {
        Config {
            capacity: self.capacity << 20,
            line_size: self.line_size,
            associativity: self.associativity,
            address_bits: self.address_bits,
            protocol: self.protocol,
            invalidate_policy: self.invalidate_policy,
        }
    }
}

fn init_logging(options: &Options) {
    let level = if options.silent {
        log::LevelFilter::Off
    } else if options.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn open_writable(path: &Path) -> Result<BufWriter<File>, std::io::Error> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(BufWriter::new(file))
}

fn run(options: &Options) -> Result<(), Error> {
    let config = options.config();
    let file = File::open(&options.file).map_err(|source| Error::Trace {
        path: options.file.clone(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut sim = Simulation::new(&config, LoggedInterconnect)?;

    let stdout = std::io::stdout();
    let mut sink = stdout.lock();
    let result = sim.run(reader, &mut sink).and_then(|()| {
        // final statistics always end the normal stream
        writeln!(sink, "{}", sim.stats()).map_err(Error::from)
    });
    // flush before surfacing any failure
    sink.flush()?;
    result?;

    if let Some(path) = &options.stats_file {
        let mut writer = open_writable(path)?;
        serde_json::to_writer_pretty(&mut writer, sim.stats())
            .map_err(|err| Error::Io(err.into()))?;
        writer.flush()?;
        log::info!("wrote statistics to {}", path.display());
    }
    Ok(())
}

fn exit_code(err: &Error) -> ExitCode {
    match err {
        // a rejected protocol choice is an argument error, everything else
        // only shows up at runtime
        Error::Config(config::Error::UnimplementedProtocol(_)) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn main() -> eyre::Result<ExitCode> {
    dotenv::dotenv().ok();
    color_eyre::install()?;

    let options = Options::parse();
    init_logging(&options);
    log::debug!("options: {options:#?}");

    match run(&options) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("error: {err}");
            if let Error::Trace { source, .. } = &err {
                eprintln!("  caused by: {source}");
            }
            Ok(exit_code(&err))
        }
    }
}
