//! vm-paging - run a memory instruction trace against one simulated process.
//!
//! Usage: vm-paging [OPTIONS] <TRACE> [OUTPUT]
//!
//! Each executed instruction is reported with its status. Execution stops at the first failing
//! instruction and the process exits with that failure's status code.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info};

use vm_paging::config::MemConfig;
use vm_paging::io::{read_trace, run_trace, write_results};
use vm_paging::process::Process;

#[derive(Debug, Parser)]
#[command(name = "vm-paging", version, about = "Paged virtual memory simulator")]
struct Args {
    /// Instruction trace (alloc/free/read/write, one per line)
    trace: PathBuf,

    /// Write results here instead of stdout
    output: Option<PathBuf>,

    /// TOML memory configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Print the page table and non-zero RAM bytes after the run
    #[arg(long)]
    dump: bool,
}

fn main() {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(&args) {
        Ok(status) => process::exit(status),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<i32, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => MemConfig::load(path)?,
        None => MemConfig::default(),
    };
    info!(
        "page size {} B, {} RAM frames, {} swap device(s)",
        config.page_size,
        config.ram_size / config.page_size,
        config.swap_sizes.len()
    );

    let program = read_trace(&args.trace)?;
    let process = Process::new(1, &config)?;
    let steps = run_trace(&process, &program);

    match &args.output {
        Some(path) => write_results(path, &steps)?,
        None => {
            for step in &steps {
                println!("{}", step);
            }
        }
    }

    if args.dump {
        process.with_mm(|mm| -> Result<(), Box<dyn std::error::Error>> {
            println!("page table:");
            for line in mm.page_table_dump(0, None)? {
                println!("{}", line);
            }
            println!("ram:");
            print!("{}", mm.ram().dump());
            Ok(())
        })?;
    }

    let status = steps.last().map_or(0, |s| s.status);
    if status != 0 {
        info!("halted after {} of {} instructions", steps.len(), program.len());
    }
    Ok(status)
}
