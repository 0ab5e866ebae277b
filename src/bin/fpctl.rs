//! fpctl: poke at FrontPanel boards from the shell.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fpdev::{Device, Native, Result, SessionConfig, enumerate, logfile};

#[derive(Parser)]
#[command(name = "fpctl", version, about = "Inspect and drive Opal Kelly FrontPanel boards")]
struct Args {
    /// Path to the FrontPanel shared library (default: platform library name)
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// SDK transfer timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u32>,

    /// Close the session as soon as an SDK call reports a generic failure
    #[arg(long, global = true)]
    close_on_failure: bool,

    /// Append a debug-level log to this file instead of logging to stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Pipe block size in bytes
    #[arg(long, global = true, default_value_t = fpdev::constants::DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List attached boards
    List {
        /// Print serials only, without opening each board
        #[arg(long)]
        serials_only: bool,
    },
    /// Print the device ID of one board
    Id { serial: String },
    /// Open a board and print what it reports
    Info {
        serial: String,
        /// Bitstream to load before querying
        #[arg(long)]
        firmware: Option<PathBuf>,
    },
    /// Store a new device ID on the board
    SetId { serial: String, device_id: String },
    /// Reset the FPGA design
    Reset { serial: String },
    /// Write and latch a wire-in
    WireIn {
        serial: String,
        #[arg(value_parser = parse_u32)]
        address: u32,
        #[arg(value_parser = parse_u32)]
        value: u32,
    },
    /// Refresh and read a wire-out
    WireOut {
        serial: String,
        #[arg(value_parser = parse_u32)]
        address: u32,
    },
    /// Read a word from the register bus
    ReadReg {
        serial: String,
        #[arg(value_parser = parse_u32)]
        address: u32,
    },
    /// Write a word to the register bus
    WriteReg {
        serial: String,
        #[arg(value_parser = parse_u32)]
        address: u32,
        #[arg(value_parser = parse_u32)]
        value: u32,
    },
    /// Send a file to a pipe-in
    PipeWrite {
        serial: String,
        #[arg(value_parser = parse_u32)]
        address: u32,
        file: PathBuf,
    },
    /// Read bytes from a pipe-out and hex-dump them
    PipeRead {
        serial: String,
        #[arg(value_parser = parse_u32)]
        address: u32,
        length: usize,
    },
}

fn parse_u32(text: &str) -> std::result::Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|err| format!("invalid number `{text}`: {err}"))
}

fn session_config(args: &Args) -> SessionConfig {
    let mut config = SessionConfig::new();
    config.set_close_on_failure(args.close_on_failure);
    config.set_timeout(args.timeout_ms.map(|ms| Duration::from_millis(u64::from(ms))));
    config.set_block_size(args.block_size);
    config
}

fn open(backend: Native, args: &Args, serial: &str) -> Result<Device<Native>> {
    let mut device = Device::with_config(backend, session_config(args));
    device.open(serial, None)?;
    Ok(device)
}

fn hex_dump(data: &[u8]) {
    for (row, chunk) in data.chunks(16).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        println!("{:08x}  {}", row * 16, bytes.join(" "));
    }
}

fn run(args: &Args) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let backend = Native::load(args.library.as_deref())?;

    match &args.command {
        Command::List { serials_only } => {
            if *serials_only {
                for serial in enumerate::list_serials(&backend) {
                    println!("{serial}");
                }
            } else {
                for info in enumerate::list_devices(&backend) {
                    println!("{:<12} {}", info.serial, info.device_id);
                }
            }
        }
        Command::Id { serial } => println!("{}", enumerate::device_id(&backend, serial)),
        Command::Info { serial, firmware } => {
            let mut device = Device::with_config(backend, session_config(args));
            device.open(serial, firmware.as_deref())?;
            println!("Serial:    {}", device.serial());
            println!("Device ID: {}", device.device_id());
            println!("Firmware:  {}", device.firmware_version());
            println!("USB 3:     {}", if device.is_usb3_speed() { "yes" } else { "no" });
            if let Some(date) = device.library_date() {
                println!("Library:   {date}");
            }
        }
        Command::SetId { serial, device_id } => {
            open(backend, args, serial)?.set_device_id(device_id)?;
        }
        Command::Reset { serial } => open(backend, args, serial)?.reset_device()?,
        Command::WireIn {
            serial,
            address,
            value,
        } => open(backend, args, serial)?.set_wire_in(*address, *value, true)?,
        Command::WireOut { serial, address } => {
            let value = open(backend, args, serial)?.get_wire_out(*address, true)?;
            println!("{value:#010x}");
        }
        Command::ReadReg { serial, address } => {
            let value = open(backend, args, serial)?.read_register(*address)?;
            println!("{value:#010x}");
        }
        Command::WriteReg {
            serial,
            address,
            value,
        } => open(backend, args, serial)?.write_register(*address, *value)?,
        Command::PipeWrite {
            serial,
            address,
            file,
        } => {
            let data = std::fs::read(file)?;
            let mut device = open(backend, args, serial)?;
            let block_size = device.block_size();
            let sent = device.write_pipe(*address, &data, block_size)?;
            log::info!("sent {} bytes ({sent} on the wire)", data.len());
        }
        Command::PipeRead {
            serial,
            address,
            length,
        } => {
            let mut device = open(backend, args, serial)?;
            let mut data = vec![0u8; *length];
            let block_size = device.block_size();
            let count = device.read_pipe(*address, &mut data, block_size)?;
            hex_dump(&data[..count.min(data.len())]);
        }
    }
    Ok(())
}

fn init_logging(args: &Args) -> std::io::Result<()> {
    match &args.log_file {
        Some(path) => logfile::builder(path)?.init(),
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .format_timestamp(None)
            .format_target(false)
            .init(),
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Error: cannot open log file: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
