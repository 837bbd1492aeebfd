use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use serial_instruments::config::{Config, ConfigLoader, Verbosity};
use serial_instruments::{
    logging, parse_usb_id, CommandError, CommandResult, ConnectionManager, DeviceContext,
    LineTransport, PortLocator, ReadLinesError, ReadLinesOptions, SwitchState, SystemPorts,
    UsbSwitch,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "usbsw",
    version,
    about = "Control USB serial instruments and the MCCI 3141 USB switch.",
    long_about = "Locates serial instruments by USB vendor/product id, opens them and exchanges newline-delimited text commands. Every failure is reported with a kind, a numeric code and a description; the process exit code is that numeric code."
)]
struct Args {
    /// Configuration file (otherwise the standard locations are searched).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Device path to use instead of discovery.
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// USB vendor id in hex, e.g. 045E.
    #[arg(long, global = true)]
    vid: Option<String>,

    /// USB product id in hex, e.g. 0646.
    #[arg(long, global = true)]
    pid: Option<String>,

    /// Increase device trace output (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print results and failures as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial interfaces, marking those matching the selected vid/pid.
    List,
    /// Connect switch port 1 or 2.
    On {
        #[arg(value_name = "PORT")]
        number: u8,
    },
    /// Disconnect both switch ports.
    Off,
    /// Show which switch port is connected.
    State,
    /// Show the switch firmware version.
    Version,
    /// Show the switch status report.
    Status,
    /// Show the switch's built-in help.
    HelpDevice,
    /// Send a raw command to the switch and print the reply.
    Query {
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },
    /// Connect port 1, disconnect, connect port 2, disconnect.
    Cycle {
        /// How long each port stays connected.
        #[arg(long, default_value_t = 3000)]
        dwell_ms: u64,
        /// Pause after each disconnect.
        #[arg(long, default_value_t = 1000)]
        pause_ms: u64,
    },
    /// Send one line to a generic serial instrument and print the reply lines.
    Send {
        text: String,
        /// Stop reading after this long.
        #[arg(long, default_value_t = 500)]
        timeout_ms: u64,
        /// Stop reading after this many lines.
        #[arg(long)]
        max_lines: Option<usize>,
        /// Stop reading after a line equal to this.
        #[arg(long)]
        until: Option<String>,
        /// Drop empty lines from the reply.
        #[arg(long)]
        skip_empty: bool,
    },
}

/// What a successful command prints.
enum Output {
    Lines(Vec<String>),
    Value(serde_json::Value, String),
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;
    logging::init(&config.logging)?;
    let ctx = DeviceContext::with_tracing(config);

    match run(&args, ctx) {
        Ok(output) => {
            print_output(output, args.json);
            Ok(())
        }
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e.to_record("usbsw"))?);
            } else {
                eprintln!("Error ({}): {}", e.code(), e);
            }
            std::process::exit(e.code());
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ConfigLoader::load().context("loading configuration")?,
    };
    let mut config = loader.into_config();

    if args.verbose > 0 {
        config.logging.verbosity = Verbosity::from_level(args.verbose);
        if args.verbose >= 2 {
            config.logging.level = "debug".to_string();
        }
    }
    // Command-line selection applies to whichever device the command talks to.
    if args.port.is_some() || args.vid.is_some() || args.pid.is_some() {
        config.device.port_name = args.port.clone();
        config.device.vid = args.vid.clone();
        config.device.pid = args.pid.clone();
        config.usb_switch.port_name = args.port.clone();
        if let Some(vid) = &args.vid {
            config.usb_switch.vid = vid.clone();
        }
        if let Some(pid) = &args.pid {
            config.usb_switch.pid = pid.clone();
        }
    }
    config
        .validate()
        .context("checking command-line device selection")?;
    Ok(config)
}

fn run(args: &Args, ctx: DeviceContext) -> CommandResult<Output> {
    match &args.command {
        Command::List => list_ports(ctx),
        Command::Send {
            text,
            timeout_ms,
            max_lines,
            until,
            skip_empty,
        } => {
            let mut transport = LineTransport::new(ConnectionManager::system(ctx));
            transport.reopen()?;
            transport.write_line(text)?;
            let options = ReadLinesOptions {
                max_count: *max_lines,
                skip_empty: *skip_empty,
                overall_timeout: Duration::from_millis(*timeout_ms),
                terminator: until.clone(),
            };
            let reply = transport.read_lines(&options);
            transport.close();
            match into_reply(reply) {
                (output, None) => Ok(output),
                (partial, Some(e)) => {
                    // Lines received before the fault are still shown.
                    print_output(partial, args.json);
                    Err(e)
                }
            }
        }
        command => {
            let mut switch = UsbSwitch::system(ctx);
            switch.connect()?;
            run_switch(&mut switch, command)
        }
    }
}

/// Split a multi-line reply into what to print and the error that cut it short.
fn into_reply(reply: Result<Vec<String>, ReadLinesError>) -> (Output, Option<CommandError>) {
    match reply {
        Ok(lines) => (Output::Lines(lines), None),
        Err(ReadLinesError { collected, error }) => (Output::Lines(collected), Some(error)),
    }
}

fn run_switch(switch: &mut UsbSwitch, command: &Command) -> CommandResult<Output> {
    match command {
        Command::On { number } => {
            switch.enable_port(*number)?;
            switch_state(switch)
        }
        Command::Off => {
            switch.disable_all()?;
            switch_state(switch)
        }
        Command::State => switch_state(switch),
        Command::Version => {
            let version = switch.get_firmware_version()?;
            Ok(Output::Value(json!(version), version.to_string()))
        }
        Command::Status => Ok(Output::Lines(switch.status()?)),
        Command::HelpDevice => Ok(Output::Lines(switch.help()?)),
        Command::Query { words } => Ok(Output::Lines(switch.query(&words.join(" "))?)),
        Command::Cycle { dwell_ms, pause_ms } => {
            let mut log = Vec::new();
            for port in [1u8, 2] {
                switch.enable_port(port)?;
                log.push(format!("port {port} on: {}", switch.query_state()?));
                std::thread::sleep(Duration::from_millis(*dwell_ms));
                switch.disable_all()?;
                log.push(format!("port {port} off: {}", switch.query_state()?));
                std::thread::sleep(Duration::from_millis(*pause_ms));
            }
            Ok(Output::Lines(log))
        }
        Command::List | Command::Send { .. } => Ok(Output::Lines(Vec::new())),
    }
}

fn switch_state(switch: &mut UsbSwitch) -> CommandResult<Output> {
    let state: SwitchState = switch.query_state()?;
    Ok(Output::Value(json!({ "state": state }), state.to_string()))
}

fn list_ports(ctx: DeviceContext) -> CommandResult<Output> {
    let settings = ctx.config().usb_switch.clone();
    let (vid, pid) = (parse_usb_id(&settings.vid)?, parse_usb_id(&settings.pid)?);

    let ports = Arc::new(SystemPorts);
    let locator = PortLocator::new(ports.clone(), ports, ctx);
    let found = locator.list()?;

    let rows = found
        .iter()
        .map(|port| {
            json!({
                "port_name": port.port_name,
                "usb_id": port.usb_id(),
                "manufacturer": port.manufacturer,
                "product": port.product,
                "serial_number": port.serial_number,
                "matches": port.matches(vid, pid),
            })
        })
        .collect::<Vec<_>>();

    let text = found
        .iter()
        .map(|port| {
            let marker = if port.matches(vid, pid) { "*" } else { " " };
            format!(
                "{marker} {:<24} {:<10} {}",
                port.port_name,
                port.usb_id().unwrap_or_else(|| "-".to_string()),
                port.product.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Output::Value(serde_json::Value::Array(rows), text))
}

fn print_output(output: Output, as_json: bool) {
    match output {
        Output::Lines(lines) if as_json => println!("{}", json!({ "lines": lines })),
        Output::Lines(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Output::Value(value, _) if as_json => println!("{value}"),
        Output::Value(_, text) => println!("{text}"),
    }
}
