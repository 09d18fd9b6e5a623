//! Binary entry point: option parsing, logging, serial and socket setup.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::{TcpListener, UnixListener};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::info;
use tracing_subscriber::EnvFilter;

use onkyocontrol::{Daemon, OnkyoError, Result};

/// Default TCP service port when no listener is configured.
const DEFAULT_PORT: u16 = 8701;

#[derive(Parser, Debug)]
#[command(name = "onkyocontrol", version, about = "Onkyo receiver control daemon")]
struct Args {
    /// Listen on a TCP address; HOST may be omitted or "any" to listen on
    /// all interfaces
    #[arg(long, value_name = "HOST:PORT")]
    bind: Vec<String>,

    /// Listen on a UNIX domain socket at the given path
    #[arg(long, value_name = "PATH")]
    socket: Vec<PathBuf>,

    /// Serial device the receiver is connected to
    #[arg(long, value_name = "DEVICE", default_value = "/dev/ttyS0")]
    serial: String,

    /// Write logs to FILE instead of standard output
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Fork into the background after startup
    #[arg(long)]
    daemon: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    // Fork before the runtime exists; a forked tokio runtime is not usable.
    if args.daemon {
        daemonize()?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let mut daemon = Daemon::new();

    let port = tokio_serial::new(&args.serial, 9600)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()?;
    info!("receiver on {}", args.serial);
    daemon.add_receiver(&args.serial, Box::new(port));

    let binds = if args.bind.is_empty() && args.socket.is_empty() {
        vec![format!("any:{DEFAULT_PORT}")]
    } else {
        args.bind.clone()
    };
    for spec in &binds {
        let addr = parse_bind(spec)?;
        let listener = TcpListener::bind(&addr).await?;
        info!("listening on {addr}");
        daemon.add_tcp_listener(listener);
    }
    for path in &args.socket {
        // A stale socket from a previous run would make bind fail.
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        info!("listening on {}", path.display());
        daemon.add_unix_listener(listener, path.clone());
    }

    daemon.run().await
}

/// Turn a `HOST:PORT`, `any:PORT` or bare `PORT` argument into a bindable
/// address string.
fn parse_bind(spec: &str) -> Result<String> {
    let (host, port) = match spec.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => ("", spec),
    };
    if port.parse::<u16>().is_err() {
        return Err(OnkyoError::BindAddress(spec.to_string()));
    }
    let host = match host {
        "" | "any" => "0.0.0.0",
        other => other,
    };
    Ok(format!("{host}:{port}"))
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("onkyocontrol=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &args.log {
        Some(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            builder.with_writer(Arc::new(file)).with_ansi(false).init();
        }
        None => builder.init(),
    }
    Ok(())
}

/// Classic double fork so the daemon detaches from its controlling
/// terminal. Standard streams are pointed at /dev/null; use `--log` to
/// keep logs.
fn daemonize() -> Result<()> {
    // SAFETY: we are single-threaded here (no runtime yet), and only
    // async-signal-safe libc calls happen between fork and return.
    unsafe {
        match libc::fork() {
            -1 => return Err(std::io::Error::last_os_error().into()),
            0 => {}
            _ => libc::_exit(0),
        }
        if libc::setsid() == -1 {
            return Err(std::io::Error::last_os_error().into());
        }
        match libc::fork() {
            -1 => return Err(std::io::Error::last_os_error().into()),
            0 => {}
            _ => libc::_exit(0),
        }
        libc::chdir(c"/".as_ptr());
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_RDWR);
        if devnull >= 0 {
            libc::dup2(devnull, 0);
            libc::dup2(devnull, 1);
            libc::dup2(devnull, 2);
            if devnull > 2 {
                libc::close(devnull);
            }
        }
    }
    Ok(())
}
