use std::io::{self, Read, Write};
use std::net::SocketAddrV4;

use clap::{Args, Parser, Subcommand};
use tcpcore::{Interface, TcpConfig, WrappingInt32};

/// Reliable byte streams over a tun device, with TCP implemented in user space.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Name of the tun interface to attach to.
    #[arg(short, long, default_value = "tun0")]
    iface: String,

    #[command(flatten)]
    tcp: TcpArgs,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Args)]
struct TcpArgs {
    /// Receive buffer capacity in bytes.
    #[arg(long, default_value_t = tcpcore::tcp::config::DEFAULT_CAPACITY)]
    recv_capacity: usize,
    /// Send buffer capacity in bytes.
    #[arg(long, default_value_t = tcpcore::tcp::config::DEFAULT_CAPACITY)]
    send_capacity: usize,
    /// Initial retransmission timeout in milliseconds.
    #[arg(long, default_value_t = tcpcore::tcp::config::TIMEOUT_DFLT)]
    rt_timeout: u64,
    /// Consecutive retransmissions before giving up.
    #[arg(long, default_value_t = tcpcore::tcp::config::MAX_RETX_ATTEMPTS)]
    max_retx: u32,
    /// Largest payload per segment.
    #[arg(long, default_value_t = tcpcore::tcp::config::MAX_PAYLOAD_SIZE)]
    max_payload: usize,
    /// Use this initial sequence number instead of a generated one.
    #[arg(long)]
    isn: Option<u32>,
    /// Back off on unanswered zero-window probes too.
    #[arg(long)]
    backoff_zero_window: bool,
}

impl From<TcpArgs> for TcpConfig {
    fn from(args: TcpArgs) -> Self {
        TcpConfig {
            recv_capacity: args.recv_capacity,
            send_capacity: args.send_capacity,
            rt_timeout: args.rt_timeout,
            max_retx_attempts: args.max_retx,
            max_payload_size: args.max_payload,
            fixed_isn: args.isn.map(WrappingInt32::new),
            backoff_zero_window: args.backoff_zero_window,
        }
    }
}

#[derive(Subcommand)]
enum Mode {
    /// Accept one connection and copy what it sends to stdout.
    Listen {
        /// Local address to accept on (e.g. 192.168.0.2:6000).
        addr: SocketAddrV4,
    },
    /// Connect, send stdin, then print whatever comes back.
    Connect {
        /// Our address on the tun network.
        local: SocketAddrV4,
        /// Address of the peer.
        remote: SocketAddrV4,
    },
}

fn main() -> io::Result<()> {
    // Set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let nic = tun_tap::Iface::without_packet_info(&cli.iface, tun_tap::Mode::Tun)?;
    let config = TcpConfig::from(cli.tcp);

    let mut stream = match cli.mode {
        Mode::Listen { addr } => Interface::accept(nic, config, addr)?,
        Mode::Connect { local, remote } => {
            let mut stream = Interface::connect(nic, config, local, remote)?;
            let mut input = Vec::new();
            io::stdin().read_to_end(&mut input)?;
            stream.write_all(&input)?;
            stream.shutdown()?;
            stream
        }
    };

    let mut stdout = io::stdout();
    io::copy(&mut stream, &mut stdout)?;
    stdout.flush()?;

    stream.shutdown()?;
    stream.wait_closed()?;
    log::info!("connection closed");
    Ok(())
}
