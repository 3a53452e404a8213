//! `arq-lab`: run the GBN/SR protocol pairs, simulated or over real UDP.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use arq_lab_core::{ArqConfig, ArqEndpoint, ChannelConfig, LossSimulator, ProtocolKind};
use arq_lab_protocols::{GbnReceiver, GbnSender, SrReceiver, SrSender};
use arq_lab_simulator::{SimulationReport, Simulator, run_scenario};
use arq_lab_udp::{UdpTransport, run_receiver, run_sender, stop_channel};

#[derive(Parser, Debug)]
#[command(author, version, about = "Go-Back-N / Selective-Repeat ARQ lab")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a transfer through the event-queue simulator.
    Sim(SimArgs),
    /// Run a live UDP sender endpoint.
    Send(UdpArgs),
    /// Run a live UDP receiver endpoint.
    Recv(UdpArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Protocol {
    Gbn,
    Sr,
}

impl From<Protocol> for ProtocolKind {
    fn from(p: Protocol) -> Self {
        match p {
            Protocol::Gbn => ProtocolKind::Gbn,
            Protocol::Sr => ProtocolKind::Sr,
        }
    }
}

#[derive(Args, Debug)]
struct TransferOpts {
    #[arg(long, value_enum, default_value_t = Protocol::Gbn)]
    protocol: Protocol,

    #[arg(long, default_value_t = 4)]
    window_size: u32,

    #[arg(long, default_value_t = 10)]
    total_packets: u32,

    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    #[arg(long, default_value_t = 8)]
    seq_modulus: u32,

    #[arg(long, default_value_t = 0.2)]
    loss_rate: f64,

    /// Seed for loss/latency randomness; omit for OS entropy (UDP) or 0 (sim).
    #[arg(long)]
    seed: Option<u64>,
}

impl TransferOpts {
    fn arq_config(&self) -> Result<ArqConfig> {
        let config = ArqConfig {
            window_size: self.window_size,
            total_packets: self.total_packets,
            timeout_ms: self.timeout_ms,
            seq_modulus: self.seq_modulus,
            loss_rate: self.loss_rate,
            seed: self.seed.unwrap_or(0),
        };
        config.validate(self.protocol.into())?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct SimArgs {
    #[command(flatten)]
    transfer: TransferOpts,

    /// Run a TOML scenario instead of the default transfer.
    #[arg(long)]
    scenario: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    min_latency: u64,

    #[arg(long, default_value_t = 100)]
    max_latency: u64,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct UdpArgs {
    #[command(flatten)]
    transfer: TransferOpts,

    /// Local address to bind.
    #[arg(long)]
    bind: SocketAddr,

    /// Fixed peer address.
    #[arg(long)]
    peer: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Sim(args) => run_sim(args),
        Command::Send(args) => run_udp_sender(args).await,
        Command::Recv(args) => run_udp_receiver(args).await,
    }
}

fn build_pair(
    kind: ProtocolKind,
    config: &ArqConfig,
) -> (Box<dyn ArqEndpoint>, Box<dyn ArqEndpoint>) {
    match kind {
        ProtocolKind::Gbn => (
            Box::new(GbnSender::new(config)),
            Box::new(GbnReceiver::new(config)),
        ),
        ProtocolKind::Sr => (
            Box::new(SrSender::new(config)),
            Box::new(SrReceiver::new(config)),
        ),
    }
}

fn transfer_payloads(total: u32) -> Vec<Vec<u8>> {
    (0..total).map(|i| format!("Packet-{i}").into_bytes()).collect()
}

fn run_sim(args: SimArgs) -> Result<()> {
    let kind: ProtocolKind = args.transfer.protocol.into();
    let config = args.transfer.arq_config()?;
    let (sender, receiver) = build_pair(kind, &config);

    let report = if let Some(path) = &args.scenario {
        let path = path
            .to_str()
            .context("scenario path contains invalid UTF-8")?;
        run_scenario(path, sender, receiver)?
    } else {
        let channel = ChannelConfig {
            loss_rate: config.loss_rate,
            min_latency: args.min_latency,
            max_latency: args.max_latency,
            seed: config.seed,
        };
        info!("simulating {kind} transfer of {} packets", config.total_packets);
        let mut sim = Simulator::new(channel, sender, receiver);
        for (i, payload) in transfer_payloads(config.total_packets).into_iter().enumerate() {
            sim.schedule_app_send(i as u64 * 100, payload);
        }
        sim.init();
        while sim.step() {
            if sim.current_time() > 600_000 {
                return Err(anyhow!("simulation did not converge within 600s"));
            }
        }
        info!(
            "done in {} ms: {} delivered, {} frames sent, {} acks",
            sim.current_time(),
            sim.delivered_data.len(),
            sim.sender_frame_count,
            sim.acks_sent.len()
        );
        sim.export_report()
    };

    if let Some(path) = &args.trace_out {
        write_trace(path, &report)?;
    }
    Ok(())
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("failed to serialize trace")?;
    fs::write(path, &data).with_context(|| format!("failed to write {}", path.display()))?;
    info!("trace written to {}", path.display());
    Ok(())
}

/// Wire Ctrl-C to the loops' stop signal.
fn spawn_ctrl_c_handler() -> tokio::sync::watch::Receiver<bool> {
    let (handle, rx) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            handle.stop();
        }
    });
    rx
}

async fn run_udp_sender(args: UdpArgs) -> Result<()> {
    let kind: ProtocolKind = args.transfer.protocol.into();
    let config = args.transfer.arq_config()?;
    let transport = UdpTransport::bind(args.bind).await?;
    info!(
        "{kind} sender on {} -> {}, {} packets",
        transport.local_addr(),
        args.peer,
        config.total_packets
    );
    let stop = spawn_ctrl_c_handler();
    let messages = transfer_payloads(config.total_packets);

    match kind {
        ProtocolKind::Gbn => {
            let mut sender = GbnSender::new(&config);
            run_sender(&mut sender, &transport, args.peer, messages, stop).await?;
        }
        ProtocolKind::Sr => {
            let mut sender = SrSender::new(&config);
            run_sender(&mut sender, &transport, args.peer, messages, stop).await?;
        }
    }
    Ok(())
}

async fn run_udp_receiver(args: UdpArgs) -> Result<()> {
    let kind: ProtocolKind = args.transfer.protocol.into();
    let config = args.transfer.arq_config()?;
    let transport = UdpTransport::bind(args.bind).await?;
    info!(
        "{kind} receiver on {} <- {}, expecting {} packets",
        transport.local_addr(),
        args.peer,
        config.total_packets
    );
    let stop = spawn_ctrl_c_handler();
    let loss = match args.transfer.seed {
        Some(seed) => LossSimulator::seeded(config.loss_rate, seed),
        None => LossSimulator::from_entropy(config.loss_rate),
    };

    let delivered = match kind {
        ProtocolKind::Gbn => {
            let mut receiver = GbnReceiver::new(&config);
            run_receiver(&mut receiver, &transport, args.peer, loss, stop).await?
        }
        ProtocolKind::Sr => {
            let mut receiver = SrReceiver::new(&config);
            run_receiver(&mut receiver, &transport, args.peer, loss, stop).await?
        }
    };

    for (i, payload) in delivered.iter().enumerate() {
        info!("[{i}] {}", String::from_utf8_lossy(payload));
    }
    Ok(())
}
