// CLASSIFICATION: COMMUNITY
// Filename: smpctl.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-08-02

use clap::{Parser, Subcommand};
use serde_json::json;

use smport::{metrics, sensor::PowerSensor, AccessMode, Generation, Message, MsgId, Platform};

#[derive(Parser)]
#[command(name = "smpctl", about = "Query and control the platform management port")]
struct Cli {
    /// Target socket index.
    #[arg(long, default_value_t = 0)]
    socket: u16,
    /// Use the second-generation mailbox placement.
    #[arg(long)]
    gen2: bool,
    /// Emit machine-readable JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the mailbox conformance check against the socket
    Test,
    /// Print controller protocol and firmware versions
    Version,
    /// Print socket power draw and limits
    Power,
    /// Set the socket power cap, milliwatts
    SetPowerCap { mw: u32 },
    /// Print one core's boost limit, MHz
    GetBoost { apic: u16 },
    /// Set the boost limit for every core on the socket, MHz
    SetBoost { mhz: u16 },
    /// Print the discovered socket/tile topology
    Topo,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let gen = if cli.gen2 { Generation::Gen2 } else { Generation::Gen1 };
    let platform = Platform::probe_system(gen)?;

    match cli.cmd {
        Cmd::Test => {
            let pattern = 0xDEAD_BEEFu32;
            let mut msg = Message::with_arg(MsgId::Test, cli.socket, pattern);
            platform.send(&mut msg, AccessMode::READ)?;
            let ok = msg.response[0] == pattern.wrapping_add(1);
            if cli.json {
                println!(
                    "{}",
                    json!({ "sent": pattern, "received": msg.response[0], "pass": ok })
                );
            } else {
                println!(
                    "socket {}: sent {pattern:#010x}, received {:#010x} ({})",
                    cli.socket,
                    msg.response[0],
                    if ok { "pass" } else { "FAIL" }
                );
            }
            if !ok {
                std::process::exit(1);
            }
        }
        Cmd::Version => {
            let fw = metrics::firmware_version(&platform, cli.socket)?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "protocol": platform.protocol_version(),
                        "firmware": fw,
                    })
                );
            } else {
                println!("protocol version: {}", platform.protocol_version());
                println!("firmware version: {fw:#x}");
            }
        }
        Cmd::Power => {
            let sensor = PowerSensor::new(&platform, cli.socket);
            let input = sensor.input_uw()?;
            let cap = sensor.cap_uw()?;
            let cap_max = sensor.cap_max_uw()?;
            if cli.json {
                println!(
                    "{}",
                    json!({ "input_uw": input, "cap_uw": cap, "cap_max_uw": cap_max })
                );
            } else {
                println!("power draw: {} mW", input / 1000);
                println!("power cap:  {} mW (max {} mW)", cap / 1000, cap_max / 1000);
            }
        }
        Cmd::SetPowerCap { mw } => {
            metrics::set_socket_power_limit(&platform, cli.socket, mw)?;
            println!("socket {}: power cap set to {mw} mW", cli.socket);
        }
        Cmd::GetBoost { apic } => {
            let mhz = metrics::core_boost_limit(&platform, cli.socket, apic)?;
            if cli.json {
                println!("{}", json!({ "apic": apic, "boost_mhz": mhz }));
            } else {
                println!("core {apic}: boost limit {mhz} MHz");
            }
        }
        Cmd::SetBoost { mhz } => {
            metrics::set_socket_boost_limit(&platform, cli.socket, mhz)?;
            println!("socket {}: boost limit set to {mhz} MHz", cli.socket);
        }
        Cmd::Topo => {
            let topo = platform.topology();
            if cli.json {
                let tiles: Vec<_> = topo
                    .tiles()
                    .iter()
                    .map(|t| {
                        json!({
                            "socket": t.socket_id,
                            "tile": t.local_id,
                            "bus_base": t.bus_base,
                            "bus_limit": t.bus_limit,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    json!({ "sockets": topo.num_sockets(), "tiles": tiles })
                );
            } else {
                println!("{} socket(s)", topo.num_sockets());
                for t in topo.tiles() {
                    println!(
                        "socket {} tile {}: buses {:#04x}..={:#04x}",
                        t.socket_id, t.local_id, t.bus_base, t.bus_limit
                    );
                }
            }
        }
    }

    Ok(())
}
