//! Pairing Flow Demo - connects to the WhatsApp Web endpoint, runs the
//! Noise handshake, and drives a fresh device through QR pairing.
//!
//! Run with: `cargo run --example pairing_flow -- --ref <server-ref>`

use clap::Parser;

use wamd_engine::config::EngineConfig;
use wamd_engine::pairing::PairingSession;
use wamd_engine::socket::Session;
use wamd_engine::store::Device;

#[derive(Parser, Debug)]
#[command(about = "Pair a fresh device against the WhatsApp Web endpoint")]
struct Args {
    /// Server-issued `ref` value to embed in the QR code. In a real
    /// flow this comes from the first `<iq>` the server sends after
    /// the handshake completes; passed explicitly here for demo
    /// purposes since this binary does not yet drive that exchange.
    #[arg(long, default_value = "demo-ref")]
    server_ref: String,

    /// Skip the network connection and only exercise the local
    /// pairing state machine.
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              wamd-engine pairing flow demo                 ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    println!("📱 Step 1: Initializing device...");
    let mut device = Device::new();
    device.initialize();
    println!("   noise key:    {}...", &hex::encode(device.noise_key.as_ref().unwrap().public)[..16]);
    println!("   identity key: {}...", &hex::encode(device.identity_key.as_ref().unwrap().public)[..16]);
    println!();

    if !args.offline {
        let config = EngineConfig::default();
        println!("🌐 Step 2: Connecting to {}...", config.endpoint);
        match Session::connect(&config.endpoint, device.clone()).await {
            Ok(mut session) => {
                println!("   connected, handshake complete");
                println!();
                println!("🔐 Step 3: Waiting for the server to drive pairing...");
                loop {
                    match session.next_event().await {
                        Ok(Some(wamd_engine::types::Event::QRCode(qr))) => {
                            println!("   qr text: {}", qr.code);
                        }
                        Ok(Some(wamd_engine::types::Event::PairSuccess(success))) => {
                            println!("   paired as {}", success.device_jid);
                            break;
                        }
                        Ok(Some(wamd_engine::types::Event::Disconnected(_))) | Ok(None) => {
                            println!("   disconnected before pairing completed");
                            break;
                        }
                        Ok(Some(_)) => continue,
                        Err(e) => {
                            println!("   session error: {e}");
                            break;
                        }
                    }
                }
                return Ok(());
            }
            Err(e) => println!("   connection failed: {e} (continuing offline)"),
        }
        println!();
    }

    println!("🔐 Step 3: Generating pairing QR offline (no server `ref` available)...");
    let mut session = PairingSession::new(device);
    let code = session.qr_code(args.server_ref)?;
    println!("   qr text: {code}");
    println!();
    println!("{}", session.render_ascii()?);

    Ok(())
}
