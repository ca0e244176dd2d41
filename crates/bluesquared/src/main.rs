//! bluesquared - runs a bluesquare peripheral over stdin/stdout
//!
//! Inbound ATT PDUs are read as hex lines from stdin and the replies are
//! written to stdout, so the daemon can sit behind any process that owns
//! the actual radio link.

mod stdio;

use bluesquare::gap::{AdvertiseError, AdvertisementIntent, Advertiser};
use bluesquare::gatt::{ComputedValue, Declaration, Properties};
use bluesquare::{PeripheralConfig, PeripheralController, PeripheralOptions, Uuid};
use clap::Parser;
use log::{info, LevelFilter};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use stdio::StdioTransport;

const SQUARE_SERVICE: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_56789abcdef1);
const SQUARE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_56789abcdef2);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON peripheral configuration; defaults to the square service
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log every exchange
    #[arg(short, long)]
    verbose: bool,
}

/// Advertiser that only reports what it would advertise
struct LogAdvertiser;

impl Advertiser for LogAdvertiser {
    fn advertise(&mut self, intent: &AdvertisementIntent) -> Result<(), AdvertiseError> {
        let uuids: Vec<String> = intent.service_uuids.iter().map(Uuid::to_string).collect();
        info!(
            "advertising {:?} (discoverable: {}, pairable: {}) services [{}]",
            intent.local_name,
            intent.discoverable,
            intent.pairable,
            uuids.join(", ")
        );
        Ok(())
    }

    fn withdraw(&mut self) {
        info!("advertisement withdrawn");
    }
}

fn square_service() -> Vec<Declaration> {
    vec![
        Declaration::service(SQUARE_SERVICE),
        Declaration::computed(
            SQUARE_CHARACTERISTIC,
            Properties::READABLE | Properties::WRITABLE,
            ComputedValue::square_decimal(),
        ),
    ]
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let (options, declarations) = match &args.config {
        Some(path) => {
            let config = PeripheralConfig::load(path)?;
            (config.options(), config.declarations()?)
        }
        None => (PeripheralOptions::default(), square_service()),
    };

    let transport = StdioTransport::new();
    let running = PeripheralController::new(options).start(
        declarations,
        Box::new(transport.clone()),
        Box::new(LogAdvertiser),
    )?;
    for attr in running.table().iter() {
        info!(
            "0x{:04x} {:?} {} {:?}",
            attr.handle, attr.kind, attr.uuid, attr.properties
        );
    }

    let result = transport.run(io::stdin().lock(), io::stdout().lock());
    let stopped = running.stop();
    info!("{:?}", stopped.stats());
    Ok(result?)
}
