use clap::Parser;
use rpdp11::core::config::{Config, DiskSlot};
use rpdp11::core::emu::{EMU_BUILD_DATE_TIME, EMU_NAME, EMU_VERSION, Pdp1140};
use rpdp11::core::rk11::Rk05;
use rpdp11::log::Logger;
use std::io::Read;
use std::path::PathBuf;
use std::process::exit;
use std::thread;
use tracing::{error, info};

/// PDP-11/40 emulator that boots Sixth Edition UNIX from RK05 packs.
#[derive(Parser)]
#[command(name = "rpdp11", version, about)]
struct Args {
    /// RK05 disk image for drive 0
    image: Option<PathBuf>,
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log filter (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    let _logger = Logger::new(&config.log_level);

    info!(
        "Welcome to {} v{} compiled on {}",
        EMU_NAME, EMU_VERSION, EMU_BUILD_DATE_TIME
    );

    if let Some(image) = &args.image {
        // the command line wins over the configured drive 0
        config.disks.retain(|slot| slot.drive != 0);
        config.disks.push(DiskSlot {
            drive: 0,
            path: image.display().to_string(),
            write_locked: false,
        });
    }
    if config.disks.is_empty() {
        error!("no RK05 image attached, nothing to boot");
        exit(1);
    }

    let mut pdp = Pdp1140::new();
    for slot in &config.disks {
        match Rk05::load_from_file(&slot.path) {
            Ok(mut unit) => {
                unit.set_locked(slot.write_locked);
                if let Err(e) = pdp.attach_unit(slot.drive, unit) {
                    error!("cannot attach {}: {e}", slot.path);
                    exit(1);
                }
            }
            Err(e) => {
                error!("cannot load {}: {e}", slot.path);
                exit(1);
            }
        }
    }

    if let Err(e) = pdp.boot() {
        error!("cannot load the boot ROM: {e}");
        exit(1);
    }

    let keyboard = pdp.input_channel();
    thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1];
        loop {
            match stdin.read(&mut buf) {
                Ok(1) => {
                    if keyboard.send(buf[0]).is_err() {
                        return;
                    }
                }
                Ok(_) => return, // EOF
                Err(e) => {
                    error!("stdin read failed: {e}");
                    return;
                }
            }
        }
    });

    let halt = pdp.run();
    error!("machine stopped: {halt}");
    exit(1);
}
