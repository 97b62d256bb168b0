//! List connected RayNeo glasses and the interface each profile would bind.

use rayneo::descriptor::{self, SelectionPolicy};
use rayneo::{Profile, ReadStrategy, StreamConfig};

fn main() {
    env_logger::init();

    let config = StreamConfig::from_env();
    let devices = match rayneo::device::list_devices(config.vendor_id, config.product_id) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Found {} device(s) with VID={:04X} PID={:04X}:",
        devices.len(),
        config.vendor_id,
        config.product_id
    );
    for (i, dev) in devices.iter().enumerate() {
        println!("  [{}] bus {} addr {}", i, dev.bus_number, dev.address);
        for iface in &dev.interfaces {
            println!(
                "      interface {} alt {} class 0x{:02x}",
                iface.number, iface.alt_setting, iface.class_code
            );
            for ep in &iface.endpoints {
                println!(
                    "        ep 0x{:02x} {:?} {:?} max {}",
                    ep.address, ep.direction, ep.kind, ep.max_packet_size
                );
            }
        }
        for profile in [Profile::RawImu64, Profile::FirmwarePose16] {
            for strategy in [ReadStrategy::Stream, ReadStrategy::GetReport] {
                let policy = SelectionPolicy::for_strategy(profile, strategy);
                match descriptor::select(&policy, &dev.interfaces) {
                    Ok(b) => println!(
                        "      {:?}/{:?}: interface {} in={:?} out={:?}",
                        profile,
                        strategy,
                        b.interface,
                        b.endpoint_in.map(|ep| ep.address),
                        b.endpoint_out.map(|ep| ep.address)
                    ),
                    Err(e) => println!("      {:?}/{:?}: {}", profile, strategy, e),
                }
            }
        }
    }
}
