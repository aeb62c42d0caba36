//! topicfs - mount an MQTT broker's topic namespace as a filesystem.
//!
//! Every retained or live message is a regular file at the path of its
//! topic; reading yields the last payload, writing publishes, and the
//! directory tree follows broker traffic in real time.

mod client;
mod config;
mod error;
mod fs;
mod packet;
mod tree;
mod varint;
mod worker;

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use fuser::{MountOption, Session};
use log::{error, info};
use parking_lot::Mutex;

use crate::client::{ClientOptions, MqttClient};
use crate::config::Config;
use crate::tree::Tree;

struct Args {
    config_path: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    keepalive: Option<u16>,
    holdback_ms: Option<u64>,
    allow_other: bool,
    mountpoint: Option<PathBuf>,
}

fn invalid_argument(message: &str) -> ! {
    eprintln!("{}", message);
    eprintln!("Use --help for usage information");
    std::process::exit(libc::EINVAL);
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let Some(raw) = args.get(i + 1) else {
        invalid_argument(&format!("Error: {} requires a value", flag));
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => invalid_argument(&format!("Error: invalid value for {}: {}", flag, raw)),
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config_path: None,
        host: None,
        port: None,
        keepalive: None,
        holdback_ms: None,
        allow_other: false,
        mountpoint: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                parsed.config_path = Some(parse_value(&args, i, "-c"));
                i += 2;
            }
            "-H" | "--host" => {
                parsed.host = Some(parse_value(&args, i, "-H"));
                i += 2;
            }
            "-p" | "--port" => {
                parsed.port = Some(parse_value(&args, i, "-p"));
                i += 2;
            }
            "-k" | "--keepalive" => {
                parsed.keepalive = Some(parse_value(&args, i, "-k"));
                i += 2;
            }
            "-b" | "--holdback" => {
                parsed.holdback_ms = Some(parse_value(&args, i, "-b"));
                i += 2;
            }
            "--allow-other" => {
                parsed.allow_other = true;
                i += 1;
            }
            "-h" | "--help" => {
                println!("topicfs - mount an MQTT broker's topic namespace as a filesystem");
                println!();
                println!("Usage: topicfs [OPTIONS] <mountpoint>");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>     Config file path (default: topicfs.toml)");
                println!("  -H, --host <HOST>       Broker host (default: 127.0.0.1)");
                println!("  -p, --port <PORT>       Broker port (default: 1883)");
                println!("  -k, --keepalive <SECS>  CONNECT keepalive (default: 60)");
                println!("  -b, --holdback <MS>     Publish holdback in milliseconds (default: 0)");
                println!("      --allow-other       Let other users access the mount");
                println!("  -h, --help              Show this help message");
                println!();
                println!("Configuration:");
                println!("  Config file uses TOML format. All settings can be overridden");
                println!("  with environment variables using the TOPICFS__ prefix:");
                println!();
                println!("  TOPICFS__MQTT__HOST=broker.local");
                println!("  TOPICFS__MQTT__HOLDBACK_MS=500");
                println!("  TOPICFS__LOG__LEVEL=debug");
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => {
                invalid_argument(&format!("Unknown argument: {}", arg));
            }
            arg => {
                if parsed.mountpoint.is_some() {
                    invalid_argument("Error: more than one mountpoint given");
                }
                parsed.mountpoint = Some(PathBuf::from(arg));
                i += 1;
            }
        }
    }

    parsed
}

fn main() {
    let args = parse_args();

    let mut config = match Config::load(args.config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(libc::EINVAL);
        }
    };

    // CLI flags override file and environment.
    if let Some(host) = args.host {
        config.mqtt.host = host;
    }
    if let Some(port) = args.port {
        config.mqtt.port = port;
    }
    if let Some(keepalive) = args.keepalive {
        config.mqtt.keepalive = keepalive;
    }
    if let Some(holdback_ms) = args.holdback_ms {
        config.mqtt.holdback_ms = holdback_ms;
    }
    if args.allow_other {
        config.mount.allow_other = true;
    }
    if let Some(mountpoint) = args.mountpoint {
        config.mount.mountpoint = Some(mountpoint);
    }

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(libc::EINVAL);
    }
    let mountpoint = config.mount.mountpoint.clone().expect("validated above");

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.log.level),
    )
    .init();

    let tree = Arc::new(Mutex::new(Tree::new()));
    let notifier: Arc<OnceLock<fuser::Notifier>> = Arc::new(OnceLock::new());

    let client_options = ClientOptions {
        host: config.mqtt.host.clone(),
        port: config.mqtt.port,
        keepalive: config.mqtt.keepalive,
        holdback: Duration::from_millis(config.mqtt.holdback_ms),
        connect_timeout: Duration::from_secs(10),
    };
    let on_publish = {
        let tree = Arc::clone(&tree);
        let notifier = Arc::clone(&notifier);
        Box::new(move |topic: &[u8], payload: &[u8]| {
            fs::store_publish(&tree, &notifier, topic, payload);
        })
    };
    let client = match MqttClient::connect(&client_options, on_publish) {
        Ok(c) => c,
        Err(e) => {
            error!(
                "Failed to connect to broker {}:{}: {}",
                config.mqtt.host, config.mqtt.port, e
            );
            std::process::exit(1);
        }
    };
    info!(
        "Connected to broker {}:{} (keepalive {}s, holdback {}ms)",
        config.mqtt.host, config.mqtt.port, config.mqtt.keepalive, config.mqtt.holdback_ms
    );

    let mut mount_options = vec![
        MountOption::FSName("topicfs".to_string()),
        MountOption::NoSuid,
        MountOption::NoDev,
    ];
    if config.mount.allow_other {
        mount_options.push(MountOption::AllowOther);
    }

    let topicfs = fs::TopicFs::new(Arc::clone(&tree), client);
    let mut session = match Session::new(topicfs, mountpoint.as_path(), &mount_options) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to mount at {}: {}", mountpoint.display(), e);
            std::process::exit(1);
        }
    };
    // Publish wakeups can flow only from here on; no handle can have
    // existed earlier.
    let _ = notifier.set(session.notifier());

    info!("Mounted at {}", mountpoint.display());
    if let Err(e) = session.run() {
        error!("Filesystem loop failed: {}", e);
        std::process::exit(1);
    }
    info!("Unmounted, shutting down");
}
