use clap::{value_t, App, Arg};
use crossbeam::crossbeam_channel;
use lls_packets::MacAddr;
use lls_runtime::cache::{Lookup, Resolution};
use lls_runtime::channel::HolderId;
use lls_runtime::config::{CacheConfig, LlsConfig};
use lls_runtime::context::LlsContext;
use lls_runtime::interface::{Interface, Interfaces, PortAnnotated};
use lls_runtime::io::{BufferBudget, ChannelIo};
use lls_runtime::lifecycle::Lifecycle;
use lls_runtime::runner::run_lls;
use segment::Host;
use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;
use tracing::{error, info, Level};

mod segment;

const GATEWAY_PORT: u16 = 0;

fn main() {
    let matches = App::new("ARP loopback")
        .version("0.1")
        .author("Route-rs Contributors")
        .about("Runs the LLS owning core against a simulated LAN segment")
        .arg(
            Arg::with_name("hosts")
                .short("n")
                .long("hosts")
                .value_name("COUNT")
                .help("Hosts answering on the segment")
                .default_value("4")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("attempts")
                .short("a")
                .long("attempts")
                .value_name("COUNT")
                .help("Requests sent before a resolution fails")
                .default_value("3")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("retry_ms")
                .short("r")
                .long("retry-ms")
                .value_name("MILLIS")
                .help("Spacing between requests, also the aging tick")
                .default_value("200")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ttl")
                .short("t")
                .long("ttl")
                .value_name("SECS")
                .help("Lifetime of a confirmed mapping")
                .default_value("30")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log every dropped frame and request"),
        )
        .get_matches();

    let hosts = value_t!(matches, "hosts", u8).unwrap_or_else(|e| e.exit());
    let attempts = value_t!(matches, "attempts", u32).unwrap_or_else(|e| e.exit());
    let retry_ms = value_t!(matches, "retry_ms", u64).unwrap_or_else(|e| e.exit());
    let ttl_secs = value_t!(matches, "ttl", u64).unwrap_or_else(|e| e.exit());
    let retry = Duration::from_millis(retry_ms);
    let ttl = Duration::from_secs(ttl_secs);
    let level = if matches.is_present("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = tracing_subscriber::fmt().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let gateway = Ipv4Addr::new(10, 0, 0, 1);
    let interfaces = Interfaces::new(vec![Interface::new(
        "lan",
        GATEWAY_PORT,
        MacAddr::new([0x02, 0, 0, 0, 0, 0x01]),
    )
    .ipv4(gateway, Ipv4Addr::new(255, 255, 255, 0))]);

    let config = LlsConfig::new()
        .arp(CacheConfig::new(4).ttl(ttl).refresh_lead(ttl / 4))
        .max_attempts(attempts)
        .retry_interval(retry)
        .aging_interval(retry)
        .dump_interval(Some(Duration::from_secs(1)));

    let (wire_tx, wire_rx) = crossbeam_channel::bounded(256);
    let (inbound_tx, inbound_rx) = crossbeam_channel::bounded(256);
    let budget = BufferBudget::new(64);
    let lifecycle = Lifecycle::new();

    let io = ChannelIo::new(wire_tx, budget.clone());
    let mut context = match LlsContext::new(config, interfaces, io, inbound_rx, lifecycle.clone()) {
        Ok(context) => context,
        Err(err) => {
            error!(%err, "could not set up the owning core");
            std::process::exit(1);
        }
    };
    let (worker, _) = context.register(HolderId(1));

    let segment_hosts: Vec<Host> = (0..hosts).map(Host::numbered).collect();
    let first = segment_hosts.first().copied();
    let greeting = inbound_tx.clone();
    let segment = {
        let hosts = segment_hosts.clone();
        thread::spawn(move || segment::run(wire_rx, inbound_tx, budget, hosts))
    };
    let owner = thread::spawn(move || run_lls(context));

    // a host announces itself to the gateway before anyone asks for it
    if let Some(host) = first {
        let _ = greeting.send(PortAnnotated {
            packet: segment::ask_gateway(host, gateway),
            port: GATEWAY_PORT,
            queue: 0,
        });
    }
    drop(greeting);

    let absent = Ipv4Addr::new(10, 0, 0, 200);
    let mut wanted: Vec<Ipv4Addr> = segment_hosts.iter().map(|h| h.ip).collect();
    wanted.push(absent);
    for addr in &wanted {
        if let Err(err) = worker.hold(*addr, GATEWAY_PORT) {
            error!(%addr, %err, "hold not submitted");
        }
    }

    let deadline = retry * (attempts + 2) + Duration::from_secs(2);
    let mut outstanding = wanted.len();
    while outstanding > 0 {
        match worker.notices().recv_timeout(deadline) {
            Ok(Resolution::Resolved(mapping)) => {
                info!(addr = %mapping.addr, mac = %mapping.mac, "resolved");
                outstanding -= 1;
            }
            Ok(Resolution::Failed(addr)) => {
                info!(%addr, "resolution failed");
                outstanding -= 1;
            }
            Err(_) => {
                error!(outstanding, "gave up waiting for notices");
                break;
            }
        }
    }

    for addr in &wanted {
        match worker.lookup(addr) {
            Lookup::Resolved(mapping) => println!("{} is at {}", addr, mapping.mac),
            Lookup::Unresolved => println!("{} is unresolved", addr),
            Lookup::Absent => println!("{} is unknown", addr),
        }
        let _ = worker.release(*addr);
    }

    lifecycle.request_exit();
    match owner.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(%err, "runtime failed"),
        Err(_) => error!("owning core panicked"),
    }
    let answered = segment.join().unwrap_or(0);
    println!("The segment answered {} requests", answered);
}
