//! Burrow - a caching DNS forwarding proxy.
//!
//! Listens for DNS queries over UDP and TCP, answers them from a static
//! hosts table or an RFC-conformant response cache, and forwards everything
//! else to the configured upstream servers.

use burrow::config::{load_config, Config};
use burrow::dns::cache::CachingResolver;
use burrow::dns::message::{
    Message, Name, Question, RecordType, Resource, ResourceBody, ResourceHeader, CLASS_IN,
};
use burrow::dns::packet::{PacketResolver, PacketResolverConfig};
use burrow::dns::resolver::{Stats, StatsHandle};
use burrow::dns::resolvers::StaticResolver;
use burrow::dns::server::Server;
use burrow::dns::upstream::UpstreamResolver;
use burrow::logging;

use std::collections::HashMap;
use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{error, info};

/// TTL served for entries from the static hosts table.
const HOSTS_TTL: u32 = 3600;

const DEFAULT_UPSTREAM: &str = "8.8.8.8:53";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();

    // Parse command line arguments
    let mut config_path: Option<&str> = None;
    let mut cli_udp_addr: Option<String> = None;
    let mut cli_tcp_addr: Option<String> = None;
    let mut cli_upstream: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                config_path = args.get(i).map(|s| s.as_str());
            }
            "--udp" => {
                i += 1;
                cli_udp_addr = args.get(i).cloned();
            }
            "--tcp" => {
                i += 1;
                cli_tcp_addr = args.get(i).cloned();
            }
            "--upstream" => {
                i += 1;
                cli_upstream = args.get(i).cloned();
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    // Load config from file; CLI arguments override config values.
    let mut config = load_config(config_path)?;
    if cli_udp_addr.is_some() {
        config.listen_udp = cli_udp_addr;
    }
    if cli_tcp_addr.is_some() {
        config.listen_tcp = cli_tcp_addr;
    }
    if let Some(upstream) = cli_upstream {
        config.upstreams = vec![upstream];
    }
    if config.upstreams.is_empty() {
        config.upstreams.push(DEFAULT_UPSTREAM.to_string());
    }

    let _log_guard = logging::init_logging(&config.logging);
    tracing::debug!(config = ?config, "Configuration loaded");

    let mut upstream_addrs = Vec::new();
    for upstream in &config.upstreams {
        let addr: SocketAddr = upstream.parse()?;
        upstream_addrs.push(addr);
    }

    // Resolver stack, innermost first: upstream forwarding, static hosts
    // overrides, response cache, packet adapter.
    let stats = Arc::new(Stats::default());
    let upstream = UpstreamResolver::new(upstream_addrs, config.upstream.to_upstream_config());
    let hosts = StaticResolver::new(hosts_table(&config)?, upstream);
    let cache = CachingResolver::new(
        config
            .cache
            .to_cache_config(StatsHandle::new(Arc::clone(&stats)))?,
        hosts,
    );
    let packet = PacketResolver::new(
        PacketResolverConfig {
            stats: StatsHandle::new(Arc::clone(&stats)),
        },
        cache,
    );
    let server = Arc::new(Server::new(config.server.to_server_config(), packet));

    info!(
        upstreams = ?config.upstreams,
        hosts = config.hosts.len(),
        reordering = %config.cache.reordering,
        negative_caching = config.cache.enable_negative_caching,
        cache_max_size = config.cache.max_size,
        "resolver stack ready"
    );

    // Periodically log the resolver counters.
    let stats_log = Arc::clone(&stats);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            info!(
                questions = stats_log.questions(),
                answers = stats_log.answers(),
                deferrals = stats_log.deferrals(),
                rejected = stats_log.rejected(),
                errors = stats_log.errors(),
                "resolver stats"
            );
        }
    });

    let tcp_task = match &config.listen_tcp {
        Some(addr) => {
            let listener = TcpListener::bind(addr).await?;
            info!(listen = %addr, "TCP DNS server started");
            let server = Arc::clone(&server);
            Some(tokio::spawn(async move { server.serve_tcp(listener).await }))
        }
        None => None,
    };

    match &config.listen_udp {
        Some(addr) => {
            let socket = UdpSocket::bind(addr).await?;
            info!(listen = %addr, "UDP DNS server started");
            server.serve_udp(socket).await?;
        }
        None => match tcp_task {
            Some(task) => task.await??,
            None => {
                error!("no listen addresses configured");
                return Err("no listen addresses configured".into());
            }
        },
    }
    Ok(())
}

/// Builds the static lookup table from the `hosts` config section.
fn hosts_table(
    config: &Config,
) -> Result<HashMap<Question, Message>, Box<dyn std::error::Error + Send + Sync>> {
    let mut table = HashMap::new();
    for (name, ip) in &config.hosts {
        let name = Name::new(name)?;
        let addr: Ipv4Addr = ip.parse()?;
        let question = Question {
            name: name.clone(),
            rtype: RecordType::A,
            class: CLASS_IN,
        };
        let message = Message {
            answers: vec![Resource {
                header: ResourceHeader {
                    name,
                    rtype: RecordType::A,
                    class: CLASS_IN,
                    ttl: HOSTS_TTL,
                },
                body: ResourceBody::A(addr.octets()),
            }],
            ..Message::default()
        };
        table.insert(question, message);
    }
    Ok(table)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [options]", program);
    eprintln!();
    eprintln!("Caching DNS forwarding proxy.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <path>   Load config from YAML file");
    eprintln!("  --udp <addr>          UDP listen address (e.g., 0.0.0.0:53)");
    eprintln!("  --tcp <addr>          TCP listen address (e.g., 0.0.0.0:53)");
    eprintln!("  --upstream <addr>     Upstream DNS server (default: {})", DEFAULT_UPSTREAM);
    eprintln!("  -h, --help            Show this help message");
    eprintln!();
    eprintln!("Config file (config.yaml):");
    eprintln!("  listen_udp: \"127.0.0.1:5353\"");
    eprintln!("  upstreams:");
    eprintln!("    - \"8.8.8.8:53\"");
    eprintln!("  cache:");
    eprintln!("    reordering: \"rotation\"");
    eprintln!("    enable_negative_caching: true");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --udp 0.0.0.0:53", program);
    eprintln!("  {} --config config.yaml", program);
    eprintln!();
    eprintln!("Client usage:");
    eprintln!("  dig @127.0.0.1 -p 5353 example.com");
}
