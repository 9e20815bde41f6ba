//! TrieKV - A Memcached-Compatible In-Memory Cache Server
//!
//! This is the main entry point for the TrieKV server.
//! It sets up the TCP listener, the shared store with its background
//! crawler, and handles incoming connections.

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use triekv::connection::{handle_connection, ConnectionStats};
use triekv::store::{start_crawler, SharedStore};

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Cache memory budget in MiB
    memory_mib: u64,
    /// Per-item size limit in bytes
    item_size_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: triekv::DEFAULT_HOST.to_string(),
            port: triekv::DEFAULT_PORT,
            memory_mib: 512,
            item_size_limit: 1024 * 1024,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "-m" => {
                    if i + 1 < args.len() {
                        config.memory_mib = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid memory size");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: -m requires a value in MiB");
                        std::process::exit(1);
                    }
                }
                "-I" => {
                    if i + 1 < args.len() {
                        config.item_size_limit = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid item size limit");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: -I requires a value in bytes");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("TrieKV version {}", triekv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
TrieKV - A Memcached-Compatible In-Memory Cache Server

USAGE:
    triekv [OPTIONS]

OPTIONS:
        --host <HOST>    Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>    Port to listen on (default: 11211)
    -m <MIB>             Cache memory budget in MiB, 0 = unlimited (default: 512)
    -I <BYTES>           Max item size in bytes, 0 = unlimited (default: 1048576)
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    triekv                         # Start on 127.0.0.1:11211
    triekv -p 11212                # Start on port 11212
    triekv -m 1024 -I 4194304      # 1 GiB budget, 4 MiB max item

CONNECTING:
    Any memcached client works, or plain netcat:
    $ printf 'set greeting 0 0 5\r\nhello\r\nget greeting\r\n' | nc 127.0.0.1 11211
    STORED
    VALUE greeting 0 5
    hello
    END
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Create the shared store (shared across all connections)
    let store = Arc::new(SharedStore::with_limits(
        config.memory_mib * 1024 * 1024,
        config.item_size_limit,
    ));
    info!(
        memory_mib = config.memory_mib,
        item_size_limit = config.item_size_limit,
        "Store initialized"
    );

    // Start the background crawler
    let _crawler = start_crawler(Arc::clone(&store));

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener; a failure here is the only non-zero exit
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, store, stats) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    store: Arc<SharedStore>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let store = Arc::clone(&store);
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, store, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
