use std::net::SocketAddr;

use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "paxos-kv-server")]
struct Opt {
    /// Unique replica ID; indexes into the cluster list
    #[structopt(short = "i", long = "id")]
    id: usize,

    /// Address to serve client requests on
    #[structopt(short = "c", long = "client-addr")]
    client_addr: SocketAddr,

    /// Peer addresses of every cluster member, in replica-ID order
    /// (this replica's own entry is its peer listen address)
    #[structopt(short = "p", long = "peers", required = true)]
    peers: Vec<SocketAddr>,

    /// Enable the chaos fault injector against this replica's acceptor
    #[structopt(long = "fault-injection")]
    fault_injection: bool,

    /// Log level (error, warn, info, debug, trace)
    #[structopt(short = "l", long = "log-level", default_value = "info")]
    log_level: log::LevelFilter,
}

fn init_logger(id: usize, level: log::LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}][replica-{}][{}] {}",
                record.level(),
                id,
                record.target(),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    if let Err(error) = init_logger(opt.id, opt.log_level) {
        eprintln!("failed to initialize logging: {}", error);
        std::process::exit(1);
    }

    let config = paxos_kv::Config::new(opt.id, opt.client_addr, opt.peers)
        .with_fault_injection(opt.fault_injection);

    match config.run().await {
    | Ok(_replica) => {
        // Listeners run on their own tasks; keep the process alive.
        if let Err(error) = tokio::signal::ctrl_c().await {
            log::error!("failed to wait for shutdown signal: {}", error);
        }
        log::info!("shutting down");
    }
    | Err(error) => {
        log::error!("failed to start replica: {}", error);
        std::process::exit(1);
    }
    }
}
