use std::io::BufRead;
use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use structopt::StructOpt;

use paxos_kv::{external, ClientRequest, ClientResponse};

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(StructOpt)]
#[structopt(name = "paxos-kv-client")]
struct Opt {
    /// Client addresses of the replicas to talk to
    #[structopt(short = "s", long = "servers", required = true)]
    servers: Vec<SocketAddr>,

    /// Pre-populate key1..key5 before entering the interactive loop
    #[structopt(long = "prepopulate")]
    prepopulate: bool,
}

enum Command {
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    GetAll,
    Help,
    Quit,
}

fn usage() {
    println!(
        "{}{}{}{}{}{}",
        "--------------------------------------------------\n",
        "PUT <key> <value>  -- write through consensus\n",
        "GET <key>          -- read from one replica\n",
        "DELETE <key>       -- delete through consensus\n",
        "GETALL             -- list one replica's contents\n",
        "QUIT               -- exit",
    );
}

impl std::str::FromStr for Command {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut iter = s.trim().splitn(3, ' ');
        match iter.next().map(str::to_uppercase).as_deref() {
        | Some("PUT") => {
            let key = iter.next().ok_or(())?;
            let value = iter.next().ok_or(())?;
            Ok(Command::Put {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
        | Some("GET") => {
            let key = iter.next().ok_or(())?;
            Ok(Command::Get { key: key.to_string() })
        }
        | Some("DELETE") => {
            let key = iter.next().ok_or(())?;
            Ok(Command::Delete { key: key.to_string() })
        }
        | Some("GETALL") => Ok(Command::GetAll),
        | Some("HELP") | Some("H") => Ok(Command::Help),
        | Some("QUIT") | Some("Q") => Ok(Command::Quit),
        | _ => Err(()),
        }
    }
}

impl Command {
    fn into_request(self) -> Option<ClientRequest> {
        match self {
        | Command::Put { key, value } => Some(ClientRequest::Put { key, value }),
        | Command::Get { key } => Some(ClientRequest::Get { key }),
        | Command::Delete { key } => Some(ClientRequest::Delete { key }),
        | Command::GetAll => Some(ClientRequest::GetAll),
        | Command::Help | Command::Quit => None,
        }
    }
}

/// Sends one request to a randomly chosen replica, dialing a fresh
/// connection for the exchange.
async fn send(servers: &[SocketAddr], request: ClientRequest) -> Result<ClientResponse, paxos_kv::Error> {
    let addr = servers[rand::thread_rng().gen_range(0..servers.len())];
    let stream = tokio::net::TcpStream::connect(addr).await?;
    let (mut rx, mut tx) = external::split::<ClientResponse, ClientRequest>(stream);
    tx.send(&request).await?;
    match rx.recv().await {
    | Some(result) => result,
    | None => Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into()),
    }
}

/// Retries a request against (possibly different) replicas before giving up.
async fn send_with_retry(servers: &[SocketAddr], request: ClientRequest) {
    for attempt in 1..=MAX_RETRIES {
        match send(servers, request.clone()).await {
        | Ok(response) => {
            println!("{}", response);
            return;
        }
        | Err(error) => {
            eprintln!("attempt {} failed: {}", attempt, error);
            if attempt < MAX_RETRIES {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
        }
    }
    eprintln!("giving up after {} attempts", MAX_RETRIES);
}

async fn prepopulate(servers: &[SocketAddr]) {
    println!("Pre-populating key-value store...");
    for i in 1..=5 {
        send_with_retry(servers, ClientRequest::Put {
            key: format!("key{}", i),
            value: format!("value{}", i),
        }).await;
    }
    println!("Verifying pre-populated data...");
    for i in 1..=5 {
        send_with_retry(servers, ClientRequest::Get {
            key: format!("key{}", i),
        }).await;
    }
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    if opt.prepopulate {
        prepopulate(&opt.servers).await;
    }

    usage();
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
        | Ok(line) => line,
        | Err(error) => {
            eprintln!("failed to read command: {}", error);
            break;
        }
        };
        match line.parse::<Command>() {
        | Ok(Command::Quit) => break,
        | Ok(Command::Help) => usage(),
        | Ok(command) => {
            if let Some(request) = command.into_request() {
                send_with_retry(&opt.servers, request).await;
            }
        }
        | Err(()) => {
            eprintln!("unrecognized command: {:?}", line);
            usage();
        }
        }
    }
    println!("Client shutting down...");
}
