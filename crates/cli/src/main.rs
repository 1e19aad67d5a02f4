use std::thread;

use anyhow::Result;
use clap::Parser;

use meshnet::{Encoding, EndpointConfig, Payload, TcpClient, TcpServer, UdpClient, UdpServer};

#[derive(Parser)]
#[command(name = "meshnet")]
#[command(about = "TCP/UDP endpoint launcher")]
struct Args {
    /// Run listening server loops and print each received payload
    #[arg(short = 's', long)]
    serve: bool,

    /// Connect once and send a payload over UDP, then TCP
    #[arg(short = 'c', long)]
    connect: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 12348)]
    port: u16,

    /// Payload for client mode
    #[arg(short, long, default_value = "Hello")]
    message: String,

    /// Received bytes to echo into the log on each accept
    #[arg(long, default_value_t = 30)]
    preview: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.serve {
        run_servers(&args)
    } else if args.connect {
        run_client(&args)
    } else {
        anyhow::bail!("pass -s to serve or -c to connect")
    }
}

fn run_servers(args: &Args) -> Result<()> {
    let mut udp = UdpServer::bind(EndpointConfig {
        host: args.host.clone(),
        port: args.port,
        identifier: "udp server".to_owned(),
        preview_len: args.preview,
        ..Default::default()
    })?;

    thread::spawn(move || {
        loop {
            match udp.listen(Encoding::Raw) {
                Ok(transmission) => println!("{}", transmission),
                Err(e) => log::warn!("{}", e),
            }
        }
    });

    let mut tcp = TcpServer::bind(EndpointConfig {
        host: args.host.clone(),
        port: args.port,
        identifier: "tcp server".to_owned(),
        ack: Some(b"ACK".to_vec()),
        preview_len: args.preview,
        ..Default::default()
    })?;

    // A failed call leaves the server able to serve the next one.
    loop {
        match tcp.listen(Encoding::Raw) {
            Ok(transmission) => println!("{}", transmission),
            Err(e) => log::warn!("{}", e),
        }
    }
}

fn run_client(args: &Args) -> Result<()> {
    let payload = Payload::Text(args.message.clone());

    let udp = UdpClient::new(EndpointConfig {
        host: args.host.clone(),
        port: args.port,
        identifier: "udp client".to_owned(),
        ..Default::default()
    })?;
    udp.send(&payload, Encoding::Raw)?;
    log::info!("udp datagram sent to {}:{}", args.host, args.port);

    let tcp = TcpClient::new(EndpointConfig {
        host: args.host.clone(),
        port: args.port,
        identifier: "tcp client".to_owned(),
        timeout_secs: Some(5.0),
        ..Default::default()
    });
    let response = tcp.send(&payload, Encoding::Raw)?;
    println!("{}", response);

    Ok(())
}
