//! Standalone room service binary.
//!
//! Usage:
//!   cargo run -p ranch_server -- [--addr 127.0.0.1:2567] [--patch-hz 20] [--config server.json]
//!
//! Console commands:
//!   status  - Show rooms and sessions
//!   quit    - Shutdown server

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use ranch_server::server::RoomServer;
use ranch_shared::config::ServerConfig;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args(args: &[String]) -> anyhow::Result<ServerConfig> {
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
            ServerConfig::from_json_str(&text).with_context(|| format!("parse {path}"))?
        }
        _ => ServerConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.listen_addr = args[i + 1].clone();
                i += 2;
            }
            "--patch-hz" if i + 1 < args.len() => {
                cfg.patch_hz = args[i + 1].parse().context("--patch-hz")?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let cfg = parse_args(&args)?;
    info!(addr = %cfg.listen_addr, patch_hz = cfg.patch_hz, rooms = ?cfg.rooms, "Starting server");

    let server = RoomServer::bind(cfg).await.context("bind server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");
    let rooms = server.rooms();
    let mut handle = server.spawn();

    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Server ready. Type 'status' for info, 'quit' to exit.");
    println!();

    loop {
        tokio::select! {
            line = console_rx.recv() => match line.as_deref() {
                Some("status") => {
                    for line in rooms.lock().await.status() {
                        println!("{line}");
                    }
                }
                Some("quit" | "exit") => {
                    info!("Server shutting down");
                    handle.abort();
                    return Ok(());
                }
                Some(other) => println!("Unknown command: {other}"),
                // Console closed; keep serving.
                None => return (&mut handle).await.context("server task")?,
            },
            res = &mut handle => return res.context("server task")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn patch_rate_from_args() {
        let cfg = parse_args(&args(&["server", "--patch-hz", "50"])).unwrap();
        assert_eq!(cfg.patch_hz, 50);
    }

    #[test]
    fn bad_patch_rate_is_an_error() {
        let err = parse_args(&args(&["server", "--patch-hz", "fast"])).unwrap_err();
        assert!(format!("{err:#}").contains("--patch-hz"));
    }
}
