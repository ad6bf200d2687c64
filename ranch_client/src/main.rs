//! Standalone client binary, driving the game with a headless renderer.
//!
//! Usage:
//!   cargo run -p ranch_client -- [--endpoint ws://127.0.0.1:2567] [--origin <url>]
//!                                [--room waitroom] [--frame-hz 60] [--config client.json]
//!
//! Console commands:
//!   hold <key>     - Hold a key (left, right, up, down, d)
//!   release <key>  - Release a key
//!   click          - Press the pointer for one frame
//!   switch         - Tap the scene-switch key
//!   status         - Show client status
//!   quit           - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::Context;
use ranch_client::{
    game::Game,
    input::{InputState, Keys},
    render::HeadlessRenderer,
    scenes::{BootScene, PlayScene, PlaySceneConfig, SELECTOR_KEY},
};
use ranch_shared::config::GameConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn parse_args(args: &[String]) -> anyhow::Result<GameConfig> {
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
            GameConfig::from_json_str(&text).with_context(|| format!("parse {path}"))?
        }
        _ => GameConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--endpoint" if i + 1 < args.len() => {
                cfg.fallback_endpoint = args[i + 1].clone();
                i += 2;
            }
            "--origin" if i + 1 < args.len() => {
                cfg.origin = Some(args[i + 1].clone());
                i += 2;
            }
            "--room" if i + 1 < args.len() => {
                cfg.start_scene = args[i + 1].clone();
                i += 2;
            }
            "--frame-hz" if i + 1 < args.len() => {
                cfg.frame_hz = args[i + 1].parse().context("--frame-hz")?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

/// Console state folded into per-frame input.
#[derive(Default)]
struct ConsoleInput {
    held: Keys,
    tap: Keys,
    click: bool,
}

impl ConsoleInput {
    /// Applies one console line. Returns false on `quit`.
    fn exec(&mut self, line: &str, game: &Game<HeadlessRenderer>) -> bool {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("hold"), Some(name)) => match Keys::from_console_name(name) {
                Some(k) => self.held |= k,
                None => println!("Unknown key: {name}"),
            },
            (Some("release"), Some(name)) => match Keys::from_console_name(name) {
                Some(k) => self.held -= k,
                None => println!("Unknown key: {name}"),
            },
            (Some("click"), _) => self.click = true,
            (Some("switch"), _) => self.tap |= Keys::SWITCH,
            (Some("status"), _) => {
                println!("Scene:   {}", game.active_scene().unwrap_or("-"));
                println!("FPS:     {:.1}", game.fps());
                println!("Objects: {}", game.renderer().objects().count());
                println!("Sprites: {}", game.renderer().sprite_count());
                for text in game.renderer().texts() {
                    println!("Text:    {text}");
                }
            }
            (Some("quit"), _) => return false,
            _ => println!("Unknown command: {line}"),
        }
        true
    }

    /// Input for the next frame; taps and clicks last one frame.
    fn next_frame(&mut self, prev: &InputState) -> InputState {
        let held = self.held | std::mem::take(&mut self.tap);
        prev.advance(held, std::mem::take(&mut self.click))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let cfg = parse_args(&args)?;
    let endpoint = cfg.endpoint().context("derive endpoint")?;
    info!(%endpoint, start_scene = %cfg.start_scene, "Starting client");

    let mut game = Game::new(cfg, HeadlessRenderer::new());
    game.add_scene(BootScene::default());
    game.add_scene(PlayScene::new(PlaySceneConfig::waitroom()));
    game.add_scene(PlayScene::new(PlaySceneConfig::mainroom()));
    game.add_scene(PlayScene::new(PlaySceneConfig::classic()));
    game.boot(SELECTOR_KEY).await.context("boot")?;

    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("> ");
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

    println!("Type 'click' to join, 'status' for info, 'quit' to exit.");

    let mut console = ConsoleInput::default();
    let mut input = InputState::default();
    let mut ticker = tokio::time::interval(game.frame_interval());
    let mut last = Instant::now();

    'frames: loop {
        ticker.tick().await;

        while let Ok(line) = console_rx.try_recv() {
            if !console.exec(&line, &game) {
                break 'frames;
            }
        }

        input = console.next_frame(&input);
        let now = Instant::now();
        if let Err(e) = game.run_frame(&input, now - last).await {
            warn!(error = %format!("{e:#}"), "Frame failed");
        }
        last = now;
    }

    game.shutdown();
    info!("Client stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn room_and_frame_rate_from_args() {
        let cfg = parse_args(&args(&["client", "--room", "mainroom", "--frame-hz", "30"])).unwrap();
        assert_eq!(cfg.start_scene, "mainroom");
        assert_eq!(cfg.frame_hz, 30);
    }

    #[test]
    fn bad_frame_rate_is_an_error() {
        let err = parse_args(&args(&["client", "--frame-hz", "fast"])).unwrap_err();
        assert!(format!("{err:#}").contains("--frame-hz"));
    }
}
