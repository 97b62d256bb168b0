//! Broadcast head orientation to WebSocket renderer clients.
//!
//! Each message is one JSON object:
//!
//! {"m":[16 floats, column-major],"yaw":1.4,"pitch":3.1,"roll":5.2,"state":"Streaming"}
//!
//! Usage:
//!   cargo run --release --example orientation_ws
//!   Connect a renderer to ws://localhost:8080

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tungstenite::Message;

const PORT: u16 = 8080;

type WsClient = tungstenite::WebSocket<TcpStream>;

fn main() {
    env_logger::init();

    let mut session = rayneo::Session::new(rayneo::StreamConfig::from_env());
    if let Err(e) = session.start_device() {
        eprintln!("[IMU] Failed to start sensor stream: {}", e);
        eprintln!("[IMU] Clients will receive the identity orientation.");
    }
    let session = Arc::new(Mutex::new(session));

    let clients: Arc<Mutex<Vec<WsClient>>> = Arc::new(Mutex::new(Vec::new()));
    let running = Arc::new(AtomicBool::new(true));

    let broadcast = {
        let clients = clients.clone();
        let session = session.clone();
        let running = running.clone();
        std::thread::Builder::new()
            .name("orientation-broadcast".into())
            .spawn(move || broadcast_loop(session, clients, running))
            .expect("Failed to spawn broadcast thread")
    };

    let listener = TcpListener::bind(format!("0.0.0.0:{}", PORT)).unwrap_or_else(|e| {
        eprintln!("Failed to bind port {}: {}", PORT, e);
        std::process::exit(1);
    });
    eprintln!("[WS] Listening on ws://localhost:{}", PORT);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[TCP] accept error: {}", e);
                continue;
            }
        };
        // Write timeout keeps the broadcaster from blocking on a slow client.
        stream.set_write_timeout(Some(Duration::from_secs(2))).ok();
        stream.set_nodelay(true).ok();

        match tungstenite::accept(stream) {
            Ok(ws) => {
                let mut list = clients.lock().unwrap();
                list.push(ws);
                eprintln!("[WS] Client connected ({} total)", list.len());
            }
            Err(e) => eprintln!("[WS] handshake error: {}", e),
        }
    }

    running.store(false, Ordering::Relaxed);
    let _ = broadcast.join();
    session.lock().unwrap().stop();
}

/// Sample the tracker at ~60 Hz and push it to every client; drop clients that fail.
fn broadcast_loop(
    session: Arc<Mutex<rayneo::Session>>,
    clients: Arc<Mutex<Vec<WsClient>>>,
    running: Arc<AtomicBool>,
) {
    let tracker = session.lock().unwrap().tracker();
    let frame_interval = Duration::from_millis(16);

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(frame_interval);

        let rotation = tracker.snapshot();
        let [yaw, pitch, roll] = rotation.to_euler_deg();
        let m = rotation
            .to_mat4()
            .iter()
            .map(|v| format!("{:.5}", v))
            .collect::<Vec<_>>()
            .join(",");
        let state = session.lock().unwrap().state();
        let json = format!(
            "{{\"m\":[{}],\"yaw\":{:.1},\"pitch\":{:.1},\"roll\":{:.1},\"state\":\"{}\"}}",
            m, yaw, pitch, roll, state
        );

        let msg = Message::Text(json);
        let mut list = clients.lock().unwrap();
        let before = list.len();
        list.retain_mut(|ws| ws.send(msg.clone()).is_ok());
        if list.len() < before {
            eprintln!("[WS] Client disconnected ({} total)", list.len());
        }
    }
}
