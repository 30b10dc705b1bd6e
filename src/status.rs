//! HTTP status endpoint for gateway monitoring.
//!
//! Serves `GET /status` as JSON. Uses `tiny_http`, which works on both host
//! and ESP32 (via std::net).
//!
//! # Example Response
//!
//! ```json
//! {
//!   "uptime_secs": 3600,
//!   "sid": 4,
//!   "mesh_id": 5,
//!   "joined": true,
//!   "learn_state": "joined",
//!   "sid_map": "1100000000000000",
//!   "nbr_map": "0100000000000000",
//!   "reasons": "0x0000",
//!   "main_loop_count": 1241,
//!   "frames_tx": 8012,
//!   "frames_rx": 310
//! }
//! ```

use crate::codec::SidMap;
use crate::mesh::{LearnState, MeshState};
use log::{error, info, warn};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Method, Response, Server};

fn learn_state_code(state: LearnState) -> u8 {
    match state {
        LearnState::Inactive => 0,
        LearnState::Active => 1,
        LearnState::Joined => 2,
        LearnState::Unlearnt => 3,
    }
}

fn learn_state_from_code(code: u8) -> LearnState {
    match code {
        1 => LearnState::Active,
        2 => LearnState::Joined,
        3 => LearnState::Unlearnt,
        _ => LearnState::Inactive,
    }
}

fn map_to_u64(map: &SidMap) -> u64 {
    u64::from_le_bytes(map.bytes())
}

fn map_from_u64(bits: u64) -> SidMap {
    SidMap::from_bytes(bits.to_le_bytes())
}

/// Gateway statistics.
///
/// Shared between the mesh task, the radio link and the status server.
/// Every field is atomic so readers never lock the mesh task out.
#[derive(Debug)]
pub struct MeshStats {
    start_time: Instant,
    sid: AtomicU8,
    mesh_id: AtomicU8,
    learn_state: AtomicU8,
    sid_map: AtomicU64,
    nbr_map: AtomicU64,
    reasons: AtomicU16,
    /// Main-loop passes completed. Watched by the liveness watchdog.
    pub main_loop_count: AtomicU32,
    /// Frames the radio reported as sent.
    pub frames_tx: AtomicUsize,
    /// Frames received that passed validation.
    pub frames_rx: AtomicUsize,
}

impl MeshStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            sid: AtomicU8::new(crate::codec::consts::NULL_SID),
            mesh_id: AtomicU8::new(0),
            learn_state: AtomicU8::new(0),
            sid_map: AtomicU64::new(0),
            nbr_map: AtomicU64::new(0),
            reasons: AtomicU16::new(0),
            main_loop_count: AtomicU32::new(0),
            frames_tx: AtomicUsize::new(0),
            frames_rx: AtomicUsize::new(0),
        }
    }

    pub fn record_tx(&self) {
        self.frames_tx.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rx(&self) {
        self.frames_rx.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self) {
        self.main_loop_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn main_loop_count(&self) -> u32 {
        self.main_loop_count.load(Ordering::Relaxed)
    }

    /// Publish the parts of the mesh state the endpoint shows.
    pub fn update(&self, st: &MeshState) {
        self.sid.store(st.sid, Ordering::Relaxed);
        self.mesh_id.store(st.mesh_id(), Ordering::Relaxed);
        self.learn_state
            .store(learn_state_code(st.learn_state), Ordering::Relaxed);
        self.sid_map.store(map_to_u64(&st.sid_map), Ordering::Relaxed);
        self.nbr_map.store(map_to_u64(&st.nbr_map), Ordering::Relaxed);
        self.reasons.store(st.reasons.bits(), Ordering::Relaxed);
    }

    pub fn sid(&self) -> u8 {
        self.sid.load(Ordering::Relaxed)
    }

    pub fn joined(&self) -> bool {
        self.sid() != crate::codec::consts::NULL_SID
    }

    pub fn learn_state(&self) -> LearnState {
        learn_state_from_code(self.learn_state.load(Ordering::Relaxed))
    }

    pub fn sid_map(&self) -> SidMap {
        map_from_u64(self.sid_map.load(Ordering::Relaxed))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn to_json(&self) -> String {
        format!(
            r#"{{"uptime_secs":{},"sid":{},"mesh_id":{},"joined":{},"learn_state":"{}","sid_map":"{}","nbr_map":"{}","reasons":"{:#06x}","main_loop_count":{},"frames_tx":{},"frames_rx":{}}}"#,
            self.uptime_secs(),
            self.sid(),
            self.mesh_id.load(Ordering::Relaxed),
            self.joined(),
            self.learn_state(),
            self.sid_map(),
            map_from_u64(self.nbr_map.load(Ordering::Relaxed)),
            self.reasons.load(Ordering::Relaxed),
            self.main_loop_count(),
            self.frames_tx.load(Ordering::Relaxed),
            self.frames_rx.load(Ordering::Relaxed),
        )
    }
}

impl Default for MeshStats {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP status server on a background thread. Drop it to stop.
pub struct StatusServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl StatusServer {
    /// Start serving `stats` on `port` (all interfaces when `bind_addr` is
    /// `None`).
    pub fn start(
        bind_addr: Option<IpAddr>,
        port: u16,
        stats: Arc<MeshStats>,
    ) -> Result<Self, std::io::Error> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;

        info!("Status server listening on http://{}/status", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::spawn(move || {
            Self::run_server(server, stats, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    fn run_server(server: Server, stats: Arc<MeshStats>, shutdown: Arc<AtomicBool>) {
        let content_type =
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).ok();
        let allow_get = tiny_http::Header::from_bytes(&b"Allow"[..], &b"GET"[..]).ok();

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Status server shutting down");
                break;
            }

            match server.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(request)) => {
                    if request.method() != &Method::Get {
                        let mut response =
                            Response::from_string("Method Not Allowed").with_status_code(405);
                        if let Some(h) = &allow_get {
                            response = response.with_header(h.clone());
                        }
                        let _ = request.respond(response);
                        continue;
                    }

                    let response = if request.url() == "/status" || request.url() == "/status/" {
                        let mut response =
                            Response::from_string(stats.to_json()).with_status_code(200);
                        if let Some(h) = &content_type {
                            response = response.with_header(h.clone());
                        }
                        response
                    } else {
                        Response::from_string("Not Found").with_status_code(404)
                    };

                    if let Err(e) = request.respond(response) {
                        warn!("Failed to send response: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Status server error: {}", e);
                    break;
                }
            }
        }
    }

    /// Stop the server. May take up to 100 ms.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::RumorReason;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use wisafe_rs_esp32_macros::esp32_test;

    #[esp32_test]
    fn test_counters() {
        let stats = MeshStats::new();
        stats.record_tx();
        stats.record_rx();
        stats.record_rx();
        stats.record_pass();
        assert_eq!(stats.frames_tx.load(Ordering::Relaxed), 1);
        assert_eq!(stats.frames_rx.load(Ordering::Relaxed), 2);
        assert_eq!(stats.main_loop_count(), 1);
    }

    #[esp32_test]
    fn test_update_from_state() {
        let stats = MeshStats::new();
        assert!(!stats.joined());

        let mut st = MeshState::new([1, 2, 3], false);
        st.sid = 4;
        st.keys = [0x05, 0x12, 0x34];
        st.sid_map.set(4);
        st.sid_map.set(9);
        st.learn_state = LearnState::Joined;
        st.reasons.insert(RumorReason::Joined);
        stats.update(&st);

        assert!(stats.joined());
        assert_eq!(stats.sid(), 4);
        assert_eq!(stats.sid_map(), st.sid_map);
        assert_eq!(stats.learn_state(), LearnState::Joined);

        let json = stats.to_json();
        assert!(json.contains("\"sid\":4"));
        assert!(json.contains("\"mesh_id\":5"));
        assert!(json.contains("\"joined\":true"));
        assert!(json.contains("\"learn_state\":\"joined\""));
        assert!(json.contains("\"reasons\":\"0x0020\""));
    }

    #[esp32_test]
    fn test_json_is_valid() {
        let stats = MeshStats::new();
        let value: serde_json::Value = serde_json::from_str(&stats.to_json()).unwrap();
        assert_eq!(value["joined"], false);
        assert_eq!(value["frames_tx"], 0);
        assert!(value["sid_map"].is_string());
    }

    fn get(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        write!(stream, "GET {} HTTP/1.0\r\nHost: localhost\r\n\r\n", path).unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).unwrap();
        body
    }

    #[esp32_test]
    fn test_server_routes() {
        let stats = Arc::new(MeshStats::new());
        let port = 18000 + (std::process::id() % 1000) as u16;
        let mut server =
            StatusServer::start(Some("127.0.0.1".parse().unwrap()), port, stats).unwrap();

        let ok = get(port, "/status");
        assert!(ok.starts_with("HTTP/1.0 200") || ok.starts_with("HTTP/1.1 200"));
        assert!(ok.contains("\"main_loop_count\":0"));

        let missing = get(port, "/nope");
        assert!(missing.contains("404"));
        server.stop();
    }
}
