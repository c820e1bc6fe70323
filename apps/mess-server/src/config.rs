use std::net::SocketAddr;

use tracing::warn;

const DEFAULT_ADDR: &str = "127.0.0.1:8091";

pub fn http_addr() -> SocketAddr {
    let raw = std::env::var("MESS_HTTP_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.into());
    raw.parse().unwrap_or_else(|_| {
        warn!(target: "config", addr = %raw, "invalid MESS_HTTP_ADDR; using default");
        DEFAULT_ADDR.parse().expect("default addr parses")
    })
}

pub fn bus_capacity() -> usize {
    std::env::var("MESS_BUS_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(256)
}

pub fn bin_tick_ms() -> u64 {
    std::env::var("MESS_BIN_TICK_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2000)
}
