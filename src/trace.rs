//! Connection lifecycle tracing
//!
//! The transport reports phase boundaries through [`TraceHooks`]; a
//! [`TraceCollector`] turns them into a [`Timing`] for exactly one exchange.
//! Every hook takes the instant at which the event happened so that the
//! arithmetic can be exercised without a network.

use crate::models::timing::{millis_between, Timing};
use crate::types::{AppError, Result};
use std::net::SocketAddr;
use std::time::Instant;

/// Lifecycle events of one exchange, in the order they may fire
pub trait TraceHooks {
    /// Connection acquisition begins
    fn get_conn(&mut self, at: Instant);
    fn dns_start(&mut self, host: &str, at: Instant);
    fn dns_done(&mut self, at: Instant);
    /// Only the first attempt counts
    fn connect_start(&mut self, addr: SocketAddr, at: Instant);
    /// A failed attempt aborts the exchange
    fn connect_done(&mut self, addr: SocketAddr, error: Option<&std::io::Error>, at: Instant) -> Result<()>;
    fn tls_handshake_start(&mut self, at: Instant);
    fn tls_handshake_done(&mut self, at: Instant);
    /// Connection ready, request about to be written
    fn got_conn(&mut self, at: Instant);
    fn got_first_response_byte(&mut self, at: Instant);
}

/// Where an exchange currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Resolving,
    Connecting,
    TlsHandshake,
    Transferring,
    Complete,
}

/// Write-once timing fields, `None` until their event fires
#[derive(Debug, Default)]
struct TimingSlots {
    dns: Option<u64>,
    tcp: Option<u64>,
    tls: Option<u64>,
    server: Option<u64>,
    transfer: Option<u64>,
    lookup: Option<u64>,
    connect: Option<u64>,
    pre_transfer: Option<u64>,
    start_transfer: Option<u64>,
    total: Option<u64>,
}

impl TimingSlots {
    fn to_timing(&self) -> Timing {
        Timing {
            dns: self.dns.unwrap_or(0),
            tcp: self.tcp.unwrap_or(0),
            tls: self.tls.unwrap_or(0),
            server: self.server.unwrap_or(0),
            transfer: self.transfer.unwrap_or(0),
            lookup: self.lookup.unwrap_or(0),
            connect: self.connect.unwrap_or(0),
            pre_transfer: self.pre_transfer.unwrap_or(0),
            start_transfer: self.start_transfer.unwrap_or(0),
            total: self.total.unwrap_or(0),
        }
    }
}

fn set_once(slot: &mut Option<u64>, value: u64) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Raw markers captured as events fire
#[derive(Debug, Default)]
struct Markers {
    start: Option<Instant>,
    dns_start: Option<Instant>,
    connect_start: Option<Instant>,
    tls_start: Option<Instant>,
    connected: Option<Instant>,
    first_byte: Option<Instant>,
}

/// Per-exchange observer building a [`Timing`]
#[derive(Debug, Default)]
pub struct TraceCollector {
    markers: Markers,
    slots: TimingSlots,
    phase: Phase,
    remote_addr: Option<SocketAddr>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Socket address captured when the connection succeeded
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Snapshot of the fields recorded so far
    pub fn timing(&self) -> Timing {
        self.slots.to_timing()
    }

    /// Close the exchange once the body has been consumed (or skipped)
    pub fn finish(&mut self, at: Instant) -> Timing {
        let start = self.origin(at);
        if let Some(first_byte) = self.markers.first_byte {
            set_once(&mut self.slots.transfer, millis_between(first_byte, at));
        }
        set_once(&mut self.slots.total, millis_between(start, at));
        self.phase = Phase::Complete;
        self.slots.to_timing()
    }

    // Events arriving before `get_conn` are measured from themselves.
    fn origin(&mut self, at: Instant) -> Instant {
        *self.markers.start.get_or_insert(at)
    }
}

impl TraceHooks for TraceCollector {
    fn get_conn(&mut self, at: Instant) {
        self.markers.start.get_or_insert(at);
    }

    fn dns_start(&mut self, _host: &str, at: Instant) {
        self.origin(at);
        self.markers.dns_start.get_or_insert(at);
        self.phase = Phase::Resolving;
    }

    fn dns_done(&mut self, at: Instant) {
        let start = self.origin(at);
        let dns_start = *self.markers.dns_start.get_or_insert(at);
        set_once(&mut self.slots.dns, millis_between(dns_start, at));
        set_once(&mut self.slots.lookup, millis_between(start, at));
    }

    fn connect_start(&mut self, _addr: SocketAddr, at: Instant) {
        self.origin(at);
        self.markers.connect_start.get_or_insert(at);
        self.phase = Phase::Connecting;
    }

    fn connect_done(&mut self, addr: SocketAddr, error: Option<&std::io::Error>, at: Instant) -> Result<()> {
        if let Some(error) = error {
            return Err(AppError::network(format!("unable to connect to host {}: {}", addr, error)));
        }

        let start = self.origin(at);
        let connect_start = *self.markers.connect_start.get_or_insert(at);
        set_once(&mut self.slots.tcp, millis_between(connect_start, at));
        set_once(&mut self.slots.connect, millis_between(start, at));
        self.remote_addr.get_or_insert(addr);
        Ok(())
    }

    fn tls_handshake_start(&mut self, at: Instant) {
        self.origin(at);
        self.markers.tls_start.get_or_insert(at);
        self.phase = Phase::TlsHandshake;
    }

    fn tls_handshake_done(&mut self, at: Instant) {
        self.origin(at);
        let tls_start = *self.markers.tls_start.get_or_insert(at);
        set_once(&mut self.slots.tls, millis_between(tls_start, at));
    }

    fn got_conn(&mut self, at: Instant) {
        let start = self.origin(at);
        self.markers.connected.get_or_insert(at);
        set_once(&mut self.slots.pre_transfer, millis_between(start, at));
        self.phase = Phase::Transferring;
    }

    fn got_first_response_byte(&mut self, at: Instant) {
        let start = self.origin(at);
        let connected = *self.markers.connected.get_or_insert(at);
        self.markers.first_byte.get_or_insert(at);
        set_once(&mut self.slots.server, millis_between(connected, at));
        set_once(&mut self.slots.start_transfer, millis_between(start, at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    fn addr() -> SocketAddr {
        "93.184.216.34:443".parse().unwrap()
    }

    #[test]
    fn test_encrypted_exchange_timing() {
        let t0 = Instant::now();
        let mut trace = TraceCollector::new();

        trace.get_conn(t0);
        trace.dns_start("example.com", ms(t0, 0));
        trace.dns_done(ms(t0, 5));
        trace.connect_start(addr(), ms(t0, 5));
        trace.connect_done(addr(), None, ms(t0, 15)).unwrap();
        trace.tls_handshake_start(ms(t0, 15));
        trace.tls_handshake_done(ms(t0, 35));
        trace.got_conn(ms(t0, 35));
        trace.got_first_response_byte(ms(t0, 85));
        let timing = trace.finish(ms(t0, 185));

        assert_eq!(
            timing,
            Timing {
                dns: 5,
                tcp: 10,
                tls: 20,
                server: 50,
                transfer: 100,
                lookup: 5,
                connect: 15,
                pre_transfer: 35,
                start_transfer: 85,
                total: 185,
            }
        );
        assert!(timing.is_monotonic());
        assert!(timing.pre_transfer - timing.connect >= timing.tls);
        assert_eq!(trace.remote_addr(), Some(addr()));
        assert_eq!(trace.phase(), Phase::Complete);
    }

    #[test]
    fn test_plaintext_exchange_leaves_tls_zero() {
        let t0 = Instant::now();
        let mut trace = TraceCollector::new();

        trace.get_conn(t0);
        trace.dns_start("example.com", ms(t0, 1));
        trace.dns_done(ms(t0, 4));
        trace.connect_start(addr(), ms(t0, 4));
        trace.connect_done(addr(), None, ms(t0, 9)).unwrap();
        trace.got_conn(ms(t0, 9));
        trace.got_first_response_byte(ms(t0, 30));
        let timing = trace.finish(ms(t0, 31));

        assert_eq!(timing.tls, 0);
        assert_eq!(timing.dns, 3);
        assert_eq!(timing.lookup, 4);
        assert_eq!(timing.tcp, 5);
        assert_eq!(timing.pre_transfer, 9);
        assert_eq!(timing.server, 21);
        assert_eq!(timing.transfer, 1);
        assert!(timing.is_monotonic());
    }

    #[test]
    fn test_only_first_connect_attempt_counts() {
        let t0 = Instant::now();
        let mut trace = TraceCollector::new();
        let other: SocketAddr = "[2001:db8::1]:443".parse().unwrap();

        trace.get_conn(t0);
        trace.connect_start(addr(), ms(t0, 2));
        trace.connect_start(other, ms(t0, 6));
        trace.connect_done(addr(), None, ms(t0, 12)).unwrap();
        trace.connect_done(other, None, ms(t0, 20)).unwrap();

        let timing = trace.timing();
        assert_eq!(timing.tcp, 10);
        assert_eq!(timing.connect, 12);
        assert_eq!(trace.remote_addr(), Some(addr()));
    }

    #[test]
    fn test_fields_are_written_once() {
        let t0 = Instant::now();
        let mut trace = TraceCollector::new();

        trace.get_conn(t0);
        trace.dns_start("example.com", t0);
        trace.dns_done(ms(t0, 7));
        trace.dns_done(ms(t0, 70));
        assert_eq!(trace.timing().dns, 7);
        assert_eq!(trace.timing().lookup, 7);
    }

    #[test]
    fn test_connect_failure_is_fatal() {
        let t0 = Instant::now();
        let mut trace = TraceCollector::new();
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");

        trace.get_conn(t0);
        trace.connect_start(addr(), t0);
        let error = trace.connect_done(addr(), Some(&refused), ms(t0, 1)).unwrap_err();
        assert!(matches!(error, AppError::Network(_)));
        assert_eq!(trace.timing().connect, 0);
        assert_eq!(trace.remote_addr(), None);
    }

    #[test]
    fn test_ip_literal_skips_dns() {
        let t0 = Instant::now();
        let mut trace = TraceCollector::new();

        trace.get_conn(t0);
        trace.connect_start(addr(), t0);
        trace.connect_done(addr(), None, ms(t0, 3)).unwrap();
        trace.got_conn(ms(t0, 3));
        trace.got_first_response_byte(ms(t0, 8));
        let timing = trace.finish(ms(t0, 8));

        assert_eq!(timing.dns, 0);
        assert_eq!(timing.lookup, 0);
        assert_eq!(timing.transfer, 0);
        assert!(timing.is_monotonic());
    }

    #[test]
    fn test_phase_progression() {
        let t0 = Instant::now();
        let mut trace = TraceCollector::new();
        assert_eq!(trace.phase(), Phase::Idle);

        trace.get_conn(t0);
        trace.dns_start("example.com", t0);
        assert_eq!(trace.phase(), Phase::Resolving);
        trace.dns_done(t0);
        trace.connect_start(addr(), t0);
        assert_eq!(trace.phase(), Phase::Connecting);
        trace.connect_done(addr(), None, t0).unwrap();
        trace.tls_handshake_start(t0);
        assert_eq!(trace.phase(), Phase::TlsHandshake);
        trace.tls_handshake_done(t0);
        trace.got_conn(t0);
        assert_eq!(trace.phase(), Phase::Transferring);
        trace.finish(t0);
        assert_eq!(trace.phase(), Phase::Complete);
    }
}
