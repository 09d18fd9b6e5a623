//! Receiver-side state: power bits, pacing timestamps, sleep deadlines and
//! the pending command queue.

use std::collections::VecDeque;

use futures_util::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::time::Instant;
use tokio_util::codec::FramedWrite;
use tracing::info;

use crate::codes::Zone;
use crate::hash::sdbm;
use crate::protocol::IscpCodec;
use crate::timing::{pace, Pace};

/// Byte-oriented duplex transport a receiver is reachable over. In
/// production this is a serial port; tests use in-memory pipes.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Independent power bits for the main zone and zones 2 and 3. All clear at
/// startup; updated only from receiver-reported power statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Power(u8);

impl Power {
    const MAIN: u8 = 0x1;
    const ZONE2: u8 = 0x2;
    const ZONE3: u8 = 0x4;

    fn bit(zone: Zone) -> u8 {
        match zone {
            Zone::Main => Self::MAIN,
            Zone::Zone2 => Self::ZONE2,
            Zone::Zone3 => Self::ZONE3,
        }
    }

    /// True if any zone is powered on.
    pub fn any_on(self) -> bool {
        self.0 != 0
    }

    pub fn is_on(self, zone: Zone) -> bool {
        self.0 & Self::bit(zone) != 0
    }

    pub fn set(&mut self, zone: Zone, on: bool) {
        if on {
            self.0 |= Self::bit(zone);
        } else {
            self.0 &= !Self::bit(zone);
        }
    }
}

/// A queued command code and its dedup key.
struct QueuedCommand {
    hash: u64,
    code: String,
}

/// One Onkyo receiver on the end of a duplex transport.
///
/// The write half of the transport lives here; the read half is driven by a
/// separate task that feeds parsed frames back to the event loop. Everything
/// else is plain state only the event loop touches.
pub struct Receiver {
    /// Device name, for logs and the status dump.
    pub name: String,
    writer: FramedWrite<WriteHalf<Box<dyn Transport>>, IscpCodec>,
    /// Per-zone power bits, mirrored from receiver power statuses.
    pub power: Power,
    /// Commands written to the receiver so far.
    pub cmds_sent: u64,
    /// Status messages parsed from the receiver so far.
    pub msgs_received: u64,
    /// When the most recent command was written, for pacing.
    pub last_cmd: Option<Instant>,
    /// Virtual sleep deadline for zone 2; `None` when inactive.
    pub zone2_sleep: Option<Instant>,
    /// Virtual sleep deadline for zone 3; `None` when inactive.
    pub zone3_sleep: Option<Instant>,
    /// Next time to broadcast the sleep countdown, when a timer is active.
    pub next_sleep_update: Option<Instant>,
    /// False once the transport has failed or closed; no further writes.
    pub alive: bool,
    queue: VecDeque<QueuedCommand>,
}

impl Receiver {
    pub fn new(
        name: impl Into<String>,
        writer: FramedWrite<WriteHalf<Box<dyn Transport>>, IscpCodec>,
    ) -> Self {
        Self {
            name: name.into(),
            writer,
            power: Power::default(),
            cmds_sent: 0,
            msgs_received: 0,
            last_cmd: None,
            zone2_sleep: None,
            zone3_sleep: None,
            next_sleep_update: None,
            alive: true,
            queue: VecDeque::new(),
        }
    }

    /// Append a command code to the queue. A code already pending (equal
    /// sdbm hash) is dropped silently; sending it twice would be a no-op on
    /// the receiver anyway.
    pub fn enqueue(&mut self, code: String) {
        let hash = sdbm(&code);
        if self.queue.iter().any(|q| q.hash == hash) {
            return;
        }
        self.queue.push_back(QueuedCommand { hash, code });
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Remove and return the next sendable code. While every power bit is
    /// clear the receiver ignores everything except power commands, so
    /// non-power codes are dropped here instead of wasting a serial write.
    pub fn pop(&mut self) -> Option<String> {
        while let Some(entry) = self.queue.pop_front() {
            if self.power.any_on() || is_power_command(&entry.code) {
                return Some(entry.code);
            }
            info!("skipping command {}, power off", entry.code);
        }
        None
    }

    /// Pacing check against the most recent write.
    pub fn can_send(&self, now: Instant) -> Pace {
        pace(self.last_cmd, now)
    }

    /// Pop one code, wrap it in the wire envelope and write it out. The
    /// caller has already confirmed pacing. Returns whether a command was
    /// actually written.
    pub async fn send_one(&mut self, now: Instant) -> std::io::Result<bool> {
        let Some(code) = self.pop() else {
            return Ok(false);
        };
        self.writer.send(code.as_str()).await?;
        self.last_cmd = Some(now);
        self.cmds_sent += 1;
        Ok(true)
    }

    /// Deadline for the zone's virtual sleep timer.
    pub fn zone_sleep(&self, zone: Zone) -> Option<Instant> {
        match zone {
            Zone::Main => None,
            Zone::Zone2 => self.zone2_sleep,
            Zone::Zone3 => self.zone3_sleep,
        }
    }

    pub fn set_zone_sleep(&mut self, zone: Zone, deadline: Option<Instant>) {
        match zone {
            Zone::Main => {}
            Zone::Zone2 => self.zone2_sleep = deadline,
            Zone::Zone3 => self.zone3_sleep = deadline,
        }
    }
}

/// True for codes the receiver acts on even while every zone is off.
fn is_power_command(code: &str) -> bool {
    code.contains("PWR") || code.contains("ZPW") || code.contains("PW3")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn test_receiver() -> Receiver {
        let (local, _remote) = duplex(256);
        let transport: Box<dyn Transport> = Box::new(local);
        let (_rd, wr) = tokio::io::split(transport);
        Receiver::new("test", FramedWrite::new(wr, IscpCodec))
    }

    #[test]
    fn duplicate_enqueue_is_a_no_op() {
        let mut rcvr = test_receiver();
        rcvr.enqueue("MVL2A".into());
        rcvr.enqueue("MVL2A".into());
        rcvr.enqueue("MVL2B".into());
        assert_eq!(rcvr.queue_len(), 2);
    }

    #[test]
    fn pop_skips_non_power_commands_while_off() {
        let mut rcvr = test_receiver();
        rcvr.enqueue("AMT01".into());
        rcvr.enqueue("PWR01".into());
        assert_eq!(rcvr.pop().as_deref(), Some("PWR01"));
        assert_eq!(rcvr.pop(), None);
    }

    #[test]
    fn pop_returns_everything_while_on() {
        let mut rcvr = test_receiver();
        rcvr.power.set(Zone::Zone2, true);
        rcvr.enqueue("AMT01".into());
        rcvr.enqueue("MVL2A".into());
        assert_eq!(rcvr.pop().as_deref(), Some("AMT01"));
        assert_eq!(rcvr.pop().as_deref(), Some("MVL2A"));
    }

    #[test]
    fn power_bits_are_independent() {
        let mut power = Power::default();
        assert!(!power.any_on());
        power.set(Zone::Zone2, true);
        assert!(power.any_on());
        assert!(power.is_on(Zone::Zone2));
        assert!(!power.is_on(Zone::Main));
        power.set(Zone::Zone2, false);
        assert!(!power.any_on());
    }

    #[tokio::test]
    async fn send_one_writes_the_envelope_and_stamps_pacing() {
        use tokio::io::AsyncReadExt;

        let (local, mut remote) = duplex(256);
        let transport: Box<dyn Transport> = Box::new(local);
        let (_rd, wr) = tokio::io::split(transport);
        let mut rcvr = Receiver::new("test", FramedWrite::new(wr, IscpCodec));

        rcvr.enqueue("PWR01".into());
        let now = Instant::now();
        assert!(rcvr.send_one(now).await.unwrap());
        assert_eq!(rcvr.cmds_sent, 1);
        assert_eq!(rcvr.last_cmd, Some(now));

        let mut buf = [0u8; 9];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"!1PWR01\r\n");
    }
}
