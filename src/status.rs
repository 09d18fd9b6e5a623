//! Translation of receiver status payloads into normalized event lines.
//!
//! Most payloads transpose straight through the hashed status table. Power
//! statuses additionally mutate the receiver's power bitmask, and a handful
//! of families carry a number that has to be decoded rather than matched.

use std::collections::HashMap;

use crate::codes::{Zone, POWER_STATUSES, STATUSES};
use crate::hash::sdbm;
use crate::receiver::Receiver;

/// The status lookup tables, hashed once at startup.
pub struct StatusTable {
    statuses: HashMap<u64, &'static str>,
    power: HashMap<u64, (Zone, bool, &'static str)>,
}

impl StatusTable {
    pub fn new() -> Self {
        let statuses = STATUSES
            .iter()
            .map(|&(code, event)| (sdbm(code), event))
            .collect();
        let power = POWER_STATUSES
            .iter()
            .map(|&(code, event, zone, on)| (sdbm(code), (zone, on, event)))
            .collect();
        Self { statuses, power }
    }
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one status payload (the bytes between the frame markers) into the
/// event lines to broadcast, updating receiver state along the way. Unknown
/// payloads come back as an `OK:todo:` line rather than being dropped, so
/// clients can at least see what the receiver said.
pub fn parse(table: &StatusTable, rcvr: &mut Receiver, payload: &str) -> Vec<String> {
    let hash = sdbm(payload);

    if let Some(event) = table.statuses.get(&hash) {
        return vec![event.to_string()];
    }

    if let Some(&(zone, on, event)) = table.power.get(&hash) {
        rcvr.power.set(zone, on);
        if !on {
            // A zone that powers off takes its virtual sleep timer with it.
            rcvr.set_zone_sleep(zone, None);
        }
        return vec![event.to_string()];
    }

    decode_numeric(payload).unwrap_or_else(|| vec![format!("OK:todo:{payload}\n")])
}

/// The numerically-coded families: volume, tune, preset, sleep, sw-level
/// and A/V sync.
fn decode_numeric(payload: &str) -> Option<Vec<String>> {
    if payload.len() < 3 || !payload.is_char_boundary(3) {
        return None;
    }
    let (prefix, rest) = payload.split_at(3);

    match prefix {
        "MVL" | "ZVL" | "VL3" => {
            let level = i64::from_str_radix(rest, 16).ok()?;
            let (vol_key, db_key) = match prefix {
                "MVL" => ("volume", "dbvolume"),
                "ZVL" => ("zone2volume", "zone2dbvolume"),
                _ => ("zone3volume", "zone3dbvolume"),
            };
            // Two broadcasts per volume report: the raw level and its
            // decibel equivalent.
            Some(vec![
                format!("OK:{vol_key}:{level}\n"),
                format!("OK:{db_key}:{}\n", level - 82),
            ])
        }
        "TUN" | "TUZ" | "TU3" => {
            let freq: i64 = rest.parse().ok()?;
            let key = match prefix {
                "TUN" => "tune",
                "TUZ" => "zone2tune",
                _ => "zone3tune",
            };
            Some(vec![if freq > 8000 {
                format!("OK:{key}:{}.{} FM\n", freq / 100, (freq / 10) % 10)
            } else {
                format!("OK:{key}:{freq} AM\n")
            }])
        }
        "PRS" | "PRZ" | "PR3" => {
            let preset = i64::from_str_radix(rest, 16).ok()?;
            let key = match prefix {
                "PRS" => "preset",
                "PRZ" => "zone2preset",
                _ => "zone3preset",
            };
            Some(vec![format!("OK:{key}:{preset}\n")])
        }
        "SLP" => {
            let mins = i64::from_str_radix(rest, 16).ok()?;
            Some(vec![format!("OK:sleep:{mins}\n")])
        }
        "SWL" => {
            let level = i64::from_str_radix(rest, 16).ok()?;
            Some(vec![format!("OK:swlevel:{level:+}\n")])
        }
        "AVS" => {
            let tenths: i64 = rest.parse().ok()?;
            Some(vec![format!("OK:avsync:{}\n", tenths / 10)])
        }
        _ => None,
    }
}
