//! Translation of client command lines into receiver codes.
//!
//! A command line is `<name>[ <arg>]`. The name is looked up by hash in the
//! descriptor table; the descriptor's family decides how the argument is
//! validated and encoded. Most families append a suffix to a three-letter
//! opcode prefix and queue the result on the receiver; the virtual sleep
//! commands never touch the wire at all.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::codes::{Zone, INPUTS, MODES};
use crate::error::{OnkyoError, Result};
use crate::hash::sdbm;
use crate::protocol::MAX_CODE;
use crate::receiver::Receiver;
use crate::timing::minutes_remaining;

/// Result of translating one command line against one receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Codes were queued for the receiver (possibly deduplicated away).
    Queued,
    /// The command produced immediate event lines to fan out to every
    /// client.
    Events(Vec<String>),
    /// The client asked to disconnect.
    Quit,
}

/// How a command's argument is interpreted.
enum Kind {
    /// on/off plus the common suffixes; `toggle` where the receiver
    /// supports it (mute opcodes only).
    Bool,
    /// Integer in `[lo, hi]`, shifted by `offset` and formatted.
    Ranged {
        lo: i64,
        hi: i64,
        offset: i64,
        fmt: NumFmt,
    },
    /// Subwoofer level, `-15..=12`, sign-and-hex encoded.
    SwLevel,
    /// Input source name; zone inputs also accept OFF and SOURCE.
    Input { zone: bool },
    /// Listening mode name.
    Mode,
    /// FM (dotted MHz) or AM (integer kHz) frequency.
    Tune,
    /// Sleep timer minutes, `0..=90`, or `off`.
    Sleep,
    /// Setup memory lock/unlock.
    Memory,
    /// Virtual sleep timer for a zone; mutates daemon state only.
    FakeSleep(Zone),
    /// Queue the zone's full set of status queries.
    Status,
    /// Queue the argument verbatim, for debugging.
    Raw,
    /// Disconnect the issuing client.
    Quit,
}

enum NumFmt {
    /// Two uppercase hex digits.
    UpperHex2,
    /// Three decimal digits plus a trailing zero (the avsync wire format is
    /// tenths of a millisecond).
    AvSync,
}

struct CommandDef {
    name: &'static str,
    prefix: &'static str,
    kind: Kind,
}

/// The command descriptor table, hashed once at startup.
pub struct CommandSet {
    defs: Vec<CommandDef>,
    index: HashMap<u64, usize>,
    inputs: HashMap<u64, &'static str>,
    modes: HashMap<u64, &'static str>,
}

impl CommandSet {
    pub fn new() -> Self {
        use Kind::*;

        let volume = || Ranged {
            lo: 0,
            hi: 100,
            offset: 0,
            fmt: NumFmt::UpperHex2,
        };
        let dbvolume = || Ranged {
            lo: -82,
            hi: 18,
            offset: 82,
            fmt: NumFmt::UpperHex2,
        };
        let preset = || Ranged {
            lo: 0,
            hi: 40,
            offset: 0,
            fmt: NumFmt::UpperHex2,
        };

        let defs = vec![
            def("power", "PWR", Bool),
            def("volume", "MVL", volume()),
            def("dbvolume", "MVL", dbvolume()),
            def("mute", "AMT", Bool),
            def("input", "SLI", Input { zone: false }),
            def("mode", "LMD", Mode),
            def("tune", "TUN", Tune),
            def("preset", "PRS", preset()),
            def("swlevel", "SWL", SwLevel),
            def(
                "avsync",
                "AVS",
                Ranged {
                    lo: 0,
                    hi: 250,
                    offset: 0,
                    fmt: NumFmt::AvSync,
                },
            ),
            def("sleep", "SLP", Sleep),
            def("memory", "MEM", Memory),
            def("status", "", Status),
            def("raw", "", Raw),
            def("quit", "", Quit),
            def("zone2power", "ZPW", Bool),
            def("zone2volume", "ZVL", volume()),
            def("zone2dbvolume", "ZVL", dbvolume()),
            def("zone2mute", "ZMT", Bool),
            def("zone2input", "SLZ", Input { zone: true }),
            def("zone2tune", "TUZ", Tune),
            def("zone2preset", "PRZ", preset()),
            def("zone2sleep", "", FakeSleep(Zone::Zone2)),
            def("zone3power", "PW3", Bool),
            def("zone3volume", "VL3", volume()),
            def("zone3dbvolume", "VL3", dbvolume()),
            def("zone3mute", "MT3", Bool),
            def("zone3input", "SL3", Input { zone: true }),
            def("zone3tune", "TU3", Tune),
            def("zone3preset", "PR3", preset()),
            def("zone3sleep", "", FakeSleep(Zone::Zone3)),
        ];

        let index = defs
            .iter()
            .enumerate()
            .map(|(i, d)| (sdbm(d.name), i))
            .collect();
        let inputs = INPUTS.iter().map(|&(name, code)| (sdbm(name), code)).collect();
        let modes = MODES.iter().map(|&(name, code)| (sdbm(name), code)).collect();

        Self {
            defs,
            index,
            inputs,
            modes,
        }
    }

    /// Translate one whitespace-trimmed command line against one receiver.
    /// Unknown names and rejected arguments come back as
    /// [`OnkyoError::InvalidCommand`].
    pub fn translate(
        &self,
        rcvr: &mut Receiver,
        now: Instant,
        line: &str,
    ) -> Result<Dispatch> {
        let line = line.trim_end();
        let (name, arg) = match line.split_once(' ') {
            Some((name, arg)) => (name, Some(arg)),
            None => (line, None),
        };
        let def = self
            .index
            .get(&sdbm(name))
            .map(|&i| &self.defs[i])
            .ok_or(OnkyoError::InvalidCommand)?;
        self.dispatch(def, rcvr, now, arg)
    }

    fn dispatch(
        &self,
        def: &CommandDef,
        rcvr: &mut Receiver,
        now: Instant,
        arg: Option<&str>,
    ) -> Result<Dispatch> {
        match &def.kind {
            Kind::Bool => {
                let suffix = match standard(arg) {
                    Some(s) => s,
                    None => match arg {
                        Some("on") => "01",
                        Some("off") => "00",
                        Some("toggle") if supports_toggle(def.prefix) => "TG",
                        _ => return Err(OnkyoError::InvalidCommand),
                    },
                };
                attempt(rcvr, def.prefix, suffix)
            }
            Kind::Ranged {
                lo,
                hi,
                offset,
                fmt,
            } => {
                if let Some(s) = standard(arg) {
                    return attempt(rcvr, def.prefix, s);
                }
                let value = parse_int(arg)?;
                if value < *lo || value > *hi {
                    return Err(OnkyoError::InvalidCommand);
                }
                let coded = value + offset;
                let suffix = match fmt {
                    NumFmt::UpperHex2 => format!("{coded:02X}"),
                    NumFmt::AvSync => format!("{coded:03}0"),
                };
                attempt(rcvr, def.prefix, &suffix)
            }
            Kind::SwLevel => {
                if let Some(s) = standard(arg) {
                    return attempt(rcvr, def.prefix, s);
                }
                let value = parse_int(arg)?;
                if !(-15..=12).contains(&value) {
                    return Err(OnkyoError::InvalidCommand);
                }
                let suffix = if value == 0 {
                    "00".to_string()
                } else if value > 0 {
                    format!("+{value:X}")
                } else {
                    format!("-{:X}", -value)
                };
                attempt(rcvr, def.prefix, &suffix)
            }
            Kind::Input { zone } => {
                if let Some(s) = standard(arg) {
                    return attempt(rcvr, def.prefix, s);
                }
                let name = arg.ok_or(OnkyoError::InvalidCommand)?.to_uppercase();
                let zone_extra = if *zone {
                    match name.as_str() {
                        "OFF" => Some("7F"),
                        "SOURCE" => Some("80"),
                        _ => None,
                    }
                } else {
                    None
                };
                let code = zone_extra
                    .or_else(|| self.inputs.get(&sdbm(&name)).copied())
                    .ok_or(OnkyoError::InvalidCommand)?;
                attempt(rcvr, def.prefix, code)
            }
            Kind::Mode => {
                if let Some(s) = standard(arg) {
                    return attempt(rcvr, def.prefix, s);
                }
                let name = arg.ok_or(OnkyoError::InvalidCommand)?.to_uppercase();
                let code = self
                    .modes
                    .get(&sdbm(&name))
                    .copied()
                    .ok_or(OnkyoError::InvalidCommand)?;
                attempt(rcvr, def.prefix, code)
            }
            Kind::Tune => {
                if let Some(s) = standard(arg) {
                    return attempt(rcvr, def.prefix, s);
                }
                let suffix = encode_frequency(arg.ok_or(OnkyoError::InvalidCommand)?)?;
                attempt(rcvr, def.prefix, &suffix)
            }
            Kind::Sleep => {
                let suffix = match arg {
                    None | Some("status") => "QSTN".to_string(),
                    Some("off") => "OFF".to_string(),
                    Some(_) => {
                        let mins = parse_int(arg)?;
                        if !(0..=90).contains(&mins) {
                            return Err(OnkyoError::InvalidCommand);
                        }
                        format!("{mins:02X}")
                    }
                };
                attempt(rcvr, def.prefix, &suffix)
            }
            Kind::Memory => {
                let suffix = match arg {
                    Some("lock") => "LOCK",
                    Some("unlock") => "UNLK",
                    _ => return Err(OnkyoError::InvalidCommand),
                };
                attempt(rcvr, def.prefix, suffix)
            }
            Kind::FakeSleep(zone) => {
                match arg {
                    None | Some("off") => rcvr.set_zone_sleep(*zone, None),
                    Some("status") => {}
                    Some(s) => {
                        let mins: u64 =
                            s.parse().map_err(|_| OnkyoError::InvalidCommand)?;
                        rcvr.set_zone_sleep(
                            *zone,
                            Some(now + Duration::from_secs(mins * 60)),
                        );
                    }
                }
                let mins = rcvr
                    .zone_sleep(*zone)
                    .map(|deadline| minutes_remaining(deadline, now))
                    .unwrap_or(0);
                Ok(Dispatch::Events(vec![format!(
                    "OK:zone{}sleep:{}\n",
                    zone.digit(),
                    mins
                )]))
            }
            Kind::Status => {
                let prefixes: &[&str] = match arg {
                    None | Some("main") => &["PWR", "MVL", "AMT", "SLI", "LMD", "TUN"],
                    Some("zone2") => &["ZPW", "ZVL", "ZMT", "SLZ", "TUZ"],
                    Some("zone3") => &["PW3", "VL3", "MT3", "SL3", "TU3"],
                    Some(_) => return Err(OnkyoError::InvalidCommand),
                };
                for prefix in prefixes {
                    rcvr.enqueue(format!("{prefix}QSTN"));
                }
                Ok(Dispatch::Queued)
            }
            Kind::Raw => {
                let code = arg.ok_or(OnkyoError::InvalidCommand)?;
                attempt(rcvr, "", code)
            }
            Kind::Quit => Ok(Dispatch::Quit),
        }
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::new()
    }
}

fn def(name: &'static str, prefix: &'static str, kind: Kind) -> CommandDef {
    CommandDef { name, prefix, kind }
}

/// Suffixes every wire-backed family understands.
fn standard(arg: Option<&str>) -> Option<&'static str> {
    match arg {
        None | Some("status") => Some("QSTN"),
        Some("up") => Some("UP"),
        Some("down") => Some("DOWN"),
        _ => None,
    }
}

/// Only the mute opcodes implement a hardware toggle.
fn supports_toggle(prefix: &str) -> bool {
    matches!(prefix, "AMT" | "ZMT" | "MT3")
}

/// Build the final code and queue it, rejecting anything that would not fit
/// the wire envelope.
fn attempt(rcvr: &mut Receiver, prefix: &str, suffix: &str) -> Result<Dispatch> {
    let code = format!("{prefix}{suffix}");
    if code.len() > MAX_CODE {
        return Err(OnkyoError::InvalidCommand);
    }
    rcvr.enqueue(code);
    Ok(Dispatch::Queued)
}

/// Parse a base-10 integer consuming the entire argument.
fn parse_int(arg: Option<&str>) -> Result<i64> {
    arg.ok_or(OnkyoError::InvalidCommand)?
        .parse()
        .map_err(|_| OnkyoError::InvalidCommand)
}

/// Encode a tuner frequency. A dotted argument is FM in MHz with exactly one
/// fractional digit (87.5 through 107.9); a plain integer is AM in kHz (530
/// through 1710). Both encode as five decimal digits.
fn encode_frequency(arg: &str) -> Result<String> {
    if let Some((mhz, frac)) = arg.split_once('.') {
        if frac.len() != 1 || !frac.as_bytes()[0].is_ascii_digit() {
            return Err(OnkyoError::InvalidCommand);
        }
        let mhz: i64 = mhz.parse().map_err(|_| OnkyoError::InvalidCommand)?;
        let tenth = (frac.as_bytes()[0] - b'0') as i64;
        let tenths = mhz * 10 + tenth;
        if !(875..=1079).contains(&tenths) {
            return Err(OnkyoError::InvalidCommand);
        }
        Ok(format!("{:05}", tenths * 10))
    } else {
        let khz: i64 = arg.parse().map_err(|_| OnkyoError::InvalidCommand)?;
        if !(530..=1710).contains(&khz) {
            return Err(OnkyoError::InvalidCommand);
        }
        Ok(format!("{khz:05}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::IscpCodec;
    use crate::receiver::Transport;
    use tokio::io::duplex;
    use tokio_util::codec::FramedWrite;

    fn test_receiver() -> Receiver {
        let (local, _remote) = duplex(256);
        let transport: Box<dyn Transport> = Box::new(local);
        let (_rd, wr) = tokio::io::split(transport);
        Receiver::new("test", FramedWrite::new(wr, IscpCodec))
    }

    fn translate(rcvr: &mut Receiver, line: &str) -> Result<Dispatch> {
        CommandSet::new().translate(rcvr, Instant::now(), line)
    }

    fn queued_codes(rcvr: &mut Receiver) -> Vec<String> {
        rcvr.power.set(Zone::Main, true);
        let mut codes = Vec::new();
        while let Some(code) = rcvr.pop() {
            codes.push(code);
        }
        codes
    }

    #[test]
    fn power_on_queues_pwr01() {
        let mut rcvr = test_receiver();
        assert_eq!(translate(&mut rcvr, "power on").unwrap(), Dispatch::Queued);
        assert_eq!(queued_codes(&mut rcvr), ["PWR01"]);
    }

    #[test]
    fn bare_and_status_and_updown_map_to_common_suffixes() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "volume").unwrap();
        translate(&mut rcvr, "power status").unwrap();
        translate(&mut rcvr, "volume up").unwrap();
        translate(&mut rcvr, "volume down").unwrap();
        assert_eq!(
            queued_codes(&mut rcvr),
            ["MVLQSTN", "PWRQSTN", "MVLUP", "MVLDOWN"]
        );
    }

    #[test]
    fn volume_levels_encode_as_hex() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "volume 42").unwrap();
        translate(&mut rcvr, "volume 0").unwrap();
        translate(&mut rcvr, "volume 100").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["MVL2A", "MVL00", "MVL64"]);
    }

    #[test]
    fn volume_range_is_enforced() {
        let mut rcvr = test_receiver();
        assert!(translate(&mut rcvr, "volume 101").is_err());
        assert!(translate(&mut rcvr, "volume -1").is_err());
        assert!(translate(&mut rcvr, "volume 4x").is_err());
    }

    #[test]
    fn dbvolume_is_offset_into_the_same_opcode() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "dbvolume -40").unwrap();
        translate(&mut rcvr, "dbvolume -82").unwrap();
        translate(&mut rcvr, "dbvolume 18").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["MVL2A", "MVL00", "MVL64"]);
        assert!(translate(&mut rcvr, "dbvolume 19").is_err());
        assert!(translate(&mut rcvr, "dbvolume -83").is_err());
    }

    #[test]
    fn mute_toggle_only_where_supported() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "mute toggle").unwrap();
        translate(&mut rcvr, "zone2mute toggle").unwrap();
        translate(&mut rcvr, "zone3mute toggle").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["AMTTG", "ZMTTG", "MT3TG"]);
        assert!(translate(&mut rcvr, "power toggle").is_err());
    }

    #[test]
    fn input_names_are_case_insensitive() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "input cd").unwrap();
        translate(&mut rcvr, "input DVD").unwrap();
        translate(&mut rcvr, "input fm tuner").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["SLI23", "SLI10", "SLI24"]);
        assert!(translate(&mut rcvr, "input betamax").is_err());
    }

    #[test]
    fn zone_inputs_accept_off_and_source() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "zone2input off").unwrap();
        translate(&mut rcvr, "zone2input source").unwrap();
        translate(&mut rcvr, "zone3input cd").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["SLZ7F", "SLZ80", "SL323"]);
        assert!(translate(&mut rcvr, "input off").is_err());
    }

    #[test]
    fn pliigame_uses_the_corrected_code() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "mode pliigame").unwrap();
        translate(&mut rcvr, "mode neo6thx").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["LMD86", "LMD85"]);
    }

    #[test]
    fn fm_tuning_boundaries() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "tune 97.9").unwrap();
        translate(&mut rcvr, "tune 87.5").unwrap();
        translate(&mut rcvr, "tune 107.9").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["TUN09790", "TUN08750", "TUN10790"]);
        assert!(translate(&mut rcvr, "tune 87.4").is_err());
        assert!(translate(&mut rcvr, "tune 108.0").is_err());
        assert!(translate(&mut rcvr, "tune 97.95").is_err());
    }

    #[test]
    fn am_tuning_boundaries() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "tune 530").unwrap();
        translate(&mut rcvr, "tune 1710").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["TUN00530", "TUN01710"]);
        assert!(translate(&mut rcvr, "tune 529").is_err());
        assert!(translate(&mut rcvr, "tune 1711").is_err());
    }

    #[test]
    fn swlevel_encoding() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "swlevel -15").unwrap();
        translate(&mut rcvr, "swlevel 0").unwrap();
        translate(&mut rcvr, "swlevel 12").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["SWL-F", "SWL00", "SWL+C"]);
        assert!(translate(&mut rcvr, "swlevel -16").is_err());
        assert!(translate(&mut rcvr, "swlevel 13").is_err());
    }

    #[test]
    fn avsync_encodes_tenths_of_a_millisecond() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "avsync 100").unwrap();
        translate(&mut rcvr, "avsync 0").unwrap();
        translate(&mut rcvr, "avsync 250").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["AVS1000", "AVS0000", "AVS2500"]);
        assert!(translate(&mut rcvr, "avsync 251").is_err());
    }

    #[test]
    fn sleep_boundaries() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "sleep off").unwrap();
        translate(&mut rcvr, "sleep 0").unwrap();
        translate(&mut rcvr, "sleep 90").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["SLPOFF", "SLP00", "SLP5A"]);
        assert!(translate(&mut rcvr, "sleep 91").is_err());
    }

    #[test]
    fn memory_lock_unlock() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "memory lock").unwrap();
        translate(&mut rcvr, "memory unlock").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["MEMLOCK", "MEMUNLK"]);
        assert!(translate(&mut rcvr, "memory").is_err());
        assert!(translate(&mut rcvr, "memory wipe").is_err());
    }

    #[test]
    fn status_queues_the_zone_query_set() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "status").unwrap();
        assert_eq!(
            queued_codes(&mut rcvr),
            ["PWRQSTN", "MVLQSTN", "AMTQSTN", "SLIQSTN", "LMDQSTN", "TUNQSTN"]
        );
        translate(&mut rcvr, "status zone2").unwrap();
        assert_eq!(
            queued_codes(&mut rcvr),
            ["ZPWQSTN", "ZVLQSTN", "ZMTQSTN", "SLZQSTN", "TUZQSTN"]
        );
        translate(&mut rcvr, "status zone3").unwrap();
        assert_eq!(
            queued_codes(&mut rcvr),
            ["PW3QSTN", "VL3QSTN", "MT3QSTN", "SL3QSTN", "TU3QSTN"]
        );
    }

    #[test]
    fn raw_passes_through_verbatim() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "raw SLIQSTN").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["SLIQSTN"]);
        assert!(translate(&mut rcvr, "raw").is_err());
        let oversized = format!("raw {}", "Q".repeat(300));
        assert!(translate(&mut rcvr, &oversized).is_err());
    }

    #[test]
    fn quit_does_not_queue() {
        let mut rcvr = test_receiver();
        assert_eq!(translate(&mut rcvr, "quit").unwrap(), Dispatch::Quit);
        assert!(rcvr.queue_is_empty());
    }

    #[test]
    fn unknown_names_are_invalid() {
        let mut rcvr = test_receiver();
        assert!(translate(&mut rcvr, "garbage").is_err());
        assert!(translate(&mut rcvr, "").is_err());
    }

    #[test]
    fn fake_sleep_sets_and_reports_the_deadline() {
        let mut rcvr = test_receiver();
        let set = CommandSet::new();
        let now = Instant::now();

        let out = set.translate(&mut rcvr, now, "zone2sleep 5").unwrap();
        assert_eq!(
            out,
            Dispatch::Events(vec!["OK:zone2sleep:5\n".to_string()])
        );
        assert_eq!(
            rcvr.zone2_sleep,
            Some(now + Duration::from_secs(300))
        );
        assert!(rcvr.queue_is_empty());

        let out = set.translate(&mut rcvr, now, "zone2sleep status").unwrap();
        assert_eq!(
            out,
            Dispatch::Events(vec!["OK:zone2sleep:5\n".to_string()])
        );

        let out = set.translate(&mut rcvr, now, "zone2sleep off").unwrap();
        assert_eq!(
            out,
            Dispatch::Events(vec!["OK:zone2sleep:0\n".to_string()])
        );
        assert_eq!(rcvr.zone2_sleep, None);

        assert!(set.translate(&mut rcvr, now, "zone3sleep -4").is_err());
    }

    #[test]
    fn duplicate_commands_collapse_in_the_queue() {
        let mut rcvr = test_receiver();
        translate(&mut rcvr, "volume 42").unwrap();
        translate(&mut rcvr, "volume 42").unwrap();
        translate(&mut rcvr, "volume 43").unwrap();
        assert_eq!(queued_codes(&mut rcvr), ["MVL2A", "MVL2B"]);
    }
}
