//! Static code tables shared by the command translator and status parser.
//!
//! Each table row pairs an ASCII code with its user-facing counterpart. The
//! tables are pre-hashed into lookup maps at startup (see
//! [`crate::command::CommandSet`] and [`crate::status::StatusTable`]); after
//! that they are read-only.

/// Zone a power bit or sleep timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Main,
    Zone2,
    Zone3,
}

impl Zone {
    /// Digit used in the fake-sleep broadcast keys (`zone2sleep`,
    /// `zone3sleep`).
    pub fn digit(self) -> char {
        match self {
            Zone::Main => '1',
            Zone::Zone2 => '2',
            Zone::Zone3 => '3',
        }
    }
}

/// Input source names accepted from clients, with the code suffix shared by
/// the SLI, SLZ and SL3 opcodes. Names are matched after uppercasing the
/// client's argument.
pub const INPUTS: &[(&str, &str)] = &[
    ("DVR", "00"),
    ("VCR", "00"),
    ("CABLE", "01"),
    ("SAT", "01"),
    ("TV", "02"),
    ("AUX", "03"),
    ("DVD", "10"),
    ("TAPE", "20"),
    ("PHONO", "22"),
    ("CD", "23"),
    ("FM", "24"),
    ("FM TUNER", "24"),
    ("AM", "25"),
    ("AM TUNER", "25"),
    ("TUNER", "26"),
    ("MULTICH", "30"),
    ("XM", "31"),
    ("SIRIUS", "32"),
];

/// Listening mode names accepted from clients, with the LMD code suffix.
pub const MODES: &[(&str, &str)] = &[
    ("STEREO", "00"),
    ("DIRECT", "01"),
    ("ACSTEREO", "0C"),
    ("MONO", "0F"),
    ("PURE", "11"),
    ("FULLMONO", "13"),
    ("STRAIGHT", "40"),
    ("THX", "42"),
    ("PLIIMOVIE", "80"),
    ("PLIIMUSIC", "81"),
    ("NEO6CINEMA", "82"),
    ("NEO6MUSIC", "83"),
    ("PLIITHX", "84"),
    ("NEO6THX", "85"),
    ("PLIIGAME", "86"),
    ("NEURALTHX", "88"),
];

/// Receiver payloads that transpose directly into one of our event lines.
/// Everything that needs numeric decoding (volume, tune, preset, sleep,
/// sw-level, avsync) is handled separately in the status parser.
pub const STATUSES: &[(&str, &str)] = &[
    ("AMT00", "OK:mute:off\n"),
    ("AMT01", "OK:mute:on\n"),
    ("SLI00", "OK:input:DVR\n"),
    ("SLI01", "OK:input:Cable\n"),
    ("SLI02", "OK:input:TV\n"),
    ("SLI03", "OK:input:AUX\n"),
    ("SLI10", "OK:input:DVD\n"),
    ("SLI20", "OK:input:Tape\n"),
    ("SLI22", "OK:input:Phono\n"),
    ("SLI23", "OK:input:CD\n"),
    ("SLI24", "OK:input:FM Tuner\n"),
    ("SLI25", "OK:input:AM Tuner\n"),
    ("SLI26", "OK:input:Tuner\n"),
    ("SLI30", "OK:input:Multichannel\n"),
    ("SLI31", "OK:input:XM Radio\n"),
    ("SLI32", "OK:input:Sirius Radio\n"),
    ("SLIFF", "OK:input:Audyssey Speaker Setup\n"),
    ("LMD00", "OK:mode:Stereo\n"),
    ("LMD01", "OK:mode:Direct\n"),
    ("LMD0C", "OK:mode:All Channel Stereo\n"),
    ("LMD0F", "OK:mode:Mono\n"),
    ("LMD11", "OK:mode:Pure Audio\n"),
    ("LMD13", "OK:mode:Full Mono\n"),
    ("LMD40", "OK:mode:Straight Decode\n"),
    ("LMD42", "OK:mode:THX Cinema\n"),
    ("LMD80", "OK:mode:Pro Logic IIx Movie\n"),
    ("LMD81", "OK:mode:Pro Logic IIx Music\n"),
    ("LMD82", "OK:mode:Neo:6 Cinema\n"),
    ("LMD83", "OK:mode:Neo:6 Music\n"),
    ("LMD84", "OK:mode:PLIIx THX Cinema\n"),
    ("LMD85", "OK:mode:Neo:6 THX Cinema\n"),
    ("LMD86", "OK:mode:Pro Logic IIx Game\n"),
    ("LMD88", "OK:mode:Neural THX\n"),
    ("LMDN/A", "ERROR:mode:Not Available\n"),
    ("ZMT00", "OK:zone2mute:off\n"),
    ("ZMT01", "OK:zone2mute:on\n"),
    ("SLZ00", "OK:zone2input:DVR\n"),
    ("SLZ01", "OK:zone2input:Cable\n"),
    ("SLZ02", "OK:zone2input:TV\n"),
    ("SLZ03", "OK:zone2input:AUX\n"),
    ("SLZ10", "OK:zone2input:DVD\n"),
    ("SLZ20", "OK:zone2input:Tape\n"),
    ("SLZ22", "OK:zone2input:Phono\n"),
    ("SLZ23", "OK:zone2input:CD\n"),
    ("SLZ24", "OK:zone2input:FM Tuner\n"),
    ("SLZ25", "OK:zone2input:AM Tuner\n"),
    ("SLZ26", "OK:zone2input:Tuner\n"),
    ("SLZ30", "OK:zone2input:Multichannel\n"),
    ("SLZ31", "OK:zone2input:XM Radio\n"),
    ("SLZ32", "OK:zone2input:Sirius Radio\n"),
    ("SLZ7F", "OK:zone2input:Off\n"),
    ("SLZ80", "OK:zone2input:Source\n"),
    ("MT300", "OK:zone3mute:off\n"),
    ("MT301", "OK:zone3mute:on\n"),
    ("SL300", "OK:zone3input:DVR\n"),
    ("SL301", "OK:zone3input:Cable\n"),
    ("SL302", "OK:zone3input:TV\n"),
    ("SL303", "OK:zone3input:AUX\n"),
    ("SL310", "OK:zone3input:DVD\n"),
    ("SL320", "OK:zone3input:Tape\n"),
    ("SL322", "OK:zone3input:Phono\n"),
    ("SL323", "OK:zone3input:CD\n"),
    ("SL324", "OK:zone3input:FM Tuner\n"),
    ("SL325", "OK:zone3input:AM Tuner\n"),
    ("SL326", "OK:zone3input:Tuner\n"),
    ("SL330", "OK:zone3input:Multichannel\n"),
    ("SL331", "OK:zone3input:XM Radio\n"),
    ("SL332", "OK:zone3input:Sirius Radio\n"),
    ("SL37F", "OK:zone3input:Off\n"),
    ("SL380", "OK:zone3input:Source\n"),
    ("DIF00", "OK:display:Volume\n"),
    ("DIF01", "OK:display:Mode\n"),
    ("DIF02", "OK:display:Digital Format\n"),
    ("DIM00", "OK:dimmer:Bright\n"),
    ("DIM01", "OK:dimmer:Dim\n"),
    ("DIM02", "OK:dimmer:Dark\n"),
    ("DIM08", "OK:dimmer:Bright (LED off)\n"),
    ("LTN00", "OK:latenight:off\n"),
    ("LTN01", "OK:latenight:low\n"),
    ("LTN02", "OK:latenight:high\n"),
    ("RAS00", "OK:re-eq:off\n"),
    ("RAS01", "OK:re-eq:on\n"),
    ("ADY00", "OK:audyssey:off\n"),
    ("ADY01", "OK:audyssey:on\n"),
    ("ADQ00", "OK:dynamiceq:off\n"),
    ("ADQ01", "OK:dynamiceq:on\n"),
    ("HDO00", "OK:hdmiout:off\n"),
    ("HDO01", "OK:hdmiout:on\n"),
    ("RES00", "OK:resolution:Through\n"),
    ("RES01", "OK:resolution:Auto\n"),
    ("RES02", "OK:resolution:480p\n"),
    ("RES03", "OK:resolution:720p\n"),
    ("RES04", "OK:resolution:1080i\n"),
    ("RES05", "OK:resolution:1080p\n"),
    ("SLA00", "OK:audioselector:Auto\n"),
    ("SLA01", "OK:audioselector:Multichannel\n"),
    ("SLA02", "OK:audioselector:Analog\n"),
    ("SLA03", "OK:audioselector:iLink\n"),
    ("SLA04", "OK:audioselector:HDMI\n"),
    ("TGA00", "OK:triggera:off\n"),
    ("TGA01", "OK:triggera:on\n"),
    ("TGB00", "OK:triggerb:off\n"),
    ("TGB01", "OK:triggerb:on\n"),
    ("TGC00", "OK:triggerc:off\n"),
    ("TGC01", "OK:triggerc:on\n"),
    ("MEMLOCK", "OK:memory:locked\n"),
    ("MEMUNLK", "OK:memory:unlocked\n"),
];

/// Power status payloads. These mutate the receiver's power bitmask in
/// addition to producing an event line.
pub const POWER_STATUSES: &[(&str, &str, Zone, bool)] = &[
    ("PWR00", "OK:power:off\n", Zone::Main, false),
    ("PWR01", "OK:power:on\n", Zone::Main, true),
    ("ZPW00", "OK:zone2power:off\n", Zone::Zone2, false),
    ("ZPW01", "OK:zone2power:on\n", Zone::Zone2, true),
    ("PW300", "OK:zone3power:off\n", Zone::Zone3, false),
    ("PW301", "OK:zone3power:on\n", Zone::Zone3, true),
];
