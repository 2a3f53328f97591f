//! APRS-IS passcode: a 15-bit hash of the base callsign that servers accept as the
//! `pass` value on the login line. It only marks a client as verified; it is not a secret.

const SEED: u16 = 0x73e2;
const MAX_CALLSIGN_LEN: usize = 10;

/// Passcode for `callsign`. The SSID is ignored and letters are case-insensitive.
pub fn compute(callsign: &str) -> u16 {
    let base = callsign.split('-').next().unwrap_or(callsign);
    let upper: Vec<u8> = base
        .bytes()
        .take(MAX_CALLSIGN_LEN)
        .map(|b| b.to_ascii_uppercase())
        .collect();

    let hash = upper.chunks(2).fold(SEED, |hash, pair| {
        let high = u16::from(pair[0]) << 8;
        let low = pair.get(1).copied().map(u16::from).unwrap_or(0);
        hash ^ high ^ low
    });

    hash & 0x7fff
}
