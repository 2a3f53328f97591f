use anyhow::{Result, bail};
use aprsis::passcode;

pub fn handle_passcode(callsign: &str) -> Result<()> {
    let callsign = callsign.trim();
    if callsign.is_empty() {
        bail!("Callsign must not be empty");
    }

    println!("{}", passcode::compute(callsign));
    Ok(())
}
