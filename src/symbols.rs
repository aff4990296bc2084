// this way we avoid unsafe
const fn from_utf8(v: &'static [u8]) -> &'static str {
    match std::str::from_utf8(v) {
        Ok(s) => s,
        Err(_) => unreachable!(),
    }
}

pub static ALERT: &str = from_utf8(&[0xE2, 0x9A, 0xA0]);
pub static GOLF: &str = from_utf8(&[0xE2, 0x9B, 0xB3]);
pub static BRICK: &str = from_utf8(&[0xF0, 0x9F, 0xA7, 0xB1]);
pub static EXPLOSION: &str = from_utf8(&[0xF0, 0x9F, 0x92, 0xA5]);
pub static WRENCH: &str = from_utf8(&[0xF0, 0x9F, 0x94, 0xA7]);
pub static GREEN: &str = from_utf8(&[0xF0, 0x9F, 0x9F, 0xA2]);
pub static BLUE: &str = from_utf8(&[0xF0, 0x9F, 0x94, 0xB5]);
pub static WHITE: &str = from_utf8(&[0xE2, 0x9A, 0xAA]);
pub static PURPLE: &str = from_utf8(&[0xF0, 0x9F, 0x9F, 0xA3]);
