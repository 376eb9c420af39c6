use thiserror::Error;

use crate::types::{ClimateState, FanSpeed, Mode, Preset, WallClock, MAX_TEMP_C, MIN_TEMP_C};

pub const FRAME_LEN: usize = 16;
pub const SECTION_LEN: usize = 8;

/// Constant first byte of every AC128 frame.
const FRAME_HEADER: u8 = 0x16;

// Byte 10 low-nibble power flags. The high nibble is a transmit counter on
// some remotes and is ignored on parse.
const POWER_ON: u8 = 0x8;
const POWER_OFF: u8 = 0xC;

// Byte 7 low-nibble flags, shared with checksum 1 in the high nibble.
const FLAG_SWING: u8 = 0x1;
const FLAG_SLEEP: u8 = 0x2;

// Byte 12.
const FLAG_ECO: u8 = 0x04;

// Always-zero bytes: on/off timers (4, 5), timer minutes (8, 9), lock/LED (13).
const RESERVED_BYTES: [usize; 5] = [4, 5, 8, 9, 13];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("checksum mismatch in section {section} (expected {expected:#x}, got {got:#x})")]
    ChecksumMismatch { section: u8, expected: u8, got: u8 },
    #[error("reserved bits violated at byte {index} (got {got:#04x})")]
    ReservedBitsViolated { index: usize, got: u8 },
    #[error("invalid {field} value {value:#04x}")]
    InvalidEnumValue { field: &'static str, value: u8 },
}

/// One complete 16-byte AC128 frame: two 8-byte sections, each closed by a
/// nibble-sum checksum in the high nibble of its last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    pub fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// Packs a logical state into the wire layout. The clock stamp feeds the
    /// unit's internal clock sync bytes; without one they stay zero.
    pub fn assemble(state: &ClimateState, clock: Option<WallClock>) -> Self {
        let mut bytes = [0u8; FRAME_LEN];

        bytes[0] = FRAME_HEADER;

        let fan_nibble = match state.fan_speed {
            FanSpeed::Auto => 0x1,
            FanSpeed::High => 0x2,
            FanSpeed::Medium => 0x4,
            FanSpeed::Low => 0x8,
        };
        let mode_nibble = match state.mode {
            Mode::Dry => 0x1,
            Mode::Cool => 0x2,
            Mode::Fan => 0x4,
            Mode::Heat => 0x8,
            Mode::Auto => 0xA,
        };
        bytes[1] = (fan_nibble << 4) | mode_nibble;

        let stamp = clock.unwrap_or(WallClock {
            hour: 0,
            minute: 0,
            second: 0,
        });
        bytes[2] = bcd(stamp.minute);
        bytes[3] = bcd(stamp.hour);

        let temp_c = state.target_temp_c.clamp(MIN_TEMP_C, MAX_TEMP_C);
        bytes[6] = bcd(temp_c);

        let mut flags = 0;
        if state.swing {
            flags |= FLAG_SWING;
        }
        if state.preset == Preset::Sleep {
            flags |= FLAG_SLEEP;
        }
        bytes[7] = flags;

        bytes[10] = if state.power { POWER_ON } else { POWER_OFF };

        let temp_f = (f32::from(temp_c) * 9.0 / 5.0 + 32.0).round() as u8;
        bytes[11] = bcd(temp_f.clamp(60, 86));

        if state.preset == Preset::Eco {
            bytes[12] = FLAG_ECO;
        }

        bytes[14] = bcd(stamp.second);

        bytes[7] |= section_checksum(&bytes[..SECTION_LEN]) << 4;
        bytes[15] |= section_checksum(&bytes[SECTION_LEN..]) << 4;

        Self { bytes }
    }

    /// Validates checksums and reserved bits, then unpacks the state fields.
    pub fn parse(&self) -> Result<ClimateState, ParseError> {
        let b = &self.bytes;

        if b[0] != FRAME_HEADER {
            return Err(ParseError::ReservedBitsViolated { index: 0, got: b[0] });
        }

        for section in 0..2 {
            let slice = &b[section * SECTION_LEN..(section + 1) * SECTION_LEN];
            let expected = section_checksum(slice);
            let got = slice[SECTION_LEN - 1] >> 4;
            if expected != got {
                return Err(ParseError::ChecksumMismatch {
                    section: section as u8 + 1,
                    expected,
                    got,
                });
            }
        }

        for index in RESERVED_BYTES {
            if b[index] != 0 {
                return Err(ParseError::ReservedBitsViolated { index, got: b[index] });
            }
        }
        if b[7] & 0x0F & !(FLAG_SWING | FLAG_SLEEP) != 0 {
            return Err(ParseError::ReservedBitsViolated { index: 7, got: b[7] });
        }
        if b[12] & !FLAG_ECO != 0 {
            return Err(ParseError::ReservedBitsViolated { index: 12, got: b[12] });
        }
        if b[15] & 0x0F != 0 {
            return Err(ParseError::ReservedBitsViolated { index: 15, got: b[15] });
        }

        let power = match b[10] & 0x0F {
            POWER_ON => true,
            POWER_OFF => false,
            value => {
                return Err(ParseError::InvalidEnumValue {
                    field: "power",
                    value,
                })
            }
        };

        let mode = match b[1] & 0x0F {
            0x1 => Mode::Dry,
            0x2 => Mode::Cool,
            0x4 => Mode::Fan,
            0x8 => Mode::Heat,
            0xA => Mode::Auto,
            value => {
                return Err(ParseError::InvalidEnumValue {
                    field: "mode",
                    value,
                })
            }
        };

        let fan_speed = match b[1] >> 4 {
            0x1 => FanSpeed::Auto,
            0x2 => FanSpeed::High,
            0x4 => FanSpeed::Medium,
            0x8 => FanSpeed::Low,
            value => {
                return Err(ParseError::InvalidEnumValue {
                    field: "fan speed",
                    value,
                })
            }
        };

        let target_temp_c = from_bcd(b[6])
            .filter(|temp| (MIN_TEMP_C..=MAX_TEMP_C).contains(temp))
            .ok_or(ParseError::InvalidEnumValue {
                field: "temperature",
                value: b[6],
            })?;

        // Eco wins if a frame somehow carries both preset bits.
        let preset = if b[12] & FLAG_ECO != 0 {
            Preset::Eco
        } else if b[7] & FLAG_SLEEP != 0 {
            Preset::Sleep
        } else {
            Preset::None
        };

        Ok(ClimateState {
            power,
            mode,
            target_temp_c,
            fan_speed,
            swing: b[7] & FLAG_SWING != 0,
            preset,
        })
    }
}

/// Sum of all hex digits of the first seven bytes plus the low nibble of the
/// last byte, mod 16. The result lives in the last byte's high nibble.
fn section_checksum(section: &[u8]) -> u8 {
    let digits: u32 = section[..SECTION_LEN - 1]
        .iter()
        .map(|b| u32::from(b >> 4) + u32::from(b & 0xF))
        .sum();
    ((digits + u32::from(section[SECTION_LEN - 1] & 0xF)) % 16) as u8
}

fn bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

fn from_bcd(byte: u8) -> Option<u8> {
    let (hi, lo) = (byte >> 4, byte & 0xF);
    if hi > 9 || lo > 9 {
        return None;
    }
    Some(hi * 10 + lo)
}
