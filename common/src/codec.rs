use thiserror::Error;

use crate::frame::{Frame, FRAME_LEN, SECTION_LEN};
use crate::timing::{Pulse, PulseTrain, TimingTable};

const BITS_PER_SECTION: usize = SECTION_LEN * 8;

/// Header pair + 64 bit pairs + footer pair, twice, plus the inter-section
/// pair and the final mark.
pub const PULSES_PER_FRAME: usize = 2 * (2 + BITS_PER_SECTION * 2 + 2) + 2 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected} pulses, got {got}")]
    Truncated { got: usize, expected: usize },
    #[error("header pulse {index} outside tolerance ({micros}us)")]
    HeaderMismatch { index: usize, micros: u16 },
    #[error("pulse {index} matches no timing entry ({micros}us)")]
    TimingMismatch { index: usize, micros: u16 },
}

/// Pure transformation between frames and pulse trains, parameterized by a
/// protocol timing table and a decode tolerance.
#[derive(Debug, Clone)]
pub struct PulseCodec {
    table: TimingTable,
    tolerance_pct: u8,
}

impl PulseCodec {
    pub fn new(table: TimingTable, tolerance_pct: u8) -> Self {
        Self {
            table,
            tolerance_pct,
        }
    }

    pub fn carrier_hz(&self) -> u32 {
        self.table.carrier_hz
    }

    pub fn encode(&self, frame: &Frame) -> PulseTrain {
        let t = &self.table;
        let bytes = frame.bytes();
        let mut train = PulseTrain::with_capacity(PULSES_PER_FRAME);

        train.push(true, t.hdr_mark);
        train.push(false, t.hdr_space);
        self.encode_section(&mut train, &bytes[..SECTION_LEN]);
        train.push(true, t.bit_mark);
        train.push(false, t.section_gap);

        train.push(true, t.hdr_mark);
        train.push(false, t.inter_space);

        train.push(true, t.hdr2_mark);
        train.push(false, t.hdr2_space);
        self.encode_section(&mut train, &bytes[SECTION_LEN..]);
        train.push(true, t.bit_mark);
        train.push(false, t.section_gap);

        train.push(true, t.hdr_mark);
        train
    }

    fn encode_section(&self, train: &mut PulseTrain, bytes: &[u8]) {
        let t = &self.table;
        for byte in bytes {
            // LSB first, like the vendor remote.
            for bit in 0..8 {
                train.push(true, t.bit_mark);
                let space = if byte & (1 << bit) != 0 {
                    t.one_space
                } else {
                    t.zero_space
                };
                train.push(false, space);
            }
        }
    }

    pub fn decode(&self, train: &PulseTrain) -> Result<Frame, DecodeError> {
        if train.len() != PULSES_PER_FRAME {
            return Err(DecodeError::Truncated {
                got: train.len(),
                expected: PULSES_PER_FRAME,
            });
        }

        let t = &self.table;
        let mut reader = PulseReader {
            pulses: train.pulses(),
            pos: 0,
            tolerance_pct: self.tolerance_pct,
        };
        let mut bytes = [0u8; FRAME_LEN];

        reader.expect_header(true, t.hdr_mark)?;
        reader.expect_header(false, t.hdr_space)?;
        self.decode_section(&mut reader, &mut bytes[..SECTION_LEN])?;
        reader.expect(true, t.bit_mark)?;
        reader.expect(false, t.section_gap)?;

        reader.expect(true, t.hdr_mark)?;
        reader.expect(false, t.inter_space)?;

        reader.expect_header(true, t.hdr2_mark)?;
        reader.expect_header(false, t.hdr2_space)?;
        self.decode_section(&mut reader, &mut bytes[SECTION_LEN..])?;
        reader.expect(true, t.bit_mark)?;
        reader.expect(false, t.section_gap)?;

        reader.expect(true, t.hdr_mark)?;

        Ok(Frame::from_bytes(bytes))
    }

    fn decode_section(
        &self,
        reader: &mut PulseReader<'_>,
        bytes: &mut [u8],
    ) -> Result<(), DecodeError> {
        let t = &self.table;
        for byte in bytes {
            for bit in 0..8 {
                reader.expect(true, t.bit_mark)?;
                if reader.bit_space(t.one_space, t.zero_space)? {
                    *byte |= 1 << bit;
                }
            }
        }
        Ok(())
    }
}

struct PulseReader<'a> {
    pulses: &'a [Pulse],
    pos: usize,
    tolerance_pct: u8,
}

impl PulseReader<'_> {
    fn next(&mut self) -> (usize, Pulse) {
        // Length is validated before reading starts.
        let index = self.pos;
        self.pos += 1;
        (index, self.pulses[index])
    }

    fn expect(&mut self, high: bool, expected: u16) -> Result<(), DecodeError> {
        let (index, pulse) = self.next();
        if pulse.high != high || !within_tolerance(pulse.micros, expected, self.tolerance_pct) {
            return Err(DecodeError::TimingMismatch {
                index,
                micros: pulse.micros,
            });
        }
        Ok(())
    }

    fn expect_header(&mut self, high: bool, expected: u16) -> Result<(), DecodeError> {
        let (index, pulse) = self.next();
        if pulse.high != high || !within_tolerance(pulse.micros, expected, self.tolerance_pct) {
            return Err(DecodeError::HeaderMismatch {
                index,
                micros: pulse.micros,
            });
        }
        Ok(())
    }

    /// Reads one data-bit space; Ok(true) for a one, Ok(false) for a zero.
    fn bit_space(&mut self, one: u16, zero: u16) -> Result<bool, DecodeError> {
        let (index, pulse) = self.next();
        if !pulse.high {
            if within_tolerance(pulse.micros, one, self.tolerance_pct) {
                return Ok(true);
            }
            if within_tolerance(pulse.micros, zero, self.tolerance_pct) {
                return Ok(false);
            }
        }
        Err(DecodeError::TimingMismatch {
            index,
            micros: pulse.micros,
        })
    }
}

/// Inclusive at the boundary: an observed duration exactly `pct` percent off
/// the expected value still matches.
fn within_tolerance(observed: u16, expected: u16, pct: u8) -> bool {
    let diff = (i32::from(observed) - i32::from(expected)).abs();
    diff * 100 <= i32::from(expected) * i32::from(pct)
}
