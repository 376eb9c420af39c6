/// One carrier-on (mark) or carrier-off (space) segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub high: bool,
    pub micros: u16,
}

/// Physical representation of one transmission: alternating mark/space
/// pulses, mark first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PulseTrain {
    pulses: Vec<Pulse>,
}

impl PulseTrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pulses: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, high: bool, micros: u16) {
        self.pulses.push(Pulse { high, micros });
    }

    pub fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    /// Total on-air duration, known before the train is handed to hardware.
    pub fn total_micros(&self) -> u64 {
        self.pulses.iter().map(|p| u64::from(p.micros)).sum()
    }
}

/// Pulse durations for one protocol variant, in microseconds. Variants are
/// data handed to the codec at construction, not separate codec types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingTable {
    /// Section 1 header mark; also the inter-section and final mark.
    pub hdr_mark: u16,
    pub hdr_space: u16,
    /// Section 2 header.
    pub hdr2_mark: u16,
    pub hdr2_space: u16,
    pub bit_mark: u16,
    pub one_space: u16,
    pub zero_space: u16,
    /// Space after each section's 64 data bits.
    pub section_gap: u16,
    /// Space between the inter-section mark and the section 2 header.
    pub inter_space: u16,
    pub carrier_hz: u32,
}

/// Carrier AC128 timings, matching IRremoteESP8266's ir_Carrier tables.
pub const CARRIER_AC128: TimingTable = TimingTable {
    hdr_mark: 4600,
    hdr_space: 2600,
    hdr2_mark: 9300,
    hdr2_space: 5000,
    bit_mark: 340,
    one_space: 1000,
    zero_space: 400,
    section_gap: 20600,
    inter_space: 6700,
    carrier_hz: 38_000,
};
