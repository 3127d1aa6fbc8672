use crate::event::SimEvent;
use crate::fixed::{Fixed64, Ticks};

/// Outcome of one [`Simulation::tick`](crate::engine::Simulation::tick).
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Tick number after the increment.
    pub tick: Ticks,
    /// Events in emission order.
    pub events: Vec<SimEvent>,
    pub transports_delivered: usize,
    /// The caller should persist the game state now.
    pub persist_due: bool,
}

/// Result of running several ticks back to back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceResult {
    pub steps_run: u64,
    pub events: Vec<SimEvent>,
    pub persist_due: bool,
}

impl AdvanceResult {
    pub(crate) fn absorb(&mut self, report: TickReport) {
        self.steps_run += 1;
        self.events.extend(report.events);
        self.persist_due |= report.persist_due;
    }
}

/// FNV-1a hash used for determinism checks and market seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
