//! Direction decoding for raw CLK/DT encoder signals.
//!
//! Decode state lives only in the poller. Both decoders are fed one
//! sample per observed change and report at most one direction per
//! detent.

use platform::Direction;

/// Decodes on CLK falling edges: DT high means clockwise.
///
/// Suited to expanders that capture both pins at the moment CLK changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeDecoder {
    previous_clk: bool,
}

impl Default for EdgeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeDecoder {
    /// Decoder assuming CLK idles high (pulled up).
    pub const fn new() -> Self {
        Self { previous_clk: true }
    }

    /// Reset the remembered CLK level, e.g. after reading the port.
    pub fn seed(&mut self, clk: bool) {
        self.previous_clk = clk;
    }

    /// Feed one (CLK, DT) sample.
    pub fn update(&mut self, clk: bool, dt: bool) -> Option<Direction> {
        let falling = self.previous_clk && !clk;
        self.previous_clk = clk;
        if !falling {
            return None;
        }
        Some(if dt {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        })
    }
}

/// Half-quadrature decoder over the last four (CLK, DT) samples.
///
/// Each sample shifts two bits in, CLK above DT. A complete detent ends on
/// both lines low, so a rising edge can never complete a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShiftDecoder {
    state: u8,
    last: Option<(bool, bool)>,
}

/// (1,0) (1,1) (0,1) (0,0): CLK falls while DT is high
const PATTERN_CW: u8 = 0b1011_0100;
/// (0,1) (1,1) (1,0) (0,0): CLK falls while DT is low
const PATTERN_CCW: u8 = 0b0111_1000;

impl ShiftDecoder {
    /// Empty history.
    pub const fn new() -> Self {
        Self {
            state: 0,
            last: None,
        }
    }

    /// Feed one (CLK, DT) sample. Repeated identical samples are ignored.
    pub fn update(&mut self, clk: bool, dt: bool) -> Option<Direction> {
        if self.last == Some((clk, dt)) {
            return None;
        }
        self.last = Some((clk, dt));
        self.state = (self.state & 0x3F).wrapping_shl(2) | u8::from(clk).wrapping_shl(1) | u8::from(dt);
        match self.state {
            PATTERN_CCW => Some(Direction::CounterClockwise),
            PATTERN_CW => Some(Direction::Clockwise),
            _ => None,
        }
    }
}
