//! Incremental HDLC frame assembly.
//!
//! The meter pushes HDLC frame format type 3 frames (IEC 62056-46) without
//! segmentation:
//!
//! ```text
//! +------+--------+--------+------+------+------+-----+-------------+-----+------+
//! | Flag | Format | Length | Dest | Src  | Ctrl | HCS | Information | FCS | Flag |
//! | 0x7E | 0xA?   | (1)    | 1-4  | 1-4  | (1)  | (2) | (n)         | (2) | 0x7E |
//! +------+--------+--------+------+------+------+-----+-------------+-----+------+
//! ```
//!
//! [`FrameAssembler`] consumes one byte at a time and only ever looks at the
//! bytes received so far, so it can sit directly behind a UART receive buffer.
//! A malformed frame is dropped and its bytes are searched for the next flag;
//! frames found there are handed out by [`FrameAssembler::recovered`].

use core::fmt;

use log::{debug, warn};

use crate::fcs::{FCS_SIZE, check_fcs};
use crate::{Error, Result};

/// HDLC frame delimiter.
pub const HDLC_FLAG: u8 = 0x7E;

/// Default receive buffer size, larger than any HAN list.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Frame format type 3 with the segmentation bit cleared.
const HDLC_FORMAT_TYPE_3: u8 = 0xA0;

/// Bits of the format byte holding the format type and segmentation bit.
const HDLC_FORMAT_MASK: u8 = 0xF8;

/// Bits of the format byte holding the upper bits of the frame length.
const HDLC_LENGTH_HIGH_MASK: u8 = 0x07;

/// LSB of an address byte: 1 marks the last byte of the address.
const HDLC_ADDRESS_LSB_MASK: u8 = 0x01;

/// Opening and closing flag.
const HDLC_FLAG_COUNT: usize = 2;

/// Flag, format and length bytes.
const HDLC_PREAMBLE_SIZE: usize = 3;

/// Format(2) + Dest(1) + Src(1) + Ctrl(1) + HCS(2) + FCS(2).
const HDLC_MIN_FRAME_LENGTH: usize = 9;

/// What to do with a frame whose header checks out but whose FCS does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FcsPolicy {
    /// Log the mismatch and decode the frame anyway.
    ///
    /// The header has already been verified by the HCS and the COSEM decoder
    /// rejects payloads that do not parse, which is what meters in the field
    /// have been decoded with so far.
    #[default]
    Tolerate,
    /// Drop the frame.
    Reject,
}

/// A complete frame, borrowed from the assembler's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdlcFrame<'a> {
    /// Destination address bytes (1, 2 or 4).
    pub destination: &'a [u8],
    /// Source address bytes (1, 2 or 4).
    pub source: &'a [u8],
    /// Control field.
    pub control: u8,
    /// Information field: LLC header, APDU header and COSEM payload.
    pub information: &'a [u8],
    /// Whether the frame check sequence matched.
    pub fcs_valid: bool,
}

/// Byte-driven HDLC frame assembler.
///
/// `N` is the receive buffer capacity; frames declaring a length that does not
/// fit are rejected as soon as the length field arrives.
///
/// # Examples
///
/// ```
/// use han_cosem::hdlc::FrameAssembler;
///
/// let mut assembler: FrameAssembler = FrameAssembler::new();
/// // Noise before the first flag is ignored.
/// assert!(matches!(assembler.push(0x00), Ok(None)));
/// assert!(matches!(assembler.push(0x7E), Ok(None)));
/// ```
pub struct FrameAssembler<const N: usize = DEFAULT_BUFFER_SIZE> {
    buffer: [u8; N],
    /// Number of bytes currently in `buffer`.
    pos: usize,
    /// Declared frame length, excluding the flags.
    frame_length: usize,
    dst_addr_size: usize,
    src_addr_size: usize,
    /// Index of the first HCS byte, 0 until the source address is complete.
    hcs_offset: usize,
    /// Bytes of a dropped frame still to be scanned sit in `buffer[read..filled]`.
    read: usize,
    filled: usize,
    /// Frame completed while scanning, not yet handed out.
    found: Option<Layout>,
    fcs_policy: FcsPolicy,
}

impl<const N: usize> FrameAssembler<N> {
    pub fn new() -> Self {
        Self::with_policy(FcsPolicy::default())
    }

    pub fn with_policy(fcs_policy: FcsPolicy) -> Self {
        Self {
            buffer: [0u8; N],
            pos: 0,
            frame_length: N,
            dst_addr_size: 0,
            src_addr_size: 0,
            hcs_offset: 0,
            read: 0,
            filled: 0,
            found: None,
            fcs_policy,
        }
    }

    pub fn fcs_policy(&self) -> FcsPolicy {
        self.fcs_policy
    }

    pub fn set_fcs_policy(&mut self, fcs_policy: FcsPolicy) {
        self.fcs_policy = fcs_policy;
    }

    /// Number of bytes of the frame in progress, including the opening flag.
    pub fn buffered(&self) -> usize {
        self.pos
    }

    /// Whether the assembler is waiting for an opening flag.
    pub fn is_idle(&self) -> bool {
        self.pos == 0
    }

    /// Drops the frame in progress and anything left to recover.
    pub fn reset(&mut self) {
        self.restart();
        self.read = 0;
        self.filled = 0;
        self.found = None;
    }

    fn restart(&mut self) {
        self.pos = 0;
        self.frame_length = N;
        self.dst_addr_size = 0;
        self.src_addr_size = 0;
        self.hcs_offset = 0;
    }

    /// Feeds one byte.
    ///
    /// Returns `Ok(Some(frame))` when `byte` completes a frame, `Ok(None)` while
    /// more bytes are needed and `Err` when the frame in progress was dropped.
    /// After a complete frame the closing flag is kept as the opening flag of
    /// the next frame.
    ///
    /// The bytes of a dropped frame are scanned again for a flag, so a frame
    /// starting inside a truncated one is still picked up. Frames that complete
    /// during that scan are handed out by [`recovered`](Self::recovered).
    pub fn push(&mut self, byte: u8) -> Result<Option<HdlcFrame<'_>>> {
        if self.found.take().is_some() {
            warn!("dropping a recovered frame nobody asked for");
        }
        while self.replay().is_some() {
            warn!("dropping a recovered frame nobody asked for");
        }

        match self.step(byte) {
            Step::Pending => Ok(None),
            Step::Complete(layout) => Ok(Some(self.frame(layout))),
            Step::Failed(error) => {
                debug!("Parser reset: {error}");
                self.read = self.pos;
                self.filled = self.pos;
                self.rewind();
                self.found = self.replay();
                Err(error)
            }
        }
    }

    /// Next frame found among the bytes of the frame [`push`](Self::push) last
    /// dropped.
    ///
    /// Call it until it returns `None` after `push` returns `Err`; whatever is
    /// left is dropped by the next `push`.
    pub fn recovered(&mut self) -> Option<HdlcFrame<'_>> {
        let layout = match self.found.take() {
            Some(layout) => layout,
            None => self.replay()?,
        };
        debug!("recovered a frame from a dropped one");
        Some(self.frame(layout))
    }

    fn step(&mut self, byte: u8) -> Step {
        // Only a flag can start a frame.
        if self.pos == 0 && byte != HDLC_FLAG {
            return Step::Pending;
        }

        // Back-to-back flags: stop-and-start.
        if self.pos == 1 && byte == HDLC_FLAG {
            return Step::Pending;
        }

        if self.pos >= N {
            return Step::Failed(Error::BufferOverflow);
        }
        self.buffer[self.pos] = byte;
        self.pos += 1;

        if self.pos == HDLC_PREAMBLE_SIZE {
            if self.buffer[1] & HDLC_FORMAT_MASK != HDLC_FORMAT_TYPE_3 {
                return Step::Failed(Error::InvalidFrameFormat);
            }

            self.frame_length = (((self.buffer[1] & HDLC_LENGTH_HIGH_MASK) as usize) << 8)
                | self.buffer[2] as usize;

            if self.frame_length > N - HDLC_FLAG_COUNT {
                return Step::Failed(Error::FrameTooLarge);
            }
            if self.frame_length < HDLC_MIN_FRAME_LENGTH {
                return Step::Failed(Error::InvalidFrameFormat);
            }

            self.dst_addr_size = 1;
        } else if self.pos == HDLC_PREAMBLE_SIZE + self.dst_addr_size && self.src_addr_size == 0 {
            if byte & HDLC_ADDRESS_LSB_MASK == 0 {
                self.dst_addr_size = match widen_address(self.dst_addr_size) {
                    Some(size) => size,
                    None => return Step::Failed(Error::InvalidAddress),
                };
            } else {
                self.src_addr_size = 1;
            }
        } else if self.pos == HDLC_PREAMBLE_SIZE + self.dst_addr_size + self.src_addr_size
            && self.hcs_offset == 0
        {
            if byte & HDLC_ADDRESS_LSB_MASK == 0 {
                self.src_addr_size = match widen_address(self.src_addr_size) {
                    Some(size) => size,
                    None => return Step::Failed(Error::InvalidAddress),
                };
            } else {
                // Control byte, then HCS.
                self.hcs_offset = HDLC_PREAMBLE_SIZE + self.dst_addr_size + self.src_addr_size + 1;

                // HCS and FCS must both fit inside the declared length.
                if self.hcs_offset + FCS_SIZE + 1 > self.frame_length {
                    return Step::Failed(Error::InvalidFrameFormat);
                }
            }
        } else if self.hcs_offset != 0 && self.pos == self.hcs_offset + FCS_SIZE + 1 {
            // Format, length, addresses and control.
            let header_length = self.hcs_offset - 1;
            if !check_fcs(&self.buffer[1..], header_length) {
                return Step::Failed(Error::HcsMismatch);
            }
            debug!("HCS checks out");
        } else if self.hcs_offset != 0 && self.pos == self.frame_length + HDLC_FLAG_COUNT {
            return self.complete();
        }

        Step::Pending
    }

    fn complete(&mut self) -> Step {
        let length = self.frame_length;

        if self.buffer[1 + length] != HDLC_FLAG {
            return Step::Failed(Error::InvalidFlag);
        }

        let fcs_valid = check_fcs(&self.buffer[1..], length - FCS_SIZE);
        if !fcs_valid {
            match self.fcs_policy {
                FcsPolicy::Reject => return Step::Failed(Error::FcsMismatch),
                FcsPolicy::Tolerate => warn!("invalid FCS CRC, decoding anyway"),
            }
        }

        let src_start = HDLC_PREAMBLE_SIZE + self.dst_addr_size;
        let layout = Layout {
            src_start,
            control_index: src_start + self.src_addr_size,
            information_start: self.hcs_offset + FCS_SIZE,
            // The FCS occupies the last two bytes of the declared length.
            information_end: length - 1,
            fcs_valid,
        };

        self.restart();
        // The closing flag doubles as the next frame's opening flag.
        self.pos = 1;

        Step::Complete(layout)
    }

    fn frame(&self, layout: Layout) -> HdlcFrame<'_> {
        HdlcFrame {
            destination: &self.buffer[HDLC_PREAMBLE_SIZE..layout.src_start],
            source: &self.buffer[layout.src_start..layout.control_index],
            control: self.buffer[layout.control_index],
            information: &self.buffer[layout.information_start..layout.information_end],
            fcs_valid: layout.fcs_valid,
        }
    }

    /// Drops the frame in progress, putting the bytes after its opening flag
    /// back in front of `buffer[read..filled]` to be scanned again.
    fn rewind(&mut self) {
        if self.pos > 1 {
            let from = self.read - (self.pos - 1);
            self.buffer.copy_within(1..self.pos, from);
            self.read = from;
        }
        self.restart();
    }

    /// Scans `buffer[read..filled]` until it runs out or completes a frame.
    ///
    /// Bytes are written back at `pos`, which never passes `read`.
    fn replay(&mut self) -> Option<Layout> {
        while self.read < self.filled {
            let byte = self.buffer[self.read];
            self.read += 1;
            match self.step(byte) {
                Step::Pending => {}
                Step::Complete(layout) => return Some(layout),
                Step::Failed(error) => {
                    debug!("Parser reset: {error}");
                    self.rewind();
                }
            }
        }

        self.read = 0;
        self.filled = 0;
        None
    }
}

impl<const N: usize> Default for FrameAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for FrameAssembler<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameAssembler")
            .field("capacity", &N)
            .field("pos", &self.pos)
            .field("frame_length", &self.frame_length)
            .field("dst_addr_size", &self.dst_addr_size)
            .field("src_addr_size", &self.src_addr_size)
            .field("hcs_offset", &self.hcs_offset)
            .field("backlog", &(self.filled - self.read))
            .field("fcs_policy", &self.fcs_policy)
            .finish()
    }
}

/// Outcome of feeding one byte.
enum Step {
    Pending,
    Complete(Layout),
    Failed(Error),
}

/// Where the fields of a completed frame sit in the buffer.
#[derive(Clone, Copy)]
struct Layout {
    src_start: usize,
    control_index: usize,
    information_start: usize,
    information_end: usize,
    fcs_valid: bool,
}

/// Next address width after a non-final address byte.
fn widen_address(size: usize) -> Option<usize> {
    match size {
        1 => Some(2),
        2 => Some(4),
        _ => None,
    }
}

/// Builds a complete frame around `information`, flags included.
#[cfg(test)]
pub(crate) fn encode_frame(
    destination: &[u8],
    source: &[u8],
    control: u8,
    information: &[u8],
) -> alloc::vec::Vec<u8> {
    use crate::fcs::append_fcs;

    let length = 2 + destination.len() + source.len() + 1 + FCS_SIZE + information.len() + FCS_SIZE;

    let mut frame = alloc::vec![
        HDLC_FORMAT_TYPE_3 | ((length >> 8) as u8 & HDLC_LENGTH_HIGH_MASK),
        length as u8,
    ];
    frame.extend_from_slice(destination);
    frame.extend_from_slice(source);
    frame.push(control);
    append_fcs(&mut frame);
    frame.extend_from_slice(information);
    append_fcs(&mut frame);

    let mut out = alloc::vec![HDLC_FLAG];
    out.extend_from_slice(&frame);
    out.push(HDLC_FLAG);
    out
}
