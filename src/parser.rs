//! Byte-driven front end tying the pipeline together.

use log::debug;

use crate::Result;
use crate::data::tokenize;
use crate::data_notification::parse_msdu;
use crate::dialect::{CATALOG, Dialect, DialectId, resolve};
use crate::hdlc::{DEFAULT_BUFFER_SIZE, FcsPolicy, FrameAssembler, HdlcFrame};
use crate::measurement::{Measurement, extract};
use crate::statistics::Statistics;

/// Configuration for [`HanParser`].
///
/// # Examples
///
/// ```
/// use han_cosem::{FcsPolicy, HanParser, ParserSettings};
///
/// let settings = ParserSettings { fcs_policy: FcsPolicy::Reject, ..Default::default() };
/// let parser = HanParser::with_settings(settings);
/// assert_eq!(parser.settings().fcs_policy, FcsPolicy::Reject);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ParserSettings {
    /// What to do with frames failing the frame check sequence.
    /// Default: Tolerate.
    pub fcs_policy: FcsPolicy,
    /// Dialects to detect, in search order.
    /// Default: the built-in [`CATALOG`].
    pub catalog: &'static [Dialect],
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self { fcs_policy: FcsPolicy::Tolerate, catalog: CATALOG }
    }
}

/// Decodes the byte stream of a HAN port into [`Measurement`]s.
///
/// The parser owns the frame buffer, the dialect remembered between messages
/// and the statistics. Bytes are fed one at a time in arrival order; nothing
/// is ever returned for a malformed frame, it is logged, counted and skipped.
///
/// `N` is the frame buffer capacity.
#[derive(Debug)]
pub struct HanParser<const N: usize = DEFAULT_BUFFER_SIZE> {
    assembler: FrameAssembler<N>,
    settings: ParserSettings,
    session: Option<DialectId>,
    statistics: Statistics,
}

impl HanParser {
    pub fn new() -> Self {
        Self::with_settings(ParserSettings::default())
    }

    pub fn with_settings(settings: ParserSettings) -> Self {
        Self::with_buffer(settings)
    }
}

impl Default for HanParser {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> HanParser<N> {
    /// Creates a parser with a buffer of `N` bytes.
    ///
    /// ```
    /// use han_cosem::{HanParser, ParserSettings};
    ///
    /// let parser = HanParser::<256>::with_buffer(ParserSettings::default());
    /// assert!(parser.dialect().is_none());
    /// ```
    pub fn with_buffer(settings: ParserSettings) -> Self {
        Self {
            assembler: FrameAssembler::with_policy(settings.fcs_policy),
            settings,
            session: None,
            statistics: Statistics::new(),
        }
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// The dialect remembered from earlier messages.
    pub fn dialect(&self) -> Option<DialectId> {
        self.session
    }

    /// Makes the next message with a list identifier run detection again.
    pub fn forget_dialect(&mut self) {
        self.session = None;
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn reset_statistics(&mut self) {
        self.statistics.clear();
    }

    /// Drops any partially received frame.
    pub fn reset(&mut self) {
        self.assembler.reset();
    }

    /// Feeds one byte from the meter.
    ///
    /// Returns a measurement when `byte` completes a frame that decodes. When
    /// `byte` breaks a frame that had swallowed several complete ones, only the
    /// last of those is returned; use [`feed`](Self::feed) to get them all.
    pub fn feed_byte(&mut self, byte: u8) -> Option<Measurement> {
        let mut last = None;
        self.process(byte, &mut |measurement| last = Some(measurement));
        last
    }

    /// Feeds a chunk of bytes, calling `on_decoded` for every measurement.
    ///
    /// Returns the number of measurements decoded.
    pub fn feed<F>(&mut self, bytes: &[u8], mut on_decoded: F) -> usize
    where
        F: FnMut(&Measurement),
    {
        let mut decoded = 0;
        for &byte in bytes {
            self.process(byte, &mut |measurement| {
                on_decoded(&measurement);
                decoded += 1;
            });
        }
        decoded
    }

    fn process(&mut self, byte: u8, on_decoded: &mut dyn FnMut(Measurement)) {
        let catalog = self.settings.catalog;
        let error = match self.assembler.push(byte) {
            Ok(None) => return,
            Ok(Some(frame)) => {
                receive(catalog, &mut self.session, &mut self.statistics, &frame, on_decoded);
                return;
            }
            Err(error) => error,
        };

        self.statistics.increment_frames_received();
        self.statistics.record_error(&error);
        while let Some(frame) = self.assembler.recovered() {
            receive(catalog, &mut self.session, &mut self.statistics, &frame, on_decoded);
        }
    }

    /// Decodes the information field of a frame framed elsewhere.
    pub fn decode_frame(&mut self, information: &[u8]) -> Result<Measurement> {
        self.statistics.increment_frames_received();
        decode(self.settings.catalog, &mut self.session, &mut self.statistics, information)
    }
}

fn receive(
    catalog: &'static [Dialect],
    session: &mut Option<DialectId>,
    statistics: &mut Statistics,
    frame: &HdlcFrame<'_>,
    on_decoded: &mut dyn FnMut(Measurement),
) {
    statistics.increment_frames_received();
    if !frame.fcs_valid {
        statistics.increment_fcs_errors();
    }
    if let Ok(measurement) = decode(catalog, session, statistics, frame.information) {
        on_decoded(measurement);
    }
}

fn decode(
    catalog: &'static [Dialect],
    session: &mut Option<DialectId>,
    statistics: &mut Statistics,
    information: &[u8],
) -> Result<Measurement> {
    let result = parse_msdu(information).and_then(|(_, payload)| {
        let tokens = tokenize(payload)?;
        let resolution = resolve(catalog, &tokens, session)?;
        if resolution.detected {
            statistics.increment_dialect_detections();
        }
        extract(&tokens, &resolution)
    });

    match &result {
        Ok(measurement) => {
            debug!("Decoded {} ({:?})", measurement.shape, measurement.dialect);
            statistics.increment_frames_decoded();
        }
        Err(err) => {
            debug!("Parser reset: {err}");
            statistics.record_error(err);
        }
    }

    result
}
