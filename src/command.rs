//! Command frame builder and protocol state machine.
//!
//! A print job is an ordered stream of [`Frame`]s. The ordering rules are
//! enforced by [`CommandBuilder`], an explicit state value rather than
//! implicit control flow: initialize once, configure media, stream raster
//! lines, finish with a print frame. Calling out of order is a contract
//! violation reported as `ProtocolError::InvalidState`, never silently
//! tolerated.

use log::warn;

use crate::error::ProtocolError;
use crate::media::MediaProfile;
use crate::packbits;
use crate::raster::Page;

/// Where the cutter blade engages, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutPolicy {
    /// Cut after every `n`-th label; `Every(1)` cuts after each one.
    Every(u8),
    /// Cut once after the last label of the job.
    AtEnd,
    /// Never cut.
    NoCut,
}

/// Job parameters the builder needs beyond the media profile.
#[derive(Debug, Clone, Copy)]
pub struct JobSetup {
    pub compression: bool,
    pub cut: CutPolicy,
    pub two_color: bool,
    pub high_resolution: bool,
    pub quality_priority: bool,
    /// Feed amount in dots appended after each label.
    pub feed: u16,
}

/// Builder states, in stream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Initialized,
    MediaConfigured,
    Streaming,
    Finalized,
}

/// One structurally complete unit of the outgoing command stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 200 zero bytes flushing any partial command from the receive buffer.
    Invalidate,
    /// ESC @
    Initialize,
    /// ESC i a 01: switch to raster command mode.
    SwitchMode,
    /// ESC i ! 00: enable automatic status notification.
    SetAutoStatus,
    /// M n: select PackBits compression (0x02) or raw lines (0x00).
    SetCompression { enabled: bool },
    /// ESC i z: media type, width, length and raster line count.
    SetMediaConfig {
        kind: u8,
        width_mm: u8,
        length_mm: u8,
        lines: u32,
        first_page: bool,
        quality_priority: bool,
    },
    /// ESC i M: various mode, auto-cut flag in bit 6.
    SetVariousMode { auto_cut: bool },
    /// ESC i A n: cut every n-th label.
    SetCutEvery { n: u8 },
    /// ESC i K: expanded mode flags.
    SetExpandedMode {
        cut_at_end: bool,
        high_resolution: bool,
        two_color: bool,
    },
    /// ESC i d: feed margin in dots, little endian.
    SetFeedMargin { dots: u16 },
    /// g 00 n / w plane n: one raster line, raw or compressed body.
    /// `plane` is 0 for monochrome, 1 (black) or 2 (red) for two-color.
    RasterLine { plane: u8, data: Vec<u8> },
    /// FF: print the page and feed to the next label.
    PrintAndFeed,
    /// SUB: print the final page and eject.
    PrintAndEject,
    /// ESC i S: request a status telegram.
    StatusRequest,
}

impl Frame {
    /// Encode the frame into its wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Frame::Invalidate => vec![0x00; 200],
            Frame::Initialize => vec![0x1B, 0x40],
            Frame::SwitchMode => vec![0x1B, 0x69, 0x61, 0x01],
            Frame::SetAutoStatus => vec![0x1B, 0x69, 0x21, 0x00],
            Frame::SetCompression { enabled } => {
                vec![0x4D, if *enabled { 0x02 } else { 0x00 }]
            }
            Frame::SetMediaConfig {
                kind,
                width_mm,
                length_mm,
                lines,
                first_page,
                quality_priority,
            } => {
                let mut flags: u8 = 0x80;
                flags |= 0x02 | 0x04 | 0x08; // type, width and length are valid
                if *quality_priority {
                    flags |= 0x40;
                }
                let mut buf = vec![0x1B, 0x69, 0x7A, flags, *kind, *width_mm, *length_mm];
                buf.extend_from_slice(&lines.to_le_bytes());
                buf.push(if *first_page { 0x00 } else { 0x01 });
                buf.push(0x00);
                buf
            }
            Frame::SetVariousMode { auto_cut } => {
                vec![0x1B, 0x69, 0x4D, (*auto_cut as u8) << 6]
            }
            Frame::SetCutEvery { n } => vec![0x1B, 0x69, 0x41, *n],
            Frame::SetExpandedMode {
                cut_at_end,
                high_resolution,
                two_color,
            } => {
                let mut flags: u8 = 0x00;
                flags |= *two_color as u8;
                flags |= (*cut_at_end as u8) << 3;
                flags |= (*high_resolution as u8) << 6;
                vec![0x1B, 0x69, 0x4B, flags]
            }
            Frame::SetFeedMargin { dots } => {
                let mut buf = vec![0x1B, 0x69, 0x64];
                buf.extend_from_slice(&dots.to_le_bytes());
                buf
            }
            Frame::RasterLine { plane, data } => {
                let mut buf = if *plane == 0 {
                    vec![0x67, 0x00, data.len() as u8]
                } else {
                    vec![0x77, *plane, data.len() as u8]
                };
                buf.extend_from_slice(data);
                buf
            }
            Frame::PrintAndFeed => vec![0x0C],
            Frame::PrintAndEject => vec![0x1A],
            Frame::StatusRequest => vec![0x1B, 0x69, 0x53],
        }
    }
}

/// Assembles the frame stream for one job, enforcing ordering.
pub struct CommandBuilder<'a> {
    profile: &'a MediaProfile,
    setup: JobSetup,
    state: State,
    first_page: bool,
}

impl<'a> CommandBuilder<'a> {
    /// Bind a builder to a media profile and job setup.
    ///
    /// Compression requested on a model that cannot decode it is
    /// downgraded to raw lines with a warning, mirroring what the printer
    /// itself would do with the unsupported opcode.
    pub fn new(profile: &'a MediaProfile, mut setup: JobSetup) -> Self {
        if setup.compression && !profile.model.compression {
            warn!(
                "{} does not support compression, sending raw raster lines",
                profile.model.identifier
            );
            setup.compression = false;
        }
        CommandBuilder {
            profile,
            setup,
            state: State::Idle,
            first_page: true,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Effective compression after the capability downgrade.
    pub fn compression(&self) -> bool {
        self.setup.compression
    }

    fn expect(&self, expected: State) -> Result<(), ProtocolError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ProtocolError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    /// `Idle -> Initialized`: reset preamble and initialization, plus the
    /// mode switch on models that understand it.
    pub fn initialize(&mut self) -> Result<Vec<Frame>, ProtocolError> {
        self.expect(State::Idle)?;

        let mut frames = vec![Frame::Invalidate, Frame::Initialize];
        if self.profile.model.mode_setting {
            frames.push(Frame::SwitchMode);
            frames.push(Frame::SetAutoStatus);
        }
        self.state = State::Initialized;
        Ok(frames)
    }

    /// `Initialized -> MediaConfigured`: compression mode, media record,
    /// cutter setup, expanded mode and feed margin for the next page.
    ///
    /// `lines_per_plane` is the raster line count of the page per color
    /// plane, as the ESC i z record expects it.
    pub fn configure_media(&mut self, lines_per_plane: u32) -> Result<Vec<Frame>, ProtocolError> {
        self.expect(State::Initialized)?;

        let model = self.profile.model;
        if self.setup.cut != CutPolicy::NoCut && !model.cutting {
            return Err(ProtocolError::UnsupportedOperation("cut"));
        }

        let mut frames = Vec::new();
        if model.compression {
            frames.push(Frame::SetCompression {
                enabled: self.setup.compression,
            });
        }

        let code = self.profile.code();
        frames.push(Frame::SetMediaConfig {
            kind: code.kind,
            width_mm: code.width_mm,
            length_mm: code.length_mm,
            lines: lines_per_plane,
            first_page: self.first_page,
            quality_priority: self.setup.quality_priority,
        });

        if model.cutting {
            let auto_cut = matches!(self.setup.cut, CutPolicy::Every(_));
            frames.push(Frame::SetVariousMode { auto_cut });
            if let CutPolicy::Every(n) = self.setup.cut {
                frames.push(Frame::SetCutEvery { n });
            }
        }

        if model.expanded_mode {
            frames.push(Frame::SetExpandedMode {
                cut_at_end: self.setup.cut != CutPolicy::NoCut,
                high_resolution: self.setup.high_resolution,
                two_color: self.setup.two_color,
            });
        }

        frames.push(Frame::SetFeedMargin {
            dots: self.setup.feed,
        });

        self.state = State::MediaConfigured;
        Ok(frames)
    }

    /// `MediaConfigured|Streaming -> Streaming`: one raster line.
    ///
    /// `plane` is 0 for monochrome, 1 or 2 for the two-color planes. The
    /// raw line must match the profile's row byte length; compression only
    /// changes the transmitted body.
    pub fn raster_line(&mut self, plane: u8, row: &[u8]) -> Result<Frame, ProtocolError> {
        if self.state != State::MediaConfigured && self.state != State::Streaming {
            return Err(ProtocolError::MediaNotConfigured);
        }
        if row.len() != self.profile.row_bytes {
            return Err(ProtocolError::BadRowLength {
                len: row.len(),
                expected: self.profile.row_bytes,
            });
        }

        let data = if self.setup.compression {
            packbits::compress(row)
        } else {
            row.to_vec()
        };
        self.state = State::Streaming;
        Ok(Frame::RasterLine { plane, data })
    }

    /// All raster lines of one encoded page, in transmission order.
    pub fn raster_page(&mut self, page: &Page) -> Result<Vec<Frame>, ProtocolError> {
        let mut frames = Vec::with_capacity(page.rows().len());
        for (index, row) in page.rows().iter().enumerate() {
            let plane = if page.planes() == 2 {
                1 + (index % 2) as u8
            } else {
                0
            };
            frames.push(self.raster_line(plane, row)?);
        }
        Ok(frames)
    }

    /// `Streaming -> Finalized` for the last page, or back to
    /// `Initialized` for the next label of a multi-label job.
    pub fn print_page(&mut self, last: bool) -> Result<Frame, ProtocolError> {
        self.expect(State::Streaming)?;
        if last {
            self.state = State::Finalized;
            Ok(Frame::PrintAndEject)
        } else {
            self.state = State::Initialized;
            self.first_page = false;
            Ok(Frame::PrintAndFeed)
        }
    }
}
