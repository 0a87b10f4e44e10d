//! Job orchestrator.
//!
//! Runs one print job end to end: query the printer's status, verify the
//! installed media matches the job's profile, drive the command builder
//! through its states while writing every frame to the transport, then
//! read back the final telegram. One job owns its transport exclusively
//! for the duration, so frame ordering can never interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info};

use crate::command::{CommandBuilder, CutPolicy, Frame, JobSetup};
use crate::error::{ConfigError, Error, ProtocolError, TransportError};
use crate::media::MediaProfile;
use crate::raster::Page;
use crate::status::{StatusTelegram, StatusType, TELEGRAM_LEN};
use crate::transport::{send_all, Transport};

const STATUS_TIMEOUT: Duration = Duration::from_secs(1);
const STATUS_POLL_ATTEMPTS: u32 = 10;
const STATUS_POLL_DELAY: Duration = Duration::from_millis(500);

/// One print request: encoded pages plus job options.
///
/// Immutable after construction and consumed once by [`Printer::print`].
#[derive(Debug, Clone)]
pub struct RasterJob {
    pages: Vec<Page>,
    copies: usize,
    setup: JobSetup,
}

impl RasterJob {
    /// Create a job with default options: no compression, cut at the end,
    /// the profile's default feed.
    pub fn new(profile: &MediaProfile, pages: Vec<Page>) -> Self {
        let two_color = pages.first().map(|p| p.planes() == 2).unwrap_or(false);
        RasterJob {
            pages,
            copies: 1,
            setup: JobSetup {
                compression: false,
                cut: CutPolicy::AtEnd,
                two_color,
                high_resolution: false,
                quality_priority: false,
                feed: profile.default_feed_dots(),
            },
        }
    }

    pub fn compress(mut self, flag: bool) -> Self {
        self.setup.compression = flag;
        self
    }

    /// Print the whole page sequence `n` times.
    pub fn copies(mut self, n: usize) -> Self {
        self.copies = n;
        self
    }

    pub fn cut(mut self, policy: CutPolicy) -> Self {
        self.setup.cut = policy;
        self
    }

    pub fn high_resolution(mut self, flag: bool) -> Self {
        self.setup.high_resolution = flag;
        self
    }

    pub fn quality_priority(mut self, flag: bool) -> Self {
        self.setup.quality_priority = flag;
        self
    }

    pub fn feed_in_dots(mut self, feed: u16) -> Self {
        self.setup.feed = feed;
        self
    }

    /// Reject impossible jobs before a single byte goes out.
    fn validate(&self, profile: &MediaProfile) -> Result<(), Error> {
        if self.pages.is_empty() || self.copies == 0 {
            return Err(ConfigError::EmptyJob.into());
        }
        let planes = self.pages[0].planes();
        if self.pages.iter().any(|p| p.planes() != planes) {
            return Err(ConfigError::PlaneMismatch.into());
        }
        if self.setup.two_color && !profile.model.two_color {
            return Err(ConfigError::TwoColorUnsupported(profile.model.identifier).into());
        }
        if self.setup.cut != CutPolicy::NoCut && !profile.model.cutting {
            return Err(ProtocolError::UnsupportedOperation("cut").into());
        }
        if self.setup.cut == CutPolicy::Every(0) {
            return Err(ConfigError::InvalidCutInterval.into());
        }
        profile.validate_feed(self.setup.feed)?;
        Ok(())
    }
}

/// Outcome of a successfully transmitted job.
#[derive(Debug)]
pub struct JobReport {
    /// Number of labels printed.
    pub pages: usize,
    /// Total bytes written to the transport.
    pub bytes_sent: usize,
    /// Final telegram read after the eject frame.
    pub status: StatusTelegram,
}

/// A printer bound to one transport handle and one media profile.
pub struct Printer<T: Transport> {
    transport: T,
    profile: MediaProfile,
}

impl<T: Transport> Printer<T> {
    pub fn new(transport: T, profile: MediaProfile) -> Self {
        Printer { transport, profile }
    }

    pub fn profile(&self) -> &MediaProfile {
        &self.profile
    }

    /// Give the transport back, e.g. to drain a captured memory stream.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Request and decode a status telegram.
    ///
    /// Convenient for inspection when new media is loaded.
    pub fn check_status(&mut self) -> Result<StatusTelegram, Error> {
        self.request_status()?;
        self.read_telegram()
    }

    /// Print a job, without external cancellation.
    pub fn print(&mut self, job: &RasterJob) -> Result<JobReport, Error> {
        self.print_with_abort(job, &AtomicBool::new(false))
    }

    /// Print a job, checking `abort` between frames.
    ///
    /// On cancellation a best-effort status request is still issued so the
    /// device drops any partial command buffer and ends in a known state.
    pub fn print_with_abort(
        &mut self,
        job: &RasterJob,
        abort: &AtomicBool,
    ) -> Result<JobReport, Error> {
        job.validate(&self.profile)?;

        let status = self.check_status()?;
        debug!("pre-flight status: {:?}", status);
        if status.faults.any() {
            return Err(Error::DeviceFault(status.faults));
        }

        let expected = self.profile.code();
        let reported = status.media_code();
        if expected != reported {
            return Err(ProtocolError::MediaMismatch { expected, reported }.into());
        }

        let profile = self.profile;
        let mut builder = CommandBuilder::new(&profile, job.setup);
        let mut bytes_sent = 0;

        bytes_sent += self.send_frames(builder.initialize()?, abort)?;

        let page_count = job.pages.len() * job.copies;
        let mut final_status = status;
        for (index, page) in job.pages.iter().cycle().take(page_count).enumerate() {
            info!(
                "page {}/{}: {} lines per plane",
                index + 1,
                page_count,
                page.lines_per_plane()
            );
            bytes_sent += self.send_frames(builder.configure_media(page.lines_per_plane())?, abort)?;
            for frame in builder.raster_page(page)? {
                bytes_sent += self.send_frame(frame, abort)?;
            }

            let last = index + 1 == page_count;
            bytes_sent += self.send_frame(builder.print_page(last)?, abort)?;
            final_status = self.wait_page_done()?;
        }

        Ok(JobReport {
            pages: page_count,
            bytes_sent,
            status: final_status,
        })
    }

    fn send_frame(&mut self, frame: Frame, abort: &AtomicBool) -> Result<usize, Error> {
        if abort.load(Ordering::Relaxed) {
            // Never abort mid-frame; flush the device's command buffer and
            // read back whatever it has to say before giving up the handle.
            let _ = self.request_status();
            let _ = self.read_telegram();
            return Err(Error::Cancelled);
        }
        Ok(send_all(&mut self.transport, &frame.to_bytes())?)
    }

    fn send_frames(&mut self, frames: Vec<Frame>, abort: &AtomicBool) -> Result<usize, Error> {
        let mut sent = 0;
        for frame in frames {
            sent += self.send_frame(frame, abort)?;
        }
        Ok(sent)
    }

    fn request_status(&mut self) -> Result<(), Error> {
        let mut bytes = Frame::Invalidate.to_bytes();
        bytes.extend(Frame::Initialize.to_bytes());
        bytes.extend(Frame::StatusRequest.to_bytes());
        send_all(&mut self.transport, &bytes)?;
        Ok(())
    }

    fn read_telegram(&mut self) -> Result<StatusTelegram, Error> {
        for _ in 0..STATUS_POLL_ATTEMPTS {
            match self.transport.read(TELEGRAM_LEN, STATUS_TIMEOUT) {
                Ok(bytes) if bytes.is_empty() => std::thread::sleep(STATUS_POLL_DELAY),
                Ok(bytes) => return Ok(StatusTelegram::decode(&bytes)?),
                Err(err) if err.is_transient() => std::thread::sleep(STATUS_POLL_DELAY),
                Err(err) => return Err(err.into()),
            }
        }
        Err(TransportError::Timeout.into())
    }

    /// Wait until the printer reports the current page as printed.
    fn wait_page_done(&mut self) -> Result<StatusTelegram, Error> {
        for _ in 0..STATUS_POLL_ATTEMPTS {
            let status = self.read_telegram()?;
            if status.faults.any() {
                return Err(Error::DeviceFault(status.faults));
            }
            match status.status_type {
                StatusType::PrintingCompleted => return Ok(status),
                StatusType::ErrorOccurred => return Err(Error::DeviceFault(status.faults)),
                other => debug!("still waiting, status type {:?}", other),
            }
        }
        Err(TransportError::Timeout.into())
    }
}
