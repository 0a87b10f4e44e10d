//! Raster protocol engine for Brother QL series label printers.
//!
//! Everything between a decoded bitmap and a verified print job lives
//! here: the model and media tables, the raster line encoder, the
//! PackBits line compressor, the command stream builder with its explicit
//! protocol state machine, chunked transports over USB or TCP, and the
//! status telegram decoder. Image loading and command line handling are
//! deliberately left to callers.
//!
//! # Example
//!
//! ```rust,no_run
//! use ql_raster::{
//!     raster, Bitmap, CutPolicy, MediaProfile, Printer, RasterJob, UsbTransport,
//! };
//!
//! # fn run() -> Result<(), ql_raster::Error> {
//! let profile = MediaProfile::resolve("QL-820NWB", "62")?;
//! let transport = UsbTransport::open(profile.model, "000J9Z000000")?;
//!
//! let bitmap = Bitmap::new(696, 300, vec![255u8; 696 * 300])?;
//! let page = raster::encode(&bitmap, &profile, raster::DEFAULT_THRESHOLD)?;
//! let job = RasterJob::new(&profile, vec![page])
//!     .compress(true)
//!     .cut(CutPolicy::AtEnd);
//!
//! let mut printer = Printer::new(transport, profile);
//! let report = printer.print(&job)?;
//! println!("printed {} label(s): {:?}", report.pages, report.status);
//! # Ok(())
//! # }
//! ```

pub mod command;
mod error;
pub mod media;
pub mod model;
pub mod packbits;
pub mod raster;
pub mod status;
pub mod transport;

mod job;

pub use crate::{
    command::{CommandBuilder, CutPolicy, Frame, JobSetup, State},
    error::{CodecError, ConfigError, DecodeError, Error, ProtocolError, TransportError},
    job::{JobReport, Printer, RasterJob},
    media::{FormFactor, Label, MediaCode, MediaProfile},
    model::{Model, VENDOR_ID},
    raster::{Bitmap, Page},
    status::{FaultFlags, Notification, Phase, StatusTelegram, StatusType},
    transport::{MemoryTransport, TcpTransport, Transport, UsbTransport},
};

/// Raster line data: one inner `Vec<u8>` per line, 8 dots packed per byte.
///
/// Lines are always `MediaProfile::row_bytes` long before compression:
/// 90 bytes for 720-dot heads, 162 bytes for 1296-dot heads.
pub type Matrix = Vec<Vec<u8>>;
