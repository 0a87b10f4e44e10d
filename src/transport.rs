//! Byte channel to the device.
//!
//! A [`Transport`] is protocol-agnostic plumbing: it moves bytes, bounded
//! by timeouts, and never looks at what they mean. [`send_all`] splits a
//! frame into chunks no larger than the link's transfer unit and retries
//! transient failures a bounded number of times with doubling backoff.
//! Hard failures surface immediately.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext};

use crate::error::TransportError;
use crate::model::{Model, VENDOR_ID};

/// How often a transient write failure is attempted before giving up.
pub const SEND_ATTEMPTS: u32 = 3;

/// Backoff before the first retry; doubles on each further attempt.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Default TCP port of the raster print service.
pub const DEFAULT_PORT: u16 = 9100;

/// A timeout-bounded, chunk-oriented byte channel.
pub trait Transport {
    /// Write as much of `buf` as the link accepts in one transfer.
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Read up to `max` bytes, waiting at most `timeout`.
    fn read(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Largest chunk a single `write` should carry.
    fn max_transfer_unit(&self) -> usize;
}

/// Write a complete frame, chunked to the transfer unit.
///
/// Transient failures (timeout, busy) are retried up to [`SEND_ATTEMPTS`]
/// times per chunk. A short write is never retried: the device may already
/// have consumed part of the chunk and a resend would desynchronize it.
pub fn send_all<T: Transport + ?Sized>(
    transport: &mut T,
    bytes: &[u8],
) -> Result<usize, TransportError> {
    for chunk in bytes.chunks(transport.max_transfer_unit().max(1)) {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match transport.write(chunk) {
                Ok(n) if n == chunk.len() => break,
                Ok(n) => {
                    return Err(TransportError::ShortWrite {
                        wrote: n,
                        expected: chunk.len(),
                    })
                }
                Err(err) if err.is_transient() && attempt < SEND_ATTEMPTS => {
                    warn!(
                        "transient write failure ({}), attempt {}/{}",
                        err, attempt, SEND_ATTEMPTS
                    );
                    std::thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
    Ok(bytes.len())
}

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    address: u8,
}

/// USB bulk endpoint transport, discovered by vendor/product id and serial.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    endpoint_in: Endpoint,
    endpoint_out: Endpoint,
    write_timeout: Duration,
}

impl UsbTransport {
    /// Open the printer matching `model`'s product id and the given serial
    /// number, claim its interface and locate the bulk endpoints.
    pub fn open(model: &Model, serial: &str) -> Result<Self, TransportError> {
        let mut context = Context::new().map_err(TransportError::from)?;
        let (mut device, device_desc, mut handle) =
            Self::open_device(&mut context, VENDOR_ID, model.product_id, serial)?;
        handle.reset()?;

        let endpoint_in =
            Self::find_endpoint(&mut device, &device_desc, Direction::In, TransferType::Bulk)
                .ok_or(TransportError::MissingEndpoint)?;
        let endpoint_out =
            Self::find_endpoint(&mut device, &device_desc, Direction::Out, TransferType::Bulk)
                .ok_or(TransportError::MissingEndpoint)?;

        // Some models (QL-800) come up with the kernel usblp driver bound;
        // it has to be detached before we can claim the interface.
        handle.set_auto_detach_kernel_driver(true)?;
        let has_kernel_driver = matches!(handle.kernel_driver_active(0), Ok(true));
        info!("kernel driver attached: {}", has_kernel_driver);

        handle.set_active_configuration(1)?;
        handle.claim_interface(0)?;
        handle.set_alternate_setting(0, 0)?;

        Ok(UsbTransport {
            handle,
            endpoint_in,
            endpoint_out,
            write_timeout: Duration::from_secs(10),
        })
    }

    fn open_device(
        context: &mut Context,
        vid: u16,
        pid: u16,
        serial: &str,
    ) -> Result<(Device<Context>, DeviceDescriptor, DeviceHandle<Context>), TransportError> {
        let devices = context.devices().map_err(TransportError::from)?;

        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("skipping device without descriptor: {:?}", err);
                    continue;
                }
            };
            if device_desc.vendor_id() != vid || device_desc.product_id() != pid {
                continue;
            }

            let handle = match device.open() {
                Ok(handle) => handle,
                Err(err) => {
                    debug!("failed to open candidate device: {:?}", err);
                    continue;
                }
            };

            let timeout = Duration::from_secs(1);
            let languages = match handle.read_languages(timeout) {
                Ok(languages) if !languages.is_empty() => languages,
                _ => continue,
            };
            match handle.read_serial_number_string(languages[0], &device_desc, timeout) {
                Ok(s) if s == serial => return Ok((device, device_desc, handle)),
                Ok(_) => continue,
                Err(err) => {
                    debug!("failed to read serial number string: {:?}", err);
                    continue;
                }
            }
        }
        debug!("no device matched serial {:?}", serial);
        Err(TransportError::DeviceNotFound)
    }

    fn find_endpoint(
        device: &mut Device<Context>,
        device_desc: &DeviceDescriptor,
        direction: Direction,
        transfer_type: TransferType,
    ) -> Option<Endpoint> {
        for n in 0..device_desc.num_configurations() {
            let config_desc = match device.config_descriptor(n) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for interface in config_desc.interfaces() {
                for interface_desc in interface.descriptors() {
                    for endpoint_desc in interface_desc.endpoint_descriptors() {
                        if endpoint_desc.direction() == direction
                            && endpoint_desc.transfer_type() == transfer_type
                        {
                            return Some(Endpoint {
                                address: endpoint_desc.address(),
                            });
                        }
                    }
                }
            }
        }
        None
    }
}

impl Transport for UsbTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let n = self
            .handle
            .write_bulk(self.endpoint_out.address, buf, self.write_timeout)?;
        Ok(n)
    }

    fn read(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; max];
        let n = self
            .handle
            .read_bulk(self.endpoint_in.address, &mut buf, timeout)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn max_transfer_unit(&self) -> usize {
        16 * 1024
    }
}

/// Network transport to a raw socket print service (JetDirect, port 9100).
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to the printer; `addr` is typically `host:9100`.
    pub fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self, TransportError> {
        let addr = addr
            .to_socket_addrs()
            .map_err(map_io)?
            .next()
            .ok_or(TransportError::DeviceNotFound)?;
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(map_io)?;
        stream.set_nodelay(true).map_err(map_io)?;
        stream
            .set_write_timeout(Some(Duration::from_secs(10)))
            .map_err(map_io)?;
        Ok(TcpTransport { stream })
    }
}

impl Transport for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.stream.write(buf).map_err(map_io)
    }

    fn read(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.stream.set_read_timeout(Some(timeout)).map_err(map_io)?;
        let mut buf = vec![0u8; max];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(err) => Err(map_io(err)),
        }
    }

    fn max_transfer_unit(&self) -> usize {
        4096
    }
}

fn map_io(err: std::io::Error) -> TransportError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout,
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => TransportError::Disconnected,
        ErrorKind::PermissionDenied => TransportError::AccessDenied,
        _ => TransportError::Io(err),
    }
}

/// Deterministic in-memory transport.
///
/// Records everything written and serves scripted read responses. Used for
/// hardware-free testing and for capturing a job's instruction stream to a
/// buffer (e.g. to write a raster instruction file).
#[derive(Debug)]
pub struct MemoryTransport {
    written: Vec<u8>,
    responses: VecDeque<Vec<u8>>,
    mtu: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        MemoryTransport {
            written: Vec::new(),
            responses: VecDeque::new(),
            mtu: 4096,
        }
    }

    pub fn with_mtu(mtu: usize) -> Self {
        MemoryTransport {
            mtu,
            ..Self::new()
        }
    }

    /// Queue bytes to be served by the next `read`.
    pub fn push_response(&mut self, bytes: impl Into<Vec<u8>>) {
        self.responses.push_back(bytes.into());
    }

    /// Everything written so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Drain the captured instruction stream.
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn read(&mut self, max: usize, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        match self.responses.pop_front() {
            Some(mut bytes) => {
                bytes.truncate(max);
                Ok(bytes)
            }
            None => Err(TransportError::Timeout),
        }
    }

    fn max_transfer_unit(&self) -> usize {
        self.mtu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Fails a configured number of writes before succeeding.
    struct FlakyTransport {
        inner: MemoryTransport,
        failures_left: u32,
        error: fn() -> TransportError,
        write_calls: u32,
    }

    impl FlakyTransport {
        fn new(failures: u32, error: fn() -> TransportError) -> Self {
            FlakyTransport {
                inner: MemoryTransport::with_mtu(8),
                failures_left: failures,
                error,
                write_calls: 0,
            }
        }
    }

    impl Transport for FlakyTransport {
        fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
            self.write_calls += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err((self.error)());
            }
            self.inner.write(buf)
        }

        fn read(&mut self, max: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
            self.inner.read(max, timeout)
        }

        fn max_transfer_unit(&self) -> usize {
            self.inner.max_transfer_unit()
        }
    }

    #[test]
    fn send_all_chunks_to_the_transfer_unit() {
        let mut transport = MemoryTransport::with_mtu(4);
        let payload: Vec<u8> = (0..11).collect();
        assert_eq!(send_all(&mut transport, &payload).unwrap(), 11);
        assert_eq!(transport.written(), payload.as_slice());
    }

    #[test]
    fn transient_failures_are_retried() {
        let mut transport = FlakyTransport::new(2, || TransportError::Timeout);
        send_all(&mut transport, &[1, 2, 3]).unwrap();
        assert_eq!(transport.write_calls, 3);
        assert_eq!(transport.inner.written(), &[1, 2, 3]);
    }

    #[test]
    fn retries_are_bounded() {
        let mut transport = FlakyTransport::new(SEND_ATTEMPTS, || TransportError::Busy);
        let err = send_all(&mut transport, &[1, 2, 3]).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(transport.write_calls, SEND_ATTEMPTS);
        assert_eq!(transport.inner.written(), &[] as &[u8]);
    }

    #[test]
    fn permanent_failures_surface_immediately() {
        let mut transport = FlakyTransport::new(5, || TransportError::Disconnected);
        let err = send_all(&mut transport, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
        assert_eq!(transport.write_calls, 1);
    }

    #[test]
    fn scripted_reads_then_timeout() {
        let mut transport = MemoryTransport::new();
        transport.push_response(vec![0xAA; 32]);
        let timeout = Duration::from_millis(1);
        assert_eq!(transport.read(32, timeout).unwrap(), vec![0xAA; 32]);
        assert!(matches!(
            transport.read(32, timeout).unwrap_err(),
            TransportError::Timeout
        ));
    }
}
