//! Status telegram decoder.
//!
//! The printer answers ESC i S (and emits unsolicited notifications) with a
//! fixed 32 byte telegram. Field offsets are fixed by the Brother raster
//! command reference. A telegram that is short or does not carry the
//! `80 20 42` header is a framing problem on the transport, reported as
//! [`DecodeError`]; hardware conditions decode successfully into
//! [`FaultFlags`].

use std::fmt;

use crate::error::DecodeError;
use crate::media::MediaCode;

/// Exact wire size of a status telegram.
pub const TELEGRAM_LEN: usize = 32;

const HEADER: [u8; 3] = [0x80, 0x20, 0x42];

/// Device-reported fault conditions, one flag per error bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultFlags {
    // Error information 1 (offset 8).
    pub no_media: bool,
    pub end_of_media: bool,
    pub cutter_jam: bool,
    pub printer_in_use: bool,
    pub printer_offline: bool,
    pub high_voltage_adapter: bool,
    pub fan_failure: bool,
    // Error information 2 (offset 9).
    pub replace_media: bool,
    pub expansion_buffer_full: bool,
    pub communication_error: bool,
    pub cover_open: bool,
    pub media_cannot_be_fed: bool,
    pub system_error: bool,
}

impl FaultFlags {
    fn from_bytes(error_1: u8, error_2: u8) -> Self {
        FaultFlags {
            no_media: error_1 & 0x01 != 0,
            end_of_media: error_1 & 0x02 != 0,
            cutter_jam: error_1 & 0x04 != 0,
            printer_in_use: error_1 & 0x10 != 0,
            printer_offline: error_1 & 0x20 != 0,
            high_voltage_adapter: error_1 & 0x40 != 0,
            fan_failure: error_1 & 0x80 != 0,
            replace_media: error_2 & 0x01 != 0,
            expansion_buffer_full: error_2 & 0x02 != 0,
            communication_error: error_2 & 0x04 != 0,
            cover_open: error_2 & 0x10 != 0,
            media_cannot_be_fed: error_2 & 0x40 != 0,
            system_error: error_2 & 0x80 != 0,
        }
    }

    /// `true` if any fault flag is set.
    pub fn any(&self) -> bool {
        *self != FaultFlags::default()
    }

    fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut push = |set: bool, name: &'static str| {
            if set {
                names.push(name)
            }
        };
        push(self.no_media, "no media");
        push(self.end_of_media, "end of media");
        push(self.cutter_jam, "cutter jam");
        push(self.printer_in_use, "printer in use");
        push(self.printer_offline, "printer offline");
        push(self.high_voltage_adapter, "high-voltage adapter fault");
        push(self.fan_failure, "fan failure");
        push(self.replace_media, "replace media");
        push(self.expansion_buffer_full, "expansion buffer full");
        push(self.communication_error, "communication error");
        push(self.cover_open, "cover open");
        push(self.media_cannot_be_fed, "media cannot be fed");
        push(self.system_error, "system error");
        names
    }
}

impl fmt::Display for FaultFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            write!(f, "no faults")
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

/// Why the telegram was sent (offset 18).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusType {
    ReplyToRequest,
    PrintingCompleted,
    ErrorOccurred,
    Offline,
    Notification,
    PhaseChange,
    Unknown(u8),
}

impl StatusType {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::ReplyToRequest,
            0x01 => Self::PrintingCompleted,
            0x02 => Self::ErrorOccurred,
            0x04 => Self::Offline,
            0x05 => Self::Notification,
            0x06 => Self::PhaseChange,
            other => Self::Unknown(other),
        }
    }
}

/// What the printer is doing (offset 19).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Receiving,
    Printing,
    Unknown(u8),
}

impl Phase {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Receiving,
            0x01 => Self::Printing,
            other => Self::Unknown(other),
        }
    }
}

/// Cooling notifications (offset 22).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    NotAvailable,
    CoolingStarted,
    CoolingFinished,
}

impl Notification {
    fn from_code(code: u8) -> Self {
        match code {
            0x03 => Self::CoolingStarted,
            0x04 => Self::CoolingFinished,
            _ => Self::NotAvailable,
        }
    }
}

/// A decoded status telegram.
///
/// Never constructed directly by application code; always parsed from the
/// 32 wire bytes, so a telegram value is guaranteed round-trip faithful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTelegram {
    pub model_code: u8,
    pub faults: FaultFlags,
    pub media_width_mm: u8,
    pub media_type: u8,
    pub mode: u8,
    pub media_length_mm: u8,
    pub status_type: StatusType,
    pub phase: Phase,
    pub phase_number: u16,
    pub notification: Notification,
}

impl StatusTelegram {
    /// Decode a telegram from raw wire bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() != TELEGRAM_LEN {
            return Err(DecodeError::ShortRead(raw.len()));
        }
        if raw[0..3] != HEADER {
            return Err(DecodeError::BadHeader([raw[0], raw[1], raw[2]]));
        }

        Ok(StatusTelegram {
            model_code: raw[4],
            faults: FaultFlags::from_bytes(raw[8], raw[9]),
            media_width_mm: raw[10],
            media_type: raw[11],
            mode: raw[15],
            media_length_mm: raw[17],
            status_type: StatusType::from_code(raw[18]),
            phase: Phase::from_code(raw[19]),
            phase_number: u16::from_be_bytes([raw[20], raw[21]]),
            notification: Notification::from_code(raw[22]),
        })
    }

    /// The media identity the printer reports, for cross-checking against
    /// the job's profile.
    pub fn media_code(&self) -> MediaCode {
        MediaCode {
            kind: self.media_type,
            width_mm: self.media_width_mm,
            length_mm: self.media_length_mm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn telegram(error_1: u8, error_2: u8) -> [u8; 32] {
        let mut raw = [0u8; 32];
        raw[0] = 0x80;
        raw[1] = 0x20;
        raw[2] = 0x42;
        raw[3] = 0x30;
        raw[4] = 0x38; // QL-800
        raw[8] = error_1;
        raw[9] = error_2;
        raw[10] = 62; // 62mm continuous
        raw[11] = 0x0A;
        raw
    }

    #[test]
    fn cover_open_sets_exactly_one_flag() {
        let status = StatusTelegram::decode(&telegram(0x00, 0x10)).unwrap();
        assert!(status.faults.cover_open);
        assert!(status.faults.any());

        let expected = FaultFlags {
            cover_open: true,
            ..FaultFlags::default()
        };
        assert_eq!(status.faults, expected);
    }

    #[test]
    fn fault_free_telegram_decodes_cleanly() {
        let status = StatusTelegram::decode(&telegram(0x00, 0x00)).unwrap();
        assert!(!status.faults.any());
        assert_eq!(status.model_code, 0x38);
        assert_eq!(status.status_type, StatusType::ReplyToRequest);
        assert_eq!(status.phase, Phase::Receiving);
        assert_eq!(
            status.media_code(),
            MediaCode {
                kind: 0x0A,
                width_mm: 62,
                length_mm: 0
            }
        );
    }

    #[test]
    fn combined_faults_all_decode() {
        let status = StatusTelegram::decode(&telegram(0x05, 0x81)).unwrap();
        assert!(status.faults.no_media);
        assert!(status.faults.cutter_jam);
        assert!(status.faults.replace_media);
        assert!(status.faults.system_error);
        assert!(!status.faults.cover_open);
        assert_eq!(
            status.faults.to_string(),
            "no media, cutter jam, replace media, system error"
        );
    }

    #[test]
    fn every_error_bit_decodes_to_its_flag() {
        let cases: &[(u8, u8, fn(&FaultFlags) -> bool, &str)] = &[
            (0x01, 0x00, |f| f.no_media, "no media"),
            (0x02, 0x00, |f| f.end_of_media, "end of media"),
            (0x04, 0x00, |f| f.cutter_jam, "cutter jam"),
            (0x10, 0x00, |f| f.printer_in_use, "printer in use"),
            (0x20, 0x00, |f| f.printer_offline, "printer offline"),
            (0x40, 0x00, |f| f.high_voltage_adapter, "high-voltage adapter fault"),
            (0x80, 0x00, |f| f.fan_failure, "fan failure"),
            (0x00, 0x01, |f| f.replace_media, "replace media"),
            (0x00, 0x02, |f| f.expansion_buffer_full, "expansion buffer full"),
            (0x00, 0x04, |f| f.communication_error, "communication error"),
            (0x00, 0x10, |f| f.cover_open, "cover open"),
            (0x00, 0x40, |f| f.media_cannot_be_fed, "media cannot be fed"),
            (0x00, 0x80, |f| f.system_error, "system error"),
        ];
        for &(error_1, error_2, flag, name) in cases {
            let status = StatusTelegram::decode(&telegram(error_1, error_2)).unwrap();
            assert!(flag(&status.faults), "{name} not decoded");
            assert!(status.faults.any());
            // Exactly one bit set, so the display is exactly that name.
            assert_eq!(status.faults.to_string(), name);
        }
    }

    #[test]
    fn short_read_is_a_decode_error() {
        assert_eq!(
            StatusTelegram::decode(&[0x80, 0x20, 0x42]),
            Err(DecodeError::ShortRead(3))
        );
        assert_eq!(
            StatusTelegram::decode(&[0u8; 33]),
            Err(DecodeError::ShortRead(33))
        );
    }

    #[test]
    fn bad_header_is_a_decode_error() {
        let mut raw = telegram(0, 0);
        raw[2] = 0x43;
        assert_eq!(
            StatusTelegram::decode(&raw),
            Err(DecodeError::BadHeader([0x80, 0x20, 0x43]))
        );
    }

    #[test]
    fn status_and_phase_codes_decode() {
        let mut raw = telegram(0, 0);
        raw[18] = 0x01;
        raw[19] = 0x01;
        raw[20] = 0x00;
        raw[21] = 0x02;
        raw[22] = 0x03;
        let status = StatusTelegram::decode(&raw).unwrap();
        assert_eq!(status.status_type, StatusType::PrintingCompleted);
        assert_eq!(status.phase, Phase::Printing);
        assert_eq!(status.phase_number, 2);
        assert_eq!(status.notification, Notification::CoolingStarted);
    }
}
