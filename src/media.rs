//! Label media registry and derived print geometry.
//!
//! [`Label`] records describe the physical media exactly as the Brother
//! documentation tables do. Binding a label to a model through
//! [`MediaProfile::resolve`] derives everything the encoder and the command
//! builder need: row byte length, printable width, right margin and the
//! media codes the printer reports back in its status telegram.

use std::fmt;

use crate::error::ConfigError;
use crate::model::Model;

/// Physical form of the media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFactor {
    /// Continuous tape, cut to length by the printer.
    Continuous,
    /// Pre-cut rectangular labels.
    DieCut,
    /// Pre-cut round labels.
    RoundDieCut,
}

impl FormFactor {
    /// Media type code used on the wire (ESC i z and the status telegram).
    pub const fn code(self) -> u8 {
        match self {
            FormFactor::Continuous => 0x0A,
            FormFactor::DieCut | FormFactor::RoundDieCut => 0x0B,
        }
    }

    pub const fn is_die_cut(self) -> bool {
        matches!(self, FormFactor::DieCut | FormFactor::RoundDieCut)
    }
}

/// Specification of one label size.
#[derive(Debug, PartialEq, Eq)]
pub struct Label {
    /// Identifier used to select the label, e.g. "29", "62red", "17x54", "d24".
    pub identifier: &'static str,
    /// Tape size in mm; length is 0 for continuous tape.
    pub tape_width_mm: u8,
    pub tape_length_mm: u8,
    pub form_factor: FormFactor,
    /// Total label area in dots at 300 dpi (width, length).
    pub dots_total: (u32, u32),
    /// Printable area in dots (width, length); length 0 for continuous.
    pub dots_printable: (u32, u32),
    /// Offset from the right edge of the head for a centered printout.
    pub offset_r: u32,
    /// Default feed amount in dots.
    pub feed_margin: u16,
    /// Label stock that supports black/red printing.
    pub two_color_capable: bool,
}

impl Label {
    const fn new(
        identifier: &'static str,
        tape: (u8, u8),
        form_factor: FormFactor,
        dots_total: (u32, u32),
        dots_printable: (u32, u32),
        offset_r: u32,
        feed_margin: u16,
    ) -> Self {
        Label {
            identifier,
            tape_width_mm: tape.0,
            tape_length_mm: tape.1,
            form_factor,
            dots_total,
            dots_printable,
            offset_r,
            feed_margin,
            two_color_capable: false,
        }
    }

    const fn with_two_color(mut self) -> Self {
        self.two_color_capable = true;
        self
    }

    /// Look a label up by its identifier.
    pub fn lookup(identifier: &str) -> Result<&'static Label, ConfigError> {
        LABELS
            .iter()
            .find(|l| l.identifier.eq_ignore_ascii_case(identifier))
            .ok_or_else(|| ConfigError::UnknownLabel(identifier.to_string()))
    }
}

/// The label table, 300 dpi geometry from the Brother documentation.
pub static LABELS: &[Label] = &[
    Label::new("12", (12, 0), FormFactor::Continuous, (142, 0), (106, 0), 29, 35),
    Label::new("29", (29, 0), FormFactor::Continuous, (342, 0), (306, 0), 6, 35),
    Label::new("38", (38, 0), FormFactor::Continuous, (449, 0), (413, 0), 12, 35),
    Label::new("50", (50, 0), FormFactor::Continuous, (590, 0), (554, 0), 12, 35),
    Label::new("54", (54, 0), FormFactor::Continuous, (636, 0), (590, 0), 0, 35),
    Label::new("62", (62, 0), FormFactor::Continuous, (732, 0), (696, 0), 12, 35),
    Label::new("62red", (62, 0), FormFactor::Continuous, (732, 0), (696, 0), 12, 35)
        .with_two_color(),
    Label::new("102", (102, 0), FormFactor::Continuous, (1200, 0), (1164, 0), 12, 35),
    Label::new("17x54", (17, 54), FormFactor::DieCut, (201, 636), (165, 566), 0, 0),
    Label::new("17x87", (17, 87), FormFactor::DieCut, (201, 1026), (165, 956), 0, 0),
    Label::new("23x23", (23, 23), FormFactor::DieCut, (272, 272), (202, 202), 42, 0),
    Label::new("29x42", (29, 42), FormFactor::DieCut, (342, 495), (306, 425), 6, 0),
    Label::new("29x90", (29, 90), FormFactor::DieCut, (342, 1061), (306, 991), 6, 0),
    // "39x90" is the catalogue name even though the tape is 38mm wide.
    Label::new("39x90", (38, 90), FormFactor::DieCut, (449, 1061), (413, 991), 12, 0),
    Label::new("39x48", (39, 48), FormFactor::DieCut, (461, 565), (425, 495), 6, 0),
    Label::new("52x29", (52, 29), FormFactor::DieCut, (614, 341), (578, 271), 0, 0),
    Label::new("62x29", (62, 29), FormFactor::DieCut, (732, 341), (696, 271), 12, 0),
    Label::new("62x100", (62, 100), FormFactor::DieCut, (732, 1179), (696, 1109), 12, 0),
    Label::new("102x51", (102, 51), FormFactor::DieCut, (1200, 596), (1164, 526), 12, 0),
    Label::new("102x152", (102, 153), FormFactor::DieCut, (1200, 1804), (1164, 1660), 12, 0),
    Label::new("d12", (12, 12), FormFactor::RoundDieCut, (142, 142), (94, 94), 113, 35),
    Label::new("d24", (24, 24), FormFactor::RoundDieCut, (284, 284), (236, 236), 42, 0),
    Label::new("d58", (58, 58), FormFactor::RoundDieCut, (688, 688), (618, 618), 51, 0),
];

/// Media identity as it appears on the wire: type, width and length codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaCode {
    pub kind: u8,
    pub width_mm: u8,
    pub length_mm: u8,
}

impl fmt::Display for MediaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            0x0A => write!(f, "{}mm continuous", self.width_mm),
            0x0B => write!(f, "{}x{}mm die-cut", self.width_mm, self.length_mm),
            0x00 => write!(f, "no media"),
            other => write!(f, "unknown media type {:#04X}", other),
        }
    }
}

/// A label bound to a model, with all derived geometry.
#[derive(Debug, Clone, Copy)]
pub struct MediaProfile {
    pub model: &'static Model,
    pub label: &'static Label,
    /// Fixed byte length of every raw raster line for this model.
    pub row_bytes: usize,
    /// Largest printable width in dots for this label.
    pub printable_dots: u32,
    /// Dots between the right edge of the head and the printable area.
    pub right_margin_dots: u32,
}

impl MediaProfile {
    /// Bind a label to a model.
    ///
    /// Fails with `UnknownModel`/`UnknownLabel` for bad identifiers and
    /// with `UnsupportedMedia` when the label is physically wider than the
    /// model's print head (e.g. 102mm stock in a 720-dot printer).
    pub fn resolve(model_id: &str, label_id: &str) -> Result<Self, ConfigError> {
        let model = Model::lookup(model_id)?;
        let label = Label::lookup(label_id)?;
        Self::bind(model, label)
    }

    /// Bind pre-resolved table entries.
    pub fn bind(model: &'static Model, label: &'static Label) -> Result<Self, ConfigError> {
        let right_margin_dots = label.offset_r + model.additional_offset_r;
        if label.dots_printable.0 + right_margin_dots > model.pixel_width() {
            return Err(ConfigError::UnsupportedMedia {
                model: model.identifier,
                label: label.identifier,
            });
        }
        Ok(MediaProfile {
            model,
            label,
            row_bytes: model.bytes_per_row,
            printable_dots: label.dots_printable.0,
            right_margin_dots,
        })
    }

    /// The media identity this profile expects the printer to report.
    pub fn code(&self) -> MediaCode {
        MediaCode {
            kind: self.label.form_factor.code(),
            width_mm: self.label.tape_width_mm,
            length_mm: self.label.tape_length_mm,
        }
    }

    /// Default feed amount for this media.
    pub fn default_feed_dots(&self) -> u16 {
        self.label.feed_margin
    }

    /// Validate a feed amount against the media and model limits.
    ///
    /// Die-cut labels are fed by their perforation, so only the label's
    /// documented margin is accepted; continuous tape must stay inside the
    /// model's range.
    pub fn validate_feed(&self, feed: u16) -> Result<(), ConfigError> {
        if self.label.form_factor.is_die_cut() {
            let allowed = self.label.feed_margin;
            if feed != allowed {
                return Err(ConfigError::FeedOutOfRange { feed, min: allowed, max: allowed });
            }
            return Ok(());
        }
        if feed < self.model.min_feed || feed > self.model.max_feed {
            return Err(ConfigError::FeedOutOfRange {
                feed,
                min: self.model.min_feed,
                max: self.model.max_feed,
            });
        }
        Ok(())
    }
}
