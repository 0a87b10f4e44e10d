//! Printer model registry.
//!
//! Every QL series model is a plain data record in [`MODELS`]. All of its
//! quirks live in the record: print head width, feed limits, which opcodes
//! it understands. Supporting a new model is a new table row, never a new
//! code path.

use crate::error::ConfigError;

/// USB vendor id shared by all Brother printers.
pub const VENDOR_ID: u16 = 0x04F9;

/// Specification of one printer model.
#[derive(Debug, PartialEq, Eq)]
pub struct Model {
    /// Identifier as printed on the case, e.g. "QL-800".
    pub identifier: &'static str,
    /// Model code reported at offset 4 of the status telegram.
    /// Zero for models whose code is not documented.
    pub code: u8,
    /// USB product id.
    pub product_id: u16,
    /// Bytes per raster line: 90 for 720-dot heads, 162 for 1296-dot heads.
    pub bytes_per_row: usize,
    /// Extra right margin some wide models require for a centered printout.
    pub additional_offset_r: u32,
    /// Printable length limits for continuous tape, in raster lines.
    pub min_length: u32,
    pub max_length: u32,
    /// Feed amount limits in dots.
    pub min_feed: u16,
    pub max_feed: u16,
    /// Understands the dynamic command mode switch (ESC i a).
    pub mode_setting: bool,
    /// Has a cutter blade.
    pub cutting: bool,
    /// Understands the expanded mode opcode (ESC i K).
    pub expanded_mode: bool,
    /// Accepts PackBits compressed raster lines.
    pub compression: bool,
    /// Can print black/red on suitable tape.
    pub two_color: bool,
}

impl Model {
    const fn new(
        identifier: &'static str,
        code: u8,
        product_id: u16,
        bytes_per_row: usize,
        additional_offset_r: u32,
        min_length: u32,
        max_length: u32,
    ) -> Self {
        Model {
            identifier,
            code,
            product_id,
            bytes_per_row,
            additional_offset_r,
            min_length,
            max_length,
            min_feed: 35,
            max_feed: 1500,
            mode_setting: true,
            cutting: true,
            expanded_mode: true,
            compression: true,
            two_color: false,
        }
    }

    const fn no_compression(mut self) -> Self {
        self.compression = false;
        self
    }

    const fn no_mode_setting(mut self) -> Self {
        self.mode_setting = false;
        self
    }

    const fn no_expanded_mode(mut self) -> Self {
        self.expanded_mode = false;
        self
    }

    const fn no_cutting(mut self) -> Self {
        self.cutting = false;
        self
    }

    const fn with_two_color(mut self) -> Self {
        self.two_color = true;
        self
    }

    /// Width of the print head in dots.
    pub const fn pixel_width(&self) -> u32 {
        (self.bytes_per_row * 8) as u32
    }

    /// Look a model up by its identifier, e.g. `"QL-820NWB"`.
    pub fn lookup(identifier: &str) -> Result<&'static Model, ConfigError> {
        MODELS
            .iter()
            .find(|m| m.identifier.eq_ignore_ascii_case(identifier))
            .ok_or_else(|| ConfigError::UnknownModel(identifier.to_string()))
    }

    /// Look a model up by the code byte of a status telegram.
    pub fn from_status_code(code: u8) -> Option<&'static Model> {
        MODELS.iter().find(|m| m.code != 0 && m.code == code)
    }
}

/// The model table. Values from the Brother raster command references.
pub static MODELS: &[Model] = &[
    Model::new("QL-500", 0x00, 0x2015, 90, 0, 295, 11811)
        .no_compression()
        .no_mode_setting()
        .no_expanded_mode()
        .no_cutting(),
    Model::new("QL-550", 0x00, 0x2016, 90, 0, 295, 11811)
        .no_compression()
        .no_mode_setting(),
    Model::new("QL-560", 0x00, 0x2027, 90, 0, 295, 11811)
        .no_compression()
        .no_mode_setting(),
    Model::new("QL-570", 0x00, 0x2028, 90, 0, 150, 11811)
        .no_compression()
        .no_mode_setting(),
    Model::new("QL-580N", 0x00, 0x2029, 90, 0, 150, 11811),
    Model::new("QL-600", 0x47, 0x20C0, 90, 0, 150, 11811).no_compression(),
    Model::new("QL-650TD", 0x00, 0x201B, 90, 0, 295, 11811),
    Model::new("QL-700", 0x00, 0x2042, 90, 0, 150, 11811)
        .no_compression()
        .no_mode_setting(),
    Model::new("QL-710W", 0x00, 0x2043, 90, 0, 150, 11811),
    Model::new("QL-720NW", 0x37, 0x2044, 90, 0, 150, 11811),
    Model::new("QL-800", 0x38, 0x209B, 90, 0, 150, 11811)
        .with_two_color()
        .no_compression(),
    Model::new("QL-810W", 0x39, 0x209C, 90, 0, 150, 11811).with_two_color(),
    Model::new("QL-820NWB", 0x41, 0x209D, 90, 0, 150, 11811).with_two_color(),
    Model::new("QL-1050", 0x00, 0x2020, 162, 44, 295, 35433),
    Model::new("QL-1060N", 0x00, 0x202A, 162, 44, 295, 35433),
    Model::new("QL-1100", 0x43, 0x20A7, 162, 44, 295, 35433),
    Model::new("QL-1110NWB", 0x44, 0x20A8, 162, 44, 295, 35433),
    Model::new("QL-1115NWB", 0x45, 0x20AB, 162, 44, 295, 35433),
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lookup_is_case_insensitive() {
        let model = Model::lookup("ql-800").unwrap();
        assert_eq!(model.identifier, "QL-800");
        assert_eq!(model.product_id, 0x209B);
        assert_eq!(model.pixel_width(), 720);
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert_eq!(
            Model::lookup("QL-9000"),
            Err(ConfigError::UnknownModel("QL-9000".to_string()))
        );
    }

    #[test]
    fn wide_models_use_162_byte_rows() {
        let model = Model::lookup("QL-1100").unwrap();
        assert_eq!(model.bytes_per_row, 162);
        assert_eq!(model.pixel_width(), 1296);
        assert_eq!(model.additional_offset_r, 44);
    }

    #[test]
    fn capability_flags_follow_the_table() {
        let ql500 = Model::lookup("QL-500").unwrap();
        assert!(!ql500.cutting);
        assert!(!ql500.compression);

        let ql820 = Model::lookup("QL-820NWB").unwrap();
        assert!(ql820.cutting);
        assert!(ql820.compression);
        assert!(ql820.two_color);
    }

    #[test]
    fn status_code_resolves_known_models() {
        assert_eq!(Model::from_status_code(0x38).unwrap().identifier, "QL-800");
        assert!(Model::from_status_code(0x00).is_none());
        assert!(Model::from_status_code(0x99).is_none());
    }
}
