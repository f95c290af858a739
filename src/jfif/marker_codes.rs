//! Defines the `JFIFMarkerCode` type. Only the markers that change how a segment is walked get
//! their own variant; everything else that carries a length-prefixed data section is `Other`.

use crate::impl_parse_for_enum;
use std::convert::{From, TryFrom};

/// Marker codes for JFIF segments. See ISO/IEC 10918-1: 1993(E), p. 36 for more information.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JFIFMarkerCode {
    SOI,      // 0xFFD8: Start of image
    EOI,      // 0xFFD9: End of image
    SOS,      // 0xFFDA: Start of scan
    RSTm(u8), // 0xFFD0 - 0xFFD7: Restart with modulo 8 count "m"
    APPm(u8), // 0xFFE0 - 0xFFEF: Reserved for application segments
    COM,      // 0xFFFE: Comment
    TEM,      // 0xFF01: For temporary private use in arithmetic coding

    // SOFn, DHT, DQT, DRI, JPGn, reserved codes, ... (full low byte)
    Other(u8),
}

// Define JFIFMarkerCode::parse(i: parse::Input) -> parse::Result by parsing the marker code from a
// 16-bit integer.
impl_parse_for_enum!(JFIFMarkerCode, be_u16);

impl JFIFMarkerCode {
    pub fn as_bytes(self) -> [u8; 2] {
        u16::from(self).to_be_bytes()
    }

    /// Markers that stand alone, without a size field or a data section.
    pub fn is_standalone(self) -> bool {
        matches!(
            self,
            JFIFMarkerCode::SOI
                | JFIFMarkerCode::EOI
                | JFIFMarkerCode::RSTm(_)
                | JFIFMarkerCode::TEM
        )
    }
}

impl TryFrom<u16> for JFIFMarkerCode {
    type Error = &'static str;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        let result = match code {
            0xFF01 => JFIFMarkerCode::TEM,
            0xFFD8 => JFIFMarkerCode::SOI,
            0xFFD9 => JFIFMarkerCode::EOI,
            0xFFDA => JFIFMarkerCode::SOS,
            0xFFFE => JFIFMarkerCode::COM,
            0xFFD0..=0xFFD7 => JFIFMarkerCode::RSTm((code & 0x000F) as u8),
            0xFFE0..=0xFFEF => JFIFMarkerCode::APPm((code & 0x000F) as u8),
            0xFF02..=0xFFFD => JFIFMarkerCode::Other((code & 0x00FF) as u8),
            _ => return Err("Invalid marker code (code must lie within 0xFF01..=0xFFFE)"),
        };

        Ok(result)
    }
}

impl From<JFIFMarkerCode> for u16 {
    fn from(marker: JFIFMarkerCode) -> Self {
        match marker {
            JFIFMarkerCode::TEM => 0xFF01,
            JFIFMarkerCode::SOI => 0xFFD8,
            JFIFMarkerCode::EOI => 0xFFD9,
            JFIFMarkerCode::SOS => 0xFFDA,
            JFIFMarkerCode::COM => 0xFFFE,
            JFIFMarkerCode::RSTm(code) => 0xFFD0 | (code as u16),
            JFIFMarkerCode::APPm(code) => 0xFFE0 | (code as u16),
            JFIFMarkerCode::Other(code) => 0xFF00 | (code as u16),
        }
    }
}
