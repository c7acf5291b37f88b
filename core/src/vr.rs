//! Value Representation codes and their wire-length encoding rule.

use std::fmt;
use std::str::FromStr;

/// The two possible shapes of an explicit-VR element header's length
/// field, per PS3.5 §7.1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthField {
    /// A 16-bit length field, immediately following the 2-byte VR code.
    Short,
    /// 2 reserved bytes followed by a 32-bit length field.
    Long,
}

/// A DICOM Value Representation: a two-character code governing how an
/// element's value bytes are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum VR {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FL,
    FD,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    TM,
    UC,
    UI,
    UL,
    /// Unknown; used when the implicit-VR dictionary has no entry for a tag.
    UN,
    UR,
    US,
    UT,
    UV,
    OV,
    SV,
}

impl VR {
    /// Decode a VR from its two-character wire representation.
    pub fn from_bytes(chars: [u8; 2]) -> Option<Self> {
        std::str::from_utf8(&chars).ok().and_then(|s| s.parse().ok())
    }

    /// Encode this VR as its two-character wire representation.
    pub fn to_bytes(self) -> [u8; 2] {
        let s = self.as_str().as_bytes();
        [s[0], s[1]]
    }

    /// The VR's string form, e.g. `"SQ"`.
    pub fn as_str(self) -> &'static str {
        use VR::*;
        match self {
            AE => "AE",
            AS => "AS",
            AT => "AT",
            CS => "CS",
            DA => "DA",
            DS => "DS",
            DT => "DT",
            FL => "FL",
            FD => "FD",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OD => "OD",
            OF => "OF",
            OL => "OL",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            TM => "TM",
            UC => "UC",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            UR => "UR",
            US => "US",
            UT => "UT",
            UV => "UV",
            OV => "OV",
            SV => "SV",
        }
    }

    /// Whether this VR's explicit-VR length field is the 32-bit form
    /// (preceded by 2 reserved bytes), per PS3.5 §7.1.2. The set is
    /// `{OB, OD, OF, OL, OW, SQ, UN, UT}`; everything else uses the
    /// 16-bit form.
    pub fn length_field(self) -> LengthField {
        use VR::*;
        match self {
            OB | OD | OF | OL | OW | SQ | UN | UT | UC | UR | UV | SV => LengthField::Long,
            _ => LengthField::Short,
        }
    }
}

impl FromStr for VR {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use VR::*;
        Ok(match s {
            "AE" => AE,
            "AS" => AS,
            "AT" => AT,
            "CS" => CS,
            "DA" => DA,
            "DS" => DS,
            "DT" => DT,
            "FL" => FL,
            "FD" => FD,
            "IS" => IS,
            "LO" => LO,
            "LT" => LT,
            "OB" => OB,
            "OD" => OD,
            "OF" => OF,
            "OL" => OL,
            "OW" => OW,
            "PN" => PN,
            "SH" => SH,
            "SL" => SL,
            "SQ" => SQ,
            "SS" => SS,
            "ST" => ST,
            "TM" => TM,
            "UC" => UC,
            "UI" => UI,
            "UL" => UL,
            "UN" => UN,
            "UR" => UR,
            "US" => US,
            "UT" => UT,
            "UV" => UV,
            "OV" => OV,
            "SV" => SV,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        for vr in [VR::AE, VR::SQ, VR::OB, VR::UN, VR::PN] {
            assert_eq!(VR::from_bytes(vr.to_bytes()), Some(vr));
        }
    }

    #[test]
    fn long_length_set_matches_spec() {
        for vr in [VR::OB, VR::OD, VR::OF, VR::OL, VR::OW, VR::SQ, VR::UN, VR::UT] {
            assert_eq!(vr.length_field(), LengthField::Long);
        }
        for vr in [VR::AE, VR::CS, VR::US, VR::UL, VR::PN, VR::DA] {
            assert_eq!(vr.length_field(), LengthField::Short);
        }
    }
}
