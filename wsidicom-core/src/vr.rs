//! Value Representation (VR): the two-letter code that determines how a
//! data element's header and value are framed on the wire.

use std::fmt;
use std::str::FromStr;

/// A DICOM value representation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(missing_docs)]
pub enum VR {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FD,
    FL,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OV,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    SV,
    TM,
    UC,
    UI,
    UL,
    UN,
    UR,
    US,
    UT,
    UV,
}

impl VR {
    /// Decode a VR from its two-byte ASCII wire representation. Both bytes
    /// must be uppercase ASCII letters for any match to be attempted; a
    /// recognized pair yields `Some`, everything else `None` — callers that
    /// need a hard "unknown code" error should treat this as that error,
    /// rather than silently falling back to `UN` as older readers of this
    /// format did (the long-length framing branch covers forward
    /// compatibility for real-but-unmodeled VRs; garbage bytes do not get
    /// the same grace).
    pub fn from_binary(chars: [u8; 2]) -> Option<Self> {
        if !chars.iter().all(|b| b.is_ascii_uppercase()) {
            return None;
        }
        std::str::from_utf8(&chars).ok().and_then(|s| VR::from_str(s).ok())
    }

    /// Whether this VR uses the short header layout
    /// (`tag(4) | VR(2) | VL(2)`) rather than the long one
    /// (`tag(4) | VR(2) | reserved(2) | VL(4)`).
    pub fn is_short_form(self) -> bool {
        use VR::*;
        matches!(
            self,
            AE | AS | AT | CS | DA | DS | DT | FD | FL | IS | LO | LT | PN | SH | SL | SS | ST
                | TM | UI | UL | US
        )
    }

    /// String form of this VR, e.g. `"OB"`.
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
            FD => "FD",
            FL => "FL",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OD => "OD",
            OF => "OF",
            OL => "OL",
            OV => "OV",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            SV => "SV",
            TM => "TM",
            UC => "UC",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            UR => "UR",
            US => "US",
            UT => "UT",
            UV => "UV",
        }
    }
}

impl FromStr for VR {
    type Err = &'static str;

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
            "FD" => FD,
            "FL" => FL,
            "IS" => IS,
            "LO" => LO,
            "LT" => LT,
            "OB" => OB,
            "OD" => OD,
            "OF" => OF,
            "OL" => OL,
            "OV" => OV,
            "OW" => OW,
            "PN" => PN,
            "SH" => SH,
            "SL" => SL,
            "SQ" => SQ,
            "SS" => SS,
            "ST" => ST,
            "SV" => SV,
            "TM" => TM,
            "UC" => UC,
            "UI" => UI,
            "UL" => UL,
            "UN" => UN,
            "UR" => UR,
            "US" => US,
            "UT" => UT,
            "UV" => UV,
            _ => return Err("no such value representation"),
        })
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
