//! Control-file parsers
//!
//! Pure text-to-type conversions. Nothing here touches the filesystem,
//! so every format can be tested from literal strings.

pub mod ppm;
pub mod pstate;
pub mod values;

pub use ppm::parse_ppm;
pub use pstate::{
    parse_dpm, parse_od_clk_voltage, pstates_from_dpm, DpmEntry, DpmTable, OdParser, SectionState,
};
pub use values::{parse_hex_id, parse_int, parse_numeric, parse_range, strip_unit};
