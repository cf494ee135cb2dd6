//! Clock/voltage table parsing
//!
//! `pp_od_clk_voltage` is tokenized line by line through an explicit
//! section state machine. Layouts differ per ASIC generation:
//!
//! ```text
//! OD_SCLK:                 OD_SCLK:
//! 0:   852Mhz   800mV      0: 800Mhz
//! ...                      1: 2100Mhz
//! OD_MCLK:                 OD_VDDC_CURVE:
//! 0:   167Mhz   800mV      0: 800MHz 711mV
//! OD_RANGE:                OD_RANGE:
//! SCLK:  852MHz  2400MHz   VDDC_CURVE_VOLT[0]: 750mV 1200mV
//! VDDC:  800mV   1200mV
//! ```
//!
//! Malformed lines never abort the parse; they produce a partial table
//! plus a warning.

use crate::domain::{Bound, ClockDomain, CurvePoint, PState, PStateTable};
use crate::parse::values::{parse_range, strip_unit};

/// Tokenizer state: which section the current line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionState {
    /// Before the first header
    #[default]
    None,
    InSclkSection,
    InMclkSection,
    InCurveSection,
    InRangeSection,
    /// An `OD_*` section this parser does not model
    InOtherSection,
}

impl SectionState {
    /// Transition on a section header, or `None` if the line is not a header
    fn from_header(line: &str) -> Option<Self> {
        let label = line.strip_suffix(':')?;
        if !label.starts_with("OD_") || label.contains(char::is_whitespace) {
            return None;
        }
        Some(match label {
            "OD_SCLK" => SectionState::InSclkSection,
            "OD_MCLK" => SectionState::InMclkSection,
            "OD_VDDC_CURVE" => SectionState::InCurveSection,
            "OD_RANGE" => SectionState::InRangeSection,
            _ => SectionState::InOtherSection,
        })
    }
}

/// Incremental `pp_od_clk_voltage` parser
#[derive(Debug, Default)]
pub struct OdParser {
    state: SectionState,
    line_no: usize,
    table: PStateTable,
}

impl OdParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SectionState {
        self.state
    }

    /// Consume one line of input
    pub fn feed(&mut self, raw: &str) {
        self.line_no += 1;
        let line = raw.trim();
        if line.is_empty() {
            return;
        }

        if let Some(next) = SectionState::from_header(line) {
            self.state = next;
            return;
        }

        match self.state {
            SectionState::None => self.warn(format!("data before any section: '{}'", line)),
            SectionState::InSclkSection => self.push_state(ClockDomain::Sclk, line),
            SectionState::InMclkSection => self.push_state(ClockDomain::Mclk, line),
            SectionState::InCurveSection => self.push_curve_point(line),
            SectionState::InRangeSection => self.push_range(line),
            SectionState::InOtherSection => {}
        }
    }

    /// Finish parsing and return the table
    pub fn finish(mut self) -> PStateTable {
        self.table.overdrive = true;
        self.table
    }

    fn warn(&mut self, message: String) {
        self.table
            .warnings
            .push(format!("line {}: {}", self.line_no, message));
    }

    fn push_state(&mut self, domain: ClockDomain, line: &str) {
        match parse_entry(line) {
            Some((index, values)) if !values.is_empty() && values.len() <= 2 => {
                let state = PState::new(index, values[0], values.get(1).copied());
                self.table.states_mut(domain).push(state);
            }
            _ => self.warn(format!("malformed {} entry '{}'", domain, line)),
        }
    }

    fn push_curve_point(&mut self, line: &str) {
        match parse_entry(line) {
            Some((index, values)) if values.len() == 2 => {
                self.table
                    .curve
                    .push(CurvePoint::new(index, values[0], values[1]));
            }
            _ => self.warn(format!("malformed curve point '{}'", line)),
        }
    }

    fn push_range(&mut self, line: &str) {
        let Some((label, rest)) = line.split_once(':') else {
            self.warn(format!("malformed range '{}'", line));
            return;
        };
        let bound = match parse_range(rest) {
            Ok(bound) => bound,
            Err(_) => {
                self.warn(format!("malformed range '{}'", line));
                return;
            }
        };

        let label = label.trim();
        let ranges = &mut self.table.ranges;
        match label {
            "SCLK" => ranges.sclk = Some(bound),
            "MCLK" => ranges.mclk = Some(bound),
            "VDDC" => ranges.vddc = Some(bound),
            _ => {
                if let Some(index) = indexed_label(label, "VDDC_CURVE_SCLK") {
                    ranges.curve_sclk.push((index, bound));
                } else if let Some(index) = indexed_label(label, "VDDC_CURVE_VOLT") {
                    ranges.curve_volt.push((index, bound));
                } else {
                    log::debug!("Ignoring OD range '{}'", label);
                }
            }
        }
    }
}

/// Parse `N: <value><unit> [<value><unit>]`
fn parse_entry(line: &str) -> Option<(u32, Vec<u32>)> {
    let (index, rest) = line.split_once(':')?;
    let index = index.trim().parse().ok()?;
    let values = rest
        .split_whitespace()
        .map(|t| strip_unit(t).parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    Some((index, values))
}

/// Extract `n` from `PREFIX[n]`
fn indexed_label(label: &str, prefix: &str) -> Option<u32> {
    label
        .strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Parse a whole `pp_od_clk_voltage` file
pub fn parse_od_clk_voltage(text: &str) -> PStateTable {
    let mut parser = OdParser::new();
    for line in text.lines() {
        parser.feed(line);
    }
    parser.finish()
}

/// One row of `pp_dpm_sclk` / `pp_dpm_mclk`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpmEntry {
    pub index: u32,
    pub freq_mhz: u32,
    /// Marked with `*` by the driver
    pub current: bool,
}

/// Parsed DPM state list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DpmTable {
    pub entries: Vec<DpmEntry>,
    pub warnings: Vec<String>,
}

impl DpmTable {
    /// The entry the hardware currently runs at
    pub fn current(&self) -> Option<&DpmEntry> {
        self.entries.iter().find(|e| e.current)
    }

    /// Frequency-only p-states
    pub fn to_pstates(&self) -> Vec<PState> {
        self.entries
            .iter()
            .map(|e| PState::new(e.index, e.freq_mhz, None))
            .collect()
    }
}

/// Parse a `pp_dpm_*` file (`0: 300Mhz *`)
pub fn parse_dpm(text: &str) -> DpmTable {
    let mut table = DpmTable::default();
    for (n, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let current = line.ends_with('*');
        let body = line.trim_end_matches('*').trim_end();
        match parse_entry(body) {
            Some((index, values)) if values.len() == 1 => table.entries.push(DpmEntry {
                index,
                freq_mhz: values[0],
                current,
            }),
            _ => table
                .warnings
                .push(format!("line {}: malformed DPM entry '{}'", n + 1, line)),
        }
    }
    table
}

/// Frequency-only table for hardware without overdrive
pub fn pstates_from_dpm(sclk: &DpmTable, mclk: &DpmTable) -> PStateTable {
    PStateTable {
        sclk: sclk.to_pstates(),
        mclk: mclk.to_pstates(),
        warnings: sclk
            .warnings
            .iter()
            .chain(mclk.warnings.iter())
            .cloned()
            .collect(),
        ..Default::default()
    }
}

/// Voltage range check for a curve point or p-state
pub fn voltage_in_range(table: &PStateTable, mv: u32) -> Option<bool> {
    table.curve_range().map(|b: Bound| b.contains(mv as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VEGA: &str = "OD_SCLK:
0:        852Mhz        800mV
1:        991Mhz        900mV
2:       1084Mhz        950mV
3:       1138Mhz       1000mV
4:       1200Mhz       1050mV
5:       1401Mhz       1100mV
6:       1536Mhz       1150mV
7:       1630Mhz       1200mV
OD_MCLK:
0:        167Mhz        800mV
1:        500Mhz        800mV
2:        800Mhz        950mV
3:        945Mhz       1100mV
OD_RANGE:
SCLK:     852MHz       2400MHz
MCLK:     167MHz       1500MHz
VDDC:     800mV        1200mV
";

    const NAVI: &str = "OD_SCLK:
0: 800Mhz
1: 2100Mhz
OD_MCLK:
1: 875MHz
OD_VDDC_CURVE:
0: 800MHz 711mV
1: 1450MHz 801mV
2: 2100MHz 1191mV
OD_RANGE:
SCLK:     800Mhz       2150Mhz
MCLK:     625Mhz        950Mhz
VDDC_CURVE_SCLK[0]:     800Mhz       2150Mhz
VDDC_CURVE_VOLT[0]:     750mV        1200mV
VDDC_CURVE_SCLK[2]:     800Mhz       2150Mhz
VDDC_CURVE_VOLT[2]:     750mV        1250mV
";

    #[test]
    fn test_vega_table_with_vddc_range() {
        let table = parse_od_clk_voltage(VEGA);
        assert_eq!(table.sclk.len(), 8);
        assert_eq!(table.mclk.len(), 4);
        assert_eq!(table.ranges.vddc, Some(Bound::new(800, 1200)));
        assert_eq!(table.curve_range(), Some(Bound::new(800, 1200)));
        assert_eq!(table.ranges.sclk, Some(Bound::new(852, 2400)));
        assert_eq!(table.sclk[7].freq_mhz, 1630);
        assert_eq!(table.sclk[7].voltage_mv, Some(1200));
        assert!(table.overdrive);
        assert!(table.warnings.is_empty());
        assert!(!table.is_curve_based());
    }

    #[test]
    fn test_navi_curve_table() {
        let table = parse_od_clk_voltage(NAVI);
        assert_eq!(table.sclk.len(), 2);
        assert_eq!(table.sclk[0].voltage_mv, None);
        assert_eq!(table.mclk[0].index, 1);
        assert_eq!(table.curve.len(), 3);
        assert_eq!(table.curve[2], CurvePoint::new(2, 2100, 1191));
        assert_eq!(table.ranges.curve_volt.len(), 2);
        assert_eq!(table.curve_range(), Some(Bound::new(750, 1250)));
        assert!(table.is_curve_based());
    }

    #[test]
    fn test_missing_range_section() {
        let text = "OD_SCLK:\n0: 852Mhz 800mV\n1: 991Mhz 900mV\nOD_MCLK:\n0: 167Mhz 800mV\n";
        let table = parse_od_clk_voltage(text);
        assert_eq!(table.sclk.len(), 2);
        assert_eq!(table.mclk.len(), 1);
        assert!(table.ranges.is_empty());
        assert!(table.curve_range().is_none());
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn test_whitespace_and_blank_lines_tolerated() {
        let text = "\nOD_SCLK:   \n\n0:   852Mhz   800mV   \n\r\nOD_RANGE:\nSCLK: 852MHz 2400MHz  \n";
        let table = parse_od_clk_voltage(text);
        assert_eq!(table.sclk.len(), 1);
        assert_eq!(table.ranges.sclk, Some(Bound::new(852, 2400)));
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn test_malformed_line_gives_partial_table() {
        let text = "OD_SCLK:\n0: 852Mhz 800mV\n1: lots of volts\n2: 1084Mhz 950mV\n";
        let table = parse_od_clk_voltage(text);
        assert_eq!(table.sclk.len(), 2);
        assert_eq!(table.warnings.len(), 1);
        assert!(table.warnings[0].starts_with("line 3"));
    }

    #[test]
    fn test_other_sections_are_skipped() {
        let text = "OD_VDDGFX_OFFSET:\n0mV\nOD_SCLK:\n0: 500Mhz\n";
        let table = parse_od_clk_voltage(text);
        assert_eq!(table.sclk.len(), 1);
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn test_state_transitions() {
        let mut parser = OdParser::new();
        assert_eq!(parser.state(), SectionState::None);
        parser.feed("OD_MCLK:");
        assert_eq!(parser.state(), SectionState::InMclkSection);
        parser.feed("OD_VDDC_CURVE:");
        assert_eq!(parser.state(), SectionState::InCurveSection);
        parser.feed("OD_FAN_CURVE:");
        assert_eq!(parser.state(), SectionState::InOtherSection);
        parser.feed("OD_RANGE:");
        assert_eq!(parser.state(), SectionState::InRangeSection);
    }

    #[test]
    fn test_parse_dpm() {
        let table = parse_dpm("0: 300Mhz\n1: 1000Mhz *\n2: 1800Mhz\nS: 19Mhz\n");
        assert_eq!(table.entries.len(), 3);
        assert_eq!(table.current().unwrap().index, 1);
        assert_eq!(table.current().unwrap().freq_mhz, 1000);
        assert_eq!(table.warnings.len(), 1);
    }

    #[test]
    fn test_pstates_from_dpm_are_frequency_only() {
        let sclk = parse_dpm("0: 300Mhz *\n1: 1000Mhz\n");
        let mclk = parse_dpm("0: 400Mhz *\n");
        let table = pstates_from_dpm(&sclk, &mclk);
        assert!(!table.overdrive);
        assert_eq!(table.sclk.len(), 2);
        assert!(table.sclk.iter().all(|p| p.voltage_mv.is_none()));
        assert!(voltage_in_range(&table, 900).is_none());
    }
}
