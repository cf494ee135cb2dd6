//! `pp_power_profile_mode` parsing
//!
//! Mode rows look like `  1 3D_FULL_SCREEN *:  0  100 ...`; newer ASICs
//! follow each mode with per-clock detail rows (`0(GFXCLK) ...`) that are
//! folded into the mode's description.

use crate::domain::{PowerMode, PpmTable};

/// Parse the whole PPM file
pub fn parse_ppm(text: &str) -> PpmTable {
    let mut table = PpmTable::default();

    for (n, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || is_header(line) {
            continue;
        }

        if is_continuation(line) {
            match table.modes.last_mut() {
                Some(mode) => append_detail(&mut mode.description, line),
                None => table
                    .warnings
                    .push(format!("line {}: detail row before any mode", n + 1)),
            }
            continue;
        }

        match parse_mode_row(line) {
            Some((mode, current)) => {
                if current {
                    table.current = Some(mode.id);
                }
                table.modes.push(mode);
            }
            None => table
                .warnings
                .push(format!("line {}: malformed mode row '{}'", n + 1, line)),
        }
    }

    table
}

fn is_header(line: &str) -> bool {
    line.starts_with("NUM") || line.starts_with("PROFILE_INDEX")
}

/// `N(` at the start of a detail row
fn is_continuation(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with('(')
}

fn parse_mode_row(line: &str) -> Option<(PowerMode, bool)> {
    let (head, tail) = line.split_once(':')?;
    let mut tokens = head.split_whitespace();
    let id: u32 = tokens.next()?.parse().ok()?;
    let name_token = tokens.next()?;

    let mut current = name_token.ends_with('*');
    let name = name_token.trim_end_matches('*');
    for extra in tokens {
        if extra == "*" {
            current = true;
        } else {
            return None;
        }
    }
    if name.is_empty() {
        return None;
    }

    let mut description = String::new();
    append_detail(&mut description, tail);
    Some((
        PowerMode {
            id,
            name: name.to_string(),
            description,
        },
        current,
    ))
}

fn append_detail(description: &mut String, detail: &str) {
    let compact = detail.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.is_empty() {
        return;
    }
    if !description.is_empty() {
        description.push_str("; ");
    }
    description.push_str(&compact);
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLARIS: &str = "NUM        MODE_NAME     SCLK_UP_HYST   SCLK_DOWN_HYST SCLK_ACTIVE_LEVEL
  0   BOOTUP_DEFAULT:        -                -                -
  1 3D_FULL_SCREEN *:        0              100               30
  2     POWER_SAVING:       10                0               30
  6           CUSTOM:        -                -                -
";

    const NAVI: &str = "NUM        MODE_NAME     CLOCK_TYPE(NAME) FPS MinFreqType
  0 BOOTUP_DEFAULT*:
                        0(       GFXCLK)       0       5       1
                        1(       SOCCLK)       0       5       1
  1 3D_FULL_SCREEN :
                        0(       GFXCLK)       0       5       1
";

    #[test]
    fn test_polaris_modes() {
        let table = parse_ppm(POLARIS);
        assert_eq!(table.modes.len(), 4);
        assert_eq!(table.current, Some(1));
        assert_eq!(table.current_mode().unwrap().name, "3D_FULL_SCREEN");
        assert_eq!(table.mode(6).unwrap().name, "CUSTOM");
        assert_eq!(table.mode(1).unwrap().description, "0 100 30");
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn test_navi_continuation_rows_fold() {
        let table = parse_ppm(NAVI);
        assert_eq!(table.modes.len(), 2);
        assert_eq!(table.current, Some(0));
        assert_eq!(table.modes[0].name, "BOOTUP_DEFAULT");
        assert_eq!(
            table.modes[0].description,
            "0( GFXCLK) 0 5 1; 1( SOCCLK) 0 5 1"
        );
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn test_malformed_row_partial_table() {
        let text = "NUM MODE_NAME\n  0 BOOTUP_DEFAULT:\n  garbage here\n  1 COMPUTE *:\n";
        let table = parse_ppm(text);
        assert_eq!(table.modes.len(), 2);
        assert_eq!(table.current, Some(1));
        assert_eq!(table.warnings.len(), 1);
        assert!(table.warnings[0].contains("garbage"));
    }

    #[test]
    fn test_empty_input() {
        let table = parse_ppm("");
        assert!(table.is_empty());
        assert!(table.current.is_none());
    }
}
