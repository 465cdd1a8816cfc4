// src/store/a1.rs

//! Minimal A1-notation ranges (`A1`, `A1:Z100`, `B:D`, `2:5`, `A2:C`).
//! Sheet-qualified ranges are built by the stores themselves.

use once_cell::sync::Lazy;
use regex::Regex;

static CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]{1,3})?([1-9][0-9]{0,6})?$").expect("valid A1 cell regex"));

/// One side of a range; either component may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    /// 0-based column index.
    pub column: Option<u32>,
    /// 0-based row index.
    pub row: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A1Range {
    pub start: CellRef,
    pub end: CellRef,
}

/// Inclusive 0-based bounds; `None` on an upper bound means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub first_row: u32,
    pub last_row: Option<u32>,
    pub first_column: u32,
    pub last_column: Option<u32>,
}

impl A1Range {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.split_once(':') {
            None => {
                // a lone reference must name a single cell
                let cell = parse_cell(raw)?;
                if cell.column.is_none() || cell.row.is_none() {
                    return None;
                }
                Some(Self {
                    start: cell,
                    end: cell,
                })
            }
            Some((lhs, rhs)) => {
                let start = parse_cell(lhs)?;
                let end = parse_cell(rhs)?;
                // `A:3` style mixes are not ranges
                if start.column.is_some() != end.column.is_some() {
                    return None;
                }
                Some(Self { start, end })
            }
        }
    }

    pub fn bounds(&self) -> Bounds {
        let (first_row, last_row) = ordered(self.start.row, self.end.row);
        let (first_column, last_column) = ordered(self.start.column, self.end.column);
        Bounds {
            first_row,
            last_row,
            first_column,
            last_column,
        }
    }
}

fn ordered(a: Option<u32>, b: Option<u32>) -> (u32, Option<u32>) {
    match (a, b) {
        (Some(a), Some(b)) => (a.min(b), Some(a.max(b))),
        (Some(a), None) => (a, None),
        (None, _) => (0, None),
    }
}

fn parse_cell(raw: &str) -> Option<CellRef> {
    if raw.is_empty() {
        return None;
    }
    let caps = CELL_RE.captures(raw)?;
    let column = caps.get(1).map(|m| column_index(m.as_str()));
    let row = match caps.get(2) {
        Some(m) => Some(m.as_str().parse::<u32>().ok()? - 1),
        None => None,
    };
    Some(CellRef { column, row })
}

/// `A` → 0, `Z` → 25, `AA` → 26.
pub fn column_index(letters: &str) -> u32 {
    letters
        .bytes()
        .map(|b| (b.to_ascii_uppercase() - b'A') as u32 + 1)
        .fold(0, |acc, d| acc * 26 + d)
        - 1
}

/// Quote a sheet title for use in an A1 range: `It's` → `'It''s'`.
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(column_index("A"), 0);
        assert_eq!(column_index("z"), 25);
        assert_eq!(column_index("AA"), 26);
        assert_eq!(column_index("AZ"), 51);
    }

    #[test]
    fn parses_closed_range() {
        let r = A1Range::parse("A1:Z100").unwrap();
        assert_eq!(
            r.bounds(),
            Bounds {
                first_row: 0,
                last_row: Some(99),
                first_column: 0,
                last_column: Some(25),
            }
        );
    }

    #[test]
    fn parses_column_and_row_spans() {
        let cols = A1Range::parse("B:D").unwrap().bounds();
        assert_eq!((cols.first_row, cols.last_row), (0, None));
        assert_eq!((cols.first_column, cols.last_column), (1, Some(3)));

        let rows = A1Range::parse("2:5").unwrap().bounds();
        assert_eq!((rows.first_row, rows.last_row), (1, Some(4)));
        assert_eq!((rows.first_column, rows.last_column), (0, None));
    }

    #[test]
    fn single_cell() {
        let b = A1Range::parse("C3").unwrap().bounds();
        assert_eq!((b.first_row, b.last_row), (2, Some(2)));
        assert_eq!((b.first_column, b.last_column), (2, Some(2)));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "A", "A0", "A1:", "Sheet1!A1", "1A", "A1;DROP", "ABCD1", "A:3"] {
            assert!(A1Range::parse(bad).is_none(), "{bad} should be rejected");
        }
    }

    #[test]
    fn quotes_titles() {
        assert_eq!(quote_title("Sheet 1"), "'Sheet 1'");
        assert_eq!(quote_title("It's"), "'It''s'");
    }
}
