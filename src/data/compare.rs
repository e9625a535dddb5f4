use crate::data::row::{CellValue, Row};
use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Coarse collation class of a character: punctuation and symbols sort
/// before digits, digits before letters, everything else after.
fn char_class(c: char) -> u8 {
    if c.is_alphabetic() {
        2
    } else if c.is_numeric() {
        1
    } else if c.is_whitespace() || c.is_ascii() {
        0
    } else {
        3
    }
}

/// A base character plus the combining marks that follow it in NFD form
struct Unit {
    base: char,
    marks: Vec<char>,
}

impl Unit {
    fn primary(&self) -> (u8, char) {
        let lower = self.base.to_lowercase().next().unwrap_or(self.base);
        (char_class(lower), lower)
    }
}

fn units(s: &str) -> Vec<Unit> {
    let mut out: Vec<Unit> = Vec::new();
    for c in s.nfd() {
        match out.last_mut() {
            Some(unit) if is_combining_mark(c) => unit.marks.push(c),
            _ => out.push(Unit {
                base: c,
                marks: Vec::new(),
            }),
        }
    }
    out
}

/// Locale-style string comparison in three levels.
///
/// Base letters compare case- and accent-insensitively first ("é" sorts
/// with "e"). Equal bases are then ordered unaccented before accented, and
/// only then lowercase before uppercase. Numbers in text are compared
/// character by character ("10" < "9").
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    let ua = units(a);
    let ub = units(b);

    let primary = ua
        .iter()
        .map(Unit::primary)
        .cmp(ub.iter().map(Unit::primary));
    if primary != Ordering::Equal {
        return primary;
    }

    let accents = ua
        .iter()
        .map(|u| &u.marks)
        .cmp(ub.iter().map(|u| &u.marks));
    if accents != Ordering::Equal {
        return accents;
    }

    for (ca, cb) in ua.iter().zip(&ub) {
        match (ca.base.is_lowercase(), cb.base.is_lowercase()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }

    a.cmp(b)
}

/// Compare two optional cells through their string forms. Missing cells
/// compare as the empty string.
pub fn compare_cells(a: Option<&CellValue>, b: Option<&CellValue>) -> Ordering {
    let a = a.map(ToString::to_string).unwrap_or_default();
    let b = b.map(ToString::to_string).unwrap_or_default();
    locale_compare(&a, &b)
}

/// Compare two rows on one column
pub fn compare_rows_by(a: &Row, b: &Row, column: &str) -> Ordering {
    compare_cells(a.get(column), b.get(column))
}
