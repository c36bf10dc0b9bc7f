//! Quote aware splitting of modem reply lines.
//!
//! SIM7000 replies are loosely comma separated: fields may be quoted with
//! either `"` or `'`, and a quoted field can contain commas. Quotes are kept in
//! the field, use [`unquote`] to strip them.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::ops::Deref;
use core::str::FromStr;

use serde::Serialize;

use crate::error::Error;
use crate::line::Line;

/// Iterator over the fields of one line.
pub struct CsvFields<'a> {
    rest: &'a str,
}

impl<'a> Iterator for CsvFields<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let mut quote = None;
        for (i, c) in self.rest.char_indices() {
            match (quote, c) {
                (None, '"' | '\'') => quote = Some(c),
                (Some(q), c) if c == q => quote = None,
                (None, ',') => {
                    let field = &self.rest[..i];
                    self.rest = &self.rest[i + 1..];
                    return Some(field);
                }
                _ => {}
            }
        }

        let field = self.rest;
        self.rest = "";
        Some(field)
    }
}

pub fn split_csv(line: &str) -> CsvFields<'_> {
    CsvFields { rest: line }
}

/// Fields of one reply line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CsvRecord(pub Vec<String>);

impl CsvRecord {
    pub fn from_line(line: &str) -> Self {
        Self(split_csv(line).map(ToString::to_string).collect())
    }

    /// Parse field `i`, surrounding quotes and whitespace ignored.
    pub fn parse<T: FromStr>(&self, i: usize) -> Result<T, Error> {
        self.0
            .get(i)
            .and_then(|f| unquote(f.trim()).parse().ok())
            .ok_or(Error::ProtocolParse)
    }
}

impl Deref for CsvRecord {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Split every line starting with `key` and strip the `key:` prefix from its
/// first field. Other lines are skipped.
pub fn keyed_records(lines: &[Line], key: &str) -> Result<Vec<CsvRecord>, Error> {
    let mut records = Vec::new();
    for line in lines {
        let text = line.text();
        let text = text.trim();
        if !text.starts_with(key) {
            continue;
        }

        let mut record = CsvRecord::from_line(text);
        let first = record.0.first_mut().ok_or(Error::ProtocolParse)?;
        let (_, value) = first.split_once(':').ok_or_else(|| {
            warn!("Keyed line without separator: {:?}", text);
            Error::ProtocolParse
        })?;
        *first = value.trim_start().to_string();
        records.push(record);
    }
    Ok(records)
}

/// Strip one pair of matching surrounding quotes.
pub fn unquote(field: &str) -> &str {
    let bytes = field.as_bytes();
    match bytes {
        [q @ (b'"' | b'\''), .., last] if last == q => &field[1..field.len() - 1],
        _ => field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<Line> {
        raw.iter().map(|l| Line::from(*l)).collect()
    }

    #[test]
    fn quoted_delimiter_is_kept() {
        let fields: Vec<_> = split_csv(r#"+TEST: "A,B",C"#).collect();
        assert_eq!(fields, [r#"+TEST: "A,B""#, "C"]);
    }

    #[test]
    fn mixed_quotes() {
        let fields: Vec<_> = split_csv(r#"'it"s',"a'b",x"#).collect();
        assert_eq!(fields, [r#"'it"s'"#, r#""a'b""#, "x"]);
    }

    #[test]
    fn empty_fields() {
        let fields: Vec<_> = split_csv("1,,3,").collect();
        assert_eq!(fields, ["1", "", "3"]);
        assert_eq!(split_csv("").count(), 0);
    }

    #[test]
    fn keyed_strip() {
        let records = keyed_records(&lines(&["+CSQ: 15,2\r\n", "\r\n", "OK\r\n"]), "+CSQ").unwrap();
        assert_eq!(records, [CsvRecord(alloc::vec!["15".into(), "2".into()])]);
        assert_eq!(records[0].parse::<u8>(0), Ok(15));
    }

    #[test]
    fn keyed_multi() {
        let records = keyed_records(
            &lines(&[
                "AT+CMGL=\"ALL\"\r\n",
                "+CMGL: 1,\"REC READ\",\"+420123\"\r\n",
                "hello\r\n",
                "+CMGL: 2,\"REC UNREAD\",\"+420456\"\r\n",
                "there\r\n",
                "OK\r\n",
            ]),
            "+CMGL:",
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].parse::<u32>(0), Ok(2));
        assert_eq!(unquote(&records[1][2]), "+420456");
    }

    #[test]
    fn keyed_line_without_colon() {
        assert_eq!(
            keyed_records(&lines(&["+CSQ 15,2\r\n"]), "+CSQ"),
            Err(Error::ProtocolParse)
        );
    }

    #[test]
    fn unquote_only_matching() {
        assert_eq!(unquote(r#""2024/01/02,10:00:00+04""#), "2024/01/02,10:00:00+04");
        assert_eq!(unquote(r#""abc'"#), r#""abc'"#);
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("15"), "15");
    }
}
