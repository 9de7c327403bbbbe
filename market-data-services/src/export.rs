//! Tabular text export of snapshot rows.

use std::io::{self, Write};

use market_core::MarketSnapshotRow;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

pub const EXPORT_HEADER: [&str; 5] = ["symbol", "lastPrice", "changePct", "volumeText", "updatedAt"];

const SEP: char = ',';

fn needs_quotes(field: &str) -> bool {
    field.contains(SEP) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write one row, quoting only the fields that need it.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{}", SEP)?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

fn number_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Cells for one snapshot row, in header order.
pub fn export_cells(row: &MarketSnapshotRow) -> [String; 5] {
    [
        row.symbol.clone(),
        number_cell(row.last_price),
        number_cell(row.change_pct),
        row.volume_display(),
        row.updated_at.to_rfc3339(),
    ]
}

/// Header line followed by one line per row.
pub fn write_table<W: Write>(mut w: W, rows: &[MarketSnapshotRow]) -> io::Result<()> {
    write_row(&mut w, &EXPORT_HEADER)?;
    for row in rows {
        write_row(&mut w, &export_cells(row))?;
    }
    Ok(())
}

pub fn to_table_string(rows: &[MarketSnapshotRow]) -> String {
    let mut buf: Vec<u8> = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_table(&mut buf, rows);
    match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(&e.into_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(symbol: &str, price: Option<f64>, change: Option<f64>, volume: &str) -> MarketSnapshotRow {
        MarketSnapshotRow {
            symbol: symbol.to_string(),
            last_price: price,
            change_pct: change,
            volume_text: volume.to_string(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_header_only_for_empty_input() {
        assert_eq!(
            to_table_string(&[]),
            "symbol,lastPrice,changePct,volumeText,updatedAt\n"
        );
    }

    #[test]
    fn test_full_row() {
        let table = to_table_string(&[row("BTCUSDT", Some(67123.45), Some(2.35), "1.2B")]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "BTCUSDT,67123.45,2.35,1.2B,2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_null_numbers_render_empty() {
        let table = to_table_string(&[row("NEWUSDT", None, None, "")]);
        assert_eq!(
            table.lines().nth(1),
            Some("NEWUSDT,,,,2024-05-01T12:00:00+00:00")
        );
    }

    #[test]
    fn test_volume_separators_stripped() {
        let table = to_table_string(&[row("ETHUSDT", Some(3120.5), Some(-1.1), "845,300.2K")]);
        assert!(table.contains(",845300.2K,"));
        assert!(!table.contains('"'));
    }

    #[test]
    fn test_quoting_only_when_needed() {
        let mut buf = Vec::new();
        write_row(&mut buf, &["plain", "a,b", "say \"hi\"", "two\nlines"]).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "plain,\"a,b\",\"say \"\"hi\"\"\",\"two\nlines\"\n"
        );
    }
}
