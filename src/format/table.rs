//! Bordered-table formatters for the presence diff.
//!
//! Header row = database display keys, one data row per sorted table name.
//! `simple-table` fills a cell with the table name when present and leaves
//! it blank otherwise; `presence-table` uses `O` / `X` markers.

use super::Formatter;
use crate::config::{parse_bool, ConfigMap};
use crate::diff::{DiffEngine, PresenceMatrix};
use crate::error::{config_error, render_error, AppError, AppResult};
use crate::summary::SummarySet;
use std::io::Write;
use std::str::FromStr;
use tracing::warn;

pub const SIMPLE_TABLE: &str = "simple-table";
pub const PRESENCE_TABLE: &str = "presence-table";

const KEY_HEADER: &str = "header";
const KEY_STYLE: &str = "style";

const RESET: &str = "\x1b[0m";

/// What a matrix cell shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMarker {
    /// The table name, or blank when absent
    Name,
    /// `O` when present, `X` when absent
    Presence,
}

impl CellMarker {
    fn cell(self, table: &str, present: bool) -> String {
        match (self, present) {
            (CellMarker::Name, true) => table.to_string(),
            (CellMarker::Name, false) => String::new(),
            (CellMarker::Presence, true) => "O".to_string(),
            (CellMarker::Presence, false) => "X".to_string(),
        }
    }
}

/// Named visual styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    #[default]
    Default,
    Light,
    Bold,
    Double,
    Rounded,
    Bright,
    Dark,
    /// Black text on an accent header, black on white rows
    BlackOn(Accent),
    /// Accent text on black
    AccentOnBlack(Accent),
}

/// Accent colour of the two-tone coloured styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accent {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl Accent {
    /// Header: black on the accent background.
    fn black_on(self) -> &'static str {
        match self {
            Accent::Red => "\x1b[30;41m",
            Accent::Green => "\x1b[30;42m",
            Accent::Yellow => "\x1b[30;43m",
            Accent::Blue => "\x1b[30;44m",
            Accent::Magenta => "\x1b[30;45m",
            Accent::Cyan => "\x1b[30;46m",
        }
    }

    /// Header: accent on dark grey.
    fn header_on_black(self) -> &'static str {
        match self {
            Accent::Red => "\x1b[31;100m",
            Accent::Green => "\x1b[32;100m",
            Accent::Yellow => "\x1b[33;100m",
            Accent::Blue => "\x1b[34;100m",
            Accent::Magenta => "\x1b[35;100m",
            Accent::Cyan => "\x1b[36;100m",
        }
    }

    /// Rows: bright accent on black.
    fn row_on_black(self) -> &'static str {
        match self {
            Accent::Red => "\x1b[91;40m",
            Accent::Green => "\x1b[92;40m",
            Accent::Yellow => "\x1b[93;40m",
            Accent::Blue => "\x1b[94;40m",
            Accent::Magenta => "\x1b[95;40m",
            Accent::Cyan => "\x1b[96;40m",
        }
    }
}

const BLACK_ON_WHITE: &str = "\x1b[30;107m";

/// Every accepted `style` value.
const STYLES: [(&str, TableStyle); 19] = [
    ("default", TableStyle::Default),
    ("light", TableStyle::Light),
    ("bold", TableStyle::Bold),
    ("double", TableStyle::Double),
    ("rounded", TableStyle::Rounded),
    ("bright", TableStyle::Bright),
    ("dark", TableStyle::Dark),
    ("black-on-blue-white", TableStyle::BlackOn(Accent::Blue)),
    ("black-on-cyan-white", TableStyle::BlackOn(Accent::Cyan)),
    ("black-on-green-white", TableStyle::BlackOn(Accent::Green)),
    ("black-on-magenta-white", TableStyle::BlackOn(Accent::Magenta)),
    ("black-on-yellow-white", TableStyle::BlackOn(Accent::Yellow)),
    ("black-on-red-white", TableStyle::BlackOn(Accent::Red)),
    ("blue-white-on-black", TableStyle::AccentOnBlack(Accent::Blue)),
    ("cyan-white-on-black", TableStyle::AccentOnBlack(Accent::Cyan)),
    ("green-white-on-black", TableStyle::AccentOnBlack(Accent::Green)),
    ("magenta-white-on-black", TableStyle::AccentOnBlack(Accent::Magenta)),
    ("red-white-on-black", TableStyle::AccentOnBlack(Accent::Red)),
    ("yellow-white-on-black", TableStyle::AccentOnBlack(Accent::Yellow)),
];

/// Border glyphs: corners and joints row by row, then the two rules.
struct Borders {
    top: [char; 3],
    mid: [char; 3],
    bottom: [char; 3],
    horizontal: char,
    vertical: char,
}

const ASCII: Borders = Borders {
    top: ['+', '+', '+'],
    mid: ['+', '+', '+'],
    bottom: ['+', '+', '+'],
    horizontal: '-',
    vertical: '|',
};

const LIGHT: Borders = Borders {
    top: ['┌', '┬', '┐'],
    mid: ['├', '┼', '┤'],
    bottom: ['└', '┴', '┘'],
    horizontal: '─',
    vertical: '│',
};

const BOLD: Borders = Borders {
    top: ['┏', '┳', '┓'],
    mid: ['┣', '╋', '┫'],
    bottom: ['┗', '┻', '┛'],
    horizontal: '━',
    vertical: '┃',
};

const DOUBLE: Borders = Borders {
    top: ['╔', '╦', '╗'],
    mid: ['╠', '╬', '╣'],
    bottom: ['╚', '╩', '╝'],
    horizontal: '═',
    vertical: '║',
};

const ROUNDED: Borders = Borders {
    top: ['╭', '┬', '╮'],
    mid: ['├', '┼', '┤'],
    bottom: ['╰', '┴', '╯'],
    horizontal: '─',
    vertical: '│',
};

impl TableStyle {
    pub fn names() -> Vec<&'static str> {
        STYLES.iter().map(|(name, _)| *name).collect()
    }

    fn borders(self) -> &'static Borders {
        match self {
            TableStyle::Default => &ASCII,
            TableStyle::Light
            | TableStyle::Bright
            | TableStyle::Dark
            | TableStyle::BlackOn(_)
            | TableStyle::AccentOnBlack(_) => &LIGHT,
            TableStyle::Bold => &BOLD,
            TableStyle::Double => &DOUBLE,
            TableStyle::Rounded => &ROUNDED,
        }
    }

    /// ANSI colours for (header, data rows), if any.
    fn colors(self) -> Option<(&'static str, &'static str)> {
        match self {
            TableStyle::Bright => Some(("\x1b[1;30;47m", "\x1b[97m")),
            TableStyle::Dark => Some(("\x1b[1;97;40m", "\x1b[37m")),
            TableStyle::BlackOn(accent) => Some((accent.black_on(), BLACK_ON_WHITE)),
            TableStyle::AccentOnBlack(accent) => {
                Some((accent.header_on_black(), accent.row_on_black()))
            }
            _ => None,
        }
    }
}

impl FromStr for TableStyle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STYLES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, style)| *style)
            .ok_or_else(|| {
                config_error(format!(
                    "unknown style {:?}, expected one of: {:?}",
                    s,
                    TableStyle::names()
                ))
            })
    }
}

/// Presence matrix rendered as a bordered table
#[derive(Debug, Clone)]
pub struct TableFormatter {
    marker: CellMarker,
    header: bool,
    style: TableStyle,
}

impl TableFormatter {
    pub fn new(marker: CellMarker) -> Self {
        Self {
            marker,
            header: true,
            style: TableStyle::Default,
        }
    }

    /// Recognized keys: `header` (bool, default true), `style` (default "default").
    pub fn from_config(marker: CellMarker, config: &ConfigMap) -> AppResult<Self> {
        let mut formatter = Self::new(marker);

        for (key, value) in config {
            match key.as_str() {
                KEY_HEADER => formatter.header = parse_bool(key, value)?,
                KEY_STYLE => formatter.style = value.parse()?,
                other => warn!(key = %other, "Ignoring unknown formatter config key"),
            }
        }

        Ok(formatter)
    }

    fn rows(&self, matrix: &PresenceMatrix) -> Vec<Vec<String>> {
        matrix
            .tables
            .iter()
            .map(|row| {
                row.presence
                    .iter()
                    .map(|present| self.marker.cell(&row.name, *present))
                    .collect()
            })
            .collect()
    }
}

impl Formatter for TableFormatter {
    fn kind(&self) -> &'static str {
        match self.marker {
            CellMarker::Name => SIMPLE_TABLE,
            CellMarker::Presence => PRESENCE_TABLE,
        }
    }

    fn render(&self, summaries: &SummarySet, sink: &mut dyn Write) -> AppResult<()> {
        let matrix = DiffEngine::presence(summaries);
        if matrix.databases.is_empty() {
            return Ok(());
        }

        let header = self.header.then_some(matrix.databases.as_slice());
        let grid = render_grid(self.style, header, &self.rows(&matrix));
        sink.write_all(grid.as_bytes())
            .map_err(|e| render_error(format!("error writing table: {}", e)))
    }
}

/// Lay out `header` and `rows` as a bordered grid, one line per row.
pub fn render_grid(style: TableStyle, header: Option<&[String]>, rows: &[Vec<String>]) -> String {
    let columns = header
        .map(|h| h.len())
        .or_else(|| rows.first().map(Vec::len))
        .unwrap_or(0);
    if columns == 0 {
        return String::new();
    }

    // Widths count chars, so double-width glyphs (CJK names) misalign the
    // borders; schema identifiers are overwhelmingly narrow.
    let mut widths = vec![0usize; columns];
    for cells in header.into_iter().chain(rows.iter().map(Vec::as_slice)) {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let borders = style.borders();
    let (header_color, row_color) = match style.colors() {
        Some((h, r)) => (Some(h), Some(r)),
        None => (None, None),
    };

    let mut out = String::new();
    rule(&mut out, borders, borders.top, &widths);
    if let Some(header) = header {
        line(&mut out, borders, header, &widths, header_color);
        rule(&mut out, borders, borders.mid, &widths);
    }
    for row in rows {
        line(&mut out, borders, row, &widths, row_color);
    }
    rule(&mut out, borders, borders.bottom, &widths);
    out
}

fn rule(out: &mut String, borders: &Borders, joints: [char; 3], widths: &[usize]) {
    let segments: Vec<String> = widths
        .iter()
        .map(|w| borders.horizontal.to_string().repeat(w + 2))
        .collect();
    out.push(joints[0]);
    out.push_str(&segments.join(&joints[1].to_string()));
    out.push(joints[2]);
    out.push('\n');
}

fn line(out: &mut String, borders: &Borders, cells: &[String], widths: &[usize], color: Option<&str>) {
    out.push(borders.vertical);
    for (idx, width) in widths.iter().enumerate() {
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        let padded = format!("{:<width$}", cell, width = width);
        out.push(' ');
        match color {
            Some(c) => {
                out.push_str(c);
                out.push_str(&padded);
                out.push_str(RESET);
            }
            None => out.push_str(&padded),
        }
        out.push(' ');
        out.push(borders.vertical);
    }
    out.push('\n');
}
