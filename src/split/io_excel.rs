// Reading the sheets of the Excel workbooks into raw cell grids.

use calamine::{DataType, Range};

use crate::split::*;

/// The sheets of a workbook, in workbook order, with their cells or the reason they
/// could not be read.
pub type Workbook = Vec<(String, Result<Grid, String>)>;

pub fn read_workbook(path: &Path) -> SplitResult<Workbook> {
    let p = path.display().to_string();
    debug!("read_workbook: path: {:?}", &p);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path: p.clone() })?;
    let names: Vec<String> = workbook.sheet_names().to_vec();
    let mut res: Workbook = Vec::new();
    for name in names {
        let sheet = match workbook.worksheet_range(&name) {
            Some(Ok(range)) => Ok(range_to_grid(&range)),
            Some(Err(e)) => Err(e.to_string()),
            None => Err("sheet not found".to_string()),
        };
        debug!(
            "read_workbook: {:?} sheet {:?}: {}",
            &p,
            &name,
            match &sheet {
                Ok(g) => format!("{} rows", g.len()),
                Err(e) => e.clone(),
            }
        );
        res.push((name, sheet));
    }
    Ok(res)
}

pub fn to_cell(d: &DataType) -> Cell {
    match d {
        DataType::Empty => Cell::Empty,
        DataType::String(s) => Cell::String(s.clone()),
        DataType::Float(f) => Cell::Float(*f),
        DataType::Int(i) => Cell::Int(*i),
        DataType::Bool(b) => Cell::Bool(*b),
        DataType::DateTime(f) => Cell::DateTime(*f),
        DataType::Error(e) => Cell::Error(e.to_string()),
    }
}

/// The cells of the range, aligned on the first cell of the sheet.
///
/// The range only starts at the first used cell, so the empty rows and columns in
/// front of it are added back: the sheet layouts are defined from the top of the sheet.
pub fn range_to_grid(range: &Range<DataType>) -> Grid {
    let (row0, col0) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Vec::new(),
    };
    let mut grid: Grid = vec![Vec::new(); row0];
    for row in range.rows() {
        let mut cells: Vec<Cell> = vec![Cell::Empty; col0];
        cells.extend(row.iter().map(to_cell));
        grid.push(cells);
    }
    grid
}
