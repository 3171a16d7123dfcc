// ABOUTME: Spreadsheet encoder for exported rows
// ABOUTME: One worksheet with a styled header row and typed cells beneath it

use crate::db::Value;
use crate::error::{ExplorerError, Result};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};

const HEADER_FILL: u32 = 0xE4E4E7;

pub fn encode(columns: &[String], rows: &[Vec<Value>]) -> Result<Vec<u8>> {
    build(columns, rows).map_err(|e| ExplorerError::encoding("xlsx", e))
}

fn build(columns: &[String], rows: &[Vec<Value>]) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL));
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let datetime = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let worksheet = workbook.add_worksheet();

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col_num(col)?, name, &header)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let row_num = u32::try_from(idx + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, value) in row.iter().enumerate() {
            write_cell(worksheet, row_num, col_num(col)?, value, &date, &datetime)?;
        }
    }

    worksheet.autofit();
    workbook.save_to_buffer()
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    date: &Format,
    datetime: &Format,
) -> std::result::Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Value::Int(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        Value::Float(f) if f.is_finite() => {
            worksheet.write_number(row, col, *f)?;
        }
        Value::Decimal(s) => match s.parse::<f64>() {
            Ok(f) if f.is_finite() => {
                worksheet.write_number(row, col, f)?;
            }
            _ => {
                worksheet.write_string(row, col, s)?;
            }
        },
        Value::Date(d) => {
            worksheet.write_datetime_with_format(row, col, d, date)?;
        }
        Value::DateTime(dt) => {
            worksheet.write_datetime_with_format(row, col, dt, datetime)?;
        }
        other => {
            worksheet.write_string(row, col, other.to_string())?;
        }
    }
    Ok(())
}

fn col_num(idx: usize) -> std::result::Result<u16, XlsxError> {
    u16::try_from(idx).map_err(|_| XlsxError::RowColumnLimitError)
}
