//! Newest-first spreadsheet persistence.

use std::path::{Path, PathBuf};

use scrapify_core::{has_unstorable_chars, strip_non_printable, ScrapeRecord};
use thiserror::Error;
use tracing::{info, warn};
use umya_spreadsheet::{Spreadsheet, Worksheet};
use uuid::Uuid;

pub const HEADER_WITHOUT_TIME: [&str; 4] = ["Date", "Company", "Role", "Role description"];
pub const HEADER_WITH_TIME: [&str; 5] = ["Date", "Time", "Company", "Role", "Role description"];

/// Column layout of the data sheet. Older workbooks have no `Time` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetLayout {
    WithoutTime,
    WithTime,
}

impl SheetLayout {
    pub fn header(self) -> &'static [&'static str] {
        match self {
            SheetLayout::WithoutTime => &HEADER_WITHOUT_TIME,
            SheetLayout::WithTime => &HEADER_WITH_TIME,
        }
    }

    fn detect(sheet: &Worksheet) -> Self {
        if sheet.get_value((2u32, 1u32)).trim().eq_ignore_ascii_case("time") {
            SheetLayout::WithTime
        } else {
            SheetLayout::WithoutTime
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("opening workbook {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("preparing sheet {name}: {reason}")]
    Sheet { name: String, reason: String },
    #[error("saving workbook {path}: {reason}")]
    Save { path: String, reason: String },
}

/// Durable storage for a finished batch of records.
pub trait RecordSink: Send + Sync {
    /// Prepends `records` below the header so the stored order matches the
    /// batch order. Either the whole batch is saved or an error is returned.
    fn append_batch(&self, records: &[ScrapeRecord]) -> Result<usize, SinkError>;

    fn location(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct XlsxSink {
    path: PathBuf,
    sheet_name: String,
    new_layout: SheetLayout,
}

impl XlsxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet_name: "Sheet1".to_string(),
            new_layout: SheetLayout::WithoutTime,
        }
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    /// Layout used only when the workbook or sheet has to be created.
    pub fn with_new_layout(mut self, layout: SheetLayout) -> Self {
        self.new_layout = layout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_or_create(&self) -> Result<Spreadsheet, SinkError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "creating new workbook");
            let mut book = umya_spreadsheet::new_file();
            // new_file() starts with a "Sheet1"; reuse it as the configured sheet.
            if let Some(sheet) = book.get_sheet_mut(&0) {
                sheet.set_name(self.sheet_name.clone());
            }
            return Ok(book);
        }
        umya_spreadsheet::reader::xlsx::read(&self.path).map_err(|e| SinkError::Open {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn prepare_sheet<'a>(&self, book: &'a mut Spreadsheet) -> Result<&'a mut Worksheet, SinkError> {
        if book.get_sheet_by_name(&self.sheet_name).is_none() {
            book.new_sheet(self.sheet_name.clone())
                .map_err(|e| SinkError::Sheet {
                    name: self.sheet_name.clone(),
                    reason: e.to_string(),
                })?;
        }
        let sheet = book
            .get_sheet_by_name_mut(&self.sheet_name)
            .ok_or_else(|| SinkError::Sheet {
                name: self.sheet_name.clone(),
                reason: "sheet missing after creation".to_string(),
            })?;

        if sheet.get_value((1u32, 1u32)).trim().is_empty() {
            for (idx, title) in self.new_layout.header().iter().enumerate() {
                sheet.get_cell_mut((idx as u32 + 1, 1)).set_value(*title);
            }
        }
        Ok(sheet)
    }

    fn save(&self, book: &Spreadsheet) -> Result<(), SinkError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "workbook".to_string());
        let temp_path = dir.join(format!(".{file_name}.{}.tmp.xlsx", Uuid::new_v4()));
        let save_err = |reason: String| SinkError::Save {
            path: self.path.display().to_string(),
            reason,
        };

        umya_spreadsheet::writer::xlsx::write(book, &temp_path)
            .map_err(|e| save_err(format!("writing {}: {e}", temp_path.display())))?;

        if let Err(err) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(save_err(format!(
                "renaming {} -> {}: {err}",
                temp_path.display(),
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Every populated row of the data sheet, header first.
    pub fn read_rows(&self) -> Result<Vec<Vec<String>>, SinkError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let book = self.open_or_create()?;
        let Some(sheet) = book.get_sheet_by_name(&self.sheet_name) else {
            return Ok(Vec::new());
        };
        let max_row = sheet.get_highest_row();
        let max_col = sheet.get_highest_column();
        Ok((1..=max_row)
            .map(|row| {
                (1..=max_col)
                    .map(|col| sheet.get_value((col, row)))
                    .collect::<Vec<_>>()
            })
            .collect())
    }
}

fn write_record(sheet: &mut Worksheet, row: u32, layout: SheetLayout, record: &ScrapeRecord) {
    let description = if has_unstorable_chars(&record.description) {
        warn!(
            company = %record.company,
            title = %record.title,
            "stripping unstorable characters from description"
        );
        strip_non_printable(&record.description)
    } else {
        record.description.clone()
    };

    let mut cells = vec![record.date_cell()];
    if layout == SheetLayout::WithTime {
        cells.push(record.time_cell());
    }
    cells.push(record.company.clone());
    cells.push(record.title.clone());
    cells.push(description);

    for (idx, value) in cells.into_iter().enumerate() {
        sheet.get_cell_mut((idx as u32 + 1, row)).set_value(value);
    }
}

impl RecordSink for XlsxSink {
    fn append_batch(&self, records: &[ScrapeRecord]) -> Result<usize, SinkError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut book = self.open_or_create()?;
        {
            let sheet = self.prepare_sheet(&mut book)?;
            let layout = SheetLayout::detect(sheet);
            for record in records.iter().rev() {
                sheet.insert_new_row(&2, &1);
                write_record(sheet, 2, layout, record);
            }
        }
        self.save(&book)?;
        info!(path = %self.path.display(), rows = records.len(), "workbook saved");
        Ok(records.len())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
