//! Workbook type - the main document structure

use crate::error::{Error, Result};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook (spreadsheet document)
///
/// A workbook is an ordered sequence of worksheets plus the date system
/// flag carried by the file's globals.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    /// Worksheets in the workbook
    worksheets: Vec<Worksheet>,
    /// True when numeric date serials count from the 1904 epoch
    date_1904: bool,
}

impl Workbook {
    /// Create a new empty workbook with no worksheets
    pub fn new() -> Self {
        Self {
            worksheets: Vec::new(),
            date_1904: false,
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Check if the workbook has no worksheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|ws| ws.name() == name)
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a worksheet to the end of the workbook, returning its index
    pub fn add_sheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name())?;
        let index = self.worksheets.len();
        self.worksheets.push(worksheet);
        Ok(index)
    }

    /// Remove a worksheet by index
    pub fn remove_sheet(&mut self, index: usize) -> Result<Worksheet> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        Ok(self.worksheets.remove(index))
    }

    /// Whether date serials count from the 1904 epoch (DATEMODE)
    pub fn date_1904(&self) -> bool {
        self.date_1904
    }

    /// Set the date system flag
    pub fn set_date_1904(&mut self, date_1904: bool) {
        self.date_1904 = date_1904;
    }

    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("name is empty".to_string()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "name longer than {MAX_SHEET_NAME_LEN} characters"
            )));
        }
        if self.worksheets.iter().any(|ws| ws.name() == name) {
            return Err(Error::DuplicateSheetName(name.to_string()));
        }
        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut wb = Workbook::new();
        assert!(wb.is_empty());

        wb.add_sheet(Worksheet::new("First")).unwrap();
        wb.add_sheet(Worksheet::new("Second")).unwrap();

        assert_eq!(wb.sheet_count(), 2);
        assert_eq!(wb.worksheet(0).unwrap().name(), "First");
        assert_eq!(wb.worksheet_by_name("Second").unwrap().name(), "Second");
        assert!(wb.worksheet_by_name("Third").is_none());
    }

    #[test]
    fn test_sheet_name_validation() {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.add_sheet(Worksheet::new("")),
            Err(Error::InvalidSheetName(_))
        ));

        wb.add_sheet(Worksheet::new("Dup")).unwrap();
        assert!(matches!(
            wb.add_sheet(Worksheet::new("Dup")),
            Err(Error::DuplicateSheetName(_))
        ));

        let long = "x".repeat(MAX_SHEET_NAME_LEN + 1);
        assert!(matches!(
            wb.add_sheet(Worksheet::new(long)),
            Err(Error::InvalidSheetName(_))
        ));
    }

    #[test]
    fn test_remove_sheet() {
        let mut wb = Workbook::new();
        wb.add_sheet(Worksheet::new("A")).unwrap();
        assert!(wb.remove_sheet(1).is_err());
        let removed = wb.remove_sheet(0).unwrap();
        assert_eq!(removed.name(), "A");
        assert!(wb.is_empty());
    }
}
