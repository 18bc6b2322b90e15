//! Structured error types for xlimport.
//!
//! Two tiers: [`ImportError`] aborts the whole import, [`SkipReason`] drops a
//! single artifact (chart, pivot table, image, cell value) and lets the import
//! carry on.

/// Errors that make an input entirely unreadable.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Malformed delimited text.
    #[error("CSV: {0}")]
    Csv(#[from] ::csv::Error),

    /// Legacy binary workbook error from calamine.
    #[error("XLS workbook: {0}")]
    Xls(#[from] calamine::XlsError),

    /// A required package part is absent.
    #[error("Missing part: {0}")]
    MissingPart(String),

    /// Invalid cell reference.
    #[error("Invalid cell reference: {0}")]
    CellRef(String),

    /// The caller asked for an input kind this build cannot read.
    #[error("Unsupported input: {0}")]
    Unsupported(String),

    /// General parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ImportError>;

impl From<String> for ImportError {
    fn from(s: String) -> Self {
        Self::Parse(s)
    }
}

impl From<&str> for ImportError {
    fn from(s: &str) -> Self {
        Self::Parse(s.to_string())
    }
}

/// Why a single artifact was left out of the result.
///
/// Extractors return `Result<Item, SkipReason>` per item; the caller logs the
/// reason and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("part {0} is missing from the package")]
    MissingPart(String),

    #[error("relationship {0} could not be resolved")]
    MissingRelationship(String),

    #[error("sheet {0:?} is not in the registry")]
    UnknownSheet(String),

    #[error("chart {0} is a pivot chart")]
    PivotChart(String),

    #[error("pivot cache {0} has no worksheet source")]
    UnresolvedPivotCache(u32),

    #[error("malformed reference {0:?}")]
    MalformedRef(String),

    #[error("cell {0} resolved to an invalid number")]
    InvalidNumber(String),

    #[error("XML error in {part}: {message}")]
    Xml { part: String, message: String },
}

impl SkipReason {
    pub(crate) fn xml(part: &str, err: &quick_xml::Error) -> Self {
        Self::Xml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

/// Advisory messages gathered during one import. Every entry is also logged
/// at `warn` level.
#[derive(Debug, Default, Clone)]
pub struct Warnings(Vec<String>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a skipped artifact.
    pub fn skip(&mut self, what: &str, reason: &SkipReason) {
        log::warn!("skipping {what}: {reason}");
        self.0.push(format!("skipped {what}: {reason}"));
    }

    /// Record a free-form advisory.
    pub fn advise(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.0.push(message);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_collect_in_order() {
        let mut warnings = Warnings::new();
        warnings.advise("input is large");
        warnings.skip(
            "chart xl/charts/chart1.xml",
            &SkipReason::PivotChart("xl/charts/chart1.xml".to_string()),
        );
        let all = warnings.into_vec();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], "input is large");
        assert!(all[1].starts_with("skipped chart xl/charts/chart1.xml: "));
    }

    #[test]
    fn test_import_error_from_str() {
        let err: ImportError = "bad header".into();
        assert_eq!(err.to_string(), "Parse error: bad header");
    }

    #[test]
    fn test_skip_reason_messages() {
        assert_eq!(
            SkipReason::UnknownSheet("Data".to_string()).to_string(),
            "sheet \"Data\" is not in the registry"
        );
        assert_eq!(
            SkipReason::UnresolvedPivotCache(7).to_string(),
            "pivot cache 7 has no worksheet source"
        );
    }
}
