use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("failed to read opportunities: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read opportunities workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("opportunities workbook has no sheets")]
    EmptyWorkbook,

    #[error("failed to open opportunities file: {0}")]
    Io(#[from] std::io::Error),
}
