use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// The input bytes are not a readable ZIP container.
    InvalidContainer(String),
    /// A part the format requires (main document, workbook) is absent.
    MissingPart(String),
    Xml(roxmltree::Error),
    Zip(zip::result::ZipError),
    Json(serde_json::Error),
    SheetNotFound(String),
    CellReference(String),
    ControlNotFound(String),
    InvalidSelection { control: String, value: String },
    AddressNotFound(String),
    /// A value outside a cell's list validation.
    RejectedValue { cell: String, value: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::InvalidContainer(msg) => write!(f, "invalid container: {msg}"),
            Error::MissingPart(part) => write!(f, "missing required part: {part}"),
            Error::Xml(e) => write!(f, "XML error: {e}"),
            Error::Zip(e) => write!(f, "ZIP error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::SheetNotFound(name) => write!(f, "sheet not found: {name}"),
            Error::CellReference(r) => write!(f, "invalid cell reference: {r}"),
            Error::ControlNotFound(id) => write!(f, "control not found: {id}"),
            Error::InvalidSelection { control, value } => {
                write!(f, "'{value}' is not an option of {control}")
            }
            Error::AddressNotFound(addr) => write!(f, "address does not resolve: {addr}"),
            Error::RejectedValue { cell, value } => {
                write!(f, "'{value}' is not allowed in {cell} by its validation list")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Xml(e) => Some(e),
            Error::Zip(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Zip(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}
