//! CSV reports. A report is a `Serialize` row type registered with `define_report!`; each report
//! type is written to its own file `<directory>/<file_prefix><short_name>.csv`.
use std::any::TypeId;
use std::cell::RefCell;
use std::fs::{create_dir_all, File};
use std::io;
use std::path::PathBuf;

use csv::Writer;
use log::{debug, trace};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::EpiError;
use crate::hashing::HashMap;

pub trait Report: 'static {
    /// Returns the report type used as the writer key.
    fn type_id(&self) -> TypeId;
    /// Serializes one row with the report's writer.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::CsvError` if the row cannot be written.
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), EpiError>;
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(
                &self,
                writer: &mut $crate::csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::error::EpiError> {
                writer.serialize(self)?;
                Ok(())
            }
        }
    };
}
pub use define_report;

/// Where report files go and whether existing files may be replaced.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub file_prefix: String,
    pub directory: PathBuf,
    pub overwrite: bool,
}

impl ReportOptions {
    #[must_use]
    pub fn new() -> ReportOptions {
        ReportOptions {
            file_prefix: String::new(),
            directory: PathBuf::from("."),
            overwrite: false,
        }
    }

    pub fn file_prefix(&mut self, file_prefix: String) -> &mut ReportOptions {
        self.file_prefix = file_prefix;
        self
    }

    pub fn directory(&mut self, directory: PathBuf) -> &mut ReportOptions {
        self.directory = directory;
        self
    }

    pub fn overwrite(&mut self, overwrite: bool) -> &mut ReportOptions {
        self.overwrite = overwrite;
        self
    }

    fn path_for(&self, short_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{short_name}.csv", self.file_prefix))
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::new()
    }
}

struct ReportData {
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
    config: ReportOptions,
}

define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        file_writers: RefCell::new(HashMap::default()),
        config: ReportOptions::new(),
    }
);

pub trait ContextReportExt {
    /// Returns the options used by subsequent `add_report` calls.
    fn report_options(&mut self) -> &mut ReportOptions;

    /// Opens the file for report type `T` and writes nothing yet.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::IoError` if the directory or file cannot be created, including when the
    /// file exists and `overwrite` is off.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), EpiError>;

    /// Writes one row to the file registered for the report's type.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::EpiError` if the type was never added, or the underlying CSV/IO error.
    fn send_report<T: Report>(&self, report: T) -> Result<(), EpiError>;
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ReportOptions {
        &mut self.get_data_mut(ReportPlugin).config
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), EpiError> {
        let data_container = self.get_data_mut(ReportPlugin);
        let path = data_container.config.path_for(short_name);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        if path.exists() && !data_container.config.overwrite {
            return Err(EpiError::IoError(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "report file {} already exists; pass --force-overwrite to replace it",
                    path.display()
                ),
            )));
        }
        debug!("writing {short_name} report to {}", path.display());
        let file = File::create(&path)?;
        data_container
            .file_writers
            .borrow_mut()
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        Ok(())
    }

    fn send_report<T: Report>(&self, report: T) -> Result<(), EpiError> {
        let data_container = self
            .try_get_data(ReportPlugin)
            .ok_or_else(|| EpiError::from("No writer found for the report type"))?;
        let mut writers = data_container.file_writers.borrow_mut();
        let writer = writers
            .get_mut(&report.type_id())
            .ok_or_else(|| EpiError::from("No writer found for the report type"))?;
        trace!("writing report row");
        report.serialize(writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Serialize, Deserialize)]
    struct SampleReport {
        id: u32,
        value: String,
    }

    define_report!(SampleReport);

    #[test]
    fn add_and_send_report() {
        let mut context = Context::new();
        let temp_dir = tempdir().unwrap();
        context
            .report_options()
            .directory(temp_dir.path().join("nested"))
            .file_prefix("run1_".to_string());
        context.add_report::<SampleReport>("sample").unwrap();
        context
            .send_report(SampleReport {
                id: 1,
                value: "Value,1".to_string(),
            })
            .unwrap();

        let file_path = temp_dir.path().join("nested").join("run1_sample.csv");
        let mut reader = csv::Reader::from_path(file_path).unwrap();
        let records: Vec<SampleReport> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[0].value, "Value,1");
    }

    #[test]
    fn refuses_to_overwrite_by_default() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("sample.csv"), "id,value\n").unwrap();

        let mut context = Context::new();
        context
            .report_options()
            .directory(temp_dir.path().to_path_buf());
        assert!(matches!(
            context.add_report::<SampleReport>("sample"),
            Err(EpiError::IoError(_))
        ));

        context.report_options().overwrite(true);
        assert!(context.add_report::<SampleReport>("sample").is_ok());
    }

    #[test]
    fn send_without_add_is_an_error() {
        let context = Context::new();
        let result = context.send_report(SampleReport {
            id: 1,
            value: String::new(),
        });
        assert!(result.is_err());
    }
}
