//! Removal of identifying text from the patient header field.
//!
//! EDF+ keeps the patient code, sex and birthdate subfields byte-for-byte and
//! replaces the name and any free-text remainder with a placeholder. A plain
//! EDF patient field is free text and is replaced as a whole.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::reader::EdfReader;
use crate::scanner::Outcome;
use crate::utils::write_field;

const PATIENT_FIELD_OFFSET: u64 = 8;

/// The patient field an anonymized copy of `field` carries.
pub fn anonymized_patient_field(field: &str, edfplus: bool, placeholder: &str) -> Result<String> {
    if !edfplus {
        return Ok(placeholder.to_string());
    }

    let parts: Vec<&str> = field.split(' ').filter(|p| !p.is_empty()).collect();
    if parts.len() < 3 {
        return Err(Error::Validation(format!(
            "EDF+ patient field has {} subfields, expected code, sex and birthdate", parts.len()
        )));
    }
    Ok(format!("{} {} {} {}", parts[0], parts[1], parts[2], placeholder))
}

/// Rewrites the patient field of one file.
///
/// The file is validated first and the new content is assembled in a
/// temporary file next to it, which then replaces the original in one rename.
/// On any error the original is left as it was.
pub fn anonymize_file(path: &Path, placeholder: &str) -> Result<Outcome<String>> {
    let (current, edfplus) = {
        let reader = EdfReader::open(path).map_err(|e| Error::parse(path, e))?;
        let header = reader.header();
        (header.patient_field.clone(), header.file_type.is_edfplus())
    };

    let replacement = anonymized_patient_field(&current, edfplus, placeholder)?;
    if replacement == current {
        return Ok(Outcome::Skipped("already anonymized".to_string()));
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    copy_with_patient_field(path, temp.as_file_mut(), &replacement).map_err(|e| Error::io(path, e))?;
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;

    debug!(file = %path.display(), "patient field rewritten");
    Ok(Outcome::Done("patient identification removed".to_string()))
}

fn copy_with_patient_field(source: &Path, target: &mut File, patient: &str) -> io::Result<()> {
    let mut input = File::open(source)?;
    io::copy(&mut input, target)?;

    let mut field = [b' '; 80];
    write_field(&mut field, patient);
    target.seek(SeekFrom::Start(PATIENT_FIELD_OFFSET))?;
    target.write_all(&field)?;
    target.sync_all()
}
