use std::fs;
use std::path::{Path, PathBuf};

use change_request::ChangeRequest;
use unit_of_work::{BoxError, Session, SessionFactory};

/// A change request persisted as one JSON file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ChangeRequest, BoxError> {
        let json = fs::read_to_string(&self.path)?;
        Ok(ChangeRequest::from_json(&json)?)
    }
}

impl SessionFactory for JsonStore {
    type Session = JsonSession;

    fn open(&self) -> Result<JsonSession, BoxError> {
        Ok(JsonSession {
            path: self.path.clone(),
            request: self.load()?,
            dirty: false,
        })
    }
}

/// Request loaded from a [`JsonStore`]; changes reach the file only on commit.
pub struct JsonSession {
    path: PathBuf,
    request: ChangeRequest,
    dirty: bool,
}

impl JsonSession {
    pub fn request(&self) -> &ChangeRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut ChangeRequest {
        self.dirty = true;
        &mut self.request
    }
}

impl Session for JsonSession {
    fn commit(&mut self) -> Result<(), BoxError> {
        if !self.dirty {
            return Ok(());
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, self.request.to_json()?)?;
        fs::rename(&tmp_path, &self.path)?;
        self.dirty = false;
        log::debug!("saved change request #{} to {}", self.request.number(), self.path.display());
        Ok(())
    }

    fn rollback(&mut self) {
        if self.dirty {
            log::debug!("discarding unsaved changes to change request #{}", self.request.number());
        }
        self.dirty = false;
    }
}
