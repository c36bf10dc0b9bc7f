use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Telemetry fields published by the uplink, one topic per field.
///
/// The application updates fields at any time. A publish cycle walks the keys
/// present when it starts and skips fields removed in the meantime.
pub struct Telemetry {
    fields: Mutex<NoopRawMutex, RefCell<BTreeMap<String, Value>>>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub const fn new() -> Self {
        Self {
            fields: Mutex::new(RefCell::new(BTreeMap::new())),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let value = serde_json::to_value(value)?;
        self.fields.lock(|f| {
            f.borrow_mut().insert(key.to_string(), value);
        });
        Ok(())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.fields.lock(|f| f.borrow_mut().remove(key).is_some())
    }

    pub fn keys(&self) -> Vec<String> {
        self.fields.lock(|f| f.borrow().keys().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.fields.lock(|f| f.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON text of one field, `None` if it is not set.
    pub fn encoded(&self, key: &str) -> Result<Option<String>, Error> {
        self.fields.lock(|f| {
            f.borrow()
                .get(key)
                .map(serde_json::to_string)
                .transpose()
                .map_err(Error::from)
        })
    }
}
