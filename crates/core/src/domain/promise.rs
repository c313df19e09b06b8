use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{PromiseId, StudioId};

/// A lead: the prospect and event data a quote is attached to before it is
/// authorized into an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promise {
    pub id: PromiseId,
    pub studio_id: StudioId,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub event_name: Option<String>,
    pub event_location: Option<String>,
    pub event_date: Option<NaiveDate>,
}

/// Derived, never stored: which required contact/event fields are present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredData {
    pub name: bool,
    pub phone: bool,
    pub email: bool,
    pub address: bool,
    pub event_name: bool,
    pub event_location: bool,
    pub event_date: bool,
}

impl RequiredData {
    pub fn from_promise(promise: &Promise) -> Self {
        Self {
            name: filled(&promise.name),
            phone: filled(&promise.phone),
            email: filled(&promise.email),
            address: filled(&promise.address),
            event_name: filled(&promise.event_name),
            event_location: filled(&promise.event_location),
            event_date: promise.event_date.is_some(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// User-facing labels of the fields still missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.name {
            missing.push("nombre");
        }
        if !self.phone {
            missing.push("teléfono");
        }
        if !self.email {
            missing.push("email");
        }
        if !self.address {
            missing.push("dirección");
        }
        if !self.event_name {
            missing.push("nombre del evento");
        }
        if !self.event_location {
            missing.push("lugar del evento");
        }
        if !self.event_date {
            missing.push("fecha del evento");
        }
        missing
    }
}

impl Default for RequiredData {
    fn default() -> Self {
        Self {
            name: false,
            phone: false,
            email: false,
            address: false,
            event_name: false,
            event_location: false,
            event_date: false,
        }
    }
}

/// Partial contact/event update sent to the storage collaborator. `None`
/// fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub event_name: Option<String>,
    pub event_location: Option<String>,
    pub event_date: Option<NaiveDate>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.address.is_none()
            && self.event_name.is_none()
            && self.event_location.is_none()
            && self.event_date.is_none()
    }

    pub fn apply_to(&self, promise: &mut Promise) {
        if let Some(name) = &self.name {
            promise.name = Some(name.clone());
        }
        if let Some(phone) = &self.phone {
            promise.phone = Some(phone.clone());
        }
        if let Some(email) = &self.email {
            promise.email = Some(email.clone());
        }
        if let Some(address) = &self.address {
            promise.address = Some(address.clone());
        }
        if let Some(event_name) = &self.event_name {
            promise.event_name = Some(event_name.clone());
        }
        if let Some(event_location) = &self.event_location {
            promise.event_location = Some(event_location.clone());
        }
        if let Some(event_date) = self.event_date {
            promise.event_date = Some(event_date);
        }
    }
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|value| !value.trim().is_empty())
}
