use crate::error::BookingError;
use crate::types::{Appointment, AppointmentView, Slot};
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

pub trait SlotRegistry {
    fn available_slots(&mut self) -> Result<Vec<Slot>, BookingError>;
    fn create_slot(&mut self, date: NaiveDate, time: NaiveTime) -> Result<Slot, BookingError>;
    fn slot_availability(&mut self, slot_id: Uuid) -> Result<bool, BookingError>;
    /// Like `slot_availability`, but the slot stays locked until the transaction ends.
    fn lock_slot_availability(&mut self, slot_id: Uuid) -> Result<bool, BookingError>;
    fn set_slot_availability(&mut self, slot_id: Uuid, available: bool) -> Result<(), BookingError>;
}

pub trait AppointmentLedger {
    fn create_appointment(
        &mut self,
        name: &str,
        contact: &str,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Appointment, BookingError>;
    fn all_appointments(&mut self) -> Result<Vec<AppointmentView>, BookingError>;
    fn appointments_of_user(&mut self, user_id: Uuid) -> Result<Vec<AppointmentView>, BookingError>;
    fn appointment(&mut self, appointment_id: Uuid) -> Result<Appointment, BookingError>;
    /// Like `appointment`, but the row stays locked until the transaction ends.
    fn lock_appointment(&mut self, appointment_id: Uuid) -> Result<Appointment, BookingError>;
    /// Returns the number of removed rows. Non-admin deletes only match the
    /// caller's own appointments, so zero means "not yours" as well as "gone".
    fn delete_appointment(
        &mut self,
        appointment_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<usize, BookingError>;
}

/// Both halves of the store, as seen from inside one transaction.
pub trait Ledger: SlotRegistry + AppointmentLedger {}

impl<T: SlotRegistry + AppointmentLedger> Ledger for T {}

pub trait BookingBackend: Clone + Send + Sync + 'static {
    /// Runs `work` as one all-or-nothing unit. Nothing it wrote survives an `Err`.
    fn transaction<R, F>(&self, work: F) -> Result<R, BookingError>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<R, BookingError>;
}

pub fn require_text(field: &str, value: &str) -> Result<(), BookingError> {
    if value.trim().is_empty() {
        return Err(BookingError::Validation(format!("{field} is required")));
    }
    Ok(())
}
