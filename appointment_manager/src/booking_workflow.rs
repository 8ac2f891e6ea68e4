use crate::backend::{require_text, BookingBackend};
use crate::error::BookingError;
use crate::types::{Appointment, AppointmentView, Caller, Slot};
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Books and cancels appointments so that a slot is never held by more than
/// one of them. Each operation is a single backend transaction: availability
/// is re-read under a row lock and the appointment write and availability
/// flip commit together or not at all.
#[derive(Clone)]
pub struct BookingWorkflow<T: BookingBackend> {
    backend: T,
}

impl<T: BookingBackend> BookingWorkflow<T> {
    pub fn new(backend: T) -> Self {
        Self { backend }
    }

    pub fn available_slots(&self) -> Result<Vec<Slot>, BookingError> {
        self.backend.transaction(|ledger| ledger.available_slots())
    }

    pub fn create_slot(&self, caller: &Caller, date: &str, time: &str) -> Result<Slot, BookingError> {
        if !caller.is_admin() {
            warn!(user = %caller.user_id, "Non-admin tried to create a slot");
            return Err(BookingError::Forbidden);
        }
        let date = parse_date(date)?;
        let time = parse_time(time)?;

        let slot = self
            .backend
            .transaction(|ledger| ledger.create_slot(date, time))?;
        info!(slot = %slot.id, %date, %time, "Slot created");
        Ok(slot)
    }

    pub fn book(
        &self,
        caller: &Caller,
        name: &str,
        contact: &str,
        slot_id: Uuid,
    ) -> Result<Appointment, BookingError> {
        require_text("name", name)?;
        require_text("contact", contact)?;

        let appointment = self
            .backend
            .transaction(|ledger| {
                match ledger.lock_slot_availability(slot_id) {
                    Ok(true) => {}
                    Ok(false) | Err(BookingError::NotFound(_)) => {
                        return Err(BookingError::SlotUnavailable)
                    }
                    Err(err) => return Err(err),
                }

                let appointment =
                    ledger.create_appointment(name, contact, slot_id, caller.user_id)?;
                ledger.set_slot_availability(slot_id, false)?;
                Ok(appointment)
            })
            .inspect_err(|err| warn!(%slot_id, user = %caller.user_id, %err, "Booking failed"))?;

        info!(appointment = %appointment.id, %slot_id, user = %caller.user_id, "Appointment booked");
        Ok(appointment)
    }

    pub fn cancel(&self, caller: &Caller, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let appointment = self
            .backend
            .transaction(|ledger| {
                let appointment = ledger.lock_appointment(appointment_id)?;

                let removed =
                    ledger.delete_appointment(appointment_id, caller.user_id, caller.is_admin())?;
                if removed == 0 {
                    return Err(BookingError::Forbidden);
                }

                ledger.set_slot_availability(appointment.slot_id, true)?;
                Ok(appointment)
            })
            .inspect_err(|err| {
                warn!(appointment = %appointment_id, user = %caller.user_id, %err, "Cancellation failed")
            })?;

        info!(appointment = %appointment_id, slot = %appointment.slot_id, user = %caller.user_id, "Appointment canceled");
        Ok(appointment)
    }

    pub fn appointments_of(&self, caller: &Caller) -> Result<Vec<AppointmentView>, BookingError> {
        self.backend
            .transaction(|ledger| ledger.appointments_of_user(caller.user_id))
    }

    /// Every appointment, whoever owns it. Any authenticated caller may list them.
    pub fn all_appointments(&self, caller: &Caller) -> Result<Vec<AppointmentView>, BookingError> {
        debug!(user = %caller.user_id, role = %caller.role, "Listing all appointments");
        self.backend.transaction(|ledger| ledger.all_appointments())
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, BookingError> {
    require_text("date", date)?;
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| BookingError::Validation(format!("'{date}' is not a valid date (YYYY-MM-DD)")))
}

fn parse_time(time: &str) -> Result<NaiveTime, BookingError> {
    require_text("time", time)?;
    let time = time.trim();
    NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map_err(|_| BookingError::Validation(format!("'{time}' is not a valid time (HH:MM)")))
}
