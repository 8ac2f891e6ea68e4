use crate::backend::{require_text, AppointmentLedger, BookingBackend, Ledger, SlotRegistry};
use crate::error::BookingError;
use crate::types::{Appointment, AppointmentView, Slot};
use chrono::{NaiveDate, NaiveTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct LocalState {
    slots: HashMap<Uuid, Slot>,
    appointments: HashMap<Uuid, Appointment>,
}

/// Keeps slots and appointments in process memory. Every transaction holds
/// the lock for its whole duration and works on a copy that only replaces
/// the shared state once the work succeeded.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    state: Arc<Mutex<LocalState>>,
}

impl BookingBackend for LocalStore {
    fn transaction<R, F>(&self, work: F) -> Result<R, BookingError>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<R, BookingError>,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BookingError::Storage("In-memory store is poisoned".into()))?;

        let mut working_copy = state.clone();
        let result = work(&mut working_copy)?;
        *state = working_copy;
        Ok(result)
    }
}

impl LocalState {
    fn slot(&self, slot_id: Uuid) -> Result<&Slot, BookingError> {
        self.slots.get(&slot_id).ok_or(BookingError::NotFound("Slot"))
    }

    fn views<'a>(
        &'a self,
        appointments: impl Iterator<Item = &'a Appointment>,
    ) -> Vec<AppointmentView> {
        let mut views: Vec<AppointmentView> = appointments
            .filter_map(|appointment| {
                let slot = self.slots.get(&appointment.slot_id)?;
                Some(AppointmentView {
                    id: appointment.id,
                    name: appointment.name.clone(),
                    contact: appointment.contact.clone(),
                    slot_id: slot.id,
                    date: slot.date,
                    time: slot.time,
                })
            })
            .collect();
        views.sort_unstable_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
        views
    }
}

impl SlotRegistry for LocalState {
    fn available_slots(&mut self) -> Result<Vec<Slot>, BookingError> {
        let mut slots: Vec<Slot> = self
            .slots
            .values()
            .filter(|slot| slot.available)
            .cloned()
            .collect();
        slots.sort_unstable_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
        Ok(slots)
    }

    fn create_slot(&mut self, date: NaiveDate, time: NaiveTime) -> Result<Slot, BookingError> {
        let slot = Slot {
            id: Uuid::new_v4(),
            date,
            time,
            available: true,
        };
        self.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    fn slot_availability(&mut self, slot_id: Uuid) -> Result<bool, BookingError> {
        Ok(self.slot(slot_id)?.available)
    }

    fn lock_slot_availability(&mut self, slot_id: Uuid) -> Result<bool, BookingError> {
        // The whole transaction already runs under the store mutex
        self.slot_availability(slot_id)
    }

    fn set_slot_availability(&mut self, slot_id: Uuid, available: bool) -> Result<(), BookingError> {
        match self.slots.get_mut(&slot_id) {
            Some(slot) => {
                slot.available = available;
                Ok(())
            }
            None => Err(BookingError::NotFound("Slot")),
        }
    }
}

impl AppointmentLedger for LocalState {
    fn create_appointment(
        &mut self,
        name: &str,
        contact: &str,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Appointment, BookingError> {
        require_text("name", name)?;
        require_text("contact", contact)?;
        self.slot(slot_id)?;
        if self
            .appointments
            .values()
            .any(|appointment| appointment.slot_id == slot_id)
        {
            return Err(BookingError::SlotUnavailable);
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            name: name.to_string(),
            contact: contact.to_string(),
            slot_id,
            user_id,
            created_at: Utc::now(),
        };
        self.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    fn all_appointments(&mut self) -> Result<Vec<AppointmentView>, BookingError> {
        Ok(self.views(self.appointments.values()))
    }

    fn appointments_of_user(&mut self, user_id: Uuid) -> Result<Vec<AppointmentView>, BookingError> {
        Ok(self.views(
            self.appointments
                .values()
                .filter(|appointment| appointment.user_id == user_id),
        ))
    }

    fn appointment(&mut self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.appointments
            .get(&appointment_id)
            .cloned()
            .ok_or(BookingError::NotFound("Appointment"))
    }

    fn lock_appointment(&mut self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.appointment(appointment_id)
    }

    fn delete_appointment(
        &mut self,
        appointment_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<usize, BookingError> {
        let owned = match self.appointments.get(&appointment_id) {
            Some(appointment) => is_admin || appointment.user_id == user_id,
            None => false,
        };
        if !owned {
            return Ok(0);
        }
        self.appointments.remove(&appointment_id);
        Ok(1)
    }
}
