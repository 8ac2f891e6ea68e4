use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::{
    backend::{AppointmentLedger, BookingBackend, Ledger, SlotRegistry},
    configuration::Configuration,
    error::BookingError,
    local_store::LocalStore,
    types::{Appointment, AppointmentView, Slot},
};

pub const TEST_GATEWAY_SECRET: &str = "123";

pub struct MockBookingBackendInner {
    pub success: AtomicBool,
    pub fail_availability_update: AtomicBool,
    pub calls_to_transaction: AtomicU64,
    pub store: LocalStore,
}

/// Local store that counts transactions and fails on demand.
#[derive(Clone)]
pub struct MockBookingBackend(pub Arc<MockBookingBackendInner>);

impl MockBookingBackendInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            fail_availability_update: AtomicBool::new(false),
            calls_to_transaction: AtomicU64::default(),
            store: LocalStore::default(),
        }
    }
}

impl MockBookingBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockBookingBackendInner::new()))
    }
}

impl BookingBackend for MockBookingBackend {
    fn transaction<R, F>(&self, work: F) -> Result<R, BookingError>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<R, BookingError>,
    {
        self.0.calls_to_transaction.fetch_add(1, Ordering::SeqCst);
        if !self.0.success.load(Ordering::SeqCst) {
            return Err(BookingError::Storage("Supposed to fail".into()));
        }

        let fail_availability_update = self.0.fail_availability_update.load(Ordering::SeqCst);
        self.0.store.transaction(|ledger| {
            work(&mut FaultyLedger {
                inner: ledger,
                fail_availability_update,
            })
        })
    }
}

/// Forwards to the wrapped ledger, optionally failing availability updates.
struct FaultyLedger<'a> {
    inner: &'a mut dyn Ledger,
    fail_availability_update: bool,
}

impl SlotRegistry for FaultyLedger<'_> {
    fn available_slots(&mut self) -> Result<Vec<Slot>, BookingError> {
        self.inner.available_slots()
    }

    fn create_slot(&mut self, date: NaiveDate, time: NaiveTime) -> Result<Slot, BookingError> {
        self.inner.create_slot(date, time)
    }

    fn slot_availability(&mut self, slot_id: Uuid) -> Result<bool, BookingError> {
        self.inner.slot_availability(slot_id)
    }

    fn lock_slot_availability(&mut self, slot_id: Uuid) -> Result<bool, BookingError> {
        self.inner.lock_slot_availability(slot_id)
    }

    fn set_slot_availability(&mut self, slot_id: Uuid, available: bool) -> Result<(), BookingError> {
        if self.fail_availability_update {
            return Err(BookingError::Storage("Supposed to fail".into()));
        }
        self.inner.set_slot_availability(slot_id, available)
    }
}

impl AppointmentLedger for FaultyLedger<'_> {
    fn create_appointment(
        &mut self,
        name: &str,
        contact: &str,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Appointment, BookingError> {
        self.inner.create_appointment(name, contact, slot_id, user_id)
    }

    fn all_appointments(&mut self) -> Result<Vec<AppointmentView>, BookingError> {
        self.inner.all_appointments()
    }

    fn appointments_of_user(&mut self, user_id: Uuid) -> Result<Vec<AppointmentView>, BookingError> {
        self.inner.appointments_of_user(user_id)
    }

    fn appointment(&mut self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.inner.appointment(appointment_id)
    }

    fn lock_appointment(&mut self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.inner.lock_appointment(appointment_id)
    }

    fn delete_appointment(
        &mut self,
        appointment_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<usize, BookingError> {
        self.inner
            .delete_appointment(appointment_id, user_id, is_admin)
    }
}

#[derive(Clone)]
pub struct TestConfiguration;

impl Configuration for TestConfiguration {
    fn port(&self) -> u16 {
        0
    }

    fn database_url(&self) -> Option<String> {
        None
    }

    fn gateway_secret(&self) -> String {
        TEST_GATEWAY_SECRET.into()
    }

    fn max_connections(&self) -> u32 {
        1
    }
}
