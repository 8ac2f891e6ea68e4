use crate::backend::{require_text, AppointmentLedger, BookingBackend, Ledger, SlotRegistry};
use crate::error::BookingError;
use crate::schema::{appointments, slots};
use crate::types::{Appointment, AppointmentView, Slot};
use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Insertable)]
#[diesel(table_name = slots)]
struct NewSlot {
    id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
    available: bool,
}

#[derive(Insertable)]
#[diesel(table_name = appointments)]
struct NewAppointment<'a> {
    id: Uuid,
    name: &'a str,
    contact: &'a str,
    slot_id: Uuid,
    user_id: Uuid,
}

/// Why the backend could not be brought up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("database unreachable: {0}")]
    Connection(String),

    #[error("migration failed: {0}")]
    Migration(String),
}

impl StartupError {
    /// A server that is still starting may come up later, a broken schema won't.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StartupError::Connection(_))
    }
}

#[derive(Clone)]
pub struct DatabaseInterface {
    pool: PgPool,
}

impl DatabaseInterface {
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self, StartupError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_connections)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .map_err(|err| StartupError::Connection(err.to_string()))?;

        let mut connection = pool
            .get()
            .map_err(|err| StartupError::Connection(err.to_string()))?;
        let applied = connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| StartupError::Migration(err.to_string()))?;
        info!(count = applied.len(), "Applied pending migrations");

        Ok(Self { pool })
    }
}

impl BookingBackend for DatabaseInterface {
    fn transaction<R, F>(&self, work: F) -> Result<R, BookingError>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<R, BookingError>,
    {
        let mut connection = self.pool.get()?;
        connection
            .build_transaction()
            .read_write()
            .run(|connection| work(&mut PgLedger { connection }))
    }
}

/// Registry and ledger queries bound to the connection of a running transaction.
struct PgLedger<'a> {
    connection: &'a mut PgConnection,
}

impl PgLedger<'_> {
    fn appointment_views(
        &mut self,
        user_id: Option<Uuid>,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        let query = appointments::table
            .inner_join(slots::table)
            .select((
                appointments::id,
                appointments::name,
                appointments::contact,
                appointments::slot_id,
                slots::date,
                slots::time,
            ))
            .order((slots::date.asc(), slots::time.asc()));

        let views = match user_id {
            Some(user_id) => query
                .filter(appointments::user_id.eq(user_id))
                .load::<AppointmentView>(self.connection)?,
            None => query.load::<AppointmentView>(self.connection)?,
        };
        Ok(views)
    }
}

impl SlotRegistry for PgLedger<'_> {
    fn available_slots(&mut self) -> Result<Vec<Slot>, BookingError> {
        Ok(slots::table
            .filter(slots::available.eq(true))
            .order((slots::date.asc(), slots::time.asc()))
            .select(Slot::as_select())
            .load(self.connection)?)
    }

    fn create_slot(&mut self, date: NaiveDate, time: NaiveTime) -> Result<Slot, BookingError> {
        let slot = NewSlot {
            id: Uuid::new_v4(),
            date,
            time,
            available: true,
        };

        Ok(diesel::insert_into(slots::table)
            .values(&slot)
            .returning(Slot::as_returning())
            .get_result(self.connection)?)
    }

    fn slot_availability(&mut self, slot_id: Uuid) -> Result<bool, BookingError> {
        slots::table
            .find(slot_id)
            .select(slots::available)
            .first::<bool>(self.connection)
            .optional()?
            .ok_or(BookingError::NotFound("Slot"))
    }

    fn lock_slot_availability(&mut self, slot_id: Uuid) -> Result<bool, BookingError> {
        slots::table
            .find(slot_id)
            .select(slots::available)
            .for_update()
            .first::<bool>(self.connection)
            .optional()?
            .ok_or(BookingError::NotFound("Slot"))
    }

    fn set_slot_availability(&mut self, slot_id: Uuid, available: bool) -> Result<(), BookingError> {
        let updated = diesel::update(slots::table.find(slot_id))
            .set(slots::available.eq(available))
            .execute(self.connection)?;

        match updated {
            0 => Err(BookingError::NotFound("Slot")),
            _ => Ok(()),
        }
    }
}

impl AppointmentLedger for PgLedger<'_> {
    fn create_appointment(
        &mut self,
        name: &str,
        contact: &str,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Appointment, BookingError> {
        require_text("name", name)?;
        require_text("contact", contact)?;

        let appointment = NewAppointment {
            id: Uuid::new_v4(),
            name,
            contact,
            slot_id,
            user_id,
        };

        Ok(diesel::insert_into(appointments::table)
            .values(&appointment)
            .returning(Appointment::as_returning())
            .get_result(self.connection)?)
    }

    fn all_appointments(&mut self) -> Result<Vec<AppointmentView>, BookingError> {
        self.appointment_views(None)
    }

    fn appointments_of_user(&mut self, user_id: Uuid) -> Result<Vec<AppointmentView>, BookingError> {
        self.appointment_views(Some(user_id))
    }

    fn appointment(&mut self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        appointments::table
            .find(appointment_id)
            .select(Appointment::as_select())
            .first(self.connection)
            .optional()?
            .ok_or(BookingError::NotFound("Appointment"))
    }

    fn lock_appointment(&mut self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        appointments::table
            .find(appointment_id)
            .select(Appointment::as_select())
            .for_update()
            .first(self.connection)
            .optional()?
            .ok_or(BookingError::NotFound("Appointment"))
    }

    fn delete_appointment(
        &mut self,
        appointment_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<usize, BookingError> {
        let target = appointments::table.filter(appointments::id.eq(appointment_id));
        let removed = if is_admin {
            diesel::delete(target).execute(self.connection)?
        } else {
            diesel::delete(target.filter(appointments::user_id.eq(user_id)))
                .execute(self.connection)?
        };
        Ok(removed)
    }
}
