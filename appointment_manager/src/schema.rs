diesel::table! {
    slots (id) {
        id -> Uuid,
        date -> Date,
        time -> Time,
        available -> Bool,
    }
}

diesel::table! {
    appointments (id) {
        id -> Uuid,
        name -> Text,
        contact -> Text,
        slot_id -> Uuid,
        user_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(appointments -> slots (slot_id));

diesel::allow_tables_to_appear_in_same_query!(appointments, slots);
