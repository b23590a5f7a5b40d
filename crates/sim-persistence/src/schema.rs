//! Diesel schema for the §6 snapshot persistence contract. Hand-written;
//! replaceable with `diesel print-schema` once a real migration history
//! exists.

diesel::table! {
    twin_state_snapshots (run_id, step_number) {
        run_id -> Text,
        step_number -> BigInt,
        #[sql_name = "timestamp"]
        wall_clock -> Timestamptz,
        state -> Jsonb,
        description -> Text,
        metrics -> Jsonb,
    }
}
