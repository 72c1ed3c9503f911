//! Esquema Diesel (mantenido a mano). Reemplazable con `diesel print-schema`.
//!
//! Los roots y tasks guardan su representación completa en `payload` (JSONB)
//! más columnas indexables para los filtros del scheduler (status, dedup).
//! `task_transitions` es un log append-only: sin updates ni deletes.

diesel::table! {
    workflow_roots (id) {
        id -> Uuid,
        user_id -> Text,
        project_id -> Text,
        nature -> Text,
        status -> Text,
        root_type -> Text,
        fe_request_hash -> Nullable<Text>,
        parent_id -> Nullable<Uuid>,
        payload -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    workflow_tasks (id) {
        id -> Uuid,
        root_id -> Nullable<Uuid>,
        status -> Text,
        payload -> Jsonb,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    task_transitions (seq) {
        seq -> BigInt,
        task_id -> Uuid,
        from_status -> Text,
        to_status -> Text,
        message -> Text,
        ts -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(workflow_roots, workflow_tasks, task_transitions,);
