// SQL query constants for repositories

/// SQL query fragments for the event table
pub mod event_queries {
    /// All columns for the event table
    pub const SELECT_ALL_COLUMNS: &str = r#"id, subject, body, recipients,
        created_at, updated_at, deleted_at,
        expected_sent_at, exactly_sent_at,
        is_sent, is_failed, error_message"#;

    /// Row is still eligible for an outcome write
    pub const PENDING_PREDICATE: &str =
        "is_sent = false AND is_failed = false AND deleted_at IS NULL";
}
