/// Raw persisted session row. `record` is the JSON-encoded session exactly as
/// it was saved; it is validated by the session store, not here.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub record: String,
    pub saved_at: i64,
}
