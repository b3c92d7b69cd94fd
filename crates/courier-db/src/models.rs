/// Database row types — these map directly to SQLite rows.
/// Distinct from courier-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: String,
}

pub struct PersonalRow {
    pub user_id: i64,
    pub phone: String,
    pub email: String,
    pub created_at: String,
    pub modified_at: Option<String>,
}

pub struct MessageRow {
    pub id: i64,
    pub sender: i64,
    pub receiver: i64,
    pub text: Option<String>,
    pub photo: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}
