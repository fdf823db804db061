use uuid::Uuid;

pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn new_connection_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
