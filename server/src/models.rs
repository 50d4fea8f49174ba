use serde::{Deserialize, Serialize};

/// One admission record as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub name: String,
    pub email: String,
    pub reference: String,
    pub barcode: String,
    pub table_no: i64,
}

/// A ticket before the store has assigned its id. Request bodies and decoded
/// CSV rows arrive in this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub name: String,
    pub email: String,
    pub reference: String,
    pub barcode: String,
    pub table_no: i64,
}

impl NewTicket {
    pub fn with_id(self, id: String) -> Ticket {
        Ticket {
            id,
            name: self.name,
            email: self.email,
            reference: self.reference,
            barcode: self.barcode,
            table_no: self.table_no,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// An account record. Users are created out of band and are read-only here.
/// The password is an opaque stored string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}
