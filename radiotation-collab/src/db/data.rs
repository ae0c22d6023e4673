use radiotation_core::{RotatorKind, UserId};

#[derive(Debug)]
pub struct NewRoom {
    pub display_name: String,
    /// How members take turns in the new room
    pub rotator: RotatorKind,
}

#[derive(Debug)]
pub struct NewUser {
    /// The account id, as given by whatever authenticated the user
    pub id: UserId,
    pub display_name: String,
}
