use radiotation_core::{User, UserId};

use crate::{CollabContext, CollabError, Database, NewUser};

pub struct UserManager<Db> {
    context: CollabContext<Db>,
}

impl<Db> UserManager<Db>
where
    Db: Database,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates an account for a user that authenticated elsewhere
    pub async fn register(&self, id: UserId, display_name: &str) -> Result<User, CollabError> {
        let user = self
            .context
            .database
            .create_user(NewUser {
                id,
                display_name: display_name.to_string(),
            })
            .await?;

        Ok(user)
    }
}
