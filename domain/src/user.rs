use crate::error::Error;
use crate::{CustomerProfile, Id, Role};
use entity_api::users::Model;
use sea_orm::DatabaseConnection;

pub use entity_api::user::find_by_id;

pub async fn find_profile(db: &DatabaseConnection, id: Id) -> Result<CustomerProfile, Error> {
    Ok(find_by_id(db, id).await?.into())
}

pub async fn find_role(db: &DatabaseConnection, id: Id) -> Result<Role, Error> {
    Ok(find_by_id(db, id).await?.role)
}

pub(crate) fn require_staff(user: &Model, action: &str) -> Result<(), Error> {
    if user.role.is_staff() {
        Ok(())
    } else {
        Err(Error::precondition(format!("only staff may {action}")))
    }
}

pub(crate) fn require_customer(user: &Model, action: &str) -> Result<(), Error> {
    if user.role == Role::Customer {
        Ok(())
    } else {
        Err(Error::precondition(format!("only customers may {action}")))
    }
}

pub(crate) fn require_non_empty(text: &str, field: &str) -> Result<(), Error> {
    if text.trim().is_empty() {
        Err(Error::precondition(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}
