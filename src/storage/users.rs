use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::User;
use super::tables::*;

impl Database {
    // ========================================================================
    // Identity operations
    // ========================================================================

    /// Insert a new identity. Returns `false` (and writes nothing) if the email is taken.
    pub fn insert_user(&self, user: &User) -> Result<bool, DatabaseError> {
        debug_assert!(!user.email.is_empty(), "user email must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut email_table = write_txn.open_table(USER_EMAILS)?;
            let taken = email_table.get(user.email.as_str())?.is_some();
            if taken {
                drop(email_table);
                write_txn.abort()?;
                return Ok(false);
            }

            let id = user.id.to_string();
            email_table.insert(user.email.as_str(), id.as_str())?;

            let mut table = write_txn.open_table(USERS)?;
            let data = rmp_serde::to_vec_named(user)?;
            table.insert(id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Get an identity by its ID
    pub fn get_user(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get an identity by its normalized email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let email_table = read_txn.open_table(USER_EMAILS)?;
        let users = read_txn.open_table(USERS)?;

        let id = match email_table.get(email)? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };

        match users.get(id.as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Read, modify and write back an identity in one write transaction.
    ///
    /// Returns the updated identity, or `None` (writing nothing) if it does not exist.
    /// The email index is left alone; emails are immutable after registration.
    pub fn update_user<F>(&self, id: &str, apply: F) -> Result<Option<User>, DatabaseError>
    where
        F: FnOnce(&mut User),
    {
        let write_txn = self.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(USERS)?;
            let stored: Option<User> = table
                .get(id)?
                .map(|v| rmp_serde::from_slice(v.value()))
                .transpose()?;
            match stored {
                Some(mut user) => {
                    apply(&mut user);
                    debug_assert_eq!(user.id.to_string(), id, "identity ID is immutable");
                    let data = rmp_serde::to_vec_named(&user)?;
                    table.insert(id, data.as_slice())?;
                    Some(user)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Get all identities, oldest first
    pub fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        let mut users = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let user: User = rmp_serde::from_slice(value.value())?;
            users.push(user);
        }
        users.sort_by_key(|u| u.created_at);

        Ok(users)
    }
}
