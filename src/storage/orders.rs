use redb::{ReadableTable, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::{Order, User};
use super::tables::*;

impl Database {
    // ========================================================================
    // Order operations
    // ========================================================================

    /// Insert or overwrite an order
    pub fn put_order(&self, order: &Order) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        write_order(&write_txn, order)?;
        write_txn.commit()?;
        Ok(())
    }

    /// Get an order by ID
    pub fn get_order(&self, id: &str) -> Result<Option<Order>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ORDERS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get all orders owned by an identity, newest first
    pub fn get_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(USER_ORDERS)?;
        let orders_table = read_txn.open_table(ORDERS)?;

        let order_ids: Vec<String> = match index_table.get(user_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut orders = Vec::new();
        for order_id in order_ids {
            if let Some(data) = orders_table.get(order_id.as_str())? {
                let order: Order = rmp_serde::from_slice(data.value())?;
                orders.push(order);
            }
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(orders)
    }

    /// Get every order, newest first
    pub fn get_all_orders(&self) -> Result<Vec<Order>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ORDERS)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let order: Order = rmp_serde::from_slice(value.value())?;
            orders.push(order);
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(orders)
    }

    /// Read, modify and write back an order in one write transaction.
    ///
    /// Returns the updated order, or `None` (writing nothing) if it does not exist.
    pub fn update_order<F>(&self, id: &str, apply: F) -> Result<Option<Order>, DatabaseError>
    where
        F: FnOnce(&mut Order),
    {
        let write_txn = self.begin_write()?;
        let Some(mut order) = read_order(&write_txn, id)? else {
            write_txn.abort()?;
            return Ok(None);
        };

        apply(&mut order);
        write_order(&write_txn, &order)?;
        write_txn.commit()?;
        Ok(Some(order))
    }

    /// Grant an entitlement: apply `grant` to an order and its owner and persist both rows in
    /// one write transaction.
    ///
    /// Both rows are read inside the transaction, so concurrent writers to either row are
    /// serialized against this one. Either both changes are durable or neither is.
    pub fn commit_entitlement<F>(
        &self,
        order_id: &str,
        grant: F,
    ) -> Result<GrantOutcome, DatabaseError>
    where
        F: FnOnce(&mut User, &mut Order),
    {
        let write_txn = self.begin_write()?;
        let Some(mut order) = read_order(&write_txn, order_id)? else {
            write_txn.abort()?;
            return Ok(GrantOutcome::OrderMissing);
        };

        let user_id = order.user_id.to_string();
        let stored: Option<User> = {
            let users = write_txn.open_table(USERS)?;
            let stored = users
                .get(user_id.as_str())?
                .map(|v| rmp_serde::from_slice(v.value()))
                .transpose()?;
            stored
        };
        let Some(mut user) = stored else {
            write_txn.abort()?;
            return Ok(GrantOutcome::UserMissing);
        };

        grant(&mut user, &mut order);
        debug_assert_eq!(user.id, order.user_id, "order must belong to the granted user");

        {
            let mut users = write_txn.open_table(USERS)?;
            let data = rmp_serde::to_vec_named(&user)?;
            users.insert(user_id.as_str(), data.as_slice())?;
        }
        write_order(&write_txn, &order)?;
        write_txn.commit()?;
        Ok(GrantOutcome::Granted { order, user })
    }
}

/// Result of [`Database::commit_entitlement`]
#[derive(Debug)]
pub enum GrantOutcome {
    Granted { order: Order, user: User },
    OrderMissing,
    UserMissing,
}

fn read_order(write_txn: &WriteTransaction, id: &str) -> Result<Option<Order>, DatabaseError> {
    let table = write_txn.open_table(ORDERS)?;
    let order = match table.get(id)? {
        Some(data) => Some(rmp_serde::from_slice(data.value())?),
        None => None,
    };
    Ok(order)
}

/// Write an order row and keep the owner index in step, inside the caller's transaction.
fn write_order(write_txn: &WriteTransaction, order: &Order) -> Result<(), DatabaseError> {
    let id = order.id.to_string();
    let user_id = order.user_id.to_string();

    let mut table = write_txn.open_table(ORDERS)?;
    let data = rmp_serde::to_vec_named(order)?;
    table.insert(id.as_str(), data.as_slice())?;

    let mut index_table = write_txn.open_table(USER_ORDERS)?;
    let mut order_ids: Vec<String> = index_table
        .get(user_id.as_str())?
        .map(|v| rmp_serde::from_slice(v.value()))
        .transpose()?
        .unwrap_or_default();

    if !order_ids.contains(&id) {
        order_ids.push(id);
        let index_data = rmp_serde::to_vec_named(&order_ids)?;
        index_table.insert(user_id.as_str(), index_data.as_slice())?;
    }

    Ok(())
}
