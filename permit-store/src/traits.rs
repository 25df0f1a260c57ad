// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

/// Atomic group of writes across all stores.
///
/// Transactions are strictly serialized. Beginning one hands out a permit which needs to be given
/// back on commit or rollback, holding it makes it explicit which process currently writes.
///
/// Only the handle returned by `within` sees the uncommitted changes of a transaction. All other
/// handles read committed records, their writes wait until the transaction is finished.
pub trait Transaction: Sized {
    type Error: Error;

    type Permit;

    /// Begins a transaction, waits if another process holds a permit.
    fn begin(&self) -> impl Future<Output = Result<Self::Permit, Self::Error>>;

    /// Handle on the same records which reads and writes inside the transaction of `permit`.
    fn within(&self, permit: &Self::Permit) -> Self;

    /// Rolls back all uncommitted changes and releases the permit.
    fn rollback(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;

    /// Commits the transaction and releases the permit.
    fn commit(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;
}
