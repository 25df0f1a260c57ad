// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for permit workflow records.
use std::collections::HashMap;
use std::convert::Infallible;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use permit_core::{Application, Certificate, Id, Inspection, OrderOfPayment};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, SemaphorePermit};

use crate::traits::Transaction;

#[derive(Clone, Debug, Default)]
pub struct InnerMemoryStore {
    pub(crate) applications: HashMap<Id, Application>,
    pub(crate) orders: HashMap<Id, OrderOfPayment>,
    pub(crate) certificates: HashMap<Id, Certificate>,
    pub(crate) inspections: HashMap<Id, Inspection>,
    pub(crate) sequences: HashMap<String, u64>,
}

/// In-memory store.
///
/// This does not persist data permanently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
///
/// Beginning a transaction stages a copy of all records. The handle returned by `within` reads
/// and writes the staged copy until it replaces the committed records on commit or is dropped on
/// rollback. Other handles read committed records and their writes wait for the transaction to
/// end.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    committed: Arc<RwLock<InnerMemoryStore>>,
    staged: Arc<Mutex<Option<InnerMemoryStore>>>,
    semaphore: Arc<Semaphore>,
    in_transaction: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            committed: Arc::default(),
            staged: Arc::default(),
            semaphore: Arc::new(Semaphore::new(1)),
            in_transaction: false,
        }
    }

    /// Obtain read access on the records visible to this handle.
    pub(crate) fn read_store(&self) -> ReadGuard<'_> {
        if self.in_transaction {
            let staged = self.lock_staged();
            if staged.is_some() {
                return ReadGuard::Staged(staged);
            }
        }
        ReadGuard::Committed(self.read_committed())
    }

    /// Obtain write access on the records of this handle.
    ///
    /// Handles outside of a transaction wait until no other one is open.
    pub(crate) async fn write_store(&self) -> WriteGuard<'_> {
        if self.in_transaction {
            let staged = self.lock_staged();
            if staged.is_some() {
                return WriteGuard::Staged(staged);
            }
        }

        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("if semaphore is closed then the whole struct is gone as well");
        let committed = self
            .committed
            .write()
            .expect("acquire exclusive write access on store");
        WriteGuard::Committed {
            committed,
            _permit: permit,
        }
    }

    fn read_committed(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.committed
            .read()
            .expect("acquire shared read access on store")
    }

    fn lock_staged(&self) -> MutexGuard<'_, Option<InnerMemoryStore>> {
        self.staged.lock().expect("acquire access on staged records")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) enum ReadGuard<'a> {
    Staged(MutexGuard<'a, Option<InnerMemoryStore>>),
    Committed(RwLockReadGuard<'a, InnerMemoryStore>),
}

impl Deref for ReadGuard<'_> {
    type Target = InnerMemoryStore;

    fn deref(&self) -> &InnerMemoryStore {
        match self {
            ReadGuard::Staged(staged) => staged.as_ref().expect("guard only taken when staged"),
            ReadGuard::Committed(committed) => committed,
        }
    }
}

pub(crate) enum WriteGuard<'a> {
    Staged(MutexGuard<'a, Option<InnerMemoryStore>>),
    Committed {
        committed: RwLockWriteGuard<'a, InnerMemoryStore>,
        _permit: SemaphorePermit<'a>,
    },
}

impl Deref for WriteGuard<'_> {
    type Target = InnerMemoryStore;

    fn deref(&self) -> &InnerMemoryStore {
        match self {
            WriteGuard::Staged(staged) => staged.as_ref().expect("guard only taken when staged"),
            WriteGuard::Committed { committed, .. } => committed,
        }
    }
}

impl DerefMut for WriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut InnerMemoryStore {
        match self {
            WriteGuard::Staged(staged) => staged.as_mut().expect("guard only taken when staged"),
            WriteGuard::Committed { committed, .. } => committed,
        }
    }
}

impl Transaction for MemoryStore {
    type Error = Infallible;

    type Permit = TransactionPermit;

    async fn begin(&self) -> Result<TransactionPermit, Self::Error> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("if semaphore is closed then the whole struct is gone as well");

        let mut staged = self.lock_staged();
        assert!(
            staged.is_none(),
            "can't have already staged records after a just-acquired permit"
        );
        staged.replace(self.read_committed().clone());

        Ok(TransactionPermit(permit))
    }

    fn within(&self, _permit: &TransactionPermit) -> Self {
        Self {
            in_transaction: true,
            ..self.clone()
        }
    }

    async fn rollback(&self, permit: TransactionPermit) -> Result<(), Self::Error> {
        let Some(_) = self.lock_staged().take() else {
            panic!("can't have no staged records without dropping permit first")
        };
        drop(permit);
        Ok(())
    }

    async fn commit(&self, permit: TransactionPermit) -> Result<(), Self::Error> {
        let mut staged = self.lock_staged();
        let Some(records) = staged.take() else {
            panic!("can't have no staged records without dropping permit first")
        };
        *self
            .committed
            .write()
            .expect("acquire exclusive write access on store") = records;
        drop(staged);
        drop(permit);
        Ok(())
    }
}

#[allow(unused)]
pub struct TransactionPermit(OwnedSemaphorePermit);

#[cfg(test)]
mod tests {
    use std::task::Poll;

    use futures_test::task::noop_context;
    use permit_core::ApplicationType;
    use permit_core::test_utils::draft;
    use tokio::pin;

    use crate::ApplicationStore;
    use crate::traits::Transaction;

    use super::MemoryStore;

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = MemoryStore::default();
        let kept = draft(ApplicationType::TreeCuttingPermit);
        store.insert_application(&kept).await.unwrap();

        let permit = store.begin().await.unwrap();
        let tx = store.within(&permit);

        // A second transaction has to wait and so do writes of other handles.
        assert!(matches!(
            {
                let fut = store.begin();
                let mut cx = noop_context();
                pin!(fut);
                fut.poll(&mut cx)
            },
            Poll::Pending
        ));
        assert!(matches!(
            {
                let fut = store.delete_application(&kept.id);
                let mut cx = noop_context();
                pin!(fut);
                fut.poll(&mut cx)
            },
            Poll::Pending
        ));

        let discarded = draft(ApplicationType::TransportPermit);
        tx.insert_application(&discarded).await.unwrap();
        tx.delete_application(&kept.id).await.unwrap();

        // Staged writes are only visible inside the transaction.
        assert!(tx.get_application(&discarded.id).await.unwrap().is_some());
        assert!(tx.get_application(&kept.id).await.unwrap().is_none());
        assert!(store.get_application(&discarded.id).await.unwrap().is_none());
        assert!(store.get_application(&kept.id).await.unwrap().is_some());

        store.rollback(permit).await.unwrap();

        assert_eq!(store.get_application(&kept.id).await.unwrap(), Some(kept));
        assert!(
            store
                .get_application(&discarded.id)
                .await
                .unwrap()
                .is_none()
        );

        // Committed changes stay.
        let permit = store.begin().await.unwrap();
        store
            .within(&permit)
            .insert_application(&discarded)
            .await
            .unwrap();
        store.commit(permit).await.unwrap();
        assert!(
            store
                .get_application(&discarded.id)
                .await
                .unwrap()
                .is_some()
        );
    }
}
