//! Usage: Poison-recovering lock helpers for the std `Mutex` and `RwLock` guarding session and feed state.

use std::panic::Location;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) trait MutexExt<T> {
    /// Lock the mutex; a poisoned lock is recovered and logged.
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;
}

pub(crate) trait RwLockExt<T> {
    fn read_or_recover(&self) -> RwLockReadGuard<'_, T>;
    fn write_or_recover(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        let loc = Location::caller();
        self.lock()
            .unwrap_or_else(|poisoned| recover::<T, _>(poisoned, "mutex", loc))
    }
}

impl<T> RwLockExt<T> for RwLock<T> {
    #[track_caller]
    fn read_or_recover(&self) -> RwLockReadGuard<'_, T> {
        let loc = Location::caller();
        self.read()
            .unwrap_or_else(|poisoned| recover::<T, _>(poisoned, "rwlock.read", loc))
    }

    #[track_caller]
    fn write_or_recover(&self) -> RwLockWriteGuard<'_, T> {
        let loc = Location::caller();
        self.write()
            .unwrap_or_else(|poisoned| recover::<T, _>(poisoned, "rwlock.write", loc))
    }
}

fn recover<T, G>(poisoned: PoisonError<G>, lock: &'static str, loc: &Location<'_>) -> G {
    tracing::error!(
        lock,
        owner = std::any::type_name::<T>(),
        file = loc.file(),
        line = loc.line(),
        "lock poisoned by a panicking holder; continuing with the last written state"
    );
    poisoned.into_inner()
}
