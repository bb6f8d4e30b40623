//! Password hashing with bcrypt on a bounded pool of blocking threads.
//!
//! bcrypt at the default cost takes a few hundred milliseconds of CPU. Running that
//! on an actix worker would stall every other request on the same worker, so the
//! async [`PasswordHasher`] hands each job to `tokio::task::spawn_blocking`.
//! At most `workers` jobs run at once; up to `queue_capacity` more wait for a
//! worker, and anything beyond that is refused with `ServiceUnavailable`.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Semaphore;

use crate::error::AppError;

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(password, cost)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    workers: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
}

/// Releases a reserved place in the pool when dropped.
struct Slot {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PasswordHasher {
    pub fn new(cost: u32, workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        Self {
            cost,
            workers: Arc::new(Semaphore::new(workers)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: workers + queue_capacity,
        }
    }

    pub async fn hash(&self, password: String) -> Result<String, AppError> {
        let cost = self.cost;
        self.run(move || hash_password(&password, cost)).await
    }

    pub async fn verify(
        &self,
        password: String,
        hashed_password: String,
    ) -> Result<bool, AppError> {
        self.run(move || verify_password(&password, &hashed_password))
            .await
    }

    async fn run<T, F>(&self, job: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let _slot = self.reserve()?;
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::InternalServerError("Password hashing pool closed".into()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| AppError::InternalServerError(format!("Password hashing task failed: {}", e)))?
    }

    fn reserve(&self) -> Result<Slot, AppError> {
        let previous = self.in_flight.fetch_add(1, Ordering::SeqCst);
        let slot = Slot {
            in_flight: Arc::clone(&self.in_flight),
        };
        if previous >= self.max_in_flight {
            log::warn!(
                "Password hashing pool saturated ({} jobs in flight)",
                previous
            );
            return Err(AppError::ServiceUnavailable(
                "Server is busy, please retry shortly".into(),
            ));
        }
        Ok(slot)
    }
}
