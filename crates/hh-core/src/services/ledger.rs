use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::error::{AgentError, Result};

/// Floor the counter starts from; the first allocated port is 1025.
pub const INITIAL_PORT: u16 = 1024;

/// Disk-backed monotonic counter of the highest host port issued to any
/// compose project on this host. Ports are never reused; a full-fleet
/// rebuild calls [`PortLedger::reset`] before its first allocation to get a
/// clean remapping.
///
/// Allocation happens through a [`LedgerGuard`], which holds the exclusive
/// lock for the caller's whole read-rewrite-write sequence. Allocations made
/// through a guard only reach disk on [`LedgerGuard::commit`]; dropping the
/// guard discards them, so a failed rewrite consumes no ports.
pub struct PortLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

pub struct LedgerGuard<'a> {
    ledger: &'a PortLedger,
    last_port: u16,
    _guard: MutexGuard<'a, ()>,
}

impl PortLedger {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Acquire the allocation lock and load the persisted counter,
    /// initializing the ledger file to the floor on first use.
    pub fn lock(&self) -> Result<LedgerGuard<'_>> {
        let guard = self.lock.lock().unwrap();
        let last_port = self.read_or_init()?;
        Ok(LedgerGuard {
            ledger: self,
            last_port,
            _guard: guard,
        })
    }

    /// Rewrite the ledger to the floor. Used only by full-fleet rebuilds,
    /// before any allocation in the batch.
    pub fn reset(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        self.write(INITIAL_PORT)
    }

    fn read_or_init(&self) -> Result<u16> {
        if !self.path.exists() {
            self.write(INITIAL_PORT)?;
            return Ok(INITIAL_PORT);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        contents.trim().parse::<u16>().map_err(|_| {
            AgentError::Ledger(format!(
                "{} does not contain a valid port: {:?}",
                self.path.display(),
                contents
            ))
        })
    }

    fn write(&self, port: u16) -> Result<()> {
        std::fs::write(&self.path, port.to_string())?;
        Ok(())
    }
}

impl LedgerGuard<'_> {
    /// Issue the next host port. Monotonic and in-memory until `commit`.
    pub fn allocate_next(&mut self) -> Result<u16> {
        self.last_port = self
            .last_port
            .checked_add(1)
            .ok_or_else(|| AgentError::Ledger("host port space exhausted".to_string()))?;
        Ok(self.last_port)
    }

    pub fn last_port(&self) -> u16 {
        self.last_port
    }

    /// Persist the high-water mark. The lock stays held until the guard is
    /// dropped, so callers can finish their descriptor write inside the same
    /// critical section.
    pub fn commit(&mut self) -> Result<()> {
        self.ledger.write(self.last_port)
    }
}
