// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! In-order command queue served by a dedicated device thread
//!
//! Commands run strictly in submission order, one at a time. A dispatch
//! returns to the caller as soon as it is queued; completion is observed
//! only through a later fence (see [`CommandQueue::read`]). This ordering is
//! the sole synchronization between the force and integrator stages and
//! between consecutive cycles.

use super::executor::run_stage;
use super::memory::DeviceMemory;
use super::program::BoundKernel;
use super::LaunchShape;
use crate::error::{Result, SimError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

enum Command {
    Dispatch { kernel: BoundKernel, shape: LaunchShape },
    Fence(Sender<()>),
}

/// Handle to the device's command queue and the memory it owns
pub struct CommandQueue {
    sender: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    memory: Option<Arc<Mutex<DeviceMemory>>>,
    pending: Arc<AtomicUsize>,
}

impl CommandQueue {
    /// Start a queue that owns `memory`
    ///
    /// # Errors
    ///
    /// [`SimError::DeviceUnavailable`] if the device thread cannot be started.
    pub fn new(memory: DeviceMemory) -> Result<Self> {
        let memory = Arc::new(Mutex::new(memory));
        let pending = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = mpsc::channel();

        let worker = {
            let memory = Arc::clone(&memory);
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name("nbody-device-queue".into())
                .spawn(move || serve(receiver, memory, pending))
                .map_err(|e| SimError::DeviceUnavailable(format!("cannot start command queue: {e}")))?
        };

        Ok(CommandQueue {
            sender: Some(sender),
            worker: Some(worker),
            memory: Some(memory),
            pending,
        })
    }

    /// Queue a dispatch without waiting for it
    pub fn enqueue(&self, kernel: &BoundKernel, shape: LaunchShape) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(SimError::Released)?;
        self.pending.fetch_add(1, Ordering::SeqCst);
        sender
            .send(Command::Dispatch { kernel: *kernel, shape })
            .map_err(|_| {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                device_lost("dispatch")
            })
    }

    /// Block until every queued command has completed
    pub fn finish(&self) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(SimError::Released)?;
        let (reply, done) = mpsc::channel();
        sender
            .send(Command::Fence(reply))
            .map_err(|_| device_lost("fence"))?;
        done.recv().map_err(|_| device_lost("fence"))
    }

    /// Wait for queued work, then inspect device memory
    ///
    /// The closure gets shared access only; reading never changes device
    /// state.
    pub fn read<R>(&self, f: impl FnOnce(&DeviceMemory) -> R) -> Result<R> {
        self.finish()?;
        let memory = self.memory.as_ref().ok_or(SimError::Released)?;
        let memory = memory.lock().map_err(|_| device_lost("readback"))?;
        Ok(f(&memory))
    }

    /// Number of dispatches queued but not yet completed
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether the queue still accepts commands and owns its buffers
    pub fn is_open(&self) -> bool {
        self.sender.is_some() && self.memory.is_some()
    }

    /// Drain outstanding work, stop the device thread and free device memory
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        // Closing the channel lets the worker finish what is queued and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Device queue thread panicked before shutdown");
            }
        }
        // The worker has exited, so this is the last handle to the buffers
        self.memory.take();
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn device_lost(during: &str) -> SimError {
    log::error!("Device queue disconnected during {during}");
    SimError::DeviceUnavailable(format!("command queue disconnected during {during}"))
}

fn serve(receiver: Receiver<Command>, memory: Arc<Mutex<DeviceMemory>>, pending: Arc<AtomicUsize>) {
    for command in receiver {
        match command {
            Command::Dispatch { kernel, shape } => {
                let mut memory = match memory.lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        log::error!("Device memory poisoned; stopping queue");
                        // Nothing queued will ever run now
                        pending.store(0, Ordering::SeqCst);
                        return;
                    }
                };
                run_stage(&kernel, shape, &mut memory);
                pending.fetch_sub(1, Ordering::SeqCst);
            }
            Command::Fence(reply) => {
                // The waiter may have given up; nothing to do then
                let _ = reply.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConstants;
    use crate::device::{BufferId, Program, ProgramSource};
    use crate::vector::Vec3;

    fn update_kernel() -> BoundKernel {
        Program::build(&ProgramSource::nbody(), SimulationConstants::default())
            .unwrap()
            .create_kernel("update_positions")
            .unwrap()
            .bind(&[BufferId::Positions, BufferId::Velocities, BufferId::Accelerations])
            .unwrap()
    }

    #[test]
    fn test_dispatches_complete_in_order_before_read() {
        let mut memory = DeviceMemory::allocate(4).unwrap();
        memory.write_velocities(&[Vec3::new(1.0, 0.0, 0.0); 4]).unwrap();
        let queue = CommandQueue::new(memory).unwrap();
        let kernel = update_kernel();
        let shape = LaunchShape::new(4, 2).unwrap();

        for _ in 0..10 {
            queue.enqueue(&kernel, shape).unwrap();
        }

        let mut out = [Vec3::zero(); 4];
        queue.read(|m| m.read_positions(&mut out)).unwrap().unwrap();
        assert_eq!(queue.pending(), 0);

        let mut expected = 0.0;
        for _ in 0..10 {
            expected += 1.0 * 0.01;
        }
        for p in out {
            assert_eq!(p.x, expected);
        }
    }

    #[test]
    fn test_shutdown_closes_queue() {
        let mut queue = CommandQueue::new(DeviceMemory::allocate(2).unwrap()).unwrap();
        assert!(queue.is_open());
        queue.shutdown();
        assert!(!queue.is_open());
        let shape = LaunchShape::new(2, 2).unwrap();
        assert_eq!(queue.enqueue(&update_kernel(), shape), Err(SimError::Released));
        assert_eq!(queue.finish(), Err(SimError::Released));
        // Second shutdown is a no-op
        queue.shutdown();
    }

    #[test]
    fn test_shutdown_frees_device_memory() {
        let mut queue = CommandQueue::new(DeviceMemory::allocate(1024).unwrap()).unwrap();
        let buffers = Arc::downgrade(queue.memory.as_ref().unwrap());
        queue.enqueue(&update_kernel(), LaunchShape::new(1024, 64).unwrap()).unwrap();

        queue.shutdown();
        assert!(buffers.upgrade().is_none());
        assert_eq!(queue.read(|m| m.lanes()), Err(SimError::Released));
    }

    #[test]
    fn test_poisoned_memory_clears_pending() {
        let mut queue = CommandQueue::new(DeviceMemory::allocate(2).unwrap()).unwrap();
        let memory = Arc::clone(queue.memory.as_ref().unwrap());
        let poisoner = thread::spawn(move || {
            let _guard = memory.lock().unwrap();
            panic!("poison device memory");
        });
        assert!(poisoner.join().is_err());

        queue.enqueue(&update_kernel(), LaunchShape::new(2, 2).unwrap()).unwrap();
        // Joins the worker, which bails out on the poisoned lock
        queue.shutdown();
        assert_eq!(queue.pending(), 0);
    }
}
