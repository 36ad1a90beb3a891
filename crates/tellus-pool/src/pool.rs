//! The worker pool and its dispatch loop.

use std::collections::{HashMap, VecDeque};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, warn};

use tellus_mesh::{PatchMesh, build_patch};
use tellus_terrain::{BiomeParameters, HeightField};

use crate::job::{BodyId, BodyRecipe, BuildJob, BuildParams, BuildResult, JobError, JobId, WorkerMsg};

/// Per-worker channel capacity; also the in-flight cap per worker.
const WORKER_QUEUE_CAPACITY: usize = 16;
/// Completion channel capacity per worker.
const COMPLETION_CAPACITY: usize = 64;
/// Shrink the pending queue once its spare capacity passes this.
const QUEUE_SHRINK_THRESHOLD: usize = 256;

type Completion = Result<BuildResult, JobError>;

/// A body's recipe instantiated into a sampleable surface.
struct Bakery {
    field: HeightField,
    biome: BiomeParameters,
}

impl Bakery {
    fn new(recipe: BodyRecipe) -> Self {
        Self {
            field: HeightField::new(recipe.height_field),
            biome: recipe.biome,
        }
    }

    fn build(&self, params: &BuildParams) -> PatchMesh {
        build_patch(
            &self.field,
            &self.biome,
            params.rect.face,
            params.rect.uv_bounds(),
            params.grid_n,
            params.normal_eps,
            params.skirt_depth,
        )
    }
}

struct WorkerHandle {
    sender: Sender<WorkerMsg>,
    in_flight: usize,
    alive: bool,
}

/// Fixed pool of background build workers.
///
/// One bounded channel per worker carries init and build messages; one
/// shared channel carries completions back. All mutation happens on the
/// thread that owns the pool; workers only see moved values.
///
/// With zero workers every request is served synchronously on the calling
/// thread through the identical build path, trading frame time for
/// correctness.
pub struct JobPool {
    workers: Vec<WorkerHandle>,
    completion_rx: Receiver<(usize, Completion)>,
    queued: VecDeque<BuildJob>,
    /// Local copies for the synchronous fallback path.
    recipes: HashMap<BodyId, Bakery>,
    /// Completions produced synchronously, drained with the channel.
    completed: Vec<Completion>,
    next_job_id: u64,
}

impl JobPool {
    /// Spawn a pool with an explicit worker count. Zero is valid and means
    /// fully synchronous operation.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let (completion_tx, completion_rx) =
            bounded::<(usize, Completion)>(COMPLETION_CAPACITY * worker_count.max(1));

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let (tx, rx) = bounded::<WorkerMsg>(WORKER_QUEUE_CAPACITY);
            let completion_tx = completion_tx.clone();
            std::thread::Builder::new()
                .name(format!("patch-build-{index}"))
                .spawn(move || worker_loop(index, &rx, &completion_tx))
                .expect("failed to spawn patch build worker");
            workers.push(WorkerHandle {
                sender: tx,
                in_flight: 0,
                alive: true,
            });
        }
        debug!("job pool started with {worker_count} workers");

        Self {
            workers,
            completion_rx,
            queued: VecDeque::new(),
            recipes: HashMap::new(),
            completed: Vec::new(),
            next_job_id: 0,
        }
    }

    /// Spawn with one worker per hardware thread, minus one for the control
    /// thread, floor of one.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(num_cpus::get().saturating_sub(1).max(1))
    }

    /// Number of workers that are still running.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.iter().filter(|w| w.alive).count()
    }

    /// Jobs accepted but not yet handed to a worker.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Jobs currently on worker queues or executing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.workers.iter().map(|w| w.in_flight).sum()
    }

    /// Push a body's recipe to every worker (and keep a local copy for the
    /// synchronous path). Idempotent: re-sending replaces the recipe.
    pub fn init_body(&mut self, body_id: BodyId, recipe: BodyRecipe) {
        self.recipes.insert(body_id, Bakery::new(recipe));
        for worker in &mut self.workers {
            if !worker.alive {
                continue;
            }
            if worker.sender.send(WorkerMsg::InitBody { body_id, recipe }).is_err() {
                warn!("worker died before init of {body_id}");
                worker.alive = false;
                // Jobs on its queue died with it.
                worker.in_flight = 0;
            }
        }
    }

    /// Enqueue a build job and return its id immediately.
    ///
    /// With live workers this never blocks; without any, the job is built
    /// here and now and its completion surfaces on the next
    /// [`Self::pump_completed`].
    pub fn request(&mut self, params: BuildParams) -> JobId {
        let job_id = JobId(self.next_job_id);
        self.next_job_id += 1;
        let job = BuildJob { job_id, params };

        if self.worker_count() == 0 {
            self.completed.push(self.build_synchronously(&job));
            return job_id;
        }

        self.queued.push_back(job);
        self.dispatch();
        job_id
    }

    /// Drain every completion that has arrived since the last call.
    ///
    /// Call once per frame from the thread that owns the patch nodes; this
    /// is the only place worker output crosses back into engine state.
    /// Failed jobs are logged here and returned so callers can clear the
    /// requesting node's pending state.
    pub fn pump_completed(&mut self) -> Vec<Completion> {
        let mut results = std::mem::take(&mut self.completed);
        while let Ok((worker_index, completion)) = self.completion_rx.try_recv() {
            if let Some(worker) = self.workers.get_mut(worker_index) {
                worker.in_flight = worker.in_flight.saturating_sub(1);
            }
            if let Err(err) = &completion {
                warn!("patch build failed: {err}");
            }
            results.push(completion);
        }

        self.dispatch();

        // Opportunistic compaction keeps a burst (e.g. a warp) from pinning
        // queue memory forever.
        if self.queued.is_empty() && self.queued.capacity() > QUEUE_SHRINK_THRESHOLD {
            self.queued.shrink_to_fit();
        }

        results
    }

    /// Hand queued jobs to the least-loaded live workers.
    fn dispatch(&mut self) {
        while let Some(&job) = self.queued.front() {
            let target = self
                .workers
                .iter()
                .enumerate()
                .filter(|(_, w)| w.alive && w.in_flight < WORKER_QUEUE_CAPACITY)
                .min_by_key(|(_, w)| w.in_flight)
                .map(|(i, _)| i);
            let Some(index) = target else {
                if self.worker_count() == 0 {
                    // Every worker is gone; degrade to synchronous builds.
                    self.queued.pop_front();
                    let completion = self.build_synchronously(&job);
                    self.completed.push(completion);
                    continue;
                }
                break;
            };

            match self.workers[index].sender.try_send(WorkerMsg::Build(job)) {
                Ok(()) => {
                    self.queued.pop_front();
                    self.workers[index].in_flight += 1;
                }
                Err(TrySendError::Full(_)) => break,
                Err(TrySendError::Disconnected(_)) => {
                    warn!("worker {index} disconnected, redistributing its queue");
                    self.workers[index].alive = false;
                    // Jobs it had accepted will never complete; releasing
                    // the count keeps in_flight() honest.
                    self.workers[index].in_flight = 0;
                }
            }
        }
    }

    fn build_synchronously(&self, job: &BuildJob) -> Completion {
        match self.recipes.get(&job.params.body_id) {
            Some(bakery) => Ok(BuildResult {
                job_id: job.job_id,
                body_id: job.params.body_id,
                rect: job.params.rect,
                mesh: bakery.build(&job.params),
            }),
            None => Err(JobError {
                job_id: job.job_id,
                body_id: job.params.body_id,
                rect: job.params.rect,
                message: "no recipe registered for this body".into(),
            }),
        }
    }
}

fn worker_loop(index: usize, rx: &Receiver<WorkerMsg>, completion_tx: &Sender<(usize, Completion)>) {
    let mut bodies: HashMap<BodyId, Bakery> = HashMap::new();
    while let Ok(msg) = rx.recv() {
        match msg {
            WorkerMsg::InitBody { body_id, recipe } => {
                bodies.insert(body_id, Bakery::new(recipe));
            }
            WorkerMsg::Build(job) => {
                let completion = match bodies.get(&job.params.body_id) {
                    Some(bakery) => Ok(BuildResult {
                        job_id: job.job_id,
                        body_id: job.params.body_id,
                        rect: job.params.rect,
                        mesh: bakery.build(&job.params),
                    }),
                    None => Err(JobError {
                        job_id: job.job_id,
                        body_id: job.params.body_id,
                        rect: job.params.rect,
                        message: "worker has no recipe for this body".into(),
                    }),
                };
                if completion_tx.send((index, completion)).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tellus_cubesphere::{CubeFace, PatchRect};
    use tellus_terrain::HeightFieldConfig;

    fn test_recipe() -> BodyRecipe {
        BodyRecipe {
            height_field: HeightFieldConfig {
                seed: 42,
                base_radius: 1400.0,
                sea_level: 1400.0,
                ..Default::default()
            },
            biome: BiomeParameters {
                sea_level: 1400.0,
                ..Default::default()
            },
        }
    }

    fn test_params(body_id: BodyId, face: CubeFace) -> BuildParams {
        BuildParams {
            body_id,
            rect: PatchRect::new(face, 1, 0, 0),
            grid_n: 9,
            normal_eps: 0.5,
            skirt_depth: 10.0,
        }
    }

    fn pump_until(pool: &mut JobPool, count: usize) -> Vec<Completion> {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(30);
        let mut results = Vec::new();
        while results.len() < count && std::time::Instant::now() < deadline {
            results.extend(pool.pump_completed());
            if results.len() < count {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        }
        results
    }

    #[test]
    fn test_zero_workers_builds_synchronously() {
        let mut pool = JobPool::new(0);
        let body = BodyId(1);
        pool.init_body(body, test_recipe());
        let job_id = pool.request(test_params(body, CubeFace::PosX));

        let results = pool.pump_completed();
        assert_eq!(results.len(), 1);
        let result = results[0].as_ref().expect("sync build should succeed");
        assert_eq!(result.job_id, job_id);
        assert!(result.mesh.is_well_formed());
    }

    #[test]
    fn test_unknown_body_reports_job_error() {
        let mut pool = JobPool::new(0);
        let job_id = pool.request(test_params(BodyId(99), CubeFace::NegY));
        let results = pool.pump_completed();
        assert_eq!(results.len(), 1);
        let err = results[0].as_ref().expect_err("unknown body must fail");
        assert_eq!(err.job_id, job_id);
    }

    #[test]
    fn test_workers_complete_all_requests() {
        let mut pool = JobPool::new(2);
        let body = BodyId(7);
        pool.init_body(body, test_recipe());

        let mut expected: Vec<JobId> = Vec::new();
        for face in CubeFace::ALL {
            expected.push(pool.request(test_params(body, face)));
            expected.push(pool.request(test_params(body, face)));
        }

        let results = pump_until(&mut pool, expected.len());
        assert_eq!(results.len(), expected.len());
        let mut seen: Vec<JobId> = results
            .iter()
            .map(|r| r.as_ref().expect("builds should succeed").job_id)
            .collect();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.queued_len(), 0);
    }

    #[test]
    fn test_job_ids_are_monotonic() {
        let mut pool = JobPool::new(0);
        let body = BodyId(1);
        pool.init_body(body, test_recipe());
        let a = pool.request(test_params(body, CubeFace::PosX));
        let b = pool.request(test_params(body, CubeFace::PosX));
        let c = pool.request(test_params(body, CubeFace::PosX));
        assert!(a < b && b < c);
    }

    #[test]
    fn test_reinitializing_a_body_is_idempotent() {
        let mut pool = JobPool::new(1);
        let body = BodyId(3);
        pool.init_body(body, test_recipe());
        pool.init_body(body, test_recipe());
        let _ = pool.request(test_params(body, CubeFace::PosZ));
        let results = pump_until(&mut pool, 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn test_dead_worker_releases_its_in_flight_count() {
        let mut pool = JobPool::new(1);
        let body = BodyId(1);
        pool.init_body(body, test_recipe());

        // A degenerate grid asserts inside the build and kills the worker
        // thread.
        let mut bad = test_params(body, CubeFace::PosX);
        bad.grid_n = 1;
        let _ = pool.request(bad);

        // The blocking init send notices the closed channel as soon as the
        // thread is gone.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(30);
        while pool.worker_count() > 0 && std::time::Instant::now() < deadline {
            pool.init_body(body, test_recipe());
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(pool.worker_count(), 0, "the poisoned worker must be detected");
        assert_eq!(
            pool.in_flight(),
            0,
            "a dead worker must not pin in-flight jobs"
        );

        // The pool degrades to synchronous builds and keeps serving.
        let job_id = pool.request(test_params(body, CubeFace::PosY));
        let results = pool.pump_completed();
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Ok(b) if b.job_id == job_id)),
            "requests after worker death must still complete"
        );
    }

    #[test]
    fn test_default_worker_count_leaves_headroom() {
        let pool = JobPool::with_defaults();
        assert!(pool.worker_count() >= 1);
        assert!(pool.worker_count() <= num_cpus::get());
    }
}
